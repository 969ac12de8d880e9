pub use cellpolar_building_blocks::prelude::*;
pub use cellpolar_concepts::*;
pub use cellpolar_core::*;

pub use nalgebra::Vector3;
