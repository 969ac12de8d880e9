pub use crate::cell_building_blocks::cycle::*;
pub use crate::cell_building_blocks::interaction::*;
