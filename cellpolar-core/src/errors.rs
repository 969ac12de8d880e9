use cellpolar_concepts::*;
use core::fmt::Display;

macro_rules! impl_error_variant {
    ($name: ident, $($err_var: ident),+) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        $name::$err_var(message) => write!(f, "{}", message),
                    )+
                }
            }
        }
    }
}

macro_rules! impl_from_error {
    ($name: ident, $(($err_var: ident, $err_type: ty)),+) => {
        $(
            impl From<$err_type> for $name {
                fn from(err: $err_type) -> Self {
                    $name::$err_var(err)
                }
            }
        )+
    }
}

/// Covers all errors that can occur while setting up or advancing a simulation.
///
/// The errors are listed from very likely to be a user error to almost certainly an internal
/// error.
#[derive(Debug)]
pub enum SimulationError {
    /// Inconsistent initial values or settings
    SetupError(SetupError),
    /// Non-finite values in the potential or its gradient
    CalcError(CalcError),
    /// A cell left the extracellular grid
    BoundaryError(BoundaryError),
    /// Division could not be carried out
    DivisionError(DivisionError),
    /// Sampling from a distribution failed
    RngError(RngError),
    /// Progress bar could not be displayed
    TimeError(TimeError),
    /// Internal bookkeeping went wrong
    IndexError(IndexError),
}

impl_from_error! {SimulationError,
    (SetupError, SetupError),
    (CalcError, CalcError),
    (BoundaryError, BoundaryError),
    (DivisionError, DivisionError),
    (RngError, RngError),
    (TimeError, TimeError),
    (IndexError, IndexError)
}

impl_error_variant! {SimulationError,
    SetupError,
    CalcError,
    BoundaryError,
    DivisionError,
    RngError,
    TimeError,
    IndexError
}

impl std::error::Error for SimulationError {}
