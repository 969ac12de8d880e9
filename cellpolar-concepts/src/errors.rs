use core::fmt::Display;
use std::error::Error;

macro_rules! define_errors {
    ($(($err_name: ident, $err_descr: expr)),+) => {
        $(
            #[doc = $err_descr]
            #[derive(Debug,Clone)]
            pub struct $err_name(
                #[doc = "Error message associated with "]
                #[doc = stringify!($err_name)]
                #[doc = " error type."]
                pub String,
            );

            impl Display for $err_name {
                fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl Error for $err_name {}
        )+
    }
}

define_errors!(
    (
        SetupError,
        "Occurs when constructing a new simulation from inconsistent initial values"
    ),
    (CalcError, "General Calculation Error"),
    (
        TimeError,
        "Error related to advancing the simulation time or displaying its progress"
    ),
    (DivisionError, "Errors related to a cell dividing process"),
    (
        IndexError,
        "Can occur internally when information is not present at expected place"
    ),
    (
        BoundaryError,
        "A cell left the region which is covered by the extracellular grid"
    ),
    (
        RngError,
        "Can occur when generating distributions or drawing samples from them."
    )
);

impl From<String> for TimeError {
    fn from(value: String) -> Self {
        TimeError(value)
    }
}

impl From<std::io::Error> for TimeError {
    fn from(value: std::io::Error) -> Self {
        TimeError(format!("{}", value))
    }
}

impl From<CalcError> for SetupError {
    fn from(value: CalcError) -> Self {
        SetupError(format!("{}", value))
    }
}

impl From<RngError> for DivisionError {
    fn from(value: RngError) -> Self {
        DivisionError(format!("{}", value))
    }
}
