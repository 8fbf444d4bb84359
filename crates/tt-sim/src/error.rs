use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Non-finite value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },
}
