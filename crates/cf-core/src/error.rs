use thiserror::Error;

pub type CfResult<T> = Result<T, CfError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CfError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Configuration error: {what}")]
    Configuration { what: String },

    #[error("Did not converge: {what} (residual={residual})")]
    NonConvergence { what: String, residual: f64 },

    #[error("Unreachable: {what}")]
    Unreachable { what: String },
}
