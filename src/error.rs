use thiserror::Error;

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq)]
pub(crate) enum Error {
    /// The solver could not reach the end of the span.
    #[error("numerical failure at t = {t}: {reason}")]
    NumericalFailure { t: f64, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn numerical(t: f64, reason: impl Into<String>) -> Self {
        Error::NumericalFailure {
            t,
            reason: reason.into(),
        }
    }
}
