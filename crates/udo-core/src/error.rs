use thiserror::Error;

use crate::abi::ErrorType;

/// Failure kinds of the framework, one per boundary status code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UdoError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("wrong operation: {0}")]
    WrongOperation(String),

    #[error("wrong core: {0}")]
    WrongCore(String),

    #[error("wrong core type: {0}")]
    WrongCoreType(String),

    #[error("wrong number of params: {0}")]
    WrongNumOfParams(String),

    #[error("wrong number of dimensions: {0}")]
    WrongNumOfDimensions(String),

    #[error("wrong number of inputs: {0}")]
    WrongNumOfInputs(String),

    #[error("wrong number of outputs: {0}")]
    WrongNumOfOutputs(String),

    #[error("memory allocation failed: {0}")]
    MemAlloc(String),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, UdoError>;

impl UdoError {
    /// Status code reported across the boundary for this error.
    pub fn status(&self) -> ErrorType {
        match self {
            Self::InvalidArgument(_) => ErrorType::INVALID_ARGUMENT,
            Self::WrongOperation(_) => ErrorType::WRONG_OPERATION,
            Self::WrongCore(_) => ErrorType::WRONG_CORE,
            Self::WrongCoreType(_) => ErrorType::WRONG_CORE_TYPE,
            Self::WrongNumOfParams(_) => ErrorType::WRONG_NUM_OF_PARAMS,
            Self::WrongNumOfDimensions(_) => ErrorType::WRONG_NUM_OF_DIMENSIONS,
            Self::WrongNumOfInputs(_) => ErrorType::WRONG_NUM_OF_INPUTS,
            Self::WrongNumOfOutputs(_) => ErrorType::WRONG_NUM_OF_OUTPUTS,
            Self::MemAlloc(_) => ErrorType::MEM_ALLOC_ERROR,
            Self::UnsupportedFeature(_) => ErrorType::UNSUPPORTED_FEATURE,
            Self::Unknown(_) => ErrorType::UNKNOWN_ERROR,
        }
    }

    /// Rebuilds a typed error from a status code received from the other side
    /// of the boundary. `NO_ERROR` has no error counterpart.
    pub fn from_status(status: ErrorType, context: impl Into<String>) -> Option<Self> {
        let context = context.into();
        let err = match status {
            ErrorType::NO_ERROR => return None,
            ErrorType::INVALID_ARGUMENT => Self::InvalidArgument(context),
            ErrorType::WRONG_OPERATION => Self::WrongOperation(context),
            ErrorType::WRONG_CORE => Self::WrongCore(context),
            ErrorType::WRONG_CORE_TYPE => Self::WrongCoreType(context),
            ErrorType::WRONG_NUM_OF_PARAMS => Self::WrongNumOfParams(context),
            ErrorType::WRONG_NUM_OF_DIMENSIONS => Self::WrongNumOfDimensions(context),
            ErrorType::WRONG_NUM_OF_INPUTS => Self::WrongNumOfInputs(context),
            ErrorType::WRONG_NUM_OF_OUTPUTS => Self::WrongNumOfOutputs(context),
            ErrorType::MEM_ALLOC_ERROR => Self::MemAlloc(context),
            ErrorType::UNSUPPORTED_FEATURE => Self::UnsupportedFeature(context),
            other => Self::Unknown(format!("{context} (status {other:?})")),
        };
        Some(err)
    }
}

impl ErrorType {
    /// `Ok(())` for `NO_ERROR`, the matching [`UdoError`] otherwise.
    pub fn into_result(self, context: &str) -> Result<()> {
        match UdoError::from_status(self, context) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_error() {
        let statuses = [
            ErrorType::INVALID_ARGUMENT,
            ErrorType::WRONG_OPERATION,
            ErrorType::WRONG_NUM_OF_INPUTS,
            ErrorType::WRONG_NUM_OF_OUTPUTS,
            ErrorType::UNSUPPORTED_FEATURE,
            ErrorType::UNKNOWN_ERROR,
        ];
        for status in statuses {
            let err = UdoError::from_status(status, "ctx").expect("error status");
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn no_error_is_ok() {
        assert!(ErrorType::NO_ERROR.into_result("ctx").is_ok());
        assert!(UdoError::from_status(ErrorType::NO_ERROR, "ctx").is_none());
    }

    #[test]
    fn unknown_codes_collapse_to_unknown_error() {
        let err = ErrorType(0x1234).into_result("probe").unwrap_err();
        assert_eq!(err.status(), ErrorType::UNKNOWN_ERROR);
        assert!(err.to_string().contains("probe"));
    }
}
