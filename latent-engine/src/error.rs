use crate::hierarchy::Endpoint;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    Cancelled,
    ComputationFailed {
        message: String,
    },
    DimensionMismatch {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },
    InvalidSchemaConfig {
        reason: String,
    },
    TimeoutExceeded {
        timeout_ms: u64,
    },
    UnknownChannel {
        from: Endpoint,
        to: Endpoint,
    },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Cancelled => write!(f, "Reasoning was cancelled by the caller"),
            EngineError::ComputationFailed { message } => {
                write!(f, "Continuous reasoning failed: {}", message)
            }
            EngineError::DimensionMismatch {
                operation,
                expected,
                actual,
            } => write!(
                f,
                "Dimension mismatch in '{}'. Expected: '{}', Actual: '{}'",
                operation, expected, actual
            ),
            EngineError::InvalidSchemaConfig { reason } => {
                write!(f, "Invalid model configuration: {}", reason)
            }
            EngineError::TimeoutExceeded { timeout_ms } => {
                write!(f, "Reasoning exceeded its timeout of {}ms", timeout_ms)
            }
            EngineError::UnknownChannel { from, to } => write!(
                f,
                "No channel from level {} stream {} to level {} stream {}",
                from.level, from.stream, to.level, to.stream
            ),
        }
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

pub(crate) fn invalid_config(reason: impl Into<String>) -> EngineError {
    EngineError::InvalidSchemaConfig {
        reason: reason.into(),
    }
}
