/// Domain-specific error types for the rocket engine.
/// All external failures must be handled. The engine must:
/// - Continue running on recoverable errors (feed loss, bad input)
/// - Reject invalid financial input at the boundary, never mid-frame
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("spot feed error: {0}")]
    Feed(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid contract: {0}")]
    InvalidContract(String),

    #[error("import rejected: {0}")]
    Import(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
