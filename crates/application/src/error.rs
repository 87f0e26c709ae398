use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("sentry sweep failed: {0}")]
    Sweep(String),
    #[error("telemetry error: {0}")]
    Telemetry(String),
}

impl ApplicationError {
    pub fn sweep(message: impl Into<String>) -> Self {
        ApplicationError::Sweep(message.into())
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        ApplicationError::Telemetry(message.into())
    }
}

/// 应用层结果类型
pub type ApplicationResult<T> = Result<T, ApplicationError>;
