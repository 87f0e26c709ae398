//! 领域模型错误定义

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 标识为空或只包含空白字符
    #[error("无效的{kind}标识: {value:?}")]
    InvalidIdentifier { kind: &'static str, value: String },

    /// 在线状态数据不符合约定（必须是带字符串 sentry 字段的对象）
    #[error("无效的在线状态数据: {message}")]
    InvalidPresenceData { message: String },
}

impl DomainError {
    /// 创建标识错误
    pub fn invalid_identifier(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            kind,
            value: value.into(),
        }
    }

    /// 创建在线状态数据错误
    pub fn invalid_presence_data(message: impl Into<String>) -> Self {
        Self::InvalidPresenceData {
            message: message.into(),
        }
    }
}

/// 领域层结果类型
pub type DomainResult<T> = Result<T, DomainError>;
