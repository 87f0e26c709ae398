use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// 基于字符串的不透明标识。
///
/// 传输层给出的标识原样保存；只有 `parse` 会拒绝空白值。
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// 校验后创建，空白字符串返回错误。
            pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(DomainError::invalid_identifier($kind, value));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// 客户端（单个连接/会话）唯一标识。
    ClientId,
    "客户端"
);

string_id!(
    /// 用户唯一标识，一个用户可以同时拥有多个客户端。
    UserId,
    "用户"
);

string_id!(
    /// 资源（作用域）路径，例如 `presence:/account/ticket/1`。
    ResourceId,
    "资源"
);

string_id!(
    /// 负责客户端连接的服务器实例标识。
    SentryId,
    "哨兵"
);

string_id!(
    /// 用户类型，由调用方定义，核心不解释其含义。
    UserType,
    "用户类型"
);
