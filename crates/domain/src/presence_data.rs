//! 在线状态数据
//!
//! 调用方提交的客户端在线记录。`sentry` 字段是必需的，
//! 其余字段由调用方自行定义，序列化时与 `sentry` 平铺在同一个对象中。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::DomainError;
use crate::value_objects::SentryId;

/// 保留字段名
pub const SENTRY_FIELD: &str = "sentry";

/// 客户端在线状态数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceData {
    /// 当前持有该客户端连接的服务器实例
    pub sentry: SentryId,
    /// 调用方扩展字段
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PresenceData {
    pub fn new(sentry: impl Into<SentryId>) -> Self {
        Self {
            sentry: sentry.into(),
            extra: Map::new(),
        }
    }

    /// 添加扩展字段。
    ///
    /// `sentry` 是保留字段：字符串值会替换哨兵，其他类型的值被忽略。
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        if key == SENTRY_FIELD {
            if let Value::String(sentry) = value {
                self.sentry = SentryId::from(sentry);
            }
            return self;
        }
        self.extra.insert(key, value);
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn sentry(&self) -> &SentryId {
        &self.sentry
    }

    /// 判断该记录是否归属于指定的服务器实例
    pub fn is_owned_by(&self, sentry: &SentryId) -> bool {
        &self.sentry == sentry
    }

    /// 从任意 JSON 值解析，要求是带字符串 `sentry` 字段的对象
    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        let Value::Object(mut fields) = value else {
            return Err(DomainError::invalid_presence_data("expected a JSON object"));
        };

        let sentry = match fields.remove(SENTRY_FIELD) {
            Some(Value::String(sentry)) => SentryId::from(sentry),
            Some(_) => {
                return Err(DomainError::invalid_presence_data(
                    "sentry must be a string",
                ))
            }
            None => return Err(DomainError::invalid_presence_data("missing sentry field")),
        };

        Ok(Self {
            sentry,
            extra: fields,
        })
    }

    /// 转换为平铺的 JSON 对象
    pub fn to_value(&self) -> Value {
        let mut fields = self.extra.clone();
        fields.insert(
            SENTRY_FIELD.to_owned(),
            Value::String(self.sentry.as_str().to_owned()),
        );
        Value::Object(fields)
    }
}

impl TryFrom<Value> for PresenceData {
    type Error = DomainError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_flat_with_sentry() {
        let data = PresenceData::new("server-a")
            .with_field("x", 1)
            .with_field("clientVersion", "2.1.0");

        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(
            value,
            json!({"sentry": "server-a", "x": 1, "clientVersion": "2.1.0"})
        );
        assert_eq!(data.to_value(), value);

        let back: PresenceData = serde_json::from_value(value).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_with_field_treats_sentry_as_reserved() {
        let data = PresenceData::new("server-a")
            .with_field("sentry", "server-b")
            .with_field("sentry", 42);

        assert_eq!(data.sentry().as_str(), "server-b");
        assert!(data.field("sentry").is_none());
        assert!(data.extra.is_empty());
    }

    #[test]
    fn test_from_value_requires_string_sentry() {
        let ok = PresenceData::from_value(json!({"sentry": "s1", "userData": {"name": "n"}}))
            .unwrap();
        assert!(ok.is_owned_by(&SentryId::from("s1")));
        assert_eq!(ok.field("userData"), Some(&json!({"name": "n"})));

        assert!(PresenceData::from_value(json!({"x": 1})).is_err());
        assert!(PresenceData::from_value(json!({"sentry": 7})).is_err());
        assert!(PresenceData::try_from(json!("s1")).is_err());
    }
}
