//! 在线状态核心配置
//!
//! 提供限流器和日志的配置，加载顺序：
//! - 内置默认值
//! - 可选配置文件（`PRESENCE_CONFIG_FILE`，按扩展名识别 YAML/TOML/JSON）
//! - 环境变量（`PRESENCE_` 前缀，`__` 表示嵌套，如 `PRESENCE_RATE_LIMITER__LIMIT`）

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// 配置文件路径环境变量
pub const CONFIG_FILE_ENV: &str = "PRESENCE_CONFIG_FILE";

/// 环境变量前缀
pub const ENV_PREFIX: &str = "PRESENCE_";

/// 每个客户端默认允许订阅的资源数
pub const DEFAULT_SUBSCRIPTION_LIMIT: usize = 5000;

/// 核心配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// 订阅限流配置
    #[serde(default)]
    pub rate_limiter: RateLimiterConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 订阅限流配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// 单个客户端可同时订阅的资源上限，0 表示拒绝所有新订阅
    pub limit: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SUBSCRIPTION_LIMIT,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` 指令，`RUST_LOG` 存在时由宿主优先使用
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl CoreConfig {
    /// 按默认值 -> 配置文件 -> 环境变量的顺序加载并校验
    pub fn load() -> Result<Self, ConfigError> {
        let config: CoreConfig = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// 构建配置源，宿主可以在此基础上继续合并自己的配置源
    pub fn figment() -> Figment {
        let mut fig = Figment::from(Serialized::defaults(CoreConfig::default()));

        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }

        fig.merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["config_file"])
                .split("__"),
        )
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "logging.filter cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(Box<figment::Error>),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        ConfigError::Load(Box::new(value))
    }
}
