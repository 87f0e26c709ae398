use config::LoggingConfig;
use tracing_subscriber::EnvFilter;

use crate::error::{ApplicationError, ApplicationResult};

/// 初始化全局日志订阅器
///
/// `RUST_LOG` 存在时优先使用，否则使用配置中的过滤指令。
/// 订阅器已经安装时返回错误，宿主可以忽略。
pub fn init_tracing(config: &LoggingConfig) -> ApplicationResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| ApplicationError::telemetry(format!("invalid log filter: {e}")))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| ApplicationError::telemetry(e.to_string()))
}
