//! 在线状态核心领域模型
//!
//! 包含客户端、用户、资源、哨兵等标识类型，以及随订阅提交的在线状态数据。

pub mod errors;
pub mod presence_data;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use presence_data::*;
pub use value_objects::*;
