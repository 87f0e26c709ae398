//! 作用域在线状态
//!
//! 每个作用域一个 [`PresenceStore`]，[`PresenceRegistry`] 负责创建和丢弃，
//! [`SentrySweep`] 在服务器实例下线时找出受影响的客户端。

pub mod registry;
pub mod store;
pub mod sweep;

pub use registry::{PresenceRegistry, StoreHook};
pub use store::{PresenceSnapshot, PresenceStore, SharedPresenceStore, UserPresence};
pub use sweep::{spawn_sentry_sweep, SentrySweep, SweepHandle, SweepReport, SweepStep};
