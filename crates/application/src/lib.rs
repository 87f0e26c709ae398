//! 在线状态与订阅限流核心。
//!
//! 这里提供按作用域的在线状态存储、服务器实例下线时的哨兵扫描，
//! 以及限制单个客户端订阅数量的双向索引限流器。
//! 所有状态变化通过同步事件分发给观察者。

pub mod error;
pub mod events;
pub mod presence;
pub mod rate_limiter;
pub mod telemetry;

pub use error::{ApplicationError, ApplicationResult};
pub use events::{
    EventHandler, EventSink, PresenceEvent, PresenceEventKind, RateEvent, RateEventKind,
    RateState, SubscriptionId,
};
pub use presence::{
    spawn_sentry_sweep, PresenceRegistry, PresenceSnapshot, PresenceStore, SentrySweep,
    SharedPresenceStore, StoreHook, SweepHandle, SweepReport, SweepStep, UserPresence,
};
pub use rate_limiter::{RateLimiter, Resources};
pub use telemetry::init_tracing;
