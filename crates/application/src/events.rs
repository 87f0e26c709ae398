//! 事件分发
//!
//! 在线状态存储和限流器通过 [`EventSink`] 发布状态变化。
//! 观察者按注册顺序同步调用，处理函数中不应执行耗时操作，
//! 否则会阻塞触发事件的调用方。

use std::fmt;
use std::sync::Arc;

use domain::{ClientId, PresenceData, ResourceId};
use serde::{Deserialize, Serialize};

/// 事件处理函数
pub type EventHandler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// 订阅句柄，用于取消订阅
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// 同步事件分发器
pub struct EventSink<E> {
    handlers: Vec<(SubscriptionId, EventHandler<E>)>,
    next_id: u64,
}

impl<E> EventSink<E> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            next_id: 0,
        }
    }

    /// 注册观察者
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Arc::new(handler)));
        id
    }

    /// 取消订阅，返回该订阅是否存在
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    /// 按注册顺序同步分发事件
    pub fn emit(&self, event: &E) {
        for (_, handler) in &self.handlers {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<E> Default for EventSink<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventSink<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// 在线状态事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceEventKind {
    UserAdded,
    ClientAdded,
    ClientRemoved,
    UserRemoved,
}

impl PresenceEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceEventKind::UserAdded => "user_added",
            PresenceEventKind::ClientAdded => "client_added",
            PresenceEventKind::ClientRemoved => "client_removed",
            PresenceEventKind::UserRemoved => "user_removed",
        }
    }
}

impl fmt::Display for PresenceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 在线状态事件，负载为触发调用传入的数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceEvent {
    pub scope: ResourceId,
    pub kind: PresenceEventKind,
    pub data: PresenceData,
}

/// 限流事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateEventKind {
    #[serde(rename = "rate:add")]
    Add,
    #[serde(rename = "rate:remove")]
    Remove,
    #[serde(rename = "rate:limit")]
    Limit,
    #[serde(rename = "rate:remove_by_id")]
    RemoveById,
    #[serde(rename = "rate:remove_by_to")]
    RemoveByTo,
}

impl RateEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateEventKind::Add => "rate:add",
            RateEventKind::Remove => "rate:remove",
            RateEventKind::Limit => "rate:limit",
            RateEventKind::RemoveById => "rate:remove_by_id",
            RateEventKind::RemoveByTo => "rate:remove_by_to",
        }
    }
}

impl fmt::Display for RateEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 限流事件负载
///
/// 按资源批量移除时没有 `id`，按客户端批量移除时没有 `to`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ClientId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<ResourceId>,
    pub limit: usize,
    pub count: usize,
}

/// 限流事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateEvent {
    pub kind: RateEventKind,
    pub state: RateState,
}
