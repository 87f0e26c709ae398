use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use config::RateLimiterConfig;
use domain::{ClientId, ResourceId};
use serde::Serialize;

use crate::events::{EventSink, RateEvent, RateEventKind, RateState, SubscriptionId};

/// 双向订阅索引
///
/// `id` 记录客户端订阅的资源，`to` 记录资源上的客户端，两者始终对称。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resources {
    pub id: HashMap<ClientId, HashSet<ResourceId>>,
    pub to: HashMap<ResourceId, HashSet<ClientId>>,
}

/// 订阅限流器
/// 限制单个客户端同时订阅的资源数量，防止单个连接拖垮服务器
#[derive(Debug)]
pub struct RateLimiter {
    /// 每客户端最大订阅数
    limit: usize,
    resources: Resources,
    events: EventSink<RateEvent>,
}

impl RateLimiter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            resources: Resources::default(),
            events: EventSink::new(),
        }
    }

    pub fn from_config(config: &RateLimiterConfig) -> Self {
        Self::new(config.limit)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 尝试接纳新的 (客户端, 资源) 订阅
    ///
    /// 已存在的组合直接返回 `false` 且没有任何副作用；
    /// 超过上限时发出 `rate:limit` 并返回 `false`。
    pub fn add(&mut self, id: &ClientId, to: &ResourceId) -> bool {
        if !self.is_new_resource(id, to) {
            return false;
        }

        if self.is_above_limit(id) {
            let state = self.state_for(Some(id), Some(to));
            tracing::warn!(
                client_id = %id,
                resource = %to,
                limit = state.limit,
                count = state.count,
                "rate limiting client"
            );
            self.emit(RateEventKind::Limit, state);
            return false;
        }

        self.resources
            .id
            .entry(id.clone())
            .or_default()
            .insert(to.clone());
        self.resources
            .to
            .entry(to.clone())
            .or_default()
            .insert(id.clone());

        let state = self.state_for(Some(id), Some(to));
        self.emit(RateEventKind::Add, state);
        true
    }

    /// 移除 (客户端, 资源) 订阅，不存在时不做任何事
    pub fn remove(&mut self, id: &ClientId, to: &ResourceId) {
        let present = self
            .resources
            .id
            .get(id)
            .is_some_and(|resources| resources.contains(to))
            && self
                .resources
                .to
                .get(to)
                .is_some_and(|clients| clients.contains(id));
        if !present {
            return;
        }

        remove_member(&mut self.resources.id, id, to);
        remove_member(&mut self.resources.to, to, id);

        let state = self.state_for(Some(id), Some(to));
        self.emit(RateEventKind::Remove, state);
    }

    /// 检查是否已达到上限
    pub fn is_above_limit(&self, id: &ClientId) -> bool {
        self.count(id) >= self.limit
    }

    /// 客户端当前订阅的资源数，未知客户端为 0
    pub fn count(&self, id: &ClientId) -> usize {
        self.resources.id.get(id).map_or(0, HashSet::len)
    }

    /// 资源上当前的客户端数
    pub fn count_to(&self, to: &ResourceId) -> usize {
        self.resources.to.get(to).map_or(0, HashSet::len)
    }

    /// 所有已知客户端的订阅数
    pub fn count_all(&self) -> HashMap<ClientId, usize> {
        self.resources
            .id
            .iter()
            .map(|(id, resources)| (id.clone(), resources.len()))
            .collect()
    }

    /// 移除客户端的全部订阅（客户端断开时调用）
    pub fn remove_by_id(&mut self, id: &ClientId) {
        let state = self.state_for(Some(id), None);
        self.emit(RateEventKind::RemoveById, state);

        if let Some(resources) = self.resources.id.remove(id) {
            for to in &resources {
                remove_member(&mut self.resources.to, to, id);
            }
        }
    }

    /// 移除资源上的全部订阅（资源销毁时调用）
    pub fn remove_by_to(&mut self, to: &ResourceId) {
        let state = self.state_for(None, Some(to));
        self.emit(RateEventKind::RemoveByTo, state);

        if let Some(clients) = self.resources.to.remove(to) {
            for id in &clients {
                remove_member(&mut self.resources.id, id, to);
            }
        }
    }

    /// 只读的索引视图，用于诊断
    pub fn inspect(&self) -> &Resources {
        &self.resources
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: Fn(&RateEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    /// 只订阅某一类事件
    pub fn on<F>(&mut self, kind: RateEventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&RateState) + Send + Sync + 'static,
    {
        self.events.subscribe(move |event: &RateEvent| {
            if event.kind == kind {
                handler(&event.state);
            }
        })
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    fn is_new_resource(&self, id: &ClientId, to: &ResourceId) -> bool {
        !self
            .resources
            .id
            .get(id)
            .is_some_and(|resources| resources.contains(to))
    }

    fn state_for(&self, id: Option<&ClientId>, to: Option<&ResourceId>) -> RateState {
        RateState {
            id: id.cloned(),
            to: to.cloned(),
            limit: self.limit,
            count: id.map_or(0, |id| self.count(id)),
        }
    }

    fn emit(&self, kind: RateEventKind, state: RateState) {
        self.events.emit(&RateEvent { kind, state });
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimiterConfig::default())
    }
}

// 从集合中移除成员，集合为空时连同键一起移除
fn remove_member<K, V>(index: &mut HashMap<K, HashSet<V>>, key: &K, member: &V)
where
    K: Eq + Hash,
    V: Eq + Hash,
{
    if let Some(members) = index.get_mut(key) {
        members.remove(member);
        if members.is_empty() {
            index.remove(key);
        }
    }
}
