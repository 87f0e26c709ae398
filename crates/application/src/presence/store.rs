use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use domain::{ClientId, PresenceData, ResourceId, SentryId, UserId, UserType};
use serde::Serialize;
use tokio::sync::Mutex;

use super::sweep::{spawn_sentry_sweep, SentrySweep, SweepHandle};
use crate::events::{EventSink, PresenceEvent, PresenceEventKind, SubscriptionId};

/// 多线程宿主共享的在线状态存储，一把锁覆盖每次读-改-写
pub type SharedPresenceStore = Arc<Mutex<PresenceStore>>;

/// 单个作用域的在线状态存储
///
/// 维护 `用户 -> 客户端 -> 数据` 映射、`客户端 -> 用户` 反向索引、
/// 用户类型索引，以及订阅握手完成前使用的暂存区。
/// 所有修改在变更完成后按文档顺序同步发出事件。
#[derive(Debug)]
pub struct PresenceStore {
    scope: ResourceId,
    map: HashMap<UserId, HashMap<ClientId, PresenceData>>,
    client_user_map: HashMap<ClientId, UserId>,
    user_types: HashMap<UserId, UserType>,
    cache: HashMap<ClientId, PresenceData>,
    events: EventSink<PresenceEvent>,
}

impl PresenceStore {
    pub fn new(scope: impl Into<ResourceId>) -> Self {
        Self {
            scope: scope.into(),
            map: HashMap::new(),
            client_user_map: HashMap::new(),
            user_types: HashMap::new(),
            cache: HashMap::new(),
            events: EventSink::new(),
        }
    }

    pub fn into_shared(self) -> SharedPresenceStore {
        Arc::new(Mutex::new(self))
    }

    pub fn scope(&self) -> &ResourceId {
        &self.scope
    }

    /// 暂存客户端数据但不提交，覆盖已有的暂存值
    pub fn cache_add(&mut self, client_id: ClientId, data: PresenceData) {
        self.cache.insert(client_id, data);
    }

    /// 取出并删除暂存值
    pub fn cache_remove(&mut self, client_id: &ClientId) -> Option<PresenceData> {
        self.cache.remove(client_id)
    }

    pub fn cache_get(&self, client_id: &ClientId) -> Option<&PresenceData> {
        self.cache.get(client_id)
    }

    /// 提交在线状态
    ///
    /// 新用户发出 `user_added`，新客户端发出 `client_added`，
    /// 重复提交同一组合不产生任何变化。
    /// 客户端若仍挂在另一个用户下，会先按 [`remove`](Self::remove) 的语义从原用户移除：
    /// `client_removed`/`user_removed` 先于本次的新增事件发出，负载为原用户下保存的数据。
    pub fn add(
        &mut self,
        client_id: ClientId,
        user_id: UserId,
        user_type: UserType,
        data: PresenceData,
    ) {
        tracing::debug!(
            scope = %self.scope,
            user_id = %user_id,
            client_id = %client_id,
            sentry = %data.sentry,
            "presence store add"
        );
        self.cache.remove(&client_id);

        if let Some(previous) = self
            .client_user_map
            .get(&client_id)
            .filter(|owner| **owner != user_id)
            .cloned()
        {
            tracing::debug!(
                scope = %self.scope,
                client_id = %client_id,
                from = %previous,
                to = %user_id,
                "client changed user"
            );
            let previous_data = self
                .get(&client_id, &previous)
                .cloned()
                .unwrap_or_else(|| data.clone());
            self.remove(&client_id, &previous, previous_data);
        }

        let mut events = Vec::with_capacity(2);
        let clients = match self.map.entry(user_id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                events.push(PresenceEventKind::UserAdded);
                self.user_types.insert(user_id.clone(), user_type);
                entry.insert(HashMap::new())
            }
        };

        if let Entry::Vacant(entry) = clients.entry(client_id.clone()) {
            entry.insert(data.clone());
            self.client_user_map.insert(client_id, user_id);
            events.push(PresenceEventKind::ClientAdded);
        }

        self.emit_all(&events, &data);
    }

    /// 移除在线状态，组合不存在时不做任何事
    ///
    /// 用户的最后一个客户端被移除时，用户及其类型一起删除。
    pub fn remove(&mut self, client_id: &ClientId, user_id: &UserId, data: PresenceData) {
        tracing::debug!(
            scope = %self.scope,
            user_id = %user_id,
            client_id = %client_id,
            "presence store remove"
        );
        self.cache.remove(client_id);

        let Some(clients) = self.map.get_mut(user_id) else {
            return;
        };
        if clients.remove(client_id).is_none() {
            return;
        }
        let user_empty = clients.is_empty();

        let mut events = vec![PresenceEventKind::ClientRemoved];
        self.client_user_map.remove(client_id);

        if user_empty {
            self.map.remove(user_id);
            self.user_types.remove(user_id);
            events.push(PresenceEventKind::UserRemoved);
        }

        self.emit_all(&events, &data);
    }

    /// 按反向索引移除客户端
    ///
    /// 不会删除因此变空的用户，调用方需要再调用 [`remove_user_if_empty`](Self::remove_user_if_empty)。
    pub fn remove_client(&mut self, client_id: &ClientId, data: PresenceData) {
        self.cache.remove(client_id);

        let Some(user_id) = self.client_user_map.remove(client_id) else {
            tracing::warn!(
                scope = %self.scope,
                client_id = %client_id,
                "presence store remove_client: cannot find data for client"
            );
            return;
        };

        tracing::debug!(
            scope = %self.scope,
            user_id = %user_id,
            client_id = %client_id,
            "presence store remove_client"
        );
        if let Some(clients) = self.map.get_mut(&user_id) {
            clients.remove(client_id);
        }

        self.emit(PresenceEventKind::ClientRemoved, &data);
    }

    /// 用户存在且没有客户端时删除该用户
    pub fn remove_user_if_empty(&mut self, user_id: &UserId, data: PresenceData) {
        if !self.user_empty(user_id) {
            return;
        }

        tracing::debug!(
            scope = %self.scope,
            user_id = %user_id,
            "presence store remove_user_if_empty"
        );
        self.map.remove(user_id);
        self.user_types.remove(user_id);
        self.emit(PresenceEventKind::UserRemoved, &data);
    }

    pub fn user_of(&self, client_id: &ClientId) -> Option<&UserId> {
        self.client_user_map.get(client_id)
    }

    pub fn get(&self, client_id: &ClientId, user_id: &UserId) -> Option<&PresenceData> {
        self.map.get(user_id)?.get(client_id)
    }

    /// 当前用户列表快照
    pub fn users(&self) -> Vec<UserId> {
        self.map.keys().cloned().collect()
    }

    /// 用户的客户端列表快照，未知用户返回空列表
    pub fn clients(&self, user_id: &UserId) -> Vec<ClientId> {
        self.map
            .get(user_id)
            .map(|clients| clients.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn user_type_of(&self, user_id: &UserId) -> Option<&UserType> {
        self.user_types.get(user_id)
    }

    pub fn user_exists(&self, user_id: &UserId) -> bool {
        self.map.contains_key(user_id)
    }

    /// 用户存在但没有任何客户端
    pub fn user_empty(&self, user_id: &UserId) -> bool {
        self.map
            .get(user_id)
            .is_some_and(|clients| clients.is_empty())
    }

    pub fn for_each_client<F>(&self, mut callback: F)
    where
        F: FnMut(&UserId, &ClientId, &PresenceData),
    {
        for (user_id, clients) in &self.map {
            for (client_id, data) in clients {
                callback(user_id, client_id, data);
            }
        }
    }

    pub fn client_count(&self) -> usize {
        self.client_user_map.len()
    }

    /// 已提交状态和暂存区都为空，所有者可以丢弃该存储
    pub fn is_empty(&self) -> bool {
        self.map.is_empty() && self.cache.is_empty()
    }

    /// 用于状态查询响应的快照
    pub fn snapshot(&self) -> PresenceSnapshot {
        let users = self
            .map
            .iter()
            .map(|(user_id, clients)| {
                let user = UserPresence {
                    user_type: self.user_types.get(user_id).cloned(),
                    clients: clients
                        .iter()
                        .map(|(client_id, data)| (client_id.clone(), data.clone()))
                        .collect(),
                };
                (user_id.clone(), user)
            })
            .collect();

        PresenceSnapshot {
            scope: self.scope.clone(),
            users,
        }
    }

    /// 创建逐步推进的哨兵扫描游标，由调用方驱动
    pub fn sentry_sweep(&self, sentry: SentryId) -> SentrySweep {
        SentrySweep::new(self, sentry)
    }

    /// 在后台任务中查找归属于 `sentry` 的所有客户端
    ///
    /// 用户快照在返回之前取得，之后加入的用户不会被报告。
    /// 每一步只处理一个客户端并让出调度，回调在释放锁之后调用。
    /// 通过返回的 [`SweepHandle`] 等待完成或取消。调用方不能持有 `store` 的锁，
    /// 已持锁时改用 [`sentry_sweep`](Self::sentry_sweep) 加 [`spawn_sentry_sweep`]。
    pub async fn clients_for_sentry<F>(
        store: &SharedPresenceStore,
        sentry: SentryId,
        callback: F,
    ) -> SweepHandle
    where
        F: FnMut(ClientId) + Send + 'static,
    {
        let sweep = store.lock().await.sentry_sweep(sentry);
        spawn_sentry_sweep(store.clone(), sweep, callback)
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: Fn(&PresenceEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    /// 只订阅某一类事件，处理函数收到事件负载
    pub fn on<F>(&mut self, kind: PresenceEventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&PresenceData) + Send + Sync + 'static,
    {
        self.events.subscribe(move |event: &PresenceEvent| {
            if event.kind == kind {
                handler(&event.data);
            }
        })
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    fn emit_all(&self, kinds: &[PresenceEventKind], data: &PresenceData) {
        for kind in kinds {
            self.emit(*kind, data);
        }
    }

    fn emit(&self, kind: PresenceEventKind, data: &PresenceData) {
        tracing::debug!(scope = %self.scope, event = %kind, "presence store emit");
        self.events.emit(&PresenceEvent {
            scope: self.scope.clone(),
            kind,
            data: data.clone(),
        });
    }
}

/// 作用域在线状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceSnapshot {
    pub scope: ResourceId,
    pub users: BTreeMap<UserId, UserPresence>,
}

/// 单个用户的在线状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserPresence {
    #[serde(rename = "userType")]
    pub user_type: Option<UserType>,
    pub clients: BTreeMap<ClientId, PresenceData>,
}
