use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use domain::{ClientId, ResourceId, SentryId};
use tokio::sync::RwLock;

use super::store::{PresenceStore, SharedPresenceStore};
use super::sweep::SweepHandle;

/// 新建存储时的钩子，用于在任何事件发出之前挂上观察者
pub type StoreHook = Arc<dyn Fn(&mut PresenceStore) + Send + Sync>;

/// 按作用域管理在线状态存储
///
/// 作用域首次订阅时创建存储，提交状态和暂存区都为空时由调用方丢弃。
/// 服务器实例下线时通过 [`sweep_sentry`](Self::sweep_sentry) 扫描所有活跃存储。
#[derive(Default)]
pub struct PresenceRegistry {
    stores: RwLock<HashMap<ResourceId, SharedPresenceStore>>,
    on_create: Option<StoreHook>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_create<F>(hook: F) -> Self
    where
        F: Fn(&mut PresenceStore) + Send + Sync + 'static,
    {
        Self {
            stores: RwLock::new(HashMap::new()),
            on_create: Some(Arc::new(hook)),
        }
    }

    /// 获取作用域的存储，不存在时创建
    pub async fn store(&self, scope: &ResourceId) -> SharedPresenceStore {
        if let Some(store) = self.stores.read().await.get(scope) {
            return store.clone();
        }

        let mut stores = self.stores.write().await;
        stores
            .entry(scope.clone())
            .or_insert_with(|| {
                tracing::debug!(scope = %scope, "creating presence store");
                let mut store = PresenceStore::new(scope.clone());
                if let Some(hook) = &self.on_create {
                    hook(&mut store);
                }
                store.into_shared()
            })
            .clone()
    }

    pub async fn get(&self, scope: &ResourceId) -> Option<SharedPresenceStore> {
        self.stores.read().await.get(scope).cloned()
    }

    pub async fn scopes(&self) -> Vec<ResourceId> {
        self.stores.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.stores.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.stores.read().await.is_empty()
    }

    /// 存储为空时将其丢弃，返回是否已丢弃
    ///
    /// 持有注册表写锁期间不等待存储锁；存储正被使用时视为非空。
    pub async fn discard_if_empty(&self, scope: &ResourceId) -> bool {
        let mut stores = self.stores.write().await;
        let Some(store) = stores.get(scope) else {
            return false;
        };

        let busy_or_used = match store.try_lock() {
            Ok(guard) => !guard.is_empty(),
            Err(_) => true,
        };
        if busy_or_used {
            return false;
        }

        stores.remove(scope);
        tracing::debug!(scope = %scope, "discarded empty presence store");
        true
    }

    /// 在每个活跃存储上启动哨兵扫描
    ///
    /// 回调收到作用域和匹配的客户端，返回每个作用域的扫描句柄。
    pub async fn sweep_sentry<F>(
        &self,
        sentry: &SentryId,
        callback: F,
    ) -> Vec<(ResourceId, SweepHandle)>
    where
        F: Fn(&ResourceId, ClientId) + Send + Sync + 'static,
    {
        let stores: Vec<(ResourceId, SharedPresenceStore)> = self
            .stores
            .read()
            .await
            .iter()
            .map(|(scope, store)| (scope.clone(), store.clone()))
            .collect();

        tracing::info!(
            sentry = %sentry,
            scopes = stores.len(),
            "sweeping presence stores for sentry"
        );

        let callback = Arc::new(callback);
        let mut handles = Vec::with_capacity(stores.len());
        for (scope, store) in stores {
            let callback = callback.clone();
            let callback_scope = scope.clone();
            let handle = PresenceStore::clients_for_sentry(
                &store,
                sentry.clone(),
                move |client_id| callback(&callback_scope, client_id),
            )
            .await;
            handles.push((scope, handle));
        }
        handles
    }
}

impl fmt::Debug for PresenceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenceRegistry")
            .field("on_create", &self.on_create.is_some())
            .finish_non_exhaustive()
    }
}
