//! 哨兵扫描
//!
//! 服务器实例下线时，需要找出每个作用域中归属于该实例的所有客户端。
//! 这是唯一与客户端总数成正比的操作，因此拆成单客户端的小步：
//! [`SentrySweep`] 是显式游标，[`spawn_sentry_sweep`] 在后台任务中逐步推进，
//! 每步之后让出调度，使同一存储上的其他操作可以穿插执行。
//!
//! 游标基于创建时的用户键快照，因此必须在发起扫描的那一刻持锁创建，
//! 之后新增的用户不会被访问；每个用户的客户端键在首次访问该用户时才抓取。
//! 数据在每一步重新读取，期间被移除的客户端会被跳过。

use domain::{ClientId, ResourceId, SentryId, UserId};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::store::{PresenceStore, SharedPresenceStore};
use crate::error::{ApplicationError, ApplicationResult};

/// 单步结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepStep {
    /// 当前客户端属于目标哨兵
    Matched(ClientId),
    /// 当前客户端不属于目标哨兵，或已被移除
    Skipped,
    /// 当前用户的客户端已处理完，切换到下一个用户
    NextUser,
    /// 所有用户都已处理完
    Done,
}

/// 扫描结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub sentry: SentryId,
    /// 已检查的客户端数
    pub visited: usize,
    /// 匹配的客户端数
    pub matched: usize,
    /// 扫描是否在完成前被取消
    pub cancelled: bool,
}

/// 哨兵扫描游标
#[derive(Debug, Clone)]
pub struct SentrySweep {
    scope: ResourceId,
    sentry: SentryId,
    user_ids: Vec<UserId>,
    user_index: usize,
    // None 表示当前用户的客户端列表尚未抓取
    client_ids: Option<Vec<ClientId>>,
    client_index: usize,
    visited: usize,
    matched: usize,
}

impl SentrySweep {
    pub fn new(store: &PresenceStore, sentry: SentryId) -> Self {
        Self {
            scope: store.scope().clone(),
            sentry,
            user_ids: store.users(),
            user_index: 0,
            client_ids: None,
            client_index: 0,
            visited: 0,
            matched: 0,
        }
    }

    pub fn scope(&self) -> &ResourceId {
        &self.scope
    }

    pub fn sentry(&self) -> &SentryId {
        &self.sentry
    }

    /// 快照中的用户数
    pub fn user_count(&self) -> usize {
        self.user_ids.len()
    }

    pub fn is_done(&self) -> bool {
        self.user_index >= self.user_ids.len()
    }

    /// 推进一个游标位置
    pub fn step(&mut self, store: &PresenceStore) -> SweepStep {
        let Some(user_id) = self.user_ids.get(self.user_index) else {
            return SweepStep::Done;
        };

        let client_ids = self
            .client_ids
            .get_or_insert_with(|| store.clients(user_id));

        let Some(client_id) = client_ids.get(self.client_index) else {
            self.user_index += 1;
            self.client_index = 0;
            self.client_ids = None;
            return SweepStep::NextUser;
        };

        self.client_index += 1;
        self.visited += 1;

        match store.get(client_id, user_id) {
            Some(data) if data.is_owned_by(&self.sentry) => {
                self.matched += 1;
                SweepStep::Matched(client_id.clone())
            }
            _ => SweepStep::Skipped,
        }
    }

    /// 同步执行剩余的全部步骤，适用于自带调度的宿主和测试
    pub fn drain<F>(&mut self, store: &PresenceStore, mut callback: F) -> SweepReport
    where
        F: FnMut(&ClientId),
    {
        loop {
            match self.step(store) {
                SweepStep::Matched(client_id) => callback(&client_id),
                SweepStep::Done => return self.report(false),
                SweepStep::Skipped | SweepStep::NextUser => {}
            }
        }
    }

    pub fn report(&self, cancelled: bool) -> SweepReport {
        SweepReport {
            sentry: self.sentry.clone(),
            visited: self.visited,
            matched: self.matched,
            cancelled,
        }
    }
}

/// 后台扫描句柄
///
/// 丢弃句柄默认不会取消扫描；需要时使用 [`cancel_on_drop`](Self::cancel_on_drop)。
#[derive(Debug)]
pub struct SweepHandle {
    token: CancellationToken,
    join: Option<JoinHandle<SweepReport>>,
    cancel_on_drop: bool,
}

impl SweepHandle {
    /// 在下一步之前停止扫描，之后不再调用回调
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel_on_drop(mut self) -> Self {
        self.cancel_on_drop = true;
        self
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// 等待扫描结束
    pub async fn finished(mut self) -> ApplicationResult<SweepReport> {
        let Some(join) = self.join.take() else {
            return Err(ApplicationError::sweep("sweep result already taken"));
        };
        join.await
            .map_err(|err| ApplicationError::sweep(err.to_string()))
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        if self.cancel_on_drop {
            self.token.cancel();
        }
    }
}

/// 在后台推进已创建的哨兵扫描游标
///
/// `sweep` 应在调用方持有 `store` 锁时通过 [`PresenceStore::sentry_sweep`] 创建。
/// 每一步只持有存储锁处理一个客户端，释放锁后调用回调，然后让出调度。
pub fn spawn_sentry_sweep<F>(
    store: SharedPresenceStore,
    mut sweep: SentrySweep,
    mut callback: F,
) -> SweepHandle
where
    F: FnMut(ClientId) + Send + 'static,
{
    let token = CancellationToken::new();
    let cancelled = token.clone();
    let scope = sweep.scope().clone();

    let join = tokio::spawn(async move {
        tracing::info!(
            scope = %scope,
            sentry = %sweep.sentry(),
            users = sweep.user_count(),
            "sentry sweep started"
        );

        let report = loop {
            let step = tokio::select! {
                biased;
                _ = cancelled.cancelled() => break sweep.report(true),
                guard = store.lock() => sweep.step(&guard),
            };

            match step {
                SweepStep::Matched(client_id) => callback(client_id),
                SweepStep::Done => break sweep.report(false),
                SweepStep::Skipped | SweepStep::NextUser => {}
            }

            tokio::task::yield_now().await;
        };

        tracing::info!(
            scope = %scope,
            sentry = %report.sentry,
            visited = report.visited,
            matched = report.matched,
            cancelled = report.cancelled,
            "sentry sweep finished"
        );
        report
    });

    SweepHandle {
        token,
        join: Some(join),
        cancel_on_drop: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::PresenceData;

    fn store_with(entries: &[(&str, &str, &str)]) -> PresenceStore {
        let mut store = PresenceStore::new("presence:/scope");
        for (user, client, sentry) in entries {
            store.add(
                ClientId::from(*client),
                UserId::from(*user),
                "human".into(),
                PresenceData::new(*sentry),
            );
        }
        store
    }

    fn drain_sorted(sweep: &mut SentrySweep, store: &PresenceStore) -> Vec<ClientId> {
        let mut found = Vec::new();
        sweep.drain(store, |client_id| found.push(client_id.clone()));
        found.sort();
        found
    }

    #[test]
    fn test_sweep_finds_only_matching_sentry() {
        let store = store_with(&[
            ("u1", "c1", "sentryA"),
            ("u1", "c2", "sentryB"),
            ("u2", "c3", "sentryA"),
            ("u3", "c4", "sentryC"),
        ]);

        let mut sweep = store.sentry_sweep("sentryA".into());
        let found = drain_sorted(&mut sweep, &store);

        assert_eq!(found, vec![ClientId::from("c1"), ClientId::from("c3")]);
        assert!(sweep.is_done());
        assert_eq!(
            sweep.report(false),
            SweepReport {
                sentry: "sentryA".into(),
                visited: 4,
                matched: 2,
                cancelled: false,
            }
        );
    }

    #[test]
    fn test_one_client_per_step() {
        let store = store_with(&[("u1", "c1", "A")]);
        let mut sweep = store.sentry_sweep("A".into());

        assert_eq!(sweep.step(&store), SweepStep::Matched("c1".into()));
        assert_eq!(sweep.step(&store), SweepStep::NextUser);
        assert_eq!(sweep.step(&store), SweepStep::Done);
        assert_eq!(sweep.step(&store), SweepStep::Done);
    }

    #[test]
    fn test_empty_store() {
        let store = PresenceStore::new("scope");
        let mut sweep = store.sentry_sweep("A".into());
        assert!(sweep.is_done());
        assert_eq!(sweep.step(&store), SweepStep::Done);
    }

    #[test]
    fn test_client_list_captured_on_first_visit() {
        let mut store = store_with(&[("u1", "c1", "A")]);
        let mut sweep = store.sentry_sweep("A".into());

        // 首次访问之前加入的客户端会被看到
        store.add("c2".into(), "u1".into(), "human".into(), PresenceData::new("A"));
        // 快照之后出现的新用户不会被访问
        store.add("c3".into(), "u2".into(), "human".into(), PresenceData::new("A"));

        let found = drain_sorted(&mut sweep, &store);
        assert_eq!(found, vec![ClientId::from("c1"), ClientId::from("c2")]);
    }

    #[test]
    fn test_client_added_after_capture_is_not_seen() {
        let mut store = store_with(&[("u1", "c1", "A")]);
        let mut sweep = store.sentry_sweep("A".into());

        assert_eq!(sweep.step(&store), SweepStep::Matched("c1".into()));
        store.add("c2".into(), "u1".into(), "human".into(), PresenceData::new("A"));

        assert_eq!(sweep.step(&store), SweepStep::NextUser);
        assert_eq!(sweep.step(&store), SweepStep::Done);
    }

    #[test]
    fn test_tolerates_removal_between_steps() {
        let mut store = store_with(&[("u1", "c1", "A"), ("u1", "c2", "A"), ("u2", "c3", "A")]);
        let mut sweep = store.sentry_sweep("A".into());

        // 整个用户在访问前被移除
        store.remove(&"c3".into(), &"u2".into(), PresenceData::new("A"));

        let first = match sweep.step(&store) {
            SweepStep::Matched(client_id) => client_id,
            SweepStep::NextUser => match sweep.step(&store) {
                SweepStep::Matched(client_id) => client_id,
                other => panic!("unexpected step {other:?}"),
            },
            other => panic!("unexpected step {other:?}"),
        };
        assert_ne!(first, ClientId::from("c3"));

        // 已抓取但尚未访问的客户端被移除后跳过
        let other: ClientId = if first == ClientId::from("c1") {
            "c2".into()
        } else {
            "c1".into()
        };
        store.remove(&other, &"u1".into(), PresenceData::new("A"));

        let mut rest = Vec::new();
        sweep.drain(&store, |client_id| rest.push(client_id.clone()));
        assert!(rest.is_empty());

        let report = sweep.report(false);
        assert_eq!(report.matched, 1);
    }
}
