//! 集成测试公共工具

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use application::{PresenceEvent, PresenceEventKind, PresenceStore};
use config::LoggingConfig;
use domain::{ClientId, PresenceData, UserId};

static TRACING: Once = Once::new();

/// 初始化测试日志，`RUST_LOG` 可覆盖默认的 warn 级别
pub fn init_tracing() {
    TRACING.call_once(|| {
        let config = LoggingConfig {
            filter: "warn".to_string(),
        };
        let _ = application::init_tracing(&config);
    });
}

/// 按 (用户, 客户端, 哨兵) 批量提交在线状态
pub fn populate(store: &mut PresenceStore, entries: &[(&str, &str, &str)]) {
    for (user, client, sentry) in entries {
        store.add(
            ClientId::from(*client),
            UserId::from(*user),
            "human".into(),
            PresenceData::new(*sentry),
        );
    }
}

/// 记录存储发出的事件类型
pub fn record_events(store: &mut PresenceStore) -> Arc<Mutex<Vec<PresenceEventKind>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    store.subscribe(move |event: &PresenceEvent| sink.lock().unwrap().push(event.kind));
    events
}

/// 校验存储的三个索引互相一致
pub fn assert_store_consistent(store: &PresenceStore) {
    for user_id in store.users() {
        let clients = store.clients(&user_id);
        assert!(!clients.is_empty(), "user {user_id} left without clients");
        assert!(store.user_type_of(&user_id).is_some());
        for client_id in clients {
            assert_eq!(store.user_of(&client_id), Some(&user_id));
            assert!(store.get(&client_id, &user_id).is_some());
        }
    }
}
