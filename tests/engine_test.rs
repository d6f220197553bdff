mod common;

use common::{ScriptedTool, POOL};
use landlord::{LandlordEngine, LandlordError, MemoryStore, Settings};
use std::path::PathBuf;

fn settings() -> Settings {
    Settings {
        tool_path: PathBuf::from("/opt/landlord/manager"),
        use_sudo: false,
        store_url: "redis://127.0.0.1:6380".to_string(),
        store_password: "landlord".to_string(),
        pool: POOL,
        listen_port: 8080,
        log_path: PathBuf::from("srv.log"),
    }
}

#[tokio::test]
async fn test_engine_stops_when_store_is_unreachable() {
    let store = MemoryStore::new();
    store.set_offline(true);
    let engine = LandlordEngine::new(store, ScriptedTool::exiting(0), settings());

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, LandlordError::Store { .. }));
}

#[tokio::test]
async fn test_engine_prepares_pool_before_serving() {
    let store = MemoryStore::new();
    let engine = LandlordEngine::new(store.clone(), ScriptedTool::exiting(0), settings());

    let running = tokio::spawn(async move { engine.run().await });
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    assert_eq!(
        store.int_members("landlord:ports:possible"),
        vec![7000, 7001, 7002]
    );
    running.abort();
}
