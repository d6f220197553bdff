#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use landlord::config::PoolSettings;
use landlord::domain::model::Response;
use landlord::domain::ports::{
    CoordinationStore, StoreConnector, Subscription, ToolOutput, ToolRunner,
};
use landlord::{Dispatcher, MemoryStore, Result, TenantService};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Provisioning tool stand-in: the script maps the argument list to an exit code.
pub struct ScriptedTool {
    script: Box<dyn Fn(&[String]) -> i32 + Send + Sync>,
    delays: Vec<(String, Duration)>,
    pub calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl ScriptedTool {
    pub fn new(script: impl Fn(&[String]) -> i32 + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            delays: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn exiting(code: i32) -> Self {
        Self::new(move |_| code)
    }

    /// Sleeps before answering for tenant `id`.
    pub fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.push((id.to_string(), delay));
        self
    }
}

#[async_trait]
impl ToolRunner for ScriptedTool {
    async fn run(&self, args: &[String]) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push(args.to_vec());

        let delay = args.get(1).and_then(|id| {
            self.delays
                .iter()
                .find(|(slow, _)| slow == id)
                .map(|(_, delay)| *delay)
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let code = (self.script)(args);
        Ok(ToolOutput::exited(code, format!("{} -> {}", args.join(" "), code)))
    }
}

pub const POOL: PoolSettings = PoolSettings {
    tenant_port_base: 7000,
    max_tenants: 3,
};

/// Prepares the pool and serves the request channel in the background.
pub async fn start(
    store: &MemoryStore,
    tool: ScriptedTool,
) -> Dispatcher<MemoryStore, ScriptedTool> {
    let service = Arc::new(TenantService::new(store.clone(), tool));
    service.prepare_pool(&POOL).await.unwrap();

    let dispatcher = Dispatcher::new(service);
    let messages = dispatcher.listen().await.unwrap();
    let serving = dispatcher.clone();
    tokio::spawn(async move { serving.serve(messages).await });
    dispatcher
}

pub async fn reply_channel(store: &MemoryStore, reply_to: &str) -> Subscription {
    store
        .subscribe(&format!("landlord.response.{}", reply_to))
        .await
        .unwrap()
}

pub async fn send(store: &MemoryStore, payload: &str) {
    let mut conn = store.connect().await.unwrap();
    conn.publish("landlord.request", payload).await.unwrap();
}

pub async fn next_response(replies: &mut Subscription) -> Response {
    let payload = tokio::time::timeout(Duration::from_secs(5), replies.next())
        .await
        .expect("no response within 5s")
        .expect("reply channel closed");
    serde_json::from_slice(&payload).expect("response is valid JSON")
}
