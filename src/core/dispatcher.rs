use crate::core::service::TenantService;
use crate::domain::model::{Instruction, Operation, Response};
use crate::domain::ports::{CoordinationStore, StoreConnector, Subscription, ToolRunner};
use crate::utils::error::{LandlordError, Result};
use crate::utils::validation::{is_valid_tenant_id, validate_tenant_id};
use futures::{FutureExt, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Receives instructions on the request channel and answers each on its
/// reply channel.
///
/// Decoding happens in order on the receive loop; every decoded instruction is
/// then handled on its own task, so the loop never waits for a handler. There
/// is no bound on in-flight handlers and no per-instruction timeout.
pub struct Dispatcher<S: StoreConnector, R: ToolRunner> {
    service: Arc<TenantService<S, R>>,
}

impl<S: StoreConnector, R: ToolRunner> Clone for Dispatcher<S, R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<S: StoreConnector, R: ToolRunner> Dispatcher<S, R> {
    pub fn new(service: Arc<TenantService<S, R>>) -> Self {
        Self { service }
    }

    /// Subscribes to the request channel and drains it until the
    /// subscription ends.
    pub async fn run(&self) -> Result<()> {
        let messages = self.listen().await?;
        self.serve(messages).await;
        Ok(())
    }

    pub async fn listen(&self) -> Result<Subscription> {
        let channel = self.service.keys().request_channel();
        let messages = self.service.connector().subscribe(&channel).await?;
        tracing::info!("👂 Listening for instructions on {}", channel);
        Ok(messages)
    }

    pub async fn serve(&self, mut messages: Subscription) {
        while let Some(payload) = messages.next().await {
            self.dispatch(&payload);
        }
        tracing::warn!("Request subscription ended, no further instructions will be received");
    }

    /// Decodes one payload and spawns its handler. Undecodable payloads are
    /// dropped: without `ReplyTo` there is nowhere to answer.
    pub fn dispatch(&self, payload: &[u8]) -> Option<JoinHandle<()>> {
        tracing::debug!("Message: {}", String::from_utf8_lossy(payload));

        let instr = match Instruction::decode(payload) {
            Ok(instr) => instr,
            Err(e) => {
                tracing::warn!(
                    "Unable to read instruction \"{}\": {}",
                    String::from_utf8_lossy(payload),
                    e
                );
                return None;
            }
        };

        let service = Arc::clone(&self.service);
        Some(tokio::spawn(async move {
            let response = handle(service.as_ref(), &instr).await;
            respond(service.as_ref(), &instr.reply_to, &response).await;
        }))
    }
}

/// The per-instruction failure boundary: every error or panic raised while
/// handling `instr` becomes an ERROR response here and nowhere else.
pub async fn handle<S: StoreConnector, R: ToolRunner>(
    service: &TenantService<S, R>,
    instr: &Instruction,
) -> Response {
    let outcome = AssertUnwindSafe(route(service, instr)).catch_unwind().await;

    let failure = match outcome {
        Ok(Ok(response)) => return response,
        Ok(Err(e)) => {
            tracing::warn!(
                "{} for \"{}\" failed: {} (category: {:?})",
                instr.op,
                instr.id,
                e,
                e.category()
            );
            e
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!("Handler panicked on {:?}: {}", instr, message);
            LandlordError::Internal { message }
        }
    };

    // 通過驗證的請求回覆與成功時相同的結構
    let routed = is_valid_tenant_id(&instr.id)
        .then(|| instr.operation().ok())
        .flatten();
    match routed {
        Some(op) => Response::operation_error(op, &instr.id, failure.to_string()),
        None => Response::error(failure.to_string()),
    }
}

async fn route<S: StoreConnector, R: ToolRunner>(
    service: &TenantService<S, R>,
    instr: &Instruction,
) -> Result<Response> {
    validate_tenant_id(&instr.id)?;
    let op = instr.operation()?;
    tracing::info!("Op: {} for \"{}\"", op, instr.id);

    match op {
        Operation::Setup => {
            let port = service.setup(&instr.id).await?;
            Ok(Response::ok_with_port(&instr.id, port))
        }
        Operation::Delete => {
            service.delete(&instr.id).await?;
            Ok(Response::ok(&instr.id))
        }
        Operation::GetPort => {
            let port = service.get_port(&instr.id).await?;
            Ok(Response::ok_with_port(&instr.id, port))
        }
    }
}

async fn respond<S: StoreConnector, R: ToolRunner>(
    service: &TenantService<S, R>,
    reply_to: &str,
    response: &Response,
) {
    let channel = service.keys().response_channel(reply_to);
    tracing::info!("Responding to {}: {:?}", channel, response);

    let published = async {
        let payload = response.to_json()?;
        let mut conn = service.connector().connect().await?;
        conn.publish(&channel, &payload).await
    };
    if let Err(e) = published.await {
        tracing::error!("Unable to respond on {}: {}", channel, e);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unexpected failure".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::domain::model::Status;
    use crate::domain::ports::ToolOutput;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ToolRunner for CountingTool {
        async fn run(&self, _args: &[String]) -> Result<ToolOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ToolOutput::exited(0, ""))
        }
    }

    fn instruction(op: &str, id: &str) -> Instruction {
        Instruction {
            reply_to: "x".to_string(),
            op: op.to_string(),
            id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn unknown_operation_is_a_plain_error() {
        let service = TenantService::new(MemoryStore::new(), CountingTool::default());
        let response = handle(&service, &instruction("Bogus", "abc")).await;
        assert_eq!(response, Response::error("Unknown operation."));
    }

    #[tokio::test]
    async fn invalid_id_never_reaches_store_or_tool() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let tool = CountingTool::default();
        let calls = Arc::clone(&tool.calls);
        let service = TenantService::new(store, tool);

        let response = handle(&service, &instruction("Setup", "bad id!")).await;

        // an offline store would have produced a store error instead
        assert_eq!(response, Response::error("Invalid id."));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn get_port_of_unknown_tenant() {
        let service = TenantService::new(MemoryStore::new(), CountingTool::default());
        let response = handle(&service, &instruction("GetPort", "ghost")).await;
        assert_eq!(response.status(), Status::Error);
        assert_eq!(response.port(), Some(0));
        assert_eq!(response.error_message(), "No port bound to tenant \"ghost\".");
    }

    #[tokio::test]
    async fn undecodable_payload_is_dropped() {
        let dispatcher = Dispatcher::new(Arc::new(TenantService::new(
            MemoryStore::new(),
            CountingTool::default(),
        )));
        assert!(dispatcher.dispatch(b"{not json").is_none());
    }

    #[test]
    fn panic_messages() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(boxed.as_ref()), "unexpected failure");
    }
}
