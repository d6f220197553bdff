use crate::utils::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Raw payloads received on a subscribed channel. The stream ends when the
/// underlying connection is lost.
pub type Subscription = BoxStream<'static, Vec<u8>>;

/// One connection to the coordination store, owned by a single call path.
///
/// The `*_script` operations each run as one indivisible transaction on the
/// store side; callers never split them into separate reads and writes.
#[async_trait]
pub trait CoordinationStore: Send {
    async fn get_int(&mut self, key: &str) -> Result<Option<i64>>;
    async fn set_int(&mut self, key: &str, value: i64) -> Result<()>;
    async fn delete(&mut self, key: &str) -> Result<()>;

    async fn set_add(&mut self, key: &str, member: &str) -> Result<()>;
    /// Returns whether the member was present.
    async fn set_remove(&mut self, key: &str, member: &str) -> Result<bool>;
    async fn set_members(&mut self, key: &str) -> Result<Vec<String>>;

    async fn publish(&mut self, channel: &str, payload: &str) -> Result<()>;

    /// Replaces `key` with the integers `base..base+count`. Returns the set size.
    async fn fill_range_script(&mut self, key: &str, base: u16, count: u16) -> Result<usize>;

    /// Replaces `occupied` with the ports bound under `tenant_prefix` for every
    /// member of `tenants`. Returns the number of occupied ports.
    async fn rebuild_occupied_script(
        &mut self,
        tenants: &str,
        occupied: &str,
        tenant_prefix: &str,
    ) -> Result<usize>;

    /// Computes `possible \ occupied` into `scratch`, marks its lowest member
    /// occupied and returns it, or returns 0 when nothing is free.
    async fn claim_lowest_free_script(
        &mut self,
        possible: &str,
        occupied: &str,
        scratch: &str,
    ) -> Result<u16>;
}

/// Opens store connections and channel subscriptions.
#[async_trait]
pub trait StoreConnector: Send + Sync + 'static {
    type Connection: CoordinationStore;

    async fn connect(&self) -> Result<Self::Connection>;
    async fn subscribe(&self, channel: &str) -> Result<Subscription>;
}

/// Exit status and combined stdout/stderr of one provisioning-tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// How the process ended: `exit status N` or `signal: <name>`.
    pub status: String,
    pub output: String,
}

impl ToolOutput {
    pub fn exited(code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            status: format!("exit status {}", code),
            output: output.into(),
        }
    }

    pub fn signalled(signal: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            exit_code: None,
            status: format!("signal: {}", signal.into()),
            output: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[async_trait]
pub trait ToolRunner: Send + Sync + 'static {
    /// Runs the tool with `args` (operation first). `Err` means the tool
    /// could not be started at all.
    async fn run(&self, args: &[String]) -> Result<ToolOutput>;
}
