use crate::config::Settings;
use crate::core::dispatcher::Dispatcher;
use crate::core::service::TenantService;
use crate::domain::ports::{StoreConnector, ToolRunner};
use crate::utils::error::Result;
use std::sync::Arc;

/// Prepares the port pool, then serves instructions until the request
/// subscription ends.
pub struct LandlordEngine<S: StoreConnector, R: ToolRunner> {
    service: Arc<TenantService<S, R>>,
    settings: Settings,
}

impl<S: StoreConnector, R: ToolRunner> LandlordEngine<S, R> {
    pub fn new(connector: S, runner: R, settings: Settings) -> Self {
        Self {
            service: Arc::new(TenantService::new(connector, runner)),
            settings,
        }
    }

    pub fn service(&self) -> &Arc<TenantService<S, R>> {
        &self.service
    }

    pub async fn run(&self) -> Result<()> {
        tracing::info!("🚀 Starting landlord");
        tracing::info!(
            "Tool: {} (sudo: {}), store: {}, pool: {} ports from {}, listen port: {}",
            self.settings.tool_path.display(),
            self.settings.use_sudo,
            self.settings.store_url,
            self.settings.pool.max_tenants,
            self.settings.pool.tenant_port_base,
            self.settings.listen_port
        );

        // 先完成連接埠池初始化，才開始接收指令
        self.service.prepare_pool(&self.settings.pool).await?;

        Dispatcher::new(Arc::clone(&self.service)).run().await?;

        tracing::info!("Exited");
        Ok(())
    }
}
