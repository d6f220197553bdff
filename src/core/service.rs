use crate::config::PoolSettings;
use crate::core::port_pool::{PortPool, NO_FREE_PORT};
use crate::core::provisioning::{ProvisioningGateway, EXIT_INSTANCE_EXISTS};
use crate::core::registry::TenantRegistry;
use crate::domain::keys::KeySpace;
use crate::domain::ports::{StoreConnector, ToolRunner};
use crate::utils::error::{LandlordError, Result};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;

/// Tenant operations. Every call path opens its own store connection and
/// leaves all synchronization to the store's atomic scripts.
pub struct TenantService<S: StoreConnector, R: ToolRunner> {
    connector: S,
    gateway: ProvisioningGateway<R>,
    pool: PortPool,
    registry: TenantRegistry,
    keys: KeySpace,
}

impl<S: StoreConnector, R: ToolRunner> TenantService<S, R> {
    pub fn new(connector: S, runner: R) -> Self {
        Self::with_keys(connector, runner, KeySpace::default())
    }

    pub fn with_keys(connector: S, runner: R, keys: KeySpace) -> Self {
        Self {
            connector,
            gateway: ProvisioningGateway::new(runner),
            pool: PortPool::new(keys.clone()),
            registry: TenantRegistry::new(keys.clone()),
            keys,
        }
    }

    pub fn connector(&self) -> &S {
        &self.connector
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn pool(&self) -> &PortPool {
        &self.pool
    }

    /// Must complete before any instruction is accepted.
    pub async fn prepare_pool(&self, settings: &PoolSettings) -> Result<()> {
        let mut conn = self.connector.connect().await?;
        self.pool.initialize(&mut conn, settings).await
    }

    /// Provisions `id` on a fresh port and binds it. An instance that already
    /// exists resolves to its registered port.
    pub async fn setup(&self, id: &str) -> Result<u16> {
        let mut conn = self.connector.connect().await?;
        tracing::info!("Setting up \"{}\"", id);

        let port = self.pool.allocate(&mut conn).await?;
        let provisioned = AssertUnwindSafe(self.provision(&mut conn, id, port))
            .catch_unwind()
            .await;
        match provisioned {
            Ok(Ok(bound)) => Ok(bound),
            Ok(Err(e)) => {
                self.release_claimed(&mut conn, port).await;
                Err(e)
            }
            Err(panic) => {
                // 釋放後再交給上層的錯誤邊界
                self.release_claimed(&mut conn, port).await;
                std::panic::resume_unwind(panic)
            }
        }
    }

    async fn release_claimed(&self, conn: &mut S::Connection, port: u16) {
        if let Err(e) = self.pool.release(conn, port).await {
            tracing::warn!("Unable to release port {}: {}", port, e);
        }
    }

    async fn provision(&self, conn: &mut S::Connection, id: &str, port: u16) -> Result<u16> {
        match self.gateway.setup(id, port).await {
            Ok(()) if port == NO_FREE_PORT => Err(LandlordError::PoolExhausted),
            Ok(()) => {
                self.registry.bind(conn, id, port).await?;
                tracing::info!("✅ \"{}\" set up on port {}", id, port);
                Ok(port)
            }
            Err(e) if e.exit_code == EXIT_INSTANCE_EXISTS => {
                self.pool.release(conn, port).await?;
                let existing = self.registry.get(conn, id).await?;
                tracing::info!("\"{}\" already exists on port {}", id, existing);
                Ok(existing)
            }
            Err(_) if port == NO_FREE_PORT => Err(LandlordError::PoolExhausted),
            Err(e) => Err(e.into()),
        }
    }

    /// Tears the instance down, then drops its binding and frees its port.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut conn = self.connector.connect().await?;
        tracing::info!("Deleting \"{}\"", id);

        self.gateway.delete(id).await?;

        if let Some(port) = self.registry.unbind(&mut conn, id).await? {
            self.pool.release(&mut conn, port).await?;
        }
        Ok(())
    }

    pub async fn get_port(&self, id: &str) -> Result<u16> {
        let mut conn = self.connector.connect().await?;
        tracing::info!("Getting port for \"{}\"", id);
        self.pool.lookup(&mut conn, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::domain::ports::ToolOutput;
    use async_trait::async_trait;

    struct ExitWith(i32);

    #[async_trait]
    impl ToolRunner for ExitWith {
        async fn run(&self, _args: &[String]) -> Result<ToolOutput> {
            Ok(ToolOutput::exited(self.0, ""))
        }
    }

    const POOL: PoolSettings = PoolSettings {
        tenant_port_base: 7000,
        max_tenants: 2,
    };

    async fn service(exit: i32) -> (TenantService<MemoryStore, ExitWith>, MemoryStore) {
        let store = MemoryStore::new();
        let service = TenantService::new(store.clone(), ExitWith(exit));
        service.prepare_pool(&POOL).await.unwrap();
        (service, store)
    }

    #[tokio::test]
    async fn setup_binds_lowest_port() {
        let (service, mut store) = service(0).await;

        assert_eq!(service.setup("t1").await.unwrap(), 7000);
        assert_eq!(service.get_port("t1").await.unwrap(), 7000);
        assert_eq!(service.pool().occupied(&mut store).await.unwrap(), vec![7000]);
    }

    #[tokio::test]
    async fn fatal_exit_releases_the_port() {
        let (service, mut store) = service(3).await;

        let err = service.setup("t1").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid port.");
        assert!(service.pool().occupied(&mut store).await.unwrap().is_empty());
        assert!(service.get_port("t1").await.is_err());
    }

    #[tokio::test]
    async fn exhausted_pool_reports_no_free_ports() {
        let (service, _store) = service(3).await;
        let other = TenantService::new(service.connector().clone(), ExitWith(0));
        other.setup("a").await.unwrap();
        other.setup("b").await.unwrap();

        let err = service.setup("c").await.unwrap_err();
        assert!(matches!(err, LandlordError::PoolExhausted));
    }

    #[tokio::test]
    async fn already_exists_without_binding_is_not_found() {
        let (service, mut store) = service(7).await;

        let err = service.setup("t1").await.unwrap_err();
        assert!(matches!(err, LandlordError::NotFound { .. }));
        assert!(service.pool().occupied(&mut store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_frees_binding_and_port() {
        let (service, mut store) = service(0).await;
        service.setup("t1").await.unwrap();

        service.delete("t1").await.unwrap();

        assert!(service.get_port("t1").await.is_err());
        assert!(service.pool().occupied(&mut store).await.unwrap().is_empty());
    }

    struct Crashing;

    #[async_trait]
    impl ToolRunner for Crashing {
        async fn run(&self, _args: &[String]) -> Result<ToolOutput> {
            panic!("tool crashed");
        }
    }

    #[tokio::test]
    async fn panicking_setup_releases_the_port() {
        let store = MemoryStore::new();
        let service = TenantService::new(store.clone(), Crashing);
        service.prepare_pool(&POOL).await.unwrap();

        let outcome = AssertUnwindSafe(service.setup("a")).catch_unwind().await;

        assert!(outcome.is_err());
        let mut conn = store.clone();
        assert!(service.pool().occupied(&mut conn).await.unwrap().is_empty());
        assert!(service.get_port("a").await.is_err());
    }

    #[tokio::test]
    async fn store_outage_fails_before_the_tool_runs() {
        let (service, store) = service(0).await;
        store.set_offline(true);
        assert!(matches!(
            service.setup("t1").await,
            Err(LandlordError::Store { .. })
        ));
    }
}
