use crate::config::PoolSettings;
use crate::core::registry::TenantRegistry;
use crate::domain::keys::KeySpace;
use crate::domain::ports::CoordinationStore;
use crate::utils::error::Result;

/// Returned by [`PortPool::allocate`] when every port is occupied.
pub const NO_FREE_PORT: u16 = 0;

/// The bounded tenant port pool.
///
/// `possible` and `occupied` live in the coordination store; `occupied` is a
/// cache of the registry's bindings. All compute-and-reserve steps run as a
/// single store-side script, so the manager itself holds no state or locks.
#[derive(Debug, Clone, Default)]
pub struct PortPool {
    keys: KeySpace,
    registry: TenantRegistry,
}

impl PortPool {
    pub fn new(keys: KeySpace) -> Self {
        Self {
            registry: TenantRegistry::new(keys.clone()),
            keys,
        }
    }

    /// Resets `possible` to `base..base+max_tenants` and rebuilds `occupied`
    /// from the registered tenant bindings.
    pub async fn initialize<C: CoordinationStore>(
        &self,
        conn: &mut C,
        settings: &PoolSettings,
    ) -> Result<()> {
        let possible = conn
            .fill_range_script(
                &self.keys.possible_ports(),
                settings.tenant_port_base,
                settings.max_tenants,
            )
            .await?;
        let occupied = self.refresh_occupied(conn).await?;

        tracing::info!(
            "Port pool ready: {} possible ports from {}, {} occupied",
            possible,
            settings.tenant_port_base,
            occupied
        );
        Ok(())
    }

    pub async fn refresh_occupied<C: CoordinationStore>(&self, conn: &mut C) -> Result<usize> {
        conn.rebuild_occupied_script(
            &self.keys.tenants(),
            &self.keys.occupied_ports(),
            &self.keys.tenant_prefix(),
        )
        .await
    }

    /// Claims the lowest free port, or [`NO_FREE_PORT`] if the pool is exhausted.
    pub async fn allocate<C: CoordinationStore>(&self, conn: &mut C) -> Result<u16> {
        let port = conn
            .claim_lowest_free_script(
                &self.keys.possible_ports(),
                &self.keys.occupied_ports(),
                &self.keys.available_ports(),
            )
            .await?;

        if port == NO_FREE_PORT {
            tracing::warn!("Port pool exhausted");
        } else {
            tracing::debug!("Allocated port {}", port);
        }
        Ok(port)
    }

    /// No-op for the sentinel and for ports that are not occupied.
    pub async fn release<C: CoordinationStore>(&self, conn: &mut C, port: u16) -> Result<()> {
        if port == NO_FREE_PORT {
            return Ok(());
        }

        tracing::info!("Releasing port {}", port);
        conn.set_remove(&self.keys.occupied_ports(), &port.to_string())
            .await?;
        Ok(())
    }

    pub async fn lookup<C: CoordinationStore>(&self, conn: &mut C, id: &str) -> Result<u16> {
        self.registry.get(conn, id).await
    }

    pub async fn occupied<C: CoordinationStore>(&self, conn: &mut C) -> Result<Vec<u16>> {
        let mut ports: Vec<u16> = conn
            .set_members(&self.keys.occupied_ports())
            .await?
            .iter()
            .filter_map(|p| p.parse().ok())
            .collect();
        ports.sort_unstable();
        Ok(ports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;

    fn settings(base: u16, max: u16) -> PoolSettings {
        PoolSettings {
            tenant_port_base: base,
            max_tenants: max,
        }
    }

    #[tokio::test]
    async fn allocates_lowest_first() {
        let mut store = MemoryStore::new();
        let pool = PortPool::default();
        pool.initialize(&mut store, &settings(7000, 3)).await.unwrap();

        assert_eq!(pool.allocate(&mut store).await.unwrap(), 7000);
        assert_eq!(pool.allocate(&mut store).await.unwrap(), 7001);
        pool.release(&mut store, 7000).await.unwrap();
        assert_eq!(pool.allocate(&mut store).await.unwrap(), 7000);
    }

    #[tokio::test]
    async fn exhausted_pool_returns_sentinel() {
        let mut store = MemoryStore::new();
        let pool = PortPool::default();
        pool.initialize(&mut store, &settings(7000, 1)).await.unwrap();

        assert_eq!(pool.allocate(&mut store).await.unwrap(), 7000);
        assert_eq!(pool.allocate(&mut store).await.unwrap(), NO_FREE_PORT);
        assert_eq!(pool.occupied(&mut store).await.unwrap(), vec![7000]);
    }

    #[tokio::test]
    async fn release_of_sentinel_or_free_port_is_noop() {
        let mut store = MemoryStore::new();
        let pool = PortPool::default();
        pool.initialize(&mut store, &settings(7000, 2)).await.unwrap();

        pool.release(&mut store, NO_FREE_PORT).await.unwrap();
        pool.release(&mut store, 7001).await.unwrap();
        assert!(pool.occupied(&mut store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn initialize_rebuilds_occupied_from_bindings() {
        let mut store = MemoryStore::new();
        let pool = PortPool::default();
        let registry = TenantRegistry::default();
        registry.bind(&mut store, "a", 7002).await.unwrap();
        registry.bind(&mut store, "b", 7000).await.unwrap();
        // stale cache entry with no tenant behind it
        store
            .set_add(&KeySpace::default().occupied_ports(), "7001")
            .await
            .unwrap();

        pool.initialize(&mut store, &settings(7000, 4)).await.unwrap();

        assert_eq!(pool.occupied(&mut store).await.unwrap(), vec![7000, 7002]);
        assert_eq!(pool.allocate(&mut store).await.unwrap(), 7001);
    }

    #[tokio::test]
    async fn lookup_reads_registry() {
        let mut store = MemoryStore::new();
        let pool = PortPool::default();
        TenantRegistry::default()
            .bind(&mut store, "t1", 7005)
            .await
            .unwrap();

        assert_eq!(pool.lookup(&mut store, "t1").await.unwrap(), 7005);
        assert!(pool.lookup(&mut store, "t2").await.is_err());
    }

    #[tokio::test]
    async fn store_failure_is_surfaced() {
        let mut store = MemoryStore::new();
        let pool = PortPool::default();
        store.set_offline(true);
        assert!(pool.allocate(&mut store).await.is_err());
    }
}
