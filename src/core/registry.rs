use crate::domain::keys::KeySpace;
use crate::domain::model::TenantBinding;
use crate::domain::ports::CoordinationStore;
use crate::utils::error::{LandlordError, Result};

/// Persisted `id -> port` bindings and tenant membership. The bindings are the
/// source of truth the occupied-port cache is rebuilt from.
#[derive(Debug, Clone, Default)]
pub struct TenantRegistry {
    keys: KeySpace,
}

impl TenantRegistry {
    pub fn new(keys: KeySpace) -> Self {
        Self { keys }
    }

    /// Idempotent: rebinding the same id to the same port changes nothing.
    pub async fn bind<C: CoordinationStore>(&self, conn: &mut C, id: &str, port: u16) -> Result<()> {
        tracing::debug!("Binding {} to port {}", id, port);
        conn.set_int(&self.keys.tenant_port(id), port as i64).await?;
        conn.set_add(&self.keys.tenants(), id).await
    }

    pub async fn get<C: CoordinationStore>(&self, conn: &mut C, id: &str) -> Result<u16> {
        tracing::debug!("Getting port for {}", id);
        match conn.get_int(&self.keys.tenant_port(id)).await? {
            Some(port) => u16::try_from(port).map_err(|_| {
                LandlordError::store(format!("stored port {} for {} is out of range", port, id))
            }),
            None => Err(LandlordError::NotFound { id: id.to_string() }),
        }
    }

    /// Removes the binding and membership; returns the port that was bound.
    pub async fn unbind<C: CoordinationStore>(&self, conn: &mut C, id: &str) -> Result<Option<u16>> {
        let port = match self.get(conn, id).await {
            Ok(port) => Some(port),
            Err(LandlordError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };
        conn.delete(&self.keys.tenant_port(id)).await?;
        conn.set_remove(&self.keys.tenants(), id).await?;
        Ok(port)
    }

    pub async fn tenants<C: CoordinationStore>(&self, conn: &mut C) -> Result<Vec<String>> {
        conn.set_members(&self.keys.tenants()).await
    }

    pub async fn bindings<C: CoordinationStore>(&self, conn: &mut C) -> Result<Vec<TenantBinding>> {
        let mut bindings = Vec::new();
        for id in self.tenants(conn).await? {
            match self.get(conn, &id).await {
                Ok(port) => bindings.push(TenantBinding { id, port }),
                Err(LandlordError::NotFound { .. }) => {
                    tracing::warn!("Tenant {} is registered without a port", id)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(bindings)
    }
}
