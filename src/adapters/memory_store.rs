use crate::domain::keys::tenant_port_key;
use crate::domain::ports::{CoordinationStore, StoreConnector, Subscription};
use crate::utils::error::{LandlordError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
struct State {
    scalars: HashMap<String, String>,
    sets: HashMap<String, BTreeSet<String>>,
    channels: HashMap<String, broadcast::Sender<Vec<u8>>>,
}

impl State {
    fn channel(&mut self, name: &str) -> broadcast::Sender<Vec<u8>> {
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

/// In-process coordination store for tests and local runs.
///
/// Every call takes the single state lock once, so each script is as
/// indivisible as its Redis counterpart. Cloning shares the same state; each
/// clone plays the role of one connection.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with a store error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LandlordError::store("connection refused (store offline)"));
        }
        self.state
            .lock()
            .map_err(|_| LandlordError::store("memory store lock poisoned"))
    }

    /// Snapshot of a set as integers, for assertions.
    pub fn int_members(&self, key: &str) -> Vec<u16> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        let mut members: Vec<u16> = state
            .sets
            .get(key)
            .map(|set| set.iter().filter_map(|m| m.parse().ok()).collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    type Connection = MemoryStore;

    async fn connect(&self) -> Result<MemoryStore> {
        self.lock()?;
        Ok(self.clone())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let rx = self.lock()?.channel(channel).subscribe();
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => return Some((payload, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Subscriber lagged, {} messages skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(stream.boxed())
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn get_int(&mut self, key: &str) -> Result<Option<i64>> {
        let state = self.lock()?;
        match state.scalars.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| {
                LandlordError::store(format!("value at {} is not an integer", key))
            }),
        }
    }

    async fn set_int(&mut self, key: &str, value: i64) -> Result<()> {
        self.lock()?
            .scalars
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&mut self, key: &str) -> Result<()> {
        let mut state = self.lock()?;
        state.scalars.remove(key);
        state.sets.remove(key);
        Ok(())
    }

    async fn set_add(&mut self, key: &str, member: &str) -> Result<()> {
        self.lock()?
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&mut self, key: &str, member: &str) -> Result<bool> {
        let mut state = self.lock()?;
        Ok(state
            .sets
            .get_mut(key)
            .map(|set| set.remove(member))
            .unwrap_or(false))
    }

    async fn set_members(&mut self, key: &str) -> Result<Vec<String>> {
        let state = self.lock()?;
        Ok(state
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn publish(&mut self, channel: &str, payload: &str) -> Result<()> {
        let sender = self.lock()?.channel(channel);
        // 沒有訂閱者時訊息直接丟棄，與 Redis PUBLISH 相同
        let _ = sender.send(payload.as_bytes().to_vec());
        Ok(())
    }

    async fn fill_range_script(&mut self, key: &str, base: u16, count: u16) -> Result<usize> {
        let mut state = self.lock()?;
        let ports: BTreeSet<String> = (0..count as u32)
            .map(|i| (base as u32 + i).to_string())
            .collect();
        let size = ports.len();
        state.sets.insert(key.to_string(), ports);
        Ok(size)
    }

    async fn rebuild_occupied_script(
        &mut self,
        tenants: &str,
        occupied: &str,
        tenant_prefix: &str,
    ) -> Result<usize> {
        let mut state = self.lock()?;
        let ports: BTreeSet<String> = state
            .sets
            .get(tenants)
            .into_iter()
            .flatten()
            .filter_map(|id| state.scalars.get(&tenant_port_key(tenant_prefix, id)))
            .cloned()
            .collect();
        let size = ports.len();
        state.sets.insert(occupied.to_string(), ports);
        Ok(size)
    }

    async fn claim_lowest_free_script(
        &mut self,
        possible: &str,
        occupied: &str,
        scratch: &str,
    ) -> Result<u16> {
        let mut state = self.lock()?;
        let taken = state.sets.get(occupied).cloned().unwrap_or_default();
        let available: BTreeSet<String> = state
            .sets
            .get(possible)
            .map(|set| set.difference(&taken).cloned().collect())
            .unwrap_or_default();
        let lowest = available.iter().filter_map(|p| p.parse::<u16>().ok()).min();
        state.sets.insert(scratch.to_string(), available);

        match lowest {
            Some(port) => {
                state
                    .sets
                    .entry(occupied.to_string())
                    .or_default()
                    .insert(port.to_string());
                Ok(port)
            }
            None => Ok(0),
        }
    }
}
