use crate::domain::ports::{CoordinationStore, StoreConnector, Subscription};
use crate::utils::error::{LandlordError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, IntoConnectionInfo, Script};
use std::sync::LazyLock;

static FILL_RANGE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        redis.call("DEL", KEYS[1])
        local base = tonumber(ARGV[1])
        local count = tonumber(ARGV[2])
        for i = 0, count - 1 do
            redis.call("SADD", KEYS[1], base + i)
        end
        return redis.call("SCARD", KEYS[1])
        "#,
    )
});

static REBUILD_OCCUPIED: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        local tenants = redis.call("SMEMBERS", KEYS[1])
        redis.call("DEL", KEYS[2])
        for i = 1, #tenants do
            local port = redis.call("GET", ARGV[1] .. ":" .. tenants[i] .. ":port")
            if port then
                redis.call("SADD", KEYS[2], port)
            end
        end
        return redis.call("SCARD", KEYS[2])
        "#,
    )
});

// Numeric minimum, not ZRANGE order: members are strings and ports of
// different digit counts would sort lexicographically.
static CLAIM_LOWEST_FREE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        redis.call("SDIFFSTORE", KEYS[3], KEYS[1], KEYS[2])
        local free = redis.call("SMEMBERS", KEYS[3])
        local lowest = nil
        for i = 1, #free do
            local port = tonumber(free[i])
            if lowest == nil or port < lowest then
                lowest = port
            end
        end
        if lowest == nil then
            return 0
        end
        redis.call("SADD", KEYS[2], lowest)
        return lowest
        "#,
    )
});

/// Connects to a Redis-compatible coordination store with the shared credential.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    client: Client,
}

impl RedisConnector {
    /// The password is applied only when the URL does not carry one.
    pub fn new(url: &str, password: &str) -> Result<Self> {
        let mut info = url.into_connection_info()?;
        if info.redis.password.is_none() && !password.is_empty() {
            info.redis.password = Some(password.to_string());
        }
        let client = Client::open(info)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl StoreConnector for RedisConnector {
    type Connection = RedisConnection;

    async fn connect(&self) -> Result<RedisConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(RedisConnection { conn })
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        tracing::info!("Subscribed to {}", channel);

        let messages = pubsub
            .into_on_message()
            .map(|msg| msg.get_payload_bytes().to_vec());
        Ok(messages.boxed())
    }
}

pub struct RedisConnection {
    conn: MultiplexedConnection,
}

#[async_trait]
impl CoordinationStore for RedisConnection {
    async fn get_int(&mut self, key: &str) -> Result<Option<i64>> {
        Ok(self.conn.get(key).await?)
    }

    async fn set_int(&mut self, key: &str, value: i64) -> Result<()> {
        self.conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn delete(&mut self, key: &str) -> Result<()> {
        self.conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn set_add(&mut self, key: &str, member: &str) -> Result<()> {
        self.conn.sadd::<_, _, ()>(key, member).await?;
        Ok(())
    }

    async fn set_remove(&mut self, key: &str, member: &str) -> Result<bool> {
        let removed: i64 = self.conn.srem(key, member).await?;
        Ok(removed > 0)
    }

    async fn set_members(&mut self, key: &str) -> Result<Vec<String>> {
        Ok(self.conn.smembers(key).await?)
    }

    async fn publish(&mut self, channel: &str, payload: &str) -> Result<()> {
        self.conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }

    async fn fill_range_script(&mut self, key: &str, base: u16, count: u16) -> Result<usize> {
        let size: i64 = FILL_RANGE
            .key(key)
            .arg(base)
            .arg(count)
            .invoke_async(&mut self.conn)
            .await?;
        Ok(size.max(0) as usize)
    }

    async fn rebuild_occupied_script(
        &mut self,
        tenants: &str,
        occupied: &str,
        tenant_prefix: &str,
    ) -> Result<usize> {
        let size: i64 = REBUILD_OCCUPIED
            .key(tenants)
            .key(occupied)
            .arg(tenant_prefix)
            .invoke_async(&mut self.conn)
            .await?;
        Ok(size.max(0) as usize)
    }

    async fn claim_lowest_free_script(
        &mut self,
        possible: &str,
        occupied: &str,
        scratch: &str,
    ) -> Result<u16> {
        let port: i64 = CLAIM_LOWEST_FREE
            .key(possible)
            .key(occupied)
            .key(scratch)
            .invoke_async(&mut self.conn)
            .await?;
        u16::try_from(port).map_err(|_| {
            LandlordError::store(format!("claimed value {} is not a port", port))
        })
    }
}
