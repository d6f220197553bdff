// Adapters layer: concrete implementations of the domain ports.

pub mod memory_store;
pub mod redis_store;
pub mod tool;

pub use memory_store::MemoryStore;
pub use redis_store::{RedisConnection, RedisConnector};
pub use tool::CommandToolRunner;
