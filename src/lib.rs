pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::{Settings, TomlConfig};

pub use adapters::{CommandToolRunner, MemoryStore, RedisConnector};
pub use crate::core::{
    dispatcher::Dispatcher, engine::LandlordEngine, port_pool::PortPool,
    provisioning::ProvisioningGateway, registry::TenantRegistry, service::TenantService,
};
pub use utils::error::{LandlordError, ProvisioningError, Result};
