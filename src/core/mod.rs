pub mod dispatcher;
pub mod engine;
pub mod port_pool;
pub mod provisioning;
pub mod registry;
pub mod service;

pub use crate::domain::model::{Instruction, Operation, Response, Status};
pub use crate::domain::ports::{CoordinationStore, StoreConnector, ToolRunner};
pub use crate::utils::error::Result;
