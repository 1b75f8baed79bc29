pub mod claims;
pub mod config;
pub mod coordinator;
pub mod database;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod rpc;
pub mod runtime;
pub mod service;
pub mod shares;
pub mod work;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{PoolArgs, PoolConfig};
pub use coordinator::SmartPool;
pub use error::{PoolError, Result};
pub use runtime::PoolRuntime;
pub use service::{NetworkClient, PoolService, WorkPackage};
