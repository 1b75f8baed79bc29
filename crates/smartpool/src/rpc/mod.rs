//! Ethereum JSON-RPC adapters for the node and the pool contract.

pub mod abi;
pub mod client;
pub mod ledger;
pub mod node;

pub use client::JsonRpcClient;
pub use ledger::RpcLedger;
pub use node::RpcNode;
