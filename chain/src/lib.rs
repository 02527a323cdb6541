//! Narrow facade over the storage chain RPC.
//!
//! The challenge pipelines only care about the semantics captured by
//! [`ChainGateway`]; the JSON-RPC client in [`client`] is one implementation
//! of it.

mod error;
mod gateway;
mod types;

pub mod client;

pub use error::ChainError;
pub use gateway::ChainGateway;
pub use types::*;
