pub mod address_space;
pub mod bulk;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod hierarchy;
pub mod http;
pub mod node;
pub mod observability;
pub mod protocols;
pub mod scheduler;
pub mod server;
pub mod variant;

#[cfg(test)]
mod testing;

pub use address_space::{AddressSpace, AddressSpaceState, DataChange};
pub use error::{AddressSpaceError, ServerError, ServerResult};
pub use node::{AccessLevel, AttributeKind, NodeId, QualifiedName};
pub use variant::{DataType, Variant};
