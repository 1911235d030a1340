pub mod client;
pub mod error;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod migrate;
pub mod query;
pub mod record;
pub mod repository;
pub mod store;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use dgraph_client::{Assigned, DgraphError};
pub use error::{GraphError, Result};
#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryStore;
pub use query::Var;
pub use record::Record;
pub use repository::Repository;
pub use store::GraphStore;
