//! # porta-core
//!
//! Foundation crate for the porta database layer: the canonical error
//! taxonomy, the driver-neutral value model, connection configuration,
//! and the generic policy cache. Every other crate in the workspace
//! depends on this.

pub mod cache;
pub mod config;
pub mod errors;
pub mod value;

// Re-export the most commonly used types at the crate root.
pub use cache::{Cache, Mru, Policy, SlotLimit, Ttl};
pub use config::DbConfig;
pub use errors::{DbError, DriverError, ErrorKind, SqlContext};
pub use value::{Params, Value};
