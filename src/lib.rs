//! A concurrent time-to-live registry.
//!
//! [`TtlRegistry`] keeps a set of keys, each with an independent expiration
//! deadline. Adding a key that is already present rearms its deadline in
//! place, so at most one timer is ever live per key. When a deadline passes
//! the key is removed and, if delivery was enabled at construction,
//! published exactly once on the [`Expired`] conduit.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use ttl_registry::TtlRegistry;
//!
//! #[tokio::main]
//! async fn main() -> ttl_registry::Result<()> {
//!     let registry = TtlRegistry::new(true);
//!     registry.add_item("session-42", Duration::from_secs(2))?;
//!
//!     let expired = registry.expired()?;
//!     assert_eq!(expired.recv().await, Some("session-42"));
//!     assert!(!registry.check_item(&"session-42")?);
//!     Ok(())
//! }
//! ```

pub mod error;
mod registry;

pub use error::{RegistryError, Result};
pub use registry::{Expired, TtlRegistry, MIN_EXPIRE_IN};
