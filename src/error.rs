use std::time::Duration;

use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors surfaced by the registry. All of these indicate caller misuse
/// rather than an environmental failure; none of them is retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry was obtained through `Default` instead of
    /// `TtlRegistry::new` and has no backing state.
    #[error("ttl registry not instantiated; construct it with TtlRegistry::new")]
    NotInstantiated,

    /// The requested expiration does not exceed the 1 ns floor.
    #[error("expire_in must be longer than 1ns, got {0:?}")]
    ExpireTooShort(Duration),

    /// `expired` was called on a registry constructed without delivery.
    #[error("expiration delivery was disabled at construction")]
    DeliveryDisabled,
}
