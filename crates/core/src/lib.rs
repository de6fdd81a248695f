//! Pure domain logic for the NFS-e mirror.
//!
//! Tax-id normalization, date-window math, raw payload extraction,
//! canonical identity rules, status vocabularies, and the bucket key
//! layout. No I/O lives here; every rule is unit-testable in isolation.

pub mod cnpj;
pub mod error;
pub mod identity;
pub mod payload;
pub mod period;
pub mod status;
pub mod storage_key;
pub mod types;

pub use error::CoreError;
