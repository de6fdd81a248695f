//! Object storage provider for mirrored artifacts.

pub mod error;
pub mod store;

pub use error::StorageError;
pub use store::{ObjectStore, StoreConfig};
