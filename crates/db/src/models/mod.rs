//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct
//! matching the database row, plus the write-side DTOs the engine
//! produces.

pub mod company;
pub mod service_note;
pub mod sync_log;

pub use company::Company;
pub use service_note::{ServiceNote, UpsertNote};
pub use sync_log::{NewSyncLog, SyncLog};
