//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod company_repo;
pub mod service_note_repo;
pub mod sync_log_repo;

pub use company_repo::CompanyRepo;
pub use service_note_repo::ServiceNoteRepo;
pub use sync_log_repo::SyncLogRepo;
