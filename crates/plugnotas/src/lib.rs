//! REST client for the PlugNotas fiscal invoice API, plus the source
//! trait the sync engine consumes.

pub mod api;
pub mod source;

pub use api::{ActorRole, ListingPage, PlugnotasApi, PlugnotasError, DEFAULT_BASE_URL};
pub use source::NoteSource;
