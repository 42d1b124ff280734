pub mod cursor;
pub mod error;
mod files;
pub mod revision_store;

pub use cursor::CursorRegistry;
pub use error::StorageError;
pub use revision_store::{MergeOutcome, RevisionStore};
