//! Versions and Drafts
//!
//! - `drafts` - Overlay the newest eligible draft onto a published document
//! - `history` - Write, prune and page through version documents

pub mod drafts;
pub mod history;

pub use drafts::{resolve_draft, scope_to_version};
pub use history::{enforce_max_per_doc, find_versions, save_version, VersionQuery};
