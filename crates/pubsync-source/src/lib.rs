//! Source trees for pubsync.
//!
//! A source tree is a commit-pinned file tree (typically a site repository)
//! that the synchronizer lists per [`Category`](pubsync_types::Category) and
//! fetches raw content from. Listings are returned in a stable order; that
//! order becomes the order of newly added manifest entries.

pub mod error;
pub mod layout;
pub mod local;
pub mod memory;
pub mod traits;

pub use error::{SourceError, SourceResult};
pub use layout::FolderLayout;
pub use local::LocalSourceTree;
pub use memory::InMemorySourceTree;
pub use traits::SourceTree;
