//! Foundation types for pubsync.
//!
//! Every other pubsync crate depends on `pubsync-types`. The types here are
//! plain values: they are cloned between synchronization passes rather than
//! shared, so a failed pass can never corrupt the entries a retry reuses.
//!
//! # Key Types
//!
//! - [`ContentAddress`]: BLAKE3-derived pointer into the content store
//! - [`ManifestEntry`] / [`TemplateEntry`]: one published file
//! - [`Category`]: assets, stylesheets, or templates
//! - [`SourceFile`] / [`FetchedFile`]: listing entries and fetched content
//! - [`PublicationState`]: the persisted pointer triple plus status marker

pub mod address;
pub mod category;
pub mod entry;
pub mod error;
pub mod publication;

pub use address::ContentAddress;
pub use category::Category;
pub use entry::{FetchedFile, ManifestEntry, SourceFile, TemplateEntry};
pub use error::TypeError;
pub use publication::{fields, PublicationState, PublicationStatus};
