//! Manifest aggregation for pubsync.
//!
//! Folds the reconciled asset, stylesheet, and template lists together with
//! the publication's metadata into one [`Manifest`], and content-addresses
//! both the template set and the manifest itself.
//!
//! # Key Types
//!
//! - [`PublicationMetadata`] -- naming, ownership, and routing read from the publication document
//! - [`Manifest`] -- the aggregate, with category lists sorted by path
//! - [`ManifestAggregator`] -- template-set addressing, manifest assembly, and publishing

pub mod aggregator;
pub mod error;
pub mod manifest;
pub mod metadata;

pub use aggregator::ManifestAggregator;
pub use error::{ManifestError, ManifestResult};
pub use manifest::Manifest;
pub use metadata::PublicationMetadata;
