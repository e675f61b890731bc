//! Diff engine for pubsync.
//!
//! Decides, per freshly fetched file, whether the content is already stored
//! (skip), replaces the content at an existing path, or adds a new path.
//! Address equality always wins over path equality: identical bytes are
//! never uploaded twice, whatever path they appear under.
//!
//! # Key Types
//!
//! - [`ManifestDiffEngine`] / [`Reconciliation`] -- upload plan plus final entries
//! - [`ManifestDiff`] / [`ManifestChange`] -- path-level change report between two entry lists

pub mod manifest_diff;
pub mod reconcile;

pub use manifest_diff::{diff_manifests, ManifestChange, ManifestDiff};
pub use reconcile::{
    ChangeSummary, EntryAction, FileDecision, HashedFile, ManifestDiffEngine, Reconciliation,
};
