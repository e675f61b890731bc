use pubsync_diff::{ChangeSummary, FileDecision, ManifestDiff, Reconciliation};
use pubsync_types::{Category, ContentAddress, ManifestEntry};
use serde::Serialize;

use crate::governance::ProposalId;

/// What one category contributed to a pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub category: Category,
    pub summary: ChangeSummary,
    pub decisions: Vec<FileDecision>,
    /// Entries whose source file is gone. They stay in the manifest.
    pub stale: Vec<ManifestEntry>,
    pub uploaded: Vec<ContentAddress>,
}

impl CategoryReport {
    pub fn new(category: Category, reconciliation: &Reconciliation, uploaded: Vec<ContentAddress>) -> Self {
        Self {
            category,
            summary: reconciliation.summary(),
            decisions: reconciliation.decisions.clone(),
            stale: reconciliation.stale.clone(),
            uploaded,
        }
    }
}

/// Outcome of a successful pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub document: String,
    pub previous_manifest: Option<ContentAddress>,
    pub manifest_address: ContentAddress,
    pub template_set_address: ContentAddress,
    pub categories: Vec<CategoryReport>,
    /// Path-level changes against the previous manifest.
    pub changes: ManifestDiff,
    pub proposal: ProposalId,
    pub attempts: u32,
}

impl SyncReport {
    pub fn category(&self, category: Category) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// Blobs uploaded across all categories.
    pub fn uploads(&self) -> usize {
        self.categories.iter().map(|c| c.uploaded.len()).sum()
    }

    pub fn is_unchanged(&self) -> bool {
        self.previous_manifest == Some(self.manifest_address)
    }
}
