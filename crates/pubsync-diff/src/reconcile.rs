//! Reconciliation of a fetched file set against previously published entries.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use pubsync_types::{ContentAddress, ManifestEntry};
use serde::Serialize;
use tracing::debug;

/// A fetched file together with its dry-run content address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashedFile {
    pub path: String,
    pub bytes: Bytes,
    pub address: ContentAddress,
}

impl HashedFile {
    pub fn new(path: impl Into<String>, bytes: impl Into<Bytes>, address: ContentAddress) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
            address,
        }
    }
}

/// What reconciliation decided for one fetched file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EntryAction {
    /// Path already held this exact address.
    Unchanged,
    /// Content already stored under another path; the entry for this path
    /// now points at it without an upload.
    Relinked { previous: Option<ContentAddress> },
    /// Path exists with different content; new content must be uploaded.
    Replace { previous: ContentAddress },
    /// New path with new content; must be uploaded.
    Add,
}

impl EntryAction {
    pub fn needs_upload(&self) -> bool {
        matches!(self, Self::Replace { .. } | Self::Add)
    }
}

/// Decision for one fetched file, in listing order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileDecision {
    pub path: String,
    pub address: ContentAddress,
    #[serde(flatten)]
    pub action: EntryAction,
}

/// Counts per action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub unchanged: usize,
    pub relinked: usize,
    pub replaced: usize,
    pub added: usize,
    pub stale: usize,
}

impl ChangeSummary {
    pub fn uploads(&self) -> usize {
        self.replaced + self.added
    }
}

/// Output of [`ManifestDiffEngine::reconcile`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Files whose content is not stored yet, in listing order, each address once.
    pub to_upload: Vec<HashedFile>,
    /// Existing entries in their original order (updated in place), then new
    /// paths in listing order.
    pub final_entries: Vec<ManifestEntry>,
    pub decisions: Vec<FileDecision>,
    /// Existing entries whose path no longer appears in the listing. They are
    /// kept in `final_entries`: there is no removal path.
    pub stale: Vec<ManifestEntry>,
}

impl Reconciliation {
    pub fn summary(&self) -> ChangeSummary {
        let mut summary = ChangeSummary {
            stale: self.stale.len(),
            ..ChangeSummary::default()
        };
        for decision in &self.decisions {
            match decision.action {
                EntryAction::Unchanged => summary.unchanged += 1,
                EntryAction::Relinked { .. } => summary.relinked += 1,
                EntryAction::Replace { .. } => summary.replaced += 1,
                EntryAction::Add => summary.added += 1,
            }
        }
        summary
    }

    /// `true` if the final entries equal the existing ones.
    pub fn is_noop(&self) -> bool {
        self.decisions
            .iter()
            .all(|d| d.action == EntryAction::Unchanged)
    }
}

/// Dedup-by-address reconciliation.
///
/// Pure: no I/O happens here. The caller obtains dry-run addresses from the
/// content store first, so the skip/upload decision is made before any
/// upload cost is paid.
pub struct ManifestDiffEngine;

impl ManifestDiffEngine {
    /// Reconcile `fetched` (in listing order) against `existing`.
    ///
    /// For each file: if its address is already known anywhere in the
    /// category (existing entries, or an entry resolved earlier in this
    /// pass) nothing is uploaded and the path is pointed at that address;
    /// otherwise the path is replaced or added and the file is queued for
    /// upload.
    pub fn reconcile(existing: &[ManifestEntry], fetched: Vec<HashedFile>) -> Reconciliation {
        let mut final_entries = existing.to_vec();
        let mut by_path: HashMap<String, usize> = HashMap::new();
        for (index, entry) in final_entries.iter().enumerate() {
            by_path.entry(entry.path.clone()).or_insert(index);
        }
        let mut known: HashSet<ContentAddress> =
            existing.iter().map(|e| e.content_address).collect();
        let mut listed: HashSet<String> = HashSet::new();

        let mut to_upload = Vec::new();
        let mut decisions = Vec::with_capacity(fetched.len());

        for file in fetched {
            listed.insert(file.path.clone());
            let slot = by_path.get(&file.path).copied();
            let previous = slot.map(|i| final_entries[i].content_address);

            let action = if known.contains(&file.address) {
                match previous {
                    Some(prev) if prev == file.address => EntryAction::Unchanged,
                    previous => EntryAction::Relinked { previous },
                }
            } else {
                match previous {
                    Some(previous) => EntryAction::Replace { previous },
                    None => EntryAction::Add,
                }
            };

            debug!(path = %file.path, address = %file.address.short_hex(), ?action, "reconciled");

            match slot {
                Some(i) => final_entries[i].content_address = file.address,
                None => {
                    by_path.insert(file.path.clone(), final_entries.len());
                    final_entries.push(ManifestEntry::new(file.path.clone(), file.address));
                }
            }

            decisions.push(FileDecision {
                path: file.path.clone(),
                address: file.address,
                action: action.clone(),
            });

            if action.needs_upload() {
                known.insert(file.address);
                to_upload.push(file);
            }
        }

        let stale = existing
            .iter()
            .filter(|e| !listed.contains(&e.path))
            .cloned()
            .collect();

        Reconciliation {
            to_upload,
            final_entries,
            decisions,
            stale,
        }
    }
}
