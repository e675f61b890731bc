//! Path-level diff between two entry lists, for operator reports.
//!
//! Compares entries by path, detecting additions, removals, and content
//! changes. A removed path and an added path carrying the same address are
//! reported as a rename.

use std::collections::{BTreeMap, HashSet};

use pubsync_types::{ContentAddress, ManifestEntry};
use serde::Serialize;

/// The result of comparing two entry lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ManifestDiff {
    pub changes: Vec<ManifestChange>,
}

impl ManifestDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

/// A single change between two entry lists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ManifestChange {
    Added {
        path: String,
        address: ContentAddress,
    },
    Removed {
        path: String,
        address: ContentAddress,
    },
    Modified {
        path: String,
        old_address: ContentAddress,
        new_address: ContentAddress,
    },
    Renamed {
        old_path: String,
        new_path: String,
        address: ContentAddress,
    },
}

impl ManifestChange {
    pub fn path(&self) -> &str {
        match self {
            Self::Added { path, .. } | Self::Removed { path, .. } | Self::Modified { path, .. } => {
                path
            }
            Self::Renamed { new_path, .. } => new_path,
        }
    }
}

fn entries_to_map(entries: &[ManifestEntry]) -> BTreeMap<&str, ContentAddress> {
    entries
        .iter()
        .map(|e| (e.path.as_str(), e.content_address))
        .collect()
}

/// Compare `old` and `new`. Changes come out sorted by path within each
/// kind: modifications, renames, removals, additions.
pub fn diff_manifests(old: &[ManifestEntry], new: &[ManifestEntry]) -> ManifestDiff {
    let old_map = entries_to_map(old);
    let new_map = entries_to_map(new);

    let mut changes = Vec::new();
    let mut removed = Vec::new();
    let mut added = Vec::new();

    for (path, old_address) in &old_map {
        match new_map.get(path) {
            Some(new_address) if new_address != old_address => {
                changes.push(ManifestChange::Modified {
                    path: path.to_string(),
                    old_address: *old_address,
                    new_address: *new_address,
                });
            }
            Some(_) => {}
            None => removed.push((*path, *old_address)),
        }
    }
    for (path, address) in &new_map {
        if !old_map.contains_key(path) {
            added.push((*path, *address));
        }
    }

    let mut matched_removed = HashSet::new();
    let mut matched_added = HashSet::new();
    for (ri, (old_path, old_address)) in removed.iter().enumerate() {
        let candidate = added
            .iter()
            .enumerate()
            .find(|(ai, (_, address))| address == old_address && !matched_added.contains(ai));
        if let Some((ai, (new_path, address))) = candidate {
            changes.push(ManifestChange::Renamed {
                old_path: old_path.to_string(),
                new_path: new_path.to_string(),
                address: *address,
            });
            matched_removed.insert(ri);
            matched_added.insert(ai);
        }
    }

    for (ri, (path, address)) in removed.iter().enumerate() {
        if !matched_removed.contains(&ri) {
            changes.push(ManifestChange::Removed {
                path: path.to_string(),
                address: *address,
            });
        }
    }
    for (ai, (path, address)) in added.iter().enumerate() {
        if !matched_added.contains(&ai) {
            changes.push(ManifestChange::Added {
                path: path.to_string(),
                address: *address,
            });
        }
    }

    ManifestDiff { changes }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, content: &str) -> ManifestEntry {
        ManifestEntry::new(path, ContentAddress::from_bytes(content.as_bytes()))
    }

    #[test]
    fn identical_lists_have_no_changes() {
        let entries = vec![entry("a", "1"), entry("b", "2")];
        assert!(diff_manifests(&entries, &entries).is_empty());
    }

    #[test]
    fn order_does_not_matter() {
        let a = vec![entry("a", "1"), entry("b", "2")];
        let b = vec![entry("b", "2"), entry("a", "1")];
        assert!(diff_manifests(&a, &b).is_empty());
    }

    #[test]
    fn detects_added_and_modified() {
        let old = vec![entry("css/site.css", "Y")];
        let new = vec![entry("css/site.css", "Y2"), entry("css/print.css", "P")];
        let diff = diff_manifests(&old, &new);
        assert_eq!(diff.len(), 2);
        assert!(matches!(&diff.changes[0], ManifestChange::Modified { path, .. } if path == "css/site.css"));
        assert!(matches!(&diff.changes[1], ManifestChange::Added { path, .. } if path == "css/print.css"));
    }

    #[test]
    fn same_address_moved_is_a_rename() {
        let old = vec![entry("assets/logo.png", "X")];
        let new = vec![entry("assets/brand/logo.png", "X")];
        let diff = diff_manifests(&old, &new);
        assert_eq!(
            diff.changes,
            vec![ManifestChange::Renamed {
                old_path: "assets/logo.png".into(),
                new_path: "assets/brand/logo.png".into(),
                address: ContentAddress::from_bytes(b"X"),
            }]
        );
        assert_eq!(diff.changes[0].path(), "assets/brand/logo.png");
    }

    #[test]
    fn removal_without_match() {
        let old = vec![entry("a", "1")];
        let diff = diff_manifests(&old, &[]);
        assert!(matches!(&diff.changes[0], ManifestChange::Removed { path, .. } if path == "a"));
    }
}
