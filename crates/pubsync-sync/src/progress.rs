use std::sync::Mutex;

use pubsync_diff::EntryAction;
use pubsync_types::{Category, ContentAddress};
use tracing::{debug, info};

use crate::state::SyncPhase;

/// Something a running pass wants the operator to see.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    Phase(SyncPhase),
    Decided {
        category: Category,
        path: String,
        action: EntryAction,
    },
    Uploaded {
        category: Category,
        path: String,
        address: ContentAddress,
    },
}

/// Receives progress of a pass, in order.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Logs progress through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            // The synchronizer logs the outcome itself.
            ProgressEvent::Phase(phase) if phase.is_terminal() => debug!(%phase, "phase"),
            ProgressEvent::Phase(phase) => info!(%phase, "phase"),
            ProgressEvent::Decided {
                category,
                path,
                action,
            } => debug!(%category, path = %path, ?action, "decided"),
            ProgressEvent::Uploaded {
                category,
                path,
                address,
            } => debug!(%category, path = %path, address = %address.short_hex(), "uploaded"),
        }
    }
}

/// Keeps every event, for tests and progress displays.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }

    /// Phases reported so far.
    pub fn phases(&self) -> Vec<SyncPhase> {
        self.events
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Phase(phase) => Some(*phase),
                _ => None,
            })
            .collect()
    }

    /// Paths uploaded so far, per category.
    pub fn uploads(&self, category: Category) -> Vec<String> {
        self.events
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Uploaded {
                    category: c, path, ..
                } if *c == category => Some(path.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().expect("lock poisoned").push(event);
    }
}
