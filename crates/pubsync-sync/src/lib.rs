//! Publication synchronizer for pubsync.
//!
//! Runs one synchronization pass per publication: lists and fetches the
//! source tree category by category, uploads only content the store has
//! not seen, rewrites templates against the resolved addresses, aggregates
//! a manifest, records its address on the publication document, and hands
//! it to the governance layer as a change proposal.
//!
//! A pass either publishes a complete manifest or leaves the previously
//! recorded one in place and marks the publication `failed`.

pub mod cancel;
pub mod config;
pub mod document;
pub mod error;
pub mod governance;
pub mod progress;
pub mod report;
pub mod state;
pub mod synchronizer;

pub use cancel::CancellationFlag;
pub use config::SyncConfig;
pub use document::{DocumentFields, DocumentStore, FsDocumentStore, InMemoryDocumentStore};
pub use error::{
    ConfigError, DocumentError, DocumentResult, GovernanceError, GovernanceResult, SyncError,
    SyncResult,
};
pub use governance::{
    Availability, GovernanceClient, OutboxGovernanceClient, Proposal, ProposalId,
    RecordingGovernanceClient,
};
pub use progress::{ProgressEvent, ProgressSink, RecordingProgress, TracingProgress};
pub use report::{CategoryReport, SyncReport};
pub use state::SyncPhase;
pub use synchronizer::PublicationSynchronizer;
