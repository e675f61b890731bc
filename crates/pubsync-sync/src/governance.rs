use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use crate::error::{GovernanceError, GovernanceResult};

/// Whether the governance collaborator can accept proposals right now.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Availability {
    Ready,
    Unavailable(String),
}

/// Identifier of a submitted proposal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(pub String);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A change proposal as handed to the governance layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub target: String,
    pub method: String,
    pub args: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Proposal {
    fn new(target: &str, method: &str, args: &[String]) -> Self {
        Self {
            id: ProposalId(Uuid::now_v7().to_string()),
            target: target.to_string(),
            method: method.to_string(),
            args: args.to_vec(),
            created_at: Utc::now(),
        }
    }
}

/// Submits manifest pointers for adoption. Approval and execution of a
/// proposal happen elsewhere.
#[async_trait]
pub trait GovernanceClient: Send + Sync {
    async fn availability(&self) -> Availability;
    async fn propose(
        &self,
        target: &str,
        method: &str,
        args: &[String],
    ) -> GovernanceResult<ProposalId>;
}

/// Keeps proposals in memory. Can be switched to unavailable or rejecting.
#[derive(Debug)]
pub struct RecordingGovernanceClient {
    proposals: Mutex<Vec<Proposal>>,
    availability: RwLock<Availability>,
    rejection: RwLock<Option<String>>,
}

impl RecordingGovernanceClient {
    pub fn new() -> Self {
        Self {
            proposals: Mutex::new(Vec::new()),
            availability: RwLock::new(Availability::Ready),
            rejection: RwLock::new(None),
        }
    }

    pub fn set_availability(&self, availability: Availability) {
        *self.availability.write().expect("lock poisoned") = availability;
    }

    /// Reject every following proposal with `reason`, or accept again with
    /// `None`.
    pub fn set_rejection(&self, reason: Option<String>) {
        *self.rejection.write().expect("lock poisoned") = reason;
    }

    pub fn proposals(&self) -> Vec<Proposal> {
        self.proposals.lock().expect("lock poisoned").clone()
    }
}

impl Default for RecordingGovernanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GovernanceClient for RecordingGovernanceClient {
    async fn availability(&self) -> Availability {
        self.availability.read().expect("lock poisoned").clone()
    }

    async fn propose(
        &self,
        target: &str,
        method: &str,
        args: &[String],
    ) -> GovernanceResult<ProposalId> {
        if let Some(reason) = self.rejection.read().expect("lock poisoned").clone() {
            return Err(GovernanceError::Rejected(reason));
        }
        let proposal = Proposal::new(target, method, args);
        let id = proposal.id.clone();
        self.proposals.lock().expect("lock poisoned").push(proposal);
        Ok(id)
    }
}

/// Appends proposals as JSON lines to an outbox file, where an external
/// signer picks them up.
#[derive(Clone, Debug)]
pub struct OutboxGovernanceClient {
    path: PathBuf,
}

impl OutboxGovernanceClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every proposal written so far, oldest first.
    pub async fn read_all(&self) -> GovernanceResult<Vec<Proposal>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| GovernanceError::Serialization(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl GovernanceClient for OutboxGovernanceClient {
    async fn availability(&self) -> Availability {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                match tokio::fs::create_dir_all(dir).await {
                    Ok(()) => Availability::Ready,
                    Err(e) => Availability::Unavailable(format!(
                        "outbox directory {}: {e}",
                        dir.display()
                    )),
                }
            }
            _ => Availability::Ready,
        }
    }

    async fn propose(
        &self,
        target: &str,
        method: &str,
        args: &[String],
    ) -> GovernanceResult<ProposalId> {
        let proposal = Proposal::new(target, method, args);
        let mut line = serde_json::to_string(&proposal)
            .map_err(|e| GovernanceError::Serialization(e.to_string()))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_all().await?;

        info!(id = %proposal.id, contract = target, method, outbox = %self.path.display(), "proposal queued");
        Ok(proposal.id)
    }
}
