use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::ContentAddress;
use crate::error::TypeError;

/// Field names of a publication document.
pub mod fields {
    pub const NAME: &str = "name";
    pub const CONTRACT: &str = "contract";
    pub const MANIFEST_ADDRESS: &str = "manifest_address";
    pub const STATUS: &str = "status";
    pub const SYNCED_AT: &str = "synced_at";
}

/// Transient marker describing the outcome of the latest pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    /// Initialized, never synchronized.
    #[default]
    Pending,
    Ok,
    Failed,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ok => "ok",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublicationStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "ok" => Ok(Self::Ok),
            "failed" => Ok(Self::Failed),
            other => Err(TypeError::UnknownStatus(other.to_string())),
        }
    }
}

/// Persisted state of one publication.
///
/// `manifest_address` is the last successfully published manifest pointer.
/// A failed pass only flips `status`; it never clears the pointer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationState {
    pub name: String,
    pub contract: String,
    pub manifest_address: Option<ContentAddress>,
    pub status: PublicationStatus,
    pub synced_at: Option<String>,
}

impl PublicationState {
    /// Read the state out of a document's field map.
    ///
    /// Missing or unparsable pointer and status values fall back to `None`
    /// and `Pending`: a document written by an older tool may carry a
    /// sentinel string where the pointer should be.
    pub fn from_fields(doc: &BTreeMap<String, Value>) -> Self {
        let text = |key: &str| doc.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            name: text(fields::NAME).unwrap_or_default(),
            contract: text(fields::CONTRACT).unwrap_or_default(),
            manifest_address: text(fields::MANIFEST_ADDRESS)
                .and_then(|s| ContentAddress::from_hex(&s).ok()),
            status: text(fields::STATUS)
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            synced_at: text(fields::SYNCED_AT),
        }
    }

    /// Fields a freshly initialized publication document starts with.
    pub fn initial_fields(name: &str, contract: &str) -> BTreeMap<String, Value> {
        let mut doc = BTreeMap::new();
        doc.insert(fields::NAME.into(), Value::from(name));
        doc.insert(fields::CONTRACT.into(), Value::from(contract));
        doc.insert(fields::MANIFEST_ADDRESS.into(), Value::from(""));
        doc.insert(
            fields::STATUS.into(),
            Value::from(PublicationStatus::Pending.as_str()),
        );
        doc
    }
}
