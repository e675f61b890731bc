use std::collections::BTreeMap;

use pubsync_types::fields;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ManifestError, ManifestResult};

/// Document keys interpreted as metadata. Everything else lands in
/// [`PublicationMetadata::custom`].
pub mod keys {
    pub const OWNERS: &str = "owners";
    pub const ASSETS_GATEWAY: &str = "assets_gateway";
    pub const DATA_GATEWAY: &str = "data_gateway";
    pub const RPC: &str = "rpc";
    pub const DOMAINS: &str = "domains";
    pub const MAPPING: &str = "mapping";
}

/// Keys owned by the synchronizer. They describe the previous pass and
/// must never feed into the next manifest.
const STATE_KEYS: [&str; 3] = [fields::MANIFEST_ADDRESS, fields::STATUS, fields::SYNCED_AT];

/// Naming, ownership, and routing of a publication.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicationMetadata {
    pub name: String,
    pub contract: String,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub assets_gateway: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc: Option<String>,
    /// Domain records. Their shape belongs to the hosting side, so they are
    /// carried as-is.
    #[serde(default)]
    pub domains: Vec<Value>,
    /// Routing table, usually the site's `mapping.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<Value>,
    /// Extra document fields, carried through untouched.
    #[serde(default)]
    pub custom: BTreeMap<String, Value>,
}

impl PublicationMetadata {
    /// Build metadata from a publication document's open field map.
    ///
    /// `owners` may be a list of strings or one comma separated string.
    /// `domains` entries are kept opaque. Synchronizer state keys are
    /// dropped.
    pub fn from_fields(doc: &BTreeMap<String, Value>) -> ManifestResult<Self> {
        let mut metadata = Self::default();
        for (key, value) in doc {
            match key.as_str() {
                fields::NAME => metadata.name = string_field(fields::NAME, value)?,
                fields::CONTRACT => metadata.contract = string_field(fields::CONTRACT, value)?,
                keys::OWNERS => metadata.owners = list_field(keys::OWNERS, value)?,
                keys::ASSETS_GATEWAY => {
                    metadata.assets_gateway = string_field(keys::ASSETS_GATEWAY, value)?
                }
                keys::DATA_GATEWAY => {
                    metadata.data_gateway = optional_string(keys::DATA_GATEWAY, value)?
                }
                keys::RPC => metadata.rpc = optional_string(keys::RPC, value)?,
                keys::DOMAINS => metadata.domains = opaque_list(keys::DOMAINS, value)?,
                keys::MAPPING => {
                    metadata.mapping = (!value.is_null()).then(|| value.clone());
                }
                k if STATE_KEYS.contains(&k) => {}
                _ => {
                    metadata.custom.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(metadata)
    }

    /// Check that every field a manifest needs is present.
    pub fn validate(&self) -> ManifestResult<()> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::MissingField(fields::NAME));
        }
        if self.contract.trim().is_empty() {
            return Err(ManifestError::MissingField(fields::CONTRACT));
        }
        if self.assets_gateway.trim().is_empty() {
            return Err(ManifestError::MissingField(keys::ASSETS_GATEWAY));
        }
        Ok(())
    }
}

fn string_field(field: &str, value: &Value) -> ManifestResult<String> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Null => Ok(String::new()),
        other => Err(ManifestError::InvalidField {
            field: field.to_string(),
            reason: format!("expected a string, got {other}"),
        }),
    }
}

fn optional_string(field: &str, value: &Value) -> ManifestResult<Option<String>> {
    let s = string_field(field, value)?;
    Ok((!s.is_empty()).then_some(s))
}

fn list_field(field: &str, value: &Value) -> ManifestResult<Vec<String>> {
    let items: Vec<String> = match value {
        Value::Null => Vec::new(),
        Value::String(s) => s.split(',').map(|item| item.trim().to_string()).collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| string_field(field, item))
            .collect::<ManifestResult<_>>()?,
        other => {
            return Err(ManifestError::InvalidField {
                field: field.to_string(),
                reason: format!("expected a list or a comma separated string, got {other}"),
            })
        }
    };
    Ok(items.into_iter().filter(|item| !item.is_empty()).collect())
}

/// A list whose items are not interpreted. A bare string is split on
/// commas, a single object becomes a one-item list.
fn opaque_list(field: &str, value: &Value) -> ManifestResult<Vec<Value>> {
    let items = match value {
        Value::Null => Vec::new(),
        Value::String(_) => list_field(field, value)?
            .into_iter()
            .map(Value::from)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter(|item| match item {
                Value::Null => false,
                Value::String(s) => !s.trim().is_empty(),
                _ => true,
            })
            .cloned()
            .collect(),
        Value::Object(_) => vec![value.clone()],
        other => {
            return Err(ManifestError::InvalidField {
                field: field.to_string(),
                reason: format!("expected a list, got {other}"),
            })
        }
    };
    Ok(items)
}
