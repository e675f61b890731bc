use std::collections::BTreeMap;

use pubsync_types::{Category, ContentAddress, ManifestEntry, TemplateEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ManifestError, ManifestResult};

/// Aggregate description of one published version of a site.
///
/// Category lists are sorted by path, so two manifests built from the same
/// inputs serialize to the same bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub contract: String,
    #[serde(default)]
    pub owners: Vec<String>,
    pub assets_gateway: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc: Option<String>,
    #[serde(default)]
    pub domains: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<Value>,
    #[serde(default)]
    pub assets: Vec<ManifestEntry>,
    #[serde(default)]
    pub stylesheets: Vec<ManifestEntry>,
    #[serde(default)]
    pub templates: Vec<TemplateEntry>,
    pub template_set_address: ContentAddress,
    #[serde(default)]
    pub custom: BTreeMap<String, Value>,
}

impl Manifest {
    /// Decode a manifest loaded from the content store.
    pub fn from_value(value: Value) -> ManifestResult<Self> {
        serde_json::from_value(value).map_err(|e| ManifestError::Decode(e.to_string()))
    }

    pub fn to_value(&self) -> ManifestResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Entries of one category, template bodies stripped.
    pub fn entries(&self, category: Category) -> Vec<ManifestEntry> {
        match category {
            Category::Assets => self.assets.clone(),
            Category::Stylesheets => self.stylesheets.clone(),
            Category::Templates => self.templates.iter().map(|t| t.entry.clone()).collect(),
        }
    }

    /// Total number of entries across all categories.
    pub fn entry_count(&self) -> usize {
        self.assets.len() + self.stylesheets.len() + self.templates.len()
    }
}
