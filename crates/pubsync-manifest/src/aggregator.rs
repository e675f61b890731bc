use std::collections::HashSet;

use pubsync_store::ContentStore;
use pubsync_types::{Category, ContentAddress, ManifestEntry, TemplateEntry};
use tracing::info;

use crate::error::{ManifestError, ManifestResult};
use crate::manifest::Manifest;
use crate::metadata::PublicationMetadata;

/// Assembles and content-addresses manifests.
///
/// Only fully reconciled category lists reach the aggregator; a manifest is
/// never built from a partial pass.
pub struct ManifestAggregator;

impl ManifestAggregator {
    /// Content-address the template list as one unit.
    ///
    /// Templates are ordered by path first, so the address depends only on
    /// which templates exist and what they contain.
    pub async fn build_template_set(
        store: &dyn ContentStore,
        templates: &[TemplateEntry],
    ) -> ManifestResult<ContentAddress> {
        let mut ordered = templates.to_vec();
        ordered.sort_by(|a, b| a.path().cmp(b.path()));
        let value = serde_json::to_value(&ordered)?;
        Ok(store.put_structured(&value).await?)
    }

    /// Assemble a manifest. Pure: identical inputs in any order give an
    /// identical manifest.
    pub fn build_manifest(
        metadata: &PublicationMetadata,
        assets: &[ManifestEntry],
        stylesheets: &[ManifestEntry],
        templates: &[TemplateEntry],
        template_set_address: ContentAddress,
    ) -> ManifestResult<Manifest> {
        metadata.validate()?;

        let mut assets = assets.to_vec();
        let mut stylesheets = stylesheets.to_vec();
        let mut templates = templates.to_vec();
        assets.sort_by(|a, b| a.path.cmp(&b.path));
        stylesheets.sort_by(|a, b| a.path.cmp(&b.path));
        templates.sort_by(|a, b| a.path().cmp(b.path()));

        check_unique_paths(Category::Assets, assets.iter().map(|e| e.path.as_str()))?;
        check_unique_paths(Category::Stylesheets, stylesheets.iter().map(|e| e.path.as_str()))?;
        check_unique_paths(Category::Templates, templates.iter().map(|t| t.path()))?;

        Ok(Manifest {
            name: metadata.name.clone(),
            contract: metadata.contract.clone(),
            owners: metadata.owners.clone(),
            assets_gateway: metadata.assets_gateway.clone(),
            data_gateway: metadata.data_gateway.clone(),
            rpc: metadata.rpc.clone(),
            domains: metadata.domains.clone(),
            mapping: metadata.mapping.clone(),
            assets,
            stylesheets,
            templates,
            template_set_address,
            custom: metadata.custom.clone(),
        })
    }

    /// Store the manifest and return its address.
    pub async fn publish(
        store: &dyn ContentStore,
        manifest: &Manifest,
    ) -> ManifestResult<ContentAddress> {
        let address = store.put_structured(&manifest.to_value()?).await?;
        info!(
            name = %manifest.name,
            address = %address.short_hex(),
            entries = manifest.entry_count(),
            "manifest stored"
        );
        Ok(address)
    }
}

fn check_unique_paths<'a>(
    category: Category,
    paths: impl IntoIterator<Item = &'a str>,
) -> ManifestResult<()> {
    let mut seen = HashSet::new();
    for path in paths {
        if !seen.insert(path) {
            return Err(ManifestError::DuplicatePath {
                category,
                path: path.to_string(),
            });
        }
    }
    Ok(())
}
