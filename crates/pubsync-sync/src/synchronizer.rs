use std::collections::HashMap;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use pubsync_diff::{diff_manifests, HashedFile, ManifestDiffEngine};
use pubsync_manifest::{Manifest, ManifestAggregator, ManifestError, PublicationMetadata};
use pubsync_source::{SourceError, SourceTree};
use pubsync_store::{ContentStore, StoreError};
use pubsync_template::TemplateRewriter;
use pubsync_types::{
    fields, Category, ContentAddress, FetchedFile, ManifestEntry, PublicationState,
    PublicationStatus, SourceFile, TemplateEntry,
};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationFlag;
use crate::config::SyncConfig;
use crate::document::DocumentStore;
use crate::error::{SyncError, SyncResult};
use crate::governance::{Availability, GovernanceClient, ProposalId};
use crate::progress::{ProgressEvent, ProgressSink, TracingProgress};
use crate::report::{CategoryReport, SyncReport};
use crate::state::SyncPhase;

/// Orchestrates synchronization passes for publications.
///
/// Categories are processed strictly in order (assets, stylesheets,
/// templates) since templates are rewritten against the addresses resolved
/// before them. Within a category, at most `concurrency` fetch-and-hash
/// operations run at once; results keep listing order. Only one pass per
/// publication runs at a time, enforced by the document store's writer
/// lock.
pub struct PublicationSynchronizer {
    config: SyncConfig,
    source: Arc<dyn SourceTree>,
    store: Arc<dyn ContentStore>,
    documents: Arc<dyn DocumentStore>,
    governance: Arc<dyn GovernanceClient>,
    progress: Arc<dyn ProgressSink>,
}

/// Reconciled entries of one category, plus what the report needs.
struct CategoryOutcome {
    entries: Vec<ManifestEntry>,
    bodies: HashMap<String, String>,
    report: CategoryReport,
}

impl PublicationSynchronizer {
    pub fn new(
        config: SyncConfig,
        source: Arc<dyn SourceTree>,
        store: Arc<dyn ContentStore>,
        documents: Arc<dyn DocumentStore>,
        governance: Arc<dyn GovernanceClient>,
    ) -> Self {
        Self {
            config,
            source,
            store,
            documents,
            governance,
            progress: Arc::new(TracingProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one pass for `document_id`.
    ///
    /// On success the document records the new manifest address with
    /// `status = ok` and a proposal has been submitted. On any failure
    /// before publishing the previous manifest address stays in place and
    /// `status = failed`. A failed proposal also sets `status = failed` but
    /// keeps the new, already durable, manifest address. A cancelled pass
    /// writes nothing to the document.
    pub async fn synchronize(
        &self,
        document_id: &str,
        cancel: &CancellationFlag,
    ) -> SyncResult<SyncReport> {
        let _lock = self.documents.lock(document_id).await?;
        let mut tracker = PhaseTracker::new(self.progress.as_ref());
        info!(document = document_id, "synchronization started");

        match self.run_pass(document_id, cancel, &mut tracker).await {
            Ok(report) => {
                tracker.advance(SyncPhase::Succeeded);
                info!(
                    document = document_id,
                    manifest = %report.manifest_address.short_hex(),
                    uploads = report.uploads(),
                    changes = report.changes.len(),
                    proposal = %report.proposal,
                    "synchronization succeeded"
                );
                Ok(report)
            }
            Err(e) => {
                let phase = tracker.phase();
                tracker.advance(SyncPhase::Failed);
                error!(
                    document = document_id,
                    %phase,
                    category = ?e.category(),
                    path = e.path().unwrap_or("-"),
                    error = %e,
                    "synchronization failed"
                );
                if !matches!(e, SyncError::Cancelled) {
                    self.mark_failed(document_id).await;
                }
                Err(e)
            }
        }
    }

    /// Run passes until one succeeds, a non-retryable error occurs, or
    /// `max_attempts` passes have failed. Every retry restarts from the
    /// first category; already stored content is not uploaded again.
    pub async fn synchronize_with_retry(
        &self,
        document_id: &str,
        cancel: &CancellationFlag,
    ) -> SyncResult<SyncReport> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.synchronize(document_id, cancel).await {
                Ok(mut report) => {
                    report.attempts = attempt;
                    return Ok(report);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts && !cancel.is_cancelled() => {
                    warn!(document = document_id, attempt, max_attempts, error = %e, "retrying synchronization");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Propose admitting `author` as a writer of the publication's
    /// contract. Goes through the same governance seam as manifest updates;
    /// the document is only read.
    pub async fn propose_author(&self, document_id: &str, author: &str) -> SyncResult<ProposalId> {
        let author = author.trim();
        if author.is_empty() || author.chars().any(char::is_whitespace) {
            return Err(SyncError::InvalidAuthor(author.to_string()));
        }
        let state = PublicationState::from_fields(&self.documents.read(document_id).await?);
        if state.contract.trim().is_empty() {
            return Err(ManifestError::MissingField(fields::CONTRACT).into());
        }
        if let Availability::Unavailable(reason) = self.governance.availability().await {
            return Err(SyncError::Unavailable(reason));
        }

        let proposal = self
            .governance
            .propose(&state.contract, &self.config.author_method, &[author.to_string()])
            .await
            .map_err(SyncError::Proposal)?;
        info!(document = document_id, author, %proposal, "author proposed");
        Ok(proposal)
    }

    async fn run_pass(
        &self,
        document_id: &str,
        cancel: &CancellationFlag,
        tracker: &mut PhaseTracker<'_>,
    ) -> SyncResult<SyncReport> {
        let doc = self.documents.read(document_id).await?;
        let state = PublicationState::from_fields(&doc);
        let mut metadata = PublicationMetadata::from_fields(&doc)?;
        if metadata.assets_gateway.is_empty() {
            metadata.assets_gateway = self.config.gateway.clone();
        }
        metadata.validate()?;

        if let Availability::Unavailable(reason) = self.governance.availability().await {
            return Err(SyncError::Unavailable(reason));
        }
        let rewriter = TemplateRewriter::new(metadata.assets_gateway.as_str())?;
        let previous = self.load_previous(state.manifest_address.as_ref()).await?;
        let existing = |category: Category| {
            previous
                .as_ref()
                .map(|m| m.entries(category))
                .unwrap_or_default()
        };

        tracker.advance(SyncPhase::fetching(Category::Assets));
        let assets = self
            .sync_category(Category::Assets, &existing(Category::Assets), Ok)
            .await?;
        ensure_not_cancelled(cancel)?;

        tracker.advance(SyncPhase::fetching(Category::Stylesheets));
        let stylesheets = self
            .sync_category(Category::Stylesheets, &existing(Category::Stylesheets), Ok)
            .await?;
        ensure_not_cancelled(cancel)?;

        tracker.advance(SyncPhase::fetching(Category::Templates));
        let stylesheet = stylesheets.entries.first().map(|e| e.content_address);
        let rewrite = |file: FetchedFile| -> SyncResult<FetchedFile> {
            let stylesheet = stylesheet
                .as_ref()
                .filter(|_| self.config.is_head_template(&file.path));
            let body =
                rewriter.rewrite_bytes(&file.path, &file.bytes, stylesheet, &assets.entries)?;
            Ok(FetchedFile::new(file.path, body))
        };
        let templates = self
            .sync_category(Category::Templates, &existing(Category::Templates), rewrite)
            .await?;
        let template_entries: Vec<TemplateEntry> = templates
            .entries
            .iter()
            .map(|entry| {
                let body = templates
                    .bodies
                    .get(&entry.path)
                    .cloned()
                    .or_else(|| previous_body(previous.as_ref(), &entry.path));
                TemplateEntry::new(entry.clone(), body)
            })
            .collect();

        tracker.advance(SyncPhase::Aggregating);
        if let Some(mapping) = self.fetch_mapping().await? {
            metadata.mapping = Some(mapping);
        }
        let template_set_address =
            ManifestAggregator::build_template_set(self.store.as_ref(), &template_entries)
                .await
                .map_err(|e| aggregation_error(e, "template set"))?;
        let manifest = ManifestAggregator::build_manifest(
            &metadata,
            &assets.entries,
            &stylesheets.entries,
            &template_entries,
            template_set_address,
        )?;
        let manifest_address = ManifestAggregator::publish(self.store.as_ref(), &manifest)
            .await
            .map_err(|e| aggregation_error(e, "manifest"))?;

        ensure_not_cancelled(cancel)?;
        tracker.advance(SyncPhase::Publishing);
        self.record_pointer(document_id, &manifest_address).await?;
        let proposal = self
            .governance
            .propose(
                &metadata.contract,
                &self.config.proposal_method,
                &[manifest_address.to_hex()],
            )
            .await
            .map_err(SyncError::Proposal)?;

        let changes = diff_manifests(
            &previous.as_ref().map(all_entries).unwrap_or_default(),
            &all_entries(&manifest),
        );
        Ok(SyncReport {
            document: document_id.to_string(),
            previous_manifest: state.manifest_address,
            manifest_address,
            template_set_address,
            categories: vec![assets.report, stylesheets.report, templates.report],
            changes,
            proposal,
            attempts: 1,
        })
    }

    /// List, fetch, hash, reconcile, and upload one category.
    async fn sync_category<F>(
        &self,
        category: Category,
        existing: &[ManifestEntry],
        prepare: F,
    ) -> SyncResult<CategoryOutcome>
    where
        F: Fn(FetchedFile) -> SyncResult<FetchedFile> + Sync,
    {
        let files = self.list(category).await?;
        debug!(%category, files = files.len(), "listed");

        let prepare = &prepare;
        let concurrency = self.config.concurrency.max(1);
        let hashed: Vec<HashedFile> = stream::iter(files)
            .map(|file| async move {
                let bytes = self.source.fetch(&file.url).await.map_err(|source| SyncError::Fetch {
                    category: Some(category),
                    path: file.path.clone(),
                    source,
                })?;
                let fetched = prepare(FetchedFile::new(file.path, bytes))?;
                let address = self.store.hash(&fetched.bytes).await.map_err(|source| {
                    SyncError::Store {
                        category: Some(category),
                        path: fetched.path.clone(),
                        source,
                    }
                })?;
                Ok::<_, SyncError>(HashedFile::new(fetched.path, fetched.bytes, address))
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        let bodies: HashMap<String, String> = match category {
            Category::Templates => hashed
                .iter()
                .filter_map(|f| {
                    std::str::from_utf8(&f.bytes)
                        .ok()
                        .map(|body| (f.path.clone(), body.to_string()))
                })
                .collect(),
            _ => HashMap::new(),
        };

        let reconciliation = ManifestDiffEngine::reconcile(existing, hashed);
        for decision in &reconciliation.decisions {
            self.progress.report(ProgressEvent::Decided {
                category,
                path: decision.path.clone(),
                action: decision.action.clone(),
            });
        }
        for entry in &reconciliation.stale {
            warn!(%category, path = %entry.path, "source file gone; entry kept");
        }

        let uploaded: Vec<ContentAddress> = stream::iter(reconciliation.to_upload.iter().cloned())
            .map(|file| async move {
                let address = self.store.put(file.bytes.clone()).await.map_err(|source| {
                    SyncError::Store {
                        category: Some(category),
                        path: file.path.clone(),
                        source,
                    }
                })?;
                if address != file.address {
                    return Err(SyncError::Store {
                        category: Some(category),
                        path: file.path,
                        source: StoreError::HashMismatch {
                            address: file.address,
                            computed: address,
                        },
                    });
                }
                self.progress.report(ProgressEvent::Uploaded {
                    category,
                    path: file.path,
                    address,
                });
                Ok::<_, SyncError>(address)
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        let report = CategoryReport::new(category, &reconciliation, uploaded);
        let summary = report.summary;
        info!(
            %category,
            unchanged = summary.unchanged,
            relinked = summary.relinked,
            replaced = summary.replaced,
            added = summary.added,
            stale = summary.stale,
            "category reconciled"
        );
        Ok(CategoryOutcome {
            entries: reconciliation.final_entries,
            bodies,
            report,
        })
    }

    async fn list(&self, category: Category) -> SyncResult<Vec<SourceFile>> {
        let listed = self
            .source
            .list(category)
            .await
            .map_err(|source| SyncError::Fetch {
                category: Some(category),
                path: self.config.folders.folder(category).to_string(),
                source,
            })?;
        Ok(match category {
            Category::Stylesheets => listed
                .into_iter()
                .filter(|file| {
                    file.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.config.stylesheet_extension))
                })
                .collect(),
            _ => listed,
        })
    }

    /// The manifest recorded by the last successful pass, if it can be
    /// read. A missing or undecodable manifest starts the pass from scratch.
    async fn load_previous(&self, address: Option<&ContentAddress>) -> SyncResult<Option<Manifest>> {
        let Some(address) = address else {
            return Ok(None);
        };
        match self.store.get_structured(address).await {
            Ok(Some(value)) => match Manifest::from_value(value) {
                Ok(manifest) => Ok(Some(manifest)),
                Err(e) => {
                    warn!(address = %address.short_hex(), error = %e, "previous manifest unreadable; starting empty");
                    Ok(None)
                }
            },
            Ok(None) => {
                warn!(address = %address.short_hex(), "previous manifest not in store; starting empty");
                Ok(None)
            }
            Err(source) => Err(SyncError::Store {
                category: None,
                path: address.to_hex(),
                source,
            }),
        }
    }

    /// Routing document from the source root, when configured and present.
    async fn fetch_mapping(&self) -> SyncResult<Option<Value>> {
        let Some(path) = self.config.mapping_path() else {
            return Ok(None);
        };
        let bytes = match self.source.fetch(&self.source.url_for(path)).await {
            Ok(bytes) => bytes,
            Err(SourceError::NotFound(_)) => {
                debug!(path, "no routing document");
                return Ok(None);
            }
            Err(source) => {
                return Err(SyncError::Fetch {
                    category: None,
                    path: path.to_string(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            SyncError::Aggregation(ManifestError::InvalidField {
                field: path.to_string(),
                reason: e.to_string(),
            })
        })
    }

    async fn record_pointer(&self, document_id: &str, address: &ContentAddress) -> SyncResult<()> {
        let synced_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.documents
            .update_field(document_id, fields::MANIFEST_ADDRESS, Value::from(address.to_hex()))
            .await?;
        self.documents
            .update_field(document_id, fields::STATUS, Value::from(PublicationStatus::Ok.as_str()))
            .await?;
        self.documents
            .update_field(document_id, fields::SYNCED_AT, Value::from(synced_at))
            .await?;
        info!(document = document_id, manifest = %address.short_hex(), "manifest pointer recorded");
        Ok(())
    }

    async fn mark_failed(&self, document_id: &str) {
        let status = Value::from(PublicationStatus::Failed.as_str());
        if let Err(e) = self
            .documents
            .update_field(document_id, fields::STATUS, status)
            .await
        {
            warn!(document = document_id, error = %e, "could not record failed status");
        }
    }
}

fn ensure_not_cancelled(cancel: &CancellationFlag) -> SyncResult<()> {
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    Ok(())
}

/// Store failures while aggregating stay retryable.
fn aggregation_error(e: ManifestError, what: &str) -> SyncError {
    match e {
        ManifestError::Store(source) => SyncError::Store {
            category: None,
            path: what.to_string(),
            source,
        },
        other => SyncError::Aggregation(other),
    }
}

fn previous_body(previous: Option<&Manifest>, path: &str) -> Option<String> {
    previous?
        .templates
        .iter()
        .find(|t| t.path() == path)
        .and_then(|t| t.body.clone())
}

fn all_entries(manifest: &Manifest) -> Vec<ManifestEntry> {
    Category::ORDERED
        .iter()
        .flat_map(|category| manifest.entries(*category))
        .collect()
}

/// Tracks the current phase and reports every transition.
struct PhaseTracker<'a> {
    phase: SyncPhase,
    progress: &'a dyn ProgressSink,
}

impl<'a> PhaseTracker<'a> {
    fn new(progress: &'a dyn ProgressSink) -> Self {
        Self {
            phase: SyncPhase::Idle,
            progress,
        }
    }

    fn phase(&self) -> SyncPhase {
        self.phase
    }

    fn advance(&mut self, next: SyncPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid phase transition {} -> {}",
            self.phase,
            next
        );
        self.phase = next;
        self.progress.report(ProgressEvent::Phase(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use pubsync_diff::EntryAction;
    use pubsync_source::{InMemorySourceTree, SourceResult};
    use pubsync_store::InMemoryContentStore;
    use tokio::sync::{Notify, Semaphore};

    use crate::document::InMemoryDocumentStore;
    use crate::error::GovernanceError;
    use crate::governance::RecordingGovernanceClient;
    use crate::progress::RecordingProgress;

    const DOC: &str = "unamore";

    struct Fixture {
        source: Arc<InMemorySourceTree>,
        store: Arc<InMemoryContentStore>,
        documents: Arc<InMemoryDocumentStore>,
        governance: Arc<RecordingGovernanceClient>,
        progress: Arc<RecordingProgress>,
    }

    impl Fixture {
        async fn new() -> Self {
            let source = InMemorySourceTree::new();
            source.insert("assets/logo.png", &b"X"[..]);
            source.insert("css/site.css", "body { color: black }");
            source.insert(
                "templates/head.handlebars",
                r#"<head><link rel="stylesheet" href=""><img id="logo" src=""></head>"#,
            );
            let documents = InMemoryDocumentStore::new();
            let mut fields = PublicationState::initial_fields(DOC, "0xabc");
            fields.insert("assets_gateway".into(), Value::from("https://gw.example"));
            documents.create(DOC, fields).await.unwrap();
            Self {
                source: Arc::new(source),
                store: Arc::new(InMemoryContentStore::new()),
                documents: Arc::new(documents),
                governance: Arc::new(RecordingGovernanceClient::new()),
                progress: Arc::new(RecordingProgress::new()),
            }
        }

        fn synchronizer(&self) -> PublicationSynchronizer {
            self.synchronizer_over(self.source.clone(), SyncConfig::default())
        }

        fn synchronizer_over(
            &self,
            source: Arc<dyn SourceTree>,
            config: SyncConfig,
        ) -> PublicationSynchronizer {
            PublicationSynchronizer::new(
                config,
                source,
                self.store.clone(),
                self.documents.clone(),
                self.governance.clone(),
            )
            .with_progress(self.progress.clone())
        }

        fn field(&self, key: &str) -> Option<Value> {
            self.documents.field(DOC, key)
        }
    }

    /// Parks the first listing until released.
    struct GatedSource {
        inner: Arc<InMemorySourceTree>,
        entered: Notify,
        gate: Semaphore,
    }

    #[async_trait]
    impl SourceTree for GatedSource {
        async fn list(&self, category: Category) -> SourceResult<Vec<SourceFile>> {
            self.entered.notify_one();
            let _permit = self.gate.acquire().await.unwrap();
            self.inner.list(category).await
        }

        async fn fetch(&self, url: &str) -> SourceResult<Bytes> {
            self.inner.fetch(url).await
        }

        fn url_for(&self, path: &str) -> String {
            self.inner.url_for(path)
        }
    }

    /// Answers fetches in reverse listing order.
    struct SlowSource {
        inner: Arc<InMemorySourceTree>,
    }

    #[async_trait]
    impl SourceTree for SlowSource {
        async fn list(&self, category: Category) -> SourceResult<Vec<SourceFile>> {
            self.inner.list(category).await
        }

        async fn fetch(&self, url: &str) -> SourceResult<Bytes> {
            let delay = match url.rsplit('/').next() {
                Some("a.png") => 60,
                Some("b.png") => 30,
                _ => 0,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.inner.fetch(url).await
        }

        fn url_for(&self, path: &str) -> String {
            self.inner.url_for(path)
        }
    }

    /// Cancels the pass as soon as it reaches `phase`.
    struct CancelAt {
        phase: SyncPhase,
        flag: CancellationFlag,
    }

    impl ProgressSink for CancelAt {
        fn report(&self, event: ProgressEvent) {
            if event == ProgressEvent::Phase(self.phase) {
                self.flag.cancel();
            }
        }
    }

    // ----------------------------------------------------------------
    // Happy path
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn first_pass_publishes_and_proposes() {
        let f = Fixture::new().await;
        let report = f
            .synchronizer()
            .synchronize(DOC, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(f.store.put_count(), 3);
        assert_eq!(report.uploads(), 3);
        assert_eq!(report.previous_manifest, None);
        assert_eq!(
            f.field(fields::MANIFEST_ADDRESS),
            Some(Value::from(report.manifest_address.to_hex()))
        );
        assert_eq!(f.field(fields::STATUS), Some(Value::from("ok")));
        assert!(f.field(fields::SYNCED_AT).is_some());

        let proposals = f.governance.proposals();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].target, "0xabc");
        assert_eq!(proposals[0].method, "proposeUpdateConfig");
        assert_eq!(proposals[0].args, vec![report.manifest_address.to_hex()]);
        assert_eq!(proposals[0].id, report.proposal);

        assert_eq!(
            f.progress.phases(),
            vec![
                SyncPhase::FetchingAssets,
                SyncPhase::FetchingStylesheets,
                SyncPhase::FetchingTemplates,
                SyncPhase::Aggregating,
                SyncPhase::Publishing,
                SyncPhase::Succeeded,
            ]
        );
        assert_eq!(report.changes.len(), 3);
    }

    #[tokio::test]
    async fn unchanged_tree_uploads_nothing_and_keeps_address() {
        let f = Fixture::new().await;
        let sync = f.synchronizer();
        let first = sync.synchronize(DOC, &CancellationFlag::new()).await.unwrap();
        let second = sync.synchronize(DOC, &CancellationFlag::new()).await.unwrap();

        assert_eq!(f.store.put_count(), 3);
        assert_eq!(second.uploads(), 0);
        assert_eq!(second.manifest_address, first.manifest_address);
        assert!(second.is_unchanged());
        assert!(second.changes.is_empty());
        let assets = second.category(Category::Assets).unwrap();
        assert_eq!(assets.decisions[0].action, EntryAction::Unchanged);
    }

    #[tokio::test]
    async fn stylesheets_are_filtered_by_extension() {
        let f = Fixture::new().await;
        f.source.insert("css/site.css.map", "{}");
        f.source.insert("css/README.md", "notes");
        let report = f
            .synchronizer()
            .synchronize(DOC, &CancellationFlag::new())
            .await
            .unwrap();
        let stylesheets = report.category(Category::Stylesheets).unwrap();
        assert_eq!(stylesheets.decisions.len(), 1);
        assert_eq!(stylesheets.decisions[0].path, "css/site.css");
    }

    #[tokio::test]
    async fn routing_document_lands_in_manifest() {
        let f = Fixture::new().await;
        f.source.insert("mapping.json", r#"[{"path": "/", "template": "home"}]"#);
        let report = f
            .synchronizer()
            .synchronize(DOC, &CancellationFlag::new())
            .await
            .unwrap();
        let stored = f
            .store
            .get_structured(&report.manifest_address)
            .await
            .unwrap()
            .unwrap();
        let manifest = Manifest::from_value(stored).unwrap();
        assert_eq!(
            manifest.mapping,
            Some(serde_json::json!([{"path": "/", "template": "home"}]))
        );
    }

    #[tokio::test]
    async fn malformed_routing_document_fails_aggregation() {
        let f = Fixture::new().await;
        f.source.insert("mapping.json", "not json");
        let err = f
            .synchronizer()
            .synchronize(DOC, &CancellationFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Aggregation(_)));
        assert_eq!(f.field(fields::STATUS), Some(Value::from("failed")));
        assert_eq!(f.field(fields::MANIFEST_ADDRESS), Some(Value::from("")));
    }

    // ----------------------------------------------------------------
    // Guards
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn invalid_metadata_fails_before_any_fetch() {
        let f = Fixture::new().await;
        f.documents
            .update_field(DOC, fields::CONTRACT, Value::from(""))
            .await
            .unwrap();
        let err = f
            .synchronizer()
            .synchronize(DOC, &CancellationFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Aggregation(ManifestError::MissingField("contract"))));
        assert_eq!(f.source.fetch_count(), 0);
        assert_eq!(f.store.put_count(), 0);
        assert_eq!(f.field(fields::STATUS), Some(Value::from("failed")));
        assert_eq!(f.progress.phases(), vec![SyncPhase::Failed]);
    }

    #[tokio::test]
    async fn unavailable_governance_fails_before_any_fetch() {
        let f = Fixture::new().await;
        f.governance
            .set_availability(Availability::Unavailable("safe plugin missing".into()));
        let err = f
            .synchronizer()
            .synchronize(DOC, &CancellationFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Unavailable(_)));
        assert_eq!(f.source.fetch_count(), 0);
        assert_eq!(f.field(fields::STATUS), Some(Value::from("failed")));
    }

    #[tokio::test]
    async fn unknown_document_is_a_document_error() {
        let f = Fixture::new().await;
        let err = f
            .synchronizer()
            .synchronize("missing", &CancellationFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Document(_)));
    }

    #[tokio::test]
    async fn concurrent_pass_on_same_publication_is_rejected() {
        let f = Fixture::new().await;
        let gated = Arc::new(GatedSource {
            inner: f.source.clone(),
            entered: Notify::new(),
            gate: Semaphore::new(0),
        });
        let sync = f.synchronizer_over(gated.clone(), SyncConfig::default());
        let cancel = CancellationFlag::new();

        let first = sync.synchronize(DOC, &cancel);
        let second = async {
            gated.entered.notified().await;
            let result = sync.synchronize(DOC, &cancel).await;
            gated.gate.add_permits(16);
            result
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_ok());
        assert!(matches!(second, Err(SyncError::AlreadyInFlight(doc)) if doc == DOC));
        // Released once the first pass is done.
        assert!(sync.synchronize(DOC, &cancel).await.is_ok());
        assert_eq!(f.field(fields::STATUS), Some(Value::from("ok")));
    }

    #[tokio::test]
    async fn cancellation_before_publishing_writes_nothing() {
        let f = Fixture::new().await;
        let cancel = CancellationFlag::new();
        let sync = f
            .synchronizer()
            .with_progress(Arc::new(CancelAt {
                phase: SyncPhase::Aggregating,
                flag: cancel.clone(),
            }));

        let err = sync.synchronize(DOC, &cancel).await.unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
        assert_eq!(f.store.put_count(), 3);
        assert_eq!(f.field(fields::MANIFEST_ADDRESS), Some(Value::from("")));
        assert_eq!(f.field(fields::STATUS), Some(Value::from("pending")));
        assert!(f.governance.proposals().is_empty());
    }

    // ----------------------------------------------------------------
    // Ordering
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn results_keep_listing_order_under_concurrency() {
        let f = Fixture::new().await;
        f.source.insert("assets/a.png", &b"A"[..]);
        f.source.insert("assets/b.png", &b"B"[..]);
        f.source.insert("assets/c.png", &b"C"[..]);
        let slow = Arc::new(SlowSource {
            inner: f.source.clone(),
        });
        let config = SyncConfig {
            concurrency: 4,
            ..SyncConfig::default()
        };
        let report = f
            .synchronizer_over(slow, config)
            .synchronize(DOC, &CancellationFlag::new())
            .await
            .unwrap();

        let assets = report.category(Category::Assets).unwrap();
        let paths: Vec<_> = assets.decisions.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["assets/a.png", "assets/b.png", "assets/c.png", "assets/logo.png"]
        );
    }

    // ----------------------------------------------------------------
    // Authors
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn author_proposal_targets_the_contract() {
        let f = Fixture::new().await;
        let sync = f.synchronizer();
        let id = sync.propose_author(DOC, " 0xauthor ").await.unwrap();

        let proposals = f.governance.proposals();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].id, id);
        assert_eq!(proposals[0].target, "0xabc");
        assert_eq!(proposals[0].method, "proposeWhitelistAuthor");
        assert_eq!(proposals[0].args, vec!["0xauthor"]);
        assert_eq!(f.field(fields::STATUS), Some(Value::from("pending")));
        assert_eq!(f.source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn author_proposal_checks_its_inputs() {
        let f = Fixture::new().await;
        let sync = f.synchronizer();
        assert!(matches!(
            sync.propose_author(DOC, "0x a").await,
            Err(SyncError::InvalidAuthor(_))
        ));
        assert!(matches!(
            sync.propose_author("missing", "0xauthor").await,
            Err(SyncError::Document(_))
        ));

        f.governance.set_rejection(Some("not an owner".into()));
        assert!(matches!(
            sync.propose_author(DOC, "0xauthor").await,
            Err(SyncError::Proposal(GovernanceError::Rejected(_)))
        ));
        assert!(f.governance.proposals().is_empty());
    }
}
