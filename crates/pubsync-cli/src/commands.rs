use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use pubsync_manifest::Manifest;
use pubsync_source::LocalSourceTree;
use pubsync_store::{ContentStore, FsContentStore};
use pubsync_sync::{
    CancellationFlag, DocumentStore, FsDocumentStore, OutboxGovernanceClient,
    PublicationSynchronizer, SyncConfig, SyncError, SyncReport,
};
use pubsync_types::{fields, Category, PublicationState, PublicationStatus};
use serde_json::Value;
use tracing::debug;

use crate::cli::*;

const DEFAULT_CONFIG: &str = "pubsync.toml";

/// Layout of the working directory.
struct Workdir {
    root: PathBuf,
}

impl Workdir {
    fn new(root: &Path) -> Self {
        Self { root: root.to_path_buf() }
    }

    fn documents(&self) -> anyhow::Result<FsDocumentStore> {
        let dir = self.root.join("documents");
        FsDocumentStore::open(&dir).with_context(|| format!("opening {}", dir.display()))
    }

    fn objects(&self) -> anyhow::Result<FsContentStore> {
        let dir = self.root.join("objects");
        FsContentStore::open(&dir).with_context(|| format!("opening {}", dir.display()))
    }

    fn outbox(&self) -> OutboxGovernanceClient {
        OutboxGovernanceClient::new(self.root.join("outbox").join("proposals.jsonl"))
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let workdir = Workdir::new(&cli.workdir);
    match cli.command {
        Command::Init(args) => cmd_init(&workdir, args).await,
        Command::Publish(args) => {
            let config = load_config(cli.config.as_deref())?;
            debug!(?config, workdir = %cli.workdir.display(), "configuration loaded");
            cmd_publish(&workdir, config, args, cli.format).await
        }
        Command::Status(args) => cmd_status(&workdir, args, cli.format).await,
        Command::Show(args) => cmd_show(&workdir, args, cli.format).await,
        Command::WhitelistAuthor(args) => {
            let config = load_config(cli.config.as_deref())?;
            cmd_whitelist_author(&workdir, config, args).await
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SyncConfig> {
    match path {
        Some(path) => {
            SyncConfig::load(path).with_context(|| format!("loading {}", path.display()))
        }
        None if Path::new(DEFAULT_CONFIG).exists() => SyncConfig::load(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("loading {DEFAULT_CONFIG}")),
        None => Ok(SyncConfig::default()),
    }
}

async fn cmd_init(workdir: &Workdir, args: InitArgs) -> anyhow::Result<()> {
    let mut doc = PublicationState::initial_fields(&args.name, &args.contract);
    if !args.owners.is_empty() {
        doc.insert(
            pubsync_manifest::metadata::keys::OWNERS.into(),
            Value::from(args.owners.clone()),
        );
    }
    if let Some(gateway) = &args.gateway {
        doc.insert(
            pubsync_manifest::metadata::keys::ASSETS_GATEWAY.into(),
            Value::from(gateway.as_str()),
        );
    }

    let documents = workdir.documents()?;
    documents
        .create(&args.name, doc)
        .await
        .with_context(|| format!("creating publication {}", args.name))?;

    println!("{} Initialized publication {}", "✓".green().bold(), args.name.bold());
    println!("  Contract: {}", args.contract.cyan());
    if !args.owners.is_empty() {
        println!("  Owners: {}", args.owners.join(", "));
    }
    println!("  Status: {}", PublicationStatus::Pending.as_str().yellow());
    Ok(())
}

async fn cmd_publish(
    workdir: &Workdir,
    config: SyncConfig,
    args: PublishArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let source = LocalSourceTree::with_layout(&args.source, config.folders.clone());
    let synchronizer = PublicationSynchronizer::new(
        config,
        Arc::new(source),
        Arc::new(workdir.objects()?),
        Arc::new(workdir.documents()?),
        Arc::new(workdir.outbox()),
    );

    let cancel = CancellationFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match synchronizer.synchronize_with_retry(&args.name, &cancel).await {
        Ok(report) => match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(())
            }
            OutputFormat::Text => {
                print_report(&report);
                Ok(())
            }
        },
        Err(SyncError::Proposal(e)) => {
            println!(
                "{} Manifest recorded but the proposal was not submitted",
                "!".yellow().bold()
            );
            Err(anyhow::Error::new(e).context(format!("proposing update for {}", args.name)))
        }
        Err(SyncError::Cancelled) => {
            println!("{} Cancelled; publication left untouched", "✗".red().bold());
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("publishing {}", args.name))),
    }
}

async fn cmd_whitelist_author(
    workdir: &Workdir,
    config: SyncConfig,
    args: WhitelistAuthorArgs,
) -> anyhow::Result<()> {
    let method = config.author_method.clone();
    let source = LocalSourceTree::with_layout(".", config.folders.clone());
    let synchronizer = PublicationSynchronizer::new(
        config,
        Arc::new(source),
        Arc::new(workdir.objects()?),
        Arc::new(workdir.documents()?),
        Arc::new(workdir.outbox()),
    );

    let proposal = synchronizer
        .propose_author(&args.name, &args.author)
        .await
        .with_context(|| format!("proposing author for {}", args.name))?;
    println!(
        "{} Proposed {} as author of {}",
        "✓".green().bold(),
        args.author.trim().cyan(),
        args.name.bold()
    );
    println!("  Method: {method}");
    println!("  Proposal: {}", proposal.to_string().blue());
    Ok(())
}

fn print_report(report: &SyncReport) {
    let headline = if report.is_unchanged() { "unchanged".dimmed() } else { "updated".green() };
    println!("{} Published {} ({})", "✓".green().bold(), report.document.bold(), headline);
    println!("  Manifest: {}", report.manifest_address.to_hex().yellow());
    println!("  Template set: {}", report.template_set_address.short_hex().cyan());
    for category in &report.categories {
        let s = &category.summary;
        println!(
            "  {:<12} {} unchanged, {} relinked, {} replaced, {} added, {} stale",
            category.category.as_str(),
            s.unchanged,
            s.relinked,
            s.replaced,
            s.added,
            s.stale,
        );
        for entry in &category.stale {
            println!("    {} {}", "stale:".yellow(), entry.path);
        }
    }
    for change in &report.changes.changes {
        println!("    {}", serde_json::to_string(change).unwrap_or_default().dimmed());
    }
    println!("  Uploads: {}", report.uploads().to_string().bold());
    if report.attempts > 1 {
        println!("  Attempts: {}", report.attempts);
    }
    println!("  Proposal: {}", report.proposal.to_string().blue());
}

async fn load_state(workdir: &Workdir, name: &str) -> anyhow::Result<PublicationState> {
    let doc = workdir
        .documents()?
        .read(name)
        .await
        .with_context(|| format!("reading publication {name}"))?;
    Ok(PublicationState::from_fields(&doc))
}

async fn cmd_status(workdir: &Workdir, args: StatusArgs, format: OutputFormat) -> anyhow::Result<()> {
    let state = load_state(workdir, &args.name).await?;
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    let status = match state.status {
        PublicationStatus::Ok => state.status.as_str().green(),
        PublicationStatus::Failed => state.status.as_str().red(),
        PublicationStatus::Pending => state.status.as_str().yellow(),
    };
    println!("Publication {}", state.name.bold());
    println!("  Contract: {}", state.contract.cyan());
    println!("  Status: {status}");
    match state.manifest_address {
        Some(address) => println!("  Manifest: {}", address.to_hex().yellow()),
        None => println!("  Manifest: {}", "none".dimmed()),
    }
    if let Some(synced_at) = &state.synced_at {
        println!("  Synced at: {synced_at}");
    }
    Ok(())
}

async fn cmd_show(workdir: &Workdir, args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let state = load_state(workdir, &args.name).await?;
    let Some(address) = state.manifest_address else {
        bail!("publication {} has no {} yet", args.name, fields::MANIFEST_ADDRESS);
    };
    let store = workdir.objects()?;
    let value = store
        .get_structured(&address)
        .await?
        .with_context(|| format!("manifest {} is not in the store", address.short_hex()))?;
    let manifest = Manifest::from_value(value)?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&manifest.to_value()?)?);
        return Ok(());
    }

    println!("Manifest {} for {}", address.short_hex().yellow().bold(), manifest.name.bold());
    println!("  Gateway: {}", manifest.assets_gateway);
    println!("  Template set: {}", manifest.template_set_address.short_hex().cyan());
    for category in Category::ORDERED {
        let entries = manifest.entries(category);
        println!("  {} ({})", category.as_str().bold(), entries.len());
        for entry in entries {
            println!("    {}  {}", entry.content_address.short_hex().dimmed(), entry.path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_args(name: &str) -> InitArgs {
        InitArgs {
            name: name.into(),
            contract: "0xabc".into(),
            owners: vec!["0x1".into(), "0x2".into()],
            gateway: Some("https://gw.example/objects".into()),
        }
    }

    #[tokio::test]
    async fn init_writes_a_pending_document() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = Workdir::new(dir.path());
        cmd_init(&workdir, init_args("unamore")).await.unwrap();

        let state = load_state(&workdir, "unamore").await.unwrap();
        assert_eq!(state.contract, "0xabc");
        assert_eq!(state.status, PublicationStatus::Pending);
        assert_eq!(state.manifest_address, None);

        let doc = workdir.documents().unwrap().read("unamore").await.unwrap();
        assert_eq!(doc["owners"], serde_json::json!(["0x1", "0x2"]));
        assert_eq!(doc["assets_gateway"], serde_json::json!("https://gw.example/objects"));

        assert!(cmd_init(&workdir, init_args("unamore")).await.is_err());
    }

    #[tokio::test]
    async fn show_needs_a_published_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = Workdir::new(dir.path());
        cmd_init(&workdir, init_args("unamore")).await.unwrap();
        let args = ShowArgs { name: "unamore".into() };
        assert!(cmd_show(&workdir, args, OutputFormat::Text).await.is_err());
    }

    #[test]
    fn explicit_config_must_exist() {
        assert!(load_config(Some(Path::new("/nonexistent/pubsync.toml"))).is_err());
    }

    #[tokio::test]
    async fn whitelist_author_queues_a_proposal() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = Workdir::new(dir.path());
        cmd_init(&workdir, init_args("unamore")).await.unwrap();

        let args = WhitelistAuthorArgs { name: "unamore".into(), author: "0x7".into() };
        cmd_whitelist_author(&workdir, SyncConfig::default(), args).await.unwrap();

        let queued = workdir.outbox().read_all().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].target, "0xabc");
        assert_eq!(queued[0].method, "proposeWhitelistAuthor");
        assert_eq!(queued[0].args, vec!["0x7"]);
        let state = load_state(&workdir, "unamore").await.unwrap();
        assert_eq!(state.status, PublicationStatus::Pending);

        let args = WhitelistAuthorArgs { name: "missing".into(), author: "0x7".into() };
        assert!(cmd_whitelist_author(&workdir, SyncConfig::default(), args).await.is_err());
    }

    #[tokio::test]
    async fn publish_then_show_from_a_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let site = dir.path().join("site");
        std::fs::create_dir_all(site.join("assets")).unwrap();
        std::fs::create_dir_all(site.join("css")).unwrap();
        std::fs::create_dir_all(site.join("templates")).unwrap();
        std::fs::write(site.join("assets/logo.png"), b"PNG").unwrap();
        std::fs::write(site.join("css/site.css"), b"body{}").unwrap();
        std::fs::write(
            site.join("templates/head.html"),
            b"<link rel=\"stylesheet\" href=\"x\"><img id=\"logo\" src=\"x\">",
        )
        .unwrap();

        let workdir = Workdir::new(&dir.path().join("work"));
        cmd_init(&workdir, init_args("unamore")).await.unwrap();
        let args = PublishArgs { name: "unamore".into(), source: site };
        cmd_publish(&workdir, SyncConfig::default(), args, OutputFormat::Text)
            .await
            .unwrap();

        let state = load_state(&workdir, "unamore").await.unwrap();
        assert_eq!(state.status, PublicationStatus::Ok);
        assert!(state.manifest_address.is_some());
        assert_eq!(workdir.outbox().read_all().await.unwrap().len(), 1);

        let args = ShowArgs { name: "unamore".into() };
        cmd_show(&workdir, args, OutputFormat::Json).await.unwrap();
    }
}
