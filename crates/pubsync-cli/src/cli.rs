use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "pubsync",
    about = "Publish a static site into content-addressed storage",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Synchronizer settings (TOML). Defaults to ./pubsync.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding publication documents, stored objects, and the
    /// proposal outbox.
    #[arg(long, global = true, default_value = ".pubsync")]
    pub workdir: PathBuf,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a publication document
    Init(InitArgs),
    /// Synchronize a source tree and propose the new manifest
    Publish(PublishArgs),
    /// Show a publication's recorded state
    Status(StatusArgs),
    /// Show the entries of a publication's current manifest
    Show(ShowArgs),
    /// Propose admitting an author to a publication's contract
    WhitelistAuthor(WhitelistAuthorArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Publication name, also used as its document id
    pub name: String,

    /// Contract the manifest pointer is proposed to
    #[arg(long)]
    pub contract: String,

    /// Owner addresses, comma separated
    #[arg(long, value_delimiter = ',')]
    pub owners: Vec<String>,

    /// Gateway templates reference content through
    #[arg(long)]
    pub gateway: Option<String>,
}

#[derive(Args)]
pub struct PublishArgs {
    pub name: String,

    /// Checkout of the site repository
    #[arg(long, default_value = ".")]
    pub source: PathBuf,
}

#[derive(Args)]
pub struct StatusArgs {
    pub name: String,
}

#[derive(Args)]
pub struct ShowArgs {
    pub name: String,
}

#[derive(Args)]
pub struct WhitelistAuthorArgs {
    pub name: String,

    /// Address of the author
    pub author: String,
}
