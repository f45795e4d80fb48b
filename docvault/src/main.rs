//! docvault command line
//!
//! Thin front end over a WAL-backed document store. Every command runs as
//! a trusted caller through the same option pipeline the library exposes.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use docvault_core::config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "docvault")]
#[command(about = "Namespaced document storage with ownership and labels")]
struct Cli {
    /// Data directory (overrides DOCVAULT_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Document namespace (overrides DOCVAULT_NAMESPACE)
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the namespace's document store
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Manage organizations
    Org {
        #[command(subcommand)]
        action: OrgAction,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Manage organization membership
    Member {
        #[command(subcommand)]
        action: MemberAction,
    },

    /// Manage labels
    Label {
        #[command(subcommand)]
        action: LabelAction,
    },

    /// Create, read and delete documents
    Doc {
        #[command(subcommand)]
        action: DocAction,
    },

    /// Show the effective configuration
    Config,
}

#[derive(Subcommand)]
enum StoreAction {
    /// Create the namespace's buckets
    Init,
    /// Verify the namespace exists and count its documents
    Check,
}

#[derive(Subcommand)]
enum OrgAction {
    Create { name: String },
    List {
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum UserAction {
    Create { name: String },
}

#[derive(Subcommand)]
enum MemberAction {
    /// Add a user to an organization
    Add {
        #[arg(long)]
        user: Uuid,

        /// Organization name
        #[arg(long)]
        org: String,

        /// Grant the owner role instead of member
        #[arg(long)]
        owner: bool,
    },
}

#[derive(Subcommand)]
enum LabelAction {
    Create {
        name: String,

        /// Label property as key=value, repeatable
        #[arg(short, long = "property")]
        properties: Vec<String>,
    },
}

#[derive(Args)]
struct DocFields {
    /// Document name
    name: String,

    #[arg(long)]
    version: Option<String>,

    /// JSON payload
    #[arg(long)]
    data: Option<String>,

    /// Owning organization, repeatable
    #[arg(long = "org")]
    orgs: Vec<String>,

    /// Label to attach, repeatable
    #[arg(long = "label")]
    labels: Vec<String>,
}

#[derive(Args)]
struct Hydrate {
    /// Include payloads
    #[arg(long)]
    data: bool,

    /// Include labels
    #[arg(long)]
    labels: bool,
}

#[derive(Subcommand)]
enum DocAction {
    Create {
        #[command(flatten)]
        fields: DocFields,
    },
    Update {
        id: Uuid,

        #[command(flatten)]
        fields: DocFields,

        /// Remove current owners before adding --org owners
        #[arg(long)]
        replace_owners: bool,

        /// Label to detach, repeatable
        #[arg(long = "unlabel")]
        unlabel: Vec<String>,
    },
    /// List documents, optionally those owned by an organization
    List {
        /// Only documents owned by this organization; required for --data and --labels
        #[arg(long)]
        org: Option<String>,

        #[command(flatten)]
        hydrate: Hydrate,
    },
    Get {
        id: Uuid,

        #[command(flatten)]
        hydrate: Hydrate,
    },
    /// Delete documents by id and/or owning organization
    Delete {
        #[arg(long = "id")]
        ids: Vec<Uuid>,

        #[arg(long)]
        org: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Store { action } => commands::store(action, &config),
        Commands::Org { action } => commands::org(action, &config),
        Commands::User { action } => commands::user(action, &config),
        Commands::Member { action } => commands::member(action, &config),
        Commands::Label { action } => commands::label(action, &config),
        Commands::Doc { action } => commands::doc(action, &config),
        Commands::Config => commands::print_json(&config),
    }
}

/// Environment first, then command line flags.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(ns) = &cli.namespace {
        config.namespace = ns.clone();
    }
    Ok(config)
}
