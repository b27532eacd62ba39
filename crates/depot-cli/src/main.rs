//! Depot CLI - artifact repositories with virtual aggregation and path-level Acls

use clap::{Parser, Subcommand};
use depot_core::{Permission, RepoPath};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod display;
mod error;
mod exit_codes;

use context::{Depot, Locations};
use error::Result;

#[derive(Parser)]
#[command(name = "depot")]
#[command(author = "Depot Contributors")]
#[command(version)]
#[command(about = "Artifact repositories with virtual aggregation and path-level Acls", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding repositories.yaml, engine.yaml, users.yaml and depot.db
    #[arg(long, global = true, env = "DEPOT_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// User to act as
    #[arg(long, global = true, env = "DEPOT_USER", default_value = "anonymous")]
    user: String,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured repositories
    Repos {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how a repository key is classified
    Classify {
        /// Repository key (a `<remote>-cache` key names a remote's cache)
        key: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the children of a folder
    Ls {
        /// `repo` or `repo:path`
        target: RepoPath,

        /// Also list each nested virtual repository separately
        #[arg(long)]
        deep: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show details of one item
    Stat {
        /// `repo:path`
        target: RepoPath,
    },

    /// Deploy a local file
    Put {
        /// `repo:path` to deploy to
        target: RepoPath,

        /// Local file to upload
        file: PathBuf,
    },

    /// Create a folder
    Mkdir {
        /// `repo:path`
        target: RepoPath,
    },

    /// Delete an item or folder tree
    Rm {
        /// `repo:path`
        target: RepoPath,
    },

    /// Check whether the user holds a permission
    Check {
        /// `repo:path`
        target: RepoPath,

        /// read, annotate, deploy, delete or manage
        permission: Permission,
    },

    /// Manage Acls
    Acl {
        #[command(subcommand)]
        command: AclCommands,
    },
}

#[derive(Subcommand)]
enum AclCommands {
    /// List Acls
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one Acl as YAML
    Show {
        name: String,
    },

    /// Create an Acl from a YAML file
    Create {
        file: PathBuf,
    },

    /// Replace an existing Acl from a YAML file
    Update {
        file: PathBuf,
    },

    /// Delete an Acl
    Delete {
        name: String,
    },

    /// Remove a user's entries from every Acl
    RevokeUser {
        username: String,
    },
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = if debug {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let locations = Locations::resolve(cli.config_dir.as_deref())?;
    let depot = Depot::open(locations, &cli.user)?;

    match cli.command {
        Commands::Repos { json } => commands::repos::list(&depot, json),
        Commands::Classify { key, json } => commands::repos::classify(&depot, &key, json),
        Commands::Ls { target, deep, json } => commands::browse::ls(&depot, &target, deep, json),
        Commands::Stat { target } => commands::browse::stat(&depot, &target),
        Commands::Put { target, file } => commands::content::put(&depot, &target, &file),
        Commands::Mkdir { target } => commands::content::mkdir(&depot, &target),
        Commands::Rm { target } => commands::content::rm(&depot, &target),
        Commands::Check { target, permission } => {
            commands::check::run(&depot, &target, permission)
        }
        Commands::Acl { command } => match command {
            AclCommands::List { json } => commands::acl::list(&depot, json),
            AclCommands::Show { name } => commands::acl::show(&depot, &name),
            AclCommands::Create { file } => commands::acl::create(&depot, &file),
            AclCommands::Update { file } => commands::acl::update(&depot, &file),
            AclCommands::Delete { name } => commands::acl::delete(&depot, &name),
            AclCommands::RevokeUser { username } => commands::acl::revoke_user(&depot, &username),
        },
    }
}

fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = run(cli) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
