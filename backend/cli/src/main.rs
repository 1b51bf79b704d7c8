mod check_cmd;
mod context;
mod migrate_cmd;
mod permissions_cmd;
mod roles_cmd;
mod serve_cmd;
mod terminal_output;
mod token_cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "proxpanel")]
#[command(about = "ProxPanel access control: permission registry, role migration and the RBAC API")]
#[command(version)]
struct Cli {
    /// Config file (default: $PROXPANEL_CONFIG_DIR/config.yaml or ~/.proxpanel/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the RBAC HTTP API
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind the HTTP server to
        #[arg(long)]
        bind: Option<String>,
    },
    /// Rewrite legacy role permissions and repair the system roles
    Migrate {
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Inspect stored roles
    Roles {
        #[command(subcommand)]
        command: roles_cmd::RolesCommand,
    },
    /// List the permission catalog
    Permissions {
        /// Only show this category
        #[arg(long)]
        category: Option<String>,
        /// Show legacy dotted codes where they exist
        #[arg(long)]
        legacy: bool,
    },
    /// Check whether a role grants a permission
    Check {
        /// Role name as stored
        role: String,
        /// Permission code, structured or legacy
        permission: String,
    },
    /// Generate and manage API tokens
    Token {
        #[command(subcommand)]
        command: token_cmd::TokenCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .unwrap_or_else(|| proxpanel_config::config_file_path(&proxpanel_config::config_dir()));

    let result = match cli.command {
        Commands::Serve { port, bind } => serve_cmd::run(&config_path, port, bind).await,
        Commands::Migrate { dry_run } => migrate_cmd::run(&config_path, dry_run).await,
        Commands::Roles { command } => roles_cmd::run(&config_path, command).await,
        Commands::Permissions { category, legacy } => permissions_cmd::run(category.as_deref(), legacy),
        Commands::Check { role, permission } => check_cmd::run(&config_path, &role, &permission).await,
        Commands::Token { command } => token_cmd::run(&config_path, command).await,
    };

    if let Err(e) = &result {
        terminal_output::note_error(&format!("{e:#}"));
    }
    result
}
