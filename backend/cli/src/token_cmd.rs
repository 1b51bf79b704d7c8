//! `proxpanel token`

use std::path::Path;

use anyhow::{Result, bail};
use clap::Subcommand;
use proxpanel_config::{
    AuthConfig, PanelConfig, TokenConfig, contains_env_var_reference, load_raw_config, write_config,
};
use proxpanel_logging::mask_token;
use proxpanel_security::generate_api_token;

use crate::terminal_output::{Column, note_info, note_success, render_table};

#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Generate a new random API token
    Generate {
        #[arg(long)]
        username: String,
        /// Role the token authenticates with
        #[arg(long, conflicts_with = "admin")]
        role: Option<String>,
        /// Grant the admin bypass instead of a role
        #[arg(long)]
        admin: bool,
        /// Append the token to the config file
        #[arg(long)]
        save: bool,
    },
    /// List configured tokens (masked)
    List,
}

pub async fn run(config_path: &Path, command: TokenCommand) -> Result<()> {
    match command {
        TokenCommand::Generate {
            username,
            role,
            admin,
            save,
        } => {
            if role.is_none() && !admin {
                bail!("A token needs either --role <name> or --admin");
            }
            let entry = TokenConfig {
                token: generate_api_token(),
                username,
                user_id: None,
                role,
                admin,
            };
            println!("{}", entry.token);

            if save {
                let mut config = load_raw_config(config_path).await?;
                add_token(&mut config, entry);
                write_config(&config, config_path).await?;
                note_success(&format!("Token saved to {}", config_path.display()));
            } else {
                note_info("Add this token under auth.tokens in the config file, or rerun with --save");
            }
        }
        TokenCommand::List => {
            let config = load_raw_config(config_path).await?;
            print!("{}", token_table(config.tokens()));
        }
    }
    Ok(())
}

fn add_token(config: &mut PanelConfig, entry: TokenConfig) {
    config.auth.get_or_insert_with(AuthConfig::default).tokens.push(entry);
}

/// Env references are shown as written; literal tokens are masked.
fn token_table(tokens: &[TokenConfig]) -> String {
    let rows: Vec<Vec<String>> = tokens
        .iter()
        .map(|t| {
            let shown = if contains_env_var_reference(&t.token) {
                t.token.clone()
            } else {
                mask_token(&t.token)
            };
            vec![
                t.username.clone(),
                t.role.clone().unwrap_or_default(),
                if t.admin { "yes".into() } else { String::new() },
                shown,
            ]
        })
        .collect();
    render_table(
        &[
            Column::left("User"),
            Column::left("Role"),
            Column::left("Admin"),
            Column::left("Token"),
        ],
        &rows,
    )
}
