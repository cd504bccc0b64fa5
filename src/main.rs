//! SDU Chat - command-line client for the SDU university assistant
//!
#![doc = "SDU Chat - command-line client for the SDU university assistant"]
#![doc = "Main entry point for the sduchat application."]

use std::sync::Arc;

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sduchat::auth::{CredentialStore, KeyringStore, MemoryStore};
use sduchat::cli::{ChatsCommand, Cli, Commands};
use sduchat::commands::{self, AppContext};
use sduchat::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    let store: Arc<dyn CredentialStore> = if cli.ephemeral {
        tracing::debug!("Using in-memory credential store");
        Arc::new(MemoryStore::default())
    } else {
        Arc::new(KeyringStore::new(config.auth.keyring_service.clone()))
    };
    let ctx = AppContext::new(config, store)?;

    // Execute command
    match cli.command {
        Commands::Chat { chat } => {
            if let Some(id) = chat {
                tracing::debug!("Continuing chat: {}", id);
            }
            commands::chat::run_chat(&ctx, chat).await?;
            Ok(())
        }
        Commands::Ask { text, chat } => {
            let question = text.join(" ");
            tracing::debug!("Question: {}", question);
            commands::ask::run_ask(&ctx, &question, chat).await?;
            Ok(())
        }
        Commands::Login => {
            commands::auth::login(&ctx).await?;
            Ok(())
        }
        Commands::Logout => {
            commands::auth::logout(&ctx)?;
            Ok(())
        }
        Commands::Status => {
            commands::auth::status(&ctx)?;
            Ok(())
        }
        Commands::Chats { command } => {
            tracing::info!("Starting chat management command");
            match command {
                ChatsCommand::List { page, size, json } => {
                    commands::chats::list_chats(&ctx.api, page, size, json).await?;
                }
                ChatsCommand::Show { id } => {
                    commands::chats::show_chat(&ctx.api, id).await?;
                }
                ChatsCommand::Create { title } => {
                    commands::chats::create_chat(&ctx.api, &title).await?;
                }
                ChatsCommand::Delete { id } => {
                    commands::chats::delete_chat(&ctx.api, id).await?;
                }
                ChatsCommand::Messages {
                    id,
                    page,
                    size,
                    json,
                } => {
                    commands::chats::list_messages(&ctx.api, id, page, size, json).await?;
                }
            }
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins; otherwise `--verbose` selects debug output.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "sduchat=debug" } else { "sduchat=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
