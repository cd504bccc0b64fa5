//! Command-line interface definition for SDU Chat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive chat, one-shot questions,
//! authentication, and chat management.

use clap::{Parser, Subcommand};

/// SDU Chat - terminal client for the SDU university assistant
///
/// Ask questions about schedules, scholarships, admission and student life.
#[derive(Parser, Debug, Clone)]
#[command(name = "sduchat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the API base URL from config
    #[arg(long)]
    pub base_url: Option<String>,

    /// Keep the access token in memory instead of the system keyring
    #[arg(long)]
    pub ephemeral: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for SDU Chat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Continue an existing server-side chat (requires login)
        #[arg(long)]
        chat: Option<i64>,
    },

    /// Ask a single question and print the answer
    Ask {
        /// Question text
        #[arg(required = true)]
        text: Vec<String>,

        /// Send to an existing chat instead of starting a new one
        #[arg(long)]
        chat: Option<i64>,
    },

    /// Sign in with Google
    Login,

    /// Sign out and forget the stored token
    Logout,

    /// Show login state and configured endpoint
    Status,

    /// Manage server-side chats (requires login)
    Chats {
        /// Chat management subcommand
        #[command(subcommand)]
        command: ChatsCommand,
    },
}

/// Chat management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ChatsCommand {
    /// List chats
    List {
        /// Page number (zero-based)
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Page size
        #[arg(long, default_value_t = 20)]
        size: u32,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show a single chat
    Show {
        /// Chat identifier
        id: i64,
    },

    /// Create an empty chat
    Create {
        /// Chat title
        title: String,
    },

    /// Delete a chat
    Delete {
        /// Chat identifier
        id: i64,
    },

    /// List the messages of a chat
    Messages {
        /// Chat identifier
        id: i64,

        /// Page number (zero-based)
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Page size
        #[arg(long, default_value_t = 30)]
        size: u32,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_chat_defaults() {
        let cli = Cli::try_parse_from(["sduchat", "chat"]).unwrap();
        assert!(matches!(cli.command, Commands::Chat { chat: None }));
        assert_eq!(cli.config.as_deref(), Some("config/config.yaml"));
        assert!(!cli.ephemeral);
    }

    #[test]
    fn test_cli_parse_ask_joins_words() {
        let cli = Cli::try_parse_from(["sduchat", "ask", "Где", "расписание?"]).unwrap();
        match cli.command {
            Commands::Ask { text, chat } => {
                assert_eq!(text.join(" "), "Где расписание?");
                assert!(chat.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_ask_requires_text() {
        assert!(Cli::try_parse_from(["sduchat", "ask"]).is_err());
    }

    #[test]
    fn test_cli_parse_chats_list_with_paging() {
        let cli = Cli::try_parse_from([
            "sduchat", "--ephemeral", "chats", "list", "--page", "2", "--size", "5",
        ])
        .unwrap();
        assert!(cli.ephemeral);
        match cli.command {
            Commands::Chats {
                command: ChatsCommand::List { page, size, json },
            } => {
                assert_eq!(page, 2);
                assert_eq!(size, 5);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_base_url_override() {
        let cli =
            Cli::try_parse_from(["sduchat", "--base-url", "http://localhost:8080/", "status"])
                .unwrap();
        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:8080/"));
        assert!(matches!(cli.command, Commands::Status));
    }
}
