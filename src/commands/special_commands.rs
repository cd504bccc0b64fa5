//! Special commands parser for interactive chat mode
//!
//! Special commands control the session instead of being sent to the
//! assistant:
//! - Sign in and out
//! - Start a new conversation or reopen a saved chat
//! - Pick a suggestion chip
//! - View status and help
//! - Exit the session
//!
//! Commands are prefixed with `/` and are case-insensitive.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Run the browser sign-in flow
    Login,

    /// Forget the stored token
    Logout,

    /// Show sign-in state and the bound chat
    ShowStatus,

    /// Display help information
    Help,

    /// Start a fresh, unbound conversation
    NewChat,

    /// List the user's saved chats
    ListChats,

    /// Continue a saved chat
    OpenChat(i64),

    /// Put suggestion number `n` (1-based) into the input line
    Suggest(usize),

    /// Exit the interactive session
    Exit,

    /// Not a special command
    ///
    /// The input should be sent to the assistant.
    None,
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns CommandError::UnknownCommand if input starts with "/" but is not a valid command.
/// Returns CommandError::UnsupportedArgument if a command receives an invalid argument.
/// Returns CommandError::MissingArgument if a command requires an argument but none was provided.
///
/// # Examples
///
/// ```
/// use sduchat::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/open 42").unwrap(), SpecialCommand::OpenChat(42));
/// assert_eq!(parse_special_command("/suggest 2").unwrap(), SpecialCommand::Suggest(2));
/// assert_eq!(parse_special_command("Привет").unwrap(), SpecialCommand::None);
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    // Plain text goes to the assistant (except exit/quit)
    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    match lower.as_str() {
        "/login" => Ok(SpecialCommand::Login),
        "/logout" => Ok(SpecialCommand::Logout),
        "/status" => Ok(SpecialCommand::ShowStatus),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/new" => Ok(SpecialCommand::NewChat),
        "/chats" => Ok(SpecialCommand::ListChats),
        "/exit" | "/quit" | "exit" | "quit" => Ok(SpecialCommand::Exit),

        "/open" => Err(CommandError::MissingArgument {
            command: "/open".to_string(),
            usage: "/open <chat_id>".to_string(),
        }),
        input if input.starts_with("/open ") => {
            let arg = input[6..].trim();
            match arg.parse::<i64>() {
                Ok(id) if id > 0 => Ok(SpecialCommand::OpenChat(id)),
                _ => Err(CommandError::UnsupportedArgument {
                    command: "/open".to_string(),
                    arg: arg.to_string(),
                }),
            }
        }

        "/suggest" => Err(CommandError::MissingArgument {
            command: "/suggest".to_string(),
            usage: "/suggest <number>".to_string(),
        }),
        input if input.starts_with("/suggest ") => {
            let arg = input[9..].trim();
            match arg.parse::<usize>() {
                Ok(n) if n > 0 => Ok(SpecialCommand::Suggest(n)),
                _ => Err(CommandError::UnsupportedArgument {
                    command: "/suggest".to_string(),
                    arg: arg.to_string(),
                }),
            }
        }

        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Display help information for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat Mode
===========================================

ACCOUNT:
  /login          - Sign in with Google in the browser
  /logout         - Forget the stored access token
  /status         - Show sign-in state and the current chat

CONVERSATIONS:
  /new            - Start a new conversation
  /chats          - List your saved chats (requires sign-in)
  /open <id>      - Continue a saved chat (requires sign-in)

SUGGESTIONS:
  /suggest <n>    - Put suggestion number n into the input line

SESSION CONTROL:
  /help, /?       - Show this help message
  /exit, exit     - Exit interactive mode
  quit            - Same as exit
  Ctrl-C          - Stop the reply being printed; at the prompt, exit

NOTES:
  - Commands are case-insensitive
  - Regular text (not starting with /) is sent to the assistant
  - Without sign-in the first message goes to the public endpoint
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(
            parse_special_command("Где посмотреть расписание?").unwrap(),
            SpecialCommand::None
        );
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_special_command("/login").unwrap(), SpecialCommand::Login);
        assert_eq!(parse_special_command("/logout").unwrap(), SpecialCommand::Logout);
        assert_eq!(parse_special_command("/status").unwrap(), SpecialCommand::ShowStatus);
        assert_eq!(parse_special_command("/new").unwrap(), SpecialCommand::NewChat);
        assert_eq!(parse_special_command("/chats").unwrap(), SpecialCommand::ListChats);
        assert_eq!(parse_special_command("/?").unwrap(), SpecialCommand::Help);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(parse_special_command("/HELP").unwrap(), SpecialCommand::Help);
        assert_eq!(parse_special_command("  /Login ").unwrap(), SpecialCommand::Login);
    }

    #[test]
    fn test_parse_exit_aliases() {
        for input in ["/exit", "/quit", "exit", "QUIT"] {
            assert_eq!(parse_special_command(input).unwrap(), SpecialCommand::Exit);
        }
    }

    #[test]
    fn test_parse_open_with_id() {
        assert_eq!(
            parse_special_command("/open 42").unwrap(),
            SpecialCommand::OpenChat(42)
        );
    }

    #[test]
    fn test_parse_open_missing_argument() {
        let err = parse_special_command("/open").unwrap_err();
        assert!(matches!(err, CommandError::MissingArgument { .. }));
    }

    #[test]
    fn test_parse_open_rejects_non_positive_id() {
        for input in ["/open abc", "/open 0", "/open -3"] {
            let err = parse_special_command(input).unwrap_err();
            assert!(matches!(err, CommandError::UnsupportedArgument { .. }));
        }
    }

    #[test]
    fn test_parse_suggest() {
        assert_eq!(
            parse_special_command("/suggest 3").unwrap(),
            SpecialCommand::Suggest(3)
        );
        assert!(parse_special_command("/suggest 0").is_err());
        assert!(parse_special_command("/suggest").is_err());
    }

    #[test]
    fn test_unknown_command_error_message() {
        let err = parse_special_command("/foo").unwrap_err();
        assert_eq!(err, CommandError::UnknownCommand("/foo".to_string()));
        assert!(err.to_string().contains("/help"));
    }
}
