/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes three top-level command modules:

- `chat`  — Interactive chat mode
- `ask`   — Send a single question and print the reply
- `auth`  — Sign in, sign out and show status

plus `chats` for managing saved chats. The handlers are small and use the
library components: the API client, the session manager and the chat engine.
*/

use crate::api::ApiClient;
use crate::auth::{AuthorizationFlow, BrowserAuthFlow, CredentialStore, SessionManager};
use crate::chat::{ChatEngine, ChatState, EngineOptions};
use crate::config::Config;
use crate::error::Result;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

// Special commands parser for the interactive session
pub mod special_commands;

// Saved chat management commands
pub mod chats;

/// Shared handles every command needs
pub struct AppContext {
    /// Validated configuration
    pub config: Config,
    /// HTTP client bound to the configured server
    pub api: Arc<ApiClient>,
    /// Sign-in state
    pub session: Arc<SessionManager>,
}

impl AppContext {
    /// Build the API client and session manager from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or the sign-in flow cannot be
    /// built from `config`.
    pub fn new(config: Config, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let api = Arc::new(ApiClient::new(&config.api, store)?);
        let flow: Arc<dyn AuthorizationFlow> = Arc::new(BrowserAuthFlow::new(&config.auth)?);
        let session = Arc::new(SessionManager::new(api.clone(), flow));
        Ok(Self {
            config,
            api,
            session,
        })
    }

    /// Engine tunables from the `chat` section
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::from(&self.config.chat)
    }

    /// A fresh engine, optionally bound to an existing chat
    ///
    /// When `chat_id` is given, its latest page of messages is loaded as
    /// history.
    pub async fn engine(&self, chat_id: Option<i64>) -> Result<ChatEngine> {
        let api: Arc<dyn crate::api::ChatApi> = self.api.clone();
        match chat_id {
            None => Ok(ChatEngine::new(api, self.engine_options())),
            Some(id) => {
                let history = self
                    .api
                    .list_messages(id, 0, self.config.chat.page_size)
                    .await?
                    .into_data();
                tracing::info!("Loaded {} messages from chat {}", history.len(), id);
                Ok(ChatEngine::resume(api, self.engine_options(), id, history))
            }
        }
    }
}

/// Incremental printer for assistant replies
///
/// Tracks how many characters of each assistant message after `from_index`
/// have already been written, so each state update prints only the new tail.
#[derive(Debug, Default)]
pub(crate) struct ReplyPrinter {
    from_index: usize,
    printed: HashMap<usize, usize>,
}

impl ReplyPrinter {
    /// Printer for messages appended after the first `from_index` messages
    pub(crate) fn new(from_index: usize) -> Self {
        Self {
            from_index,
            printed: HashMap::new(),
        }
    }

    /// Text not yet printed, with a speaker prefix for newly started messages
    pub(crate) fn take_delta(&mut self, state: &ChatState) -> String {
        use colored::Colorize;

        let mut out = String::new();
        for (index, message) in state.messages.iter().enumerate().skip(self.from_index) {
            if message.is_user {
                continue;
            }
            let printed = self.printed.entry(index).or_insert_with(|| {
                out.push_str(&format!("{} ", "SDU ›".green().bold()));
                0
            });
            let tail: String = message.content.chars().skip(*printed).collect();
            *printed += tail.chars().count();
            out.push_str(&tail);
        }
        out
    }
}

/// Write the sources of assistant replies added after `from_index`
fn write_sources<W: Write>(out: &mut W, state: &ChatState, from_index: usize) {
    use colored::Colorize;

    for message in state.messages.iter().skip(from_index) {
        if message.is_user || message.sources.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{}", "Sources:".dimmed());
        for source in &message.sources {
            let _ = writeln!(out, "  {}", source.dimmed());
        }
    }
}

/// Print numbered suggestion chips
fn print_suggestions(suggestions: &[String]) {
    use colored::Colorize;

    if suggestions.is_empty() {
        return;
    }
    println!("{}", "Suggestions (/suggest <n>):".cyan());
    for (i, suggestion) in suggestions.iter().enumerate() {
        println!("  {}. {}", i + 1, suggestion);
    }
    println!();
}

/// How a streamed reply ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReplyOutcome {
    /// Blank input or a send already in progress
    NotSent,
    /// The send task completed
    Finished,
    /// The user stopped the reply
    Stopped,
}

/// Send the engine's draft input and stream the reply to stdout
///
/// Ctrl-C stops the reply; the partial text stays. Returns `false` if there
/// was nothing to send.
async fn stream_reply(engine: &ChatEngine) -> bool {
    let mut stdout = std::io::stdout();
    drive_reply(engine, &mut stdout, tokio::signal::ctrl_c()).await != ReplyOutcome::NotSent
}

/// Send the draft input and write the reply to `out` as it is revealed
///
/// Returns as soon as `stop` resolves. The send task is detached at that
/// point: a request still in flight finishes in the background and its
/// result is discarded by the engine.
pub(crate) async fn drive_reply<W, S>(engine: &ChatEngine, out: &mut W, stop: S) -> ReplyOutcome
where
    W: Write,
    S: std::future::Future,
{
    let mut rx = engine.subscribe();
    let from_index = engine.snapshot().messages.len();
    let Some(mut handle) = engine.start_send() else {
        return ReplyOutcome::NotSent;
    };

    let mut printer = ReplyPrinter::new(from_index);
    tokio::pin!(stop);
    let mut outcome = ReplyOutcome::Finished;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let delta = printer.take_delta(&rx.borrow_and_update());
                let _ = write!(out, "{}", delta);
                let _ = out.flush();
            }
            _ = &mut stop => {
                engine.cancel_current_response();
                outcome = ReplyOutcome::Stopped;
                break;
            }
            joined = &mut handle => {
                if let Err(e) = joined {
                    tracing::error!("Send task failed: {}", e);
                }
                break;
            }
        }
    }
    drop(handle);

    let state = engine.snapshot();
    let _ = write!(out, "{}", printer.take_delta(&state));
    if outcome == ReplyOutcome::Stopped {
        use colored::Colorize;
        let _ = write!(out, " {}", "[stopped]".yellow());
    }
    let _ = writeln!(out, "\n");
    write_sources(out, &state, from_index);
    let _ = out.flush();
    outcome
}

// Chat command handler
pub mod chat {
    //! Interactive chat mode handler.
    //!
    //! Runs a readline loop: plain lines are sent through the chat engine and
    //! the reply is revealed as it arrives; `/` commands manage the session.

    use super::*;
    use crate::auth::AuthState;
    use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared client handles
    /// * `chat_id` - Optional saved chat to continue
    pub async fn run_chat(ctx: &AppContext, chat_id: Option<i64>) -> Result<()> {
        tracing::info!("Starting interactive chat mode");

        if chat_id.is_some() {
            chats::ensure_signed_in(&ctx.api)?;
        }
        let mut engine = ctx.engine(chat_id).await?;
        let mut rl = DefaultEditor::new()?;

        print_welcome_banner(ctx.session.state());
        print_history(&engine.snapshot());
        let mut suggestions = current_suggestions(&engine);
        print_suggestions(&suggestions);

        let mut prefill: Option<String> = None;
        loop {
            let prompt = format_prompt(&engine);
            let read = match prefill.take() {
                Some(text) => rl.readline_with_initial(&prompt, (text.as_str(), "")),
                None => rl.readline(&prompt),
            };

            match read {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match parse_special_command(trimmed) {
                        Ok(SpecialCommand::None) => {}
                        Ok(SpecialCommand::Exit) => break,
                        Ok(SpecialCommand::Help) => {
                            print_help();
                            continue;
                        }
                        Ok(SpecialCommand::Login) => {
                            let _ = super::auth::login(ctx).await;
                            continue;
                        }
                        Ok(SpecialCommand::Logout) => {
                            if let Err(e) = super::auth::logout(ctx) {
                                eprintln!("Error: {}\n", e);
                            }
                            continue;
                        }
                        Ok(SpecialCommand::ShowStatus) => {
                            print_status_display(ctx, &engine);
                            continue;
                        }
                        Ok(SpecialCommand::NewChat) => {
                            engine.cancel_current_response();
                            engine = ctx.engine(None).await?;
                            println!("Started a new conversation.\n");
                            suggestions = current_suggestions(&engine);
                            print_suggestions(&suggestions);
                            continue;
                        }
                        Ok(SpecialCommand::ListChats) => {
                            if let Err(e) = chats::list_chats(&ctx.api, 0, 20, false).await {
                                eprintln!("Error: {}\n", e);
                            }
                            continue;
                        }
                        Ok(SpecialCommand::OpenChat(id)) => {
                            let opened = async {
                                chats::ensure_signed_in(&ctx.api)?;
                                ctx.engine(Some(id)).await
                            }
                            .await;
                            match opened {
                                Ok(resumed) => {
                                    engine = resumed;
                                    println!("Opened chat {}.\n", id);
                                    print_history(&engine.snapshot());
                                    suggestions = current_suggestions(&engine);
                                    print_suggestions(&suggestions);
                                }
                                Err(e) => eprintln!("Error: {}\n", e),
                            }
                            continue;
                        }
                        Ok(SpecialCommand::Suggest(n)) => {
                            match suggestions.get(n - 1) {
                                Some(text) => {
                                    engine.apply_suggestion(text);
                                    prefill = Some(engine.snapshot().input);
                                }
                                None => eprintln!("No suggestion number {}\n", n),
                            }
                            continue;
                        }
                        Err(e) => {
                            eprintln!("{}\n", e);
                            continue;
                        }
                    }

                    rl.add_history_entry(trimmed)?;
                    engine.set_input(trimmed);
                    println!();
                    stream_reply(&engine).await;

                    suggestions = current_suggestions(&engine);
                    print_suggestions(&suggestions);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Starter chips on an empty conversation, follow-ups otherwise
    pub(crate) fn current_suggestions(engine: &ChatEngine) -> Vec<String> {
        if engine.snapshot().messages.is_empty() {
            ChatEngine::starter_suggestions()
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            engine.follow_up_suggestions()
        }
    }

    /// Prompt showing the bound chat, if any
    pub(crate) fn format_prompt(engine: &ChatEngine) -> String {
        use colored::Colorize;

        match engine.current_chat_id() {
            Some(id) => format!("{} ", format!("[chat {}] you ›", id).cyan()),
            None => format!("{} ", "you ›".cyan()),
        }
    }

    /// Display welcome banner at the start of interactive chat mode
    fn print_welcome_banner(state: AuthState) {
        use colored::Colorize;

        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║              SDU Chat Interactive Mode - Welcome!            ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        let label = match state {
            AuthState::LoggedIn => state.to_string().green(),
            _ => state.to_string().yellow(),
        };
        println!("Account: {}", label);
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }

    /// Print previously loaded messages
    fn print_history(state: &ChatState) {
        use colored::Colorize;

        for message in &state.messages {
            if message.is_user {
                println!("{} {}", "you ›".cyan(), message.content);
            } else {
                println!("{} {}\n", "SDU ›".green().bold(), message.content);
            }
        }
    }

    /// Display status information about the current session
    fn print_status_display(ctx: &AppContext, engine: &ChatEngine) {
        let state = engine.snapshot();
        println!("\nAccount:  {}", ctx.session.state());
        println!("Server:   {}", ctx.api.base_url());
        match state.current_chat_id {
            Some(id) => println!("Chat:     {}", id),
            None => println!("Chat:     (new conversation)"),
        }
        println!("Messages: {}\n", state.messages.len());
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::api::fake::FakeChatApi;

        #[test]
        fn test_current_suggestions_on_empty_chat_are_starters() {
            let engine = ChatEngine::new(Arc::new(FakeChatApi::new()), EngineOptions::default());
            let suggestions = current_suggestions(&engine);
            assert_eq!(suggestions.len(), ChatEngine::starter_suggestions().len());
            assert_eq!(suggestions[0], "Где посмотреть расписание?");
        }

        #[test]
        fn test_format_prompt_shows_bound_chat() {
            colored::control::set_override(false);
            let api = Arc::new(FakeChatApi::new());
            let engine = ChatEngine::new(api.clone(), EngineOptions::default());
            assert_eq!(format_prompt(&engine), "you › ");

            let engine = ChatEngine::resume(api, EngineOptions::default(), 42, Vec::new());
            assert_eq!(format_prompt(&engine), "[chat 42] you › ");
        }
    }
}

/// Ask command handler
pub mod ask {
    use super::*;

    /// Send one question and print the reply
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared client handles
    /// * `text` - Question text
    /// * `chat_id` - Optional saved chat to send into
    pub async fn run_ask(ctx: &AppContext, text: &str, chat_id: Option<i64>) -> Result<()> {
        tracing::info!("Asking a single question");
        if text.trim().is_empty() {
            anyhow::bail!("question text is empty");
        }

        let api: Arc<dyn crate::api::ChatApi> = ctx.api.clone();
        // Only the binding matters here; history is not shown.
        let engine = match chat_id {
            Some(id) => {
                chats::ensure_signed_in(&ctx.api)?;
                ChatEngine::resume(api, ctx.engine_options(), id, Vec::new())
            }
            None => ChatEngine::new(api, ctx.engine_options()),
        };

        engine.set_input(text);
        stream_reply(&engine).await;

        if let Some(id) = engine.current_chat_id() {
            tracing::info!("Reply stored in chat {}", id);
        }
        Ok(())
    }

}

/// Auth command(s)
///
/// Sign in with the browser flow, sign out, and report status.
pub mod auth {
    use super::*;

    /// Run the sign-in flow and store the access token
    pub async fn login(ctx: &AppContext) -> Result<()> {
        tracing::info!("Starting sign-in");

        match ctx.session.login().await {
            Ok(()) => {
                println!("Signed in. The access token is stored in the system keyring.\n");
                Ok(())
            }
            Err(e) => {
                eprintln!("Sign-in failed: {}\n", e);
                Err(e)
            }
        }
    }

    /// Forget the stored access token
    pub fn logout(ctx: &AppContext) -> Result<()> {
        ctx.session.logout()?;
        println!("Signed out.\n");
        Ok(())
    }

    /// Print sign-in state and server settings
    pub fn status(ctx: &AppContext) -> Result<()> {
        println!("Account:        {}", ctx.session.state());
        println!("Server:         {}", ctx.api.base_url());
        println!(
            "Public bearer:  {}",
            if ctx.config.api.static_bearer.is_some() {
                "configured"
            } else {
                "none"
            }
        );
        println!("First message:  {:?}", ctx.config.chat.first_message_route);
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::auth::token_store::{MemoryStore, ACCESS_TOKEN_KEY};

        fn context(store: Arc<MemoryStore>) -> AppContext {
            let mut config = Config::default();
            config.api.base_url = "http://127.0.0.1:9".to_string();
            config.auth.oauth_start_url =
                "http://127.0.0.1:9/oauth2/authorization/google".to_string();
            AppContext::new(config, store).unwrap()
        }

        #[test]
        fn test_logout_clears_stored_token() {
            let store = Arc::new(MemoryStore::with_entry(ACCESS_TOKEN_KEY, "tok"));
            let ctx = context(store.clone());
            assert!(ctx.session.is_logged_in());

            logout(&ctx).unwrap();

            assert!(!ctx.session.is_logged_in());
            assert!(ctx.api.token().is_none());
        }

        #[test]
        fn test_status_succeeds_when_logged_out() {
            let ctx = context(Arc::new(MemoryStore::default()));
            assert!(status(&ctx).is_ok());
        }
    }
}
