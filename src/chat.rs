// The chat screen: one prompt box, a busy flag and the growing list of
// response cards. Also hosts the interactive terminal loop around it.

use std::io::Write;

use anyhow::Result;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::auth::AuthClient;
use crate::claude::{ModelResponse, PromptDispatcher, PromptRequest};
use crate::config::ConfigError;
use crate::visualizer::visualize;
use crate::{ResponseEntry, ResponseLog};

#[derive(Debug, Error, PartialEq)]
pub enum SubmitError {
    #[error("Enter a prompt first")]
    Empty,
    #[error("Submit disabled: {0}")]
    Disabled(#[from] ConfigError),
}

pub struct ChatScreen {
    dispatcher: PromptDispatcher,
    log: ResponseLog,
    is_processing: bool,
}

impl ChatScreen {
    pub fn new(dispatcher: PromptDispatcher) -> Self {
        Self {
            dispatcher,
            log: ResponseLog::new(),
            is_processing: false,
        }
    }

    pub fn log(&self) -> &ResponseLog {
        &self.log
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing
    }

    /// Whether the submit control is enabled.
    pub fn can_submit(&self) -> Result<(), ConfigError> {
        self.dispatcher.config().api_key().map(|_| ())
    }

    /// Sends one prompt and appends the outcome. Blank text and a missing API
    /// key are refused before any request is made.
    pub async fn submit(&mut self, text: &str) -> Result<&ResponseEntry, SubmitError> {
        let prompt = PromptRequest::new(text).ok_or(SubmitError::Empty)?;
        self.can_submit()?;

        self.is_processing = true;
        let response = self.dispatcher.dispatch(&prompt).await;
        self.is_processing = false;

        debug!(
            success = response.is_success(),
            entries = self.log.len() + 1,
            "Appending response"
        );
        Ok(self.log.push(prompt.as_str().to_string(), response))
    }

    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        self.log.toggle(index)
    }
}

/// Errors about credentials get an extra alert on top of the log entry.
pub fn needs_alert(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["api key", "x-api-key", "authentication", "unauthorized"]
        .iter()
        .any(|needle| lower.contains(needle))
}

pub fn render_entry(index: usize, entry: &ResponseEntry) -> String {
    let mut out = format!("[{}] #{} > {}\n", entry.time_label(), index + 1, entry.prompt);
    if entry.is_collapsed {
        out.push_str("  (collapsed)\n");
        return out;
    }
    match &entry.response {
        ModelResponse::Success(payload) => out.push_str(&visualize(payload).to_string()),
        ModelResponse::Failure(message) => {
            out.push_str("Error: ");
            out.push_str(message);
            out.push('\n');
        }
    }
    out
}

#[derive(Debug, PartialEq)]
enum Command {
    Quit,
    Help,
    History,
    SignOut,
    Toggle(usize),
    Unknown(String),
    Prompt(String),
}

fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Prompt(trimmed.to_string());
    };
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("quit") | Some("exit"), _) => Command::Quit,
        (Some("help"), _) => Command::Help,
        (Some("history"), _) => Command::History,
        (Some("signout"), _) => Command::SignOut,
        (Some("toggle"), Some(n)) => match n.parse::<usize>() {
            Ok(n) if n > 0 => Command::Toggle(n),
            _ => Command::Unknown(trimmed.to_string()),
        },
        _ => Command::Unknown(trimmed.to_string()),
    }
}

const HELP: &str = concat!(
    "Commands:\n",
    "  /toggle N  collapse or expand response N\n",
    "  /history   list responses\n",
    "  /signout   sign out\n",
    "  /quit      leave\n",
    "Anything else is sent as a prompt."
);

/// Interactive loop. With an auth client the screen is only reachable while
/// signed in and closes as soon as the session goes away.
pub async fn run_chat<R, W>(
    screen: &mut ChatScreen,
    auth: Option<&AuthClient>,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let (tx, mut session_rx) = mpsc::unbounded_channel();
    let _subscription = match auth {
        Some(auth) => {
            let handle = auth.session();
            if !handle.is_signed_in() {
                writeln!(out, "Not signed in. Run `promptviz auth sign-in` first.")?;
                return Ok(());
            }
            Some(handle.subscribe(move |session| {
                let _ = tx.send(session.is_some());
            }))
        }
        None => {
            writeln!(out, "Auth backend not configured; continuing without an account.")?;
            None
        }
    };

    if let Err(e) = screen.can_submit() {
        writeln!(out, "Submit disabled: {}", e)?;
    }
    writeln!(out, "Type a prompt, or /help for commands.")?;
    out.flush()?;

    let mut lines = input.lines();
    loop {
        tokio::select! {
            Some(signed_in) = session_rx.recv() => {
                if !signed_in {
                    info!("Session ended, leaving chat");
                    writeln!(out, "Signed out.")?;
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Command::Quit => break,
                    Command::Help => writeln!(out, "{}", HELP)?,
                    Command::History => {
                        if screen.log().is_empty() {
                            writeln!(out, "No responses yet.")?;
                        }
                        for (i, entry) in screen.log().entries().iter().enumerate() {
                            let status = if entry.response.is_success() {
                                "ok"
                            } else {
                                "error"
                            };
                            writeln!(
                                out,
                                "{}. [{}] {} ({})",
                                i + 1,
                                entry.time_label(),
                                entry.prompt,
                                status
                            )?;
                        }
                    }
                    Command::Toggle(n) => match screen.toggle(n - 1) {
                        Some(_) => {
                            if let Some(entry) = screen.log().get(n - 1) {
                                write!(out, "{}", render_entry(n - 1, entry))?;
                            }
                        }
                        None => writeln!(out, "No response #{}", n)?,
                    },
                    Command::SignOut => match auth {
                        Some(auth) => {
                            if let Err(e) = auth.sign_out().await {
                                writeln!(out, "Sign Out Error: {}", e)?;
                            }
                        }
                        None => writeln!(out, "Auth backend not configured.")?,
                    },
                    Command::Unknown(text) => writeln!(out, "Unknown command: {}", text)?,
                    Command::Prompt(text) => {
                        if PromptRequest::new(&text).is_none() {
                            continue;
                        }
                        if let Err(e) = screen.can_submit() {
                            writeln!(out, "Submit disabled: {}", e)?;
                            continue;
                        }
                        writeln!(out, "Thinking...")?;
                        out.flush()?;
                        let submitted = screen.submit(&text).await.map(|_| ());
                        match submitted {
                            Ok(()) => {
                                let index = screen.log().len() - 1;
                                if let Some(entry) = screen.log().get(index) {
                                    write!(out, "{}", render_entry(index, entry))?;
                                    if let Some(message) = entry.response.error() {
                                        if needs_alert(message) {
                                            writeln!(out, "Alert: {}", message)?;
                                        }
                                    }
                                }
                            }
                            Err(e) => writeln!(out, "{}", e)?,
                        }
                    }
                }
                out.flush()?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClaudeConfig;
    use serde_json::json;

    fn screen_without_key() -> ChatScreen {
        ChatScreen::new(PromptDispatcher::new(ClaudeConfig {
            api_key: None,
            endpoint: "http://127.0.0.1:9/v1/messages".to_string(),
            model: "test".to_string(),
            max_tokens: 10,
        }))
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command(" /toggle 3 "), Command::Toggle(3));
        assert_eq!(parse_command("/toggle 0"), Command::Unknown("/toggle 0".to_string()));
        assert_eq!(parse_command("/toggle"), Command::Unknown("/toggle".to_string()));
        assert_eq!(parse_command("/history"), Command::History);
        assert_eq!(parse_command("  hello there "), Command::Prompt("hello there".to_string()));
    }

    #[test]
    fn test_needs_alert() {
        assert!(needs_alert("API key not found. Make sure ANTHROPIC_API_KEY is set"));
        assert!(needs_alert("invalid x-api-key"));
        assert!(needs_alert("Unauthorized"));
        assert!(!needs_alert("Failed to get response from Claude"));
    }

    #[tokio::test]
    async fn test_blank_submit_is_noop() {
        let mut screen = screen_without_key();
        assert_eq!(screen.submit("   ").await.err(), Some(SubmitError::Empty));
        assert!(screen.log().is_empty());
    }

    #[tokio::test]
    async fn test_submit_disabled_without_key() {
        let mut screen = screen_without_key();
        assert!(screen.can_submit().is_err());
        let err = screen.submit("hello").await.err().unwrap();
        assert_eq!(err, SubmitError::Disabled(ConfigError::MissingApiKey));
        assert!(err.to_string().contains("API key"));
        assert!(screen.log().is_empty());
        assert!(!screen.is_processing());
    }

    #[test]
    fn test_render_entry_collapsed_and_failure() {
        let mut log = ResponseLog::new();
        log.push("q".to_string(), ModelResponse::Failure("boom".to_string()));
        log.push("p".to_string(), ModelResponse::Success(json!({"data": [1, 2]})));

        let failed = render_entry(0, &log.entries()[0]);
        assert!(failed.contains("#1 > q"));
        assert!(failed.ends_with("Error: boom\n"));

        let shown = render_entry(1, &log.entries()[1]);
        assert!(shown.contains("Pie chart of 'data'"));

        log.toggle(1);
        let collapsed = render_entry(1, &log.entries()[1]);
        assert!(collapsed.ends_with("(collapsed)\n"));
        assert!(!collapsed.contains("Pie chart"));
    }

    #[tokio::test]
    async fn test_run_chat_without_auth_or_key() {
        let mut screen = screen_without_key();
        let input: &[u8] = b"hello\n/history\n/toggle 1\n/quit\nnever read\n";
        let mut out = Vec::new();
        run_chat(&mut screen, None, input, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Auth backend not configured"));
        assert!(text.contains("Submit disabled: API key not found"));
        assert!(text.contains("No responses yet."));
        assert!(text.contains("No response #1"));
        assert!(screen.log().is_empty());
    }
}
