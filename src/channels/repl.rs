//! Interactive REPL channel with line editing and markdown rendering.
//!
//! The primary CLI interface for driving one wallet session. Uses rustyline
//! for line editing, history, and tab-completion, and termimad for rendering
//! assistant replies inline.
//!
//! ## Commands
//!
//! - `/help` - Show available commands
//! - `/wallet` - Show address, network, and a fresh balance
//! - `/pending` - Show the transaction awaiting confirmation
//! - `/confirm` - Execute the pending transaction
//! - `/cancel` - Discard the pending transaction
//! - `/clear` - Clear the conversation (drops any pending transaction)
//! - `/debug` - Toggle verbose tool output
//! - `/quit` or `/exit` - Exit the REPL
//! - `yes`/`no` - Respond to a confirmation prompt

use std::borrow::Cow;
use std::path::PathBuf;

use crossterm::style::Stylize;
use rustyline::completion::Completer;
use rustyline::config::Config as LineConfig;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::FileHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Editor, Helper};
use termimad::MadSkin;

use crate::agent::{Agent, ChatReply, PendingTransaction};
use crate::error::ChannelError;

/// Slash commands available in the REPL.
const SLASH_COMMANDS: &[&str] = &[
    "/help", "/wallet", "/pending", "/confirm", "/cancel", "/clear", "/debug", "/quit", "/exit",
];

/// Rustyline helper for slash-command tab completion.
struct ReplHelper;

impl Completer for ReplHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if !line.starts_with('/') {
            return Ok((0, vec![]));
        }
        let prefix = &line[..pos];
        let matches: Vec<String> = SLASH_COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| cmd.to_string())
            .collect();
        Ok((0, matches))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if !line.starts_with('/') || pos < line.len() {
            return None;
        }
        SLASH_COMMANDS
            .iter()
            .find(|cmd| cmd.starts_with(line) && **cmd != line)
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Highlighter for ReplHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[90m{hint}\x1b[0m"))
    }
}

impl Validator for ReplHelper {}
impl Helper for ReplHelper {}

/// Build a termimad skin with our color scheme.
fn make_skin() -> MadSkin {
    let mut skin = MadSkin::default();
    skin.set_headers_fg(termimad::crossterm::style::Color::Yellow);
    skin.bold.set_fg(termimad::crossterm::style::Color::White);
    skin.italic
        .set_fg(termimad::crossterm::style::Color::Magenta);
    skin.inline_code
        .set_fg(termimad::crossterm::style::Color::Green);
    skin.code_block
        .set_fg(termimad::crossterm::style::Color::Green);
    skin.code_block.left_margin = 2;
    skin
}

/// Clip a display string to at most `max` characters, on a char boundary.
fn clip(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Format JSON params as `key: value` lines for the confirmation card.
fn format_json_params(params: &serde_json::Value, indent: &str) -> String {
    match params {
        serde_json::Value::Object(map) => {
            let mut lines = Vec::new();
            for (key, value) in map {
                let val_str = match value {
                    serde_json::Value::String(s) => {
                        format!("\x1b[32m\"{}\"\x1b[0m", clip(s, 120))
                    }
                    other => {
                        let rendered = other.to_string();
                        if rendered.chars().count() > 120 {
                            format!("{}...", clip(&rendered, 120))
                        } else {
                            rendered
                        }
                    }
                };
                lines.push(format!("{indent}\x1b[36m{key}\x1b[0m: {val_str}"));
            }
            lines.join("\n")
        }
        other => {
            let pretty = serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string());
            pretty
                .lines()
                .map(|l| format!("{indent}\x1b[90m{l}\x1b[0m"))
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

fn print_help() {
    let h = "\x1b[1m"; // bold (section headers)
    let c = "\x1b[1;36m"; // bold cyan (commands)
    let d = "\x1b[90m"; // dim gray (descriptions)
    let r = "\x1b[0m"; // reset

    println!();
    println!("  {h}WalletPilot REPL{r}");
    println!();
    println!("  {h}Commands{r}");
    println!("  {c}/help{r}        {d}show this help{r}");
    println!("  {c}/wallet{r}      {d}address, network, fresh balance{r}");
    println!("  {c}/pending{r}     {d}show the transaction awaiting confirmation{r}");
    println!("  {c}/confirm{r}     {d}execute the pending transaction{r}");
    println!("  {c}/cancel{r}      {d}discard the pending transaction{r}");
    println!("  {c}/clear{r}       {d}clear conversation (drops pending too){r}");
    println!("  {c}/debug{r}       {d}toggle verbose tool output{r}");
    println!("  {c}/quit{r} {c}/exit{r}  {d}exit the repl{r}");
    println!();
    println!("  {h}Confirmation responses{r}");
    println!("  {c}yes{r} ({c}y{r})      {d}execute the pending transaction{r}");
    println!("  {c}no{r} ({c}n{r})       {d}discard it{r}");
    println!();
}

fn history_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".walletpilot")
        .join("history")
}

/// One wallet session in the terminal.
pub struct ReplChannel {
    skin: MadSkin,
    debug: bool,
}

impl ReplChannel {
    pub fn new() -> Self {
        Self {
            skin: make_skin(),
            debug: false,
        }
    }

    /// Run the interactive loop until `/quit` or EOF.
    pub async fn run(&mut self, agent: &mut Agent) -> Result<(), ChannelError> {
        let config = LineConfig::builder()
            .completion_type(CompletionType::List)
            .build();
        let mut editor: Editor<ReplHelper, FileHistory> =
            Editor::with_config(config).map_err(|e| ChannelError::StartupFailed {
                name: "repl".to_string(),
                reason: e.to_string(),
            })?;
        editor.set_helper(Some(ReplHelper));
        let history = history_path();
        let _ = editor.load_history(&history);

        self.print_banner(agent);

        loop {
            let prompt = if agent.has_pending_transaction() {
                "confirm? ".yellow().bold().to_string()
            } else {
                "you> ".cyan().bold().to_string()
            };

            // rustyline blocks; keep the runtime breathing.
            let (line, returned_editor) = tokio::task::spawn_blocking(move || {
                let line = editor.readline(&prompt);
                (line, editor)
            })
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "repl".to_string(),
                reason: e.to_string(),
            })?;
            editor = returned_editor;

            let line = match line {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    return Err(ChannelError::SendFailed {
                        name: "repl".to_string(),
                        reason: e.to_string(),
                    });
                }
            };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            let _ = editor.add_history_entry(input);

            if !self.handle_line(agent, input).await {
                break;
            }
        }

        if let Some(parent) = history.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.save_history(&history);
        println!("bye");
        Ok(())
    }

    /// Process one line. Returns false when the REPL should exit.
    async fn handle_line(&mut self, agent: &mut Agent, input: &str) -> bool {
        match input {
            "/quit" | "/exit" => return false,
            "/help" => print_help(),
            "/debug" => {
                self.debug = !self.debug;
                println!(
                    "debug output {}",
                    if self.debug { "on" } else { "off" }
                );
            }
            "/wallet" => match agent.refresh_wallet_info().await {
                Ok(info) => {
                    println!("  address: {}", info.address);
                    println!("  network: {}", info.network);
                    println!("  balance: {}", info.display_balance());
                }
                Err(e) => println!("{}", format!("wallet lookup failed: {e}").red()),
            },
            "/pending" => match agent.pending_transaction() {
                Some(pending) => self.print_pending_card(pending),
                None => println!("nothing is awaiting confirmation"),
            },
            "/confirm" | "yes" | "y" if agent.has_pending_transaction() => {
                let reply = agent.confirm_pending_transaction().await;
                self.render_reply(&reply);
            }
            "/cancel" | "no" | "n" if agent.has_pending_transaction() => {
                let reply = agent.cancel_pending_transaction();
                self.render_reply(&reply);
            }
            "/confirm" | "/cancel" => println!("nothing is awaiting confirmation"),
            "/clear" => {
                agent.clear_history();
                println!("conversation cleared");
            }
            _ if input.starts_with('/') => {
                println!("unknown command {input}; try /help");
            }
            _ => {
                let reply = agent.submit_user_message(input).await;
                self.render_reply(&reply);
            }
        }
        true
    }

    fn print_banner(&self, agent: &Agent) {
        let info = agent.wallet_info();
        println!(
            "{} {} on {} ({})",
            "walletpilot".green().bold(),
            info.address,
            info.network,
            info.display_balance()
        );
        println!("{}", "type a message, or /help for commands".dark_grey());
    }

    fn print_pending_card(&self, pending: &PendingTransaction) {
        println!("{}", "── pending transaction ──".yellow());
        println!("{}", pending.description);
        if !pending.arguments.is_null() {
            println!("  {}", "arguments:".to_string().dark_grey());
            println!("{}", format_json_params(&pending.arguments, "    "));
        }
        if !pending.queued.is_empty() {
            println!(
                "  {}",
                format!("{} more operation(s) queued behind it", pending.queued.len()).dark_grey()
            );
        }
    }

    fn render_reply(&self, reply: &ChatReply) {
        if self.debug {
            for call in &reply.tool_calls {
                let line = format!("[tool] {}: {}", call.name, call.result);
                if call.is_failure() {
                    println!("{}", line.red());
                } else {
                    println!("{}", line.dark_grey());
                }
            }
        }
        if let Some(pending) = &reply.pending {
            self.print_pending_card(pending);
            println!("{}", "reply yes to execute, no to discard".yellow());
            return;
        }
        self.skin.print_text(&reply.message);
    }
}

impl Default for ReplChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completion_matches_slash_prefix() {
        let helper = ReplHelper;
        let history = rustyline::history::MemHistory::new();
        let ctx = rustyline::Context::new(&history);
        let (start, matches) = helper.complete("/c", 2, &ctx).unwrap();
        assert_eq!(start, 0);
        assert!(matches.contains(&"/confirm".to_string()));
        assert!(matches.contains(&"/cancel".to_string()));
        assert!(matches.contains(&"/clear".to_string()));
        assert!(!matches.contains(&"/help".to_string()));
    }

    #[test]
    fn completion_ignores_plain_text() {
        let helper = ReplHelper;
        let history = rustyline::history::MemHistory::new();
        let ctx = rustyline::Context::new(&history);
        let (_, matches) = helper.complete("what's my balance", 5, &ctx).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn params_render_as_key_value_lines() {
        let rendered = format_json_params(
            &json!({"to": "0xabc", "amount": "0.01"}),
            "  ",
        );
        assert!(rendered.contains("amount"));
        assert!(rendered.contains("0.01"));
        assert!(rendered.contains("0xabc"));
    }

    #[test]
    fn long_params_clip_on_char_boundaries() {
        // Multibyte char straddling the clip point must not split mid-char.
        let memo = format!("{}{}", "a".repeat(100), "€".repeat(50));
        let rendered = format_json_params(&json!({"memo": memo}), "  ");
        assert!(rendered.contains("memo"));
        assert!(rendered.contains('€'));

        let nested = json!({"inner": {"note": "€".repeat(200)}});
        let rendered = format_json_params(&nested, "  ");
        assert!(rendered.contains("..."));
    }

    #[test]
    fn history_path_is_under_walletpilot() {
        assert!(history_path().to_string_lossy().contains(".walletpilot"));
    }
}
