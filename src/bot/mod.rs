//! Chat command layer.
//!
//! Commands:
//! - `/start`            help text
//! - `/ping`             liveness check
//! - `/setout <chat_id>` where scan results go (owner only)
//! - `/addrss <url>`     add a feed (owner only)
//! - `/listrss`          list feeds with their ids
//! - `/delrss <id>`      remove a feed (owner only)
//! - `/scan`             fetch, rank and deliver (owner only)

pub mod telegram;

use std::path::PathBuf;
use std::sync::Arc;

use crate::analyze::{load_rules_from, RuleError};
use crate::notify::{render_item, MessageSink, TextFormat};
use crate::scan::{ScanOutcome, Scanner};
use crate::store::{SettingsStore, SourceStore, OUT_CHAT_KEY};

pub const HELP_TEXT: &str = "Feed curator bot\n/ping /setout /addrss /listrss /delrss /scan";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Ping,
    SetOut(Option<String>),
    AddRss(Option<String>),
    ListRss,
    DelRss(Option<String>),
    Scan,
}

impl Command {
    /// Parse `/name[@bot] [arg ...]`. Unknown commands and plain text give `None`.
    pub fn parse(text: &str) -> Option<Command> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next().map(str::to_string);

        Some(match name.as_str() {
            "start" | "help" => Command::Start,
            "ping" => Command::Ping,
            "setout" => Command::SetOut(arg),
            "addrss" => Command::AddRss(arg),
            "listrss" => Command::ListRss,
            "delrss" => Command::DelRss(arg),
            "scan" => Command::Scan,
            _ => return None,
        })
    }

    fn owner_only(&self) -> bool {
        matches!(
            self,
            Command::SetOut(_) | Command::AddRss(_) | Command::DelRss(_) | Command::Scan
        )
    }
}

/// A text message as seen by the bot, independent of the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: String,
    pub user_id: i64,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Bad user input; only this request is rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("rule file error: {0}")]
    Rules(#[from] RuleError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct BotHandler {
    sources: Arc<dyn SourceStore>,
    settings: Arc<dyn SettingsStore>,
    sink: Arc<dyn MessageSink>,
    scanner: Scanner,
    owner_id: i64,
    rules_path: PathBuf,
}

impl BotHandler {
    pub fn new(
        sources: Arc<dyn SourceStore>,
        settings: Arc<dyn SettingsStore>,
        sink: Arc<dyn MessageSink>,
        scanner: Scanner,
        owner_id: i64,
        rules_path: PathBuf,
    ) -> Self {
        Self {
            sources,
            settings,
            sink,
            scanner,
            owner_id,
            rules_path,
        }
    }

    /// Owner id 0 means nobody is the owner.
    pub fn is_owner(&self, user_id: i64) -> bool {
        self.owner_id != 0 && user_id == self.owner_id
    }

    /// Handle one message and report failures back to the sender.
    /// Errors never escape: one bad request must not stop the bot.
    pub async fn dispatch(&self, msg: &IncomingMessage) {
        let Some(cmd) = Command::parse(&msg.text) else {
            return;
        };
        if let Err(e) = self.handle(&cmd, msg).await {
            let reply = match &e {
                BotError::InvalidArgument(_) | BotError::Rules(_) => {
                    tracing::warn!(target: "bot", error = %e, ?cmd, "request rejected");
                    e.to_string()
                }
                BotError::Internal(_) => {
                    tracing::error!(target: "bot", error = ?e, ?cmd, "command failed");
                    "Internal error, see logs.".to_string()
                }
            };
            if let Err(e) = self.reply(msg, &reply).await {
                tracing::warn!(target: "bot", error = ?e, "could not send error reply");
            }
        }
    }

    pub async fn handle(&self, cmd: &Command, msg: &IncomingMessage) -> Result<(), BotError> {
        if cmd.owner_only() && !self.is_owner(msg.user_id) {
            return self.reply(msg, "Owner only.").await;
        }

        match cmd {
            Command::Start => self.reply(msg, HELP_TEXT).await,
            Command::Ping => self.reply(msg, "pong").await,
            Command::SetOut(None) => self.reply(msg, "Usage: /setout <chat_id>").await,
            Command::SetOut(Some(chat)) => {
                self.settings.set_setting(OUT_CHAT_KEY, chat)?;
                self.reply(msg, &format!("Output: {chat}")).await
            }
            Command::AddRss(None) => self.reply(msg, "Usage: /addrss <url>").await,
            Command::AddRss(Some(url)) => {
                let url = url.trim();
                validate_feed_url(url)?;
                let src = self.sources.add_source(url)?;
                tracing::info!(target: "bot", id = src.id, %url, "feed added");
                self.reply(msg, &format!("Added RSS #{}: {}", src.id, src.url)).await
            }
            Command::ListRss => {
                let sources = self.sources.list_sources()?;
                if sources.is_empty() {
                    return self.reply(msg, "No feeds yet. /addrss <url>").await;
                }
                let lines: Vec<String> = sources
                    .iter()
                    .map(|s| format!("{}. {}", s.id, s.url))
                    .collect();
                self.reply(msg, &format!("RSS:\n{}", lines.join("\n"))).await
            }
            Command::DelRss(None) => self.reply(msg, "Usage: /delrss <id>").await,
            Command::DelRss(Some(raw)) => {
                let id: i64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| BotError::InvalidArgument(format!("`{raw}` is not a feed id")))?;
                if self.sources.delete_source(id)? {
                    tracing::info!(target: "bot", id, "feed removed");
                    self.reply(msg, &format!("Removed #{id}")).await
                } else {
                    self.reply(msg, &format!("No feed with id #{id}")).await
                }
            }
            Command::Scan => self.scan(msg).await,
        }
    }

    async fn scan(&self, msg: &IncomingMessage) -> Result<(), BotError> {
        let Some(out_chat) = self.settings.get_setting(OUT_CHAT_KEY)? else {
            return self.reply(msg, "Set an output chat first: /setout <chat_id>").await;
        };

        // Loaded per scan so edits to the rule file apply on the next run.
        let rules = load_rules_from(&self.rules_path)?;
        let urls = self.sources.source_urls()?;
        if urls.is_empty() {
            return self.reply(msg, "Add a feed with /addrss <url> and try again.").await;
        }

        self.reply(msg, &format!("Scanning {} feeds...", urls.len())).await?;

        match self.scanner.scan(&urls, &rules).await {
            ScanOutcome::NoSources => {
                self.reply(msg, "Add a feed with /addrss <url> and try again.").await
            }
            ScanOutcome::NoMatches { fetched } => {
                tracing::info!(target: "bot", fetched, "nothing cleared the threshold");
                self.sink
                    .send(
                        &out_chat,
                        "No items cleared the threshold. Tune the rule file.",
                        TextFormat::Plain,
                    )
                    .await?;
                Ok(())
            }
            ScanOutcome::Ranked { items, .. } => {
                let mut failed = 0usize;
                for it in &items {
                    if let Err(e) = self
                        .sink
                        .send(&out_chat, &render_item(it), TextFormat::Markdown)
                        .await
                    {
                        failed += 1;
                        tracing::warn!(target: "bot", error = ?e, link = %it.item.link, "delivery failed");
                    }
                }
                if failed > 0 {
                    self.reply(msg, &format!("{failed} of {} items could not be delivered.", items.len()))
                        .await?;
                }
                Ok(())
            }
        }
    }

    async fn reply(&self, msg: &IncomingMessage, text: &str) -> Result<(), BotError> {
        self.sink.send(&msg.chat_id, text, TextFormat::Plain).await?;
        Ok(())
    }
}

fn validate_feed_url(raw: &str) -> Result<(), BotError> {
    let url = reqwest::Url::parse(raw)
        .map_err(|e| BotError::InvalidArgument(format!("`{raw}` is not a URL ({e})")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(BotError::InvalidArgument(format!(
            "unsupported scheme `{other}`, expected http or https"
        ))),
    }
}
