//! Output sinks and message rendering.

use anyhow::Result;
use std::sync::Mutex;

use crate::analyze::ScoredItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    /// Telegram legacy Markdown (`*bold*`, `_italic_`).
    Markdown,
}

/// Anything that can deliver a text message to a chat/channel id.
#[async_trait::async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str, format: TextFormat) -> Result<()>;
}

/// Escape characters that legacy Markdown would treat as markup.
pub fn escape_markdown(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// One delivered message per ranked item.
pub fn render_item(it: &ScoredItem) -> String {
    format!(
        "🔥 *{}*\n{}\n_score: {:.2} | reasons: {}_",
        escape_markdown(&it.item.title),
        escape_markdown(&it.item.link),
        it.score,
        escape_markdown(&it.reasons.join(", "))
    )
}

/// Sink that only logs; used when no chat backend is configured.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait::async_trait]
impl MessageSink for LogSink {
    async fn send(&self, chat_id: &str, text: &str, format: TextFormat) -> Result<()> {
        tracing::info!(target: "notify", %chat_id, ?format, %text, "message (log sink)");
        Ok(())
    }
}

/// A message captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: String,
    pub text: String,
    pub format: TextFormat,
}

// --- Test helper ---
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<SentMessage>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn texts_for(&self, chat_id: &str) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|m| m.chat_id == chat_id)
            .map(|m| m.text)
            .collect()
    }
}

#[async_trait::async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, chat_id: &str, text: &str, format: TextFormat) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("recording sink poisoned"))?
            .push(SentMessage {
                chat_id: chat_id.to_string(),
                text: text.to_string(),
                format,
            });
        Ok(())
    }
}
