//! Minimal Telegram Bot API client: long polling in, `sendMessage` out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{BotHandler, IncomingMessage};
use crate::notify::{MessageSink, TextFormat};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Long-poll window passed to `getUpdates`.
pub const POLL_TIMEOUT_SECS: u64 = 30;

const RETRY_PAUSE: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// `ok: false` in the response envelope, or a body that is not an envelope.
    #[error("Telegram API error: {0}")]
    Api(String),
}

/// Every Bot API response is wrapped like this.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

impl Message {
    /// Text messages only; anything else is ignored by the bot.
    pub fn to_incoming(&self) -> Option<IncomingMessage> {
        let text = self.text.as_ref()?;
        Some(IncomingMessage {
            chat_id: self.chat.id.to_string(),
            user_id: self.from.as_ref().map(|u| u.id).unwrap_or(0),
            text: text.clone(),
        })
    }
}

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    bot_token: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // token stays out of logs
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_API_URL, bot_token)
    }

    pub fn with_base_url(base_url: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.bot_token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
        timeout: Duration,
    ) -> Result<T, TelegramError> {
        let resp = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(&body)
            .send()
            .await?;

        // Errors come back as 4xx with an `ok: false` envelope, so read the body either way.
        let status = resp.status();
        let text = resp.text().await?;
        let envelope: ApiResponse<T> = serde_json::from_str(&text)
            .map_err(|e| TelegramError::Api(format!("{method}: HTTP {status}, unreadable body ({e})")))?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(TelegramError::Api(format!(
                "{method}: {}",
                description.unwrap_or_else(|| format!("HTTP {status}"))
            ))),
        }
    }

    /// Long-poll for updates with `update_id >= offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }),
            Duration::from_secs(timeout_secs + 10),
        )
        .await
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        format: TextFormat,
    ) -> Result<(), TelegramError> {
        // Numeric ids go out as numbers, `@channel` names as strings.
        let chat: Value = match chat_id.trim().parse::<i64>() {
            Ok(id) => json!(id),
            Err(_) => json!(chat_id.trim()),
        };
        let mut body = json!({
            "chat_id": chat,
            "text": text,
            "disable_web_page_preview": false,
        });
        if format == TextFormat::Markdown {
            body["parse_mode"] = json!("Markdown");
        }

        let _: Value = self
            .call("sendMessage", body, Duration::from_secs(15))
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageSink for TelegramClient {
    async fn send(&self, chat_id: &str, text: &str, format: TextFormat) -> anyhow::Result<()> {
        self.send_message(chat_id, text, format).await?;
        Ok(())
    }
}

/// Poll until `shutdown` resolves. Handler failures are reported by the
/// handler itself; polling errors pause briefly and retry.
pub async fn run_polling<F>(client: TelegramClient, handler: Arc<BotHandler>, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut offset: i64 = 0;
    tracing::info!(target: "telegram", "polling started");

    loop {
        let updates = tokio::select! {
            _ = &mut shutdown => break,
            res = client.get_updates(offset, POLL_TIMEOUT_SECS) => res,
        };

        let updates = match updates {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!(target: "telegram", error = %e, "getUpdates failed");
                metrics::counter!("telegram_poll_errors_total").increment(1);
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(RETRY_PAUSE) => continue,
                }
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(msg) = update.message.as_ref().and_then(Message::to_incoming) else {
                continue;
            };
            tracing::debug!(target: "telegram", chat = %msg.chat_id, user = msg.user_id, text = %msg.text, "update");
            handler.dispatch(&msg).await;
        }
    }

    tracing::info!(target: "telegram", "polling stopped");
}
