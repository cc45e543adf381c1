//! Telegram Bot API channel — message sending plus long-poll updates for
//! the admin command surface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lectio_core::error::{LectioError, Result};
use lectio_core::traits::{Delivery, MessageSink};

/// Telegram bot handle. Cheap to clone-by-Arc; holds no mutable state
/// except the update offset, which only the polling loop touches.
pub struct TelegramBot {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramBot {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }

    /// Send a plain-text message and classify the outcome.
    ///
    /// 403 means the user blocked the bot: permanent, silent non-delivery.
    /// Everything else (transport error, 429, 5xx, malformed response) is
    /// transient; the caller must not record the notification as sent.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Delivery {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let response = match self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("sendMessage transport error for {chat_id}: {e}");
                return Delivery::Failed;
            }
        };

        match response.json::<TelegramApiResponse<serde_json::Value>>().await {
            Ok(api) if api.ok => Delivery::Sent,
            Ok(api) => {
                let delivery = classify_error(api.error_code);
                match delivery {
                    Delivery::Forbidden => {
                        tracing::info!("User {chat_id} blocked the bot");
                    }
                    _ => {
                        tracing::warn!(
                            "sendMessage failed for {chat_id}: {}",
                            api.description.unwrap_or_default()
                        );
                    }
                }
                delivery
            }
            Err(e) => {
                tracing::warn!("Invalid sendMessage response for {chat_id}: {e}");
                Delivery::Failed
            }
        }
    }

    /// Get updates using long polling.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", "30".into()),
                ("allowed_updates", "[\"message\"]".into()),
            ])
            .send()
            .await
            .map_err(|e| LectioError::Channel(format!("getUpdates failed: {e}")))?;

        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| LectioError::Channel(format!("Invalid getUpdates response: {e}")))?;

        if !body.ok {
            return Err(LectioError::Channel(format!(
                "Telegram API error: {}",
                body.description.unwrap_or_default()
            )));
        }
        Ok(body.result.unwrap_or_default())
    }

    /// Get bot info; used as a connectivity check at startup.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| LectioError::Channel(format!("getMe failed: {e}")))?;
        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| LectioError::Channel(format!("Invalid getMe response: {e}")))?;
        body.result
            .ok_or_else(|| LectioError::Channel("No bot info".into()))
    }
}

#[async_trait]
impl MessageSink for TelegramBot {
    async fn deliver(&self, chat_id: i64, text: &str) -> Delivery {
        self.send_message(chat_id, text).await
    }
}

fn classify_error(error_code: Option<i64>) -> Delivery {
    match error_code {
        Some(403) => Delivery::Forbidden,
        _ => Delivery::Failed,
    }
}

// ─── Telegram API types ──────────────────────────────────

#[derive(Debug, Deserialize)]
struct TelegramApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub date: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
}

impl TelegramUpdate {
    /// Command text and chat id, skipping bot-authored messages.
    pub fn command(&self) -> Option<(i64, &str)> {
        let msg = self.message.as_ref()?;
        let text = msg.text.as_deref()?;
        if msg.from.as_ref().is_some_and(|f| f.is_bot) {
            return None;
        }
        Some((msg.chat.id, text))
    }
}
