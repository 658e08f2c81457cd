//! Telegram bot adapter
//!
//! Long-polls the Bot API with `getUpdates` and answers over `sendMessage`.
//! `/start` opens the conversation with a persistent three-button reply
//! keyboard; `/cancel` says goodbye, removes the keyboard and ends the
//! conversation. Everything in between is translated into engine input.

use crate::engine::{ChatState, QuizEngine, Step, labels, texts};
use crate::error::{QuizError, Result};
use crate::platforms::POLL_RETRY_DELAY_SECS;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info};

const LONG_POLL_TIMEOUT_SECS: u64 = 25;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    first_name: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ReplyMarkup {
    Keyboard(ReplyKeyboardMarkup),
    Remove(ReplyKeyboardRemove),
}

#[derive(Debug, Serialize)]
struct ReplyKeyboardMarkup {
    keyboard: Vec<Vec<KeyboardButton>>,
    resize_keyboard: bool,
    one_time_keyboard: bool,
}

#[derive(Debug, Serialize)]
struct ReplyKeyboardRemove {
    remove_keyboard: bool,
}

#[derive(Debug, Serialize)]
struct KeyboardButton {
    text: String,
}

fn menu_keyboard() -> ReplyMarkup {
    let button = |text: &str| KeyboardButton {
        text: text.to_string(),
    };
    ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
        keyboard: vec![
            vec![button(labels::NEW_QUESTION), button(labels::SURRENDER)],
            vec![button(labels::MY_SCORE)],
        ],
        resize_keyboard: true,
        one_time_keyboard: false,
    })
}

/// Thin Bot API client.
struct TelegramApi {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramApi {
    fn new(token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("https://api.telegram.org/bot{token}"),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QuizError::Api(format!(
                "Telegram API error {status}: {body}"
            )));
        }

        let envelope: ApiResponse<T> = response.json().await?;
        if !envelope.ok {
            return Err(QuizError::Api(format!(
                "Telegram API rejected {method}: {}",
                envelope.description.unwrap_or_default()
            )));
        }
        envelope
            .result
            .ok_or_else(|| QuizError::Api(format!("Telegram API returned no result for {method}")))
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": LONG_POLL_TIMEOUT_SECS,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<ReplyMarkup>,
    ) -> Result<()> {
        let mut payload = json!({ "chat_id": chat_id, "text": text });
        if let Some(markup) = reply_markup {
            payload["reply_markup"] = serde_json::to_value(markup)?;
        }
        let _: Message = self.call("sendMessage", &payload).await?;
        Ok(())
    }
}

/// Telegram transport adapter.
pub struct TelegramBot {
    api: TelegramApi,
    engine: QuizEngine,
    states: HashMap<i64, ChatState>,
}

impl TelegramBot {
    pub fn new(token: &str, engine: QuizEngine) -> Self {
        Self {
            api: TelegramApi::new(token),
            engine,
            states: HashMap::new(),
        }
    }

    /// Run the long-poll loop; transient poll failures log and back off.
    pub async fn run(mut self) -> Result<()> {
        info!("telegram bot started");
        let mut offset = 0i64;

        loop {
            let updates = match self.api.get_updates(offset).await {
                Ok(updates) => updates,
                Err(err) => {
                    error!(%err, "telegram long poll failed");
                    tokio::time::sleep(Duration::from_secs(POLL_RETRY_DELAY_SECS)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(message) = update.message else {
                    continue;
                };
                let chat_id = message.chat.id;
                if let Err(err) = self.handle_message(message).await {
                    error!(chat_id, %err, "failed to process telegram update");
                }
            }
        }
    }

    async fn handle_message(&mut self, message: Message) -> Result<()> {
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        let chat_id = message.chat.id;

        match text.trim() {
            "/start" => {
                self.states.insert(chat_id, ChatState::Menu);
                self.api
                    .send_message(chat_id, texts::GREETING, Some(menu_keyboard()))
                    .await
            }
            "/cancel" => {
                self.states.remove(&chat_id);
                let first_name = message
                    .from
                    .as_ref()
                    .map_or("друг", |user| user.first_name.as_str());
                self.api
                    .send_message(
                        chat_id,
                        &texts::farewell(first_name),
                        Some(ReplyMarkup::Remove(ReplyKeyboardRemove {
                            remove_keyboard: true,
                        })),
                    )
                    .await
            }
            text => {
                // No /start yet: the conversation has not begun, nothing fires.
                let Some(&state) = self.states.get(&chat_id) else {
                    return Ok(());
                };

                let Step { reply, next } = self
                    .engine
                    .handle_message(&chat_id.to_string(), text, state)
                    .await;
                self.states.insert(chat_id, next);

                if let Some(reply) = reply {
                    self.api.send_message(chat_id, &reply, None).await?;
                }
                Ok(())
            }
        }
    }
}
