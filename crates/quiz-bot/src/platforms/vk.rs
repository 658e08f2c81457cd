//! VK bot adapter
//!
//! Uses the Bots Long Poll API: resolve the group id, fetch a long-poll
//! server, then loop on `a_check` requests. Replies go through
//! `messages.send` with a persistent three-button keyboard. VK has no cancel
//! command; the first message from an unknown user triggers the greeting.

use crate::engine::{ChatState, QuizEngine, Step, labels};
use crate::error::{QuizError, Result};
use crate::platforms::POLL_RETRY_DELAY_SECS;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info, warn};

const VK_API_BASE: &str = "https://api.vk.com/method";
const VK_API_VERSION: &str = "5.131";
const LONG_POLL_WAIT_SECS: u64 = 25;

#[derive(Debug, Deserialize)]
struct VkEnvelope<T> {
    response: Option<T>,
    error: Option<VkApiError>,
}

#[derive(Debug, Deserialize)]
struct VkApiError {
    error_code: i64,
    error_msg: String,
}

#[derive(Debug, Deserialize)]
struct Group {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct LongPollServer {
    key: String,
    server: String,
    ts: String,
}

#[derive(Debug, Deserialize)]
struct LongPollBatch {
    ts: Option<String>,
    #[serde(default)]
    updates: Vec<VkUpdate>,
    failed: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct VkUpdate {
    #[serde(rename = "type")]
    kind: String,
    object: Option<MessageNewObject>,
}

#[derive(Debug, Deserialize)]
struct MessageNewObject {
    message: Option<VkMessage>,
}

#[derive(Debug, Deserialize)]
struct VkMessage {
    from_id: i64,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct VkKeyboard {
    one_time: bool,
    buttons: Vec<Vec<VkButton>>,
}

#[derive(Debug, Serialize)]
struct VkButton {
    action: VkButtonAction,
    color: &'static str,
}

#[derive(Debug, Serialize)]
struct VkButtonAction {
    #[serde(rename = "type")]
    kind: &'static str,
    label: String,
}

fn menu_keyboard() -> VkKeyboard {
    let button = |label: &str| VkButton {
        action: VkButtonAction {
            kind: "text",
            label: label.to_string(),
        },
        color: "default",
    };
    VkKeyboard {
        one_time: false,
        buttons: vec![
            vec![button(labels::NEW_QUESTION), button(labels::SURRENDER)],
            vec![button(labels::MY_SCORE)],
        ],
    }
}

/// Thin VK API client bound to a group token.
struct VkApi {
    client: reqwest::Client,
    token: String,
}

impl VkApi {
    fn new(token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.to_string(),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(format!("{VK_API_BASE}/{method}"))
            .query(params)
            .query(&[("access_token", self.token.as_str()), ("v", VK_API_VERSION)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QuizError::Api(format!("VK API error {status}: {body}")));
        }

        let envelope: VkEnvelope<T> = response.json().await?;
        if let Some(err) = envelope.error {
            return Err(QuizError::Api(format!(
                "VK API rejected {method}: [{}] {}",
                err.error_code, err.error_msg
            )));
        }
        envelope
            .response
            .ok_or_else(|| QuizError::Api(format!("VK API returned no response for {method}")))
    }

    /// Resolve the id of the group the token belongs to.
    async fn group_id(&self) -> Result<i64> {
        let groups: Vec<Group> = self.call("groups.getById", &[]).await?;
        groups
            .first()
            .map(|group| group.id)
            .ok_or_else(|| QuizError::Api("the group token resolves to no group".to_string()))
    }

    async fn long_poll_server(&self, group_id: i64) -> Result<LongPollServer> {
        self.call(
            "groups.getLongPollServer",
            &[("group_id", group_id.to_string())],
        )
        .await
    }

    async fn poll(&self, server: &LongPollServer) -> Result<LongPollBatch> {
        let wait = LONG_POLL_WAIT_SECS.to_string();
        let response = self
            .client
            .get(&server.server)
            .query(&[
                ("act", "a_check"),
                ("key", server.key.as_str()),
                ("ts", server.ts.as_str()),
                ("wait", wait.as_str()),
            ])
            .send()
            .await?;
        Ok(response.json().await?)
    }

    async fn send_message(
        &self,
        user_id: i64,
        text: &str,
        keyboard: Option<&VkKeyboard>,
    ) -> Result<()> {
        let mut params = vec![
            ("user_id", user_id.to_string()),
            ("message", text.to_string()),
            ("random_id", i64::from(rand::random::<i32>()).to_string()),
        ];
        if let Some(keyboard) = keyboard {
            params.push(("keyboard", serde_json::to_string(keyboard)?));
        }
        let _: i64 = self.call("messages.send", &params).await?;
        Ok(())
    }
}

/// What a poll round asks the loop to do next.
#[derive(Debug)]
enum PollAction {
    Deliver {
        updates: Vec<VkUpdate>,
        ts: Option<String>,
    },
    ResyncTs(String),
    RefreshServer,
}

/// Map a long-poll batch onto the loop's next move.
///
/// `failed: 1` means a stale ts (a fresh one is attached); every other
/// failure code requires a new server and key.
fn classify_batch(batch: LongPollBatch) -> PollAction {
    match batch.failed {
        Some(1) => match batch.ts {
            Some(ts) => PollAction::ResyncTs(ts),
            None => PollAction::RefreshServer,
        },
        Some(_) => PollAction::RefreshServer,
        None => PollAction::Deliver {
            updates: batch.updates,
            ts: batch.ts,
        },
    }
}

/// VK transport adapter.
pub struct VkBot {
    api: VkApi,
    engine: QuizEngine,
    states: HashMap<i64, ChatState>,
}

impl VkBot {
    pub fn new(token: &str, engine: QuizEngine) -> Self {
        Self {
            api: VkApi::new(token),
            engine,
            states: HashMap::new(),
        }
    }

    /// Run the long-poll loop; transient failures log, back off and resync.
    /// Only startup may fail — once polling, the loop always recovers.
    pub async fn run(mut self) -> Result<()> {
        let group_id = self.api.group_id().await?;
        let mut server = self.api.long_poll_server(group_id).await?;
        info!(group_id, "vk bot started");

        loop {
            let batch = match self.api.poll(&server).await {
                Ok(batch) => batch,
                Err(err) => {
                    error!(%err, "vk long poll failed");
                    tokio::time::sleep(Duration::from_secs(POLL_RETRY_DELAY_SECS)).await;
                    server = self.refresh_server(group_id).await;
                    continue;
                }
            };

            let (updates, ts) = match classify_batch(batch) {
                PollAction::ResyncTs(ts) => {
                    warn!("vk long poll asked for a ts resync");
                    server.ts = ts;
                    continue;
                }
                PollAction::RefreshServer => {
                    warn!("vk long poll key expired, refreshing the server");
                    server = self.refresh_server(group_id).await;
                    continue;
                }
                PollAction::Deliver { updates, ts } => (updates, ts),
            };

            if let Some(ts) = ts {
                server.ts = ts;
            }

            for update in updates {
                if update.kind != "message_new" {
                    continue;
                }
                let Some(message) = update.object.and_then(|object| object.message) else {
                    continue;
                };
                let from_id = message.from_id;
                if let Err(err) = self.handle_message(message).await {
                    error!(from_id, %err, "failed to process vk message");
                }
            }
        }
    }

    /// Fetch a fresh long-poll server, retrying with backoff until it
    /// succeeds; an outage here must not end the loop.
    async fn refresh_server(&self, group_id: i64) -> LongPollServer {
        loop {
            match self.api.long_poll_server(group_id).await {
                Ok(server) => return server,
                Err(err) => {
                    error!(%err, "failed to refresh the vk long poll server");
                    tokio::time::sleep(Duration::from_secs(POLL_RETRY_DELAY_SECS)).await;
                }
            }
        }
    }

    async fn handle_message(&mut self, message: VkMessage) -> Result<()> {
        let from_id = message.from_id;
        let state = *self.states.entry(from_id).or_insert(ChatState::Greeting);

        let Step { reply, next } = self
            .engine
            .handle_message(&from_id.to_string(), &message.text, state)
            .await;
        self.states.insert(from_id, next);

        if let Some(reply) = reply {
            // The keyboard rides along with the greeting and then persists.
            let keyboard = (state == ChatState::Greeting).then(menu_keyboard);
            self.api
                .send_message(from_id, &reply, keyboard.as_ref())
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_keyboard_payload_shape() {
        let keyboard = serde_json::to_value(menu_keyboard()).unwrap();
        assert_eq!(keyboard["one_time"], false);
        assert_eq!(keyboard["buttons"][0][0]["action"]["type"], "text");
        assert_eq!(
            keyboard["buttons"][0][0]["action"]["label"],
            labels::NEW_QUESTION
        );
        assert_eq!(keyboard["buttons"][1][0]["action"]["label"], labels::MY_SCORE);
    }

    #[test]
    fn test_long_poll_batch_deserialization() {
        let payload = r#"{
            "ts": "578",
            "updates": [{
                "type": "message_new",
                "object": {
                    "message": {"from_id": 99, "text": "Мой счет"}
                }
            }]
        }"#;
        let batch: LongPollBatch = serde_json::from_str(payload).unwrap();
        assert_eq!(batch.ts.as_deref(), Some("578"));
        assert!(batch.failed.is_none());

        let message = batch.updates[0]
            .object
            .as_ref()
            .and_then(|object| object.message.as_ref())
            .unwrap();
        assert_eq!(message.from_id, 99);
        assert_eq!(message.text, "Мой счет");
    }

    #[test]
    fn test_long_poll_failure_deserialization() {
        let batch: LongPollBatch = serde_json::from_str(r#"{"failed": 2}"#).unwrap();
        assert_eq!(batch.failed, Some(2));
        assert!(batch.updates.is_empty());
    }

    #[test]
    fn test_stale_ts_resyncs_without_a_new_server() {
        let batch: LongPollBatch =
            serde_json::from_str(r#"{"failed": 1, "ts": "600"}"#).unwrap();
        assert!(matches!(
            classify_batch(batch),
            PollAction::ResyncTs(ts) if ts == "600"
        ));
    }

    #[test]
    fn test_expired_key_asks_for_a_server_refresh() {
        for payload in [r#"{"failed": 2}"#, r#"{"failed": 3}"#, r#"{"failed": 1}"#] {
            let batch: LongPollBatch = serde_json::from_str(payload).unwrap();
            assert!(matches!(classify_batch(batch), PollAction::RefreshServer));
        }
    }

    #[test]
    fn test_clean_batch_delivers_updates_and_ts() {
        let batch: LongPollBatch = serde_json::from_str(
            r#"{"ts": "601", "updates": [{"type": "message_new"}]}"#,
        )
        .unwrap();
        match classify_batch(batch) {
            PollAction::Deliver { updates, ts } => {
                assert_eq!(updates.len(), 1);
                assert_eq!(ts.as_deref(), Some("601"));
            }
            other => panic!("expected Deliver, got {other:?}"),
        }
    }
}
