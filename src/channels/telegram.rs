//! Telegram transport — long-polls the Bot API for updates and executes
//! pipeline outcomes (delete, reply, page mentors).

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::admin::AdminHandler;
use crate::error::ChannelError;
use crate::pipeline::{InboundMessage, PipelineOutcome, TriagePipeline};

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Pause before retrying after a poll failure.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram transport — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    /// Verify the token against getMe before entering the poll loop.
    pub async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    /// Poll for updates forever, feeding each message through the pipeline.
    ///
    /// Poll and handler failures are logged and retried; this loop only
    /// returns if the process is shutting down.
    pub async fn run(
        &self,
        pipeline: Arc<TriagePipeline>,
        admin: Arc<AdminHandler>,
    ) -> Result<(), ChannelError> {
        let mut offset: i64 = 0;

        tracing::info!("Telegram transport listening for messages...");

        loop {
            let body = serde_json::json!({
                "offset": offset,
                "timeout": 30,
                "allowed_updates": ["message"]
            });

            let resp = match self
                .client
                .post(self.api_url("getUpdates"))
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Telegram poll error: {e}");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            let data: serde_json::Value = match resp.json().await {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Telegram parse error: {e}");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            let Some(results) = data.get("result").and_then(serde_json::Value::as_array) else {
                continue;
            };

            for update in results {
                if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64) {
                    offset = uid + 1;
                }

                let inbound = match parse_update(update) {
                    ParsedUpdate::Message(inbound) => inbound,
                    ParsedUpdate::Joined(joined) => {
                        // Record joiners silently; no greeting is sent.
                        for member in joined {
                            if let Err(e) = pipeline
                                .register_member(
                                    member.platform_user_id,
                                    member.username,
                                    member.first_name,
                                    member.last_name,
                                )
                                .await
                            {
                                tracing::warn!(error = %e, "Failed to record joined member");
                            }
                        }
                        continue;
                    }
                    ParsedUpdate::Ignored => continue,
                };

                // Slash commands go to the admin handler, not the pipeline.
                if inbound.text.starts_with('/') {
                    if let Some(reply) = admin.handle(inbound.platform_user_id, &inbound.text).await
                    {
                        if let Err(e) = self
                            .send_reply(inbound.chat_id, Some(inbound.platform_message_id), &reply)
                            .await
                        {
                            tracing::warn!(error = %e, "Failed to answer command");
                        }
                    }
                    continue;
                }

                match pipeline.process(&inbound).await {
                    Ok(outcome) => {
                        if let Err(e) = self.execute(&inbound, outcome).await {
                            tracing::warn!(error = %e, "Failed to execute pipeline outcome");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Pipeline failed, message left in place");
                    }
                }
            }
        }
    }

    /// Act on a pipeline outcome.
    async fn execute(
        &self,
        inbound: &InboundMessage,
        outcome: PipelineOutcome,
    ) -> Result<(), ChannelError> {
        for action in plan_actions(inbound, outcome) {
            match action {
                WireAction::Delete { message_id } => {
                    self.delete_message(inbound.chat_id, message_id).await?;
                }
                WireAction::Reply { reply_to, text } => {
                    self.send_reply(inbound.chat_id, reply_to, &text).await?;
                }
            }
        }
        Ok(())
    }

    /// Send a text message, splitting anything over Telegram's 4096 limit.
    async fn send_reply(
        &self,
        chat_id: i64,
        reply_to: Option<i64>,
        text: &str,
    ) -> Result<(), ChannelError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            let mut body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if let Some(message_id) = reply_to {
                body["reply_to_message_id"] = serde_json::json!(message_id);
            }

            let resp = self
                .client
                .post(self.api_url("sendMessage"))
                .json(&body)
                .send()
                .await
                .map_err(|e| ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: e.to_string(),
                })?;

            if !resp.status().is_success() {
                let err = resp.text().await.unwrap_or_default();
                return Err(ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: format!("sendMessage failed: {err}"),
                });
            }
        }
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
        });

        let resp = self
            .client
            .post(self.api_url("deleteMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::DeleteFailed {
                name: "telegram".into(),
                message_id,
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::DeleteFailed {
                name: "telegram".into(),
                message_id,
                reason: err,
            });
        }
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// One Bot API call the transport will make for an outcome.
#[derive(Debug, Clone, PartialEq)]
enum WireAction {
    Delete { message_id: i64 },
    Reply { reply_to: Option<i64>, text: String },
}

/// Translate a pipeline outcome into Bot API calls.
///
/// Deletion is silent: the offending message goes away with no notice
/// posted to the channel.
fn plan_actions(inbound: &InboundMessage, outcome: PipelineOutcome) -> Vec<WireAction> {
    match outcome {
        PipelineOutcome::Skipped | PipelineOutcome::NoAction => Vec::new(),
        PipelineOutcome::Deleted { .. } => vec![WireAction::Delete {
            message_id: inbound.platform_message_id,
        }],
        PipelineOutcome::FaqReply { text, .. } => vec![WireAction::Reply {
            reply_to: Some(inbound.platform_message_id),
            text,
        }],
        PipelineOutcome::MentorsPaged { mention_text, .. } => vec![WireAction::Reply {
            reply_to: Some(inbound.platform_message_id),
            text: mention_text,
        }],
    }
}

/// A user from a `new_chat_members` event.
#[derive(Debug, Clone, PartialEq)]
struct JoinedMember {
    platform_user_id: i64,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

/// What an update decodes to.
#[derive(Debug, Clone, PartialEq)]
enum ParsedUpdate {
    Message(InboundMessage),
    Joined(Vec<JoinedMember>),
    /// Edits, media without text, and anything else this bot doesn't act on.
    Ignored,
}

fn user_field(user: &serde_json::Value, key: &str) -> Option<String> {
    user.get(key)
        .and_then(serde_json::Value::as_str)
        .map(String::from)
}

fn parse_update(update: &serde_json::Value) -> ParsedUpdate {
    let Some(message) = update.get("message") else {
        return ParsedUpdate::Ignored;
    };

    if let Some(joined) = message
        .get("new_chat_members")
        .and_then(serde_json::Value::as_array)
    {
        let members = joined
            .iter()
            .filter_map(|user| {
                Some(JoinedMember {
                    platform_user_id: user.get("id").and_then(serde_json::Value::as_i64)?,
                    username: user_field(user, "username"),
                    first_name: user_field(user, "first_name"),
                    last_name: user_field(user, "last_name"),
                })
            })
            .collect();
        return ParsedUpdate::Joined(members);
    }

    let parsed = (|| {
        let text = message.get("text").and_then(serde_json::Value::as_str)?;
        let from = message.get("from")?;
        let platform_user_id = from.get("id").and_then(serde_json::Value::as_i64)?;
        let platform_message_id = message
            .get("message_id")
            .and_then(serde_json::Value::as_i64)?;
        let chat_id = message
            .get("chat")
            .and_then(|c| c.get("id"))
            .and_then(serde_json::Value::as_i64)?;

        Some(InboundMessage {
            platform_user_id,
            username: user_field(from, "username"),
            first_name: user_field(from, "first_name"),
            last_name: user_field(from, "last_name"),
            platform_message_id,
            chat_id,
            text: text.to_string(),
        })
    })();

    match parsed {
        Some(inbound) => ParsedUpdate::Message(inbound),
        None => ParsedUpdate::Ignored,
    }
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts on the nearest
/// char boundary (never inside a multibyte character).
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut cut = max_len;
        while !remaining.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            // max_len smaller than the first character; emit it whole.
            cut = remaining
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(remaining.len());
        }

        let chunk = &remaining[..cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(cut);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { cut } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_url_embeds_token_and_method() {
        let ch = TelegramChannel::new(SecretString::from("123:ABC"));
        assert_eq!(
            ch.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    #[test]
    fn parse_update_full_message() {
        let update = json!({
            "update_id": 1,
            "message": {
                "message_id": 42,
                "from": {"id": 7, "username": "alice", "first_name": "Alice"},
                "chat": {"id": -100},
                "text": "what is attention?"
            }
        });

        let ParsedUpdate::Message(inbound) = parse_update(&update) else {
            panic!("expected a message");
        };
        assert_eq!(inbound.platform_user_id, 7);
        assert_eq!(inbound.platform_message_id, 42);
        assert_eq!(inbound.chat_id, -100);
        assert_eq!(inbound.username.as_deref(), Some("alice"));
        assert_eq!(inbound.first_name.as_deref(), Some("Alice"));
        assert!(inbound.last_name.is_none());
        assert_eq!(inbound.text, "what is attention?");
    }

    #[test]
    fn parse_update_join_event_yields_members() {
        let update = json!({
            "update_id": 1,
            "message": {
                "message_id": 1,
                "from": {"id": 7},
                "chat": {"id": -100},
                "new_chat_members": [
                    {"id": 8, "username": "bob"},
                    {"id": 9, "first_name": "Carol"}
                ]
            }
        });

        let ParsedUpdate::Joined(members) = parse_update(&update) else {
            panic!("expected a join event");
        };
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].platform_user_id, 8);
        assert_eq!(members[0].username.as_deref(), Some("bob"));
        assert_eq!(members[1].platform_user_id, 9);
        assert_eq!(members[1].first_name.as_deref(), Some("Carol"));
    }

    #[test]
    fn parse_update_ignores_non_text() {
        let update = json!({
            "update_id": 1,
            "message": {
                "message_id": 1,
                "from": {"id": 7},
                "chat": {"id": -100},
                "photo": [{"file_id": "x"}]
            }
        });
        assert_eq!(parse_update(&update), ParsedUpdate::Ignored);
    }

    fn inbound() -> InboundMessage {
        InboundMessage {
            platform_user_id: 7,
            username: Some("alice".to_string()),
            first_name: None,
            last_name: None,
            platform_message_id: 42,
            chat_id: -100,
            text: "hi".to_string(),
        }
    }

    #[test]
    fn deletion_is_silent() {
        let actions = plan_actions(
            &inbound(),
            PipelineOutcome::Deleted {
                category: "spam".to_string(),
                confidence: 0.9,
                reason: "ad".to_string(),
            },
        );
        // Exactly one call: delete. No notice is posted to the channel.
        assert_eq!(actions, vec![WireAction::Delete { message_id: 42 }]);
    }

    #[test]
    fn faq_reply_threads_to_the_question() {
        let actions = plan_actions(
            &inbound(),
            PipelineOutcome::FaqReply {
                text: "answer".to_string(),
                similarity: 0.9,
            },
        );
        assert_eq!(
            actions,
            vec![WireAction::Reply {
                reply_to: Some(42),
                text: "answer".to_string(),
            }]
        );
    }

    #[test]
    fn skipped_and_no_action_touch_nothing() {
        assert!(plan_actions(&inbound(), PipelineOutcome::Skipped).is_empty());
        assert!(plan_actions(&inbound(), PipelineOutcome::NoAction).is_empty());
    }

    #[test]
    fn split_message_short() {
        let chunks = split_message("Hello", 4096);
        assert_eq!(chunks, vec!["Hello"]);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_respects_char_boundaries() {
        // 2000 three-byte chars with no spaces or newlines; byte 4096 lands
        // mid-character and the cut must back off instead of panicking.
        let msg = "€".repeat(2000);
        let chunks = split_message(&msg, 4096);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.len() <= 4096);
        }
        assert_eq!(chunks.concat(), msg);
    }
}
