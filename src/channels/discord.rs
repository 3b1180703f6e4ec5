//! Discord chat client.
//!
//! REST for outbound operations, Gateway WebSocket for inbound messages.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::channels::traits::{
    ChannelError, ChannelResult, ChatClient, InboundMessage, MessageRef, SendOptions,
};

const API_BASE: &str = "https://discord.com/api/v10";

/// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT | DIRECT_MESSAGES
const GATEWAY_INTENTS: u64 = 33281;

/// Discord channel using the Gateway WebSocket for real-time messages.
pub struct DiscordChannel {
    bot_token: String,
    client: Client,
}

impl DiscordChannel {
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: Client::new(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    /// Verify the token and return the bot's own user ID.
    pub async fn connect(&self) -> ChannelResult<String> {
        let resp = self
            .client
            .get(format!("{API_BASE}/users/@me"))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| ChannelError::Auth(format!("Failed to verify Discord token: {e}")))?;

        if !resp.status().is_success() {
            return Err(ChannelError::Auth("Invalid Discord bot token".into()));
        }

        let me: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Auth(format!("Invalid identity response: {e}")))?;

        let user_id = me
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::Auth("Identity response missing id".into()))?
            .to_string();

        let username = me.get("username").and_then(Value::as_str).unwrap_or("?");
        tracing::info!(user = %username, user_id = %user_id, "Discord bot connected");
        Ok(user_id)
    }

    /// Listen on the Gateway for message events, forwarding them to `tx`.
    ///
    /// Returns when the gateway closes the connection; callers reconnect.
    pub async fn listen(&self, tx: mpsc::Sender<InboundMessage>) -> ChannelResult<()> {
        let gw_resp: Value = self
            .client
            .get(format!("{API_BASE}/gateway/bot"))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| ChannelError::Connection(format!("Failed to get gateway: {e}")))?
            .json()
            .await
            .map_err(|e| ChannelError::Connection(format!("Invalid gateway response: {e}")))?;

        let gw_url = gw_resp
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or("wss://gateway.discord.gg");

        let ws_url = format!("{gw_url}/?v=10&encoding=json");
        tracing::info!("Discord: connecting to gateway...");

        let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
            .await
            .map_err(|e| ChannelError::Connection(format!("WebSocket connection failed: {e}")))?;

        let (mut write, mut read) = ws_stream.split();

        // Read Hello (opcode 10)
        let hello = read
            .next()
            .await
            .ok_or_else(|| ChannelError::Connection("No hello from gateway".into()))?
            .map_err(|e| ChannelError::Connection(format!("WebSocket error: {e}")))?;

        let hello_data: Value = serde_json::from_str(&hello.to_string())
            .map_err(|e| ChannelError::Connection(format!("Invalid hello: {e}")))?;

        let heartbeat_interval = hello_data
            .get("d")
            .and_then(|d| d.get("heartbeat_interval"))
            .and_then(Value::as_u64)
            .unwrap_or(41250);

        // Send Identify (opcode 2)
        let identify = json!({
            "op": 2,
            "d": {
                "token": self.bot_token,
                "intents": GATEWAY_INTENTS,
                "properties": {
                    "os": "linux",
                    "browser": "mimic-bot",
                    "device": "mimic-bot"
                }
            }
        });

        write
            .send(Message::Text(identify.to_string()))
            .await
            .map_err(|e| ChannelError::Connection(format!("Failed to identify: {e}")))?;

        tracing::info!("Discord: connected and identified");

        // Spawn heartbeat ticks
        let (hb_tx, mut hb_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(heartbeat_interval));
            loop {
                interval.tick().await;
                if hb_tx.send(()).await.is_err() {
                    break;
                }
            }
        });

        loop {
            tokio::select! {
                _ = hb_rx.recv() => {
                    let hb = json!({"op": 1, "d": null});
                    if write.send(Message::Text(hb.to_string())).await.is_err() {
                        break;
                    }
                }
                msg = read.next() => {
                    let msg = match msg {
                        Some(Ok(Message::Text(t))) => t,
                        Some(Ok(Message::Close(_))) | None => break,
                        _ => continue,
                    };

                    let event: Value = match serde_json::from_str(&msg) {
                        Ok(e) => e,
                        Err(_) => continue,
                    };

                    if event.get("t").and_then(Value::as_str) != Some("MESSAGE_CREATE") {
                        continue;
                    }

                    let Some(inbound) = event.get("d").and_then(parse_message_create) else {
                        continue;
                    };

                    if tx.send(inbound).await.is_err() {
                        // Dispatcher is gone, stop listening.
                        return Ok(());
                    }
                }
            }
        }

        tracing::warn!("Discord: gateway connection closed");
        Ok(())
    }

    async fn delete_now(
        client: &Client,
        auth: &str,
        message: &MessageRef,
    ) -> ChannelResult<()> {
        let url = format!(
            "{API_BASE}/channels/{}/messages/{}",
            message.channel_id, message.message_id
        );
        let resp = client
            .delete(&url)
            .header("Authorization", auth)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(format!("Discord delete error: {e}")))?;

        if !resp.status().is_success() {
            return Err(ChannelError::SendFailed(format!(
                "Discord delete returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

/// Parse a MESSAGE_CREATE payload into an inbound message.
fn parse_message_create(d: &Value) -> Option<InboundMessage> {
    let id = d.get("id").and_then(Value::as_str)?.to_string();
    let channel_id = d.get("channel_id").and_then(Value::as_str)?.to_string();
    let author = d.get("author")?;
    let author_id = author.get("id").and_then(Value::as_str)?.to_string();
    let author_is_bot = author
        .get("bot")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let content = d
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let mentions = d
        .get("mentions")
        .and_then(Value::as_array)
        .map(|users| {
            users
                .iter()
                .filter_map(|u| u.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let referenced_author_id = d
        .pointer("/referenced_message/author/id")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(InboundMessage {
        id,
        channel_id,
        author_id,
        author_is_bot,
        content,
        mentions,
        referenced_author_id,
    })
}

/// Percent-encode for reaction emoji path segments.
fn encode_emoji(emoji: &str) -> String {
    emoji
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

#[async_trait]
impl ChatClient for DiscordChannel {
    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
        opts: SendOptions,
    ) -> ChannelResult<MessageRef> {
        let url = format!("{API_BASE}/channels/{channel_id}/messages");

        let mut body = json!({ "content": content });
        if let Some(ref reply_to) = opts.reply_to {
            body["message_reference"] = json!({ "message_id": reply_to });
        }

        let resp = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(format!("Discord send error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed(format!(
                "Discord API error ({status}): {error}"
            )));
        }

        let msg_data: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Internal(format!("Failed to parse response: {e}")))?;

        let message_id = msg_data
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::Internal("Send response missing id".into()))?
            .to_string();

        let sent = MessageRef {
            channel_id: channel_id.to_string(),
            message_id,
        };

        if let Some(delay) = opts.delete_after {
            self.delete_message(&sent, Some(delay)).await?;
        }

        Ok(sent)
    }

    async fn edit_message(&self, message: &MessageRef, content: &str) -> ChannelResult<()> {
        let url = format!(
            "{API_BASE}/channels/{}/messages/{}",
            message.channel_id, message.message_id
        );

        let resp = self
            .client
            .patch(&url)
            .header("Authorization", self.auth_header())
            .json(&json!({ "content": content }))
            .send()
            .await
            .map_err(|e| ChannelError::EditFailed(format!("Discord edit error: {e}")))?;

        if !resp.status().is_success() {
            return Err(ChannelError::EditFailed(format!(
                "Discord edit returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn delete_message(
        &self,
        message: &MessageRef,
        delay: Option<Duration>,
    ) -> ChannelResult<()> {
        match delay {
            None => Self::delete_now(&self.client, &self.auth_header(), message).await,
            Some(delay) => {
                let client = self.client.clone();
                let auth = self.auth_header();
                let message = message.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = Self::delete_now(&client, &auth, &message).await {
                        tracing::warn!(error = %e, "Delayed delete failed");
                    }
                });
                Ok(())
            }
        }
    }

    async fn add_reaction(&self, message: &MessageRef, emoji: &str) -> ChannelResult<()> {
        let url = format!(
            "{API_BASE}/channels/{}/messages/{}/reactions/{}/@me",
            message.channel_id,
            message.message_id,
            encode_emoji(emoji)
        );
        let resp = self
            .client
            .put(&url)
            .header("Authorization", self.auth_header())
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(format!("Discord reaction error: {e}")))?;

        if !resp.status().is_success() {
            return Err(ChannelError::SendFailed(format!(
                "Discord reaction returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn remove_reaction(&self, message: &MessageRef, emoji: &str) -> ChannelResult<()> {
        let url = format!(
            "{API_BASE}/channels/{}/messages/{}/reactions/{}/@me",
            message.channel_id,
            message.message_id,
            encode_emoji(emoji)
        );
        let resp = self
            .client
            .delete(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(format!("Discord reaction error: {e}")))?;

        if !resp.status().is_success() {
            return Err(ChannelError::SendFailed(format!(
                "Discord reaction removal returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn trigger_typing(&self, channel_id: &str) -> ChannelResult<()> {
        let url = format!("{API_BASE}/channels/{channel_id}/typing");
        let resp = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(format!("Discord typing error: {e}")))?;

        if !resp.status().is_success() {
            return Err(ChannelError::SendFailed(format!(
                "Discord typing returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
