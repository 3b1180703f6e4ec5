//! Chat client trait and message types.
//!
//! The bot core decides *whether* to act and *what* content to send;
//! delivery mechanics live behind `ChatClient`.

use std::time::Duration;

use async_trait::async_trait;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Channel error type.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Message edit failed: {0}")]
    EditFailed(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A message received from the chat platform.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    /// Platform message ID.
    pub id: String,
    /// Channel the message arrived in.
    pub channel_id: String,
    /// Author's user ID.
    pub author_id: String,
    /// Whether the author is a bot account.
    pub author_is_bot: bool,
    /// Raw message text.
    pub content: String,
    /// User IDs mentioned in the message.
    pub mentions: Vec<String>,
    /// Author of the message this one replies to, when it is a reply.
    pub referenced_author_id: Option<String>,
}

/// Handle to a message the bot sent, used for later edits/deletes.
#[derive(Debug, Clone)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
}

/// Options for sending a message.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Message ID to reply to.
    pub reply_to: Option<String>,
    /// Delete the sent message after this delay (self-expiring notices).
    pub delete_after: Option<Duration>,
}

impl SendOptions {
    /// Reply to the given message.
    pub fn reply(message_id: impl Into<String>) -> Self {
        Self {
            reply_to: Some(message_id.into()),
            delete_after: None,
        }
    }

    /// Expire the sent message after `delay`.
    pub fn with_delete_after(mut self, delay: Duration) -> Self {
        self.delete_after = Some(delay);
        self
    }
}

/// Outbound operations on the chat platform.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a message, returning a handle for later edits.
    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
        opts: SendOptions,
    ) -> ChannelResult<MessageRef>;

    /// Replace the content of a previously sent message.
    async fn edit_message(&self, message: &MessageRef, content: &str) -> ChannelResult<()>;

    /// Delete a message, optionally after a delay.
    async fn delete_message(&self, message: &MessageRef, delay: Option<Duration>)
        -> ChannelResult<()>;

    /// Add a reaction emoji to a message.
    async fn add_reaction(&self, message: &MessageRef, emoji: &str) -> ChannelResult<()>;

    /// Remove the bot's own reaction from a message.
    async fn remove_reaction(&self, message: &MessageRef, emoji: &str) -> ChannelResult<()>;

    /// Show the typing indicator in a channel.
    async fn trigger_typing(&self, channel_id: &str) -> ChannelResult<()>;
}

impl InboundMessage {
    /// Handle for reacting to / replying to this message.
    pub fn to_ref(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id.clone(),
            message_id: self.id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_options_builder() {
        let opts = SendOptions::reply("42").with_delete_after(Duration::from_secs(15));
        assert_eq!(opts.reply_to.as_deref(), Some("42"));
        assert_eq!(opts.delete_after, Some(Duration::from_secs(15)));
    }

    #[test]
    fn inbound_to_ref_carries_ids() {
        let msg = InboundMessage {
            id: "m1".into(),
            channel_id: "c1".into(),
            ..InboundMessage::default()
        };
        let r = msg.to_ref();
        assert_eq!(r.message_id, "m1");
        assert_eq!(r.channel_id, "c1");
    }
}
