//! Inbound message dispatch.
//!
//! Decides whether a message is for the bot, applies admission control and
//! censorship, then spawns an independent task per request so a slow
//! stream never blocks other messages. Also owns the refusal feedback
//! loop and the owner-only restart command.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::ai::manager::SessionManager;
use crate::ai::types::StreamChunk;
use crate::censor::CensorList;
use crate::channels::traits::{ChatClient, InboundMessage, MessageRef, SendOptions};
use crate::config::{
    AI_MAX_REFUSALS, DISCORD_MSG_CHAR_LIMIT, RATE_LIMIT_COOLDOWN, RATE_LIMIT_MESSAGE,
    RATE_LIMIT_WINDOW, REQUEST_LIMIT_PER_WINDOW, UPDATE_INTERVAL,
};
use crate::persona::Persona;
use crate::ratelimit::{Admission, RateLimiter};
use crate::streamer::{truncate, ResponseStreamer};

const THINKING_MESSAGE: &str = "\u{1F608} Thinking...";
const RESTART_NOTICE: &str = "I'm going to restart myself really quick. Give me 10 seconds.";
const EMPTY_PROMPT_MESSAGE: &str = "Please provide a prompt.";
const PERMISSION_DENIED_MESSAGE: &str = "Permission denied.";
const RESTART_FAILED_MESSAGE: &str = "Failed to restart AI. Check logs.";
const BOT_ERROR_MESSAGE: &str = "A bot error occurred. Check logs.";

const RESTART_COMMAND: &str = "!restart_ai";

const HOURGLASS: &str = "\u{23F3}";
const CHECK_MARK: &str = "\u{2705}";
const CROSS_MARK: &str = "\u{274C}";

/// Routes inbound messages into AI response tasks.
pub struct Dispatcher {
    chat: Arc<dyn ChatClient>,
    manager: Arc<SessionManager>,
    censor: CensorList,
    limiter: Mutex<RateLimiter>,
    bot_user_id: String,
    owner_id: Option<String>,
    refusal_phrase: String,
}

impl Dispatcher {
    pub fn new(
        chat: Arc<dyn ChatClient>,
        manager: Arc<SessionManager>,
        censor: CensorList,
        bot_user_id: String,
        owner_id: Option<String>,
        refusal_phrase: String,
    ) -> Self {
        Self {
            chat,
            manager,
            censor,
            limiter: Mutex::new(RateLimiter::new(
                REQUEST_LIMIT_PER_WINDOW,
                RATE_LIMIT_WINDOW,
                RATE_LIMIT_COOLDOWN,
            )),
            bot_user_id,
            owner_id,
            refusal_phrase,
        }
    }

    /// Handle one inbound message. Admission runs inline; the response
    /// itself is spawned so dispatch stays responsive.
    pub async fn handle_message(self: Arc<Self>, msg: InboundMessage) {
        if msg.author_is_bot {
            return;
        }

        if msg.content.trim() == RESTART_COMMAND {
            tokio::spawn(async move { self.handle_restart_command(msg).await });
            return;
        }

        if !self.should_process(&msg) {
            return;
        }

        if self.limiter.lock().await.check(Instant::now()) == Admission::Rejected {
            self.send_notice(&msg, RATE_LIMIT_MESSAGE, Duration::from_secs(15))
                .await;
            return;
        }

        let prompt = self.strip_mentions(&msg.content);
        if prompt.is_empty() {
            self.send_notice(&msg, EMPTY_PROMPT_MESSAGE, Duration::from_secs(10))
                .await;
            return;
        }

        tokio::spawn(async move { self.process_response(msg, prompt).await });
    }

    /// A message is for the bot when it mentions the bot or replies to it.
    fn should_process(&self, msg: &InboundMessage) -> bool {
        let mentioned = msg.mentions.iter().any(|id| id == &self.bot_user_id);
        let replied = msg.referenced_author_id.as_deref() == Some(self.bot_user_id.as_str());
        mentioned || replied
    }

    /// Remove the bot's mention tokens from the prompt.
    fn strip_mentions(&self, content: &str) -> String {
        content
            .replace(&format!("<@{}>", self.bot_user_id), "")
            .replace(&format!("<@!{}>", self.bot_user_id), "")
            .trim()
            .to_string()
    }

    /// Full lifecycle of one AI response: placeholder message, censored
    /// prompt submission, throttled edits, finalization with the refusal
    /// feedback loop.
    async fn process_response(self: Arc<Self>, msg: InboundMessage, prompt: String) {
        let prompt = self.censor.mask(&prompt);

        let bot_message = match self
            .chat
            .send_message(&msg.channel_id, THINKING_MESSAGE, SendOptions::reply(msg.id.as_str()))
            .await
        {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "Failed to send placeholder message");
                return;
            }
        };

        if let Err(e) = self.stream_response(&msg, &bot_message, &prompt).await {
            tracing::error!(error = %e, "Error in response handler");
            if let Err(de) = self.chat.edit_message(&bot_message, BOT_ERROR_MESSAGE).await {
                tracing::error!(error = %de, "Failed to edit error message");
            }
        }
    }

    async fn stream_response(
        &self,
        msg: &InboundMessage,
        bot_message: &MessageRef,
        prompt: &str,
    ) -> crate::channels::traits::ChannelResult<()> {
        if let Err(e) = self.chat.trigger_typing(&msg.channel_id).await {
            tracing::debug!(error = %e, "Typing indicator failed");
        }

        let mut rx = Arc::clone(&self.manager).response_stream(Persona::wrap_user_prompt(prompt));

        let mut streamer = ResponseStreamer::new(
            UPDATE_INTERVAL,
            DISCORD_MSG_CHAR_LIMIT,
            &self.refusal_phrase,
        );
        let mut last_chunk: Option<StreamChunk> = None;

        while let Some(chunk) = rx.recv().await {
            if let Some(ref detail) = chunk.error {
                let err_msg = format!("An API error occurred: {detail}");
                tracing::error!(error = %detail, "AI stream error");
                self.chat
                    .edit_message(bot_message, &truncate(&err_msg, DISCORD_MSG_CHAR_LIMIT))
                    .await?;
                return Ok(());
            }

            if let Some(preview) = streamer.preview(&chunk, Instant::now()) {
                // Intermediate edits are best-effort; the final edit decides.
                if let Err(e) = self.chat.edit_message(bot_message, &preview).await {
                    tracing::warn!(error = %e, "Streamed edit failed");
                }
            }
            last_chunk = Some(chunk);
        }

        let finalized = streamer.finalize(last_chunk.as_ref());

        if finalized.refusal {
            let count = self.manager.record_refusal();
            if count >= AI_MAX_REFUSALS {
                tracing::warn!(
                    refusal_count = count,
                    "Refusal limit reached, triggering restart"
                );
                self.chat.edit_message(bot_message, RESTART_NOTICE).await?;
                self.manager.restart_session().await;
                return Ok(());
            }
        } else {
            self.manager.clear_refusals();
        }

        self.chat.edit_message(bot_message, &finalized.content).await?;
        Ok(())
    }

    /// Owner-only manual session restart.
    async fn handle_restart_command(&self, msg: InboundMessage) {
        let msg_ref = msg.to_ref();

        let is_owner = self.owner_id.as_deref() == Some(msg.author_id.as_str());
        if !is_owner {
            self.send_notice(&msg, PERMISSION_DENIED_MESSAGE, Duration::from_secs(10))
                .await;
            if let Err(e) = self
                .chat
                .delete_message(&msg_ref, Some(Duration::from_secs(10)))
                .await
            {
                tracing::debug!(error = %e, "Failed to expire command message");
            }
            return;
        }

        if let Err(e) = self.chat.add_reaction(&msg_ref, HOURGLASS).await {
            tracing::warn!(error = %e, "Failed to add progress reaction");
        }

        let success = self.manager.restart_session().await;

        if let Err(e) = self.chat.remove_reaction(&msg_ref, HOURGLASS).await {
            tracing::warn!(error = %e, "Failed to remove progress reaction");
        }
        let verdict = if success { CHECK_MARK } else { CROSS_MARK };
        if let Err(e) = self.chat.add_reaction(&msg_ref, verdict).await {
            tracing::warn!(error = %e, "Failed to add verdict reaction");
        }

        if !success {
            self.send_notice(&msg, RESTART_FAILED_MESSAGE, Duration::from_secs(20))
                .await;
        }
    }

    /// Send a self-expiring reply; failures are logged, never propagated.
    async fn send_notice(&self, msg: &InboundMessage, content: &str, expire: Duration) {
        let opts = SendOptions::reply(msg.id.as_str()).with_delete_after(expire);
        if let Err(e) = self.chat.send_message(&msg.channel_id, content, opts).await {
            tracing::error!(error = %e, "Failed to send notice");
        }
    }
}
