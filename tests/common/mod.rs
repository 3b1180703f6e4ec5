//! Shared test doubles: a scripted AI backend and a recording chat client.

// Not every test binary uses every helper here.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use mimic_bot::ai::backend::{AiBackend, AiSession, ChunkStream, VecChunkStream};
use mimic_bot::ai::types::StreamChunk;
use mimic_bot::channels::traits::{
    ChannelResult, ChatClient, InboundMessage, MessageRef, SendOptions,
};
use mimic_bot::persona::RESTART_PROMPT;

/// One scripted prompt_stream outcome.
pub enum StreamOutcome {
    /// Yield these chunks, then end successfully.
    Chunks(Vec<StreamChunk>),
    /// Yield these chunks, then fail.
    FailAfter(Vec<StreamChunk>),
    /// Fail before the first chunk.
    FailOpen,
}

/// Backend whose sessions replay scripted outcomes in order.
///
/// The restart-verification prompt is answered out-of-band so scripts only
/// describe user-visible exchanges.
pub struct MockBackend {
    fail_creates: AtomicBool,
    creates: AtomicUsize,
    outcomes: Arc<Mutex<VecDeque<StreamOutcome>>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_creates: AtomicBool::new(false),
            creates: AtomicUsize::new(0),
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
        })
    }

    pub fn push(&self, outcome: StreamOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// How many sessions have been created (initial start + restarts).
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

impl AiBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn create_session(&self) -> anyhow::Result<Box<dyn AiSession>> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            anyhow::bail!("scripted create failure");
        }
        Ok(Box::new(MockSession {
            outcomes: Arc::clone(&self.outcomes),
        }))
    }
}

struct MockSession {
    outcomes: Arc<Mutex<VecDeque<StreamOutcome>>>,
}

impl AiSession for MockSession {
    fn prompt(&mut self, _message: &str) -> anyhow::Result<String> {
        Ok("System OK".into())
    }

    fn prompt_stream(&mut self, message: &str) -> anyhow::Result<Box<dyn ChunkStream>> {
        if message == RESTART_PROMPT {
            return Ok(Box::new(VecChunkStream::new(vec![Ok(StreamChunk::text(
                "System OK",
            ))])));
        }

        let outcome = self.outcomes.lock().unwrap().pop_front();
        match outcome {
            Some(StreamOutcome::Chunks(chunks)) => Ok(Box::new(VecChunkStream::new(
                chunks.into_iter().map(Ok).collect(),
            ))),
            Some(StreamOutcome::FailAfter(chunks)) => {
                let mut items: Vec<anyhow::Result<StreamChunk>> =
                    chunks.into_iter().map(Ok).collect();
                items.push(Err(anyhow::anyhow!("scripted stream failure")));
                Ok(Box::new(VecChunkStream::new(items)))
            }
            Some(StreamOutcome::FailOpen) => Err(anyhow::anyhow!("scripted open failure")),
            None => Ok(Box::new(VecChunkStream::new(Vec::new()))),
        }
    }
}

/// Chat client that records every outbound operation.
#[derive(Default)]
pub struct RecordingChat {
    pub sends: Mutex<Vec<(String, String)>>,
    pub edits: Mutex<Vec<String>>,
    pub reactions: Mutex<Vec<String>>,
    next_id: AtomicUsize,
}

impl RecordingChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent_contents(&self) -> Vec<String> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn edit_contents(&self) -> Vec<String> {
        self.edits.lock().unwrap().clone()
    }

    pub fn reaction_log(&self) -> Vec<String> {
        self.reactions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for RecordingChat {
    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
        _opts: SendOptions,
    ) -> ChannelResult<MessageRef> {
        self.sends
            .lock()
            .unwrap()
            .push((channel_id.to_string(), content.to_string()));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(MessageRef {
            channel_id: channel_id.to_string(),
            message_id: format!("sent-{id}"),
        })
    }

    async fn edit_message(&self, _message: &MessageRef, content: &str) -> ChannelResult<()> {
        self.edits.lock().unwrap().push(content.to_string());
        Ok(())
    }

    async fn delete_message(
        &self,
        _message: &MessageRef,
        _delay: Option<Duration>,
    ) -> ChannelResult<()> {
        Ok(())
    }

    async fn add_reaction(&self, _message: &MessageRef, emoji: &str) -> ChannelResult<()> {
        self.reactions.lock().unwrap().push(format!("+{emoji}"));
        Ok(())
    }

    async fn remove_reaction(&self, _message: &MessageRef, emoji: &str) -> ChannelResult<()> {
        self.reactions.lock().unwrap().push(format!("-{emoji}"));
        Ok(())
    }

    async fn trigger_typing(&self, _channel_id: &str) -> ChannelResult<()> {
        Ok(())
    }
}

/// Inbound message that mentions the bot.
pub fn mention(bot_id: &str, id: &str, content: &str) -> InboundMessage {
    InboundMessage {
        id: id.to_string(),
        channel_id: "chan".to_string(),
        author_id: "user".to_string(),
        author_is_bot: false,
        content: content.to_string(),
        mentions: vec![bot_id.to_string()],
        referenced_author_id: None,
    }
}

/// Poll until `predicate` holds or the timeout expires.
pub async fn wait_until<F: Fn() -> bool>(predicate: F) {
    for _ in 0..200 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within timeout");
}
