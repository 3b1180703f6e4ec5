//! AI backend collaborator traits.
//!
//! The backend is a blocking collaborator: session creation, prompt
//! submission, and per-chunk retrieval all block the calling thread. The
//! `SessionManager` bridges every call onto tokio's blocking worker pool,
//! so these traits stay synchronous by design.

use crate::ai::types::StreamChunk;

/// Factory for live AI sessions.
///
/// Any error from `create_session` is treated as a recoverable
/// session-creation failure by the manager.
pub trait AiBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Open a new session. Blocking.
    fn create_session(&self) -> anyhow::Result<Box<dyn AiSession>>;
}

/// One live conversation with the AI backend.
pub trait AiSession: Send {
    /// Submit a prompt and return the complete response text. Blocking.
    ///
    /// Used for persona priming, where the response content is discarded.
    fn prompt(&mut self, message: &str) -> anyhow::Result<String>;

    /// Submit a prompt for streaming.
    ///
    /// The returned stream owns its transport state, so the session stays
    /// usable for the next prompt once the stream is drained or dropped.
    fn prompt_stream(&mut self, message: &str) -> anyhow::Result<Box<dyn ChunkStream>>;
}

/// Blocking iterator over cumulative response snapshots.
pub trait ChunkStream: Send {
    /// Retrieve the next chunk, `None` when the response is complete.
    /// Blocking per item.
    fn next_chunk(&mut self) -> anyhow::Result<Option<StreamChunk>>;
}

/// Adapter exposing any in-memory chunk sequence as a `ChunkStream`.
///
/// Useful in tests and for backends that buffer whole responses.
pub struct VecChunkStream {
    chunks: std::vec::IntoIter<anyhow::Result<StreamChunk>>,
}

impl VecChunkStream {
    pub fn new(chunks: Vec<anyhow::Result<StreamChunk>>) -> Self {
        Self {
            chunks: chunks.into_iter(),
        }
    }
}

impl ChunkStream for VecChunkStream {
    fn next_chunk(&mut self) -> anyhow::Result<Option<StreamChunk>> {
        match self.chunks.next() {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}
