//! Session lifecycle management.
//!
//! Owns the single live AI session process-wide. All prompt/response
//! exchanges, restarts included, serialize on one exclusive lock, so at
//! most one exchange is in flight at any moment. Health counters feed two
//! independent recovery loops: consecutive backend errors restart the
//! session from here, consecutive refusal responses restart it from the
//! dispatcher.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::ai::backend::{AiBackend, AiSession};
use crate::ai::types::StreamChunk;
use crate::config::{AI_INACTIVITY_THRESHOLD, AI_MAX_ERRORS};
use crate::persona::{PersonaSource, RESTART_PROMPT};

/// Message surfaced when the session is gone and a lazy restart failed.
const RESTART_FAILED_MSG: &str = "AI session could not be restarted.";

/// Observable lifecycle state of the managed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session has ever been started.
    Uninitialized,
    /// A session is available for prompts.
    Live,
    /// A restart is in progress.
    Restarting,
    /// The last restart failed; the next stream request retries lazily.
    Failed,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Live,
            2 => Self::Restarting,
            3 => Self::Failed,
            _ => Self::Uninitialized,
        }
    }
}

/// How one prompt/response exchange ended.
enum ExchangeOutcome {
    /// Stream drained to completion.
    Completed,
    /// The consumer dropped its receiver mid-stream.
    Abandoned,
    /// The backend failed; detail goes into the error chunk.
    Failed(String),
}

/// Owner of the single AI session.
pub struct SessionManager {
    backend: Arc<dyn AiBackend>,
    persona: PersonaSource,
    session: Mutex<Option<Box<dyn AiSession>>>,
    state: AtomicU8,
    error_count: AtomicU32,
    refusal_count: AtomicU32,
    /// Epoch seconds of the most recent stream request. Written without
    /// the lock: it only feeds a coarse idleness heuristic.
    last_activity: AtomicU64,
    max_errors: u32,
    inactivity_threshold: Duration,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn AiBackend>, persona: PersonaSource) -> Self {
        Self {
            backend,
            persona,
            session: Mutex::new(None),
            state: AtomicU8::new(0),
            error_count: AtomicU32::new(0),
            refusal_count: AtomicU32::new(0),
            last_activity: AtomicU64::new(now_epoch()),
            max_errors: AI_MAX_ERRORS,
            inactivity_threshold: AI_INACTIVITY_THRESHOLD,
        }
    }

    /// Override the consecutive-error threshold.
    pub fn with_max_errors(mut self, max_errors: u32) -> Self {
        self.max_errors = max_errors;
        self
    }

    /// Override the inactivity threshold.
    pub fn with_inactivity_threshold(mut self, threshold: Duration) -> Self {
        self.inactivity_threshold = threshold;
        self
    }

    /// Start (or replace) the AI session.
    ///
    /// Holds the exclusive lock for the whole sequence: discard the old
    /// handle, create a fresh one, prime the persona, then submit the
    /// restart-verification prompt and drain its stream. Creation and
    /// priming block, so they run on the blocking pool. Returns false on
    /// any failure, leaving the handle absent; no retry here.
    pub async fn start_session(&self) -> bool {
        tracing::info!(backend = %self.backend.name(), "Initializing AI session");
        let mut guard = self.session.lock().await;
        self.set_state(SessionState::Restarting);
        *guard = None;

        let backend = Arc::clone(&self.backend);
        let persona = self.persona.clone();
        let created = tokio::task::spawn_blocking(move || -> anyhow::Result<Box<dyn AiSession>> {
            let mut session = backend.create_session()?;
            for prompt in persona.materialize().priming_prompts() {
                session.prompt(&prompt)?;
            }
            let mut stream = session.prompt_stream(RESTART_PROMPT)?;
            while stream.next_chunk()?.is_some() {}
            Ok(session)
        })
        .await;

        match created {
            Ok(Ok(session)) => {
                *guard = Some(session);
                self.error_count.store(0, Ordering::Relaxed);
                self.refusal_count.store(0, Ordering::Relaxed);
                self.touch_activity();
                self.set_state(SessionState::Live);
                tracing::info!("AI session started successfully");
                true
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Failed to start AI session");
                self.set_state(SessionState::Failed);
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Session creation task did not complete");
                self.set_state(SessionState::Failed);
                false
            }
        }
    }

    /// Restart the session. Awaits any in-flight exchange first (both
    /// paths take the same lock), so a restart never interleaves with an
    /// active prompt/response.
    pub async fn restart_session(&self) -> bool {
        tracing::warn!("Restarting AI session");
        self.start_session().await
    }

    /// Stream a response for `prompt`.
    ///
    /// Marks activity immediately, before any locking, so inactivity
    /// tracking reflects request arrival. The exchange itself runs in a
    /// spawned task holding the session lock until the stream is drained,
    /// abandoned, or failed.
    pub fn response_stream(self: Arc<Self>, prompt: String) -> mpsc::Receiver<StreamChunk> {
        self.touch_activity();
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move { self.run_exchange(prompt, tx).await });
        rx
    }

    async fn run_exchange(self: Arc<Self>, prompt: String, tx: mpsc::Sender<StreamChunk>) {
        if !self.has_session().await {
            tracing::error!("AI session not initialized, restarting");
            if !self.restart_session().await {
                let _ = tx.send(StreamChunk::error(RESTART_FAILED_MSG)).await;
                return;
            }
        }

        let mut guard = self.session.lock().await;
        let Some(session) = guard.take() else {
            // Another exchange failed its own restart between our check
            // and this lock acquisition.
            let _ = tx.send(StreamChunk::error(RESTART_FAILED_MSG)).await;
            return;
        };

        let preview: String = prompt.chars().take(75).collect();
        tracing::info!(prompt = %preview, "New prompt");

        let (session, outcome) = relay_chunks(session, prompt, &tx).await;
        *guard = session;
        drop(guard);

        match outcome {
            ExchangeOutcome::Completed => {
                self.error_count.store(0, Ordering::Relaxed);
            }
            ExchangeOutcome::Abandoned => {
                tracing::debug!("Stream consumer went away, exchange abandoned");
            }
            ExchangeOutcome::Failed(detail) => {
                let errors = self.error_count.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::error!(error = %detail, error_count = errors, "AI backend error");
                let _ = tx.send(StreamChunk::error(detail)).await;
                if errors >= self.max_errors {
                    tracing::warn!("Max errors reached, auto-restarting");
                    self.restart_session().await;
                }
            }
        }
    }

    /// Restart when the session has been idle past the threshold.
    ///
    /// Idleness is tested via lock availability: a held lock means an
    /// exchange is in flight, and an active session is never preempted.
    pub async fn check_inactivity(&self) {
        let idle = now_epoch().saturating_sub(self.last_activity.load(Ordering::Relaxed));
        if idle <= self.inactivity_threshold.as_secs() {
            return;
        }
        if self.session.try_lock().is_err() {
            return;
        }
        tracing::info!(idle_secs = idle, "Session idle, restarting");
        self.restart_session().await;
    }

    /// Record a refusal response; returns the new consecutive count.
    pub fn record_refusal(&self) -> u32 {
        let count = self.refusal_count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(refusal_count = count, "AI refusal response detected");
        count
    }

    /// A non-refusal response clears the streak.
    pub fn clear_refusals(&self) {
        if self.refusal_count.swap(0, Ordering::Relaxed) > 0 {
            tracing::info!("Resetting refusal counter");
        }
    }

    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn refusal_count(&self) -> u32 {
        self.refusal_count.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Relaxed))
    }

    async fn has_session(&self) -> bool {
        self.session.lock().await.is_some()
    }

    fn touch_activity(&self) {
        self.last_activity.store(now_epoch(), Ordering::Relaxed);
    }

    /// Backdate the activity stamp so inactivity paths can be exercised.
    #[cfg(test)]
    pub(crate) fn set_last_activity(&self, epoch_secs: u64) {
        self.last_activity.store(epoch_secs, Ordering::Relaxed);
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }
}

/// Open the stream and relay chunks in arrival order.
///
/// Each blocking retrieval runs on the blocking pool; the session comes
/// back to the caller so it can be returned to the lock slot (`None` only
/// when the blocking task itself died and took the handle with it).
async fn relay_chunks(
    session: Box<dyn AiSession>,
    prompt: String,
    tx: &mpsc::Sender<StreamChunk>,
) -> (Option<Box<dyn AiSession>>, ExchangeOutcome) {
    let opened = tokio::task::spawn_blocking(move || {
        let mut session = session;
        let stream = session.prompt_stream(&prompt);
        (session, stream)
    })
    .await;

    let (session, stream) = match opened {
        Ok((session, Ok(stream))) => (session, stream),
        Ok((session, Err(e))) => {
            return (Some(session), ExchangeOutcome::Failed(e.to_string()));
        }
        Err(e) => {
            return (
                None,
                ExchangeOutcome::Failed(format!("prompt task failed: {e}")),
            );
        }
    };

    let mut stream = stream;
    loop {
        let step = tokio::task::spawn_blocking(move || {
            let mut stream = stream;
            let item = stream.next_chunk();
            (stream, item)
        })
        .await;

        let (returned, item) = match step {
            Ok(v) => v,
            Err(e) => {
                return (
                    Some(session),
                    ExchangeOutcome::Failed(format!("chunk task failed: {e}")),
                );
            }
        };
        stream = returned;

        match item {
            Ok(Some(chunk)) => {
                if tx.send(chunk).await.is_err() {
                    return (Some(session), ExchangeOutcome::Abandoned);
                }
            }
            Ok(None) => return (Some(session), ExchangeOutcome::Completed),
            Err(e) => return (Some(session), ExchangeOutcome::Failed(e.to_string())),
        }
    }
}

fn now_epoch() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
