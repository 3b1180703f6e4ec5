//! Response streaming to chat.
//!
//! Converts the cumulative chunk feed into throttled edit events, then a
//! single unthrottled finalization carrying the trimmed text, source
//! citations, and the refusal verdict.

use std::time::{Duration, Instant};

use crate::ai::types::{Source, StreamChunk};

/// Shown when the stream ends without yielding a single chunk.
pub const NO_RESPONSE_PLACEHOLDER: &str = "<No response received>";

/// Most sources ever appended to a response.
const MAX_SOURCES: usize = 5;

/// Finalized response content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    /// What the message should display.
    pub content: String,
    /// Whether the response contained the refusal phrase.
    pub refusal: bool,
}

/// Per-request edit coalescer.
///
/// `preview` gates intermediate edits on the update interval and on the
/// content actually having changed; `finalize` always produces exactly one
/// terminal update regardless of the throttle.
#[derive(Debug)]
pub struct ResponseStreamer {
    update_interval: Duration,
    char_limit: usize,
    refusal_phrase: String,
    last_edit: Instant,
    last_displayed: String,
}

impl ResponseStreamer {
    pub fn new(update_interval: Duration, char_limit: usize, refusal_phrase: &str) -> Self {
        Self {
            update_interval,
            char_limit,
            refusal_phrase: refusal_phrase.to_string(),
            last_edit: Instant::now(),
            last_displayed: String::new(),
        }
    }

    /// Offer a chunk for an intermediate edit.
    ///
    /// Returns the display text when an edit should go out now, `None`
    /// when throttled or unchanged. The trailing ellipsis marks the
    /// response as still streaming.
    pub fn preview(&mut self, chunk: &StreamChunk, now: Instant) -> Option<String> {
        if now.duration_since(self.last_edit) <= self.update_interval {
            return None;
        }
        if chunk.message == self.last_displayed {
            return None;
        }
        self.last_edit = now;
        self.last_displayed = chunk.message.clone();
        Some(format!("{}...", truncate(&chunk.message, self.char_limit)))
    }

    /// Build the terminal update from the last chunk seen.
    ///
    /// Independent of the throttle and always fires, even when the
    /// content matches the last preview.
    pub fn finalize(&self, last_chunk: Option<&StreamChunk>) -> Finalized {
        let Some(chunk) = last_chunk else {
            return Finalized {
                content: NO_RESPONSE_PLACEHOLDER.to_string(),
                refusal: false,
            };
        };

        let text = chunk.message.trim();
        let refusal = text.contains(&self.refusal_phrase);
        let content = truncate(
            &format!("{}{}", text, format_sources(&chunk.sources)),
            self.char_limit,
        );

        Finalized { content, refusal }
    }
}

/// Cap `content` at `limit` characters, marking the cut with an ellipsis.
///
/// Over the limit, the first `limit - 4` characters are kept and `"..."`
/// appended; otherwise the content is returned unchanged.
pub fn truncate(content: &str, limit: usize) -> String {
    if content.chars().count() <= limit {
        return content.to_string();
    }
    let prefix: String = content.chars().take(limit.saturating_sub(4)).collect();
    format!("{}...", prefix)
}

/// Render up to five citations as a numbered link list.
pub fn format_sources(sources: &[Source]) -> String {
    if sources.is_empty() {
        return String::new();
    }
    let list: Vec<String> = sources
        .iter()
        .take(MAX_SOURCES)
        .enumerate()
        .map(|(i, s)| format!("{}. <{}>", i + 1, s.link))
        .collect();
    format!("\n\n**Sources:**\n{}", list.join("\n"))
}
