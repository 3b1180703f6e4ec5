//! Wire types shared between the AI backend and its consumers.

use serde::{Deserialize, Serialize};

/// A search-result citation attached to a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    /// Human-readable title of the cited page.
    pub label: String,
    /// Link to the cited page.
    pub link: String,
}

/// One snapshot of an in-progress AI response.
///
/// Chunks are cumulative: `message` carries the full response-so-far, not
/// a delta. Consumers diff against what they last displayed themselves.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StreamChunk {
    /// Full message text so far.
    #[serde(default)]
    pub message: String,
    /// Citations, if the backend searched.
    #[serde(default)]
    pub sources: Vec<Source>,
    /// Set when this chunk reports a backend failure instead of content.
    #[serde(default)]
    pub error: Option<String>,
}

impl StreamChunk {
    /// A content chunk with no sources.
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// An error chunk terminating the stream.
    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            error: Some(detail.into()),
            ..Self::default()
        }
    }

    /// Whether this chunk reports a failure.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
