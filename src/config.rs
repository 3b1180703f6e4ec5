//! Bot configuration.
//!
//! Everything comes from the environment, matching the deployment surface:
//! `DISCORD_TOKEN` is required, the rest have defaults tuned for the
//! reference deployment.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::BotError;

/// Discord message character limit the bot targets for its own messages.
pub const DISCORD_MSG_CHAR_LIMIT: usize = 1000;

/// Minimum delay between streamed message edits.
pub const UPDATE_INTERVAL: Duration = Duration::from_millis(700);

/// Idle time after which the watchdog restarts the AI session.
pub const AI_INACTIVITY_THRESHOLD: Duration = Duration::from_secs(15 * 60);

/// Consecutive stream failures that trigger an automatic restart.
pub const AI_MAX_ERRORS: u32 = 3;

/// Consecutive refusal responses that trigger an automatic restart.
pub const AI_MAX_REFUSALS: u32 = 3;

/// Requests admitted per sliding window.
pub const REQUEST_LIMIT_PER_WINDOW: usize = 8;

/// Sliding window length for rate limiting.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Cooldown applied (and renewed) on rate-limit rejections.
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(15);

/// Notice shown to users who hit the rate limit.
pub const RATE_LIMIT_MESSAGE: &str =
    "hey hey, are you trolling me? Give me a second to chill out and try again.";

/// Exact substring Meta AI emits when it refuses to answer in character.
const DEFAULT_REFUSAL_PHRASE: &str = "Sorry, I can\u{2019}t help you";

/// Runtime configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Discord bot token (required).
    pub discord_token: String,
    /// Discord user ID allowed to run owner commands.
    pub owner_id: Option<String>,
    /// Set when running containerized; the Meta AI client disables its
    /// browser sandbox in that case.
    pub docker_env: bool,
    /// One curse word per line.
    pub censor_list_path: PathBuf,
    /// Chat-log corpus used to prime the persona.
    pub persona_corpus_path: PathBuf,
    /// Persona name the AI roleplays as.
    pub persona_name: String,
    /// Exact substring that marks a refusal response.
    pub refusal_phrase: String,
}

impl BotConfig {
    /// Load configuration from the environment.
    ///
    /// Fails only when `DISCORD_TOKEN` is absent; everything else falls
    /// back to defaults.
    pub fn from_env() -> Result<Self, BotError> {
        let discord_token = std::env::var("DISCORD_TOKEN")
            .map_err(|_| BotError::Config("DISCORD_TOKEN not set".into()))?;
        if discord_token.trim().is_empty() {
            return Err(BotError::Config("DISCORD_TOKEN is empty".into()));
        }

        Ok(Self {
            discord_token,
            owner_id: std::env::var("OWNER_ID").ok().filter(|v| !v.is_empty()),
            docker_env: std::env::var("DOCKER_ENV").is_ok(),
            censor_list_path: std::env::var("CENSOR_LIST")
                .unwrap_or_else(|_| "censorship.txt".into())
                .into(),
            persona_corpus_path: std::env::var("PERSONA_CORPUS")
                .unwrap_or_else(|_| "filtered_messages.txt".into())
                .into(),
            persona_name: std::env::var("PERSONA_NAME").unwrap_or_else(|_| "Gama".into()),
            refusal_phrase: std::env::var("REFUSAL_PHRASE")
                .unwrap_or_else(|_| DEFAULT_REFUSAL_PHRASE.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_refusal_phrase_uses_curly_apostrophe() {
        assert!(DEFAULT_REFUSAL_PHRASE.contains('\u{2019}'));
    }

    #[test]
    fn constants_match_reference_tuning() {
        assert_eq!(DISCORD_MSG_CHAR_LIMIT, 1000);
        assert_eq!(UPDATE_INTERVAL, Duration::from_millis(700));
        assert_eq!(AI_INACTIVITY_THRESHOLD, Duration::from_secs(900));
        assert_eq!(AI_MAX_ERRORS, 3);
        assert_eq!(AI_MAX_REFUSALS, 3);
        assert_eq!(REQUEST_LIMIT_PER_WINDOW, 8);
        assert_eq!(RATE_LIMIT_COOLDOWN, Duration::from_secs(15));
    }
}
