//! Persona priming.
//!
//! Builds the prompt sequence that turns a fresh AI session into the
//! configured persona: a roleplay instruction, then the persona's chat-log
//! corpus in two halves. The corpus slice is re-randomized on every
//! restart so the persona stays varied across session lifetimes.

use std::path::Path;

use rand::Rng;

/// Character budget for one corpus slice.
const MAX_CORPUS_CHARS: usize = 34_000;

/// Highest line the random slice may start at.
const MAX_START_LINE: usize = 4_500;

const FALLBACK_FIRST_HALF: &str = "No context loaded.";
const FALLBACK_SECOND_HALF: &str = "Context file may be missing or empty.";

/// Fixed prompt used to verify a freshly (re)started session responds.
pub const RESTART_PROMPT: &str = "Confirm you are operational by responding with 'System OK'.";

/// Persona priming material for one session start.
#[derive(Debug, Clone)]
pub struct Persona {
    username: String,
    first_half: String,
    second_half: String,
}

impl Persona {
    /// Load a persona from the corpus file.
    ///
    /// The corpus is filtered (lines containing "http" dropped), sliced at
    /// a random start line up to the character budget, and split near the
    /// midpoint at a line boundary. A missing or empty corpus degrades to
    /// fixed fallback halves with a warning; priming still runs so the
    /// session comes up.
    pub fn load(path: &Path, username: &str) -> Self {
        let (first_half, second_half) = match std::fs::read_to_string(path) {
            Ok(content) => {
                let lines: Vec<&str> = content
                    .lines()
                    .filter(|line| !line.contains("http"))
                    .collect();
                match slice_corpus(&lines, MAX_CORPUS_CHARS, MAX_START_LINE) {
                    Some(halves) => halves,
                    None => {
                        tracing::warn!(path = %path.display(), "Persona corpus is empty, priming with fallback");
                        fallback_halves()
                    }
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Persona corpus unavailable, priming with fallback");
                fallback_halves()
            }
        };

        Self {
            username: username.to_string(),
            first_half,
            second_half,
        }
    }

    /// Build a persona from in-memory halves.
    pub fn from_parts(username: &str, first_half: &str, second_half: &str) -> Self {
        Self {
            username: username.to_string(),
            first_half: first_half.to_string(),
            second_half: second_half.to_string(),
        }
    }

    /// The prompt sequence a new session is primed with, in order.
    pub fn priming_prompts(&self) -> Vec<String> {
        vec![
            self.instructions(),
            log_dump(1, "first", &self.first_half),
            log_dump(2, "second", &self.second_half),
        ]
    }

    fn instructions(&self) -> String {
        format!(
            "You are about to receive two sets of chat logs from a single Discord user ('{}').\n\n\
             Your task is to fully ingest, internalize, and emulate the voice, tone, vocabulary, \
             phrasing, punctuation, humor, and formatting style of the person from these logs.\n\n\
             After ingesting both parts, you will ROLEPLAY as this person ('{}') in perpetuity. \
             Respond to future messages as if you *are* them, including their quirks, style, \
             grammar, references, slang, and personality traits.\n\n\
             You may only use their voice and linguistic patterns to construct replies. If a new \
             message comes in, respond as they would, using only slightly modified versions of \
             existing messages from the logs, so that they naturally fit the ongoing conversation.\n\n\
             DO NOT break character. DO NOT explain yourself. DO NOT reference being an AI.\n\n\
             You will receive the logs in two parts: \"LOG DUMP [1/2]\" and \"LOG DUMP [2/2]\". \
             Wait until both are received before processing or responding.",
            self.username, self.username
        )
    }

    /// Wrap a user prompt with the in-character reminder sent on every request.
    pub fn wrap_user_prompt(prompt: &str) -> String {
        format!(
            "Reminder: You are roleplaying as the Discord user from the ingested logs. You must \
             ONLY speak as they would. Pull directly from their past messages or synthesize new \
             replies by subtly remixing and rephrasing real content from the logs.\n\n\
             Maintain:\n\
             - Their tone, style, attitude, spelling, slang, and punctuation.\n\
             - Their formatting habits (emojis, caps, line breaks, etc.)\n\
             - Their persona (sarcastic, kind, chaotic, formal, whatever it is)\n\n\
             Do NOT break character. Do NOT act like an AI. You are this person now.\n\n\
             Now respond to the user who mentioned you as they would:\n\
             [START DISCORD USER PROMPT]\n\
             {}\n\
             [END DISCORD USER PROMPT]",
            prompt
        )
    }
}

/// Where priming material comes from on each session start.
///
/// The corpus variant re-reads and re-slices the file per restart, so a
/// long-lived process cycles through different parts of the persona's
/// history as sessions come and go.
#[derive(Debug, Clone)]
pub enum PersonaSource {
    /// Re-slice the corpus file on every materialization.
    Corpus {
        path: std::path::PathBuf,
        username: String,
    },
    /// Fixed priming material (tests, corpus-less deployments).
    Fixed(Persona),
}

impl PersonaSource {
    /// Produce the persona to prime the next session with. Blocking when
    /// backed by a corpus file.
    pub fn materialize(&self) -> Persona {
        match self {
            Self::Corpus { path, username } => Persona::load(path, username),
            Self::Fixed(persona) => persona.clone(),
        }
    }
}

fn fallback_halves() -> (String, String) {
    (FALLBACK_FIRST_HALF.into(), FALLBACK_SECOND_HALF.into())
}

fn log_dump(part: usize, ordinal: &str, content: &str) -> String {
    format!(
        "LOG DUMP [{}/2]:\n\n\
         The following is the {} half of raw Discord messages sent by the user to emulate. \
         These are direct, chronological messages written by a single individual. Ingest this \
         data in full, preserving style, tone, slang, rhythm, phrasing, typos, emojis, \
         formatting quirks, and voice. Do not generate a response. Just read, learn, and store.\n\n\
         [START CHATLOG]\n\
         {}\n\
         [END CHATLOG]",
        part, ordinal, content
    )
}

/// Take a random contiguous run of whole lines within the budget and split
/// it near its midpoint at a line boundary.
fn slice_corpus(
    lines: &[&str],
    max_chars: usize,
    max_start_line: usize,
) -> Option<(String, String)> {
    if lines.is_empty() {
        return None;
    }

    let upper = max_start_line.min(lines.len());
    let start = rand::thread_rng().gen_range(0..upper);

    let mut selected = String::new();
    for line in &lines[start..] {
        // +1 for the newline separator
        if selected.len() + line.len() + 1 > max_chars {
            break;
        }
        selected.push_str(line);
        selected.push('\n');
    }

    if selected.trim().is_empty() {
        return None;
    }

    let mut boundary = selected.len() / 2;
    while boundary > 0 && !selected.is_char_boundary(boundary) {
        boundary -= 1;
    }
    let split_pos = selected[..boundary].rfind('\n').unwrap_or(boundary);
    let (first, second) = selected.split_at(split_pos);

    Some((first.trim().to_string(), second.trim().to_string()))
}
