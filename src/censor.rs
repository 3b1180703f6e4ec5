//! Curse-word masking applied to prompts before they reach the AI.
//!
//! A pure string transform: alphabetic runs are compared case-insensitively
//! against the configured word set, and matches longer than two characters
//! keep their first two characters with the remainder dashed out.
//! Non-alphabetic characters pass through untouched.

use std::collections::HashSet;
use std::path::Path;

/// Case-insensitive curse word set.
#[derive(Debug, Clone, Default)]
pub struct CensorList {
    words: HashSet<String>,
}

impl CensorList {
    /// Load the word list from a file, one word per line.
    ///
    /// A missing or unreadable file yields an empty list with a warning;
    /// censorship is best-effort and must not block startup.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_words(content.lines()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Censor list unavailable, masking disabled");
                Self::default()
            }
        }
    }

    /// Build a list from an iterator of words.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    /// Number of configured words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the list is empty (masking is then a no-op).
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Mask curse words in the prompt.
    ///
    /// Words of length <= 2 are never masked, even when listed.
    pub fn mask(&self, prompt: &str) -> String {
        if self.words.is_empty() {
            return prompt.to_string();
        }

        let mut out = String::with_capacity(prompt.len());
        let mut word = String::new();

        for ch in prompt.chars() {
            if ch.is_alphabetic() {
                word.push(ch);
            } else {
                self.flush_word(&mut out, &mut word);
                out.push(ch);
            }
        }
        self.flush_word(&mut out, &mut word);

        out
    }

    fn flush_word(&self, out: &mut String, word: &mut String) {
        if word.is_empty() {
            return;
        }
        let len = word.chars().count();
        if len > 2 && self.words.contains(&word.to_lowercase()) {
            out.extend(word.chars().take(2));
            out.extend(std::iter::repeat('-').take(len - 2));
        } else {
            out.push_str(word);
        }
        word.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> CensorList {
        CensorList::from_words(["darn", "heck", "so"])
    }

    #[test]
    fn masks_listed_word_keeping_first_two_chars() {
        assert_eq!(list().mask("darn it"), "da-- it");
    }

    #[test]
    fn masking_is_case_insensitive() {
        assert_eq!(list().mask("DARN Heck"), "DA-- He--");
    }

    #[test]
    fn short_words_are_never_masked() {
        // "so" is listed but only two characters long
        assert_eq!(list().mask("so what"), "so what");
    }

    #[test]
    fn unlisted_words_pass_through() {
        assert_eq!(list().mask("hello world"), "hello world");
    }

    #[test]
    fn non_alphabetic_characters_are_preserved() {
        assert_eq!(list().mask("darn! darn? 100% darn."), "da--! da--? 100% da--.");
    }

    #[test]
    fn word_boundaries_prevent_substring_masking() {
        // "darning" is a different word and must not be touched
        assert_eq!(list().mask("darning"), "darning");
    }

    #[test]
    fn trailing_word_is_masked() {
        assert_eq!(list().mask("oh darn"), "oh da--");
    }

    #[test]
    fn empty_list_is_a_noop() {
        let empty = CensorList::default();
        assert_eq!(empty.mask("darn"), "darn");
    }

    #[test]
    fn unicode_words_mask_by_char_count() {
        let list = CensorList::from_words(["müll"]);
        assert_eq!(list.mask("müll"), "mü--");
    }

    #[test]
    fn load_missing_file_yields_empty_list() {
        let list = CensorList::load(Path::new("/nonexistent/censorship.txt"));
        assert!(list.is_empty());
    }

    #[test]
    fn load_reads_one_word_per_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(file, "darn\n  heck  \n\nfoo").unwrap();
        let list = CensorList::load(file.path());
        assert_eq!(list.len(), 3);
        assert_eq!(list.mask("Heck"), "He--");
    }
}
