pub mod classify;
pub mod gate;
pub mod normalize;
pub mod reduce;

pub use classify::{is_valid, Verdict};
pub use gate::{gate, GateDecision, GateReason};
pub use normalize::{fold, normalize};
pub use reduce::{reduce, Candidate, Reducer, MAX_CANDIDATES};

use std::collections::HashSet;

use lazy_static::lazy_static;

use crate::models::FilterConfig;

/// Common short function words that are always accepted. Their low letter
/// entropy would otherwise trip the ratio heuristics.
pub const ALLOW_WORDS: &[&str] = &[
    // English.
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "of", "for", "with", "by", "as",
    "is", "am", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does",
    "did", "will", "would", "can", "could", "shall", "should", "may", "might", "must", "i", "you",
    "he", "she", "it", "we", "they", "me", "him", "her", "us", "them", "my", "your", "his", "its",
    "our", "their", "mine", "yours", "hers", "ours", "theirs",
    // Vietnamese.
    "tôi", "bạn", "anh", "chị", "em", "nó", "họ", "ta", "mình", "có", "không", "và", "nhưng",
    "hoặc", "nếu", "thì", "mà", "là", "đã", "đang", "sẽ", "vừa", "mới", "cũng", "rất", "quá",
    "lắm",
];

pub const MIN_WORD_LEN: usize = 2;
pub const HEURISTIC_MIN_LEN: usize = 3;
pub const RUN_LEN: usize = 3;
pub const MIN_RUN_LEN: usize = 2;
pub const UNIFORM_CLASS_LEN: usize = 4;
pub const LETTER_RATIO: f64 = 0.7;
pub const GIBBERISH_RATIO: f64 = 0.5;
pub const GIBBERISH_MIN_WORDS: usize = 3;

lazy_static! {
    static ref DEFAULT_POLICY: Policy = Policy::default();
}

/// Thresholds and word lists used by the classifier and the gate.
#[derive(Debug, Clone)]
pub struct Policy {
    allow_list: HashSet<String>,

    /// Words shorter than this (in chars) are rejected unless allow-listed.
    pub min_word_len: usize,
    /// Letter composition heuristics apply to words at least this long.
    pub heuristic_min_len: usize,
    /// A character repeated this many times in a row marks gibberish.
    pub run_len: usize,
    /// All-consonant or all-vowel words at least this long are rejected.
    pub uniform_class_len: usize,
    /// Minimum share of letters in a word.
    pub letter_ratio: f64,
    /// Minimum share of valid words in a long input.
    pub gibberish_ratio: f64,
    /// The valid-word share is only checked above this word count.
    pub gibberish_min_words: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            allow_list: ALLOW_WORDS.iter().map(|w| w.to_string()).collect(),
            min_word_len: MIN_WORD_LEN,
            heuristic_min_len: HEURISTIC_MIN_LEN,
            run_len: RUN_LEN,
            uniform_class_len: UNIFORM_CLASS_LEN,
            letter_ratio: LETTER_RATIO,
            gibberish_ratio: GIBBERISH_RATIO,
            gibberish_min_words: GIBBERISH_MIN_WORDS,
        }
    }
}

impl Policy {
    /// Build a policy from the [filter] config section. Extra allow-list
    /// words are lowercased and added to the built-in list.
    pub fn from_config(cfg: &FilterConfig) -> Self {
        // A run of one char is every word, so runs start at 2.
        let run_len = cfg.run_len.max(MIN_RUN_LEN);
        if run_len != cfg.run_len {
            log::warn!(
                "filter run_len {} is too small, using {}",
                cfg.run_len,
                run_len
            );
        }

        let mut p = Self {
            min_word_len: cfg.min_word_len,
            heuristic_min_len: cfg.heuristic_min_len,
            run_len,
            uniform_class_len: cfg.uniform_class_len,
            letter_ratio: cfg.letter_ratio,
            gibberish_ratio: cfg.gibberish_ratio,
            gibberish_min_words: cfg.gibberish_min_words,
            ..Self::default()
        };

        for w in &cfg.extra_allow_words {
            let w = w.trim().to_lowercase();
            if !w.is_empty() {
                p.allow_list.insert(w);
            }
        }

        p
    }

    /// Shared process-wide default policy.
    pub fn global() -> &'static Policy {
        &DEFAULT_POLICY
    }

    /// Check if a lowercased word is on the allow-list.
    pub fn is_allowed(&self, word: &str) -> bool {
        self.allow_list.contains(word)
    }

    pub fn allow_list_len(&self) -> usize {
        self.allow_list.len()
    }
}
