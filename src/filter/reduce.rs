use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Policy;

/// Default number of suggestions returned to the caller.
pub const MAX_CANDIDATES: usize = 5;

/// Leading-space markers used by subword vocabularies: byte-level BPE (GPT-2)
/// and SentencePiece.
pub const SPACE_MARKERS: &[char] = &['Ġ', '▁'];

lazy_static! {
    /// Anything that's not a word char, whitespace, or a Latin/Vietnamese letter.
    static ref RE_JUNK: Regex = Regex::new("[^\\w\\s\u{00C0}-\u{1EF9}]").expect("invalid junk regex");
}

/// A single ranked suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub word: String,
    pub probability: f64,
}

/// Turns a ranked stream of decoded model tokens into a short, deduplicated
/// list of valid words.
#[derive(Debug, Clone)]
pub struct Reducer<'a> {
    policy: &'a Policy,
    max_candidates: usize,
    space_markers: &'a [char],
}

impl<'a> Reducer<'a> {
    pub fn new(policy: &'a Policy) -> Self {
        Self {
            policy,
            max_candidates: MAX_CANDIDATES,
            space_markers: SPACE_MARKERS,
        }
    }

    pub fn max_candidates(mut self, n: usize) -> Self {
        self.max_candidates = n;
        self
    }

    pub fn space_markers(mut self, markers: &'a [char]) -> Self {
        self.space_markers = markers;
        self
    }

    /// Consume (token, probability) pairs in descending probability order and
    /// collect up to `max_candidates` candidates. Stops pulling from `tokens`
    /// as soon as the output is full.
    pub fn reduce<I, S>(&self, tokens: I) -> Vec<Candidate>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut out = Vec::with_capacity(self.max_candidates);
        let mut seen: HashSet<String> = HashSet::new();

        if self.max_candidates == 0 {
            return out;
        }

        for (token, prob) in tokens {
            let word = self.clean(token.as_ref());

            // Control tokens like <pad>, <|endoftext|>.
            if word.starts_with('<') && word.ends_with('>') {
                continue;
            }
            if word.trim().is_empty() || seen.contains(&word) || !self.policy.is_valid(&word) {
                continue;
            }

            let word = RE_JUNK.replace_all(&word, "").into_owned();
            if word.is_empty() || seen.contains(&word) {
                continue;
            }

            seen.insert(word.clone());
            out.push(Candidate {
                word,
                probability: round4(prob),
            });

            if out.len() >= self.max_candidates {
                break;
            }
        }

        out
    }

    /// Turn space markers into spaces, then drop all spaces. Tokens are single
    /// word fragments.
    fn clean(&self, token: &str) -> String {
        token
            .trim()
            .chars()
            .map(|c| if self.space_markers.contains(&c) { ' ' } else { c })
            .filter(|c| *c != ' ')
            .collect()
    }
}

/// Reduce with the default policy and candidate cap.
pub fn reduce<I, S>(tokens: I) -> Vec<Candidate>
where
    I: IntoIterator<Item = (S, f64)>,
    S: AsRef<str>,
{
    Reducer::new(Policy::global()).reduce(tokens)
}

/// Round a probability to 4 decimal places.
fn round4(p: f64) -> f64 {
    (p * 10_000.0).round() / 10_000.0
}
