use super::Policy;

/// Why an input was turned away before reaching the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateReason {
    EmptyText,
    NoWords,
    LastWordInvalid,
    Gibberish,
}

impl GateReason {
    /// Human readable message returned to API callers.
    pub fn message(self) -> &'static str {
        match self {
            GateReason::EmptyText => "Empty text",
            GateReason::NoWords => "No words found",
            GateReason::LastWordInvalid => "Last word is not a valid word",
            GateReason::Gibberish => "Text appears to be gibberish",
        }
    }
}

impl std::fmt::Display for GateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Reject(GateReason),
}

impl GateDecision {
    pub fn proceed(self) -> bool {
        self == GateDecision::Proceed
    }
}

/// Decide whether a whole input is worth a model call, using the default policy.
pub fn gate(text: &str) -> GateDecision {
    Policy::global().gate(text)
}

impl Policy {
    /// The last word must be valid (it's the word the user just typed), and
    /// inputs longer than `gibberish_min_words` must be mostly valid words.
    pub fn gate(&self, text: &str) -> GateDecision {
        let text = text.trim();
        if text.is_empty() {
            return GateDecision::Reject(GateReason::EmptyText);
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        let last = match words.last() {
            Some(w) => w,
            None => return GateDecision::Reject(GateReason::NoWords),
        };

        if !self.is_valid(last) {
            return GateDecision::Reject(GateReason::LastWordInvalid);
        }

        if words.len() > self.gibberish_min_words {
            let valid = words.iter().filter(|w| self.is_valid(w)).count();
            if (valid as f64) / (words.len() as f64) < self.gibberish_ratio {
                return GateDecision::Reject(GateReason::Gibberish);
            }
        }

        GateDecision::Proceed
    }
}
