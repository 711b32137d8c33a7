use super::{normalize::fold, Policy};

/// Letters that only occur in Vietnamese (and a few Latin-1 accented vowels).
/// A word containing any of these skips the letter composition heuristics.
pub const VIETNAMESE_LETTERS: &str = "ÀÁÂÃÈÉÊÌÍÒÓÔÕÙÚÝàáâãèéêìíòóôõùúýĂăĐđĨĩŨũƠơƯư\
    ẠạẢảẤấẦầẨẩẪẫẬậẮắẰằẲẳẴẵẶặẸẹẺẻẼẽẾếỀềỂểỄễỆệỈỉỊịỌọỎỏỐốỒồỔổỖỗỘộỚớỜờỞởỠỡỢợ\
    ỤụỦủỨứỪừỬửỮữỰựỲỳỴỵỶỷỸỹ";

/// Vowels counted towards the letter ratio of a lowercased word.
pub const VOWELS: &str = "aeiouyàáâãèéêìíòóôõùúýăđĩũơưạảấầẩẫậắằẳẵặẹẻẽếềểễệỉịọỏốồổỗộớờởỡợ\
    ụủứừửữựỳỵỷỹ";

/// Consonants counted towards the letter ratio of a lowercased word.
pub const CONSONANTS: &str = "bcdfghjklmnpqrstvwxz";

/// Keyboard rows. A word typed entirely from one row is keyboard mashing.
pub const KEYBOARD_ROWS: [&str; 3] = ["qwertyuiop", "asdfghjkl", "zxcvbnm"];

/// Character classes for the all-consonant / all-vowel checks.
const UNIFORM_CONSONANTS: &str = "bcdfghjklmnpqrstvwxyz";
const UNIFORM_VOWELS: &str = "aeiouy";

/// Outcome of classifying a single word, with the rule that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    AllowListed,
    Empty,
    TooShort,
    NoLetters,
    RepeatedChar,
    KeyboardRow,
    AllConsonants,
    AllVowels,
    LowLetterRatio,
    LowValidLetters,
}

impl Verdict {
    pub fn is_valid(self) -> bool {
        matches!(self, Verdict::Accepted | Verdict::AllowListed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::AllowListed => "allow-listed",
            Verdict::Empty => "empty",
            Verdict::TooShort => "too short",
            Verdict::NoLetters => "no letters",
            Verdict::RepeatedChar => "repeated character",
            Verdict::KeyboardRow => "keyboard row",
            Verdict::AllConsonants => "all consonants",
            Verdict::AllVowels => "all vowels",
            Verdict::LowLetterRatio => "low letter ratio",
            Verdict::LowValidLetters => "low valid letter ratio",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check if a word is an acceptable Vietnamese (or common foreign) word
/// using the default policy.
pub fn is_valid(word: &str) -> bool {
    Policy::global().is_valid(word)
}

impl Policy {
    pub fn is_valid(&self, word: &str) -> bool {
        self.classify(word).is_valid()
    }

    /// Classify a word. Pure; never fails for any input.
    pub fn classify(&self, word: &str) -> Verdict {
        let word = word.trim();
        if word.is_empty() {
            return Verdict::Empty;
        }

        // Allow-listed words bypass every other rule, including the minimum
        // length, so "a" and "i" are accepted.
        let lower = word.to_lowercase();
        if self.is_allowed(&lower) || self.is_allowed(&fold(&lower)) {
            return Verdict::AllowListed;
        }

        let len = word.chars().count();
        if len < self.min_word_len {
            return Verdict::TooShort;
        }

        let has_vi_letter = word.chars().any(|c| VIETNAMESE_LETTERS.contains(c));
        if len >= self.heuristic_min_len && !has_vi_letter {
            if let Some(v) = self.check_composition(&lower, len) {
                return v;
            }
        }

        // Share of alphabetic characters in the whole word.
        let valid = word
            .chars()
            .filter(|c| c.is_alphabetic() || VIETNAMESE_LETTERS.contains(*c))
            .count();
        if (valid as f64) / (len as f64) < self.letter_ratio {
            return Verdict::LowValidLetters;
        }

        Verdict::Accepted
    }

    /// Letter composition heuristics for words without Vietnamese letters.
    /// Returns a rejecting verdict, or None if the word looks plausible.
    fn check_composition(&self, lower: &str, len: usize) -> Option<Verdict> {
        let vowels = lower.chars().filter(|c| VOWELS.contains(*c)).count();
        let consonants = lower.chars().filter(|c| CONSONANTS.contains(*c)).count();
        let letters = vowels + consonants;
        if letters == 0 {
            return Some(Verdict::NoLetters);
        }

        if longest_run(lower) >= self.run_len {
            return Some(Verdict::RepeatedChar);
        }
        if KEYBOARD_ROWS
            .iter()
            .any(|row| lower.chars().all(|c| row.contains(c)))
        {
            return Some(Verdict::KeyboardRow);
        }

        let n = lower.chars().count();
        if n >= self.uniform_class_len && lower.chars().all(|c| UNIFORM_CONSONANTS.contains(c)) {
            return Some(Verdict::AllConsonants);
        }
        if n >= self.uniform_class_len && lower.chars().all(|c| UNIFORM_VOWELS.contains(c)) {
            return Some(Verdict::AllVowels);
        }

        if (letters as f64) / (len as f64) < self.letter_ratio {
            return Some(Verdict::LowLetterRatio);
        }

        None
    }
}

/// Length of the longest run of one repeated character.
fn longest_run(s: &str) -> usize {
    let mut best = 0;
    let mut run = 0;
    let mut prev: Option<char> = None;

    for c in s.chars() {
        if prev == Some(c) {
            run += 1;
        } else {
            run = 1;
            prev = Some(c);
        }
        best = best.max(run);
    }
    best
}
