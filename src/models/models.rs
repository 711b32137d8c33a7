use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::filter::{
    Candidate, GIBBERISH_MIN_WORDS, GIBBERISH_RATIO, HEURISTIC_MIN_LEN, LETTER_RATIO,
    MIN_WORD_LEN, RUN_LEN, UNIFORM_CLASS_LEN,
};

/// Prediction request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictReq {
    #[serde(default)]
    pub text: Option<String>,
}

/// Prediction response body. `message` is set when the input was turned away
/// by the gate, `error` on failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PredictResp {
    pub predictions: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictResp {
    pub fn ok(predictions: Vec<Candidate>) -> Self {
        Self {
            predictions,
            ..Default::default()
        }
    }

    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            message: Some(msg.into()),
            ..Default::default()
        }
    }

    pub fn error(err: impl Into<String>) -> Self {
        Self {
            error: Some(err.into()),
            ..Default::default()
        }
    }
}

pub const STATUS_HEALTHY: &str = "healthy";
pub const STATUS_ERROR: &str = "error";

/// Health check response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResp {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub model: ModelConfig,
    pub filter: Option<FilterConfig>,
    pub cache: Option<CacheConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    /// Directory with config.json, tokenizer.json and the weights.
    #[serde(default)]
    pub dir: String,
    /// Number of most probable tokens handed to the reducer. 0 = 4x max_candidates.
    #[serde(default)]
    pub top_k: usize,
    #[serde(default)]
    pub max_candidates: usize,
}

/// Tunable classifier and gate thresholds.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FilterConfig {
    #[serde(default = "default_min_word_len")]
    pub min_word_len: usize,
    #[serde(default = "default_heuristic_min_len")]
    pub heuristic_min_len: usize,
    #[serde(default = "default_run_len")]
    pub run_len: usize,
    #[serde(default = "default_uniform_class_len")]
    pub uniform_class_len: usize,
    #[serde(default = "default_letter_ratio")]
    pub letter_ratio: f64,
    #[serde(default = "default_gibberish_ratio")]
    pub gibberish_ratio: f64,
    #[serde(default = "default_gibberish_min_words")]
    pub gibberish_min_words: usize,
    #[serde(default)]
    pub extra_allow_words: Vec<String>,
}

fn default_min_word_len() -> usize {
    MIN_WORD_LEN
}

fn default_heuristic_min_len() -> usize {
    HEURISTIC_MIN_LEN
}

fn default_run_len() -> usize {
    RUN_LEN
}

fn default_uniform_class_len() -> usize {
    UNIFORM_CLASS_LEN
}

fn default_letter_ratio() -> f64 {
    LETTER_RATIO
}

fn default_gibberish_ratio() -> f64 {
    GIBBERISH_RATIO
}

fn default_gibberish_min_words() -> usize {
    GIBBERISH_MIN_WORDS
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_word_len: default_min_word_len(),
            heuristic_min_len: default_heuristic_min_len(),
            run_len: default_run_len(),
            uniform_class_len: default_uniform_class_len(),
            letter_ratio: default_letter_ratio(),
            gibberish_ratio: default_gibberish_ratio(),
            gibberish_min_words: default_gibberish_min_words(),
            extra_allow_words: Vec::new(),
        }
    }
}
