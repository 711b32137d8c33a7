mod gpt2;

pub use gpt2::Gpt2Model;

use std::{cmp::Ordering, path::Path, sync::Arc};

/// A next-token language model: text <-> token ids, and a probability
/// distribution over the vocabulary for the position after a prefix.
pub trait LanguageModel: Send + Sync {
    /// Model name for logs and the health endpoint.
    fn name(&self) -> &str;

    /// Encode text into token ids.
    fn encode(&self, text: &str) -> Result<Vec<u32>, ModelError>;

    /// Probability distribution over the vocabulary for the next token.
    fn infer(&self, ids: &[u32]) -> Result<Vec<f32>, ModelError>;

    /// Decode a single token id into text.
    fn decode(&self, id: u32) -> Result<String, ModelError>;

    /// Marker the vocabulary uses for a leading space.
    fn space_marker(&self) -> char {
        'Ġ'
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid model config: {0}")]
    Config(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(String),
}

/// Handle to the model collaborator, loaded once at startup and shared by all
/// requests. An unavailable model stays unavailable until restart.
#[derive(Clone)]
pub enum ModelHandle {
    Ready(Arc<dyn LanguageModel>),
    Unavailable(String),
}

impl ModelHandle {
    /// Load the GPT-2 model from a directory. Load errors are logged and
    /// turned into an unavailable handle so the server can still report health.
    pub fn load(dir: &Path) -> Self {
        log::info!("loading model from '{}'", dir.display());

        match Gpt2Model::from_dir(dir) {
            Ok(m) => {
                log::info!("model loaded: {}", m.name());
                Self::Ready(Arc::new(m))
            }
            Err(e) => {
                log::error!("error loading model from '{}': {}", dir.display(), e);
                Self::Unavailable(e.to_string())
            }
        }
    }

    pub fn ready(model: Arc<dyn LanguageModel>) -> Self {
        Self::Ready(model)
    }

    pub fn get(&self) -> Option<&Arc<dyn LanguageModel>> {
        match self {
            Self::Ready(m) => Some(m),
            Self::Unavailable(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(m) => write!(f, "Ready({})", m.name()),
            Self::Unavailable(e) => write!(f, "Unavailable({})", e),
        }
    }
}

/// Pick the `k` most probable token ids in descending order. Ties keep the
/// vocabulary order; NaNs sort last.
pub fn top_k(probs: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut idx: Vec<(u32, f32)> = probs
        .iter()
        .enumerate()
        .map(|(i, p)| (i as u32, *p))
        .collect();

    // Stable sort keeps ascending ids among equal probabilities.
    idx.sort_by(|a, b| match (a.1.is_nan(), b.1.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal),
    });
    idx.truncate(k);
    idx
}
