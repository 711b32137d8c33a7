use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};
use foyer::{Cache as FoyerCache, CacheBuilder};
use serde::Deserialize;
use thiserror::Error;

use crate::filter::Candidate;

/// Size of TTL prefix (u64 timestamp).
const TTL_PREFIX_SIZE: usize = 8;

/// Cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,

    /// TTL duration string (e.g., "1h", "30m", "1d").
    #[serde(default = "default_cache_ttl")]
    pub ttl: String,

    /// Maximum memory in MB.
    #[serde(default = "default_cache_memory")]
    pub max_memory_mb: u64,
}

fn default_cache_ttl() -> String {
    "1h".to_string()
}

fn default_cache_memory() -> u64 {
    32
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: default_cache_ttl(),
            max_memory_mb: default_cache_memory(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid TTL format: {0}")]
    InvalidTtl(String),
}

/// In-memory cache of prediction lists with TTL support.
pub struct Cache {
    backend: FoyerCache<String, Bytes>,
    ttl: Duration,
}

impl Cache {
    /// Create a new cache instance.
    pub fn new(cfg: &CacheConfig) -> Result<Self, CacheError> {
        let ttl = parse_duration(&cfg.ttl)?;
        let memory_bytes = (cfg.max_memory_mb * 1024 * 1024) as usize;

        let backend = CacheBuilder::new(memory_bytes)
            .with_weighter(|key: &String, value: &Bytes| key.len() + value.len())
            .build();

        Ok(Self { backend, ttl })
    }

    /// Get the cached predictions for a text. None if not found or expired.
    pub fn get(&self, text: &str) -> Option<Vec<Candidate>> {
        let raw = self.backend.get(&make_key(text)).map(|e| e.value().clone())?;

        // Need at least TTL prefix.
        if raw.len() < TTL_PREFIX_SIZE {
            return None;
        }

        // Read TTL from first 8 bytes.
        let created_at = u64::from_le_bytes(raw[..TTL_PREFIX_SIZE].try_into().ok()?);
        if now().saturating_sub(created_at) > self.ttl.as_secs() {
            return None;
        }

        match serde_json::from_slice(&raw[TTL_PREFIX_SIZE..]) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("cache get: error decoding entry: {}", e);
                None
            }
        }
    }

    /// Store predictions for a text with current timestamp prefix.
    pub fn put(&self, text: &str, predictions: &[Candidate]) {
        let body = match serde_json::to_vec(predictions) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("cache put: error encoding entry: {}", e);
                return;
            }
        };

        // Prepend TTL timestamp (first 8 bytes).
        let mut buf = BytesMut::with_capacity(TTL_PREFIX_SIZE + body.len());
        buf.put_u64_le(now());
        buf.extend_from_slice(&body);

        self.backend.insert(make_key(text), buf.freeze());
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Cache key for a prediction input. Surrounding whitespace doesn't change
/// the prediction, so it doesn't change the key either.
pub fn make_key(text: &str) -> String {
    let digest = md5::compute(text.trim().as_bytes());
    format!("p:{:x}", digest)
}

/// Parse a duration string like "72h", "30m", "1d" into Duration.
fn parse_duration(s: &str) -> Result<Duration, CacheError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(CacheError::InvalidTtl("empty duration".to_string()));
    }

    let unit = s.chars().last().unwrap_or_default();
    let num: u64 = s[..s.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| CacheError::InvalidTtl(s.to_string()))?;

    let mul: u64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        _ => return Err(CacheError::InvalidTtl(s.to_string())),
    };

    num.checked_mul(mul)
        .map(Duration::from_secs)
        .ok_or_else(|| CacheError::InvalidTtl(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(w: &str, p: f64) -> Candidate {
        Candidate {
            word: w.to_string(),
            probability: p,
        }
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration(" 2h ").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("5w").is_err());
        assert!(parse_duration("5ä").is_err());

        // Out of range.
        assert!(parse_duration("18446744073709551615d").is_err());
        assert!(parse_duration(&format!("{}m", u64::MAX / 60 + 1)).is_err());
        assert_eq!(
            parse_duration(&format!("{}s", u64::MAX)).unwrap(),
            Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn keys() {
        assert_eq!(make_key("xin chào"), make_key("  xin chào "));
        assert_ne!(make_key("xin chào"), make_key("xin chao"));
        assert!(make_key("a").starts_with("p:"));
    }

    #[test]
    fn put_get() {
        let cache = Cache::new(&CacheConfig::default()).unwrap();
        assert!(cache.get("xin chào").is_none());

        let preds = vec![cand("bạn", 0.3), cand("em", 0.1)];
        cache.put("xin chào", &preds);
        assert_eq!(cache.get("xin chào"), Some(preds));
        assert!(cache.get("tạm biệt").is_none());
    }

    #[test]
    fn expired() {
        let cfg = CacheConfig {
            ttl: "0s".to_string(),
            ..CacheConfig::default()
        };
        let cache = Cache::new(&cfg).unwrap();

        // Backdate an entry past the TTL.
        let mut buf = BytesMut::new();
        buf.put_u64_le(now() - 5);
        buf.extend_from_slice(b"[]");
        cache.backend.insert(make_key("cũ"), buf.freeze());
        assert!(cache.get("cũ").is_none());
    }

    #[test]
    fn invalid_ttl() {
        let cfg = CacheConfig {
            ttl: "soon".to_string(),
            ..CacheConfig::default()
        };
        assert!(Cache::new(&cfg).is_err());
    }
}
