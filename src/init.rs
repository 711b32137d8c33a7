use std::{path::Path, sync::Arc};

use crate::{
    cache::Cache,
    filter::Policy,
    lm::ModelHandle,
    models::{Config, ModelConfig},
    predictor::Predictor,
};

/// Initialize logger.
pub fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .format(|buf, record| {
            use std::io::Write;
            let level = if record.level() != log::Level::Info {
                format!("[{}] ", record.level())
            } else {
                String::new()
            };
            writeln!(
                buf,
                "{} {}:{} {}{}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                level,
                record.args()
            )
        })
        .init();
}

/// Load the language model. A missing or broken model doesn't stop the
/// server; it only makes predictions fail until restart.
pub fn init_model(cfg: &ModelConfig) -> ModelHandle {
    if cfg.dir.is_empty() {
        log::error!("no model directory configured ([model] dir)");
        return ModelHandle::Unavailable("model directory not configured".to_string());
    }

    ModelHandle::load(Path::new(&cfg.dir))
}

/// Initialize the word filter policy from the [filter] section.
pub fn init_policy(config: &Config) -> Policy {
    let policy = match &config.filter {
        Some(f) => Policy::from_config(f),
        None => Policy::default(),
    };

    log::info!(
        "word filter: {} allow-listed words, letter ratio {}, gibberish ratio {}",
        policy.allow_list_len(),
        policy.letter_ratio,
        policy.gibberish_ratio
    );

    policy
}

/// Initialize the predictor with the model handle and filter policy.
pub fn init_predictor(config: &Config, model: ModelHandle) -> Predictor {
    Predictor::new(
        model,
        init_policy(config),
        config.model.max_candidates,
        config.model.top_k,
    )
}

/// Initialize the prediction cache if it's enabled.
pub fn init_cache(config: &Config) -> Option<Arc<Cache>> {
    let cfg = config.cache.as_ref().filter(|c| c.enabled)?;

    match Cache::new(cfg) {
        Ok(c) => {
            log::info!(
                "prediction cache enabled (ttl {}, {} MB)",
                cfg.ttl,
                cfg.max_memory_mb
            );
            Some(Arc::new(c))
        }
        Err(e) => {
            log::error!("error initializing cache, running without it: {}", e);
            None
        }
    }
}
