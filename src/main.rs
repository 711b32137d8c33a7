mod cli;

use std::sync::Arc;

use clap::Parser;

use cli::Commands;
use vnpredict::{
    config,
    filter::GateDecision,
    handlers::{Consts, Ctx},
    http, init,
    models::{Config, PredictResp},
    predictor::Prediction,
};

// musl's default malloc is very slow.
#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const DEFAULT_ADDRESS: &str = "0.0.0.0:5000";

#[tokio::main]
async fn main() {
    init::init_logger();

    let cli = cli::Cli::parse();

    // Handle CLI flags.
    if let Some(cmd) = cli.command {
        match cmd {
            // Generate a new config file.
            Commands::NewConfig { path } => {
                match config::generate_sample(&path) {
                    Ok(_) => {
                        log::info!("config file generated: {}", path.display());
                    }
                    Err(e) => {
                        log::error!("error generating config: {}", e);
                        std::process::exit(1);
                    }
                }
                return;
            }

            // Print the filter's verdict on each word. Runs without a config.
            Commands::Check { words } => {
                let config = config::load_all(&cli.config).unwrap_or_else(|e| {
                    log::warn!("{}; using the default filter policy", e);
                    Config::default()
                });
                let policy = init::init_policy(&config);

                for w in &words {
                    let v = policy.classify(w);
                    let mark = if v.is_valid() { "valid" } else { "invalid" };
                    println!("{}\t{}\t{}", w, mark, v);
                }

                match policy.gate(&words.join(" ")) {
                    GateDecision::Proceed => println!("gate: proceed"),
                    GateDecision::Reject(r) => println!("gate: {}", r),
                }
                return;
            }

            // One-shot prediction.
            Commands::Predict { text } => {
                let config = load_config(&cli.config);
                let model = init::init_model(&config.model);
                let predictor = init::init_predictor(&config, model);

                let out = match predictor.predict(&text) {
                    Ok(Prediction::Candidates(c)) => PredictResp::ok(c),
                    Ok(Prediction::Gated(r)) => PredictResp::message(r.message()),
                    Err(e) => {
                        log::error!("error predicting: {}", e);
                        std::process::exit(1);
                    }
                };

                match serde_json::to_string_pretty(&out) {
                    Ok(s) => println!("{}", s),
                    Err(e) => {
                        log::error!("error encoding predictions: {}", e);
                        std::process::exit(1);
                    }
                }
                return;
            }
        }
    }

    // Load config.
    let config = load_config(&cli.config);

    // Load the model. Failures are reported by /health and /predict.
    let model = init::init_model(&config.model);
    let predictor = Arc::new(init::init_predictor(&config, model));
    let cache = init::init_cache(&config);

    // Setup the global app context used in HTTP handlers.
    let ctx = Arc::new(Ctx {
        predictor,
        cache,

        // Global constants.
        consts: Consts {
            cors_origins: config.app.cors_origins,
        },
        version: env!("VERSION").to_string(),
    });

    // Start the HTTP server.
    let routes = http::init_handlers(ctx);
    let addr = if config.app.address.is_empty() {
        DEFAULT_ADDRESS.to_string()
    } else {
        config.app.address
    };

    log::info!("starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            log::error!("error listening on {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, routes).await {
        log::error!("server error: {}", e);
        std::process::exit(1);
    }
}

/// Load the config files and exit with an error message if they can't be read.
fn load_config(paths: &[std::path::PathBuf]) -> Config {
    config::load_all(paths).unwrap_or_else(|e| {
        log::error!("error loading config: {}", e);
        std::process::exit(1);
    })
}
