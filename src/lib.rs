//! Next-word suggestions for Vietnamese text input: a lexical word filter
//! around a GPT-2 language model, served over HTTP.

pub mod cache;
pub mod config;
pub mod filter;
pub mod handlers;
pub mod http;
pub mod init;
pub mod lm;
pub mod models;
pub mod predictor;
