use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vnpredict")]
#[command(about = "vnpredict - Next-word suggestions for Vietnamese text input.")]
#[command(version = env!("VERSION"))]
pub struct Cli {
    /// Path to one or more config files (merged in order).
    #[arg(long, default_value = "config.toml", action = clap::ArgAction::Append)]
    pub config: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a sample config file.
    NewConfig {
        /// Output path for config file.
        #[arg(short, long, default_value = "config.toml")]
        path: PathBuf,
    },

    /// Predict the next words for a piece of text and print them as JSON.
    Predict {
        /// Text typed so far.
        #[arg(long)]
        text: String,
    },

    /// Show how the word filter judges each word and the text as a whole.
    /// Doesn't need the model.
    Check {
        /// Words to check.
        #[arg(required = true)]
        words: Vec<String>,
    },
}
