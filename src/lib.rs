pub mod cli;
pub mod db;
pub mod error;
pub mod playback;
pub mod settings;
pub mod stats;
pub mod utils;
pub mod words;

use anyhow::{Context, Result};
use clap::Parser;

pub use error::PlaybackError;

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = cli::Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("vocabloop")
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(cli::execute(cli))
}
