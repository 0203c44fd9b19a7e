//! # Upload Configuration Validator
//!
//! Loads the upload configuration the same way the library does (defaults, an
//! optional file, `BGUPLOAD_*` overrides), validates it and prints the
//! effective values as JSON.
//!
//! ```bash
//! config-validator                      # defaults + environment
//! config-validator config/upload.toml   # with a config file
//! ```

use anyhow::{Context, Result};
use background_upload::config::UploadConfig;
use background_upload::session::{BgUpload, HightroUpload, SessionNamespace, ShadowUpload};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

fn main() {
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .try_init();

    match run() {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {e:#}");
            process::exit(1);
        }
    }
}

fn run() -> Result<()> {
    let path = std::env::args().nth(1).map(PathBuf::from);
    if let Some(path) = &path {
        println!("Config file: {}", path.display());
    }

    let config = UploadConfig::load(path.as_deref()).context("loading upload configuration")?;

    println!("Session identifiers:");
    for namespace in [BgUpload::NAME, ShadowUpload::NAME, HightroUpload::NAME] {
        println!("  {namespace}: {}", config.session_identifier(namespace));
    }
    match config.event_store_path() {
        Some(store) => println!("Event store: {}", store.display()),
        None => println!("Event store: in memory"),
    }
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("serializing configuration")?
    );
    Ok(())
}
