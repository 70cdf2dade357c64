//! Configuration module for favsync
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use favsync::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Stopping after {} duplicates", config.sync.max_dup_count);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DatabaseConfig, FilesConfig, FurAffinityConfig, HttpConfig, InkbunnyConfig,
    RetrySettings, SyncConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
