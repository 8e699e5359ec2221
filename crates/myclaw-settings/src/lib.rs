//! # myclaw-settings
//!
//! Configuration loading for the myclaw agent. Merge order is
//! env > `<home>/config.json` > compiled defaults, with empty strings
//! treated as unset throughout.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::SettingsError;
pub use loader::{default_home_dir, load, load_from_path};
pub use types::{ChecksConfig, Config, ProviderKind, ReviewConfig, RuntimeOptions};
