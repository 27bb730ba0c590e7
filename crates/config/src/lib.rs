//! Configuration loading, validation, and env substitution.
//!
//! Config files: `sapfire.toml`, `sapfire.yaml`, or `sapfire.json`
//! Searched in `./` then `~/.config/sapfire/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod document;
pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    document::ConfigDocument,
    loader::{
        ConfigFormat, config_dir, data_dir, discover_and_load, find_or_default_config_path,
        load_config, save_config_to,
    },
    schema::{
        ChatConfig, GeminiConfig, Language, SapfireConfig, SettingsConfig, Theme, UserProfile,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
