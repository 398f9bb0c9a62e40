//! Configuration loading, environment overrides, and validation.
//!
//! Config files: `lexlinker.toml`, `lexlinker.yaml`, or `lexlinker.json`
//! Searched in `./` then `~/.config/lexlinker/`.
//!
//! Environment variables (`HISTORY_LIMIT`, `OPENAI_API_KEY`, ...) override
//! file values.

pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, apply_env_overrides_with, config_dir, data_dir, discover_and_load,
        find_config_file, load_config, load_with_env,
    },
    schema::{
        ClassifierKind, GuardrailsConfig, HistoryConfig, LexlinkerConfig, OutboundConfig,
        ProviderConfig, RetryConfig, RoutingConfig, ServerConfig, TwilioConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_config, validate_str},
};
