//! Tool settings merge
//!
//! Four layers, lowest first:
//! 1. Built-in defaults
//! 2. User file (`$XDG_CONFIG_HOME/flowmap/config.toml`)
//! 3. Project file (`./flowmap.toml` or `--config`)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::{LogSettings, RedactionSettings, Settings, ValidatorConfig};
pub use effective::{
    toml_to_json, user_config_path, ConfigError, ConfigOrigin, ConfigSource, EffectiveSettings,
    PROJECT_FILE, SCHEMA_ID,
};
pub use merge::{deep_merge, merge_layers, record_origins};
