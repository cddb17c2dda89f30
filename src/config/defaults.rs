//! Built-in settings (layer 1) and the typed settings shape.

use flowmap_conf::{AppOrder, RedactionPolicy, DEFAULT_MARKERS, REDACTED};
use flowmap_model::{FindingCode, GENERATOR};
use serde::{Deserialize, Serialize};

use crate::logging::{LogFormat, LogLevel};
use crate::resolver::ResolverSettings;
use crate::validator::{ValidatorSettings, BUILTIN_INDEXES};

use super::effective::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionSettings {
    /// Case-insensitive substrings of sensitive attribute names.
    pub markers: Vec<String>,
    pub placeholder: String,
}

impl Default for RedactionSettings {
    fn default() -> Self {
        Self {
            markers: DEFAULT_MARKERS.iter().map(|s| s.to_string()).collect(),
            placeholder: REDACTED.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub builtin_indexes: Vec<String>,
    /// Rule codes such as `DROP_PATH`.
    pub disabled_rules: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            builtin_indexes: BUILTIN_INDEXES.iter().map(|s| s.to_string()).collect(),
            disabled_rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Level used when no environment filter is set.
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Human,
        }
    }
}

/// Tool settings after all layers are merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub generator: String,
    pub default_index: String,
    pub app_order: AppOrder,
    pub redaction: RedactionSettings,
    pub validator: ValidatorConfig,
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            generator: GENERATOR.to_string(),
            default_index: "main".to_string(),
            app_order: AppOrder::default(),
            redaction: RedactionSettings::default(),
            validator: ValidatorConfig::default(),
            log: LogSettings::default(),
        }
    }
}

impl Settings {
    /// JSON value for merging.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn redaction_policy(&self) -> RedactionPolicy {
        RedactionPolicy::new(&self.redaction.markers, self.redaction.placeholder.clone())
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            generator: self.generator.clone(),
            default_index: self.default_index.clone(),
        }
    }

    pub fn validator_settings(&self) -> Result<ValidatorSettings, ConfigError> {
        let disabled_rules = self
            .validator
            .disabled_rules
            .iter()
            .map(|code| code.parse::<FindingCode>().map_err(ConfigError::ValidationError))
            .collect::<Result<_, _>>()?;
        Ok(ValidatorSettings {
            builtin_indexes: self.validator.builtin_indexes.iter().cloned().collect(),
            disabled_rules,
        })
    }
}
