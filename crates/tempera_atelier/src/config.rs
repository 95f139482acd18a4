//! Engine configuration.
//!
//! Reads `tempera.config.json` from a project directory. Every field is
//! optional; a missing or unreadable file yields the defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tempera_carton::CompactString;
use tempera_relief::{ParserOptions, WhitespaceStrategy};

use crate::error::{Error, Result};

/// File name looked up by [`load_config`].
pub const CONFIG_FILE: &str = "tempera.config.json";

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// JSON Schema reference (for editor autocompletion).
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Prefix of marker attributes (`*if`).
    pub marker_prefix: char,

    /// Prefix of the property shorthand (`.value`).
    pub property_prefix: char,

    /// Prefix marking a path as local-scoped (`@item`).
    pub local_sentinel: char,

    /// Interpolation delimiters.
    pub delimiters: (String, String),

    /// Whitespace handling in text nodes.
    pub whitespace: WhitespaceStrategy,

    /// Keep markup comments in rendered output.
    pub comments: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema: None,
            marker_prefix: '*',
            property_prefix: '.',
            local_sentinel: '@',
            delimiters: ("{{".to_string(), "}}".to_string()),
            whitespace: WhitespaceStrategy::Condense,
            comments: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(source: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(source).map_err(|err| Error::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, prefix) in [
            ("markerPrefix", self.marker_prefix),
            ("propertyPrefix", self.property_prefix),
        ] {
            if !prefix.is_ascii_punctuation() {
                return Err(Error::Config(format!(
                    "{name} must be an ASCII punctuation character, got {prefix:?}"
                )));
            }
        }
        if self.marker_prefix == self.property_prefix {
            return Err(Error::Config(
                "markerPrefix and propertyPrefix must differ".to_string(),
            ));
        }
        if self.local_sentinel.is_alphanumeric() || self.local_sentinel == '_' {
            return Err(Error::Config(format!(
                "localSentinel cannot start an identifier, got {:?}",
                self.local_sentinel
            )));
        }
        if self.delimiters.0.is_empty() || self.delimiters.1.is_empty() {
            return Err(Error::Config("delimiters cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Options handed to the markup parser.
    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            marker_prefix: self.marker_prefix as u8,
            property_prefix: self.property_prefix as u8,
            delimiters: (
                CompactString::from(self.delimiters.0.as_str()),
                CompactString::from(self.delimiters.1.as_str()),
            ),
            whitespace: self.whitespace,
            comments: self.comments,
            ..ParserOptions::default()
        }
    }
}

/// Load `tempera.config.json` from the given directory (or CWD if None).
pub fn load_config(dir: Option<&Path>) -> EngineConfig {
    let base = dir
        .map(|d| d.to_path_buf())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    let config_path = base.join(CONFIG_FILE);

    if !config_path.exists() {
        return EngineConfig::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match EngineConfig::from_json(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", config_path.display(), e);
                EngineConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", config_path.display(), e);
            EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        let options = config.parser_options();
        assert_eq!(options.marker_prefix, b'*');
        assert_eq!(options.delimiters.0, "{{");
    }

    #[test]
    fn test_partial_override() {
        let config =
            EngineConfig::from_json(r#"{ "markerPrefix": ":", "whitespace": "preserve" }"#)
                .unwrap();
        assert_eq!(config.marker_prefix, ':');
        assert_eq!(config.local_sentinel, '@');
        assert_eq!(config.whitespace, WhitespaceStrategy::Preserve);
    }

    #[test]
    fn test_invalid() {
        let err = EngineConfig::from_json(r#"{ "markerPrefix": "x" }"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        let err = EngineConfig::from_json(r#"{ "propertyPrefix": "*" }"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        let err = EngineConfig::from_json("{ nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config(Some(dir.path())), EngineConfig::default());

        std::fs::write(dir.path().join(CONFIG_FILE), r#"{ "localSentinel": "$" }"#).unwrap();
        assert_eq!(load_config(Some(dir.path())).local_sentinel, '$');

        std::fs::write(dir.path().join(CONFIG_FILE), "not json").unwrap();
        assert_eq!(load_config(Some(dir.path())), EngineConfig::default());
    }
}
