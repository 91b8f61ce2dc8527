//! Schema and table exposure rules: valid-schema list plus per-schema allow/deny table lists.
//! Loaded from a JSON file, a `.properties` file, or the environment.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const VALID_SCHEMA_KEY: &str = "valid.schema.list";
const ALLOWED_PREFIX: &str = "allowed.tables.";
const EXCLUDE_PREFIX: &str = "exclude.tables.";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Schemas the API may touch. Empty means none.
    #[serde(default)]
    pub valid_schemas: Vec<String>,
    /// Schema -> only these tables are exposed. Takes precedence over `excluded_tables`.
    #[serde(default)]
    pub allowed_tables: HashMap<String, Vec<String>>,
    /// Schema -> these tables are hidden.
    #[serde(default)]
    pub excluded_tables: HashMap<String, Vec<String>>,
}

/// Split a comma separated list: trimmed, empties dropped, first occurrence kept.
pub fn split_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|o| o == item) {
            out.push(item.to_string());
        }
    }
    out
}

impl AccessConfig {
    /// Parse Java-style properties text (`key=value`, `#`/`!` comments).
    pub fn from_properties(text: &str) -> Self {
        let pairs = text.lines().filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                return None;
            }
            let (k, v) = line.split_once('=').or_else(|| line.split_once(':'))?;
            Some((k.trim().to_string(), v.trim().to_string()))
        });
        Self::from_pairs(pairs)
    }

    /// Read `VALID_SCHEMA_LIST`, `ALLOWED_TABLES_<SCHEMA>` and `EXCLUDE_TABLES_<SCHEMA>`.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let pairs = vars.into_iter().filter_map(|(k, v)| {
            if k == "VALID_SCHEMA_LIST" {
                Some((VALID_SCHEMA_KEY.to_string(), v))
            } else if let Some(schema) = k.strip_prefix("ALLOWED_TABLES_") {
                Some((format!("{}{}", ALLOWED_PREFIX, schema.to_lowercase()), v))
            } else {
                k.strip_prefix("EXCLUDE_TABLES_")
                    .map(|schema| (format!("{}{}", EXCLUDE_PREFIX, schema.to_lowercase()), v))
            }
        });
        Self::from_pairs(pairs)
    }

    fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = AccessConfig::default();
        for (key, value) in pairs {
            if key == VALID_SCHEMA_KEY {
                config.valid_schemas = split_list(&value);
            } else if let Some(schema) = key.strip_prefix(ALLOWED_PREFIX) {
                config.allowed_tables.insert(schema.to_string(), split_list(&value));
            } else if let Some(schema) = key.strip_prefix(EXCLUDE_PREFIX) {
                config.excluded_tables.insert(schema.to_string(), split_list(&value));
            }
        }
        config
    }

    /// Load from file; `.json` is parsed with serde, anything else as properties.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let mut config = if is_json {
            serde_json::from_str::<AccessConfig>(&text).map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            Self::from_properties(&text)
        };
        config.valid_schemas = split_list(&config.valid_schemas.join(","));
        Ok(config)
    }

    pub fn is_valid_schema(&self, schema: &str) -> bool {
        !schema.trim().is_empty() && self.valid_schemas.iter().any(|s| s == schema)
    }

    /// Apply the allow-list (if non-empty) or else the deny-list for `schema`.
    pub fn filter_tables(&self, schema: &str, tables: Vec<String>) -> Vec<String> {
        if let Some(allowed) = self.allowed_tables.get(schema).filter(|l| !l.is_empty()) {
            return tables.into_iter().filter(|t| allowed.contains(t)).collect();
        }
        if let Some(excluded) = self.excluded_tables.get(schema).filter(|l| !l.is_empty()) {
            return tables.into_iter().filter(|t| !excluded.contains(t)).collect();
        }
        tables
    }
}
