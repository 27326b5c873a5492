//! Store-config-string parsing (spec.md §6 CLI surface, §6 "Environment":
//! "Path and cache size are passed via the config string").
//!
//! The grammar is a single required `path=<path>` token followed by zero or
//! more `;key=value` pairs, e.g. `path=/var/db/idx;cachesize=16777216`. This
//! is small and fully specified, so it is hand-parsed rather than pulled in
//! through a config-file crate (SPEC_FULL.md §B).

use crate::error::{Result, StorageError};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    path: String,
    extra: FxHashMap<String, String>,
}

impl StoreConfig {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }

    pub fn get_usize(&self, key: &str) -> Result<Option<usize>> {
        match self.extra.get(key) {
            None => Ok(None),
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|_| StorageError::InvalidArgument(format!("{key} is not a number: {v}"))),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.extra.get(key) {
            None => Ok(None),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" => Ok(Some(true)),
                "0" | "false" | "no" => Ok(Some(false)),
                other => Err(StorageError::InvalidArgument(format!(
                    "{key} is not a boolean: {other}"
                ))),
            },
        }
    }

    /// Parses `path=<path>[;key=value...]`.
    pub fn parse(s: &str) -> Result<Self> {
        let mut path = None;
        let mut extra = FxHashMap::default();
        for field in s.split(';') {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            let (key, value) = field.split_once('=').ok_or_else(|| {
                StorageError::InvalidArgument(format!("malformed config field: {field:?}"))
            })?;
            let (key, value) = (key.trim(), value.trim());
            if key == "path" {
                path = Some(value.to_string());
            } else {
                extra.insert(key.to_string(), value.to_string());
            }
        }
        let path = path.ok_or_else(|| {
            StorageError::IncompleteDefinition("config string is missing path=...".into())
        })?;
        Ok(StoreConfig { path, extra })
    }
}
