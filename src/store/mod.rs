//! Persisted settings collaborators.
//!
//! The core only ever loads a whole named section and merges partial updates
//! back into it. Two backends ship with the crate: [`MemoryConfigStore`] for
//! embedding and tests, and [`FileConfigStore`] backed by a TOML document.

mod file;

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

pub use file::FileConfigStore;

/// Key/value content of one settings section.
pub type ConfigSection = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("settings io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("failed to encode settings: {0}")]
    Encode(String),
    #[error("settings section '{0}' is not a table")]
    InvalidSection(String),
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

/// Contract of the durable settings backend.
///
/// `save` merges the given keys into the section and leaves every other key
/// untouched. Both calls are treated as atomic by the callers.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self, section: &str) -> Result<ConfigSection, ConfigStoreError>;

    async fn save(&self, section: &str, partial: ConfigSection) -> Result<(), ConfigStoreError>;
}

/// Builds a partial update from `(key, value)` pairs.
pub fn partial<I, K>(entries: I) -> ConfigSection
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    entries
        .into_iter()
        .map(|(key, value)| (key.into(), value))
        .collect()
}

/// Reads a trimmed, non-empty string value.
pub fn get_str<'a>(section: &'a ConfigSection, key: &str) -> Option<&'a str> {
    section
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn get_bool(section: &ConfigSection, key: &str) -> Option<bool> {
    match section.get(key)? {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn get_i64(section: &ConfigSection, key: &str) -> Option<i64> {
    match section.get(key)? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Settings held in process memory.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    sections: Mutex<HashMap<String, ConfigSection>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a section before the store is shared.
    pub fn with_section(mut self, name: impl Into<String>, section: ConfigSection) -> Self {
        self.sections.get_mut().insert(name.into(), section);
        self
    }

    /// Copy of a section, mostly useful for assertions.
    pub async fn snapshot(&self, section: &str) -> ConfigSection {
        self.sections
            .lock()
            .await
            .get(section)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self, section: &str) -> Result<ConfigSection, ConfigStoreError> {
        Ok(self.snapshot(section).await)
    }

    async fn save(&self, section: &str, partial: ConfigSection) -> Result<(), ConfigStoreError> {
        let mut guard = self.sections.lock().await;
        let target = guard.entry(section.to_string()).or_default();
        for (key, value) in partial {
            target.insert(key, value);
        }
        Ok(())
    }
}
