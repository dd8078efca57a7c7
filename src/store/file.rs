//! TOML-backed settings store.
//!
//! One table per section. The clearance cookie is written without its
//! `cf_clearance=` tag and handed back with it, so the file stays readable for
//! operators pasting a raw cookie value.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::{DEFAULT_CLEARANCE_PREFIX, DEFAULT_SECTION, keys};

use super::{ConfigSection, ConfigStore, ConfigStoreError};

/// Settings persisted to a TOML file, read-modify-write under an async lock.
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    default_section: String,
    lock: Mutex<()>,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_section: DEFAULT_SECTION.to_string(),
            lock: Mutex::new(()),
        }
    }

    /// Name of the section seeded when the file does not exist yet.
    pub fn with_default_section(mut self, section: impl Into<String>) -> Self {
        self.default_section = section.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn default_document(&self) -> toml::Table {
        let mut section = toml::Table::new();
        section.insert(keys::PROXY_URL.into(), toml::Value::String(String::new()));
        section.insert(keys::CF_CLEARANCE.into(), toml::Value::String(String::new()));
        section.insert(keys::PROXY_POOL_ENABLED.into(), toml::Value::Boolean(false));
        section.insert(keys::PROXY_POOL_PROTOCOL.into(), toml::Value::String("all".into()));
        section.insert(keys::PROXY_POOL_COUNT.into(), toml::Value::Integer(5));
        section.insert(keys::PROXY_POOL_AUTO_VALIDATE.into(), toml::Value::Boolean(true));

        let mut document = toml::Table::new();
        document.insert(self.default_section.clone(), toml::Value::Table(section));
        document
    }

    async fn read_document(&self) -> Result<toml::Table, ConfigStoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents
                .parse::<toml::Table>()
                .map_err(|err| ConfigStoreError::Parse {
                    path: self.path.clone(),
                    message: err.to_string(),
                }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let document = self.default_document();
                self.write_document(&document).await?;
                log::info!("[store] created settings file {}", self.path.display());
                Ok(document)
            }
            Err(source) => Err(ConfigStoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    async fn write_document(&self, document: &toml::Table) -> Result<(), ConfigStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(source))?;
        }

        let contents =
            toml::to_string(document).map_err(|err| ConfigStoreError::Encode(err.to_string()))?;
        let staging = self.path.with_extension("toml.tmp");
        tokio::fs::write(&staging, contents)
            .await
            .map_err(|source| self.io_error(source))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: io::Error) -> ConfigStoreError {
        ConfigStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self, section: &str) -> Result<ConfigSection, ConfigStoreError> {
        let _guard = self.lock.lock().await;
        let document = self.read_document().await?;

        let table = match document.get(section) {
            Some(toml::Value::Table(table)) => table,
            Some(_) => return Err(ConfigStoreError::InvalidSection(section.to_string())),
            None => return Ok(ConfigSection::new()),
        };

        let mut loaded = ConfigSection::new();
        for (key, value) in table {
            let value = serde_json::to_value(value)
                .map_err(|err| ConfigStoreError::Encode(err.to_string()))?;
            loaded.insert(key.clone(), value);
        }

        if let Some(Value::String(raw)) = loaded.get_mut(keys::CF_CLEARANCE)
            && !raw.is_empty()
            && !raw.starts_with(DEFAULT_CLEARANCE_PREFIX)
        {
            *raw = format!("{DEFAULT_CLEARANCE_PREFIX}{raw}");
        }

        Ok(loaded)
    }

    async fn save(&self, section: &str, partial: ConfigSection) -> Result<(), ConfigStoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;

        let entry = document
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        let toml::Value::Table(table) = entry else {
            return Err(ConfigStoreError::InvalidSection(section.to_string()));
        };

        for (key, value) in partial {
            let value = match value {
                Value::Null => Value::String(String::new()),
                Value::String(raw) if key == keys::CF_CLEARANCE => Value::String(
                    raw.strip_prefix(DEFAULT_CLEARANCE_PREFIX)
                        .map(str::to_string)
                        .unwrap_or(raw),
                ),
                other => other,
            };
            let value = toml::Value::try_from(value)
                .map_err(|err| ConfigStoreError::Encode(err.to_string()))?;
            table.insert(key, value);
        }

        self.write_document(&document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{get_bool, get_i64, get_str, partial};
    use serde_json::json;

    #[tokio::test]
    async fn creates_default_document_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path().join("data").join("setting.toml"));

        let section = store.load(DEFAULT_SECTION).await.unwrap();

        assert!(store.path().exists());
        assert_eq!(get_str(&section, keys::PROXY_POOL_PROTOCOL), Some("all"));
        assert_eq!(get_i64(&section, keys::PROXY_POOL_COUNT), Some(5));
        assert_eq!(get_bool(&section, keys::PROXY_POOL_AUTO_VALIDATE), Some(true));
        assert_eq!(get_str(&section, keys::CF_CLEARANCE), None);
    }

    #[tokio::test]
    async fn clearance_is_stored_raw_and_loaded_prefixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setting.toml");
        let store = FileConfigStore::new(&path);

        store
            .save(
                DEFAULT_SECTION,
                partial([
                    (keys::CF_CLEARANCE, json!("cf_clearance=token-123")),
                    (keys::CF_LAST_METHOD, json!("homepage")),
                ]),
            )
            .await
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("cf_clearance = \"token-123\""));

        let section = store.load(DEFAULT_SECTION).await.unwrap();
        assert_eq!(
            get_str(&section, keys::CF_CLEARANCE),
            Some("cf_clearance=token-123")
        );
        assert_eq!(get_str(&section, keys::CF_LAST_METHOD), Some("homepage"));
        assert_eq!(get_str(&section, keys::PROXY_POOL_PROTOCOL), Some("all"));
    }

    #[tokio::test]
    async fn seeds_the_configured_default_section() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            FileConfigStore::new(dir.path().join("setting.toml")).with_default_section("relay");

        let seeded = store.load("relay").await.unwrap();
        assert_eq!(get_str(&seeded, keys::PROXY_POOL_PROTOCOL), Some("all"));
        assert!(store.load(DEFAULT_SECTION).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_non_table_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setting.toml");
        std::fs::write(&path, "grok = 3\n").unwrap();
        let store = FileConfigStore::new(&path);

        let err = store.load("grok").await.unwrap_err();
        assert!(matches!(err, ConfigStoreError::InvalidSection(_)));
    }
}
