//! Persisted key-value properties for sample runs
//!
//! A sample stores its account key and deployed contract addresses so a second
//! run can reuse them instead of redeploying.

use crate::error::{TrackerError, TrackerResult};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Simple persisted string map
pub trait PropertyStore {
    fn exists(&self) -> bool;

    fn load(&self) -> TrackerResult<BTreeMap<String, String>>;

    fn store(&self, properties: &BTreeMap<String, String>) -> TrackerResult<()>;

    fn delete(&self) -> TrackerResult<()>;
}

/// Properties kept in `<dir>/<name>.toml`
pub struct PropertiesFile {
    path: PathBuf,
}

impl PropertiesFile {
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.toml", name)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetch a required key from a loaded map
    pub fn require<'a>(&self, properties: &'a BTreeMap<String, String>, key: &str) -> TrackerResult<&'a str> {
        properties
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| TrackerError::PropertyMissing {
                key: key.to_string(),
                file: self.path.display().to_string(),
            })
    }
}

impl PropertyStore for PropertiesFile {
    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn load(&self) -> TrackerResult<BTreeMap<String, String>> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            TrackerError::Properties(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        let properties = toml::from_str(&content).map_err(|e| {
            TrackerError::Properties(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;
        debug!("Loaded properties from {}", self.path.display());
        Ok(properties)
    }

    fn store(&self, properties: &BTreeMap<String, String>) -> TrackerResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TrackerError::Properties(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let body = toml::to_string(properties)
            .map_err(|e| TrackerError::Properties(format!("Failed to encode properties: {}", e)))?;
        let content = format!("# Written {}\n{}", chrono::Utc::now().to_rfc3339(), body);
        fs::write(&self.path, content).map_err(|e| {
            TrackerError::Properties(format!("Failed to write {}: {}", self.path.display(), e))
        })?;
        info!("Stored properties in {}", self.path.display());
        Ok(())
    }

    fn delete(&self) -> TrackerResult<()> {
        if !self.exists() {
            return Ok(());
        }
        fs::remove_file(&self.path).map_err(|e| {
            TrackerError::Properties(format!("Failed to delete {}: {}", self.path.display(), e))
        })
    }
}
