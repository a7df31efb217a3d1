//! Resource loading utilities
//!
//! Schema resources live on the local filesystem under a configured root;
//! the path of each resource is derived from its [`SchemaKey`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::EngineConfig;
use crate::detection::SchemaKey;
use crate::error::{Error, Result};
use crate::limits::Limits;

/// Resource loader for schemas and documents
#[derive(Debug, Clone)]
pub struct Loader {
    /// Root of the schema resources
    schema_dir: PathBuf,
    /// Resource limits
    limits: Limits,
}

impl Loader {
    /// Create a loader rooted at `schema_dir` with default limits
    pub fn new(schema_dir: impl AsRef<Path>) -> Self {
        Self {
            schema_dir: schema_dir.as_ref().to_path_buf(),
            limits: Limits::default(),
        }
    }

    /// Create a loader from the engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.schema_dir).with_limits(config.limits.clone())
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Root of the schema resources
    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    /// Path at which the resource for `key` is expected
    pub fn schema_path(&self, key: &SchemaKey) -> PathBuf {
        key.resource_path(&self.schema_dir)
    }

    /// Load the schema resource for `key` as a string
    pub fn load_schema(&self, key: &SchemaKey) -> Result<String> {
        let path = self.schema_path(key);
        debug!(path = %path.display(), "loading schema resource");

        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::SchemaNotFound {
                key: key.clone(),
                path: path.display().to_string(),
            },
            _ => Error::Resource(format!("Failed to read file '{}': {}", path.display(), e)),
        })?;

        self.limits.check_xml_size(content.len())?;
        Ok(content)
    }

    /// Load a document file as bytes
    pub fn load_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        let content = fs::read(path).map_err(|e| {
            Error::Resource(format!("Failed to read file '{}': {}", path.display(), e))
        })?;

        self.limits.check_xml_size(content.len())?;
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_load_schema_from_directory() {
        let dir = tempdir().unwrap();
        let key = SchemaKey::new("pacs.002", "1.14");
        let family_dir = dir.path().join("pacs002");
        fs::create_dir_all(&family_dir).unwrap();
        fs::write(family_dir.join("pacs.002.spi.1.14.xsd"), "<xs:schema/>").unwrap();

        let loader = Loader::new(dir.path());
        assert_eq!(loader.load_schema(&key).unwrap(), "<xs:schema/>");
    }

    #[test]
    fn test_missing_schema() {
        let dir = tempdir().unwrap();
        let loader = Loader::new(dir.path());
        let result = loader.load_schema(&SchemaKey::new("pacs.008", "0.1"));

        match result {
            Err(Error::SchemaNotFound { key, path }) => {
                assert_eq!(key.version, "0.1");
                assert!(path.ends_with("pacs008/pacs.008.spi.0.1.xsd"));
            }
            other => panic!("expected SchemaNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_size_limit() {
        let mut file = NamedTempFile::new().unwrap();
        let large_content = "x".repeat(2 * 1024 * 1024);
        write!(file, "{}", large_content).unwrap();

        let loader = Loader::new(".").with_limits(Limits::strict());
        assert!(matches!(
            loader.load_bytes(file.path()),
            Err(Error::LimitExceeded(_))
        ));
    }
}
