//! Engine configuration
//!
//! The schema directory and the document limits are the only tunables.
//! Environment overrides go through [`EnvProvider`] so tests never touch the
//! process environment.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::limits::Limits;

/// Environment variable naming the schema directory
pub const SCHEMA_DIR_VAR: &str = "SPI_SCHEMA_DIR";

/// Environment variable overriding the maximum document size in bytes
pub const MAX_XML_SIZE_VAR: &str = "SPI_MAX_XML_SIZE";

/// Environment variable overriding the maximum element depth
pub const MAX_XML_DEPTH_VAR: &str = "SPI_MAX_XML_DEPTH";

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    /// Look up a variable
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Directory holding the schemas shipped with the crate
pub fn bundled_schema_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/schemas"))
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Root directory of the schema resources
    pub schema_dir: PathBuf,
    /// Document limits applied when parsing
    pub limits: Limits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_dir: bundled_schema_dir(),
            limits: Limits::default(),
        }
    }
}

impl EngineConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with overrides from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(&SystemEnvProvider)
    }

    /// Configuration with overrides from a custom environment provider
    pub fn from_env_with(env: &impl EnvProvider) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = env.get(SCHEMA_DIR_VAR) {
            if dir.trim().is_empty() {
                return Err(Error::Config(format!("{} is empty", SCHEMA_DIR_VAR)));
            }
            config.schema_dir = PathBuf::from(dir);
        }

        if let Some(size) = env.get(MAX_XML_SIZE_VAR) {
            config.limits.max_xml_size = size.trim().parse().map_err(|_| {
                Error::Config(format!("Invalid {} value: {}", MAX_XML_SIZE_VAR, size))
            })?;
        }

        if let Some(depth) = env.get(MAX_XML_DEPTH_VAR) {
            config.limits.max_xml_depth = depth.trim().parse().map_err(|_| {
                Error::Config(format!("Invalid {} value: {}", MAX_XML_DEPTH_VAR, depth))
            })?;
        }

        Ok(config)
    }

    /// Use another schema directory
    pub fn with_schema_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.schema_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Use other limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockEnvProvider {
        vars: HashMap<String, String>,
    }

    impl MockEnvProvider {
        fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
            self.vars.insert(key.into(), value.into());
        }
    }

    impl EnvProvider for MockEnvProvider {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    #[test]
    fn test_default_points_at_bundled_schemas() {
        let config = EngineConfig::default();
        assert!(config.schema_dir.ends_with("schemas"));
        assert_eq!(config.limits, Limits::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut env = MockEnvProvider::default();
        env.set(SCHEMA_DIR_VAR, "/opt/spi/xsd");
        env.set(MAX_XML_SIZE_VAR, "2048");
        env.set(MAX_XML_DEPTH_VAR, "32");

        let config = EngineConfig::from_env_with(&env).unwrap();
        assert_eq!(config.schema_dir, PathBuf::from("/opt/spi/xsd"));
        assert_eq!(config.limits.max_xml_size, 2048);
        assert_eq!(config.limits.max_xml_depth, 32);
    }

    #[test]
    fn test_invalid_env_values() {
        let mut env = MockEnvProvider::default();
        env.set(MAX_XML_DEPTH_VAR, "deep");
        assert!(matches!(
            EngineConfig::from_env_with(&env),
            Err(Error::Config(_))
        ));

        let mut env = MockEnvProvider::default();
        env.set(SCHEMA_DIR_VAR, "  ");
        assert!(EngineConfig::from_env_with(&env).is_err());
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::new()
            .with_schema_dir("/tmp/xsd")
            .with_limits(Limits::strict());
        assert_eq!(config.schema_dir, PathBuf::from("/tmp/xsd"));
        assert_eq!(config.limits, Limits::strict());
    }
}
