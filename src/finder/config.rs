//! Registry configuration.

use std::path::Path;

use serde::Deserialize;

use crate::Result;

/// Tunables of a [`crate::FinderRegistry`], deserialized from TOML or built
/// in code.
///
/// # Examples
///
/// ```rust
/// use sigweave::RegistryConfig;
///
/// let config = RegistryConfig::from_toml_str(
///     r#"
///     platform_prefixes = ["java/", "sun/"]
///     verify_rewrites = false
///     "#,
/// )?;
/// assert!(!config.verify_rewrites);
/// assert!(!config.full_reflection);
/// # Ok::<(), sigweave::Error>(())
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Module-name prefixes the registry never evaluates, typically the
    /// host platform's own namespaces.
    pub platform_prefixes: Vec<String>,
    /// Reparse every rewritten image before handing it to the host,
    /// discarding rewrites that no longer parse.
    pub verify_rewrites: bool,
    /// Force reflective dispatch in every generated accessor, regardless of
    /// target visibility.
    pub full_reflection: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            platform_prefixes: Vec::new(),
            verify_rewrites: true,
            full_reflection: false,
        }
    }
}

impl RegistryConfig {
    /// Deserialize a configuration from TOML text.
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] describing the deserialization
    /// failure.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml_edit::de::from_str(text).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Read and deserialize a configuration file.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] when the file cannot be read and
    /// [`crate::Error::Config`] when it does not deserialize; the config
    /// error names the offending path.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
            .map_err(|e| crate::Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Whether `name` falls under a configured platform prefix.
    #[must_use]
    pub fn is_platform_module(&self, name: &str) -> bool {
        self.platform_prefixes.iter().any(|p| name.starts_with(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RegistryConfig::default();
        assert!(config.platform_prefixes.is_empty());
        assert!(config.verify_rewrites);
        assert!(!config.full_reflection);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = RegistryConfig::from_toml_str("platform_prefixes = [\"java/\"]").unwrap();
        assert!(config.is_platform_module("java/lang/Object"));
        assert!(!config.is_platform_module("game/Window"));
        assert!(config.verify_rewrites);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            RegistryConfig::from_toml_str("verify_rewrites = \"yes\""),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn from_path_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sigweave.toml");
        std::fs::write(&path, "full_reflection = 3").unwrap();
        let err = RegistryConfig::from_path(&path).unwrap_err();
        assert!(err.to_string().contains("sigweave.toml"));
    }
}
