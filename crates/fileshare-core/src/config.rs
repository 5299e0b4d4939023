use crate::error::{FileShareError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable consulted when no connection string is configured.
pub const CONNECTION_STRING_ENV: &str = "AZURE_STORAGE_CONNECTION_STRING";

/// Top-level configuration stored as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileShareConfig {
    pub share: ShareSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareSettings {
    /// Share name. Lower-cased before use.
    pub name: String,
    /// Which backend serves the share.
    #[serde(default)]
    pub backend: BackendType,
    /// Connection string for the `azure` backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    /// Directory holding the share for the `local` backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    #[default]
    Azure,
    Local,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendType::Azure => write!(f, "azure"),
            BackendType::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = FileShareError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "azure" | "azure-files" => Ok(BackendType::Azure),
            "local" | "fs" => Ok(BackendType::Local),
            _ => Err(FileShareError::InvalidBackendType(s.to_string())),
        }
    }
}

impl ShareSettings {
    /// Connection string from the config, or from `AZURE_STORAGE_CONNECTION_STRING`.
    pub fn resolve_connection_string(&self) -> Result<String> {
        if let Some(cs) = self.connection_string.as_ref().filter(|cs| !cs.is_empty()) {
            return Ok(cs.clone());
        }
        std::env::var(CONNECTION_STRING_ENV).map_err(|_| {
            FileShareError::Config(format!(
                "share '{}': no connection_string configured and {CONNECTION_STRING_ENV} is not set",
                self.name
            ))
        })
    }

    /// Root directory for the local backend.
    pub fn resolve_root(&self) -> Result<PathBuf> {
        self.root
            .as_deref()
            .filter(|r| !r.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                FileShareError::Config(format!(
                    "share '{}': the local backend requires 'root'",
                    self.name
                ))
            })
    }
}

impl FileShareConfig {
    pub fn new(settings: ShareSettings) -> Self {
        Self { share: settings }
    }

    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FileShareError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| FileShareError::TomlDe(e.to_string()))
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| FileShareError::TomlSer(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the config file path: `<base_dir>/fileshare.toml`
    pub fn default_path(base_dir: &Path) -> PathBuf {
        base_dir.join("fileshare.toml")
    }

    /// Resolve the default config directory: `~/.fileshare`
    pub fn default_base_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|h| h.join(".fileshare"))
            .ok_or_else(|| FileShareError::Config("Cannot determine home directory".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn local_settings(root: &Path) -> ShareSettings {
        ShareSettings {
            name: "sharetest".to_string(),
            backend: BackendType::Local,
            connection_string: None,
            root: Some(root.display().to_string()),
        }
    }

    #[test]
    fn roundtrip_config() {
        let tmp = TempDir::new().unwrap();
        let path = FileShareConfig::default_path(tmp.path());
        let config = FileShareConfig::new(local_settings(tmp.path()));
        config.save(&path).unwrap();

        let loaded = FileShareConfig::load(&path).unwrap();
        assert_eq!(loaded.share.name, "sharetest");
        assert_eq!(loaded.share.backend, BackendType::Local);
        assert_eq!(loaded.share.resolve_root().unwrap(), tmp.path());
    }

    #[test]
    fn load_nonexistent_returns_error() {
        let result = FileShareConfig::load(Path::new("/nonexistent/fileshare.toml"));
        assert!(matches!(result, Err(FileShareError::ConfigNotFound(_))));
    }

    #[test]
    fn backend_defaults_to_azure() {
        let config: FileShareConfig = toml::from_str(
            r#"
            [share]
            name = "sharetest"
            connection_string = "AccountName=a;AccountKey=a2V5"
            "#,
        )
        .unwrap();
        assert_eq!(config.share.backend, BackendType::Azure);
        assert_eq!(
            config.share.resolve_connection_string().unwrap(),
            "AccountName=a;AccountKey=a2V5"
        );
    }

    #[test]
    fn local_backend_requires_root() {
        let mut settings = local_settings(Path::new("/tmp"));
        settings.root = None;
        assert!(settings.resolve_root().is_err());
    }

    #[test]
    fn backend_type_parses() {
        assert_eq!("Azure".parse::<BackendType>().unwrap(), BackendType::Azure);
        assert_eq!("local".parse::<BackendType>().unwrap(), BackendType::Local);
        assert!("ftp".parse::<BackendType>().is_err());
    }
}
