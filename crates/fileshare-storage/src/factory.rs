//! Factory for creating the appropriate ShareProvider based on configuration.

use fileshare_core::config::{BackendType, ShareSettings};

use crate::local::LocalShareProvider;
use crate::provider::ShareProvider;

/// Create a ShareProvider for the backend named in `settings`.
///
/// Supported backends:
/// - `"local"`: a directory tree under `root`
/// - `"azure"`: Azure Files over REST (requires a connection string, compile with the
///   `azure` feature)
pub fn create_share_provider(settings: &ShareSettings) -> anyhow::Result<Box<dyn ShareProvider>> {
    match settings.backend {
        BackendType::Local => {
            let root = settings.resolve_root()?;
            Ok(Box::new(LocalShareProvider::new(&root, &settings.name)?))
        }

        #[cfg(feature = "azure")]
        BackendType::Azure => {
            let connection_string = settings.resolve_connection_string()?;
            let provider =
                crate::azure::AzureShareProvider::new(&connection_string, &settings.name)?;
            Ok(Box::new(provider))
        }

        #[cfg(not(feature = "azure"))]
        BackendType::Azure => {
            anyhow::bail!("azure feature not enabled. Recompile with --features azure")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builds_local_provider() {
        let tmp = TempDir::new().unwrap();
        let settings = ShareSettings {
            name: "ShareTest".to_string(),
            backend: BackendType::Local,
            connection_string: None,
            root: Some(tmp.path().display().to_string()),
        };
        let provider = create_share_provider(&settings).unwrap();
        assert_eq!(provider.share_name(), "sharetest");
    }

    #[test]
    fn local_without_root_fails() {
        let settings = ShareSettings {
            name: "sharetest".to_string(),
            backend: BackendType::Local,
            connection_string: None,
            root: None,
        };
        assert!(create_share_provider(&settings).is_err());
    }

    #[cfg(feature = "azure")]
    #[test]
    fn builds_azure_provider_from_inline_connection_string() {
        let settings = ShareSettings {
            name: "sharetest".to_string(),
            backend: BackendType::Azure,
            connection_string: Some("AccountName=acct;AccountKey=bXktc2VjcmV0LWtleQ==".to_string()),
            root: None,
        };
        let provider = create_share_provider(&settings).unwrap();
        assert_eq!(provider.share_name(), "sharetest");
    }
}
