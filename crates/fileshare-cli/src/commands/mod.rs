pub mod config;
pub mod download;
pub mod upload;

use anyhow::Result;
use fileshare_core::config::{BackendType, FileShareConfig, ShareSettings};
use std::path::{Path, PathBuf};

/// Share settings given on the command line.
#[derive(Debug, Default)]
pub struct ShareOverrides {
    pub share: Option<String>,
    pub backend: Option<BackendType>,
    pub connection_string: Option<String>,
    pub root: Option<PathBuf>,
}

/// Load `<base_dir>/fileshare.toml` if present and apply the command-line overrides.
///
/// Without a config file, `--share` is required and `--root` alone selects the
/// local backend.
pub fn resolve_config(base_dir: &Path, overrides: &ShareOverrides) -> Result<FileShareConfig> {
    let path = FileShareConfig::default_path(base_dir);
    let from_file = path.exists();

    let mut config = if from_file {
        FileShareConfig::load(&path)?
    } else {
        let name = overrides.share.clone().ok_or_else(|| {
            anyhow::anyhow!(
                "No config at {}; pass --share (and --connection-string or --root)",
                path.display()
            )
        })?;
        FileShareConfig::new(ShareSettings {
            name,
            backend: BackendType::default(),
            connection_string: None,
            root: None,
        })
    };

    let settings = &mut config.share;
    if let Some(name) = &overrides.share {
        settings.name = name.clone();
    }
    if let Some(cs) = &overrides.connection_string {
        settings.connection_string = Some(cs.clone());
    }
    if let Some(root) = &overrides.root {
        settings.root = Some(root.display().to_string());
    }
    match overrides.backend {
        Some(backend) => settings.backend = backend,
        None if !from_file && overrides.root.is_some() => settings.backend = BackendType::Local,
        None => {}
    }

    Ok(config)
}

pub fn print_flag(value: bool) -> Result<()> {
    println!("{value}");
    Ok(())
}
