use anyhow::Result;
use std::path::Path;

use fileshare_core::config::{BackendType, FileShareConfig};
use fileshare_core::connection_string::ConnectionString;

pub fn run(base_dir: &Path, config: &FileShareConfig) -> Result<()> {
    let config_path = FileShareConfig::default_path(base_dir);
    let settings = &config.share;

    if config_path.exists() {
        println!("Config: {}", config_path.display());
    } else {
        println!("Config: (command line only)");
    }
    println!();
    println!("  Share:          {}", settings.name.to_lowercase());
    println!("  Backend:        {}", settings.backend);

    match settings.backend {
        BackendType::Azure => match settings.resolve_connection_string() {
            Ok(raw) => match ConnectionString::parse(&raw) {
                Ok(cs) => {
                    println!("  Account:        {}", cs.account_name);
                    println!("  Endpoint:       {}", cs.file_endpoint);
                    println!("  Credential:     {:?}", cs.credential);
                }
                Err(e) => println!("  Connection:     invalid ({e})"),
            },
            Err(_) => println!("  Connection:     not configured"),
        },
        BackendType::Local => {
            println!(
                "  Root:           {}",
                settings.root.as_deref().unwrap_or("(not set)")
            );
        }
    }

    Ok(())
}
