use anyhow::Result;
use std::path::Path;

use fileshare_storage::FileShareService;

pub async fn run(service: &FileShareService, dir: &str, name: &str, dest: &Path) -> Result<()> {
    let data = service.download_file(dir, name).await?;
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, &data).await?;
    println!("Downloaded {} bytes -> {}", data.len(), dest.display());
    Ok(())
}
