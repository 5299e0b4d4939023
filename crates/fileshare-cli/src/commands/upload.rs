use anyhow::Result;
use std::path::Path;

use fileshare_storage::FileShareService;

pub async fn run(
    service: &FileShareService,
    source: &Path,
    dir: &str,
    name: Option<&str>,
) -> Result<()> {
    let name = match name {
        Some(n) => n.to_string(),
        None => source
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Cannot derive a file name from {}", source.display()))?,
    };

    service.upload_file(dir, &name, source).await?;
    println!("Uploaded {} -> {}:{}/{}", source.display(), service.share_name(), dir, name);
    Ok(())
}
