use async_trait::async_trait;
use fileshare_core::path::{SharePath, normalize_share_name};
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::provider::{DirEntry, ShareProvider};

/// Share stored as a directory tree: `<root>/<share>/<dir>/<file>`.
///
/// Useful for mounted SMB shares and for tests. Mirrors the remote semantics:
/// a directory's parent must exist, and only empty directories can be deleted.
pub struct LocalShareProvider {
    share_root: PathBuf,
    share_name: String,
}

impl LocalShareProvider {
    pub fn new(root: &Path, share_name: &str) -> anyhow::Result<Self> {
        let share_name = normalize_share_name(share_name)?;
        Ok(Self {
            share_root: root.join(&share_name),
            share_name,
        })
    }

    fn dir_path(&self, dir: &SharePath) -> PathBuf {
        dir.segments()
            .iter()
            .fold(self.share_root.clone(), |path, segment| path.join(segment))
    }

    fn file_path(&self, dir: &SharePath, name: &str) -> PathBuf {
        self.dir_path(dir).join(name)
    }
}

async fn is_dir(path: &Path) -> anyhow::Result<bool> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn is_file(path: &Path) -> anyhow::Result<bool> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ShareProvider for LocalShareProvider {
    async fn create_share_if_not_exists(&self) -> anyhow::Result<bool> {
        if is_dir(&self.share_root).await? {
            return Ok(false);
        }
        fs::create_dir_all(&self.share_root).await?;
        Ok(true)
    }

    async fn directory_exists(&self, dir: &SharePath) -> anyhow::Result<bool> {
        is_dir(&self.dir_path(dir)).await
    }

    async fn create_directory_if_not_exists(&self, dir: &SharePath) -> anyhow::Result<bool> {
        let path = self.dir_path(dir);
        if dir.is_root() || is_dir(&path).await? {
            return Ok(false);
        }
        // Single-level create: fails when the parent is missing.
        match fs::create_dir(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                anyhow::bail!("Parent directory of '{dir}' does not exist")
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_directory_if_exists(&self, dir: &SharePath) -> anyhow::Result<bool> {
        if dir.is_root() {
            return Ok(false);
        }
        match fs::remove_dir(self.dir_path(dir)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(anyhow::Error::new(e).context(format!("Cannot delete directory '{dir}'"))),
        }
    }

    async fn list_directory(&self, dir: &SharePath) -> anyhow::Result<Vec<DirEntry>> {
        let mut read_dir = match fs::read_dir(self.dir_path(dir)).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_dir() {
                entries.push(DirEntry::directory(name));
            } else {
                entries.push(DirEntry::file(name));
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn file_exists(&self, dir: &SharePath, name: &str) -> anyhow::Result<bool> {
        is_file(&self.file_path(dir, name)).await
    }

    async fn create_file(&self, dir: &SharePath, name: &str, length: u64) -> anyhow::Result<()> {
        let file = fs::File::create(self.file_path(dir, name)).await?;
        file.set_len(length).await?;
        Ok(())
    }

    async fn upload_range(
        &self,
        dir: &SharePath,
        name: &str,
        offset: u64,
        data: &[u8],
    ) -> anyhow::Result<()> {
        let path = self.file_path(dir, name);
        let len = fs::metadata(&path).await?.len();
        if offset + data.len() as u64 > len {
            anyhow::bail!(
                "Range {offset}+{} exceeds the size of '{}' ({len} bytes)",
                data.len(),
                dir.file_path(name)
            );
        }
        let mut file = fs::OpenOptions::new().write(true).open(&path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }

    async fn delete_file_if_exists(&self, dir: &SharePath, name: &str) -> anyhow::Result<bool> {
        match fs::remove_file(self.file_path(dir, name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn download_file(&self, dir: &SharePath, name: &str) -> anyhow::Result<Vec<u8>> {
        Ok(fs::read(self.file_path(dir, name)).await?)
    }

    fn share_name(&self) -> &str {
        &self.share_name
    }
}
