use std::path::Path;

use fileshare_core::config::FileShareConfig;
use fileshare_core::path::{SharePath, validate_file_name};
use tokio::io::AsyncRead;

use crate::factory::create_share_provider;
use crate::provider::ShareProvider;
use crate::upload::write_content;

/// Folder and file operations on one file share.
///
/// Every operation accepts directory paths with either `/` or `\` separators.
/// Absent directories or files are reported as `false`, never as errors; any
/// other failure comes straight from the provider and leaves the share in
/// whatever state the failed call reached.
pub struct FileShareService {
    share: Box<dyn ShareProvider>,
}

impl FileShareService {
    /// Take ownership of a share handle, creating the share if it does not exist.
    pub async fn connect(share: Box<dyn ShareProvider>) -> anyhow::Result<Self> {
        if share.create_share_if_not_exists().await? {
            tracing::info!(share = share.share_name(), "Share created");
        }
        Ok(Self { share })
    }

    /// Build the provider described by `config` and connect to it.
    pub async fn from_config(config: &FileShareConfig) -> anyhow::Result<Self> {
        let share = create_share_provider(&config.share)?;
        Self::connect(share).await
    }

    pub fn share_name(&self) -> &str {
        self.share.share_name()
    }

    /// Write `content` to `dir/file_name`, creating missing directories first.
    pub async fn upload_bytes(
        &self,
        dir: &str,
        file_name: &str,
        content: &[u8],
    ) -> anyhow::Result<()> {
        let mut reader = content;
        self.upload_stream(dir, file_name, &mut reader, content.len() as u64)
            .await
    }

    /// Write exactly `length` bytes read from `content` to `dir/file_name`.
    ///
    /// Bytes are copied as-is; nothing is decoded or re-encoded on the way.
    pub async fn upload_stream<R>(
        &self,
        dir: &str,
        file_name: &str,
        content: &mut R,
        length: u64,
    ) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let dir = SharePath::parse(dir)?;
        validate_file_name(file_name)?;

        self.create_hierarchy(&dir).await?;
        let written = write_content(self.share.as_ref(), &dir, file_name, content, length).await?;

        tracing::info!(
            share = self.share.share_name(),
            file = %dir.file_path(file_name),
            bytes = written,
            "Uploaded file"
        );
        Ok(())
    }

    /// Upload a local file, streaming it in chunks.
    pub async fn upload_file(&self, dir: &str, file_name: &str, source: &Path) -> anyhow::Result<()> {
        let mut file = tokio::fs::File::open(source).await?;
        let length = file.metadata().await?.len();
        self.upload_stream(dir, file_name, &mut file, length).await
    }

    /// Whether `dir/file_name` exists. An absent directory is not created.
    pub async fn file_exists(&self, dir: &str, file_name: &str) -> anyhow::Result<bool> {
        let dir = SharePath::parse(dir)?;
        validate_file_name(file_name)?;

        if !self.share.directory_exists(&dir).await? {
            return Ok(false);
        }
        self.share.file_exists(&dir, file_name).await
    }

    /// Delete `dir/file_name`. Returns whether a file was actually removed.
    pub async fn delete_file(&self, dir: &str, file_name: &str) -> anyhow::Result<bool> {
        let dir = SharePath::parse(dir)?;
        validate_file_name(file_name)?;

        if !self.share.directory_exists(&dir).await? {
            return Ok(false);
        }
        let removed = self.share.delete_file_if_exists(&dir, file_name).await?;
        if removed {
            tracing::info!(share = self.share.share_name(), file = %dir.file_path(file_name), "Deleted file");
        }
        Ok(removed)
    }

    /// Read `dir/file_name` back.
    pub async fn download_file(&self, dir: &str, file_name: &str) -> anyhow::Result<Vec<u8>> {
        let dir = SharePath::parse(dir)?;
        validate_file_name(file_name)?;
        self.share.download_file(&dir, file_name).await
    }

    /// Create a folder.
    ///
    /// With `recursive`, every missing ancestor is created too and the result is
    /// always `true`. Otherwise only the leaf is created (its parent must exist) and
    /// the result says whether it was new.
    pub async fn create_folder(&self, dir: &str, recursive: bool) -> anyhow::Result<bool> {
        let dir = SharePath::parse(dir)?;

        if recursive {
            self.create_hierarchy(&dir).await?;
            return Ok(true);
        }
        self.share.create_directory_if_not_exists(&dir).await
    }

    pub async fn folder_exists(&self, dir: &str) -> anyhow::Result<bool> {
        let dir = SharePath::parse(dir)?;
        self.share.directory_exists(&dir).await
    }

    /// Delete a folder.
    ///
    /// With `recursive`, everything below the folder, the folder itself and then each
    /// of its ancestors are deleted on a best-effort basis and the result is always
    /// `true`. Ancestors that still hold other entries stay. Otherwise only the leaf is
    /// deleted and the result says whether it existed.
    pub async fn delete_folder(&self, dir: &str, recursive: bool) -> anyhow::Result<bool> {
        let dir = SharePath::parse(dir)?;

        if recursive {
            self.delete_hierarchy(&dir).await;
            return Ok(true);
        }
        self.share.delete_directory_if_exists(&dir).await
    }

    /// Create `a`, `a/b`, `a/b/c` in order. Stops at the first failure; directories
    /// created before it stay.
    async fn create_hierarchy(&self, dir: &SharePath) -> anyhow::Result<()> {
        for level in dir.ancestors() {
            let created = self.share.create_directory_if_not_exists(&level).await?;
            tracing::debug!(dir = %level, created, "Ensured directory");
        }
        Ok(())
    }

    /// Empty `a/b/c`, then delete `a/b/c`, `a/b`, `a` in order, skipping levels
    /// that fail.
    async fn delete_hierarchy(&self, dir: &SharePath) {
        if !dir.is_root() {
            self.purge_descendants(dir).await;
        }
        for level in dir.ancestors().rev() {
            match self.share.delete_directory_if_exists(&level).await {
                Ok(removed) => tracing::debug!(dir = %level, removed, "Deleted directory"),
                Err(e) => tracing::warn!(dir = %level, "Directory not deleted: {e:#}"),
            }
        }
    }

    /// Delete every file and subdirectory below `dir`, deepest first. `dir` itself
    /// is left in place. Failures are logged and skipped.
    async fn purge_descendants(&self, dir: &SharePath) {
        // Breadth-first, so a directory is always discovered before its children.
        let mut discovered = vec![dir.clone()];
        let mut next = 0;
        while next < discovered.len() {
            let current = discovered[next].clone();
            next += 1;

            let entries = match self.share.list_directory(&current).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(dir = %current, "Directory not listed: {e:#}");
                    continue;
                }
            };
            for entry in entries {
                if entry.is_directory {
                    discovered.push(current.child(&entry.name));
                } else if let Err(e) = self.share.delete_file_if_exists(&current, &entry.name).await {
                    tracing::warn!(file = %current.file_path(&entry.name), "File not deleted: {e:#}");
                }
            }
        }

        for level in discovered.iter().skip(1).rev() {
            match self.share.delete_directory_if_exists(level).await {
                Ok(removed) => tracing::debug!(dir = %level, removed, "Deleted directory"),
                Err(e) => tracing::warn!(dir = %level, "Directory not deleted: {e:#}"),
            }
        }
    }
}
