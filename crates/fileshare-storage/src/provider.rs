use async_trait::async_trait;
use fileshare_core::path::SharePath;

/// One child of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_directory: bool,
}

impl DirEntry {
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
        }
    }
}

/// Handle to a single named file share.
///
/// Implementations address directories by [`SharePath`] and files by
/// (directory, name). Create/delete calls are idempotent and report whether they
/// changed anything; remote failures are returned untranslated.
#[async_trait]
pub trait ShareProvider: Send + Sync {
    /// Create the share itself. Returns `true` if it did not exist before.
    async fn create_share_if_not_exists(&self) -> anyhow::Result<bool>;

    /// Check whether a directory exists. The root resolves to the share.
    async fn directory_exists(&self, dir: &SharePath) -> anyhow::Result<bool>;

    /// Create a single directory. Its parent must already exist.
    async fn create_directory_if_not_exists(&self, dir: &SharePath) -> anyhow::Result<bool>;

    /// Delete a single, empty directory. Returns `false` if it was absent.
    async fn delete_directory_if_exists(&self, dir: &SharePath) -> anyhow::Result<bool>;

    /// Immediate children of `dir`. An absent directory lists as empty.
    async fn list_directory(&self, dir: &SharePath) -> anyhow::Result<Vec<DirEntry>>;

    async fn file_exists(&self, dir: &SharePath, name: &str) -> anyhow::Result<bool>;

    /// Create (or truncate) a file and size it to `length` bytes.
    async fn create_file(&self, dir: &SharePath, name: &str, length: u64) -> anyhow::Result<()>;

    /// Write `data` into an existing file starting at `offset`.
    async fn upload_range(
        &self,
        dir: &SharePath,
        name: &str,
        offset: u64,
        data: &[u8],
    ) -> anyhow::Result<()>;

    /// Delete a file. Returns `false` if it was absent.
    async fn delete_file_if_exists(&self, dir: &SharePath, name: &str) -> anyhow::Result<bool>;

    /// Read a whole file.
    async fn download_file(&self, dir: &SharePath, name: &str) -> anyhow::Result<Vec<u8>>;

    /// Lower-cased share name.
    fn share_name(&self) -> &str;
}
