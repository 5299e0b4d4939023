//! Chunked sequential upload of a byte stream into a share file.

use fileshare_core::chunk::{BLOCK_SIZE, ByteRange, read_chunk};
use fileshare_core::error::FileShareError;
use fileshare_core::path::SharePath;
use tokio::io::AsyncRead;

use crate::provider::ShareProvider;

/// Write `length` bytes from `content` into `dir/name`.
///
/// The file is created at its final size first, then filled with consecutive
/// [`BLOCK_SIZE`] ranges starting at offset 0. Each range completes before the next
/// is read. A failure leaves the file partially written.
pub async fn write_content<R>(
    provider: &dyn ShareProvider,
    dir: &SharePath,
    name: &str,
    content: &mut R,
    length: u64,
) -> anyhow::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    write_chunked(provider, dir, name, content, length, BLOCK_SIZE).await
}

pub(crate) async fn write_chunked<R>(
    provider: &dyn ShareProvider,
    dir: &SharePath,
    name: &str,
    content: &mut R,
    length: u64,
    block_size: usize,
) -> anyhow::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    provider.create_file(dir, name, length).await?;

    let mut offset = 0u64;
    while offset < length {
        // Never read past the declared length.
        let wanted = usize::try_from(length - offset).map_or(block_size, |rest| rest.min(block_size));
        let chunk = read_chunk(content, wanted).await?;
        if chunk.is_empty() {
            break;
        }

        let range = ByteRange::new(offset, chunk.len() as u64);
        tracing::debug!(file = %dir.file_path(name), %range, "Uploading range");
        provider.upload_range(dir, name, offset, &chunk).await?;

        offset += range.length;
    }

    if offset != length {
        return Err(FileShareError::LengthMismatch {
            expected: length,
            actual: offset,
        }
        .into());
    }

    Ok(offset)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::provider::DirEntry;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// In-memory provider that records every mutating call it receives.
    #[derive(Default)]
    pub(crate) struct RecordingProvider {
        pub calls: Arc<Mutex<Vec<String>>>,
        pub content: Mutex<Vec<u8>>,
        pub fail_at_offset: Option<u64>,
        /// Canned listings keyed by directory path.
        pub listings: Mutex<HashMap<String, Vec<DirEntry>>>,
    }

    #[async_trait]
    impl ShareProvider for RecordingProvider {
        async fn create_share_if_not_exists(&self) -> anyhow::Result<bool> {
            Ok(false)
        }

        async fn directory_exists(&self, _dir: &SharePath) -> anyhow::Result<bool> {
            Ok(true)
        }

        async fn create_directory_if_not_exists(&self, dir: &SharePath) -> anyhow::Result<bool> {
            self.calls.lock().unwrap().push(format!("mkdir {dir}"));
            Ok(true)
        }

        async fn delete_directory_if_exists(&self, dir: &SharePath) -> anyhow::Result<bool> {
            self.calls.lock().unwrap().push(format!("rmdir {dir}"));
            Ok(true)
        }

        async fn list_directory(&self, dir: &SharePath) -> anyhow::Result<Vec<DirEntry>> {
            Ok(self
                .listings
                .lock()
                .unwrap()
                .get(&dir.to_string())
                .cloned()
                .unwrap_or_default())
        }

        async fn file_exists(&self, _dir: &SharePath, _name: &str) -> anyhow::Result<bool> {
            Ok(true)
        }

        async fn create_file(&self, dir: &SharePath, name: &str, length: u64) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("create {} {length}", dir.file_path(name)));
            *self.content.lock().unwrap() = vec![0u8; length as usize];
            Ok(())
        }

        async fn upload_range(
            &self,
            _dir: &SharePath,
            _name: &str,
            offset: u64,
            data: &[u8],
        ) -> anyhow::Result<()> {
            if self.fail_at_offset == Some(offset) {
                anyhow::bail!("injected failure at {offset}");
            }
            self.calls
                .lock()
                .unwrap()
                .push(format!("range {offset} {}", data.len()));
            let start = offset as usize;
            self.content.lock().unwrap()[start..start + data.len()].copy_from_slice(data);
            Ok(())
        }

        async fn delete_file_if_exists(&self, dir: &SharePath, name: &str) -> anyhow::Result<bool> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("rm {}", dir.file_path(name)));
            Ok(true)
        }

        async fn download_file(&self, _dir: &SharePath, _name: &str) -> anyhow::Result<Vec<u8>> {
            Ok(self.content.lock().unwrap().clone())
        }

        fn share_name(&self) -> &str {
            "recording"
        }
    }

    /// Reader that remembers the largest buffer it was asked to fill.
    struct SizeRecordingReader<'a> {
        data: &'a [u8],
        largest_request: usize,
    }

    impl AsyncRead for SizeRecordingReader<'_> {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let this = &mut *self;
            this.largest_request = this.largest_request.max(buf.remaining());
            Pin::new(&mut this.data).poll_read(cx, buf)
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn ranges_are_sequential_and_contiguous() {
        let provider = RecordingProvider::default();
        let dir = SharePath::parse("a/b").unwrap();
        let data = pattern(2500);
        let mut reader: &[u8] = &data;

        let written = write_chunked(&provider, &dir, "f.bin", &mut reader, 2500, 1024)
            .await
            .unwrap();

        assert_eq!(written, 2500);
        assert_eq!(
            *provider.calls.lock().unwrap(),
            vec![
                "create a/b/f.bin 2500",
                "range 0 1024",
                "range 1024 1024",
                "range 2048 452",
            ]
        );
        assert_eq!(*provider.content.lock().unwrap(), data);
    }

    #[tokio::test]
    async fn default_block_size_splits_large_content() {
        let provider = RecordingProvider::default();
        let data = pattern(9_000_000);
        let mut reader: &[u8] = &data;

        write_content(&provider, &SharePath::root(), "big.bin", &mut reader, 9_000_000)
            .await
            .unwrap();

        let calls = provider.calls.lock().unwrap();
        assert_eq!(
            calls[1..],
            ["range 0 4000000", "range 4000000 4000000", "range 8000000 1000000"]
        );
        assert_eq!(*provider.content.lock().unwrap(), data);
    }

    #[tokio::test]
    async fn small_content_reads_only_what_it_needs() {
        let provider = RecordingProvider::default();
        let data = pattern(27);
        let mut reader = SizeRecordingReader {
            data: &data,
            largest_request: 0,
        };

        write_content(&provider, &SharePath::root(), "small.json", &mut reader, 27)
            .await
            .unwrap();

        assert_eq!(reader.largest_request, 27);
        assert_eq!(
            *provider.calls.lock().unwrap(),
            vec!["create small.json 27", "range 0 27"]
        );
    }

    #[tokio::test]
    async fn empty_content_only_creates_the_file() {
        let provider = RecordingProvider::default();
        let mut reader: &[u8] = &[];

        let written = write_content(&provider, &SharePath::root(), "empty", &mut reader, 0)
            .await
            .unwrap();

        assert_eq!(written, 0);
        assert_eq!(*provider.calls.lock().unwrap(), vec!["create empty 0"]);
    }

    #[tokio::test]
    async fn short_stream_is_a_length_mismatch() {
        let provider = RecordingProvider::default();
        let data = pattern(10);
        let mut reader: &[u8] = &data;

        let err = write_chunked(&provider, &SharePath::root(), "f", &mut reader, 20, 4)
            .await
            .unwrap_err();

        match err.downcast_ref::<FileShareError>() {
            Some(FileShareError::LengthMismatch { expected, actual }) => {
                assert_eq!((*expected, *actual), (20, 10));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn bytes_past_declared_length_are_not_read() {
        let provider = RecordingProvider::default();
        let data = pattern(10);
        let mut reader: &[u8] = &data;

        write_chunked(&provider, &SharePath::root(), "f", &mut reader, 6, 4)
            .await
            .unwrap();

        assert_eq!(reader.len(), 4);
        assert_eq!(*provider.content.lock().unwrap(), data[..6]);
    }

    #[tokio::test]
    async fn range_failure_stops_the_upload() {
        let provider = RecordingProvider {
            fail_at_offset: Some(4),
            ..Default::default()
        };
        let data = pattern(12);
        let mut reader: &[u8] = &data;

        let result = write_chunked(&provider, &SharePath::root(), "f", &mut reader, 12, 4).await;

        assert!(result.is_err());
        assert_eq!(
            *provider.calls.lock().unwrap(),
            vec!["create f 12", "range 0 4"]
        );
    }
}
