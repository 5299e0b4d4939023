use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt};

/// Bytes written per range request. Stays under the service's 4 MiB range limit.
pub const BLOCK_SIZE: usize = 4_000_000;

/// A contiguous byte range of a remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Offset of the last byte (inclusive). Undefined for empty ranges.
    pub fn last(&self) -> u64 {
        self.offset + self.length.saturating_sub(1)
    }

    /// Value for a `Range`/`x-ms-range` header: `bytes=<first>-<last>`.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.offset, self.last())
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.offset, self.offset + self.length)
    }
}

/// Read the next chunk of at most `block_size` bytes.
///
/// Keeps reading until the chunk is full or the reader hits EOF, so every chunk but
/// the last is exactly `block_size` long. An empty chunk means EOF.
pub async fn read_chunk<R>(reader: &mut R, block_size: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; block_size];
    let mut total_read = 0;

    while total_read < block_size {
        match reader.read(&mut buf[total_read..]).await? {
            0 => break,
            n => total_read += n,
        }
    }

    buf.truncate(total_read);
    Ok(buf)
}
