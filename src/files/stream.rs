use std::io::{self, SeekFrom};

use axum::body::Bytes;
use futures_util::Stream;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Chunk size for download bodies; bounds memory regardless of file size.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Opens the file and seeks to the start of the serve window.
pub async fn open_at(path: &str, start: u64) -> io::Result<File> {
    let mut file = File::open(path).await?;
    if start > 0 {
        file.seek(SeekFrom::Start(start)).await?;
    }
    Ok(file)
}

/// Lazy, finite, non-restartable chunk sequence covering exactly `len`
/// bytes from the file's current position. A short read (file truncated
/// underneath us) ends the stream early; the client detects the mismatch
/// against the advertised length. Backpressure comes from the consumer
/// awaiting each chunk before the next read happens.
pub fn chunks(file: File, len: u64) -> impl Stream<Item = io::Result<Bytes>> {
    futures_util::stream::try_unfold((file, len), |(mut file, remaining)| async move {
        if remaining == 0 {
            return Ok(None);
        }
        let want = CHUNK_SIZE.min(remaining.min(usize::MAX as u64) as usize);
        let mut buf = vec![0u8; want];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), (file, remaining - n as u64))))
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use futures_util::TryStreamExt;
    use tempfile::NamedTempFile;

    use super::*;

    fn fixture(len: usize) -> (NamedTempFile, Vec<u8>) {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();
        (file, data)
    }

    async fn collect(stream: impl Stream<Item = io::Result<Bytes>>) -> Vec<u8> {
        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn window_yields_the_exact_slice() {
        let (file, data) = fixture(1000);
        let path = file.path().to_str().unwrap();

        let handle = open_at(path, 100).await.unwrap();
        let body = collect(chunks(handle, 100)).await;
        assert_eq!(body.len(), 100);
        assert_eq!(body, &data[100..200]);
    }

    #[tokio::test]
    async fn full_file_crosses_chunk_boundaries_intact() {
        let (file, data) = fixture(20_000);
        let path = file.path().to_str().unwrap();

        let handle = open_at(path, 0).await.unwrap();
        let body = collect(chunks(handle, 20_000)).await;
        assert_eq!(body, data);
    }

    #[tokio::test]
    async fn stream_ends_early_on_short_file() {
        let (file, data) = fixture(100);
        let path = file.path().to_str().unwrap();

        // Ask for more than exists; the stream stops at EOF.
        let handle = open_at(path, 0).await.unwrap();
        let body = collect(chunks(handle, 500)).await;
        assert_eq!(body, data);
    }

    #[tokio::test]
    async fn zero_length_window_is_empty() {
        let (file, _) = fixture(100);
        let path = file.path().to_str().unwrap();

        let handle = open_at(path, 0).await.unwrap();
        let body = collect(chunks(handle, 0)).await;
        assert!(body.is_empty());
    }
}
