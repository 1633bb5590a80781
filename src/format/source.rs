use super::ByteSink;
use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Upstream producer of transport stream bytes (file, socket, HTTP body...).
#[async_trait]
pub trait ByteSource: Send {
    /// Next chunk of bytes, or `None` at end of stream.
    async fn read_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// Reads fixed-size chunks from any [`AsyncRead`].
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: R,
    chunk_size: usize,
}

impl<R> ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn with_config(reader: R, config: &Config) -> Self {
        Self::new(reader, config.chunk_size)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[async_trait]
impl<R> ByteSource for ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
        let mut buf = BytesMut::zeroed(self.chunk_size);
        let n = self.reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf.freeze()))
    }
}

/// Adapts a stream of byte chunks, e.g. WebSocket frames or an HTTP body.
pub struct StreamSource<S> {
    stream: S,
}

impl<S> StreamSource<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S> ByteSource for StreamSource<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin + Send,
{
    async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
        self.stream.next().await.transpose()
    }
}

/// Drains `source` into `sink`, flushes the sink at end of stream and
/// returns the number of bytes moved.
///
/// Stops at the first source error without flushing; bytes already
/// delivered stay delivered.
pub async fn pump<S, K>(source: &mut S, sink: &mut K) -> Result<u64>
where
    S: ByteSource + ?Sized,
    K: ByteSink + ?Sized,
{
    let mut total = 0u64;
    while let Some(chunk) = source.read_chunk().await? {
        if chunk.is_empty() {
            continue;
        }
        total += chunk.len() as u64;
        sink.write(&chunk);
    }
    sink.flush();
    log::debug!("source exhausted after {} bytes", total);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TsError;
    use futures::stream;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[derive(Default)]
    struct Collect {
        chunks: Vec<Vec<u8>>,
        flushes: usize,
    }

    impl ByteSink for Collect {
        fn write(&mut self, chunk: &[u8]) {
            self.chunks.push(chunk.to_vec());
        }

        fn flush(&mut self) {
            self.flushes += 1;
        }
    }

    #[tokio::test]
    async fn test_reader_source_chunks() {
        let data: Vec<u8> = (0..=255).collect();
        let mut source = ReaderSource::new(Cursor::new(data.clone()), 100);
        let mut sink = Collect::default();

        let total = pump(&mut source, &mut sink).await.unwrap();
        assert_eq!(total, 256);
        assert_eq!(
            sink.chunks.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![100, 100, 56]
        );
        assert_eq!(sink.chunks.concat(), data);
        assert_eq!(sink.flushes, 1);
    }

    #[tokio::test]
    async fn test_stream_source_skips_empty_chunks() {
        let chunks = vec![
            Ok(Bytes::from_static(b"ab")),
            Ok(Bytes::new()),
            Ok(Bytes::from_static(b"cde")),
        ];
        let mut source = StreamSource::new(stream::iter(chunks));
        let mut sink = Collect::default();

        assert_eq!(pump(&mut source, &mut sink).await.unwrap(), 5);
        assert_eq!(sink.chunks, vec![b"ab".to_vec(), b"cde".to_vec()]);
    }

    #[tokio::test]
    async fn test_pump_stops_on_error() {
        let chunks = vec![
            Ok(Bytes::from_static(b"ok")),
            Err(TsError::InvalidData("connection reset".into())),
            Ok(Bytes::from_static(b"never")),
        ];
        let mut source = StreamSource::new(stream::iter(chunks));
        let mut sink = Collect::default();

        assert!(pump(&mut source, &mut sink).await.is_err());
        assert_eq!(sink.chunks, vec![b"ok".to_vec()]);
        assert_eq!(sink.flushes, 0);
    }
}
