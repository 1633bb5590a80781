//! Container-level input: the transport stream demuxer and the adapters
//! that feed it from async byte sources.

pub mod source;
pub mod ts;

/// Anything that accepts raw container bytes in arbitrary chunks.
pub trait ByteSink {
    /// Feeds the next chunk. Chunk boundaries carry no meaning.
    fn write(&mut self, chunk: &[u8]);

    /// Called once the upstream source is exhausted, so a sink that holds
    /// back bytes can process what it still can.
    fn flush(&mut self) {}
}

pub use self::source::{pump, ByteSource, ReaderSource, StreamSource};
pub use self::ts::{TSDemuxer, TSPacketWriter};
