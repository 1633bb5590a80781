//! Consumer-side types: the unit hand-off contract, the timestamp-indexed
//! decoder buffer and the decode-engine handle.

use crate::utils::BitBuffer;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

mod decoder;
pub mod engine;
mod packet;
mod timestamps;

pub use decoder::DecoderBuffer;
pub use engine::{EngineHandle, EngineState};
pub use packet::*;
pub use timestamps::{TimestampIndex, TimestampSample};

/// Receiver of completed PES units.
///
/// `write` is called once per unit with its presentation time in seconds and
/// the payload as ordered fragments.
pub trait Destination {
    fn write(&mut self, pts: f64, fragments: Vec<Bytes>);
}

/// External decoder that consumes one unit at a time from a bit buffer.
pub trait FrameDecoder {
    /// Decodes the next unit from `bits` and returns its duration in seconds,
    /// or `None` when more data is needed.
    fn decode_frame(&mut self, bits: &mut BitBuffer) -> Option<f64>;
}

impl Destination for Vec<PesUnit> {
    fn write(&mut self, pts: f64, fragments: Vec<Bytes>) {
        self.push(PesUnit::new(pts, fragments));
    }
}

impl<T: Destination> Destination for Arc<Mutex<T>> {
    fn write(&mut self, pts: f64, fragments: Vec<Bytes>) {
        self.lock().write(pts, fragments);
    }
}

impl Destination for UnboundedSender<PesUnit> {
    fn write(&mut self, pts: f64, fragments: Vec<Bytes>) {
        if self.send(PesUnit::new(pts, fragments)).is_err() {
            log::debug!("PES unit at {:.4}s dropped, receiver closed", pts);
        }
    }
}
