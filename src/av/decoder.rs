use super::engine::{EngineHandle, EngineState};
use super::timestamps::{TimestampIndex, TimestampSample};
use super::{Destination, FrameDecoder};
use crate::config::Config;
use crate::utils::{BitBuffer, BufferMode};
use bytes::Bytes;
use parking_lot::Mutex;

/// Consumer-side buffer that receives completed PES units, keeps them in a
/// [`BitBuffer`] for an external decoder and supports seeking by time.
///
/// Timestamps are only collected for non-streaming sources, where the buffer
/// expands and bit offsets stay valid for the lifetime of the stream.
#[derive(Debug)]
pub struct DecoderBuffer {
    bits: BitBuffer,
    collect_timestamps: bool,
    timestamps: TimestampIndex,
    bytes_written: usize,
    start_time: f64,
    decoded_time: f64,
    can_play: bool,
}

impl DecoderBuffer {
    /// Creates a buffer of `buffer_size` bytes. Streaming buffers evict old
    /// data and do not record timestamps.
    pub fn new(buffer_size: usize, streaming: bool) -> Self {
        let mode = if streaming {
            BufferMode::Evict
        } else {
            BufferMode::Expand
        };
        Self {
            bits: BitBuffer::new(buffer_size, mode),
            collect_timestamps: !streaming,
            timestamps: TimestampIndex::new(),
            bytes_written: 0,
            start_time: 0.0,
            decoded_time: 0.0,
            can_play: false,
        }
    }

    /// Buffer sized for a video elementary stream.
    pub fn video(config: &Config) -> Self {
        Self::new(config.video_buffer_size, config.streaming)
    }

    /// Buffer sized for an audio elementary stream.
    pub fn audio(config: &Config) -> Self {
        Self::new(config.audio_buffer_size, config.streaming)
    }

    pub fn bits(&self) -> &BitBuffer {
        &self.bits
    }

    pub fn bits_mut(&mut self) -> &mut BitBuffer {
        &mut self.bits
    }

    pub fn collects_timestamps(&self) -> bool {
        self.collect_timestamps
    }

    pub fn timestamps(&self) -> &[TimestampSample] {
        self.timestamps.samples()
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Whether at least one unit has been written.
    pub fn can_play(&self) -> bool {
        self.can_play
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Presentation time of the data most recently decoded.
    pub fn current_time(&self) -> f64 {
        self.decoded_time
    }

    /// Repositions the read cursor at the closest indexed unit at or before
    /// `time`. Does nothing for streaming buffers.
    pub fn seek(&mut self, time: f64) {
        if !self.collect_timestamps {
            return;
        }

        match self.timestamps.seek(time) {
            Some(sample) => {
                self.bits.set_index(sample.bit_offset);
                self.decoded_time = sample.time;
            }
            None => {
                self.bits.set_index(0);
                self.decoded_time = self.start_time;
            }
        }
    }

    /// Advances the decoded time after `seconds` of content were decoded.
    ///
    /// If the read cursor has passed a newer indexed unit, the decoded time
    /// snaps to that unit's timestamp instead.
    pub fn advance_decoded_time(&mut self, seconds: f64) {
        if self.collect_timestamps {
            if let Some(sample) = self.timestamps.advance(self.bits.index()) {
                self.decoded_time = sample.time;
                return;
            }
        }

        self.decoded_time += seconds;
    }

    /// Lets `decoder` consume one unit and advances the decoded time by the
    /// reported duration. Returns false when the decoder needs more data.
    pub fn decode(&mut self, decoder: &mut dyn FrameDecoder) -> bool {
        match decoder.decode_frame(&mut self.bits) {
            Some(duration) => {
                self.advance_decoded_time(duration);
                true
            }
            None => {
                self.advance_decoded_time(0.0);
                false
            }
        }
    }
}

impl DecoderBuffer {
    /// Like [`decode`], using the decoder held by `engine`. Makes no
    /// progress, and leaves the cursor alone, until the engine is ready.
    ///
    /// [`decode`]: DecoderBuffer::decode
    pub fn decode_with<D>(&mut self, engine: &EngineHandle<Mutex<D>>) -> bool
    where
        D: FrameDecoder + Send + 'static,
    {
        match engine.state() {
            EngineState::Ready(decoder) => self.decode(&mut *decoder.lock()),
            _ => false,
        }
    }
}

impl Destination for DecoderBuffer {
    fn write(&mut self, pts: f64, fragments: Vec<Bytes>) {
        if self.collect_timestamps {
            if self.timestamps.is_empty() {
                self.start_time = pts;
                self.decoded_time = pts;
            }
            self.timestamps.push(self.bytes_written << 3, pts);
        }

        self.bytes_written += self.bits.write(&fragments) >> 3;
        self.can_play = true;
    }
}
