use super::parser::{ParserStats, TSPacketParser};
use super::pes::{PESHeader, PesPacketInfo};
use super::types::*;
use crate::av::Destination;
use crate::config::Config;
use crate::format::ByteSink;
use crate::utils::{BitBuffer, BufferMode};
use bytes::Bytes;
use std::collections::HashMap;

/// MPEG Transport Stream demuxer.
///
/// Push-driven: every [`write`] drains all complete packets and keeps the
/// trailing partial packet for the next call. PES units are reassembled per
/// stream id and handed to the destination registered with [`connect`].
///
/// A unit ends when
/// - its declared PES length has been received,
/// - the next unit start arrives on the same PID, or
/// - with `guess_video_frame_end`, a padded non-start packet arrives for a
///   unit of unknown length.
///
/// Malformed input never produces an error: the demuxer resyncs, skips, or
/// waits for more bytes.
///
/// [`write`]: TSDemuxer::write
/// [`connect`]: TSDemuxer::connect
#[derive(Debug)]
pub struct TSDemuxer {
    parser: TSPacketParser,
    bits: BitBuffer,
    leftover: Option<Bytes>,
    guess_video_frame_end: bool,
    pids_to_stream_ids: HashMap<u16, u8>,
    pes_packet_info: HashMap<u8, PesPacketInfo>,
    start_time: Option<f64>,
    current_time: f64,
}

impl TSDemuxer {
    /// Creates a demuxer. See [`Config::guess_video_frame_end`] for the
    /// trade-off of the frame-end heuristic.
    pub fn new(guess_video_frame_end: bool) -> Self {
        Self {
            parser: TSPacketParser::new(),
            bits: BitBuffer::new(0, BufferMode::Expand),
            leftover: None,
            guess_video_frame_end,
            pids_to_stream_ids: HashMap::new(),
            pes_packet_info: HashMap::new(),
            start_time: None,
            current_time: 0.0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.guess_video_frame_end)
    }

    /// Routes completed units of `stream_id` to `destination`, replacing any
    /// previous destination for it.
    pub fn connect<D>(&mut self, stream_id: u8, destination: D)
    where
        D: Destination + Send + 'static,
    {
        self.pes_packet_info
            .insert(stream_id, PesPacketInfo::new(Box::new(destination)));
    }

    /// PTS of the first PES header seen on a connected stream.
    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    /// PTS of the most recent PES header seen on a connected stream.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Stream id learned for `pid`, if any PES header was seen on it.
    pub fn stream_id_for_pid(&self, pid: u16) -> Option<u8> {
        self.pids_to_stream_ids.get(&pid).copied()
    }

    pub fn stats(&self) -> ParserStats {
        self.parser.stats()
    }

    /// Bytes held back from previous writes.
    pub fn pending_bytes(&self) -> usize {
        self.leftover.as_ref().map_or(0, Bytes::len)
    }

    /// Feeds a chunk of transport stream bytes.
    pub fn write(&mut self, chunk: &[u8]) {
        self.bits = match self.leftover.take() {
            Some(leftover) => {
                let mut bits = BitBuffer::new(leftover.len() + chunk.len(), BufferMode::Expand);
                bits.write(&[&leftover[..], chunk]);
                bits
            }
            None => BitBuffer::from_bytes(chunk),
        };

        while self.bits.has(TS_PACKET_BITS) && self.parse_packet() {}

        let leftover_count = self.bits.byte_length() - (self.bits.index() >> 3);
        self.leftover = (leftover_count > 0).then(|| self.bits.remaining_bytes());
    }

    /// Re-drives parsing over held-back bytes until no more progress is
    /// made. A failed resync stops a `write` early, so without more input
    /// the rest of the stream would otherwise stay pending.
    pub fn drain(&mut self) {
        let mut pending = self.pending_bytes();
        while pending >= TS_PACKET_SIZE {
            self.write(&[]);
            let left = self.pending_bytes();
            if left >= pending {
                break;
            }
            pending = left;
        }
    }

    fn parse_packet(&mut self) -> bool {
        match self.parser.sync(&mut self.bits) {
            Ok(status) if status.is_synced() => {}
            // Couldn't sync; maybe next time
            _ => return false,
        }

        let end = (self.bits.index() >> 3) + TS_PACKET_SIZE - 1;
        let end_bit = end << 3;
        let header = match TSHeader::read_fields(&mut self.bits) {
            Ok(header) => header,
            Err(_) => return false,
        };

        // A new unit start terminates the previous unit on this PID.
        let mut stream_id = self.stream_id_for_pid(header.pid);
        if header.payload_unit_start {
            if let Some(pi) = stream_id.and_then(|id| self.pes_packet_info.get_mut(&id)) {
                if pi.current_length() > 0 {
                    pi.packet_complete();
                }
            }
        }

        if header.contains_payload && self.skip_adaptation_field(&header, end_bit) {
            if header.payload_unit_start && self.bits.next_bytes_are_start_code() {
                if let Some(id) = self.start_pes_unit(header.pid, end_bit) {
                    stream_id = Some(id);
                }
            }

            if let Some(pi) = stream_id.and_then(|id| self.pes_packet_info.get_mut(&id)) {
                let unbounded = pi.total_length().is_none();
                let start = (self.bits.index() >> 3).min(end);
                let complete = pi.packet_add_data(self.bits.slice(start, end));

                // No reason to pad a packet mid-unit, so padding on a
                // continuation packet likely marks the end of a video frame.
                let has_padding = !header.payload_unit_start && header.adaptation_field_exists;
                let guessed_end = self.guess_video_frame_end && unbounded && has_padding;
                if complete || guessed_end {
                    pi.packet_complete();
                }
            }
        }

        self.bits.set_index(end_bit);
        true
    }

    /// Returns false if the packet carries no usable payload.
    fn skip_adaptation_field(&mut self, header: &TSHeader, end_bit: usize) -> bool {
        if !header.adaptation_field_exists {
            return true;
        }
        self.parser
            .skip_adaptation_field(&mut self.bits, end_bit)
            .unwrap_or(false)
    }

    /// Parses the PES header at the cursor, maps `pid` to its stream id and
    /// resets the stream's unit state. Leaves the cursor at the payload.
    fn start_pes_unit(&mut self, pid: u16, end_bit: usize) -> Option<u8> {
        let header_start = self.bits.index();
        let header = match PESHeader::read_from(&mut self.bits) {
            Ok(header) => header,
            Err(e) => {
                log::debug!("truncated PES header on PID {:#06x}: {}", pid, e);
                self.bits.set_index(end_bit);
                return None;
            }
        };

        self.pids_to_stream_ids.insert(pid, header.stream_id);

        if let Some(pi) = self.pes_packet_info.get_mut(&header.stream_id) {
            let pts = match header.pts_seconds() {
                Some(pts) => {
                    self.current_time = pts;
                    self.start_time.get_or_insert(pts);
                    pts
                }
                None => 0.0,
            };
            pi.packet_start(pts, header.declared_payload_length());
        }

        // Skip the rest of the header without parsing it
        let payload_begin = header_start + (header.header_size() << 3);
        self.bits.set_index(payload_begin.min(end_bit));
        Some(header.stream_id)
    }
}

impl ByteSink for TSDemuxer {
    fn write(&mut self, chunk: &[u8]) {
        TSDemuxer::write(self, chunk);
    }

    fn flush(&mut self) {
        self.drain();
    }
}
