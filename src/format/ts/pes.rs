use super::types::{pts_to_seconds, PES_START_CODE_PREFIX};
use crate::av::Destination;
use crate::error::{Result, TsError};
use crate::utils::BitBuffer;
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the PES header up to and including `header_data_length`.
pub const PES_FIXED_HEADER_SIZE: usize = 9;
/// Bytes of the PES header that `packet_length` counts besides the payload.
pub const PES_LENGTH_OVERHEAD: usize = 3;

pub const PTS_DTS_FLAG_PTS: u8 = 0b10;
pub const PTS_DTS_FLAG_PTS_DTS: u8 = 0b11;

/// Packetized Elementary Stream (PES) header structure
///
/// Contains the PES header fields of the MPEG-2 Systems standard,
/// including timing information and various control flags.
#[derive(Debug, Clone, PartialEq)]
pub struct PESHeader {
    /// Stream identifier indicating content type (video/audio/etc.)
    pub stream_id: u8,
    /// Length of the PES packet after this field, 0 when unbounded
    pub packet_length: u16,
    /// Control field for scrambling mode
    pub scrambling_control: u8,
    /// Priority flag for the packet
    pub priority: bool,
    /// Data alignment indicator
    pub data_alignment: bool,
    /// Copyright indicator
    pub copyright: bool,
    /// Original/copy indicator
    pub original: bool,
    /// Two-bit PTS/DTS presence field
    pub pts_dts_flags: u8,
    /// Remaining flag bits (ESCR, ES rate, DSM trick mode, copy info, CRC, extension)
    pub extension_flags: u8,
    /// Length of the header data following this field
    pub header_data_length: u8,
    /// Presentation Time Stamp (33 bits)
    pub pts: Option<u64>,
    /// Decoding Time Stamp (33 bits)
    pub dts: Option<u64>,
}

impl PESHeader {
    /// Creates a new PES header with a specific stream ID.
    pub fn new(stream_id: u8) -> Self {
        Self {
            stream_id,
            packet_length: 0,
            scrambling_control: 0,
            priority: false,
            data_alignment: false,
            copyright: false,
            original: false,
            pts_dts_flags: 0,
            extension_flags: 0,
            header_data_length: 0,
            pts: None,
            dts: None,
        }
    }

    /// Sets the Presentation Time Stamp in 90kHz ticks.
    pub fn with_pts(mut self, pts: u64) -> Self {
        self.pts = Some(pts);
        self.pts_dts_flags |= PTS_DTS_FLAG_PTS;
        self.header_data_length = self.timestamps_len() as u8;
        self
    }

    /// Sets the Decoding Time Stamp in 90kHz ticks. Only written alongside a PTS.
    pub fn with_dts(mut self, dts: u64) -> Self {
        self.dts = Some(dts);
        self.pts_dts_flags |= 0b01;
        self.header_data_length = self.timestamps_len() as u8;
        self
    }

    /// Sets `packet_length` to cover a payload of `payload_len` bytes.
    /// Payloads too large for the 16-bit field are left unbounded.
    pub fn with_payload_length(mut self, payload_len: usize) -> Self {
        let total = PES_LENGTH_OVERHEAD + self.header_data_length as usize + payload_len;
        self.packet_length = u16::try_from(total).unwrap_or(0);
        self
    }

    /// PTS in seconds, if present.
    pub fn pts_seconds(&self) -> Option<f64> {
        self.pts.map(pts_to_seconds)
    }

    /// Payload bytes announced by `packet_length`, `None` when unbounded.
    ///
    /// A length that works out to exactly 0 is also treated as unbounded. A
    /// `packet_length` too small to even cover the header yields `Some(0)`:
    /// the unit is complete as soon as its first packet is added.
    pub fn declared_payload_length(&self) -> Option<usize> {
        if self.packet_length == 0 {
            return None;
        }
        let overhead = self.header_data_length as usize + PES_LENGTH_OVERHEAD;
        match (self.packet_length as usize).checked_sub(overhead) {
            Some(0) => None,
            Some(len) => Some(len),
            None => Some(0),
        }
    }

    /// Full header size in bytes, i.e. the offset of the payload from the
    /// start code.
    pub fn header_size(&self) -> usize {
        PES_FIXED_HEADER_SIZE + self.header_data_length as usize
    }

    /// Parses a PES header starting at the start-code prefix.
    ///
    /// Only the PTS (and DTS, when flagged and present) are decoded from the
    /// optional header data; the caller skips the rest using [`header_size`].
    ///
    /// [`header_size`]: PESHeader::header_size
    pub fn read_from(bits: &mut BitBuffer) -> Result<Self> {
        let prefix = bits.read(24)?;
        if prefix != PES_START_CODE_PREFIX {
            return Err(TsError::InvalidData(format!(
                "bad PES start code prefix {:06x}",
                prefix
            )));
        }

        let stream_id = bits.read(8)? as u8;
        let packet_length = bits.read(16)? as u16;

        // '10' marker bits
        bits.skip(2)?;
        let scrambling_control = bits.read(2)? as u8;
        let priority = bits.read_bit()?;
        let data_alignment = bits.read_bit()?;
        let copyright = bits.read_bit()?;
        let original = bits.read_bit()?;
        let pts_dts_flags = bits.read(2)? as u8;
        let extension_flags = bits.read(6)? as u8;
        let header_data_length = bits.read(8)? as u8;

        let mut header = Self {
            stream_id,
            packet_length,
            scrambling_control,
            priority,
            data_alignment,
            copyright,
            original,
            pts_dts_flags,
            extension_flags,
            header_data_length,
            pts: None,
            dts: None,
        };

        if pts_dts_flags & PTS_DTS_FLAG_PTS != 0 {
            header.pts = Some(read_timestamp(bits)?);
            if pts_dts_flags == PTS_DTS_FLAG_PTS_DTS && header_data_length >= 10 {
                header.dts = Some(read_timestamp(bits)?);
            }
        }

        Ok(header)
    }

    /// Writes the PES header to a BytesMut buffer.
    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8((PES_START_CODE_PREFIX >> 16) as u8);
        buf.put_u8((PES_START_CODE_PREFIX >> 8) as u8);
        buf.put_u8(PES_START_CODE_PREFIX as u8);

        buf.put_u8(self.stream_id);
        buf.put_u16(self.packet_length);

        let mut flags = 0x80 | (self.scrambling_control & 0x03) << 4;
        if self.priority {
            flags |= 0x08;
        }
        if self.data_alignment {
            flags |= 0x04;
        }
        if self.copyright {
            flags |= 0x02;
        }
        if self.original {
            flags |= 0x01;
        }
        buf.put_u8(flags);

        buf.put_u8((self.pts_dts_flags & 0x03) << 6 | (self.extension_flags & 0x3f));
        buf.put_u8(self.header_data_length);

        let written = match (self.pts, self.dts) {
            (Some(pts), Some(dts)) => {
                write_timestamp(buf, 0x30, pts)?;
                write_timestamp(buf, 0x10, dts)?;
                10
            }
            (Some(pts), None) => {
                write_timestamp(buf, 0x20, pts)?;
                5
            }
            _ => 0,
        };

        // Stuffing for any declared header data we did not produce
        for _ in written..self.header_data_length as usize {
            buf.put_u8(0xff);
        }

        Ok(())
    }

    fn timestamps_len(&self) -> usize {
        match (self.pts, self.dts) {
            (Some(_), Some(_)) => 10,
            (Some(_), None) => 5,
            _ => 0,
        }
    }
}

/// Decodes a 5-byte PTS/DTS field into its 33-bit tick value.
///
/// The layout is `4 prefix bits, bits 32..30, marker, bits 29..15, marker,
/// bits 14..0, marker`. The value exceeds 32 bits, so it is assembled in a
/// `u64`.
pub fn read_timestamp(bits: &mut BitBuffer) -> Result<u64> {
    bits.skip(4)?;
    let p32_30 = bits.read(3)? as u64;
    bits.skip(1)?;
    let p29_15 = bits.read(15)? as u64;
    bits.skip(1)?;
    let p14_0 = bits.read(15)? as u64;
    bits.skip(1)?;

    Ok(p32_30 * (1 << 30) + p29_15 * (1 << 15) + p14_0)
}

/// Writes a 33-bit timestamp as a 5-byte PTS/DTS field with `marker` as the
/// 4-bit prefix.
pub fn write_timestamp(buf: &mut BytesMut, marker: u8, ts: u64) -> Result<()> {
    let pts = ts & 0x1FFFFFFFF; // 33 bits

    // First byte: marker bits and 3 MSB of timestamp
    buf.put_u8(marker | ((pts >> 29) & 0x0E) as u8 | 0x01);

    // Middle 15 bits and marker
    buf.put_u16((((pts >> 14) & 0xFFFE) | 0x01) as u16);

    // Final 15 bits and marker
    buf.put_u16((((pts << 1) & 0xFFFE) | 0x01) as u16);

    Ok(())
}

/// Reassembly state of one elementary stream.
///
/// Fragments and `current_length` always change together: both are cleared
/// on [`packet_start`] and on [`packet_complete`].
///
/// [`packet_start`]: PesPacketInfo::packet_start
/// [`packet_complete`]: PesPacketInfo::packet_complete
pub struct PesPacketInfo {
    destination: Box<dyn Destination + Send>,
    current_length: usize,
    total_length: Option<usize>,
    pts: f64,
    buffers: Vec<Bytes>,
}

impl PesPacketInfo {
    pub fn new(destination: Box<dyn Destination + Send>) -> Self {
        Self {
            destination,
            current_length: 0,
            total_length: None,
            pts: 0.0,
            buffers: Vec::new(),
        }
    }

    /// Bytes accumulated for the unit in progress.
    pub fn current_length(&self) -> usize {
        self.current_length
    }

    /// Declared payload length of the unit in progress, `None` if unknown.
    pub fn total_length(&self) -> Option<usize> {
        self.total_length
    }

    /// PTS of the unit in progress, in seconds.
    pub fn pts(&self) -> f64 {
        self.pts
    }

    /// Begins a new unit, dropping anything accumulated so far.
    pub fn packet_start(&mut self, pts: f64, payload_length: Option<usize>) {
        self.total_length = payload_length;
        self.current_length = 0;
        self.pts = pts;
        self.buffers.clear();
    }

    /// Appends a payload fragment and reports whether the declared length
    /// has been reached.
    pub fn packet_add_data(&mut self, fragment: Bytes) -> bool {
        if !fragment.is_empty() {
            self.current_length += fragment.len();
            self.buffers.push(fragment);
        }

        self.total_length
            .map_or(false, |total| self.current_length >= total)
    }

    /// Hands the accumulated fragments to the destination and resets.
    pub fn packet_complete(&mut self) {
        let buffers = std::mem::take(&mut self.buffers);
        log::trace!(
            "PES unit complete: pts={:.4}s, {} bytes in {} fragments",
            self.pts,
            self.current_length,
            buffers.len()
        );
        self.destination.write(self.pts, buffers);
        self.total_length = None;
        self.current_length = 0;
    }
}

impl std::fmt::Debug for PesPacketInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PesPacketInfo")
            .field("current_length", &self.current_length)
            .field("total_length", &self.total_length)
            .field("pts", &self.pts)
            .field("fragments", &self.buffers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::PesUnit;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;
    use std::sync::Arc;

    #[test]
    fn test_pes_header_round_trip() {
        let header = PESHeader::new(0xe0)
            .with_pts(180_000)
            .with_dts(177_000)
            .with_payload_length(100);
        assert_eq!(header.header_data_length, 10);
        assert_eq!(header.packet_length, 113);

        let mut buf = BytesMut::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(&buf[0..4], &[0x00, 0x00, 0x01, 0xe0]);
        assert_eq!(buf.len(), header.header_size());

        let mut bits = BitBuffer::from_bytes(&buf);
        let parsed = PESHeader::read_from(&mut bits).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.pts_seconds(), Some(2.0));
        assert_eq!(parsed.declared_payload_length(), Some(100));
    }

    #[test]
    fn test_timestamp_marker_bits() {
        let mut buf = BytesMut::new();
        write_timestamp(&mut buf, 0x20, 0).unwrap();
        assert_eq!(&buf[..], &[0x21, 0x00, 0x01, 0x00, 0x01]);

        let mut buf = BytesMut::new();
        write_timestamp(&mut buf, 0x20, (1 << 33) - 1).unwrap();
        assert_eq!(&buf[..], &[0x2f, 0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_timestamp_above_32_bits() {
        let ticks = (1u64 << 32) + 12_345;
        let mut buf = BytesMut::new();
        write_timestamp(&mut buf, 0x20, ticks).unwrap();

        let mut bits = BitBuffer::from_bytes(&buf);
        assert_eq!(read_timestamp(&mut bits).unwrap(), ticks);
        assert_eq!(bits.index(), 40);
    }

    #[quickcheck]
    fn prop_timestamp_round_trip(ticks: u64) -> bool {
        let ticks = ticks & 0x1FFFFFFFF;
        let mut buf = BytesMut::new();
        write_timestamp(&mut buf, 0x20, ticks).unwrap();

        let mut bits = BitBuffer::from_bytes(&buf);
        let decoded = read_timestamp(&mut bits).unwrap();
        let seconds = pts_to_seconds(decoded);
        decoded == ticks && (seconds - ticks as f64 / 90_000.0).abs() < f64::EPSILON * seconds.max(1.0)
    }

    #[test]
    fn test_packet_info_reset_and_complete() {
        let units = Arc::new(Mutex::new(Vec::<PesUnit>::new()));
        let mut info = PesPacketInfo::new(Box::new(units.clone()));

        info.packet_start(1.5, Some(4));
        assert!(!info.packet_add_data(Bytes::from_static(b"ab")));
        assert_eq!(info.current_length(), 2);

        // A new start drops the partial unit entirely
        info.packet_start(2.0, Some(4));
        assert_eq!(info.current_length(), 0);
        assert!(!info.packet_add_data(Bytes::from_static(b"cd")));
        assert!(info.packet_add_data(Bytes::from_static(b"ef")));
        info.packet_complete();

        assert_eq!(info.current_length(), 0);
        assert_eq!(info.total_length(), None);
        let units = units.lock();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].pts, 2.0);
        assert_eq!(units[0].payload().as_ref(), b"cdef");
    }

    #[test]
    fn test_declared_payload_length_edges() {
        let header = PESHeader::new(0xc0).with_pts(0);
        assert_eq!(header.declared_payload_length(), None);

        // Exactly header-sized: nothing declared
        let exact = PESHeader { packet_length: 8, ..header.clone() };
        assert_eq!(exact.declared_payload_length(), None);

        // Shorter than its own header: satisfied immediately
        let short = PESHeader { packet_length: 4, ..header };
        assert_eq!(short.declared_payload_length(), Some(0));

        let units = Arc::new(Mutex::new(Vec::<PesUnit>::new()));
        let mut info = PesPacketInfo::new(Box::new(units.clone()));
        info.packet_start(0.0, short.declared_payload_length());
        assert!(info.packet_add_data(Bytes::from_static(b"x")));
    }
}
