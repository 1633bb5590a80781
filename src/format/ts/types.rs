use crate::error::Result;
use crate::utils::BitBuffer;
use bytes::{BufMut, BytesMut};

// Well-known PES stream ids
pub const STREAM_ID_PACK_HEADER: u8 = 0xba;
pub const STREAM_ID_SYSTEM_HEADER: u8 = 0xbb;
pub const STREAM_ID_PROGRAM_MAP: u8 = 0xbc;
pub const STREAM_ID_PRIVATE_1: u8 = 0xbd;
pub const STREAM_ID_PADDING: u8 = 0xbe;
pub const STREAM_ID_PRIVATE_2: u8 = 0xbf;
pub const STREAM_ID_AUDIO_1: u8 = 0xc0;
pub const STREAM_ID_VIDEO_1: u8 = 0xe0;
pub const STREAM_ID_DIRECTORY: u8 = 0xff;

// Constants
pub const SYNC_BYTE: u8 = 0x47;
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_PACKET_BITS: usize = TS_PACKET_SIZE << 3;
pub const PES_START_CODE_PREFIX: u32 = 0x000001;
pub const PTS_HZ: u64 = 90_000;
/// Largest value representable by the 33-bit PTS field.
pub const MAX_PTS: u64 = (1 << 33) - 1;

/// Buffered packets required before a resync is attempted.
pub const RESYNC_WINDOW_PACKETS: usize = 6;
/// Sync bytes, 188 bytes apart, that confirm a resync candidate.
pub const RESYNC_CONFIRMATIONS: usize = 5;

/// Fixed 4-byte transport packet header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TSHeader {
    pub sync_byte: u8, // Always 0x47
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_exists: bool,
    pub contains_payload: bool,
    pub continuity_counter: u8,
}

impl Default for TSHeader {
    fn default() -> Self {
        Self {
            sync_byte: SYNC_BYTE,
            transport_error: false,
            payload_unit_start: false,
            transport_priority: false,
            pid: 0,
            scrambling_control: 0,
            adaptation_field_exists: false,
            contains_payload: true,
            continuity_counter: 0,
        }
    }
}

impl TSHeader {
    /// Reads the 24 header bits that follow an already consumed sync byte.
    pub fn read_fields(bits: &mut BitBuffer) -> Result<Self> {
        let transport_error = bits.read_bit()?;
        let payload_unit_start = bits.read_bit()?;
        let transport_priority = bits.read_bit()?;
        let pid = bits.read(13)? as u16;
        let scrambling_control = bits.read(2)? as u8;
        let adaptation_field_control = bits.read(2)?;
        let continuity_counter = bits.read(4)? as u8;

        Ok(Self {
            sync_byte: SYNC_BYTE,
            transport_error,
            payload_unit_start,
            transport_priority,
            pid,
            scrambling_control,
            adaptation_field_exists: adaptation_field_control & 0x2 != 0,
            contains_payload: adaptation_field_control & 0x1 != 0,
            continuity_counter,
        })
    }

    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(self.sync_byte);

        let mut b1 = 0u8;
        if self.transport_error {
            b1 |= 0x80;
        }
        if self.payload_unit_start {
            b1 |= 0x40;
        }
        if self.transport_priority {
            b1 |= 0x20;
        }
        b1 |= ((self.pid >> 8) & 0x1f) as u8;
        buf.put_u8(b1);

        buf.put_u8((self.pid & 0xff) as u8);

        let mut b3 = (self.scrambling_control & 0x03) << 6;
        if self.adaptation_field_exists {
            b3 |= 0x20;
        }
        if self.contains_payload {
            b3 |= 0x10;
        }
        b3 |= self.continuity_counter & 0x0f;
        buf.put_u8(b3);

        Ok(())
    }
}

// Time conversion utilities
pub fn pts_to_seconds(pts: u64) -> f64 {
    pts as f64 / PTS_HZ as f64
}

pub fn seconds_to_pts(seconds: f64) -> u64 {
    ((seconds * PTS_HZ as f64).round() as u64) & MAX_PTS
}
