use super::pes::PESHeader;
use super::types::*;
use crate::error::{Result, TsError};
use bytes::{BufMut, BytesMut};
use std::collections::HashMap;

/// Largest payload a packet without adaptation field can carry.
pub const TS_MAX_PAYLOAD: usize = TS_PACKET_SIZE - TS_HEADER_SIZE;

/// Splits PES units into 188-byte transport packets.
///
/// Each PID keeps its own continuity counter. A packet whose payload does not
/// fill the packet is padded through an adaptation field of `0xff` stuffing
/// bytes, which is what the demuxer's frame-end heuristic looks for.
#[derive(Debug, Default)]
pub struct TSPacketWriter {
    continuity_counters: HashMap<u16, u8>,
}

impl TSPacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes one PES unit as a run of packets on `pid`.
    ///
    /// With `declare_length` the PES `packet_length` is set (when it fits in
    /// 16 bits), otherwise it is left 0 as is usual for video.
    pub fn write_unit(
        &mut self,
        buf: &mut BytesMut,
        pid: u16,
        stream_id: u8,
        pts: Option<u64>,
        payload: &[u8],
        declare_length: bool,
    ) -> Result<()> {
        let mut header = PESHeader::new(stream_id);
        if let Some(pts) = pts {
            header = header.with_pts(pts & MAX_PTS);
        }
        if declare_length {
            header = header.with_payload_length(payload.len());
        }

        let mut pes = BytesMut::with_capacity(header.header_size() + payload.len());
        header.write_to(&mut pes)?;
        pes.extend_from_slice(payload);

        let mut remaining = &pes[..];
        let mut unit_start = true;
        while !remaining.is_empty() {
            let taken = self.write_packet(buf, pid, unit_start, remaining)?;
            remaining = &remaining[taken..];
            unit_start = false;
        }
        Ok(())
    }

    /// Writes a single packet carrying as much of `payload` as fits and
    /// returns the number of payload bytes consumed.
    pub fn write_packet(
        &mut self,
        buf: &mut BytesMut,
        pid: u16,
        payload_unit_start: bool,
        payload: &[u8],
    ) -> Result<usize> {
        if pid > 0x1fff {
            return Err(TsError::InvalidData(format!("PID {:#x} exceeds 13 bits", pid)));
        }

        let taken = payload.len().min(TS_MAX_PAYLOAD);
        let stuffing = TS_MAX_PAYLOAD - taken;

        let counter = self.continuity_counters.entry(pid).or_insert(0);
        let header = TSHeader {
            payload_unit_start,
            pid,
            adaptation_field_exists: stuffing > 0,
            contains_payload: taken > 0,
            continuity_counter: *counter,
            ..Default::default()
        };
        *counter = (*counter + 1) & 0x0f;

        header.write_to(buf)?;
        if stuffing > 0 {
            write_stuffing(buf, stuffing);
        }
        buf.put_slice(&payload[..taken]);

        Ok(taken)
    }
}

/// Writes an adaptation field occupying exactly `size` bytes, length byte
/// included.
fn write_stuffing(buf: &mut BytesMut, size: usize) {
    let length = size - 1;
    buf.put_u8(length as u8);
    if length > 0 {
        // No flags set
        buf.put_u8(0x00);
        buf.put_bytes(0xff, length - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_packet_has_no_adaptation_field() {
        let mut writer = TSPacketWriter::new();
        let mut buf = BytesMut::new();
        let taken = writer.write_packet(&mut buf, 0x100, true, &[0xab; 300]).unwrap();

        assert_eq!(taken, TS_MAX_PAYLOAD);
        assert_eq!(buf.len(), TS_PACKET_SIZE);
        assert_eq!(&buf[..4], &[0x47, 0x41, 0x00, 0x10]);
    }

    #[test]
    fn test_short_packets_are_stuffed() {
        let mut writer = TSPacketWriter::new();
        for len in [0usize, 1, 100, 182, 183] {
            let mut buf = BytesMut::new();
            writer.write_packet(&mut buf, 0x100, false, &vec![0xab; len]).unwrap();
            assert_eq!(buf.len(), TS_PACKET_SIZE, "payload of {}", len);
            assert_eq!(buf[3] & 0x20, 0x20);
            assert_eq!(buf[4] as usize, TS_MAX_PAYLOAD - len - 1);
            assert!(buf[TS_PACKET_SIZE - len..].iter().all(|&b| b == 0xab));
        }
    }

    #[test]
    fn test_continuity_counter_per_pid() {
        let mut writer = TSPacketWriter::new();
        let mut buf = BytesMut::new();
        for _ in 0..17 {
            writer.write_packet(&mut buf, 0x100, false, &[0; 184]).unwrap();
        }
        writer.write_packet(&mut buf, 0x101, false, &[0; 184]).unwrap();

        let counters: Vec<u8> = buf.chunks(TS_PACKET_SIZE).map(|p| p[3] & 0x0f).collect();
        assert_eq!(counters[15], 15);
        assert_eq!(counters[16], 0);
        assert_eq!(counters[17], 0);
    }

    #[test]
    fn test_write_unit_packet_count() {
        let mut writer = TSPacketWriter::new();
        let mut buf = BytesMut::new();
        // 14 header bytes + 354 payload bytes = exactly two packets
        writer
            .write_unit(&mut buf, 0x100, STREAM_ID_VIDEO_1, Some(0), &[1; 354], false)
            .unwrap();
        assert_eq!(buf.len(), 2 * TS_PACKET_SIZE);
        assert_eq!(buf[1] & 0x40, 0x40);
        assert_eq!(buf[TS_PACKET_SIZE + 1] & 0x40, 0);

        assert!(writer.write_packet(&mut buf, 0x2000, false, &[]).is_err());
    }
}
