use super::types::*;
use crate::error::Result;
use crate::utils::BitBuffer;

/// Outcome of checking for a sync byte at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// The expected sync byte was found.
    InSync,
    /// Alignment was lost and recovered; the cursor is past the new sync byte.
    Resynced,
    /// Not enough buffered data to attempt a resync.
    Deferred,
    /// A full resync window held no aligned packets; it was skipped.
    Garbage,
}

impl SyncStatus {
    /// Whether the cursor now sits just past a sync byte.
    pub fn is_synced(self) -> bool {
        matches!(self, SyncStatus::InSync | SyncStatus::Resynced)
    }
}

/// Counters describing what the packet framer has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    pub packets: u64,
    pub resyncs: u64,
    pub garbage_skips: u64,
}

/// Packet-level framing: sync detection, resync and header fields.
#[derive(Debug, Default)]
pub struct TSPacketParser {
    stats: ParserStats,
}

impl TSPacketParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Consumes the sync byte at the cursor, resyncing if it is wrong.
    pub fn sync(&mut self, bits: &mut BitBuffer) -> Result<SyncStatus> {
        if bits.read(8)? == SYNC_BYTE as u32 {
            self.stats.packets += 1;
            return Ok(SyncStatus::InSync);
        }

        let status = self.resync(bits);
        if status.is_synced() {
            self.stats.packets += 1;
        }
        Ok(status)
    }

    /// Looks for a sync byte that is followed by further sync bytes exactly
    /// one packet apart, within the next `TS_PACKET_SIZE - 1` bytes.
    ///
    /// Needs [`RESYNC_WINDOW_PACKETS`] packets of buffered data. When the
    /// window contains no aligned candidate the scanned bytes are skipped so
    /// the same region is never rescanned.
    pub fn resync(&mut self, bits: &mut BitBuffer) -> SyncStatus {
        if !bits.has(TS_PACKET_BITS * RESYNC_WINDOW_PACKETS) {
            return SyncStatus::Deferred;
        }

        let start = bits.index() >> 3;
        let bytes = bits.bytes();
        let aligned_at = |offset: usize| {
            (0..RESYNC_CONFIRMATIONS).all(|j| bytes[offset + TS_PACKET_SIZE * j] == SYNC_BYTE)
        };

        let found = (0..TS_PACKET_SIZE - 1).find(|&i| aligned_at(start + i));

        match found {
            Some(i) => {
                log::debug!("resynced after skipping {} bytes", i);
                bits.set_index((start + i + 1) << 3);
                self.stats.resyncs += 1;
                SyncStatus::Resynced
            }
            None => {
                log::warn!(
                    "no packet alignment within {} bytes, possible garbage data; skipping",
                    TS_PACKET_SIZE - 1
                );
                bits.set_index((start + TS_PACKET_SIZE - 1) << 3);
                self.stats.garbage_skips += 1;
                SyncStatus::Garbage
            }
        }
    }

    /// Reads an adaptation field length and skips the field. Returns false,
    /// leaving the cursor untouched, if the field would run past `end_bit`.
    pub fn skip_adaptation_field(&self, bits: &mut BitBuffer, end_bit: usize) -> Result<bool> {
        let length = bits.peek(8)? as usize;
        let field_end = bits.index() + 8 + (length << 3);
        if field_end > end_bit {
            return Ok(false);
        }
        bits.set_index(field_end);
        Ok(true)
    }
}
