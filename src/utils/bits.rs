use crate::error::{Result, TsError};
use bitvec::prelude::*;
use bytes::{Buf, Bytes, BytesMut};

/// Buffer-management policy of a [`BitBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMode {
    /// Grow the backing storage on every write. Used for finite sources.
    Expand,
    /// Keep at most `capacity` bytes, discarding the oldest bytes on overflow.
    /// Used for unbounded live sources.
    Evict,
}

/// A byte buffer with an explicit bit-granularity cursor.
///
/// `index` is a *bit* offset into the stored bytes and is shared by every
/// read, skip and seek. Reads are most-significant-bit first. Writing appends
/// at the end of the stored bytes and never moves the cursor, except when an
/// [`BufferMode::Evict`] buffer drops bytes from the front, in which case the
/// cursor is rebased by the number of discarded bits (clamped to 0).
///
/// Example:
/// ```
/// use tsdemux::utils::{BitBuffer, BufferMode};
///
/// let mut buffer = BitBuffer::new(16, BufferMode::Expand);
/// buffer.write(&[[0b1011_0011u8, 0xff]]);
///
/// assert_eq!(buffer.read(3).unwrap(), 0b101);
/// assert_eq!(buffer.read(5).unwrap(), 0b10011);
/// assert!(buffer.has(8));
/// assert!(!buffer.has(9));
/// ```
#[derive(Debug, Clone)]
pub struct BitBuffer {
    bytes: BytesMut,
    index: usize,
    mode: BufferMode,
    capacity: usize,
}

impl BitBuffer {
    /// Creates an empty buffer. For [`BufferMode::Evict`], `capacity` is the
    /// hard upper bound on stored bytes; for [`BufferMode::Expand`] it is only
    /// the initial allocation.
    pub fn new(capacity: usize, mode: BufferMode) -> Self {
        Self {
            bytes: BytesMut::with_capacity(capacity),
            index: 0,
            mode,
            capacity,
        }
    }

    /// Creates an expanding buffer holding a copy of `data`, cursor at 0.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut buffer = Self::new(data.len(), BufferMode::Expand);
        buffer.bytes.extend_from_slice(data);
        buffer
    }

    /// Buffer-management policy.
    pub fn mode(&self) -> BufferMode {
        self.mode
    }

    /// Configured capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid bytes stored.
    pub fn byte_length(&self) -> usize {
        self.bytes.len()
    }

    /// The valid stored bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Current cursor position in bits.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Moves the cursor to an absolute bit offset, clamped to the end of the
    /// stored data.
    pub fn set_index(&mut self, index: usize) {
        self.index = index.min(self.bit_length());
    }

    /// Number of bits between the cursor and the end of the stored data.
    pub fn remaining_bits(&self) -> usize {
        self.bit_length() - self.index
    }

    /// Whether at least `n` bits remain after the cursor.
    pub fn has(&self, n: usize) -> bool {
        self.remaining_bits() >= n
    }

    /// Appends `chunks` in order and returns the number of bits written.
    ///
    /// In [`BufferMode::Evict`] the oldest bytes are discarded first so that
    /// the stored length never exceeds the capacity; the cursor moves back by
    /// the discarded bit count and stops at 0.
    pub fn write<B: AsRef<[u8]>>(&mut self, chunks: &[B]) -> usize {
        let total: usize = chunks.iter().map(|c| c.as_ref().len()).sum();

        let mut skip_incoming = 0;
        if self.mode == BufferMode::Evict && self.bytes.len() + total > self.capacity {
            let overflow = self.bytes.len() + total - self.capacity;
            let discard_stored = overflow.min(self.bytes.len());
            self.bytes.advance(discard_stored);
            self.index = self.index.saturating_sub(discard_stored << 3);
            skip_incoming = overflow - discard_stored;
        }

        for chunk in chunks {
            let chunk = chunk.as_ref();
            if skip_incoming >= chunk.len() {
                skip_incoming -= chunk.len();
                continue;
            }
            self.bytes.extend_from_slice(&chunk[skip_incoming..]);
            skip_incoming = 0;
        }

        total << 3
    }

    /// Reads `n` bits (at most 32) MSB-first and advances the cursor.
    pub fn read(&mut self, n: usize) -> Result<u32> {
        let value = self.peek(n)?;
        self.index += n;
        Ok(value)
    }

    /// Reads a single bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read(1)? == 1)
    }

    /// Returns the next `n` bits (at most 32) without moving the cursor.
    pub fn peek(&self, n: usize) -> Result<u32> {
        if n > 32 {
            return Err(TsError::InvalidData(format!(
                "cannot read {} bits into a 32-bit value",
                n
            )));
        }
        self.ensure(n)?;
        if n == 0 {
            return Ok(0);
        }
        Ok(self.bytes.view_bits::<Msb0>()[self.index..self.index + n].load_be::<u32>())
    }

    /// Advances the cursor by `n` bits.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.index += n;
        Ok(())
    }

    /// Moves the cursor back by `n` bits, stopping at 0.
    pub fn rewind(&mut self, n: usize) {
        self.index = self.index.saturating_sub(n);
    }

    /// Moves the cursor to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        self.set_index((self.index + 7) & !7);
    }

    /// Whether the next three bytes (from the next byte boundary) are the
    /// `0x000001` start-code prefix. Does not move the cursor.
    pub fn next_bytes_are_start_code(&self) -> bool {
        let i = (self.index + 7) >> 3;
        self.bytes.get(i..i + 3) == Some(&[0x00, 0x00, 0x01][..])
    }

    /// Scans forward for the next start code. On success the cursor is left
    /// just past the code byte and the code is returned; otherwise the cursor
    /// is moved to the end of the data.
    pub fn find_next_start_code(&mut self) -> Option<u8> {
        let start = (self.index + 7) >> 3;
        let found = self
            .bytes
            .get(start..)
            .and_then(|tail| tail.windows(4).position(|w| w[..3] == [0x00, 0x00, 0x01]));

        match found {
            Some(pos) => {
                let i = start + pos;
                self.index = (i + 4) << 3;
                Some(self.bytes[i + 3])
            }
            None => {
                self.index = self.bit_length();
                None
            }
        }
    }

    /// Skips start codes until `code` is found.
    pub fn find_start_code(&mut self, code: u8) -> Option<u8> {
        while let Some(current) = self.find_next_start_code() {
            if current == code {
                return Some(current);
            }
        }
        None
    }

    /// Copies the bytes in `[start, end)` out of the buffer.
    pub fn slice(&self, start: usize, end: usize) -> Bytes {
        let end = end.min(self.bytes.len());
        let start = start.min(end);
        Bytes::copy_from_slice(&self.bytes[start..end])
    }

    /// Copies every byte from the one holding the cursor to the end.
    pub fn remaining_bytes(&self) -> Bytes {
        self.slice(self.index >> 3, self.bytes.len())
    }

    fn bit_length(&self) -> usize {
        self.bytes.len() << 3
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.has(n) {
            Ok(())
        } else {
            Err(TsError::InsufficientData {
                needed: n,
                available: self.remaining_bits(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_read_bits() {
        // Cross-byte boundary
        let mut buffer = BitBuffer::from_bytes(&[0b10110011, 0b01011010]);
        assert_eq!(buffer.read(3).unwrap(), 0b101);
        assert_eq!(buffer.read(8).unwrap(), 0b10011010);
        assert_eq!(buffer.index(), 11);

        // Zero bits
        assert_eq!(buffer.read(0).unwrap(), 0);

        // Cross multiple byte boundaries
        let mut buffer = BitBuffer::from_bytes(&[0b10110011, 0b11001100, 0b10101010]);
        assert_eq!(buffer.read(20).unwrap(), 0b10110011110011001010);

        // Full 32-bit word
        let mut buffer = BitBuffer::from_bytes(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(buffer.read(32).unwrap(), 0xdeadbeef);
    }

    #[test]
    fn test_insufficient_data_does_not_move_cursor() {
        let mut buffer = BitBuffer::from_bytes(&[0xff]);
        buffer.read(6).unwrap();
        let err = buffer.read(8).unwrap_err();
        assert!(err.is_insufficient_data());
        assert_eq!(buffer.index(), 6);
        assert!(buffer.skip(3).is_err());
        assert_eq!(buffer.index(), 6);

        assert!(buffer.read(33).is_err());
    }

    #[test]
    fn test_expand_grows() {
        let mut buffer = BitBuffer::new(2, BufferMode::Expand);
        assert_eq!(buffer.write(&[&[1u8, 2, 3][..], &[4u8, 5][..]]), 40);
        assert_eq!(buffer.bytes(), &[1, 2, 3, 4, 5]);
        assert_eq!(buffer.write(&[[6u8]]), 8);
        assert_eq!(buffer.byte_length(), 6);
    }

    #[test]
    fn test_evict_discards_oldest_and_rebases_index() {
        let mut buffer = BitBuffer::new(4, BufferMode::Evict);
        buffer.write(&[[1u8, 2, 3]]);
        buffer.skip(16).unwrap();

        buffer.write(&[[4u8, 5]]);
        assert_eq!(buffer.bytes(), &[2, 3, 4, 5]);
        assert_eq!(buffer.index(), 8);
        assert_eq!(buffer.read(8).unwrap(), 3);

        // A single chunk larger than the capacity keeps only its tail
        buffer.write(&[[6u8, 7, 8, 9, 10, 11]]);
        assert_eq!(buffer.bytes(), &[8, 9, 10, 11]);
        assert_eq!(buffer.index(), 0);
    }

    #[test]
    fn test_start_codes() {
        let data = [0xaa, 0x00, 0x00, 0x01, 0xb3, 0x12, 0x00, 0x00, 0x01, 0x00, 0x34];
        let mut buffer = BitBuffer::from_bytes(&data);
        assert!(!buffer.next_bytes_are_start_code());
        buffer.skip(8).unwrap();
        assert!(buffer.next_bytes_are_start_code());
        assert_eq!(buffer.index(), 8);

        assert_eq!(buffer.find_next_start_code(), Some(0xb3));
        assert_eq!(buffer.index(), 5 * 8);
        assert_eq!(buffer.find_start_code(0x00), Some(0x00));
        assert_eq!(buffer.read(8).unwrap(), 0x34);
        assert_eq!(buffer.find_next_start_code(), None);
        assert_eq!(buffer.index(), data.len() * 8);
    }

    #[test]
    fn test_seek_and_align() {
        let mut buffer = BitBuffer::from_bytes(&[0xff, 0x0f]);
        buffer.read(3).unwrap();
        buffer.align_to_byte();
        assert_eq!(buffer.index(), 8);
        assert_eq!(buffer.read(8).unwrap(), 0x0f);

        buffer.set_index(1000);
        assert_eq!(buffer.index(), 16);
        buffer.rewind(100);
        assert_eq!(buffer.index(), 0);
        assert_eq!(buffer.remaining_bytes().as_ref(), &[0xff, 0x0f]);
    }

    #[quickcheck]
    fn prop_read_matches_manual(data: Vec<u8>, skip: u8, n: u8) -> bool {
        let n = (n % 33) as usize;
        let skip = skip as usize;
        let mut buffer = BitBuffer::from_bytes(&data);
        if buffer.skip(skip).is_err() {
            return skip > data.len() * 8;
        }

        match buffer.read(n) {
            Ok(result) => {
                let mut expected = 0u32;
                for i in 0..n {
                    let bit = skip + i;
                    let value = (data[bit / 8] >> (7 - bit % 8)) & 1;
                    expected = (expected << 1) | value as u32;
                }
                result == expected
            }
            Err(_) => skip + n > data.len() * 8,
        }
    }

    #[quickcheck]
    fn prop_evict_respects_capacity(capacity: u8, writes: Vec<(Vec<u8>, u8)>) -> bool {
        let capacity = capacity as usize + 1;
        let mut buffer = BitBuffer::new(capacity, BufferMode::Evict);
        for (chunk, advance) in writes {
            buffer.write(&[chunk]);
            let _ = buffer.skip(advance as usize);
            if buffer.byte_length() > capacity || buffer.index() > buffer.byte_length() * 8 {
                return false;
            }
        }
        true
    }
}
