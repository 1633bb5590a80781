//! # Utility Functions and Types
//!
//! Bit-level buffering shared by the demuxer and by every consumer buffer.
//!
//! ## Bit Operations
//!
//! [`BitBuffer`] stores bytes and exposes a bit-granularity cursor:
//!
//! ```rust
//! use tsdemux::utils::{BitBuffer, BufferMode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut buffer = BitBuffer::new(1024, BufferMode::Evict);
//! buffer.write(&[[0b10110011u8]]);
//!
//! // Read specific number of bits
//! let value = buffer.read(3)?; // Reads first 3 bits (101)
//! assert_eq!(value, 0b101);
//! # Ok(())
//! # }
//! ```

/// Bit-addressable buffer with expand and evict policies
pub mod bits;

pub use bits::{BitBuffer, BufferMode};
