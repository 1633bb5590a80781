//! # MPEG Transport Stream demuxing
//!
//! Push-driven extraction of PES units from a transport stream:
//!
//! - **Framing**: 188-byte packets, sync-byte checks and resync after
//!   corruption ([`parser`])
//! - **PES reassembly**: per-stream accumulation of payload fragments and
//!   PTS extraction ([`pes`])
//! - **Demuxing**: PID to stream id routing and unit completion rules
//!   ([`demuxer`])
//! - **Packetizing**: a minimal packet writer, mostly for producing test
//!   streams ([`muxer`])
//!
//! PAT/PMT tables are not interpreted. Streams are identified by the
//! stream id of their PES headers.
//!
//! ## Example
//!
//! ```rust
//! use bytes::BytesMut;
//! use tsdemux::av::PesUnit;
//! use tsdemux::format::ts::{TSDemuxer, TSPacketWriter, STREAM_ID_AUDIO_1};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut stream = BytesMut::new();
//! let mut writer = TSPacketWriter::new();
//! writer.write_unit(&mut stream, 0x101, STREAM_ID_AUDIO_1, Some(90_000), &[0xaa; 64], true)?;
//!
//! let units = std::sync::Arc::new(parking_lot::Mutex::new(Vec::<PesUnit>::new()));
//! let mut demuxer = TSDemuxer::new(true);
//! demuxer.connect(STREAM_ID_AUDIO_1, units.clone());
//! demuxer.write(&stream);
//!
//! let units = units.lock();
//! assert_eq!(units.len(), 1);
//! assert_eq!(units[0].pts, 1.0);
//! assert_eq!(units[0].len(), 64);
//! # Ok(())
//! # }
//! ```

/// Push-driven demuxer
pub mod demuxer;

/// Packet writer used to build streams
pub mod muxer;

/// Packet framing and resync
pub mod parser;

/// PES header parsing and unit accumulation
pub mod pes;

/// Core TS types and constants
pub mod types;

pub use demuxer::TSDemuxer;
pub use muxer::{TSPacketWriter, TS_MAX_PAYLOAD};
pub use parser::{ParserStats, SyncStatus, TSPacketParser};
pub use pes::{PESHeader, PesPacketInfo};
pub use types::*;
