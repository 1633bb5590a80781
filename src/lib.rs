#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

//! # tsdemux - MPEG Transport Stream demuxing for streaming players
//!
//! `tsdemux` takes MPEG-TS bytes in arbitrarily sized chunks, reassembles
//! the PES units of the streams you register, and delivers each unit with
//! its presentation time to a consumer. The consumer side provides bit-level
//! buffers with timestamp-indexed seeking, so a decoder can start at any
//! buffered time without re-scanning the stream.
//!
//! ## Features
//!
//! - Chunk-boundary independent demuxing with resync after corruption
//! - PTS extraction and unit completion by declared length, next unit start,
//!   or an optional padding heuristic for unbounded video units
//! - Growing (static source) or evicting (live source) bit buffers
//! - Seekable decoder buffers fed directly by the demuxer
//! - Async adapters for `AsyncRead` and `Stream` sources
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use tsdemux::format::{pump, ReaderSource};
//! use tsdemux::format::ts::{STREAM_ID_AUDIO_1, STREAM_ID_VIDEO_1};
//! use tsdemux::{Config, DecoderBuffer, TSDemuxer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let video = Arc::new(Mutex::new(DecoderBuffer::video(&config)));
//!     let audio = Arc::new(Mutex::new(DecoderBuffer::audio(&config)));
//!
//!     let mut demuxer = TSDemuxer::from_config(&config);
//!     demuxer.connect(STREAM_ID_VIDEO_1, video.clone());
//!     demuxer.connect(STREAM_ID_AUDIO_1, audio.clone());
//!
//!     let file = tokio::fs::File::open("movie.ts").await?;
//!     let mut source = ReaderSource::with_config(file, &config);
//!     pump(&mut source, &mut demuxer).await?;
//!
//!     video.lock().seek(12.5);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `utils`: the bit-addressable [`BitBuffer`]
//! - `format`: the transport stream demuxer and byte source adapters
//! - `av`: unit destinations, decoder buffers and the engine handle
//! - `config`: settings loaded from the environment or `tsdemux.toml`
//! - `error`: error type and result alias

/// Consumer-side buffers, unit destinations and the engine handle
pub mod av;

/// Error types and utilities
pub mod error;

/// Transport stream demuxing and byte sources
pub mod format;

/// Common utilities and helper functions
pub mod utils;

/// Configuration module
pub mod config;

pub use av::{DecoderBuffer, Destination, PesUnit};
pub use config::Config;
pub use error::{Result, TsError};
pub use format::TSDemuxer;
pub use utils::{BitBuffer, BufferMode};
