//! Demultiplexes MPEG-2 Transport Stream containers into a per-PID
//! Packet Attributes File (PAF) index: for every reassembled PES packet,
//! its presentation/decoding timestamps plus the transport packet count
//! and byte length that carried it.
//!
//! # Usage
//!
//! ```no_run
//! use tspaf::demux::{Demux, DemuxConfig, NoopProgressSink};
//! use tspaf::stream::PacketStream;
//! use std::fs::File;
//! use std::path::Path;
//!
//! let file = File::open("input.ts").expect("open input");
//! let mut stream = PacketStream::open(file).expect("identify shape");
//! let mut demux = Demux::new(DemuxConfig::default());
//! demux
//!     .run(&mut stream, Path::new("out"), &mut NoopProgressSink)
//!     .expect("demux run");
//! ```

#![deny(missing_docs, unsafe_code)]

pub mod adaptation;
pub mod demux;
pub mod error;
pub mod m2ts;
pub mod packet;
pub mod paf;
pub mod pes;
pub mod reassembler;
pub mod shape;
pub mod stream;

mod slice_reader;

pub use error::{Error, ErrorDetails, Result};
