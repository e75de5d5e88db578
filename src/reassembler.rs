//! Per-PID reassembly of TS packet payloads into PES packets, bounded by
//! `payload_unit_start_indicator`.

use crate::error::{Error, ErrorDetails, Result};
use crate::pes::PesPacket;
use std::collections::HashMap;

/// One PID's accumulated payload bytes plus the transport packet count
/// that contributed them.
struct PidBuffer {
    data: Vec<u8>,
    tp_count: u16,
}

impl PidBuffer {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            tp_count: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.tp_count == 0
    }
}

/// A completed PES packet plus the number of TS packets that carried it.
#[derive(Debug)]
pub struct PesUnit {
    /// Owned, concatenated TS payload bytes for the completed PES.
    pub data: Vec<u8>,
    /// Number of TS packets whose payload contributed to `data`.
    pub tp_count: u16,
}

impl PesUnit {
    /// Parses the accumulated bytes as a PES packet.
    pub fn parse(&self) -> Result<PesPacket<'_>> {
        PesPacket::parse(&self.data)
    }
}

/// Per-PID buffering state. One instance covers every PID seen by a demux
/// run; `feed` is the only mutator.
pub struct PidReassembler {
    buffers: HashMap<u16, PidBuffer>,
    max_size: usize,
}

impl PidReassembler {
    /// Creates a reassembler that rejects any PID buffer exceeding
    /// `max_size` bytes with [`ErrorDetails::PESOverflow`].
    pub fn new(max_size: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            max_size,
        }
    }

    /// Feeds one TS packet's payload for `pid`. If `pusi` is set and the
    /// PID's buffer is non-empty, the buffered bytes are emitted as a
    /// completed [`PesUnit`] before the new payload is appended to a fresh
    /// buffer.
    pub fn feed(&mut self, pid: u16, pusi: bool, payload: &[u8]) -> Result<Option<PesUnit>> {
        let mut completed = None;
        if pusi {
            if let Some(buf) = self.buffers.remove(&pid) {
                if !buf.is_empty() {
                    completed = Some(PesUnit {
                        data: buf.data,
                        tp_count: buf.tp_count,
                    });
                }
            }
        }

        let buf = self.buffers.entry(pid).or_insert_with(PidBuffer::new);
        buf.data.extend_from_slice(payload);
        buf.tp_count += 1;
        if buf.data.len() >= self.max_size {
            return Err(Error::new(ErrorDetails::PESOverflow));
        }

        Ok(completed)
    }

    /// Drains every PID's residual buffer at end-of-stream, in
    /// unspecified order. Buffers that are empty are skipped.
    pub fn drain(&mut self) -> Vec<(u16, PesUnit)> {
        let mut out = Vec::new();
        for (pid, buf) in self.buffers.drain() {
            if !buf.is_empty() {
                out.push((
                    pid,
                    PesUnit {
                        data: buf.data,
                        tp_count: buf.tp_count,
                    },
                ));
            }
        }
        out
    }
}

impl Default for PidReassembler {
    fn default() -> Self {
        Self::new(32 << 10)
    }
}
