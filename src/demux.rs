//! Top-level orchestrator: pulls TS packets from a [`PacketStream`], drives
//! a [`PidReassembler`] per PID, and routes completed PES packets to a
//! [`PafWriter`].

use crate::error::{Error, ErrorDetails, Result};
use crate::paf::PafWriter;
use crate::reassembler::PidReassembler;
use crate::stream::PacketStream;
use log::warn;
use std::io::Read;
use std::path::Path;

/// PIDs never handed to the reassembler: PAT, SIT, the conventional PMT
/// and PMP PIDs, and the null packet PID. Static and conventional, not
/// derived from the stream's own PAT/PMT.
pub const DEFAULT_EXCLUDED_PIDS: [u16; 5] = [0x0000, 0x001F, 0x0100, 0x1001, 0x1FFF];

/// Called once per TS packet, with no ordering or timing guarantees
/// beyond per-packet cadence. A no-op implementation is used when the
/// caller supplies none.
pub trait ProgressSink {
    /// Invoked once per TS packet pulled from the stream.
    fn update(&mut self) {}
}

/// A sink that does nothing; the default when no caller-supplied sink is
/// given.
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {}

impl<F: FnMut()> ProgressSink for F {
    fn update(&mut self) {
        self()
    }
}

/// Demux configuration.
#[derive(Debug, Clone)]
pub struct DemuxConfig {
    /// Per-PID reassembly buffer cap, in bytes.
    pub max_size: usize,
    /// Additional PIDs to exclude, beyond [`DEFAULT_EXCLUDED_PIDS`].
    pub excluded_pids: Vec<u16>,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            max_size: 32 << 10,
            excluded_pids: Vec::new(),
        }
    }
}

/// The top-level demultiplexer.
pub struct Demux {
    config: DemuxConfig,
    reassembler: PidReassembler,
}

impl Demux {
    /// Builds a demux with the given configuration.
    pub fn new(config: DemuxConfig) -> Self {
        let reassembler = PidReassembler::new(config.max_size);
        Self {
            config,
            reassembler,
        }
    }

    fn is_excluded(&self, pid: u16) -> bool {
        DEFAULT_EXCLUDED_PIDS.contains(&pid) || self.config.excluded_pids.contains(&pid)
    }

    /// Pulls every packet from `stream`, feeding non-excluded PIDs to the
    /// reassembler and writing completed PES packets via `writer` into
    /// `output_dir`. `progress` is polled once per TS packet.
    pub fn run<R: Read>(
        &mut self,
        stream: &mut PacketStream<R>,
        output_dir: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        let mut writer = PafWriter::new(output_dir);

        while let Some(record) = stream.next_record()? {
            let packet = record.packet()?;
            let pid = packet.pid();
            progress.update();

            if self.is_excluded(pid) {
                continue;
            }

            if !packet.adaptation_field_control().has_payload() {
                return Err(Error::new(ErrorDetails::NoPayload));
            }
            let payload = packet.payload().unwrap_or(&[]);

            if let Some(unit) = self
                .reassembler
                .feed(pid, packet.payload_unit_start_indicator(), payload)?
            {
                let pes = unit.parse()?;
                writer.add_packet(pid, &pes, unit.tp_count)?;
            }
        }

        for (pid, unit) in self.reassembler.drain() {
            match unit.parse() {
                Ok(pes) => writer.add_packet(pid, &pes, unit.tp_count)?,
                Err(e) => {
                    warn!("dropping unparseable residual PES on PID {:#06x}: {}", pid, e);
                }
            }
        }

        Ok(())
    }
}
