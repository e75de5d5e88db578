//! The Packet Attributes File (PAF) format: an append-only per-PID index
//! of completed PES packets recording transport packet count, byte
//! length, and presentation/decoding timestamps.

use crate::error::{Error, ErrorDetails, Result};
use crate::pes::PesPacket;
use crate::slice_reader::SliceReader;
use log::debug;
use std::collections::HashSet;
use std::convert::TryInto;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

const RECORD_MARKER: u8 = b'P';
const RECORD_LEN: usize = 15;

/// One decoded PAF record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketAttribute {
    /// Number of transport packets that carried the PES.
    pub tp_count: u16,
    /// Byte length of the PES packet as written.
    pub pck_size: u32,
    /// Presentation timestamp (33-bit, 90kHz clock).
    pub pts: u64,
    /// Decoding timestamp (33-bit, 90kHz clock).
    pub dts: u64,
}

/// Packs `(pts, dts)` into the 9-byte temporal block used by both the
/// writer and the reader.
fn encode_temporal(pts: u64, dts: u64) -> [u8; 9] {
    let mut out = [0u8; 9];
    let dts_msb = ((dts >> 1) & 0xFFFF_FFFF) as u32;
    out[0..4].copy_from_slice(&dts_msb.to_be_bytes());

    let pts_shifted = (pts << 6) & ((1u64 << 39) - 1);
    let pts_bytes = pts_shifted.to_be_bytes();
    out[4..9].copy_from_slice(&pts_bytes[3..8]);
    out[4] |= ((dts & 0x1) as u8) << 7;
    out
}

/// The exact inverse of [`encode_temporal`].
fn decode_temporal(bytes: [u8; 9]) -> (u64, u64) {
    let dts_msb = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
    let dts = ((dts_msb as u64) << 1) | (bytes[4] >> 7) as u64;

    let pts_hi = (bytes[4] & 0x7F) as u64;
    let pts_lo = u32::from_be_bytes(bytes[5..9].try_into().unwrap()) as u64;
    let pts = ((pts_hi << 32) | pts_lo) >> 6;

    (dts, pts)
}

/// Append-only per-PID `.paf` emitter.
pub struct PafWriter {
    dir: PathBuf,
    seen: HashSet<u16>,
}

impl PafWriter {
    /// Writes files under `dir`, which must already exist.
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            seen: HashSet::new(),
        }
    }

    fn path_for(&self, pid: u16) -> PathBuf {
        self.dir.join(format!("{:04X}.paf", pid))
    }

    /// Appends one record for a completed PES on `pid`, creating the
    /// file (and its header) on first use.
    pub fn add_packet(&mut self, pid: u16, pes: &PesPacket<'_>, tp_count: u16) -> Result<()> {
        let path = self.path_for(pid);
        if !self.seen.contains(&pid) {
            debug!("creating new PAF file for pid {:#06x}", pid);
            let mut f = File::create(&path)?;
            f.write_all(&pid.to_be_bytes())?;
            f.write_all(&[0u8])?;
            self.seen.insert(pid);
        }

        let pts = pes.pts().ok_or(ErrorDetails::ZeroTimestamps)?;
        let dts = pes.dts().unwrap_or(pts);
        if pts == 0 && dts == 0 {
            return Err(Error::new(ErrorDetails::ZeroTimestamps));
        }

        let mut record = [0u8; RECORD_LEN];
        record[0] = RECORD_MARKER;
        record[1..3].copy_from_slice(&tp_count.to_be_bytes());
        let len_bytes = (pes.len() as u32).to_be_bytes();
        record[3..6].copy_from_slice(&len_bytes[1..4]);
        record[6..15].copy_from_slice(&encode_temporal(pts, dts));

        let mut f = OpenOptions::new().append(true).open(&path)?;
        f.write_all(&record)?;
        Ok(())
    }
}

/// Lazy reader over a `.paf` file.
pub struct PafReader<R> {
    reader: R,
    pid: u16,
    meta: Vec<u8>,
}

impl PafReader<File> {
    /// Opens a `.paf` file by path.
    pub fn open(path: &Path) -> Result<Self> {
        Self::new(File::open(path)?)
    }
}

impl<R: Read> PafReader<R> {
    /// Parses the file header from `reader` and positions it at the first
    /// record.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut hdr = [0u8; 3];
        reader.read_exact(&mut hdr)?;
        let mut hdr_reader = SliceReader::new(&hdr);
        let pid = hdr_reader.read_be_u16()?;
        let meta_len = hdr_reader.read_u8()?;
        if !(pid > 0 && pid < 0x1FFF) {
            return Err(Error::new(ErrorDetails::BadPafHeader));
        }
        let mut meta = vec![0u8; meta_len as usize];
        reader.read_exact(&mut meta)?;
        Ok(Self { reader, pid, meta })
    }

    /// The PID this file indexes.
    pub fn pid(&self) -> u16 {
        self.pid
    }

    /// The header's metadata bytes, copied through unchanged and
    /// otherwise uninterpreted (always empty in this version).
    pub fn header_meta(&self) -> &[u8] {
        &self.meta
    }

    /// Reads the next record, or `None` at a clean end of file.
    pub fn next_record(&mut self) -> Result<Option<PacketAttribute>> {
        let mut buf = [0u8; RECORD_LEN];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let mut record = SliceReader::new(&buf);
        let marker = record.read_u8()?;
        if marker != RECORD_MARKER {
            return Err(Error::new(ErrorDetails::BadPafHeader));
        }
        let tp_count = record.read_be_u16()?;
        let pck_size = record.read_be_u24()?;
        let (dts, pts) = decode_temporal(record.read_array::<9>()?);
        Ok(Some(PacketAttribute {
            tp_count,
            pck_size,
            pts,
            dts,
        }))
    }
}
