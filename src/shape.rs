//! Autodetection of the packet framing used by a TS-family file: plain
//! 188-byte TS, 192-byte M2TS, 204-byte TS-with-trailer, or an arbitrary
//! fixed prefix/trailer stride.

use crate::error::{ErrorDetails, Result};
use std::collections::HashSet;

const SYNC_BYTE: u8 = 0x47;
const TS_PACKET_LEN: usize = 188;

/// Detected packet framing for a TS-family file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketShape {
    /// Bytes preceding each 188-byte TS packet (4 for M2TS, 0 otherwise).
    pub header_len: usize,
    /// Bytes following each 188-byte TS packet (16 for 204-byte TS, 0
    /// otherwise).
    pub trailer_len: usize,
    /// `188 + header_len + trailer_len`: the on-disk stride of one record.
    pub total: usize,
    /// Byte offset of the first complete record in the file.
    pub first_packet_offset: usize,
}

impl PacketShape {
    /// Detects the framing of `prefix`, which should be the first ≥16 KiB
    /// of the file (fewer bytes narrows the detection window and may cause
    /// spurious `CannotIdentify` failures).
    pub fn detect(prefix: &[u8]) -> Result<Self> {
        let syncs: Vec<usize> = prefix
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b == SYNC_BYTE)
            .map(|(i, _)| i)
            .collect();

        if syncs.len() < 4 {
            return Err(ErrorDetails::CannotIdentify.into());
        }

        let stride = median_adjacent_gap(&syncs);
        if stride < TS_PACKET_LEN {
            return Err(ErrorDetails::CannotIdentify.into());
        }

        let last = *syncs.last().unwrap();
        let sync_set: HashSet<usize> = syncs.iter().copied().collect();
        let covers = |s: usize| -> bool {
            let mut p = s;
            while p <= last {
                if !sync_set.contains(&p) {
                    return false;
                }
                p += stride;
            }
            true
        };

        let aligned = syncs
            .iter()
            .copied()
            .find(|&s| covers(s))
            .ok_or(ErrorDetails::CannotIdentify)?;

        // Classification per the known strides; anything else is an
        // arbitrary shape whose header/trailer split is carried through
        // from the chosen aligned sync position rather than fixed here.
        let (header_len, trailer_len) = match stride {
            TS_PACKET_LEN => (0, 0),
            192 => (4, 0),
            204 => (0, 16),
            s => {
                let header_len = aligned % s;
                let trailer_len = s - TS_PACKET_LEN - header_len;
                (header_len, trailer_len)
            }
        };

        let first_packet_offset = aligned
            .checked_sub(header_len)
            .ok_or(ErrorDetails::CannotIdentify)?;

        Ok(Self {
            header_len,
            trailer_len,
            total: TS_PACKET_LEN + header_len + trailer_len,
            first_packet_offset,
        })
    }

    /// Detects framing and additionally requires plain 188-byte TS.
    pub fn detect_transport_stream(prefix: &[u8]) -> Result<Self> {
        let shape = Self::detect(prefix)?;
        if shape.header_len == 0 && shape.trailer_len == 0 {
            Ok(shape)
        } else {
            Err(ErrorDetails::ShapeMismatch.into())
        }
    }

    /// Detects framing and additionally requires 192-byte M2TS.
    pub fn detect_m2_transport_stream(prefix: &[u8]) -> Result<Self> {
        let shape = Self::detect(prefix)?;
        if shape.header_len == 4 && shape.trailer_len == 0 {
            Ok(shape)
        } else {
            Err(ErrorDetails::ShapeMismatch.into())
        }
    }
}

/// Median of the gaps between adjacent (sorted) sync positions.
///
/// `np.median(np.abs(np.diff(syncs[:, None] - syncs)))` on a sorted
/// `syncs` array reduces to exactly this: `np.diff` along each row cancels
/// the `syncs[i]` term identically, leaving only adjacent differences.
fn median_adjacent_gap(sorted_positions: &[usize]) -> usize {
    let mut gaps: Vec<usize> = sorted_positions.windows(2).map(|w| w[1] - w[0]).collect();
    gaps.sort_unstable();
    let n = gaps.len();
    if n % 2 == 1 {
        gaps[n / 2]
    } else {
        (gaps[n / 2 - 1] + gaps[n / 2]) / 2
    }
}
