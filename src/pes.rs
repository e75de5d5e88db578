//! PES (Packetized Elementary Stream) header decoding.

use crate::error::{Error, ErrorDetails, Result};
use crate::slice_reader::{read_bitfield, SliceReader};
use modular_bitfield_msb::prelude::*;

/// Stream IDs that carry no PES packet header past byte 6 (ISO/IEC
/// 13818-1 Table 2-21: program_stream_map, padding_stream,
/// private_stream_2, ECM, EMM, program_stream_directory, DSMCC_stream,
/// ITU-T Rec. H.222.1 type E streams).
const NO_OPTIONAL_HEADER_STREAM_IDS: [u8; 8] =
    [0xBC, 0xBE, 0xBF, 0xF0, 0xF1, 0xF2, 0xF8, 0xFF];

/// `00 00 01 stream_id pes_len_hi pes_len_lo`.
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub(crate) struct PesHeaderBits {
    pub start_code: B24,
    pub stream_id: B8,
    pub packet_length: B16,
}

/// Bytes 6..9 of a PES packet carrying a standard optional header.
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub(crate) struct PesOptionalHeaderBits {
    pub marker_bits: B2,
    pub pes_scrambling_control: B2,
    pub pes_priority: bool,
    pub data_alignment_indicator: bool,
    pub copyright: bool,
    pub original_or_copy: bool,
    pub pts_dts_flags: B2,
    pub escr_flag: bool,
    pub es_rate_flag: bool,
    pub dsm_trick_mode_flag: bool,
    pub additional_copy_info_flag: bool,
    pub pes_crc_flag: bool,
    pub pes_extension_flag: bool,
    pub pes_header_data_length: B8,
}

/// `pts_dts_flags`, refined at construction: the reserved `0b01` pattern
/// cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtsDtsFlags {
    /// `0b00`: neither timestamp present.
    Neither,
    /// `0b10`: PTS only.
    PtsOnly,
    /// `0b11`: PTS and DTS both present.
    Both,
}

impl PtsDtsFlags {
    fn from_bits(bits: u8) -> std::result::Result<Self, ()> {
        match bits {
            0b00 => Ok(Self::Neither),
            0b10 => Ok(Self::PtsOnly),
            0b11 => Ok(Self::Both),
            _ => Err(()),
        }
    }

    fn has_pts(self) -> bool {
        matches!(self, Self::PtsOnly | Self::Both)
    }

    fn has_dts(self) -> bool {
        matches!(self, Self::Both)
    }
}

fn parse_timestamp(b: [u8; 5]) -> u64 {
    let mut ts: u64 = ((b[0] & 0x0E) as u64) << 29;
    ts |= (b[1] as u64) << 22;
    ts |= ((b[2] & 0xFE) as u64) << 14;
    ts |= (b[3] as u64) << 7;
    ts |= ((b[4] & 0xFE) as u64) >> 1;
    ts
}

/// Computes the length (in bytes, including its own flags byte) of a PES
/// extension field and returns its raw bytes without advancing past the
/// stuffing that may follow.
fn parse_pes_extension<'a>(reader: &mut SliceReader<'a>) -> Result<&'a [u8]> {
    let flags = reader.peek(1)?[0];
    let mut length = 1usize;
    if flags & 0x80 != 0 {
        length += 16;
    }
    if flags & 0x40 != 0 {
        let byte = reader.peek(length + 1)?[length];
        length += byte as usize + 1;
    }
    if flags & 0x20 != 0 {
        length += 2;
    }
    if flags & 0x10 != 0 {
        length += 2;
    }
    if flags & 0x01 != 0 {
        let marker = reader.peek(length + 1)?[length];
        if marker & 0x80 == 0 {
            return Err(reader.make_error(ErrorDetails::BadPesOptionalHeader));
        }
        length += (marker & 0x7F) as usize;
    }
    reader.read(length)
}

/// A fully decoded view over one PES packet.
#[derive(Debug)]
pub struct PesPacket<'a> {
    header: PesHeaderBits,
    optional_header: Option<PesOptionalHeaderBits>,
    pts: Option<u64>,
    dts: Option<u64>,
    packet_data: &'a [u8],
}

impl<'a> PesPacket<'a> {
    /// Parses `data` as a PES packet. For non-video stream IDs, `data` is
    /// logically truncated to `pes_packet_length + 6`; for video stream
    /// IDs a zero length is accepted as "unbounded" and `data` is used as
    /// given.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < 6 {
            return Err(Error::new(ErrorDetails::TruncatedStream));
        }
        let mut probe = SliceReader::new(data);
        let header: PesHeaderBits = read_bitfield!(probe, PesHeaderBits);
        if header.start_code() != 1 {
            return Err(probe.make_error(ErrorDetails::BadPESStartCode));
        }

        let stream_id = header.stream_id();
        let is_video = (stream_id & 0xF0) == 0xE0;
        let data: &'a [u8] = if is_video {
            data
        } else {
            let needed = header.packet_length() as usize + 6;
            if data.len() < needed {
                return Err(Error::new(ErrorDetails::BadPesLength));
            }
            &data[..needed]
        };

        if NO_OPTIONAL_HEADER_STREAM_IDS.contains(&stream_id) {
            return Ok(Self {
                header,
                optional_header: None,
                pts: None,
                dts: None,
                packet_data: &data[6..],
            });
        }

        let mut reader = SliceReader::new(data);
        reader.skip(6)?;
        let optional: PesOptionalHeaderBits = read_bitfield!(reader, PesOptionalHeaderBits);
        if optional.marker_bits() != 0b10 {
            return Err(reader.make_error(ErrorDetails::BadPesOptionalHeader));
        }
        let pts_dts_flags = PtsDtsFlags::from_bits(optional.pts_dts_flags())
            .map_err(|_| reader.make_error(ErrorDetails::InvalidPTSDTSFlags))?;

        let mut body = reader.new_sub_reader(optional.pes_header_data_length() as usize)?;

        let pts = if pts_dts_flags.has_pts() {
            if body.remaining_len() < 5 {
                return Err(body.make_error(ErrorDetails::BadPesOptionalHeader));
            }
            Some(parse_timestamp(body.read_array::<5>()?))
        } else {
            None
        };

        let dts = if pts_dts_flags.has_dts() {
            if body.remaining_len() < 5 {
                return Err(body.make_error(ErrorDetails::BadPesOptionalHeader));
            }
            Some(parse_timestamp(body.read_array::<5>()?))
        } else {
            None
        };

        if optional.escr_flag() {
            if body.remaining_len() < 6 {
                return Err(body.make_error(ErrorDetails::BadPesOptionalHeader));
            }
            body.skip(6)?;
        }
        if optional.es_rate_flag() {
            if body.remaining_len() < 3 {
                return Err(body.make_error(ErrorDetails::BadPesOptionalHeader));
            }
            body.skip(3)?;
        }
        if optional.dsm_trick_mode_flag() {
            body.skip(1)?;
        }
        if optional.additional_copy_info_flag() {
            body.skip(1)?;
        }
        if optional.pes_crc_flag() {
            if body.remaining_len() < 2 {
                return Err(body.make_error(ErrorDetails::BadPesOptionalHeader));
            }
            body.skip(2)?;
        }
        if optional.pes_extension_flag() {
            parse_pes_extension(&mut body)?;
        }

        let stuffing = body.read_to_end()?;
        if stuffing.iter().any(|&b| b != 0xFF) {
            return Err(body.make_error(ErrorDetails::BadPesOptionalHeader));
        }

        Ok(Self {
            header,
            optional_header: Some(optional),
            pts,
            dts,
            packet_data: reader.read_to_end()?,
        })
    }

    /// `stream_id`, identifying the kind of elementary stream.
    pub fn stream_id(&self) -> u8 {
        self.header.stream_id()
    }

    /// The declared `pes_packet_length` field (may be `0` for video).
    pub fn pes_packet_length(&self) -> u16 {
        self.header.packet_length()
    }

    /// Presentation timestamp, if present.
    pub fn pts(&self) -> Option<u64> {
        self.pts
    }

    /// Decoding timestamp, if present.
    pub fn dts(&self) -> Option<u64> {
        self.dts
    }

    /// Byte length of this PES packet as parsed (post-truncation for
    /// non-video streams).
    pub fn len(&self) -> usize {
        6 + self.packet_data.len()
            + self
                .optional_header
                .map(|h| 3 + h.pes_header_data_length() as usize)
                .unwrap_or(0)
    }

    /// Whether this stream ID carries no PES optional header at all.
    pub fn has_optional_header(&self) -> bool {
        self.optional_header.is_some()
    }

    /// Elementary stream payload following the (possibly absent) optional
    /// header and its stuffing.
    pub fn packet_data(&self) -> &'a [u8] {
        self.packet_data
    }
}
