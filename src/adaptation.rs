//! Adaptation field decoding (PCR/OPCR, splicing, transport-private-data,
//! and the AF extension), including the cascading-offset parse that the
//! presence flags drive.

use crate::error::{ErrorDetails, Result};
use crate::slice_reader::{read_bitfield, SliceReader};
use modular_bitfield_msb::prelude::*;

/// Length byte plus the eight presence flags of an adaptation field.
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub(crate) struct AdaptationFieldFlagsBits {
    pub length: B8,
    pub discontinuity: bool,
    pub random_access: bool,
    pub priority: bool,
    pub has_pcr: bool,
    pub has_opcr: bool,
    pub has_splicing_point: bool,
    pub has_transport_private_data: bool,
    pub has_adaptation_field_extension: bool,
}

/// 33-bit base (90kHz) + 9-bit extension (27MHz) clock sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramClockReference {
    /// 33 bits of a 90kHz base clock.
    pub base: u64,
    /// 9 bits of a 27MHz clock rolling over every 300 counts to the base.
    pub extension: u16,
}

impl ProgramClockReference {
    fn parse(b: [u8; 6]) -> Self {
        let mut base: u64 = (b[0] as u64) << 25;
        base |= (b[1] as u64) << 17;
        base |= (b[2] as u64) << 9;
        base |= (b[3] as u64) << 1;
        base |= (b[4] as u64) >> 7;

        let mut extension: u16 = ((b[4] & 0x1) as u16) << 8;
        extension |= b[5] as u16;
        Self { base, extension }
    }

    /// Reconstructs the full 27MHz system clock sample.
    pub fn to_pcr(self) -> u64 {
        self.base * 300 + self.extension as u64
    }
}

/// Transport private data carried in an adaptation field.
#[derive(Debug, Clone, Copy)]
pub struct TransportPrivateData<'a> {
    payload: &'a [u8],
}

impl<'a> TransportPrivateData<'a> {
    /// The private payload bytes (excludes the length byte).
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }
}

/// Adaptation field extension. Only sized, not decoded: this crate has no
/// need for legal-time-window/piecewise-rate/seamless-splice semantics.
#[derive(Debug, Clone, Copy)]
pub struct AdaptationFieldExtension<'a> {
    raw: &'a [u8],
}

impl<'a> AdaptationFieldExtension<'a> {
    /// Raw bytes of the extension, including its own length byte.
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }
}

/// Non-payload packet metadata, decoded with its presence flags driving a
/// cascading byte offset through the optional fields in their canonical
/// wire order.
#[derive(Debug)]
pub struct AdaptationField<'a> {
    flags: AdaptationFieldFlagsBits,
    pcr: Option<ProgramClockReference>,
    opcr: Option<ProgramClockReference>,
    splice_countdown: Option<i8>,
    transport_private_data: Option<TransportPrivateData<'a>>,
    extension: Option<AdaptationFieldExtension<'a>>,
    stuffing: &'a [u8],
}

impl<'a> AdaptationField<'a> {
    pub(crate) fn parse(reader: &mut SliceReader<'a>) -> Result<Self> {
        let flags: AdaptationFieldFlagsBits = read_bitfield!(reader, AdaptationFieldFlagsBits);
        let length = flags.length() as usize;
        if !(1..=183).contains(&length) {
            return Err(reader.make_error(ErrorDetails::BadAdaptationField));
        }
        let mut body = reader.new_sub_reader(length - 1)?;

        let pcr = if flags.has_pcr() {
            if body.remaining_len() < 6 {
                return Err(body.make_error(ErrorDetails::BadAdaptationField));
            }
            Some(ProgramClockReference::parse(body.read_array::<6>()?))
        } else {
            None
        };

        let opcr = if flags.has_opcr() {
            if body.remaining_len() < 6 {
                return Err(body.make_error(ErrorDetails::BadAdaptationField));
            }
            Some(ProgramClockReference::parse(body.read_array::<6>()?))
        } else {
            None
        };

        let splice_countdown = if flags.has_splicing_point() {
            Some(body.read_u8()? as i8)
        } else {
            None
        };

        let transport_private_data = if flags.has_transport_private_data() {
            let len = body.peek_u8()? as usize;
            let block = body.read(1 + len)?;
            Some(TransportPrivateData {
                payload: &block[1..],
            })
        } else {
            None
        };

        let extension = if flags.has_adaptation_field_extension() {
            let ext_len = body.peek_u8()? as usize;
            let raw = body.read(1 + ext_len)?;
            Some(AdaptationFieldExtension { raw })
        } else {
            None
        };

        let stuffing = body.read_to_end()?;
        if stuffing.iter().any(|&b| b != 0xFF) {
            return Err(body.make_error(ErrorDetails::BadAdaptationField));
        }

        Ok(Self {
            flags,
            pcr,
            opcr,
            splice_countdown,
            transport_private_data,
            extension,
            stuffing,
        })
    }

    /// Discontinuity indicator.
    pub fn discontinuity(&self) -> bool {
        self.flags.discontinuity()
    }

    /// Random access indicator.
    pub fn random_access(&self) -> bool {
        self.flags.random_access()
    }

    /// Elementary stream priority indicator.
    pub fn priority(&self) -> bool {
        self.flags.priority()
    }

    /// Program Clock Reference, when present.
    pub fn program_clock_reference(&self) -> Option<ProgramClockReference> {
        self.pcr
    }

    /// Original Program Clock Reference, when present.
    pub fn original_program_clock_reference(&self) -> Option<ProgramClockReference> {
        self.opcr
    }

    /// Splice countdown, when the splicing point flag is set.
    pub fn splice_countdown(&self) -> Option<i8> {
        self.splice_countdown
    }

    /// Transport private data, when present.
    pub fn transport_private_data(&self) -> Option<TransportPrivateData<'a>> {
        self.transport_private_data
    }

    /// The AF extension, when present.
    pub fn adaptation_field_extension(&self) -> Option<AdaptationFieldExtension<'a>> {
        self.extension
    }

    /// Stuffing bytes filling the remainder of the declared length; always
    /// all `0xFF`.
    pub fn stuffing(&self) -> &'a [u8] {
        self.stuffing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn af_bytes(length: u8, flags_byte: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![length, flags_byte];
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn parses_pcr_only() {
        // flags byte: has_pcr (0x10)
        let pcr_bytes = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let body = af_bytes(7, 0x10, &pcr_bytes);
        let mut reader = SliceReader::new(&body);
        let af = AdaptationField::parse(&mut reader).unwrap();
        assert_eq!(af.program_clock_reference(), Some(ProgramClockReference { base: 0, extension: 0 }));
        assert!(af.original_program_clock_reference().is_none());
    }

    #[test]
    fn rejects_non_ff_stuffing() {
        let body = af_bytes(3, 0x00, &[0x00, 0x00]);
        let mut reader = SliceReader::new(&body);
        assert!(AdaptationField::parse(&mut reader).is_err());
    }

    #[test]
    fn accepts_ff_stuffing() {
        let body = af_bytes(3, 0x00, &[0xFF, 0xFF]);
        let mut reader = SliceReader::new(&body);
        let af = AdaptationField::parse(&mut reader).unwrap();
        assert_eq!(af.stuffing(), &[0xFF, 0xFF]);
    }
}
