//! Link-layer (188-byte) MPEG-TS packet decoding.

use crate::adaptation::AdaptationField;
use crate::error::{ErrorDetails, Result};
use crate::slice_reader::{read_bitfield, SliceReader};
use modular_bitfield_msb::prelude::*;

/// Transport scrambling state of a packet's payload.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[bits = 2]
pub enum TransportScramblingControl {
    /// Not scrambled.
    NotScrambled,
    /// Reserved; not used by any known broadcaster.
    Reserved,
    /// Scrambled with the even key.
    ScrambledEvenKey,
    /// Scrambled with the odd key.
    ScrambledOddKey,
}

/// Adaptation field control, refined at construction: the reserved `0b00`
/// pattern cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptationFieldControl {
    /// `0b01`: payload only.
    PayloadOnly,
    /// `0b10`: adaptation field only, no payload.
    AdaptationOnly,
    /// `0b11`: adaptation field followed by payload.
    Both,
}

impl AdaptationFieldControl {
    fn from_bits(bits: u8) -> std::result::Result<Self, ()> {
        match bits {
            0b01 => Ok(Self::PayloadOnly),
            0b10 => Ok(Self::AdaptationOnly),
            0b11 => Ok(Self::Both),
            _ => Err(()),
        }
    }

    /// Whether this packet carries an adaptation field.
    pub fn has_adaptation_field(self) -> bool {
        matches!(self, Self::AdaptationOnly | Self::Both)
    }

    /// Whether this packet carries a payload.
    pub fn has_payload(self) -> bool {
        matches!(self, Self::PayloadOnly | Self::Both)
    }
}

/// Link-layer header found at the start of every 188-byte MPEG-TS packet.
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub(crate) struct PacketHeaderBits {
    pub sync_byte: B8,
    pub transport_error_indicator: bool,
    pub payload_unit_start_indicator: bool,
    pub transport_priority: bool,
    pub pid: B13,
    pub transport_scrambling_control: TransportScramblingControl,
    pub adaptation_field_control: B2,
    pub continuity_counter: B4,
}

/// A fully decoded view over one 188-byte MPEG-TS packet.
///
/// Borrows its backing bytes; none of its accessors allocate.
#[derive(Debug)]
pub struct TsPacket<'a> {
    header: PacketHeaderBits,
    afc: AdaptationFieldControl,
    adaptation_field: Option<AdaptationField<'a>>,
    payload: Option<&'a [u8]>,
}

impl<'a> TsPacket<'a> {
    /// Parses exactly 188 bytes, starting at a sync byte, into a [`TsPacket`].
    pub fn parse(data: &'a [u8; 188]) -> Result<Self> {
        let mut reader = SliceReader::new(data);
        let header: PacketHeaderBits = read_bitfield!(reader, PacketHeaderBits);
        if header.sync_byte() != 0x47 {
            return Err(reader.make_error(ErrorDetails::BadSyncByte));
        }
        let afc = AdaptationFieldControl::from_bits(header.adaptation_field_control())
            .map_err(|_| reader.make_error(ErrorDetails::InvalidAFC))?;

        let adaptation_field = if afc.has_adaptation_field() {
            Some(AdaptationField::parse(&mut reader)?)
        } else {
            None
        };

        let payload = if afc.has_payload() {
            Some(reader.read_to_end()?)
        } else {
            None
        };

        Ok(Self {
            header,
            afc,
            adaptation_field,
            payload,
        })
    }

    /// Always `0x47` for a successfully parsed packet.
    pub fn sync_byte(&self) -> u8 {
        self.header.sync_byte()
    }

    /// Set by the upstream demodulator when an uncorrectable error is
    /// present in this packet.
    pub fn transport_error_indicator(&self) -> bool {
        self.header.transport_error_indicator()
    }

    /// Payload Unit Start Indicator: set on the first TS packet of a PES or
    /// PSI section.
    pub fn payload_unit_start_indicator(&self) -> bool {
        self.header.payload_unit_start_indicator()
    }

    /// Higher-priority indication relative to other packets on the same
    /// PID.
    pub fn transport_priority(&self) -> bool {
        self.header.transport_priority()
    }

    /// 13-bit Packet Identifier.
    pub fn pid(&self) -> u16 {
        self.header.pid()
    }

    /// Scrambling state of the payload.
    pub fn transport_scrambling_control(&self) -> TransportScramblingControl {
        self.header.transport_scrambling_control()
    }

    /// Never the reserved `0b00` pattern; rejected during [`TsPacket::parse`].
    pub fn adaptation_field_control(&self) -> AdaptationFieldControl {
        self.afc
    }

    /// 4-bit counter incrementing on each TS packet carrying a payload for
    /// this PID, used upstream to detect loss/duplication.
    pub fn continuity_counter(&self) -> u8 {
        self.header.continuity_counter()
    }

    /// Present iff `adaptation_field_control` grants an adaptation field.
    pub fn adaptation_field(&self) -> Option<&AdaptationField<'a>> {
        self.adaptation_field.as_ref()
    }

    /// Present iff `adaptation_field_control` grants a payload.
    pub fn payload(&self) -> Option<&'a [u8]> {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_with_afc(afc: u8, pusi: bool) -> [u8; 188] {
        let mut data = [0u8; 188];
        data[0] = 0x47;
        data[1] = if pusi { 0x40 } else { 0x00 };
        data[2] = 0x20;
        data[3] = (afc << 4) | 0x0;
        data
    }

    #[test]
    fn rejects_bad_sync_byte() {
        let mut data = packet_with_afc(0b01, false);
        data[0] = 0x00;
        assert!(TsPacket::parse(&data).is_err());
    }

    #[test]
    fn rejects_reserved_afc() {
        let data = packet_with_afc(0b00, false);
        match TsPacket::parse(&data) {
            Err(e) => assert!(matches!(e.details, ErrorDetails::InvalidAFC)),
            Ok(_) => panic!("expected InvalidAFC"),
        }
    }

    #[test]
    fn payload_only_packet_has_no_adaptation_field() {
        let data = packet_with_afc(0b01, true);
        let packet = TsPacket::parse(&data).unwrap();
        assert!(packet.payload_unit_start_indicator());
        assert_eq!(packet.pid(), 0x0020);
        assert!(packet.adaptation_field().is_none());
        assert_eq!(packet.payload().unwrap().len(), 184);
    }
}
