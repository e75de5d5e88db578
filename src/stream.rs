//! Lazy, bounded-memory TS packet producer.

use crate::error::{Error, ErrorDetails, Result};
use crate::m2ts::M2tsPrefix;
use crate::packet::TsPacket;
use crate::shape::PacketShape;
use std::convert::TryInto;
use std::io::Read;

const DETECTION_WINDOW: usize = 16 * 1024;
const CHUNK_SIZE: usize = 64 * 1024;

/// One on-disk record: the detected shape's header bytes, the inner
/// 188-byte TS packet, and the detected shape's trailer bytes.
///
/// Borrows from the [`PacketStream`] that produced it; dropped (or
/// re-fetched via another call to [`PacketStream::next_record`]) before the
/// next record is read.
#[derive(Debug)]
pub struct RawRecord<'a> {
    raw: &'a [u8],
    shape: PacketShape,
}

impl<'a> RawRecord<'a> {
    fn new(raw: &'a [u8], shape: PacketShape) -> Self {
        Self { raw, shape }
    }

    /// Bytes preceding the TS packet (the M2TS prefix, for that shape).
    pub fn header(&self) -> &'a [u8] {
        &self.raw[..self.shape.header_len]
    }

    /// Bytes following the TS packet (the FEC trailer, for 204-byte TS).
    pub fn trailer(&self) -> &'a [u8] {
        &self.raw[self.shape.header_len + 188..]
    }

    /// The inner 188 raw bytes of the TS packet.
    pub fn ts_bytes(&self) -> &'a [u8; 188] {
        self.raw[self.shape.header_len..self.shape.header_len + 188]
            .try_into()
            .unwrap()
    }

    /// Parses the inner TS packet.
    pub fn packet(&self) -> Result<TsPacket<'a>> {
        TsPacket::parse(self.ts_bytes())
    }

    /// The M2TS prefix, when this record's shape carries one.
    pub fn m2ts_prefix(&self) -> Option<M2tsPrefix> {
        if self.shape.header_len == 4 {
            Some(M2tsPrefix::new(self.header().try_into().unwrap()))
        } else {
            None
        }
    }
}

/// A lazy, finite, non-restartable sequence of fixed-size TS packet records
/// read from `R`.
///
/// Cannot implement [`Iterator`] because each yielded [`RawRecord`] borrows
/// this stream's internal rolling buffer; call [`PacketStream::next_record`]
/// in a `while let Some(record) = stream.next_record()?` loop instead.
pub struct PacketStream<R> {
    reader: R,
    shape: PacketShape,
    buf: Vec<u8>,
    current: Vec<u8>,
    eof: bool,
}

impl<R: Read> PacketStream<R> {
    /// Builds a stream from an already-detected shape and a reader
    /// positioned at `shape.first_packet_offset`.
    pub fn new(shape: PacketShape, reader: R) -> Self {
        Self {
            reader,
            shape,
            buf: Vec::with_capacity(CHUNK_SIZE),
            current: Vec::with_capacity(shape.total),
            eof: false,
        }
    }

    /// Detects the packet shape from the first 16 KiB of `reader` (any
    /// supported shape), then opens a stream over the rest.
    pub fn open(mut reader: R) -> Result<Self> {
        let prefix = read_up_to(&mut reader, DETECTION_WINDOW)?;
        let shape = PacketShape::detect(&prefix)?;
        Self::from_prefix(shape, reader, prefix)
    }

    /// Like [`PacketStream::open`] but requires plain 188-byte TS framing.
    pub fn open_transport_stream(mut reader: R) -> Result<Self> {
        let prefix = read_up_to(&mut reader, DETECTION_WINDOW)?;
        let shape = PacketShape::detect_transport_stream(&prefix)?;
        Self::from_prefix(shape, reader, prefix)
    }

    /// Like [`PacketStream::open`] but requires 192-byte M2TS framing.
    pub fn open_m2_transport_stream(mut reader: R) -> Result<Self> {
        let prefix = read_up_to(&mut reader, DETECTION_WINDOW)?;
        let shape = PacketShape::detect_m2_transport_stream(&prefix)?;
        Self::from_prefix(shape, reader, prefix)
    }

    fn from_prefix(shape: PacketShape, reader: R, prefix: Vec<u8>) -> Result<Self> {
        let mut stream = Self::new(shape, reader);
        stream.buf.extend_from_slice(&prefix[shape.first_packet_offset..]);
        Ok(stream)
    }

    fn fill(&mut self) -> Result<()> {
        while !self.eof && self.buf.len() < self.shape.total {
            let mut chunk = vec![0u8; CHUNK_SIZE];
            let n = self.reader.read(&mut chunk)?;
            if n == 0 {
                self.eof = true;
                break;
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }

    /// Produces the next record, or `None` at a clean, stride-aligned EOF.
    pub fn next_record(&mut self) -> Result<Option<RawRecord<'_>>> {
        self.fill()?;
        if self.buf.len() < self.shape.total {
            if self.buf.is_empty() {
                return Ok(None);
            }
            return Err(Error::new(ErrorDetails::TruncatedStream));
        }
        self.current.clear();
        self.current.extend_from_slice(&self.buf[..self.shape.total]);
        self.buf.drain(0..self.shape.total);
        Ok(Some(RawRecord::new(&self.current, self.shape)))
    }

    /// The detected (or supplied) packet shape.
    pub fn shape(&self) -> PacketShape {
        self.shape
    }
}

/// Reads up to `limit` bytes from `reader`, stopping early on EOF.
fn read_up_to<R: Read>(reader: &mut R, limit: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(limit);
    let mut chunk = vec![0u8; limit];
    while buf.len() < limit {
        let n = reader.read(&mut chunk[..limit - buf.len()])?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn synth_ts(n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n * 188];
        for i in 0..n {
            buf[i * 188] = 0x47;
            buf[i * 188 + 1] = 0x01;
        }
        buf
    }

    #[test]
    fn streams_all_packets_then_stops() {
        let data = synth_ts(10);
        let mut stream = PacketStream::open_transport_stream(Cursor::new(data)).unwrap();
        let mut count = 0;
        while let Some(record) = stream.next_record().unwrap() {
            assert_eq!(record.ts_bytes()[0], 0x47);
            count += 1;
        }
        assert_eq!(count, 10);
    }

    #[test]
    fn truncated_tail_is_an_error() {
        let mut data = synth_ts(5);
        data.truncate(data.len() - 10);
        let mut stream = PacketStream::open_transport_stream(Cursor::new(data)).unwrap();
        let mut seen = 0;
        loop {
            match stream.next_record() {
                Ok(Some(_)) => seen += 1,
                Ok(None) => panic!("expected truncation error"),
                Err(e) => {
                    assert!(matches!(e.details, ErrorDetails::TruncatedStream));
                    break;
                }
            }
        }
        assert_eq!(seen, 4);
    }
}
