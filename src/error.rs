//! The crate's single error hierarchy.
//!
//! Every fallible operation in this crate returns [`Result<T>`], an alias
//! for [`std::result::Result<T, Error>`]. `Error` pairs a byte offset within
//! whatever structure was being parsed with an [`ErrorDetails`] kind.

use std::fmt;
use std::io;
use std::result;

/// Named failure kinds produced while identifying, streaming, reassembling,
/// or indexing a transport stream.
#[derive(Debug)]
pub enum ErrorDetails {
    /// Identification could not find a consistent packet stride in the
    /// first 16 KiB of the file.
    CannotIdentify,
    /// The caller asked for a specific stream shape (plain TS or M2TS) and
    /// the file uses a different one.
    ShapeMismatch,
    /// End of file was reached inside a TS packet.
    TruncatedStream,
    /// A packet carved at the expected stride does not begin with `0x47`.
    BadSyncByte,
    /// `adaptation_field_control == 0b00` (reserved).
    InvalidAFC,
    /// `pts_dts_flags == 0b01` (reserved).
    InvalidPTSDTSFlags,
    /// A PES packet does not begin with the `00 00 01` start code.
    BadPESStartCode,
    /// Per-PID buffered payload reached `max_size` before a PES boundary.
    PESOverflow,
    /// A completed PES has both PTS and DTS equal to zero.
    ZeroTimestamps,
    /// An underlying read or write failed.
    IOFailure(io::Error),
    /// Inconsistent adaptation field length, a short read of one of its
    /// optional blocks, or non-`0xFF` stuffing.
    BadAdaptationField,
    /// Bad PES optional-header marker bits, a short read of one of its
    /// optional fields, a malformed PES extension, or non-`0xFF` stuffing.
    BadPesOptionalHeader,
    /// A non-video PES whose buffer is shorter than `pes_packet_length + 6`.
    BadPesLength,
    /// A TS packet for a non-excluded PID whose `adaptation_field_control`
    /// does not grant a payload.
    NoPayload,
    /// A `.paf` file with an out-of-range PID header or a record missing
    /// the `'P'` marker.
    BadPafHeader,
}

/// An error produced while parsing or indexing a transport stream.
pub struct Error {
    /// Byte offset, within the structure being parsed, that the error was
    /// encountered at. `0` when not tied to a specific byte.
    pub location: usize,
    /// What went wrong.
    pub details: ErrorDetails,
}

impl Error {
    pub(crate) fn at(location: usize, details: ErrorDetails) -> Self {
        Self { location, details }
    }

    pub(crate) fn new(details: ErrorDetails) -> Self {
        Self::at(0, details)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("location", &self.location)
            .field("details", &self.details)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at offset {}", self.details, self.location)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::new(ErrorDetails::IOFailure(e))
    }
}

impl From<ErrorDetails> for Error {
    fn from(details: ErrorDetails) -> Self {
        Error::new(details)
    }
}

/// [`std::result::Result`] alias fixed to this crate's [`Error`].
pub type Result<T> = result::Result<T, Error>;
