//! Bounds-checked cursor used by every bitfield-backed parser in this crate.

use crate::error::{Error, ErrorDetails, Result};
use std::convert::TryInto;

/// A cursor over a borrowed byte slice that refuses to read past its end.
///
/// Unlike the [`std::io::Read`] implementation for `&[u8]`, this keeps track
/// of the location within the packet for more informative errors.
#[derive(Debug)]
pub(crate) struct SliceReader<'a> {
    slice: &'a [u8],
    location: usize,
}

impl<'a> SliceReader<'a> {
    /// Initializes a reader from any byte slice.
    pub fn new(slice: &'a [u8]) -> Self {
        Self { slice, location: 0 }
    }

    /// Creates a fixed `length` sub-reader at the current position, then
    /// advances this reader to the sub-reader's end position.
    ///
    /// The sub-reader semantic makes reading nested data of known lengths
    /// easier with correct bounds checking of the nested data.
    pub fn new_sub_reader(&mut self, length: usize) -> Result<Self> {
        let location = self.location;
        Ok(Self {
            slice: self.read(length)?,
            location,
        })
    }

    /// Creates an [`Error`] using the contained location.
    pub fn make_error(&self, details: ErrorDetails) -> Error {
        Error::at(self.location, details)
    }

    /// Number of bytes remaining in the slice reader.
    pub fn remaining_len(&self) -> usize {
        self.slice.len()
    }

    /// Advance the reader without extracting any data from the slice.
    pub fn skip(&mut self, length: usize) -> Result<()> {
        self.read(length)?;
        Ok(())
    }

    /// Extract a fixed `length` sub-slice from this reader and advance.
    pub fn read(&mut self, length: usize) -> Result<&'a [u8]> {
        if length > self.slice.len() {
            Err(self.make_error(ErrorDetails::TruncatedStream))
        } else {
            self.location += length;
            let (left, right) = self.slice.split_at(length);
            self.slice = right;
            Ok(left)
        }
    }

    /// Extract a sub-slice of all data remaining to be read.
    pub fn read_to_end(&mut self) -> Result<&'a [u8]> {
        self.read(self.slice.len())
    }

    /// Same as [`SliceReader::read`] but copies the result into an owned
    /// `[u8; N]` array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        Ok(self.read(N)?.try_into().unwrap())
    }

    /// Read one byte interpreted as [`u8`].
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read two bytes interpreted as big-endian [`u16`].
    pub fn read_be_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array::<2>()?))
    }

    /// Read three bytes interpreted as big-endian `u24`.
    pub fn read_be_u24(&mut self) -> Result<u32> {
        let bytes = self.read_array::<3>()?;
        Ok(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    /// Extract a fixed `length` sub-slice from this reader without advancing.
    pub fn peek(&self, length: usize) -> Result<&'a [u8]> {
        if length > self.slice.len() {
            Err(self.make_error(ErrorDetails::TruncatedStream))
        } else {
            Ok(&self.slice[0..length])
        }
    }

    /// Same as [`SliceReader::peek`] but copies the result into an owned
    /// `[u8; N]` array.
    pub fn peek_array<const N: usize>(&self) -> Result<[u8; N]> {
        Ok(self.peek(N)?.try_into().unwrap())
    }

    /// Peek a single byte without advancing.
    pub fn peek_u8(&self) -> Result<u8> {
        Ok(self.peek_array::<1>()?[0])
    }
}

/// Reads a `modular_bitfield_msb` type whose byte width matches `$type`'s
/// `size_of`, advancing the reader past it. Must be expanded in a function
/// that returns [`Result`].
macro_rules! read_bitfield {
    ($reader:expr, $type:ty) => {
        <$type>::from_bytes($reader.read_array::<{ core::mem::size_of::<$type>() }>()?)
    };
}
pub(crate) use read_bitfield;
