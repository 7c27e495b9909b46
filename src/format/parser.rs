//! Low-level byte stream parser for module image decoding.
//!
//! This module provides the [`Parser`] type, a cursor-based binary reader for
//! the SWM container format. It offers bounds-checked access to binary data:
//! every read validates availability before touching the buffer, so truncated
//! or hostile images fail with [`crate::Error::OutOfBounds`] instead of
//! panicking.
//!
//! # Key Components
//!
//! - [`Parser`] - main cursor over a byte slice
//! - [`Parser::read_le`] - typed little-endian reads
//! - [`Parser::read_utf8`] - length-delimited UTF-8 strings
//! - [`Parser::seek`] / [`Parser::advance_by`] / [`Parser::pos`] - navigation
//!
//! # Examples
//!
//! ```rust
//! use sigweave::Parser;
//!
//! let data = [0x01, 0x02, 0x03, 0x04];
//! let mut parser = Parser::new(&data);
//!
//! let value = parser.read_le::<u16>()?;
//! assert_eq!(value, 0x0201);
//! assert_eq!(parser.pos(), 2);
//! # Ok::<(), sigweave::Error>(())
//! ```

use crate::Result;

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
    impl Sealed for i64 {}
}

/// Primitive types readable from an SWM image in little-endian byte order.
///
/// Sealed; implemented for `u8`, `u16`, `u32`, `u64` and `i64`.
pub trait SwmValue: sealed::Sealed + Sized {
    /// Width of the value in bytes.
    const WIDTH: usize;

    /// Decode the value from exactly [`Self::WIDTH`] bytes.
    fn from_le(data: &[u8]) -> Self;
}

macro_rules! swm_value {
    ($ty:ty) => {
        impl SwmValue for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            fn from_le(data: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(&data[..Self::WIDTH]);
                <$ty>::from_le_bytes(raw)
            }
        }
    };
}

swm_value!(u8);
swm_value!(u16);
swm_value!(u32);
swm_value!(u64);
swm_value!(i64);

/// A bounds-checked cursor over a byte slice.
///
/// `Parser` maintains a position within the data and validates every access,
/// preventing buffer overruns when reading malformed or truncated module
/// images.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`Parser`] over a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Move the current position to the specified index.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(crate::Error::OutOfBounds);
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by `step` would
    /// exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        if self.position + step > self.data.len() {
            return Err(crate::Error::OutOfBounds);
        }

        self.position += step;
        Ok(())
    }

    /// Read a little-endian primitive value and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than the value's width
    /// bytes remain.
    pub fn read_le<T: SwmValue>(&mut self) -> Result<T> {
        if self.position + T::WIDTH > self.data.len() {
            return Err(crate::Error::OutOfBounds);
        }

        let value = T::from_le(&self.data[self.position..]);
        self.position += T::WIDTH;
        Ok(value)
    }

    /// Read a 64-bit float stored as its IEEE-754 bit pattern.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 8 bytes remain.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_le::<u64>()?))
    }

    /// Read `len` raw bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.position + len > self.data.len() {
            return Err(crate::Error::OutOfBounds);
        }

        let bytes = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    /// Read a `u16`-length-prefixed UTF-8 string.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on truncation and
    /// [`crate::Error::Malformed`] if the bytes are not valid UTF-8.
    pub fn read_utf8(&mut self) -> Result<String> {
        let len = self.read_le::<u16>()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| malformed_error!("Invalid UTF-8 at offset {}", self.position - len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_primitives_little_endian() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_le::<u8>().unwrap(), 0x01);
        assert_eq!(parser.read_le::<u16>().unwrap(), 0x0302);
        assert_eq!(parser.read_le::<u32>().unwrap(), 0x07060504);
        assert!(parser.has_more_data());
        assert_eq!(parser.read_le::<u8>().unwrap(), 0x08);
        assert!(!parser.has_more_data());
    }

    #[test]
    fn bounds_checked() {
        let data = [0x01, 0x02];
        let mut parser = Parser::new(&data);
        assert!(matches!(
            parser.read_le::<u32>(),
            Err(crate::Error::OutOfBounds)
        ));
        assert!(parser.seek(3).is_err());
        assert!(parser.seek(2).is_ok());
        assert!(parser.advance_by(1).is_err());
    }

    #[test]
    fn utf8_strings() {
        let mut data = vec![0x05, 0x00];
        data.extend_from_slice(b"title");
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_utf8().unwrap(), "title");

        let bad = [0x02, 0x00, 0xFF, 0xFE];
        let mut parser = Parser::new(&bad);
        assert!(parser.read_utf8().is_err());
    }

    #[test]
    fn float_bit_pattern() {
        let data = 1.5f64.to_bits().to_le_bytes();
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_f64().unwrap(), 1.5);
    }
}
