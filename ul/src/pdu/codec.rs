//! Byte level primitives shared by all PDU items.
//!
//! Reading works on a borrowed byte slice with explicit offsets,
//! so that no cursor state leaks from one item into another.
//! Every read is bounds-checked against the actual buffer
//! and fails with a [`Error::Truncated`] error
//! instead of wrapping around or silently truncating.
//!
//! Writing appends to a `Vec<u8>`.
//! Items are written through [`write_item`],
//! which computes the 16-bit item length from the bytes
//! produced by the given closure.
use std::convert::TryFrom;

use byteordered::byteorder::{BigEndian, ByteOrder};
use dicom_encoding::text::{DecodeTextError, EncodeTextError, TextCodec, Utf8CharacterSetCodec};
use snafu::{Backtrace, OptionExt, ResultExt, Snafu};

/// The error type for malformed PDU content.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    #[snafu(display(
        "Could not read `{}`: needed {} bytes at offset {}, but buffer has {}",
        field,
        needed,
        offset,
        available
    ))]
    Truncated {
        field: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Unexpected item type {:#04x}, expected {}", item_type, expected))]
    UnexpectedItemType {
        item_type: u8,
        expected: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Invalid length {} for sub-item {:#04x}", length, item_type))]
    InvalidSubItemLength {
        item_type: u8,
        length: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not decode text field `{}`", field))]
    DecodeText {
        field: &'static str,
        source: DecodeTextError,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type for PDU item encoding.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum EncodeError {
    #[snafu(display("Could not encode text field `{}`", field))]
    EncodeText {
        field: &'static str,
        source: EncodeTextError,
    },

    #[snafu(display("{} is too long to be encoded ({} bytes)", name, length))]
    ItemTooLong {
        name: &'static str,
        length: usize,
        backtrace: Backtrace,
    },
}

pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

/// The header common to every item and sub-item:
/// item type, one reserved byte and a 2-byte item length.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ItemHeader {
    pub item_type: u8,
    pub length: u16,
}

/// The size of an item header in bytes.
pub const ITEM_HEADER_SIZE: usize = 4;

impl ItemHeader {
    /// Read an item header at the given offset.
    pub fn read(bytes: &[u8], offset: usize) -> Result<Self> {
        let item_type = read_u8(bytes, offset, "Item-type")?;
        let length = read_u16(bytes, offset + 2, "Item-length")?;
        Ok(ItemHeader { item_type, length })
    }

    /// The full size of the item, header included.
    pub fn item_size(&self) -> usize {
        ITEM_HEADER_SIZE + usize::from(self.length)
    }
}

/// Borrow `len` bytes starting at `offset`.
pub fn slice<'a>(bytes: &'a [u8], offset: usize, len: usize, field: &'static str) -> Result<&'a [u8]> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .context(TruncatedSnafu {
            field,
            offset,
            needed: len,
            available: bytes.len(),
        })
}

pub fn read_u8(bytes: &[u8], offset: usize, field: &'static str) -> Result<u8> {
    slice(bytes, offset, 1, field).map(|b| b[0])
}

pub fn read_i8(bytes: &[u8], offset: usize, field: &'static str) -> Result<i8> {
    read_u8(bytes, offset, field).map(|b| b as i8)
}

pub fn read_u16_with<E: ByteOrder>(bytes: &[u8], offset: usize, field: &'static str) -> Result<u16> {
    slice(bytes, offset, 2, field).map(E::read_u16)
}

pub fn read_i16_with<E: ByteOrder>(bytes: &[u8], offset: usize, field: &'static str) -> Result<i16> {
    slice(bytes, offset, 2, field).map(E::read_i16)
}

pub fn read_u32_with<E: ByteOrder>(bytes: &[u8], offset: usize, field: &'static str) -> Result<u32> {
    slice(bytes, offset, 4, field).map(E::read_u32)
}

pub fn read_i32_with<E: ByteOrder>(bytes: &[u8], offset: usize, field: &'static str) -> Result<i32> {
    slice(bytes, offset, 4, field).map(E::read_i32)
}

/// Read a big endian 16-bit unsigned integer.
pub fn read_u16(bytes: &[u8], offset: usize, field: &'static str) -> Result<u16> {
    read_u16_with::<BigEndian>(bytes, offset, field)
}

/// Read a big endian 32-bit unsigned integer.
pub fn read_u32(bytes: &[u8], offset: usize, field: &'static str) -> Result<u32> {
    read_u32_with::<BigEndian>(bytes, offset, field)
}

/// Read `len` bytes at `offset` as UTF-8 text.
pub fn read_text(bytes: &[u8], offset: usize, len: usize, field: &'static str) -> Result<String> {
    let data = slice(bytes, offset, len, field)?;
    Utf8CharacterSetCodec
        .decode(data)
        .context(DecodeTextSnafu { field })
}

/// Read a length-prefixed text field:
/// a big endian u16 length at `offset`, followed by the text itself.
///
/// Returns the text and the offset right after it.
pub fn read_prefixed_text(bytes: &[u8], offset: usize, field: &'static str) -> Result<(String, usize)> {
    let len = usize::from(read_u16(bytes, offset, field)?);
    let text = read_text(bytes, offset + 2, len, field)?;
    Ok((text, offset + 2 + len))
}

/// Remove padding from a UID or title read from the wire.
///
/// Leading and trailing whitespace is not significant,
/// and UIDs of odd length are often padded with a trailing null character.
pub fn trim_text(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || c == '\0')
}

pub fn write_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub fn write_u16_with<E: ByteOrder>(out: &mut Vec<u8>, value: u16) {
    let mut buf = [0; 2];
    E::write_u16(&mut buf, value);
    out.extend_from_slice(&buf);
}

pub fn write_i16_with<E: ByteOrder>(out: &mut Vec<u8>, value: i16) {
    let mut buf = [0; 2];
    E::write_i16(&mut buf, value);
    out.extend_from_slice(&buf);
}

pub fn write_u32_with<E: ByteOrder>(out: &mut Vec<u8>, value: u32) {
    let mut buf = [0; 4];
    E::write_u32(&mut buf, value);
    out.extend_from_slice(&buf);
}

pub fn write_i32_with<E: ByteOrder>(out: &mut Vec<u8>, value: i32) {
    let mut buf = [0; 4];
    E::write_i32(&mut buf, value);
    out.extend_from_slice(&buf);
}

pub fn write_u16(out: &mut Vec<u8>, value: u16) {
    write_u16_with::<BigEndian>(out, value)
}

pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    write_u32_with::<BigEndian>(out, value)
}

/// Encode the given text as UTF-8 and append it.
pub fn write_text(out: &mut Vec<u8>, text: &str, field: &'static str) -> EncodeResult<()> {
    let data = Utf8CharacterSetCodec
        .encode(text)
        .context(EncodeTextSnafu { field })?;
    out.extend_from_slice(&data);
    Ok(())
}

/// Write a text field preceded by its length as a big endian u16.
pub fn write_prefixed_text(out: &mut Vec<u8>, text: &str, field: &'static str) -> EncodeResult<()> {
    let mut data = Vec::with_capacity(text.len());
    write_text(&mut data, text, field)?;
    let length = u16_length(field, data.len())?;
    write_u16(out, length);
    out.extend_from_slice(&data);
    Ok(())
}

/// Write an item (or sub-item) of the given type.
///
/// The closure writes the item's payload,
/// and the 2-byte item length is derived from it.
pub fn write_item<F>(out: &mut Vec<u8>, item_type: u8, name: &'static str, func: F) -> EncodeResult<()>
where
    F: FnOnce(&mut Vec<u8>) -> EncodeResult<()>,
{
    let mut data = Vec::new();
    func(&mut data)?;
    let length = u16_length(name, data.len())?;

    write_u8(out, item_type);
    // reserved
    write_u8(out, 0x00);
    write_u16(out, length);
    out.extend_from_slice(&data);
    Ok(())
}

/// Write a PDU of the given type.
///
/// Unlike items, PDUs carry a 4-byte length
/// after the PDU type and reserved byte.
pub fn write_pdu_chunk<F>(out: &mut Vec<u8>, pdu_type: u8, name: &'static str, func: F) -> EncodeResult<()>
where
    F: FnOnce(&mut Vec<u8>) -> EncodeResult<()>,
{
    let mut data = Vec::new();
    func(&mut data)?;
    let length = u32::try_from(data.len())
        .ok()
        .context(ItemTooLongSnafu {
            name,
            length: data.len(),
        })?;

    write_u8(out, pdu_type);
    // reserved
    write_u8(out, 0x00);
    write_u32(out, length);
    out.extend_from_slice(&data);
    Ok(())
}

fn u16_length(name: &'static str, length: usize) -> EncodeResult<u16> {
    u16::try_from(length)
        .ok()
        .context(ItemTooLongSnafu { name, length })
}
