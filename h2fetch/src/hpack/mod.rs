//! HPACK header compression, RFC 7541.
//!
//! The encoder never inserts into the dynamic table, so it keeps no state
//! besides the peer's limits. The decoder tracks the dynamic table the peer
//! builds and must see every header block of the connection in order.

pub mod decoder;
mod dynamic_table;
pub mod encoder;
mod huffman;
mod static_table;

pub use self::decoder::Decoder;
pub use self::encoder::Encoder;

/// Table size the decoder advertises and starts with.
pub const DEFAULT_HEADER_TABLE_SIZE: usize = 4096;

/// Reasons a header block cannot be decoded. All of them are connection
/// errors of type `COMPRESSION_ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecoderError {
    #[error("header block truncated")]
    Truncated,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid table index {0}")]
    InvalidIndex(usize),
    #[error("invalid Huffman code")]
    InvalidHuffmanCode,
    #[error("invalid Huffman padding")]
    InvalidHuffmanPadding,
    #[error("table size update to {0} exceeds the advertised limit")]
    InvalidMaxDynamicSize(usize),
    #[error("table size update after the first header field")]
    SizeUpdateNotAtStart,
}

/// Prefixed integer, section 5.1. `pattern` holds the bits above the prefix.
pub(crate) fn encode_integer(value: usize, prefix_bits: u8, pattern: u8, out: &mut Vec<u8>) {
    let max = (1usize << prefix_bits) - 1;
    if value < max {
        out.push(pattern | value as u8);
        return;
    }
    out.push(pattern | max as u8);
    let mut rest = value - max;
    while rest >= 0x80 {
        out.push(0x80 | (rest & 0x7f) as u8);
        rest >>= 7;
    }
    out.push(rest as u8);
}

/// Returns the value and the number of octets consumed.
pub(crate) fn decode_integer(buf: &[u8], prefix_bits: u8) -> Result<(usize, usize), DecoderError> {
    let first = *buf.first().ok_or(DecoderError::Truncated)?;
    let max = (1usize << prefix_bits) - 1;
    let mut value = first as usize & max;
    if value < max {
        return Ok((value, 1));
    }

    let mut shift = 0u32;
    for (i, &b) in buf[1..].iter().enumerate() {
        if shift > 28 {
            return Err(DecoderError::IntegerOverflow);
        }
        value = value
            .checked_add(((b & 0x7f) as usize) << shift)
            .ok_or(DecoderError::IntegerOverflow)?;
        shift += 7;
        if b & 0x80 == 0 {
            return Ok((value, i + 2));
        }
    }
    Err(DecoderError::Truncated)
}

/// String literal, section 5.2. Huffman is used when it is shorter.
pub(crate) fn encode_string(data: &[u8], out: &mut Vec<u8>) {
    let huffman_len = huffman::encoded_len(data);
    if huffman_len < data.len() {
        encode_integer(huffman_len, 7, 0x80, out);
        huffman::encode(data, out);
    } else {
        encode_integer(data.len(), 7, 0, out);
        out.extend_from_slice(data);
    }
}

/// Returns the string and the number of octets consumed.
pub(crate) fn decode_string(buf: &[u8]) -> Result<(Vec<u8>, usize), DecoderError> {
    let first = *buf.first().ok_or(DecoderError::Truncated)?;
    let (len, consumed) = decode_integer(buf, 7)?;
    let end = consumed.checked_add(len).ok_or(DecoderError::IntegerOverflow)?;
    let raw = buf.get(consumed..end).ok_or(DecoderError::Truncated)?;
    let value = if first & 0x80 != 0 {
        huffman::decode(raw)?
    } else {
        raw.to_vec()
    };
    Ok((value, end))
}
