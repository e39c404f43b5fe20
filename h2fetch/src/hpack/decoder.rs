use bytes::Bytes;

use crate::hpack::decode_integer;
use crate::hpack::decode_string;
use crate::hpack::dynamic_table::DynamicTable;
use crate::hpack::static_table::STATIC_TABLE;
use crate::hpack::DecoderError;
use crate::hpack::DEFAULT_HEADER_TABLE_SIZE;
use crate::solicit::header::Header;
use crate::solicit::header::Headers;

/// Header block decoder.
#[derive(Debug)]
pub struct Decoder {
    table: DynamicTable,
    /// Limit advertised in our `SETTINGS_HEADER_TABLE_SIZE`.
    max_allowed_size: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new()
    }
}

enum Representation {
    Indexed,
    IncrementalIndexing,
    WithoutIndexing,
    NeverIndexed,
    SizeUpdate,
}

impl Representation {
    fn of(first: u8) -> Representation {
        if first & 0x80 != 0 {
            Representation::Indexed
        } else if first & 0x40 != 0 {
            Representation::IncrementalIndexing
        } else if first & 0x20 != 0 {
            Representation::SizeUpdate
        } else if first & 0x10 != 0 {
            Representation::NeverIndexed
        } else {
            Representation::WithoutIndexing
        }
    }
}

impl Decoder {
    pub fn new() -> Decoder {
        Decoder::with_max_size(DEFAULT_HEADER_TABLE_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Decoder {
        Decoder {
            table: DynamicTable::new(max_size),
            max_allowed_size: max_size,
        }
    }

    /// Decode one complete header block.
    pub fn decode(&mut self, block: &[u8]) -> Result<Headers, DecoderError> {
        let mut headers = Headers::new();
        let mut pos = 0;

        while pos < block.len() {
            let buf = &block[pos..];
            match Representation::of(buf[0]) {
                Representation::Indexed => {
                    let (index, consumed) = decode_integer(buf, 7)?;
                    headers.add_header(self.get_indexed(index)?);
                    pos += consumed;
                }
                Representation::SizeUpdate => {
                    if !headers.is_empty() {
                        return Err(DecoderError::SizeUpdateNotAtStart);
                    }
                    let (size, consumed) = decode_integer(buf, 5)?;
                    if size > self.max_allowed_size {
                        return Err(DecoderError::InvalidMaxDynamicSize(size));
                    }
                    self.table.set_max_size(size);
                    pos += consumed;
                }
                Representation::IncrementalIndexing => {
                    let (header, consumed) = self.decode_literal(buf, 6)?;
                    self.table.insert(header.clone());
                    headers.add_header(header);
                    pos += consumed;
                }
                Representation::WithoutIndexing | Representation::NeverIndexed => {
                    let (header, consumed) = self.decode_literal(buf, 4)?;
                    headers.add_header(header);
                    pos += consumed;
                }
            }
        }

        Ok(headers)
    }

    fn decode_literal(&self, buf: &[u8], prefix_bits: u8) -> Result<(Header, usize), DecoderError> {
        let (name_index, mut pos) = decode_integer(buf, prefix_bits)?;
        let name = if name_index == 0 {
            let (name, consumed) = decode_string(&buf[pos..])?;
            pos += consumed;
            Bytes::from(name)
        } else {
            self.get_indexed(name_index)?.name
        };
        let (value, consumed) = decode_string(&buf[pos..])?;
        pos += consumed;
        Ok((Header::new(name, value), pos))
    }

    fn get_indexed(&self, index: usize) -> Result<Header, DecoderError> {
        if index == 0 {
            return Err(DecoderError::InvalidIndex(index));
        }
        if let Some(&(name, value)) = STATIC_TABLE.get(index - 1) {
            return Ok(Header::new(Bytes::from_static(name), Bytes::from_static(value)));
        }
        self.table
            .get(index - STATIC_TABLE.len() - 1)
            .cloned()
            .ok_or(DecoderError::InvalidIndex(index))
    }
}
