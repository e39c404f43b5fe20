use crate::hpack::encode_integer;
use crate::hpack::encode_string;
use crate::hpack::static_table;
use crate::solicit::header::Header;

/// Header block encoder.
///
/// Fields matching a static table entry are sent indexed, everything else as a
/// literal without indexing, so the peer's dynamic table stays empty.
#[derive(Debug, Default)]
pub struct Encoder {}

impl Encoder {
    pub fn new() -> Encoder {
        Encoder {}
    }

    pub fn encode<'a, I>(&mut self, headers: I) -> Vec<u8>
    where
        I: IntoIterator<Item = &'a Header>,
    {
        let mut out = Vec::new();
        for header in headers {
            self.encode_header_into(header, &mut out);
        }
        out
    }

    pub fn encode_header_into(&mut self, header: &Header, out: &mut Vec<u8>) {
        if let Some(index) = static_table::find(header.name(), header.value()) {
            // 6.1 Indexed Header Field
            encode_integer(index, 7, 0x80, out);
            return;
        }

        // 6.2.2 Literal Header Field without Indexing
        match static_table::find_name(header.name()) {
            Some(name_index) => encode_integer(name_index, 4, 0x00, out),
            None => {
                out.push(0x00);
                encode_string(header.name(), out);
            }
        }
        encode_string(header.value(), out);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn indexed_and_literal_forms() {
        let mut encoder = Encoder::new();
        let headers = vec![
            Header::new(":method", "GET"),
            Header::new(":scheme", "https"),
            Header::new(":path", "/"),
            Header::new(":authority", "a"),
        ];
        assert_eq!(
            vec![0x82, 0x87, 0x84, 0x01, 0x01, b'a'],
            encoder.encode(&headers)
        );
    }

    #[test]
    fn unknown_name_is_literal() {
        let mut encoder = Encoder::new();
        let encoded = encoder.encode(&[Header::new("x", "y")]);
        assert_eq!(vec![0x00, 0x01, b'x', 0x01, b'y'], encoded);
    }
}
