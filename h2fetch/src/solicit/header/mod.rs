//! Header fields as carried by `HEADERS` frames.
//!
//! Names and values are opaque byte sequences; no charset is assumed.

use std::fmt;
use std::iter::FromIterator;
use std::str;

use bytes::Bytes;

#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum PseudoHeaderName {
    // 8.1.2.3 Request Pseudo-Header Fields
    Method,
    Scheme,
    Authority,
    Path,

    // 8.1.2.4 Response Pseudo-Header Fields
    Status,
}

impl PseudoHeaderName {
    pub fn name(&self) -> &'static str {
        match *self {
            PseudoHeaderName::Method => ":method",
            PseudoHeaderName::Scheme => ":scheme",
            PseudoHeaderName::Authority => ":authority",
            PseudoHeaderName::Path => ":path",
            PseudoHeaderName::Status => ":status",
        }
    }

    pub fn name_bytes(&self) -> Bytes {
        Bytes::from_static(self.name().as_bytes())
    }
}

/// A single header field.
#[derive(Clone, PartialEq, Eq)]
pub struct Header {
    pub name: Bytes,
    pub value: Bytes,
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Header {{ name: {:?}, value: {:?} }}",
            String::from_utf8_lossy(&self.name),
            String::from_utf8_lossy(&self.value)
        )
    }
}

impl Header {
    pub fn new<N: Into<Bytes>, V: Into<Bytes>>(name: N, value: V) -> Header {
        Header {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn pseudo(name: PseudoHeaderName, value: impl Into<Bytes>) -> Header {
        Header::new(name.name_bytes(), value)
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn is_pseudo_header(&self) -> bool {
        self.name.first() == Some(&b':')
    }

    /// Size as accounted by HPACK (RFC 7541, section 4.1).
    pub fn hpack_size(&self) -> usize {
        self.name.len() + self.value.len() + 32
    }
}

impl<N: Into<Bytes>, V: Into<Bytes>> From<(N, V)> for Header {
    fn from((name, value): (N, V)) -> Header {
        Header::new(name, value)
    }
}

/// Ordered list of header fields, kept in the order they were added or decoded.
#[derive(Default, Clone, PartialEq, Eq, Debug)]
pub struct Headers(pub Vec<Header>);

impl Headers {
    pub fn new() -> Headers {
        Default::default()
    }

    pub fn add(&mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.0.push(Header::new(name, value));
    }

    pub fn add_header(&mut self, header: Header) {
        self.0.push(header);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First value of the named field.
    pub fn get_opt(&self, name: &str) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|h| h.name() == name.as_bytes())
            .map(|h| h.value())
    }

    pub fn get_str_opt(&self, name: &str) -> Option<&str> {
        self.get_opt(name).and_then(|v| str::from_utf8(v).ok())
    }

    /// Value of `:status`, if present and numeric.
    pub fn status(&self) -> Option<u32> {
        self.get_str_opt(PseudoHeaderName::Status.name())
            .and_then(|s| s.parse().ok())
    }

    /// `name: value` lines, one per field, in order.
    pub fn write_lines<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        for header in &self.0 {
            w.write_all(header.name())?;
            w.write_all(b": ")?;
            w.write_all(header.value())?;
            w.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl FromIterator<Header> for Headers {
    fn from_iter<T: IntoIterator<Item = Header>>(iter: T) -> Self {
        Headers(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn keeps_order_and_finds_first() {
        let mut headers = Headers::new();
        headers.add(":status", "200");
        headers.add("x-a", "1");
        headers.add("x-a", "2");
        assert_eq!(Some(200), headers.status());
        assert_eq!(Some(&b"1"[..]), headers.get_opt("x-a"));
        assert!(headers.0[0].is_pseudo_header());
        assert!(!headers.0[1].is_pseudo_header());
    }

    #[test]
    fn write_lines_is_byte_exact() {
        let mut headers = Headers::new();
        headers.add(":status", "200");
        headers.add(Bytes::from_static(b"x-bin"), Bytes::from_static(b"\xff\x00"));
        let mut out = Vec::new();
        headers.write_lines(&mut out).unwrap();
        assert_eq!(&b":status: 200\nx-bin: \xff\x00\n"[..], &out[..]);
    }
}
