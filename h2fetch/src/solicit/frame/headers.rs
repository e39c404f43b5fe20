//! The module contains the implementation of the `HEADERS` frame and associated flags.

use std::cmp;

use bytes::Bytes;

use crate::codec::write_buffer::WriteBuffer;
use crate::solicit::frame::continuation::ContinuationFlag;
use crate::solicit::frame::continuation::ContinuationFrame;
use crate::solicit::frame::flags::Flag;
use crate::solicit::frame::flags::Flags;
use crate::solicit::frame::parse_padded_payload;
use crate::solicit::frame::parse_stream_id;
use crate::solicit::frame::Frame;
use crate::solicit::frame::FrameHeader;
use crate::solicit::frame::FrameIR;
use crate::solicit::frame::ParseFrameError;
use crate::solicit::frame::ParseFrameResult;
use crate::solicit::frame::RawFrame;
use crate::solicit::stream_id::StreamId;

pub const HEADERS_FRAME_TYPE: u8 = 0x1;

/// Flags of the `HEADERS` frame, RFC 7540 section 6.2.
#[derive(Clone, PartialEq, Eq, Debug, Copy)]
pub enum HeadersFlag {
    EndStream = 0x1,
    EndHeaders = 0x4,
    Padded = 0x8,
    Priority = 0x20,
}

impl Flag for HeadersFlag {
    #[inline]
    fn bitmask(&self) -> u8 {
        *self as u8
    }

    fn flags() -> &'static [Self] {
        static FLAGS: &'static [HeadersFlag] = &[
            HeadersFlag::EndStream,
            HeadersFlag::EndHeaders,
            HeadersFlag::Padded,
            HeadersFlag::Priority,
        ];
        FLAGS
    }
}

/// Priority block carried by a `HEADERS` frame with the `PRIORITY` flag.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct StreamDependency {
    pub stream_id: StreamId,
    /// Weight minus one, as on the wire.
    pub weight: u8,
    pub is_exclusive: bool,
}

impl StreamDependency {
    fn parse(buf: &[u8]) -> StreamDependency {
        let is_exclusive = buf[0] & 0x80 != 0;
        StreamDependency {
            stream_id: parse_stream_id(buf),
            weight: buf[4],
            is_exclusive,
        }
    }

    fn serialize(&self) -> [u8; 5] {
        let e_bit = if self.is_exclusive { 0x80000000 } else { 0 };
        let dep = (self.stream_id | e_bit).to_be_bytes();
        [dep[0], dep[1], dep[2], dep[3], self.weight]
    }
}

/// A `HEADERS` frame. The header fragment is kept HPACK-encoded.
#[derive(PartialEq, Clone, Debug)]
pub struct HeadersFrame {
    pub header_fragment: Bytes,
    pub stream_id: StreamId,
    pub stream_dep: Option<StreamDependency>,
    pub padding_len: u8,
    flags: Flags<HeadersFlag>,
}

impl HeadersFrame {
    pub fn new<B: Into<Bytes>>(fragment: B, stream_id: StreamId) -> HeadersFrame {
        HeadersFrame {
            header_fragment: fragment.into(),
            stream_id,
            stream_dep: None,
            padding_len: 0,
            flags: Flags::default(),
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.flags.is_set(HeadersFlag::EndStream)
    }

    pub fn is_headers_end(&self) -> bool {
        self.flags.is_set(HeadersFlag::EndHeaders)
    }

    pub fn set_flag(&mut self, flag: HeadersFlag) {
        self.flags.set(flag);
    }

    fn payload_len(&self) -> u32 {
        let padding = if self.flags.is_set(HeadersFlag::Padded) {
            1 + self.padding_len as u32
        } else {
            0
        };
        let priority = if self.stream_dep.is_some() { 5 } else { 0 };

        self.header_fragment.len() as u32 + priority + padding
    }
}

impl Frame for HeadersFrame {
    type FlagType = HeadersFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<HeadersFrame> {
        let FrameHeader {
            frame_type,
            flags,
            stream_id,
            ..
        } = raw_frame.header();
        if frame_type != HEADERS_FRAME_TYPE {
            return Err(ParseFrameError::InternalError);
        }
        if stream_id == 0 {
            return Err(ParseFrameError::StreamIdMustBeNonZero);
        }

        let flags: Flags<HeadersFlag> = Flags::new(flags);
        let (payload, padding_len) =
            parse_padded_payload(raw_frame.payload(), flags.is_set(HeadersFlag::Padded))?;

        let (stream_dep, header_fragment) = if flags.is_set(HeadersFlag::Priority) {
            if payload.len() < 5 {
                return Err(ParseFrameError::IncorrectPayloadLen);
            }
            let dep = StreamDependency::parse(&payload[..5]);
            if dep.stream_id == stream_id {
                return Err(ParseFrameError::StreamDependencyOnItself(stream_id));
            }
            (Some(dep), payload.slice(5..))
        } else {
            (None, payload)
        };

        Ok(HeadersFrame {
            header_fragment,
            stream_id,
            stream_dep,
            padding_len,
            flags,
        })
    }

    fn flags(&self) -> Flags<HeadersFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        self.stream_id
    }

    fn get_header(&self) -> FrameHeader {
        FrameHeader {
            payload_len: self.payload_len(),
            frame_type: HEADERS_FRAME_TYPE,
            flags: self.flags.0,
            stream_id: self.stream_id,
        }
    }
}

impl FrameIR for HeadersFrame {
    fn serialize_into(self, b: &mut WriteBuffer) {
        b.write_header(self.get_header());
        let padded = self.flags.is_set(HeadersFlag::Padded);
        if padded {
            b.write_u8(self.padding_len);
        }
        if let Some(dep) = self.stream_dep {
            b.extend_from_slice(&dep.serialize());
        }
        b.extend_from_bytes(self.header_fragment);
        if padded {
            b.extend_with_zeroes(self.padding_len as usize);
        }
    }
}

/// An encoded header block written as one `HEADERS` frame followed by as many
/// `CONTINUATION` frames as `max_frame_size` requires.
#[derive(Debug)]
pub struct HeadersMultiFrame {
    pub stream_id: StreamId,
    pub header_block: Bytes,
    pub end_stream: bool,
    pub max_frame_size: u32,
}

impl FrameIR for HeadersMultiFrame {
    fn serialize_into(self, b: &mut WriteBuffer) {
        let max = self.max_frame_size as usize;
        let block = self.header_block;

        let first_end = cmp::min(block.len(), max);
        let mut headers = HeadersFrame::new(block.slice(..first_end), self.stream_id);
        if self.end_stream {
            headers.set_flag(HeadersFlag::EndStream);
        }
        if first_end == block.len() {
            headers.set_flag(HeadersFlag::EndHeaders);
        }
        headers.serialize_into(b);

        let mut pos = first_end;
        while pos < block.len() {
            let end = cmp::min(block.len(), pos + max);
            let mut continuation = ContinuationFrame::new(block.slice(pos..end), self.stream_id);
            if end == block.len() {
                continuation.set_flag(ContinuationFlag::EndHeaders);
            }
            continuation.serialize_into(b);
            pos = end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solicit::tests::common::raw_frame_from_parts;

    #[test]
    fn parse_simple() {
        let raw = raw_frame_from_parts(FrameHeader::new(3, 0x1, 0x5, 1), vec![0x82, 0x87, 0x84]);
        let frame = HeadersFrame::from_raw(&raw).unwrap();
        assert_eq!(&[0x82, 0x87, 0x84][..], &frame.header_fragment[..]);
        assert!(frame.is_end_of_stream());
        assert!(frame.is_headers_end());
        assert_eq!(None, frame.stream_dep);
    }

    #[test]
    fn parse_padded_with_priority() {
        let raw = raw_frame_from_parts(
            FrameHeader::new(9, 0x1, 0x8 | 0x20 | 0x4, 3),
            vec![1, 0x80, 0, 0, 1, 15, 0x88, 0x89, 0],
        );
        let frame = HeadersFrame::from_raw(&raw).unwrap();
        assert_eq!(&[0x88, 0x89][..], &frame.header_fragment[..]);
        assert_eq!(
            Some(StreamDependency {
                stream_id: 1,
                weight: 15,
                is_exclusive: true,
            }),
            frame.stream_dep
        );
        assert_eq!(raw.as_ref(), &frame.serialize_into_vec()[..]);
    }

    #[test]
    fn parse_rejects_dependency_on_itself() {
        let raw = raw_frame_from_parts(
            FrameHeader::new(5, 0x1, 0x20, 3),
            vec![0, 0, 0, 3, 0],
        );
        assert_eq!(
            Err(ParseFrameError::StreamDependencyOnItself(3)),
            HeadersFrame::from_raw(&raw)
        );
    }

    #[test]
    fn serialize_request_headers() {
        let mut frame = HeadersFrame::new(vec![0x82], 1);
        frame.set_flag(HeadersFlag::EndStream);
        frame.set_flag(HeadersFlag::EndHeaders);
        assert_eq!(
            vec![0, 0, 1, 0x1, 0x5, 0, 0, 0, 1, 0x82],
            frame.serialize_into_vec()
        );
    }

    #[test]
    fn multi_frame_splits_into_continuations() {
        let frame = HeadersMultiFrame {
            stream_id: 1,
            header_block: Bytes::from_static(b"abcde"),
            end_stream: true,
            max_frame_size: 2,
        };
        assert_eq!(
            vec![
                0, 0, 2, 0x1, 0x1, 0, 0, 0, 1, b'a', b'b', //
                0, 0, 2, 0x9, 0x0, 0, 0, 0, 1, b'c', b'd', //
                0, 0, 1, 0x9, 0x4, 0, 0, 0, 1, b'e',
            ],
            frame.serialize_into_vec()
        );
    }

    #[test]
    fn multi_frame_fits_in_one() {
        let frame = HeadersMultiFrame {
            stream_id: 3,
            header_block: Bytes::from_static(b"ab"),
            end_stream: true,
            max_frame_size: 16384,
        };
        assert_eq!(
            vec![0, 0, 2, 0x1, 0x5, 0, 0, 0, 3, b'a', b'b'],
            frame.serialize_into_vec()
        );
    }
}
