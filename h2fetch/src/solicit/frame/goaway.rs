//! Implements the `GOAWAY` HTTP/2 frame.

use bytes::Bytes;

use crate::codec::write_buffer::WriteBuffer;
use crate::solicit::error_code::ErrorCode;
use crate::solicit::error_code::ErrorCodeOrUnknown;
use crate::solicit::frame::flags::Flags;
use crate::solicit::frame::flags::NoFlag;
use crate::solicit::frame::parse_stream_id;
use crate::solicit::frame::read_u32;
use crate::solicit::frame::Frame;
use crate::solicit::frame::FrameHeader;
use crate::solicit::frame::FrameIR;
use crate::solicit::frame::FrameScope;
use crate::solicit::frame::ParseFrameError;
use crate::solicit::frame::ParseFrameResult;
use crate::solicit::frame::RawFrame;
use crate::solicit::stream_id::StreamId;

/// Last stream id and error code.
pub const GOAWAY_MIN_FRAME_LEN: u32 = 8;
pub const GOAWAY_FRAME_TYPE: u8 = 0x7;

/// `GOAWAY` frame, section 6.8.
///
/// The client sends one with `NO_ERROR` and last stream id 0, since it never
/// accepts pushed streams. A received one stops new requests.
#[derive(Clone, Debug, PartialEq)]
pub struct GoawayFrame {
    pub last_stream_id: StreamId,
    error_code: ErrorCodeOrUnknown,
    pub debug_data: Bytes,
    flags: Flags<NoFlag>,
}

impl GoawayFrame {
    pub fn new(last_stream_id: StreamId, error_code: ErrorCode) -> Self {
        GoawayFrame {
            last_stream_id,
            error_code: error_code.into(),
            debug_data: Bytes::new(),
            flags: Flags::default(),
        }
    }

    pub fn error_code(&self) -> ErrorCodeOrUnknown {
        self.error_code
    }

    /// Whether streams up to `last_stream_id` may still complete.
    pub fn is_graceful(&self) -> bool {
        self.error_code.known() == Some(ErrorCode::NoError)
    }

    fn payload_len(&self) -> u32 {
        GOAWAY_MIN_FRAME_LEN + self.debug_data.len() as u32
    }
}

impl Frame for GoawayFrame {
    type FlagType = NoFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self> {
        let header = raw_frame.checked_header(GOAWAY_FRAME_TYPE, FrameScope::Connection, None)?;
        if header.payload_len < GOAWAY_MIN_FRAME_LEN {
            return Err(ParseFrameError::IncorrectFrameLength(header.payload_len));
        }

        let payload = raw_frame.payload();
        Ok(GoawayFrame {
            last_stream_id: parse_stream_id(&payload),
            error_code: ErrorCodeOrUnknown(read_u32(&payload, 4)),
            debug_data: payload.slice(GOAWAY_MIN_FRAME_LEN as usize..),
            flags: Flags::new(header.flags),
        })
    }

    fn flags(&self) -> Flags<NoFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        0
    }

    fn get_header(&self) -> FrameHeader {
        FrameHeader {
            payload_len: self.payload_len(),
            frame_type: GOAWAY_FRAME_TYPE,
            flags: self.flags.0,
            stream_id: 0,
        }
    }
}

impl FrameIR for GoawayFrame {
    fn serialize_into(self, builder: &mut WriteBuffer) {
        builder.write_header(self.get_header());
        builder.write_u32(self.last_stream_id);
        builder.write_u32(self.error_code.0);
        builder.extend_from_bytes(self.debug_data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solicit::tests::common::raw_frame_from_parts;

    #[test]
    fn test_parse_valid_with_debug_data() {
        let raw = raw_frame_from_parts(
            FrameHeader::new(12, 0x7, 0, 0),
            vec![0x80, 0, 0, 5, 0, 0, 0, 1, 1, 2, 3, 4],
        );
        let frame = GoawayFrame::from_raw(&raw).expect("Expected successful parse");
        assert_eq!(frame.error_code().known(), Some(ErrorCode::ProtocolError));
        assert_eq!(frame.last_stream_id, 5);
        assert_eq!(frame.debug_data, Bytes::from_static(&[1, 2, 3, 4]));
    }

    #[test]
    fn test_parse_invalid_stream_id() {
        let raw =
            raw_frame_from_parts(FrameHeader::new(8, 0x7, 0, 3), vec![0, 0, 0, 0, 0, 0, 0, 1]);
        assert!(GoawayFrame::from_raw(&raw).is_err(), "expected invalid stream id");
    }

    #[test]
    fn test_parse_invalid_length() {
        let raw = raw_frame_from_parts(FrameHeader::new(7, 0x7, 0, 0), vec![0, 0, 0, 0, 0, 0, 1]);
        assert!(GoawayFrame::from_raw(&raw).is_err(), "expected too short");
    }

    #[test]
    fn test_serialize_no_error() {
        let frame = GoawayFrame::new(0, ErrorCode::NoError);
        let expected: Vec<u8> =
            raw_frame_from_parts(FrameHeader::new(8, 0x7, 0, 0), vec![0, 0, 0, 0, 0, 0, 0, 0])
                .as_ref()
                .to_owned();
        assert_eq!(expected, frame.serialize_into_vec());
    }
}
