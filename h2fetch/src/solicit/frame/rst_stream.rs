//! The module contains the implementation of the `RST_STREAM` frame.

use crate::codec::write_buffer::WriteBuffer;
use crate::solicit::error_code::ErrorCode;
use crate::solicit::error_code::ErrorCodeOrUnknown;
use crate::solicit::frame::flags::Flags;
use crate::solicit::frame::flags::NoFlag;
use crate::solicit::frame::Frame;
use crate::solicit::frame::FrameHeader;
use crate::solicit::frame::FrameIR;
use crate::solicit::frame::read_u32;
use crate::solicit::frame::FrameScope;
use crate::solicit::frame::ParseFrameResult;
use crate::solicit::frame::RawFrame;
use crate::solicit::stream_id::StreamId;

pub const RST_STREAM_FRAME_LEN: u32 = 4;
pub const RST_STREAM_FRAME_TYPE: u8 = 0x3;

/// `RST_STREAM` frame, section 6.4.
///
/// Sent by the client for stream errors on the response, and received to end
/// the request stream with the code shown in the close report.
#[derive(Clone, Debug, PartialEq)]
pub struct RstStreamFrame {
    error_code: ErrorCodeOrUnknown,
    pub stream_id: StreamId,
    flags: Flags<NoFlag>,
}

impl RstStreamFrame {
    pub fn new(stream_id: StreamId, error_code: ErrorCode) -> RstStreamFrame {
        RstStreamFrame {
            error_code: error_code.into(),
            stream_id,
            flags: Flags::default(),
        }
    }

    /// The error code as received, unknown codes included.
    pub fn error_code(&self) -> ErrorCodeOrUnknown {
        self.error_code
    }
}

impl Frame for RstStreamFrame {
    type FlagType = NoFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self> {
        let header = raw_frame.checked_header(
            RST_STREAM_FRAME_TYPE,
            FrameScope::Stream,
            Some(RST_STREAM_FRAME_LEN),
        )?;
        Ok(RstStreamFrame {
            // unknown codes are kept, they are reported as received
            error_code: ErrorCodeOrUnknown(read_u32(&raw_frame.payload(), 0)),
            stream_id: header.stream_id,
            flags: Flags::new(header.flags),
        })
    }

    fn flags(&self) -> Flags<NoFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        self.stream_id
    }

    fn get_header(&self) -> FrameHeader {
        FrameHeader {
            payload_len: RST_STREAM_FRAME_LEN,
            frame_type: RST_STREAM_FRAME_TYPE,
            flags: self.flags.0,
            stream_id: self.stream_id,
        }
    }
}

impl FrameIR for RstStreamFrame {
    fn serialize_into(self, builder: &mut WriteBuffer) {
        builder.write_header(self.get_header());
        builder.write_u32(self.error_code.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solicit::frame::ParseFrameError;
    use crate::solicit::tests::common::raw_frame_from_parts;

    #[test]
    fn parse_keeps_unknown_code() {
        let raw = raw_frame_from_parts(FrameHeader::new(4, 0x3, 0, 1), vec![0, 0, 0x10, 0]);
        let frame = RstStreamFrame::from_raw(&raw).unwrap();
        assert_eq!(ErrorCodeOrUnknown(0x1000), frame.error_code());
        assert_eq!(None, frame.error_code().known());
    }

    #[test]
    fn parse_errors() {
        let raw = raw_frame_from_parts(FrameHeader::new(4, 0x3, 0, 0), vec![0, 0, 0, 1]);
        assert_eq!(
            Err(ParseFrameError::StreamIdMustBeNonZero),
            RstStreamFrame::from_raw(&raw)
        );
        let raw = raw_frame_from_parts(FrameHeader::new(5, 0x3, 0, 1), vec![0, 0, 0, 1, 0]);
        assert_eq!(
            Err(ParseFrameError::IncorrectFrameLength(5)),
            RstStreamFrame::from_raw(&raw)
        );
    }

    #[test]
    fn serialize() {
        let frame = RstStreamFrame::new(3, ErrorCode::RefusedStream);
        let expected = raw_frame_from_parts(FrameHeader::new(4, 0x3, 0, 3), vec![0, 0, 0, 7]);
        assert_eq!(expected.as_ref(), &frame.serialize_into_vec()[..]);
    }
}
