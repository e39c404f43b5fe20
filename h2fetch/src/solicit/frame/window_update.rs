//! Implements the `WINDOW_UPDATE` HTTP/2 frame.

use crate::codec::write_buffer::WriteBuffer;
use crate::solicit::frame::flags::Flags;
use crate::solicit::frame::flags::NoFlag;
use crate::solicit::frame::parse_stream_id;
use crate::solicit::frame::Frame;
use crate::solicit::frame::FrameHeader;
use crate::solicit::frame::FrameIR;
use crate::solicit::frame::ParseFrameError;
use crate::solicit::frame::ParseFrameResult;
use crate::solicit::frame::RawFrame;
use crate::solicit::stream_id::StreamId;

pub const WINDOW_UPDATE_FRAME_LEN: u32 = 4;
pub const WINDOW_UPDATE_FRAME_TYPE: u8 = 0x8;

/// `WINDOW_UPDATE` frame, section 6.9.
///
/// A zero increment parses; whether it is a stream or a connection error
/// depends on the stream id, so the session decides.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowUpdateFrame {
    /// Zero for the connection window.
    pub stream_id: StreamId,
    pub increment: u32,
    flags: Flags<NoFlag>,
}

impl WindowUpdateFrame {
    pub fn for_connection(increment: u32) -> WindowUpdateFrame {
        WindowUpdateFrame::for_stream(0, increment)
    }

    pub fn for_stream(stream_id: StreamId, increment: u32) -> WindowUpdateFrame {
        WindowUpdateFrame {
            stream_id,
            increment,
            flags: Flags::default(),
        }
    }
}

impl Frame for WindowUpdateFrame {
    type FlagType = NoFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self> {
        let header = raw_frame.header();
        if header.frame_type != WINDOW_UPDATE_FRAME_TYPE {
            return Err(ParseFrameError::InternalError);
        }
        if header.payload_len != WINDOW_UPDATE_FRAME_LEN {
            return Err(ParseFrameError::IncorrectFrameLength(header.payload_len));
        }
        Ok(WindowUpdateFrame {
            stream_id: header.stream_id,
            // same layout as a stream id: reserved bit and 31 bits
            increment: parse_stream_id(&raw_frame.payload()),
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
            payload_len: WINDOW_UPDATE_FRAME_LEN,
            frame_type: WINDOW_UPDATE_FRAME_TYPE,
            flags: 0,
            stream_id: self.stream_id,
        }
    }
}

impl FrameIR for WindowUpdateFrame {
    fn serialize_into(self, b: &mut WriteBuffer) {
        b.write_header(self.get_header());
        b.write_u32(self.increment);
    }
}
