use bytes::Bytes;

use crate::codec::write_buffer::WriteBuffer;
use crate::solicit::frame::flags::Flag;
use crate::solicit::frame::flags::Flags;
use crate::solicit::frame::Frame;
use crate::solicit::frame::FrameHeader;
use crate::solicit::frame::FrameIR;
use crate::solicit::frame::FrameScope;
use crate::solicit::frame::ParseFrameResult;
use crate::solicit::frame::RawFrame;
use crate::solicit::stream_id::StreamId;

pub const CONTINUATION_FRAME_TYPE: u8 = 0x9;

#[derive(Clone, PartialEq, Debug, Copy)]
pub enum ContinuationFlag {
    EndHeaders = 0x4,
}

impl Flag for ContinuationFlag {
    #[inline]
    fn bitmask(&self) -> u8 {
        *self as u8
    }

    fn flags() -> &'static [Self] {
        static FLAGS: &'static [ContinuationFlag] = &[ContinuationFlag::EndHeaders];
        FLAGS
    }
}

/// Continues a header block started by `HEADERS` or `PUSH_PROMISE` on the same
/// stream until a frame carries `END_HEADERS` (section 6.10).
///
/// The client writes these when a request header block exceeds the peer's
/// max frame size; on receipt the session joins fragments before decoding.
#[derive(PartialEq, Clone, Debug)]
pub struct ContinuationFrame {
    pub flags: Flags<ContinuationFlag>,
    pub stream_id: StreamId,
    pub header_fragment: Bytes,
}

impl ContinuationFrame {
    pub fn new<B: Into<Bytes>>(fragment: B, stream_id: StreamId) -> ContinuationFrame {
        ContinuationFrame {
            header_fragment: fragment.into(),
            stream_id,
            flags: Flags::default(),
        }
    }

    pub fn is_headers_end(&self) -> bool {
        self.flags.is_set(ContinuationFlag::EndHeaders)
    }

    pub fn set_flag(&mut self, flag: ContinuationFlag) {
        self.flags.set(flag);
    }
}

impl Frame for ContinuationFrame {
    type FlagType = ContinuationFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self> {
        let header = raw_frame.checked_header(CONTINUATION_FRAME_TYPE, FrameScope::Stream, None)?;
        Ok(ContinuationFrame {
            flags: Flags::new(header.flags),
            stream_id: header.stream_id,
            header_fragment: raw_frame.payload(),
        })
    }

    fn flags(&self) -> Flags<ContinuationFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        self.stream_id
    }

    fn get_header(&self) -> FrameHeader {
        FrameHeader {
            payload_len: self.header_fragment.len() as u32,
            frame_type: CONTINUATION_FRAME_TYPE,
            flags: self.flags.0,
            stream_id: self.stream_id,
        }
    }
}

impl FrameIR for ContinuationFrame {
    fn serialize_into(self, b: &mut WriteBuffer) {
        b.write_header(self.get_header());
        b.extend_from_bytes(self.header_fragment);
    }
}
