//! Implements the `PING` HTTP/2 frame.

use crate::codec::write_buffer::WriteBuffer;
use crate::solicit::frame::flags::Flag;
use crate::solicit::frame::flags::Flags;
use crate::solicit::frame::Frame;
use crate::solicit::frame::FrameHeader;
use crate::solicit::frame::FrameIR;
use crate::solicit::frame::read_u32;
use crate::solicit::frame::FrameScope;
use crate::solicit::frame::ParseFrameResult;
use crate::solicit::frame::RawFrame;
use crate::solicit::stream_id::StreamId;

pub const PING_FRAME_LEN: u32 = 8;
pub const PING_FRAME_TYPE: u8 = 0x6;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PingFlag {
    Ack = 0x1,
}

impl Flag for PingFlag {
    #[inline]
    fn bitmask(&self) -> u8 {
        *self as u8
    }

    fn flags() -> &'static [Self] {
        static FLAGS: &'static [PingFlag] = &[PingFlag::Ack];
        FLAGS
    }
}

/// `PING` frame, section 6.7.
///
/// The client never originates pings; it only answers the server's with an
/// ACK echoing the opaque data.
#[derive(Clone, Debug, PartialEq)]
pub struct PingFrame {
    pub opaque_data: u64,
    flags: Flags<PingFlag>,
}

impl PingFrame {
    pub fn with_data(opaque_data: u64) -> Self {
        PingFrame {
            opaque_data,
            flags: Flags::default(),
        }
    }

    /// Answer to a ping carrying `opaque_data`.
    pub fn new_ack(opaque_data: u64) -> Self {
        PingFrame {
            opaque_data,
            flags: PingFlag::Ack.to_flags(),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.flags.is_set(PingFlag::Ack)
    }
}

impl Frame for PingFrame {
    type FlagType = PingFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self> {
        let header =
            raw_frame.checked_header(PING_FRAME_TYPE, FrameScope::Connection, Some(PING_FRAME_LEN))?;
        let payload = raw_frame.payload();
        Ok(PingFrame {
            opaque_data: (read_u32(&payload, 0) as u64) << 32 | read_u32(&payload, 4) as u64,
            flags: Flags::new(header.flags),
        })
    }

    fn flags(&self) -> Flags<PingFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        0
    }

    fn get_header(&self) -> FrameHeader {
        FrameHeader {
            payload_len: PING_FRAME_LEN,
            frame_type: PING_FRAME_TYPE,
            flags: self.flags.0,
            stream_id: 0,
        }
    }
}

impl FrameIR for PingFrame {
    fn serialize_into(self, builder: &mut WriteBuffer) {
        builder.write_header(self.get_header());
        builder.write_u32((self.opaque_data >> 32) as u32);
        builder.write_u32(self.opaque_data as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solicit::frame::ParseFrameError;
    use crate::solicit::tests::common::raw_frame_from_parts;

    #[test]
    fn parse_opaque_data() {
        let raw = raw_frame_from_parts(FrameHeader::new(8, 0x6, 0, 0), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let frame = PingFrame::from_raw(&raw).expect("Expected successful parse");
        assert!(!frame.is_ack());
        assert_eq!(frame.opaque_data, 0x0102030405060708);
    }

    #[test]
    fn parse_errors() {
        let raw = raw_frame_from_parts(FrameHeader::new(8, 0x6, 0, 1), vec![0; 8]);
        assert_eq!(
            Err(ParseFrameError::StreamIdMustBeZero(1)),
            PingFrame::from_raw(&raw)
        );
        let raw = raw_frame_from_parts(FrameHeader::new(4, 0x6, 0, 0), vec![0; 4]);
        assert_eq!(
            Err(ParseFrameError::IncorrectFrameLength(4)),
            PingFrame::from_raw(&raw)
        );
    }

    #[test]
    fn ack_echoes_data() {
        let frame = PingFrame::new_ack(0x0102030405060708);
        let expected: Vec<u8> =
            raw_frame_from_parts(FrameHeader::new(8, 0x6, 1, 0), vec![1, 2, 3, 4, 5, 6, 7, 8])
                .as_ref()
                .to_owned();
        assert_eq!(expected, frame.serialize_into_vec());
    }
}
