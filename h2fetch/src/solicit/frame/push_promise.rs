use bytes::Bytes;

use crate::codec::write_buffer::WriteBuffer;
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

pub const PUSH_PROMISE_FRAME_TYPE: u8 = 0x5;

/// `PUSH_PROMISE` frame.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PushPromiseFrame {
    pub flags: Flags<PushPromiseFlag>,
    /// Stream the promise was sent on.
    pub stream_id: StreamId,
    pub promised_stream_id: StreamId,
    /// HPACK-encoded header fragment.
    pub header_fragment: Bytes,
    pub padding_len: u8,
}

/// `PUSH_PROMISE` frame flag.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum PushPromiseFlag {
    EndHeaders = 0x4,
    Padded = 0x8,
}

impl Flag for PushPromiseFlag {
    fn bitmask(&self) -> u8 {
        *self as u8
    }

    fn flags() -> &'static [PushPromiseFlag] {
        static FLAGS: &'static [PushPromiseFlag] =
            &[PushPromiseFlag::EndHeaders, PushPromiseFlag::Padded];
        FLAGS
    }
}

impl PushPromiseFrame {
    pub fn is_headers_end(&self) -> bool {
        self.flags.is_set(PushPromiseFlag::EndHeaders)
    }

    fn payload_len(&self) -> u32 {
        let padding = if self.flags.is_set(PushPromiseFlag::Padded) {
            1 + self.padding_len as u32
        } else {
            0
        };

        self.header_fragment.len() as u32 + 4 + padding
    }
}

impl Frame for PushPromiseFrame {
    type FlagType = PushPromiseFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<PushPromiseFrame> {
        let FrameHeader {
            frame_type,
            flags,
            stream_id,
            ..
        } = raw_frame.header();
        if frame_type != PUSH_PROMISE_FRAME_TYPE {
            return Err(ParseFrameError::InternalError);
        }
        if stream_id == 0 {
            return Err(ParseFrameError::StreamIdMustBeNonZero);
        }

        let flags: Flags<PushPromiseFlag> = Flags::new(flags);

        // +---------------+
        // |Pad Length? (8)|
        // +-+-------------+-----------------------------------------------+
        // |R|                  Promised Stream ID (31)                    |
        // +-+-----------------------------+-------------------------------+
        // |                   Header Block Fragment (*)                 ...
        // +---------------------------------------------------------------+
        // |                           Padding (*)                       ...
        // +---------------------------------------------------------------+
        let (payload, padding_len) =
            parse_padded_payload(raw_frame.payload(), flags.is_set(PushPromiseFlag::Padded))?;
        if payload.len() < 4 {
            return Err(ParseFrameError::IncorrectPayloadLen);
        }

        Ok(PushPromiseFrame {
            flags,
            stream_id,
            promised_stream_id: parse_stream_id(&payload),
            header_fragment: payload.slice(4..),
            padding_len,
        })
    }

    fn flags(&self) -> Flags<PushPromiseFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        self.stream_id
    }

    fn get_header(&self) -> FrameHeader {
        FrameHeader {
            payload_len: self.payload_len(),
            frame_type: PUSH_PROMISE_FRAME_TYPE,
            flags: self.flags.0,
            stream_id: self.stream_id,
        }
    }
}

impl FrameIR for PushPromiseFrame {
    fn serialize_into(self, b: &mut WriteBuffer) {
        let padded = self.flags.is_set(PushPromiseFlag::Padded);
        b.write_header(self.get_header());
        if padded {
            b.write_u8(self.padding_len);
        }
        b.write_u32(self.promised_stream_id);
        b.extend_from_bytes(self.header_fragment);
        if padded {
            b.extend_with_zeroes(self.padding_len as usize);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solicit::tests::common::raw_frame_from_parts;

    #[test]
    fn parse_padded() {
        let raw = raw_frame_from_parts(
            FrameHeader::new(8, 0x5, 0x4 | 0x8, 1),
            vec![2, 0, 0, 0, 2, 0x82, 0, 0],
        );
        let frame = PushPromiseFrame::from_raw(&raw).unwrap();
        assert_eq!(2, frame.promised_stream_id);
        assert_eq!(&[0x82][..], &frame.header_fragment[..]);
        assert!(frame.is_headers_end());
        assert_eq!(raw.as_ref(), &frame.serialize_into_vec()[..]);
    }

    #[test]
    fn parse_too_short() {
        let raw = raw_frame_from_parts(FrameHeader::new(3, 0x5, 0x4, 1), vec![0, 0, 2]);
        assert_eq!(
            Err(ParseFrameError::IncorrectPayloadLen),
            PushPromiseFrame::from_raw(&raw)
        );
    }
}
