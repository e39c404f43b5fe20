//! The module contains the implementation of the `DATA` frame.

use bytes::Bytes;

use crate::codec::write_buffer::WriteBuffer;
use crate::solicit::frame::flags::Flag;
use crate::solicit::frame::flags::Flags;
use crate::solicit::frame::parse_padded_payload;
use crate::solicit::frame::Frame;
use crate::solicit::frame::FrameHeader;
use crate::solicit::frame::FrameIR;
use crate::solicit::frame::ParseFrameError;
use crate::solicit::frame::ParseFrameResult;
use crate::solicit::frame::RawFrame;
use crate::solicit::stream_id::StreamId;

pub const DATA_FRAME_TYPE: u8 = 0x0;

/// Flags of the `DATA` frame, RFC 7540 section 6.1.
#[derive(Clone, PartialEq, Eq, Debug, Copy)]
pub enum DataFlag {
    EndStream = 0x1,
    Padded = 0x8,
}

impl Flag for DataFlag {
    #[inline]
    fn bitmask(&self) -> u8 {
        *self as u8
    }

    fn flags() -> &'static [Self] {
        static FLAGS: &'static [DataFlag] = &[DataFlag::EndStream, DataFlag::Padded];
        FLAGS
    }
}

/// A `DATA` frame.
#[derive(PartialEq, Clone, Debug)]
pub struct DataFrame {
    /// The data found in the frame as an opaque byte sequence.
    pub data: Bytes,
    flags: Flags<DataFlag>,
    pub stream_id: StreamId,
    /// Padding length, meaningful only when `PADDED` is set.
    pub padding_len: u8,
}

impl DataFrame {
    pub fn with_data<D: Into<Bytes>>(stream_id: StreamId, data: D) -> DataFrame {
        DataFrame {
            data: data.into(),
            flags: Flags::default(),
            stream_id,
            padding_len: 0,
        }
    }

    pub fn is_padded(&self) -> bool {
        self.flags.is_set(DataFlag::Padded)
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.flags.is_set(DataFlag::EndStream)
    }

    pub fn set_flag(&mut self, flag: DataFlag) {
        self.flags.set(flag);
    }

    pub fn set_padding(&mut self, padding_len: u8) {
        self.set_flag(DataFlag::Padded);
        self.padding_len = padding_len;
    }

    /// Payload length including the padding, which is what flow control accounts for.
    pub fn payload_len(&self) -> u32 {
        let padding = if self.is_padded() {
            1 + self.padding_len as u32
        } else {
            0
        };
        self.data.len() as u32 + padding
    }
}

impl Frame for DataFrame {
    type FlagType = DataFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self> {
        let FrameHeader {
            frame_type,
            flags,
            stream_id,
            ..
        } = raw_frame.header();
        if frame_type != DATA_FRAME_TYPE {
            return Err(ParseFrameError::InternalError);
        }
        if stream_id == 0x0 {
            return Err(ParseFrameError::StreamIdMustBeNonZero);
        }

        let flags = Flags::new(flags);
        let (data, padding_len) =
            parse_padded_payload(raw_frame.payload(), flags.is_set(DataFlag::Padded))?;

        Ok(DataFrame {
            data,
            flags,
            stream_id,
            padding_len,
        })
    }

    fn flags(&self) -> Flags<DataFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        self.stream_id
    }

    fn get_header(&self) -> FrameHeader {
        FrameHeader {
            payload_len: self.payload_len(),
            frame_type: DATA_FRAME_TYPE,
            flags: self.flags.0,
            stream_id: self.stream_id,
        }
    }
}

impl FrameIR for DataFrame {
    fn serialize_into(self, b: &mut WriteBuffer) {
        b.write_header(self.get_header());
        if self.is_padded() {
            b.write_u8(self.padding_len);
            b.extend_from_bytes(self.data);
            b.extend_with_zeroes(self.padding_len as usize);
        } else {
            b.extend_from_bytes(self.data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solicit::tests::common::raw_frame_from_parts;

    #[test]
    fn parse_end_of_stream() {
        let raw = raw_frame_from_parts(FrameHeader::new(3, 0x0, 0x1, 1), b"abc".to_vec());
        let frame = DataFrame::from_raw(&raw).unwrap();
        assert_eq!(&b"abc"[..], &frame.data[..]);
        assert!(frame.is_end_of_stream());
        assert_eq!(3, frame.payload_len());
    }

    #[test]
    fn parse_padded_counts_padding_in_payload_len() {
        let raw = raw_frame_from_parts(
            FrameHeader::new(6, 0x0, 0x8, 3),
            vec![2, b'h', b'i', b'!', 0, 0],
        );
        let frame = DataFrame::from_raw(&raw).unwrap();
        assert_eq!(&b"hi!"[..], &frame.data[..]);
        assert_eq!(2, frame.padding_len);
        assert_eq!(6, frame.payload_len());
        assert!(!frame.is_end_of_stream());
    }

    #[test]
    fn parse_rejects_stream_zero() {
        let raw = raw_frame_from_parts(FrameHeader::new(1, 0x0, 0, 0), vec![1]);
        assert_eq!(
            Err(ParseFrameError::StreamIdMustBeNonZero),
            DataFrame::from_raw(&raw)
        );
    }

    #[test]
    fn serialize_padded() {
        let mut frame = DataFrame::with_data(1, &b"ab"[..]);
        frame.set_padding(1);
        frame.set_flag(DataFlag::EndStream);
        let expected =
            raw_frame_from_parts(FrameHeader::new(4, 0x0, 0x9, 1), vec![1, b'a', b'b', 0]);
        assert_eq!(expected.as_ref(), &frame.serialize_into_vec()[..]);
    }
}
