use bytes::Bytes;
use bytes::BytesMut;

use crate::solicit::frame::pack_header;
use crate::solicit::frame::FrameHeader;

/// Growable buffer frames are serialized into.
#[derive(Default, Debug)]
pub struct WriteBuffer {
    data: BytesMut,
}

impl WriteBuffer {
    pub fn new() -> WriteBuffer {
        Default::default()
    }

    /// Size of data in the buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn write_header(&mut self, header: FrameHeader) {
        self.data.extend_from_slice(&pack_header(&header));
    }

    /// Network byte order.
    pub fn write_u32(&mut self, num: u32) {
        self.data.extend_from_slice(&num.to_be_bytes());
    }

    pub fn write_u8(&mut self, num: u8) {
        self.data.extend_from_slice(&[num]);
    }

    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    pub fn extend_from_bytes(&mut self, data: Bytes) {
        self.data.extend_from_slice(&data);
    }

    pub fn extend_with_zeroes(&mut self, count: usize) {
        self.data.resize(self.data.len() + count, 0);
    }

    /// Take everything written so far, leaving the buffer empty.
    pub fn take(&mut self) -> Bytes {
        self.data.split().freeze()
    }
}

impl Into<Vec<u8>> for WriteBuffer {
    fn into(self) -> Vec<u8> {
        self.data.to_vec()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_and_payload() {
        let mut buf = WriteBuffer::new();
        buf.write_header(FrameHeader::new(6, 0x4, 0, 0));
        buf.extend_from_slice(&[0, 3]);
        buf.write_u32(100);
        assert_eq!(15, buf.len());

        let bytes = buf.take();
        assert_eq!(&[0, 0, 6, 4, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0, 100][..], &bytes[..]);
        assert!(buf.is_empty());
    }

    #[test]
    fn zeroes() {
        let mut buf = WriteBuffer::new();
        buf.write_u8(1);
        buf.extend_with_zeroes(3);
        let v: Vec<u8> = buf.into();
        assert_eq!(vec![1, 0, 0, 0], v);
    }
}
