//! Helpers for frame tests.

use crate::solicit::frame::pack_header;
use crate::solicit::frame::FrameHeader;
use crate::solicit::frame::RawFrame;

/// Stitch a header and a payload into a `RawFrame`. The header is not checked
/// against the payload, so malformed frames can be built too.
pub fn raw_frame_from_parts(header: FrameHeader, payload: Vec<u8>) -> RawFrame {
    let mut buf = pack_header(&header).to_vec();
    buf.extend_from_slice(&payload);
    buf.into()
}
