/// Stream identifier, 31 bits on the wire.
pub type StreamId = u32;

/// Client-initiated streams use odd identifiers, starting from 1.
pub const FIRST_CLIENT_STREAM_ID: StreamId = 1;

/// Largest identifier a stream may have.
pub const MAX_STREAM_ID: StreamId = 0x7fff_ffff;

pub fn is_client_initiated(stream_id: StreamId) -> bool {
    stream_id % 2 == 1
}
