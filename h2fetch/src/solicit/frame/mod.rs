//! The module contains the implementation of HTTP/2 frames.

use std::fmt;

use bytes::Bytes;

use crate::codec::write_buffer::WriteBuffer;
use crate::solicit::stream_id::StreamId;

/// Big-endian `u32` at `offset`. The caller checked the length.
#[inline]
fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Parse 4 octets as a stream id, ignoring the reserved most significant bit.
#[inline]
fn parse_stream_id(buf: &[u8]) -> StreamId {
    read_u32(buf, 0) & !0x80000000
}

/// Which stream ids a frame type may arrive on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameScope {
    /// Stream zero only.
    Connection,
    /// Any stream but zero.
    Stream,
}

pub mod continuation;
pub mod data;
pub mod flags;
pub mod goaway;
pub mod headers;
pub mod ping;
pub mod priority;
pub mod push_promise;
pub mod rst_stream;
pub mod settings;
pub mod window_update;

pub use self::continuation::ContinuationFlag;
pub use self::continuation::ContinuationFrame;
pub use self::data::DataFlag;
pub use self::data::DataFrame;
pub use self::goaway::GoawayFrame;
pub use self::headers::HeadersFlag;
pub use self::headers::HeadersFrame;
pub use self::headers::HeadersMultiFrame;
pub use self::ping::PingFlag;
pub use self::ping::PingFrame;
pub use self::priority::PriorityFrame;
pub use self::push_promise::PushPromiseFlag;
pub use self::push_promise::PushPromiseFrame;
pub use self::rst_stream::RstStreamFrame;
pub use self::settings::HttpSetting;
pub use self::settings::HttpSettings;
pub use self::settings::SettingsFlag;
pub use self::settings::SettingsFrame;
pub use self::window_update::WindowUpdateFrame;

use self::flags::Flag;
use self::flags::Flags;

pub const FRAME_HEADER_LEN: usize = 9;

/// An alias for the 9-byte buffer that each HTTP/2 frame header must be stored
/// in.
pub type FrameHeaderBuffer = [u8; FRAME_HEADER_LEN];

/// The four components of an HTTP/2 frame header.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct FrameHeader {
    /// payload length
    pub payload_len: u32,
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: StreamId,
}

impl FrameHeader {
    pub fn new(payload_len: u32, frame_type: u8, flags: u8, stream_id: StreamId) -> FrameHeader {
        FrameHeader {
            payload_len,
            frame_type,
            flags,
            stream_id,
        }
    }
}

/// Decode a frame header from exactly 9 octets.
pub fn unpack_header(header: &FrameHeaderBuffer) -> FrameHeader {
    let payload_len: u32 =
        ((header[0] as u32) << 16) | ((header[1] as u32) << 8) | (header[2] as u32);

    FrameHeader {
        payload_len,
        frame_type: header[3],
        flags: header[4],
        stream_id: parse_stream_id(&header[5..]),
    }
}

/// Decode a frame header from the first 9 octets of `buf`, if there are that many.
pub fn unpack_header_from_slice(buf: &[u8]) -> Option<FrameHeader> {
    if buf.len() < FRAME_HEADER_LEN {
        return None;
    }
    let mut header: FrameHeaderBuffer = [0; FRAME_HEADER_LEN];
    header.copy_from_slice(&buf[..FRAME_HEADER_LEN]);
    Some(unpack_header(&header))
}

/// Constructs a buffer of 9 bytes that represents the given `FrameHeader`.
pub fn pack_header(header: &FrameHeader) -> FrameHeaderBuffer {
    let &FrameHeader {
        payload_len,
        frame_type,
        flags,
        stream_id,
    } = header;

    [
        (((payload_len >> 16) & 0x000000FF) as u8),
        (((payload_len >> 8) & 0x000000FF) as u8),
        (((payload_len) & 0x000000FF) as u8),
        frame_type,
        flags,
        (((stream_id >> 24) & 0x000000FF) as u8),
        (((stream_id >> 16) & 0x000000FF) as u8),
        (((stream_id >> 8) & 0x000000FF) as u8),
        (((stream_id) & 0x000000FF) as u8),
    ]
}

/// Strip padding from a payload when the frame is flagged `PADDED`.
///
/// Returns the actual payload and the padding length. The pad length octet must
/// be present and smaller than the rest of the payload.
fn parse_padded_payload(payload: Bytes, padded: bool) -> ParseFrameResult<(Bytes, u8)> {
    if !padded {
        return Ok((payload, 0));
    }
    if payload.is_empty() {
        return Err(ParseFrameError::ProtocolError);
    }
    let pad_len = payload[0] as usize;
    if pad_len >= payload.len() {
        return Err(ParseFrameError::ProtocolError);
    }

    Ok((payload.slice(1..payload.len() - pad_len), pad_len as u8))
}

/// A trait that types that are an intermediate representation of HTTP/2 frames should implement.
/// It allows us to generically serialize any intermediate representation into an on-the-wire
/// representation.
pub trait FrameIR: fmt::Debug {
    /// Write out the on-the-wire representation of the frame.
    fn serialize_into(self, builder: &mut WriteBuffer);

    fn serialize_into_vec(self) -> Vec<u8>
    where
        Self: Sized,
    {
        let mut builder = WriteBuffer::new();
        self.serialize_into(&mut builder);
        builder.into()
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ParseFrameError {
    InternalError,
    IncorrectPayloadLen,
    StreamIdMustBeNonZero,
    StreamIdMustBeZero(StreamId),
    StreamDependencyOnItself(StreamId),
    IncorrectFrameLength(u32),
    ProtocolError, // generic error
}

impl fmt::Display for ParseFrameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub type ParseFrameResult<T> = Result<T, ParseFrameError>;

/// A trait that all HTTP/2 frame structs need to implement.
pub trait Frame: Sized {
    /// The type that represents the flags that the particular `Frame` can take.
    type FlagType: Flag;

    /// Creates a new `Frame` from the given `RawFrame` (i.e. header and
    /// payload), if possible.
    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self>;

    /// Frame flags
    fn flags(&self) -> Flags<Self::FlagType>;
    /// Returns the `StreamId` of the stream to which the frame is associated
    fn get_stream_id(&self) -> StreamId;
    /// Returns a `FrameHeader` based on the current state of the `Frame`.
    fn get_header(&self) -> FrameHeader;
}

/// A complete frame as read from the wire: 9 header octets followed by the payload.
///
/// No interpretation of the payload happens here.
#[derive(PartialEq, Debug, Clone)]
pub struct RawFrame {
    pub raw_content: Bytes,
}

impl RawFrame {
    /// Split one complete frame off the beginning of `buf`.
    ///
    /// Returns `None` when `buf` does not hold a complete frame yet.
    pub fn parse(buf: &Bytes) -> Option<RawFrame> {
        let header = unpack_header_from_slice(buf)?;
        let len = FRAME_HEADER_LEN + header.payload_len as usize;
        if buf.len() < len {
            return None;
        }
        Some(RawFrame {
            raw_content: buf.slice(..len),
        })
    }

    /// Returns the total length of the `RawFrame`, including both headers, as well as the entire
    /// payload.
    #[inline]
    pub fn len(&self) -> usize {
        self.raw_content.len()
    }

    pub fn frame_type(&self) -> u8 {
        self.raw_content[3]
    }

    pub fn header(&self) -> FrameHeader {
        let mut header: FrameHeaderBuffer = [0; FRAME_HEADER_LEN];
        header.copy_from_slice(&self.raw_content[..FRAME_HEADER_LEN]);
        unpack_header(&header)
    }

    pub fn get_stream_id(&self) -> StreamId {
        self.header().stream_id
    }

    /// Header of a frame expected to be of `frame_type`, checked against
    /// `scope` and, when given, an exact payload length.
    fn checked_header(
        &self,
        frame_type: u8,
        scope: FrameScope,
        payload_len: Option<u32>,
    ) -> ParseFrameResult<FrameHeader> {
        let header = self.header();
        if header.frame_type != frame_type {
            return Err(ParseFrameError::InternalError);
        }
        match payload_len {
            Some(len) if len != header.payload_len => {
                return Err(ParseFrameError::IncorrectFrameLength(header.payload_len))
            }
            _ => {}
        }
        match scope {
            FrameScope::Connection if header.stream_id != 0 => {
                Err(ParseFrameError::StreamIdMustBeZero(header.stream_id))
            }
            FrameScope::Stream if header.stream_id == 0 => Err(ParseFrameError::StreamIdMustBeNonZero),
            _ => Ok(header),
        }
    }

    pub fn payload(&self) -> Bytes {
        self.raw_content.slice(FRAME_HEADER_LEN..)
    }
}

impl AsRef<[u8]> for RawFrame {
    fn as_ref(&self) -> &[u8] {
        self.raw_content.as_ref()
    }
}

/// Unchecked conversion: the result may not be a valid frame.
impl From<Vec<u8>> for RawFrame {
    fn from(raw: Vec<u8>) -> RawFrame {
        RawFrame {
            raw_content: Bytes::from(raw),
        }
    }
}

impl FrameIR for RawFrame {
    fn serialize_into(self, b: &mut WriteBuffer) {
        b.extend_from_bytes(self.raw_content);
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum HttpFrameType {
    Data,
    Headers,
    Priority,
    RstStream,
    Settings,
    PushPromise,
    Ping,
    Goaway,
    WindowUpdate,
    Continuation,
    Unknown(u8),
}

impl HttpFrameType {
    pub fn frame_type(&self) -> u8 {
        match self {
            HttpFrameType::Data => data::DATA_FRAME_TYPE,
            HttpFrameType::Headers => headers::HEADERS_FRAME_TYPE,
            HttpFrameType::Priority => priority::PRIORITY_FRAME_TYPE,
            HttpFrameType::RstStream => rst_stream::RST_STREAM_FRAME_TYPE,
            HttpFrameType::Settings => settings::SETTINGS_FRAME_TYPE,
            HttpFrameType::PushPromise => push_promise::PUSH_PROMISE_FRAME_TYPE,
            HttpFrameType::Ping => ping::PING_FRAME_TYPE,
            HttpFrameType::Goaway => goaway::GOAWAY_FRAME_TYPE,
            HttpFrameType::WindowUpdate => window_update::WINDOW_UPDATE_FRAME_TYPE,
            HttpFrameType::Continuation => continuation::CONTINUATION_FRAME_TYPE,
            HttpFrameType::Unknown(t) => *t,
        }
    }
}

impl fmt::Display for HttpFrameType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HttpFrameType::Data => write!(f, "DATA"),
            HttpFrameType::Headers => write!(f, "HEADERS"),
            HttpFrameType::Priority => write!(f, "PRIORITY"),
            HttpFrameType::RstStream => write!(f, "RST_STREAM"),
            HttpFrameType::Settings => write!(f, "SETTINGS"),
            HttpFrameType::PushPromise => write!(f, "PUSH_PROMISE"),
            HttpFrameType::Ping => write!(f, "PING"),
            HttpFrameType::Goaway => write!(f, "GOAWAY"),
            HttpFrameType::WindowUpdate => write!(f, "WINDOW_UPDATE"),
            HttpFrameType::Continuation => write!(f, "CONTINUATION"),
            HttpFrameType::Unknown(t) => write!(f, "UNKNOWN({:#x})", t),
        }
    }
}

/// All frame variants a connection can receive or send.
///
/// Unknown frame types are kept as the underlying `RawFrame`.
#[derive(PartialEq, Debug, Clone)]
pub enum HttpFrame {
    Data(DataFrame),
    Headers(HeadersFrame),
    Priority(PriorityFrame),
    RstStream(RstStreamFrame),
    Settings(SettingsFrame),
    PushPromise(PushPromiseFrame),
    Ping(PingFrame),
    Goaway(GoawayFrame),
    WindowUpdate(WindowUpdateFrame),
    Continuation(ContinuationFrame),
    Unknown(RawFrame),
}

impl HttpFrame {
    pub fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<HttpFrame> {
        let frame = match raw_frame.frame_type() {
            data::DATA_FRAME_TYPE => HttpFrame::Data(Frame::from_raw(raw_frame)?),
            headers::HEADERS_FRAME_TYPE => HttpFrame::Headers(Frame::from_raw(raw_frame)?),
            priority::PRIORITY_FRAME_TYPE => HttpFrame::Priority(Frame::from_raw(raw_frame)?),
            rst_stream::RST_STREAM_FRAME_TYPE => {
                HttpFrame::RstStream(Frame::from_raw(raw_frame)?)
            }
            settings::SETTINGS_FRAME_TYPE => HttpFrame::Settings(Frame::from_raw(raw_frame)?),
            push_promise::PUSH_PROMISE_FRAME_TYPE => {
                HttpFrame::PushPromise(Frame::from_raw(raw_frame)?)
            }
            ping::PING_FRAME_TYPE => HttpFrame::Ping(Frame::from_raw(raw_frame)?),
            goaway::GOAWAY_FRAME_TYPE => HttpFrame::Goaway(Frame::from_raw(raw_frame)?),
            window_update::WINDOW_UPDATE_FRAME_TYPE => {
                HttpFrame::WindowUpdate(Frame::from_raw(raw_frame)?)
            }
            continuation::CONTINUATION_FRAME_TYPE => {
                HttpFrame::Continuation(Frame::from_raw(raw_frame)?)
            }
            _ => HttpFrame::Unknown(raw_frame.clone()),
        };

        Ok(frame)
    }

    /// Get stream id, zero for special frames
    pub fn get_stream_id(&self) -> StreamId {
        match self {
            HttpFrame::Data(f) => f.get_stream_id(),
            HttpFrame::Headers(f) => f.get_stream_id(),
            HttpFrame::Priority(f) => f.get_stream_id(),
            HttpFrame::RstStream(f) => f.get_stream_id(),
            HttpFrame::Settings(f) => f.get_stream_id(),
            HttpFrame::PushPromise(f) => f.get_stream_id(),
            HttpFrame::Ping(f) => f.get_stream_id(),
            HttpFrame::Goaway(f) => f.get_stream_id(),
            HttpFrame::WindowUpdate(f) => f.get_stream_id(),
            HttpFrame::Continuation(f) => f.get_stream_id(),
            HttpFrame::Unknown(f) => f.get_stream_id(),
        }
    }

    pub fn frame_type(&self) -> HttpFrameType {
        match self {
            HttpFrame::Data(..) => HttpFrameType::Data,
            HttpFrame::Headers(..) => HttpFrameType::Headers,
            HttpFrame::Priority(..) => HttpFrameType::Priority,
            HttpFrame::RstStream(..) => HttpFrameType::RstStream,
            HttpFrame::Settings(..) => HttpFrameType::Settings,
            HttpFrame::PushPromise(..) => HttpFrameType::PushPromise,
            HttpFrame::Ping(..) => HttpFrameType::Ping,
            HttpFrame::Goaway(..) => HttpFrameType::Goaway,
            HttpFrame::WindowUpdate(..) => HttpFrameType::WindowUpdate,
            HttpFrame::Continuation(..) => HttpFrameType::Continuation,
            HttpFrame::Unknown(f) => HttpFrameType::Unknown(f.frame_type()),
        }
    }
}

impl FrameIR for HttpFrame {
    fn serialize_into(self, builder: &mut WriteBuffer) {
        match self {
            HttpFrame::Data(f) => f.serialize_into(builder),
            HttpFrame::Headers(f) => f.serialize_into(builder),
            HttpFrame::Priority(f) => f.serialize_into(builder),
            HttpFrame::RstStream(f) => f.serialize_into(builder),
            HttpFrame::Settings(f) => f.serialize_into(builder),
            HttpFrame::PushPromise(f) => f.serialize_into(builder),
            HttpFrame::Ping(f) => f.serialize_into(builder),
            HttpFrame::Goaway(f) => f.serialize_into(builder),
            HttpFrame::WindowUpdate(f) => f.serialize_into(builder),
            HttpFrame::Continuation(f) => f.serialize_into(builder),
            HttpFrame::Unknown(f) => f.serialize_into(builder),
        }
    }
}

macro_rules! http_frame_from {
    ($($frame:ident => $variant:ident,)*) => {
        $(
            impl From<$frame> for HttpFrame {
                fn from(frame: $frame) -> Self {
                    HttpFrame::$variant(frame)
                }
            }
        )*
    };
}

http_frame_from! {
    DataFrame => Data,
    HeadersFrame => Headers,
    PriorityFrame => Priority,
    RstStreamFrame => RstStream,
    SettingsFrame => Settings,
    PushPromiseFrame => PushPromise,
    PingFrame => Ping,
    GoawayFrame => Goaway,
    WindowUpdateFrame => WindowUpdate,
    ContinuationFrame => Continuation,
}
