//! Client side of an HTTP/2 connection as an in-memory state machine.
//!
//! The session never touches a socket. Bytes read from the peer are fed with
//! [`ClientSession::mem_recv`], bytes to transmit are taken with
//! [`ClientSession::mem_send`], and everything the application reacts to is
//! queued as [`SessionEvent`]s and drained with [`ClientSession::poll_event`].

use std::collections::BTreeMap;
use std::collections::VecDeque;

use bytes::Bytes;
use bytes::BytesMut;

use crate::codec::write_buffer::WriteBuffer;
use crate::error::Error;
use crate::hpack;
use crate::result;
use crate::solicit::closed_streams::ClosedStreams;
use crate::solicit::error_code::ErrorCode;
use crate::solicit::error_code::ErrorCodeOrUnknown;
use crate::solicit::frame::unpack_header_from_slice;
use crate::solicit::frame::ContinuationFrame;
use crate::solicit::frame::DataFrame;
use crate::solicit::frame::FrameIR;
use crate::solicit::frame::GoawayFrame;
use crate::solicit::frame::HeadersFrame;
use crate::solicit::frame::HeadersMultiFrame;
use crate::solicit::frame::HttpFrame;
use crate::solicit::frame::HttpFrameType;
use crate::solicit::frame::HttpSetting;
use crate::solicit::frame::HttpSettings;
use crate::solicit::frame::PingFrame;
use crate::solicit::frame::PushPromiseFrame;
use crate::solicit::frame::RawFrame;
use crate::solicit::frame::RstStreamFrame;
use crate::solicit::frame::SettingsFrame;
use crate::solicit::frame::WindowUpdateFrame;
use crate::solicit::frame::FRAME_HEADER_LEN;
use crate::solicit::header::Headers;
use crate::solicit::stream_id::is_client_initiated;
use crate::solicit::stream_id::StreamId;
use crate::solicit::stream_id::FIRST_CLIENT_STREAM_ID;
use crate::solicit::stream_id::MAX_STREAM_ID;
use crate::solicit::window_size::InWindow;
use crate::solicit::window_size::WindowSize;
use crate::solicit::window_size::MAX_WINDOW_SIZE;
use crate::solicit::DEFAULT_SETTINGS;

/// Stream states of section 5.1 a client stream passes through.
///
/// Requests are sent with `END_STREAM`, so a stream is created
/// `HalfClosedLocal` when its `HEADERS` are serialized and only the remote
/// side is left to close.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StreamState {
    HalfClosedLocal,
    Closed,
}

impl StreamState {
    /// Returns whether the remote peer has closed the stream.
    pub fn is_closed_remote(&self) -> bool {
        *self == StreamState::Closed
    }
}

/// Identifies a submitted request until it is assigned a stream id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(u32);

/// Role of a header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadersCategory {
    /// Request headers opening a stream.
    Request,
    /// First header block the peer sends on a stream, including 1xx responses.
    Response,
    /// Any later block, i.e. trailers.
    Headers,
}

/// A frame is about to be serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSendInfo {
    pub frame_type: HttpFrameType,
    pub stream_id: StreamId,
    /// Set for `HEADERS` only.
    pub category: Option<HeadersCategory>,
    /// Set for request `HEADERS` only.
    pub request: Option<RequestToken>,
}

/// A frame was received and processed.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecvInfo {
    pub frame_type: HttpFrameType,
    pub stream_id: StreamId,
    pub end_stream: bool,
    /// Decoded header block of a `HEADERS` frame (with its `CONTINUATION`s).
    pub headers: Option<(HeadersCategory, Headers)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    BeforeFrameSend(FrameSendInfo),
    FrameRecv(FrameRecvInfo),
    DataChunkRecv {
        stream_id: StreamId,
        data: Bytes,
    },
    StreamClose {
        stream_id: StreamId,
        error_code: ErrorCodeOrUnknown,
    },
}

#[derive(Debug)]
struct Stream {
    state: StreamState,
    /// A non-informational response has been received.
    final_response: bool,
    in_window: InWindow,
    out_window: WindowSize,
}

#[derive(Debug, Clone, Copy)]
enum HeaderBlockKind {
    Headers { end_stream: bool },
    PushPromise { promised_stream_id: StreamId },
}

/// Header block waiting for `CONTINUATION` frames.
#[derive(Debug)]
struct PartialHeaderBlock {
    stream_id: StreamId,
    kind: HeaderBlockKind,
    fragment: BytesMut,
}

/// What is known about a stream id that may not be in the stream table.
#[derive(Debug, PartialEq, Eq)]
enum StreamLookup {
    Active,
    Idle,
    /// Reset by us, frames are ignored.
    Ignored,
    Closed,
}

fn conn_error<T>(code: ErrorCode, message: String) -> result::Result<T> {
    Err(Error::ProtocolError(code, message))
}

/// Allowed `SETTINGS_MAX_FRAME_SIZE` values.
const FRAME_SIZE_RANGE: std::ops::RangeInclusive<u32> = 0x4000..=0xff_ffff;

/// Values a server may not send, section 6.5.2.
fn validate_peer_setting(setting: &HttpSetting) -> result::Result<()> {
    match *setting {
        HttpSetting::EnablePush(0) => Ok(()),
        // push is never offered to a server, and 1 is the only other valid value
        HttpSetting::EnablePush(val) => conn_error(
            ErrorCode::ProtocolError,
            format!("server attempted to enable push: {}", val),
        ),
        HttpSetting::InitialWindowSize(val) if val > MAX_WINDOW_SIZE => conn_error(
            ErrorCode::FlowControlError,
            format!("initial window size {} too large", val),
        ),
        HttpSetting::MaxFrameSize(val) if !FRAME_SIZE_RANGE.contains(&val) => conn_error(
            ErrorCode::ProtocolError,
            format!("max frame size {} out of range", val),
        ),
        _ => Ok(()),
    }
}

/// Client session: protocol state of one HTTP/2 connection.
#[derive(Debug)]
pub struct ClientSession {
    recv_buf: BytesMut,
    /// The peer preface (a `SETTINGS` frame) has been received.
    settings_received: bool,
    local_settings: HttpSettings,
    /// Sent `SETTINGS` waiting for ACK.
    pending_local_settings: VecDeque<Vec<HttpSetting>>,
    peer_settings: HttpSettings,
    encoder: hpack::Encoder,
    decoder: hpack::Decoder,
    streams: BTreeMap<StreamId, Stream>,
    closed_streams: ClosedStreams,
    next_stream_id: StreamId,
    last_promised_stream_id: StreamId,
    next_request_token: u32,
    pending_requests: VecDeque<(RequestToken, Headers)>,
    control_queue: VecDeque<HttpFrame>,
    partial_header_block: Option<PartialHeaderBlock>,
    in_window: InWindow,
    out_window: WindowSize,
    events: VecDeque<SessionEvent>,
    goaway_queued: bool,
    goaway_sent: bool,
    goaway_received: Option<StreamId>,
    /// A connection error happened; nothing more is read or written.
    terminated: bool,
}

impl Default for ClientSession {
    fn default() -> Self {
        ClientSession::new()
    }
}

impl ClientSession {
    pub fn new() -> ClientSession {
        ClientSession {
            recv_buf: BytesMut::new(),
            settings_received: false,
            local_settings: DEFAULT_SETTINGS,
            pending_local_settings: VecDeque::new(),
            peer_settings: DEFAULT_SETTINGS,
            encoder: hpack::Encoder::new(),
            decoder: hpack::Decoder::with_max_size(DEFAULT_SETTINGS.header_table_size as usize),
            streams: BTreeMap::new(),
            closed_streams: ClosedStreams::new(),
            next_stream_id: FIRST_CLIENT_STREAM_ID,
            last_promised_stream_id: 0,
            next_request_token: 0,
            pending_requests: VecDeque::new(),
            control_queue: VecDeque::new(),
            partial_header_block: None,
            in_window: InWindow::new(DEFAULT_SETTINGS.initial_window_size),
            out_window: WindowSize::new(DEFAULT_SETTINGS.initial_window_size as i32),
            events: VecDeque::new(),
            goaway_queued: false,
            goaway_sent: false,
            goaway_received: None,
            terminated: false,
        }
    }

    pub fn peer_settings(&self) -> &HttpSettings {
        &self.peer_settings
    }

    pub fn local_settings(&self) -> &HttpSettings {
        &self.local_settings
    }

    pub fn num_active_streams(&self) -> usize {
        self.streams.len()
    }

    pub fn is_goaway_sent(&self) -> bool {
        self.goaway_sent
    }

    pub fn goaway_received(&self) -> Option<StreamId> {
        self.goaway_received
    }

    /// Queue a `SETTINGS` frame. The values take effect locally once acknowledged.
    pub fn submit_settings(&mut self, settings: &[HttpSetting]) -> result::Result<()> {
        if self.terminated {
            return Err(Error::SessionClosed);
        }
        self.pending_local_settings.push_back(settings.to_vec());
        self.control_queue
            .push_back(SettingsFrame::from_settings(settings.to_vec()).into());
        Ok(())
    }

    /// Queue a request without body. The stream id is assigned when its
    /// `HEADERS` frame is serialized, see [`SessionEvent::BeforeFrameSend`].
    pub fn submit_request(&mut self, headers: Headers) -> result::Result<RequestToken> {
        if self.terminated || self.goaway_queued || self.goaway_received.is_some() {
            return Err(Error::SessionClosed);
        }
        let token = RequestToken(self.next_request_token);
        self.next_request_token += 1;
        self.pending_requests.push_back((token, headers));
        Ok(token)
    }

    /// Queue a `GOAWAY` frame. No new stream is opened afterwards.
    pub fn submit_goaway(&mut self, error_code: ErrorCode) -> result::Result<()> {
        if self.terminated {
            return Err(Error::SessionClosed);
        }
        if self.goaway_queued {
            return Ok(());
        }
        self.goaway_queued = true;
        // Every pushed stream is refused, so no peer-initiated stream was processed.
        self.control_queue
            .push_back(GoawayFrame::new(0, error_code).into());
        Ok(())
    }

    /// The session expects more frames from the peer.
    pub fn want_read(&self) -> bool {
        if self.terminated {
            return false;
        }
        let goaway = self.goaway_sent || self.goaway_received.is_some();
        !(goaway && self.streams.is_empty())
    }

    /// The session has frames to serialize.
    pub fn want_write(&self) -> bool {
        if self.terminated {
            return false;
        }
        !self.control_queue.is_empty() || self.can_open_stream()
    }

    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    fn can_open_stream(&self) -> bool {
        !self.pending_requests.is_empty()
            && !self.goaway_queued
            && self.goaway_received.is_none()
            && (self.streams.len() as u64) < self.peer_settings.max_concurrent_streams as u64
            && self.next_stream_id <= MAX_STREAM_ID
    }

    /// Serialize everything that may be sent now: control frames first, then
    /// request `HEADERS` within the peer's concurrency limit.
    pub fn mem_send(&mut self) -> Bytes {
        let mut buf = WriteBuffer::new();
        if self.terminated {
            return buf.take();
        }

        while let Some(frame) = self.control_queue.pop_front() {
            if let HttpFrame::Goaway(..) = frame {
                self.goaway_sent = true;
            }
            self.events
                .push_back(SessionEvent::BeforeFrameSend(FrameSendInfo {
                    frame_type: frame.frame_type(),
                    stream_id: frame.get_stream_id(),
                    category: None,
                    request: None,
                }));
            debug!("send frame {:?}", frame.frame_type());
            frame.serialize_into(&mut buf);
        }

        while self.can_open_stream() {
            let (token, headers) = match self.pending_requests.pop_front() {
                Some(r) => r,
                None => break,
            };
            let stream_id = self.next_stream_id;
            self.next_stream_id += 2;

            self.streams.insert(
                stream_id,
                Stream {
                    state: StreamState::HalfClosedLocal,
                    final_response: false,
                    in_window: InWindow::new(self.local_settings.initial_window_size),
                    out_window: WindowSize::new(self.peer_settings.initial_window_size as i32),
                },
            );

            self.events
                .push_back(SessionEvent::BeforeFrameSend(FrameSendInfo {
                    frame_type: HttpFrameType::Headers,
                    stream_id,
                    category: Some(HeadersCategory::Request),
                    request: Some(token),
                }));
            debug!("send request HEADERS on stream {}", stream_id);

            let header_block = Bytes::from(self.encoder.encode(headers.iter()));
            HeadersMultiFrame {
                stream_id,
                header_block,
                end_stream: true,
                max_frame_size: self.peer_settings.max_frame_size,
            }
            .serialize_into(&mut buf);
        }

        buf.take()
    }

    /// Feed bytes received from the peer. Incomplete frames are buffered.
    ///
    /// Returns the number of bytes consumed, which is always all of them. An
    /// error is a connection error and leaves the session terminated.
    pub fn mem_recv(&mut self, data: &[u8]) -> result::Result<usize> {
        if self.terminated {
            return Err(Error::SessionClosed);
        }
        self.recv_buf.extend_from_slice(data);
        if let Err(e) = self.recv_buffered_frames() {
            warn!("connection error: {}", e);
            self.terminated = true;
            return Err(e);
        }
        Ok(data.len())
    }

    fn recv_buffered_frames(&mut self) -> result::Result<()> {
        loop {
            let header = match unpack_header_from_slice(&self.recv_buf) {
                Some(header) => header,
                None => return Ok(()),
            };
            if header.payload_len > self.local_settings.max_frame_size {
                return conn_error(
                    ErrorCode::FrameSizeError,
                    format!("frame of {} bytes", header.payload_len),
                );
            }
            let len = FRAME_HEADER_LEN + header.payload_len as usize;
            if self.recv_buf.len() < len {
                return Ok(());
            }
            let raw_frame = RawFrame {
                raw_content: self.recv_buf.split_to(len).freeze(),
            };
            self.recv_frame(raw_frame)?;
        }
    }

    fn recv_frame(&mut self, raw_frame: RawFrame) -> result::Result<()> {
        let frame = HttpFrame::from_raw(&raw_frame)?;
        debug!(
            "received frame {:?} on stream {}",
            frame.frame_type(),
            frame.get_stream_id()
        );

        if !self.settings_received {
            match frame {
                HttpFrame::Settings(ref f) if !f.is_ack() => self.settings_received = true,
                _ => {
                    return conn_error(
                        ErrorCode::ProtocolError,
                        format!("expecting SETTINGS, got {}", frame.frame_type()),
                    )
                }
            }
        }

        if let Some(partial) = &self.partial_header_block {
            match frame {
                HttpFrame::Continuation(ref f) if f.stream_id == partial.stream_id => {}
                _ => {
                    return conn_error(
                        ErrorCode::ProtocolError,
                        format!(
                            "expecting CONTINUATION on stream {}, got {}",
                            partial.stream_id,
                            frame.frame_type()
                        ),
                    )
                }
            }
        }

        match frame {
            HttpFrame::Data(f) => self.process_data_frame(f),
            HttpFrame::Headers(f) => self.process_headers_frame(f),
            HttpFrame::Priority(f) => {
                self.frame_recv(HttpFrameType::Priority, f.stream_id, false, None);
                Ok(())
            }
            HttpFrame::RstStream(f) => self.process_rst_stream_frame(f),
            HttpFrame::Settings(f) => self.process_settings_frame(f),
            HttpFrame::PushPromise(f) => self.process_push_promise_frame(f),
            HttpFrame::Ping(f) => self.process_ping_frame(f),
            HttpFrame::Goaway(f) => self.process_goaway_frame(f),
            HttpFrame::WindowUpdate(f) => self.process_window_update_frame(f),
            HttpFrame::Continuation(f) => self.process_continuation_frame(f),
            HttpFrame::Unknown(f) => {
                debug!("ignoring frame of unknown type {}", f.frame_type());
                Ok(())
            }
        }
    }

    fn lookup(&self, stream_id: StreamId) -> StreamLookup {
        if self.streams.contains_key(&stream_id) {
            StreamLookup::Active
        } else if self.closed_streams.contains(stream_id) {
            StreamLookup::Ignored
        } else if is_client_initiated(stream_id) {
            if stream_id >= self.next_stream_id {
                StreamLookup::Idle
            } else {
                StreamLookup::Closed
            }
        } else if stream_id > self.last_promised_stream_id {
            StreamLookup::Idle
        } else {
            // promised streams are all refused
            StreamLookup::Ignored
        }
    }

    fn frame_recv(
        &mut self,
        frame_type: HttpFrameType,
        stream_id: StreamId,
        end_stream: bool,
        headers: Option<(HeadersCategory, Headers)>,
    ) {
        self.events.push_back(SessionEvent::FrameRecv(FrameRecvInfo {
            frame_type,
            stream_id,
            end_stream,
            headers,
        }));
    }

    fn queue_rst_stream(&mut self, stream_id: StreamId, error_code: ErrorCode) {
        self.control_queue
            .push_back(RstStreamFrame::new(stream_id, error_code).into());
    }

    fn close_stream(&mut self, stream_id: StreamId, error_code: ErrorCodeOrUnknown) {
        if self.streams.remove(&stream_id).is_some() {
            debug!("stream {} closed with {}", stream_id, error_code);
            self.events.push_back(SessionEvent::StreamClose {
                stream_id,
                error_code,
            });
        }
    }

    /// Reset an active stream because of a stream error.
    fn stream_error(&mut self, stream_id: StreamId, error_code: ErrorCode) {
        warn!("stream {} error: {}", stream_id, error_code);
        self.queue_rst_stream(stream_id, error_code);
        self.closed_streams.add(stream_id);
        self.close_stream(stream_id, error_code.into());
    }

    fn close_remote(&mut self, stream_id: StreamId) {
        let closed = match self.streams.get_mut(&stream_id) {
            Some(stream) if !stream.state.is_closed_remote() => {
                stream.state = StreamState::Closed;
                true
            }
            Some(..) => false,
            None => false,
        };
        if closed {
            self.close_stream(stream_id, ErrorCode::NoError.into());
        }
    }

    fn process_data_frame(&mut self, frame: DataFrame) -> result::Result<()> {
        let stream_id = frame.stream_id;
        if self.in_window.recv(frame.payload_len()).is_err() {
            return conn_error(
                ErrorCode::FlowControlError,
                format!("DATA of {} bytes overruns connection window", frame.payload_len()),
            );
        }

        match self.lookup(stream_id) {
            StreamLookup::Idle => {
                return conn_error(
                    ErrorCode::ProtocolError,
                    format!("DATA on idle stream {}", stream_id),
                )
            }
            StreamLookup::Ignored => {}
            StreamLookup::Closed => self.queue_rst_stream(stream_id, ErrorCode::StreamClosed),
            StreamLookup::Active => self.process_stream_data(frame),
        }

        if let Some(increment) = self.in_window.take_update() {
            self.control_queue
                .push_back(WindowUpdateFrame::for_connection(increment).into());
        }
        Ok(())
    }

    fn process_stream_data(&mut self, frame: DataFrame) {
        let stream_id = frame.stream_id;
        let end_stream = frame.is_end_of_stream();

        let stream = match self.streams.get_mut(&stream_id) {
            Some(stream) => stream,
            None => return,
        };
        let error = if stream.state.is_closed_remote() {
            Some(ErrorCode::StreamClosed)
        } else if !stream.final_response {
            Some(ErrorCode::ProtocolError)
        } else if stream.in_window.recv(frame.payload_len()).is_err() {
            Some(ErrorCode::FlowControlError)
        } else {
            None
        };
        if let Some(error_code) = error {
            self.stream_error(stream_id, error_code);
            return;
        }
        let window_update = if end_stream {
            None
        } else {
            stream.in_window.take_update()
        };

        if !frame.data.is_empty() {
            self.events.push_back(SessionEvent::DataChunkRecv {
                stream_id,
                data: frame.data,
            });
        }
        self.frame_recv(HttpFrameType::Data, stream_id, end_stream, None);
        if let Some(increment) = window_update {
            self.control_queue
                .push_back(WindowUpdateFrame::for_stream(stream_id, increment).into());
        }
        if end_stream {
            self.close_remote(stream_id);
        }
    }

    fn process_headers_frame(&mut self, frame: HeadersFrame) -> result::Result<()> {
        let kind = HeaderBlockKind::Headers {
            end_stream: frame.is_end_of_stream(),
        };
        if frame.is_headers_end() {
            self.process_header_block(frame.stream_id, kind, &frame.header_fragment)
        } else {
            self.partial_header_block = Some(PartialHeaderBlock {
                stream_id: frame.stream_id,
                kind,
                fragment: BytesMut::from(&frame.header_fragment[..]),
            });
            Ok(())
        }
    }

    fn process_push_promise_frame(&mut self, frame: PushPromiseFrame) -> result::Result<()> {
        let kind = HeaderBlockKind::PushPromise {
            promised_stream_id: frame.promised_stream_id,
        };
        if frame.is_headers_end() {
            self.process_header_block(frame.stream_id, kind, &frame.header_fragment)
        } else {
            self.partial_header_block = Some(PartialHeaderBlock {
                stream_id: frame.stream_id,
                kind,
                fragment: BytesMut::from(&frame.header_fragment[..]),
            });
            Ok(())
        }
    }

    fn process_continuation_frame(&mut self, frame: ContinuationFrame) -> result::Result<()> {
        let mut partial = match self.partial_header_block.take() {
            Some(partial) => partial,
            None => {
                return conn_error(
                    ErrorCode::ProtocolError,
                    format!("CONTINUATION without HEADERS on stream {}", frame.stream_id),
                )
            }
        };
        partial.fragment.extend_from_slice(&frame.header_fragment);
        if frame.is_headers_end() {
            self.process_header_block(partial.stream_id, partial.kind, &partial.fragment)
        } else {
            self.partial_header_block = Some(partial);
            Ok(())
        }
    }

    fn process_header_block(
        &mut self,
        stream_id: StreamId,
        kind: HeaderBlockKind,
        block: &[u8],
    ) -> result::Result<()> {
        // decoded even when the stream is gone, the peer's table must stay in sync
        let headers = self.decoder.decode(block)?;
        match kind {
            HeaderBlockKind::Headers { end_stream } => {
                self.process_headers(stream_id, headers, end_stream)
            }
            HeaderBlockKind::PushPromise { promised_stream_id } => {
                self.process_push_promise(stream_id, promised_stream_id)
            }
        }
    }

    fn process_headers(
        &mut self,
        stream_id: StreamId,
        headers: Headers,
        end_stream: bool,
    ) -> result::Result<()> {
        match self.lookup(stream_id) {
            StreamLookup::Idle => {
                return conn_error(
                    ErrorCode::ProtocolError,
                    format!("HEADERS on idle stream {}", stream_id),
                )
            }
            StreamLookup::Ignored => return Ok(()),
            StreamLookup::Closed => {
                self.queue_rst_stream(stream_id, ErrorCode::StreamClosed);
                return Ok(());
            }
            StreamLookup::Active => {}
        }

        let stream = match self.streams.get_mut(&stream_id) {
            Some(stream) => stream,
            None => return Ok(()),
        };

        let category = if stream.state.is_closed_remote() {
            None
        } else if !stream.final_response {
            match headers.status() {
                Some(status) if status >= 100 && status < 200 => {
                    if end_stream {
                        None
                    } else {
                        Some(HeadersCategory::Response)
                    }
                }
                Some(status) if status >= 200 && status < 1000 => {
                    stream.final_response = true;
                    Some(HeadersCategory::Response)
                }
                _ => None,
            }
        } else if end_stream {
            Some(HeadersCategory::Headers)
        } else {
            // trailers must end the stream
            None
        };

        let category = match category {
            Some(category) => category,
            None => {
                let error_code = if stream.state.is_closed_remote() {
                    ErrorCode::StreamClosed
                } else {
                    ErrorCode::ProtocolError
                };
                self.stream_error(stream_id, error_code);
                return Ok(());
            }
        };

        self.frame_recv(
            HttpFrameType::Headers,
            stream_id,
            end_stream,
            Some((category, headers)),
        );
        if end_stream {
            self.close_remote(stream_id);
        }
        Ok(())
    }

    fn process_push_promise(
        &mut self,
        stream_id: StreamId,
        promised_stream_id: StreamId,
    ) -> result::Result<()> {
        if is_client_initiated(promised_stream_id)
            || promised_stream_id <= self.last_promised_stream_id
        {
            return conn_error(
                ErrorCode::ProtocolError,
                format!("invalid promised stream id {}", promised_stream_id),
            );
        }
        if self.lookup(stream_id) == StreamLookup::Idle {
            return conn_error(
                ErrorCode::ProtocolError,
                format!("PUSH_PROMISE on idle stream {}", stream_id),
            );
        }

        self.last_promised_stream_id = promised_stream_id;
        self.frame_recv(HttpFrameType::PushPromise, stream_id, false, None);

        debug!("refusing pushed stream {}", promised_stream_id);
        self.queue_rst_stream(promised_stream_id, ErrorCode::RefusedStream);
        self.closed_streams.add(promised_stream_id);
        Ok(())
    }

    fn process_rst_stream_frame(&mut self, frame: RstStreamFrame) -> result::Result<()> {
        let stream_id = frame.stream_id;
        match self.lookup(stream_id) {
            StreamLookup::Idle => conn_error(
                ErrorCode::ProtocolError,
                format!("RST_STREAM on idle stream {}", stream_id),
            ),
            StreamLookup::Active => {
                self.frame_recv(HttpFrameType::RstStream, stream_id, false, None);
                self.close_stream(stream_id, frame.error_code());
                Ok(())
            }
            StreamLookup::Ignored | StreamLookup::Closed => Ok(()),
        }
    }

    fn process_settings_frame(&mut self, frame: SettingsFrame) -> result::Result<()> {
        if frame.is_ack() {
            match self.pending_local_settings.pop_front() {
                Some(settings) => self.local_settings.apply_all(&settings),
                None => {
                    return conn_error(
                        ErrorCode::ProtocolError,
                        "SETTINGS ACK without SETTINGS sent".to_owned(),
                    )
                }
            }
        } else {
            for setting in &frame.settings {
                validate_peer_setting(setting)?;
            }
            for setting in &frame.settings {
                if let HttpSetting::InitialWindowSize(new_size) = *setting {
                    let delta = new_size as i32 - self.peer_settings.initial_window_size as i32;
                    for stream in self.streams.values_mut() {
                        if stream.out_window.try_add(delta).is_err() {
                            return conn_error(
                                ErrorCode::FlowControlError,
                                format!("initial window size {} overflows", new_size),
                            );
                        }
                    }
                }
                self.peer_settings.apply(*setting);
            }
            self.control_queue.push_back(SettingsFrame::new_ack().into());
        }

        self.frame_recv(HttpFrameType::Settings, 0, false, None);
        Ok(())
    }

    fn process_ping_frame(&mut self, frame: PingFrame) -> result::Result<()> {
        if !frame.is_ack() {
            self.control_queue
                .push_back(PingFrame::new_ack(frame.opaque_data).into());
        }
        self.frame_recv(HttpFrameType::Ping, 0, false, None);
        Ok(())
    }

    fn process_goaway_frame(&mut self, frame: GoawayFrame) -> result::Result<()> {
        let last_stream_id = match self.goaway_received {
            Some(prev) if prev < frame.last_stream_id => prev,
            _ => frame.last_stream_id,
        };
        let level = if frame.is_graceful() {
            log::Level::Info
        } else {
            log::Level::Warn
        };
        log!(
            level,
            "GOAWAY received: last_stream_id={} error_code={} debug_data={:?}",
            frame.last_stream_id,
            frame.error_code(),
            String::from_utf8_lossy(&frame.debug_data)
        );
        self.goaway_received = Some(last_stream_id);
        self.frame_recv(HttpFrameType::Goaway, 0, false, None);

        let refused: Vec<StreamId> = self
            .streams
            .keys()
            .cloned()
            .filter(|&stream_id| stream_id > last_stream_id)
            .collect();
        for stream_id in refused {
            self.close_stream(stream_id, ErrorCode::RefusedStream.into());
        }
        self.pending_requests.clear();
        Ok(())
    }

    fn process_window_update_frame(&mut self, frame: WindowUpdateFrame) -> result::Result<()> {
        let stream_id = frame.stream_id;
        if stream_id == 0 {
            if frame.increment == 0 {
                return conn_error(
                    ErrorCode::ProtocolError,
                    "connection WINDOW_UPDATE of 0".to_owned(),
                );
            }
            if self.out_window.try_increase(frame.increment).is_err() {
                return conn_error(
                    ErrorCode::FlowControlError,
                    format!("connection window overflow by {}", frame.increment),
                );
            }
        } else {
            match self.lookup(stream_id) {
                StreamLookup::Idle => {
                    return conn_error(
                        ErrorCode::ProtocolError,
                        format!("WINDOW_UPDATE on idle stream {}", stream_id),
                    )
                }
                StreamLookup::Active if frame.increment == 0 => {
                    self.stream_error(stream_id, ErrorCode::ProtocolError);
                    return Ok(());
                }
                StreamLookup::Active => {
                    let overflow = match self.streams.get_mut(&stream_id) {
                        Some(stream) => stream.out_window.try_increase(frame.increment).is_err(),
                        None => false,
                    };
                    if overflow {
                        self.stream_error(stream_id, ErrorCode::FlowControlError);
                        return Ok(());
                    }
                }
                StreamLookup::Ignored | StreamLookup::Closed => return Ok(()),
            }
        }
        self.frame_recv(HttpFrameType::WindowUpdate, stream_id, false, None);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::solicit::frame::ContinuationFlag;
    use crate::solicit::frame::DataFlag;
    use crate::solicit::frame::HeadersFlag;
    use crate::solicit::header::Header;

    fn request_headers() -> Headers {
        let mut headers = Headers::new();
        headers.add(":method", "GET");
        headers.add(":scheme", "https");
        headers.add(":authority", "example.test");
        headers.add(":path", "/");
        headers
    }

    fn events(session: &mut ClientSession) -> Vec<SessionEvent> {
        let mut r = Vec::new();
        while let Some(e) = session.poll_event() {
            r.push(e);
        }
        r
    }

    /// Parse everything the session sent.
    fn sent_frames(bytes: Bytes) -> Vec<HttpFrame> {
        let mut frames = Vec::new();
        let mut rem = bytes;
        while !rem.is_empty() {
            let raw = RawFrame::parse(&rem).expect("complete frame");
            rem = rem.slice(raw.len()..);
            frames.push(HttpFrame::from_raw(&raw).unwrap());
        }
        frames
    }

    fn encode(headers: &[(&'static str, &'static str)]) -> Bytes {
        let headers: Vec<Header> = headers.iter().map(|&(n, v)| Header::new(n, v)).collect();
        Bytes::from(hpack::Encoder::new().encode(&headers))
    }

    fn response_headers(stream_id: StreamId, end_stream: bool) -> Vec<u8> {
        let mut frame = HeadersFrame::new(encode(&[(":status", "200")]), stream_id);
        frame.set_flag(HeadersFlag::EndHeaders);
        if end_stream {
            frame.set_flag(HeadersFlag::EndStream);
        }
        frame.serialize_into_vec()
    }

    fn data(stream_id: StreamId, data: &'static [u8], end_stream: bool) -> Vec<u8> {
        let mut frame = DataFrame::with_data(stream_id, data);
        if end_stream {
            frame.set_flag(DataFlag::EndStream);
        }
        frame.serialize_into_vec()
    }

    fn server_settings() -> Vec<u8> {
        SettingsFrame::from_settings(vec![HttpSetting::MaxConcurrentStreams(100)]).serialize_into_vec()
    }

    /// Session that sent SETTINGS and one request on stream 1, and received
    /// the server SETTINGS.
    fn established() -> ClientSession {
        let mut session = ClientSession::new();
        session
            .submit_settings(&[HttpSetting::MaxConcurrentStreams(100)])
            .unwrap();
        session.submit_request(request_headers()).unwrap();
        session.mem_send();
        session.mem_recv(&server_settings()).unwrap();
        session.mem_send();
        events(&mut session);
        session
    }

    #[test]
    fn request_gets_stream_id_on_send() {
        let mut session = ClientSession::new();
        session
            .submit_settings(&[HttpSetting::MaxConcurrentStreams(100)])
            .unwrap();
        let token = session.submit_request(request_headers()).unwrap();
        assert!(session.want_write());
        assert!(events(&mut session).is_empty());

        let frames = sent_frames(session.mem_send());
        assert_eq!(2, frames.len());
        match &frames[0] {
            HttpFrame::Settings(f) => {
                assert_eq!(vec![HttpSetting::MaxConcurrentStreams(100)], f.settings)
            }
            f => panic!("unexpected frame {:?}", f),
        }
        match &frames[1] {
            HttpFrame::Headers(f) => {
                assert_eq!(1, f.stream_id);
                assert!(f.is_end_of_stream());
                assert!(f.is_headers_end());
                let decoded = hpack::Decoder::new().decode(&f.header_fragment).unwrap();
                assert_eq!(request_headers(), decoded);
            }
            f => panic!("unexpected frame {:?}", f),
        }

        let events = events(&mut session);
        assert_eq!(
            SessionEvent::BeforeFrameSend(FrameSendInfo {
                frame_type: HttpFrameType::Headers,
                stream_id: 1,
                category: Some(HeadersCategory::Request),
                request: Some(token),
            }),
            events[1]
        );
        assert!(!session.want_write());
        assert!(session.want_read());
    }

    #[test]
    fn full_exchange_then_goaway() {
        let mut session = established();

        let mut input = response_headers(1, false);
        input.extend(data(1, b"hello", true));
        assert_eq!(input.len(), session.mem_recv(&input).unwrap());

        let events = events(&mut session);
        assert_eq!(4, events.len());
        match &events[0] {
            SessionEvent::FrameRecv(FrameRecvInfo {
                frame_type: HttpFrameType::Headers,
                stream_id: 1,
                end_stream: false,
                headers: Some((HeadersCategory::Response, headers)),
            }) => assert_eq!(Some(200), headers.status()),
            e => panic!("unexpected event {:?}", e),
        }
        assert_eq!(
            SessionEvent::DataChunkRecv {
                stream_id: 1,
                data: Bytes::from_static(b"hello"),
            },
            events[1]
        );
        assert_eq!(
            SessionEvent::StreamClose {
                stream_id: 1,
                error_code: ErrorCodeOrUnknown(0),
            },
            events[3]
        );

        assert!(session.want_read());
        session.submit_goaway(ErrorCode::NoError).unwrap();
        assert!(session.want_write());
        let frames = sent_frames(session.mem_send());
        match &frames[..] {
            [HttpFrame::Goaway(f)] => {
                assert_eq!(ErrorCodeOrUnknown(0), f.error_code());
                assert_eq!(0, f.last_stream_id);
            }
            f => panic!("unexpected frames {:?}", f),
        }
        assert!(session.is_goaway_sent());
        assert!(!session.want_read());
        assert!(!session.want_write());
    }

    #[test]
    fn partial_frames_are_buffered() {
        let mut session = established();
        let input = response_headers(1, true);
        for b in &input {
            assert_eq!(1, session.mem_recv(&[*b]).unwrap());
        }
        let events = events(&mut session);
        assert_eq!(2, events.len());
        match &events[1] {
            SessionEvent::StreamClose { stream_id: 1, .. } => {}
            e => panic!("unexpected event {:?}", e),
        }
    }

    #[test]
    fn invalid_server_settings() {
        let cases = vec![
            (HttpSetting::EnablePush(1), ErrorCode::ProtocolError),
            (HttpSetting::EnablePush(2), ErrorCode::ProtocolError),
            (HttpSetting::InitialWindowSize(1 << 31), ErrorCode::FlowControlError),
            (HttpSetting::MaxFrameSize(16383), ErrorCode::ProtocolError),
            (HttpSetting::MaxFrameSize(1 << 24), ErrorCode::ProtocolError),
        ];
        for (setting, code) in cases {
            let mut session = ClientSession::new();
            session.submit_request(request_headers()).unwrap();
            session.mem_send();
            let frame = SettingsFrame::from_settings(vec![setting]).serialize_into_vec();
            match session.mem_recv(&frame) {
                Err(Error::ProtocolError(c, _)) => assert_eq!(code, c, "{:?}", setting),
                r => panic!("unexpected result for {:?}: {:?}", setting, r),
            }
        }
    }

    #[test]
    fn boundary_server_settings_are_applied() {
        let mut session = ClientSession::new();
        let frame = SettingsFrame::from_settings(vec![
            HttpSetting::EnablePush(0),
            HttpSetting::MaxFrameSize(0xff_ffff),
            HttpSetting::InitialWindowSize(MAX_WINDOW_SIZE),
        ])
        .serialize_into_vec();
        session.mem_recv(&frame).unwrap();
        match &sent_frames(session.mem_send())[..] {
            [HttpFrame::Settings(ack)] => assert!(ack.is_ack()),
            f => panic!("unexpected frames {:?}", f),
        }
    }

    #[test]
    fn first_frame_must_be_settings() {
        let mut session = ClientSession::new();
        session.submit_request(request_headers()).unwrap();
        session.mem_send();
        match session.mem_recv(&PingFrame::with_data(1).serialize_into_vec()) {
            Err(Error::ProtocolError(ErrorCode::ProtocolError, _)) => {}
            r => panic!("unexpected result {:?}", r),
        }
        assert!(!session.want_read());
        assert!(!session.want_write());
        assert!(session.mem_recv(&server_settings()).is_err());
    }

    #[test]
    fn settings_are_acked_and_applied() {
        let mut session = ClientSession::new();
        session
            .submit_settings(&[HttpSetting::MaxConcurrentStreams(100)])
            .unwrap();
        session.mem_send();
        let settings = SettingsFrame::from_settings(vec![
            HttpSetting::MaxFrameSize(20000),
            HttpSetting::InitialWindowSize(1000),
        ]);
        session.mem_recv(&settings.serialize_into_vec()).unwrap();
        assert_eq!(20000, session.peer_settings().max_frame_size);
        assert_eq!(1000, session.peer_settings().initial_window_size);

        match &sent_frames(session.mem_send())[..] {
            [HttpFrame::Settings(f)] => assert!(f.is_ack()),
            f => panic!("unexpected frames {:?}", f),
        }

        assert_eq!(u32::MAX, session.local_settings().max_concurrent_streams);
        session
            .mem_recv(&SettingsFrame::new_ack().serialize_into_vec())
            .unwrap();
        assert_eq!(100, session.local_settings().max_concurrent_streams);

        // nothing left to acknowledge
        assert!(session
            .mem_recv(&SettingsFrame::new_ack().serialize_into_vec())
            .is_err());
    }

    #[test]
    fn ping_is_acked() {
        let mut session = established();
        session
            .mem_recv(&PingFrame::with_data(0x1122334455667788).serialize_into_vec())
            .unwrap();
        match &sent_frames(session.mem_send())[..] {
            [HttpFrame::Ping(f)] => {
                assert!(f.is_ack());
                assert_eq!(0x1122334455667788, f.opaque_data);
            }
            f => panic!("unexpected frames {:?}", f),
        }
    }

    #[test]
    fn headers_with_continuation() {
        let mut session = established();
        let block = encode(&[(":status", "200"), ("x-long", "abcdefgh")]);
        let mut headers = HeadersFrame::new(block.slice(..3), 1);
        headers.set_flag(HeadersFlag::EndStream);
        let mut continuation = ContinuationFrame::new(block.slice(3..), 1);
        continuation.set_flag(ContinuationFlag::EndHeaders);

        session.mem_recv(&headers.serialize_into_vec()).unwrap();
        assert!(events(&mut session).is_empty());
        session.mem_recv(&continuation.serialize_into_vec()).unwrap();

        let events = events(&mut session);
        match &events[0] {
            SessionEvent::FrameRecv(FrameRecvInfo {
                headers: Some((HeadersCategory::Response, headers)),
                end_stream: true,
                ..
            }) => assert_eq!(Some(&b"abcdefgh"[..]), headers.get_opt("x-long")),
            e => panic!("unexpected event {:?}", e),
        }
    }

    #[test]
    fn interleaved_frame_during_continuation_is_error() {
        let mut session = established();
        let headers = HeadersFrame::new(encode(&[(":status", "200")]), 1);
        session.mem_recv(&headers.serialize_into_vec()).unwrap();
        assert!(session
            .mem_recv(&PingFrame::with_data(1).serialize_into_vec())
            .is_err());
    }

    #[test]
    fn informational_then_final_response_and_trailers() {
        let mut session = established();
        let mut info = HeadersFrame::new(encode(&[(":status", "100")]), 1);
        info.set_flag(HeadersFlag::EndHeaders);
        session.mem_recv(&info.serialize_into_vec()).unwrap();
        session.mem_recv(&response_headers(1, false)).unwrap();
        let mut trailers = HeadersFrame::new(encode(&[("grpc-status", "0")]), 1);
        trailers.set_flag(HeadersFlag::EndHeaders);
        trailers.set_flag(HeadersFlag::EndStream);
        session.mem_recv(&trailers.serialize_into_vec()).unwrap();

        let categories: Vec<HeadersCategory> = events(&mut session)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::FrameRecv(FrameRecvInfo {
                    headers: Some((c, _)),
                    ..
                }) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(
            vec![
                HeadersCategory::Response,
                HeadersCategory::Response,
                HeadersCategory::Headers,
            ],
            categories
        );
    }

    #[test]
    fn data_before_response_is_stream_error() {
        let mut session = established();
        session.mem_recv(&data(1, b"x", false)).unwrap();
        assert_eq!(
            vec![SessionEvent::StreamClose {
                stream_id: 1,
                error_code: ErrorCode::ProtocolError.into(),
            }],
            events(&mut session)
        );
        match &sent_frames(session.mem_send())[..] {
            [HttpFrame::RstStream(f)] => {
                assert_eq!(1, f.stream_id);
                assert_eq!(ErrorCodeOrUnknown::from(ErrorCode::ProtocolError), f.error_code());
            }
            f => panic!("unexpected frames {:?}", f),
        }
        events(&mut session);
        // the peer may still send on the stream, which is ignored
        session.mem_recv(&data(1, b"y", true)).unwrap();
        assert!(events(&mut session).is_empty());
    }

    #[test]
    fn data_on_closed_stream_gets_rst() {
        let mut session = established();
        session.mem_recv(&response_headers(1, true)).unwrap();
        events(&mut session);
        session.mem_recv(&data(1, b"late", false)).unwrap();
        assert!(events(&mut session).is_empty());
        match &sent_frames(session.mem_send())[..] {
            [HttpFrame::RstStream(f)] => {
                assert_eq!(ErrorCodeOrUnknown::from(ErrorCode::StreamClosed), f.error_code())
            }
            f => panic!("unexpected frames {:?}", f),
        }
    }

    #[test]
    fn frames_on_idle_streams_are_connection_errors() {
        let mut session = established();
        assert!(session.mem_recv(&response_headers(3, false)).is_err());

        let mut session = established();
        assert!(session.mem_recv(&data(5, b"x", false)).is_err());
    }

    #[test]
    fn rst_stream_closes_with_its_code() {
        let mut session = established();
        session
            .mem_recv(&RstStreamFrame::new(1, ErrorCode::Cancel).serialize_into_vec())
            .unwrap();
        let events = events(&mut session);
        assert_eq!(
            SessionEvent::StreamClose {
                stream_id: 1,
                error_code: ErrorCodeOrUnknown(8),
            },
            events[1]
        );
    }

    #[test]
    fn goaway_refuses_unprocessed_streams() {
        let mut session = established();
        session
            .mem_recv(&GoawayFrame::new(0, ErrorCode::NoError).serialize_into_vec())
            .unwrap();
        let events = events(&mut session);
        assert_eq!(
            SessionEvent::StreamClose {
                stream_id: 1,
                error_code: ErrorCode::RefusedStream.into(),
            },
            events[1]
        );
        assert_eq!(Some(0), session.goaway_received());
        assert!(!session.want_read());
        assert!(session.submit_request(request_headers()).is_err());
    }

    #[test]
    fn push_promise_is_refused() {
        let mut session = established();
        let push = PushPromiseFrame {
            flags: crate::solicit::frame::flags::Flags::new(0x4),
            stream_id: 1,
            promised_stream_id: 2,
            header_fragment: encode(&[(":method", "GET"), (":path", "/pushed")]),
            padding_len: 0,
        };
        session.mem_recv(&push.serialize_into_vec()).unwrap();
        match &sent_frames(session.mem_send())[..] {
            [HttpFrame::RstStream(f)] => {
                assert_eq!(2, f.stream_id);
                assert_eq!(ErrorCodeOrUnknown::from(ErrorCode::RefusedStream), f.error_code());
            }
            f => panic!("unexpected frames {:?}", f),
        }
        // frames racing with the reset are dropped
        session.mem_recv(&response_headers(2, true)).unwrap();
        assert!(session.want_read());
    }

    #[test]
    fn window_update_after_half_window() {
        let mut session = established();
        session.mem_recv(&response_headers(1, false)).unwrap();
        let chunk = DataFrame::with_data(1, vec![0u8; 16384]).serialize_into_vec();
        session.mem_recv(&chunk).unwrap();
        assert!(!session.want_write());
        session.mem_recv(&chunk).unwrap();
        let frames = sent_frames(session.mem_send());
        let updates: Vec<(StreamId, u32)> = frames
            .iter()
            .filter_map(|f| match f {
                HttpFrame::WindowUpdate(f) => Some((f.stream_id, f.increment)),
                _ => None,
            })
            .collect();
        assert_eq!(vec![(1, 32768), (0, 32768)], updates);
    }

    #[test]
    fn zero_window_increment() {
        let mut session = established();
        session
            .mem_recv(&WindowUpdateFrame::for_stream(1, 0).serialize_into_vec())
            .unwrap();
        assert_eq!(
            vec![SessionEvent::StreamClose {
                stream_id: 1,
                error_code: ErrorCode::ProtocolError.into(),
            }],
            events(&mut session)
        );
        match &sent_frames(session.mem_send())[..] {
            [HttpFrame::RstStream(f)] => assert_eq!(1, f.stream_id),
            f => panic!("unexpected frames {:?}", f),
        }

        match session.mem_recv(&WindowUpdateFrame::for_connection(0).serialize_into_vec()) {
            Err(Error::ProtocolError(ErrorCode::ProtocolError, _)) => {}
            r => panic!("unexpected result {:?}", r),
        }
    }

    #[test]
    fn frame_too_large() {
        let mut session = established();
        let chunk = DataFrame::with_data(1, vec![0u8; 16385]).serialize_into_vec();
        match session.mem_recv(&chunk) {
            Err(Error::ProtocolError(ErrorCode::FrameSizeError, _)) => {}
            r => panic!("unexpected result {:?}", r),
        }
    }

    #[test]
    fn request_waits_for_concurrency_limit() {
        let mut session = ClientSession::new();
        session
            .mem_recv(
                &SettingsFrame::from_settings(vec![HttpSetting::MaxConcurrentStreams(0)])
                    .serialize_into_vec(),
            )
            .unwrap();
        session.submit_request(request_headers()).unwrap();
        let frames = sent_frames(session.mem_send());
        assert_eq!(1, frames.len());
        assert_eq!(0, session.num_active_streams());
        assert!(!session.want_write());

        session
            .mem_recv(
                &SettingsFrame::from_settings(vec![HttpSetting::MaxConcurrentStreams(1)])
                    .serialize_into_vec(),
            )
            .unwrap();
        let frames = sent_frames(session.mem_send());
        match &frames[..] {
            [HttpFrame::Settings(ack), HttpFrame::Headers(h)] => {
                assert!(ack.is_ack());
                assert_eq!(1, h.stream_id);
            }
            f => panic!("unexpected frames {:?}", f),
        }
    }

    #[test]
    fn large_request_uses_continuation() {
        let mut session = ClientSession::new();
        let mut headers = request_headers();
        // no huffman code is shorter than 5 bits, so this stays above one frame
        let big: Vec<u8> = (0..30000u32)
            .map(|i| b'!' + (i.wrapping_mul(2_654_435_761) >> 24) as u8 % 90)
            .collect();
        headers.add("x-big", big);
        session.submit_request(headers).unwrap();
        let frames = sent_frames(session.mem_send());
        match &frames[..] {
            [HttpFrame::Headers(h), HttpFrame::Continuation(c)] => {
                assert!(!h.is_headers_end());
                assert!(h.is_end_of_stream());
                assert!(c.is_headers_end());
            }
            f => panic!("unexpected frames {:?}", f),
        }
    }
}
