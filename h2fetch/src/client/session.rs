//! Glue between the transport and the protocol engine for one request.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::io::Write;

use crate::client::conf::ClientConf;
use crate::client::target::StreamDescriptor;
use crate::client::transport::CloseReason;
use crate::client::transport::Transport;
use crate::client::transport::TransportEvent;
use crate::net::socket::SocketStream;
use crate::solicit::error_code::ErrorCode;
use crate::solicit::error_code::ErrorCodeOrUnknown;
use crate::solicit::frame::HttpFrameType;
use crate::solicit::frame::HttpSetting;
use crate::solicit::header::Headers;
use crate::solicit::session::ClientSession;
use crate::solicit::session::FrameRecvInfo;
use crate::solicit::session::FrameSendInfo;
use crate::solicit::session::HeadersCategory;
use crate::solicit::session::RequestToken;
use crate::solicit::session::SessionEvent;
use crate::solicit::stream_id::StreamId;
use crate::solicit::PREFACE;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// Stream closed and `GOAWAY` written.
    Graceful,
    PeerClosed,
    NetworkError,
    Timeout,
    /// Peer violated the protocol.
    ProtocolError,
    /// ALPN did not select `h2`.
    NegotiationFailed,
}

impl From<&CloseReason> for Teardown {
    fn from(reason: &CloseReason) -> Teardown {
        match reason {
            CloseReason::Eof => Teardown::PeerClosed,
            CloseReason::Error(..) => Teardown::NetworkError,
            CloseReason::Timeout => Teardown::Timeout,
        }
    }
}

/// Descriptors by request token until the request is sent, then by stream id.
#[derive(Debug, Default)]
pub(crate) struct StreamTable<'a> {
    pending: HashMap<RequestToken, StreamDescriptor<'a>>,
    active: HashMap<StreamId, StreamDescriptor<'a>>,
}

impl<'a> StreamTable<'a> {
    fn insert_pending(&mut self, token: RequestToken, descriptor: StreamDescriptor<'a>) {
        self.pending.insert(token, descriptor);
    }

    /// Move a pending descriptor to `stream_id`. False if the token is unknown.
    fn activate(&mut self, token: RequestToken, stream_id: StreamId) -> bool {
        let mut descriptor = match self.pending.remove(&token) {
            Some(descriptor) => descriptor,
            None => return false,
        };
        if !descriptor.assign_stream_id(stream_id) {
            self.pending.insert(token, descriptor);
            return false;
        }
        self.active.insert(stream_id, descriptor);
        true
    }

    fn get(&self, stream_id: StreamId) -> Option<&StreamDescriptor<'a>> {
        self.active.get(&stream_id)
    }

    fn clear(&mut self) {
        self.pending.clear();
        self.active.clear();
    }
}

/// State of one connection carrying one request.
///
/// Owns the transport, the engine and the stream table; all of them are
/// released together by [`SessionContext::teardown`].
pub struct SessionContext<'a, D: Write, B: Write> {
    conf: ClientConf,
    /// Until the request is submitted.
    descriptor: Option<StreamDescriptor<'a>>,
    transport: Option<Transport>,
    /// Transport of a graceful teardown, kept until its write side is shut down.
    closing: Option<Transport>,
    engine: Option<ClientSession>,
    streams: StreamTable<'a>,
    /// Headers and status lines.
    diag: D,
    /// Response body.
    body: B,
    /// `GOAWAY` submitted, no request will follow.
    draining: bool,
    closed: Option<Teardown>,
}

impl<'a, D: Write, B: Write> SessionContext<'a, D, B> {
    pub fn new(
        descriptor: StreamDescriptor<'a>,
        conf: ClientConf,
        diag: D,
        body: B,
    ) -> SessionContext<'a, D, B> {
        SessionContext {
            conf,
            descriptor: Some(descriptor),
            transport: None,
            closing: None,
            engine: None,
            streams: StreamTable::default(),
            diag,
            body,
            draining: false,
            closed: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Why the session was torn down, `None` while it is live.
    pub fn teardown_reason(&self) -> Option<Teardown> {
        self.closed
    }

    /// Stream id of the request, once its `HEADERS` went out.
    pub fn stream_id(&self) -> Option<StreamId> {
        self.streams.active.keys().next().cloned()
    }

    pub fn into_sinks(self) -> (D, B) {
        (self.diag, self.body)
    }

    fn diag_line(&mut self, args: fmt::Arguments) {
        if let Err(e) = writeln!(self.diag, "{}", args) {
            warn!("failed to write diagnostics: {}", e);
        }
    }

    fn print_headers(&mut self, title: &str, headers: &Headers) {
        if let Err(e) = write_headers(&mut self.diag, title, headers) {
            warn!("failed to write diagnostics: {}", e);
        }
    }

    /// Wait for the next transport event. `None` once the transport is released.
    pub async fn next_transport_event(&mut self) -> Option<TransportEvent> {
        match self.transport.as_mut() {
            Some(transport) => Some(transport.next_event().await),
            None => None,
        }
    }

    /// Transport Event Adapter.
    ///
    /// Only a negotiation failure is returned as an error; every other failure
    /// tears the session down and is reported on the diagnostics sink.
    pub fn handle_transport_event(&mut self, event: TransportEvent) -> crate::Result<()> {
        if self.is_closed() {
            debug!("session closed, dropping {:?}", event);
            return Ok(());
        }
        match event {
            TransportEvent::Connected(socket) => self.on_connected(socket),
            TransportEvent::Readable(data) => {
                self.on_readable(&data);
                Ok(())
            }
            TransportEvent::Writable => {
                self.on_writable();
                Ok(())
            }
            TransportEvent::Closed(reason) => {
                self.on_closed(reason);
                Ok(())
            }
        }
    }

    fn on_connected(&mut self, socket: Box<dyn SocketStream>) -> crate::Result<()> {
        let protocol = socket.negotiated_protocol();
        if !protocol.is_h2() {
            warn!("negotiated {} instead of h2", protocol);
            self.teardown(Teardown::NegotiationFailed);
            return Err(crate::Error::NegotiationFailed);
        }

        self.diag_line(format_args!("Connected"));
        if socket.is_tcp() {
            if let Err(e) = socket.set_tcp_nodelay(self.conf.no_delay.unwrap_or(true)) {
                warn!("failed to set TCP_NODELAY: {}", e);
            }
        }

        let mut transport = Transport::new(socket, self.conf.idle_timeout);
        transport.queue(PREFACE);
        self.transport = Some(transport);

        let mut engine = ClientSession::new();
        engine.submit_settings(&[HttpSetting::MaxConcurrentStreams(
            self.conf.max_concurrent_streams,
        )])?;
        self.engine = Some(engine);

        self.submit_request()?;
        self.flush();
        Ok(())
    }

    fn submit_request(&mut self) -> crate::Result<()> {
        let descriptor = match self.descriptor.take() {
            Some(descriptor) => descriptor,
            None => return Ok(()),
        };
        let headers = descriptor.request_headers();
        self.print_headers("Request headers:", &headers);

        let engine = match self.engine.as_mut() {
            Some(engine) => engine,
            None => return Err(crate::Error::SessionClosed),
        };
        let token = engine.submit_request(headers)?;
        self.streams.insert_pending(token, descriptor);
        Ok(())
    }

    fn on_readable(&mut self, data: &[u8]) {
        let engine = match self.engine.as_mut() {
            Some(engine) => engine,
            None => return,
        };
        let r = engine.mem_recv(data);
        // events produced before a failure still count
        self.dispatch_engine_events();
        match r {
            Ok(consumed) => {
                debug!("engine consumed {} bytes", consumed);
                self.flush();
            }
            Err(e) => {
                self.diag_line(format_args!("Fatal error: {}", e));
                self.teardown(Teardown::ProtocolError);
            }
        }
    }

    /// The only place a graceful shutdown is decided.
    fn on_writable(&mut self) {
        let done = match (&self.engine, &self.transport) {
            (Some(engine), Some(transport)) => {
                !engine.want_read() && !engine.want_write() && transport.outbound_is_empty()
            }
            _ => false,
        };
        if done {
            self.teardown(Teardown::Graceful);
        }
    }

    fn on_closed(&mut self, reason: CloseReason) {
        if let CloseReason::Error(e) = &reason {
            info!("transport error: {}", e);
        }
        self.diag_line(format_args!("{}", reason.message()));
        self.teardown(Teardown::from(&reason));
    }

    /// Hand everything the engine wants to send to the transport, reacting to
    /// the events this produces.
    fn flush(&mut self) {
        loop {
            self.dispatch_engine_events();
            let (engine, transport) = match (self.engine.as_mut(), self.transport.as_mut()) {
                (Some(engine), Some(transport)) => (engine, transport),
                _ => return,
            };
            if !engine.want_write() {
                return;
            }
            let bytes = engine.mem_send();
            debug!("queueing {} bytes", bytes.len());
            transport.queue(&bytes);
        }
    }

    fn dispatch_engine_events(&mut self) {
        loop {
            let event = match self.engine.as_mut().and_then(|e| e.poll_event()) {
                Some(event) => event,
                None => return,
            };
            self.handle_engine_event(event);
        }
    }

    /// Protocol Event Adapter.
    pub(crate) fn handle_engine_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::BeforeFrameSend(FrameSendInfo {
                frame_type: HttpFrameType::Headers,
                stream_id,
                category: Some(HeadersCategory::Request),
                request: Some(token),
            }) => {
                if self.streams.activate(token, stream_id) {
                    debug!("request sent on stream {}", stream_id);
                }
            }
            SessionEvent::BeforeFrameSend(..) => {}
            SessionEvent::FrameRecv(FrameRecvInfo {
                frame_type: HttpFrameType::Headers,
                stream_id,
                headers: Some((HeadersCategory::Response, headers)),
                ..
            }) => {
                if self.streams.get(stream_id).is_some() {
                    self.print_headers("Response headers:", &headers);
                }
            }
            SessionEvent::FrameRecv(..) => {}
            SessionEvent::DataChunkRecv { stream_id, data } => {
                if self.streams.get(stream_id).is_some() {
                    if let Err(e) = self.body.write_all(&data) {
                        warn!("failed to write body: {}", e);
                    }
                }
            }
            SessionEvent::StreamClose {
                stream_id,
                error_code,
            } => {
                if self.streams.get(stream_id).is_some() {
                    self.on_stream_close(stream_id, error_code);
                }
            }
        }
    }

    fn on_stream_close(&mut self, stream_id: StreamId, error_code: ErrorCodeOrUnknown) {
        self.diag_line(format_args!(
            "Stream {} closed with error_code={}",
            stream_id, error_code.0
        ));
        if let Some(engine) = self.engine.as_mut() {
            // teardown waits until the GOAWAY is written
            match engine.submit_goaway(ErrorCode::NoError) {
                Ok(()) => self.draining = true,
                Err(e) => debug!("GOAWAY not submitted: {}", e),
            }
        }
    }

    /// Release the transport, the engine and the stream table. Calls after
    /// the first are no-ops.
    pub fn teardown(&mut self, reason: Teardown) {
        if let Some(prev) = self.closed {
            debug!("already torn down ({:?}), ignoring {:?}", prev, reason);
            return;
        }
        info!("session teardown: {:?}", reason);
        self.closed = Some(reason);
        let transport = self.transport.take();
        if reason == Teardown::Graceful {
            self.closing = transport;
        }
        self.engine = None;
        self.descriptor = None;
        self.streams.clear();
        if let Err(e) = self.diag.flush() {
            warn!("failed to flush diagnostics: {}", e);
        }
        if let Err(e) = self.body.flush() {
            warn!("failed to flush body: {}", e);
        }
    }

    /// Shut down the write side of a gracefully closed transport and release it.
    pub async fn finish(&mut self) {
        if let Some(mut transport) = self.closing.take() {
            match transport.shutdown().await {
                Ok(()) => debug!("transport shut down"),
                Err(e) => info!("failed to shut down transport: {}", e),
            }
        }
    }

    #[cfg(test)]
    fn take_outbound(&mut self) -> bytes::Bytes {
        match self.transport.as_mut() {
            Some(transport) => transport.take_outbound(),
            None => bytes::Bytes::new(),
        }
    }
}

/// Title line, `name: value` lines, blank line.
fn write_headers<W: Write>(w: &mut W, title: &str, headers: &Headers) -> io::Result<()> {
    writeln!(w, "{}", title)?;
    headers.write_lines(w)?;
    writeln!(w)
}
