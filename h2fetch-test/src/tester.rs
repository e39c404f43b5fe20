#![allow(dead_code)]

use std::io;
use std::io::Read;
use std::io::Write;
use std::net;

use bytes::Bytes;
use bytes::BytesMut;

use h2fetch::for_test::hpack;
use h2fetch::for_test::solicit::error_code::ErrorCodeOrUnknown;
use h2fetch::for_test::solicit::frame::unpack_header_from_slice;
use h2fetch::for_test::solicit::frame::ContinuationFlag;
use h2fetch::for_test::solicit::frame::ContinuationFrame;
use h2fetch::for_test::solicit::frame::DataFlag;
use h2fetch::for_test::solicit::frame::DataFrame;
use h2fetch::for_test::solicit::frame::FrameIR;
use h2fetch::for_test::solicit::frame::GoawayFrame;
use h2fetch::for_test::solicit::frame::HeadersFlag;
use h2fetch::for_test::solicit::frame::HeadersFrame;
use h2fetch::for_test::solicit::frame::HttpFrame;
use h2fetch::for_test::solicit::frame::HttpSetting;
use h2fetch::for_test::solicit::frame::HttpSettings;
use h2fetch::for_test::solicit::frame::PingFrame;
use h2fetch::for_test::solicit::frame::RawFrame;
use h2fetch::for_test::solicit::frame::RstStreamFrame;
use h2fetch::for_test::solicit::frame::SettingsFrame;
use h2fetch::for_test::solicit::frame::FRAME_HEADER_LEN;
use h2fetch::for_test::solicit::DEFAULT_SETTINGS;
use h2fetch::for_test::solicit::PREFACE;
use h2fetch::ErrorCode;
use h2fetch::Headers;
use h2fetch::StreamId;

use super::BIND_HOST;

/// Listener for exactly the connections a test expects.
pub struct HttpServerTester(net::TcpListener);

impl HttpServerTester {
    pub fn new() -> HttpServerTester {
        let socket = net::TcpListener::bind((BIND_HOST, 0)).expect("bind");
        let server = HttpServerTester(socket);

        debug!("started HttpServerTester on {}", server.port());

        server
    }

    pub fn port(&self) -> u16 {
        self.0.local_addr().unwrap().port()
    }

    /// `http://` URI of `path` on this server.
    pub fn uri(&self, path: &str) -> String {
        format!("http://{}:{}{}", BIND_HOST, self.port(), path)
    }

    pub fn accept(&self) -> HttpConnTester {
        debug!("accept connection...");
        let tcp = self.0.accept().unwrap().0;
        let r = HttpConnTester::with_tcp(tcp);
        debug!("accept connection.");
        r
    }

    /// Accept, read the preface and exchange SETTINGS. The ACK of our SETTINGS
    /// is consumed later by `recv_frame`, it may come after the request.
    pub fn accept_xchg(&self) -> HttpConnTester {
        let mut tester = self.accept();
        tester.recv_preface();
        tester.settings_xchg_but_ack();
        tester
    }
}

/// Server side of one connection, speaking raw frames over a blocking socket.
pub struct HttpConnTester {
    tcp: net::TcpStream,
    pub decoder: hpack::Decoder,
    pub encoder: hpack::Encoder,
    /// Last known peer settings
    pub peer_settings: HttpSettings,
    /// Our settings sent but not acknowledged yet
    pub our_settings_sent: Option<HttpSettings>,
    /// `WINDOW_UPDATE` frames received, as (stream id, increment)
    pub window_updates: Vec<(StreamId, u32)>,
}

impl HttpConnTester {
    pub fn with_tcp(tcp: net::TcpStream) -> HttpConnTester {
        HttpConnTester {
            tcp,
            encoder: hpack::Encoder::new(),
            decoder: hpack::Decoder::new(),
            peer_settings: DEFAULT_SETTINGS,
            our_settings_sent: None,
            window_updates: Vec::new(),
        }
    }

    pub fn recv_preface(&mut self) {
        let mut preface = vec![0; PREFACE.len()];
        self.tcp.read_exact(&mut preface).unwrap();
        assert_eq!(PREFACE, &preface[..]);
    }

    pub fn recv_eof(&mut self) {
        let r = self.tcp.read(&mut [0]);
        match r {
            Ok(0) => {}
            Ok(_) => panic!("expecting EOF"),
            Err(e) => {
                // On Linux it returns ECONNRESET
                if e.kind() != io::ErrorKind::ConnectionReset {
                    panic!("bad error: {}", e);
                }
            }
        };
        info!("EOF received");
    }

    pub fn send_raw(&mut self, data: &[u8]) {
        self.tcp.write_all(data).expect("send");
    }

    pub fn send_frame<F: FrameIR>(&mut self, frame: F) {
        info!("sending {:?}", frame);
        self.tcp
            .write_all(&frame.serialize_into_vec())
            .expect("send_frame");
    }

    pub fn send_goaway(&mut self, last_stream_id: StreamId, error_code: ErrorCode) {
        self.send_frame(GoawayFrame::new(last_stream_id, error_code));
    }

    pub fn send_ping(&mut self, opaque_data: u64) {
        self.send_frame(PingFrame::with_data(opaque_data));
    }

    fn encode(&mut self, headers: &Headers) -> Vec<u8> {
        self.encoder.encode(headers.iter())
    }

    pub fn send_headers(&mut self, stream_id: StreamId, headers: Headers, end: bool) {
        let fragment = self.encode(&headers);
        let mut headers_frame = HeadersFrame::new(fragment, stream_id);
        headers_frame.set_flag(HeadersFlag::EndHeaders);
        if end {
            headers_frame.set_flag(HeadersFlag::EndStream);
        }
        self.send_frame(headers_frame);
    }

    /// Send a header block split into a `HEADERS` frame and `CONTINUATION`
    /// frames of at most `chunk` bytes.
    pub fn send_headers_continuation(
        &mut self,
        stream_id: StreamId,
        headers: Headers,
        end: bool,
        chunk: usize,
    ) {
        let fragment = Bytes::from(self.encode(&headers));
        let mut chunks = fragment.chunks(chunk).map(Bytes::copy_from_slice);
        let first = chunks.next().unwrap_or_default();
        let rest: Vec<Bytes> = chunks.collect();

        let mut headers_frame = HeadersFrame::new(first, stream_id);
        if end {
            headers_frame.set_flag(HeadersFlag::EndStream);
        }
        if rest.is_empty() {
            headers_frame.set_flag(HeadersFlag::EndHeaders);
        }
        self.send_frame(headers_frame);

        let count = rest.len();
        for (i, fragment) in rest.into_iter().enumerate() {
            let mut frame = ContinuationFrame::new(fragment, stream_id);
            if i + 1 == count {
                frame.set_flag(ContinuationFlag::EndHeaders);
            }
            self.send_frame(frame);
        }
    }

    pub fn send_status(&mut self, stream_id: StreamId, status: u32, end: bool) {
        let mut headers = Headers::new();
        headers.add(":status", status.to_string());
        self.send_headers(stream_id, headers, end);
    }

    pub fn send_data(&mut self, stream_id: StreamId, data: &[u8], end: bool) {
        let mut data_frame = DataFrame::with_data(stream_id, Bytes::copy_from_slice(data));
        if end {
            data_frame.set_flag(DataFlag::EndStream);
        }
        self.send_frame(data_frame);
    }

    pub fn send_rst(&mut self, stream_id: StreamId, error_code: ErrorCode) {
        self.send_frame(RstStreamFrame::new(stream_id, error_code));
    }

    pub fn recv_raw_frame(&mut self) -> RawFrame {
        let mut buf = vec![0; FRAME_HEADER_LEN];
        self.tcp.read_exact(&mut buf).expect("read frame header");
        let header = unpack_header_from_slice(&buf).expect("frame header");
        assert!(header.payload_len <= DEFAULT_SETTINGS.max_frame_size);
        buf.resize(FRAME_HEADER_LEN + header.payload_len as usize, 0);
        self.tcp
            .read_exact(&mut buf[FRAME_HEADER_LEN..])
            .expect("read frame payload");
        RawFrame::from(buf)
    }

    pub fn fn_recv_frame_no_check_ack(&mut self) -> HttpFrame {
        let raw_frame = self.recv_raw_frame();
        let frame = HttpFrame::from_raw(&raw_frame).expect("parse frame");
        debug!("received frame: {:?}", frame);
        frame
    }

    /// Consume SETTINGS ACK and WINDOW_UPDATE, return everything else.
    pub fn recv_special_frame_process_special(&mut self) -> Option<HttpFrame> {
        let frame = self.fn_recv_frame_no_check_ack();
        if let HttpFrame::Settings(ref f) = frame {
            if self.our_settings_sent.is_some() && f.is_ack() {
                self.our_settings_sent = None;
                return None;
            }
        }
        if let HttpFrame::WindowUpdate(ref f) = frame {
            self.window_updates.push((f.stream_id, f.increment));
            return None;
        }
        Some(frame)
    }

    pub fn recv_frame(&mut self) -> HttpFrame {
        loop {
            if let Some(frame) = self.recv_special_frame_process_special() {
                return frame;
            }
        }
    }

    pub fn recv_frame_settings(&mut self) -> SettingsFrame {
        match self.fn_recv_frame_no_check_ack() {
            HttpFrame::Settings(settings) => settings,
            f => panic!("expecting SETTINGS, got: {:?}", f),
        }
    }

    pub fn recv_frame_settings_set(&mut self) -> SettingsFrame {
        let settings = self.recv_frame_settings();
        assert!(!settings.is_ack());
        self.peer_settings.apply_all(&settings.settings);
        settings
    }

    pub fn send_settings(&mut self, settings: Vec<HttpSetting>) {
        assert!(self.our_settings_sent.is_none());
        let mut new_settings = DEFAULT_SETTINGS;
        new_settings.apply_all(&settings);
        self.our_settings_sent = Some(new_settings);
        self.send_frame(SettingsFrame::from_settings(settings));
    }

    // Perform handshake, but do not wait for ACK of my SETTINGS
    // Useful, because ACK may come e.g. after first request HEADERS
    pub fn settings_xchg_but_ack(&mut self) {
        self.send_settings(Vec::new());
        self.recv_frame_settings_set();
        self.send_frame(SettingsFrame::new_ack());
    }

    /// Wait for the peer to acknowledge our SETTINGS, nothing else may arrive first.
    pub fn recv_frame_settings_ack(&mut self) {
        while self.our_settings_sent.is_some() {
            if let Some(f) = self.recv_special_frame_process_special() {
                panic!("expecting SETTINGS ACK, got: {:?}", f);
            }
        }
    }

    pub fn recv_rst_frame(&mut self) -> RstStreamFrame {
        match self.recv_frame() {
            HttpFrame::RstStream(rst) => rst,
            f => panic!("expecting RST, got: {:?}", f),
        }
    }

    pub fn recv_goaway_frame(&mut self) -> GoawayFrame {
        match self.recv_frame() {
            HttpFrame::Goaway(goaway) => goaway,
            f => panic!("expecting GOAWAY, got: {:?}", f),
        }
    }

    pub fn recv_ping_frame(&mut self) -> PingFrame {
        match self.recv_frame() {
            HttpFrame::Ping(ping) => ping,
            f => panic!("expecting PING, got: {:?}", f),
        }
    }

    pub fn recv_rst_frame_check(&mut self, stream_id: StreamId, error_code: ErrorCode) {
        let frame = self.recv_rst_frame();
        assert_eq!(stream_id, frame.stream_id);
        assert_eq!(ErrorCodeOrUnknown::from(error_code), frame.error_code());
    }

    pub fn recv_goaway_frame_check(&mut self, error_code: ErrorCode) {
        let frame = self.recv_goaway_frame();
        assert_eq!(ErrorCodeOrUnknown::from(error_code), frame.error_code());
    }

    /// Receive a `HEADERS` frame and its `CONTINUATION` frames.
    pub fn recv_frame_headers_continuation(&mut self) -> (HeadersFrame, u32) {
        let headers = match self.recv_frame() {
            HttpFrame::Headers(headers) => headers,
            f => panic!("expecting HEADERS, got: {:?}", f),
        };

        if headers.is_headers_end() {
            return (headers, 0);
        }

        let mut fragment = BytesMut::from(&headers.header_fragment[..]);
        let mut cont_count = 0;

        loop {
            let continuation = match self.recv_frame() {
                HttpFrame::Continuation(continuation) => continuation,
                f => panic!("expecting CONTINUATION, got: {:?}", f),
            };
            assert_eq!(headers.stream_id, continuation.stream_id);
            cont_count += 1;
            fragment.extend_from_slice(&continuation.header_fragment);

            if continuation.is_headers_end() {
                let mut merged = headers.clone();
                merged.header_fragment = fragment.freeze();
                merged.set_flag(HeadersFlag::EndHeaders);
                return (merged, cont_count);
            }
        }
    }

    pub fn recv_frame_headers_decode(&mut self) -> (HeadersFrame, Headers, u32) {
        let (frame, cont_count) = self.recv_frame_headers_continuation();
        let headers = self
            .decoder
            .decode(&frame.header_fragment)
            .expect("decode");
        (frame, headers, cont_count)
    }

    pub fn recv_frame_headers_check(&mut self, stream_id: StreamId, end: bool) -> Headers {
        let (frame, headers, _) = self.recv_frame_headers_decode();
        assert_eq!(stream_id, frame.stream_id);
        assert_eq!(end, frame.is_end_of_stream());
        headers
    }

    /// Receive the request `HEADERS` of `stream_id`, which always end the stream.
    pub fn recv_request(&mut self, stream_id: StreamId) -> Headers {
        self.recv_frame_headers_check(stream_id, true)
    }
}
