//! Tests for client.

use std::thread;
use std::time::Duration;

use h2fetch::ClientConf;
use h2fetch::DefaultConnector;
use h2fetch::ErrorCode;
use h2fetch::Headers;
use h2fetch::Teardown;

use h2fetch_test::*;

/// Diagnostics lines of the request block for `GET uri_path` on `port`.
fn request_block(port: u16, path: &str) -> Vec<String> {
    vec![
        "Request headers:".to_owned(),
        ":method: GET".to_owned(),
        ":scheme: http".to_owned(),
        format!(":authority: {}:{}", BIND_HOST, port),
        format!(":path: {}", path),
        "".to_owned(),
    ]
}

#[test]
fn get_with_body() {
    init_logger();

    let server = HttpServerTester::new();
    let port = server.port();
    let uri = server.uri("/foo?x=1");

    let t = thread::spawn(move || {
        let mut tester = server.accept_xchg();
        let request = tester.recv_request(1);

        let mut headers = Headers::new();
        headers.add(":status", "200");
        headers.add("content-type", "text/plain");
        tester.send_headers(1, headers, false);
        tester.send_data(1, b"hello ", false);
        tester.send_data(1, b"world", true);

        let goaway = tester.recv_goaway_frame();
        tester.recv_eof();
        (request, goaway)
    });

    let output = fetch(&uri, ClientConf::new());
    let (request, goaway) = t.join().unwrap();

    assert_eq!(Some("GET"), request.get_str_opt(":method"));
    assert_eq!(Some("http"), request.get_str_opt(":scheme"));
    assert_eq!(
        Some(format!("{}:{}", BIND_HOST, port).as_str()),
        request.get_str_opt(":authority")
    );
    assert_eq!(Some("/foo?x=1"), request.get_str_opt(":path"));

    assert_eq!(0, goaway.last_stream_id);
    assert_eq!(Some(ErrorCode::NoError), goaway.error_code().known());

    assert_eq!(Teardown::Graceful, output.teardown());
    assert_eq!(b"hello world", &output.body[..]);

    let mut expected = vec!["Connected".to_owned()];
    expected.extend(request_block(port, "/foo?x=1"));
    expected.extend(vec![
        "Response headers:".to_owned(),
        ":status: 200".to_owned(),
        "content-type: text/plain".to_owned(),
        "".to_owned(),
        "Stream 1 closed with error_code=0".to_owned(),
    ]);
    assert_eq!(expected, output.diag_lines());
}

#[test]
fn eof_before_response() {
    init_logger();

    let server = HttpServerTester::new();
    let port = server.port();
    let uri = server.uri("/");

    let t = thread::spawn(move || {
        // no SETTINGS from us, so the client has nothing left to write
        let mut tester = server.accept();
        tester.recv_preface();
        tester.recv_frame_settings_set();
        tester.recv_request(1);
    });

    let output = fetch(&uri, ClientConf::new());
    t.join().unwrap();

    assert_eq!(Teardown::PeerClosed, output.teardown());
    assert!(output.body.is_empty());

    let mut expected = vec!["Connected".to_owned()];
    expected.extend(request_block(port, "/"));
    expected.push("Disconnected from the remote host".to_owned());
    assert_eq!(expected, output.diag_lines());
}

#[test]
fn alpn_mismatch() {
    init_logger();

    let server = HttpServerTester::new();
    let uri = server.uri("/");

    let t = thread::spawn(move || {
        let mut tester = server.accept();
        tester.recv_eof();
    });

    let output = fetch_with(&uri, ClientConf::new(), &AlpnConnector::http11());
    t.join().unwrap();

    match output.result {
        Err(ref e) if e.is_negotiation() => {}
        ref r => panic!("expecting negotiation failure, got: {:?}", r),
    }
    assert_eq!("", output.diag);
    assert!(output.body.is_empty());
}

#[test]
fn rst_stream_reports_code() {
    init_logger();

    let server = HttpServerTester::new();
    let uri = server.uri("/reset");

    let t = thread::spawn(move || {
        let mut tester = server.accept_xchg();
        tester.recv_request(1);
        tester.send_status(1, 200, false);
        tester.send_rst(1, ErrorCode::Cancel);
        tester.recv_goaway_frame_check(ErrorCode::NoError);
        tester.recv_eof();
    });

    // negotiated h2 is as good as prior knowledge
    let output = fetch_with(&uri, ClientConf::new(), &AlpnConnector::h2());
    t.join().unwrap();

    assert_eq!(Teardown::Graceful, output.teardown());
    assert_eq!(
        Some(&"Stream 1 closed with error_code=8"),
        output.diag_lines().last()
    );
}

#[test]
fn ping_is_acked() {
    init_logger();

    let server = HttpServerTester::new();
    let uri = server.uri("/");

    let t = thread::spawn(move || {
        let mut tester = server.accept_xchg();
        tester.recv_request(1);
        tester.send_ping(0x0102030405060708);
        let ack = tester.recv_ping_frame();
        tester.send_status(1, 204, true);
        tester.recv_goaway_frame_check(ErrorCode::NoError);
        tester.recv_eof();
        ack
    });

    let output = fetch(&uri, ClientConf::new());
    let ack = t.join().unwrap();

    assert!(ack.is_ack());
    assert_eq!(0x0102030405060708, ack.opaque_data);
    assert_eq!(Teardown::Graceful, output.teardown());
}

#[test]
fn window_update_after_half_window() {
    init_logger();

    let server = HttpServerTester::new();
    let uri = server.uri("/big");

    let t = thread::spawn(move || {
        let mut tester = server.accept_xchg();
        tester.recv_request(1);
        tester.send_status(1, 200, false);
        tester.send_data(1, &[b'a'; 16384], false);
        tester.send_data(1, &[b'b'; 16384], false);
        tester.send_data(1, b"c", true);
        tester.recv_goaway_frame_check(ErrorCode::NoError);
        tester.recv_eof();
        tester.window_updates
    });

    let output = fetch(&uri, ClientConf::new());
    let window_updates = t.join().unwrap();

    assert_eq!(vec![(1, 32768), (0, 32768)], window_updates);
    assert_eq!(Teardown::Graceful, output.teardown());
    assert_eq!(16384 * 2 + 1, output.body.len());
    assert_eq!(b'c', output.body[output.body.len() - 1]);
}

#[test]
fn informational_and_continuation() {
    init_logger();

    let server = HttpServerTester::new();
    let uri = server.uri("/");

    let t = thread::spawn(move || {
        let mut tester = server.accept_xchg();
        tester.recv_request(1);
        tester.send_status(1, 103, false);

        let mut headers = Headers::new();
        headers.add(":status", "200");
        headers.add("x-long", "v".repeat(100));
        tester.send_headers_continuation(1, headers, false, 16);
        tester.send_data(1, b"ok", true);

        tester.recv_goaway_frame_check(ErrorCode::NoError);
        tester.recv_eof();
    });

    let output = fetch(&uri, ClientConf::new());
    t.join().unwrap();

    assert_eq!(Teardown::Graceful, output.teardown());
    assert_eq!(b"ok", &output.body[..]);
    let lines = output.diag_lines();
    assert_eq!(
        2,
        lines.iter().filter(|l| **l == "Response headers:").count()
    );
    assert!(lines.contains(&":status: 103"));
    let long = format!("x-long: {}", "v".repeat(100));
    assert!(lines.contains(&long.as_str()));
}

#[test]
fn protocol_error_is_fatal() {
    init_logger();

    let server = HttpServerTester::new();
    let uri = server.uri("/");

    let t = thread::spawn(move || {
        let mut tester = server.accept_xchg();
        tester.recv_request(1);
        tester.send_data(3, b"nope", false);
        tester.recv_eof();
    });

    let output = fetch(&uri, ClientConf::new());
    t.join().unwrap();

    assert_eq!(Teardown::ProtocolError, output.teardown());
    let last = output.diag_lines().last().map(|l| l.to_string());
    assert!(
        last.as_deref().map_or(false, |l| l.starts_with("Fatal error: ")),
        "{:?}",
        last
    );
}

#[test]
fn idle_timeout() {
    init_logger();

    let server = HttpServerTester::new();
    let uri = server.uri("/slow");

    let t = thread::spawn(move || {
        let mut tester = server.accept_xchg();
        tester.recv_request(1);
        // the client has nothing else to say until the timer fires
        tester.recv_frame_settings_ack();
        tester.recv_eof();
    });

    let mut conf = ClientConf::new();
    conf.idle_timeout = Some(Duration::from_millis(200));
    let output = fetch(&uri, conf);
    t.join().unwrap();

    assert_eq!(Teardown::Timeout, output.teardown());
    assert_eq!(Some(&"Timeout"), output.diag_lines().last());
}

#[test]
fn connection_refused() {
    init_logger();

    let uri = {
        let server = HttpServerTester::new();
        server.uri("/")
    };

    let output = fetch(&uri, ClientConf::new());
    assert_eq!(Teardown::NetworkError, output.teardown());
    assert_eq!(vec!["Network error"], output.diag_lines());
}

#[test]
fn missing_ca_file_is_configuration_error() {
    init_logger();

    let mut conf = ClientConf::new();
    conf.root_certificates = vec!["/nonexistent/h2fetch/ca.pem".into()];
    match DefaultConnector::new(&conf) {
        Err(e) => assert!(e.is_configuration(), "{}", e),
        Ok(..) => panic!("expecting error"),
    }
}
