//! Command line entry: one URI in, an exit status out.

use std::fmt;
use std::io::Write;

use crate::client::conf::ClientConf;
use crate::client::driver;
use crate::client::session::Teardown;
use crate::client::target::StreamDescriptor;
use crate::net::connect::Connector;
use crate::net::connect::DefaultConnector;

pub const USAGE: &str = "Usage: h2fetch HTTPS_URI";

/// Exit status for the outcome of a run.
///
/// Only failures before any request could be made are unsuccessful. A session
/// that was set up and later lost to the network, a timeout or a protocol
/// error still exits with 0; the reason is on the diagnostics sink.
pub fn exit_code(result: &crate::Result<Teardown>) -> i32 {
    match result {
        Ok(..) => 0,
        Err(..) => 1,
    }
}

fn report<E: Write>(diag: &mut E, message: impl fmt::Display) {
    if let Err(e) = writeln!(diag, "{}", message) {
        warn!("failed to write diagnostics: {}", e);
    }
}

fn target<'a, E: Write>(uri: Option<&'a str>, diag: &mut E) -> Option<StreamDescriptor<'a>> {
    let uri = match uri {
        Some(uri) => uri,
        None => {
            report(diag, USAGE);
            return None;
        }
    };
    match StreamDescriptor::parse(uri) {
        Ok(descriptor) => Some(descriptor),
        Err(e) => {
            report(diag, e);
            None
        }
    }
}

/// Fetch `uri` with the default TLS connector and return the exit status.
pub fn fetch<E: Write, B: Write>(
    uri: Option<&str>,
    conf: &ClientConf,
    mut diag: E,
    body: B,
) -> i32 {
    let descriptor = match target(uri, &mut diag) {
        Some(descriptor) => descriptor,
        None => return 1,
    };
    let connector = match DefaultConnector::new(conf) {
        Ok(connector) => connector,
        Err(e) => {
            report(&mut diag, e);
            return 1;
        }
    };
    execute(descriptor, conf, &connector, diag, body)
}

/// Like [`fetch`], over `connector`.
pub fn fetch_with<E: Write, B: Write>(
    uri: Option<&str>,
    conf: &ClientConf,
    connector: &dyn Connector,
    mut diag: E,
    body: B,
) -> i32 {
    match target(uri, &mut diag) {
        Some(descriptor) => execute(descriptor, conf, connector, diag, body),
        None => 1,
    }
}

fn execute<E: Write, B: Write>(
    descriptor: StreamDescriptor,
    conf: &ClientConf,
    connector: &dyn Connector,
    mut diag: E,
    body: B,
) -> i32 {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            report(&mut diag, format_args!("failed to create runtime: {}", e));
            return 1;
        }
    };

    let result = rt.block_on(driver::run(descriptor, conf, connector, &mut diag, body));
    match &result {
        Ok(teardown) => info!("done: {:?}", teardown),
        Err(e) => report(&mut diag, e),
    }
    exit_code(&result)
}
