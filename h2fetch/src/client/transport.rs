//! Socket side of a session: buffered outbound bytes and the events the
//! session reacts to.

use std::fmt;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::ReadHalf;
use tokio::io::WriteHalf;
use tokio::time;

use crate::net::socket::SocketStream;

const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Why the transport went away.
#[derive(Debug)]
pub enum CloseReason {
    /// Peer closed the connection.
    Eof,
    /// Connect or I/O failure.
    Error(crate::Error),
    /// Connect timeout or idle timeout.
    Timeout,
}

impl CloseReason {
    pub fn message(&self) -> &'static str {
        match self {
            CloseReason::Eof => "Disconnected from the remote host",
            CloseReason::Error(..) => "Network error",
            CloseReason::Timeout => "Timeout",
        }
    }
}

impl From<crate::Error> for CloseReason {
    fn from(e: crate::Error) -> Self {
        match e {
            crate::Error::ConnectionTimeout => CloseReason::Timeout,
            e => CloseReason::Error(e),
        }
    }
}

pub enum TransportEvent {
    /// Connect (and TLS handshake) completed.
    Connected(Box<dyn SocketStream>),
    /// Bytes arrived.
    Readable(Bytes),
    /// Outbound buffer fully written to the socket.
    Writable,
    Closed(CloseReason),
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportEvent::Connected(s) => write!(f, "Connected({:?})", s),
            TransportEvent::Readable(b) => write!(f, "Readable({} bytes)", b.len()),
            TransportEvent::Writable => write!(f, "Writable"),
            TransportEvent::Closed(r) => write!(f, "Closed({:?})", r),
        }
    }
}

enum Progress {
    Read(io::Result<usize>),
    Wrote(io::Result<usize>),
}

/// Open connection with its outbound buffer.
pub struct Transport {
    reader: ReadHalf<Box<dyn SocketStream>>,
    writer: WriteHalf<Box<dyn SocketStream>>,
    outbound: BytesMut,
    inbound: BytesMut,
    idle_timeout: Option<Duration>,
}

impl Transport {
    pub fn new(socket: Box<dyn SocketStream>, idle_timeout: Option<Duration>) -> Transport {
        let (reader, writer) = tokio::io::split(socket);
        Transport {
            reader,
            writer,
            outbound: BytesMut::new(),
            inbound: BytesMut::new(),
            idle_timeout,
        }
    }

    /// Append to the outbound buffer. Bytes are written in queue order.
    pub fn queue(&mut self, data: &[u8]) {
        self.outbound.extend_from_slice(data);
    }

    pub fn outbound_is_empty(&self) -> bool {
        self.outbound.is_empty()
    }

    /// Shut down the write side. Over TLS this sends `close_notify`.
    ///
    /// Bounded by the idle timeout, like any other I/O.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        match self.idle_timeout {
            Some(timeout) => match time::timeout(timeout, self.writer.shutdown()).await {
                Ok(r) => r,
                Err(_) => Err(io::ErrorKind::TimedOut.into()),
            },
            None => self.writer.shutdown().await,
        }
    }

    #[cfg(test)]
    pub(crate) fn take_outbound(&mut self) -> Bytes {
        self.outbound.split().freeze()
    }

    /// Wait for the next readable, drained or closed event.
    ///
    /// Partial writes are not reported; `Writable` means the whole outbound
    /// buffer reached the socket.
    pub async fn next_event(&mut self) -> TransportEvent {
        let idle_timeout = self.idle_timeout;
        loop {
            let step = match idle_timeout {
                Some(timeout) => match time::timeout(timeout, self.step()).await {
                    Ok(step) => step,
                    Err(_) => {
                        debug!("no I/O for {:?}", timeout);
                        return TransportEvent::Closed(CloseReason::Timeout);
                    }
                },
                None => self.step().await,
            };
            if let Some(event) = step {
                return event;
            }
        }
    }

    async fn step(&mut self) -> Option<TransportEvent> {
        let Transport {
            reader,
            writer,
            outbound,
            inbound,
            ..
        } = self;

        inbound.reserve(READ_CHUNK_SIZE);
        let progress = tokio::select! {
            r = writer.write_buf(outbound), if !outbound.is_empty() => Progress::Wrote(r),
            r = reader.read_buf(inbound) => Progress::Read(r),
        };

        let event = match progress {
            Progress::Read(Ok(0)) => TransportEvent::Closed(CloseReason::Eof),
            Progress::Read(Ok(_)) => TransportEvent::Readable(inbound.split().freeze()),
            Progress::Read(Err(e)) => TransportEvent::Closed(CloseReason::Error(e.into())),
            Progress::Wrote(Ok(0)) => TransportEvent::Closed(CloseReason::Error(
                io::Error::from(io::ErrorKind::WriteZero).into(),
            )),
            Progress::Wrote(Ok(_)) if !outbound.is_empty() => return None,
            Progress::Wrote(Ok(_)) => match writer.flush().await {
                Ok(()) => TransportEvent::Writable,
                Err(e) => TransportEvent::Closed(CloseReason::Error(e.into())),
            },
            Progress::Wrote(Err(e)) => TransportEvent::Closed(CloseReason::Error(e.into())),
        };
        Some(event)
    }
}
