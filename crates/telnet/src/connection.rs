//! TCP stream with telnet command filtering and prompt-delimited reads.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use invocation::StreamConnection;

use crate::negotiation::{self, NegotiationFilter};

const READ_CHUNK: usize = 4096;

/// A [`StreamConnection`] over a telnet TCP session.
///
/// Reads are buffered: bytes received after a delimiter stay in the buffer
/// for the next [`read_until`](StreamConnection::read_until). Telnet
/// negotiation is answered inline and never reaches the caller.
#[derive(Debug, Default)]
pub struct TelnetConnection {
    stream: Option<TcpStream>,
    buffer: Vec<u8>,
    filter: NegotiationFilter,
}

impl TelnetConnection {
    /// An unconnected stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a TCP connection is held.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "telnet stream is not connected"))
    }

    /// Filters `chunk` into the read buffer and returns the negotiation
    /// replies still to be sent. Data is buffered before any reply is
    /// written, so a read cancelled mid-reply keeps it.
    fn absorb(&mut self, chunk: &[u8]) -> Vec<u8> {
        let filtered = self.filter.feed(chunk);
        self.buffer.extend_from_slice(&filtered.data);
        filtered.replies
    }

    fn take_through(&mut self, delimiter: &[u8]) -> Option<Vec<u8>> {
        let at = self
            .buffer
            .windows(delimiter.len())
            .position(|window| window == delimiter)?;
        Some(self.buffer.drain(..at + delimiter.len()).collect())
    }
}

#[async_trait]
impl StreamConnection for TelnetConnection {
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> io::Result<()> {
        if self.stream.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "telnet stream is already connected",
            ));
        }

        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {host}:{port} timed out after {timeout:?}"),
                )
            })??;
        stream.set_nodelay(true)?;

        debug!(host, port, "telnet stream connected");
        self.buffer.clear();
        self.filter.reset();
        self.stream = Some(stream);
        Ok(())
    }

    async fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        let escaped = negotiation::escape(bytes);
        let stream = self.stream()?;
        stream.write_all(&escaped).await?;
        stream.flush().await
    }

    async fn read_until(&mut self, delimiter: &[u8]) -> io::Result<Vec<u8>> {
        if delimiter.is_empty() {
            return Ok(Vec::new());
        }

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(found) = self.take_through(delimiter) {
                return Ok(found);
            }

            let n = self.stream()?.read(&mut chunk).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended with {} unterminated bytes buffered", self.buffer.len()),
                ));
            }

            let replies = self.absorb(&chunk[..n]);
            if !replies.is_empty() {
                trace!(bytes = replies.len(), "refusing telnet options");
                self.stream()?.write_all(&replies).await?;
            }
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        self.buffer.clear();
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        match stream.shutdown().await {
            Ok(()) => Ok(()),
            // The peer may already have gone.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e),
        }
    }
}
