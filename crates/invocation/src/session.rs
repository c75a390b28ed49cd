//! Session protocol engine.
//!
//! Drives one telnet console connection through its request/response cycle:
//!
//! ```text
//! Disconnected ─connect─▶ Connected ─"\n"─▶ AwaitingInitialPrompt ─prompt─▶ Ready
//!                                                                            │
//!        ┌──────────────────────── prompt, "\n", prompt ◀── AwaitingResponse ◀┤ send
//!        ▼                                                                   │
//!      Ready ...                                       close (from any state) ▼
//!                                                                          Closed
//! ```
//!
//! The console echoes the command ahead of the result and follows every reply
//! with a prompt, so one exchange is two reads: the reply itself (up to and
//! including the prompt), then an empty command and a second read that is
//! thrown away. Skipping the second read leaves a stray prompt in the stream
//! and the next reply comes back empty.
//!
//! Every read is bounded by [`SessionConfig::read_timeout`]. A timed-out read
//! leaves the session where it was; [`Session::receive`] can be called again
//! to keep waiting.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::address::ProviderAddress;
use crate::decoder;
use crate::encoder;
use crate::errors::SessionError;
use crate::identifiers::SessionId;
use crate::ports::StreamConnection;
use crate::request::InvocationRequest;
use crate::types::{InvocationResult, TextEncoding};

/// Prompt printed by the Dubbo telnet console.
pub const DEFAULT_PROMPT: &str = "dubbo>";

/// Where a [`Session`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No stream yet.
    Disconnected,
    /// Stream open, handshake not yet sent.
    Connected,
    /// Handshake newline sent; waiting for the first prompt.
    AwaitingInitialPrompt,
    /// Idle; an invocation may be sent.
    Ready,
    /// Writing an invocation.
    Sending,
    /// Invocation written; its reply has not been fully read.
    AwaitingResponse,
    /// Terminal.
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::AwaitingInitialPrompt => "awaiting the initial prompt",
            SessionState::Ready => "ready",
            SessionState::Sending => "sending",
            SessionState::AwaitingResponse => "awaiting a response",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Console framing and timeouts for a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Token the console prints when it is ready for the next command.
    pub prompt: String,
    /// Encoding used to decode replies.
    pub encoding: TextEncoding,
    /// Upper bound on establishing the stream.
    pub connect_timeout: Duration,
    /// Upper bound on each read-until-prompt. `None` waits indefinitely.
    pub read_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            encoding: TextEncoding::Utf8,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Progress through the two reads of one exchange.
#[derive(Debug)]
enum Exchange {
    Idle,
    AwaitingReply,
    AwaitingTrailer { reply: Vec<u8>, newline_sent: bool },
}

enum Step {
    ReadReply,
    SendNewline,
    ReadTrailer,
}

impl Exchange {
    fn next_step(&self) -> Step {
        match self {
            Exchange::Idle | Exchange::AwaitingReply => Step::ReadReply,
            Exchange::AwaitingTrailer {
                newline_sent: false,
                ..
            } => Step::SendNewline,
            Exchange::AwaitingTrailer {
                newline_sent: true,
                ..
            } => Step::ReadTrailer,
        }
    }

    fn take_reply(&mut self) -> Vec<u8> {
        match std::mem::replace(self, Exchange::Idle) {
            Exchange::AwaitingTrailer { reply, .. } => reply,
            _ => Vec::new(),
        }
    }
}

/// An open console session against one provider.
///
/// Exclusively owns its stream. Operations take `&mut self`, so one session
/// carries at most one exchange at a time. Dropping a session drops the
/// stream; call [`close`](Self::close) to shut it down explicitly.
#[derive(Debug)]
pub struct Session<S> {
    id: SessionId,
    stream: S,
    address: ProviderAddress,
    config: SessionConfig,
    state: SessionState,
    exchange: Exchange,
}

impl<S: StreamConnection> Session<S> {
    /// Opens `stream` to `address` and synchronises with the console prompt.
    ///
    /// On failure the stream is closed and the error returned; no session is
    /// left half-open.
    #[instrument(skip_all, fields(address = %address, session = tracing::field::Empty))]
    pub async fn connect(
        stream: S,
        address: ProviderAddress,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let mut session = Self {
            id: SessionId::new_random(),
            stream,
            address,
            config,
            state: SessionState::Disconnected,
            exchange: Exchange::Idle,
        };
        tracing::Span::current().record("session", tracing::field::display(session.id));

        match session.establish().await {
            Ok(()) => {
                info!(session = %session.id, address = %session.address, "session ready");
                Ok(session)
            }
            Err(e) => {
                session.shutdown_stream().await;
                Err(e)
            }
        }
    }

    /// This session's identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The provider this session is connected to.
    pub fn address(&self) -> &ProviderAddress {
        &self.address
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sends `request` and reads its result.
    pub async fn invoke(
        &mut self,
        request: &InvocationRequest,
    ) -> Result<InvocationResult, SessionError> {
        self.send(request).await?;
        self.receive().await
    }

    /// Writes the `invoke` command for `request`. The session must be `Ready`.
    #[instrument(skip_all, fields(session = %self.id, service = %request.service(), method = %request.method()))]
    pub async fn send(&mut self, request: &InvocationRequest) -> Result<(), SessionError> {
        self.require(SessionState::Ready, "send an invocation")?;

        let command = encoder::encode_request(request);
        info!(command = %command, "sending invocation");

        self.transition(SessionState::Sending);
        let mut line = command.into_bytes();
        line.push(b'\n');
        if let Err(e) = self.stream.write_bytes(&line).await {
            // A partial write leaves the console mid-command; nothing after it can be trusted.
            self.shutdown_stream().await;
            return Err(e.into());
        }

        self.exchange = Exchange::AwaitingReply;
        self.transition(SessionState::AwaitingResponse);
        Ok(())
    }

    /// Reads the reply to the invocation last sent. The session must be
    /// `AwaitingResponse`; on success it is `Ready` again.
    #[instrument(skip_all, fields(session = %self.id))]
    pub async fn receive(&mut self) -> Result<InvocationResult, SessionError> {
        self.require(SessionState::AwaitingResponse, "receive a response")?;

        loop {
            match self.exchange.next_step() {
                Step::ReadReply => {
                    let reply = self.read_prompt().await?;
                    debug!(bytes = reply.len(), "read reply");
                    self.exchange = Exchange::AwaitingTrailer {
                        reply,
                        newline_sent: false,
                    };
                }
                Step::SendNewline => {
                    self.stream.write_bytes(b"\n").await?;
                    if let Exchange::AwaitingTrailer { newline_sent, .. } = &mut self.exchange {
                        *newline_sent = true;
                    }
                }
                Step::ReadTrailer => {
                    let trailer = self.read_prompt().await?;
                    debug!(bytes = trailer.len(), "discarded trailing prompt");
                    break;
                }
            }
        }

        let reply = self.exchange.take_reply();
        self.transition(SessionState::Ready);

        let result = decoder::decode(&reply, self.config.encoding, &self.config.prompt);
        match &result.warning {
            Some(warning) => debug!(%warning, "reply is not structured"),
            None => debug!("reply parsed as structured data"),
        }
        Ok(result)
    }

    /// Closes the stream. Safe from any state; a second call does nothing.
    #[instrument(skip_all, fields(session = %self.id))]
    pub async fn close(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.transition(SessionState::Closed);
        self.exchange = Exchange::Idle;
        self.stream.close().await?;
        Ok(())
    }

    async fn establish(&mut self) -> Result<(), SessionError> {
        let authority = self.address.authority();
        let port = self
            .address
            .port_number()
            .map_err(|e| SessionError::ConnectFailed {
                address: authority.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
            })?;

        let limit = self.config.connect_timeout;
        let connect = self.stream.connect(self.address.host(), port, limit);
        match tokio::time::timeout(limit, connect).await {
            Err(_) => {
                return Err(SessionError::ConnectTimeout {
                    address: authority,
                    timeout: limit,
                })
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => {
                return Err(SessionError::ConnectTimeout {
                    address: authority,
                    timeout: limit,
                })
            }
            Ok(Err(e)) => {
                return Err(SessionError::ConnectFailed {
                    address: authority,
                    source: e,
                })
            }
            Ok(Ok(())) => {}
        }
        self.transition(SessionState::Connected);

        self.stream.write_bytes(b"\n").await?;
        self.transition(SessionState::AwaitingInitialPrompt);

        let banner = self.read_prompt().await?;
        debug!(bytes = banner.len(), "discarded console banner");
        self.transition(SessionState::Ready);
        Ok(())
    }

    async fn read_prompt(&mut self) -> Result<Vec<u8>, SessionError> {
        let state = self.state;
        let prompt = self.config.prompt.as_bytes();
        let read = match self.config.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.stream.read_until(prompt))
                .await
                .map_err(|_| SessionError::ReadTimeout {
                    timeout: limit,
                    state,
                })?,
            None => self.stream.read_until(prompt).await,
        };

        match read {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                warn!(session = %self.id, %state, "server closed the connection");
                self.shutdown_stream().await;
                Err(SessionError::ConnectionClosed)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn require(&self, expected: SessionState, operation: &'static str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::ProtocolState {
                operation,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session = %self.id, from = %self.state, to = %next, "session state");
        self.state = next;
    }

    async fn shutdown_stream(&mut self) {
        self.transition(SessionState::Closed);
        self.exchange = Exchange::Idle;
        if let Err(e) = self.stream.close().await {
            debug!(session = %self.id, error = %e, "error closing stream");
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
