//! dubbo-invoke telnet stream adapter.
//!
//! Implements the [`StreamConnection`](invocation::StreamConnection) trait
//! defined in the [`invocation`] crate over a tokio [`TcpStream`](tokio::net::TcpStream).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. Socket
//! handling, read buffering, and telnet option negotiation live here; prompt
//! framing and the session lifecycle belong to [`invocation::session`].

mod connection;
pub mod negotiation;

pub use connection::TelnetConnection;
