//! Port traits for the two external collaborators.
//!
//! The resolver and the session engine are written against these traits only.
//! Infrastructure crates supply the real implementations (`zookeeper`,
//! `telnet`); [`crate::testing`] supplies in-memory fakes.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::RegistryError;

/// Read-only access to a hierarchical service registry.
///
/// Paths are absolute and `/`-separated (`/dubbo/com.example.UserService/providers`).
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Opens the registry connection.
    async fn connect(&mut self) -> Result<(), RegistryError>;

    /// Closes the registry connection. Must be a no-op if it is not open.
    async fn disconnect(&mut self) -> Result<(), RegistryError>;

    /// Returns the names of the immediate children of `path`, in the order
    /// the registry reports them.
    async fn list_children(&self, path: &str) -> Result<Vec<String>, RegistryError>;

    /// Returns `true` if a node exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool, RegistryError>;
}

/// A byte stream to one server, read in prompt-delimited chunks.
#[async_trait]
pub trait StreamConnection: Send {
    /// Opens the stream. Implementations should give up after `timeout` and
    /// report it as [`std::io::ErrorKind::TimedOut`].
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> std::io::Result<()>;

    /// Writes all of `bytes`.
    async fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Reads until `delimiter` has been received and returns everything up to
    /// and including it. Bytes after the delimiter stay buffered for the next
    /// read. End of stream before the delimiter is
    /// [`std::io::ErrorKind::UnexpectedEof`].
    async fn read_until(&mut self, delimiter: &[u8]) -> std::io::Result<Vec<u8>>;

    /// Closes the stream. Must be a no-op if it is not open.
    async fn close(&mut self) -> std::io::Result<()>;
}
