//! In-memory fakes for the port traits.
//!
//! Available to this crate's tests and, through the `testing` feature, to the
//! tests of downstream crates.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::RegistryError;
use crate::ports::{RegistryClient, StreamConnection};
use crate::resolver::REGISTRY_ROOT;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Call counters shared between an [`InMemoryRegistry`] and the test holding it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistryCalls {
    /// Successful and failed `connect` calls.
    pub connects: usize,
    /// `disconnect` calls that released an open connection.
    pub disconnects: usize,
    /// `list_children` plus `exists` calls.
    pub reads: usize,
}

/// A registry tree held in memory.
///
/// Child order is insertion order, so tests control enumeration order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    nodes: BTreeMap<String, Vec<String>>,
    connected: bool,
    fail_connect: bool,
    calls: Arc<Mutex<RegistryCalls>>,
}

impl InMemoryRegistry {
    /// An empty registry with no root node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `/dubbo/<service>/providers` with the given provider node names.
    pub fn with_service(mut self, service: &str, providers: &[&str]) -> Self {
        let service_path = self.add_service_node(service);
        self.add_child(&service_path, "providers");
        let providers_path = format!("{service_path}/providers");
        for provider in providers {
            self.add_child(&providers_path, provider);
        }
        self
    }

    /// Adds `/dubbo/<service>` with no `providers` node under it.
    pub fn with_service_without_providers(mut self, service: &str) -> Self {
        self.add_service_node(service);
        self
    }

    /// Makes `connect()` fail with a transport error.
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Handle to the call counters; stays valid after the registry is moved.
    pub fn calls(&self) -> Arc<Mutex<RegistryCalls>> {
        Arc::clone(&self.calls)
    }

    fn add_service_node(&mut self, service: &str) -> String {
        self.nodes.entry(REGISTRY_ROOT.to_string()).or_default();
        self.add_child(REGISTRY_ROOT, service);
        format!("{REGISTRY_ROOT}/{service}")
    }

    fn add_child(&mut self, parent: &str, child: &str) {
        let children = self.nodes.entry(parent.to_string()).or_default();
        if !children.iter().any(|c| c == child) {
            children.push(child.to_string());
        }
        self.nodes.entry(format!("{parent}/{child}")).or_default();
    }

    fn read(&self) -> Result<(), RegistryError> {
        lock(&self.calls).reads += 1;
        if self.connected {
            Ok(())
        } else {
            Err(RegistryError::NotOpen)
        }
    }
}

#[async_trait]
impl RegistryClient for InMemoryRegistry {
    async fn connect(&mut self) -> Result<(), RegistryError> {
        lock(&self.calls).connects += 1;
        if self.fail_connect {
            return Err(RegistryError::Transport {
                operation: "connect",
                path: "in-memory".to_string(),
                message: "connection refused".to_string(),
            });
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), RegistryError> {
        if self.connected {
            lock(&self.calls).disconnects += 1;
            self.connected = false;
        }
        Ok(())
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>, RegistryError> {
        self.read()?;
        self.nodes
            .get(path)
            .cloned()
            .ok_or_else(|| RegistryError::Transport {
                operation: "list_children",
                path: path.to_string(),
                message: "no node".to_string(),
            })
    }

    async fn exists(&self, path: &str) -> Result<bool, RegistryError> {
        self.read()?;
        Ok(self.nodes.contains_key(path))
    }
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// How a [`ScriptedStream`] answers `connect()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehaviour {
    /// Connect succeeds immediately.
    Accept,
    /// Connect fails immediately with `ConnectionRefused`.
    Refuse,
    /// Connect never completes.
    Hang,
}

/// What a [`ScriptedStream`] recorded.
#[derive(Debug, Default)]
pub struct StreamLog {
    /// Every `write_bytes` payload, in order.
    pub writes: Vec<Vec<u8>>,
    /// `connect` attempts, whatever their outcome.
    pub connects: usize,
    /// `close` calls that released an open stream.
    pub closes: usize,
}

impl StreamLog {
    /// All writes decoded as UTF-8 and concatenated.
    pub fn written_text(&self) -> String {
        self.writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }
}

/// A fake console: each write releases the next scripted reply.
///
/// Reads that cannot be satisfied from what has been released either wait
/// forever (the default, like a silent server) or report end of stream.
#[derive(Debug)]
pub struct ScriptedStream {
    behaviour: ConnectBehaviour,
    greeting: Vec<u8>,
    replies: VecDeque<Vec<u8>>,
    inbound: Vec<u8>,
    eof_when_drained: bool,
    connected: bool,
    log: Arc<Mutex<StreamLog>>,
}

impl ScriptedStream {
    /// A stream that accepts the connection and has nothing scripted.
    pub fn new() -> Self {
        Self {
            behaviour: ConnectBehaviour::Accept,
            greeting: Vec::new(),
            replies: VecDeque::new(),
            inbound: Vec::new(),
            eof_when_drained: false,
            connected: false,
            log: Arc::new(Mutex::new(StreamLog::default())),
        }
    }

    /// A console that answers the handshake newline with `prompt`.
    pub fn console(prompt: &str) -> Self {
        Self::new().reply(prompt)
    }

    /// Sets how `connect()` behaves.
    pub fn connect_behaviour(mut self, behaviour: ConnectBehaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    /// Bytes available to read as soon as the connection opens.
    pub fn greeting(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.greeting = bytes.as_ref().to_vec();
        self
    }

    /// Queues the bytes released by the next unanswered write.
    pub fn reply(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.replies.push_back(bytes.as_ref().to_vec());
        self
    }

    /// Queues the two replies a console gives to one `invoke`: the result
    /// followed by the prompt, then a bare prompt for the trailing newline.
    pub fn invocation_reply(self, body: &str, prompt: &str) -> Self {
        self.reply(format!("{body}\r\n{prompt}")).reply(prompt)
    }

    /// Makes unsatisfiable reads fail with `UnexpectedEof` instead of waiting.
    pub fn eof_when_drained(mut self) -> Self {
        self.eof_when_drained = true;
        self
    }

    /// Handle to what the stream recorded; stays valid after the stream is moved.
    pub fn log(&self) -> Arc<Mutex<StreamLog>> {
        Arc::clone(&self.log)
    }
}

impl Default for ScriptedStream {
    fn default() -> Self {
        Self::new()
    }
}

fn not_connected() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotConnected, "stream is not connected")
}

#[async_trait]
impl StreamConnection for ScriptedStream {
    async fn connect(&mut self, _host: &str, _port: u16, _timeout: Duration) -> std::io::Result<()> {
        lock(&self.log).connects += 1;
        match self.behaviour {
            ConnectBehaviour::Accept => {
                self.connected = true;
                self.inbound.extend_from_slice(&self.greeting);
                Ok(())
            }
            ConnectBehaviour::Refuse => Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )),
            ConnectBehaviour::Hang => std::future::pending().await,
        }
    }

    async fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        if !self.connected {
            return Err(not_connected());
        }
        lock(&self.log).writes.push(bytes.to_vec());
        if let Some(reply) = self.replies.pop_front() {
            self.inbound.extend_from_slice(&reply);
        }
        Ok(())
    }

    async fn read_until(&mut self, delimiter: &[u8]) -> std::io::Result<Vec<u8>> {
        if !self.connected {
            return Err(not_connected());
        }
        if delimiter.is_empty() {
            return Ok(Vec::new());
        }
        let found = self
            .inbound
            .windows(delimiter.len())
            .position(|window| window == delimiter);
        match found {
            Some(at) => Ok(self.inbound.drain(..at + delimiter.len()).collect()),
            None if self.eof_when_drained => Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "script exhausted",
            )),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> std::io::Result<()> {
        if self.connected {
            lock(&self.log).closes += 1;
            self.connected = false;
        }
        Ok(())
    }
}
