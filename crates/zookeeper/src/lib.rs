//! dubbo-invoke ZooKeeper registry adapter.
//!
//! Implements the [`RegistryClient`] trait defined in the [`invocation`] crate
//! using [`zookeeper_client`](https://github.com/kezhuw/zookeeper-client-rust).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. Session
//! establishment, the wire protocol, and ZooKeeper error codes are handled
//! here; the [`invocation`] crate only ever sees [`RegistryError`].
//!
//! Only read operations are used. The adapter never creates, watches, or
//! modifies nodes.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use invocation::{RegistryClient, RegistryError};

/// Default ZooKeeper connect string.
pub const DEFAULT_REGISTRY_ADDRESS: &str = "127.0.0.1:2181";

/// Default upper bound on establishing the ZooKeeper session.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(100);

/// A [`RegistryClient`] backed by a ZooKeeper ensemble.
pub struct ZookeeperRegistry {
    cluster: String,
    connect_timeout: Duration,
    client: Option<zookeeper_client::Client>,
}

impl ZookeeperRegistry {
    /// A registry client for `cluster` (`host:port[,host:port...][/chroot]`).
    /// No connection is made until [`RegistryClient::connect`].
    pub fn new(cluster: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            cluster: cluster.into(),
            connect_timeout,
            client: None,
        }
    }

    /// The connect string this client dials.
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// `true` while a ZooKeeper session is held.
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&zookeeper_client::Client, RegistryError> {
        self.client.as_ref().ok_or(RegistryError::NotOpen)
    }
}

impl std::fmt::Debug for ZookeeperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZookeeperRegistry")
            .field("cluster", &self.cluster)
            .field("connect_timeout", &self.connect_timeout)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Default for ZookeeperRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY_ADDRESS, DEFAULT_CONNECT_TIMEOUT)
    }
}

fn transport(operation: &'static str, path: &str, err: zookeeper_client::Error) -> RegistryError {
    RegistryError::Transport {
        operation,
        path: path.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl RegistryClient for ZookeeperRegistry {
    #[instrument(skip(self), fields(cluster = %self.cluster))]
    async fn connect(&mut self) -> Result<(), RegistryError> {
        if self.client.is_some() {
            return Ok(());
        }

        let connect = zookeeper_client::Client::connect(&self.cluster);
        let client = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| RegistryError::ConnectTimeout {
                address: self.cluster.clone(),
                timeout: self.connect_timeout,
            })?
            .map_err(|e| transport("connect", &self.cluster, e))?;

        info!("connected to registry");
        self.client = Some(client);
        Ok(())
    }

    #[instrument(skip(self), fields(cluster = %self.cluster))]
    async fn disconnect(&mut self) -> Result<(), RegistryError> {
        // The session ends once the last handle is dropped.
        if self.client.take().is_some() {
            debug!("disconnected from registry");
        }
        Ok(())
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>, RegistryError> {
        let children = self
            .client()?
            .list_children(path)
            .await
            .map_err(|e| transport("list_children", path, e))?;
        debug!(path, children = children.len(), "listed registry children");
        Ok(children)
    }

    async fn exists(&self, path: &str) -> Result<bool, RegistryError> {
        let stat = self
            .client()?
            .check_stat(path)
            .await
            .map_err(|e| transport("exists", path, e))?;
        Ok(stat.is_some())
    }
}
