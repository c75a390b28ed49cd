//! Service registry resolver.
//!
//! Maps a service name, short or fully qualified, to the provider addresses
//! registered under it:
//!
//! ```text
//! /dubbo
//! └── com.example.user.UserInfoRpcService
//!     └── providers
//!         ├── dubbo%3A%2F%2F10.0.0.5%3A20880%2F...
//!         └── dubbo%3A%2F%2F10.0.0.6%3A20880%2F...
//! ```
//!
//! The short-name map is built once, in [`ServiceResolver::open`]. When two
//! registered services share a short name the one listed later wins; the
//! earlier one is then reachable only by its fully-qualified name.
//!
//! Providers are returned in registry enumeration order. That order is not
//! guaranteed to be stable between calls, so an address index chosen from one
//! listing may point at a different provider in the next.

use std::collections::HashMap;

use tracing::{debug, info, instrument, warn};

use crate::address::{self, ProviderAddress};
use crate::errors::{RegistryError, ResolveError, Unavailability};
use crate::identifiers::short_name_of;
use crate::ports::RegistryClient;

/// Root namespace under which services register.
pub const REGISTRY_ROOT: &str = "/dubbo";

const PROVIDERS_NODE: &str = "providers";

/// A registered service and the short name it can be looked up by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServiceDescriptor {
    /// Last dot-separated segment of the fully-qualified name.
    pub short_name: String,
    /// The node name under [`REGISTRY_ROOT`].
    pub fully_qualified_name: String,
}

/// Resolves service names against a [`RegistryClient`].
///
/// Owns the registry connection for its lifetime. After [`open`](Self::open)
/// all lookups take `&self`, so one resolver can be shared (e.g. behind an
/// `Arc`) by concurrent callers.
#[derive(Debug)]
pub struct ServiceResolver<R> {
    client: R,
    short_names: HashMap<String, String>,
    open: bool,
}

impl<R: RegistryClient> ServiceResolver<R> {
    /// Wraps a registry client. No connection is made until [`open`](Self::open).
    pub fn new(client: R) -> Self {
        Self {
            client,
            short_names: HashMap::new(),
            open: false,
        }
    }

    /// Connects to the registry and builds the short-name map.
    ///
    /// Calling `open` on an already-open resolver does nothing.
    #[instrument(skip(self))]
    pub async fn open(&mut self) -> Result<(), ResolveError> {
        if self.open {
            return Ok(());
        }

        self.client.connect().await?;
        self.open = true;

        match self.load_services().await {
            Ok(map) => {
                info!(services = map.len(), "registry opened");
                self.short_names = map;
                Ok(())
            }
            Err(e) => {
                if let Err(close_err) = self.close().await {
                    warn!(error = %close_err, "failed to close registry after load error");
                }
                Err(e)
            }
        }
    }

    /// Releases the registry connection. Safe to call repeatedly or before `open`.
    #[instrument(skip(self))]
    pub async fn close(&mut self) -> Result<(), RegistryError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.short_names.clear();
        self.client.disconnect().await?;
        debug!("registry closed");
        Ok(())
    }

    /// `true` between a successful [`open`](Self::open) and [`close`](Self::close).
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Every service reachable by short name, sorted by fully-qualified name.
    pub fn services(&self) -> Vec<ServiceDescriptor> {
        let mut services: Vec<ServiceDescriptor> = self
            .short_names
            .iter()
            .map(|(short, full)| ServiceDescriptor {
                short_name: short.clone(),
                fully_qualified_name: full.clone(),
            })
            .collect();
        services.sort_by(|a, b| a.fully_qualified_name.cmp(&b.fully_qualified_name));
        services
    }

    /// Expands a short name to its fully-qualified form; qualified names pass through.
    pub fn qualify(&self, service: &str) -> Result<String, ResolveError> {
        if service.contains('.') {
            return Ok(service.to_string());
        }
        self.short_names
            .get(service)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownService {
                name: service.to_string(),
            })
    }

    /// Returns the providers registered for `service`, in registry order.
    #[instrument(skip(self))]
    pub async fn resolve(&self, service: &str) -> Result<Vec<ProviderAddress>, ResolveError> {
        if !self.open {
            return Err(RegistryError::NotOpen.into());
        }

        let qualified = self.qualify(service)?;
        let service_path = format!("{REGISTRY_ROOT}/{qualified}");
        if !self.client.exists(&service_path).await? {
            return Err(ResolveError::ServiceNotAvailable {
                service: qualified,
                reason: Unavailability::NotRegistered,
            });
        }

        let providers_path = format!("{service_path}/{PROVIDERS_NODE}");
        if !self.client.exists(&providers_path).await? {
            return Err(ResolveError::ServiceNotAvailable {
                service: qualified,
                reason: Unavailability::NoProviders,
            });
        }

        let nodes = self.client.list_children(&providers_path).await?;
        if nodes.is_empty() {
            return Err(ResolveError::ServiceNotAvailable {
                service: qualified,
                reason: Unavailability::NoProviders,
            });
        }

        let providers = nodes
            .iter()
            .map(String::as_str)
            .map(address::decode)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(service = %qualified, providers = providers.len(), "resolved providers");
        Ok(providers)
    }

    async fn load_services(&self) -> Result<HashMap<String, String>, ResolveError> {
        let mut map = HashMap::new();
        if !self.client.exists(REGISTRY_ROOT).await? {
            warn!(root = REGISTRY_ROOT, "registry root does not exist; no services registered");
            return Ok(map);
        }

        for full in self.client.list_children(REGISTRY_ROOT).await? {
            let short = short_name_of(&full).to_string();
            if let Some(previous) = map.insert(short.clone(), full.clone()) {
                debug!(
                    short_name = %short,
                    replaced = %previous,
                    by = %full,
                    "short name collision; later service wins"
                );
            }
        }
        Ok(map)
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
