//! Provider address codec.
//!
//! Providers register themselves as child nodes of `/dubbo/<service>/providers`
//! whose names are percent-encoded URIs:
//!
//! ```text
//! dubbo%3A%2F%2F10.0.0.5%3A20880%2Fcom.example.UserService%3Fanyhost%3Dtrue
//! ```
//!
//! which decodes to `dubbo://10.0.0.5:20880/com.example.UserService?anyhost=true`.
//! The authority is taken as segment 2 of the decoded string split on `/`. This
//! depends on the registry keeping the `scheme://host:port/...` layout; a URI
//! of any other shape is rejected with [`MalformedProviderAddress`].

use serde::{Deserialize, Serialize};

use crate::errors::MalformedProviderAddress;

const AUTHORITY_SEGMENT: usize = 2;

/// A provider's network address as recorded in the registry.
///
/// The port is kept as text so it can be echoed back exactly as registered.
/// [`decode`] has already checked that it fits a `u16`;
/// use [`ProviderAddress::port_number`] to dial it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderAddress {
    host: String,
    port: String,
    raw_uri: String,
}

impl ProviderAddress {
    /// Builds an address for a caller-supplied `host`/`port`, bypassing the registry.
    pub fn direct(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let raw_uri = format!("dubbo://{host}:{port}");
        Self {
            host,
            port: port.to_string(),
            raw_uri,
        }
    }

    /// Host name or IP address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port exactly as registered.
    pub fn port(&self) -> &str {
        &self.port
    }

    /// The percent-decoded provider URI this address was taken from.
    pub fn raw_uri(&self) -> &str {
        &self.raw_uri
    }

    /// `host:port`.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parses the port for dialling.
    pub fn port_number(&self) -> Result<u16, MalformedProviderAddress> {
        self.port
            .trim()
            .parse::<u16>()
            .map_err(|e| MalformedProviderAddress {
                raw: self.raw_uri.clone(),
                reason: format!("port '{}' is not a valid port number: {e}", self.port),
            })
    }
}

impl std::fmt::Display for ProviderAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Decodes a provider node name into a [`ProviderAddress`].
pub fn decode(raw_node_name: &str) -> Result<ProviderAddress, MalformedProviderAddress> {
    let malformed = |reason: String| MalformedProviderAddress {
        raw: raw_node_name.to_string(),
        reason,
    };

    let uri = urlencoding::decode(raw_node_name)
        .map_err(|e| malformed(format!("percent-decoded bytes are not UTF-8: {e}")))?
        .into_owned();

    let authority = uri
        .split('/')
        .nth(AUTHORITY_SEGMENT)
        .ok_or_else(|| malformed("URI has no host:port segment".to_string()))?;

    let (host, port) = authority
        .split_once(':')
        .ok_or_else(|| malformed(format!("authority '{authority}' has no ':' separator")))?;

    if host.is_empty() {
        return Err(malformed(format!("authority '{authority}' has an empty host")));
    }
    if port.is_empty() {
        return Err(malformed(format!("authority '{authority}' has an empty port")));
    }
    if port.parse::<u16>().is_err() {
        return Err(malformed(format!("authority '{authority}' has an invalid port")));
    }

    Ok(ProviderAddress {
        host: host.to_string(),
        port: port.to_string(),
        raw_uri: uri,
    })
}
