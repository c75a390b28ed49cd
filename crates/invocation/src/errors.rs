//! Error types for the invocation domain.
//!
//! Each component has its own error enum so callers can match on exactly the
//! failures that component can produce:
//!
//! | Component | Error |
//! |-----------|-------|
//! | Request construction | [`InvalidRequestError`] |
//! | Address codec | [`MalformedProviderAddress`] |
//! | Registry port | [`RegistryError`] |
//! | Resolver | [`ResolveError`] |
//! | Session engine | [`SessionError`] |
//! | Response decoder | [`ResponseDecodeWarning`] (never returned as `Err`) |
//!
//! [`InvokeError`] aggregates all fatal kinds and attaches the
//! [`InvocationContext`] (service, method, address) that was being attempted.

use std::time::Duration;

use thiserror::Error;

use crate::session::SessionState;

// ---------------------------------------------------------------------------
// Request validation
// ---------------------------------------------------------------------------

/// A caller-supplied request could not be turned into an
/// [`InvocationRequest`](crate::InvocationRequest).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid request: {reason}")]
pub struct InvalidRequestError {
    /// What was wrong with the request.
    pub reason: String,
}

impl InvalidRequestError {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Address codec
// ---------------------------------------------------------------------------

/// A provider node name did not decode into a `host:port` authority.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed provider address '{raw}': {reason}")]
pub struct MalformedProviderAddress {
    /// The node name exactly as it was read from the registry.
    pub raw: String,
    /// Which part of the decoding failed.
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Registry port
// ---------------------------------------------------------------------------

/// Failures reported by a [`RegistryClient`](crate::RegistryClient) implementation.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A read was attempted before `connect()` or after `disconnect()`.
    #[error("Registry connection is not open")]
    NotOpen,

    /// The registry could not be reached within the configured timeout.
    #[error("Timed out after {timeout:?} connecting to registry at {address}")]
    ConnectTimeout {
        /// The registry address that was dialled.
        address: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The underlying transport reported an error.
    #[error("Registry {operation} failed for '{path}': {message}")]
    Transport {
        /// The operation being performed (`connect`, `exists`, `list_children`).
        operation: &'static str,
        /// The node path involved, or the registry address for `connect`.
        path: String,
        /// The transport's own error text.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Why a fully-qualified service could not supply providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailability {
    /// No node exists for the service under the registry root.
    NotRegistered,
    /// The service node exists but has no `providers` node, or it is empty.
    NoProviders,
}

impl std::fmt::Display for Unavailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unavailability::NotRegistered => f.write_str("service is not registered"),
            Unavailability::NoProviders => f.write_str("service has no providers"),
        }
    }
}

/// Failures mapping a service name to provider addresses.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A short name has no entry in the registered-services map.
    #[error("Unknown service '{name}': no registered service has this short name")]
    UnknownService {
        /// The short name that was looked up.
        name: String,
    },

    /// The fully-qualified service exists in neither form the resolver needs.
    #[error("Service '{service}' not available: {reason}")]
    ServiceNotAvailable {
        /// The fully-qualified service name.
        service: String,
        /// Which condition triggered the failure.
        reason: Unavailability,
    },

    /// A provider node name could not be decoded.
    #[error(transparent)]
    MalformedProvider(#[from] MalformedProviderAddress),

    /// The registry itself failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ---------------------------------------------------------------------------
// Session engine
// ---------------------------------------------------------------------------

/// Failures driving the telnet session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The stream was not established within the connect timeout.
    #[error("Timed out after {timeout:?} connecting to {address}")]
    ConnectTimeout {
        /// The `host:port` that was dialled.
        address: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The stream connect failed before the timeout (e.g. connection refused).
    #[error("Failed to connect to {address}: {source}")]
    ConnectFailed {
        /// The `host:port` that was dialled.
        address: String,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// An operation was attempted in a state that does not permit it.
    #[error("Cannot {operation} while session is {state}")]
    ProtocolState {
        /// The operation that was rejected.
        operation: &'static str,
        /// The state the session was in.
        state: SessionState,
    },

    /// The prompt did not appear within the read timeout.
    #[error("Timed out after {timeout:?} waiting for prompt while {state}")]
    ReadTimeout {
        /// The timeout that elapsed.
        timeout: Duration,
        /// The state the session remains in.
        state: SessionState,
    },

    /// The server closed the stream before sending the prompt.
    #[error("Connection closed by server before prompt")]
    ConnectionClosed,

    /// Any other I/O failure on the stream.
    #[error("Stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Response decoder
// ---------------------------------------------------------------------------

/// The trimmed response was not valid JSON.
///
/// Non-fatal: the raw text is still returned. Many methods legitimately return
/// scalars or free text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Response is not structured data: {message}")]
pub struct ResponseDecodeWarning {
    /// The parser's diagnostic.
    pub message: String,
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// What was being attempted when an [`InvokeError`] occurred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    /// Service name as supplied by the caller.
    pub service: Option<String>,
    /// Method name as supplied by the caller.
    pub method: Option<String>,
    /// `host:port` being dialled, once one was selected.
    pub address: Option<String>,
}

impl std::fmt::Display for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let service = self.service.as_deref().unwrap_or("?");
        let method = self.method.as_deref().unwrap_or("?");
        write!(f, "invoke {service}.{method}")?;
        if let Some(address) = &self.address {
            write!(f, " at {address}")?;
        }
        Ok(())
    }
}

/// The component failure behind an [`InvokeError`].
#[derive(Debug, Error)]
pub enum InvokeErrorKind {
    /// The request was malformed.
    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequestError),

    /// Resolving the service failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The session failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// A fatal failure of one invocation attempt, with the context it happened in.
#[derive(Debug, Error)]
#[error("{context}: {kind}")]
pub struct InvokeError {
    /// What was being attempted.
    pub context: InvocationContext,
    /// What went wrong.
    #[source]
    pub kind: InvokeErrorKind,
}

impl InvokeError {
    /// Wraps a component error with its context.
    pub fn new(context: InvocationContext, kind: impl Into<InvokeErrorKind>) -> Self {
        Self {
            context,
            kind: kind.into(),
        }
    }

    /// Returns `true` if the failure was a connect timeout.
    pub fn is_connect_timeout(&self) -> bool {
        matches!(
            self.kind,
            InvokeErrorKind::Session(SessionError::ConnectTimeout { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_error_message_names_context() {
        let context = InvocationContext {
            service: Some("UserInfoRpcService".to_string()),
            method: Some("getUserState".to_string()),
            address: Some("10.0.0.5:20880".to_string()),
        };
        let err = InvokeError::new(
            context,
            SessionError::ConnectTimeout {
                address: "10.0.0.5:20880".to_string(),
                timeout: Duration::from_secs(1),
            },
        );
        let message = err.to_string();
        assert!(message.starts_with("invoke UserInfoRpcService.getUserState at 10.0.0.5:20880"));
        assert!(message.contains("Timed out"));
        assert!(err.is_connect_timeout());
    }

    #[test]
    fn test_unavailability_messages_differ() {
        let not_registered = ResolveError::ServiceNotAvailable {
            service: "a.B".to_string(),
            reason: Unavailability::NotRegistered,
        };
        let no_providers = ResolveError::ServiceNotAvailable {
            service: "a.B".to_string(),
            reason: Unavailability::NoProviders,
        };
        assert_ne!(not_registered.to_string(), no_providers.to_string());
    }
}
