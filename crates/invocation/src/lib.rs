//! Core invocation domain for dubbo-invoke.
//!
//! This crate contains the request and result types, the console wire
//! encoding, the registry resolver, and the telnet session state machine.
//! Infrastructure crates implement the port traits defined here; they never
//! add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate opens no sockets itself.
//! It defines *what* is needed; `zookeeper` and `telnet` define *how* to
//! supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ServiceName`, `MethodName`, `SessionId`) |
//! | [`types`] | Shared value types (`Value`, `TextEncoding`, `InvocationResult`) |
//! | [`errors`] | Per-component error types and the aggregate `InvokeError` |
//! | [`request`] | `InvocationRequest` and its builder |
//! | [`address`] | Provider address codec |
//! | [`encoder`] | `invoke` command rendering |
//! | [`decoder`] | Console reply decoding |
//! | [`ports`] | `RegistryClient` and `StreamConnection` traits |
//! | [`resolver`] | Service name → provider addresses |
//! | [`session`] | Telnet session state machine |
//! | [`invoker`] | Target selection and one-shot invocation |

pub mod address;
pub mod decoder;
pub mod encoder;
pub mod errors;
pub mod identifiers;
pub mod invoker;
pub mod ports;
pub mod request;
pub mod resolver;
pub mod session;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use address::ProviderAddress;
pub use errors::{
    InvalidRequestError, InvocationContext, InvokeError, InvokeErrorKind, MalformedProviderAddress,
    RegistryError, ResolveError, ResponseDecodeWarning, SessionError, Unavailability,
};
pub use identifiers::{MethodName, ServiceName, SessionId};
pub use invoker::{invoke_at, invoke_once, select_target, InvocationOutcome, Target};
pub use ports::{RegistryClient, StreamConnection};
pub use request::{InvocationRequest, RequestBuilder};
pub use resolver::{ServiceDescriptor, ServiceResolver, REGISTRY_ROOT};
pub use session::{Session, SessionConfig, SessionState, DEFAULT_PROMPT};
pub use types::{InvocationResult, TextEncoding, Timestamp, Value};
