//! One-shot invocation: pick a target, open a session, invoke, close.
//!
//! Target selection:
//!
//! - a request carrying both `host` and `port` is dialled directly and the
//!   registry is never consulted;
//! - otherwise the service is resolved and `address_index` picks one of the
//!   returned providers.
//!
//! Every failure comes back as an [`InvokeError`] carrying the service, method
//! and (once chosen) provider address.

use tracing::{info, instrument, warn};

use crate::address::ProviderAddress;
use crate::errors::{InvalidRequestError, InvocationContext, InvokeError};
use crate::ports::{RegistryClient, StreamConnection};
use crate::request::InvocationRequest;
use crate::resolver::ServiceResolver;
use crate::session::{Session, SessionConfig};
use crate::types::InvocationResult;

/// The provider an invocation was sent to, and the candidates it was chosen
/// from. The chosen index is always within `providers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    providers: Vec<ProviderAddress>,
    index: usize,
    direct: bool,
}

impl Target {
    /// A caller-supplied host and port.
    pub fn direct(address: ProviderAddress) -> Self {
        Self {
            providers: vec![address],
            index: 0,
            direct: true,
        }
    }

    /// The provider at `index` among those the registry returned, or `None`
    /// when `index` is out of range.
    pub fn resolved(providers: Vec<ProviderAddress>, index: usize) -> Option<Self> {
        (index < providers.len()).then_some(Self {
            providers,
            index,
            direct: false,
        })
    }

    /// The address that is dialled.
    pub fn address(&self) -> &ProviderAddress {
        &self.providers[self.index]
    }

    /// All candidate providers, in registry order. A direct target has exactly one.
    pub fn providers(&self) -> &[ProviderAddress] {
        &self.providers
    }

    /// Position of [`address`](Self::address) in [`providers`](Self::providers).
    pub fn index(&self) -> usize {
        self.index
    }

    /// True when the registry was bypassed.
    pub fn is_direct(&self) -> bool {
        self.direct
    }
}

/// A completed invocation and where it ran.
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    /// Where the call was sent.
    pub target: Target,
    /// What the provider answered.
    pub result: InvocationResult,
}

/// Chooses the provider `request` should be sent to.
#[instrument(skip_all, fields(service = %request.service(), index = request.address_index()))]
pub async fn select_target<R: RegistryClient>(
    resolver: &ServiceResolver<R>,
    request: &InvocationRequest,
) -> Result<Target, InvokeError> {
    if let Some((host, port)) = request.direct_target() {
        info!(host, port, "using direct address; registry bypassed");
        return Ok(Target::direct(ProviderAddress::direct(host, port)));
    }

    let providers = resolver
        .resolve(request.service().as_str())
        .await
        .map_err(|e| InvokeError::new(request.context(), e))?;

    let index = request.address_index();
    let registered = providers.len();
    Target::resolved(providers, index).ok_or_else(|| {
        InvokeError::new(
            request.context(),
            InvalidRequestError::new(format!(
                "address index {index} is out of range; {registered} provider(s) registered"
            )),
        )
    })
}

/// Opens a session to `address`, performs `request`, and closes the session.
#[instrument(skip_all, fields(address = %address, service = %request.service(), method = %request.method()))]
pub async fn invoke_at<S: StreamConnection>(
    stream: S,
    address: &ProviderAddress,
    request: &InvocationRequest,
    config: &SessionConfig,
) -> Result<InvocationResult, InvokeError> {
    let context = InvocationContext {
        address: Some(address.authority()),
        ..request.context()
    };

    let mut session = Session::connect(stream, address.clone(), config.clone())
        .await
        .map_err(|e| InvokeError::new(context.clone(), e))?;

    let outcome = session.invoke(request).await;
    if let Err(e) = session.close().await {
        warn!(error = %e, "failed to close session");
    }

    let result = outcome.map_err(|e| InvokeError::new(context, e))?;
    info!(
        structured = result.structured.is_some(),
        elapsed_ms = result.server_elapsed.map(|d| d.as_millis() as u64),
        "invocation complete"
    );
    Ok(result)
}

/// Selects a target for `request` and invokes it over `stream`.
///
/// No stream connection is attempted unless target selection succeeds.
pub async fn invoke_once<R, S>(
    resolver: &ServiceResolver<R>,
    stream: S,
    request: &InvocationRequest,
    config: &SessionConfig,
) -> Result<InvocationOutcome, InvokeError>
where
    R: RegistryClient,
    S: StreamConnection,
{
    let target = select_target(resolver, request).await?;
    let result = invoke_at(stream, target.address(), request, config).await?;
    Ok(InvocationOutcome { target, result })
}
