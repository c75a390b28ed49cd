//! Subcommand bodies, written against the port traits so they run unchanged
//! over the real adapters or the in-memory fakes.

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context};
use tracing::warn;

use invocation::{
    encoder, invoke_at, select_target, InvocationOutcome, InvocationRequest, RegistryClient,
    ServiceResolver, SessionConfig, StreamConnection, Value,
};

use crate::render;

/// Parses `--params`: a JSON array is the argument list, `null` is no
/// arguments, and any other JSON value is a single argument.
pub fn parse_params(text: &str) -> anyhow::Result<Vec<Value>> {
    let value = Value::from_json_str(text)
        .with_context(|| format!("--params is not valid JSON: {text}"))?;
    Ok(match value {
        Value::Sequence(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    })
}

/// Reads request mappings from a JSON file: one object, or an array of them.
pub fn load_cases(path: &Path) -> anyhow::Result<Vec<InvocationRequest>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read case file {}", path.display()))?;
    let value = Value::from_json_str(&text)
        .with_context(|| format!("case file {} is not valid JSON", path.display()))?;

    let cases = match value {
        Value::Sequence(items) => items,
        single => vec![single],
    };
    if cases.is_empty() {
        bail!("case file {} contains no cases", path.display());
    }
    cases
        .iter()
        .enumerate()
        .map(|(i, case)| {
            InvocationRequest::from_value(case)
                .with_context(|| format!("case {i} in {}", path.display()))
        })
        .collect()
}

/// Resolves, reports the target on `notes`, invokes, and prints the result
/// on `out`. The registry is not contacted for a direct host/port request.
pub async fn invoke<R, S>(
    resolver: &mut ServiceResolver<R>,
    stream: S,
    request: &InvocationRequest,
    session: &SessionConfig,
    out: &mut impl Write,
    notes: &mut impl Write,
) -> anyhow::Result<InvocationOutcome>
where
    R: RegistryClient,
    S: StreamConnection,
{
    if request.direct_target().is_none() {
        resolver.open().await.context("failed to open registry")?;
    }
    let selected = select_target(resolver, request).await;
    if let Err(e) = resolver.close().await {
        warn!(error = %e, "failed to close registry");
    }
    let target = selected?;

    render::write_target(notes, request.service().as_str(), &target)?;
    writeln!(notes, "{} {}", session.prompt, encoder::encode_request(request))?;

    let result = invoke_at(stream, target.address(), request, session).await?;
    render::write_result(out, &result)?;
    for note in render::result_notes(&result) {
        writeln!(notes, "{note}")?;
    }
    Ok(InvocationOutcome { target, result })
}

/// Prints the providers registered for `service`.
pub async fn providers<R: RegistryClient>(
    resolver: &mut ServiceResolver<R>,
    service: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    resolver.open().await.context("failed to open registry")?;
    let resolved = resolver.resolve(service).await;
    if let Err(e) = resolver.close().await {
        warn!(error = %e, "failed to close registry");
    }
    let providers = resolved?;
    render::write_providers(out, service, &providers, None)?;
    Ok(())
}

/// Prints every service reachable by short name.
pub async fn services<R: RegistryClient>(
    resolver: &mut ServiceResolver<R>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    resolver.open().await.context("failed to open registry")?;
    let services = resolver.services();
    resolver.close().await?;
    render::write_services(out, &services)?;
    Ok(())
}
