//! dubbo-invoke CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: defaults, then `dubbo-invoke.toml`, then
//!    `DUBBO_INVOKE_*` environment variables and flags (see [`config`]).
//! 2. **Wire observability**: a `tracing-subscriber` registry on stderr,
//!    optionally exporting spans over OTLP (see [`observability`]).
//! 3. **Construct infrastructure**: a [`ZookeeperRegistry`] behind a
//!    [`ServiceResolver`], and a [`TelnetConnection`] per invocation.
//! 4. **Dispatch the subcommand** (see [`commands`]).
//!
//! Invocation results are printed to stdout; provider tables, the command
//! sent, and diagnostics go to stderr.

mod commands;
mod config;
mod observability;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::error;

use invocation::{InvocationRequest, ServiceResolver, TextEncoding};
use telnet::TelnetConnection;
use zookeeper::ZookeeperRegistry;

use crate::config::{ConfigOverrides, InvokerConfig};
use crate::observability::{LogFormat, TelemetryConfig};

/// Invoke Dubbo service methods through the provider's telnet console
#[derive(Parser)]
#[command(name = "dubbo-invoke", version, about)]
struct Cli {
    /// Config file (default: ./dubbo-invoke.toml when present)
    #[arg(short, long, global = true, env = "DUBBO_INVOKE_CONFIG")]
    config: Option<PathBuf>,

    /// ZooKeeper connect string
    #[arg(long, global = true, env = "DUBBO_INVOKE_REGISTRY")]
    registry: Option<String>,

    /// Registry session timeout in seconds
    #[arg(long, global = true, env = "DUBBO_INVOKE_REGISTRY_TIMEOUT")]
    registry_timeout: Option<u64>,

    /// Console prompt token
    #[arg(long, global = true, env = "DUBBO_INVOKE_PROMPT")]
    prompt: Option<String>,

    /// Console output encoding (utf-8, latin-1)
    #[arg(long, global = true, env = "DUBBO_INVOKE_ENCODING")]
    encoding: Option<TextEncoding>,

    /// Provider connect timeout in seconds
    #[arg(long, global = true, env = "DUBBO_INVOKE_CONNECT_TIMEOUT")]
    connect_timeout: Option<u64>,

    /// Read timeout in seconds while waiting for the prompt (0 waits forever)
    #[arg(long, global = true, env = "DUBBO_INVOKE_READ_TIMEOUT")]
    read_timeout: Option<u64>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text, env = "DUBBO_INVOKE_LOG_FORMAT")]
    log_format: LogFormat,

    /// Export spans to this OTLP gRPC endpoint
    #[arg(long, global = true, env = "DUBBO_INVOKE_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Invoke a method and print its result
    Invoke {
        /// Service name, short (UserInfoRpcService) or fully qualified
        service: String,
        /// Method name
        method: String,
        /// Arguments as JSON: an array is the argument list, any other value one argument
        #[arg(short, long)]
        params: Option<String>,
        /// Provider host; bypasses the registry (requires --port)
        #[arg(long, requires = "port")]
        host: Option<String>,
        /// Provider port; bypasses the registry (requires --host)
        #[arg(long, requires = "host")]
        port: Option<u16>,
        /// Which registered provider to use when there are several
        #[arg(short, long, default_value_t = 0)]
        index: usize,
    },
    /// List the providers registered for a service
    Providers {
        /// Service name, short or fully qualified
        service: String,
    },
    /// List registered services by short name
    Services,
    /// Invoke the request(s) described in a JSON case file
    Run {
        /// File holding one request object or an array of them
        file: PathBuf,
    },
}

impl Cli {
    fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            verbosity: self.verbose,
            format: self.log_format,
            otlp_endpoint: self.otlp_endpoint.clone(),
        }
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            registry_address: self.registry.clone(),
            registry_timeout_secs: self.registry_timeout,
            prompt: self.prompt.clone(),
            encoding: self.encoding,
            connect_timeout_secs: self.connect_timeout,
            read_timeout_secs: self.read_timeout,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _telemetry = match observability::init(&cli.telemetry()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "dubbo-invoke failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = InvokerConfig::load(cli.config.as_deref(), &cli.overrides())?;
    let mut resolver = ServiceResolver::new(ZookeeperRegistry::new(
        config.registry_address.clone(),
        config.registry_timeout,
    ));
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();

    match cli.command {
        Command::Invoke {
            service,
            method,
            params,
            host,
            port,
            index,
        } => {
            let params = match params {
                Some(text) => commands::parse_params(&text)?,
                None => Vec::new(),
            };
            let mut builder = InvocationRequest::builder(service, method)
                .params(params)
                .address_index(index);
            if let Some(host) = host {
                builder = builder.host(host);
            }
            if let Some(port) = port {
                builder = builder.port(port);
            }
            let request = builder.build()?;
            commands::invoke(
                &mut resolver,
                TelnetConnection::new(),
                &request,
                &config.session,
                &mut stdout,
                &mut stderr,
            )
            .await?;
        }
        Command::Providers { service } => {
            commands::providers(&mut resolver, &service, &mut stdout).await?;
        }
        Command::Services => {
            commands::services(&mut resolver, &mut stdout).await?;
        }
        Command::Run { file } => {
            let cases = commands::load_cases(&file)?;
            let total = cases.len();
            let mut failed = 0;
            for (i, request) in cases.iter().enumerate() {
                let outcome = commands::invoke(
                    &mut resolver,
                    TelnetConnection::new(),
                    request,
                    &config.session,
                    &mut stdout,
                    &mut stderr,
                )
                .await
                .with_context(|| format!("case {i}"));
                if let Err(e) = outcome {
                    failed += 1;
                    if total == 1 {
                        return Err(e);
                    }
                    eprintln!("error: {e:#}");
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} of {total} cases failed");
            }
        }
    }
    Ok(())
}
