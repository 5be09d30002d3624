use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::info;
use tracing_subscriber::prelude::*;

use netmux::{
    ChildProcess, ListenOptions, Operator, Relay, RelayConfig, RelayError, Shutdown,
    bind_and_listen, config::load_config,
};

#[derive(Parser)]
#[command(name = "netmux")]
#[command(about = "Expose an interactive program over TCP")]
struct Args {
    /// Port to accept client connections on
    port: u16,

    /// Command to run
    command: String,

    /// Arguments for the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// TOML file with relay settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind only this address instead of the dual-stack wildcard
    #[arg(long)]
    host: Option<IpAddr>,

    /// Maximum bytes per read
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Listen backlog
    #[arg(long)]
    backlog: Option<u32>,

    /// Forward operator input to the command
    #[arg(long)]
    forward_input: bool,

    /// Do not copy the command's output to this terminal
    #[arg(long)]
    no_echo: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not usage errors
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Logs go to stderr: stdout belongs to the relayed traffic
    let default_directive = if args.debug {
        "netmux=debug"
    } else {
        "netmux=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("netmux: {:#}", e);
            return ExitCode::from(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => return fail(RelayError::Wait(e)),
    };

    let outcome = runtime.block_on(serve(args, config));

    // A blocked stdin read would otherwise keep the runtime alive
    runtime.shutdown_background();

    match outcome {
        Ok(Shutdown::OperatorClosed) => {
            info!("Operator closed input");
            ExitCode::SUCCESS
        }
        Ok(Shutdown::ChildExited { status }) => {
            eprintln!("Pipe closed");
            info!("Command finished with status {:?}", status);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Defaults → config file → NETMUX_* env → CLI flags.
fn resolve_config(args: &Args) -> Result<RelayConfig> {
    let mut config: RelayConfig = load_config(args.config.as_deref())
        .extract()
        .context("Failed to load configuration")?;

    if let Some(host) = args.host {
        config.host = Some(host);
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(backlog) = args.backlog {
        config.backlog = backlog;
    }
    if args.forward_input {
        config.forward_operator_input = true;
    }
    if args.no_echo {
        config.echo_child_output = false;
    }

    config
        .validate()
        .map_err(|e| anyhow!(e))
        .context("Invalid configuration")
}

async fn serve(args: Args, config: RelayConfig) -> Result<Shutdown, RelayError> {
    info!("Starting netmux for: {} {:?}", args.command, args.args);

    // The child comes up before the socket, so a bad command fails fast
    let child = ChildProcess::spawn(&args.command, &args.args)?;

    let listener = bind_and_listen(
        args.port,
        &ListenOptions {
            host: config.host,
            backlog: config.backlog,
        },
    )?;

    Relay::new(config, Operator::stdio(), listener, child)
        .run()
        .await
}

fn fail(e: RelayError) -> ExitCode {
    eprintln!("netmux: {}", e);
    ExitCode::from(e.exit_code())
}
