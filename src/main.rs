//! `podwire` application entry point.
//!
//! A small client for Docker and Podman daemons built on the `podwire`
//! library. It uses `eyre` for opaque error handling at the application
//! boundary, converting domain-specific errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/podwire/config.toml` or path from `PODWIRE_CONFIG_PATH`)
//! 3. Environment variables (`PODWIRE_*`)
//! 4. Command-line arguments
//!
//! Logging goes to stderr through `tracing-subscriber`; set `RUST_LOG` to
//! raise the default `warn` level.

use bollard::models::{EventMessage, SystemVersion};
use clap::Parser;
use eyre::{Report, Result as EyreResult};
use futures_util::StreamExt;
use mockable::DefaultEnv;
use podwire::config::{AppConfig, Cli, Commands, EventsArgs, LogsArgs, load_config};
use podwire::engine::{
    EndpointResolver, EngineClient, FrameStream, RequestDescriptor, StreamCallback,
    StreamOptions, StreamType, drive,
};
use podwire::error::{Result as WireResult, TransportError};
use podwire::serialization;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// Loads configuration with layered precedence via `OrthoConfig`, then runs
/// the subcommand on a multi-threaded tokio runtime. Ctrl-C cancels any
/// stream in progress.
fn main() -> EyreResult<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli).map_err(Report::from)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| TransportError::RuntimeCreationFailed {
            message: e.to_string(),
        })?;

    runtime
        .block_on(run(&cli, &config))
        .map_err(Report::from)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Execute the CLI command, returning domain-specific errors.
async fn run(cli: &Cli, config: &AppConfig) -> WireResult<()> {
    let env = DefaultEnv::new();
    let resolver = EndpointResolver::new(&env);
    let client = EngineClient::from_config(config, &resolver)?;
    debug!(?client, "engine client ready");

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    match &cli.command {
        Commands::Ping => ping(&client).await,
        Commands::Version => version(&client).await,
        Commands::Logs(args) => logs(&client, args, cancel).await,
        Commands::Events(args) => events(&client, args, cancel).await,
    }
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
async fn ping(client: &EngineClient) -> WireResult<()> {
    client.health_check_async().await?;
    println!("OK");
    Ok(())
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
async fn version(client: &EngineClient) -> WireResult<()> {
    let outcome = client
        .request::<SystemVersion>(&RequestDescriptor::get("/version"))
        .await?;
    if let Some(version) = outcome.into_data()? {
        let json = serialization::to_vec(&version)?;
        println!("{}", String::from_utf8_lossy(&json));
    }
    Ok(())
}

async fn logs(client: &EngineClient, args: &LogsArgs, cancel: CancellationToken) -> WireResult<()> {
    let mut descriptor = RequestDescriptor::get(format!("/containers/{}/logs", args.container))
        .query("stdout", "1")
        .query("stderr", "1")
        .query("follow", if args.follow { "1" } else { "0" });
    if let Some(tail) = args.tail {
        descriptor = descriptor.query("tail", tail.to_string());
    }

    let outcome = client
        .request_frames(
            &descriptor,
            args.multiplexed,
            StreamOptions::with_cancel(cancel),
        )
        .await?;
    match outcome.into_data()? {
        Some(frames) => {
            copy_frames(frames, &mut tokio::io::stdout(), &mut tokio::io::stderr()).await
        }
        None => Ok(()),
    }
}

/// Write each frame to the matching output, flushing both before returning.
async fn copy_frames<O, E>(
    mut frames: FrameStream,
    stdout: &mut O,
    stderr: &mut E,
) -> WireResult<()>
where
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    while let Some(item) = frames.next().await {
        let frame = item?;
        let written = match frame.stream_type {
            StreamType::Stderr => stderr.write_all(&frame.payload).await,
            StreamType::Stdin | StreamType::Stdout | StreamType::Raw => {
                stdout.write_all(&frame.payload).await
            }
        };
        if let Err(error) = written {
            warn!(%error, "failed to write container output");
            frames.cancel();
        }
    }
    let flushed = stdout.flush().await.and(stderr.flush().await);
    flushed.map_err(podwire::error::DecodeError::from)?;
    Ok(())
}

/// Prints each event as one line of JSON and stops after an optional limit.
struct EventPrinter {
    limit: Option<u64>,
    printed: u64,
    cancel: Option<CancellationToken>,
}

impl StreamCallback<EventMessage> for EventPrinter {
    fn on_starting(&mut self, cancel: &CancellationToken) {
        self.cancel = Some(cancel.clone());
    }

    #[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
    fn on_next(&mut self, item: EventMessage) {
        match serialization::to_vec(&item) {
            Ok(json) => println!("{}", String::from_utf8_lossy(&json)),
            Err(error) => warn!(%error, "failed to render event"),
        }
        self.printed = self.printed.saturating_add(1);
        if self.limit.is_some_and(|limit| self.printed >= limit)
            && let Some(cancel) = &self.cancel
        {
            cancel.cancel();
        }
    }
}

async fn events(
    client: &EngineClient,
    args: &EventsArgs,
    cancel: CancellationToken,
) -> WireResult<()> {
    let mut descriptor = RequestDescriptor::get("/events");
    if let Some(since) = &args.since {
        descriptor = descriptor.query("since", since.as_str());
    }

    let outcome = client
        .request_json_stream::<EventMessage>(&descriptor, StreamOptions::with_cancel(cancel))
        .await?;
    let Some(stream) = outcome.into_data()? else {
        return Ok(());
    };
    let mut printer = EventPrinter {
        limit: args.limit,
        printed: 0,
        cancel: None,
    };
    drive(stream, &mut printer).await
}
