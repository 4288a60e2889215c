//! pvrlink - Teleboy TV backend command-line host.

/// Application configuration (TOML).
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{AppConfig, PASSWORD_ENV, resolve_config_path};
use pvrlink_api::scheduler::UpdateScheduler;
use pvrlink_api::{
    ApiClient, Channel, EpgEntry, PvrService, PvrSink, RECORDINGS_PLANNED, RECORDINGS_READY,
    Recording, Timer,
};

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Override config directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Write a default config file if none exists.
    Init,
    /// Log in and show the account's membership.
    Login,
    /// List channels in display order.
    Channels,
    /// Show the program guide of one channel.
    Epg(EpgArgs),
    /// List finished recordings or planned timers.
    Recordings(RecordingsArgs),
    /// Schedule a recording of a broadcast.
    Record(RecordArgs),
    /// Delete a recording or timer.
    DeleteRecording(DeleteArgs),
    /// Resolve a playable stream URL.
    Stream(StreamCommand),
    /// Run the update scheduler until interrupted.
    Watch(WatchArgs),
}

/// Arguments for the `epg` subcommand.
#[derive(clap::Args)]
struct EpgArgs {
    /// Channel id.
    #[arg(long, required = true)]
    channel: i64,

    /// Hours from now to cover.
    #[arg(long, default_value_t = 24)]
    hours: i64,
}

/// Arguments for the `recordings` subcommand.
#[derive(clap::Args)]
struct RecordingsArgs {
    /// List planned timers instead of finished recordings.
    #[arg(long)]
    planned: bool,
}

/// Arguments for the `record` subcommand.
#[derive(clap::Args)]
struct RecordArgs {
    /// Broadcast id to record.
    #[arg(long, required = true)]
    program: i64,
}

/// Arguments for the `delete-recording` subcommand.
#[derive(clap::Args)]
struct DeleteArgs {
    /// Recording or timer id.
    #[arg(long, required = true)]
    id: String,
}

/// Arguments for the `stream` subcommand.
#[derive(clap::Args)]
struct StreamCommand {
    /// Stream kind to resolve.
    #[command(subcommand)]
    command: StreamSubcommands,
}

/// Available stream kinds.
#[derive(Subcommand)]
enum StreamSubcommands {
    /// Live stream of a channel.
    Live {
        /// Channel id.
        channel: i64,
    },
    /// A finished recording.
    Recording {
        /// Recording id.
        id: String,
    },
    /// Replay of a past broadcast.
    Replay {
        /// Broadcast id.
        broadcast: i64,
    },
}

/// Arguments for the `watch` subcommand.
#[derive(clap::Args)]
struct WatchArgs {
    /// Comma-separated channel ids whose guide is queued at start
    /// (default: every listed channel).
    #[arg(long, value_delimiter = ',')]
    channels: Option<Vec<i64>>,

    /// Hours of guide to queue per channel.
    #[arg(long, default_value_t = 24)]
    hours: i64,
}

/// Refresh signal raised by the update workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refresh {
    Timers,
    Recordings,
}

/// Sink that logs every record it receives.
///
/// Refresh requests are forwarded to the `watch` loop when a channel is set.
#[derive(Default)]
struct LogSink {
    refresh_tx: Option<mpsc::UnboundedSender<Refresh>>,
}

impl LogSink {
    fn forward(&self, refresh: Refresh) {
        if let Some(tx) = &self.refresh_tx
            && tx.send(refresh).is_err()
        {
            tracing::debug!(?refresh, "Refresh listener gone");
        }
    }
}

impl PvrSink for LogSink {
    fn emit_epg_entry(&self, entry: EpgEntry) {
        tracing::info!(
            "{}\t{}\t{}\t{}\t{}",
            entry.broadcast_id,
            entry.start.format("%Y-%m-%d %H:%M"),
            entry.end.format("%H:%M"),
            entry.title,
            if entry.episode_name.is_empty() { "-" } else { entry.episode_name.as_str() },
        );
    }

    fn emit_channel(&self, channel: &Channel, number: u32) {
        tracing::info!("{}\t{}\t{}", number, channel.id, channel.name);
    }

    fn emit_recording(&self, recording: Recording) {
        tracing::info!(
            "{}\t{}\t{}\t{}\t{}min",
            recording.id,
            recording.recorded_at.format("%Y-%m-%d %H:%M"),
            recording.channel_name,
            recording.title,
            recording.duration_secs / 60,
        );
    }

    fn emit_timer(&self, timer: Timer) {
        tracing::info!(
            "{}\t{}\t{}\t{}\t{}",
            timer.id,
            timer.start.format("%Y-%m-%d %H:%M"),
            timer.end.format("%H:%M"),
            timer.channel_id,
            timer.title,
        );
    }

    fn request_timers_refresh(&self) {
        tracing::debug!("Timers refresh requested");
        self.forward(Refresh::Timers);
    }

    fn request_recordings_refresh(&self) {
        tracing::debug!("Recordings refresh requested");
        self.forward(Refresh::Recordings);
    }
}

/// Returns `[now, now + hours)`.
///
/// # Errors
///
/// Returns an error if `hours` is not positive or overflows the calendar.
fn window_from_now(hours: i64) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    if hours <= 0 {
        bail!("--hours must be positive");
    }
    let start = Utc::now();
    let end = Duration::try_hours(hours)
        .and_then(|d| start.checked_add_signed(d))
        .context("--hours is out of range")?;
    Ok((start, end))
}

/// Builds the service from config and logs in.
///
/// # Errors
///
/// Returns an error if credentials are missing, the client fails to build,
/// or login is rejected.
#[instrument(skip_all)]
async fn connect(dir: Option<&PathBuf>, sink: Arc<dyn PvrSink>) -> Result<(PvrService, AppConfig)> {
    let path = resolve_config_path(dir)?;
    let config = AppConfig::load(&path)?;
    if config.account.username.is_empty() {
        bail!("account.username is not set in {}", path.display());
    }
    let Some(password) = config.password() else {
        bail!("no password configured; set {PASSWORD_ENV} or account.password");
    };

    let client = ApiClient::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .catchup_window(Duration::days(i64::from(config.playback.catchup_days)))
        .scheduler_state(Arc::new(pvrlink_api::scheduler::SchedulerState::new(
            Duration::seconds(i64::from(config.scheduler.refresh_interval_secs)),
            Utc::now(),
        )))
        .build()
        .context("failed to build API client")?;

    let service = PvrService::start(
        client,
        UpdateScheduler::builder().workers(config.scheduler.workers),
        sink,
        config.channels.favorites_only,
    );
    if !service.login(&config.account.username, &password).await {
        service.shutdown().await;
        bail!("login failed for {}", config.account.username);
    }
    Ok((service, config))
}

/// Runs the `init` subcommand.
///
/// # Errors
///
/// Returns an error if the config path cannot be resolved or written.
fn run_init(dir: Option<&PathBuf>) -> Result<()> {
    let path = resolve_config_path(dir)?;
    if path.exists() {
        tracing::info!("Config already exists: {}", path.display());
        return Ok(());
    }
    AppConfig::default().save(&path)?;
    tracing::info!("Wrote {}", path.display());
    Ok(())
}

/// Runs the `login` subcommand.
///
/// # Errors
///
/// Returns an error if login fails.
#[instrument(skip_all)]
async fn run_login(dir: Option<&PathBuf>) -> Result<()> {
    let (service, _) = connect(dir, Arc::new(LogSink::default())).await?;
    if let Some(session) = service.client().current_session() {
        tracing::info!(
            "User {}: plus={} comfort={}",
            session.user_id,
            session.membership.plus,
            session.membership.comfort,
        );
    }
    service.shutdown().await;
    Ok(())
}

/// Runs the `channels` subcommand.
///
/// # Errors
///
/// Returns an error if login or channel loading fails.
#[instrument(skip_all)]
async fn run_channels(dir: Option<&PathBuf>) -> Result<()> {
    let sink = Arc::new(LogSink::default());
    let shared: Arc<dyn PvrSink> = sink.clone();
    let (service, _) = connect(dir, shared).await?;
    let loaded = service.load_channels().await;
    if loaded {
        tracing::info!("No.\tID\tName");
        service.list_channels(sink.as_ref());
        tracing::info!("Total: {} channels", service.channel_count());
    }
    service.shutdown().await;
    if !loaded {
        bail!("failed to load channels");
    }
    Ok(())
}

/// Runs the `epg` subcommand.
///
/// # Errors
///
/// Returns an error if login or the guide request fails.
#[instrument(skip_all)]
async fn run_epg(args: &EpgArgs, dir: Option<&PathBuf>) -> Result<()> {
    let (start, end) = window_from_now(args.hours)?;
    let (service, _) = connect(dir, Arc::new(LogSink::default())).await?;
    tracing::info!("ID\tStart\t\t\tEnd\tTitle\tEpisode");
    let ok = service.fetch_epg_window_sync(args.channel, start, end).await;
    service.shutdown().await;
    if !ok {
        bail!("failed to load guide for channel {}", args.channel);
    }
    Ok(())
}

/// Runs the `recordings` subcommand.
///
/// # Errors
///
/// Returns an error if login or the listing fails.
#[instrument(skip_all)]
async fn run_recordings(args: &RecordingsArgs, dir: Option<&PathBuf>) -> Result<()> {
    let sink = Arc::new(LogSink::default());
    let shared: Arc<dyn PvrSink> = sink.clone();
    let (service, _) = connect(dir, shared).await?;
    let kind = if args.planned {
        RECORDINGS_PLANNED
    } else {
        // Channel names are looked up in the lineup.
        if !service.load_channels().await {
            tracing::warn!("Channel names unavailable");
        }
        RECORDINGS_READY
    };
    let ok = service.list_recordings(kind, sink.as_ref()).await;
    service.shutdown().await;
    if !ok {
        bail!("failed to list {kind} recordings");
    }
    Ok(())
}

/// Runs the `record` subcommand.
///
/// # Errors
///
/// Returns an error if login fails or the backend rejects the request.
#[instrument(skip_all)]
async fn run_record(args: &RecordArgs, dir: Option<&PathBuf>) -> Result<()> {
    let (service, _) = connect(dir, Arc::new(LogSink::default())).await?;
    let ok = service.record(args.program).await;
    service.shutdown().await;
    if !ok {
        bail!("failed to schedule recording of {}", args.program);
    }
    tracing::info!("Scheduled recording of {}", args.program);
    Ok(())
}

/// Runs the `delete-recording` subcommand.
///
/// # Errors
///
/// Returns an error if login fails or the backend rejects the request.
#[instrument(skip_all)]
async fn run_delete_recording(args: &DeleteArgs, dir: Option<&PathBuf>) -> Result<()> {
    let (service, _) = connect(dir, Arc::new(LogSink::default())).await?;
    let ok = service.delete_recording(&args.id).await;
    service.shutdown().await;
    if !ok {
        bail!("failed to delete recording {}", args.id);
    }
    tracing::info!("Deleted recording {}", args.id);
    Ok(())
}

/// Runs the `stream` subcommand.
///
/// # Errors
///
/// Returns an error if login fails or no URL could be resolved.
#[instrument(skip_all)]
async fn run_stream(cmd: StreamCommand, dir: Option<&PathBuf>) -> Result<()> {
    let (service, _) = connect(dir, Arc::new(LogSink::default())).await?;
    let url = match cmd.command {
        StreamSubcommands::Live { channel } => service.resolve_channel_stream_url(channel).await,
        StreamSubcommands::Recording { id } => service.resolve_recording_stream_url(&id).await,
        StreamSubcommands::Replay { broadcast } => {
            service.resolve_replay_stream_url(broadcast).await
        }
    };
    service.shutdown().await;
    let url = url.context("failed to resolve stream url")?;
    tracing::info!("{url}");
    Ok(())
}

/// Runs the `watch` subcommand.
///
/// Queues the guide of the selected channels, then serves refresh requests
/// from the update workers until Ctrl-C.
///
/// # Errors
///
/// Returns an error if login or channel loading fails.
#[instrument(skip_all)]
async fn run_watch(args: &WatchArgs, dir: Option<&PathBuf>) -> Result<()> {
    let (start, end) = window_from_now(args.hours)?;
    let (refresh_tx, mut refresh_rx) = mpsc::unbounded_channel();
    let sink = Arc::new(LogSink {
        refresh_tx: Some(refresh_tx),
    });
    let shared: Arc<dyn PvrSink> = sink.clone();
    let (service, config) = connect(dir, shared).await?;
    if !service.load_channels().await {
        service.shutdown().await;
        bail!("failed to load channels");
    }

    let channel_ids = args.channels.clone().unwrap_or_else(|| {
        service
            .client()
            .channel_ids(config.channels.favorites_only)
    });
    for &channel_id in &channel_ids {
        service.request_epg_window(channel_id, start, end);
    }
    tracing::info!(channels = channel_ids.len(), "Guide requests queued");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(refresh) = refresh_rx.recv() => {
                let kind = match refresh {
                    Refresh::Timers => RECORDINGS_PLANNED,
                    Refresh::Recordings => RECORDINGS_READY,
                };
                service.list_recordings(kind, sink.as_ref()).await;
            }
        }
    }

    tracing::info!("Stopping");
    service.shutdown().await;
    Ok(())
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }

    let cli = Cli::parse();
    let dir = cli.dir.as_ref();
    match cli.command {
        Commands::Init => run_init(dir),
        Commands::Login => run_login(dir).await,
        Commands::Channels => run_channels(dir).await,
        Commands::Epg(args) => run_epg(&args, dir).await,
        Commands::Recordings(args) => run_recordings(&args, dir).await,
        Commands::Record(args) => run_record(&args, dir).await,
        Commands::DeleteRecording(args) => run_delete_recording(&args, dir).await,
        Commands::Stream(cmd) => run_stream(cmd, dir).await,
        Commands::Watch(args) => run_watch(&args, dir).await,
    }
}
