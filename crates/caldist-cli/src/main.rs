//! caldist - daily round-trip distance from calendar appointments.

/// Application configuration (TOML).
mod config;
/// Sensor wiring, runs and polling.
mod sensor;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use caldist_api::geoapify::{GeoapifyClient, LocalGeocodeApi, LocalRoutingApi};
use caldist_api::ical::{EventStart, LocalCalendarFeed};
use caldist_api::sunset::LocalSunsetApi;
use caldist_db::{load_history, load_state, load_states, open_db};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use futures::future::join_all;
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{API_KEY_ENV, AppConfig, SensorConfig};
use crate::sensor::{Sensor, build_geoapify_client, build_ical_client, build_sunset_client};

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Override config/data directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Add a sensor to the config file.
    Init(InitArgs),
    /// Compute the distance once and store the state.
    Run(RunArgs),
    /// Recompute every scan interval until interrupted.
    Watch(WatchArgs),
    /// Print the last stored state as JSON.
    State(SensorFilterArgs),
    /// List recent runs of a sensor.
    History(HistoryArgs),
    /// Geocode a free-text location.
    Geocode(GeocodeArgs),
    /// Route between two free-text locations.
    Route(RouteArgs),
    /// Look up the sunset at a location.
    Sunset(SunsetArgs),
    /// List the events of a sensor's calendar feed.
    Events(EventsArgs),
}

/// Arguments for the `init` subcommand.
#[derive(clap::Args)]
struct InitArgs {
    /// Sensor name.
    #[arg(long, required = true)]
    name: String,

    /// Home location text (e.g. "Berlin").
    #[arg(long, required = true)]
    home: String,

    /// iCalendar feed URL.
    #[arg(long, required = true)]
    url: String,

    /// Geoapify API key (default: read `GEOAPIFY_API_KEY` at run time).
    #[arg(long)]
    api_key: Option<String>,

    /// IANA timezone name.
    #[arg(long, default_value = "Europe/Berlin")]
    time_zone: String,
}

/// Arguments for the `run` subcommand.
#[derive(clap::Args)]
struct RunArgs {
    /// Sensor name (default: all sensors).
    #[arg(long)]
    sensor: Option<String>,

    /// Evaluate at this RFC 3339 instant instead of the current time.
    #[arg(long)]
    now: Option<DateTime<chrono::FixedOffset>>,
}

/// Arguments for the `watch` subcommand.
#[derive(clap::Args)]
struct WatchArgs {
    /// Sensor name (default: all sensors).
    #[arg(long)]
    sensor: Option<String>,
}

/// Arguments selecting an optional sensor.
#[derive(clap::Args)]
struct SensorFilterArgs {
    /// Sensor name (default: all sensors).
    #[arg(long)]
    sensor: Option<String>,
}

/// Arguments for the `history` subcommand.
#[derive(clap::Args)]
struct HistoryArgs {
    /// Sensor name.
    #[arg(long, required = true)]
    sensor: String,

    /// Maximum number of runs to list.
    #[arg(long, default_value_t = 10)]
    limit: u32,
}

/// Arguments for the `geocode` subcommand.
#[derive(clap::Args)]
struct GeocodeArgs {
    /// Location text (e.g. "Berlin").
    #[arg(long, required = true)]
    text: String,

    /// Take the API key from this sensor instead of `GEOAPIFY_API_KEY`.
    #[arg(long)]
    sensor: Option<String>,
}

/// Arguments for the `route` subcommand.
#[derive(clap::Args)]
struct RouteArgs {
    /// Start location text.
    #[arg(long, required = true)]
    from: String,

    /// Destination location text.
    #[arg(long, required = true)]
    to: String,

    /// Take the API key from this sensor instead of `GEOAPIFY_API_KEY`.
    #[arg(long)]
    sensor: Option<String>,
}

/// Arguments for the `sunset` subcommand.
#[derive(clap::Args)]
struct SunsetArgs {
    /// Location text.
    #[arg(long, required = true)]
    text: String,

    /// Date, `YYYY-MM-DD` (default: today, UTC).
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Take the API key from this sensor instead of `GEOAPIFY_API_KEY`.
    #[arg(long)]
    sensor: Option<String>,
}

/// Arguments for the `events` subcommand.
#[derive(clap::Args)]
struct EventsArgs {
    /// Sensor name.
    #[arg(long, required = true)]
    sensor: String,
}

/// Loads the config file from `--dir` or the default location.
fn load_config(dir: Option<&Path>) -> Result<AppConfig> {
    let config_path = AppConfig::path(dir).context("failed to resolve config path")?;
    AppConfig::load(&config_path).context("failed to load config")
}

/// Runs the `init` subcommand.
///
/// # Errors
///
/// Returns an error if the sensor already exists, is invalid, or the config
/// cannot be written.
#[instrument(skip_all)]
fn run_init(args: &InitArgs, dir: Option<&Path>) -> Result<()> {
    let config_path = AppConfig::path(dir).context("failed to resolve config path")?;
    let mut config = AppConfig::load(&config_path).context("failed to load config")?;
    if config.sensor(&args.name).is_some() {
        bail!("sensor {} already exists in {}", args.name, config_path.display());
    }

    let sensor = SensorConfig::new(&args.name, &args.home, &args.url)
        .with_api_key(args.api_key.clone())
        .with_time_zone(&args.time_zone);
    sensor.validate()?;
    config.sensors.push(sensor);
    config.save(&config_path)?;

    tracing::info!("Added sensor {} to {}", args.name, config_path.display());
    Ok(())
}

/// Runs the `run` subcommand.
///
/// # Errors
///
/// Returns an error if the config is invalid or a state cannot be stored.
/// Failed runs are stored and logged, not returned.
#[instrument(skip_all)]
async fn run_once(args: &RunArgs, dir: Option<&Path>) -> Result<()> {
    let config = load_config(dir)?;
    let sensors = config
        .select(args.sensor.as_deref())?
        .into_iter()
        .map(|s| Sensor::new(s, &config.endpoints))
        .collect::<Result<Vec<_>>>()?;
    let conn = open_db(dir).context("failed to open database")?;

    for sensor in &sensors {
        let now = args
            .now
            .map_or_else(Utc::now, |at| at.with_timezone(&Utc))
            .with_timezone(&sensor.time_zone());
        let state = sensor.update(&conn, now).await?;
        match state.native_value {
            Some(_) => tracing::info!(
                "{}: {} {}",
                sensor.name(),
                state.state_text(),
                state.unit_of_measurement
            ),
            None => tracing::info!("{}: {}", sensor.name(), state.state_text()),
        }
    }

    Ok(())
}

/// Runs the `watch` subcommand.
///
/// # Errors
///
/// Returns an error if the config is invalid or the database cannot be opened.
#[instrument(skip_all)]
async fn run_watch(args: &WatchArgs, dir: Option<&Path>) -> Result<()> {
    let config = load_config(dir)?;
    let sensors = config
        .select(args.sensor.as_deref())?
        .into_iter()
        .map(|s| Sensor::new(s, &config.endpoints))
        .collect::<Result<Vec<_>>>()?;
    let conn = open_db(dir).context("failed to open database")?;

    join_all(sensors.iter().map(|s| s.watch(&conn))).await;
    Ok(())
}

/// Runs the `state` subcommand.
///
/// # Errors
///
/// Returns an error if the database query fails or the stored JSON is invalid.
#[instrument(skip_all)]
fn run_state(args: &SensorFilterArgs, dir: Option<&Path>) -> Result<()> {
    let conn = open_db(dir).context("failed to open database")?;
    let states = match &args.sensor {
        Some(name) => load_state(&conn, name)?.into_iter().collect(),
        None => load_states(&conn)?,
    };

    if states.is_empty() {
        tracing::info!("No stored state. Run `caldist run` first.");
        return Ok(());
    }

    for stored in &states {
        let attributes: serde_json::Value = serde_json::from_str(&stored.attributes)
            .with_context(|| format!("invalid attributes stored for {}", stored.name))?;
        let json = serde_json::json!({
            "name": stored.name,
            "unique_id": stored.unique_id,
            "state": stored
                .native_value
                .map_or_else(|| String::from("unknown"), |v| format!("{v:.1}")),
            "unit_of_measurement": stored.unit,
            "icon": stored.icon,
            "attributes": attributes,
            "updated_at": stored.updated_at,
        });
        tracing::info!("{json}");
    }

    Ok(())
}

/// Runs the `history` subcommand.
///
/// # Errors
///
/// Returns an error if the database query fails.
#[instrument(skip_all)]
fn run_history(args: &HistoryArgs, dir: Option<&Path>) -> Result<()> {
    let conn = open_db(dir).context("failed to open database")?;
    let runs = load_history(&conn, &args.sensor, args.limit)?;

    tracing::info!("RanAt\t\t\t\tDistance\tError");
    for run in &runs {
        tracing::info!(
            "{}\t{}\t\t{}",
            run.ran_at,
            run.distance
                .map_or_else(|| String::from("unknown"), |v| format!("{v:.1}")),
            run.error.as_deref().unwrap_or("-"),
        );
    }
    tracing::info!("Total: {} runs", runs.len());

    Ok(())
}

/// Builds a Geoapify client for the probe subcommands.
///
/// Uses the named sensor's key, or `GEOAPIFY_API_KEY` when no sensor is given.
fn probe_geoapify_client(config: &AppConfig, sensor: Option<&str>) -> Result<GeoapifyClient> {
    let api_key = match sensor {
        Some(name) => config
            .sensor(name)
            .with_context(|| format!("unknown sensor: {name}"))?
            .resolve_api_key()?,
        None => std::env::var(API_KEY_ENV)
            .with_context(|| format!("{API_KEY_ENV} environment variable is required"))?,
    };
    build_geoapify_client(&api_key, &config.endpoints)
}

/// Runs the `geocode` subcommand.
///
/// # Errors
///
/// Returns an error if the client fails to build or the lookup fails.
#[instrument(skip_all)]
async fn run_geocode(args: &GeocodeArgs, dir: Option<&Path>) -> Result<()> {
    let config = load_config(dir)?;
    let client = probe_geoapify_client(&config, args.sensor.as_deref())?;

    let at = client
        .geocode(&args.text)
        .await
        .with_context(|| format!("failed to geocode {}", args.text))?;
    tracing::info!("{}: {at}", args.text);

    Ok(())
}

/// Runs the `route` subcommand.
///
/// # Errors
///
/// Returns an error if the client fails to build or a lookup fails.
#[instrument(skip_all)]
async fn run_route(args: &RouteArgs, dir: Option<&Path>) -> Result<()> {
    let config = load_config(dir)?;
    let client = probe_geoapify_client(&config, args.sensor.as_deref())?;

    let from = client
        .geocode(&args.from)
        .await
        .with_context(|| format!("failed to geocode {}", args.from))?;
    let to = client
        .geocode(&args.to)
        .await
        .with_context(|| format!("failed to geocode {}", args.to))?;
    let route = client
        .route(from, to)
        .await
        .with_context(|| format!("failed to route {} -> {}", args.from, args.to))?;

    tracing::info!(
        "{} -> {}: {:.3} km one way, {:.3} km round trip",
        args.from,
        args.to,
        route.one_way_km(),
        route.round_trip_km()
    );

    Ok(())
}

/// Runs the `sunset` subcommand.
///
/// # Errors
///
/// Returns an error if a client fails to build or a lookup fails.
#[instrument(skip_all)]
async fn run_sunset(args: &SunsetArgs, dir: Option<&Path>) -> Result<()> {
    let config = load_config(dir)?;
    let geoapify = probe_geoapify_client(&config, args.sensor.as_deref())?;
    let sunset = build_sunset_client(&config.endpoints)?;

    let at = geoapify
        .geocode(&args.text)
        .await
        .with_context(|| format!("failed to geocode {}", args.text))?;
    let date = args.date.unwrap_or_else(|| Utc::now().date_naive());
    let instant = sunset
        .sunset(at, date)
        .await
        .context("failed to look up sunset")?;

    tracing::info!("Sunset at {} on {date}: {}", args.text, instant.to_rfc3339());

    Ok(())
}

/// Runs the `events` subcommand.
///
/// # Errors
///
/// Returns an error if the sensor is unknown or the feed cannot be fetched.
#[instrument(skip_all)]
async fn run_events(args: &EventsArgs, dir: Option<&Path>) -> Result<()> {
    let config = load_config(dir)?;
    let sensor = config
        .sensor(&args.sensor)
        .with_context(|| format!("unknown sensor: {}", args.sensor))?;
    let tz: Tz = sensor.tz()?;
    let client = build_ical_client()?;

    let events = client
        .fetch_events(&sensor.url, tz)
        .await
        .context("failed to fetch calendar feed")?;

    tracing::info!("Start\t\t\t\tLocation\tSummary");
    for event in &events {
        let start = match &event.start {
            Some(EventStart::Date(date)) => date.to_string(),
            Some(EventStart::DateTime(at)) => at.with_timezone(&tz).to_rfc3339(),
            None => String::from("-"),
        };
        let location = if event.location.is_empty() {
            "-"
        } else {
            event.location.as_str()
        };
        tracing::info!("{start}\t{location}\t{}", event.summary);
    }
    tracing::info!("Total: {} events", events.len());

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
    let dir = cli.dir.as_deref();
    match cli.command {
        Commands::Init(args) => run_init(&args, dir),
        Commands::Run(args) => run_once(&args, dir).await,
        Commands::Watch(args) => run_watch(&args, dir).await,
        Commands::State(args) => run_state(&args, dir),
        Commands::History(args) => run_history(&args, dir),
        Commands::Geocode(args) => run_geocode(&args, dir).await,
        Commands::Route(args) => run_route(&args, dir).await,
        Commands::Sunset(args) => run_sunset(&args, dir).await,
        Commands::Events(args) => run_events(&args, dir).await,
    }
}
