//! CLI entry point for the dashboard loaders.
//!
//! Provides subcommands for finding conglomerate metro areas among NTD
//! urbanized areas and for loading agencies, GTFS feeds and census metro
//! areas into the dashboard.

use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use dashboard_loader::conglomerate::{self, MergeOptions, MergeStrategy, merge::DEFAULT_MAX_PASSES};
use dashboard_loader::dashboard::{BasicClient, DEFAULT_BASE_URL, Dashboard, Endpoint, PublishSummary};
use dashboard_loader::error::LoaderError;
use dashboard_loader::metro_areas::{self, MetroAreaRecord};
use dashboard_loader::ntd::{self, NtdAgency, NtdTables};
use dashboard_loader::regions::RegionTable;
use dashboard_loader::{feeds, membership, output};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "dashboard_loader")]
#[command(about = "Batch loaders for the transit data dashboard", long_about = None)]
struct Cli {
    /// Dashboard base URL [default: $DASHBOARD_URL, then http://localhost:9000]
    #[arg(long, global = true)]
    dashboard_url: Option<String>,

    /// Log each form instead of sending it
    #[arg(long, global = true, default_value_t = false)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find urbanized areas linked by agencies that serve several of them
    MergeUzas {
        /// NTD agency/UZA association table
        #[arg(long, default_value = "Agency_UZAs.csv")]
        uzas: PathBuf,

        /// Optional NTD agency table; UZA rows for other agencies are skipped
        #[arg(long)]
        agencies: Option<PathBuf>,

        /// Merge algorithm
        #[arg(long, value_enum, default_value_t = MergeStrategy::UnionFind)]
        strategy: MergeStrategy,

        /// Pass limit for the pairwise strategy
        #[arg(long, default_value_t = DEFAULT_MAX_PASSES)]
        max_passes: usize,

        /// CSV file to append conglomerates to
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Create a metro area in the dashboard for every conglomerate
        #[arg(long, default_value_t = false)]
        publish: bool,
    },
    /// Load NTD agencies with ridership and UZA names
    LoadAgencies {
        /// NTD agency information table
        #[arg(long, default_value = "Agency_Information.csv")]
        agencies: PathBuf,

        /// NTD service table
        #[arg(long, default_value = "Service.csv")]
        service: PathBuf,

        /// NTD agency/UZA association table
        #[arg(long, default_value = "Agency_UZAs.csv")]
        uzas: PathBuf,
    },
    /// Load GTFS feed metadata from a GTFS Data Exchange JSON dump
    LoadFeeds {
        #[arg(value_name = "INPUT_JSON")]
        input: PathBuf,

        /// JSON table of country and state codes
        #[arg(long)]
        regions: Option<PathBuf>,

        /// When the dump was generated (RFC 3339) [default: 2012-07-15T12:00:00Z]
        #[arg(long)]
        generated_at: Option<DateTime<Utc>>,
    },
    /// Load census urbanized areas from a polygon shapefile
    LoadMetroAreas {
        #[arg(value_name = "SHAPEFILE")]
        shapefile: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/dashboard_loader.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("dashboard_loader.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let Cli {
        dashboard_url,
        dry_run,
        command,
    } = Cli::parse();

    let dashboard = || connect(dashboard_url.as_deref(), dry_run);

    match command {
        Commands::MergeUzas {
            uzas,
            agencies,
            strategy,
            max_passes,
            output,
            publish,
        } => {
            let options = MergeOptions {
                strategy,
                max_passes,
            };
            let publisher = if publish { Some(dashboard()?) } else { None };
            merge_uzas(&uzas, agencies.as_deref(), &options, output.as_deref(), publisher.as_ref())
                .await?;
        }
        Commands::LoadAgencies {
            agencies,
            service,
            uzas,
        } => {
            let tables = NtdTables {
                agency_information: &agencies,
                service: &service,
                agency_uzas: &uzas,
            };
            let load = ntd::load(&tables).context("failed to read NTD tables")?;
            let records: Vec<NtdAgency> = load.agencies.into_values().collect();
            let summary = dashboard()?.publish(Endpoint::NtdAgencies, &records).await?;
            print_summary("agencies", records.len(), summary, load.warnings)?;
        }
        Commands::LoadFeeds {
            input,
            regions,
            generated_at,
        } => {
            let regions = match regions {
                Some(path) => RegionTable::load(&path)
                    .with_context(|| format!("failed to read region table {}", path.display()))?,
                None => RegionTable::default(),
            };
            let generated_at = generated_at.unwrap_or_else(feeds::default_generated_at);

            let file = File::open(&input)
                .with_context(|| format!("failed to open {}", input.display()))?;
            let load = feeds::load(file, &regions, generated_at)?;
            let summary = dashboard()?.publish(Endpoint::GtfsFeeds, &load.feeds).await?;
            print_summary("feeds", load.feeds.len(), summary, load.warnings)?;
        }
        Commands::LoadMetroAreas { shapefile } => {
            let load = metro_areas::load_census_shapefile(&shapefile)
                .with_context(|| format!("failed to read {}", shapefile.display()))?;
            let summary = dashboard()?.publish(Endpoint::MetroAreas, &load.areas).await?;
            print_summary("metro areas", load.areas.len(), summary, load.warnings)?;
        }
    }

    Ok(())
}

/// Builds the dashboard client from the flag, then `DASHBOARD_URL`, then the default.
fn connect(flag: Option<&str>, dry_run: bool) -> Result<Dashboard<BasicClient>> {
    let base_url = flag
        .map(str::to_string)
        .or_else(|| std::env::var("DASHBOARD_URL").ok())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let dashboard = Dashboard::new(BasicClient::new()?, &base_url)
        .with_context(|| format!("invalid dashboard URL '{base_url}'"))?
        .with_dry_run(dry_run);
    info!(base_url = %dashboard.base_url(), dry_run, "Dashboard client ready");
    Ok(dashboard)
}

/// Reads memberships, merges them, and reports the conglomerates.
#[tracing::instrument(skip_all, fields(uzas = %uzas.display(), strategy = ?options.strategy))]
async fn merge_uzas(
    uzas: &Path,
    agencies: Option<&Path>,
    options: &MergeOptions,
    output_csv: Option<&Path>,
    publisher: Option<&Dashboard<BasicClient>>,
) -> Result<()> {
    let mut warnings = Vec::new();
    let known = match agencies {
        Some(path) => Some(
            ntd::load_agency_ids(path, &mut warnings)
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => None,
    };

    let extraction = membership::extract_from_path(uzas, known.as_ref())
        .with_context(|| format!("failed to read {}", uzas.display()))?;
    warnings.extend(extraction.warnings);

    let mut report = conglomerate::build_report(&extraction.membership, options)?;
    warnings.append(&mut report.warnings);
    report.warnings = warnings;

    if let Some(path) = output_csv {
        output::append_records(path, &report.conglomerates)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    if let Some(dashboard) = publisher {
        let records: Vec<MetroAreaRecord> =
            report.conglomerates.iter().map(MetroAreaRecord::from).collect();
        let summary = dashboard.publish(Endpoint::MetroAreas, &records).await?;
        report.warnings.extend(summary.warnings);
    }

    output::print_report(&report)?;
    Ok(())
}

/// Prints what a loader sent and everything it skipped.
fn print_summary(
    what: &str,
    loaded: usize,
    summary: PublishSummary,
    mut warnings: Vec<LoaderError>,
) -> Result<()> {
    println!(
        "Loaded {loaded} {what}: {} sent, {} created, {} accepted, {} rejected",
        summary.sent, summary.created, summary.accepted, summary.rejected
    );
    if summary.dry_run > 0 {
        println!("Dry run: {} not sent", summary.dry_run);
    }
    warnings.extend(summary.warnings);
    output::write_warnings(&mut std::io::stdout().lock(), &warnings)?;
    Ok(())
}
