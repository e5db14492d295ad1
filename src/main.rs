//! CLI entry point for the traffic archive tool.
//!
//! Provides subcommands for listing archived dates, sensors and sample files,
//! reading (or computing) sample files, inspecting raw vehicle event logs, and
//! exporting a day of computed channels.

use anyhow::{Result, bail};
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use trafdat::{
    archive::{
        TrafficArchive,
        names::{SampleWidth, is_binned_file, is_valid_file_name, is_valid_sample_file},
    },
    binning::ChannelKind,
    config::ArchiveConfig,
    error::ArchiveError,
    output::{append_record, print_json, print_pretty, samples_json, write_lines},
    stats::LogStats,
};

#[derive(Parser)]
#[command(name = "trafdat")]
#[command(about = "A tool to read archived traffic sensor data", long_about = None)]
struct Cli {
    /// JSON config file (defaults to TRAFDAT_BASE_PATH / TRAFDAT_DISTRICT)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Archive base path, overriding the config
    #[arg(long, global = true)]
    base_path: Option<PathBuf>,

    /// District, overriding the config
    #[arg(long, global = true)]
    district: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List dates with archived data for a year
    Dates {
        /// Four-digit year (defaults to the current year)
        year: Option<String>,
    },
    /// List sensors with sample files on a date
    Sensors {
        /// Eight-digit date (yyyyMMdd)
        date: String,

        /// Print a JSON array instead of one sensor per line
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List sample files available on a date
    Files {
        /// Eight-digit date (yyyyMMdd)
        date: String,
    },
    /// Read a sample file, computing .v30/.s30 from the .vlog when needed
    Sample {
        /// Eight-digit date (yyyyMMdd)
        date: String,

        /// Sample file name; append .json for a JSON array of samples
        name: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Report field coverage of a sensor's vehicle event log before and after reconstruction
    Inspect {
        /// Eight-digit date (yyyyMMdd)
        date: String,

        /// Sensor ID
        sensor: String,

        /// CSV file to append results to
        #[arg(short, long, default_value = "vlog_stats.csv")]
        output: String,
    },
    /// Write volume and speed channels for every sensor on a date
    Export {
        /// Eight-digit date (yyyyMMdd)
        date: String,

        /// Directory to write channel files into
        #[arg(short = 'd', long, default_value = "export")]
        output_dir: String,

        /// Maximum number of concurrent resolutions
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,

        /// Gzip compress channel files
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/trafdat.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("trafdat.log"));

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

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ArchiveConfig::load(path)?,
        None => ArchiveConfig::from_env(),
    };
    if let Some(base_path) = cli.base_path {
        config.base_path = base_path;
    }
    if let Some(district) = cli.district {
        config.district = district;
    }
    debug!(base_path = %config.base_path.display(), district = %config.district, "Archive configured");

    let archive = TrafficArchive::from_config(&config);
    let district = config.district;

    match cli.command {
        Commands::Dates { year } => {
            let year = year.unwrap_or_else(|| Utc::now().year().to_string());
            let dates = archive.list_dates(&district, &year)?;
            info!(year = %year, count = dates.len(), "Dates listed");
            write_lines(std::io::stdout().lock(), &dates)?;
        }
        Commands::Sensors { date, json } => {
            let sensors = archive.list_sensors(&district, &date)?;
            info!(date = %date, count = sensors.len(), "Sensors listed");
            if json {
                println!("{}", serde_json::to_string(&sensors)?);
            } else {
                write_lines(std::io::stdout().lock(), &sensors)?;
            }
        }
        Commands::Files { date } => {
            let files = archive.list_files(&district, &date)?;
            info!(date = %date, count = files.len(), "Files listed");
            write_lines(std::io::stdout().lock(), &files)?;
        }
        Commands::Sample { date, name, output } => {
            let data = read_sample(&archive, &district, &date, &name)?;
            match output {
                Some(path) => std::fs::write(&path, &data)?,
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&data)?;
                    stdout.flush()?;
                }
            }
        }
        Commands::Inspect {
            date,
            sensor,
            output,
        } => {
            inspect(&archive, &district, &date, &sensor, &output)?;
        }
        Commands::Export {
            date,
            output_dir,
            concurrency,
            gzip,
        } => {
            export_date(archive, district, &date, &output_dir, concurrency, gzip).await?;
        }
    }

    Ok(())
}

/// Reads a sample file, rendering it as JSON when `name` ends in `.json`.
#[tracing::instrument(skip(archive))]
fn read_sample(archive: &TrafficArchive, district: &str, date: &str, name: &str) -> Result<Vec<u8>> {
    if !is_valid_file_name(name) {
        bail!("invalid sample file name: {name}");
    }
    let data = match name.strip_suffix(".json") {
        Some(binned) => {
            if !is_binned_file(binned) {
                bail!("{binned} is not a binned sample file");
            }
            let bytes = archive.resolve(district, date, binned)?;
            samples_json(&bytes, SampleWidth::for_file_name(binned))?.into_bytes()
        }
        None => {
            if !is_valid_sample_file(name) {
                bail!("{name} is not a sample file");
            }
            archive.resolve(district, date, name)?
        }
    };
    debug!(bytes = data.len(), "Sample read");
    Ok(data)
}

/// Appends field coverage of a sensor's event log, before and after
/// reconstruction, to a CSV file.
#[tracing::instrument(skip(archive, output))]
fn inspect(
    archive: &TrafficArchive,
    district: &str,
    date: &str,
    sensor: &str,
    output: &str,
) -> Result<()> {
    let mut log = archive.load_event_log(district, date, sensor)?;

    let parsed = LogStats::from_log(&log)
        .with_sensor_info(sensor, date)
        .with_stage("parsed");
    print_pretty(&parsed);
    append_record(output, &parsed)?;

    let outcome = log.reconstruct().and_then(|_| log.check());

    let reconstructed = LogStats::from_log(&log)
        .with_sensor_info(sensor, date)
        .with_stage("reconstructed");
    print_json(&reconstructed)?;
    append_record(output, &reconstructed)?;

    match outcome {
        Ok(()) => info!(
            coverage_pct = reconstructed.timestamp_pct(),
            "Event log fully reconstructed"
        ),
        Err(e) => warn!(error = %e, "Event log cannot be binned"),
    }
    Ok(())
}

/// Resolves `.v30` and `.s30` for every sensor on `date` concurrently and
/// writes them under `<output_dir>/<date>/`.
#[tracing::instrument(skip(archive, district))]
async fn export_date(
    archive: TrafficArchive,
    district: String,
    date: &str,
    output_dir: &str,
    concurrency: usize,
    gzip: bool,
) -> Result<()> {
    let archive = Arc::new(archive);
    let sensors = {
        let archive = archive.clone();
        let district = district.clone();
        let date = date.to_string();
        tokio::task::spawn_blocking(move || archive.list_sensors(&district, &date)).await??
    };
    info!(sensor_count = sensors.len(), "Sensors ready for export");

    let dir = Path::new(output_dir).join(date);
    tokio::fs::create_dir_all(&dir).await?;

    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
    let mut tasks = vec![];

    for sensor in &sensors {
        for kind in ChannelKind::ALL {
            let name = format!("{}{}", sensor, kind.extension());
            let sem = semaphore.clone();
            let archive = archive.clone();
            let district = district.clone();
            let date = date.to_string();
            let dir = dir.clone();

            let file_span = tracing::info_span!("export_file", name = %name);

            let task = tokio::spawn(
                async move {
                    let _permit = sem.acquire_owned().await?;
                    let resolve_name = name.clone();
                    let bytes = tokio::task::spawn_blocking(move || {
                        archive.resolve(&district, &date, &resolve_name)
                    })
                    .await??;
                    write_export(&dir, &name, &bytes, gzip).await?;
                    Ok::<_, anyhow::Error>(name)
                }
                .instrument(file_span),
            );

            tasks.push(task);
        }
    }

    let mut written = 0;
    let mut skipped = 0;
    let mut failed = 0;

    for task in tasks {
        match task.await {
            Ok(Ok(name)) => {
                debug!(name = %name, "Channel exported");
                written += 1;
            }
            Ok(Err(e)) => {
                let not_found = e
                    .downcast_ref::<ArchiveError>()
                    .is_some_and(ArchiveError::is_not_found);
                if not_found {
                    debug!(error = %e, "Channel not available");
                    skipped += 1;
                } else {
                    error!(error = %e, "Channel export failed");
                    failed += 1;
                }
            }
            Err(e) => {
                error!(error = %e, "Export task panicked");
                failed += 1;
            }
        }
    }

    info!(written, skipped, failed, dir = %dir.display(), "Export complete");
    Ok(())
}

/// Writes one channel file, optionally gzip-compressed.
async fn write_export(dir: &Path, name: &str, bytes: &[u8], gzip: bool) -> Result<()> {
    if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes)?;
        let compressed = encoder.finish()?;
        tokio::fs::write(dir.join(format!("{}.gz", name)), compressed).await?;
    } else {
        tokio::fs::write(dir.join(name), bytes).await?;
    }
    Ok(())
}
