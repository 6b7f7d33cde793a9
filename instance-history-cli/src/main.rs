//! Instance History CLI Application
//!
//! Command-line front end for the instance-history library. It adds:
//! - TOML configuration with command-line overrides
//! - Loading typed lifecycle events and live instance snapshots from JSON
//! - Text and JSON node utilization reports

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use instance_history::{
    InstanceSetHistoryBuilder, InstanceSnapshot, LifecycleEvent, OutOfOrderPolicy, Timestamp,
};
use std::fs;
use std::path::PathBuf;

mod config;
mod input;
mod report;

use config::{AppConfig, OutputFormat};

/// Instance History - Reconstruct instance placements and node usage
#[derive(Parser, Debug)]
#[command(name = "instance-history-cli")]
#[command(about = "Reconstruct VM placement history and sole-tenant node usage", long_about = None)]
#[command(version)]
struct Args {
    /// JSON file(s) of lifecycle events (can be repeated)
    #[arg(short, long, value_name = "FILE")]
    events: Vec<PathBuf>,

    /// JSON file of currently existing instances
    #[arg(short, long, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Start of the reporting window (RFC 3339)
    #[arg(long, value_name = "TIME")]
    start: Option<Timestamp>,

    /// End of the reporting window (RFC 3339)
    #[arg(long, value_name = "TIME")]
    end: Option<Timestamp>,

    /// Report format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Output file for the report (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Skip events that break newest-first ordering instead of failing
    #[arg(long)]
    skip_out_of_order: bool,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("Instance History CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using instance-history library v{}", instance_history::VERSION);

    let config = resolve_config(&args)?;

    if config.input.events.is_empty() && config.input.snapshot.is_none() {
        println!("Instance History - No input specified");
        println!("\nQuick Start:");
        println!("  instance-history-cli --events events.json");
        println!("  instance-history-cli --events events.json --snapshot instances.json");
        println!("\nWith a configuration file:");
        println!("  instance-history-cli --config config.toml");
        println!("\nUse --help for more options");
        return Ok(());
    }

    run(&config)
}

/// Merge the configuration file (if any) with command-line overrides
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    config.input.events.extend(args.events.iter().cloned());
    if args.snapshot.is_some() {
        config.input.snapshot = args.snapshot.clone();
    }
    if args.start.is_some() {
        config.window.start = args.start;
    }
    if args.end.is_some() {
        config.window.end = args.end;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if args.output.is_some() {
        config.output.path = args.output.clone();
    }
    if args.skip_out_of_order {
        config.replay.out_of_order = OutOfOrderPolicy::Skip;
    }

    log::debug!("Effective configuration: {:?}", config);
    Ok(config)
}

/// Derive the reporting window from the input where not configured
fn resolve_window(
    config: &AppConfig,
    events: &[LifecycleEvent],
    snapshots: &[InstanceSnapshot],
) -> (Timestamp, Timestamp) {
    // Events are sorted newest first
    let newest = events
        .first()
        .map(|e| e.timestamp())
        .into_iter()
        .chain(snapshots.iter().map(|s| s.last_seen))
        .max();

    let end = config.window.end.or(newest).unwrap_or_else(Utc::now);
    let start = config
        .window
        .start
        .or_else(|| events.last().map(|e| e.timestamp()))
        .unwrap_or(end)
        .min(end);
    (start, end)
}

fn run(config: &AppConfig) -> Result<()> {
    let events = input::load_events(&config.input.events)?;
    let snapshots = match &config.input.snapshot {
        Some(path) => input::load_snapshots(path)?,
        None => Vec::new(),
    };

    let (start, end) = resolve_window(config, &events, &snapshots);
    log::info!("Reporting window: {} .. {}", start, end);

    let mut builder = InstanceSetHistoryBuilder::new(start, end).with_config(config.replay.clone());
    for snapshot in &snapshots {
        builder.add_snapshot(snapshot);
    }
    builder.process_all(&events)?;

    let missing = builder.instances_needing_more_information();
    if !missing.is_empty() {
        log::warn!(
            "{} instance(s) have no creation event in the supplied logs, older log data is needed: {:?}",
            missing.len(),
            missing
        );
    }

    let history = builder.build();
    let nodes = history.node_set();

    let rendered = match config.output.format {
        OutputFormat::Txt => report::render_text(&history, &nodes)?,
        OutputFormat::Json => report::render_json(&history, &nodes)?,
    };

    match &config.output.path {
        Some(path) => {
            fs::write(path, rendered)?;
            log::info!("Report written to {:?}", path);
        }
        None => print!("{}", rendered),
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use instance_history::StopReason;

    fn day(d: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2019, 12, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "instance-history-cli",
            "--events",
            "a.json",
            "--format",
            "json",
            "--skip-out-of-order",
            "--start",
            "2019-12-01T00:00:00Z",
        ]);
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.input.events, vec![PathBuf::from("a.json")]);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.replay.out_of_order, OutOfOrderPolicy::Skip);
        assert_eq!(config.window.start, Some(day(1)));
    }

    #[test]
    fn test_window_derived_from_input() {
        let events = vec![
            LifecycleEvent::Stop { instance_id: 1, timestamp: day(20), reference: None, reason: StopReason::Deleted },
            LifecycleEvent::SetPlacement { instance_id: 1, timestamp: day(3), node_id: "n".into() },
        ];
        let (start, end) = resolve_window(&AppConfig::default(), &events, &[]);
        assert_eq!((start, end), (day(3), day(20)));
    }

    #[test]
    fn test_configured_window_wins() {
        let mut config = AppConfig::default();
        config.window.end = Some(day(25));

        let events = vec![LifecycleEvent::SetPlacement {
            instance_id: 1,
            timestamp: day(30),
            node_id: "n".into(),
        }];
        let (start, end) = resolve_window(&config, &events, &[]);
        assert_eq!(end, day(25));
        assert_eq!(start, day(25));
    }
}
