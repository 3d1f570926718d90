mod report;

use std::fs::File;
use std::io::{self, BufReader};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use anyhow::{ensure, Context};
use clap::{ArgAction, Parser};
use log::{info, warn};
use regex::RegexBuilder;
use latencylib::buffer::BufferKind;
use latencylib::config::{MeasurementConfig, SweepConfig};
use latencylib::memory::available_memory;
use latencylib::runner::{Runner, SweepOutcome};
use crate::report::{OutputMode, Reporter};

/// Exit status after Ctrl-C, as a shell would report SIGINT
const INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(about = String::from("Measure memory access times across working set sizes using stride reads"))]
struct Args {
    /// Minimum working set size in KB
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u64).range(1..))]
    min_kb: u64,

    /// Maximum working set size in MB
    #[arg(long, default_value_t = 512)]
    max_mb: u64,

    /// Maximum working set size in GB, overrides --max-mb
    #[arg(long)]
    max_gb: Option<f64>,

    /// Maximum working set size with a unit, e.g. 768MB or 2GB. Overrides --max-mb and --max-gb
    #[arg(long, value_parser = parse_size)]
    max: Option<u64>,

    /// Stride in bytes between accesses
    #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u64).range(1..))]
    stride_bytes: u64,

    /// Minimum total element accesses per data point
    #[arg(long, default_value_t = 1_000_000, value_parser = clap::value_parser!(u64).range(1..))]
    min_accesses: u64,

    /// Number of repeated measurements to take the median of
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    repeats: u32,

    /// Measure the boxed cell buffer. If neither layout is chosen both are measured
    #[arg(long)]
    indirect: bool,

    /// Measure the contiguous buffer. If neither layout is chosen both are measured
    #[arg(long)]
    contiguous: bool,

    /// Disable the warm up walk before each measurement
    #[arg(long = "no-warmup", action = ArgAction::SetFalse)]
    warmup: bool,

    /// Output CSV
    #[arg(long, conflicts_with = "json")]
    csv: bool,

    /// Output JSON once the sweep finishes
    #[arg(long)]
    json: bool,

    /// Read the sweep configuration from a JSON file instead of the flags above
    #[arg(long)]
    config: Option<String>,

    /// Report buffers bigger than this as unavailable. Defaults to the memory the OS reports
    /// as available
    #[arg(long)]
    memory_limit_mb: Option<u64>,

    /// Print the sweep time to stderr
    #[arg(short, long)]
    performance: bool,
}

impl Args {
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.csv {
            OutputMode::Csv
        } else {
            OutputMode::Table
        }
    }

    fn max_bytes(&self) -> anyhow::Result<u64> {
        if let Some(max) = self.max {
            return Ok(max);
        }
        if let Some(gb) = self.max_gb {
            ensure!(gb.is_finite() && gb > 0.0, "--max-gb must be a positive number, got {gb}");
            return Ok((gb * GB as f64) as u64);
        }
        Ok(self.max_mb.saturating_mul(MB))
    }

    fn kinds(&self) -> Vec<BufferKind> {
        if self.indirect == self.contiguous {
            return BufferKind::ALL.to_vec();
        }
        BufferKind::ALL
            .into_iter()
            .filter(|k| match k {
                BufferKind::Contiguous => self.contiguous,
                BufferKind::Indirect => self.indirect,
            })
            .collect()
    }

    /// Builds the sweep configuration, from the config file if one was given
    fn to_config(&self) -> anyhow::Result<SweepConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let file = File::open(path).with_context(|| format!("Couldn't open the config file at path {path}"))?;
                SweepConfig::from_json_reader(BufReader::new(file)).context("Couldn't load the config file")?
            }
            None => {
                let config = SweepConfig {
                    min_bytes: self.min_kb.saturating_mul(KB),
                    max_bytes: self.max_bytes()?,
                    stride_bytes: self.stride_bytes,
                    measurement: MeasurementConfig {
                        min_accesses: self.min_accesses,
                        repeats: self.repeats,
                        warmup: self.warmup,
                    },
                    kinds: self.kinds(),
                    ..SweepConfig::default()
                };
                config.validate()?;
                config
            }
        };
        if let Some(mb) = self.memory_limit_mb {
            config.memory_limit = Some(mb.saturating_mul(MB));
        } else if config.memory_limit.is_none() {
            config.memory_limit = available_memory();
        }
        Ok(config)
    }
}

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// Parses a byte count with an optional binary unit, e.g. `4096`, `64KB`, `1.5GiB` or `2g`
fn parse_size(input: &str) -> Result<u64, String> {
    let pattern = RegexBuilder::new(r"^\s*(?P<value>[0-9]+(?:\.[0-9]+)?)\s*(?:(?P<unit>[KMGT])I?)?B?\s*$")
        .case_insensitive(true)
        .build()
        .map_err(|e| format!("Couldn't build the size pattern: {e}"))?;
    let tokens = pattern.captures(input).ok_or(format!("Couldn't parse the size {input:?}, expected e.g. 512MB"))?;
    let value: f64 = tokens["value"].parse().map_err(|e| format!("Couldn't parse the size {input:?}: {e}"))?;
    let unit = tokens.name("unit").map_or("", |m| m.as_str());
    let multiplier = match unit.to_ascii_uppercase().as_str() {
        "K" => KB,
        "M" => MB,
        "G" => GB,
        "T" => 1024 * GB,
        _ => 1,
    };
    let bytes = value * multiplier as f64;
    if bytes < 1.0 || bytes >= u64::MAX as f64 {
        return Err(format!("The size {input:?} is out of range"));
    }
    Ok(bytes as u64)
}

fn run(args: &Args) -> anyhow::Result<SweepOutcome> {
    let config = args.to_config()?;
    info!("Sweep configuration: {config:?}");

    // First Ctrl-C finishes the current size and stops, a second one exits straight away
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        if handler_stop.swap(true, Ordering::SeqCst) {
            std::process::exit(i32::from(INTERRUPTED));
        }
    })
    .context("Couldn't set the Ctrl-C handler")?;

    let mut runner = Runner::new(&config);
    let mut reporter = Reporter::new(io::stdout().lock(), args.output_mode(), runner.kinds().to_vec());
    reporter.header().context("Couldn't write the output")?;
    let mut write_error = None;
    let outcome = runner.run(&stop, |row, progress| {
        info!("{} of {} sizes done", progress.completed, progress.total);
        if write_error.is_some() {
            return;
        }
        if let Err(e) = reporter.row(row) {
            // Nobody is reading the results any more, so stop measuring
            write_error = Some(e);
            stop.store(true, Ordering::SeqCst);
        }
    });
    if let Some(e) = write_error {
        return Err(e).context("Couldn't write the output");
    }
    reporter.finish(runner.rows()).context("Couldn't write the output")?;

    if args.performance {
        eprintln!("Sweep time: {}s", runner.get_execution_time().as_nanos() as f64 / 1e9);
    }
    Ok(outcome)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    match run(&args) {
        Ok(SweepOutcome::Completed) => ExitCode::SUCCESS,
        Ok(SweepOutcome::Interrupted) => {
            warn!("Sweep interrupted by the user");
            eprintln!("Interrupted");
            ExitCode::from(INTERRUPTED)
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
