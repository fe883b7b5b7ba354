use anyhow::{Context, Error, Result};
use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use log::LevelFilter;
use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use termcolor::{BufferedStandardStream, ColorChoice};

use dolgeo::extractor::{DEFAULT_MARKER, DEFAULT_TIMESTAMP_OFFSET};
use dolgeo::{examine, logger, report, ExtractorBuilder, LineStore, Renderer, ScanPolicy};

/// Check if the error chain contains a broken pipe error.
#[inline(always)]
fn is_broken_pipe(err: &Error) -> bool {
    for cause in err.chain() {
        let io_err = match cause.downcast_ref::<dolgeo::Error>() {
            Some(dolgeo::Error::Io(io_err)) => Some(io_err),
            _ => cause.downcast_ref::<io::Error>(),
        };
        if io_err.is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe) {
            return true;
        }
    }
    false
}

/// Accept only an existing, readable regular file.
fn readable_file(s: &str) -> std::result::Result<Utf8PathBuf, String> {
    let path = Utf8PathBuf::from(s);
    if !path.is_file() {
        return Err("File does not exist".to_string());
    }
    File::open(&path).map_err(|e| format!("File is not readable: {e}"))?;
    Ok(path)
}

#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
#[clap(after_help = "Produce the source file in PowerShell with:
    Get-DeliveryOptimizationLog | Out-File -FilePath .\\DOL.txt -Encoding ascii
Pass --address with an IP exactly as it appears in the first table to list
the date/time of each of its sightings.")]
struct Args {
    /// Delivery Optimization log text file to examine
    #[clap(
        short,
        long,
        value_name = "FILE",
        value_hint = clap::ValueHint::FilePath,
        value_parser = readable_file
    )]
    source: Utf8PathBuf,

    /// List every sighting of this IP address (matched verbatim, no leading zeros)
    #[clap(short, long, value_name = "IP")]
    address: Option<String>,

    /// Report layout
    #[clap(short, long, value_enum, default_value_t = ArgsFormat::Table, env = "DOLGEO_FORMAT")]
    format: ArgsFormat,

    /// Use color for table headers
    #[clap(short = 'C', long, value_enum, default_value_t = ArgsColorChoice::Auto)]
    color: ArgsColorChoice,

    /// Warn about and skip GEO response lines that cannot be extracted
    /// instead of aborting
    #[clap(long)]
    skip_malformed: bool,

    /// Number of lines between a timestamp line and its GEO response
    #[clap(long, value_name = "N", default_value_t = DEFAULT_TIMESTAMP_OFFSET)]
    timestamp_offset: usize,

    /// Substring identifying GEO response lines
    #[clap(long, value_name = "TEXT", default_value = DEFAULT_MARKER)]
    marker: String,

    /// Log verbosity on stderr (overrides RUST_LOG)
    #[clap(long, value_enum, default_value_t = ArgsLogLevel::Warn)]
    log_level: ArgsLogLevel,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum ArgsFormat {
    Table,
    Plain,
    Json,
}

impl ArgsFormat {
    fn renderer(self) -> Box<dyn Renderer> {
        match self {
            ArgsFormat::Table => Box::new(report::TableRenderer),
            ArgsFormat::Plain => Box::new(report::PlainRenderer),
            ArgsFormat::Json => Box::<report::JsonRenderer>::default(),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum ArgsColorChoice {
    Always,
    Never,
    Auto,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum ArgsLogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<ArgsLogLevel> for LevelFilter {
    fn from(level: ArgsLogLevel) -> Self {
        match level {
            ArgsLogLevel::Off => LevelFilter::Off,
            ArgsLogLevel::Error => LevelFilter::Error,
            ArgsLogLevel::Warn => LevelFilter::Warn,
            ArgsLogLevel::Info => LevelFilter::Info,
            ArgsLogLevel::Debug => LevelFilter::Debug,
            ArgsLogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn main() -> ExitCode {
    let err = match run_main() {
        Ok(code) => return code,
        Err(err) => err,
    };

    if is_broken_pipe(&err) {
        return ExitCode::SUCCESS;
    }

    // Print detailed error information based on environment variables
    if std::env::var("RUST_BACKTRACE").is_ok_and(|v| v == "1")
        && std::env::var("RUST_LIB_BACKTRACE").map_or(true, |v| v == "1")
    {
        let _ = writeln!(&mut std::io::stderr(), "{:?}", err);
    } else {
        let _ = writeln!(&mut std::io::stderr(), "{:#}", err);
    }

    ExitCode::FAILURE
}

fn run_main() -> Result<ExitCode> {
    let args = Args::parse();
    logger::init_logger(args.log_level.into());

    // auto only colors when stdout is a tty
    let colormode = match args.color {
        ArgsColorChoice::Auto => {
            if std::io::stdout().is_terminal() {
                ColorChoice::Always
            } else {
                ColorChoice::Never
            }
        }
        ArgsColorChoice::Always => ColorChoice::Always,
        ArgsColorChoice::Never => ColorChoice::Never,
    };

    run(args, colormode)?;

    Ok(ExitCode::SUCCESS)
}

fn run(args: Args, colormode: ColorChoice) -> Result<()> {
    let source = args
        .source
        .canonicalize_utf8()
        .with_context(|| format!("failed to resolve {}", args.source))?;

    let extractor = ExtractorBuilder::new()
        .marker(args.marker)
        .timestamp_offset(args.timestamp_offset)
        .build()?;

    let policy = if args.skip_malformed {
        ScanPolicy::Skip
    } else {
        ScanPolicy::Abort
    };

    let lines = LineStore::open(&source)?;
    let agg = examine(&lines, &extractor, policy)
        .with_context(|| format!("failed to examine {source}"))?;

    let mut out = BufferedStandardStream::stdout(colormode);
    let mut renderer = args.format.renderer();
    report::write_report(
        &mut out,
        renderer.as_mut(),
        &agg,
        source.as_str(),
        args.address.as_deref(),
    )?;

    Ok(())
}
