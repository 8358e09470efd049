use anyhow::Context;
use clap::Parser;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use viaq::{ErrorStrategy, Identity, PipelineConfig, StreamPipeline, ViaqConfig, ViaqProcessor};

#[derive(Parser)]
#[command(name = "viaq")]
#[command(about = "Normalize tagged JSON log records into the ViaQ data model")]
#[command(version)]
struct Args {
    /// YAML or JSON configuration file (defaults apply when omitted)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Treat every input line as a bare record with this tag
    #[arg(long, value_name = "TAG")]
    tag: Option<String>,

    /// Debug mode - trace records and show statistics
    #[arg(long)]
    debug: bool,

    /// Fail on first error instead of skipping lines
    #[arg(long)]
    fail_fast: bool,

    /// Maximum line length
    #[arg(long, default_value = "1048576")] // 1MB
    max_line_length: usize,

    /// Buffer size for I/O
    #[arg(long, default_value = "65536")] // 64KB
    buffer_size: usize,

    /// Input file (default: stdin)
    #[arg(short = 'i', long = "input")]
    input_file: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long = "output")]
    output_file: Option<PathBuf>,
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_tracing(args.debug);

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut viaq_config = match &args.config_file {
        Some(path) => ViaqConfig::from_path(path)?,
        None => ViaqConfig::default(),
    };
    if args.debug {
        viaq_config.debug_records = true;
    }
    let processor = ViaqProcessor::new(&viaq_config, Identity::from_env())?;

    let config = PipelineConfig {
        error_strategy: if args.fail_fast {
            ErrorStrategy::FailFast
        } else {
            ErrorStrategy::Skip
        },
        debug: args.debug,
        buffer_size: args.buffer_size,
        max_line_length: args.max_line_length,
        default_tag: args.tag.clone(),
    };
    let buffer_size = config.buffer_size;
    let mut pipeline = StreamPipeline::new(config, Arc::new(processor));

    let input_filename = args
        .input_file
        .as_ref()
        .map(|p| p.to_string_lossy().to_string());
    let input: Box<dyn Read> = if let Some(input_path) = &args.input_file {
        let file = File::open(input_path)
            .with_context(|| format!("Failed to open input file '{}'", input_path.display()))?;
        Box::new(file)
    } else {
        Box::new(io::stdin())
    };

    let mut output: Box<dyn Write> = if let Some(output_path) = &args.output_file {
        let file = File::create(output_path)
            .with_context(|| format!("Failed to create output file '{}'", output_path.display()))?;
        Box::new(io::BufWriter::with_capacity(buffer_size, file))
    } else {
        Box::new(io::BufWriter::with_capacity(buffer_size, io::stdout()))
    };

    let stats = pipeline
        .process_reader(input, &mut output, input_filename.as_deref())
        .context("Processing failed")?;

    if let Err(e) = output.flush() {
        if e.kind() != io::ErrorKind::BrokenPipe {
            return Err(e.into());
        }
    }

    tracing::debug!(
        records_processed = stats.records_processed,
        records_output = stats.records_output,
        errors = stats.errors,
        empty_records = stats.empty_records,
        processing_time = ?stats.processing_time,
        "Final statistics"
    );
    if let Some(rate) = stats.rate() {
        tracing::debug!("Processing rate: {:.0} records/second", rate);
    }

    Ok(())
}
