use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use replay::cursor::{Cursor, CursorError};
use replay::metrics::compute_metrics;
use replay::surface::{InMemorySurface, SurfaceOp};
use replay::trace::Trace;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("could not open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("could not read trace: {0}")]
    Ingest(#[from] ingest::IngestError),
    #[error("trace failed validation: {0}")]
    Trace(#[from] replay::trace::TraceError),
    #[error("replay failed: {0}")]
    Cursor(#[from] replay::cursor::CursorError),
    #[error("walk left {leaked} entities on the surface; expected 0")]
    Leaked { leaked: usize },
    #[error("two replays of the same trace diverged")]
    NonDeterministic,
}

#[derive(Parser, Debug)]
#[command(name = "replay-cli", about = "Inspector for recorded search-space traces")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a recorded trace file and run load-time validation.
    Validate {
        #[arg(env = "REPLAY_TRACE_FILE")]
        file: PathBuf,
    },
    /// Summarize a recorded trace file.
    Info {
        #[arg(env = "REPLAY_TRACE_FILE")]
        file: PathBuf,
    },
    /// Replay a recorded trace to a position and print the live entities.
    Replay {
        #[arg(env = "REPLAY_TRACE_FILE")]
        file: PathBuf,

        /// Event index to stop at; defaults to the end of the trace.
        #[arg(long)]
        to: Option<usize>,

        /// Print the surface after every step instead of only at the end.
        #[arg(long, default_value_t = false)]
        step: bool,
    },
    /// Walk a trace to the end and back, checking that nothing leaks and
    /// that replay is deterministic.
    Check {
        #[arg(env = "REPLAY_TRACE_FILE")]
        file: PathBuf,
    },
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Validate { file } => validate(&file),
        Command::Info { file } => info(&file),
        Command::Replay { file, to, step } => replay_to(&file, to, step),
        Command::Check { file } => check(&file),
    }
}

fn load_trace(path: &Path) -> Result<Trace, CliError> {
    let file = File::open(path).map_err(|source| CliError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let records = ingest::read_records(BufReader::new(file))?;
    let trace = ingest::build_trace(&records)?;
    tracing::debug!(events = trace.len(), "trace loaded");
    Ok(trace)
}

fn validate(path: &Path) -> Result<(), CliError> {
    let trace = load_trace(path)?;
    println!("ok: {} events", trace.len());
    Ok(())
}

fn info(path: &Path) -> Result<(), CliError> {
    let trace = load_trace(path)?;
    let metrics = compute_metrics(&trace);
    println!("events:           {}", metrics.events);
    println!("mutations:        {}", metrics.mutations);
    println!("entities created: {}", metrics.entities_created);
    for (kind, count) in &metrics.creates_by_kind {
        println!("  {kind:<6} {count}");
    }
    Ok(())
}

fn replay_to(path: &Path, to: Option<usize>, step: bool) -> Result<(), CliError> {
    let trace = load_trace(path)?;
    let target = to.unwrap_or(trace.len());
    if target > trace.len() {
        return Err(CursorError::OutOfRange { target, len: trace.len() }.into());
    }
    let mut cursor = Cursor::new(&trace, InMemorySurface::new());

    if step {
        while cursor.position() < target {
            let position = cursor.step_forward()?;
            println!("step {position}/{target}");
            print_surface(cursor.surface());
        }
    } else {
        cursor.seek(target)?;
        println!("position {}/{}", cursor.position(), trace.len());
        print_surface(cursor.surface());
    }
    Ok(())
}

fn check(path: &Path) -> Result<(), CliError> {
    let trace = load_trace(path)?;

    let first = walk_there_and_back(&trace)?;
    let second = walk_there_and_back(&trace)?;
    if first != second {
        return Err(CliError::NonDeterministic);
    }

    println!(
        "ok: {} events applied and reverted, surface clean, replay deterministic",
        trace.len()
    );
    Ok(())
}

/// Apply every event then revert every event, returning the operation
/// journal. Fails if the surface is not empty again afterwards.
fn walk_there_and_back(trace: &Trace) -> Result<Vec<SurfaceOp>, CliError> {
    let mut cursor = Cursor::new(trace, InMemorySurface::new());
    cursor.seek(trace.len())?;
    cursor.seek(0)?;
    let leaked = cursor.surface().len();
    if leaked > 0 {
        return Err(CliError::Leaked { leaked });
    }
    Ok(cursor.surface().journal().to_vec())
}

fn print_surface(surface: &InMemorySurface) {
    for entity in surface.sorted_entities() {
        let metadata = entity.metadata.as_deref().unwrap_or("-");
        println!(
            "  #{:<4} {:<4} ({:.5}, {:.5})  {}  {}",
            entity.handle,
            entity.kind.as_str(),
            entity.position.lat,
            entity.position.lon,
            entity.label,
            metadata
        );
    }
}
