//! heapfile CLI
//!
//! Inspect and edit a heap file from the command line. Handles are addressed
//! by the id they were allocated with.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use heapfile_rs::validation::with_default_extension;
use heapfile_rs::{Handle, HeapFile, HeapFileBuilder, HeapFileExt, PrimitiveKind};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "heapfile")]
#[command(about = "Allocate, read and write typed values in a heap file")]
struct Args {
    /// Path to heap file (`.hpf` is added when no extension is given)
    #[arg(short = 'f', long, default_value = "store.hpf")]
    file: PathBuf,

    /// Sidecar header path [default: <file>.header]
    #[arg(long)]
    header: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Allocate room for one or more values
    Alloc {
        /// Value type (i8..i64, u8..u64, f32, f64, bool, char)
        #[arg(short = 't', long = "type")]
        kind: String,

        /// Number of elements
        #[arg(short, long, default_value = "1")]
        count: usize,

        /// Id used to find the handle again
        #[arg(long)]
        id: i64,
    },

    /// Write values into an allocated handle
    Write {
        #[arg(long)]
        id: i64,

        #[arg(short = 't', long = "type")]
        kind: String,

        /// Values, written in order
        #[arg(required = true, allow_hyphen_values = true)]
        values: Vec<String>,
    },

    /// Read values from an allocated handle
    Read {
        #[arg(long)]
        id: i64,

        #[arg(short = 't', long = "type")]
        kind: String,

        #[arg(short, long, default_value = "1")]
        count: usize,
    },

    /// Write a string, allocating it if the id is unknown
    WriteStr {
        #[arg(long)]
        id: i64,

        text: String,
    },

    /// Read a string
    ReadStr {
        #[arg(long)]
        id: i64,
    },

    /// Free a handle
    Free {
        #[arg(long)]
        id: i64,
    },

    /// Truncate trailing freed blocks
    Shrink,

    /// List every tracked block
    List {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show directory statistics
    Stats,
}

fn lookup(heap: &HeapFile, id: i64) -> Result<Handle> {
    heap.find_by_id(id)
        .ok_or_else(|| anyhow!("no live handle with id {}", id))
}

fn run(heap: &mut HeapFile, command: Command) -> Result<()> {
    match command {
        Command::Alloc { kind, count, id } => {
            let kind: PrimitiveKind = kind.parse()?;
            if heap.find_by_id(id).is_some() {
                bail!("id {} is already in use", id);
            }
            let handle = heap.allocate_kind(kind, count, id)?;
            println!("{}", serde_json::to_string(&handle)?);
        }
        Command::Write { id, kind, values } => {
            let kind: PrimitiveKind = kind.parse()?;
            let handle = lookup(heap, id)?;
            let values = values
                .iter()
                .map(|text| kind.parse_value(text))
                .collect::<heapfile_rs::Result<Vec<_>>>()?;
            heap.write_values(&handle, &values)?;
            info!("Wrote {} {} value(s) to id {}", values.len(), kind, id);
        }
        Command::Read { id, kind, count } => {
            let kind: PrimitiveKind = kind.parse()?;
            let handle = lookup(heap, id)?;
            for value in heap.read_values(kind, &handle, count)? {
                println!("{}", value);
            }
        }
        Command::WriteStr { id, text } => {
            let handle = match heap.find_by_id(id) {
                Some(handle) => handle,
                None => heap.allocate_string(&text, id)?,
            };
            heap.write_string(&handle, &text)?;
        }
        Command::ReadStr { id } => {
            let handle = lookup(heap, id)?;
            println!("{}", heap.read_string(&handle)?);
        }
        Command::Free { id } => {
            let handle = lookup(heap, id)?;
            heap.free(&handle)?;
        }
        Command::Shrink => {
            let reclaimed = heap.shrink()?;
            println!("reclaimed {} bytes, length now {}", reclaimed, heap.len());
        }
        Command::List { json } => {
            if json {
                let handles: Vec<&Handle> = heap.handles().collect();
                println!("{}", serde_json::to_string_pretty(&handles)?);
            } else {
                println!("{:>12} {:>12} {:>8} {:>20}", "offset", "size", "state", "id");
                for handle in heap.handles() {
                    let state = if handle.is_freed() { "freed" } else { "live" };
                    println!(
                        "{:>12} {:>12} {:>8} {:>20}",
                        handle.offset(),
                        handle.size(),
                        state,
                        handle.id()
                    );
                }
            }
        }
        Command::Stats => {
            let stats = heap.directory().stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
            println!("file length: {} bytes", heap.len());
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let file = with_default_extension(&args.file);
    let mut builder = HeapFileBuilder::new(&file);
    if let Some(header) = args.header {
        builder = builder.header_path(header);
    }

    let mut heap = builder
        .open()
        .with_context(|| format!("failed to open {:?}", file))?;

    let outcome = run(&mut heap, args.command);

    // Persist the directory even when the command failed
    heap.close().context("failed to close heap")?;
    outcome
}
