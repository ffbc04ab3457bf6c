//! zentropy CLI - raw DEFLATE encoding and CRC-32 checksums
//!
//! `zentropy compress` writes a raw DEFLATE stream using one of the
//! window-free symbol sources; `zentropy crc32` prints file checksums.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use zentropy::compress::crc32::crc32_chunked;
use zentropy::compress::{crc32, deflate_with_stats, DeflateOptions, Strategy};

/// DEFLATE entropy coding and CRC-32 tool.
#[derive(Parser, Debug)]
#[command(name = "zentropy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// More output (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress a file into a raw DEFLATE stream
    Compress {
        /// Input file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file (defaults to INPUT.deflate)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Block strategy and symbol source
        #[arg(short, long, value_enum, default_value = "default")]
        strategy: StrategyArg,

        /// Memory level (1-9); bounds the symbols per block
        #[arg(short, long, default_value = "8", value_parser = clap::value_parser!(u8).range(1..=9))]
        mem_level: u8,
    },
    /// Print the CRC-32 of each file
    Crc32 {
        /// Files to checksum
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Checksum independent chunks of this many bytes and combine them
        #[arg(short, long, value_name = "BYTES")]
        chunk: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Cheapest block type, literals only
    Default,
    /// Literals only
    HuffmanOnly,
    /// Runs of the previous byte as matches
    Rle,
    /// Fixed Huffman codes
    Fixed,
    /// Stored blocks
    Stored,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Default => Strategy::Default,
            StrategyArg::HuffmanOnly => Strategy::HuffmanOnly,
            StrategyArg::Rle => Strategy::Rle,
            StrategyArg::Fixed => Strategy::Fixed,
            StrategyArg::Stored => Strategy::Stored,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Compress {
            input,
            output,
            strategy,
            mem_level,
        } => {
            let data = fs::read(&input)?;
            let options = DeflateOptions {
                strategy: strategy.into(),
                mem_level,
            };

            let start = Instant::now();
            let (compressed, stats) = deflate_with_stats(&data, &options)?;
            let encode_time = start.elapsed();

            let output_path = output.unwrap_or_else(|| {
                let mut name = input.clone().into_os_string();
                name.push(".deflate");
                PathBuf::from(name)
            });
            fs::write(&output_path, &compressed)?;

            info!(
                stored = stats.stored_blocks,
                fixed = stats.static_blocks,
                dynamic = stats.dynamic_blocks,
                literals = stats.literals,
                matches = stats.matches,
                "blocks written"
            );
            debug!(?encode_time, output = ?output_path, "compress done");

            let input_size = data.len() as u64;
            let output_size = compressed.len() as u64;
            let ratio = if input_size > 0 {
                (output_size as f64 / input_size as f64) * 100.0
            } else {
                0.0
            };
            println!(
                "{} -> {} ({:.1}%)",
                format_size(input_size),
                format_size(output_size),
                ratio
            );
        }
        Command::Crc32 { files, chunk } => {
            for path in files {
                let data = fs::read(&path)?;
                let start = Instant::now();
                let crc = match chunk {
                    Some(size) => crc32_chunked(&data, size),
                    None => crc32(0, &data),
                };
                debug!(elapsed = ?start.elapsed(), bytes = data.len(), "checksum done");
                println!("{crc:08x}  {}", path.display());
            }
        }
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
