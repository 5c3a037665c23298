//! `pipesim`: the minimal outer shell around `pipesim-core`.
//!
//! Loads a flat binary image at a fixed base address, constructs a
//! `FlatMemory`-backed `Cpu`, runs it to completion, and prints the trap
//! reason and final statistics. ELF parsing, interactive debugging, and
//! report formatting are out of scope — ambitions for the core crate, not
//! this shell.

use std::path::PathBuf;
use std::process::ExitCode;
use std::{fs, io};

use clap::Parser;
use pipesim_core::{Config, Cpu, Fault, FlatMemory, StopReason};
use tracing_subscriber::EnvFilter;

/// Default load address, and default entry PC, for a bare binary image.
const DEFAULT_LOAD_ADDR: u32 = 0x0040_0000;

#[derive(Parser, Debug)]
#[command(
    name = "pipesim",
    author,
    version,
    about = "A cycle-accurate MIPS-style pipeline simulator"
)]
struct Cli {
    /// Flat binary image to load and run.
    binary: PathBuf,

    /// Address the image is loaded at, and Fetch's starting PC. Accepts a
    /// decimal or `0x`-prefixed hex literal.
    #[arg(long, default_value_t = DEFAULT_LOAD_ADDR, value_parser = parse_addr)]
    entry: u32,

    /// Size in bytes of the simulated memory region, starting at `--entry`.
    #[arg(long, default_value_t = 1 << 20)]
    mem_size: usize,

    /// Maximum number of cycles to run before giving up.
    #[arg(long, default_value_t = 1_000_000)]
    step_budget: u64,
}

fn parse_addr(s: &str) -> Result<u32, std::num::ParseIntError> {
    s.strip_prefix("0x")
        .map_or_else(|| s.parse::<u32>(), |hex| u32::from_str_radix(hex, 16))
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("reading {path}: {source}")]
    Io {
        /// Path of the image that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Fault(#[from] Fault),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match run(&Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("pipesim: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let image = fs::read(&cli.binary).map_err(|source| CliError::Io {
        path: cli.binary.clone(),
        source,
    })?;

    let mut memory = FlatMemory::new(cli.entry, cli.mem_size);
    memory.load_image(&image);

    let config = Config {
        step_budget: cli.step_budget,
        ..Config::default()
    };

    let mut cpu = Cpu::new(&config, Box::new(memory), cli.entry)?;

    let code = match cpu.run() {
        StopReason::Trap(event) => {
            println!("{}", event.fault);
            if matches!(event.fault, Fault::Halt { .. }) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        StopReason::BudgetExhausted => {
            println!("step budget of {} cycles exhausted without a trap", cli.step_budget);
            ExitCode::FAILURE
        }
    };

    let stats = cpu.stats();
    println!(
        "cycles={} retired={} ipc={:.3} jumps={} mispredictions={} misprediction_rate={:.3}",
        stats.cycles,
        stats.instructions_retired,
        stats.ipc(),
        stats.num_jumps,
        stats.num_mispredictions,
        stats.misprediction_rate(),
    );

    Ok(code)
}
