// Copyright (c) 2024 Mudit Bhargava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//

// main_cache.rs
//
// This file contains the entry point for the cache hierarchy simulator.
// It parses the command line, drives the memory trace through the L1/L2
// hierarchy with the selected prefetcher, and prints the accumulated
// statistics.

use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::path::PathBuf;
use std::process;
use tracesim_rust::cache_simulator::config::{CacheHierarchyConfig, PrefetcherType};
use tracesim_rust::cache_simulator::simulator::Simulator;
use tracesim_rust::errors::SimulatorError;
use tracesim_rust::trace::reader::{MemoryRecord, TraceReader};

#[derive(Parser)]
#[command(name = "cache_sim")]
#[command(about = "A trace-driven cache hierarchy simulator written in Rust")]
#[command(version)]
struct Cli {
    /// Input memory trace file
    trace: PathBuf,

    /// Hardware prefetcher to simulate
    #[arg(long, value_enum, default_value = "none")]
    prefetcher: PrefetcherType,

    /// Seed for the VLDP victim-selection RNG (entropy-seeded when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Echo each decoded record to stdout before accounting
    #[arg(short, long)]
    verbose: bool,

    /// Log level (error, warn, info, debug)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Write the final statistics as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,
}

fn init_logger(level: &str) {
    let filter = match level.to_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" | "warning" => log::LevelFilter::Warn,
        "debug" => log::LevelFilter::Debug,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::new().filter_level(filter).init();
}

fn run(cli: &Cli) -> Result<(), SimulatorError> {
    let mut trace = TraceReader::<MemoryRecord>::open(&cli.trace)?;

    let mut config = CacheHierarchyConfig::new(cli.prefetcher);
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }

    let mut simulator = Simulator::new(config);
    while let Some(record) = trace.next_record()? {
        if cli.verbose {
            println!("{}", record);
        }
        simulator.step(&record);
    }

    println!("{}", simulator.stats());

    if let Some(path) = &cli.json {
        let file = File::create(path).map_err(SimulatorError::StatsExport)?;
        serde_json::to_writer_pretty(file, simulator.stats())
            .map_err(|err| SimulatorError::StatsExport(err.into()))?;
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logger(&cli.log_level);

    if let Err(err) = run(&cli) {
        eprintln!("{}", err.to_string().red());
        process::exit(err.exit_code());
    }
}
