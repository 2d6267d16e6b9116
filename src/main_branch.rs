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

// main_branch.rs
//
// This file contains the entry point for the branch prediction simulator.
// It parses the command line, runs the selected predictor over a branch
// trace, and prints the accumulated statistics.

use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::path::PathBuf;
use std::process;
use tracesim_rust::branch_simulator::config::BranchPredictorType;
use tracesim_rust::branch_simulator::simulator::Simulator;
use tracesim_rust::errors::SimulatorError;
use tracesim_rust::trace::reader::{BranchRecord, TraceReader};

#[derive(Parser)]
#[command(name = "branch_sim")]
#[command(about = "A trace-driven branch prediction simulator written in Rust")]
#[command(version)]
struct Cli {
    /// Input branch trace file
    trace: PathBuf,

    /// Branch predictor to simulate
    #[arg(short, long, value_enum, default_value = "two-bit")]
    predictor: BranchPredictorType,

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
    let mut trace = TraceReader::<BranchRecord>::open(&cli.trace)?;

    let mut simulator = Simulator::new(cli.predictor);
    simulator.verbose = cli.verbose;
    simulator.run(&mut trace)?;

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
