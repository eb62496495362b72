//! DRAM Memory-System Simulator CLI.
//!
//! The main executable for the simulator. It parses the command line,
//! loads the YAML configuration, builds the frontend and memory system,
//! runs the simulation to completion, and prints the statistics of
//! every component as a nested mapping on standard output.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

extern crate dram_simulator;

use dram_simulator::config::Config;
use dram_simulator::frontend::{self};
use dram_simulator::memory_system::MemorySystem;
use dram_simulator::sim::Runner;

/// Command-line arguments for the DRAM memory-system simulator.
#[derive(Parser, Debug)]
#[command(author, version, about = "Cycle-Accurate DRAM Memory-System Simulator")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(Path::new(&args.config))
        .with_context(|| format!("failed to load configuration '{}'", args.config))?;

    println!("Global Configuration");
    println!("--------------------");
    println!("Frontend:");
    println!("  Implementation:   {:?}", config.frontend.implementation);
    println!("  Clock Ratio:      {}", config.frontend.clock_ratio);
    println!("  Trace:            {}", config.frontend.path);
    println!("MemorySystem:");
    println!("  Clock Ratio:      {}", config.memory_system.clock_ratio);
    println!("  Organization:     {:?}", config.memory_system.dram.org.preset);
    println!("  Timing:           {:?}", config.memory_system.dram.timing.preset);
    println!("  Channels:         {}", config.memory_system.dram.org.channel);
    println!(
        "  Scheduler:        {:?}",
        config.memory_system.controller.scheduler.implementation
    );
    println!(
        "  RowPolicy:        {:?}",
        config.memory_system.controller.row_policy.implementation
    );
    println!(
        "  Watermarks:       {} / {}",
        config.memory_system.controller.wr_low_watermark,
        config.memory_system.controller.wr_high_watermark
    );
    println!("--------------------");

    let frontend = frontend::build(&config.frontend)
        .context("failed to construct the frontend")?;
    let memory = MemorySystem::new(&config.memory_system, frontend.num_cores())
        .context("failed to construct the memory system")?;

    let mut runner = Runner::new(frontend, memory);
    runner.run();

    println!(
        "[*] Simulation finished after {} memory cycles.",
        runner.memory().clk()
    );
    runner.finalize_and_print();

    Ok(())
}
