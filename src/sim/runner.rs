//! Simulation Driver.
//!
//! The runner interleaves the frontend and memory-system clock domains.
//! Each component carries an integer `clock_ratio` interpreted as a
//! relative frequency: a component with ratio `r` ticks at normalized
//! times `1/r, 2/r, ...`, and the driver always advances the component
//! whose next tick is earliest, preferring the frontend on ties so
//! requests are admitted before the memory cycle that serves them.

use crate::frontend::Frontend;
use crate::memory_system::MemorySystem;
use crate::stats::{print_stats, StatBlock};

pub struct Runner {
    frontend: Box<dyn Frontend>,
    memory: MemorySystem,
}

impl Runner {
    pub fn new(frontend: Box<dyn Frontend>, memory: MemorySystem) -> Runner {
        Runner { frontend, memory }
    }

    pub fn memory(&self) -> &MemorySystem {
        &self.memory
    }

    pub fn frontend(&self) -> &dyn Frontend {
        self.frontend.as_ref()
    }

    /// Runs the simulation until the frontend reports completion.
    pub fn run(&mut self) {
        let frontend_ratio = self.frontend.clock_ratio() as u64;
        let memory_ratio = self.memory.clock_ratio() as u64;

        let mut frontend_ticks: u64 = 0;
        let mut memory_ticks: u64 = 0;

        while !self.frontend.is_finished() {
            // Compare (f+1)/frontend_ratio against (m+1)/memory_ratio
            // without leaving integer arithmetic.
            let frontend_next = (frontend_ticks + 1) * memory_ratio;
            let memory_next = (memory_ticks + 1) * frontend_ratio;

            if frontend_next <= memory_next {
                self.frontend.tick(&mut self.memory);
                frontend_ticks += 1;
            } else {
                self.memory.tick();
                memory_ticks += 1;
            }
        }
    }

    /// Finalizes every component and returns the statistic blocks in
    /// emission order.
    pub fn finalize(&mut self) -> Vec<StatBlock> {
        self.memory.finalize();

        let mut blocks = vec![self.frontend.stats_block()];
        blocks.extend(self.memory.stats_blocks());
        blocks
    }

    /// Finalizes and prints the nested statistics mapping to stdout.
    pub fn finalize_and_print(&mut self) {
        let blocks = self.finalize();
        print_stats(&blocks);
    }
}
