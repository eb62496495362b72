//! Controller Plugins.
//!
//! Plugins form a strictly-ordered chain of observers invoked each cycle
//! after a request is chosen and before its command issues. They must
//! not mutate scheduling decisions; they only watch the command stream.

use crate::common::request::Request;
use crate::dram::spec::Command;
use crate::stats::{StatBlock, StatValue};

/// Observer attached to a controller's per-cycle pipeline.
pub trait ControllerPlugin {
    /// Binds the plugin to its controller once at construction time.
    fn setup(&mut self, _channel_id: i32) {}

    /// Observes this cycle's scheduling outcome.
    fn update(&mut self, found: bool, chosen: Option<&Request>);

    /// Called once at the end of the simulation.
    fn finalize(&mut self) {}

    /// Statistics contributed to the plugin's controller block.
    fn stats(&self) -> Vec<(String, StatValue)> {
        Vec::new()
    }
}

/// Counts the DRAM commands chosen for issue, per command.
pub struct CommandCounter {
    counts: [u64; Command::COUNT],
}

impl CommandCounter {
    pub fn new() -> CommandCounter {
        CommandCounter {
            counts: [0; Command::COUNT],
        }
    }
}

impl Default for CommandCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerPlugin for CommandCounter {
    fn update(&mut self, found: bool, chosen: Option<&Request>) {
        if !found {
            return;
        }
        if let Some(req) = chosen {
            self.counts[req.command.idx()] += 1;
        }
    }

    fn stats(&self) -> Vec<(String, StatValue)> {
        Command::ALL
            .iter()
            .map(|cmd| {
                (
                    format!("plugin_num_{}", cmd.name()),
                    StatValue::Count(self.counts[cmd.idx()]),
                )
            })
            .collect()
    }
}

/// Extends [`StatBlock`] with every plugin's contribution.
pub fn append_plugin_stats(block: &mut StatBlock, plugins: &[Box<dyn ControllerPlugin>]) {
    for plugin in plugins {
        for (name, value) in plugin.stats() {
            block.push(name, value);
        }
    }
}
