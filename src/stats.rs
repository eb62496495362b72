//! Simulation statistics collection and reporting.
//!
//! Each component contributes a named block of counters and averages;
//! at the end of a run the blocks are emitted to standard output as a
//! nested mapping of component name to statistic values.

/// A single statistic value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StatValue {
    Count(u64),
    Average(f64),
}

impl std::fmt::Display for StatValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatValue::Count(v) => write!(f, "{}", v),
            StatValue::Average(v) => write!(f, "{:.4}", v),
        }
    }
}

/// A named group of statistics belonging to one component.
pub struct StatBlock {
    pub name: String,
    pub entries: Vec<(String, StatValue)>,
}

impl StatBlock {
    pub fn new(name: impl Into<String>) -> StatBlock {
        StatBlock {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: StatValue) {
        self.entries.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<StatValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

/// Prints every block as a nested mapping.
pub fn print_stats(blocks: &[StatBlock]) {
    for block in blocks {
        println!("{}:", block.name);
        for (name, value) in &block.entries {
            println!("  {}: {}", name, value);
        }
    }
}
