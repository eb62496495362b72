//! Load/Store Trace Frontend.
//!
//! Replays a physical-address trace. Each line is `LD <addr>` or
//! `ST <addr>` with a decimal or `0x`-prefixed hexadecimal address.
//! One admission is attempted per frontend tick; backpressure retries
//! the same line on the next tick, so no request is ever lost.

use std::fs;
use std::path::Path;

use crate::common::addr::PhysAddr;
use crate::common::error::ConfigError;
use crate::common::request::{Request, RequestType};
use crate::frontend::Frontend;
use crate::memory_system::MemorySystem;
use crate::stats::{StatBlock, StatValue};

#[derive(Debug)]
struct TraceEntry {
    is_write: bool,
    addr: PhysAddr,
}

#[derive(Debug)]
pub struct LoadStoreTrace {
    trace: Vec<TraceEntry>,
    curr_idx: usize,
    /// Requests successfully admitted so far.
    sent_count: u64,
    clock_ratio: u32,
}

impl LoadStoreTrace {
    pub fn new(path: &Path, clock_ratio: u32) -> Result<LoadStoreTrace, ConfigError> {
        println!("[Frontend] Loading trace file {} ...", path.display());
        let trace = load_trace(path)?;
        println!("[Frontend] Loaded {} lines.", trace.len());

        Ok(LoadStoreTrace {
            trace,
            curr_idx: 0,
            sent_count: 0,
            clock_ratio,
        })
    }
}

impl Frontend for LoadStoreTrace {
    fn tick(&mut self, memory: &mut MemorySystem) {
        if self.is_finished() {
            return;
        }

        let entry = &self.trace[self.curr_idx];
        let type_id = if entry.is_write {
            RequestType::Write
        } else {
            RequestType::Read
        };

        if memory.send(Request::new(entry.addr, type_id)).is_ok() {
            self.curr_idx = (self.curr_idx + 1) % self.trace.len();
            self.sent_count += 1;
        }
    }

    fn is_finished(&self) -> bool {
        self.sent_count >= self.trace.len() as u64
    }

    fn clock_ratio(&self) -> u32 {
        self.clock_ratio
    }

    fn stats_block(&self) -> StatBlock {
        let mut block = StatBlock::new("Frontend");
        block.push("trace_length", StatValue::Count(self.trace.len() as u64));
        block.push("requests_sent", StatValue::Count(self.sent_count));
        block
    }
}

fn load_trace(path: &Path) -> Result<Vec<TraceEntry>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut trace = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let bad_line = |message: String| ConfigError::TraceFormat {
            path: path.to_path_buf(),
            line: line_no,
            message,
        };

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 2 {
            return Err(bad_line(format!(
                "expected 'LD <addr>' or 'ST <addr>', got '{}'",
                line
            )));
        }

        let is_write = match tokens[0] {
            "LD" => false,
            "ST" => true,
            other => return Err(bad_line(format!("unknown operation '{}'", other))),
        };

        let addr = parse_addr(tokens[1])
            .ok_or_else(|| bad_line(format!("invalid address '{}'", tokens[1])))?;

        trace.push(TraceEntry { is_write, addr });
    }

    if trace.is_empty() {
        return Err(ConfigError::TraceFormat {
            path: path.to_path_buf(),
            line: 0,
            message: "trace contains no requests".into(),
        });
    }
    Ok(trace)
}

/// Parses a decimal or `0x`/`0X`-prefixed hexadecimal address.
pub(crate) fn parse_addr(token: &str) -> Option<PhysAddr> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        PhysAddr::from_str_radix(hex, 16).ok()
    } else {
        token.parse().ok()
    }
}
