//! Read/Write Address-Vector Trace Frontend.
//!
//! Replays a trace addressed directly in device coordinates. Each line
//! is `R <a0,a1,...>` or `W <a0,a1,...>` with one signed decimal index
//! per hierarchy level; `-1` leaves a level unspecified.

use std::fs;
use std::path::Path;

use crate::common::addr::AddrVec;
use crate::common::error::ConfigError;
use crate::common::request::{Request, RequestType};
use crate::dram::spec::Level;
use crate::frontend::Frontend;
use crate::memory_system::MemorySystem;
use crate::stats::{StatBlock, StatValue};

#[derive(Debug)]
struct TraceEntry {
    is_write: bool,
    addr_vec: AddrVec,
}

#[derive(Debug)]
pub struct ReadWriteTrace {
    trace: Vec<TraceEntry>,
    curr_idx: usize,
    sent_count: u64,
    clock_ratio: u32,
}

impl ReadWriteTrace {
    pub fn new(path: &Path, clock_ratio: u32) -> Result<ReadWriteTrace, ConfigError> {
        println!("[Frontend] Loading trace file {} ...", path.display());
        let trace = load_trace(path)?;
        println!("[Frontend] Loaded {} lines.", trace.len());

        Ok(ReadWriteTrace {
            trace,
            curr_idx: 0,
            sent_count: 0,
            clock_ratio,
        })
    }
}

impl Frontend for ReadWriteTrace {
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

        let req = Request::with_vec(entry.addr_vec.clone(), type_id);
        if memory.send(req).is_ok() {
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
                "expected 'R <a0,a1,...>' or 'W <a0,a1,...>', got '{}'",
                line
            )));
        }

        let is_write = match tokens[0] {
            "R" => false,
            "W" => true,
            other => return Err(bad_line(format!("unknown operation '{}'", other))),
        };

        let mut addr_vec = AddrVec::new();
        for index in tokens[1].split(',') {
            let value: i32 = index
                .trim()
                .parse()
                .map_err(|_| bad_line(format!("invalid address index '{}'", index)))?;
            addr_vec.push(value);
        }
        if addr_vec.len() != Level::COUNT {
            return Err(bad_line(format!(
                "address vector has {} levels, expected {}",
                addr_vec.len(),
                Level::COUNT
            )));
        }

        trace.push(TraceEntry { is_write, addr_vec });
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
