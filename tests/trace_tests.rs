//! Integration tests for the trace frontends.

use std::fs;
use std::path::PathBuf;

use dram_simulator::config::Config;
use dram_simulator::frontend::{Frontend, LoadStoreTrace, ReadWriteTrace};
use dram_simulator::memory_system::MemorySystem;

/// Writes a temporary trace file unique to the calling test.
fn write_trace(name: &str, content: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("dram_simulator_test_{}_{}", std::process::id(), name));
    fs::write(&path, content).unwrap();
    path
}

const TEST_CONFIG: &str = r#"
Frontend:
  impl: LoadStoreTrace
  clock_ratio: 8
  path: unused.trace
MemorySystem:
  clock_ratio: 3
  DRAM:
    org:
      preset: HBM2_8Gb
      channel: 1
    timing:
      preset: HBM2_2Gbps
  Controller:
    Scheduler:
      impl: FRFCFS
"#;

fn build_memsys() -> MemorySystem {
    let cfg = Config::from_yaml(TEST_CONFIG).unwrap();
    MemorySystem::new(&cfg.memory_system, 1).unwrap()
}

/// Tests load/store trace parsing with decimal and hex addresses.
#[test]
fn test_loadstore_trace_parses() {
    let path = write_trace("ls_ok", "LD 0x1000\nST 4096\n\nLD 0X2000\n");
    let frontend = LoadStoreTrace::new(&path, 8).unwrap();

    assert!(!frontend.is_finished());
    assert_eq!(frontend.clock_ratio(), 8);
    let block = frontend.stats_block();
    assert_eq!(
        block.get("trace_length"),
        Some(dram_simulator::stats::StatValue::Count(3))
    );
    fs::remove_file(path).ok();
}

/// Tests that a malformed load/store line is fatal and cites its line
/// number.
#[test]
fn test_loadstore_trace_rejects_bad_line() {
    let path = write_trace("ls_bad", "LD 0x1000\nLD\n");
    let err = LoadStoreTrace::new(&path, 8).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("line 2"), "got: {}", message);
    fs::remove_file(path).ok();
}

/// Tests that an unknown operation is fatal.
#[test]
fn test_loadstore_trace_rejects_bad_op() {
    let path = write_trace("ls_badop", "LD 0x1000\nXX 0x2000\n");
    let err = LoadStoreTrace::new(&path, 8).unwrap_err();
    assert!(err.to_string().contains("XX"));
    fs::remove_file(path).ok();
}

/// Tests that a missing trace file is a configuration error naming the
/// path.
#[test]
fn test_missing_trace_file() {
    let path = PathBuf::from("/nonexistent/trace.file");
    let err = LoadStoreTrace::new(&path, 8).unwrap_err();
    assert!(err.to_string().contains("trace.file"));
}

/// Tests that the load/store frontend admits every line exactly once
/// and then reports completion.
#[test]
fn test_loadstore_trace_drives_memory() {
    let path = write_trace("ls_drive", "LD 0x0\nST 0x40\nLD 0x80\nLD 0x40\n");
    let mut frontend = LoadStoreTrace::new(&path, 8).unwrap();
    let mut memory = build_memsys();

    let mut guard = 0;
    while !frontend.is_finished() {
        frontend.tick(&mut memory);
        memory.tick();
        guard += 1;
        assert!(guard < 10_000, "frontend never finished");
    }

    let stats = memory.controller(0).stats();
    assert_eq!(stats.num_read_reqs, 3);
    assert_eq!(stats.num_write_reqs, 1);
    fs::remove_file(path).ok();
}

/// Tests read/write vector trace parsing.
#[test]
fn test_readwrite_trace_parses() {
    let path = write_trace("rw_ok", "R 0,0,0,0,5,0\nW 0,0,0,1,7,8\nR 0,0,-1,-1,-1,-1\n");
    let frontend = ReadWriteTrace::new(&path, 8).unwrap();
    assert!(!frontend.is_finished());
    fs::remove_file(path).ok();
}

/// Tests that a short address vector is rejected with its line number.
#[test]
fn test_readwrite_trace_rejects_short_vector() {
    let path = write_trace("rw_short", "R 0,0,0,0,5,0\nW 0,1,2\n");
    let err = ReadWriteTrace::new(&path, 8).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("line 2"), "got: {}", message);
    assert!(message.contains("3"), "got: {}", message);
    fs::remove_file(path).ok();
}

/// Tests the resolved termination semantics: the vector trace finishes
/// once every line has been admitted.
#[test]
fn test_readwrite_trace_finishes() {
    let path = write_trace("rw_drive", "R 0,0,0,0,5,0\nR 0,0,0,0,5,8\nW 0,1,2,3,9,0\n");
    let mut frontend = ReadWriteTrace::new(&path, 8).unwrap();
    let mut memory = build_memsys();

    let mut guard = 0;
    while !frontend.is_finished() {
        frontend.tick(&mut memory);
        memory.tick();
        guard += 1;
        assert!(guard < 10_000, "frontend never finished");
    }

    let stats = memory.controller(0).stats();
    assert_eq!(stats.num_read_reqs + stats.num_write_reqs, 3);
    fs::remove_file(path).ok();
}

/// An empty trace is rejected outright.
#[test]
fn test_empty_trace_rejected() {
    let path = write_trace("ls_empty", "\n\n");
    assert!(LoadStoreTrace::new(&path, 8).is_err());
    fs::remove_file(path).ok();
}

/// Trace frontends do not accept external requests.
#[test]
fn test_external_hook_defaults_to_false() {
    let path = write_trace("ls_hook", "LD 0x0\n");
    let mut frontend = LoadStoreTrace::new(&path, 8).unwrap();
    let mut memory = build_memsys();

    let accepted = frontend.receive_external_request(
        dram_simulator::common::request::RequestType::Read,
        0x40,
        0,
        Box::new(|_| {}),
        &mut memory,
    );
    assert!(!accepted);
    fs::remove_file(path).ok();
}
