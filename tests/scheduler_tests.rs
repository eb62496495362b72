//! Integration tests for the scheduling policies.

use dram_simulator::common::request::{Request, RequestBuffer, RequestType};
use dram_simulator::controller::scheduler::{
    BudgetAware, FrFcfs, SchedContext, Scheduler, SCRATCH_FITS, SCRATCH_READY,
};
use dram_simulator::dram::{Command, DeviceSpec, Dram, OrgPreset, TimingPreset};

fn build_dram() -> Dram {
    Dram::new(DeviceSpec::build(
        OrgPreset::Hbm2_8Gb,
        TimingPreset::Hbm2_2Gbps,
        1,
    ))
}

fn tick_to(dram: &mut Dram, clk: u64) {
    while dram.clk() < clk {
        dram.tick();
    }
}

fn read_request(bg: i32, bank: i32, row: i32, arrive: u64) -> Request {
    let mut req = Request::with_vec(vec![0, 0, bg, bank, row, 0], RequestType::Read);
    req.final_command = Command::Rd;
    req.command = Command::Rd;
    req.arrive = arrive;
    req
}

fn ctx(clk: u64, next_maintenance: Option<u64>) -> SchedContext {
    SchedContext {
        clk,
        next_maintenance,
    }
}

/// An empty buffer yields no candidate.
#[test]
fn test_empty_buffer() {
    let dram = build_dram();
    let mut buffer = RequestBuffer::new(8);
    assert_eq!(FrFcfs.best_request(&mut buffer, &dram, &ctx(1, None)), None);
}

/// Readiness dominates arrival order under FR-FCFS.
#[test]
fn test_frfcfs_ready_dominates() {
    let mut dram = build_dram();
    tick_to(&mut dram, 1);
    // Open row 5 of bank (0, 0); its column access is gated by tRCD
    // while a fresh activate elsewhere is ready sooner.
    dram.issue_command(Command::Act, &vec![0, 0, 0, 0, 5, 0]);
    tick_to(&mut dram, 6);

    let mut buffer = RequestBuffer::new(8);
    buffer.enqueue(read_request(0, 0, 5, 1)).unwrap();
    buffer.enqueue(read_request(1, 0, 3, 2)).unwrap();

    let best = FrFcfs.best_request(&mut buffer, &dram, &ctx(6, None));
    assert_eq!(best, Some(1));

    // The scheduler resolved each request's next command on the way.
    assert_eq!(buffer.get(0).unwrap().command, Command::Rd);
    assert_eq!(buffer.get(1).unwrap().command, Command::Act);
}

/// Equal readiness falls back to earliest arrival.
#[test]
fn test_frfcfs_fcfs_tiebreak() {
    let mut dram = build_dram();
    tick_to(&mut dram, 50);

    let mut buffer = RequestBuffer::new(8);
    buffer.enqueue(read_request(0, 0, 5, 10)).unwrap();
    buffer.enqueue(read_request(1, 0, 3, 5)).unwrap();
    buffer.enqueue(read_request(2, 0, 4, 10)).unwrap();

    let best = FrFcfs.best_request(&mut buffer, &dram, &ctx(50, None));
    assert_eq!(best, Some(1));
}

/// Remaining ties keep the earlier buffer position.
#[test]
fn test_frfcfs_position_tiebreak() {
    let mut dram = build_dram();
    tick_to(&mut dram, 50);

    let mut buffer = RequestBuffer::new(8);
    buffer.enqueue(read_request(0, 0, 5, 10)).unwrap();
    buffer.enqueue(read_request(1, 0, 3, 10)).unwrap();

    let best = FrFcfs.best_request(&mut buffer, &dram, &ctx(50, None));
    assert_eq!(best, Some(0));
}

/// A request that fits before the next maintenance event outranks an
/// earlier, ready one that does not.
#[test]
fn test_budget_aware_fits_dominates() {
    let mut dram = build_dram();
    tick_to(&mut dram, 1);
    dram.issue_command(Command::Act, &vec![0, 0, 1, 0, 3, 0]);
    tick_to(&mut dram, 20);

    let mut buffer = RequestBuffer::new(8);
    // Cold bank: needs an activate first, too slow before maintenance.
    buffer.enqueue(read_request(0, 0, 5, 1)).unwrap();
    // Open row: a single column access fits.
    buffer.enqueue(read_request(1, 0, 3, 2)).unwrap();

    let best = BudgetAware.best_request(&mut buffer, &dram, &ctx(20, Some(25)));
    assert_eq!(best, Some(1));

    let slow = buffer.get(0).unwrap();
    let fast = buffer.get(1).unwrap();
    assert_eq!(slow.scratchpad[SCRATCH_FITS], 0);
    assert_eq!(slow.scratchpad[SCRATCH_READY], 1);
    assert_eq!(fast.scratchpad[SCRATCH_FITS], 1);
    assert_eq!(fast.scratchpad[SCRATCH_READY], 1);
}

/// Without a maintenance deadline every request fits and the policy
/// degenerates to FR-FCFS.
#[test]
fn test_budget_aware_without_deadline() {
    let mut dram = build_dram();
    tick_to(&mut dram, 50);

    let mut buffer = RequestBuffer::new(8);
    buffer.enqueue(read_request(0, 0, 5, 10)).unwrap();
    buffer.enqueue(read_request(1, 0, 3, 5)).unwrap();

    let best = BudgetAware.best_request(&mut buffer, &dram, &ctx(50, None));
    assert_eq!(best, Some(1));
}
