//! Integration tests for the DRAM device tree and timing engine.

use dram_simulator::common::addr::UNMAPPED;
use dram_simulator::dram::{Command, DeviceSpec, Dram, NodeState, OrgPreset, TimingPreset};

fn build_dram() -> Dram {
    Dram::new(DeviceSpec::build(
        OrgPreset::Hbm2_8Gb,
        TimingPreset::Hbm2_2Gbps,
        1,
    ))
}

/// Advances the device clock to the given cycle.
fn tick_to(dram: &mut Dram, clk: u64) {
    while dram.clk() < clk {
        dram.tick();
    }
}

fn addr(pch: i32, bg: i32, bank: i32, row: i32, col: i32) -> Vec<i32> {
    vec![0, pch, bg, bank, row, col]
}

/// Tests that an activate opens the addressed row in the bank.
#[test]
fn test_act_opens_row() {
    let mut dram = build_dram();
    tick_to(&mut dram, 1);

    let target = addr(0, 0, 0, 5, 0);
    assert_eq!(dram.get_preq_command(Command::Rd, &target), Command::Act);
    assert!(!dram.check_node_open(Command::Rd, &target));

    dram.issue_command(Command::Act, &target);

    assert_eq!(dram.row_state_of(&target), Some(NodeState::Opened));
    assert_eq!(dram.bank_state_of(&target), Some(NodeState::Opened));
    assert!(dram.check_node_open(Command::Rd, &target));
    assert!(dram.check_rowbuffer_hit(Command::Rd, &target));
    assert_eq!(dram.get_preq_command(Command::Rd, &target), Command::Rd);
    assert_eq!(dram.command_count(Command::Act), 1);
}

/// Tests that a precharge closes the open row.
#[test]
fn test_pre_closes_row() {
    let mut dram = build_dram();
    tick_to(&mut dram, 1);

    let target = addr(0, 0, 0, 5, 0);
    dram.issue_command(Command::Act, &target);
    tick_to(&mut dram, 60);
    dram.issue_command(Command::Pre, &target);

    assert_eq!(dram.row_state_of(&target), None);
    assert_eq!(dram.bank_state_of(&target), Some(NodeState::Closed));
    assert!(!dram.check_node_open(Command::Rd, &target));
    assert_eq!(dram.get_preq_command(Command::Rd, &target), Command::Act);
}

/// Tests that a conflicting row resolves to a precharge prerequisite.
#[test]
fn test_row_conflict_requires_precharge() {
    let mut dram = build_dram();
    tick_to(&mut dram, 1);

    dram.issue_command(Command::Act, &addr(0, 0, 0, 5, 0));

    let other_row = addr(0, 0, 0, 7, 0);
    assert!(!dram.check_rowbuffer_hit(Command::Rd, &other_row));
    assert!(dram.check_node_open(Command::Rd, &other_row));
    assert_eq!(dram.get_preq_command(Command::Rd, &other_row), Command::Pre);
}

/// Tests the activate-to-read delay (tRCD).
#[test]
fn test_rcd_gates_column_access() {
    let mut dram = build_dram();
    let n_rcd = dram.spec().timing.n_rcd;
    tick_to(&mut dram, 1);

    let target = addr(0, 0, 0, 5, 0);
    dram.issue_command(Command::Act, &target);

    tick_to(&mut dram, n_rcd);
    assert!(!dram.check_ready(Command::Rd, &target));
    tick_to(&mut dram, 1 + n_rcd);
    assert!(dram.check_ready(Command::Rd, &target));
}

/// Tests activate spacing: tRRDS across bank groups, tRRDL inside one,
/// and the full row cycle tRC for the same bank.
#[test]
fn test_act_to_act_spacing() {
    let mut dram = build_dram();
    let t = dram.spec().timing;
    tick_to(&mut dram, 1);

    dram.issue_command(Command::Act, &addr(0, 0, 0, 5, 0));

    tick_to(&mut dram, t.n_rrd_s);
    assert!(!dram.check_ready(Command::Act, &addr(0, 1, 0, 7, 0)));
    tick_to(&mut dram, 1 + t.n_rrd_s);
    assert!(dram.check_ready(Command::Act, &addr(0, 1, 0, 7, 0)));
    assert!(!dram.check_ready(Command::Act, &addr(0, 0, 1, 7, 0)));

    tick_to(&mut dram, 1 + t.n_rrd_l);
    assert!(dram.check_ready(Command::Act, &addr(0, 0, 1, 7, 0)));
    assert!(!dram.check_ready(Command::Act, &addr(0, 0, 0, 7, 0)));

    tick_to(&mut dram, 1 + t.n_rc);
    assert!(dram.check_ready(Command::Act, &addr(0, 0, 0, 7, 0)));
}

/// Tests the four-activate window: the fifth activate in a pseudo
/// channel waits on the oldest of the last four.
#[test]
fn test_four_activate_window() {
    let mut dram = build_dram();
    let t = dram.spec().timing;
    assert!(t.n_faw > 4 * t.n_rrd_s);

    let mut clk = 1;
    for bg in 0..4 {
        tick_to(&mut dram, clk);
        let target = addr(0, bg, 0, 5, 0);
        assert!(dram.check_ready(Command::Act, &target));
        dram.issue_command(Command::Act, &target);
        clk += t.n_rrd_s;
    }

    // The fifth activate is gated by tFAW from the first, not tRRDS
    // from the fourth.
    let fifth = addr(0, 0, 1, 5, 0);
    tick_to(&mut dram, clk);
    assert!(!dram.check_ready(Command::Act, &fifth));
    tick_to(&mut dram, 1 + t.n_faw);
    assert!(dram.check_ready(Command::Act, &fifth));
}

/// Tests that sibling pseudo channels pay the bus switch penalty.
#[test]
fn test_sibling_pseudochannel_penalty() {
    let mut dram = build_dram();
    let t = dram.spec().timing;
    tick_to(&mut dram, 1);

    dram.issue_command(Command::Rd, &addr(0, 0, 0, 5, 0));

    let sibling = addr(1, 0, 0, 5, 0);
    assert!(!dram.check_ready(Command::Rd, &sibling));
    tick_to(&mut dram, 1 + t.n_psch);
    assert!(dram.check_ready(Command::Rd, &sibling));
}

/// Tests column-to-column spacing: the long delay inside a bank group,
/// the short delay across bank groups.
#[test]
fn test_column_spacing_short_and_long() {
    let mut dram = build_dram();
    let t = dram.spec().timing;
    assert!(t.n_ccd_l > t.n_ccd_s);
    tick_to(&mut dram, 1);

    dram.issue_command(Command::Rd, &addr(0, 0, 0, 5, 0));

    tick_to(&mut dram, 1 + t.n_ccd_s);
    // Different bank group: only tCCDS.
    assert!(dram.check_ready(Command::Rd, &addr(0, 1, 0, 5, 0)));
    // Same bank group: still waiting out tCCDL.
    assert!(!dram.check_ready(Command::Rd, &addr(0, 0, 1, 5, 0)));
    tick_to(&mut dram, 1 + t.n_ccd_l);
    assert!(dram.check_ready(Command::Rd, &addr(0, 0, 1, 5, 0)));
}

/// Tests the all-bank refresh flow: precharge-all prerequisite,
/// broadcast readiness, and the deferred end of refresh.
#[test]
fn test_refresh_lifecycle() {
    let mut dram = build_dram();
    let t = dram.spec().timing;
    tick_to(&mut dram, 1);

    let refresh_target = vec![0, 0, UNMAPPED, UNMAPPED, UNMAPPED, UNMAPPED];

    // A bank with an open row forces a precharge-all first.
    dram.issue_command(Command::Act, &addr(0, 0, 0, 5, 0));
    assert_eq!(
        dram.get_preq_command(Command::RefAb, &refresh_target),
        Command::PreA
    );

    let prea_ready_at = 1 + t.n_ras;
    tick_to(&mut dram, prea_ready_at);
    assert!(dram.check_ready(Command::PreA, &refresh_target));
    dram.issue_command(Command::PreA, &refresh_target);
    assert_eq!(
        dram.bank_state_of(&addr(0, 0, 0, 5, 0)),
        Some(NodeState::Closed)
    );
    assert_eq!(
        dram.get_preq_command(Command::RefAb, &refresh_target),
        Command::RefAb
    );

    let ref_ready_at = prea_ready_at + t.n_rp;
    tick_to(&mut dram, ref_ready_at);
    assert!(dram.check_ready(Command::RefAb, &refresh_target));
    dram.issue_command(Command::RefAb, &refresh_target);

    // Every bank of the pseudo channel refreshes; the other pseudo
    // channel is untouched.
    assert_eq!(
        dram.bank_state_of(&addr(0, 0, 0, 5, 0)),
        Some(NodeState::Refreshing)
    );
    assert_eq!(
        dram.bank_state_of(&addr(0, 3, 3, 5, 0)),
        Some(NodeState::Refreshing)
    );
    assert_eq!(
        dram.bank_state_of(&addr(1, 0, 0, 5, 0)),
        Some(NodeState::Closed)
    );

    // Activates are timing-blocked until tRFC elapses, and the banks
    // return to closed through the deferred action.
    assert!(!dram.check_ready(Command::Act, &addr(0, 2, 1, 9, 0)));
    tick_to(&mut dram, ref_ready_at + t.n_rfc);
    assert_eq!(
        dram.bank_state_of(&addr(0, 0, 0, 5, 0)),
        Some(NodeState::Closed)
    );
    assert!(dram.check_ready(Command::Act, &addr(0, 2, 1, 9, 0)));
}

/// Tests that broadcast readiness requires every descendant ready.
#[test]
fn test_broadcast_ready_requires_all_children() {
    let mut dram = build_dram();
    tick_to(&mut dram, 1);

    let refresh_target = vec![0, 0, UNMAPPED, UNMAPPED, UNMAPPED, UNMAPPED];
    assert!(dram.check_ready(Command::RefAb, &refresh_target));

    // Activating any bank in the pseudo channel delays the refresh by tRC.
    dram.issue_command(Command::Act, &addr(0, 2, 3, 11, 0));
    assert!(!dram.check_ready(Command::RefAb, &refresh_target));
    let target_tick = 1 + dram.spec().timing.n_rc;
    tick_to(&mut dram, target_tick);
    assert!(dram.check_ready(Command::RefAb, &refresh_target));
}

/// Tests that timing safety holds along an activate-read-precharge
/// sequence driven purely by readiness queries.
#[test]
fn test_timing_safety_on_command_sequence() {
    let mut dram = build_dram();
    let target = addr(0, 0, 0, 5, 0);

    let mut issued = Vec::new();
    let sequence = [Command::Act, Command::Rd, Command::Pre, Command::Act];
    let mut next = 0;

    for _ in 0..400 {
        dram.tick();
        if next < sequence.len() && dram.check_ready(sequence[next], &target) {
            dram.issue_command(sequence[next], &target);
            issued.push((sequence[next], dram.clk()));
            next += 1;
        }
    }
    assert_eq!(next, sequence.len());

    let t = dram.spec().timing;
    let clk_of = |cmd_idx: usize| issued[cmd_idx].1;
    assert!(clk_of(1) >= clk_of(0) + t.n_rcd, "RD violated tRCD");
    assert!(clk_of(2) >= clk_of(0) + t.n_ras, "PRE violated tRAS");
    assert!(clk_of(2) >= clk_of(1) + t.n_rtp, "PRE violated tRTP");
    assert!(clk_of(3) >= clk_of(2) + t.n_rp, "ACT violated tRP");
    assert!(clk_of(3) >= clk_of(0) + t.n_rc, "ACT violated tRC");
}
