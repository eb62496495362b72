//! DRAM Device Model.
//!
//! `Dram` owns the device specification, the node arena, the deferred
//! future-action queue, and the per-command issue counters. It exposes
//! the five-function device contract the controller schedules against:
//! issue, prerequisite resolution, readiness, row-buffer hit, and
//! node-open queries.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::common::addr::AddrVec;
use crate::dram::node::{self, DeviceNode};
use crate::dram::spec::{Command, DeviceSpec, Level, NodeState};
use crate::stats::{StatBlock, StatValue};

/// A state change that takes effect at a future cycle, ordered by its
/// trigger cycle in a min-heap.
#[derive(Debug, PartialEq, Eq)]
struct FutureAction {
    trigger: u64,
    kind: FutureKind,
    /// Arena index of the node the action applies to.
    node: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum FutureKind {
    /// Return the banks below the node from `Refreshing` to `Closed`.
    EndRefresh,
}

impl Ord for FutureAction {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.trigger.cmp(&other.trigger)
    }
}

impl PartialOrd for FutureAction {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// The hierarchical DRAM device.
pub struct Dram {
    spec: DeviceSpec,
    nodes: Vec<DeviceNode>,
    /// One root node per channel.
    roots: Vec<usize>,

    clk: u64,
    future_actions: BinaryHeap<Reverse<FutureAction>>,

    s_cmd_counts: [u64; Command::COUNT],
}

impl Dram {
    /// Constructs the device tree for the given specification. Nodes are
    /// created down to the bank level; rows are tracked lazily.
    pub fn new(spec: DeviceSpec) -> Dram {
        let mut nodes = Vec::new();
        let mut roots = Vec::new();
        for ch in 0..spec.org.level_size(Level::Channel) {
            let root = Self::build_node(&mut nodes, &spec, None, 0, ch as i32);
            roots.push(root);
        }

        Dram {
            spec,
            nodes,
            roots,
            clk: 0,
            future_actions: BinaryHeap::new(),
            s_cmd_counts: [0; Command::COUNT],
        }
    }

    fn build_node(
        nodes: &mut Vec<DeviceNode>,
        spec: &DeviceSpec,
        parent: Option<usize>,
        level_idx: usize,
        node_id: i32,
    ) -> usize {
        let idx = nodes.len();
        nodes.push(DeviceNode::new(spec, Level::ALL[level_idx], node_id, parent));

        let next = level_idx + 1;
        if next == Level::Row.idx() {
            return idx;
        }
        for i in 0..spec.org.count[next] {
            let child = Self::build_node(nodes, spec, Some(idx), next, i as i32);
            nodes[idx].children.push(child);
        }
        idx
    }

    pub fn spec(&self) -> &DeviceSpec {
        &self.spec
    }

    pub fn clk(&self) -> u64 {
        self.clk
    }

    pub fn read_latency(&self) -> u64 {
        self.spec.read_latency
    }

    /// Advances the device clock and applies every deferred action whose
    /// trigger cycle has been reached.
    pub fn tick(&mut self) {
        self.clk += 1;
        while let Some(Reverse(next)) = self.future_actions.peek() {
            if next.trigger > self.clk {
                break;
            }
            let Reverse(action) = self.future_actions.pop().unwrap();
            match action.kind {
                FutureKind::EndRefresh => {
                    for bank in node::collect_banks(&self.nodes, action.node) {
                        if self.nodes[bank].state == NodeState::Refreshing {
                            self.nodes[bank].state = NodeState::Closed;
                        }
                    }
                }
            }
        }
    }

    /// Issues `cmd` at `addr_vec`: updates node states on the addressed
    /// channel, propagates timing constraints through every channel tree,
    /// and counts the issue.
    pub fn issue_command(&mut self, cmd: Command, addr_vec: &AddrVec) {
        let channel = addr_vec[Level::Channel.idx()] as usize;

        let mut refreshed = Vec::new();
        node::update_states(
            &self.spec,
            &mut self.nodes,
            self.roots[channel],
            cmd,
            addr_vec,
            &mut refreshed,
        );
        for pch in refreshed {
            self.future_actions.push(Reverse(FutureAction {
                trigger: self.clk + self.spec.timing.n_rfc,
                kind: FutureKind::EndRefresh,
                node: pch,
            }));
        }

        for i in 0..self.roots.len() {
            node::update_timing(&self.spec, &mut self.nodes, self.roots[i], cmd, addr_vec, self.clk);
        }

        self.s_cmd_counts[cmd.idx()] += 1;
    }

    /// Resolves the next command that must issue before `cmd` can, given
    /// the current row-buffer states along `addr_vec`.
    pub fn get_preq_command(&self, cmd: Command, addr_vec: &AddrVec) -> Command {
        let channel = addr_vec[Level::Channel.idx()] as usize;
        node::get_preq_command(&self.spec, &self.nodes, self.roots[channel], cmd, addr_vec)
    }

    /// Whether every node along the address path accepts `cmd` this cycle.
    pub fn check_ready(&self, cmd: Command, addr_vec: &AddrVec) -> bool {
        let channel = addr_vec[Level::Channel.idx()] as usize;
        node::check_ready(&self.spec, &self.nodes, self.roots[channel], cmd, addr_vec, self.clk)
    }

    /// Whether `cmd` would hit the currently open row.
    pub fn check_rowbuffer_hit(&self, cmd: Command, addr_vec: &AddrVec) -> bool {
        let channel = addr_vec[Level::Channel.idx()] as usize;
        node::check_rowbuffer_hit(&self.spec, &self.nodes, self.roots[channel], cmd, addr_vec)
    }

    /// Whether the addressed bank has any row open.
    pub fn check_node_open(&self, cmd: Command, addr_vec: &AddrVec) -> bool {
        let channel = addr_vec[Level::Channel.idx()] as usize;
        node::check_node_open(&self.spec, &self.nodes, self.roots[channel], cmd, addr_vec)
    }

    fn bank_index(&self, addr_vec: &AddrVec) -> Option<usize> {
        let mut idx = self.roots[addr_vec[Level::Channel.idx()] as usize];
        for level in [Level::PseudoChannel, Level::BankGroup, Level::Bank] {
            let child_id = addr_vec[level.idx()];
            if child_id < 0 {
                return None;
            }
            idx = self.nodes[idx].children[child_id as usize];
        }
        Some(idx)
    }

    /// The recorded state of the addressed row, if the bank tracks it.
    pub fn row_state_of(&self, addr_vec: &AddrVec) -> Option<NodeState> {
        let bank = self.bank_index(addr_vec)?;
        self.nodes[bank]
            .row_state
            .get(&addr_vec[Level::Row.idx()])
            .copied()
    }

    /// The state of the addressed bank node.
    pub fn bank_state_of(&self, addr_vec: &AddrVec) -> Option<NodeState> {
        self.bank_index(addr_vec).map(|bank| self.nodes[bank].state)
    }

    /// Total issues of `cmd` since construction.
    pub fn command_count(&self, cmd: Command) -> u64 {
        self.s_cmd_counts[cmd.idx()]
    }

    /// A coarse lower bound on the cycles needed to finish a request
    /// whose next command is `cmd`; used by budget-aware scheduling.
    pub fn estimate_completion_cycles(&self, cmd: Command, final_cmd: Command) -> u64 {
        let t = &self.spec.timing;
        if cmd == final_cmd {
            return t.n_bl;
        }
        match cmd {
            Command::Act => t.n_rcd + t.n_bl,
            Command::Pre | Command::PreA => t.n_rp + t.n_rcd + t.n_bl,
            _ => t.n_bl,
        }
    }

    pub fn stats(&self) -> StatBlock {
        let mut block = StatBlock::new("DRAM");
        for cmd in Command::ALL {
            block.push(
                format!("num_{}_commands", cmd.name()),
                StatValue::Count(self.s_cmd_counts[cmd.idx()]),
            );
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dram::spec::{OrgPreset, TimingPreset};

    #[test]
    fn tree_has_expected_shape() {
        let spec = DeviceSpec::build(OrgPreset::Hbm2_8Gb, TimingPreset::Hbm2_2Gbps, 2);
        let dram = Dram::new(spec);

        // 2 channels x (1 + 2 pch x (1 + 4 bg x (1 + 4 banks)))
        assert_eq!(dram.roots.len(), 2);
        assert_eq!(dram.nodes.len(), 2 * (1 + 2 * (1 + 4 * (1 + 4))));

        let banks = node::collect_banks(&dram.nodes, dram.roots[0]);
        assert_eq!(banks.len(), 2 * 4 * 4);
    }
}
