//! Device Tree Nodes.
//!
//! The device hierarchy is stored as a flat arena of nodes linked by
//! indices; children are owned by position, the parent link is a plain
//! back-index. Rows are not materialized: bank nodes track row state in
//! a map. The tree-walking algorithms in this module implement the state
//! machine, the sliding-window timing engine, and the query surface the
//! controller schedules against.

use std::collections::{HashMap, VecDeque};

use crate::common::addr::{AddrVec, UNMAPPED};
use crate::dram::spec::{Command, DeviceSpec, Level, NodeState, PreqKind};

/// One node of the device hierarchy.
pub struct DeviceNode {
    pub level: Level,
    pub node_id: i32,
    pub parent: Option<usize>,
    pub children: Vec<usize>,

    pub state: NodeState,

    /// Earliest cycle each command may issue at this node.
    ready: Vec<u64>,
    /// Bounded history of issue cycles per command; the deque length is
    /// the largest window any constraint declares for the command at this
    /// level, and `None` marks a slot with no recorded issue yet.
    history: Vec<VecDeque<Option<u64>>>,

    /// Row-buffer tracking for bank nodes, keyed by row index.
    pub row_state: HashMap<i32, NodeState>,
}

impl DeviceNode {
    pub fn new(spec: &DeviceSpec, level: Level, node_id: i32, parent: Option<usize>) -> DeviceNode {
        let mut history = Vec::with_capacity(Command::COUNT);
        for cmd in Command::ALL {
            let window = spec.max_window(level.idx(), cmd);
            let mut deque = VecDeque::with_capacity(window);
            deque.resize(window, None);
            history.push(deque);
        }

        DeviceNode {
            level,
            node_id,
            parent,
            children: Vec::new(),
            state: spec.init_states[level.idx()],
            ready: vec![0; Command::COUNT],
            history,
            row_state: HashMap::new(),
        }
    }

    /// Earliest cycle `cmd` may issue at this node.
    pub fn ready_at(&self, cmd: Command) -> u64 {
        self.ready[cmd.idx()]
    }

    fn constrain(&mut self, cmd: Command, earliest: u64) {
        let slot = &mut self.ready[cmd.idx()];
        *slot = (*slot).max(earliest);
    }

    /// Records an issue of `cmd`, evicting the oldest history entry.
    fn record_issue(&mut self, cmd: Command, clk: u64) {
        let history = &mut self.history[cmd.idx()];
        if !history.is_empty() {
            history.pop_back();
            history.push_front(Some(clk));
        }
    }

    /// The `window`-th most recent recorded issue of `cmd`, if any.
    fn past_issue(&self, cmd: Command, window: usize) -> Option<u64> {
        self.history[cmd.idx()][window - 1]
    }
}

/// Walks the tree from `idx` applying the state-transition actions of
/// `cmd`, recursing to the command's scope and broadcasting over
/// unspecified levels. Returns the refresh groups whose completion must
/// be scheduled as a deferred action.
pub fn update_states(
    spec: &DeviceSpec,
    nodes: &mut [DeviceNode],
    idx: usize,
    cmd: Command,
    addr_vec: &AddrVec,
    refreshed: &mut Vec<usize>,
) {
    let level = nodes[idx].level;
    let li = level.idx();

    if let Some(action) = spec.actions[li][cmd.idx()] {
        apply_action(nodes, idx, action, addr_vec, refreshed);
    }

    if level == spec.scope(cmd) || nodes[idx].children.is_empty() {
        return;
    }

    let child_id = addr_vec[li + 1];
    if child_id == UNMAPPED {
        for i in 0..nodes[idx].children.len() {
            let child = nodes[idx].children[i];
            update_states(spec, nodes, child, cmd, addr_vec, refreshed);
        }
    } else {
        let child = nodes[idx].children[child_id as usize];
        update_states(spec, nodes, child, cmd, addr_vec, refreshed);
    }
}

fn apply_action(
    nodes: &mut [DeviceNode],
    idx: usize,
    action: crate::dram::spec::ActionKind,
    addr_vec: &AddrVec,
    refreshed: &mut Vec<usize>,
) {
    use crate::dram::spec::ActionKind;

    match action {
        ActionKind::OpenRow => {
            let row = addr_vec[Level::Row.idx()];
            let node = &mut nodes[idx];
            node.state = NodeState::Opened;
            node.row_state.insert(row, NodeState::Opened);
        }
        ActionKind::CloseRow => {
            let node = &mut nodes[idx];
            node.state = NodeState::Closed;
            node.row_state.clear();
        }
        ActionKind::PrechargeAll => {
            for bank in collect_banks(nodes, idx) {
                let node = &mut nodes[bank];
                node.state = NodeState::Closed;
                node.row_state.clear();
            }
        }
        ActionKind::RefreshAll => {
            for bank in collect_banks(nodes, idx) {
                let node = &mut nodes[bank];
                node.state = NodeState::Refreshing;
                node.row_state.clear();
            }
            refreshed.push(idx);
        }
    }
}

/// Collects every bank-level node in the subtree rooted at `idx`.
pub fn collect_banks(nodes: &[DeviceNode], idx: usize) -> Vec<usize> {
    let mut banks = Vec::new();
    let mut stack = vec![idx];
    while let Some(n) = stack.pop() {
        if nodes[n].level == Level::Bank {
            banks.push(n);
        } else {
            stack.extend(nodes[n].children.iter().copied());
        }
    }
    banks
}

/// Propagates the timing constraints of an issued command through the
/// subtree rooted at `idx`.
///
/// A node that is not the addressed sibling at its level takes only the
/// sibling-flagged edges and stops; the addressed path records the issue
/// in its history, applies the windowed edges, and recurses into every
/// child unconditionally. Competing constraints on the same command
/// combine by maximum.
pub fn update_timing(
    spec: &DeviceSpec,
    nodes: &mut [DeviceNode],
    idx: usize,
    cmd: Command,
    addr_vec: &AddrVec,
    clk: u64,
) {
    let li = nodes[idx].level.idx();

    if nodes[idx].node_id != addr_vec[li] && addr_vec[li] != UNMAPPED {
        for edge in &spec.timing_cons[li][cmd.idx()] {
            if !edge.sibling {
                continue;
            }
            nodes[idx].constrain(edge.to_cmd, clk + edge.value);
        }
        return;
    }

    nodes[idx].record_issue(cmd, clk);
    for edge in &spec.timing_cons[li][cmd.idx()] {
        if edge.sibling {
            continue;
        }
        // A slot that never saw an issue produces no constraint.
        if let Some(past) = nodes[idx].past_issue(cmd, edge.window) {
            nodes[idx].constrain(edge.to_cmd, past + edge.value);
        }
    }

    for i in 0..nodes[idx].children.len() {
        let child = nodes[idx].children[i];
        update_timing(spec, nodes, child, cmd, addr_vec, clk);
    }
}

/// Resolves the next command required before `cmd` can be issued along
/// `addr_vec`. The shallowest level with a defined prerequisite wins; if
/// no level demands one, `cmd` itself is returned.
pub fn get_preq_command(
    spec: &DeviceSpec,
    nodes: &[DeviceNode],
    idx: usize,
    cmd: Command,
    addr_vec: &AddrVec,
) -> Command {
    let li = nodes[idx].level.idx();

    if let Some(kind) = spec.preqs[li][cmd.idx()] {
        return resolve_preq(nodes, idx, kind, cmd, addr_vec);
    }

    if nodes[idx].children.is_empty() {
        return cmd;
    }

    let child_id = addr_vec[li + 1];
    assert!(
        child_id != UNMAPPED,
        "prerequisite resolution reached an unspecified {} index",
        Level::ALL[li + 1].name()
    );
    let child = nodes[idx].children[child_id as usize];
    get_preq_command(spec, nodes, child, cmd, addr_vec)
}

fn resolve_preq(
    nodes: &[DeviceNode],
    idx: usize,
    kind: PreqKind,
    cmd: Command,
    addr_vec: &AddrVec,
) -> Command {
    match kind {
        PreqKind::RowAccess => {
            let node = &nodes[idx];
            match node.state {
                NodeState::Closed | NodeState::Refreshing => Command::Act,
                NodeState::Opened => {
                    let row = addr_vec[Level::Row.idx()];
                    if node.row_state.contains_key(&row) {
                        cmd
                    } else {
                        Command::Pre
                    }
                }
            }
        }
        PreqKind::AllBanksClosed => {
            let any_open = collect_banks(nodes, idx)
                .into_iter()
                .any(|bank| nodes[bank].state == NodeState::Opened);
            if any_open {
                Command::PreA
            } else {
                cmd
            }
        }
    }
}

/// Checks whether `cmd` may issue at `clk` at every node along the
/// address path. Broadcast descents require all children ready.
pub fn check_ready(
    spec: &DeviceSpec,
    nodes: &[DeviceNode],
    idx: usize,
    cmd: Command,
    addr_vec: &AddrVec,
    clk: u64,
) -> bool {
    if clk < nodes[idx].ready_at(cmd) {
        return false;
    }

    let level = nodes[idx].level;
    if level == spec.scope(cmd) || nodes[idx].children.is_empty() {
        return true;
    }

    let child_id = addr_vec[level.idx() + 1];
    if child_id == UNMAPPED {
        nodes[idx]
            .children
            .iter()
            .all(|&child| check_ready(spec, nodes, child, cmd, addr_vec, clk))
    } else {
        let child = nodes[idx].children[child_id as usize];
        check_ready(spec, nodes, child, cmd, addr_vec, clk)
    }
}

/// Descends along `addr_vec` until a level defines a row-hit predicate
/// for `cmd`; a path that never defines one reports no hit.
pub fn check_rowbuffer_hit(
    spec: &DeviceSpec,
    nodes: &[DeviceNode],
    idx: usize,
    cmd: Command,
    addr_vec: &AddrVec,
) -> bool {
    let li = nodes[idx].level.idx();

    if spec.rowhits[li][cmd.idx()] {
        let node = &nodes[idx];
        let row = addr_vec[Level::Row.idx()];
        return node.state == NodeState::Opened && node.row_state.contains_key(&row);
    }

    if nodes[idx].children.is_empty() {
        return false;
    }

    let child_id = addr_vec[li + 1];
    if child_id == UNMAPPED {
        return false;
    }
    let child = nodes[idx].children[child_id as usize];
    check_rowbuffer_hit(spec, nodes, child, cmd, addr_vec)
}

/// Like [`check_rowbuffer_hit`], but only asks whether the addressed
/// node has any row open.
pub fn check_node_open(
    spec: &DeviceSpec,
    nodes: &[DeviceNode],
    idx: usize,
    cmd: Command,
    addr_vec: &AddrVec,
) -> bool {
    let li = nodes[idx].level.idx();

    if spec.rowopens[li][cmd.idx()] {
        return nodes[idx].state == NodeState::Opened;
    }

    if nodes[idx].children.is_empty() {
        return false;
    }

    let child_id = addr_vec[li + 1];
    if child_id == UNMAPPED {
        return false;
    }
    let child = nodes[idx].children[child_id as usize];
    check_node_open(spec, nodes, child, cmd, addr_vec)
}
