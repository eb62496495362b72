//! Device Specification.
//!
//! This module defines the static description of a DRAM device: the
//! organization hierarchy, the command set with scopes and metadata, the
//! node state machine inputs, and the timing constraints. A `DeviceSpec`
//! is immutable once built; the device tree and controller only read it.

use serde::Deserialize;

use crate::common::request::RequestType;

/// Levels of the device organization hierarchy, root first.
///
/// Rows are not materialized as tree nodes; bank nodes track row state
/// lazily in a map keyed by row index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Channel,
    PseudoChannel,
    BankGroup,
    Bank,
    Row,
    Column,
}

impl Level {
    pub const COUNT: usize = 6;

    pub const ALL: [Level; Level::COUNT] = [
        Level::Channel,
        Level::PseudoChannel,
        Level::BankGroup,
        Level::Bank,
        Level::Row,
        Level::Column,
    ];

    pub fn idx(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::Channel => "channel",
            Level::PseudoChannel => "pseudochannel",
            Level::BankGroup => "bankgroup",
            Level::Bank => "bank",
            Level::Row => "row",
            Level::Column => "column",
        }
    }
}

/// DRAM commands understood by the device model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Activate: open a row in a bank.
    Act,
    /// Precharge: close the open row of a bank.
    Pre,
    /// Precharge all banks of a pseudo channel.
    PreA,
    /// Column read.
    Rd,
    /// Column write.
    Wr,
    /// Column read with auto-precharge.
    RdA,
    /// Column write with auto-precharge.
    WrA,
    /// All-bank refresh.
    RefAb,
}

impl Command {
    pub const COUNT: usize = 8;

    pub const ALL: [Command; Command::COUNT] = [
        Command::Act,
        Command::Pre,
        Command::PreA,
        Command::Rd,
        Command::Wr,
        Command::RdA,
        Command::WrA,
        Command::RefAb,
    ];

    pub fn idx(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Act => "ACT",
            Command::Pre => "PRE",
            Command::PreA => "PREA",
            Command::Rd => "RD",
            Command::Wr => "WR",
            Command::RdA => "RDA",
            Command::WrA => "WRA",
            Command::RefAb => "REFab",
        }
    }
}

/// Per-command metadata consulted by the controller.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandMeta {
    /// Opens a row (ACT class).
    pub is_opening: bool,
    /// Closes one or more rows (PRE class, auto-precharge accesses).
    pub is_closing: bool,
    /// Transfers column data.
    pub is_accessing: bool,
    /// Refresh-class maintenance command.
    pub is_refreshing: bool,
}

/// State of a device node or of a tracked row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Closed,
    Opened,
    Refreshing,
}

/// State-transition behavior attached to a (level, command) pair.
#[derive(Clone, Copy, Debug)]
pub enum ActionKind {
    /// Open the addressed row in this bank.
    OpenRow,
    /// Close this bank's open row.
    CloseRow,
    /// Close every bank below this node.
    PrechargeAll,
    /// Mark every bank below this node as refreshing and schedule the
    /// deferred return to `Closed` after tRFC.
    RefreshAll,
}

/// Prerequisite resolution behavior attached to a (level, command) pair.
#[derive(Clone, Copy, Debug)]
pub enum PreqKind {
    /// Column access: require the target row open in this bank. Resolves
    /// to ACT when the bank is closed (or refreshing) and to PRE when a
    /// different row occupies the row buffer.
    RowAccess,
    /// Refresh: require every bank below this node closed. Resolves to
    /// PREA while any row is open, otherwise to the command itself.
    AllBanksClosed,
}

/// A single timing constraint edge.
///
/// Once this command issues at a node, the `window`-th most recent issue
/// of it constrains `to_cmd` at that node to wait at least `value`
/// cycles. Sibling edges constrain the node's siblings instead of the
/// node itself and do not propagate downward.
#[derive(Clone, Copy, Debug)]
pub struct TimingEdge {
    pub to_cmd: Command,
    pub window: usize,
    pub value: u64,
    pub sibling: bool,
}

/// Device organization: node counts per hierarchy level and I/O width.
#[derive(Clone, Copy, Debug)]
pub struct Organization {
    pub count: [usize; Level::COUNT],
    /// Data bus width of one channel in bits.
    pub dq: usize,
}

impl Organization {
    pub fn level_size(&self, level: Level) -> usize {
        self.count[level.idx()]
    }
}

/// Named organization presets.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum OrgPreset {
    /// 8 Gb die: 2 pseudo channels x 4 bank groups x 4 banks x 32768 rows.
    #[serde(rename = "HBM2_8Gb")]
    Hbm2_8Gb,
    /// 4 Gb die: half the rows of the 8 Gb part.
    #[serde(rename = "HBM2_4Gb")]
    Hbm2_4Gb,
}

/// Named timing presets.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum TimingPreset {
    #[serde(rename = "HBM2_2Gbps")]
    Hbm2_2Gbps,
}

/// Timing parameter values in memory-clock cycles.
#[derive(Clone, Copy, Debug)]
pub struct TimingVals {
    pub n_bl: u64,
    pub n_cl: u64,
    pub n_rcd: u64,
    pub n_rp: u64,
    pub n_ras: u64,
    pub n_rc: u64,
    pub n_ccd_s: u64,
    pub n_ccd_l: u64,
    pub n_rrd_s: u64,
    pub n_rrd_l: u64,
    pub n_wl: u64,
    pub n_wr: u64,
    pub n_wtr_s: u64,
    pub n_wtr_l: u64,
    pub n_rtp: u64,
    pub n_rtw: u64,
    pub n_faw: u64,
    pub n_rfc: u64,
    pub n_refi: u64,
    /// Bus switch penalty between sibling pseudo channels of a channel.
    pub n_psch: u64,
}

impl TimingVals {
    fn preset(preset: TimingPreset) -> TimingVals {
        match preset {
            TimingPreset::Hbm2_2Gbps => {
                let (n_bl, n_cl, n_wl) = (2, 14, 7);
                TimingVals {
                    n_bl,
                    n_cl,
                    n_rcd: 14,
                    n_rp: 14,
                    n_ras: 33,
                    n_rc: 47,
                    n_ccd_s: 2,
                    n_ccd_l: 4,
                    n_rrd_s: 4,
                    n_rrd_l: 6,
                    n_wl,
                    n_wr: 15,
                    n_wtr_s: 3,
                    n_wtr_l: 8,
                    n_rtp: 7,
                    n_rtw: n_cl + n_bl + 2 - n_wl,
                    n_faw: 30,
                    n_rfc: 220,
                    n_refi: 3900,
                    n_psch: 2,
                }
            }
        }
    }
}

type LevelCmdTable<T> = Vec<Vec<T>>;

/// The full static specification of a DRAM device.
///
/// Built once from the organization and timing presets; shared read-only
/// by the device tree, the controllers, and the schedulers.
pub struct DeviceSpec {
    pub org: Organization,
    pub timing: TimingVals,

    /// The deepest level each command addresses.
    pub scopes: [Level; Command::COUNT],
    pub meta: [CommandMeta; Command::COUNT],
    pub init_states: [NodeState; Level::COUNT],

    /// Timing edges indexed by `[level][command]`.
    pub timing_cons: LevelCmdTable<Vec<TimingEdge>>,

    pub actions: LevelCmdTable<Option<ActionKind>>,
    pub preqs: LevelCmdTable<Option<PreqKind>>,
    pub rowhits: LevelCmdTable<bool>,
    pub rowopens: LevelCmdTable<bool>,

    /// Cycles between issuing RD and receiving the data burst.
    pub read_latency: u64,
}

impl DeviceSpec {
    /// Builds the specification for the given presets and channel count.
    pub fn build(org: OrgPreset, timing: TimingPreset, channels: usize) -> DeviceSpec {
        let rows = match org {
            OrgPreset::Hbm2_8Gb => 32768,
            OrgPreset::Hbm2_4Gb => 16384,
        };
        let org = Organization {
            count: [channels, 2, 4, 4, rows, 64],
            dq: 64,
        };
        let t = TimingVals::preset(timing);

        let mut spec = DeviceSpec {
            org,
            timing: t,
            scopes: Self::build_scopes(),
            meta: Self::build_meta(),
            init_states: [NodeState::Closed; Level::COUNT],
            timing_cons: vec![vec![Vec::new(); Command::COUNT]; Level::COUNT],
            actions: vec![vec![None; Command::COUNT]; Level::COUNT],
            preqs: vec![vec![None; Command::COUNT]; Level::COUNT],
            rowhits: vec![vec![false; Command::COUNT]; Level::COUNT],
            rowopens: vec![vec![false; Command::COUNT]; Level::COUNT],
            read_latency: t.n_cl + t.n_bl,
        };

        spec.populate_timing_cons();
        spec.populate_behavior_tables();
        spec
    }

    fn build_scopes() -> [Level; Command::COUNT] {
        let mut scopes = [Level::Channel; Command::COUNT];
        scopes[Command::Act.idx()] = Level::Row;
        scopes[Command::Pre.idx()] = Level::Bank;
        scopes[Command::PreA.idx()] = Level::PseudoChannel;
        scopes[Command::Rd.idx()] = Level::Column;
        scopes[Command::Wr.idx()] = Level::Column;
        scopes[Command::RdA.idx()] = Level::Column;
        scopes[Command::WrA.idx()] = Level::Column;
        scopes[Command::RefAb.idx()] = Level::PseudoChannel;
        scopes
    }

    fn build_meta() -> [CommandMeta; Command::COUNT] {
        let mut meta = [CommandMeta::default(); Command::COUNT];
        meta[Command::Act.idx()].is_opening = true;
        meta[Command::Pre.idx()].is_closing = true;
        meta[Command::PreA.idx()].is_closing = true;
        for cmd in [Command::Rd, Command::Wr, Command::RdA, Command::WrA] {
            meta[cmd.idx()].is_accessing = true;
        }
        meta[Command::RdA.idx()].is_closing = true;
        meta[Command::WrA.idx()].is_closing = true;
        meta[Command::RefAb.idx()].is_refreshing = true;
        meta
    }

    fn populate_behavior_tables(&mut self) {
        let bank = Level::Bank.idx();
        let pch = Level::PseudoChannel.idx();

        self.actions[bank][Command::Act.idx()] = Some(ActionKind::OpenRow);
        self.actions[bank][Command::Pre.idx()] = Some(ActionKind::CloseRow);
        self.actions[bank][Command::RdA.idx()] = Some(ActionKind::CloseRow);
        self.actions[bank][Command::WrA.idx()] = Some(ActionKind::CloseRow);
        self.actions[pch][Command::PreA.idx()] = Some(ActionKind::PrechargeAll);
        self.actions[pch][Command::RefAb.idx()] = Some(ActionKind::RefreshAll);

        for cmd in [Command::Rd, Command::Wr, Command::RdA, Command::WrA] {
            self.preqs[bank][cmd.idx()] = Some(PreqKind::RowAccess);
            self.rowhits[bank][cmd.idx()] = true;
            self.rowopens[bank][cmd.idx()] = true;
        }
        self.preqs[pch][Command::RefAb.idx()] = Some(PreqKind::AllBanksClosed);
    }

    fn populate_timing_cons(&mut self) {
        const RDS: [Command; 2] = [Command::Rd, Command::RdA];
        const WRS: [Command; 2] = [Command::Wr, Command::WrA];
        let t = self.timing;

        let mut add = |level: Level, from: Command, to: Command, window: usize, value: u64, sibling: bool| {
            self.timing_cons[level.idx()][from.idx()].push(TimingEdge {
                to_cmd: to,
                window,
                value,
                sibling,
            });
        };

        // Pseudo channel: shared data bus, activation windows, refresh.
        for from in RDS {
            for to in RDS {
                add(Level::PseudoChannel, from, to, 1, t.n_ccd_s, false);
            }
            for to in WRS {
                add(Level::PseudoChannel, from, to, 1, t.n_rtw, false);
            }
            add(Level::PseudoChannel, from, Command::PreA, 1, t.n_rtp, false);
        }
        for from in WRS {
            for to in WRS {
                add(Level::PseudoChannel, from, to, 1, t.n_ccd_s, false);
            }
            for to in RDS {
                add(Level::PseudoChannel, from, to, 1, t.n_wl + t.n_bl + t.n_wtr_s, false);
            }
            add(Level::PseudoChannel, from, Command::PreA, 1, t.n_wl + t.n_bl + t.n_wr, false);
        }
        add(Level::PseudoChannel, Command::Act, Command::Act, 1, t.n_rrd_s, false);
        add(Level::PseudoChannel, Command::Act, Command::Act, 4, t.n_faw, false);
        add(Level::PseudoChannel, Command::Act, Command::PreA, 1, t.n_ras, false);
        add(Level::PseudoChannel, Command::Act, Command::RefAb, 1, t.n_rc, false);
        add(Level::PseudoChannel, Command::Pre, Command::RefAb, 1, t.n_rp, false);
        add(Level::PseudoChannel, Command::PreA, Command::Act, 1, t.n_rp, false);
        add(Level::PseudoChannel, Command::PreA, Command::RefAb, 1, t.n_rp, false);
        add(Level::PseudoChannel, Command::RefAb, Command::Act, 1, t.n_rfc, false);
        add(Level::PseudoChannel, Command::RefAb, Command::RefAb, 1, t.n_rfc, false);

        // Sibling pseudo channels share the channel I/O; switching between
        // them costs the bus turnaround penalty.
        for from in RDS.iter().chain(WRS.iter()) {
            for to in RDS.iter().chain(WRS.iter()) {
                add(Level::PseudoChannel, *from, *to, 1, t.n_psch, true);
            }
        }

        // Bank group: long-variant column and activation spacing.
        for from in RDS {
            for to in RDS {
                add(Level::BankGroup, from, to, 1, t.n_ccd_l, false);
            }
        }
        for from in WRS {
            for to in WRS {
                add(Level::BankGroup, from, to, 1, t.n_ccd_l, false);
            }
            for to in RDS {
                add(Level::BankGroup, from, to, 1, t.n_wl + t.n_bl + t.n_wtr_l, false);
            }
        }
        add(Level::BankGroup, Command::Act, Command::Act, 1, t.n_rrd_l, false);

        // Bank: row cycle, activation-to-access, precharge recovery.
        add(Level::Bank, Command::Act, Command::Act, 1, t.n_rc, false);
        for to in RDS.iter().chain(WRS.iter()) {
            add(Level::Bank, Command::Act, *to, 1, t.n_rcd, false);
        }
        add(Level::Bank, Command::Act, Command::Pre, 1, t.n_ras, false);
        add(Level::Bank, Command::Pre, Command::Act, 1, t.n_rp, false);
        add(Level::Bank, Command::Rd, Command::Pre, 1, t.n_rtp, false);
        add(Level::Bank, Command::Wr, Command::Pre, 1, t.n_wl + t.n_bl + t.n_wr, false);
        add(Level::Bank, Command::RdA, Command::Act, 1, t.n_rtp + t.n_rp, false);
        add(Level::Bank, Command::WrA, Command::Act, 1, t.n_wl + t.n_bl + t.n_wr + t.n_rp, false);
    }

    /// The final DRAM command that completes a request of the given type.
    pub fn final_command(&self, type_id: RequestType) -> Command {
        match type_id {
            RequestType::Read => Command::Rd,
            RequestType::Write => Command::Wr,
            RequestType::AllBankRefresh => Command::RefAb,
            RequestType::Precharge => Command::Pre,
        }
    }

    pub fn scope(&self, cmd: Command) -> Level {
        self.scopes[cmd.idx()]
    }

    pub fn meta(&self, cmd: Command) -> CommandMeta {
        self.meta[cmd.idx()]
    }

    /// Largest history window declared for `cmd` at `level`; zero when the
    /// command has no non-sibling constraints there.
    pub fn max_window(&self, level: usize, cmd: Command) -> usize {
        self.timing_cons[level][cmd.idx()]
            .iter()
            .filter(|e| !e.sibling)
            .map(|e| e.window)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faw_window_is_four() {
        let spec = DeviceSpec::build(OrgPreset::Hbm2_8Gb, TimingPreset::Hbm2_2Gbps, 1);
        assert_eq!(spec.max_window(Level::PseudoChannel.idx(), Command::Act), 4);
        assert_eq!(spec.max_window(Level::Bank.idx(), Command::Act), 1);
        assert_eq!(spec.max_window(Level::Channel.idx(), Command::Rd), 0);
    }

    #[test]
    fn read_latency_is_cl_plus_burst() {
        let spec = DeviceSpec::build(OrgPreset::Hbm2_8Gb, TimingPreset::Hbm2_2Gbps, 1);
        assert_eq!(spec.read_latency, spec.timing.n_cl + spec.timing.n_bl);
    }

    #[test]
    fn auto_precharge_closes_and_accesses() {
        let spec = DeviceSpec::build(OrgPreset::Hbm2_8Gb, TimingPreset::Hbm2_2Gbps, 1);
        let meta = spec.meta(Command::RdA);
        assert!(meta.is_accessing && meta.is_closing && !meta.is_opening);
        assert!(spec.meta(Command::Act).is_opening);
        assert!(spec.meta(Command::RefAb).is_refreshing);
    }
}
