//! Hierarchical DRAM Device Model.
//!
//! This module contains the static device specification (organization,
//! command set, timing constraints), the arena-allocated device tree,
//! and the `Dram` facade implementing the device contract used by the
//! memory controller.

/// Device tree nodes and the recursive state/timing/query algorithms.
pub mod node;

/// Static device specification: levels, commands, states, timing.
pub mod spec;

/// The `Dram` device facade.
pub mod device;

pub use device::Dram;
pub use spec::{Command, DeviceSpec, Level, NodeState, OrgPreset, TimingPreset};
