//! Physical Address Mapping.
//!
//! Translates frontend physical addresses into hierarchical address
//! vectors by bit slicing, and back. The mapper is pure and stateless;
//! the inverse is exact for transaction-aligned addresses, which gives
//! the round-trip law the tests rely on.

use crate::common::addr::{AddrVec, PhysAddr};
use crate::common::error::ConfigError;
use crate::dram::spec::{Level, Organization};

/// Burst length of one transaction in column beats.
const BURST_LENGTH: u64 = 4;

/// Slicing order from the least significant bit upward. Keeping the
/// channel lowest interleaves consecutive transactions across channels;
/// the row index occupies the most significant bits.
const SLICE_ORDER: [Level; Level::COUNT] = [
    Level::Channel,
    Level::Column,
    Level::BankGroup,
    Level::Bank,
    Level::PseudoChannel,
    Level::Row,
];

/// Linear address mapper over the device organization.
pub struct LinearMapper {
    bits: [u32; Level::COUNT],
    /// Low bits covered by one transaction's data burst.
    tx_offset: u32,
}

impl LinearMapper {
    /// Builds the mapper for an organization. Every level count must be
    /// a power of two so the slices invert cleanly.
    pub fn new(org: &Organization) -> Result<LinearMapper, ConfigError> {
        let mut bits = [0u32; Level::COUNT];
        for level in Level::ALL {
            let count = org.level_size(level);
            if !count.is_power_of_two() {
                return Err(ConfigError::BadParameter {
                    name: "organization",
                    message: format!(
                        "{} count {} is not a power of two",
                        level.name(),
                        count
                    ),
                });
            }
            bits[level.idx()] = count.trailing_zeros();
        }

        let tx_bytes = (org.dq as u64 / 8) * BURST_LENGTH;
        Ok(LinearMapper {
            bits,
            tx_offset: tx_bytes.trailing_zeros(),
        })
    }

    /// Maps a physical address to its address vector.
    pub fn map(&self, addr: PhysAddr) -> AddrVec {
        let mut rest = addr >> self.tx_offset;
        let mut addr_vec = vec![0i32; Level::COUNT];
        for level in SLICE_ORDER {
            let bits = self.bits[level.idx()];
            addr_vec[level.idx()] = (rest & ((1u64 << bits) - 1)) as i32;
            rest >>= bits;
        }
        addr_vec
    }

    /// Reassembles the transaction-aligned physical address of a fully
    /// specified address vector.
    pub fn demap(&self, addr_vec: &AddrVec) -> PhysAddr {
        let mut addr: u64 = 0;
        for level in SLICE_ORDER.iter().rev() {
            let bits = self.bits[level.idx()];
            addr = (addr << bits) | addr_vec[level.idx()] as u64;
        }
        addr << self.tx_offset
    }
}
