//! Refresh Management.
//!
//! The refresh manager emits synthetic all-bank refresh requests onto
//! the controller's priority buffer at the protocol-defined interval.
//! Refresh requests carry a REFab final command and flow through the
//! normal scheduling and timing pipeline, bypassing the read and write
//! buffers.

use crate::common::addr::UNMAPPED;
use crate::common::request::{Request, RequestType};
use crate::dram::spec::Level;

/// Strategy emitting periodic refresh requests.
pub trait RefreshManager {
    /// Called once per memory cycle; returns the refresh requests that
    /// become due this cycle.
    fn tick(&mut self, clk: u64) -> Vec<Request>;

    /// The cycle the next refresh burst is due; schedulers use this as
    /// the maintenance budget boundary.
    fn next_refresh_at(&self) -> u64;
}

/// All-bank refresh, one request per pseudo channel every tREFI.
pub struct AllBankRefresh {
    channel_id: i32,
    num_pseudochannels: usize,
    refi: u64,
    next_refresh: u64,
}

impl AllBankRefresh {
    pub fn new(channel_id: i32, num_pseudochannels: usize, refi: u64) -> AllBankRefresh {
        AllBankRefresh {
            channel_id,
            num_pseudochannels,
            refi,
            next_refresh: refi,
        }
    }
}

impl RefreshManager for AllBankRefresh {
    fn tick(&mut self, clk: u64) -> Vec<Request> {
        if clk < self.next_refresh {
            return Vec::new();
        }
        self.next_refresh += self.refi;

        (0..self.num_pseudochannels)
            .map(|pch| {
                let mut addr_vec = vec![UNMAPPED; Level::COUNT];
                addr_vec[Level::Channel.idx()] = self.channel_id;
                addr_vec[Level::PseudoChannel.idx()] = pch as i32;
                Request::with_vec(addr_vec, RequestType::AllBankRefresh)
            })
            .collect()
    }

    fn next_refresh_at(&self) -> u64 {
        self.next_refresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_interval() {
        let mut refresh = AllBankRefresh::new(0, 2, 100);
        assert_eq!(refresh.next_refresh_at(), 100);

        for clk in 1..100 {
            assert!(refresh.tick(clk).is_empty());
        }

        let burst = refresh.tick(100);
        assert_eq!(burst.len(), 2);
        assert_eq!(burst[0].type_id, RequestType::AllBankRefresh);
        assert_eq!(burst[0].addr_vec[Level::PseudoChannel.idx()], 0);
        assert_eq!(burst[1].addr_vec[Level::PseudoChannel.idx()], 1);
        assert_eq!(burst[0].addr_vec[Level::Bank.idx()], UNMAPPED);

        assert!(refresh.tick(101).is_empty());
        assert_eq!(refresh.next_refresh_at(), 200);
    }
}
