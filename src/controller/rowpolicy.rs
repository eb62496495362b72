//! Row Buffer Policies.
//!
//! A row policy observes the scheduling outcome every cycle. It may not
//! alter the chosen request; its only lever is enqueueing synthetic
//! precharge requests onto the priority buffer for future cycles.

use std::collections::HashMap;

use crate::common::addr::UNMAPPED;
use crate::common::request::{Request, RequestType};
use crate::dram::spec::{Command, Level};

/// Bank-identifying prefix of an address vector.
type BankKey = [i32; 4];

fn bank_key(addr_vec: &[i32]) -> BankKey {
    [addr_vec[0], addr_vec[1], addr_vec[2], addr_vec[3]]
}

/// Strategy deciding when rows are closed.
pub trait RowPolicy {
    /// Observes this cycle's scheduling outcome; returns synthetic
    /// requests to enqueue onto the priority buffer.
    fn update(&mut self, found: bool, chosen: Option<&Request>, clk: u64) -> Vec<Request>;
}

/// Keep rows open until a conflicting access forces a precharge.
pub struct OpenRowPolicy;

impl RowPolicy for OpenRowPolicy {
    fn update(&mut self, _found: bool, _chosen: Option<&Request>, _clk: u64) -> Vec<Request> {
        Vec::new()
    }
}

/// Close rows that stay open longer than a fixed number of cycles.
///
/// Tracks row openings from the issued command stream; once a row
/// exceeds the timeout a precharge request for its bank is emitted.
pub struct TimeoutRowPolicy {
    timeout: u64,
    open_rows: HashMap<BankKey, u64>,
}

impl TimeoutRowPolicy {
    pub fn new(timeout: u64) -> TimeoutRowPolicy {
        TimeoutRowPolicy {
            timeout,
            open_rows: HashMap::new(),
        }
    }
}

impl RowPolicy for TimeoutRowPolicy {
    fn update(&mut self, found: bool, chosen: Option<&Request>, clk: u64) -> Vec<Request> {
        if found {
            if let Some(req) = chosen {
                let key = bank_key(&req.addr_vec);
                match req.command {
                    Command::Act => {
                        self.open_rows.insert(key, clk);
                    }
                    Command::Pre | Command::RdA | Command::WrA => {
                        self.open_rows.remove(&key);
                    }
                    Command::PreA | Command::RefAb => {
                        // Pseudo-channel-wide close.
                        self.open_rows
                            .retain(|k, _| k[0] != key[0] || k[1] != key[1]);
                    }
                    _ => {}
                }
            }
        }

        let timeout = self.timeout;
        let mut expired = Vec::new();
        self.open_rows.retain(|key, opened| {
            if clk - *opened >= timeout {
                expired.push(*key);
                false
            } else {
                true
            }
        });

        expired
            .into_iter()
            .map(|key| {
                let mut addr_vec = vec![UNMAPPED; Level::COUNT];
                addr_vec[..4].copy_from_slice(&key);
                Request::with_vec(addr_vec, RequestType::Precharge)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn act_request(bank: i32) -> Request {
        let mut req = Request::with_vec(vec![0, 0, 0, bank, 5, 0], RequestType::Read);
        req.command = Command::Act;
        req
    }

    #[test]
    fn open_row_policy_stays_quiet() {
        let mut policy = OpenRowPolicy;
        let req = act_request(0);
        assert!(policy.update(true, Some(&req), 10).is_empty());
    }

    #[test]
    fn timeout_policy_emits_precharge() {
        let mut policy = TimeoutRowPolicy::new(100);
        let req = act_request(2);

        assert!(policy.update(true, Some(&req), 10).is_empty());
        assert!(policy.update(false, None, 50).is_empty());

        let emitted = policy.update(false, None, 110);
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].type_id, RequestType::Precharge);
        assert_eq!(emitted[0].addr_vec[..4], [0, 0, 0, 2]);

        // The tracked row is gone after firing once.
        assert!(policy.update(false, None, 300).is_empty());
    }

    #[test]
    fn closing_command_cancels_tracking() {
        let mut policy = TimeoutRowPolicy::new(100);
        let act = act_request(1);
        policy.update(true, Some(&act), 10);

        let mut pre = Request::with_vec(vec![0, 0, 0, 1, UNMAPPED, UNMAPPED], RequestType::Precharge);
        pre.command = Command::Pre;
        policy.update(true, Some(&pre), 20);

        assert!(policy.update(false, None, 500).is_empty());
    }
}
