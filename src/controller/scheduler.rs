//! Request Scheduling Policies.
//!
//! A scheduler selects one request from a buffer. It never mutates DRAM
//! state; it only reads readiness from the device and writes the
//! resolved next command (and memoized predicates) into the requests.

use crate::common::request::RequestBuffer;
use crate::dram::Dram;

/// Scratchpad slot holding "fits before the next maintenance event".
pub const SCRATCH_FITS: usize = 0;
/// Scratchpad slot holding "ready this cycle".
pub const SCRATCH_READY: usize = 1;

/// Per-cycle inputs shared by every scheduling decision.
pub struct SchedContext {
    pub clk: u64,
    /// Cycle of the next mandatory maintenance event, when known.
    pub next_maintenance: Option<u64>,
}

/// Strategy for picking the best request out of a buffer.
pub trait Scheduler {
    /// Returns the position of the best request, or `None` when the
    /// buffer is empty. Refreshes every request's `command` field from
    /// the device's prerequisite resolver as a side effect.
    fn best_request(
        &self,
        buffer: &mut RequestBuffer,
        dram: &Dram,
        ctx: &SchedContext,
    ) -> Option<usize>;
}

/// First-ready, first-come-first-serve.
///
/// Readiness dominates; among equally ready requests the earliest
/// arrival wins, and remaining ties keep the earlier buffer position.
pub struct FrFcfs;

impl Scheduler for FrFcfs {
    fn best_request(
        &self,
        buffer: &mut RequestBuffer,
        dram: &Dram,
        _ctx: &SchedContext,
    ) -> Option<usize> {
        if buffer.is_empty() {
            return None;
        }

        for req in buffer.iter_mut() {
            req.command = dram.get_preq_command(req.final_command, &req.addr_vec);
        }
        let ready: Vec<bool> = buffer
            .iter()
            .map(|req| dram.check_ready(req.command, &req.addr_vec))
            .collect();

        let mut best = 0;
        for next in 1..buffer.len() {
            if ready[next] != ready[best] {
                if ready[next] {
                    best = next;
                }
                continue;
            }
            if buffer.get(next).unwrap().arrive < buffer.get(best).unwrap().arrive {
                best = next;
            }
        }
        Some(best)
    }
}

/// FR-FCFS extended with a maintenance-budget predicate.
///
/// A request "fits" when its estimated completion lands before the next
/// mandatory maintenance event; fitting requests outrank ready ones,
/// which outrank the rest, with FCFS breaking remaining ties. The
/// predicates are memoized in the request scratchpad.
pub struct BudgetAware;

impl Scheduler for BudgetAware {
    fn best_request(
        &self,
        buffer: &mut RequestBuffer,
        dram: &Dram,
        ctx: &SchedContext,
    ) -> Option<usize> {
        if buffer.is_empty() {
            return None;
        }

        for req in buffer.iter_mut() {
            req.command = dram.get_preq_command(req.final_command, &req.addr_vec);
            let estimate = dram.estimate_completion_cycles(req.command, req.final_command);
            let fits = match ctx.next_maintenance {
                Some(event) => ctx.clk + estimate < event,
                None => true,
            };
            req.scratchpad[SCRATCH_FITS] = fits as i64;
            req.scratchpad[SCRATCH_READY] =
                dram.check_ready(req.command, &req.addr_vec) as i64;
        }

        let mut best = 0;
        for next in 1..buffer.len() {
            let a = buffer.get(next).unwrap();
            let b = buffer.get(best).unwrap();

            if a.scratchpad[SCRATCH_FITS] != b.scratchpad[SCRATCH_FITS] {
                if a.scratchpad[SCRATCH_FITS] != 0 {
                    best = next;
                }
                continue;
            }
            if a.scratchpad[SCRATCH_READY] != b.scratchpad[SCRATCH_READY] {
                if a.scratchpad[SCRATCH_READY] != 0 {
                    best = next;
                }
                continue;
            }
            if a.arrive < b.arrive {
                best = next;
            }
        }
        Some(best)
    }
}
