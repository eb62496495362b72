//! Simulation Frontends.
//!
//! A frontend drives the simulation by producing memory requests, one
//! attempt per frontend-clock tick. Trace frontends replay a file; a
//! host simulator may instead push requests through the external
//! request hook.

use crate::common::addr::PhysAddr;
use crate::common::error::ConfigError;
use crate::common::request::{Callback, RequestType};
use crate::config::{FrontendConfig, FrontendImpl};
use crate::memory_system::MemorySystem;
use crate::stats::StatBlock;

/// Load/store physical-address trace replay.
pub mod loadstore_trace;

/// Read/write address-vector trace replay.
pub mod readwrite_trace;

pub use loadstore_trace::LoadStoreTrace;
pub use readwrite_trace::ReadWriteTrace;

/// The component driving request admission.
pub trait Frontend {
    /// Attempts to admit the next request; called once per frontend tick.
    fn tick(&mut self, memory: &mut MemorySystem);

    /// Whether the frontend has admitted everything it will produce.
    fn is_finished(&self) -> bool;

    /// Frontend clock frequency relative to the global driver.
    fn clock_ratio(&self) -> u32;

    /// Number of request originators, for per-core statistics.
    fn num_cores(&self) -> usize {
        1
    }

    /// Synchronous hook for a host simulator to inject a request. The
    /// callback fires from the pending-completion step when the request
    /// departs. Returns false when the frontend does not accept external
    /// requests or the controller exerted backpressure.
    fn receive_external_request(
        &mut self,
        _type_id: RequestType,
        _addr: PhysAddr,
        _source_id: i32,
        _callback: Callback,
        _memory: &mut MemorySystem,
    ) -> bool {
        false
    }

    /// End-of-run statistics.
    fn stats_block(&self) -> StatBlock;
}

/// Constructs the frontend selected by the configuration.
pub fn build(cfg: &FrontendConfig) -> Result<Box<dyn Frontend>, ConfigError> {
    match cfg.implementation {
        FrontendImpl::LoadStoreTrace => Ok(Box::new(LoadStoreTrace::new(
            cfg.path.as_ref(),
            cfg.clock_ratio,
        )?)),
        FrontendImpl::ReadWriteTrace => Ok(Box::new(ReadWriteTrace::new(
            cfg.path.as_ref(),
            cfg.clock_ratio,
        )?)),
    }
}
