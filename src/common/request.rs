//! Memory Requests and Request Buffers.
//!
//! A `Request` is the unit of work admitted into a memory controller; a
//! `RequestBuffer` is the bounded, order-preserving queue the controller
//! schedules from. Requests move between buffers by value and leave the
//! controller exactly once.

use std::any::Any;
use std::fmt;

use crate::common::addr::{AddrVec, PhysAddr};
use crate::dram::spec::Command;

/// Number of scratchpad slots schedulers may use to memoize per-cycle
/// predicates on a request.
pub const SCRATCHPAD_SLOTS: usize = 4;

/// Abstract request types understood by the memory system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestType {
    Read,
    Write,
    /// Synthetic maintenance request emitted by the refresh manager.
    AllBankRefresh,
    /// Synthetic precharge emitted by closing row policies.
    Precharge,
}

impl RequestType {
    pub fn name(self) -> &'static str {
        match self {
            RequestType::Read => "read",
            RequestType::Write => "write",
            RequestType::AllBankRefresh => "all-bank-refresh",
            RequestType::Precharge => "precharge",
        }
    }
}

/// Completion callback invoked when a request departs the controller.
pub type Callback = Box<dyn FnOnce(&Request)>;

/// A single memory request.
///
/// `command` is the next DRAM command the request needs and is refreshed
/// by the scheduler every cycle; `final_command` is resolved once at
/// admission from the device's request translation table.
pub struct Request {
    /// Target physical address.
    pub addr: PhysAddr,
    /// Hierarchical address; consistent with `addr` once mapped.
    pub addr_vec: AddrVec,

    pub type_id: RequestType,
    /// Originating core, or -1 when the request has no source.
    pub source_id: i32,

    /// Next DRAM command needed to make progress.
    pub command: Command,
    /// Final DRAM command that completes the request.
    pub final_command: Command,
    /// Whether hit/miss/conflict statistics were already credited.
    pub is_stat_updated: bool,

    /// Cycle the request entered the controller.
    pub arrive: u64,
    /// Cycle the request departs; programmed when the final command issues.
    pub depart: u64,

    /// Scheduler scratch space for memoized per-cycle predicates.
    pub scratchpad: [i64; SCRATCHPAD_SLOTS],

    /// Invoked from the pending-completion step when the request departs.
    pub callback: Option<Callback>,

    /// Opaque payload reserved for external collaborators.
    pub payload: Option<Box<dyn Any>>,
}

impl Request {
    /// Creates a request for a physical address; the address vector is
    /// filled in by the memory system's address mapper at admission.
    pub fn new(addr: PhysAddr, type_id: RequestType) -> Request {
        Request {
            addr,
            addr_vec: Vec::new(),
            type_id,
            source_id: -1,
            command: Command::Act,
            final_command: Command::Act,
            is_stat_updated: false,
            arrive: 0,
            depart: 0,
            scratchpad: [0; SCRATCHPAD_SLOTS],
            callback: None,
            payload: None,
        }
    }

    /// Creates a request that already carries its address vector.
    pub fn with_vec(addr_vec: AddrVec, type_id: RequestType) -> Request {
        let mut req = Request::new(0, type_id);
        req.addr_vec = addr_vec;
        req
    }

    /// Creates a request with an originator and a completion callback.
    pub fn with_callback(
        addr: PhysAddr,
        type_id: RequestType,
        source_id: i32,
        callback: Callback,
    ) -> Request {
        let mut req = Request::new(addr, type_id);
        req.source_id = source_id;
        req.callback = Some(callback);
        req
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("addr", &self.addr)
            .field("addr_vec", &self.addr_vec)
            .field("type_id", &self.type_id)
            .field("command", &self.command)
            .field("final_command", &self.final_command)
            .field("arrive", &self.arrive)
            .field("depart", &self.depart)
            .finish()
    }
}

/// A bounded, order-preserving request queue.
///
/// Insertion order is arrival order; the scheduler may select and remove
/// any element by position. Enqueue rejects once the buffer holds
/// `max_size` requests, so capacity is never exceeded.
pub struct RequestBuffer {
    buffer: Vec<Request>,
    pub max_size: usize,
}

impl RequestBuffer {
    pub fn new(max_size: usize) -> RequestBuffer {
        RequestBuffer {
            buffer: Vec::new(),
            max_size,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Appends a request, rejecting it when the buffer is full.
    pub fn enqueue(&mut self, request: Request) -> Result<(), Request> {
        if self.buffer.len() < self.max_size {
            self.buffer.push(request);
            Ok(())
        } else {
            Err(request)
        }
    }

    /// Removes and returns the request at `index`, preserving the order
    /// of the remaining requests.
    pub fn remove(&mut self, index: usize) -> Request {
        self.buffer.remove(index)
    }

    pub fn get(&self, index: usize) -> Option<&Request> {
        self.buffer.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Request> {
        self.buffer.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Request> {
        self.buffer.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Request> {
        self.buffer.iter_mut()
    }
}
