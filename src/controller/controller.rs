//! Per-Channel DRAM Controller.
//!
//! The controller owns the read, write, priority, and active request
//! buffers plus the pending-completion queue, and runs the per-cycle
//! pipeline: complete departed requests, tick refresh, choose a request,
//! inform the row policy and plugins, then issue one DRAM command.

use std::collections::VecDeque;

use crate::common::addr::same_row_group;
use crate::common::request::{Request, RequestBuffer, RequestType};
use crate::controller::plugin::{append_plugin_stats, ControllerPlugin};
use crate::controller::refresh::RefreshManager;
use crate::controller::rowpolicy::RowPolicy;
use crate::controller::scheduler::{SchedContext, Scheduler};
use crate::dram::spec::Level;
use crate::dram::Dram;
use crate::stats::{StatBlock, StatValue};

/// Sized to absorb a full refresh backlog plus policy precharges.
const PRIORITY_CAPACITY: usize = 512 * 3 + 32;

/// Which buffer a scheduled request was found in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BufKind {
    Active,
    Priority,
    Read,
    Write,
}

/// Construction parameters for a controller.
pub struct ControllerOptions {
    pub channel_id: i32,
    pub num_cores: usize,
    pub read_capacity: usize,
    pub write_capacity: usize,
    /// Fraction of write-buffer capacity below which write mode ends.
    pub wr_low_watermark: f32,
    /// Fraction of write-buffer capacity at which write mode begins.
    pub wr_high_watermark: f32,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        ControllerOptions {
            channel_id: 0,
            num_cores: 1,
            read_capacity: 32,
            write_capacity: 32,
            wr_low_watermark: 0.2,
            wr_high_watermark: 0.8,
        }
    }
}

/// Row hit/miss/conflict and queue-length statistics for one channel.
#[derive(Default)]
pub struct ControllerStats {
    pub row_hits: u64,
    pub row_misses: u64,
    pub row_conflicts: u64,

    pub read_row_hits: u64,
    pub read_row_misses: u64,
    pub read_row_conflicts: u64,
    pub write_row_hits: u64,
    pub write_row_misses: u64,
    pub write_row_conflicts: u64,

    pub read_row_hits_per_core: Vec<u64>,
    pub read_row_misses_per_core: Vec<u64>,
    pub read_row_conflicts_per_core: Vec<u64>,

    pub num_read_reqs: u64,
    pub num_write_reqs: u64,
    pub num_other_reqs: u64,

    pub queue_len_sum: u64,
    pub read_queue_len_sum: u64,
    pub write_queue_len_sum: u64,
    pub priority_queue_len_sum: u64,

    pub read_latency_sum: u64,

    pub queue_len_avg: f64,
    pub read_queue_len_avg: f64,
    pub write_queue_len_avg: f64,
    pub priority_queue_len_avg: f64,
    pub avg_read_latency: f64,
}

impl ControllerStats {
    fn new(num_cores: usize) -> ControllerStats {
        ControllerStats {
            read_row_hits_per_core: vec![0; num_cores],
            read_row_misses_per_core: vec![0; num_cores],
            read_row_conflicts_per_core: vec![0; num_cores],
            ..Default::default()
        }
    }

    /// Credits the row outcome of a request the first time it is chosen.
    fn credit(&mut self, type_id: RequestType, source_id: i32, is_hit: bool, is_open: bool) {
        match type_id {
            RequestType::Read => {
                if is_hit {
                    self.read_row_hits += 1;
                    self.row_hits += 1;
                } else if is_open {
                    self.read_row_conflicts += 1;
                    self.row_conflicts += 1;
                } else {
                    self.read_row_misses += 1;
                    self.row_misses += 1;
                }
                if source_id >= 0 && (source_id as usize) < self.read_row_hits_per_core.len() {
                    let core = source_id as usize;
                    if is_hit {
                        self.read_row_hits_per_core[core] += 1;
                    } else if is_open {
                        self.read_row_conflicts_per_core[core] += 1;
                    } else {
                        self.read_row_misses_per_core[core] += 1;
                    }
                }
            }
            RequestType::Write => {
                if is_hit {
                    self.write_row_hits += 1;
                    self.row_hits += 1;
                } else if is_open {
                    self.write_row_conflicts += 1;
                    self.row_conflicts += 1;
                } else {
                    self.write_row_misses += 1;
                    self.row_misses += 1;
                }
            }
            _ => {}
        }
    }

    fn finalize(&mut self, clk: u64) {
        let cycles = clk.max(1) as f64;
        self.queue_len_avg = self.queue_len_sum as f64 / cycles;
        self.read_queue_len_avg = self.read_queue_len_sum as f64 / cycles;
        self.write_queue_len_avg = self.write_queue_len_sum as f64 / cycles;
        self.priority_queue_len_avg = self.priority_queue_len_sum as f64 / cycles;
        self.avg_read_latency = self.read_latency_sum as f64 / self.num_read_reqs.max(1) as f64;
    }
}

/// One memory controller driving one DRAM channel.
pub struct Controller {
    pub channel_id: i32,
    clk: u64,

    read_buffer: RequestBuffer,
    write_buffer: RequestBuffer,
    priority_buffer: RequestBuffer,
    active_buffer: RequestBuffer,
    pending: VecDeque<Request>,

    scheduler: Box<dyn Scheduler>,
    refresh: Box<dyn RefreshManager>,
    row_policy: Box<dyn RowPolicy>,
    plugins: Vec<Box<dyn ControllerPlugin>>,

    wr_low_watermark: f32,
    wr_high_watermark: f32,
    is_write_mode: bool,

    /// Length of the address prefix identifying a row group.
    bank_addr_idx: usize,

    stats: ControllerStats,
}

impl Controller {
    pub fn new(
        opts: ControllerOptions,
        scheduler: Box<dyn Scheduler>,
        refresh: Box<dyn RefreshManager>,
        row_policy: Box<dyn RowPolicy>,
        mut plugins: Vec<Box<dyn ControllerPlugin>>,
    ) -> Controller {
        for plugin in plugins.iter_mut() {
            plugin.setup(opts.channel_id);
        }

        Controller {
            channel_id: opts.channel_id,
            clk: 0,
            read_buffer: RequestBuffer::new(opts.read_capacity),
            write_buffer: RequestBuffer::new(opts.write_capacity),
            priority_buffer: RequestBuffer::new(PRIORITY_CAPACITY),
            // Active requests come out of the read and write buffers, so
            // their combined capacity bounds the active population.
            active_buffer: RequestBuffer::new(opts.read_capacity + opts.write_capacity),
            pending: VecDeque::new(),
            scheduler,
            refresh,
            row_policy,
            plugins,
            wr_low_watermark: opts.wr_low_watermark,
            wr_high_watermark: opts.wr_high_watermark,
            is_write_mode: false,
            bank_addr_idx: Level::Bank.idx(),
            stats: ControllerStats::new(opts.num_cores),
        }
    }

    pub fn clk(&self) -> u64 {
        self.clk
    }

    pub fn is_write_mode(&self) -> bool {
        self.is_write_mode
    }

    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    pub fn read_buffer(&self) -> &RequestBuffer {
        &self.read_buffer
    }

    pub fn write_buffer(&self) -> &RequestBuffer {
        &self.write_buffer
    }

    pub fn priority_buffer(&self) -> &RequestBuffer {
        &self.priority_buffer
    }

    pub fn active_buffer(&self) -> &RequestBuffer {
        &self.active_buffer
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Admits a request into the controller.
    ///
    /// Reads that hit an in-flight write are forwarded: they depart on
    /// the next cycle without issuing any DRAM command. Otherwise the
    /// request enters the read or write buffer; a full buffer rejects
    /// the request and hands it back for the caller to retry.
    pub fn send(&mut self, mut req: Request, dram: &Dram) -> Result<(), Request> {
        req.final_command = dram.spec().final_command(req.type_id);
        req.command = req.final_command;
        let type_id = req.type_id;

        if type_id == RequestType::Read {
            let forwarded = self.write_buffer.iter().any(|wreq| wreq.addr == req.addr);
            if forwarded {
                req.arrive = self.clk;
                req.depart = self.clk + 1;
                self.pending.push_back(req);
                self.stats.num_read_reqs += 1;
                return Ok(());
            }
        }

        req.arrive = self.clk;
        let result = match type_id {
            RequestType::Read => self.read_buffer.enqueue(req),
            RequestType::Write => self.write_buffer.enqueue(req),
            other => panic!(
                "request type '{}' reached the read/write admission path",
                other.name()
            ),
        };

        match result {
            Ok(()) => {
                match type_id {
                    RequestType::Read => self.stats.num_read_reqs += 1,
                    RequestType::Write => self.stats.num_write_reqs += 1,
                    _ => unreachable!(),
                }
                Ok(())
            }
            Err(req) => Err(req),
        }
    }

    /// Admits a maintenance request directly into the priority buffer.
    pub fn priority_send(&mut self, mut req: Request, dram: &Dram) -> Result<(), Request> {
        req.final_command = dram.spec().final_command(req.type_id);
        req.command = req.final_command;
        match self.priority_buffer.enqueue(req) {
            Ok(()) => {
                self.stats.num_other_reqs += 1;
                Ok(())
            }
            Err(req) => Err(req),
        }
    }

    /// Runs one memory-clock cycle of the controller pipeline.
    pub fn tick(&mut self, dram: &mut Dram) {
        self.clk += 1;
        let clk = self.clk;

        self.stats.queue_len_sum += (self.read_buffer.len()
            + self.write_buffer.len()
            + self.priority_buffer.len()
            + self.pending.len()) as u64;
        self.stats.read_queue_len_sum += (self.read_buffer.len() + self.pending.len()) as u64;
        self.stats.write_queue_len_sum += self.write_buffer.len() as u64;
        self.stats.priority_queue_len_sum += self.priority_buffer.len() as u64;

        self.serve_completed(clk);

        for req in self.refresh.tick(clk) {
            if self.priority_send(req, dram).is_err() {
                panic!(
                    "priority buffer overflow on channel {}: refresh request dropped",
                    self.channel_id
                );
            }
        }

        let chosen = self.schedule_request(dram);
        let found = chosen.is_some();

        // The row policy and the plugin chain observe the outcome before
        // the command issues; neither may change it.
        let chosen_req: Option<&Request> = match chosen {
            Some((BufKind::Active, i)) => self.active_buffer.get(i),
            Some((BufKind::Priority, i)) => self.priority_buffer.get(i),
            Some((BufKind::Read, i)) => self.read_buffer.get(i),
            Some((BufKind::Write, i)) => self.write_buffer.get(i),
            None => None,
        };
        let synthetic = self.row_policy.update(found, chosen_req, clk);
        for plugin in self.plugins.iter_mut() {
            plugin.update(found, chosen_req);
        }

        for mut req in synthetic {
            req.final_command = dram.spec().final_command(req.type_id);
            req.command = req.final_command;
            // Appending never disturbs the chosen position; a dropped
            // policy precharge simply leaves the row to close on demand.
            let _ = self.priority_buffer.enqueue(req);
        }

        if let Some((kind, idx)) = chosen {
            self.issue(kind, idx, dram, clk);
        }
    }

    /// Completes every pending request whose departure cycle has come.
    fn serve_completed(&mut self, clk: u64) {
        while let Some(front) = self.pending.front() {
            if front.depart > clk {
                break;
            }
            let mut req = self.pending.pop_front().unwrap();
            // Forwarded reads (departure one cycle after arrival) are
            // excluded from the DRAM latency account.
            if req.type_id == RequestType::Read && req.depart - req.arrive > 1 {
                self.stats.read_latency_sum += req.depart - req.arrive;
            }
            if let Some(callback) = req.callback.take() {
                callback(&req);
            }
        }
    }

    /// Finds a request to serve this cycle.
    ///
    /// Selection order: the active buffer first (its requests already
    /// spent an activation), then the priority buffer head with absolute
    /// precedence, then the read or write buffer chosen by the watermark
    /// hysteresis. A chosen closing command is abandoned when any active
    /// request still works in the same row group.
    fn schedule_request(&mut self, dram: &Dram) -> Option<(BufKind, usize)> {
        let ctx = SchedContext {
            clk: self.clk,
            next_maintenance: Some(self.refresh.next_refresh_at()),
        };

        let mut found: Option<(BufKind, usize)> = None;

        if let Some(i) = self.scheduler.best_request(&mut self.active_buffer, dram, &ctx) {
            let req = self.active_buffer.get(i).unwrap();
            if dram.check_ready(req.command, &req.addr_vec) {
                found = Some((BufKind::Active, i));
            }
        }

        if found.is_none() && !self.priority_buffer.is_empty() {
            let req = self.priority_buffer.get_mut(0).unwrap();
            req.command = dram.get_preq_command(req.final_command, &req.addr_vec);
            if dram.check_ready(req.command, &req.addr_vec) {
                found = Some((BufKind::Priority, 0));
            } else {
                // Maintenance pending: no other buffer may be served.
                return None;
            }
        }

        if found.is_none() {
            self.set_write_mode();
            let kind = if self.is_write_mode {
                BufKind::Write
            } else {
                BufKind::Read
            };
            let buffer = match kind {
                BufKind::Write => &mut self.write_buffer,
                _ => &mut self.read_buffer,
            };
            if let Some(i) = self.scheduler.best_request(buffer, dram, &ctx) {
                let req = buffer.get(i).unwrap();
                if dram.check_ready(req.command, &req.addr_vec) {
                    found = Some((kind, i));
                }
            }
        }

        if let Some((kind, idx)) = found {
            let req = match kind {
                BufKind::Active => self.active_buffer.get(idx),
                BufKind::Priority => self.priority_buffer.get(idx),
                BufKind::Read => self.read_buffer.get(idx),
                BufKind::Write => self.write_buffer.get(idx),
            }
            .unwrap();

            if dram.spec().meta(req.command).is_closing {
                let blocked = self
                    .active_buffer
                    .iter()
                    .any(|other| {
                        same_row_group(&other.addr_vec, &req.addr_vec, self.bank_addr_idx + 1)
                    });
                if blocked {
                    return None;
                }
            }
        }

        found
    }

    /// Switches between read and write service with two-threshold
    /// hysteresis so the mode cannot oscillate within a cycle.
    fn set_write_mode(&mut self) {
        let size = self.write_buffer.len() as f32;
        let capacity = self.write_buffer.max_size as f32;

        if !self.is_write_mode {
            if size >= self.wr_high_watermark * capacity || self.read_buffer.is_empty() {
                self.is_write_mode = true;
            }
        } else if size < self.wr_low_watermark * capacity && !self.read_buffer.is_empty() {
            self.is_write_mode = false;
        }
    }

    /// Issues the chosen request's current command and routes the
    /// request onward: final commands program a departure, opening
    /// commands move the request into the active buffer, and any other
    /// intermediate command leaves it in place for the next cycle.
    fn issue(&mut self, kind: BufKind, idx: usize, dram: &mut Dram, clk: u64) {
        let (cmd, final_cmd, stat_updated, type_id, source_id, is_hit, is_open) = {
            let req = match kind {
                BufKind::Active => self.active_buffer.get(idx),
                BufKind::Priority => self.priority_buffer.get(idx),
                BufKind::Read => self.read_buffer.get(idx),
                BufKind::Write => self.write_buffer.get(idx),
            }
            .unwrap();

            let is_hit = dram.check_rowbuffer_hit(req.final_command, &req.addr_vec);
            let is_open = dram.check_node_open(req.final_command, &req.addr_vec);
            dram.issue_command(req.command, &req.addr_vec);

            (
                req.command,
                req.final_command,
                req.is_stat_updated,
                req.type_id,
                req.source_id,
                is_hit,
                is_open,
            )
        };

        if !stat_updated {
            self.stats.credit(type_id, source_id, is_hit, is_open);
            let req = match kind {
                BufKind::Active => self.active_buffer.get_mut(idx),
                BufKind::Priority => self.priority_buffer.get_mut(idx),
                BufKind::Read => self.read_buffer.get_mut(idx),
                BufKind::Write => self.write_buffer.get_mut(idx),
            }
            .unwrap();
            req.is_stat_updated = true;
        }

        if cmd == final_cmd {
            let mut req = self.remove(kind, idx);
            match req.type_id {
                RequestType::Read => {
                    req.depart = clk + dram.read_latency();
                    self.pending.push_back(req);
                }
                RequestType::Write => {
                    // Writes complete without added latency.
                    req.depart = clk;
                    self.pending.push_back(req);
                }
                // Maintenance requests retire on issue.
                _ => {}
            }
        } else if dram.spec().meta(cmd).is_opening {
            let req = self.remove(kind, idx);
            if self.active_buffer.enqueue(req).is_err() {
                panic!(
                    "active buffer overflow on channel {}: opening command lost",
                    self.channel_id
                );
            }
        }
    }

    fn remove(&mut self, kind: BufKind, idx: usize) -> Request {
        match kind {
            BufKind::Active => self.active_buffer.remove(idx),
            BufKind::Priority => self.priority_buffer.remove(idx),
            BufKind::Read => self.read_buffer.remove(idx),
            BufKind::Write => self.write_buffer.remove(idx),
        }
    }

    /// Computes the end-of-run averages and finalizes every plugin.
    pub fn finalize(&mut self) {
        for plugin in self.plugins.iter_mut() {
            plugin.finalize();
        }
        self.stats.finalize(self.clk);
    }

    /// Emits this channel's statistics block.
    pub fn stats_block(&self) -> StatBlock {
        let s = &self.stats;
        let mut block = StatBlock::new(format!("Controller_{}", self.channel_id));

        block.push("row_hits", StatValue::Count(s.row_hits));
        block.push("row_misses", StatValue::Count(s.row_misses));
        block.push("row_conflicts", StatValue::Count(s.row_conflicts));
        block.push("read_row_hits", StatValue::Count(s.read_row_hits));
        block.push("read_row_misses", StatValue::Count(s.read_row_misses));
        block.push("read_row_conflicts", StatValue::Count(s.read_row_conflicts));
        block.push("write_row_hits", StatValue::Count(s.write_row_hits));
        block.push("write_row_misses", StatValue::Count(s.write_row_misses));
        block.push("write_row_conflicts", StatValue::Count(s.write_row_conflicts));

        for core in 0..s.read_row_hits_per_core.len() {
            block.push(
                format!("read_row_hits_core_{}", core),
                StatValue::Count(s.read_row_hits_per_core[core]),
            );
            block.push(
                format!("read_row_misses_core_{}", core),
                StatValue::Count(s.read_row_misses_per_core[core]),
            );
            block.push(
                format!("read_row_conflicts_core_{}", core),
                StatValue::Count(s.read_row_conflicts_per_core[core]),
            );
        }

        block.push("num_read_reqs", StatValue::Count(s.num_read_reqs));
        block.push("num_write_reqs", StatValue::Count(s.num_write_reqs));
        block.push("num_other_reqs", StatValue::Count(s.num_other_reqs));

        block.push("queue_len_avg", StatValue::Average(s.queue_len_avg));
        block.push("read_queue_len_avg", StatValue::Average(s.read_queue_len_avg));
        block.push("write_queue_len_avg", StatValue::Average(s.write_queue_len_avg));
        block.push(
            "priority_queue_len_avg",
            StatValue::Average(s.priority_queue_len_avg),
        );

        block.push("read_latency", StatValue::Count(s.read_latency_sum));
        block.push("avg_read_latency", StatValue::Average(s.avg_read_latency));

        append_plugin_stats(&mut block, &self.plugins);
        block
    }
}
