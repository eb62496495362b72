//! Memory System.
//!
//! Owns the DRAM device, one controller per channel, and the address
//! mapper. Admitted requests are mapped and routed to the controller of
//! their channel; each memory-clock tick advances the device (applying
//! due deferred actions) and then every controller pipeline.

use crate::addr_mapper::LinearMapper;
use crate::common::error::ConfigError;
use crate::common::request::Request;
use crate::config::{
    AddrMapperImpl, MemorySystemConfig, PluginImpl, RefreshImpl, RowPolicyImpl, SchedulerImpl,
};
use crate::controller::{
    AllBankRefresh, BudgetAware, CommandCounter, Controller, ControllerOptions, ControllerPlugin,
    FrFcfs, OpenRowPolicy, RefreshManager, RowPolicy, Scheduler, TimeoutRowPolicy,
};
use crate::dram::spec::DeviceSpec;
use crate::dram::{Dram, Level};
use crate::stats::StatBlock;

pub struct MemorySystem {
    dram: Dram,
    controllers: Vec<Controller>,
    mapper: LinearMapper,
    clock_ratio: u32,
    clk: u64,
}

impl MemorySystem {
    /// Builds the device, mapper, and per-channel controllers described
    /// by the configuration.
    pub fn new(cfg: &MemorySystemConfig, num_cores: usize) -> Result<MemorySystem, ConfigError> {
        let spec = DeviceSpec::build(
            cfg.dram.org.preset,
            cfg.dram.timing.preset,
            cfg.dram.org.channel,
        );

        let mapper = match cfg.addr_mapper.implementation {
            AddrMapperImpl::Linear => LinearMapper::new(&spec.org)?,
        };

        let channels = spec.org.level_size(Level::Channel);
        let num_pseudochannels = spec.org.level_size(Level::PseudoChannel);
        let refi = spec.timing.n_refi;
        let ctrl_cfg = &cfg.controller;

        let mut controllers = Vec::with_capacity(channels);
        for channel_id in 0..channels as i32 {
            let scheduler: Box<dyn Scheduler> = match ctrl_cfg.scheduler.implementation {
                SchedulerImpl::FrFcfs => Box::new(FrFcfs),
                SchedulerImpl::BudgetAware => Box::new(BudgetAware),
            };
            let refresh: Box<dyn RefreshManager> = match ctrl_cfg.refresh.implementation {
                RefreshImpl::AllBank => {
                    Box::new(AllBankRefresh::new(channel_id, num_pseudochannels, refi))
                }
            };
            let row_policy: Box<dyn RowPolicy> = match ctrl_cfg.row_policy.implementation {
                RowPolicyImpl::OpenRow => Box::new(OpenRowPolicy),
                RowPolicyImpl::Timeout => {
                    Box::new(TimeoutRowPolicy::new(ctrl_cfg.row_policy.timeout))
                }
            };
            let plugins: Vec<Box<dyn ControllerPlugin>> = ctrl_cfg
                .plugins
                .iter()
                .map(|plugin| match plugin.implementation {
                    PluginImpl::CommandCounter => {
                        Box::new(CommandCounter::new()) as Box<dyn ControllerPlugin>
                    }
                })
                .collect();

            controllers.push(Controller::new(
                ControllerOptions {
                    channel_id,
                    num_cores,
                    read_capacity: ctrl_cfg.read_buffer_size,
                    write_capacity: ctrl_cfg.write_buffer_size,
                    wr_low_watermark: ctrl_cfg.wr_low_watermark,
                    wr_high_watermark: ctrl_cfg.wr_high_watermark,
                },
                scheduler,
                refresh,
                row_policy,
                plugins,
            ));
        }

        Ok(MemorySystem {
            dram: Dram::new(spec),
            controllers,
            mapper,
            clock_ratio: cfg.clock_ratio,
            clk: 0,
        })
    }

    pub fn clock_ratio(&self) -> u32 {
        self.clock_ratio
    }

    pub fn clk(&self) -> u64 {
        self.clk
    }

    pub fn dram(&self) -> &Dram {
        &self.dram
    }

    pub fn mapper(&self) -> &LinearMapper {
        &self.mapper
    }

    pub fn channels(&self) -> usize {
        self.controllers.len()
    }

    pub fn controller(&self, channel: usize) -> &Controller {
        &self.controllers[channel]
    }

    /// Admits a request, mapping between its physical address and its
    /// address vector so both are always consistent. Returns the request
    /// on backpressure so the caller can retry next cycle.
    pub fn send(&mut self, mut req: Request) -> Result<(), Request> {
        if req.addr_vec.is_empty() {
            req.addr_vec = self.mapper.map(req.addr);
        } else {
            req.addr = self.mapper.demap(&req.addr_vec);
        }

        let channel = req.addr_vec[Level::Channel.idx()];
        assert!(
            channel >= 0 && (channel as usize) < self.controllers.len(),
            "request routed to nonexistent channel {}",
            channel
        );
        self.controllers[channel as usize].send(req, &self.dram)
    }

    /// Admits a maintenance request directly into a channel's priority
    /// buffer.
    pub fn priority_send(&mut self, channel: usize, req: Request) -> Result<(), Request> {
        self.controllers[channel].priority_send(req, &self.dram)
    }

    /// Advances the memory clock by one cycle.
    pub fn tick(&mut self) {
        self.clk += 1;
        self.dram.tick();
        for controller in &mut self.controllers {
            controller.tick(&mut self.dram);
        }
    }

    pub fn finalize(&mut self) {
        for controller in &mut self.controllers {
            controller.finalize();
        }
    }

    pub fn stats_blocks(&self) -> Vec<StatBlock> {
        let mut blocks: Vec<StatBlock> = self
            .controllers
            .iter()
            .map(|controller| controller.stats_block())
            .collect();
        blocks.push(self.dram.stats());
        blocks
    }
}
