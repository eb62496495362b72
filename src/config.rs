use std::path::Path;

use serde::Deserialize;

use crate::common::error::ConfigError;
use crate::dram::spec::{OrgPreset, TimingPreset};

const DEFAULT_CLOCK_RATIO: u32 = 1;
const DEFAULT_BUFFER_SIZE: usize = 32;
const DEFAULT_WR_LOW_WATERMARK: f32 = 0.2;
const DEFAULT_WR_HIGH_WATERMARK: f32 = 0.8;
const DEFAULT_ROW_TIMEOUT: u64 = 120;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(rename = "Frontend")]
    pub frontend: FrontendConfig,

    #[serde(rename = "MemorySystem")]
    pub memory_system: MemorySystemConfig,
}

#[derive(Debug, Deserialize)]
pub struct FrontendConfig {
    #[serde(rename = "impl")]
    pub implementation: FrontendImpl,

    #[serde(default = "default_clock_ratio")]
    pub clock_ratio: u32,

    /// Path to the trace file driving the simulation.
    pub path: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum FrontendImpl {
    LoadStoreTrace,
    ReadWriteTrace,
}

#[derive(Debug, Deserialize)]
pub struct MemorySystemConfig {
    #[serde(default = "default_clock_ratio")]
    pub clock_ratio: u32,

    #[serde(rename = "DRAM")]
    pub dram: DramConfig,

    #[serde(rename = "Controller")]
    pub controller: ControllerConfig,

    #[serde(rename = "AddrMapper", default)]
    pub addr_mapper: AddrMapperConfig,
}

#[derive(Debug, Deserialize)]
pub struct DramConfig {
    #[serde(rename = "impl", default)]
    pub implementation: DramImpl,

    pub org: OrgConfig,
    pub timing: TimingConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum DramImpl {
    #[default]
    #[serde(rename = "HBM2")]
    Hbm2,
}

#[derive(Debug, Deserialize)]
pub struct OrgConfig {
    pub preset: OrgPreset,

    #[serde(default = "default_channels")]
    pub channel: usize,
}

#[derive(Debug, Deserialize)]
pub struct TimingConfig {
    pub preset: TimingPreset,
}

#[derive(Debug, Deserialize)]
pub struct ControllerConfig {
    #[serde(rename = "impl", default)]
    pub implementation: ControllerImpl,

    #[serde(default = "default_wr_low_watermark")]
    pub wr_low_watermark: f32,

    #[serde(default = "default_wr_high_watermark")]
    pub wr_high_watermark: f32,

    #[serde(default = "default_buffer_size")]
    pub read_buffer_size: usize,

    #[serde(default = "default_buffer_size")]
    pub write_buffer_size: usize,

    #[serde(rename = "Scheduler", default)]
    pub scheduler: SchedulerConfig,

    #[serde(rename = "RefreshManager", default)]
    pub refresh: RefreshConfig,

    #[serde(rename = "RowPolicy", default)]
    pub row_policy: RowPolicyConfig,

    /// Observer plugins, invoked in declaration order.
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerImpl {
    #[default]
    Generic,
}

#[derive(Debug, Deserialize, Default)]
pub struct SchedulerConfig {
    #[serde(rename = "impl", default)]
    pub implementation: SchedulerImpl,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerImpl {
    #[default]
    #[serde(rename = "FRFCFS")]
    FrFcfs,
    BudgetAware,
}

#[derive(Debug, Deserialize, Default)]
pub struct RefreshConfig {
    #[serde(rename = "impl", default)]
    pub implementation: RefreshImpl,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshImpl {
    #[default]
    AllBank,
}

#[derive(Debug, Deserialize)]
pub struct RowPolicyConfig {
    #[serde(rename = "impl", default)]
    pub implementation: RowPolicyImpl,

    /// Cycles a row may stay open under the timeout policy.
    #[serde(default = "default_row_timeout")]
    pub timeout: u64,
}

impl Default for RowPolicyConfig {
    fn default() -> Self {
        RowPolicyConfig {
            implementation: RowPolicyImpl::default(),
            timeout: DEFAULT_ROW_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowPolicyImpl {
    #[default]
    OpenRow,
    Timeout,
}

#[derive(Debug, Deserialize)]
pub struct PluginConfig {
    #[serde(rename = "impl")]
    pub implementation: PluginImpl,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PluginImpl {
    CommandCounter,
}

#[derive(Debug, Deserialize, Default)]
pub struct AddrMapperConfig {
    #[serde(rename = "impl", default)]
    pub implementation: AddrMapperImpl,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddrMapperImpl {
    #[default]
    Linear,
}

impl Config {
    /// Loads and validates a YAML configuration file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config =
            serde_yaml_ng::from_str(&content).map_err(|err| ConfigError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let config: Config =
            serde_yaml_ng::from_str(content).map_err(|err| ConfigError::Parse {
                path: "<inline>".into(),
                message: err.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.frontend.clock_ratio == 0 || self.memory_system.clock_ratio == 0 {
            return Err(ConfigError::BadParameter {
                name: "clock_ratio",
                message: "clock ratios must be at least 1".into(),
            });
        }
        if self.memory_system.dram.org.channel == 0 {
            return Err(ConfigError::BadParameter {
                name: "channel",
                message: "at least one channel is required".into(),
            });
        }

        let ctrl = &self.memory_system.controller;
        let in_range = |w: f32| (0.0..=1.0).contains(&w);
        if !in_range(ctrl.wr_low_watermark)
            || !in_range(ctrl.wr_high_watermark)
            || ctrl.wr_low_watermark >= ctrl.wr_high_watermark
        {
            return Err(ConfigError::BadParameter {
                name: "wr_watermarks",
                message: format!(
                    "watermarks must satisfy 0 <= low < high <= 1 (got {} / {})",
                    ctrl.wr_low_watermark, ctrl.wr_high_watermark
                ),
            });
        }
        if ctrl.read_buffer_size == 0 || ctrl.write_buffer_size == 0 {
            return Err(ConfigError::BadParameter {
                name: "buffer_size",
                message: "request buffers need a nonzero capacity".into(),
            });
        }
        Ok(())
    }
}

fn default_clock_ratio() -> u32 {
    DEFAULT_CLOCK_RATIO
}

fn default_channels() -> usize {
    1
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_wr_low_watermark() -> f32 {
    DEFAULT_WR_LOW_WATERMARK
}

fn default_wr_high_watermark() -> f32 {
    DEFAULT_WR_HIGH_WATERMARK
}

fn default_row_timeout() -> u64 {
    DEFAULT_ROW_TIMEOUT
}
