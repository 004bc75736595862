//! Harness configuration: run parameters and loopback model settings, loadable from TOML.
//!
//! ```toml
//! # cgra-tb.toml
//! samples = 100
//! forced_min_ticks = 20
//! seed = 1
//! trace = "waveform.vcd"
//! dut_latency = 1
//! dut_depth = 4
//! ```

use crate::core::{Cycle, Tick};
use crate::error::{HarnessError, Result};
use crate::simulator::RunConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Samples pushed through every active input.
    pub samples: usize,
    /// Timestamp slots per channel; defaults to `samples`.
    pub sample_capacity: Option<usize>,
    /// Lower bound on the run length in ticks.
    pub forced_min_ticks: Tick,
    pub seed: u64,
    /// VCD waveform destination; no trace when unset.
    pub trace: Option<PathBuf>,
    /// Loopback model latency in cycles.
    pub dut_latency: Cycle,
    /// Loopback model FIFO depth per output.
    pub dut_depth: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            samples: 100,
            sample_capacity: None,
            forced_min_ticks: 20,
            seed: 0,
            trace: None,
            dut_latency: 1,
            dut_depth: 4,
        }
    }
}

impl HarnessConfig {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| HarnessError::parse(origin, e))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text, path)?;
        tracing::debug!(path = %path.display(), ?config, "loaded harness configuration");
        Ok(config)
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            samples: self.samples,
            sample_capacity: self.sample_capacity.unwrap_or(self.samples),
            forced_min_ticks: self.forced_min_ticks,
            seed: self.seed,
        }
    }
}
