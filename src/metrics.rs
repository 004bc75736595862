//! Metrics analysis: initiation interval, latency, bandwidth and execution cycles from a frozen run.

use crate::core::{ticks_to_cycles, ticks_to_cycles_f64, Cycle};
use crate::recorder::TimestampTable;
use crate::simulator::RunSummary;

/// Bits carried by one data word.
pub const WORD_BITS: f64 = 32.0;

/// Per input channel.
#[derive(Clone, Debug, PartialEq)]
pub struct InputMetrics {
    pub channel: usize,
    pub active: bool,
    pub accepted: usize,
    /// Mean cycles between consecutive accepted samples; `None` with fewer than two samples.
    pub initiation_interval: Option<f64>,
    /// Bits per cycle; 0 with no samples.
    pub bandwidth: f64,
}

/// Per output channel.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputMetrics {
    pub channel: usize,
    pub active: bool,
    /// Every transfer seen on the channel, including those past the recording budget.
    pub produced: u64,
    /// Transfers with a stored timestamp.
    pub recorded: usize,
    /// Data-phase cycles before the first output; `None` for inactive channels.
    pub latency: Option<Cycle>,
    /// Bits per cycle; 0 with no samples.
    pub bandwidth: f64,
}

/// Per-channel and aggregate results of one run. Aggregate means only cover
/// active channels that define the statistic.
#[derive(Clone, Debug, PartialEq)]
pub struct Metrics {
    pub kernel: String,
    pub inputs: Vec<InputMetrics>,
    pub outputs: Vec<OutputMetrics>,
    pub initiation_interval: Option<f64>,
    pub latency: Option<f64>,
    pub input_bandwidth: f64,
    pub output_bandwidth: f64,
    /// `1 + (last output - first input)` in cycles; `None` unless both happened.
    pub execution_cycles: Option<Cycle>,
}

/// Mean spacing of consecutive samples, in cycles.
pub fn initiation_interval(table: &TimestampTable) -> Option<f64> {
    let samples = table.samples();
    if samples.len() < 2 {
        return None;
    }
    let total: f64 = samples
        .windows(2)
        .map(|w| ticks_to_cycles_f64(w[1] - w[0]))
        .sum();
    Some(total / (samples.len() - 1) as f64)
}

/// `32 * count / (1 + span in cycles)`, 0 for an empty table.
pub fn bandwidth(table: &TimestampTable) -> f64 {
    match (table.first(), table.last()) {
        (Some(first), Some(last)) => {
            WORD_BITS * table.len() as f64 / (1.0 + ticks_to_cycles_f64(last - first))
        }
        _ => 0.0,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

impl Metrics {
    /// Derives every statistic from the run's timestamp tables. Pure: same input, same result.
    pub fn analyze(run: &RunSummary) -> Self {
        let inputs: Vec<InputMetrics> = run
            .tables
            .inputs()
            .iter()
            .enumerate()
            .map(|(channel, table)| {
                let active = run.inputs_active.get(channel).copied().unwrap_or(false);
                InputMetrics {
                    channel,
                    active,
                    accepted: table.len(),
                    initiation_interval: initiation_interval(table),
                    bandwidth: bandwidth(table),
                }
            })
            .collect();

        let outputs: Vec<OutputMetrics> = run
            .tables
            .outputs()
            .iter()
            .enumerate()
            .map(|(channel, table)| {
                let active = run.outputs_active.get(channel).copied().unwrap_or(false);
                OutputMetrics {
                    channel,
                    active,
                    produced: run.produced.get(channel).copied().unwrap_or(0),
                    recorded: table.len(),
                    latency: active.then(|| run.stall_cycles.get(channel).copied().unwrap_or(0)),
                    bandwidth: bandwidth(table),
                }
            })
            .collect();

        let initiation_interval = mean(
            inputs
                .iter()
                .filter(|m| m.active)
                .filter_map(|m| m.initiation_interval),
        );
        let latency = mean(outputs.iter().filter_map(|m| m.latency.map(|c| c as f64)));
        let input_bandwidth: f64 = inputs.iter().map(|m| m.bandwidth).sum();
        let output_bandwidth: f64 = outputs.iter().map(|m| m.bandwidth).sum();
        let execution_cycles = match (run.first_input, run.last_output) {
            (Some(first), Some(last)) => Some(1 + ticks_to_cycles(last.saturating_sub(first))),
            _ => None,
        };

        Self {
            kernel: run.kernel.clone(),
            inputs,
            outputs,
            initiation_interval,
            latency,
            input_bandwidth,
            output_bandwidth,
            execution_cycles,
        }
    }

    /// Input plus output bandwidth, bits per cycle.
    pub fn total_bandwidth(&self) -> f64 {
        self.input_bandwidth + self.output_bandwidth
    }
}
