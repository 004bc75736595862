//! Text execution report for a [`Metrics`] result.

use crate::metrics::Metrics;
use std::fmt;

const BANNER: &str = "---------------------------------------";

struct Opt<T>(Option<T>);

impl<T: fmt::Display> fmt::Display for Opt<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(v) => write!(f, "{v}"),
            None => write!(f, "n/a"),
        }
    }
}

fn rule(f: &mut fmt::Formatter<'_>, width: usize) -> fmt::Result {
    writeln!(f, "{}", "-".repeat(width))
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{BANNER}")?;
        writeln!(f, "-------- CGRA Execution Report --------")?;
        writeln!(f, "{BANNER}")?;
        writeln!(f, "Kernel: {}", self.kernel)?;
        writeln!(f)?;

        for m in self.inputs.iter().filter(|m| m.active) {
            let ii = m.initiation_interval.map(|v| format!("{v:.2}"));
            writeln!(f, "Initiation interval (II) in input {}: {}", m.channel, Opt(ii))?;
        }
        rule(f, 38)?;
        let ii = self.initiation_interval.map(|v| format!("{v:.2}"));
        writeln!(f, "Average Initiation Interval (II): {}", Opt(ii))?;
        writeln!(f)?;

        for m in self.outputs.iter().filter(|m| m.active) {
            writeln!(f, "Latency in output {}: {}", m.channel, Opt(m.latency))?;
        }
        rule(f, 22)?;
        let latency = self.latency.map(|v| format!("{v:.2}"));
        writeln!(f, "Average latency: {}", Opt(latency))?;
        writeln!(f)?;

        for m in self.inputs.iter().filter(|m| m.active) {
            writeln!(f, "Required bandwidth in input {}: {:.2} bits/cycle", m.channel, m.bandwidth)?;
        }
        rule(f, 44)?;
        writeln!(f, "Required input bandwidth: {:.2} bits/cycle", self.input_bandwidth)?;
        writeln!(f)?;

        for m in self.outputs.iter().filter(|m| m.active) {
            writeln!(f, "Required bandwidth in output {}: {:.2} bits/cycle", m.channel, m.bandwidth)?;
        }
        rule(f, 44)?;
        writeln!(f, "Required output bandwidth: {:.2} bits/cycle", self.output_bandwidth)?;
        writeln!(f)?;

        rule(f, 35)?;
        writeln!(f, "Required bandwidth: {:.2} bits/cycle", self.total_bandwidth())?;
        rule(f, 35)?;
        writeln!(f, "Execution cycles: {} cycles", Opt(self.execution_cycles))?;
        rule(f, 35)
    }
}
