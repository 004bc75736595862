//! Signal values exchanged with the device under test on every tick.

use crate::core::CONFIG_BURST_WORDS;

/// Signals the harness drives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DutInputs {
    pub clock: bool,
    pub config_clock: bool,
    /// Main reset asserted (the port itself is active low).
    pub reset: bool,
    /// Configuration-path reset asserted.
    pub config_reset: bool,
    pub config_bus: [u32; CONFIG_BURST_WORDS],
    pub in_data: Vec<u32>,
    pub in_valid: Vec<bool>,
    pub out_ready: Vec<bool>,
}

impl DutInputs {
    pub fn new(input_count: usize, output_count: usize) -> Self {
        Self {
            clock: false,
            config_clock: false,
            reset: false,
            config_reset: false,
            config_bus: [0; CONFIG_BURST_WORDS],
            in_data: vec![0; input_count],
            in_valid: vec![false; input_count],
            out_ready: vec![false; output_count],
        }
    }
}

/// Signals the device under test drives, as of its last recompute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DutOutputs {
    pub in_ready: Vec<bool>,
    pub out_valid: Vec<bool>,
    pub out_data: Vec<u32>,
}

impl DutOutputs {
    pub fn new(input_count: usize, output_count: usize) -> Self {
        Self {
            in_ready: vec![false; input_count],
            out_valid: vec![false; output_count],
            out_data: vec![0; output_count],
        }
    }
}

/// Complete signal state at a tick boundary. Each tick consumes one `Signals` and yields the next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signals {
    pub inputs: DutInputs,
    pub outputs: DutOutputs,
}

impl Signals {
    /// Power-on state: clocks low, nothing asserted.
    pub fn new(input_count: usize, output_count: usize) -> Self {
        Self {
            inputs: DutInputs::new(input_count, output_count),
            outputs: DutOutputs::new(input_count, output_count),
        }
    }

    pub fn input_count(&self) -> usize {
        self.inputs.in_valid.len()
    }

    pub fn output_count(&self) -> usize {
        self.inputs.out_ready.len()
    }

    /// Input transfer on `channel` under the current levels (valid and ready both high).
    pub fn input_fires(&self, channel: usize) -> bool {
        self.inputs.in_valid.get(channel).copied().unwrap_or(false)
            && self.outputs.in_ready.get(channel).copied().unwrap_or(false)
    }

    /// Output transfer on `channel` under the current levels.
    pub fn output_fires(&self, channel: usize) -> bool {
        self.outputs.out_valid.get(channel).copied().unwrap_or(false)
            && self.inputs.out_ready.get(channel).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_on_state_is_idle() {
        let s = Signals::new(3, 2);
        assert_eq!(s.input_count(), 3);
        assert_eq!(s.output_count(), 2);
        assert!(!s.inputs.clock && !s.inputs.reset);
        assert!((0..3).all(|i| !s.input_fires(i)));
    }

    #[test]
    fn transfer_needs_both_sides() {
        let mut s = Signals::new(1, 1);
        s.inputs.in_valid[0] = true;
        assert!(!s.input_fires(0));
        s.outputs.in_ready[0] = true;
        assert!(s.input_fires(0));

        s.outputs.out_valid[0] = true;
        assert!(!s.output_fires(0));
        s.inputs.out_ready[0] = true;
        assert!(s.output_fires(0));
        assert!(!s.output_fires(5));
    }
}
