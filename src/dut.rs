//! Device-under-test boundary and behavioral stand-ins used when no RTL model is attached.

use crate::core::{Cycle, CONFIG_BURST_WORDS};
use crate::signals::{DutInputs, DutOutputs};
use std::collections::VecDeque;

/// A clocked device under test. The harness calls [`Dut::eval`] exactly once per tick,
/// after updating every driven signal; the call recomputes the device's outputs.
pub trait Dut {
    fn input_count(&self) -> usize;
    fn output_count(&self) -> usize;
    fn eval(&mut self, inputs: &DutInputs) -> DutOutputs;
}

impl<D: Dut + ?Sized> Dut for Box<D> {
    fn input_count(&self) -> usize {
        (**self).input_count()
    }

    fn output_count(&self) -> usize {
        (**self).output_count()
    }

    fn eval(&mut self, inputs: &DutInputs) -> DutOutputs {
        (**self).eval(inputs)
    }
}

/// Rising-edge detector for one clock input.
#[derive(Clone, Copy, Debug, Default)]
struct Edge {
    last: bool,
}

impl Edge {
    fn rising(&mut self, level: bool) -> bool {
        let rose = level && !self.last;
        self.last = level;
        rose
    }
}

/// Configuration bursts captured on rising configuration clock edges.
#[derive(Clone, Debug, Default)]
struct ConfigPort {
    edge: Edge,
    bursts: Vec<[u32; CONFIG_BURST_WORDS]>,
}

impl ConfigPort {
    fn clock(&mut self, inputs: &DutInputs) {
        if !self.edge.rising(inputs.config_clock) {
            return;
        }
        if inputs.config_reset {
            self.bursts.clear();
        } else if inputs.config_bus != [0; CONFIG_BURST_WORDS] {
            self.bursts.push(inputs.config_bus);
        }
    }
}

/// In-flight word: value and the cycle from which it may leave.
#[derive(Clone, Copy, Debug)]
struct Flit {
    value: u32,
    ready_at: Cycle,
}

/// Loopback array: input channel `i` feeds output channel `i % outputs` through a FIFO
/// of `depth` entries, each word becoming visible `latency` cycles after acceptance.
#[derive(Clone, Debug)]
pub struct LoopbackDut {
    input_count: usize,
    output_count: usize,
    latency: Cycle,
    depth: usize,
    clock: Edge,
    cycle: Cycle,
    config: ConfigPort,
    queues: Vec<VecDeque<Flit>>,
    last: DutOutputs,
}

impl LoopbackDut {
    pub fn new(input_count: usize, output_count: usize, latency: Cycle, depth: usize) -> Self {
        Self {
            input_count,
            output_count,
            latency,
            depth: depth.max(1),
            clock: Edge::default(),
            cycle: 0,
            config: ConfigPort::default(),
            queues: vec![VecDeque::new(); output_count],
            last: DutOutputs::new(input_count, output_count),
        }
    }

    fn route(&self, input: usize) -> usize {
        input % self.output_count.max(1)
    }

    /// Configuration bursts received since the last configuration reset.
    pub fn loaded_config(&self) -> &[[u32; CONFIG_BURST_WORDS]] {
        &self.config.bursts
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    fn posedge(&mut self, inputs: &DutInputs) {
        if inputs.reset {
            self.cycle = 0;
            self.queues.iter_mut().for_each(VecDeque::clear);
            return;
        }
        self.cycle += 1;

        // Handshakes resolve against the levels presented before this edge.
        for (j, queue) in self.queues.iter_mut().enumerate() {
            if self.last.out_valid[j] && inputs.out_ready.get(j).copied().unwrap_or(false) {
                queue.pop_front();
            }
        }
        for i in 0..self.input_count {
            if inputs.in_valid.get(i).copied().unwrap_or(false) && self.last.in_ready[i] {
                let value = inputs.in_data.get(i).copied().unwrap_or(0);
                let ready_at = self.cycle + self.latency;
                let j = self.route(i);
                self.queues[j].push_back(Flit { value, ready_at });
            }
        }
    }

    fn outputs(&self, reset: bool) -> DutOutputs {
        let mut out = DutOutputs::new(self.input_count, self.output_count);
        for i in 0..self.input_count {
            out.in_ready[i] = !reset && self.queues[self.route(i)].len() < self.depth;
        }
        for (j, queue) in self.queues.iter().enumerate() {
            if let Some(flit) = queue.front().filter(|f| f.ready_at <= self.cycle) {
                out.out_valid[j] = !reset;
                out.out_data[j] = flit.value;
            }
        }
        out
    }
}

impl Dut for LoopbackDut {
    fn input_count(&self) -> usize {
        self.input_count
    }

    fn output_count(&self) -> usize {
        self.output_count
    }

    fn eval(&mut self, inputs: &DutInputs) -> DutOutputs {
        self.config.clock(inputs);
        if self.clock.rising(inputs.clock) {
            self.posedge(inputs);
        }
        self.last = self.outputs(inputs.reset);
        self.last.clone()
    }
}

/// Accepts every input once out of reset but never produces output.
#[derive(Clone, Debug)]
pub struct StalledDut {
    input_count: usize,
    output_count: usize,
}

impl StalledDut {
    pub fn new(input_count: usize, output_count: usize) -> Self {
        Self {
            input_count,
            output_count,
        }
    }
}

impl Dut for StalledDut {
    fn input_count(&self) -> usize {
        self.input_count
    }

    fn output_count(&self) -> usize {
        self.output_count
    }

    fn eval(&mut self, inputs: &DutInputs) -> DutOutputs {
        let mut out = DutOutputs::new(self.input_count, self.output_count);
        out.in_ready.iter_mut().for_each(|r| *r = !inputs.reset);
        out
    }
}
