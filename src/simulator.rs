//! Protocol driver: steps logical time one tick at a time through reset, configuration
//! load and data streaming, performing the ready/valid bookkeeping for every channel.

use crate::core::{clock_level_at, run_bound, Cycle, Phase, PhaseSchedule, Tick, CONFIG_BURST_WORDS};
use crate::dut::Dut;
use crate::error::{HarnessError, Result};
use crate::kernel::Kernel;
use crate::recorder::Recorder;
use crate::signals::Signals;
use crate::trace::VcdTrace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::BufWriter;
use tracing::{debug, info, trace, warn};

/// Per-run stimulus parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Samples to push through every active input channel.
    pub samples: usize,
    /// Timestamp slots per channel; must be at least `samples`.
    pub sample_capacity: usize,
    /// Safety floor for the run length in ticks.
    pub forced_min_ticks: Tick,
    /// Seed for the stimulus data generator.
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            samples: 100,
            sample_capacity: 100,
            forced_min_ticks: 20,
            seed: 0,
        }
    }
}

impl RunConfig {
    pub fn with_samples(samples: usize) -> Self {
        Self {
            samples,
            sample_capacity: samples,
            ..Self::default()
        }
    }
}

/// Frozen outcome of a run, handed to the metrics analyzer.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub kernel: String,
    pub inputs_active: Vec<bool>,
    pub outputs_active: Vec<bool>,
    pub samples: usize,
    pub tables: Recorder,
    /// Per output: active data-phase cycles observed before its first output.
    pub stall_cycles: Vec<Cycle>,
    /// Per output: every transfer seen, including those past the recording budget.
    pub produced: Vec<u64>,
    pub first_input: Option<Tick>,
    pub last_output: Option<Tick>,
    /// Ticks simulated (the run bound).
    pub ticks: Tick,
    /// Active clock ticks spent in the streaming phase.
    pub streaming_cycles: Cycle,
}

/// Drives one kernel through one DUT.
pub struct Simulator<D: Dut> {
    kernel: Kernel,
    config: RunConfig,
    schedule: PhaseSchedule,
    bound: Tick,
    dut: D,
    signals: Signals,
    tick: Tick,
    phase: Phase,
    /// Index of the next configuration word to load.
    load_cursor: usize,
    recorder: Recorder,
    /// Per input: the value on the data lines was taken (or none was offered yet).
    consumed: Vec<bool>,
    produced: Vec<u64>,
    stall_cycles: Vec<Cycle>,
    first_input: Option<Tick>,
    last_output: Option<Tick>,
    streaming_cycles: Cycle,
    rng: StdRng,
    trace: Option<VcdTrace<BufWriter<File>>>,
}

impl<D: Dut> Simulator<D> {
    /// Validates the kernel and run configuration against each other and the DUT's ports.
    pub fn new(kernel: Kernel, config: RunConfig, dut: D) -> Result<Self> {
        kernel.validate()?;
        if config.sample_capacity < config.samples {
            return Err(HarnessError::configuration(format!(
                "sample capacity {} is smaller than the {} requested samples",
                config.sample_capacity, config.samples
            )));
        }
        if dut.input_count() != kernel.input_count || dut.output_count() != kernel.output_count {
            return Err(HarnessError::configuration(format!(
                "DUT exposes {} inputs / {} outputs but kernel `{}` expects {} / {}",
                dut.input_count(),
                dut.output_count(),
                kernel.name,
                kernel.input_count,
                kernel.output_count
            )));
        }

        let n_in = kernel.input_count;
        let n_out = kernel.output_count;
        Ok(Self {
            schedule: PhaseSchedule::new(kernel.pe_count),
            bound: run_bound(kernel.pe_count, config.samples, config.forced_min_ticks),
            signals: Signals::new(n_in, n_out),
            tick: 0,
            phase: Phase::Reset,
            load_cursor: 0,
            recorder: Recorder::new(n_in, n_out, config.sample_capacity),
            consumed: vec![true; n_in],
            produced: vec![0; n_out],
            stall_cycles: vec![0; n_out],
            first_input: None,
            last_output: None,
            streaming_cycles: 0,
            rng: StdRng::seed_from_u64(config.seed),
            trace: None,
            kernel,
            config,
            dut,
        })
    }

    /// Dumps every tick's signal state into `trace`.
    pub fn with_trace(mut self, trace: VcdTrace<BufWriter<File>>) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Advances logical time by one tick.
    pub fn step(&mut self) -> Result<()> {
        let phase = self.schedule.phase_at(self.tick);
        if phase != self.phase {
            info!(tick = self.tick, from = %self.phase, to = %phase, "phase transition");
            self.phase = phase;
        }

        let mut next = self.drive(phase, self.signals.clone());
        next.outputs = self.dut.eval(&next.inputs);
        if let Some(trace) = self.trace.as_mut() {
            trace.dump(self.tick, &next)?;
        }
        self.signals = next;
        self.tick += 1;
        Ok(())
    }

    /// Runs until the tick bound is reached.
    pub fn run_to_completion(&mut self) -> Result<()> {
        info!(
            kernel = %self.kernel.name,
            pes = self.kernel.pe_count,
            samples = self.config.samples,
            bound = self.bound,
            "starting run"
        );
        while !self.is_done() {
            self.step()?;
        }
        if let Some(trace) = self.trace.take() {
            trace.close()?;
        }
        for (j, &produced) in self.produced.iter().enumerate() {
            if self.kernel.output_active(j) && produced == 0 {
                warn!(channel = j, "output channel never produced data");
            }
        }
        info!(ticks = self.tick, "run finished");
        Ok(())
    }

    /// Applies this tick's phase-specific updates to the driven signals, then toggles both clocks.
    fn drive(&mut self, phase: Phase, mut s: Signals) -> Signals {
        let active = s.inputs.clock;
        let config_active = s.inputs.config_clock;
        debug_assert_eq!(active, clock_level_at(self.tick));

        s.inputs.reset = phase == Phase::Reset;
        s.inputs.config_reset = phase == Phase::Reset;
        s.inputs.out_ready.iter_mut().for_each(|r| *r = false);

        match phase {
            Phase::Reset => {}
            Phase::ConfigLoad => {
                if config_active {
                    self.load_burst(&mut s);
                }
            }
            Phase::ConfigDrain => {
                if config_active {
                    s.inputs.config_bus = [0; CONFIG_BURST_WORDS];
                }
            }
            Phase::Streaming => {
                if config_active {
                    s.inputs.config_bus = [0; CONFIG_BURST_WORDS];
                }
                self.stream(active, &mut s);
            }
        }

        s.inputs.clock = !s.inputs.clock;
        s.inputs.config_clock = !s.inputs.config_clock;
        s
    }

    fn load_burst(&mut self, s: &mut Signals) {
        match self.kernel.burst(self.load_cursor / CONFIG_BURST_WORDS) {
            Some(burst) => {
                debug!(tick = self.tick, word = self.load_cursor, ?burst, "configuration burst");
                s.inputs.config_bus = burst;
                self.load_cursor += CONFIG_BURST_WORDS;
            }
            None => {
                warn!(tick = self.tick, word = self.load_cursor, "configuration payload exhausted");
                s.inputs.config_bus = [0; CONFIG_BURST_WORDS];
            }
        }
    }

    fn stream(&mut self, active: bool, s: &mut Signals) {
        for (j, ready) in s.inputs.out_ready.iter_mut().enumerate() {
            *ready = self.kernel.output_active(j);
        }
        if !active {
            return;
        }
        let tick = self.tick;
        self.streaming_cycles += 1;

        for i in 0..self.kernel.input_count {
            let accepted = self.recorder.input(i).map_or(0, |t| t.len());
            if !self.kernel.input_active(i) || accepted >= self.config.samples {
                s.inputs.in_valid[i] = false;
                continue;
            }
            // Data stays put while an offered word is still waiting for ready.
            if !s.inputs.in_valid[i] || self.consumed[i] {
                s.inputs.in_data[i] = self.rng.gen_range(-50i32..50) as u32;
            }
            s.inputs.in_valid[i] = true;
            let fires = s.input_fires(i);
            if fires {
                self.recorder.record_input(i, tick);
                self.first_input.get_or_insert(tick);
                trace!(tick, channel = i, data = s.inputs.in_data[i], "input accepted");
            }
            self.consumed[i] = fires;
        }

        for j in 0..self.kernel.output_count {
            if !self.kernel.output_active(j) {
                continue;
            }
            if s.output_fires(j) {
                self.produced[j] += 1;
                self.last_output = Some(tick);
                if self.recorder.record_output(j, tick) {
                    trace!(tick, channel = j, data = s.outputs.out_data[j], "output produced");
                } else {
                    warn!(tick, channel = j, "output beyond recording budget");
                }
            } else if self.produced[j] == 0 {
                self.stall_cycles[j] += 1;
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.tick >= self.bound
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    pub fn bound(&self) -> Tick {
        self.bound
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn dut(&self) -> &D {
        &self.dut
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Snapshot of everything the metrics analyzer needs.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            kernel: self.kernel.name.clone(),
            inputs_active: self.kernel.inputs.clone(),
            outputs_active: self.kernel.outputs.clone(),
            samples: self.config.samples,
            tables: self.recorder.clone(),
            stall_cycles: self.stall_cycles.clone(),
            produced: self.produced.clone(),
            first_input: self.first_input,
            last_output: self.last_output,
            ticks: self.tick,
            streaming_cycles: self.streaming_cycles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dut::{LoopbackDut, StalledDut};
    use crate::metrics::Metrics;

    fn loopback_sim(kernel: Kernel, config: RunConfig) -> Simulator<LoopbackDut> {
        let dut = LoopbackDut::new(kernel.input_count, kernel.output_count, 1, 4);
        Simulator::new(kernel, config, dut).unwrap()
    }

    #[test]
    fn bypass_run_streams_every_sample() {
        let mut sim = loopback_sim(Kernel::bypass_4x4(), RunConfig::with_samples(100));
        sim.run_to_completion().unwrap();
        assert_eq!(sim.current_tick(), 282);

        let summary = sim.summary();
        for j in 0..4 {
            assert_eq!(summary.tables.output(j).unwrap().len(), 100);
            assert_eq!(summary.tables.input(j).unwrap().len(), 100);
        }
        let m = Metrics::analyze(&summary);
        assert_eq!(m.execution_cycles, Some(102));
        assert!((m.initiation_interval.unwrap() - 1.0).abs() < 1e-9);
        assert!((m.latency.unwrap() - 2.0).abs() < 1e-9);
        assert!((m.input_bandwidth - 128.0).abs() < 1e-9);
        assert!((m.output_bandwidth - 128.0).abs() < 1e-9);
    }

    #[test]
    fn bypass_run_loads_whole_configuration() {
        let kernel = Kernel::bypass_4x4();
        let mut sim = loopback_sim(kernel.clone(), RunConfig::with_samples(4));
        sim.run_to_completion().unwrap();
        let loaded: Vec<u32> = sim.dut().loaded_config().iter().flatten().copied().collect();
        assert_eq!(loaded, kernel.words);
    }

    #[test]
    fn inactive_output_records_nothing() {
        let kernel = Kernel::bypass_4x4().with_output(3, false);
        let mut sim = loopback_sim(kernel, RunConfig::with_samples(100));
        sim.run_to_completion().unwrap();
        let summary = sim.summary();
        assert!(summary.tables.output(3).unwrap().is_empty());
        for j in 0..3 {
            assert_eq!(summary.tables.output(j).unwrap().len(), 100);
        }
        let m = Metrics::analyze(&summary);
        assert_eq!(m.outputs[3].bandwidth, 0.0);
        assert!((m.output_bandwidth - 96.0).abs() < 1e-9);
    }

    #[test]
    fn stalled_dut_terminates_at_bound() {
        let kernel = Kernel::bypass_4x4();
        let config = RunConfig {
            forced_min_ticks: 10,
            ..RunConfig::with_samples(100)
        };
        let dut = StalledDut::new(4, 4);
        let mut sim = Simulator::new(kernel, config, dut).unwrap();
        sim.run_to_completion().unwrap();
        assert_eq!(sim.current_tick(), 282);

        let summary = sim.summary();
        assert_eq!(summary.streaming_cycles, 115);
        assert_eq!(summary.last_output, None);
        assert!(summary.stall_cycles.iter().all(|&c| c == 115));
        let m = Metrics::analyze(&summary);
        assert_eq!(m.execution_cycles, None);
        assert_eq!(m.output_bandwidth, 0.0);
        assert!((m.latency.unwrap() - 115.0).abs() < 1e-9);
    }

    #[test]
    fn forced_floor_extends_short_runs() {
        let config = RunConfig {
            forced_min_ticks: 1_000,
            ..RunConfig::with_samples(2)
        };
        let mut sim = Simulator::new(Kernel::bypass_4x4(), config, StalledDut::new(4, 4)).unwrap();
        sim.run_to_completion().unwrap();
        assert_eq!(sim.current_tick(), 1_000);
    }

    #[test]
    fn input_timestamps_follow_handshake() {
        let mut sim = loopback_sim(Kernel::bypass_4x4(), RunConfig::with_samples(10));
        let stream_start = PhaseSchedule::new(16).stream_start;
        let mut expected = vec![Vec::new(); 4];
        while !sim.is_done() {
            let t = sim.current_tick();
            let before: Vec<usize> = sim.recorder().inputs().iter().map(|t| t.len()).collect();
            let ready: Vec<bool> = sim.signals().outputs.in_ready.clone();
            sim.step().unwrap();
            for i in 0..4 {
                let fired = t >= stream_start && clock_level_at(t) && ready[i] && before[i] < 10;
                if fired {
                    expected[i].push(t);
                }
                let recorded = sim.recorder().input(i).unwrap().len() > before[i];
                assert_eq!(recorded, fired, "tick {t} channel {i}");
            }
        }
        for i in 0..4 {
            let samples = sim.recorder().input(i).unwrap().samples();
            assert_eq!(samples, expected[i].as_slice());
            assert!(samples.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn backpressure_holds_data_stable() {
        // Depth-1 FIFO with latency 1 halves throughput
        let kernel = Kernel::bypass_4x4();
        let dut = LoopbackDut::new(4, 4, 1, 1);
        let mut sim = Simulator::new(kernel, RunConfig::with_samples(8), dut).unwrap();
        let mut last_offer: Option<(u32, bool)> = None;
        while !sim.is_done() {
            let t = sim.current_tick();
            sim.step().unwrap();
            if t < 52 || !clock_level_at(t) {
                continue;
            }
            let s = sim.signals();
            let offer = (s.inputs.in_data[0], s.inputs.in_valid[0]);
            if let Some((data, valid)) = last_offer {
                if valid && offer.1 && !sim.recorder().input(0).unwrap().samples().contains(&(t - 2)) {
                    assert_eq!(offer.0, data, "data changed under backpressure at tick {t}");
                }
            }
            last_offer = Some(offer);
        }
        let m = Metrics::analyze(&sim.summary());
        assert!(m.inputs[0].initiation_interval.unwrap() > 1.0);
    }

    #[test]
    fn undersized_capacity_is_rejected() {
        let config = RunConfig {
            samples: 10,
            sample_capacity: 9,
            ..RunConfig::default()
        };
        let dut = StalledDut::new(4, 4);
        let err = Simulator::new(Kernel::bypass_4x4(), config, dut).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn port_mismatch_is_rejected() {
        let dut = StalledDut::new(2, 4);
        let err = Simulator::new(Kernel::bypass_4x4(), RunConfig::default(), dut)
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn same_seed_same_stimulus() {
        let run = |seed| {
            let config = RunConfig {
                seed,
                ..RunConfig::with_samples(5)
            };
            let mut sim = loopback_sim(Kernel::bypass_4x4(), config);
            let mut data = Vec::new();
            while !sim.is_done() {
                sim.step().unwrap();
                data.push(sim.signals().inputs.in_data.clone());
            }
            data
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn inactive_input_is_never_offered() {
        let kernel = Kernel::bypass_4x4().with_input(2, false);
        let mut sim = loopback_sim(kernel, RunConfig::with_samples(50));
        while !sim.is_done() {
            sim.step().unwrap();
            assert!(!sim.signals().inputs.in_valid[2], "tick {}", sim.current_tick());
        }

        let summary = sim.summary();
        assert!(summary.tables.input(2).unwrap().is_empty());
        assert!(summary.tables.output(2).unwrap().is_empty());
        for i in [0, 1, 3] {
            assert_eq!(summary.tables.input(i).unwrap().len(), 50);
        }
        let m = Metrics::analyze(&summary);
        assert_eq!(m.inputs[2].initiation_interval, None);
        assert_eq!(m.inputs[2].bandwidth, 0.0);
        assert_eq!(m.outputs[2].latency, Some(summary.streaming_cycles));
        assert!((m.initiation_interval.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn fan_in_counts_transfers_past_the_budget() {
        let kernel = Kernel {
            output_count: 1,
            outputs: vec![true],
            ..Kernel::bypass_4x4()
        };
        let dut = LoopbackDut::new(4, 1, 1, 4);
        let mut sim = Simulator::new(kernel, RunConfig::with_samples(100), dut).unwrap();
        sim.run_to_completion().unwrap();

        let summary = sim.summary();
        let table = summary.tables.output(0).unwrap();
        assert_eq!(table.len(), 100);
        assert!(summary.produced[0] > 100);
        assert_eq!(summary.produced[0], table.len() as u64 + table.overflow());
        assert!(summary.last_output > table.last());

        let m = Metrics::analyze(&summary);
        assert_eq!(m.outputs[0].produced, summary.produced[0]);
        assert_eq!(m.outputs[0].recorded, 100);
    }
}
