//! Logical time model: ticks, cycles, and the reset/configuration/streaming phase schedule.

use std::fmt;

/// Logical simulation time in half clock periods (discrete time).
pub type Tick = u64;

/// Whole clock cycles.
pub type Cycle = u64;

/// Two ticks (one low level, one high level) make up one clock period.
pub const TICKS_PER_CYCLE: Tick = 2;

/// Ticks spent with reset asserted at the start of every run.
pub const RESET_TICKS: Tick = 5;

/// Offset (in ticks, on top of `2 * pe_count`) at which data streaming starts.
pub const STREAM_START_OFFSET: Tick = 20;

/// Fixed part of the computed run bound: `50 + 2 * pe_count + 2 * samples`.
pub const RUN_BOUND_OFFSET: Tick = 50;

/// Configuration words applied per active configuration clock tick.
pub const CONFIG_BURST_WORDS: usize = 4;

/// Converts a tick span into clock cycles (truncating a trailing half period).
pub fn ticks_to_cycles(ticks: Tick) -> Cycle {
    ticks / TICKS_PER_CYCLE
}

/// Same as [`ticks_to_cycles`] but keeps the fractional half period.
pub fn ticks_to_cycles_f64(ticks: Tick) -> f64 {
    ticks as f64 / TICKS_PER_CYCLE as f64
}

/// Clock level at the start of `tick`; both clocks start low at tick 0 and toggle every tick.
pub fn clock_level_at(tick: Tick) -> bool {
    tick % TICKS_PER_CYCLE == 1
}

/// Run phase the harness is driving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Both reset lines asserted, everything else idle.
    Reset,
    /// One 4-word configuration burst per active configuration clock tick.
    ConfigLoad,
    /// Configuration bus held at zero until streaming starts.
    ConfigDrain,
    /// Ready/valid data handshakes on every active clock tick.
    Streaming,
}

impl Phase {
    /// Phase following this one, or `None` for streaming (the last phase).
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Reset => Some(Phase::ConfigLoad),
            Phase::ConfigLoad => Some(Phase::ConfigDrain),
            Phase::ConfigDrain => Some(Phase::Streaming),
            Phase::Streaming => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Reset => write!(f, "Reset"),
            Phase::ConfigLoad => write!(f, "ConfigLoad"),
            Phase::ConfigDrain => write!(f, "ConfigDrain"),
            Phase::Streaming => write!(f, "Streaming"),
        }
    }
}

/// Named phase boundaries for one kernel size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseSchedule {
    /// First tick of the configuration load window.
    pub config_start: Tick,
    /// First tick after the configuration load window.
    pub config_end: Tick,
    /// First tick of data streaming.
    pub stream_start: Tick,
}

impl PhaseSchedule {
    pub fn new(pe_count: usize) -> Self {
        let pe_ticks = TICKS_PER_CYCLE * pe_count as Tick;
        Self {
            config_start: RESET_TICKS,
            config_end: RESET_TICKS + pe_ticks,
            stream_start: STREAM_START_OFFSET + pe_ticks,
        }
    }

    /// Phase active at `tick`.
    pub fn phase_at(&self, tick: Tick) -> Phase {
        if tick < self.config_start {
            Phase::Reset
        } else if tick < self.config_end {
            Phase::ConfigLoad
        } else if tick < self.stream_start {
            Phase::ConfigDrain
        } else {
            Phase::Streaming
        }
    }
}

/// Tick at which a run stops: `max(50 + 2 * pe_count + 2 * samples, forced_min_ticks)`.
pub fn run_bound(pe_count: usize, samples: usize, forced_min_ticks: Tick) -> Tick {
    let computed = RUN_BOUND_OFFSET
        .saturating_add(TICKS_PER_CYCLE.saturating_mul(pe_count as Tick))
        .saturating_add(TICKS_PER_CYCLE.saturating_mul(samples as Tick));
    computed.max(forced_min_ticks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_boundaries_for_16_pes() {
        let s = PhaseSchedule::new(16);
        assert_eq!(s.phase_at(0), Phase::Reset);
        assert_eq!(s.phase_at(4), Phase::Reset);
        assert_eq!(s.phase_at(5), Phase::ConfigLoad);
        assert_eq!(s.phase_at(36), Phase::ConfigLoad);
        assert_eq!(s.phase_at(37), Phase::ConfigDrain);
        assert_eq!(s.phase_at(51), Phase::ConfigDrain);
        assert_eq!(s.phase_at(52), Phase::Streaming);
        assert_eq!(s.phase_at(10_000), Phase::Streaming);
    }

    #[test]
    fn phases_advance_in_order() {
        let mut phase = Phase::Reset;
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            phase = next;
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![Phase::Reset, Phase::ConfigLoad, Phase::ConfigDrain, Phase::Streaming]
        );
    }

    #[test]
    fn config_window_holds_one_burst_per_pe() {
        let s = PhaseSchedule::new(9);
        let bursts = (s.config_start..s.config_end)
            .filter(|&t| clock_level_at(t))
            .count();
        assert_eq!(bursts, 9);
    }

    #[test]
    fn tick_cycle_conversion() {
        assert_eq!(ticks_to_cycles(7), 3);
        assert!((ticks_to_cycles_f64(7) - 3.5).abs() < 1e-12);
        assert!(!clock_level_at(0));
        assert!(clock_level_at(1));
    }

    #[test]
    fn run_bound_respects_forced_minimum() {
        assert_eq!(run_bound(16, 100, 20), 282);
        assert_eq!(run_bound(1, 0, 500), 500);
    }

    #[test]
    fn run_bound_saturates() {
        assert_eq!(run_bound(16, usize::MAX, 0), Tick::MAX);
    }
}
