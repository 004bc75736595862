//! Event recorder: bounded per-channel tables of handshake timestamps.

use crate::core::Tick;

/// Timestamps of accepted transfers on one channel, capped at a fixed sample budget.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TimestampTable {
    capacity: usize,
    samples: Vec<Tick>,
    /// Transfers seen after the table was full.
    overflow: u64,
}

impl TimestampTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            samples: Vec::with_capacity(capacity),
            overflow: 0,
        }
    }

    /// Appends `tick`; returns `false` (and counts an overflow) once the budget is used up.
    pub fn record(&mut self, tick: Tick) -> bool {
        if self.is_full() {
            self.overflow += 1;
            return false;
        }
        debug_assert!(
            self.samples.last().map_or(true, |&prev| prev < tick),
            "timestamps must be strictly increasing"
        );
        self.samples.push(tick);
        true
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    pub fn first(&self) -> Option<Tick> {
        self.samples.first().copied()
    }

    pub fn last(&self) -> Option<Tick> {
        self.samples.last().copied()
    }

    /// Recorded timestamps only; unpopulated slots are never exposed.
    pub fn samples(&self) -> &[Tick] {
        &self.samples
    }
}

/// Timestamp tables for every input and output channel of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recorder {
    inputs: Vec<TimestampTable>,
    outputs: Vec<TimestampTable>,
}

impl Recorder {
    pub fn new(input_count: usize, output_count: usize, capacity: usize) -> Self {
        Self {
            inputs: vec![TimestampTable::with_capacity(capacity); input_count],
            outputs: vec![TimestampTable::with_capacity(capacity); output_count],
        }
    }

    pub fn record_input(&mut self, channel: usize, tick: Tick) -> bool {
        self.inputs
            .get_mut(channel)
            .map_or(false, |table| table.record(tick))
    }

    pub fn record_output(&mut self, channel: usize, tick: Tick) -> bool {
        self.outputs
            .get_mut(channel)
            .map_or(false, |table| table.record(tick))
    }

    pub fn input(&self, channel: usize) -> Option<&TimestampTable> {
        self.inputs.get(channel)
    }

    pub fn output(&self, channel: usize) -> Option<&TimestampTable> {
        self.outputs.get(channel)
    }

    pub fn inputs(&self) -> &[TimestampTable] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TimestampTable] {
        &self.outputs
    }

    /// Earliest accepted input across all channels.
    pub fn first_input(&self) -> Option<Tick> {
        self.inputs.iter().filter_map(TimestampTable::first).min()
    }

    /// Latest produced output across all channels.
    pub fn last_output(&self) -> Option<Tick> {
        self.outputs.iter().filter_map(TimestampTable::last).max()
    }
}
