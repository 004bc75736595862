//! VCD waveform trace of the harness/DUT boundary, one timestamp per tick.

use crate::core::Tick;
use crate::error::Result;
use crate::signals::Signals;
use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use vcd_ng::{IdCode, SimulationCommand, TimescaleUnit, Value, Writer};

const TOP_SCOPE: &str = "cgra_tb";

/// Scalar levels in declaration order: clocks, resets, then per-channel handshake lines.
fn levels(signals: &Signals) -> Vec<bool> {
    let inputs = &signals.inputs;
    let outputs = &signals.outputs;
    let mut levels = vec![
        inputs.clock,
        inputs.config_clock,
        !inputs.reset,
        inputs.config_reset,
    ];
    for i in 0..signals.input_count() {
        levels.push(inputs.in_valid[i]);
        levels.push(outputs.in_ready.get(i).copied().unwrap_or(false));
    }
    for j in 0..signals.output_count() {
        levels.push(outputs.out_valid.get(j).copied().unwrap_or(false));
        levels.push(inputs.out_ready[j]);
    }
    levels
}

fn value(level: bool) -> Value {
    if level {
        Value::V1
    } else {
        Value::V0
    }
}

/// Write handle shared between the VCD writer and the trace, so the trace can flush on close.
struct SharedSink<W>(Rc<RefCell<W>>);

impl<W: Write> Write for SharedSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.borrow_mut().flush()
    }
}

/// Streams signal changes into a VCD file.
pub struct VcdTrace<W: Write> {
    writer: Writer<SharedSink<W>>,
    sink: Rc<RefCell<W>>,
    ids: Vec<IdCode>,
    last: Option<Vec<bool>>,
}

impl VcdTrace<BufWriter<File>> {
    /// Creates `path` and writes the header for a DUT with the given channel counts.
    pub fn create(path: impl AsRef<Path>, input_count: usize, output_count: usize) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file), input_count, output_count)
    }
}

impl<W: Write> VcdTrace<W> {
    pub fn new(sink: W, input_count: usize, output_count: usize) -> Result<Self> {
        let sink = Rc::new(RefCell::new(sink));
        let mut writer = Writer::new(SharedSink(Rc::clone(&sink)));
        writer.timescale(1, TimescaleUnit::NS)?;
        writer.add_module(TOP_SCOPE)?;

        let mut names = vec![
            "clk".to_string(),
            "clk_bs".to_string(),
            "rst_n".to_string(),
            "rst_bs".to_string(),
        ];
        for i in 0..input_count {
            names.push(format!("data_in_valid_{i}"));
            names.push(format!("data_in_ready_{i}"));
        }
        for j in 0..output_count {
            names.push(format!("data_out_valid_{j}"));
            names.push(format!("data_out_ready_{j}"));
        }
        let ids = names
            .iter()
            .map(|name| writer.add_wire(1, name))
            .collect::<std::io::Result<Vec<_>>>()?;

        writer.upscope()?;
        writer.enddefinitions()?;
        writer.begin(SimulationCommand::Dumpvars)?;
        Ok(Self {
            writer,
            sink,
            ids,
            last: None,
        })
    }

    /// Records the signal state after the DUT recomputed its outputs for `tick`.
    pub fn dump(&mut self, tick: Tick, signals: &Signals) -> Result<()> {
        let now = levels(signals);
        self.writer.timestamp(tick)?;
        match self.last.take() {
            None => {
                for (&id, &level) in self.ids.iter().zip(&now) {
                    self.writer.change_scalar(id, value(level))?;
                }
            }
            Some(prev) => {
                for ((&id, &level), &was) in self.ids.iter().zip(&now).zip(&prev) {
                    if level != was {
                        self.writer.change_scalar(id, value(level))?;
                    }
                }
            }
        }
        self.last = Some(now);
        Ok(())
    }

    /// Number of traced scalar signals.
    pub fn signal_count(&self) -> usize {
        self.ids.len()
    }

    /// Finishes the trace and flushes the sink, reporting any write error.
    pub fn close(self) -> Result<()> {
        let Self { writer, sink, .. } = self;
        drop(writer);
        sink.borrow_mut().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Id code the header assigns to `name`.
    fn id_of(text: &str, name: &str) -> String {
        text.lines()
            .map(|l| l.split_whitespace().collect::<Vec<_>>())
            .find(|t| t.len() > 4 && t[0] == "$var" && t[4] == name)
            .map(|t| t[3].to_string())
            .unwrap()
    }

    /// Value-change lines written after timestamp `#tick`, up to the next timestamp.
    fn changes_at<'a>(text: &'a str, tick: u64) -> Vec<&'a str> {
        let stamp = format!("#{tick}");
        text.lines()
            .skip_while(|l| l.trim() != stamp)
            .skip(1)
            .take_while(|l| !l.starts_with('#'))
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect()
    }

    #[test]
    fn writes_header_and_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waveform.vcd");
        let mut trace = VcdTrace::create(&path, 2, 1).unwrap();
        let signal_count = trace.signal_count();
        assert_eq!(signal_count, 4 + 2 * 2 + 2);

        let mut s = Signals::new(2, 1);
        s.inputs.reset = true;
        trace.dump(0, &s).unwrap();
        s.inputs.clock = true;
        trace.dump(1, &s).unwrap();
        trace.dump(2, &s).unwrap();
        trace.close().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("$enddefinitions"));
        assert!(text.contains("data_out_ready_0"));

        let clk = id_of(&text, "clk");
        let rst_n = id_of(&text, "rst_n");
        let first = changes_at(&text, 0);
        assert_eq!(first.len(), signal_count);
        // Reset asserted is written as rst_n low.
        assert!(first.contains(&format!("0{rst_n}").as_str()));
        assert!(first.contains(&format!("0{clk}").as_str()));
        assert_eq!(changes_at(&text, 1), vec![format!("1{clk}")]);
        assert!(text.lines().any(|l| l.trim() == "#2"));
        assert!(changes_at(&text, 2).is_empty());
    }

    struct FailingFlush;

    impl Write for FailingFlush {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    #[test]
    fn close_reports_flush_failure() {
        let mut trace = VcdTrace::new(FailingFlush, 1, 1).unwrap();
        trace.dump(0, &Signals::new(1, 1)).unwrap();
        let err = trace.close().unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }
}
