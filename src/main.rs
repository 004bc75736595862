//! `cgra-tb` - run the CGRA protocol harness and print its execution report.
//!
//! ```text
//! USAGE:
//!   cgra-tb run [--kernel k.toml] [--config c.toml] [options]   Run a kernel and report metrics
//!   cgra-tb encode-pe <pe.toml>                                 Print one PE's configuration words
//! ```

use anyhow::{Context, Result};
use cgra_tb::bitstream::PeConfig;
use cgra_tb::config::HarnessConfig;
use cgra_tb::dut::{Dut, LoopbackDut, StalledDut};
use cgra_tb::kernel::Kernel;
use cgra_tb::metrics::Metrics;
use cgra_tb::simulator::Simulator;
use cgra_tb::trace::VcdTrace;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cgra-tb", about = "CGRA cycle-level verification harness", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Drive a kernel through reset, configuration and streaming, then report metrics.
    Run {
        /// Kernel descriptor (TOML). Defaults to the built-in 4x4 bypass kernel.
        #[arg(long)]
        kernel: Option<PathBuf>,
        /// Harness configuration file (TOML); flags below override it.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Samples per active input channel.
        #[arg(long)]
        samples: Option<usize>,
        /// Minimum run length in ticks.
        #[arg(long)]
        min_ticks: Option<u64>,
        /// Stimulus seed.
        #[arg(long)]
        seed: Option<u64>,
        /// Write a VCD waveform to this path.
        #[arg(long)]
        vcd: Option<PathBuf>,
        /// Loopback model latency in cycles.
        #[arg(long)]
        dut_latency: Option<u64>,
        /// Use a model that never produces output.
        #[arg(long)]
        stalled: bool,
    },
    /// Print the four configuration words of one processing element.
    EncodePe {
        /// PE description (TOML).
        pe: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Run {
            kernel,
            config,
            samples,
            min_ticks,
            seed,
            vcd,
            dut_latency,
            stalled,
        } => {
            let mut harness = match config {
                Some(path) => HarnessConfig::from_toml_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => HarnessConfig::default(),
            };
            if let Some(samples) = samples {
                harness.samples = samples;
            }
            if let Some(min_ticks) = min_ticks {
                harness.forced_min_ticks = min_ticks;
            }
            if let Some(seed) = seed {
                harness.seed = seed;
            }
            if let Some(vcd) = vcd {
                harness.trace = Some(vcd);
            }
            if let Some(latency) = dut_latency {
                harness.dut_latency = latency;
            }
            cmd_run(kernel, &harness, stalled)?
        }
        Cmd::EncodePe { pe } => cmd_encode_pe(&pe)?,
    }

    Ok(())
}

fn cmd_run(kernel: Option<PathBuf>, harness: &HarnessConfig, stalled: bool) -> Result<()> {
    let kernel = match kernel {
        Some(path) => Kernel::from_toml_file(&path)
            .with_context(|| format!("loading kernel {}", path.display()))?,
        None => Kernel::bypass_4x4(),
    };

    let dut: Box<dyn Dut> = if stalled {
        Box::new(StalledDut::new(kernel.input_count, kernel.output_count))
    } else {
        Box::new(LoopbackDut::new(
            kernel.input_count,
            kernel.output_count,
            harness.dut_latency,
            harness.dut_depth,
        ))
    };

    let (n_in, n_out) = (kernel.input_count, kernel.output_count);
    let mut sim = Simulator::new(kernel, harness.run_config(), dut)?;
    if let Some(path) = &harness.trace {
        let trace = VcdTrace::create(path, n_in, n_out)
            .with_context(|| format!("creating trace {}", path.display()))?;
        sim = sim.with_trace(trace);
    }
    sim.run_to_completion()?;

    let metrics = Metrics::analyze(&sim.summary());
    println!();
    print!("{metrics}");
    Ok(())
}

fn cmd_encode_pe(path: &Path) -> Result<()> {
    let pe = PeConfig::from_toml_file(path)
        .with_context(|| format!("loading PE description {}", path.display()))?;
    let [w1, w2, w3, w4] = pe.encode()?;
    println!();
    println!("PE bitstream, position {}:", pe.position);
    println!("0x{w1:08X}, 0x{w2:08X}, 0x{w3:08X}, 0x{w4:08X}");
    Ok(())
}
