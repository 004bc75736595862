//! CGRA verification harness: reset/configuration/streaming protocol driver, handshake
//! event recording, and throughput/latency/bandwidth metrics.

pub mod bitstream;
pub mod config;
pub mod core;
pub mod dut;
pub mod error;
pub mod kernel;
pub mod metrics;
pub mod recorder;
pub mod report;
pub mod signals;
pub mod simulator;
pub mod trace;

pub use error::{HarnessError, Result};
