// src/lib.rs
// RAW Writer Library - Public API

//! # RAW Writer
//!
//! A Rust library for writing SPICE binary RAW waveform files (the format
//! written by LTspice) and for merging traces of two simulation runs.
//!
//! ## Features
//!
//! - Transient, AC, DC sweep and operating point plots
//! - Fast-access (column-major) and normal (row-major) binary layouts
//! - Merge traces from another source, syncing axes with different time steps
//! - Build waveform sets from delimited text trace exports
//! - Proper error handling
//!
//! ## Example
//!
//! ```no_run
//! use raw_writer::{MergeOptions, Trace, TraceKind, WaveformSet};
//!
//! let time: Vec<f64> = (0..1000).map(|i| i as f64 * 1e-6).collect();
//! let out: Vec<f64> = time.iter().map(|t| (2e3 * t).sin()).collect();
//!
//! let mut raw = WaveformSet::new(None, true);
//! raw.add_trace(Trace::new("time", TraceKind::Time, &time)).expect("axis");
//! raw.add_trace(Trace::new("V(out)", TraceKind::Voltage, &out)).expect("trace");
//!
//! // Import V(out) of a second run sampled on a different grid
//! let mut other = WaveformSet::default();
//! other.add_trace(Trace::new("time", TraceKind::Time, &time)).expect("axis");
//! other.add_trace(Trace::new("V(out)", TraceKind::Voltage, &out)).expect("trace");
//!
//! let options = MergeOptions {
//!     force_axis_alignment: true,
//!     rename_format: "{}_run2".to_string(),
//!     ..MergeOptions::default()
//! };
//! raw.merge_from(&other, &["V(out)"], &options).expect("merge");
//!
//! raw.save("merged.raw").expect("Failed to write RAW file");
//! ```

mod csv;
mod error;
mod merge;
mod raw_write;
mod trace;

pub use csv::{load_csv, CsvOptions};
pub use error::{RawError, Result};
pub use merge::{rename_trace, MergeOptions, SourceTrace, WaveformSource};
pub use raw_write::{TraceRef, WaveformSet};
pub use trace::{ElementFormat, Encoding, NumericType, Trace, TraceKind};
