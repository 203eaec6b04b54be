// Delimited text import
// Builds waveform sets from scope / simulator trace exports

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::error::{RawError, Result};
use crate::raw_write::WaveformSet;
use crate::trace::{Trace, TraceKind};

const SEPARATORS: [char; 3] = ['\t', ';', ','];

/// How a delimited text file is turned into a [`WaveformSet`].
#[derive(Clone, Debug, PartialEq)]
pub struct CsvOptions {
    /// Axis kind used when the first column is neither `time` nor `frequency`.
    pub axis_kind: TraceKind,
    pub fast_access: bool,
    pub plot_title: Option<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            axis_kind: TraceKind::Time,
            fast_access: true,
            plot_title: None,
        }
    }
}

fn axis_kind(name: &str, fallback: &TraceKind) -> TraceKind {
    match name.to_ascii_lowercase().as_str() {
        "time" => TraceKind::Time,
        "frequency" | "freq" => TraceKind::Frequency,
        _ => fallback.clone(),
    }
}

fn column_kind(name: &str) -> TraceKind {
    if name.starts_with("I(") || name.starts_with("i(") {
        TraceKind::Current
    } else {
        TraceKind::Voltage
    }
}

fn clean(field: &str) -> &str {
    field.trim().trim_matches('"')
}

impl WaveformSet {
    /// Read a delimited text export.
    ///
    /// The first non-comment line names the columns, the first column is the
    /// axis. Columns are separated by tabs, semicolons or commas, whichever
    /// the header line uses.
    pub fn from_csv<R: BufRead>(reader: R, options: &CsvOptions) -> Result<Self> {
        let mut separator = ',';
        let mut names: Vec<String> = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if names.is_empty() {
                separator = SEPARATORS
                    .into_iter()
                    .find(|sep| line.contains(*sep))
                    .unwrap_or(',');
                names = line.split(separator).map(|f| clean(f).to_string()).collect();
                columns = vec![Vec::new(); names.len()];
                continue;
            }

            let fields: Vec<&str> = line.split(separator).collect();
            if fields.len() != names.len() {
                return Err(RawError::Parse {
                    line: line_no,
                    message: format!("expected {} columns, found {}", names.len(), fields.len()),
                });
            }
            for (column, field) in columns.iter_mut().zip(fields) {
                let value = clean(field).parse::<f64>().map_err(|e| RawError::Parse {
                    line: line_no,
                    message: format!("invalid number '{}': {}", clean(field), e),
                })?;
                column.push(value);
            }
        }

        if names.is_empty() {
            return Err(RawError::Parse {
                line: 0,
                message: "no header line found".to_string(),
            });
        }

        let mut set = WaveformSet::new(options.plot_title.as_deref(), options.fast_access);
        for (idx, (name, values)) in names.into_iter().zip(columns).enumerate() {
            let kind = if idx == 0 {
                axis_kind(&name, &options.axis_kind)
            } else {
                column_kind(&name)
            };
            set.add_trace(Trace::from_vec(name, kind, values))?;
        }

        debug!(
            traces = set.len(),
            points = set.num_points(),
            separator = ?separator,
            "delimited text loaded"
        );
        Ok(set)
    }
}

/// Load a delimited text file into a new [`WaveformSet`].
pub fn load_csv<P: AsRef<Path>>(input_file: P, options: &CsvOptions) -> Result<WaveformSet> {
    let file = File::open(input_file)?;
    WaveformSet::from_csv(BufReader::new(file), options)
}
