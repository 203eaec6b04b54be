// tests/common/mod.rs
// Minimal binary RAW reader used to check what the writer produces

use std::fs;
use std::path::Path;

use raw_writer::{RawError, Result, SourceTrace, TraceKind, TraceRef, WaveformSource};

#[derive(Debug)]
pub struct RawTrace {
    pub name: String,
    pub kind: TraceKind,
    pub values: Vec<f64>,
    /// Imaginary parts, only for complex encoded traces
    pub imag: Vec<f64>,
}

impl SourceTrace for RawTrace {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &TraceKind {
        &self.kind
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn wave(&self, step: usize) -> Result<Vec<f64>> {
        if step != 0 {
            return Err(RawError::IndexError { index: step, len: 1 });
        }
        Ok(self.values.clone())
    }
}

#[derive(Debug)]
pub struct RawFile {
    pub header: Vec<(String, String)>,
    pub traces: Vec<RawTrace>,
    pub payload_len: usize,
}

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn width(kind: &TraceKind) -> usize {
    match kind {
        TraceKind::Time => 8,
        TraceKind::Frequency => 16,
        _ => 4,
    }
}

fn read_value(kind: &TraceKind, bytes: &[u8]) -> (f64, f64) {
    let f64_at = |at: usize| f64::from_le_bytes(bytes[at..at + 8].try_into().unwrap());
    match kind {
        TraceKind::Time => (f64_at(0), 0.0),
        TraceKind::Frequency => (f64_at(0), f64_at(8)),
        _ => (f32::from_le_bytes(bytes[..4].try_into().unwrap()) as f64, 0.0),
    }
}

impl RawFile {
    pub fn parse(bytes: &[u8]) -> RawFile {
        let marker = utf16le("Binary:\n");
        let start = bytes
            .windows(marker.len())
            .position(|w| w == marker.as_slice())
            .expect("no Binary: marker")
            + marker.len();

        let units: Vec<u16> = bytes[..start]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let text = String::from_utf16(&units).expect("header is not UTF-16");

        let mut header = Vec::new();
        let mut variables = Vec::new();
        let mut in_variables = false;
        for line in text.lines() {
            if in_variables && line.starts_with('\t') {
                let fields: Vec<&str> = line.trim_start_matches('\t').split('\t').collect();
                variables.push((fields[1].to_string(), fields[2].parse::<TraceKind>().unwrap()));
                continue;
            }
            in_variables = false;
            if let Some((key, value)) = line.split_once(':') {
                if key == "Variables" {
                    in_variables = true;
                }
                header.push((key.to_string(), value.trim().to_string()));
            }
        }

        let payload = &bytes[start..];
        let points: usize = header
            .iter()
            .find(|(k, _)| k == "No. Points")
            .map(|(_, v)| v.parse().unwrap())
            .unwrap();
        let fast_access = header
            .iter()
            .any(|(k, v)| k == "Flags" && v.split(' ').any(|f| f == "fastaccess"));

        let widths: Vec<usize> = variables.iter().map(|(_, kind)| width(kind)).collect();
        let row: usize = widths.iter().sum();
        let mut traces: Vec<RawTrace> = variables
            .into_iter()
            .map(|(name, kind)| RawTrace {
                name,
                kind,
                values: Vec::new(),
                imag: Vec::new(),
            })
            .collect();

        for (idx, trace) in traces.iter_mut().enumerate() {
            for point in 0..points {
                let at = if fast_access {
                    widths[..idx].iter().sum::<usize>() * points + point * widths[idx]
                } else {
                    point * row + widths[..idx].iter().sum::<usize>()
                };
                let (re, im) = read_value(&trace.kind, &payload[at..at + widths[idx]]);
                trace.values.push(re);
                trace.imag.push(im);
            }
        }

        RawFile {
            header,
            traces,
            payload_len: payload.len(),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> RawFile {
        RawFile::parse(&fs::read(path).expect("cannot read RAW file"))
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.header
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl WaveformSource for RawFile {
    type Trace = RawTrace;

    fn axis(&self, step: usize) -> Result<Vec<f64>> {
        self.trace(TraceRef::Index(0))?.wave(step)
    }

    fn trace(&self, trace_ref: TraceRef<'_>) -> Result<&RawTrace> {
        match trace_ref {
            TraceRef::Name(name) => self
                .traces
                .iter()
                .find(|t| t.name == name)
                .ok_or_else(|| RawError::NotFound(name.to_string())),
            TraceRef::Index(index) => self.traces.get(index).ok_or(RawError::IndexError {
                index,
                len: self.traces.len(),
            }),
        }
    }

    fn raw_property(&self, key: &str) -> Option<String> {
        self.property(key).map(str::to_string)
    }
}
