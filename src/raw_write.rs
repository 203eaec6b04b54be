// RAW Writer Module
// Waveform sets and their binary RAW serialization

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Local;
use tracing::{debug, info};

use crate::error::{RawError, Result};
use crate::trace::{NumericType, Trace};

pub(crate) const TITLE: &str = "* raw_writer RawWrite";
const COMMAND: &str = "Linear Technology Corporation LTspice XVII";
const DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Reference to a trace, either by name or by position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceRef<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for TraceRef<'a> {
    fn from(name: &'a str) -> Self {
        TraceRef::Name(name)
    }
}

impl<'a> From<&'a String> for TraceRef<'a> {
    fn from(name: &'a String) -> Self {
        TraceRef::Name(name)
    }
}

impl From<usize> for TraceRef<'_> {
    fn from(index: usize) -> Self {
        TraceRef::Index(index)
    }
}

/// An ordered set of equal-length traces that serializes to a binary RAW file.
///
/// Trace 0 is the axis (time, frequency, sweep or parameter). It fixes the
/// plot title (when none was given), the numeric type and the number of points.
#[derive(Clone, Debug)]
pub struct WaveformSet {
    pub(crate) traces: Vec<Trace>,
    pub(crate) plot_title: Option<String>,
    pub(crate) numeric_type: NumericType,
    fast_access: bool,
    offset: f64,
}

impl Default for WaveformSet {
    fn default() -> Self {
        WaveformSet::new(None, true)
    }
}

impl WaveformSet {
    /// Create an empty set. An empty title is treated as unset.
    pub fn new(plot_title: Option<&str>, fast_access: bool) -> Self {
        WaveformSet {
            traces: Vec::new(),
            plot_title: plot_title.filter(|t| !t.is_empty()).map(str::to_string),
            numeric_type: NumericType::Real,
            fast_access,
            offset: 0.0,
        }
    }

    /// Set the header `Offset:` value. It is metadata only and is never
    /// applied to the samples.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Append a trace.
    ///
    /// The first trace becomes the axis and must have an axis kind. Every
    /// later trace must have as many points as the axis.
    pub fn add_trace(&mut self, trace: Trace) -> Result<()> {
        match self.traces.first() {
            None => {
                let encoding = trace.kind().encoding();
                let title = encoding
                    .axis_title
                    .ok_or_else(|| RawError::InvalidAxisKind(trace.kind().to_string()))?;
                if self.plot_title.is_none() {
                    self.plot_title = Some(title.to_string());
                }
                self.numeric_type = encoding.numeric_type;
                debug!(
                    axis = trace.name(),
                    kind = %trace.kind(),
                    points = trace.len(),
                    "axis trace added"
                );
            }
            Some(axis) if axis.len() != trace.len() => {
                return Err(RawError::LengthMismatch {
                    name: trace.name().to_string(),
                    expected: axis.len(),
                    found: trace.len(),
                });
            }
            Some(_) => {}
        }
        self.traces.push(trace);
        Ok(())
    }

    /// Look up a trace by name (first match in insertion order) or by index.
    pub fn get_trace<'a>(&self, trace_ref: impl Into<TraceRef<'a>>) -> Result<&Trace> {
        match trace_ref.into() {
            TraceRef::Name(name) => self
                .traces
                .iter()
                .find(|t| t.name() == name)
                .ok_or_else(|| RawError::NotFound(name.to_string())),
            TraceRef::Index(index) => self.traces.get(index).ok_or(RawError::IndexError {
                index,
                len: self.traces.len(),
            }),
        }
    }

    /// Whether a trace with exactly this name is present.
    pub fn name_exists(&self, name: &str) -> bool {
        self.traces.iter().any(|t| t.name() == name)
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    /// Number of traces, axis included.
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Number of points of the axis, 0 when the set is empty.
    pub fn num_points(&self) -> usize {
        self.traces.first().map_or(0, Trace::len)
    }

    pub fn plot_title(&self) -> Option<&str> {
        self.plot_title.as_deref()
    }

    pub fn numeric_type(&self) -> NumericType {
        self.numeric_type
    }

    pub fn is_fast_access(&self) -> bool {
        self.fast_access
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Value of the `Flags:` header line.
    pub fn flags(&self) -> String {
        let mut flags = vec![self.numeric_type.as_str()];
        // stepped output is never produced by this writer
        if self.fast_access {
            flags.push("fastaccess");
        }
        flags.join(" ")
    }

    /// Size of the binary payload in bytes.
    pub fn payload_len(&self) -> usize {
        self.traces
            .iter()
            .map(|t| t.kind().encoding().format.width() * t.len())
            .sum()
    }

    /// Save the set into a binary RAW file.
    ///
    /// A failure part way leaves a truncated file behind.
    pub fn save<P: AsRef<Path>>(&self, output_file: P) -> Result<()> {
        let file = File::create(&output_file)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;

        info!(
            path = %output_file.as_ref().display(),
            traces = self.traces.len(),
            points = self.num_points(),
            "RAW file written"
        );
        Ok(())
    }

    /// Serialize the header and the binary payload into `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let axis = self.traces.first().ok_or(RawError::IndexError { index: 0, len: 0 })?;

        let mut header = String::new();
        header.push_str(&format!("Title: {}\n", TITLE));
        header.push_str(&format!("Date: {}\n", Local::now().format(DATE_FORMAT)));
        header.push_str(&format!("Plotname: {}\n", self.plot_title.as_deref().unwrap_or("")));
        header.push_str(&format!("Flags: {}\n", self.flags()));
        header.push_str(&format!("No. Variables: {}\n", self.traces.len()));
        header.push_str(&format!("No. Points: {:>12}\n", axis.len()));
        header.push_str(&format!("Offset:   {}\n", format_scientific(self.offset, 16)));
        header.push_str(&format!("Command: {}\n", COMMAND));
        header.push_str("Backannotation: \n");
        header.push_str("Variables:\n");
        for (idx, trace) in self.traces.iter().enumerate() {
            header.push_str(&format!("\t{}\t{}\t{}\n", idx, trace.name(), trace.kind()));
        }
        header.push_str("Binary:\n");
        writer.write_all(&encode_utf16le(&header))?;

        let formats: Vec<_> = self
            .traces
            .iter()
            .map(|t| t.kind().encoding().format)
            .collect();
        let mut buf = Vec::new();

        if self.fast_access {
            for (trace, format) in self.traces.iter().zip(&formats) {
                buf.clear();
                buf.reserve(trace.len() * format.width());
                for &value in trace.values() {
                    format.encode(value, &mut buf);
                }
                writer.write_all(&buf)?;
            }
        } else {
            let row_width: usize = formats.iter().map(|f| f.width()).sum();
            buf.reserve(row_width);
            for point in 0..axis.len() {
                buf.clear();
                for (trace, format) in self.traces.iter().zip(&formats) {
                    format.encode(trace.values()[point], &mut buf);
                }
                writer.write_all(&buf)?;
            }
        }

        debug!(
            fast_access = self.fast_access,
            payload_bytes = self.payload_len(),
            "binary payload written"
        );
        Ok(())
    }
}

/// Header text is always UTF-16 little endian.
pub(crate) fn encode_utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// Scientific notation with a signed exponent of at least two digits,
/// e.g. `1.5000e-03`.
pub(crate) fn format_scientific(value: f64, precision: usize) -> String {
    let formatted = format!("{:.*e}", precision, value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        }
        None => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceKind;

    fn transient_set(fast_access: bool) -> WaveformSet {
        let mut set = WaveformSet::new(None, fast_access);
        set.add_trace(Trace::new("time", TraceKind::Time, &[0.0, 1e-3, 2e-3]))
            .unwrap();
        set.add_trace(Trace::new("V(out)", TraceKind::Voltage, &[0.5, 1.0, 1.5]))
            .unwrap();
        set
    }

    fn decode_utf16le(bytes: &[u8]) -> String {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    }

    fn split_header(bytes: &[u8]) -> (String, &[u8]) {
        let marker = encode_utf16le("Binary:\n");
        let pos = bytes
            .windows(marker.len())
            .position(|w| w == marker.as_slice())
            .expect("no Binary: marker");
        let end = pos + marker.len();
        (decode_utf16le(&bytes[..end]), &bytes[end..])
    }

    #[test]
    fn test_first_trace_sets_metadata() {
        let set = transient_set(true);
        assert_eq!(set.plot_title(), Some("Time Transient"));
        assert_eq!(set.numeric_type(), NumericType::Real);

        let mut ac = WaveformSet::default();
        ac.add_trace(Trace::new("frequency", TraceKind::Frequency, &[1.0, 10.0]))
            .unwrap();
        assert_eq!(ac.plot_title(), Some("AC Analysis"));
        assert_eq!(ac.numeric_type(), NumericType::Complex);

        let mut dc = WaveformSet::default();
        dc.add_trace(Trace::new("v1", TraceKind::Voltage, &[0.0])).unwrap();
        assert_eq!(dc.plot_title(), Some("DC transfer characteristic"));

        let mut op = WaveformSet::default();
        op.add_trace(Trace::new("p", TraceKind::Parameter, &[0.0])).unwrap();
        assert_eq!(op.plot_title(), Some("Operating Point"));
    }

    #[test]
    fn test_explicit_title_is_kept() {
        let mut set = WaveformSet::new(Some("My Plot"), true);
        set.add_trace(Trace::new("time", TraceKind::Time, &[0.0])).unwrap();
        assert_eq!(set.plot_title(), Some("My Plot"));
    }

    #[test]
    fn test_invalid_axis_kind() {
        let mut set = WaveformSet::default();
        let result = set.add_trace(Trace::new("x", TraceKind::Other("notype".into()), &[0.0]));
        assert!(matches!(result, Err(RawError::InvalidAxisKind(k)) if k == "notype"));
        assert!(set.is_empty());
    }

    #[test]
    fn test_length_mismatch() {
        let mut set = transient_set(true);
        let result = set.add_trace(Trace::new("V(in)", TraceKind::Voltage, &[1.0, 2.0]));
        assert!(matches!(
            result,
            Err(RawError::LengthMismatch { expected: 3, found: 2, .. })
        ));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_duplicate_names_allowed() {
        let mut set = transient_set(true);
        set.add_trace(Trace::new("V(out)", TraceKind::Voltage, &[0.0, 0.0, 0.0]))
            .unwrap();
        assert_eq!(set.len(), 3);
        // first match wins
        assert_eq!(set.get_trace("V(out)").unwrap().values(), &[0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_get_trace() {
        let set = transient_set(true);
        assert_eq!(set.get_trace(0).unwrap().name(), "time");
        assert_eq!(set.get_trace("V(out)").unwrap().kind(), &TraceKind::Voltage);
        let name = String::from("V(out)");
        assert_eq!(set.get_trace(&name).unwrap().name(), "V(out)");
        assert!(matches!(set.get_trace("v(out)"), Err(RawError::NotFound(_))));
        assert!(matches!(
            set.get_trace(5),
            Err(RawError::IndexError { index: 5, len: 2 })
        ));
    }

    #[test]
    fn test_name_exists() {
        let set = transient_set(true);
        assert!(set.name_exists("time"));
        assert!(set.name_exists("V(out)"));
        assert!(!set.name_exists("v(out)"));
        assert!(!set.name_exists("V(in)"));
    }

    #[test]
    fn test_flags() {
        assert_eq!(transient_set(true).flags(), "real fastaccess");
        assert_eq!(transient_set(false).flags(), "real");
    }

    #[test]
    fn test_format_scientific() {
        assert_eq!(format_scientific(0.0, 16), "0.0000000000000000e+00");
        assert_eq!(format_scientific(1.5e-3, 4), "1.5000e-03");
        assert_eq!(format_scientific(-2.0e120, 2), "-2.00e+120");
    }

    #[test]
    fn test_header_layout() {
        let set = transient_set(true).with_offset(0.25);
        let mut bytes = Vec::new();
        set.write_to(&mut bytes).unwrap();
        let (header, _) = split_header(&bytes);
        let lines: Vec<&str> = header.lines().collect();

        assert_eq!(lines[0], "Title: * raw_writer RawWrite");
        assert!(lines[1].starts_with("Date: "));
        assert_eq!(lines[2], "Plotname: Time Transient");
        assert_eq!(lines[3], "Flags: real fastaccess");
        assert_eq!(lines[4], "No. Variables: 2");
        assert_eq!(lines[5], "No. Points:            3");
        assert_eq!(lines[6], "Offset:   2.5000000000000000e-01");
        assert_eq!(lines[7], "Command: Linear Technology Corporation LTspice XVII");
        assert_eq!(lines[8], "Backannotation: ");
        assert_eq!(lines[9], "Variables:");
        assert_eq!(lines[10], "\t0\ttime\ttime");
        assert_eq!(lines[11], "\t1\tV(out)\tvoltage");
        assert_eq!(lines[12], "Binary:");
    }

    #[test]
    fn test_fast_access_payload() {
        let set = transient_set(true);
        let mut bytes = Vec::new();
        set.write_to(&mut bytes).unwrap();
        let (_, payload) = split_header(&bytes);

        let mut expected = Vec::new();
        for t in [0.0f64, 1e-3, 2e-3] {
            expected.extend_from_slice(&t.to_le_bytes());
        }
        for v in [0.5f32, 1.0, 1.5] {
            expected.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(payload, expected.as_slice());
        assert_eq!(payload.len(), set.payload_len());
    }

    #[test]
    fn test_normal_payload() {
        let set = transient_set(false);
        let mut bytes = Vec::new();
        set.write_to(&mut bytes).unwrap();
        let (_, payload) = split_header(&bytes);

        let mut expected = Vec::new();
        for (t, v) in [(0.0f64, 0.5f32), (1e-3, 1.0), (2e-3, 1.5)] {
            expected.extend_from_slice(&t.to_le_bytes());
            expected.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(payload, expected.as_slice());
        assert_eq!(payload.len(), 3 * (8 + 4));
    }

    #[test]
    fn test_frequency_axis_is_complex_pair() {
        let mut set = WaveformSet::default();
        set.add_trace(Trace::new("frequency", TraceKind::Frequency, &[1.0, 10.0]))
            .unwrap();
        set.add_trace(Trace::new("V(out)", TraceKind::Voltage, &[0.1, 0.2]))
            .unwrap();
        assert_eq!(set.payload_len(), 2 * 16 + 2 * 4);

        let mut bytes = Vec::new();
        set.write_to(&mut bytes).unwrap();
        let (header, payload) = split_header(&bytes);
        assert!(header.contains("Flags: complex fastaccess\n"));
        assert!(header.contains("Plotname: AC Analysis\n"));
        assert_eq!(&payload[..8], &1.0f64.to_le_bytes());
        assert_eq!(&payload[8..16], &0.0f64.to_le_bytes());
        assert_eq!(&payload[16..24], &10.0f64.to_le_bytes());
    }

    #[test]
    fn test_empty_set_cannot_be_written() {
        let set = WaveformSet::default();
        let mut bytes = Vec::new();
        assert!(matches!(
            set.write_to(&mut bytes),
            Err(RawError::IndexError { index: 0, len: 0 })
        ));
        assert!(bytes.is_empty());
    }
}
