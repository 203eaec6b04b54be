// RAW Trace Module
// Named sample sequences and the kind -> encoding table

use std::fmt;
use std::str::FromStr;

use crate::error::{RawError, Result};

/// Numerical representation of a trace, as written in the `Flags:` header line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NumericType {
    #[default]
    Real,
    Complex,
}

impl NumericType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumericType::Real => "real",
            NumericType::Complex => "complex",
        }
    }

    /// Pick the numeric type out of a `Flags` property value.
    ///
    /// The first `real` or `complex` token wins. Anything else (including an
    /// empty string) is treated as `real`.
    pub fn from_flags(flags: &str) -> Self {
        flags
            .split_whitespace()
            .find_map(|flag| match flag {
                "real" => Some(NumericType::Real),
                "complex" => Some(NumericType::Complex),
                _ => None,
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary element format of one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementFormat {
    /// 4-byte little-endian float
    Single,
    /// 8-byte little-endian float
    Double,
    /// two 8-byte little-endian floats (real, imaginary)
    ComplexDouble,
}

impl ElementFormat {
    /// Size in bytes of one encoded sample.
    pub fn width(&self) -> usize {
        match self {
            ElementFormat::Single => 4,
            ElementFormat::Double => 8,
            ElementFormat::ComplexDouble => 16,
        }
    }

    /// Append the encoding of `value` to `buf`.
    pub(crate) fn encode(&self, value: f64, buf: &mut Vec<u8>) {
        match self {
            ElementFormat::Single => buf.extend_from_slice(&(value as f32).to_le_bytes()),
            ElementFormat::Double => buf.extend_from_slice(&value.to_le_bytes()),
            ElementFormat::ComplexDouble => {
                buf.extend_from_slice(&value.to_le_bytes());
                buf.extend_from_slice(&0.0f64.to_le_bytes());
            }
        }
    }
}

/// Everything the writer needs to know about a trace kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Encoding {
    pub format: ElementFormat,
    pub numeric_type: NumericType,
    /// Plot title used when this kind is the axis. `None` means the kind
    /// cannot be an axis.
    pub axis_title: Option<&'static str>,
}

const TIME: Encoding = Encoding {
    format: ElementFormat::Double,
    numeric_type: NumericType::Real,
    axis_title: Some("Time Transient"),
};

const FREQUENCY: Encoding = Encoding {
    format: ElementFormat::ComplexDouble,
    numeric_type: NumericType::Complex,
    axis_title: Some("AC Analysis"),
};

const SWEEP: Encoding = Encoding {
    format: ElementFormat::Single,
    numeric_type: NumericType::Real,
    axis_title: Some("DC transfer characteristic"),
};

const PARAMETER: Encoding = Encoding {
    format: ElementFormat::Single,
    numeric_type: NumericType::Real,
    axis_title: Some("Operating Point"),
};

const DEPENDENT: Encoding = Encoding {
    format: ElementFormat::Single,
    numeric_type: NumericType::Real,
    axis_title: None,
};

/// Semantic kind of a trace, written as the third column of the `Variables:` block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TraceKind {
    Time,
    Frequency,
    Voltage,
    Current,
    Parameter,
    Other(String),
}

impl TraceKind {
    pub fn encoding(&self) -> Encoding {
        match self {
            TraceKind::Time => TIME,
            TraceKind::Frequency => FREQUENCY,
            TraceKind::Voltage | TraceKind::Current => SWEEP,
            TraceKind::Parameter => PARAMETER,
            TraceKind::Other(_) => DEPENDENT,
        }
    }

    pub fn is_axis_kind(&self) -> bool {
        self.encoding().axis_title.is_some()
    }

    pub fn as_str(&self) -> &str {
        match self {
            TraceKind::Time => "time",
            TraceKind::Frequency => "frequency",
            TraceKind::Voltage => "voltage",
            TraceKind::Current => "current",
            TraceKind::Parameter => "param",
            TraceKind::Other(name) => name,
        }
    }
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraceKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "time" => TraceKind::Time,
            "frequency" => TraceKind::Frequency,
            "voltage" => TraceKind::Voltage,
            "current" => TraceKind::Current,
            "param" | "parameter" => TraceKind::Parameter,
            _ => TraceKind::Other(s.to_string()),
        })
    }
}

/// A named, immutable sequence of samples.
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    name: String,
    kind: TraceKind,
    values: Vec<f64>,
}

impl Trace {
    /// Create a trace. The values are copied into the trace.
    pub fn new(name: impl Into<String>, kind: TraceKind, values: &[f64]) -> Self {
        Trace {
            name: name.into(),
            kind,
            values: values.to_vec(),
        }
    }

    pub(crate) fn from_vec(name: impl Into<String>, kind: TraceKind, values: Vec<f64>) -> Self {
        Trace {
            name: name.into(),
            kind,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TraceKind {
        &self.kind
    }

    pub fn numeric_type(&self) -> NumericType {
        self.kind.encoding().numeric_type
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value_at(&self, index: usize) -> Result<f64> {
        self.values.get(index).copied().ok_or(RawError::IndexError {
            index,
            len: self.values.len(),
        })
    }
}
