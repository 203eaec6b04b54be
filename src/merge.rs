// RAW Merge Module
// Import traces from another waveform source, optionally syncing the two axes

use tracing::{debug, info};

use crate::error::{RawError, Result};
use crate::raw_write::{format_scientific, TraceRef, WaveformSet, TITLE};
use crate::trace::{NumericType, Trace, TraceKind};

/// One trace of a waveform source, e.g. a trace of a RAW file being read.
pub trait SourceTrace {
    fn name(&self) -> &str;
    fn kind(&self) -> &TraceKind;
    fn len(&self) -> usize;
    /// Samples of the given step.
    fn wave(&self, step: usize) -> Result<Vec<f64>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Anything traces can be imported from. RAW readers implement this;
/// so does [`WaveformSet`].
pub trait WaveformSource {
    type Trace: SourceTrace;

    /// Samples of the axis (trace 0) for the given step.
    fn axis(&self, step: usize) -> Result<Vec<f64>>;

    fn trace(&self, trace_ref: TraceRef<'_>) -> Result<&Self::Trace>;

    /// Header property such as `Flags` or `Plotname`.
    fn raw_property(&self, key: &str) -> Option<String>;
}

impl SourceTrace for Trace {
    fn name(&self) -> &str {
        Trace::name(self)
    }

    fn kind(&self) -> &TraceKind {
        Trace::kind(self)
    }

    fn len(&self) -> usize {
        Trace::len(self)
    }

    fn wave(&self, step: usize) -> Result<Vec<f64>> {
        // a written trace only ever has step 0
        if step != 0 {
            return Err(RawError::IndexError { index: step, len: 1 });
        }
        Ok(self.values().to_vec())
    }
}

impl WaveformSource for WaveformSet {
    type Trace = Trace;

    fn axis(&self, step: usize) -> Result<Vec<f64>> {
        self.get_trace(0)?.wave(step)
    }

    fn trace(&self, trace_ref: TraceRef<'_>) -> Result<&Trace> {
        self.get_trace(trace_ref)
    }

    fn raw_property(&self, key: &str) -> Option<String> {
        match key {
            "Title" => Some(TITLE.to_string()),
            "Plotname" => self.plot_title().map(str::to_string),
            "Flags" => Some(self.flags()),
            "No. Variables" => Some(self.len().to_string()),
            "No. Points" => Some(self.num_points().to_string()),
            "Offset" => Some(format_scientific(self.offset(), 16)),
            _ => None,
        }
    }
}

/// Options of [`WaveformSet::merge_from`].
#[derive(Clone, Debug, PartialEq)]
pub struct MergeOptions {
    /// Interleave the two axes instead of requiring them to be identical.
    pub force_axis_alignment: bool,
    /// Two axis samples closer than this are treated as the same point.
    pub admissible_error: f64,
    /// Template for imported trace names. `{}` (or `{0}`, `{name}`) is the
    /// original name, `{step}` the imported step; `{{` and `}}` are literal
    /// braces.
    pub rename_format: String,
    /// Step of the source to import.
    pub step: usize,
    /// Resample onto a fixed time step. Not supported: any value other than
    /// 0 (negative and NaN included) fails with `NotImplemented`.
    pub fixed_timestep: f64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            force_axis_alignment: false,
            admissible_error: 1e-11,
            rename_format: "{}".to_string(),
            step: 0,
            fixed_timestep: 0.0,
        }
    }
}

/// Expand a rename template. Unknown `{field}`s are kept as written.
fn format_name(template: &str, name: &str, step: usize) -> String {
    let mut out = String::with_capacity(template.len() + name.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    field.push(c);
                }
                match (closed, field.as_str()) {
                    (true, "" | "0" | "name") => out.push_str(name),
                    (true, "step") => out.push_str(&step.to_string()),
                    _ => {
                        out.push('{');
                        out.push_str(&field);
                        if closed {
                            out.push('}');
                        }
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Apply the `rename_format` of `options` to a trace name.
///
/// For `V(x)` and `I(x)` only the inner net or device name is renamed, so
/// `V(out)` with `"{}_2"` becomes `V(out_2)`.
pub fn rename_trace(name: &str, options: &MergeOptions) -> String {
    let apply = |s: &str| format_name(&options.rename_format, s, options.step);
    let inner = name
        .strip_suffix(')')
        .and_then(|rest| rest.strip_prefix("V(").or_else(|| rest.strip_prefix("I(")));
    match inner {
        Some(inner) => format!("{}{})", &name[..2], apply(inner)),
        None => apply(name),
    }
}

struct Incoming {
    name: String,
    kind: TraceKind,
    values: Vec<f64>,
}

impl WaveformSet {
    /// Import the traces named in `trace_names` from `source`.
    ///
    /// Without axis alignment the two axes must have the same number of
    /// points and the traces are appended as they are. With
    /// `force_axis_alignment` the axes are interleaved: the new axis holds the
    /// points of both, and every trace takes the last sample read at or before
    /// each new point (no interpolation). The set is then rebuilt as axis,
    /// imported traces, previous traces.
    ///
    /// Nothing is modified when an error is returned. Renamed traces are not
    /// checked against existing names; use [`WaveformSet::name_exists`].
    pub fn merge_from<S, N>(
        &mut self,
        source: &S,
        trace_names: &[N],
        options: &MergeOptions,
    ) -> Result<()>
    where
        S: WaveformSource,
        N: AsRef<str>,
    {
        if options.fixed_timestep != 0.0 {
            return Err(RawError::NotImplemented("fixed timestep axis alignment"));
        }

        let other_type = source
            .raw_property("Flags")
            .map(|flags| NumericType::from_flags(&flags))
            .unwrap_or_default();
        let other_axis_trace = source.trace(TraceRef::Index(0))?;
        let other_kind = other_axis_trace.kind().clone();

        let (my_type, my_kind) = match self.traces.first() {
            Some(axis) => (self.numeric_type, axis.kind().clone()),
            None => {
                if !other_kind.is_axis_kind() {
                    return Err(RawError::InvalidAxisKind(other_kind.to_string()));
                }
                (other_kind.encoding().numeric_type, other_kind.clone())
            }
        };
        if other_type != my_type || other_kind != my_kind {
            return Err(RawError::TypeMismatch(format!(
                "cannot merge a {} '{}' set into a {} '{}' set",
                other_type, other_kind, my_type, my_kind
            )));
        }

        let step = options.step;
        let other_axis = source.axis(step)?;
        let mut incoming = Vec::with_capacity(trace_names.len());
        for name in trace_names {
            let name: &str = name.as_ref();
            let trace = source.trace(TraceRef::Name(name))?;
            let values = trace.wave(step)?;
            if values.len() != other_axis.len() {
                return Err(RawError::LengthMismatch {
                    name: name.to_string(),
                    expected: other_axis.len(),
                    found: values.len(),
                });
            }
            incoming.push(Incoming {
                name: rename_trace(name, options),
                kind: trace.kind().clone(),
                values,
            });
        }

        let mut force_axis_alignment = options.force_axis_alignment;
        if self.traces.is_empty() {
            // nothing to align against, start from a copy of the other axis
            self.add_trace(Trace::new(
                other_axis_trace.name(),
                other_kind,
                &other_axis,
            ))?;
            force_axis_alignment = false;
        } else if !force_axis_alignment && self.num_points() != other_axis.len() {
            return Err(RawError::LengthMismatch {
                name: other_axis_trace.name().to_string(),
                expected: self.num_points(),
                found: other_axis.len(),
            });
        }

        if force_axis_alignment {
            self.reconcile_axis(&other_axis, incoming, options.admissible_error);
        } else {
            for trace in incoming {
                self.traces
                    .push(Trace::from_vec(trace.name, trace.kind, trace.values));
            }
        }

        info!(
            imported = trace_names.len(),
            traces = self.traces.len(),
            points = self.num_points(),
            aligned = force_axis_alignment,
            "traces merged"
        );
        Ok(())
    }

    /// Two-pointer interleave of the local axis with `other_axis`.
    ///
    /// The loop stops as soon as either cursor reaches the last sample of its
    /// axis, so the final point of both axes is never emitted.
    fn reconcile_axis(&mut self, other_axis: &[f64], incoming: Vec<Incoming>, admissible_error: f64) {
        let capacity = self.num_points() + other_axis.len();
        let mut new_axis = Vec::with_capacity(capacity);
        let mut new_traces = vec![Vec::with_capacity(capacity); incoming.len()];
        let mut updated_traces = vec![Vec::with_capacity(capacity); self.traces.len() - 1];

        {
            let my_axis = self.traces[0].values();
            let existing = &self.traces[1..];
            let mut i = 0; // incoming cursor
            let mut e = 0; // existing cursor

            while e + 1 < my_axis.len() && i + 1 < other_axis.len() {
                let error = other_axis[i] - my_axis[e];
                if error.abs() < admissible_error {
                    new_axis.push(my_axis[e]);
                    i += 1;
                    e += 1;
                } else if error < 0.0 {
                    new_axis.push(other_axis[i]);
                    i += 1;
                } else {
                    new_axis.push(my_axis[e]);
                    e += 1;
                }
                for (out, trace) in new_traces.iter_mut().zip(&incoming) {
                    out.push(trace.values[i]);
                }
                for (out, trace) in updated_traces.iter_mut().zip(existing) {
                    out.push(trace.values()[e]);
                }
            }

            debug!(
                local_points = my_axis.len(),
                other_points = other_axis.len(),
                local_consumed = e,
                other_consumed = i,
                merged_points = new_axis.len(),
                "axis reconciled"
            );
        }

        let mut old = std::mem::take(&mut self.traces).into_iter();
        if let Some(axis) = old.next() {
            self.traces
                .push(Trace::from_vec(axis.name(), axis.kind().clone(), new_axis));
        }
        for (trace, values) in incoming.into_iter().zip(new_traces) {
            self.traces.push(Trace::from_vec(trace.name, trace.kind, values));
        }
        for (trace, values) in old.zip(updated_traces) {
            self.traces
                .push(Trace::from_vec(trace.name(), trace.kind().clone(), values));
        }
    }
}
