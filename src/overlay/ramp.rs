use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OverlayError;

/// Ordered RGB stops of a colormap.
///
/// With two or more stops, intensities in `[0, 1]` are split into
/// `len - 1` equal segments and interpolated linearly between neighbouring
/// stops. Each segment covers `[start, end)` except the last, which also
/// includes 1.0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorRamp(Vec<[u8; 3]>);

impl ColorRamp {
    pub fn new(colors: Vec<[u8; 3]>) -> Self {
        Self(colors)
    }

    pub fn colors(&self) -> &[[u8; 3]] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Colour for a normalized intensity `t`.
    ///
    /// `t` is clamped to `[0, 1]`; NaN maps like 0. Returns `None` for an
    /// empty ramp.
    pub fn color_at(&self, t: f64) -> Option<[u8; 3]> {
        match self.0.as_slice() {
            [] => None,
            [only] => Some(*only),
            stops => {
                let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
                let segments = stops.len() - 1;
                let width = 1.0 / segments as f64;

                let segment = segment_index(t, segments, width);
                let start = segment as f64 * width;
                let weight = (t - start) / width;

                Some(lerp(stops[segment], stops[segment + 1], weight))
            }
        }
    }
}

/// Segment containing `t`, honouring the boundaries `i * width` exactly.
fn segment_index(t: f64, segments: usize, width: f64) -> usize {
    let mut index = ((t * segments as f64).floor() as usize).min(segments - 1);

    // `t * segments` and `i * width` can round differently near a boundary
    if index + 1 < segments && t >= (index + 1) as f64 * width {
        index += 1;
    } else if index > 0 && t < index as f64 * width {
        index -= 1;
    }
    index
}

fn lerp(start: [u8; 3], end: [u8; 3], weight: f64) -> [u8; 3] {
    let mut out = [0u8; 3];
    for c in 0..3 {
        let value = start[c] as f64 * (1.0 - weight) + end[c] as f64 * weight;
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    out
}

impl From<Vec<[u8; 3]>> for ColorRamp {
    fn from(colors: Vec<[u8; 3]>) -> Self {
        Self(colors)
    }
}

impl fmt::Display for ColorRamp {
    /// Formats in the viewer's query form, `[(r, g, b), ...]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, [r, g, b]) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "({}, {}, {})", r, g, b)?;
        }
        f.write_str("]")
    }
}

impl FromStr for ColorRamp {
    type Err = OverlayError;

    /// Parse `[(r, g, b), ...]` or the JSON form `[[r, g, b], ...]`.
    ///
    /// Trailing commas are accepted, and components may be fractional as
    /// long as they round into `0..=255`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let json = strip_trailing_commas(&s.trim().replace('(', "[").replace(')', "]"));
        let stops = serde_json::from_str::<Vec<[f64; 3]>>(&json)
            .map_err(|e| OverlayError::InvalidRamp(format!("{}: {}", s, e)))?;

        stops
            .into_iter()
            .map(|stop| {
                let mut color = [0u8; 3];
                for (out, component) in color.iter_mut().zip(stop) {
                    let rounded = component.round();
                    if !(0.0..=255.0).contains(&rounded) {
                        return Err(OverlayError::InvalidRamp(format!(
                            "{}: component {} out of range",
                            s, component
                        )));
                    }
                    *out = rounded as u8;
                }
                Ok(color)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(ColorRamp)
    }
}

/// Drop commas that directly precede a closing bracket.
fn strip_trailing_commas(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        if ch == ']' {
            let kept = out.trim_end().len();
            if out[..kept].ends_with(',') {
                let before = out[..kept - 1].trim_end();
                if !before.ends_with('[') && !before.ends_with(',') {
                    out.truncate(kept - 1);
                }
            }
        }
        out.push(ch);
    }
    out
}
