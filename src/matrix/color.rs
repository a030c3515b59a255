//! Palettes and bucketed gradients.

use std::collections::BTreeMap;
use std::fmt;

use crate::model::MISSING;

/// Colour of absent / NaN cells.
pub const ABSENCE_COLOR: &str = "#EBEBEB";

/// Number of buckets every gradient is quantised to.
pub const GRADIENT_BUCKETS: usize = 20;

/// Qualitative palette used for categorical values.
pub const CATEGORICAL_PALETTE: [&str; 20] = [
    "#1f77b4", "#aec7e8", "#ff7f0e", "#ffbb78", "#2ca02c",
    "#98df8a", "#d62728", "#ff9896", "#9467bd", "#c5b0d5",
    "#8c564b", "#c49c94", "#e377c2", "#f7b6d2", "#7f7f7f",
    "#c7c7c7", "#bcbd22", "#dbdb8d", "#17becf", "#9edae5",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn parse(hex: &str) -> Option<Rgb> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    fn lerp(a: Rgb, b: Rgb, t: f64) -> Rgb {
        let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round().clamp(0.0, 255.0) as u8;
        Rgb(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Piecewise-linear colour ramp over `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    anchors: Vec<Rgb>,
}

impl Gradient {
    /// Built-in ramps: `Reds`, `Blues`, `Greens`, `coolwarm`.
    pub fn named(name: &str) -> Option<Gradient> {
        let hexes: &[&str] = match name {
            "Reds" => &["#fff5f0", "#fb6a4a", "#67000d"],
            "Blues" => &["#f7fbff", "#6baed6", "#08306b"],
            "Greens" => &["#f7fcf5", "#74c476", "#00441b"],
            "coolwarm" => &["#3b4cc0", "#dddddd", "#b40426"],
            _ => return None,
        };
        Gradient::from_hex(hexes)
    }

    pub fn from_hex(hexes: &[&str]) -> Option<Gradient> {
        let anchors = hexes.iter().map(|h| Rgb::parse(h)).collect::<Option<Vec<_>>>()?;
        (!anchors.is_empty()).then_some(Gradient { anchors })
    }

    pub fn between(low: Rgb, high: Rgb) -> Gradient {
        Gradient { anchors: vec![low, high] }
    }

    /// Replace the endpoints (and optionally the midpoint) with user anchors.
    pub fn with_overrides(&self, min: Option<Rgb>, mid: Option<Rgb>, max: Option<Rgb>) -> Gradient {
        if min.is_none() && mid.is_none() && max.is_none() {
            return self.clone();
        }
        let low = min.unwrap_or(self.sample(0.0));
        let high = max.unwrap_or(self.sample(1.0));
        let anchors = match mid {
            Some(m) => vec![low, m, high],
            None if self.anchors.len() > 2 => vec![low, self.sample(0.5), high],
            None => vec![low, high],
        };
        Gradient { anchors }
    }

    /// Continuous colour at `t` (clamped into `[0, 1]`).
    pub fn sample(&self, t: f64) -> Rgb {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        if self.anchors.len() == 1 {
            return self.anchors[0];
        }
        let segments = (self.anchors.len() - 1) as f64;
        let pos = t * segments;
        let idx = (pos.floor() as usize).min(self.anchors.len() - 2);
        Rgb::lerp(self.anchors[idx], self.anchors[idx + 1], pos - idx as f64)
    }

    /// Colour of the bucket containing `t`.
    pub fn bucket(&self, t: f64) -> String {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let b = ((t * GRADIENT_BUCKETS as f64).floor() as usize).min(GRADIENT_BUCKETS - 1);
        self.sample(b as f64 / (GRADIENT_BUCKETS - 1) as f64).to_string()
    }

    /// All bucket colours, low to high.
    pub fn buckets(&self) -> Vec<String> {
        (0..GRADIENT_BUCKETS)
            .map(|b| self.sample(b as f64 / (GRADIENT_BUCKETS - 1) as f64).to_string())
            .collect()
    }
}

/// Give every distinct value a palette colour, cycling when there are more
/// values than colours. `"NaN"` always maps to the absence colour; an empty
/// palette falls back to [`CATEGORICAL_PALETTE`].
pub fn assign_categorical<'a, I>(values: I, palette: &[&str]) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a str>,
{
    let palette = if palette.is_empty() { &CATEGORICAL_PALETTE[..] } else { palette };
    let mut distinct: Vec<&str> = values.into_iter().collect();
    distinct.sort_unstable();
    distinct.dedup();
    let mut out = BTreeMap::new();
    let mut next = 0;
    for v in distinct {
        let color = if v == MISSING {
            ABSENCE_COLOR.to_string()
        } else {
            let c = palette[next % palette.len()].to_string();
            next += 1;
            c
        };
        out.insert(v.to_string(), color);
    }
    out
}
