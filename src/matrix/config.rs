//! Colour-config table.
//!
//! ```text
//! PROP   VALUE   COLOR   CONDITION?
//! ```
//!
//! Rows without a condition map an exact value to a colour. Rows whose
//! condition is a reserved token set a gradient anchor or bar-plot hint for
//! the property. `PROP = *` applies to every property.

use std::collections::BTreeMap;
use std::io::BufRead;

use serde::{Deserialize, Serialize};

use super::color::Rgb;
use crate::metadata::table::{detect_delimiter, split_fields};
use crate::{Error, Result};

pub const WILDCARD: &str = "*";

/// A gradient anchor: colour plus an optional numeric bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub color: String,
    pub value: Option<f64>,
}

/// Range anchors and bar-plot hints for one property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detail {
    pub color_min: Option<Anchor>,
    pub color_mid: Option<Anchor>,
    pub color_max: Option<Anchor>,
    pub color_nan: Option<String>,
    pub barplot_color: Option<String>,
    pub barplot_colorby: Option<String>,
}

impl Detail {
    fn rgb(anchor: &Option<Anchor>) -> Option<Rgb> {
        anchor.as_ref().and_then(|a| Rgb::parse(&a.color))
    }

    pub fn min_rgb(&self) -> Option<Rgb> {
        Self::rgb(&self.color_min)
    }

    pub fn mid_rgb(&self) -> Option<Rgb> {
        Self::rgb(&self.color_mid)
    }

    pub fn max_rgb(&self) -> Option<Rgb> {
        Self::rgb(&self.color_max)
    }

    pub fn min_value(&self) -> Option<f64> {
        self.color_min.as_ref().and_then(|a| a.value)
    }

    pub fn max_value(&self) -> Option<f64> {
        self.color_max.as_ref().and_then(|a| a.value)
    }

    fn merge_missing(&mut self, fallback: &Detail) {
        if self.color_min.is_none() { self.color_min = fallback.color_min.clone(); }
        if self.color_mid.is_none() { self.color_mid = fallback.color_mid.clone(); }
        if self.color_max.is_none() { self.color_max = fallback.color_max.clone(); }
        if self.color_nan.is_none() { self.color_nan = fallback.color_nan.clone(); }
        if self.barplot_color.is_none() { self.barplot_color = fallback.barplot_color.clone(); }
        if self.barplot_colorby.is_none() { self.barplot_colorby = fallback.barplot_colorby.clone(); }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorConfig {
    pub value2color: BTreeMap<String, BTreeMap<String, String>>,
    pub detail2color: BTreeMap<String, Detail>,
}

impl ColorConfig {
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut cfg = ColorConfig::default();
        let mut delimiter = None;

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let delim = *delimiter.get_or_insert_with(|| detect_delimiter(&line));
            let fields = split_fields(&line, delim);
            if fields.first().is_some_and(|f| f.eq_ignore_ascii_case("PROP")) {
                continue;
            }
            if fields.len() < 3 {
                return Err(Error::InputValidation(format!(
                    "color config line {} needs PROP, VALUE and COLOR",
                    lineno + 1
                )));
            }
            let (prop, value, color) = (fields[0].trim(), fields[1].trim(), fields[2].trim());
            let condition = fields.get(3).map(|c| c.trim()).filter(|c| !c.is_empty());
            cfg.apply_row(prop, value, color, condition)
                .map_err(|e| Error::InputValidation(format!("color config line {}: {e}", lineno + 1)))?;
        }
        Ok(cfg)
    }

    fn apply_row(&mut self, prop: &str, value: &str, color: &str, condition: Option<&str>) -> Result<()> {
        let Some(condition) = condition else {
            self.value2color
                .entry(prop.to_string())
                .or_default()
                .insert(value.to_string(), color.to_string());
            return Ok(());
        };
        let anchor = || Anchor {
            color: color.to_string(),
            value: value.trim().parse::<f64>().ok(),
        };
        let detail = self.detail2color.entry(prop.to_string()).or_default();
        match condition {
            "color_min" => detail.color_min = Some(anchor()),
            "color_mid" => detail.color_mid = Some(anchor()),
            "color_max" => detail.color_max = Some(anchor()),
            "color_nan" => detail.color_nan = Some(color.to_string()),
            "barplot_color" => detail.barplot_color = Some(color.to_string()),
            "barplot_colorby" => detail.barplot_colorby = Some(value.to_string()),
            other => {
                return Err(Error::InputValidation(format!("unknown condition '{other}'")));
            }
        }
        Ok(())
    }

    /// Exact colour for `value` of `prop`, falling back to the wildcard.
    pub fn value_color(&self, prop: &str, value: &str) -> Option<&str> {
        [prop, WILDCARD]
            .iter()
            .find_map(|p| self.value2color.get(*p).and_then(|m| m.get(value)))
            .map(String::as_str)
    }

    /// Anchors for `prop`, with wildcard anchors filling the gaps.
    pub fn detail(&self, prop: &str) -> Detail {
        let mut detail = self.detail2color.get(prop).cloned().unwrap_or_default();
        if let Some(wild) = self.detail2color.get(WILDCARD) {
            detail.merge_missing(wild);
        }
        detail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "PROP\tVALUE\tCOLOR\tCONDITION\n\
                         alphabet_type\tvowel\t#ff0000\n\
                         col1\t0\t#ffffff\tcolor_min\n\
                         col1\t10\t#000000\tcolor_max\n\
                         *\t\t#cccccc\tcolor_nan\n";

    #[test]
    fn test_parse_rows() {
        let cfg = ColorConfig::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(cfg.value_color("alphabet_type", "vowel"), Some("#ff0000"));
        assert_eq!(cfg.value_color("alphabet_type", "consonant"), None);
        let d = cfg.detail("col1");
        assert_eq!(d.min_value(), Some(0.0));
        assert_eq!(d.max_value(), Some(10.0));
        assert_eq!(d.color_nan.as_deref(), Some("#cccccc"));
        assert_eq!(d.max_rgb(), Some(Rgb(0, 0, 0)));
    }

    #[test]
    fn test_unknown_condition() {
        let err = ColorConfig::from_reader("p\tv\t#fff000\tbogus\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::InputValidation(_)));
    }

    #[test]
    fn test_comma_table() {
        let cfg = ColorConfig::from_reader("x,a,#00ff00\n".as_bytes()).unwrap();
        assert_eq!(cfg.value_color("x", "a"), Some("#00ff00"));
    }
}
