//! Scoring tables attached to declarations.
//!
//! * [`Mapping`] / [`AreaMapping`] belong to response declarations and drive
//!   `mapResponse` / `mapResponsePoint`.
//! * [`LookupTable`] belongs to outcome declarations and drives
//!   `lookupOutcomeValue`.

use serde::{Deserialize, Serialize};

use super::shape::Shape;

fn default_true() -> bool {
    true
}

/// Response value → score table.
///
/// Map keys are literals of the response's base type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
    #[serde(default)]
    pub default_value: f64,
    #[serde(default)]
    pub map_entries: Vec<MapEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntry {
    pub map_key: String,
    pub mapped_value: f64,
    /// Only meaningful for string responses.
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
}

/// Point → score table built from hotspot areas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
    #[serde(default)]
    pub default_value: f64,
    #[serde(default)]
    pub area_map_entries: Vec<AreaMapEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaMapEntry {
    pub shape: Shape,
    #[serde(default)]
    pub coords: Vec<i32>,
    pub mapped_value: f64,
}

/// Clamp `value` into optional bounds.
pub fn clamp_to_bounds(value: f64, lower: Option<f64>, upper: Option<f64>) -> f64 {
    let value = match lower {
        Some(lower) if value < lower => lower,
        _ => value,
    };
    match upper {
        Some(upper) if value > upper => upper,
        _ => value,
    }
}

/// Outcome lookup table. Target values are literals of the outcome's base
/// type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LookupTable {
    /// Exact integer source values.
    MatchTable {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
        entries: Vec<MatchTableEntry>,
    },
    /// Numeric thresholds tested in order; the first entry whose source value
    /// the input reaches wins.
    InterpolationTable {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
        entries: Vec<InterpolationTableEntry>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTableEntry {
    pub source_value: i32,
    pub target_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolationTableEntry {
    pub source_value: f64,
    #[serde(default = "default_true")]
    pub include_boundary: bool,
    pub target_value: String,
}

impl LookupTable {
    pub fn default_value(&self) -> Option<&str> {
        match self {
            LookupTable::MatchTable { default_value, .. }
            | LookupTable::InterpolationTable { default_value, .. } => default_value.as_deref(),
        }
    }

    /// Target literal for a numeric source, falling back to the table
    /// default. Match tables only match integral sources.
    pub fn lookup(&self, source: f64) -> Option<&str> {
        let hit = match self {
            LookupTable::MatchTable { entries, .. } => entries
                .iter()
                .find(|e| f64::from(e.source_value) == source)
                .map(|e| e.target_value.as_str()),
            LookupTable::InterpolationTable { entries, .. } => entries
                .iter()
                .find(|e| {
                    if e.include_boundary {
                        source >= e.source_value
                    } else {
                        source > e.source_value
                    }
                })
                .map(|e| e.target_value.as_str()),
        };
        hit.or_else(|| self.default_value())
    }
}
