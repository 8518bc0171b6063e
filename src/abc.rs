//! ABC (Pareto) classification of a keyed series.

use crate::aggregation::{AggregateSeries, DimensionValue};
use crate::error::{AnalyticsError, Result};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

const BOUNDARY_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AbcClass {
    A,
    B,
    C,
}

impl fmt::Display for AbcClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AbcClass::A => "A",
            AbcClass::B => "B",
            AbcClass::C => "C",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AbcThresholds {
    #[schemars(description = "Entries whose cumulative share is at or below this value are class A")]
    pub a_upper: f64,

    #[schemars(description = "Entries whose cumulative share is at or below this value (and above a_upper) are class B")]
    pub b_upper: f64,
}

impl Default for AbcThresholds {
    fn default() -> Self {
        Self {
            a_upper: 0.80,
            b_upper: 0.95,
        }
    }
}

impl AbcThresholds {
    pub fn validate(&self) -> Result<()> {
        let ordered = 0.0 < self.a_upper && self.a_upper <= self.b_upper && self.b_upper <= 1.0;
        if !ordered {
            return Err(AnalyticsError::InvalidConfig(format!(
                "ABC thresholds must satisfy 0 < a_upper <= b_upper <= 1 (got {} / {})",
                self.a_upper, self.b_upper
            )));
        }
        Ok(())
    }

    /// Boundaries are inclusive: a cumulative share of exactly `a_upper` is A.
    pub fn class_for(&self, cumulative_share: f64) -> AbcClass {
        if cumulative_share <= self.a_upper + BOUNDARY_EPSILON {
            AbcClass::A
        } else if cumulative_share <= self.b_upper + BOUNDARY_EPSILON {
            AbcClass::B
        } else {
            AbcClass::C
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbcRow {
    pub key: DimensionValue,
    pub value: f64,
    pub share: f64,
    pub cumulative_share: f64,
    pub class: AbcClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbcClassSummary {
    pub class: AbcClass,
    pub entries: usize,
    pub value: f64,
    pub share: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbcTable {
    pub rows: Vec<AbcRow>,
    pub total: f64,
}

impl AbcTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn class_of(&self, key: &DimensionValue) -> Option<AbcClass> {
        self.rows.iter().find(|r| &r.key == key).map(|r| r.class)
    }

    /// Entry count, value and share per class, always A, B, C in that order.
    pub fn class_summary(&self) -> Vec<AbcClassSummary> {
        [AbcClass::A, AbcClass::B, AbcClass::C]
            .into_iter()
            .map(|class| {
                let members = self.rows.iter().filter(|r| r.class == class);
                let (entries, value) = members.fold((0, 0.0), |(n, v), r| (n + 1, v + r.value));
                AbcClassSummary {
                    class,
                    entries,
                    value,
                    share: if self.total > 0.0 { value / self.total } else { 0.0 },
                }
            })
            .collect()
    }
}

/// Ranks `series` by value (descending, stable) and assigns classes by
/// cumulative share. A non-positive total yields an empty table.
pub fn classify(series: &AggregateSeries, thresholds: &AbcThresholds) -> AbcTable {
    let total = series.total();
    if total <= 0.0 {
        debug!("ABC skipped: series total {} is not positive", total);
        return AbcTable::default();
    }

    let ranked = series.sorted_by_value_desc();
    let mut running = 0.0;
    let mut floor = AbcClass::A;
    let rows = ranked
        .entries
        .into_iter()
        .map(|entry| {
            running += entry.value;
            let cumulative_share = running / total;
            // Negative entries can pull the running share back down; classes never go back.
            let class = thresholds.class_for(cumulative_share).max(floor);
            floor = class;
            AbcRow {
                key: entry.key,
                value: entry.value,
                share: entry.value / total,
                cumulative_share,
                class,
            }
        })
        .collect();

    AbcTable { rows, total }
}
