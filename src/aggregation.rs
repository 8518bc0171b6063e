//! Read-only aggregations over a [`CanonicalRecordSet`].
//!
//! Grouping functions return entries in first-seen key order. Sorting is the
//! caller's policy: [`AggregateSeries::sorted_chronologically`] for time keys,
//! [`AggregateSeries::sorted_by_value_desc`] for rankings. Records that lack a
//! grouping key (absent field, empty cell, missing date) are skipped rather
//! than treated as errors.

use crate::error::{AnalyticsError, Result};
use crate::normalizer::{CanonicalRecord, CanonicalRecordSet};
use crate::risk::{RiskThresholds, RiskTier};
use crate::utils::{MonthPeriod, QuarterPeriod};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Customer,
    Product,
    Segment,
    TaxCfop,
    TaxCst,
    Document,
    Year,
    Month,
    Quarter,
    MonthOfYear,
}

impl Dimension {
    pub fn is_time(&self) -> bool {
        matches!(
            self,
            Dimension::Year | Dimension::Month | Dimension::Quarter | Dimension::MonthOfYear
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Customer => "customer",
            Dimension::Product => "product",
            Dimension::Segment => "segment",
            Dimension::TaxCfop => "tax_cfop",
            Dimension::TaxCst => "tax_cst",
            Dimension::Document => "document",
            Dimension::Year => "year",
            Dimension::Month => "month",
            Dimension::Quarter => "quarter",
            Dimension::MonthOfYear => "month_of_year",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DimensionValue {
    Text(String),
    Year(i32),
    Month(MonthPeriod),
    Quarter(QuarterPeriod),
    MonthOfYear(u32),
}

impl fmt::Display for DimensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionValue::Text(s) => f.write_str(s),
            DimensionValue::Year(y) => write!(f, "{}", y),
            DimensionValue::Month(m) => write!(f, "{}", m),
            DimensionValue::Quarter(q) => write!(f, "{}", q),
            DimensionValue::MonthOfYear(m) => write!(f, "{}", m),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueField {
    Amount,
    OccurrenceCount,
}

impl ValueField {
    pub fn of(&self, record: &CanonicalRecord) -> f64 {
        match self {
            ValueField::Amount => record.amount,
            ValueField::OccurrenceCount => record.occurrence_count as f64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueField::Amount => "amount",
            ValueField::OccurrenceCount => "occurrence_count",
        }
    }
}

/// The grouping key of `record` along `dimension`.
///
/// Time dimensions only yield a key for time-eligible records; the customer
/// dimension only for records with a customer key.
pub fn dimension_value(record: &CanonicalRecord, dimension: Dimension) -> Option<DimensionValue> {
    let text = |v: &Option<String>| v.clone().map(DimensionValue::Text);

    if dimension.is_time() && !record.is_time_eligible() {
        return None;
    }

    match dimension {
        Dimension::Customer => text(&record.customer_key),
        Dimension::Product => text(&record.product),
        Dimension::Segment => text(&record.segment),
        Dimension::TaxCfop => text(&record.tax_cfop),
        Dimension::TaxCst => text(&record.tax_cst),
        Dimension::Document => text(&record.document),
        Dimension::Year => record.year.map(DimensionValue::Year),
        Dimension::Month => record.month_period.map(DimensionValue::Month),
        Dimension::Quarter => record.quarter_period.map(DimensionValue::Quarter),
        Dimension::MonthOfYear => record.month_of_year.map(DimensionValue::MonthOfYear),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesEntry {
    pub key: DimensionValue,
    pub value: f64,
}

/// Keyed numeric series with unique keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSeries {
    pub dimension: Dimension,
    pub value_field: ValueField,
    pub entries: Vec<SeriesEntry>,
}

impl AggregateSeries {
    pub fn new(dimension: Dimension, value_field: ValueField) -> Self {
        Self {
            dimension,
            value_field,
            entries: Vec::new(),
        }
    }

    /// Builds a monthly series from `(period, value)` points.
    pub fn from_months(points: &[(MonthPeriod, f64)]) -> Self {
        Self {
            dimension: Dimension::Month,
            value_field: ValueField::Amount,
            entries: points
                .iter()
                .map(|(period, value)| SeriesEntry {
                    key: DimensionValue::Month(*period),
                    value: *value,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.value).sum()
    }

    pub fn get(&self, key: &DimensionValue) -> Option<f64> {
        self.entries.iter().find(|e| &e.key == key).map(|e| e.value)
    }

    pub fn sorted_chronologically(&self) -> Self {
        let mut sorted = self.clone();
        sorted.entries.sort_by(|a, b| a.key.cmp(&b.key));
        sorted
    }

    /// Largest value first; equal values keep their current relative order.
    pub fn sorted_by_value_desc(&self) -> Self {
        let mut sorted = self.clone();
        sorted.entries.sort_by(|a, b| b.value.total_cmp(&a.value));
        sorted
    }

    /// Chronological `(month, value)` points of a monthly series.
    pub fn month_points(&self) -> Result<Vec<(MonthPeriod, f64)>> {
        let mut points = self
            .entries
            .iter()
            .map(|e| match e.key {
                DimensionValue::Month(period) => Ok((period, e.value)),
                ref other => Err(AnalyticsError::InvalidSeries {
                    operation: "month_points".to_string(),
                    details: format!("key '{}' is not a month period", other),
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        points.sort_by_key(|(period, _)| *period);
        Ok(points)
    }
}

pub fn total(records: &CanonicalRecordSet, value: ValueField) -> f64 {
    records.iter().map(|r| value.of(r)).sum()
}

pub fn group_sum(
    records: &CanonicalRecordSet,
    dimension: Dimension,
    value: ValueField,
) -> AggregateSeries {
    let mut series = AggregateSeries::new(dimension, value);
    let mut positions: HashMap<DimensionValue, usize> = HashMap::new();

    for record in records {
        let Some(key) = dimension_value(record, dimension) else {
            continue;
        };
        let amount = value.of(record);
        match positions.get(&key) {
            Some(&idx) => series.entries[idx].value += amount,
            None => {
                positions.insert(key.clone(), series.entries.len());
                series.entries.push(SeriesEntry { key, value: amount });
            }
        }
    }

    debug!(
        "group_sum over {} produced {} groups",
        dimension,
        series.entries.len()
    );
    series
}

pub fn distinct_count(records: &CanonicalRecordSet, dimension: Dimension) -> usize {
    records
        .iter()
        .filter_map(|r| dimension_value(r, dimension))
        .collect::<HashSet<_>>()
        .len()
}

/// The `n` largest entries; ties keep first-seen order.
pub fn top_n(series: &AggregateSeries, n: usize) -> AggregateSeries {
    let mut top = series.sorted_by_value_desc();
    top.entries.truncate(n);
    top
}

/// Share of the series total held by its `n` largest entries. 0 when the total is 0.
pub fn concentration_ratio(series: &AggregateSeries, n: usize) -> f64 {
    let total = series.total();
    if total == 0.0 {
        return 0.0;
    }
    top_n(series, n).total() / total
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyUnit {
    /// Every record counts once.
    Occurrences,
    /// Records carrying a document number.
    Documents,
    /// Distinct document numbers.
    DistinctDocuments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub key: DimensionValue,
    pub value: f64,
    pub frequency: usize,
}

/// Value × frequency per key, in first-seen key order.
pub fn matrix(
    records: &CanonicalRecordSet,
    dimension: Dimension,
    value: ValueField,
    frequency: FrequencyUnit,
) -> Vec<MatrixRow> {
    let mut rows: Vec<MatrixRow> = Vec::new();
    let mut documents: Vec<HashSet<String>> = Vec::new();
    let mut positions: HashMap<DimensionValue, usize> = HashMap::new();

    for record in records {
        let Some(key) = dimension_value(record, dimension) else {
            continue;
        };
        let idx = match positions.get(&key) {
            Some(&idx) => idx,
            None => {
                positions.insert(key.clone(), rows.len());
                rows.push(MatrixRow {
                    key,
                    value: 0.0,
                    frequency: 0,
                });
                documents.push(HashSet::new());
                rows.len() - 1
            }
        };

        rows[idx].value += value.of(record);
        match frequency {
            FrequencyUnit::Occurrences => rows[idx].frequency += record.occurrence_count as usize,
            FrequencyUnit::Documents => {
                if record.document.is_some() {
                    rows[idx].frequency += 1;
                }
            }
            FrequencyUnit::DistinctDocuments => {
                if let Some(doc) = &record.document {
                    documents[idx].insert(doc.clone());
                }
            }
        }
    }

    if frequency == FrequencyUnit::DistinctDocuments {
        for (row, docs) in rows.iter_mut().zip(&documents) {
            row.frequency = docs.len();
        }
    }

    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "dimension")]
pub enum Denominator {
    /// Records in the group.
    Rows,
    /// Distinct values of another dimension within the group.
    Distinct(Dimension),
}

/// Mean value per group. Groups with a zero denominator average to 0.
pub fn average(
    records: &CanonicalRecordSet,
    dimension: Dimension,
    value: ValueField,
    denominator: Denominator,
) -> AggregateSeries {
    let sums = group_sum(records, dimension, value);

    let mut counts: HashMap<DimensionValue, usize> = HashMap::new();
    let mut distinct: HashMap<DimensionValue, HashSet<DimensionValue>> = HashMap::new();
    for record in records {
        let Some(key) = dimension_value(record, dimension) else {
            continue;
        };
        match denominator {
            Denominator::Rows => *counts.entry(key).or_default() += 1,
            Denominator::Distinct(other) => {
                let set = distinct.entry(key).or_default();
                if let Some(v) = dimension_value(record, other) {
                    set.insert(v);
                }
            }
        }
    }

    let mut series = AggregateSeries::new(dimension, value);
    series.entries = sums
        .entries
        .into_iter()
        .map(|entry| {
            let denom = match denominator {
                Denominator::Rows => counts.get(&entry.key).copied().unwrap_or(0),
                Denominator::Distinct(_) => distinct.get(&entry.key).map_or(0, HashSet::len),
            };
            let mean = if denom == 0 {
                0.0
            } else {
                entry.value / denom as f64
            };
            SeriesEntry {
                key: entry.key,
                value: mean,
            }
        })
        .collect();
    series
}

/// Restricts a record set to the selected years and months of year.
///
/// An unset criterion matches everything. As soon as any criterion is set,
/// records outside the timeline are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RecordFilter {
    pub years: Option<BTreeSet<i32>>,
    pub months: Option<BTreeSet<u32>>,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.years.is_none() && self.months.is_none()
    }

    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        if self.is_empty() {
            return true;
        }
        if !record.is_time_eligible() {
            return false;
        }
        let year_ok = match (&self.years, record.year) {
            (Some(years), Some(year)) => years.contains(&year),
            (Some(_), None) => false,
            (None, _) => true,
        };
        let month_ok = match (&self.months, record.month_of_year) {
            (Some(months), Some(month)) => months.contains(&month),
            (Some(_), None) => false,
            (None, _) => true,
        };
        year_ok && month_ok
    }
}

/// The kept records, with the normalization counts tallied over them alone.
pub fn filter_records(records: &CanonicalRecordSet, filter: &RecordFilter) -> CanonicalRecordSet {
    let kept: Vec<CanonicalRecord> = records
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect();
    CanonicalRecordSet::from_records(kept)
}

/// Headline figures for one record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub revenue: f64,
    pub active_customers: usize,
    pub average_ticket: f64,
    pub top_concentration: f64,
    pub concentration_top_n: usize,
    pub concentration_risk: RiskTier,
    pub months_covered: usize,
    pub record_count: usize,
    /// Records left out of time-based analyses (no date, or no customer).
    pub outside_timeline_records: usize,
    pub outside_timeline_amount: f64,
}

pub fn compute_kpis(
    records: &CanonicalRecordSet,
    concentration_top_n: usize,
    risk_thresholds: &RiskThresholds,
) -> KpiSummary {
    let revenue = total(records, ValueField::Amount);
    let active_customers = distinct_count(records, Dimension::Customer);
    let by_customer = group_sum(records, Dimension::Customer, ValueField::Amount);
    let top_concentration = concentration_ratio(&by_customer, concentration_top_n);

    let (outside_timeline_records, outside_timeline_amount) = records
        .iter()
        .filter(|r| !r.is_time_eligible())
        .fold((0usize, 0.0f64), |(n, sum), r| (n + 1, sum + r.amount));

    KpiSummary {
        revenue,
        active_customers,
        average_ticket: revenue / active_customers.max(1) as f64,
        top_concentration,
        concentration_top_n,
        concentration_risk: risk_thresholds.score(top_concentration),
        months_covered: distinct_count(records, Dimension::Month),
        record_count: records.len(),
        outside_timeline_records,
        outside_timeline_amount,
    }
}
