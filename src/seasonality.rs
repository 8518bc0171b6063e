use crate::aggregation::ValueField;
use crate::normalizer::CanonicalRecordSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityEntry {
    pub month_of_year: u32,
    pub value: f64,
    /// Share of the yearly total falling in this month. All zero when the total is zero.
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearComparisonRow {
    pub year: i32,
    pub month_of_year: u32,
    pub value: f64,
}

/// Totals per calendar month across all years. Always 12 entries, January
/// first; months without data hold 0.
pub fn seasonality(records: &CanonicalRecordSet, value: ValueField) -> Vec<SeasonalityEntry> {
    let totals = monthly_totals(records, value, |_| true);
    let weights = normalize_weights(&totals);

    totals
        .iter()
        .zip(weights)
        .enumerate()
        .map(|(idx, (value, weight))| SeasonalityEntry {
            month_of_year: idx as u32 + 1,
            value: *value,
            weight,
        })
        .collect()
}

/// Month-by-month amounts for each requested year, 12 rows per year.
/// An empty `years` compares every year present in the data.
pub fn year_comparison(records: &CanonicalRecordSet, years: &[i32]) -> Vec<YearComparisonRow> {
    let selected: BTreeSet<i32> = if years.is_empty() {
        records.time_eligible().filter_map(|r| r.year).collect()
    } else {
        years.iter().copied().collect()
    };

    selected
        .into_iter()
        .flat_map(|year| {
            let totals = monthly_totals(records, ValueField::Amount, |y| y == year);
            totals
                .into_iter()
                .enumerate()
                .map(move |(idx, value)| YearComparisonRow {
                    year,
                    month_of_year: idx as u32 + 1,
                    value,
                })
        })
        .collect()
}

/// Month of year with the largest total, ties going to the earlier month.
pub fn peak_month(entries: &[SeasonalityEntry]) -> Option<u32> {
    entries
        .iter()
        .filter(|e| e.value > 0.0)
        .fold(None::<&SeasonalityEntry>, |best, e| match best {
            Some(b) if b.value >= e.value => Some(b),
            _ => Some(e),
        })
        .map(|e| e.month_of_year)
}

fn monthly_totals(
    records: &CanonicalRecordSet,
    value: ValueField,
    year_filter: impl Fn(i32) -> bool,
) -> [f64; 12] {
    let mut totals = [0.0; 12];
    for record in records.time_eligible() {
        let (Some(year), Some(month)) = (record.year, record.month_of_year) else {
            continue;
        };
        if !year_filter(year) {
            continue;
        }
        totals[(month - 1) as usize] += value.of(record);
    }
    totals
}

fn normalize_weights(weights: &[f64]) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if sum == 0.0 {
        return vec![0.0; weights.len()];
    }
    weights.iter().map(|w| w / sum).collect()
}
