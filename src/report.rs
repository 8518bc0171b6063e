//! Host-agnostic tables: ordered named columns plus rows of cells, exportable
//! as CSV, Markdown and JSON.

use crate::abc::AbcTable;
use crate::aggregation::{AggregateSeries, Dimension, KpiSummary, MatrixRow};
use crate::error::{AnalyticsError, Result};
use crate::normalizer::NormalizationReport;
use crate::projection::ProjectionOutcome;
use crate::resolver::FieldMap;
use crate::seasonality::{SeasonalityEntry, YearComparisonRow};
use crate::utils::format_plain_number;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Integer(i64),
    Number(f64),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Number(n) => f.write_str(&format_plain_number(*n)),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Integer(value as i64)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::Integer(value as i64)
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Cell::Integer(value as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(title: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            title: title.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    pub fn field_map(map: &FieldMap) -> Self {
        let mut table = Self::new("Field map", &["field", "status", "source_column"]);
        for (field, binding) in map.bindings() {
            let status = if binding.is_mapped() { "mapped" } else { "absent" };
            table.push_row(vec![
                field.as_str().into(),
                status.into(),
                binding.column().map(Cell::from).unwrap_or(Cell::Empty),
            ]);
        }
        table
    }

    pub fn normalization(report: &NormalizationReport) -> Self {
        let mut table = Self::new("Normalization", &["metric", "value"]);
        for (metric, value) in [
            ("total_rows", report.total_rows),
            ("unparseable_dates", report.unparseable_dates),
            ("coerced_amounts", report.coerced_amounts),
            ("missing_customers", report.missing_customers),
        ] {
            table.push_row(vec![metric.into(), value.into()]);
        }
        table
    }

    pub fn series(title: impl Into<String>, series: &AggregateSeries) -> Self {
        let mut table = Self::new(
            title,
            &[series.dimension.as_str(), series.value_field.as_str()],
        );
        for entry in &series.entries {
            table.push_row(vec![entry.key.to_string().into(), entry.value.into()]);
        }
        table
    }

    pub fn abc(title: impl Into<String>, abc: &AbcTable) -> Self {
        let mut table = Self::new(
            title,
            &["key", "value", "share", "cumulative_share", "class"],
        );
        for row in &abc.rows {
            table.push_row(vec![
                row.key.to_string().into(),
                row.value.into(),
                row.share.into(),
                row.cumulative_share.into(),
                row.class.to_string().into(),
            ]);
        }
        table
    }

    pub fn abc_summary(title: impl Into<String>, abc: &AbcTable) -> Self {
        let mut table = Self::new(title, &["class", "entries", "value", "share"]);
        for summary in abc.class_summary() {
            table.push_row(vec![
                summary.class.to_string().into(),
                summary.entries.into(),
                summary.value.into(),
                summary.share.into(),
            ]);
        }
        table
    }

    pub fn matrix(title: impl Into<String>, dimension: Dimension, rows: &[MatrixRow]) -> Self {
        let mut table = Self::new(title, &[dimension.as_str(), "value", "frequency"]);
        for row in rows {
            table.push_row(vec![
                row.key.to_string().into(),
                row.value.into(),
                row.frequency.into(),
            ]);
        }
        table
    }

    pub fn seasonality(entries: &[SeasonalityEntry]) -> Self {
        let mut table = Self::new("Seasonality", &["month_of_year", "value", "weight"]);
        for entry in entries {
            table.push_row(vec![
                entry.month_of_year.into(),
                entry.value.into(),
                entry.weight.into(),
            ]);
        }
        table
    }

    pub fn year_comparison(rows: &[YearComparisonRow]) -> Self {
        let mut table = Self::new("Year comparison", &["year", "month_of_year", "value"]);
        for row in rows {
            table.push_row(vec![row.year.into(), row.month_of_year.into(), row.value.into()]);
        }
        table
    }

    /// One row per projected month. Insufficient data yields no rows.
    pub fn projection(outcome: &ProjectionOutcome) -> Self {
        let mut table = Self::new(
            "Projection",
            &["period", "conservative", "base", "optimistic", "planned"],
        );
        if let Some(projection) = outcome.projection() {
            for point in &projection.points {
                table.push_row(vec![
                    point.period.to_string().into(),
                    point.conservative.into(),
                    point.base.into(),
                    point.optimistic.into(),
                    point.planned.into(),
                ]);
            }
        }
        table
    }

    pub fn kpis(kpis: &KpiSummary) -> Self {
        let mut table = Self::new("KPIs", &["metric", "value"]);
        let rows: [(&str, Cell); 10] = [
            ("revenue", kpis.revenue.into()),
            ("active_customers", kpis.active_customers.into()),
            ("average_ticket", kpis.average_ticket.into()),
            ("top_concentration", kpis.top_concentration.into()),
            ("concentration_top_n", kpis.concentration_top_n.into()),
            ("concentration_risk", kpis.concentration_risk.to_string().into()),
            ("months_covered", kpis.months_covered.into()),
            ("record_count", kpis.record_count.into()),
            ("outside_timeline_records", kpis.outside_timeline_records.into()),
            ("outside_timeline_amount", kpis.outside_timeline_amount.into()),
        ];
        for (metric, value) in rows {
            table.push_row(vec![metric.into(), value]);
        }
        table
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|cell| cell.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| AnalyticsError::IoError(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("## {}\n\n", self.title));
        output.push_str(&format!("| {} |\n", self.columns.join(" | ")));
        output.push_str(&format!(
            "|{}|\n",
            vec!["---"; self.columns.len()].join("|")
        ));

        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|cell| cell.to_string().replace('|', "\\|"))
                .collect();
            output.push_str(&format!("| {} |\n", cells.join(" | ")));
        }

        output
    }
}
