use crate::error::{AnalyticsError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// A single cell as delivered by the host's tabular reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Empty,
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl RawValue {
    pub fn is_empty(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::Number(n) => n.is_nan(),
            RawValue::Date(_) => false,
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        if value.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(value.to_string())
        }
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::from(value.as_str())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<NaiveDate> for RawValue {
    fn from(value: NaiveDate) -> Self {
        RawValue::Date(value)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawValue::Empty)
    }
}

/// Rows of raw cells under arbitrary, untrusted column names.
///
/// Every row holds exactly one value per column, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecordSet {
    columns: Vec<String>,
    rows: Vec<Vec<RawValue>>,
}

impl RawRecordSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, values: Vec<RawValue>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(AnalyticsError::RowLengthMismatch {
                row: self.rows.len(),
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        self.rows.push(values);
        Ok(())
    }

    /// Builds a record set from column-oriented data (column name → values).
    pub fn from_columns(columns: Vec<(String, Vec<RawValue>)>) -> Result<Self> {
        let expected = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        for (name, values) in &columns {
            if values.len() != expected {
                return Err(AnalyticsError::ColumnLengthMismatch {
                    column: name.clone(),
                    expected,
                    actual: values.len(),
                });
            }
        }

        let names: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
        let mut iters: Vec<_> = columns.into_iter().map(|(_, v)| v.into_iter()).collect();
        let rows = (0..expected)
            .map(|_| {
                iters
                    .iter_mut()
                    .map(|it| it.next().unwrap_or(RawValue::Empty))
                    .collect()
            })
            .collect();

        Ok(Self {
            columns: names,
            rows,
        })
    }

    /// Reads delimited text with a header row. Cells stay textual; blank cells
    /// become [`RawValue::Empty`].
    pub fn from_csv_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let width = columns.len();

        let mut rows = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            let mut values: Vec<RawValue> = record.iter().take(width).map(RawValue::from).collect();
            values.resize(width, RawValue::Empty);
            rows.push(values);
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<RawValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value(&self, row: usize, column: usize) -> Option<&RawValue> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_row_checks_width() {
        let mut raw = RawRecordSet::new(vec!["a".to_string(), "b".to_string()]);
        assert!(raw.push_row(vec!["1".into(), "2".into()]).is_ok());
        let err = raw.push_row(vec!["1".into()]).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::RowLengthMismatch {
                row: 1,
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(raw.len(), 1);
    }

    #[test]
    fn test_from_columns_transposes() {
        let raw = RawRecordSet::from_columns(vec![
            ("Cliente".to_string(), vec!["ACME".into(), "Beta".into()]),
            ("Total".to_string(), vec![10.0.into(), 20.0.into()]),
        ])
        .unwrap();

        assert_eq!(raw.columns(), &["Cliente".to_string(), "Total".to_string()]);
        assert_eq!(raw.value(1, 0), Some(&RawValue::Text("Beta".to_string())));
        assert_eq!(raw.value(1, 1), Some(&RawValue::Number(20.0)));
    }

    #[test]
    fn test_from_columns_rejects_ragged_input() {
        let result = RawRecordSet::from_columns(vec![
            ("a".to_string(), vec!["1".into(), "2".into()]),
            ("b".to_string(), vec!["1".into()]),
        ]);
        assert!(matches!(
            result,
            Err(AnalyticsError::ColumnLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_from_csv_reader() {
        let data = "\u{feff}Data;Cliente;Total\n05/01/2023;ACME;100\n06/01/2023;;\n";
        let raw = RawRecordSet::from_csv_reader(data.as_bytes(), b';').unwrap();

        assert_eq!(raw.columns()[0], "Data");
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.value(0, 1), Some(&RawValue::Text("ACME".to_string())));
        assert_eq!(raw.value(1, 1), Some(&RawValue::Empty));
        assert_eq!(raw.value(1, 2), Some(&RawValue::Empty));
    }

    #[test]
    fn test_short_csv_rows_are_padded() {
        let data = "a,b,c\n1,2\n";
        let raw = RawRecordSet::from_csv_reader(data.as_bytes(), b',').unwrap();
        assert_eq!(raw.rows()[0].len(), 3);
        assert!(raw.rows()[0][2].is_empty());
    }
}
