use crate::error::{AnalyticsError, Result};
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar month key (`YYYY-MM`). Orders chronologically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct MonthPeriod {
    pub year: i32,
    pub month: u32,
}

impl MonthPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(AnalyticsError::DateError(format!(
                "Invalid month {} for year {}",
                month, year
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The `n` consecutive months following this one.
    pub fn following(&self, n: usize) -> Vec<MonthPeriod> {
        let mut periods = Vec::with_capacity(n);
        let mut current = *self;
        for _ in 0..n {
            current = current.next();
            periods.push(current);
        }
        periods
    }

    pub fn quarter(&self) -> QuarterPeriod {
        QuarterPeriod {
            year: self.year,
            quarter: (self.month - 1) / 3 + 1,
        }
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A calendar quarter key (`YYYY-Qn`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct QuarterPeriod {
    pub year: i32,
    pub quarter: u32,
}

impl QuarterPeriod {
    pub fn from_date(date: NaiveDate) -> Self {
        MonthPeriod::from_date(date).quarter()
    }
}

impl fmt::Display for QuarterPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-Q{}", self.year, self.quarter)
    }
}

/// Signed number of calendar months from `start` to `end`.
pub fn months_between(start: MonthPeriod, end: MonthPeriod) -> i32 {
    let year_diff = end.year - start.year;
    let month_diff = end.month as i32 - start.month as i32;
    year_diff * 12 + month_diff
}

/// Formats a float the way a spreadsheet shows a plain number: integral values
/// lose the trailing `.0`.
pub fn format_plain_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_period_next() {
        let dec = MonthPeriod::new(2023, 12).unwrap();
        assert_eq!(dec.next(), MonthPeriod::new(2024, 1).unwrap());
        assert_eq!(dec.next().to_string(), "2024-01");
    }

    #[test]
    fn test_following_crosses_year_boundary() {
        let start = MonthPeriod::new(2023, 11).unwrap();
        let periods = start.following(3);
        let labels: Vec<String> = periods.iter().map(|p| p.to_string()).collect();
        assert_eq!(labels, vec!["2023-12", "2024-01", "2024-02"]);
    }

    #[test]
    fn test_invalid_month_rejected() {
        assert!(MonthPeriod::new(2023, 0).is_err());
        assert!(MonthPeriod::new(2023, 13).is_err());
    }

    #[test]
    fn test_quarter_from_month() {
        assert_eq!(MonthPeriod::new(2023, 3).unwrap().quarter().quarter, 1);
        assert_eq!(MonthPeriod::new(2023, 4).unwrap().quarter().quarter, 2);
        assert_eq!(MonthPeriod::new(2023, 12).unwrap().quarter().to_string(), "2023-Q4");
    }

    #[test]
    fn test_months_between() {
        let a = MonthPeriod::new(2022, 11).unwrap();
        let b = MonthPeriod::new(2023, 2).unwrap();
        assert_eq!(months_between(a, b), 3);
        assert_eq!(months_between(b, a), -3);
    }

    #[test]
    fn test_format_plain_number() {
        assert_eq!(format_plain_number(5102.0), "5102");
        assert_eq!(format_plain_number(12.5), "12.5");
    }
}
