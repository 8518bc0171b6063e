use crate::ingestion::{RawRecordSet, RawValue};
use crate::resolver::FieldMap;
use crate::schema::{AnalyticsConfig, CanonicalField, DecimalSeparator};
use crate::utils::{format_plain_number, MonthPeriod, QuarterPeriod};
use chrono::{Datelike, Days, NaiveDate};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Customer key for rows whose customer is unknown: no customer column, or an
/// empty cell on a dated row outside strict mode.
pub const UNKNOWN_CUSTOMER: &str = "UNKNOWN";

/// Largest spreadsheet serial accepted as a date (9999-12-31).
const MAX_SPREADSHEET_SERIAL: f64 = 2_958_465.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizerOptions {
    pub day_first: bool,
    pub decimal_separator: DecimalSeparator,
    pub strict_customer: bool,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            day_first: true,
            decimal_separator: DecimalSeparator::Dot,
            strict_customer: false,
        }
    }
}

impl From<&AnalyticsConfig> for NormalizerOptions {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            day_first: config.day_first,
            decimal_separator: config.decimal_separator,
            strict_customer: config.strict_customer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub date: Option<NaiveDate>,
    pub amount: f64,
    pub customer_key: Option<String>,
    pub product: Option<String>,
    pub segment: Option<String>,
    pub tax_cfop: Option<String>,
    pub tax_cst: Option<String>,
    pub document: Option<String>,
    pub year: Option<i32>,
    pub month_period: Option<MonthPeriod>,
    pub quarter_period: Option<QuarterPeriod>,
    pub month_of_year: Option<u32>,
    pub occurrence_count: u32,
    /// The amount cell could not be parsed and was replaced by 0.
    pub amount_coerced: bool,
    /// The customer column is mapped but this row's cell was empty.
    pub customer_missing: bool,
}

impl CanonicalRecord {
    pub fn new(date: Option<NaiveDate>, amount: f64, customer_key: Option<String>) -> Self {
        Self {
            date,
            amount,
            customer_key,
            product: None,
            segment: None,
            tax_cfop: None,
            tax_cst: None,
            document: None,
            year: date.map(|d| d.year()),
            month_period: date.map(MonthPeriod::from_date),
            quarter_period: date.map(QuarterPeriod::from_date),
            month_of_year: date.map(|d| d.month()),
            occurrence_count: 1,
            amount_coerced: false,
            customer_missing: false,
        }
    }

    /// Eligible for any aggregation keyed by time: both the date and the
    /// customer are known.
    pub fn is_time_eligible(&self) -> bool {
        self.date.is_some() && self.customer_key.is_some()
    }
}

/// Counts of cell-level coercions over the rows of one record set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub total_rows: usize,
    pub unparseable_dates: usize,
    pub coerced_amounts: usize,
    pub missing_customers: usize,
}

impl NormalizationReport {
    pub fn tally(records: &[CanonicalRecord]) -> Self {
        Self {
            total_rows: records.len(),
            unparseable_dates: records.iter().filter(|r| r.date.is_none()).count(),
            coerced_amounts: records.iter().filter(|r| r.amount_coerced).count(),
            missing_customers: records
                .iter()
                .filter(|r| r.customer_missing || r.customer_key.is_none())
                .count(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecordSet {
    pub records: Vec<CanonicalRecord>,
    pub report: NormalizationReport,
}

impl CanonicalRecordSet {
    pub fn from_records(records: Vec<CanonicalRecord>) -> Self {
        let report = NormalizationReport::tally(&records);
        Self { records, report }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalRecord> {
        self.records.iter()
    }

    pub fn time_eligible(&self) -> impl Iterator<Item = &CanonicalRecord> {
        self.records.iter().filter(|r| r.is_time_eligible())
    }
}

impl<'a> IntoIterator for &'a CanonicalRecordSet {
    type Item = &'a CanonicalRecord;
    type IntoIter = std::slice::Iter<'a, CanonicalRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

pub fn normalize_records(
    raw: &RawRecordSet,
    map: &FieldMap,
    options: &NormalizerOptions,
) -> CanonicalRecordSet {
    let date_idx = map.index(CanonicalField::Date);
    let amount_idx = map.index(CanonicalField::Amount);
    let customer_idx = map.index(CanonicalField::Customer);

    let mut records = Vec::with_capacity(raw.len());

    for row in raw.rows() {
        let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i));

        let date = cell(date_idx).and_then(|v| parse_date(v, options.day_first));

        let parsed_amount = cell(amount_idx).map(|v| parse_amount(v, options.decimal_separator));
        let amount_coerced = matches!(parsed_amount, Some(None));
        let amount = parsed_amount.flatten().unwrap_or(0.0);

        let mut customer_missing = false;

        let customer_key = match customer_idx {
            None => Some(UNKNOWN_CUSTOMER.to_string()),
            Some(_) => match cell(customer_idx).and_then(text_value) {
                Some(name) => Some(name.to_uppercase()),
                None => {
                    customer_missing = true;
                    if options.strict_customer || date.is_none() {
                        None
                    } else {
                        Some(UNKNOWN_CUSTOMER.to_string())
                    }
                }
            },
        };

        let optional = |field: CanonicalField| cell(map.index(field)).and_then(text_value);

        let mut record = CanonicalRecord::new(date, amount, customer_key);
        record.amount_coerced = amount_coerced;
        record.customer_missing = customer_missing;
        record.product = optional(CanonicalField::Product);
        record.segment = optional(CanonicalField::Segment);
        record.tax_cfop = optional(CanonicalField::TaxCfop);
        record.tax_cst = optional(CanonicalField::TaxCst);
        record.document = optional(CanonicalField::Document);
        records.push(record);
    }

    let report = NormalizationReport::tally(&records);
    info!(
        "Normalized {} rows ({} unparseable dates, {} amounts coerced to 0, {} missing customers)",
        report.total_rows,
        report.unparseable_dates,
        report.coerced_amounts,
        report.missing_customers
    );

    CanonicalRecordSet { records, report }
}

/// Trimmed textual form of a cell; `None` for empty cells.
pub fn text_value(value: &RawValue) -> Option<String> {
    let text = match value {
        RawValue::Empty => return None,
        RawValue::Text(s) => s.trim().to_string(),
        RawValue::Number(n) if n.is_nan() => return None,
        RawValue::Number(n) => format_plain_number(*n),
        RawValue::Date(d) => d.format("%Y-%m-%d").to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Parses a cell as a calendar date. `None` means "unparseable", never an error.
pub fn parse_date(value: &RawValue, day_first: bool) -> Option<NaiveDate> {
    match value {
        RawValue::Date(d) => Some(*d),
        RawValue::Number(n) => from_spreadsheet_serial(*n),
        RawValue::Text(s) => parse_date_text(s, day_first),
        RawValue::Empty => None,
    }
}

fn from_spreadsheet_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_SPREADSHEET_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.trunc() as u64))
}

fn parse_date_text(text: &str, day_first: bool) -> Option<NaiveDate> {
    let mut token = text.split_whitespace().next()?;
    if token.len() > 10 {
        if let Some((date_part, _)) = token.split_once('T') {
            token = date_part;
        }
    }

    let parts: Vec<&str> = token.split(&['/', '-', '.'][..]).collect();
    if parts.len() != 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        debug!("Unrecognized date text '{}'", text);
        return None;
    }

    let numbers: Vec<u32> = parts.iter().filter_map(|p| p.parse().ok()).collect();
    if numbers.len() != 3 {
        return None;
    }

    if parts[0].len() == 4 {
        return NaiveDate::from_ymd_opt(numbers[0] as i32, numbers[1], numbers[2]);
    }

    let year = match parts[2].len() {
        4 => numbers[2] as i32,
        2 => expand_two_digit_year(numbers[2]),
        _ => return None,
    };

    let (first, second) = (numbers[0], numbers[1]);
    let (primary, fallback) = if day_first {
        ((first, second), (second, first))
    } else {
        ((second, first), (first, second))
    };

    NaiveDate::from_ymd_opt(year, primary.1, primary.0)
        .or_else(|| NaiveDate::from_ymd_opt(year, fallback.1, fallback.0))
}

/// Two-digit years 00–68 land in the 2000s, 69–99 in the 1900s.
fn expand_two_digit_year(yy: u32) -> i32 {
    if yy <= 68 {
        2000 + yy as i32
    } else {
        1900 + yy as i32
    }
}

/// Parses a cell as an amount. `None` means the caller must coerce to 0.
pub fn parse_amount(value: &RawValue, separator: DecimalSeparator) -> Option<f64> {
    match value {
        RawValue::Number(n) if n.is_finite() => Some(*n),
        RawValue::Text(s) => parse_amount_text(s, separator),
        _ => None,
    }
}

fn parse_amount_text(text: &str, separator: DecimalSeparator) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '$' | '€' | '£'))
        .collect();

    let (decimal_mark, group_mark) = match separator {
        DecimalSeparator::Dot => ('.', ','),
        DecimalSeparator::Comma => (',', '.'),
    };

    let (sign, unsigned) = match cleaned.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", cleaned.strip_prefix('+').unwrap_or(cleaned.as_str())),
    };

    let (integer, fraction) = match unsigned.split_once(decimal_mark) {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !all_digits(fraction) {
            return None;
        }
    }

    let digits = ungroup_integer(integer, group_mark)?;
    if digits.is_empty() && fraction.is_none() {
        return None;
    }

    let number = match fraction {
        Some(fraction) if digits.is_empty() => format!("{}0.{}", sign, fraction),
        Some(fraction) => format!("{}{}.{}", sign, digits, fraction),
        None => format!("{}{}", sign, digits),
    };
    number.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Integer digits with grouping marks removed. Groups after the first must
/// hold exactly three digits.
fn ungroup_integer(integer: &str, group_mark: char) -> Option<String> {
    let mut groups = integer.split(group_mark);
    let first = groups.next().unwrap_or_default();
    if !first.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut digits = first.to_string();
    for group in groups {
        if first.is_empty() || group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.push_str(group);
    }
    Some(digits)
}
