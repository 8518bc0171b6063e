//! # Invoice Analytics
//!
//! A library for turning heterogeneous invoice and sales exports into revenue
//! analytics: KPIs, customer and product rankings, ABC (Pareto) curves,
//! concentration risk, seasonality and scenario-based revenue projections.
//!
//! ## Core Concepts
//!
//! - **Raw Records**: Untyped rows under whatever column names the source system used
//! - **Field Map**: Which source column plays each canonical role (date, customer, amount, ...)
//! - **Canonical Records**: Typed rows with derived year, month and quarter keys
//! - **Aggregations**: Group-by sums, rankings, matrices and averages over canonical records
//! - **Projection**: Compounded monthly revenue under conservative, base, optimistic and planned growth
//!
//! ## Example
//!
//! ```rust,ignore
//! use invoice_analytics::*;
//!
//! let csv = "Data;Razão Social/Nome;Total\n05/01/2023;ACME;100\n10/02/2023;Beta;110\n";
//! let raw = RawRecordSet::from_csv_reader(csv.as_bytes(), b';')?;
//!
//! let report = AnalyticsProcessor::process(&AnalyticsConfig::default(), &raw)?;
//! println!("Revenue: {}", report.kpis.revenue);
//!
//! for table in report.tables() {
//!     println!("{}", table.to_markdown());
//! }
//! ```

pub mod abc;
pub mod aggregation;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod normalizer;
pub mod projection;
pub mod reconciliation;
pub mod report;
pub mod resolver;
pub mod risk;
pub mod schema;
pub mod seasonality;
pub mod utils;

pub use abc::{classify, AbcClass, AbcClassSummary, AbcRow, AbcTable, AbcThresholds};
pub use aggregation::{
    average, compute_kpis, concentration_ratio, dimension_value, distinct_count, filter_records,
    group_sum, matrix, top_n, total, AggregateSeries, Denominator, Dimension, DimensionValue,
    FrequencyUnit, KpiSummary, MatrixRow, RecordFilter, SeriesEntry, ValueField,
};
pub use engine::{analyze_raw_records, AnalyticsEngine, AnalyticsReport};
pub use error::{AnalyticsError, Result};
pub use ingestion::{RawRecordSet, RawValue};
pub use normalizer::{
    normalize_records, CanonicalRecord, CanonicalRecordSet, NormalizationReport,
    NormalizerOptions, UNKNOWN_CUSTOMER,
};
pub use projection::{
    growth_statistics, project, GrowthStatistics, ProjectedPoint, Projection, ProjectionOutcome,
    Scenario, ScenarioRates,
};
pub use reconciliation::{verify_report, ReportReconciler, VerificationResult};
pub use report::{Cell, Table};
pub use resolver::{
    normalize_column_name, resolve_and_validate, resolve_fields, FieldBinding, FieldMap,
};
pub use risk::{RiskThresholds, RiskTier};
pub use schema::*;
pub use seasonality::{
    peak_month, seasonality, year_comparison, SeasonalityEntry, YearComparisonRow,
};
pub use utils::*;

use log::{debug, info};

pub struct AnalyticsProcessor;

impl AnalyticsProcessor {
    pub fn process(config: &AnalyticsConfig, raw: &RawRecordSet) -> Result<AnalyticsReport> {
        Self::process_filtered(config, raw, &RecordFilter::default())
    }

    pub fn process_filtered(
        config: &AnalyticsConfig,
        raw: &RawRecordSet,
        filter: &RecordFilter,
    ) -> Result<AnalyticsReport> {
        info!(
            "Processing {} raw rows across {} columns",
            raw.len(),
            raw.columns().len()
        );
        debug!("Source columns: {:?}", raw.columns());

        let engine = AnalyticsEngine::new(config.clone())?;
        engine.run_filtered(raw, filter)
    }

    pub fn process_with_verification(
        config: &AnalyticsConfig,
        raw: &RawRecordSet,
        tolerance: f64,
    ) -> Result<AnalyticsReport> {
        let report = Self::process(config, raw)?;

        let verification = verify_report(&report, tolerance)?;
        debug!(
            "Verification ran {} checks with {} warnings",
            verification.checks_run,
            verification.warnings.len()
        );

        Ok(report)
    }
}

pub fn process_invoices(config: &AnalyticsConfig, raw: &RawRecordSet) -> Result<AnalyticsReport> {
    AnalyticsProcessor::process(config, raw)
}

pub fn process_with_verification(
    config: &AnalyticsConfig,
    raw: &RawRecordSet,
    tolerance: f64,
) -> Result<AnalyticsReport> {
    AnalyticsProcessor::process_with_verification(config, raw, tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_from_csv(csv: &str) -> RawRecordSet {
        RawRecordSet::from_csv_reader(csv.as_bytes(), b';').unwrap()
    }

    #[test]
    fn test_end_to_end_processing() {
        let raw = raw_from_csv(
            "Data;Razão Social/Nome;Total;Produto\n\
             05/01/2023;ACME;100;Widget\n\
             10/02/2023;Beta;110;Gadget\n\
             15/03/2023;ACME;121;Widget\n",
        );

        let report = process_invoices(&AnalyticsConfig::default(), &raw).unwrap();
        assert_eq!(report.kpis.revenue, 331.0);
        assert_eq!(report.kpis.active_customers, 2);
        assert_eq!(
            report.field_map.column(CanonicalField::Product),
            Some("Produto")
        );

        let products = report.product_abc.as_ref().unwrap();
        assert_eq!(products.rows[0].key.to_string(), "Widget");
        assert_eq!(products.rows[0].class, AbcClass::A);
    }

    #[test]
    fn test_process_with_verification() {
        let raw = raw_from_csv(
            "Emissão;Cliente;Valor\n\
             01/01/2024;ACME;10\n\
             ;ACME;5\n\
             01/02/2024;;abc\n",
        );

        let report = process_with_verification(&AnalyticsConfig::default(), &raw, 1e-6).unwrap();
        assert_eq!(report.kpis.record_count, 3);
        assert_eq!(report.normalization.coerced_amounts, 1);
        assert_eq!(report.kpis.outside_timeline_amount, 5.0);
    }

    #[test]
    fn test_process_rejects_invalid_config() {
        let raw = raw_from_csv("Data;Cliente;Total\n");
        let mut config = AnalyticsConfig::default();
        config.abc_thresholds.a_upper = 1.5;
        assert!(matches!(
            AnalyticsProcessor::process(&config, &raw),
            Err(AnalyticsError::InvalidConfig(_))
        ));
    }
}
