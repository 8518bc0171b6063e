use crate::abc::AbcTable;
use crate::engine::AnalyticsReport;
use crate::error::{AnalyticsError, Result};
use log::{debug, warn};

/// Cross-checks the totals of one [`AnalyticsReport`] against each other.
pub struct ReportReconciler<'a> {
    report: &'a AnalyticsReport,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationResult {
    pub checks_run: usize,
    pub warnings: Vec<String>,
}

impl<'a> ReportReconciler<'a> {
    pub fn new(report: &'a AnalyticsReport) -> Self {
        Self { report }
    }

    /// Fails on the first check whose two sides differ by more than `tolerance`.
    pub fn verify(&self, tolerance: f64) -> Result<VerificationResult> {
        let mut result = VerificationResult::default();
        let report = self.report;

        let abc_tables = [
            ("customer", Some(&report.customer_abc)),
            ("product", report.product_abc.as_ref()),
            ("segment", report.segment_abc.as_ref()),
        ];
        for (name, table) in abc_tables {
            if let Some(table) = table {
                self.verify_abc(name, table, tolerance, &mut result)?;
            }
        }

        let monthly_total = report.monthly_revenue.total();
        let seasonality_total: f64 = report.seasonality.iter().map(|e| e.value).sum();
        check(
            "seasonality_total",
            monthly_total,
            seasonality_total,
            tolerance,
            &mut result,
        )?;

        let comparison_total: f64 = report.year_comparison.iter().map(|r| r.value).sum();
        check(
            "year_comparison_total",
            monthly_total,
            comparison_total,
            tolerance,
            &mut result,
        )?;

        check(
            "timeline_revenue",
            report.kpis.revenue,
            monthly_total + report.kpis.outside_timeline_amount,
            tolerance,
            &mut result,
        )?;

        if report.kpis.outside_timeline_records > 0 {
            result.warnings.push(format!(
                "{} records ({:.2}) are outside the timeline and excluded from time-based analyses",
                report.kpis.outside_timeline_records, report.kpis.outside_timeline_amount
            ));
        }
        if report.normalization.coerced_amounts > 0 {
            result.warnings.push(format!(
                "{} amounts could not be parsed and were counted as 0",
                report.normalization.coerced_amounts
            ));
        }

        for warning in &result.warnings {
            warn!("{}", warning);
        }
        debug!("Reconciliation passed {} checks", result.checks_run);

        Ok(result)
    }

    fn verify_abc(
        &self,
        name: &str,
        table: &AbcTable,
        tolerance: f64,
        result: &mut VerificationResult,
    ) -> Result<()> {
        if table.is_empty() {
            return Ok(());
        }

        let share_sum: f64 = table.rows.iter().map(|r| r.share).sum();
        check(&format!("{}_abc_share_sum", name), 1.0, share_sum, tolerance, result)?;

        let last_cumulative = table.rows.last().map_or(0.0, |r| r.cumulative_share);
        check(
            &format!("{}_abc_cumulative_share", name),
            1.0,
            last_cumulative,
            tolerance,
            result,
        )
    }
}

fn check(
    name: &str,
    expected: f64,
    actual: f64,
    tolerance: f64,
    result: &mut VerificationResult,
) -> Result<()> {
    result.checks_run += 1;
    if (expected - actual).abs() > tolerance {
        return Err(AnalyticsError::ReconciliationMismatch {
            check: name.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

pub fn verify_report(report: &AnalyticsReport, tolerance: f64) -> Result<VerificationResult> {
    ReportReconciler::new(report).verify(tolerance)
}
