use crate::abc::{classify, AbcTable};
use crate::aggregation::{
    compute_kpis, filter_records, group_sum, matrix, top_n, AggregateSeries, Dimension,
    FrequencyUnit, KpiSummary, MatrixRow, RecordFilter, ValueField,
};
use crate::error::Result;
use crate::ingestion::RawRecordSet;
use crate::normalizer::{
    normalize_records, CanonicalRecordSet, NormalizationReport, NormalizerOptions,
};
use crate::projection::{project, ProjectionOutcome};
use crate::report::Table;
use crate::resolver::{resolve_fields, FieldMap};
use crate::schema::{AnalyticsConfig, CanonicalField};
use crate::seasonality::{seasonality, year_comparison, SeasonalityEntry, YearComparisonRow};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Every output of one analytics run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub field_map: FieldMap,
    pub normalization: NormalizationReport,
    pub filter: RecordFilter,
    pub kpis: KpiSummary,
    /// Chronological.
    pub monthly_revenue: AggregateSeries,
    pub quarterly_revenue: AggregateSeries,
    pub yearly_revenue: AggregateSeries,
    pub top_customers: AggregateSeries,
    pub customer_matrix: Vec<MatrixRow>,
    pub customer_abc: AbcTable,
    pub product_abc: Option<AbcTable>,
    pub segment_abc: Option<AbcTable>,
    pub segment_revenue: Option<AggregateSeries>,
    pub tax_cfop_revenue: Option<AggregateSeries>,
    pub seasonality: Vec<SeasonalityEntry>,
    pub year_comparison: Vec<YearComparisonRow>,
    pub projection: ProjectionOutcome,
}

impl AnalyticsReport {
    /// All outputs as exportable tables. Optional analyses are left out when
    /// their field was not mapped.
    pub fn tables(&self) -> Vec<Table> {
        let mut tables = vec![
            Table::field_map(&self.field_map),
            Table::normalization(&self.normalization),
            Table::kpis(&self.kpis),
            Table::series("Monthly revenue", &self.monthly_revenue),
            Table::series("Quarterly revenue", &self.quarterly_revenue),
            Table::series("Yearly revenue", &self.yearly_revenue),
            Table::series("Top customers", &self.top_customers),
            Table::matrix("Customer matrix", Dimension::Customer, &self.customer_matrix),
            Table::abc("Customer ABC", &self.customer_abc),
            Table::abc_summary("Customer ABC summary", &self.customer_abc),
        ];

        if let Some(abc) = &self.product_abc {
            tables.push(Table::abc("Product ABC", abc));
        }
        if let Some(abc) = &self.segment_abc {
            tables.push(Table::abc("Segment ABC", abc));
        }
        if let Some(series) = &self.segment_revenue {
            tables.push(Table::series("Revenue by segment", series));
        }
        if let Some(series) = &self.tax_cfop_revenue {
            tables.push(Table::series("Revenue by CFOP", series));
        }

        tables.push(Table::seasonality(&self.seasonality));
        tables.push(Table::year_comparison(&self.year_comparison));
        tables.push(Table::projection(&self.projection));
        tables
    }
}

pub struct AnalyticsEngine {
    config: AnalyticsConfig,
}

impl AnalyticsEngine {
    pub fn new(config: AnalyticsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Resolves the source columns and fails if a required field is missing.
    pub fn resolve(&self, raw: &RawRecordSet) -> Result<FieldMap> {
        let map = resolve_fields(raw.columns(), &self.config.synonyms);
        map.validate_required(&self.config.required_fields)?;
        Ok(map)
    }

    pub fn normalize(&self, raw: &RawRecordSet, map: &FieldMap) -> CanonicalRecordSet {
        normalize_records(raw, map, &NormalizerOptions::from(&self.config))
    }

    pub fn run(&self, raw: &RawRecordSet) -> Result<AnalyticsReport> {
        self.run_filtered(raw, &RecordFilter::default())
    }

    pub fn run_filtered(
        &self,
        raw: &RawRecordSet,
        filter: &RecordFilter,
    ) -> Result<AnalyticsReport> {
        let map = self.resolve(raw)?;
        let records = self.normalize(raw, &map);
        let records = if filter.is_empty() {
            records
        } else {
            let filtered = filter_records(&records, filter);
            debug!(
                "Filter kept {} of {} records",
                filtered.len(),
                records.len()
            );
            filtered
        };
        self.analyze(map, &records, filter)
    }

    /// Runs every analysis over already normalized records.
    pub fn analyze(
        &self,
        field_map: FieldMap,
        records: &CanonicalRecordSet,
        filter: &RecordFilter,
    ) -> Result<AnalyticsReport> {
        let config = &self.config;
        info!("Analyzing {} canonical records", records.len());

        let monthly_revenue =
            group_sum(records, Dimension::Month, ValueField::Amount).sorted_chronologically();
        let quarterly_revenue =
            group_sum(records, Dimension::Quarter, ValueField::Amount).sorted_chronologically();
        let yearly_revenue =
            group_sum(records, Dimension::Year, ValueField::Amount).sorted_chronologically();

        let by_customer = group_sum(records, Dimension::Customer, ValueField::Amount);
        let top_customers = top_n(&by_customer, config.top_customers);
        let customer_abc = classify(&by_customer, &config.abc_thresholds);

        let frequency = if field_map.is_mapped(CanonicalField::Document) {
            FrequencyUnit::DistinctDocuments
        } else {
            FrequencyUnit::Occurrences
        };
        let customer_matrix = matrix(records, Dimension::Customer, ValueField::Amount, frequency);

        let optional_abc = |field: CanonicalField, dimension: Dimension| {
            field_map.is_mapped(field).then(|| {
                classify(
                    &group_sum(records, dimension, ValueField::Amount),
                    &config.abc_thresholds,
                )
            })
        };
        let product_abc = optional_abc(CanonicalField::Product, Dimension::Product);
        let segment_abc = optional_abc(CanonicalField::Segment, Dimension::Segment);

        let optional_series = |field: CanonicalField, dimension: Dimension| {
            field_map.is_mapped(field).then(|| {
                group_sum(records, dimension, ValueField::Amount).sorted_by_value_desc()
            })
        };
        let segment_revenue = optional_series(CanonicalField::Segment, Dimension::Segment);
        let tax_cfop_revenue = optional_series(CanonicalField::TaxCfop, Dimension::TaxCfop);

        let projection = project(
            &monthly_revenue,
            config.projection.horizon,
            config.projection.planned_growth,
        )?;

        let report = AnalyticsReport {
            normalization: records.report.clone(),
            filter: filter.clone(),
            kpis: compute_kpis(records, config.concentration_top_n, &config.risk_thresholds),
            monthly_revenue,
            quarterly_revenue,
            yearly_revenue,
            top_customers,
            customer_matrix,
            customer_abc,
            product_abc,
            segment_abc,
            segment_revenue,
            tax_cfop_revenue,
            seasonality: seasonality(records, ValueField::Amount),
            year_comparison: year_comparison(records, &[]),
            projection,
            field_map,
        };

        debug!(
            "Report: revenue {:.2}, {} customers, {} months, concentration {:.3} ({})",
            report.kpis.revenue,
            report.kpis.active_customers,
            report.kpis.months_covered,
            report.kpis.top_concentration,
            report.kpis.concentration_risk
        );

        Ok(report)
    }
}

/// One-shot run with the given configuration.
pub fn analyze_raw_records(
    config: &AnalyticsConfig,
    raw: &RawRecordSet,
) -> Result<AnalyticsReport> {
    AnalyticsEngine::new(config.clone())?.run(raw)
}
