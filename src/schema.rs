use crate::abc::AbcThresholds;
use crate::error::{AnalyticsError, Result};
use crate::projection::MAX_HORIZON;
use crate::risk::RiskThresholds;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// The semantic roles source columns are mapped onto.
///
/// Declaration order is the resolution order: when two fields could claim the
/// same source column, the earlier field wins.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    #[schemars(description = "Issue date of the invoice or sale")]
    Date,

    #[schemars(description = "Customer name or legal name; used as the grouping key for customer analyses")]
    Customer,

    #[schemars(description = "Monetary amount of the line or document")]
    Amount,

    #[schemars(description = "Product or item description")]
    Product,

    #[schemars(description = "Business segment or category")]
    Segment,

    #[schemars(description = "Fiscal operation code (CFOP)")]
    TaxCfop,

    #[schemars(description = "Tax situation code (CST)")]
    TaxCst,

    #[schemars(description = "Invoice or document number")]
    Document,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 8] = [
        CanonicalField::Date,
        CanonicalField::Customer,
        CanonicalField::Amount,
        CanonicalField::Product,
        CanonicalField::Segment,
        CanonicalField::TaxCfop,
        CanonicalField::TaxCst,
        CanonicalField::Document,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Date => "date",
            CanonicalField::Customer => "customer",
            CanonicalField::Amount => "amount",
            CanonicalField::Product => "product",
            CanonicalField::Segment => "segment",
            CanonicalField::TaxCfop => "tax_cfop",
            CanonicalField::TaxCst => "tax_cst",
            CanonicalField::Document => "document",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical field → candidate source column names, in priority order.
pub type SynonymTable = BTreeMap<CanonicalField, Vec<String>>;

pub fn default_synonyms() -> SynonymTable {
    let entries: [(CanonicalField, &[&str]); 8] = [
        (
            CanonicalField::Date,
            &[
                "data",
                "data emissão",
                "emissão",
                "data_emissao",
                "dt emissão",
                "date",
                "invoice date",
            ],
        ),
        (
            CanonicalField::Customer,
            &[
                "razão social/nome",
                "razão social",
                "cliente",
                "nome",
                "nome cliente",
                "customer",
            ],
        ),
        (
            CanonicalField::Amount,
            &[
                "total",
                "valor total",
                "valor_total",
                "valor_nf",
                "valor nota",
                "venda",
                "valor",
                "amount",
            ],
        ),
        (
            CanonicalField::Product,
            &["produto", "descrição produto", "item", "product"],
        ),
        (CanonicalField::Segment, &["segmento", "categoria", "segment"]),
        (CanonicalField::TaxCfop, &["cfop"]),
        (CanonicalField::TaxCst, &["cst"]),
        (
            CanonicalField::Document,
            &["nº", "numero", "número nf", "nf", "nota", "documento", "document"],
        ),
    ];

    entries
        .into_iter()
        .map(|(field, names)| (field, names.iter().map(|n| n.to_string()).collect()))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecimalSeparator {
    #[default]
    #[schemars(description = "1,234.56 style: '.' separates decimals, ',' groups thousands")]
    Dot,

    #[schemars(description = "1.234,56 style: ',' separates decimals, '.' groups thousands")]
    Comma,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProjectionSettings {
    #[schemars(description = "Number of future months to project (1 to 120)")]
    pub horizon: u32,

    #[schemars(
        description = "Monthly growth rate for the planned scenario (0.05 = 5%). Defaults to the observed mean growth."
    )]
    pub planned_growth: Option<f64>,
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self {
            horizon: 12,
            planned_growth: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalyticsConfig {
    #[schemars(
        description = "Candidate source column names per canonical field, highest priority first. Matching ignores accents, case, whitespace, '_' and '-'."
    )]
    pub synonyms: SynonymTable,

    #[schemars(description = "Canonical fields that must be resolved for an analytics run to start")]
    pub required_fields: Vec<CanonicalField>,

    #[schemars(description = "Read ambiguous dates such as 03/04/2023 as day/month/year")]
    pub day_first: bool,

    #[schemars(
        description = "Decimal separator used by textual amounts. Defaults to dot, the plain machine format; it is independent of day_first, so exports with 1.234,56 style amounts must select comma. Amounts that do not fit the chosen style are counted as 0"
    )]
    pub decimal_separator: DecimalSeparator,

    #[schemars(
        description = "When true, rows with an empty customer cell are left out of customer analyses instead of being grouped under UNKNOWN"
    )]
    pub strict_customer: bool,

    #[schemars(description = "Cumulative share cut points for ABC classes")]
    pub abc_thresholds: AbcThresholds,

    #[schemars(description = "Concentration ratio cut points for risk tiers")]
    pub risk_thresholds: RiskThresholds,

    #[schemars(description = "How many top customers feed the concentration ratio")]
    pub concentration_top_n: usize,

    #[schemars(description = "How many customers the ranking table keeps")]
    pub top_customers: usize,

    pub projection: ProjectionSettings,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            synonyms: default_synonyms(),
            required_fields: vec![
                CanonicalField::Date,
                CanonicalField::Customer,
                CanonicalField::Amount,
            ],
            day_first: true,
            decimal_separator: DecimalSeparator::Dot,
            strict_customer: false,
            abc_thresholds: AbcThresholds::default(),
            risk_thresholds: RiskThresholds::default(),
            concentration_top_n: 5,
            top_customers: 10,
            projection: ProjectionSettings::default(),
        }
    }
}

impl AnalyticsConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AnalyticsConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        for field in &self.required_fields {
            let has_candidates = self
                .synonyms
                .get(field)
                .map(|names| !names.is_empty())
                .unwrap_or(false);
            if !has_candidates {
                return Err(AnalyticsError::InvalidConfig(format!(
                    "required field '{}' has no candidate column names",
                    field
                )));
            }
        }

        self.abc_thresholds.validate()?;
        self.risk_thresholds.validate()?;

        if self.concentration_top_n == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "concentration_top_n must be at least 1".to_string(),
            ));
        }
        if self.top_customers == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "top_customers must be at least 1".to_string(),
            ));
        }
        if self.projection.horizon == 0 || self.projection.horizon > MAX_HORIZON {
            return Err(AnalyticsError::InvalidHorizon(self.projection.horizon));
        }
        if let Some(rate) = self.projection.planned_growth {
            if !rate.is_finite() || rate <= -1.0 {
                return Err(AnalyticsError::InvalidConfig(format!(
                    "planned_growth {} must be a finite rate above -1.0",
                    rate
                )));
            }
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalyticsConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = AnalyticsConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("synonyms"));
        assert!(schema_json.contains("required_fields"));
        assert!(schema_json.contains("day_first"));
        assert!(schema_json.contains("abc_thresholds"));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalyticsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.synonyms.len(), CanonicalField::ALL.len());
        assert_eq!(config.concentration_top_n, 5);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AnalyticsConfig::from_json_str(
            r#"{ "day_first": false, "projection": { "horizon": 6 } }"#,
        )
        .unwrap();
        assert!(!config.day_first);
        assert_eq!(config.projection.horizon, 6);
        assert_eq!(config.projection.planned_growth, None);
        assert_eq!(config.required_fields.len(), 3);
        assert!(config.synonyms.contains_key(&CanonicalField::TaxCfop));
    }

    #[test]
    fn test_synonym_table_round_trips_with_snake_case_keys() {
        let json = serde_json::to_string(&AnalyticsConfig::default()).unwrap();
        assert!(json.contains("\"tax_cfop\""));
        let parsed = AnalyticsConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed.synonyms, default_synonyms());
    }

    #[test]
    fn test_rejects_zero_horizon() {
        let result = AnalyticsConfig::from_json_str(r#"{ "projection": { "horizon": 0 } }"#);
        assert!(matches!(result, Err(AnalyticsError::InvalidHorizon(0))));
    }

    #[test]
    fn test_decimal_separator_default_is_documented() {
        let config = AnalyticsConfig::default();
        assert!(config.day_first);
        assert_eq!(config.decimal_separator, DecimalSeparator::Dot);

        let schema = AnalyticsConfig::schema_as_json().unwrap();
        assert!(schema.contains("independent of day_first"));
    }

    #[test]
    fn test_rejects_oversized_horizon() {
        let result =
            AnalyticsConfig::from_json_str(r#"{ "projection": { "horizon": 4000000000 } }"#);
        assert!(matches!(
            result,
            Err(AnalyticsError::InvalidHorizon(4_000_000_000))
        ));
    }

    #[test]
    fn test_rejects_required_field_without_candidates() {
        let mut config = AnalyticsConfig::default();
        config.synonyms.insert(CanonicalField::Amount, Vec::new());
        assert!(matches!(
            config.validate(),
            Err(AnalyticsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_planned_growth_below_minus_one() {
        let mut config = AnalyticsConfig::default();
        config.projection.planned_growth = Some(-1.5);
        assert!(config.validate().is_err());
    }
}
