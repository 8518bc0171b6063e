use crate::error::{AnalyticsError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskTier::Low => "low",
            RiskTier::Moderate => "moderate",
            RiskTier::High => "high",
        };
        f.write_str(label)
    }
}

/// Cut points for scoring a concentration ratio. Both bounds are exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RiskThresholds {
    #[schemars(description = "Ratios strictly above this value are at least moderate risk")]
    pub moderate_above: f64,

    #[schemars(description = "Ratios strictly above this value are high risk")]
    pub high_above: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            moderate_above: 0.40,
            high_above: 0.60,
        }
    }
}

impl RiskThresholds {
    pub fn validate(&self) -> Result<()> {
        let ordered = 0.0 <= self.moderate_above
            && self.moderate_above <= self.high_above
            && self.high_above <= 1.0;
        if !ordered {
            return Err(AnalyticsError::InvalidConfig(format!(
                "risk thresholds must satisfy 0 <= moderate_above <= high_above <= 1 (got {} / {})",
                self.moderate_above, self.high_above
            )));
        }
        Ok(())
    }

    pub fn score(&self, ratio: f64) -> RiskTier {
        if ratio > self.high_above {
            RiskTier::High
        } else if ratio > self.moderate_above {
            RiskTier::Moderate
        } else {
            RiskTier::Low
        }
    }
}
