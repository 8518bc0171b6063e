//! Compounding revenue projection under four growth scenarios.
//!
//! Growth rates come from consecutive observed months. The conservative and
//! optimistic scenarios sit [`VOLATILITY_FACTOR`] sample standard deviations
//! below and above the mean rate.

use crate::aggregation::AggregateSeries;
use crate::error::{AnalyticsError, Result};
use crate::utils::{months_between, MonthPeriod};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const VOLATILITY_FACTOR: f64 = 0.75;

/// Longest accepted projection, in months.
pub const MAX_HORIZON: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Conservative,
    Base,
    Optimistic,
    Planned,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Conservative,
        Scenario::Base,
        Scenario::Optimistic,
        Scenario::Planned,
    ];
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Scenario::Conservative => "conservative",
            Scenario::Base => "base",
            Scenario::Optimistic => "optimistic",
            Scenario::Planned => "planned",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthStatistics {
    pub rates: Vec<f64>,
    pub mean_growth: f64,
    pub volatility: f64,
    /// Steps dropped because the prior month was zero.
    pub skipped_steps: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRates {
    pub conservative: f64,
    pub base: f64,
    pub optimistic: f64,
    pub planned: f64,
}

impl ScenarioRates {
    pub fn from_statistics(stats: &GrowthStatistics, planned: Option<f64>) -> Self {
        let spread = VOLATILITY_FACTOR * stats.volatility;
        Self {
            conservative: stats.mean_growth - spread,
            base: stats.mean_growth,
            optimistic: stats.mean_growth + spread,
            planned: planned.unwrap_or(stats.mean_growth),
        }
    }

    pub fn rate(&self, scenario: Scenario) -> f64 {
        match scenario {
            Scenario::Conservative => self.conservative,
            Scenario::Base => self.base,
            Scenario::Optimistic => self.optimistic,
            Scenario::Planned => self.planned,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub period: MonthPeriod,
    pub conservative: f64,
    pub base: f64,
    pub optimistic: f64,
    pub planned: f64,
}

impl ProjectedPoint {
    pub fn value(&self, scenario: Scenario) -> f64 {
        match scenario {
            Scenario::Conservative => self.conservative,
            Scenario::Base => self.base,
            Scenario::Optimistic => self.optimistic,
            Scenario::Planned => self.planned,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub anchor_period: MonthPeriod,
    pub anchor_value: f64,
    /// Months inside the observed span that had no data. Growth steps still
    /// run between consecutive observed months.
    pub missing_months: usize,
    pub statistics: GrowthStatistics,
    pub rates: ScenarioRates,
    pub points: Vec<ProjectedPoint>,
}

impl Projection {
    pub fn horizon(&self) -> usize {
        self.points.len()
    }

    pub fn scenario_values(&self, scenario: Scenario) -> Vec<f64> {
        self.points.iter().map(|p| p.value(scenario)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProjectionOutcome {
    Projected(Projection),
    InsufficientData {
        observed_points: usize,
        usable_rates: usize,
    },
}

impl ProjectionOutcome {
    pub fn projection(&self) -> Option<&Projection> {
        match self {
            ProjectionOutcome::Projected(p) => Some(p),
            ProjectionOutcome::InsufficientData { .. } => None,
        }
    }

    pub fn is_projected(&self) -> bool {
        self.projection().is_some()
    }
}

/// Month-over-month growth statistics of chronologically ordered values.
pub fn growth_statistics(values: &[f64]) -> GrowthStatistics {
    let mut rates = Vec::new();
    let mut skipped_steps = 0;
    for pair in values.windows(2) {
        let (prior, current) = (pair[0], pair[1]);
        if prior == 0.0 {
            skipped_steps += 1;
            continue;
        }
        rates.push((current - prior) / prior);
    }

    let mean_growth = if rates.is_empty() {
        0.0
    } else {
        rates.iter().sum::<f64>() / rates.len() as f64
    };

    let volatility = if rates.len() < 2 {
        0.0
    } else {
        let variance = rates
            .iter()
            .map(|r| (r - mean_growth).powi(2))
            .sum::<f64>()
            / (rates.len() - 1) as f64;
        variance.sqrt()
    };

    GrowthStatistics {
        rates,
        mean_growth,
        volatility,
        skipped_steps,
    }
}

/// Projects a monthly series `horizon` months past its last observed month.
pub fn project(
    series: &AggregateSeries,
    horizon: u32,
    planned_growth: Option<f64>,
) -> Result<ProjectionOutcome> {
    if horizon == 0 || horizon > MAX_HORIZON {
        return Err(AnalyticsError::InvalidHorizon(horizon));
    }
    if let Some(rate) = planned_growth {
        if !rate.is_finite() {
            return Err(AnalyticsError::InvalidConfig(format!(
                "planned growth rate {} is not finite",
                rate
            )));
        }
    }

    let points = series.month_points()?;
    let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
    let stats = growth_statistics(&values);

    let Some(&(anchor_period, anchor_value)) = points.last() else {
        return Ok(insufficient(points.len(), &stats));
    };
    if points.len() < 2 || stats.rates.is_empty() {
        return Ok(insufficient(points.len(), &stats));
    }

    let span = months_between(points[0].0, anchor_period) as usize + 1;
    let missing_months = span.saturating_sub(points.len());
    if missing_months > 0 {
        debug!(
            "Monthly series has {} empty months between {} and {}",
            missing_months, points[0].0, anchor_period
        );
    }

    let rates = ScenarioRates::from_statistics(&stats, planned_growth);
    debug!(
        "Projection rates: conservative {:.4}, base {:.4}, optimistic {:.4}, planned {:.4}",
        rates.conservative, rates.base, rates.optimistic, rates.planned
    );

    let mut current = [anchor_value; 4];
    let projected = anchor_period
        .following(horizon as usize)
        .into_iter()
        .map(|period| {
            for (value, scenario) in current.iter_mut().zip(Scenario::ALL) {
                *value *= 1.0 + rates.rate(scenario);
            }
            ProjectedPoint {
                period,
                conservative: current[0],
                base: current[1],
                optimistic: current[2],
                planned: current[3],
            }
        })
        .collect();

    info!(
        "Projected {} months from {} ({} observed months)",
        horizon,
        anchor_period,
        points.len()
    );

    Ok(ProjectionOutcome::Projected(Projection {
        anchor_period,
        anchor_value,
        missing_months,
        statistics: stats,
        rates,
        points: projected,
    }))
}

fn insufficient(observed_points: usize, stats: &GrowthStatistics) -> ProjectionOutcome {
    info!(
        "Projection skipped: {} observed months, {} usable growth rates",
        observed_points,
        stats.rates.len()
    );
    ProjectionOutcome::InsufficientData {
        observed_points,
        usable_rates: stats.rates.len(),
    }
}
