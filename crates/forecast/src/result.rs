use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockcast_core::ProviderName;

/// Why a provider could not produce a forecast.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("insufficient history: need at least {needed} observations, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    #[error("invalid provider input: {0}")]
    InvalidInput(String),

    #[error("model fit failed: {0}")]
    FitFailed(String),
}

/// A provider's successful output for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderForecast {
    /// Forward point forecasts, one per horizon day.
    pub values: Vec<f64>,

    /// Walk-forward forecast of the trailing actuals, aligned so that the
    /// last element matches the most recent actual.
    pub retrospective: Option<Vec<f64>>,

    /// Why the walk-forward refit failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backtest_failure: Option<String>,
}

/// Outcome of asking one provider for a forecast.
///
/// Failures stay in the set so they are visible downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProviderOutcome {
    Forecast(ProviderForecast),
    Failed { reason: String },
}

impl ProviderOutcome {
    pub fn forecast(&self) -> Option<&ProviderForecast> {
        match self {
            ProviderOutcome::Forecast(f) => Some(f),
            ProviderOutcome::Failed { .. } => None,
        }
    }
}

impl From<ProviderError> for ProviderOutcome {
    fn from(err: ProviderError) -> Self {
        ProviderOutcome::Failed {
            reason: err.to_string(),
        }
    }
}

/// Per-provider outcomes for one product, over a shared horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSet {
    horizon: usize,
    /// Shared backtest length every retrospective trajectory must have.
    holdout: Option<usize>,
    outcomes: BTreeMap<ProviderName, ProviderOutcome>,
}

impl ForecastSet {
    pub fn new(horizon: usize) -> Self {
        Self {
            horizon,
            holdout: None,
            outcomes: BTreeMap::new(),
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn holdout(&self) -> Option<usize> {
        self.holdout
    }

    /// Require every retrospective trajectory to have `holdout` values.
    pub fn with_holdout(mut self, holdout: usize) -> Self {
        self.holdout = Some(holdout);
        self
    }

    pub fn insert(&mut self, name: ProviderName, outcome: ProviderOutcome) {
        self.outcomes.insert(name, outcome);
    }

    /// Add a forward forecast without a retrospective trajectory.
    pub fn with_forecast(mut self, name: ProviderName, values: Vec<f64>) -> Self {
        self.insert(
            name,
            ProviderOutcome::Forecast(ProviderForecast {
                values,
                retrospective: None,
                backtest_failure: None,
            }),
        );
        self
    }

    /// Add a forward forecast together with its retrospective trajectory.
    pub fn with_backtested(
        mut self,
        name: ProviderName,
        values: Vec<f64>,
        retrospective: Vec<f64>,
    ) -> Self {
        self.insert(
            name,
            ProviderOutcome::Forecast(ProviderForecast {
                values,
                retrospective: Some(retrospective),
                backtest_failure: None,
            }),
        );
        self
    }

    pub fn with_failure(mut self, name: ProviderName, reason: impl Into<String>) -> Self {
        self.insert(
            name,
            ProviderOutcome::Failed {
                reason: reason.into(),
            },
        );
        self
    }

    pub fn get(&self, name: &ProviderName) -> Option<&ProviderOutcome> {
        self.outcomes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProviderName, &ProviderOutcome)> {
        self.outcomes.iter()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ProviderName, &str)> {
        self.outcomes.iter().filter_map(|(name, o)| match o {
            ProviderOutcome::Failed { reason } => Some((name, reason.as_str())),
            ProviderOutcome::Forecast(_) => None,
        })
    }
}
