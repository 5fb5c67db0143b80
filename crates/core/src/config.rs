//! Run configuration value object.
//!
//! Passed explicitly to every component; nothing reads ambient globals.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::id::ProviderName;

pub const DEFAULT_HORIZON: usize = 14;
pub const DEFAULT_SERVICE_LEVEL: f64 = 0.95;
pub const DEFAULT_LEAD_DAYS: f64 = 7.0;
pub const DEFAULT_WINDOW: usize = 28;
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Parameters recognized by the blend engine and inventory planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Forecast length in days.
    pub horizon: usize,
    /// Target probability of not stocking out during lead time.
    pub service_level: f64,
    /// Lead time used when a product has none of its own.
    pub default_lead_days: f64,
    /// Trailing periods used for weight estimation (clamped to history length).
    pub window: usize,
    /// Inverse-error smoothing term.
    pub epsilon: f64,
    /// Providers to run, in blending order.
    pub providers: Vec<ProviderName>,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            service_level: DEFAULT_SERVICE_LEVEL,
            default_lead_days: DEFAULT_LEAD_DAYS,
            window: DEFAULT_WINDOW,
            epsilon: DEFAULT_EPSILON,
            providers: ProviderName::standard(),
        }
    }
}

impl PlanningConfig {
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_service_level(mut self, service_level: f64) -> Self {
        self.service_level = service_level;
        self
    }

    pub fn with_default_lead_days(mut self, days: f64) -> Self {
        self.default_lead_days = days;
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_providers(mut self, providers: Vec<ProviderName>) -> Self {
        self.providers = providers;
        self
    }

    /// Weight-estimation window for a product with `history_len` observations.
    pub fn effective_window(&self, history_len: usize) -> usize {
        self.window.min(history_len)
    }

    /// Reject the configuration before any product is processed.
    pub fn validate(&self) -> PlanResult<()> {
        if self.horizon == 0 {
            return Err(PlanError::configuration("horizon must be positive"));
        }
        validate_service_level(self.service_level)?;
        validate_lead_days(self.default_lead_days)?;
        if self.window == 0 {
            return Err(PlanError::configuration("window must be positive"));
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(PlanError::configuration(format!(
                "epsilon must be a finite positive number (got {})",
                self.epsilon
            )));
        }
        if self.providers.is_empty() {
            return Err(PlanError::configuration("at least one provider is required"));
        }
        let mut seen = BTreeSet::new();
        for p in &self.providers {
            if !seen.insert(p) {
                return Err(PlanError::configuration(format!("provider {p} listed twice")));
            }
        }
        Ok(())
    }
}

pub fn validate_service_level(service_level: f64) -> PlanResult<()> {
    if !(service_level.is_finite() && service_level > 0.0 && service_level < 1.0) {
        return Err(PlanError::configuration(format!(
            "service_level must be in (0, 1) (got {service_level})"
        )));
    }
    Ok(())
}

pub fn validate_lead_days(days: f64) -> PlanResult<()> {
    if !(days.is_finite() && days > 0.0) {
        return Err(PlanError::configuration(format!(
            "default lead time must be a finite positive number of days (got {days})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = PlanningConfig::default();
        assert_eq!(cfg.horizon, 14);
        assert_eq!(cfg.service_level, 0.95);
        assert_eq!(cfg.default_lead_days, 7.0);
        assert_eq!(cfg.window, 28);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn window_is_clamped_to_history() {
        let cfg = PlanningConfig::default();
        assert_eq!(cfg.effective_window(10), 10);
        assert_eq!(cfg.effective_window(100), 28);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let base = PlanningConfig::default();
        for bad in [
            base.clone().with_horizon(0),
            base.clone().with_service_level(0.0),
            base.clone().with_service_level(1.0),
            base.clone().with_service_level(f64::NAN),
            base.clone().with_default_lead_days(0.0),
            base.clone().with_default_lead_days(-2.0),
            base.clone().with_window(0),
            base.clone().with_epsilon(0.0),
            base.clone().with_providers(vec![]),
            base.clone()
                .with_providers(vec![ProviderName::ARIMA, ProviderName::ARIMA]),
        ] {
            let err = bad.validate().unwrap_err();
            assert!(err.is_run_fatal(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: PlanningConfig =
            serde_json::from_str(r#"{"horizon": 7, "providers": ["arima", "xgb"]}"#).unwrap();
        assert_eq!(cfg.horizon, 7);
        assert_eq!(cfg.service_level, 0.95);
        assert_eq!(cfg.providers, vec![ProviderName::ARIMA, ProviderName::XGB]);
    }
}
