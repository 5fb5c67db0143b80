use std::sync::Arc;

use stockcast_core::{DemandSeries, PlanError, PlanResult, ProviderName};
use tracing::{debug, warn};

use crate::provider::ForecastProvider;
use crate::providers::{ArimaProvider, GradientBoostedProvider, SequenceProvider};
use crate::result::{ForecastSet, ProviderForecast, ProviderOutcome};

/// Ordered set of forecast providers run for every product.
///
/// Besides the forward forecast, each provider is refit on the history minus
/// its trailing window and asked to forecast that window. The resulting
/// retrospective trajectory is what the blend engine scores against actuals.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ForecastProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `arima`, `lstm` and `xgb` with their default settings.
    pub fn standard() -> Self {
        Self::new()
            .register(ArimaProvider::default())
            .register(SequenceProvider::default())
            .register(GradientBoostedProvider::default())
    }

    /// The standard providers restricted to `names`, in that order.
    pub fn from_names(names: &[ProviderName]) -> PlanResult<Self> {
        let standard = Self::standard();
        let mut out = Self::new();
        for name in names {
            let provider = standard
                .providers
                .iter()
                .find(|p| &p.name() == name)
                .ok_or_else(|| PlanError::configuration(format!("unknown provider: {name}")))?;
            out.providers.push(Arc::clone(provider));
        }
        Ok(out)
    }

    /// Add a provider; one registered under an existing name replaces it.
    pub fn register<P: ForecastProvider>(mut self, provider: P) -> Self {
        let name = provider.name();
        self.providers.retain(|p| p.name() != name);
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn names(&self) -> Vec<ProviderName> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Run every provider for one product.
    ///
    /// Provider errors never propagate: they become `Failed` outcomes. The
    /// providers that produced a forward forecast are then backtested over
    /// one shared holdout, so their retrospective trajectories cover the
    /// same trailing days.
    pub fn forecast(&self, series: &DemandSeries, horizon: usize, window: usize) -> ForecastSet {
        let runs: Vec<_> = self
            .providers
            .iter()
            .map(|p| (p, p.forecast(series, horizon)))
            .collect();

        let min_history = runs
            .iter()
            .filter(|(_, result)| result.is_ok())
            .map(|(p, _)| p.min_history())
            .max()
            .unwrap_or(0);
        let holdout = shared_holdout(series.len(), window, min_history);

        let mut set = ForecastSet::new(horizon);
        if holdout > 0 {
            set = set.with_holdout(holdout);
        }
        for (provider, result) in runs {
            let name = provider.name();
            let outcome = match result {
                Ok(values) => {
                    let (retrospective, backtest_failure) = if holdout > 0 {
                        backtest(provider.as_ref(), series, holdout)
                    } else {
                        (None, None)
                    };
                    ProviderOutcome::Forecast(ProviderForecast {
                        values,
                        retrospective,
                        backtest_failure,
                    })
                }
                Err(err) => {
                    warn!(
                        product = %series.product(),
                        provider = %name,
                        error = %err,
                        "provider failed"
                    );
                    err.into()
                }
            };
            set.insert(name, outcome);
        }
        set
    }
}

/// Trailing days held out for backtesting: the window, shrunk so the
/// training prefix still meets the largest minimum history in play.
fn shared_holdout(len: usize, window: usize, min_history: usize) -> usize {
    window.min(len).min(len.saturating_sub(min_history))
}

/// Single-origin walk-forward forecast of the last `holdout` observations.
///
/// The trajectory is returned as produced; the blend engine rejects one of
/// the wrong length or with non-finite values.
fn backtest(
    provider: &dyn ForecastProvider,
    series: &DemandSeries,
    holdout: usize,
) -> (Option<Vec<f64>>, Option<String>) {
    let Some(train) = series.truncated(series.len() - holdout) else {
        return (None, None);
    };
    match provider.forecast(&train, holdout) {
        Ok(values) => {
            debug!(
                product = %series.product(),
                provider = %provider.name(),
                holdout,
                "backtest complete"
            );
            (Some(values), None)
        }
        Err(err) => {
            warn!(
                product = %series.product(),
                provider = %provider.name(),
                error = %err,
                "backtest failed"
            );
            (None, Some(err.to_string()))
        }
    }
}
