//! Adaptive inverse-error blending of provider forecasts.
//!
//! Each provider is scored by its mean absolute error over the trailing
//! window of actual demand, the errors are turned into `1 / (error + ε)`
//! scores, and the normalized scores weight every horizon step alike.
//!
//! Every provider is scored on the same last `k` actuals, with one alignment
//! for the whole call:
//! - when every usable provider has a retrospective trajectory (walk-forward
//!   backtest), the last `k` values of each are compared with the last `k`
//!   actuals;
//! - otherwise the first `k` values of each forward forecast are compared
//!   with the last `k` actuals.
//!
//! `k = min(window, len(actuals))`, further capped by the shortest
//! trajectory in play.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use stockcast_core::config::DEFAULT_EPSILON;
use stockcast_core::{
    stats, IssueKind, PlanError, PlanResult, PlanningConfig, ProductIssue, ProductKey, ProviderName,
};

use crate::result::{ForecastSet, ProviderForecast, ProviderOutcome};

/// Errors closer than this count as equal (uniform fallback).
const EQUAL_ERROR_TOLERANCE: f64 = 1e-12;

/// Non-negative per-provider weights summing to 1.
///
/// Providers that failed are present with weight 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector(BTreeMap<ProviderName, f64>);

impl WeightVector {
    /// Weight of `name` (0 for unknown providers).
    pub fn get(&self, name: &ProviderName) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProviderName, f64)> {
        self.0.iter().map(|(n, w)| (n, *w))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }
}

/// Result of one blend call.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendOutcome {
    /// Blended forecast, one value per horizon day, clamped to >= 0.
    pub blended: Vec<f64>,
    pub weights: WeightVector,
    /// Error statistic of every provider that could be scored.
    pub errors: BTreeMap<ProviderName, f64>,
    /// Window actually used after clamping to the available actuals.
    pub window: usize,
    /// Trailing periods every provider was scored on.
    pub scored_periods: usize,
    pub alignment: Alignment,
    /// Degenerate-input warnings (uniform fallback, provider failures).
    pub warnings: Vec<ProductIssue>,
}

/// How provider trajectories were lined up against the trailing actuals.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Walk-forward backtest trajectories, ending at the latest actual.
    Retrospective,
    /// Leading forward forecast values against the latest actuals.
    Forward,
}

/// Inverse-error forecast combiner.
///
/// Stateless apart from `ε`; identical inputs give bitwise-identical output.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BlendEngine {
    epsilon: f64,
}

impl Default for BlendEngine {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON)
    }
}

impl BlendEngine {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    pub fn from_config(config: &PlanningConfig) -> Self {
        Self::new(config.epsilon)
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Blend `forecasts` using errors measured against `recent_actuals`
    /// (chronological, most recent last) over the trailing `window`.
    ///
    /// Fails with an input contract violation when a provider returned the
    /// wrong number of values or non-finite values (forward or backtest),
    /// or when no provider produced a forecast at all.
    pub fn blend(
        &self,
        product: &ProductKey,
        forecasts: &ForecastSet,
        recent_actuals: &[f64],
        window: usize,
    ) -> PlanResult<BlendOutcome> {
        let horizon = forecasts.horizon();
        let mut usable: Vec<(&ProviderName, &ProviderForecast)> = Vec::new();
        let mut warnings = Vec::new();

        for (name, outcome) in forecasts.iter() {
            match outcome {
                ProviderOutcome::Forecast(f) => {
                    check_forecast(product, name, f, horizon, forecasts.holdout())?;
                    if let Some(reason) = &f.backtest_failure {
                        warnings.push(ProductIssue::warning(
                            IssueKind::ProviderFailure,
                            Some(product),
                            format!("provider {name} could not be backtested: {reason}"),
                        ));
                    }
                    usable.push((name, f));
                }
                ProviderOutcome::Failed { reason } => {
                    warnings.push(ProductIssue::warning(
                        IssueKind::ProviderFailure,
                        Some(product),
                        format!("provider {name} failed: {reason}"),
                    ));
                }
            }
        }

        if usable.is_empty() {
            return Err(PlanError::input_contract(
                product,
                "no provider produced a forecast",
            ));
        }

        if !stats::all_finite(recent_actuals) {
            return Err(PlanError::input_contract(
                product,
                "recent actuals contain non-finite values",
            ));
        }

        let window = window.min(recent_actuals.len());

        let (alignment, k) = common_alignment(&usable, horizon, window);

        let mut errors = BTreeMap::new();
        if k > 0 {
            for (name, f) in &usable {
                if let Some(e) = provider_error(f, recent_actuals, k, alignment) {
                    errors.insert((*name).clone(), e);
                }
            }
        }

        let scored = errors.len() == usable.len();
        let equal = scored && all_equal(errors.values().copied());

        let mut weights = BTreeMap::new();
        for (name, _) in forecasts.failures() {
            weights.insert(name.clone(), 0.0);
        }

        if scored && !equal {
            let scores: Vec<(&ProviderName, f64)> = usable
                .iter()
                .map(|(name, _)| {
                    let e = errors.get(*name).copied().unwrap_or(0.0);
                    (*name, 1.0 / (e + self.epsilon))
                })
                .collect();
            let total: f64 = scores.iter().map(|(_, s)| s).sum();
            for (name, s) in scores {
                weights.insert(name.clone(), s / total);
            }
        } else {
            let uniform = 1.0 / usable.len() as f64;
            for (name, _) in &usable {
                weights.insert((*name).clone(), uniform);
            }
            if usable.len() > 1 {
                let message = if scored {
                    "all providers have equal error; using uniform weights".to_string()
                } else {
                    format!(
                        "no trailing actuals to score providers against (window={window}); using uniform weights"
                    )
                };
                warnings.push(ProductIssue::warning(
                    IssueKind::EqualProviderErrors,
                    Some(product),
                    message,
                ));
            }
        }

        let weights = WeightVector(weights);

        let blended: Vec<f64> = (0..horizon)
            .map(|h| {
                let v: f64 = usable
                    .iter()
                    .map(|(name, f)| weights.get(name) * f.values[h])
                    .sum();
                v.max(0.0)
            })
            .collect();

        debug!(
            product = %product,
            window,
            scored_periods = k,
            alignment = ?alignment,
            weights = ?weights,
            errors = ?errors,
            "blended provider forecasts"
        );

        Ok(BlendOutcome {
            blended,
            weights,
            errors,
            window,
            scored_periods: k,
            alignment,
            warnings,
        })
    }
}

fn check_forecast(
    product: &ProductKey,
    name: &ProviderName,
    f: &ProviderForecast,
    horizon: usize,
    holdout: Option<usize>,
) -> PlanResult<()> {
    if f.values.len() != horizon {
        return Err(PlanError::input_contract(
            product,
            format!(
                "provider {name} returned {} values, expected {horizon}",
                f.values.len()
            ),
        ));
    }
    if !stats::all_finite(&f.values) {
        return Err(PlanError::input_contract(
            product,
            format!("provider {name} returned non-finite forecast values"),
        ));
    }
    if let Some(retro) = &f.retrospective {
        if let Some(expected) = holdout.filter(|h| *h != retro.len()) {
            return Err(PlanError::input_contract(
                product,
                format!(
                    "provider {name} returned {} backtest values, expected {expected}",
                    retro.len()
                ),
            ));
        }
        if !stats::all_finite(retro) {
            return Err(PlanError::input_contract(
                product,
                format!("provider {name} returned non-finite retrospective values"),
            ));
        }
    }
    Ok(())
}

/// Alignment shared by all usable providers and the number of trailing
/// periods they are scored on.
///
/// `window` is already clamped to the available actuals.
fn common_alignment(
    usable: &[(&ProviderName, &ProviderForecast)],
    horizon: usize,
    window: usize,
) -> (Alignment, usize) {
    let shortest_retro = usable
        .iter()
        .map(|(_, f)| f.retrospective.as_ref().map(Vec::len))
        .try_fold(usize::MAX, |acc, len| len.map(|l| acc.min(l)));

    match shortest_retro {
        Some(len) if len > 0 => (Alignment::Retrospective, window.min(len)),
        _ => (Alignment::Forward, window.min(horizon)),
    }
}

/// MAE of a provider's trajectory against the last `k` actuals.
fn provider_error(
    f: &ProviderForecast,
    actuals: &[f64],
    k: usize,
    alignment: Alignment,
) -> Option<f64> {
    let recent = &actuals[actuals.len() - k..];
    match alignment {
        Alignment::Retrospective => {
            let retro = f.retrospective.as_ref()?;
            stats::mean_absolute_error(recent, &retro[retro.len() - k..])
        }
        Alignment::Forward => stats::mean_absolute_error(recent, &f.values[..k]),
    }
}

fn all_equal(mut errors: impl Iterator<Item = f64>) -> bool {
    let Some(first) = errors.next() else {
        return true;
    };
    let (mut lo, mut hi) = (first, first);
    for e in errors {
        lo = lo.min(e);
        hi = hi.max(e);
    }
    hi - lo <= EQUAL_ERROR_TOLERANCE * hi.abs().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key() -> ProductKey {
        "P1".parse().unwrap()
    }

    fn assert_normalized(w: &WeightVector) {
        assert!((w.total() - 1.0).abs() < 1e-6, "weights sum to {}", w.total());
        for (_, v) in w.iter() {
            assert!(v >= 0.0);
        }
    }

    #[test]
    fn constant_demand_with_perfect_providers_gets_uniform_weights() {
        let actuals = [10.0; 7];
        let set = ForecastSet::new(3)
            .with_forecast(ProviderName::ARIMA, vec![10.0; 3])
            .with_forecast(ProviderName::LSTM, vec![10.0; 3])
            .with_forecast(ProviderName::XGB, vec![10.0; 3]);

        let out = BlendEngine::default()
            .blend(&key(), &set, &actuals, 28)
            .unwrap();

        for name in ProviderName::standard() {
            assert!((out.weights.get(&name) - 1.0 / 3.0).abs() < 1e-9);
        }
        for v in &out.blended {
            assert!((v - 10.0).abs() < 1e-9);
        }
        assert_eq!(out.window, 7);
        assert!(
            out.warnings
                .iter()
                .any(|w| w.kind == IssueKind::EqualProviderErrors)
        );
    }

    #[test]
    fn largest_error_provider_gets_smallest_weight() {
        let set = ForecastSet::new(2)
            .with_forecast(ProviderName::ARIMA, vec![5.0, 5.0])
            .with_forecast(ProviderName::LSTM, vec![15.0, 15.0])
            .with_forecast(ProviderName::XGB, vec![10.0, 10.0]);

        let out = BlendEngine::default()
            .blend(&key(), &set, &[9.0, 11.0], 2)
            .unwrap();

        let w_arima = out.weights.get(&ProviderName::ARIMA);
        let w_lstm = out.weights.get(&ProviderName::LSTM);
        let w_xgb = out.weights.get(&ProviderName::XGB);

        assert_eq!(out.errors[&ProviderName::ARIMA], 5.0);
        assert_eq!(out.errors[&ProviderName::LSTM], 5.0);
        assert_eq!(out.errors[&ProviderName::XGB], 1.0);
        assert!(w_lstm < w_xgb);
        // 5 and 15 sit symmetrically around the actuals, so MAE ties them.
        assert!(w_lstm <= w_arima + 1e-12);
        assert_normalized(&out.weights);
    }

    #[test]
    fn perfect_provider_dominates_as_epsilon_shrinks() {
        let actuals = [4.0, 6.0, 5.0];
        let set = ForecastSet::new(3)
            .with_backtested(ProviderName::ARIMA, vec![5.0; 3], vec![4.0, 6.0, 5.0])
            .with_backtested(ProviderName::LSTM, vec![5.0; 3], vec![3.0, 7.0, 6.0])
            .with_backtested(ProviderName::XGB, vec![5.0; 3], vec![6.0, 6.0, 6.0]);

        let coarse = BlendEngine::new(1e-3)
            .blend(&key(), &set, &actuals, 3)
            .unwrap();
        let fine = BlendEngine::new(1e-12)
            .blend(&key(), &set, &actuals, 3)
            .unwrap();

        let w_coarse = coarse.weights.get(&ProviderName::ARIMA);
        let w_fine = fine.weights.get(&ProviderName::ARIMA);
        assert!(w_fine > w_coarse);
        assert!(w_fine > 0.999_999);
    }

    #[test]
    fn negative_provider_values_are_clamped() {
        let set = ForecastSet::new(2)
            .with_forecast(ProviderName::ARIMA, vec![-8.0, -8.0])
            .with_forecast(ProviderName::XGB, vec![-2.0, 1.0]);

        let out = BlendEngine::default()
            .blend(&key(), &set, &[0.0, 0.0], 2)
            .unwrap();
        assert!(out.blended.iter().all(|v| *v >= 0.0));
        assert_eq!(out.blended[0], 0.0);
    }

    #[test]
    fn wrong_length_is_an_input_contract_violation() {
        let set = ForecastSet::new(3)
            .with_forecast(ProviderName::ARIMA, vec![1.0, 2.0, 3.0])
            .with_forecast(ProviderName::LSTM, vec![1.0, 2.0]);

        let err = BlendEngine::default()
            .blend(&key(), &set, &[1.0, 2.0], 2)
            .unwrap_err();
        match err {
            PlanError::InputContractViolation { reason, .. } => {
                assert!(reason.contains("lstm returned 2 values, expected 3"));
            }
            other => panic!("expected input contract violation, got {other:?}"),
        }
    }

    #[test]
    fn non_finite_forecast_is_rejected() {
        let set = ForecastSet::new(1).with_forecast(ProviderName::ARIMA, vec![f64::NAN]);
        assert!(BlendEngine::default().blend(&key(), &set, &[1.0], 1).is_err());
    }

    #[test]
    fn failed_provider_gets_zero_weight_and_a_warning() {
        let set = ForecastSet::new(2)
            .with_forecast(ProviderName::ARIMA, vec![4.0, 4.0])
            .with_forecast(ProviderName::LSTM, vec![6.0, 6.0])
            .with_failure(ProviderName::XGB, "insufficient history");

        let out = BlendEngine::default()
            .blend(&key(), &set, &[4.0, 4.0], 2)
            .unwrap();

        assert_eq!(out.weights.len(), 3);
        assert_eq!(out.weights.get(&ProviderName::XGB), 0.0);
        assert_normalized(&out.weights);
        assert!(
            out.warnings
                .iter()
                .any(|w| w.kind == IssueKind::ProviderFailure && w.message.contains("xgb"))
        );
    }

    #[test]
    fn all_failed_providers_skip_the_product() {
        let set = ForecastSet::new(2)
            .with_failure(ProviderName::ARIMA, "boom")
            .with_failure(ProviderName::XGB, "boom");
        let err = BlendEngine::default()
            .blend(&key(), &set, &[1.0, 2.0], 2)
            .unwrap_err();
        assert!(matches!(err, PlanError::InputContractViolation { .. }));
    }

    #[test]
    fn empty_actuals_fall_back_to_uniform() {
        let set = ForecastSet::new(1)
            .with_forecast(ProviderName::ARIMA, vec![2.0])
            .with_forecast(ProviderName::XGB, vec![4.0]);
        let out = BlendEngine::default().blend(&key(), &set, &[], 28).unwrap();
        assert_eq!(out.window, 0);
        assert_eq!(out.weights.get(&ProviderName::ARIMA), 0.5);
        assert!((out.blended[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn retrospective_trajectory_is_preferred_over_forward_forecast() {
        // Forward forecasts say arima is worse, the backtest says it is better.
        let set = ForecastSet::new(2)
            .with_backtested(ProviderName::ARIMA, vec![0.0, 0.0], vec![10.0, 10.0])
            .with_backtested(ProviderName::XGB, vec![10.0, 10.0], vec![0.0, 0.0]);
        let out = BlendEngine::default()
            .blend(&key(), &set, &[10.0, 10.0], 2)
            .unwrap();
        assert!(out.weights.get(&ProviderName::ARIMA) > out.weights.get(&ProviderName::XGB));
    }

    #[test]
    fn providers_are_scored_on_the_same_trailing_periods() {
        // Both predicted 10 for every day they share; arima's longer
        // trajectory must not be held against it.
        let set = ForecastSet::new(1)
            .with_backtested(ProviderName::ARIMA, vec![10.0], vec![10.0; 4])
            .with_backtested(ProviderName::XGB, vec![10.0], vec![10.0]);
        let out = BlendEngine::default()
            .blend(&key(), &set, &[0.0, 0.0, 0.0, 10.0], 4)
            .unwrap();

        assert_eq!(out.alignment, Alignment::Retrospective);
        assert_eq!(out.scored_periods, 1);
        assert_eq!(out.errors[&ProviderName::ARIMA], out.errors[&ProviderName::XGB]);
        assert_eq!(
            out.weights.get(&ProviderName::ARIMA),
            out.weights.get(&ProviderName::XGB)
        );
    }

    #[test]
    fn one_provider_without_backtest_moves_everyone_to_forward_alignment() {
        let set = ForecastSet::new(2)
            .with_backtested(ProviderName::ARIMA, vec![0.0, 0.0], vec![10.0, 10.0])
            .with_forecast(ProviderName::XGB, vec![10.0, 10.0]);
        let out = BlendEngine::default()
            .blend(&key(), &set, &[10.0, 10.0], 2)
            .unwrap();

        assert_eq!(out.alignment, Alignment::Forward);
        assert_eq!(out.errors[&ProviderName::ARIMA], 10.0);
        assert_eq!(out.errors[&ProviderName::XGB], 0.0);
        assert!(out.weights.get(&ProviderName::XGB) > out.weights.get(&ProviderName::ARIMA));
    }

    #[test]
    fn backtest_of_the_wrong_length_is_an_input_contract_violation() {
        let set = ForecastSet::new(2)
            .with_holdout(3)
            .with_backtested(ProviderName::ARIMA, vec![1.0, 1.0], vec![1.0; 3])
            .with_backtested(ProviderName::XGB, vec![1.0, 1.0], vec![1.0; 2]);
        let err = BlendEngine::default()
            .blend(&key(), &set, &[1.0, 1.0, 1.0], 3)
            .unwrap_err();
        match err {
            PlanError::InputContractViolation { reason, .. } => {
                assert!(reason.contains("xgb returned 2 backtest values, expected 3"));
            }
            other => panic!("expected input contract violation, got {other:?}"),
        }
    }

    #[test]
    fn failed_backtest_is_reported_as_a_warning() {
        let mut set =
            ForecastSet::new(1).with_backtested(ProviderName::ARIMA, vec![2.0], vec![2.0]);
        set.insert(
            ProviderName::XGB,
            ProviderOutcome::Forecast(ProviderForecast {
                values: vec![4.0],
                retrospective: None,
                backtest_failure: Some("singular matrix".into()),
            }),
        );
        let out = BlendEngine::default().blend(&key(), &set, &[2.0], 1).unwrap();

        assert_eq!(out.alignment, Alignment::Forward);
        assert!(out.warnings.iter().any(|w| {
            w.kind == IssueKind::ProviderFailure
                && w.message.contains("xgb could not be backtested: singular matrix")
        }));
        assert!(out.weights.get(&ProviderName::XGB) > 0.0);
    }

    #[test]
    fn blending_is_bitwise_idempotent() {
        let set = ForecastSet::new(3)
            .with_forecast(ProviderName::ARIMA, vec![1.1, 2.2, 3.3])
            .with_forecast(ProviderName::LSTM, vec![0.7, 1.9, 2.8])
            .with_forecast(ProviderName::XGB, vec![1.4, 2.1, 3.9]);
        let actuals = [1.0, 2.0, 3.0, 1.5, 2.5];

        let engine = BlendEngine::default();
        let a = engine.blend(&key(), &set, &actuals, 4).unwrap();
        let b = engine.blend(&key(), &set, &actuals, 4).unwrap();

        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a.blended), bits(&b.blended));
        for name in ProviderName::standard() {
            assert_eq!(a.weights.get(&name).to_bits(), b.weights.get(&name).to_bits());
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Weights are non-negative and sum to one; blended output is never negative.
        #[test]
        fn weights_are_normalized_and_output_non_negative(
            horizon in 1usize..10,
            actuals in prop::collection::vec(0.0f64..500.0, 0..40),
            seeds in prop::collection::vec(-200.0f64..500.0, 3),
            window in 1usize..40,
        ) {
            let mut set = ForecastSet::new(horizon);
            for (i, name) in ProviderName::standard().into_iter().enumerate() {
                let values = (0..horizon).map(|h| seeds[i] + h as f64).collect();
                set = set.with_forecast(name, values);
            }

            let out = BlendEngine::default().blend(&key(), &set, &actuals, window).unwrap();

            prop_assert_eq!(out.blended.len(), horizon);
            prop_assert!((out.weights.total() - 1.0).abs() < 1e-6);
            for (_, w) in out.weights.iter() {
                prop_assert!(w >= 0.0);
            }
            for v in &out.blended {
                prop_assert!(*v >= 0.0);
            }
        }

        /// Identical provider sequences blend to that same sequence.
        #[test]
        fn identical_providers_blend_to_themselves(
            values in prop::collection::vec(0.0f64..1_000.0, 1..15),
            actuals in prop::collection::vec(0.0f64..1_000.0, 0..30),
        ) {
            let set = ForecastSet::new(values.len())
                .with_forecast(ProviderName::ARIMA, values.clone())
                .with_forecast(ProviderName::LSTM, values.clone())
                .with_forecast(ProviderName::XGB, values.clone());

            let out = BlendEngine::default().blend(&key(), &set, &actuals, 28).unwrap();
            for (b, v) in out.blended.iter().zip(&values) {
                prop_assert!((b - v).abs() <= 1e-9 * v.abs().max(1.0));
            }
        }
    }
}
