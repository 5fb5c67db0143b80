//! `stockcast-forecast`
//!
//! **Responsibility:** per-product demand forecasting.
//!
//! - Providers implement [`ForecastProvider`] and only see a demand history.
//! - The [`ProviderRegistry`] runs them and records failures as outcomes.
//! - The [`BlendEngine`] combines forecasts with inverse-error weights.
//!
//! Nothing here performs IO.

pub mod blend;
pub mod evaluate;
pub mod features;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod result;
pub mod rows;

pub use blend::{Alignment, BlendEngine, BlendOutcome, WeightVector};
pub use evaluate::{
    evaluate, match_rows, ActualRow, EvaluationReport, EvaluationRow, MatchResult, MatchedRow,
};
pub use provider::ForecastProvider;
pub use providers::{ArimaProvider, GradientBoostedProvider, SequenceProvider};
pub use registry::ProviderRegistry;
pub use result::{ForecastSet, ProviderError, ProviderForecast, ProviderOutcome};
pub use rows::{forecast_rows, BlendedForecastRow};
