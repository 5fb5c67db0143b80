use stockcast_core::{DemandSeries, ProviderName};

use crate::result::ProviderError;

/// A forecasting strategy.
///
/// Providers see only a product's demand history and the requested horizon and
/// return one point forecast per future day. They may return negative values;
/// clamping is the blend engine's job.
pub trait ForecastProvider: Send + Sync + 'static {
    /// Name the provider is registered and weighted under.
    fn name(&self) -> ProviderName;

    /// Shortest history the provider can fit.
    fn min_history(&self) -> usize;

    /// Fit on `history` and forecast the next `horizon` days.
    ///
    /// Must be deterministic for identical inputs.
    fn forecast(&self, history: &DemandSeries, horizon: usize) -> Result<Vec<f64>, ProviderError>;
}

pub(crate) fn ensure_history(
    history: &DemandSeries,
    needed: usize,
) -> Result<(), ProviderError> {
    if history.len() < needed {
        return Err(ProviderError::InsufficientHistory {
            needed,
            got: history.len(),
        });
    }
    Ok(())
}
