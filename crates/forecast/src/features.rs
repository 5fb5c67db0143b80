//! Lag and calendar features for the regression provider.

use chrono::{Datelike, NaiveDate};

use stockcast_core::stats;

/// Lags (in days) used by default.
pub const DEFAULT_LAGS: [usize; 3] = [1, 7, 14];

/// Rolling-mean span used by default.
pub const DEFAULT_ROLLING: usize = 7;

/// Which features to build for a day.
///
/// Layout of a feature row: one column per lag, the trailing rolling mean,
/// then weekday (0 = Monday), day of month and month.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpec {
    lags: Vec<usize>,
    rolling: usize,
}

impl Default for FeatureSpec {
    fn default() -> Self {
        Self::new(DEFAULT_LAGS.to_vec(), DEFAULT_ROLLING)
    }
}

impl FeatureSpec {
    pub fn new(lags: Vec<usize>, rolling: usize) -> Self {
        Self {
            lags,
            rolling: rolling.max(1),
        }
    }

    /// Observations needed before the first feature row exists.
    pub fn warmup(&self) -> usize {
        self.lags
            .iter()
            .copied()
            .max()
            .unwrap_or(0)
            .max(self.rolling)
    }

    pub fn width(&self) -> usize {
        self.lags.len() + 4
    }

    /// Features for the day at `date`, given every value observed before it.
    ///
    /// `None` until `prior` covers the warmup.
    pub fn row(&self, prior: &[f64], date: NaiveDate) -> Option<Vec<f64>> {
        let n = prior.len();
        if n < self.warmup() || n == 0 {
            return None;
        }

        let mut row = Vec::with_capacity(self.width());
        for lag in &self.lags {
            row.push(prior[n - lag]);
        }
        row.push(stats::mean(&prior[n - self.rolling..]));
        row.push(date.weekday().num_days_from_monday() as f64);
        row.push(date.day() as f64);
        row.push(date.month() as f64);
        Some(row)
    }

    /// Training matrix over a history: one row per day past the warmup.
    pub fn matrix(&self, values: &[f64], dates: &[NaiveDate]) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for t in 0..values.len().min(dates.len()) {
            if let Some(row) = self.row(&values[..t], dates[t]) {
                x.push(row);
                y.push(values[t]);
            }
        }
        (x, y)
    }
}
