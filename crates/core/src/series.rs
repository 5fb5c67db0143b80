//! Per-product demand history.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::id::ProductKey;
use crate::stats;

/// One observed day of demand.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandPoint {
    pub date: NaiveDate,
    pub quantity: f64,
}

/// Ordered daily demand for one product.
///
/// Invariants (checked on construction):
/// - at least one observation
/// - dates strictly increasing (no duplicates)
/// - quantities finite and non-negative
#[derive(Debug, Clone, PartialEq)]
pub struct DemandSeries {
    product: ProductKey,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl DemandSeries {
    pub fn new(product: ProductKey, points: Vec<DemandPoint>) -> PlanResult<Self> {
        if points.is_empty() {
            return Err(PlanError::input_contract(&product, "demand history is empty"));
        }

        let mut dates = Vec::with_capacity(points.len());
        let mut values = Vec::with_capacity(points.len());

        for p in &points {
            if !p.quantity.is_finite() {
                return Err(PlanError::input_contract(
                    &product,
                    format!("non-finite demand on {}", p.date),
                ));
            }
            if p.quantity < 0.0 {
                return Err(PlanError::input_contract(
                    &product,
                    format!("negative demand {} on {}", p.quantity, p.date),
                ));
            }
            if let Some(prev) = dates.last() {
                if p.date <= *prev {
                    return Err(PlanError::input_contract(
                        &product,
                        format!("dates not strictly increasing ({prev} then {})", p.date),
                    ));
                }
            }
            dates.push(p.date);
            values.push(p.quantity);
        }

        Ok(Self {
            product,
            dates,
            values,
        })
    }

    pub fn product(&self) -> &ProductKey {
        &self.product
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for a constructed series; kept for slice-like ergonomics.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn last_date(&self) -> NaiveDate {
        // Non-empty by construction.
        self.dates[self.dates.len() - 1]
    }

    /// The most recent `n` values (all of them if `n` exceeds the length).
    pub fn tail(&self, n: usize) -> &[f64] {
        let start = self.values.len().saturating_sub(n);
        &self.values[start..]
    }

    /// Prefix of the first `len` observations; `None` for `len == 0` or past the end.
    pub fn truncated(&self, len: usize) -> Option<DemandSeries> {
        if len == 0 || len > self.values.len() {
            return None;
        }
        Some(Self {
            product: self.product.clone(),
            dates: self.dates[..len].to_vec(),
            values: self.values[..len].to_vec(),
        })
    }

    /// The `horizon` calendar days following the last observation.
    pub fn future_dates(&self, horizon: usize) -> Vec<NaiveDate> {
        let last = self.last_date();
        (1..=horizon as u64)
            .filter_map(|d| last.checked_add_days(Days::new(d)))
            .collect()
    }

    pub fn mean(&self) -> f64 {
        stats::mean(&self.values)
    }

    /// Sample standard deviation of the history (`None` below two points).
    pub fn std(&self) -> Option<f64> {
        stats::stddev_sample(&self.values)
    }
}
