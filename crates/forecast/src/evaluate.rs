//! Forecast accuracy against observed demand.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockcast_core::ProductKey;

use crate::rows::BlendedForecastRow;

/// Label of the pooled row in an evaluation report.
///
/// A product keyed `ALL` keeps its own row, so the label alone does not
/// identify the pooled row: it is always the last one written.
pub const OVERALL_GROUP: &str = "ALL";

/// Observed demand for a product on a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualRow {
    pub date: NaiveDate,
    #[serde(rename = "product_item")]
    pub product: ProductKey,
    #[serde(rename = "actual_demand")]
    pub actual: f64,
}

/// A forecast joined with its actual on (date, product).
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRow {
    pub date: NaiveDate,
    pub product: ProductKey,
    pub actual: f64,
    pub forecast: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    pub rows: Vec<MatchedRow>,
    /// Forecast rows with no actual (excluded, not imputed).
    pub unmatched_forecasts: usize,
    /// Actual rows no forecast refers to.
    pub unmatched_actuals: usize,
}

/// Inner-join forecasts with actuals on (date, product).
///
/// Several actuals for the same key are summed into one daily value.
pub fn match_rows(actuals: &[ActualRow], forecasts: &[BlendedForecastRow]) -> MatchResult {
    let mut observed: BTreeMap<(&ProductKey, NaiveDate), f64> = BTreeMap::new();
    for a in actuals {
        *observed.entry((&a.product, a.date)).or_insert(0.0) += a.actual;
    }

    let mut used = BTreeSet::new();
    let mut result = MatchResult::default();
    for f in forecasts {
        match observed.get(&(&f.product, f.date)) {
            Some(actual) => {
                used.insert((&f.product, f.date));
                result.rows.push(MatchedRow {
                    date: f.date,
                    product: f.product.clone(),
                    actual: *actual,
                    forecast: f.forecast,
                });
            }
            None => result.unmatched_forecasts += 1,
        }
    }
    result.unmatched_actuals = observed.len().saturating_sub(used.len());
    result
}

/// Accuracy metrics for one group (a product or the pooled `ALL` row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub group: String,
    pub count: usize,
    pub mae: f64,
    /// Percent; `None` when every actual in the group is zero.
    pub mape: Option<f64>,
    /// Rows contributing to MAPE (actual != 0).
    pub mape_count: usize,
    pub rmse: f64,
    /// Mean of forecast - actual (positive = over-forecast).
    pub bias: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    /// One row per product, sorted by product key.
    pub groups: Vec<EvaluationRow>,
    /// Metrics over all matched rows pooled together.
    pub overall: EvaluationRow,
}

impl EvaluationReport {
    /// Per-product rows followed by the pooled row.
    pub fn rows(&self) -> Vec<EvaluationRow> {
        let mut out = self.groups.clone();
        out.push(self.overall.clone());
        out
    }
}

/// Score matched rows per product and overall.
pub fn evaluate(rows: &[MatchedRow]) -> EvaluationReport {
    let mut by_product: BTreeMap<&ProductKey, Vec<&MatchedRow>> = BTreeMap::new();
    for r in rows {
        by_product.entry(&r.product).or_default().push(r);
    }

    let groups = by_product
        .into_iter()
        .map(|(product, rs)| score(product.to_string(), &rs))
        .collect();
    let all: Vec<&MatchedRow> = rows.iter().collect();

    EvaluationReport {
        groups,
        overall: score(OVERALL_GROUP.to_string(), &all),
    }
}

fn score(group: String, rows: &[&MatchedRow]) -> EvaluationRow {
    let count = rows.len();
    if count == 0 {
        return EvaluationRow {
            group,
            count,
            mae: 0.0,
            mape: None,
            mape_count: 0,
            rmse: 0.0,
            bias: 0.0,
        };
    }

    let n = count as f64;
    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut bias_sum = 0.0;
    let mut pct_sum = 0.0;
    let mut mape_count = 0usize;

    for r in rows {
        let err = r.forecast - r.actual;
        abs_sum += err.abs();
        sq_sum += err * err;
        bias_sum += err;
        // Zero actuals only drop out of the percentage metric.
        if r.actual != 0.0 {
            pct_sum += (err / r.actual).abs();
            mape_count += 1;
        }
    }

    EvaluationRow {
        group,
        count,
        mae: abs_sum / n,
        mape: (mape_count > 0).then(|| 100.0 * pct_sum / mape_count as f64),
        mape_count,
        rmse: (sq_sum / n).sqrt(),
        bias: bias_sum / n,
    }
}
