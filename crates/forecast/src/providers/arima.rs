//! Classical autoregressive provider: AR(p) on the d-times differenced series.

use stockcast_core::{stats, DemandSeries, ProviderName};

use crate::provider::{ensure_history, ForecastProvider};
use crate::result::ProviderError;

/// `ARIMA(p, d, 0)` fitted by ridge-stabilised least squares.
///
/// The ridge term only touches the AR coefficients, so a flat series
/// collapses to an intercept-only model instead of a singular system.
#[derive(Debug, Clone, PartialEq)]
pub struct ArimaProvider {
    p: usize,
    d: usize,
    ridge: f64,
}

impl Default for ArimaProvider {
    fn default() -> Self {
        Self {
            p: 3,
            d: 0,
            ridge: 1e-6,
        }
    }
}

impl ArimaProvider {
    pub fn new(p: usize, d: usize) -> Self {
        Self {
            p,
            d,
            ..Default::default()
        }
    }

    pub fn with_ridge(mut self, ridge: f64) -> Self {
        self.ridge = ridge;
        self
    }

    /// Intercept followed by the AR coefficients (lag 1 first).
    fn fit(&self, z: &[f64]) -> Vec<f64> {
        let k = self.p + 1;
        let mut a = vec![vec![0.0; k]; k];
        let mut b = vec![0.0; k];
        let mut x = vec![0.0; k];

        for t in self.p..z.len() {
            x[0] = 1.0;
            for lag in 1..=self.p {
                x[lag] = z[t - lag];
            }
            for i in 0..k {
                b[i] += x[i] * z[t];
                for j in 0..k {
                    a[i][j] += x[i] * x[j];
                }
            }
        }
        for (i, row) in a.iter_mut().enumerate().skip(1) {
            row[i] += self.ridge * row[i].max(1.0);
        }

        solve(a, b).unwrap_or_else(|| {
            let mut beta = vec![0.0; k];
            beta[0] = stats::mean(z);
            beta
        })
    }
}

impl ForecastProvider for ArimaProvider {
    fn name(&self) -> ProviderName {
        ProviderName::ARIMA
    }

    fn min_history(&self) -> usize {
        self.p + self.d + 3
    }

    fn forecast(&self, history: &DemandSeries, horizon: usize) -> Result<Vec<f64>, ProviderError> {
        ensure_history(history, self.min_history())?;

        // Difference d times, remembering each stage's last level.
        let mut z = history.values().to_vec();
        let mut lasts = Vec::with_capacity(self.d);
        for _ in 0..self.d {
            lasts.push(z[z.len() - 1]);
            z = z.windows(2).map(|w| w[1] - w[0]).collect();
        }

        let beta = self.fit(&z);

        let mut path = z;
        let start = path.len();
        for _ in 0..horizon {
            let n = path.len();
            let mut next = beta[0];
            for lag in 1..=self.p {
                next += beta[lag] * path[n - lag];
            }
            path.push(next);
        }
        let mut out = path.split_off(start);

        // Undo the differencing, innermost stage first.
        for last in lasts.into_iter().rev() {
            let mut level = last;
            for v in out.iter_mut() {
                level += *v;
                *v = level;
            }
        }

        if !stats::all_finite(&out) {
            return Err(ProviderError::FitFailed(
                "autoregressive recursion diverged".to_string(),
            ));
        }
        Ok(out)
    }
}

/// Gaussian elimination with partial pivoting; `None` if singular.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    let scale = a
        .iter()
        .flat_map(|r| r.iter())
        .fold(0.0f64, |m, v| m.max(v.abs()))
        .max(1.0);

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() <= 1e-12 * scale {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for k in row + 1..n {
            acc -= a[row][k] * x[k];
        }
        x[row] = acc / a[row][row];
    }
    stats::all_finite(&x).then_some(x)
}
