//! Windowed neural sequence model: one tanh hidden layer over the last
//! `window` scaled observations, trained by full-batch gradient descent.
//!
//! Registered under `lstm`.

use rand::{rngs::StdRng, Rng, SeedableRng};

use stockcast_core::{DemandSeries, ProviderName};

use crate::provider::{ensure_history, ForecastProvider};
use crate::result::ProviderError;

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceProvider {
    window: usize,
    hidden: usize,
    epochs: usize,
    learning_rate: f64,
    seed: u64,
}

impl Default for SequenceProvider {
    fn default() -> Self {
        Self {
            window: 7,
            hidden: 8,
            epochs: 300,
            learning_rate: 0.05,
            seed: 42,
        }
    }
}

impl SequenceProvider {
    pub fn new(window: usize, hidden: usize) -> Self {
        Self {
            window: window.max(1),
            hidden: hidden.max(1),
            ..Default::default()
        }
    }

    pub fn with_training(mut self, epochs: usize, learning_rate: f64) -> Self {
        self.epochs = epochs;
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn init(&self) -> Network {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let b_in = 1.0 / (self.window as f64).sqrt();
        let b_out = 1.0 / (self.hidden as f64).sqrt();

        Network {
            w1: (0..self.hidden)
                .map(|_| (0..self.window).map(|_| rng.gen_range(-b_in..b_in)).collect())
                .collect(),
            b1: vec![0.0; self.hidden],
            w2: (0..self.hidden).map(|_| rng.gen_range(-b_out..b_out)).collect(),
            b2: 0.0,
        }
    }

    fn train(&self, samples: &[(&[f64], f64)]) -> Network {
        let mut net = self.init();
        let m = samples.len() as f64;
        let mut hidden = vec![0.0; self.hidden];

        for _ in 0..self.epochs {
            let mut g = Network::zeros(self.hidden, self.window);

            for (x, target) in samples {
                let y = net.forward(x, &mut hidden);
                let dy = 2.0 * (y - target) / m;

                g.b2 += dy;
                for j in 0..self.hidden {
                    g.w2[j] += dy * hidden[j];
                    let dz = dy * net.w2[j] * (1.0 - hidden[j] * hidden[j]);
                    g.b1[j] += dz;
                    for (gw, xi) in g.w1[j].iter_mut().zip(x.iter()) {
                        *gw += dz * xi;
                    }
                }
            }

            net.step(&g, self.learning_rate);
        }
        net
    }
}

impl ForecastProvider for SequenceProvider {
    fn name(&self) -> ProviderName {
        ProviderName::LSTM
    }

    fn min_history(&self) -> usize {
        self.window + 3
    }

    fn forecast(&self, history: &DemandSeries, horizon: usize) -> Result<Vec<f64>, ProviderError> {
        ensure_history(history, self.min_history())?;

        let values = history.values();
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = hi - lo;
        let last = values[values.len() - 1];
        if span < 1e-12 {
            return Ok(vec![last; horizon]);
        }

        let scaled: Vec<f64> = values.iter().map(|v| (v - lo) / span).collect();
        let samples: Vec<(&[f64], f64)> = scaled
            .windows(self.window + 1)
            .map(|w| (&w[..self.window], w[self.window]))
            .collect();
        let net = self.train(&samples);

        let mut buf = scaled[scaled.len() - self.window..].to_vec();
        let mut hidden = vec![0.0; self.hidden];
        let mut out = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let next = net.forward(&buf, &mut hidden);
            if !next.is_finite() {
                return Err(ProviderError::FitFailed("network output diverged".to_string()));
            }
            out.push(lo + next * span);
            buf.remove(0);
            buf.push(next);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone)]
struct Network {
    w1: Vec<Vec<f64>>,
    b1: Vec<f64>,
    w2: Vec<f64>,
    b2: f64,
}

impl Network {
    fn zeros(hidden: usize, window: usize) -> Self {
        Self {
            w1: vec![vec![0.0; window]; hidden],
            b1: vec![0.0; hidden],
            w2: vec![0.0; hidden],
            b2: 0.0,
        }
    }

    /// Writes hidden activations into `hidden` and returns the output.
    fn forward(&self, x: &[f64], hidden: &mut [f64]) -> f64 {
        let mut y = self.b2;
        for (j, h) in hidden.iter_mut().enumerate() {
            let z = self.b1[j] + self.w1[j].iter().zip(x).map(|(w, xi)| w * xi).sum::<f64>();
            *h = z.tanh();
            y += self.w2[j] * *h;
        }
        y
    }

    fn step(&mut self, g: &Network, lr: f64) {
        for (row, grow) in self.w1.iter_mut().zip(&g.w1) {
            for (w, gw) in row.iter_mut().zip(grow) {
                *w -= lr * gw;
            }
        }
        for (b, gb) in self.b1.iter_mut().zip(&g.b1) {
            *b -= lr * gb;
        }
        for (w, gw) in self.w2.iter_mut().zip(&g.w2) {
            *w -= lr * gw;
        }
        self.b2 -= lr * g.b2;
    }
}
