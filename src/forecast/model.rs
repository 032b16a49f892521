use crate::error::{Error, Result};

const DEFAULT_ALPHA: f64 = 0.35;
const DEFAULT_BETA: f64 = 0.05;
const DEFAULT_GAMMA: f64 = 0.15;

// 95% interval
const Z_SCORE: f64 = 1.96;

/// Point forecast plus its uncertainty band.
#[derive(Debug, Clone, Copy)]
pub struct ForecastBand {
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Additive Holt-Winters triple exponential smoothing: level + linear trend
/// + additive seasonal component. One instance per fit; no shared state.
#[derive(Debug, Clone, Copy)]
pub struct HoltWinters {
    alpha: f64,
    beta: f64,
    gamma: f64,
    period: usize,
}

/// Smoothed state after fitting, ready to extrapolate.
#[derive(Debug, Clone)]
pub struct FittedModel {
    level: f64,
    trend: f64,
    seasonals: Vec<f64>,
    sigma: f64,
    n_obs: usize,
}

impl HoltWinters {
    pub fn new(period: usize) -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            gamma: DEFAULT_GAMMA,
            period: period.max(1),
        }
    }

    pub fn fit(&self, values: &[f64]) -> Result<FittedModel> {
        let p = self.period;
        if values.len() < 2 * p {
            return Err(Error::InsufficientHistory(format!(
                "{} points, need at least {} (2x seasonal period)",
                values.len(),
                2 * p
            )));
        }

        // initial state from the first two seasonal cycles
        let first_avg = mean(&values[..p]);
        let second_avg = mean(&values[p..2 * p]);
        let mut level = first_avg;
        let mut trend = (second_avg - first_avg) / p as f64;
        let mut seasonals: Vec<f64> = values[..p].iter().map(|v| v - first_avg).collect();

        let mut sq_err = 0.0;
        let mut err_count = 0usize;
        for (i, &y) in values.iter().enumerate() {
            let seasonal = seasonals[i % p];
            let one_step = level + trend + seasonal;
            if i >= p {
                // skip the warmup cycle when estimating residual spread
                sq_err += (y - one_step) * (y - one_step);
                err_count += 1;
            }

            let previous_level = level;
            level = self.alpha * (y - seasonal) + (1.0 - self.alpha) * (level + trend);
            trend = self.beta * (level - previous_level) + (1.0 - self.beta) * trend;
            seasonals[i % p] = self.gamma * (y - level) + (1.0 - self.gamma) * seasonal;
        }

        // err_count >= p >= 1 because len >= 2p
        let sigma = (sq_err / err_count as f64).sqrt();

        Ok(FittedModel {
            level,
            trend,
            seasonals,
            sigma,
            n_obs: values.len(),
        })
    }
}

impl FittedModel {
    /// Extrapolate `horizon` steps past the fitted data. The band widens
    /// with sqrt(h) of the one-step residual deviation.
    pub fn forecast(&self, horizon: usize) -> Vec<ForecastBand> {
        let p = self.seasonals.len();
        (1..=horizon)
            .map(|h| {
                let seasonal = self.seasonals[(self.n_obs + h - 1) % p];
                let estimate = self.level + h as f64 * self.trend + seasonal;
                let spread = Z_SCORE * self.sigma * (h as f64).sqrt();
                ForecastBand {
                    estimate,
                    lower: estimate - spread,
                    upper: estimate + spread,
                }
            })
            .collect()
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
