/// garch/forecast.rs — h-step-ahead conditional variance forecasts
///
/// sGARCH/gjrGARCH admit a closed form because 𝔼[𝟙[ε<0]] = ½ under a
/// symmetric innovation law:
///
///   h[T+1] from the recursion directly;
///   h[T+k] = ω + (α + β + ½γ·𝔼[𝟙]) · h[T+k−1]   for k ≥ 2
///
/// eGARCH and TGARCH have no such closed form here (log-variance
/// nonlinearity, and an asymmetric threshold indicator with no clean
/// expectation under a skewed law) and are forecast by Monte Carlo
/// averaging of the recursion, ≥5,000 replicates by default.
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

use crate::cancel::{CancellationToken, Deadline};
use crate::error::CoreResult;

use super::params::Params;
use super::spec::VarianceFamily;

pub const DEFAULT_MC_REPLICATES: usize = 5000;

/// Closed-form h-step forecast for sGARCH/gjrGARCH. `h_t` is the last
/// in-sample conditional variance, `eps_t` the last in-sample residual.
pub fn forecast_closed_form(params: &Params, h_t: f64, eps_t: f64, horizon: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(horizon);
    if horizon == 0 {
        return out;
    }

    match params {
        Params::SGarch { omega, alpha, beta, .. } => {
            let mut h_next = omega + alpha * eps_t.powi(2) + beta * h_t;
            out.push(h_next);
            let persistence = alpha + beta;
            for _ in 1..horizon {
                h_next = omega + persistence * h_next;
                out.push(h_next);
            }
        }
        Params::GjrGarch { omega, alpha, gamma, beta, .. } => {
            let indicator = if eps_t < 0.0 { 1.0 } else { 0.0 };
            let mut h_next = omega + alpha * eps_t.powi(2) + gamma * indicator * eps_t.powi(2) + beta * h_t;
            out.push(h_next);
            let persistence = alpha + beta + 0.5 * gamma;
            for _ in 1..horizon {
                h_next = omega + persistence * h_next;
                out.push(h_next);
            }
        }
        _ => panic!("forecast_closed_form called on a family without a closed form"),
    }
    out
}

/// Monte Carlo h-step forecast for eGARCH/TGARCH: simulate `replicates`
/// independent innovation paths forward from (h_t, eps_t) under a standard
/// normal innovation law, and average the resulting variance path
/// pointwise. Uses its own seeded RNG stream, independent of the NF
/// sampling and GARCH-fit optimizer streams. The cancellation token and
/// deadline are checked once per replicate, a long-running sweep's only
/// cooperation point.
pub fn forecast_monte_carlo(
    variance_family: VarianceFamily,
    params: &Params,
    h_t: f64,
    eps_t: f64,
    horizon: usize,
    replicates: usize,
    seed: u64,
    token: &CancellationToken,
    deadline: Option<&Deadline>,
) -> CoreResult<Vec<f64>> {
    let mut sums = vec![0.0; horizon];
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);

    for _ in 0..replicates.max(1) {
        crate::cancel::check(token, deadline)?;
        let mut h_prev = h_t;
        let mut eps_prev = eps_t;
        for k in 0..horizon {
            let h_k = step_variance(variance_family, params, h_prev, eps_prev);
            sums[k] += h_k;
            let z: f64 = StandardNormal.sample(&mut rng);
            eps_prev = z * h_k.sqrt();
            h_prev = h_k;
        }
    }

    Ok(sums.iter().map(|s| s / replicates.max(1) as f64).collect())
}

fn step_variance(variance_family: VarianceFamily, params: &Params, h_prev: f64, eps_prev: f64) -> f64 {
    match (variance_family, params) {
        (VarianceFamily::EGarch, Params::EGarch { omega, alpha, gamma, beta, .. }) => {
            let z_prev = eps_prev / h_prev.sqrt();
            let ln_h = omega + alpha * z_prev.abs() + gamma * z_prev + beta * h_prev.ln();
            ln_h.exp()
        }
        (VarianceFamily::TGarch, Params::TGarch { omega, alpha, eta, beta, tau, .. }) => {
            let indicator = if eps_prev > *tau { 1.0 } else { 0.0 };
            omega + alpha * eps_prev.powi(2) + eta * indicator * eps_prev.powi(2) + beta * h_prev
        }
        _ => panic!("step_variance family/params mismatch"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_form_forecast_converges_to_unconditional_variance() {
        let params = Params::SGarch { mu: 0.0, omega: 1e-6, alpha: 0.05, beta: 0.9 };
        let path = forecast_closed_form(&params, 2e-6, 0.001, 500);
        let unconditional = 1e-6 / (1.0 - 0.05 - 0.9);
        assert!((path[499] - unconditional).abs() < unconditional * 0.05);
    }

    #[test]
    fn mc_forecast_is_positive_and_finite() {
        let params = Params::TGarch { mu: 0.0, omega: 1e-6, alpha: 0.05, eta: 0.1, beta: 0.85, tau: 0.0 };
        let token = CancellationToken::new();
        let path = forecast_monte_carlo(VarianceFamily::TGarch, &params, 2e-6, 0.001, 10, 200, 99, &token, None).unwrap();
        assert!(path.iter().all(|&h| h.is_finite() && h > 0.0));
    }

    #[test]
    fn mc_forecast_honors_cancellation() {
        let params = Params::TGarch { mu: 0.0, omega: 1e-6, alpha: 0.05, eta: 0.1, beta: 0.85, tau: 0.0 };
        let token = CancellationToken::new();
        token.cancel();
        let err = forecast_monte_carlo(VarianceFamily::TGarch, &params, 2e-6, 0.001, 10, 200, 99, &token, None).unwrap_err();
        assert_eq!(err, crate::error::CoreError::Cancelled);
    }
}
