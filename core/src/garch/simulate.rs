/// garch/simulate.rs — single-draw return-path simulation
///
/// Given the last observed (h_T, ε_T, r_T) and a provided innovation
/// sequence z̃[1..H] (sourced either from the GARCH engine's own innovation
/// law or, for NF-GARCH, from a trained normalizing flow), iterate the
/// family recursion forward using ε̃[k−1] = z̃[k−1]·√h̃[k−1], and set
/// r̃[k] = μ + z̃[k]·√h̃[k].
use super::params::Params;
use super::spec::VarianceFamily;

#[derive(Debug, Clone)]
pub struct SimPath {
    pub h: Vec<f64>,
    pub r: Vec<f64>,
}

/// `z` must have length equal to the requested horizon (I5).
pub fn simulate_path(variance_family: VarianceFamily, params: &Params, h_t: f64, eps_t: f64, z: &[f64]) -> SimPath {
    let horizon = z.len();
    let mu = params.mu();
    let mut h = Vec::with_capacity(horizon);
    let mut r = Vec::with_capacity(horizon);

    let mut h_prev = h_t;
    let mut eps_prev = eps_t;

    for &z_k in z {
        let h_k = step(variance_family, params, h_prev, eps_prev);
        let r_k = mu + z_k * h_k.sqrt();
        h.push(h_k);
        r.push(r_k);
        eps_prev = z_k * h_k.sqrt();
        h_prev = h_k;
    }

    SimPath { h, r }
}

fn step(variance_family: VarianceFamily, params: &Params, h_prev: f64, eps_prev: f64) -> f64 {
    match (variance_family, params) {
        (VarianceFamily::SGarch, Params::SGarch { omega, alpha, beta, .. }) => {
            omega + alpha * eps_prev.powi(2) + beta * h_prev
        }
        (VarianceFamily::GjrGarch, Params::GjrGarch { omega, alpha, gamma, beta, .. }) => {
            let indicator = if eps_prev < 0.0 { 1.0 } else { 0.0 };
            omega + alpha * eps_prev.powi(2) + gamma * indicator * eps_prev.powi(2) + beta * h_prev
        }
        (VarianceFamily::TGarch, Params::TGarch { omega, alpha, eta, beta, tau, .. }) => {
            let indicator = if eps_prev > *tau { 1.0 } else { 0.0 };
            omega + alpha * eps_prev.powi(2) + eta * indicator * eps_prev.powi(2) + beta * h_prev
        }
        (VarianceFamily::EGarch, Params::EGarch { omega, alpha, gamma, beta, .. }) => {
            let z_prev = eps_prev / h_prev.sqrt();
            (omega + alpha * z_prev.abs() + gamma * z_prev + beta * h_prev.ln()).exp()
        }
        _ => panic!("simulate::step family/params mismatch"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_path_length_matches_horizon() {
        let params = Params::SGarch { mu: 0.0, omega: 1e-6, alpha: 0.05, beta: 0.9 };
        let z = vec![0.1, -0.2, 0.3, 0.0, -0.1];
        let path = simulate_path(VarianceFamily::SGarch, &params, 2e-6, 0.0005, &z);
        assert_eq!(path.h.len(), 5);
        assert_eq!(path.r.len(), 5);
    }

    #[test]
    fn simulated_variance_stays_positive() {
        let params = Params::GjrGarch { mu: 0.0, omega: 1e-6, alpha: 0.05, gamma: 0.3, beta: 0.85 };
        let z: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { -1.5 } else { 1.5 }).collect();
        let path = simulate_path(VarianceFamily::GjrGarch, &params, 2e-6, 0.001, &z);
        assert!(path.h.iter().all(|&h| h > 0.0 && h.is_finite()));
    }
}
