/// garch/params.rs — Parameter sum type and the θ*⇄params bijection
///
/// Per family, `theta_to_params` / `params_to_theta` form a single documented
/// bijection between an unconstrained optimizer vector θ* and the
/// structurally-constrained parameter record the recursion consumes. The
/// parameter set is modeled as a sum type per family rather than a flat
/// index-addressed vector, to avoid brittle re-indexing bugs.
///
/// θ* layout (index order is fixed per family, documented at each
/// `theta_len`/`theta_to_params` pair):
///
///   sGARCH / gjrGARCH / TGARCH:
///     [mu, omega*, alpha*, (gamma* | eta*)?, beta*, tau*?, nu*?, xi*?]
///   eGARCH:
///     [mu, omega, alpha, gamma, beta*, nu*?, xi*?]
///
/// where a `*` marks a transformed coordinate (see the `transforms` module)
/// and a trailing `?` marks a coordinate present only for some
/// family/innovation combinations.
use super::spec::{InnovationFamily, ModelSpec, TgarchThreshold, VarianceFamily};

pub mod transforms {
    /// σ(x) = 1 / (1 + e^{-x}), maps ℝ → (0, 1).
    pub fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    /// Inverse of `sigmoid`, defined on (0, 1).
    pub fn sigmoid_inv(p: f64) -> f64 {
        let p = p.clamp(1e-12, 1.0 - 1e-12);
        (p / (1.0 - p)).ln()
    }

    /// softplus(x) = ln(1 + e^x), maps ℝ → (0, ∞); numerically stable for
    /// large |x|.
    pub fn softplus(x: f64) -> f64 {
        if x > 30.0 {
            x
        } else {
            (1.0 + x.exp()).ln()
        }
    }

    /// Inverse of `softplus`, defined on (0, ∞).
    pub fn softplus_inv(y: f64) -> f64 {
        let y = y.max(1e-12);
        if y > 30.0 {
            y
        } else {
            (y.exp() - 1.0).max(1e-300).ln()
        }
    }
}

use transforms::{sigmoid, sigmoid_inv, softplus, softplus_inv};

/// The epsilon enforcing α+β < 1 strictly rather than ≤ (I2).
pub const STATIONARITY_EPS: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    SGarch { mu: f64, omega: f64, alpha: f64, beta: f64 },
    GjrGarch { mu: f64, omega: f64, alpha: f64, gamma: f64, beta: f64 },
    EGarch { mu: f64, omega: f64, alpha: f64, gamma: f64, beta: f64 },
    TGarch { mu: f64, omega: f64, alpha: f64, eta: f64, beta: f64, tau: f64 },
}

impl Params {
    pub fn mu(&self) -> f64 {
        match self {
            Params::SGarch { mu, .. }
            | Params::GjrGarch { mu, .. }
            | Params::EGarch { mu, .. }
            | Params::TGarch { mu, .. } => *mu,
        }
    }

    pub fn alpha(&self) -> f64 {
        match self {
            Params::SGarch { alpha, .. }
            | Params::GjrGarch { alpha, .. }
            | Params::EGarch { alpha, .. }
            | Params::TGarch { alpha, .. } => *alpha,
        }
    }

    pub fn beta(&self) -> f64 {
        match self {
            Params::SGarch { beta, .. }
            | Params::GjrGarch { beta, .. }
            | Params::EGarch { beta, .. }
            | Params::TGarch { beta, .. } => *beta,
        }
    }

    /// P2: α+β<1 is required for sGARCH; checked the same way for the
    /// other additive-variance families (eGARCH operates in log-variance
    /// and is excluded).
    pub fn satisfies_stationarity(&self) -> bool {
        match self {
            Params::SGarch { alpha, beta, .. } => *alpha > 0.0 && *beta > 0.0 && alpha + beta < 1.0,
            Params::GjrGarch { alpha, beta, gamma, .. } => {
                *alpha >= 0.0 && *beta >= 0.0 && *gamma >= 0.0 && alpha + beta + 0.5 * gamma < 1.0
            }
            Params::TGarch { alpha, beta, eta, .. } => {
                *alpha >= 0.0 && *beta >= 0.0 && *eta >= 0.0 && alpha + beta + 0.5 * eta < 1.0
            }
            Params::EGarch { beta, .. } => beta.abs() < 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InnovationParams {
    Normal,
    StudentT { nu: f64 },
    SkewStudentT { nu: f64, xi: f64 },
}

impl InnovationParams {
    pub fn nu(&self) -> Option<f64> {
        match self {
            InnovationParams::Normal => None,
            InnovationParams::StudentT { nu } | InnovationParams::SkewStudentT { nu, .. } => Some(*nu),
        }
    }

    pub fn shape_param_count(&self) -> usize {
        match self {
            InnovationParams::Normal => 0,
            InnovationParams::StudentT { .. } => 1,
            InnovationParams::SkewStudentT { .. } => 2,
        }
    }
}

/// Number of free θ* coordinates for a given spec (used for AIC/BIC's `k`
/// via I6, and to size the optimizer's initial vector).
pub fn theta_len(spec: &ModelSpec) -> usize {
    let variance_len = match spec.variance {
        VarianceFamily::SGarch => 4,                      // mu, omega, alpha, beta
        VarianceFamily::GjrGarch | VarianceFamily::EGarch => 5, // + gamma
        VarianceFamily::TGarch => {
            4 + 1 // + eta
                + match spec.tgarch_threshold {
                    TgarchThreshold::Fixed(_) => 0,
                    TgarchThreshold::Estimated => 1,
                }
        }
    };
    let innovation_len = match spec.innovation {
        InnovationFamily::Normal => 0,
        InnovationFamily::StudentT => 1,
        InnovationFamily::SkewStudentT => 2,
    };
    variance_len + innovation_len
}

/// θ* → (Params, InnovationParams). Infallible: every real θ* maps to a
/// constraint-satisfying point by construction (I1, I2).
pub fn theta_to_params(theta: &[f64], spec: &ModelSpec) -> (Params, InnovationParams) {
    let mu = theta[0];

    let (params, mut cursor) = match spec.variance {
        VarianceFamily::SGarch => {
            let omega = theta[1].exp();
            let alpha = sigmoid(theta[2]);
            let beta = (1.0 - STATIONARITY_EPS) * (1.0 - alpha) * sigmoid(theta[3]);
            (Params::SGarch { mu, omega, alpha, beta }, 4)
        }
        VarianceFamily::GjrGarch => {
            let omega = theta[1].exp();
            let alpha = sigmoid(theta[2]);
            let gamma = softplus(theta[4]);
            // Reserve headroom for gamma's asymmetric contribution (I2 as
            // implemented in `Params::satisfies_stationarity`).
            let beta = (1.0 - STATIONARITY_EPS) * (1.0 - alpha - 0.5 * gamma).max(0.0) * sigmoid(theta[3]);
            (Params::GjrGarch { mu, omega, alpha, gamma, beta }, 5)
        }
        VarianceFamily::EGarch => {
            let omega = theta[1];
            let alpha = theta[2];
            let gamma = theta[4];
            let beta = theta[3].tanh();
            (Params::EGarch { mu, omega, alpha, gamma, beta }, 5)
        }
        VarianceFamily::TGarch => {
            let omega = theta[1].exp();
            let alpha = sigmoid(theta[2]);
            let eta = softplus(theta[4]);
            let beta = (1.0 - STATIONARITY_EPS) * (1.0 - alpha - 0.5 * eta).max(0.0) * sigmoid(theta[3]);
            let (tau, used) = match spec.tgarch_threshold {
                TgarchThreshold::Fixed(t) => (t, 5),
                TgarchThreshold::Estimated => (theta[5], 6),
            };
            (Params::TGarch { mu, omega, alpha, eta, beta, tau }, used)
        }
    };

    let innovation = match spec.innovation {
        InnovationFamily::Normal => InnovationParams::Normal,
        InnovationFamily::StudentT => {
            let nu = 2.0 + softplus(theta[cursor]);
            cursor += 1;
            InnovationParams::StudentT { nu }
        }
        InnovationFamily::SkewStudentT => {
            let nu = 2.0 + softplus(theta[cursor]);
            let xi = theta[cursor + 1].exp();
            cursor += 2;
            InnovationParams::SkewStudentT { nu, xi }
        }
    };
    let _ = cursor;

    (params, innovation)
}

/// The inverse map, used to construct the optimizer's starting point from a
/// documented initial guess in natural parameter units.
pub fn params_to_theta(params: &Params, innovation: &InnovationParams, spec: &ModelSpec) -> Vec<f64> {
    let mut theta = vec![0.0; theta_len(spec)];
    theta[0] = params.mu();

    let cursor = match (params, spec.variance) {
        (Params::SGarch { omega, alpha, beta, .. }, VarianceFamily::SGarch) => {
            theta[1] = omega.ln();
            theta[2] = sigmoid_inv(*alpha);
            let denom = (1.0 - STATIONARITY_EPS) * (1.0 - alpha);
            theta[3] = sigmoid_inv((beta / denom.max(1e-12)).clamp(1e-9, 1.0 - 1e-9));
            4
        }
        (Params::GjrGarch { omega, alpha, gamma, beta, .. }, VarianceFamily::GjrGarch) => {
            theta[1] = omega.ln();
            theta[2] = sigmoid_inv(*alpha);
            theta[4] = softplus_inv(*gamma);
            let denom = (1.0 - STATIONARITY_EPS) * (1.0 - alpha - 0.5 * gamma).max(1e-12);
            theta[3] = sigmoid_inv((beta / denom).clamp(1e-9, 1.0 - 1e-9));
            5
        }
        (Params::EGarch { omega, alpha, gamma, beta, .. }, VarianceFamily::EGarch) => {
            theta[1] = *omega;
            theta[2] = *alpha;
            theta[4] = *gamma;
            theta[3] = beta.clamp(-0.999999, 0.999999).atanh();
            5
        }
        (Params::TGarch { omega, alpha, eta, beta, tau, .. }, VarianceFamily::TGarch) => {
            theta[1] = omega.ln();
            theta[2] = sigmoid_inv(*alpha);
            theta[4] = softplus_inv(*eta);
            let denom = (1.0 - STATIONARITY_EPS) * (1.0 - alpha - 0.5 * eta).max(1e-12);
            theta[3] = sigmoid_inv((beta / denom).clamp(1e-9, 1.0 - 1e-9));
            match spec.tgarch_threshold {
                TgarchThreshold::Fixed(_) => 5,
                TgarchThreshold::Estimated => {
                    theta[5] = *tau;
                    6
                }
            }
        }
        _ => unreachable!("Params variant does not match ModelSpec.variance"),
    };

    match innovation {
        InnovationParams::Normal => {}
        InnovationParams::StudentT { nu } => {
            theta[cursor] = softplus_inv(nu - 2.0);
        }
        InnovationParams::SkewStudentT { nu, xi } => {
            theta[cursor] = softplus_inv(nu - 2.0);
            theta[cursor + 1] = xi.ln();
        }
    }

    theta
}

/// Documented optimizer starting point: μ₀ = sample mean;
/// α₀=0.05; β₀=0.9; ω₀ such that exp(θ*₂) = sample_var·(1−α₀−β₀); ν₀=8.
pub fn initial_theta(spec: &ModelSpec, sample_mean: f64, sample_var: f64) -> Vec<f64> {
    let alpha0 = 0.05;
    let beta0 = 0.9;
    let var = sample_var.max(1e-12);

    let params = match spec.variance {
        VarianceFamily::SGarch => Params::SGarch {
            mu: sample_mean,
            omega: var * (1.0 - alpha0 - beta0).max(1e-6),
            alpha: alpha0,
            beta: beta0,
        },
        VarianceFamily::GjrGarch => Params::GjrGarch {
            mu: sample_mean,
            omega: var * (1.0 - alpha0 - beta0).max(1e-6),
            alpha: alpha0,
            gamma: 0.05,
            beta: beta0,
        },
        VarianceFamily::EGarch => Params::EGarch {
            mu: sample_mean,
            omega: var.ln() * (1.0 - beta0),
            alpha: 0.1,
            gamma: -0.05,
            beta: beta0,
        },
        VarianceFamily::TGarch => Params::TGarch {
            mu: sample_mean,
            omega: var * (1.0 - alpha0 - beta0).max(1e-6),
            alpha: alpha0,
            eta: 0.05,
            beta: beta0,
            tau: match spec.tgarch_threshold {
                TgarchThreshold::Fixed(t) => t,
                TgarchThreshold::Estimated => 0.0,
            },
        },
    };

    let innovation = match spec.innovation {
        InnovationFamily::Normal => InnovationParams::Normal,
        InnovationFamily::StudentT => InnovationParams::StudentT { nu: 8.0 },
        InnovationFamily::SkewStudentT => InnovationParams::SkewStudentT { nu: 8.0, xi: 1.0 },
    };

    params_to_theta(&params, &innovation, spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::garch::spec::VarianceFamily::*;

    #[test]
    fn sgarch_round_trip() {
        let spec = ModelSpec::new(SGarch, InnovationFamily::Normal);
        let params = Params::SGarch { mu: 0.0003, omega: 1e-6, alpha: 0.08, beta: 0.9 };
        let theta = params_to_theta(&params, &InnovationParams::Normal, &spec);
        let (back, _) = theta_to_params(&theta, &spec);
        match back {
            Params::SGarch { mu, omega, alpha, beta } => {
                assert!((mu - 0.0003).abs() < 1e-9);
                assert!((omega - 1e-6).abs() < 1e-12);
                assert!((alpha - 0.08).abs() < 1e-9);
                assert!((beta - 0.9).abs() < 1e-6);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn sgarch_theta_always_satisfies_stationarity() {
        let spec = ModelSpec::new(SGarch, InnovationFamily::Normal);
        for mu in [-0.01, 0.0, 0.01] {
            for a in [-3.0, 0.0, 3.0] {
                for b in [-3.0, 0.0, 3.0] {
                    let theta = vec![mu, 0.0, a, b];
                    let (p, _) = theta_to_params(&theta, &spec);
                    assert!(p.satisfies_stationarity());
                }
            }
        }
    }

    #[test]
    fn gjr_theta_always_satisfies_stationarity() {
        let spec = ModelSpec::new(GjrGarch, InnovationFamily::Normal);
        for a in [-2.0, 0.0, 2.0] {
            for b in [-2.0, 0.0, 2.0] {
                for g in [-2.0, 0.0, 2.0] {
                    let theta = vec![0.0, 0.0, a, b, g];
                    let (p, _) = theta_to_params(&theta, &spec);
                    assert!(p.satisfies_stationarity());
                }
            }
        }
    }

    #[test]
    fn egarch_beta_confined_to_open_interval() {
        let spec = ModelSpec::new(EGarch, InnovationFamily::Normal);
        let theta = vec![0.0, 0.0, 0.0, 10.0, 0.0];
        let (p, _) = theta_to_params(&theta, &spec);
        assert!(p.satisfies_stationarity());
    }

    #[test]
    fn student_t_nu_always_above_two() {
        let spec = ModelSpec::new(SGarch, InnovationFamily::StudentT);
        for x in [-5.0, 0.0, 5.0] {
            let theta = vec![0.0, 0.0, 0.0, 0.0, x];
            let (_, innov) = theta_to_params(&theta, &spec);
            assert!(innov.nu().unwrap() > 2.0);
        }
    }
}
