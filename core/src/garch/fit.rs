/// garch/fit.rs — maximum-likelihood estimation and the GarchFit lifecycle
///
/// Quasi-Newton minimization of the negative log-likelihood via `argmin`'s
/// LBFGS + More-Thuente line search, with a central finite-difference
/// gradient (no analytic Jacobian is maintained per family/innovation
/// combination). Termination: 1e−6 gradient-norm tolerance, 1e−8 cost
/// tolerance, max 1000 iterations total.
///
/// The optimizer runs in bounded chunks of `CHECK_EVERY` iterations rather
/// than a single `Executor::run()` call, with the cancellation token and
/// deadline checked between chunks and the best parameter from one chunk
/// warm-starting the next: this is the only way to give the optimizer a
/// cooperation point, since a single `Executor::run()` call otherwise has
/// none. A fit that converges inside the first chunk (the common case for
/// these low-dimensional problems) behaves exactly as a single
/// uninterrupted run.
use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;

use crate::cancel::{CancellationToken, Deadline};
use crate::error::{CoreError, CoreResult};

use super::likelihood::{log_likelihood, recursion};
use super::params::{initial_theta, theta_len, theta_to_params, InnovationParams, Params};
use super::spec::ModelSpec;

const MAX_ITERS: u64 = 1000;
const CHECK_EVERY: u64 = 25;
const TOL_GRAD: f64 = 1e-6;
const TOL_COST: f64 = 1e-8;
const LARGE_COST: f64 = 1e10;

/// The GARCH fit lifecycle collapsed onto the outcome of a finished run;
/// there is no live "Fitting" value observable outside `fit()` since the
/// whole estimation is synchronous from the caller's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitOutcome {
    Converged,
    NotConverged,
}

/// Immutable once constructed: created by the GARCH engine and never mutated.
#[derive(Debug, Clone)]
pub struct GarchFit {
    pub asset_id: String,
    pub spec: ModelSpec,
    pub params: Params,
    pub innovation: InnovationParams,
    pub theta: Vec<f64>,
    pub h: Vec<f64>,
    pub eps: Vec<f64>,
    pub z: Vec<f64>,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub outcome: FitOutcome,
}

impl GarchFit {
    pub fn is_usable(&self) -> bool {
        matches!(self.outcome, FitOutcome::Converged | FitOutcome::NotConverged)
    }
}

#[derive(Clone)]
struct NllProblem {
    spec: ModelSpec,
    r: Vec<f64>,
}

impl NllProblem {
    fn eval(&self, theta: &[f64]) -> f64 {
        let (params, innovation) = theta_to_params(theta, &self.spec);
        if !params.satisfies_stationarity() {
            return LARGE_COST;
        }
        match recursion(self.spec.variance, &params, &self.r) {
            Ok(rr) => {
                let ll = log_likelihood(&rr.h, &rr.z, &innovation);
                if ll.is_finite() {
                    -ll
                } else {
                    LARGE_COST
                }
            }
            Err(_) => LARGE_COST,
        }
    }
}

impl CostFunction for NllProblem {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, ArgminError> {
        Ok(self.eval(theta))
    }
}

impl Gradient for NllProblem {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, ArgminError> {
        let mut grad = vec![0.0; theta.len()];
        for i in 0..theta.len() {
            let step = 1e-5 * (1.0 + theta[i].abs());
            let mut plus = theta.clone();
            let mut minus = theta.clone();
            plus[i] += step;
            minus[i] -= step;
            grad[i] = (self.eval(&plus) - self.eval(&minus)) / (2.0 * step);
        }
        Ok(grad)
    }
}

/// Fits `spec` to a training slice of returns. `r.len() < 2` or a
/// near-zero-variance slice (e.g. a constant price series) are rejected
/// with `ERR_CONSTRAINTS` before the optimizer runs.
pub fn fit(
    asset_id: &str,
    spec: ModelSpec,
    r: &[f64],
    token: &CancellationToken,
    deadline: Option<&Deadline>,
) -> CoreResult<GarchFit> {
    if r.len() < 2 {
        return Err(CoreError::InvalidInput(format!("return series for {asset_id} has length {} < 2", r.len())));
    }
    let sample_mean = crate::numerics::mean(r);
    let sample_var = crate::numerics::population_variance(r);
    if sample_var < 1e-20 {
        return Err(CoreError::Constraints(format!(
            "training slice for {asset_id} has near-zero variance ({sample_var:e}); cannot identify a GARCH model"
        )));
    }

    let init = initial_theta(&spec, sample_mean, sample_var);
    debug_assert_eq!(init.len(), theta_len(&spec));

    let problem = NllProblem { spec, r: r.to_vec() };
    let mut current = init.clone();
    let mut total_iters: u64 = 0;

    while total_iters < MAX_ITERS {
        crate::cancel::check(token, deadline)?;

        let linesearch = MoreThuenteLineSearch::new().with_c(1e-4, 0.9).map_err(|e| CoreError::Numerics {
            t: 0,
            detail: format!("line search configuration failed: {e}"),
        })?;
        let solver = LBFGS::new(linesearch, 10)
            .with_tolerance_grad(TOL_GRAD)
            .map_err(|e| CoreError::Numerics { t: 0, detail: e.to_string() })?
            .with_tolerance_cost(TOL_COST)
            .map_err(|e| CoreError::Numerics { t: 0, detail: e.to_string() })?;

        let chunk_iters = CHECK_EVERY.min(MAX_ITERS - total_iters);
        let result = Executor::new(problem.clone(), solver)
            .configure(|state| state.param(current.clone()).max_iters(chunk_iters))
            .run();

        let (ran, converged_early) = match result {
            Ok(res) => {
                let ran = res.state.get_iter();
                current = res.state.get_best_param().cloned().unwrap_or(current);
                (ran, ran < chunk_iters)
            }
            Err(_) => (0, true),
        };
        total_iters += ran;

        if converged_early {
            break;
        }
    }

    crate::cancel::check(token, deadline)?;

    let best_theta = current;
    let iters = total_iters;

    let (params, innovation) = theta_to_params(&best_theta, &spec);
    let rr = recursion(spec.variance, &params, r)?;
    let ll = log_likelihood(&rr.h, &rr.z, &innovation);
    let k = (theta_len(&spec)) as f64;
    let t = r.len() as f64;
    let aic = 2.0 * k - 2.0 * ll;
    let bic = k * t.ln() - 2.0 * ll;

    let outcome = if ll.is_finite() && iters < MAX_ITERS {
        FitOutcome::Converged
    } else {
        FitOutcome::NotConverged
    };

    Ok(GarchFit {
        asset_id: asset_id.to_string(),
        spec,
        params,
        innovation,
        theta: best_theta,
        h: rr.h,
        eps: rr.eps,
        z: rr.z,
        log_likelihood: ll,
        aic,
        bic,
        outcome,
    })
}
