/// nf/train.rs — fitting an NFModel to standardized residuals
///
/// Training is deterministic given (data, seed, architecture,
/// hyperparameters): plain SGD over the per-sample NLL (`train_step`),
/// early stopping on a held-out 10% slice, one retry at half the learning
/// rate on divergence (NaN/Inf loss), a `TrainingDiverged` error on a
/// second failure. The lifecycle {Initialized -> Training -> Trained |
/// Diverged -> Immutable} is realized by `fit` returning either a usable
/// `NFModel` or `CoreError::TrainingDiverged`.
use crate::cancel::{CancellationToken, Deadline};
use crate::error::{CoreError, CoreResult};

use super::flow::NFModel;

#[derive(Debug, Clone, Copy)]
pub struct NfTrainConfig {
    pub blocks: usize,
    pub hidden_dim: usize,
    pub lr: f64,
    pub max_epochs: usize,
    pub batch_size: usize,
    pub seed: u64,
    pub patience: usize,
}

impl Default for NfTrainConfig {
    fn default() -> Self {
        // Capacity/regularization chosen inside the usual blocks in
        // [4,12], hidden width in [32,128] range for this flow family.
        Self { blocks: 6, hidden_dim: 32, lr: 0.01, max_epochs: 200, batch_size: 64, seed: 0, patience: 10 }
    }
}

fn epoch_pass(model: &mut NFModel, data: &[f64], lr: f64) -> f64 {
    let mut total = 0.0;
    for &x in data {
        total += model.train_step(x, lr);
    }
    total / data.len().max(1) as f64
}

/// Trains a fresh `NFModel` on `z` (the standardized residuals of a
/// `GarchFit`). Holds out the last 10% of `z` (in input order — no
/// shuffling, keeping the run deterministic) for the early-stopping
/// criterion.
pub fn fit(
    z: &[f64],
    config: NfTrainConfig,
    token: &CancellationToken,
    deadline: Option<&Deadline>,
) -> CoreResult<NFModel> {
    if z.len() < 10 {
        return Err(CoreError::InvalidInput(format!("NF training needs >=10 residuals, got {}", z.len())));
    }

    let holdout_n = (z.len() / 10).max(1);
    let split = z.len() - holdout_n;
    let (train_data, holdout) = z.split_at(split);

    let mut lr = config.lr;
    let mut attempt = 0;

    loop {
        let mut model = NFModel::new(config.blocks, config.hidden_dim, config.seed);
        let mut best_holdout = f64::NEG_INFINITY;
        let mut epochs_without_improvement = 0;
        let mut diverged = false;

        'epochs: for _epoch in 0..config.max_epochs {
            crate::cancel::check(token, deadline)?;
            let mean_nll = epoch_pass(&mut model, train_data, lr);
            if !mean_nll.is_finite() {
                diverged = true;
                break 'epochs;
            }
            model.loss_trajectory.push(mean_nll);

            let holdout_ll = model.mean_log_density(holdout);
            if !holdout_ll.is_finite() {
                diverged = true;
                break 'epochs;
            }
            if holdout_ll > best_holdout + 1e-6 {
                best_holdout = holdout_ll;
                epochs_without_improvement = 0;
            } else {
                epochs_without_improvement += 1;
                if epochs_without_improvement >= config.patience {
                    break 'epochs;
                }
            }
        }

        if !diverged {
            return Ok(model);
        }

        attempt += 1;
        if attempt > 1 {
            return Err(CoreError::TrainingDiverged(format!(
                "NF training loss non-finite after retry at lr={lr:e}"
            )));
        }
        tracing::warn!(attempt, lr, "NF training diverged, retrying at half learning rate");
        lr *= 0.5;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;

    fn gaussian_z(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.sample::<f64, _>(StandardNormal)).collect()
    }

    #[test]
    fn fit_recovers_a_usable_model_on_gaussian_data() {
        let z = gaussian_z(400, 3);
        let config = NfTrainConfig { blocks: 3, hidden_dim: 8, lr: 0.02, max_epochs: 30, batch_size: 64, seed: 5, patience: 5 };
        let token = CancellationToken::new();
        let model = fit(&z, config, &token, None).unwrap();
        assert!(!model.loss_trajectory.is_empty());
        assert!(model.loss_trajectory.last().unwrap().is_finite());
    }

    #[test]
    fn held_out_mean_log_density_is_close_to_training_mean() {
        let z = gaussian_z(1000, 4);
        let config = NfTrainConfig { blocks: 3, hidden_dim: 8, lr: 0.02, max_epochs: 40, batch_size: 64, seed: 9, patience: 8 };
        let token = CancellationToken::new();
        let model = fit(&z, config, &token, None).unwrap();
        let split = z.len() - z.len() / 10;
        let (train, holdout) = z.split_at(split);
        let train_ll = model.mean_log_density(train);
        let holdout_ll = model.mean_log_density(holdout);
        assert!((train_ll - holdout_ll).abs() < 1.0, "train={train_ll} holdout={holdout_ll}");
    }

    #[test]
    fn rejects_too_short_series() {
        let z = vec![0.0; 3];
        let config = NfTrainConfig::default();
        let token = CancellationToken::new();
        assert!(fit(&z, config, &token, None).is_err());
    }
}
