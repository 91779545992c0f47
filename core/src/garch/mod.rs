/// garch/ — the manual GARCH estimation and simulation engine
///
/// Submodule layout mirrors the component's own internal dependency order:
/// `spec` (value objects) -> `params` (θ*⇄params bijection) -> `likelihood`
/// (recursions + densities) -> `fit` (MLE) -> `forecast` / `simulate`
/// (downstream consumers of a `GarchFit`).
pub mod fit;
pub mod forecast;
pub mod likelihood;
pub mod params;
pub mod simulate;
pub mod spec;

pub use fit::{fit, FitOutcome, GarchFit};
pub use likelihood::innovation_quantile;
pub use params::{InnovationParams, Params};
pub use simulate::SimPath;
pub use spec::{InnovationFamily, ModelSpec, TgarchThreshold, VarianceFamily};
