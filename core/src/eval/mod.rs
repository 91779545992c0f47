/// eval/ — the evaluation kernel
///
/// Submodules group by the kind of statistic: `diagnostics` (Ljung-Box,
/// ARCH-LM), `var` (VaR backtests), `distance` (KS, Wasserstein),
/// `stylized` (sample moments, ACF, tail index, information criteria),
/// `report` (the frozen-schema output sheets).
pub mod diagnostics;
pub mod distance;
pub mod report;
pub mod stylized;
pub mod var;

pub use diagnostics::{arch_lm, ljung_box, TestResult};
pub use distance::{two_sample_ks, wasserstein_distance, KsResult};
pub use report::EvalReport;
pub use stylized::{information_criteria, mean_absolute_error, mean_squared_error, stylized_facts, StylizedFacts};
pub use var::{var_backtest, VarBacktestReport};
