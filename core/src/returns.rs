/// returns.rs — Returns preparer
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL SPECIFICATION
/// ─────────────────────────────────────────────────────────────────────────
///
/// Log return from a price column:
///
///   r[t] = ln(P[t] / P[t-1])
///
/// Mirrors the common `ln(close / open)` single-bar log return,
/// generalized from a single bar's open/close to a full chronological
/// price column.
///
/// Chronological split at a fixed ratio:
///
///   split index = floor(ratio * T), never shuffled.
///
/// Sliding-window time-series cross-validation with window W, step S,
/// horizon H: train slice [s, s+W), test slice [s+W, s+W+H), s advances by
/// S while s+W+H <= T. Enumerated eagerly into typed slices rather than
/// passed around as raw index pairs.
/// ─────────────────────────────────────────────────────────────────────────
use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult};

/// A single asset's ordered log-return series. One observation per
/// business day: length equals the price series length minus one, since
/// the first price observation is consumed by differencing.
#[derive(Debug, Clone)]
pub struct ReturnSeries {
    pub asset_id: String,
    pub dates: Vec<NaiveDate>,
    pub returns: Vec<f64>,
}

impl ReturnSeries {
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}

/// A borrowed, contiguous slice of a `ReturnSeries` — what `ts_cv_windows`
/// and `chrono_split` hand back instead of raw `(usize, usize)` index
/// pairs.
#[derive(Debug, Clone, Copy)]
pub struct ReturnSlice<'a> {
    pub asset_id: &'a str,
    pub returns: &'a [f64],
    pub start: usize,
    pub end: usize,
}

/// Convert a price column to log returns. Fails with `InvalidInput` if any
/// price is non-positive or the series has fewer than 2 observations.
pub fn to_returns(asset_id: &str, dates: &[NaiveDate], prices: &[f64]) -> CoreResult<ReturnSeries> {
    if prices.len() < 2 {
        return Err(CoreError::InvalidInput(format!(
            "price series for {asset_id} has length {} < 2",
            prices.len()
        )));
    }
    if dates.len() != prices.len() {
        return Err(CoreError::InvalidInput(format!(
            "date/price length mismatch for {asset_id}: {} dates vs {} prices",
            dates.len(),
            prices.len()
        )));
    }
    if let Some(&bad) = prices.iter().find(|&&p| !(p > 0.0) || !p.is_finite()) {
        return Err(CoreError::InvalidInput(format!(
            "non-positive or non-finite price {bad} for {asset_id}"
        )));
    }

    let returns: Vec<f64> = prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    let out_dates = dates[1..].to_vec();

    Ok(ReturnSeries { asset_id: asset_id.to_owned(), dates: out_dates, returns })
}

/// Deterministic chronological split at `floor(ratio * T)`. Never shuffles.
/// `ratio` is clamped to (0, 1) to avoid degenerate empty splits.
pub fn chrono_split(r: &ReturnSeries, ratio: f64) -> (ReturnSlice<'_>, ReturnSlice<'_>) {
    let t = r.returns.len();
    let ratio = ratio.clamp(0.0, 1.0);
    let cut = ((ratio * t as f64).floor() as usize).min(t);

    let train = ReturnSlice { asset_id: &r.asset_id, returns: &r.returns[..cut], start: 0, end: cut };
    let test = ReturnSlice { asset_id: &r.asset_id, returns: &r.returns[cut..], start: cut, end: t };
    (train, test)
}

/// One (train, test) pair from a sliding-window time-series CV sweep.
#[derive(Debug, Clone, Copy)]
pub struct CvWindow<'a> {
    pub train: ReturnSlice<'a>,
    pub test: ReturnSlice<'a>,
}

/// Enumerates the ordered sequence of CV windows eagerly into a `Vec` —
/// restartable and finite by construction since it is not a generator: the
/// same (T, W, S, H) always yields the same ordered sequence of starts.
pub fn ts_cv_windows(r: &ReturnSeries, window: usize, step: usize, horizon: usize) -> Vec<CvWindow<'_>> {
    let t = r.returns.len();
    let mut out = Vec::new();
    if window == 0 || step == 0 || horizon == 0 {
        return out;
    }

    let mut s = 0usize;
    while s + window + horizon <= t {
        let train = ReturnSlice {
            asset_id: &r.asset_id,
            returns: &r.returns[s..s + window],
            start: s,
            end: s + window,
        };
        let test = ReturnSlice {
            asset_id: &r.asset_id,
            returns: &r.returns[s + window..s + window + horizon],
            start: s + window,
            end: s + window + horizon,
        };
        out.push(CvWindow { train, test });
        s += step;
    }
    out
}

/// A training slice with (near-)zero variance cannot identify a GARCH
/// model; the preparer's contract is to flag it so callers can warn and
/// skip it rather than feed it to the optimizer.
pub fn is_degenerate_slice(returns: &[f64]) -> bool {
    crate::numerics::variance(returns) < 1e-20
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: usize) -> Vec<NaiveDate> {
        (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(i as i64))
            .collect()
    }

    #[test]
    fn to_returns_drops_first_observation() {
        let prices = vec![100.0, 101.0, 99.0, 102.0];
        let r = to_returns("AAA", &dates(4), &prices).unwrap();
        assert_eq!(r.len(), 3);
        assert!((r.returns[0] - (101.0f64 / 100.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn to_returns_invariant_under_constant_log_shift() {
        let prices = vec![100.0, 101.0, 99.0, 102.0];
        let scaled: Vec<f64> = prices.iter().map(|p| p * 7.3).collect();
        let r1 = to_returns("AAA", &dates(4), &prices).unwrap();
        let r2 = to_returns("AAA", &dates(4), &scaled).unwrap();
        for (a, b) in r1.returns.iter().zip(r2.returns.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn to_returns_rejects_non_positive_price() {
        let prices = vec![100.0, 0.0, 99.0];
        assert!(to_returns("AAA", &dates(3), &prices).is_err());
    }

    #[test]
    fn chrono_split_cuts_at_floor_ratio() {
        let r = ReturnSeries { asset_id: "AAA".into(), dates: dates(10), returns: (0..10).map(|i| i as f64).collect() };
        let (train, test) = chrono_split(&r, 0.65);
        assert_eq!(train.returns.len(), 6);
        assert_eq!(test.returns.len(), 4);
    }

    #[test]
    fn ts_cv_windows_enumerates_expected_starts() {
        let r = ReturnSeries { asset_id: "AAA".into(), dates: dates(20), returns: (0..20).map(|i| i as f64).collect() };
        let windows = ts_cv_windows(&r, 10, 2, 3);
        // s + 10 + 3 <= 20 => s <= 7, steps of 2: 0,2,4,6
        let starts: Vec<usize> = windows.iter().map(|w| w.train.start).collect();
        assert_eq!(starts, vec![0, 2, 4, 6]);
    }

    #[test]
    fn ts_cv_windows_deterministic_across_calls() {
        let r = ReturnSeries { asset_id: "AAA".into(), dates: dates(20), returns: (0..20).map(|i| i as f64).collect() };
        let a = ts_cv_windows(&r, 8, 3, 2);
        let b = ts_cv_windows(&r, 8, 3, 2);
        let starts_a: Vec<usize> = a.iter().map(|w| w.train.start).collect();
        let starts_b: Vec<usize> = b.iter().map(|w| w.train.start).collect();
        assert_eq!(starts_a, starts_b);
    }
}
