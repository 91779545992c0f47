/// data.rs — price-matrix and residual-file ingestion
///
/// Full CSV/Excel ingestion (dashboards, multi-format support, globbing
/// across naming schemes) is out of scope as an external collaborator;
/// what remains in-scope is a thin contract: read one rectangular
/// date+price-columns table, validate it, and hand asset columns to the
/// returns preparer (`returns::to_returns`). Negative or zero prices are
/// a fatal `InvalidInput`.
use std::path::Path;

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult};
use crate::returns::{to_returns, ReturnSeries};

/// One dense, date-aligned table of asset prices: `prices[i]` is the full
/// price column for `assets[i]`, each the same length as `dates`.
#[derive(Debug, Clone)]
pub struct PriceMatrix {
    pub dates: Vec<NaiveDate>,
    pub assets: Vec<String>,
    pub prices: Vec<Vec<f64>>,
}

impl PriceMatrix {
    /// Converts every asset column to a `ReturnSeries` via the returns
    /// preparer. A column with a non-positive or non-finite price is
    /// reported and skipped with `WARN` rather than aborting the whole
    /// matrix — one bad asset should not sink a multi-asset run.
    pub fn to_return_series(&self) -> Vec<ReturnSeries> {
        let mut out = Vec::with_capacity(self.assets.len());
        for (asset, prices) in self.assets.iter().zip(self.prices.iter()) {
            match to_returns(asset, &self.dates, prices) {
                Ok(series) => out.push(series),
                Err(e) => tracing::warn!(asset, error = %e, "skipping asset with invalid price column"),
            }
        }
        out
    }
}

/// Reads a price matrix from a CSV with a header row: one `date` column
/// (ISO-8601, ascending) followed by one numeric column per asset, named
/// by the asset id. Fails fatally (`INVALID_INPUT`) on a non-positive
/// price anywhere, and on a non-ascending date column.
pub fn read_price_matrix_csv(path: &Path) -> CoreResult<PriceMatrix> {
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|e| CoreError::InvalidInput(format!("cannot open price matrix {}: {e}", path.display())))?;

    let headers = rdr
        .headers()
        .map_err(|e| CoreError::InvalidInput(format!("cannot read header row of {}: {e}", path.display())))?
        .clone();
    if headers.len() < 2 {
        return Err(CoreError::InvalidInput(format!(
            "price matrix {} needs a date column plus at least one asset column",
            path.display()
        )));
    }
    let assets: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();

    let mut dates = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); assets.len()];

    for (row_idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| CoreError::InvalidInput(format!("bad row {row_idx} in {}: {e}", path.display())))?;
        if record.len() != headers.len() {
            return Err(CoreError::InvalidInput(format!(
                "row {row_idx} of {} has {} fields, expected {}",
                path.display(),
                record.len(),
                headers.len()
            )));
        }

        let date = NaiveDate::parse_from_str(&record[0], "%Y-%m-%d")
            .map_err(|e| CoreError::InvalidInput(format!("bad date '{}' at row {row_idx}: {e}", &record[0])))?;
        if let Some(&prev) = dates.last() {
            if date <= prev {
                return Err(CoreError::InvalidInput(format!(
                    "price matrix dates must be strictly ascending: row {row_idx} has {date} after {prev}"
                )));
            }
        }
        dates.push(date);

        for (col_idx, col) in columns.iter_mut().enumerate() {
            let raw = &record[col_idx + 1];
            let price: f64 = raw
                .parse()
                .map_err(|e| CoreError::InvalidInput(format!("bad price '{raw}' at row {row_idx}: {e}")))?;
            if !(price > 0.0) || !price.is_finite() {
                return Err(CoreError::InvalidInput(format!(
                    "non-positive or non-finite price {price} for {} at row {row_idx}",
                    assets[col_idx]
                )));
            }
            col.push(price);
        }
    }

    if dates.len() < 2 {
        return Err(CoreError::InvalidInput(format!(
            "price matrix {} has fewer than 2 observations",
            path.display()
        )));
    }

    Ok(PriceMatrix { dates, assets, prices: columns })
}

/// Reads an externally-generated residual file: one scalar per row, under
/// a column named `residual` if present, otherwise the first column —
/// an alternative ingestion path for importing standardized residuals
/// directly instead of running the returns preparer + GARCH engine on
/// raw prices.
pub fn read_residual_file_csv(path: &Path) -> CoreResult<Vec<f64>> {
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|e| CoreError::InvalidInput(format!("cannot open residual file {}: {e}", path.display())))?;

    let headers = rdr
        .headers()
        .map_err(|e| CoreError::InvalidInput(format!("cannot read header row of {}: {e}", path.display())))?
        .clone();
    let col_idx = headers.iter().position(|h| h == "residual").unwrap_or(0);

    let mut out = Vec::new();
    for (row_idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| CoreError::InvalidInput(format!("bad row {row_idx} in {}: {e}", path.display())))?;
        let raw = record
            .get(col_idx)
            .ok_or_else(|| CoreError::InvalidInput(format!("row {row_idx} of {} is missing column {col_idx}", path.display())))?;
        let value: f64 = raw
            .parse()
            .map_err(|e| CoreError::InvalidInput(format!("bad residual '{raw}' at row {row_idx}: {e}")))?;
        out.push(value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("nfgarch_data_test_{}_{}", std::process::id(), name));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_a_well_formed_price_matrix() {
        let path = write_temp("prices_ok.csv", "date,AAA,BBB\n2020-01-01,100.0,50.0\n2020-01-02,101.0,49.5\n2020-01-03,99.5,50.2\n");
        let m = read_price_matrix_csv(&path).unwrap();
        assert_eq!(m.assets, vec!["AAA".to_string(), "BBB".to_string()]);
        assert_eq!(m.dates.len(), 3);
        let series = m.to_return_series();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].len(), 2);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rejects_non_positive_price() {
        let path = write_temp("prices_bad.csv", "date,AAA\n2020-01-01,100.0\n2020-01-02,0.0\n");
        let err = read_price_matrix_csv(&path).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rejects_non_ascending_dates() {
        let path = write_temp("prices_outoforder.csv", "date,AAA\n2020-01-02,100.0\n2020-01-01,101.0\n");
        let err = read_price_matrix_csv(&path).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn reads_residual_column_by_name() {
        let path = write_temp("residuals.csv", "other,residual\n1,0.02\n2,-0.01\n3,0.03\n");
        let z = read_residual_file_csv(&path).unwrap();
        assert_eq!(z, vec![0.02, -0.01, 0.03]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn falls_back_to_first_column_without_residual_header() {
        let path = write_temp("residuals_noheader.csv", "x\n0.1\n0.2\n");
        let z = read_residual_file_csv(&path).unwrap();
        assert_eq!(z, vec![0.1, 0.2]);
        let _ = std::fs::remove_file(&path);
    }
}
