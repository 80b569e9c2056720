// projeto: lstmsensortrain
// file: src/neural/window.rs
// Reframes a multivariate series into lagged supervised-learning rows

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::neural::utils::TrainingError;

/// Windowed table: one row per time step `t`, columns named
/// `var{j}(t-{i})`, `var{j}(t)` and `var{j}(t+{i})`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisedFrame {
    pub names: Vec<String>,
    pub values: Array2<f64>,
    pub n_vars: usize,
    pub n_in: usize,
    pub n_out: usize,
    /// Source row `t` of every output row.
    pub times: Vec<usize>,
}

/// Name of variable `var` (0-based) at relative `offset` from `t`.
pub fn column_name(var: usize, offset: isize) -> String {
    match offset {
        0 => format!("var{}(t)", var + 1),
        o if o < 0 => format!("var{}(t-{})", var + 1, -o),
        o => format!("var{}(t+{})", var + 1, o),
    }
}

/// Time steps `t` whose window `t-n_in ..= t+n_out-1` lies inside the series
/// and holds no NaN.
pub fn complete_rows(data: &ArrayView2<f64>, n_in: usize, n_out: usize) -> Vec<usize> {
    let n_rows = data.nrows();
    let clean: Vec<bool> = data
        .axis_iter(Axis(0))
        .map(|row| row.iter().all(|v| !v.is_nan()))
        .collect();
    let end = n_rows.saturating_sub(n_out.saturating_sub(1));
    (n_in..end)
        .filter(|&t| clean[t - n_in..t + n_out.max(1)].iter().all(|&ok| ok))
        .collect()
}

/// Frames `data` (rows = time steps, columns = variables) as `n_in` lag steps
/// followed by `n_out` lead steps. With `dropnan` every row holding a NaN is
/// dropped, whether it comes from the series edges or from gaps in `data`;
/// otherwise the missing cells hold NaN.
pub fn series_to_supervised(
    data: &ArrayView2<f64>,
    n_in: usize,
    n_out: usize,
    dropnan: bool,
) -> Result<SupervisedFrame, TrainingError> {
    if n_out == 0 {
        return Err(TrainingError::ModelConfiguration(
            "n_out must be at least 1".to_string(),
        ));
    }

    let (n_rows, n_vars) = data.dim();
    let offsets: Vec<isize> = (1..=n_in as isize)
        .rev()
        .map(|i| -i)
        .chain(0..n_out as isize)
        .collect();

    let names: Vec<String> = offsets
        .iter()
        .flat_map(|&offset| (0..n_vars).map(move |j| column_name(j, offset)))
        .collect();

    let rows: Vec<usize> = if dropnan {
        complete_rows(data, n_in, n_out)
    } else {
        (0..n_rows).collect()
    };

    let mut values = Array2::from_elem((rows.len(), offsets.len() * n_vars), f64::NAN);
    for (out_row, &t) in rows.iter().enumerate() {
        for (block, &offset) in offsets.iter().enumerate() {
            let source = t as isize + offset;
            if source < 0 || source >= n_rows as isize {
                continue;
            }
            let start = block * n_vars;
            values
                .slice_mut(ndarray::s![out_row, start..start + n_vars])
                .assign(&data.row(source as usize));
        }
    }

    Ok(SupervisedFrame {
        names,
        values,
        n_vars,
        n_in,
        n_out,
        times: rows,
    })
}

/// Single-variable form: `series` is one column.
#[allow(dead_code)]
pub fn series_to_supervised_1d(
    series: &[f64],
    n_in: usize,
    n_out: usize,
    dropnan: bool,
) -> Result<SupervisedFrame, TrainingError> {
    let data = ArrayView2::from_shape((series.len(), 1), series)?;
    series_to_supervised(&data, n_in, n_out, dropnan)
}

impl SupervisedFrame {
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    #[allow(dead_code)]
    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Column of variable `var` (0-based) at `offset`, resolved by name.
    pub fn column_for(&self, var: usize, offset: isize) -> Result<usize, TrainingError> {
        let name = column_name(var, offset);
        self.column_index(&name).ok_or_else(|| {
            TrainingError::Shape(format!("column '{}' not present in windowed frame", name))
        })
    }

    /// Column indices of the whole lag block, oldest step first.
    pub fn lag_columns(&self) -> Result<Vec<usize>, TrainingError> {
        let mut cols = Vec::with_capacity(self.n_in * self.n_vars);
        for i in (1..=self.n_in as isize).rev() {
            for j in 0..self.n_vars {
                cols.push(self.column_for(j, -i)?);
            }
        }
        Ok(cols)
    }

    /// Rows `range` restricted to `columns`, in the given column order.
    pub fn select(&self, rows: std::ops::Range<usize>, columns: &[usize]) -> Array2<f64> {
        self.values
            .slice(ndarray::s![rows, ..])
            .select(Axis(1), columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_drops_edge_rows() {
        let data = Array2::from_shape_fn((10, 3), |(i, j)| (i * 10 + j) as f64);
        let frame = series_to_supervised(&data.view(), 3, 1, true).unwrap();
        assert_eq!(frame.nrows(), 10 - 3);
        assert_eq!(frame.ncols(), (3 + 1) * 3);
        assert!(frame.values.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_row_count_with_leads() {
        let data = Array2::from_shape_fn((20, 2), |(i, j)| (i + j) as f64);
        let frame = series_to_supervised(&data.view(), 4, 3, true).unwrap();
        assert_eq!(frame.nrows(), 20 - (4 + 3 - 1));
    }

    #[test]
    fn test_column_names() {
        let data = Array2::<f64>::zeros((5, 2));
        let frame = series_to_supervised(&data.view(), 1, 2, true).unwrap();
        assert_eq!(
            frame.names,
            vec!["var1(t-1)", "var2(t-1)", "var1(t)", "var2(t)", "var1(t+1)", "var2(t+1)"]
        );
    }

    #[test]
    fn test_no_lag_columns_when_n_in_zero() {
        let data = array![[1.0, 2.0], [3.0, 4.0]];
        let frame = series_to_supervised(&data.view(), 0, 1, true).unwrap();
        assert_eq!(frame.names, vec!["var1(t)", "var2(t)"]);
        assert_eq!(frame.values, data);
        assert!(frame.lag_columns().unwrap().is_empty());
    }

    #[test]
    fn test_small_scenario() {
        let data = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let frame = series_to_supervised(&data.view(), 1, 1, true).unwrap();
        assert_eq!(frame.nrows(), 2);
        assert_eq!(frame.values.row(0).to_vec(), vec![1.0, 10.0, 2.0, 20.0]);
        assert_eq!(frame.values.row(1).to_vec(), vec![2.0, 20.0, 3.0, 30.0]);
    }

    #[test]
    fn test_keeps_nan_rows_without_dropnan() {
        let data = array![[1.0], [2.0], [3.0]];
        let frame = series_to_supervised(&data.view(), 1, 2, false).unwrap();
        assert_eq!(frame.nrows(), 3);
        assert!(frame.values[[0, 0]].is_nan());
        assert_eq!(frame.values[[0, 1]], 1.0);
        assert_eq!(frame.values[[0, 2]], 2.0);
        assert_eq!(frame.values[[1, 0]], 1.0);
        assert!(frame.values[[2, 2]].is_nan());
    }

    #[test]
    fn test_short_series_yields_no_rows() {
        let data = array![[1.0], [2.0]];
        let frame = series_to_supervised(&data.view(), 3, 1, true).unwrap();
        assert_eq!(frame.nrows(), 0);
        assert_eq!(frame.ncols(), 4);
    }

    #[test]
    fn test_dropnan_removes_rows_touching_gaps() {
        let data = array![[1.0, 10.0], [f64::NAN, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let frame = series_to_supervised(&data.view(), 1, 1, true).unwrap();
        assert_eq!(frame.nrows(), 1);
        assert_eq!(frame.values.row(0).to_vec(), vec![3.0, 30.0, 4.0, 40.0]);
        assert_eq!(frame.times, vec![3]);
    }

    #[test]
    fn test_complete_rows() {
        let data = array![[0.0], [1.0], [f64::NAN], [3.0], [4.0], [5.0], [6.0]];
        assert_eq!(complete_rows(&data.view(), 2, 1), vec![5, 6]);
        assert_eq!(complete_rows(&data.view(), 1, 2), vec![4, 5]);
        assert_eq!(complete_rows(&data.view(), 0, 1), vec![0, 1, 3, 4, 5, 6]);

        let frame = series_to_supervised(&data.view(), 2, 1, false).unwrap();
        assert_eq!(frame.times, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_rejects_zero_n_out() {
        let data = array![[1.0], [2.0]];
        assert!(series_to_supervised(&data.view(), 1, 0, true).is_err());
    }

    #[test]
    fn test_one_dimensional_series() {
        let frame = series_to_supervised_1d(&[1.0, 2.0, 3.0, 4.0], 2, 1, true).unwrap();
        assert_eq!(frame.names, vec!["var1(t-2)", "var1(t-1)", "var1(t)"]);
        assert_eq!(frame.values, array![[1.0, 2.0, 3.0], [2.0, 3.0, 4.0]]);
    }

    #[test]
    fn test_schema_lookup() {
        let data = Array2::from_shape_fn((6, 3), |(i, j)| (i * 3 + j) as f64);
        let frame = series_to_supervised(&data.view(), 2, 1, true).unwrap();
        assert_eq!(frame.column_for(2, 0).unwrap(), 8);
        assert_eq!(frame.column_for(0, -1).unwrap(), 3);
        assert!(frame.column_for(0, 1).is_err());
        assert_eq!(frame.lag_columns().unwrap(), vec![0, 1, 2, 3, 4, 5]);

        let lags = frame.select(0..2, &[3, 4, 5]);
        assert_eq!(lags, array![[3.0, 4.0, 5.0], [6.0, 7.0, 8.0]]);
    }
}
