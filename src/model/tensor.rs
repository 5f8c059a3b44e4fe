//! Conversions between encoded feature matrices and candle tensors

use candle_core::{Device, Result, Tensor};
use faer::Mat;

/// Row-major `(rows, cols)` f64 tensor holding `m`
pub fn mat_to_tensor(m: &Mat<f64>, device: &Device) -> Result<Tensor> {
    let (rows, cols) = (m.nrows(), m.ncols());
    let mut values = Vec::with_capacity(rows * cols);
    for i in 0..rows {
        for j in 0..cols {
            values.push(m[(i, j)]);
        }
    }
    Tensor::from_vec(values, (rows, cols), device)
}

/// Matrix copy of a rank-2 f64 tensor
pub fn tensor_to_mat(t: &Tensor) -> Result<Mat<f64>> {
    let rows: Vec<Vec<f64>> = t.to_vec2()?;
    let cols = rows.first().map_or(0, Vec::len);
    Ok(Mat::from_fn(rows.len(), cols, |i, j| rows[i][j]))
}

/// Index tensor selecting `rows` along the batch dimension
pub fn row_index(rows: &[usize], device: &Device) -> Result<Tensor> {
    let indices: Vec<u32> = rows.iter().map(|&i| i as u32).collect();
    Tensor::from_vec(indices, rows.len(), device)
}
