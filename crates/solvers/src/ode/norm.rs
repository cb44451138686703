use nalgebra::DVector;

/// Root-mean-square norm of `err` scaled by `atol + rtol * max(|y|, |y_new|)`.
///
/// An exact zero error contributes nothing, even where the scale is zero.
pub(super) fn scaled_rms(
    err: &DVector<f64>,
    y: &DVector<f64>,
    y_new: &DVector<f64>,
    rtol: f64,
    atol: f64,
) -> f64 {
    if err.is_empty() {
        return 0.0;
    }
    let sum: f64 = err
        .iter()
        .zip(y.iter().zip(y_new.iter()))
        .map(|(&e, (a, b))| {
            if e == 0.0 {
                return 0.0;
            }
            let scale = atol + rtol * a.abs().max(b.abs());
            let r = e / scale;
            r * r
        })
        .sum();
    (sum / err.len() as f64).sqrt()
}

/// Root-mean-square norm of `v` scaled by `atol + rtol * |y|`.
pub(super) fn rms_scaled_by(v: &DVector<f64>, y: &DVector<f64>, rtol: f64, atol: f64) -> f64 {
    scaled_rms(v, y, y, rtol, atol)
}
