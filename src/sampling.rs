use crate::error::{Error, Result};
use crate::model::{Axis, TimeSpan};
use crate::trajectory::Trajectory;

/// `n` evenly spaced times over `span`, both endpoints included.
pub(crate) fn linspace(span: TimeSpan, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![span.start()],
        _ => {
            let step = span.len() / (n - 1) as f64;
            let mut out: Vec<f64> = (0..n).map(|i| span.start() + i as f64 * step).collect();
            out[n - 1] = span.end();
            out
        }
    }
}

/// Reads one coordinate of the dense solution at `n` uniform times.
///
/// `span` has to be the span the trajectory was integrated over.
pub(crate) fn sample(
    trajectory: &Trajectory,
    span: TimeSpan,
    axis: Axis,
    n: usize,
) -> Result<Vec<f64>> {
    if n < 1 {
        return Err(Error::invalid("sample count must be at least 1"));
    }
    linspace(span, n)
        .into_iter()
        .map(|t| trajectory.eval(t).map(|y| y[axis.index()]))
        .collect()
}
