use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct LogisticParams {
    pub(crate) r: f64,
    pub(crate) x0: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self { r: 3.9, x0: 0.5 }
    }
}

/// Logistic recurrence driven by an external sequence.
///
/// Each output is `r * s * (1 - s)` of the matching input `s`, not of the
/// previous output. The seed `x0` is prepended, so the result has one more
/// element than `inputs`. Nothing is clamped to `[0, 1]`.
pub(crate) fn iterate_driven(inputs: &[f64], params: &LogisticParams) -> Vec<f64> {
    let mut out = Vec::with_capacity(inputs.len() + 1);
    out.push(params.x0);
    out.extend(inputs.iter().map(|&s| params.r * s * (1.0 - s)));
    out
}
