//! Explicit Runge-Kutta 5(4) integrator (Dormand-Prince) with dense output.
//!
//! Step control uses the mixed absolute/relative RMS error norm and the
//! usual safety-factor update. Every accepted step keeps its stage
//! derivatives folded into a quartic interpolant so the returned
//! [`Trajectory`] can be queried anywhere inside the span.

use crate::error::{Error, Result};
use crate::lorenz::VectorField;
use crate::model::{State, TimeSpan};
use crate::trajectory::{IntegrationStats, Segment, Trajectory};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

const STAGES: usize = 6;
const ERROR_ORDER: f64 = 4.0;
const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

const C: [f64; STAGES] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];

const A: [[f64; 5]; STAGES] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0],
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
    ],
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
    ],
];

const B: [f64; STAGES] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];

// embedded 4th order minus 5th order, includes the FSAL stage
const E: [f64; STAGES + 1] = [
    -71.0 / 57600.0,
    0.0,
    71.0 / 16695.0,
    -71.0 / 1920.0,
    17253.0 / 339200.0,
    -22.0 / 525.0,
    1.0 / 40.0,
];

// continuous extension, row per stage, column per power of x
const P: [[f64; 4]; STAGES + 1] = [
    [
        1.0,
        -8048581381.0 / 2820520608.0,
        8663915743.0 / 2820520608.0,
        -12715105075.0 / 11282082432.0,
    ],
    [0.0, 0.0, 0.0, 0.0],
    [
        0.0,
        131558114200.0 / 32700410799.0,
        -68118460800.0 / 10900136933.0,
        87487479700.0 / 32700410799.0,
    ],
    [
        0.0,
        -1754552775.0 / 470086768.0,
        14199869525.0 / 1410260304.0,
        -10690763975.0 / 1880347072.0,
    ],
    [
        0.0,
        127303824393.0 / 49829197408.0,
        -318862633887.0 / 49829197408.0,
        701980252875.0 / 199316789632.0,
    ],
    [
        0.0,
        -282668133.0 / 205662961.0,
        2019193451.0 / 616988883.0,
        -1453857185.0 / 822651844.0,
    ],
    [
        0.0,
        40617522.0 / 29380423.0,
        -110615467.0 / 29380423.0,
        69997945.0 / 29380423.0,
    ],
];

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct SolverOptions {
    pub(crate) rtol: f64,
    pub(crate) atol: f64,
    /// `None` means unbounded.
    pub(crate) max_step: Option<f64>,
    /// `None` picks the first step automatically.
    pub(crate) first_step: Option<f64>,
    /// Cap on accepted plus rejected steps.
    pub(crate) max_steps: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-3,
            atol: 1e-6,
            max_step: None,
            first_step: None,
            max_steps: 1_000_000,
        }
    }
}

impl SolverOptions {
    fn validate(&self, span: &TimeSpan) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.rtol) || !positive(self.atol) {
            return Err(Error::invalid(format!(
                "tolerances must be positive and finite, got rtol={} atol={}",
                self.rtol, self.atol
            )));
        }
        if let Some(m) = self.max_step {
            if !(m > 0.0) {
                return Err(Error::invalid(format!("max_step must be positive, got {m}")));
            }
        }
        if let Some(h) = self.first_step {
            if !(h > 0.0 && h <= span.len()) {
                return Err(Error::invalid(format!(
                    "first_step must lie in (0, {}], got {h}",
                    span.len()
                )));
            }
        }
        if self.max_steps == 0 {
            return Err(Error::invalid("max_steps must be at least 1"));
        }
        Ok(())
    }

    fn max_step(&self) -> f64 {
        self.max_step.unwrap_or(f64::INFINITY)
    }
}

fn rms_scaled(v: &State, scale: &State) -> f64 {
    let sum: f64 = v.iter().zip(scale).map(|(a, s)| (a / s).powi(2)).sum();
    (sum / v.len() as f64).sqrt()
}

fn all_finite(v: &State) -> bool {
    v.iter().all(|x| x.is_finite())
}

fn axpy(y: &State, h: f64, k: &State) -> State {
    [y[0] + h * k[0], y[1] + h * k[1], y[2] + h * k[2]]
}

fn next_up_gap(t: f64) -> f64 {
    // distance to the next representable float above t
    let next = if t == 0.0 {
        f64::from_bits(1)
    } else if t > 0.0 {
        f64::from_bits(t.to_bits() + 1)
    } else {
        f64::from_bits(t.to_bits() - 1)
    };
    (next - t).abs()
}

struct Rk45<'a, F: VectorField> {
    field: &'a F,
    opts: &'a SolverOptions,
    evaluations: usize,
}

impl<'a, F: VectorField> Rk45<'a, F> {
    fn f(&mut self, t: f64, y: &State) -> State {
        self.evaluations += 1;
        self.field.eval(t, y)
    }

    fn scale(&self, y: &State, y_new: &State) -> State {
        let mut s = [0.0; 3];
        for d in 0..3 {
            s[d] = self.opts.atol + y[d].abs().max(y_new[d].abs()) * self.opts.rtol;
        }
        s
    }

    /// Hairer's starting step heuristic.
    fn initial_step(&mut self, t0: f64, y0: &State, f0: &State, interval: f64) -> f64 {
        let mut scale = [0.0; 3];
        for d in 0..3 {
            scale[d] = self.opts.atol + y0[d].abs() * self.opts.rtol;
        }
        let d0 = rms_scaled(y0, &scale);
        let d1 = rms_scaled(f0, &scale);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        }
        .min(interval);

        let y1 = axpy(y0, h0, f0);
        let f1 = self.f(t0 + h0, &y1);
        let diff = [f1[0] - f0[0], f1[1] - f0[1], f1[2] - f0[2]];
        let d2 = rms_scaled(&diff, &scale) / h0;

        let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(1.0 / (ERROR_ORDER + 1.0))
        };
        let h = (100.0 * h0).min(h1).min(interval).min(self.opts.max_step());
        if h.is_finite() && h > 0.0 {
            h
        } else {
            h0
        }
    }

    /// One trial step. Returns the new state and all seven stage derivatives.
    fn step(&mut self, t: f64, y: &State, f: &State, h: f64) -> (State, [State; STAGES + 1]) {
        let mut k = [[0.0; 3]; STAGES + 1];
        k[0] = *f;
        for s in 1..STAGES {
            let mut ys = *y;
            for (j, kj) in k.iter().enumerate().take(s) {
                let a = A[s][j];
                if a != 0.0 {
                    for d in 0..3 {
                        ys[d] += h * a * kj[d];
                    }
                }
            }
            k[s] = self.f(t + C[s] * h, &ys);
        }

        let mut y_new = *y;
        for (s, ks) in k.iter().enumerate().take(STAGES) {
            for d in 0..3 {
                y_new[d] += h * B[s] * ks[d];
            }
        }
        k[STAGES] = self.f(t + h, &y_new);
        (y_new, k)
    }
}

fn dense_coefficients(k: &[State; STAGES + 1]) -> [State; 4] {
    let mut q = [[0.0; 3]; 4];
    for (j, qj) in q.iter_mut().enumerate() {
        for (s, ks) in k.iter().enumerate() {
            let p = P[s][j];
            if p != 0.0 {
                for d in 0..3 {
                    qj[d] += p * ks[d];
                }
            }
        }
    }
    q
}

/// Integrates `field` from `y0` over `span` and returns the dense solution.
pub(crate) fn integrate<F: VectorField>(
    field: &F,
    span: TimeSpan,
    y0: State,
    opts: &SolverOptions,
) -> Result<Trajectory> {
    opts.validate(&span)?;
    if !all_finite(&y0) {
        return Err(Error::invalid(format!("initial state must be finite, got {y0:?}")));
    }

    let mut rk = Rk45 {
        field,
        opts,
        evaluations: 0,
    };
    let t_end = span.end();
    let max_step = opts.max_step();

    let mut t = span.start();
    let mut y = y0;
    let mut f = rk.f(t, &y);
    if !all_finite(&f) {
        return Err(Error::numerical(t, "non-finite derivative at the initial state"));
    }

    let mut h_abs = match opts.first_step {
        Some(h) => h,
        None => rk.initial_step(t, &y, &f, span.len()),
    };
    debug!(h0 = h_abs, rtol = opts.rtol, atol = opts.atol, "starting integration");

    let mut ts = vec![t];
    let mut states = vec![y];
    let mut segments = Vec::new();
    let mut rejected = 0usize;

    while t < t_end {
        let min_step = 10.0 * next_up_gap(t);
        h_abs = h_abs.min(max_step).max(min_step);

        let mut step_rejected = false;
        let mut saw_non_finite = false;
        loop {
            if segments.len() + rejected >= opts.max_steps {
                return Err(Error::numerical(
                    t,
                    format!("exceeded the maximum of {} steps", opts.max_steps),
                ));
            }
            if h_abs < min_step {
                let reason = if saw_non_finite {
                    "non-finite state encountered, step size underflow"
                } else {
                    "required step size is less than spacing between numbers"
                };
                return Err(Error::numerical(t, reason));
            }

            let t_new = (t + h_abs).min(t_end);
            let h = t_new - t;
            let (y_new, k) = rk.step(t, &y, &f, h);

            let mut err = [0.0; 3];
            for (s, ks) in k.iter().enumerate() {
                for d in 0..3 {
                    err[d] += h * E[s] * ks[d];
                }
            }
            let error_norm = rms_scaled(&err, &rk.scale(&y, &y_new));

            if all_finite(&y_new) && all_finite(&k[STAGES]) && error_norm < 1.0 {
                let mut factor = if error_norm == 0.0 {
                    MAX_FACTOR
                } else {
                    MAX_FACTOR.min(SAFETY * error_norm.powf(-1.0 / (ERROR_ORDER + 1.0)))
                };
                if step_rejected {
                    factor = factor.min(1.0);
                }

                segments.push(Segment {
                    t0: t,
                    h,
                    y0: y,
                    q: dense_coefficients(&k),
                });
                trace!(t = t_new, h, error_norm, "step accepted");

                h_abs = h * factor;
                t = t_new;
                y = y_new;
                f = k[STAGES];
                ts.push(t);
                states.push(y);
                break;
            }

            saw_non_finite |= !error_norm.is_finite();
            let factor = if error_norm.is_finite() {
                MIN_FACTOR.max(SAFETY * error_norm.powf(-1.0 / (ERROR_ORDER + 1.0)))
            } else {
                MIN_FACTOR
            };
            h_abs = h * factor;
            step_rejected = true;
            rejected += 1;
        }
    }

    let stats = IntegrationStats {
        steps: segments.len(),
        rejected,
        evaluations: rk.evaluations,
    };
    debug!(?stats, "integration finished");
    Ok(Trajectory::new(span, ts, states, segments, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lorenz::LorenzParams;

    struct Decay;
    impl VectorField for Decay {
        fn eval(&self, _t: f64, y: &State) -> State {
            [-y[0], -2.0 * y[1], 0.0]
        }
    }

    struct Forced;
    impl VectorField for Forced {
        fn eval(&self, t: f64, _y: &State) -> State {
            [t.cos(), -t.sin(), 1.0]
        }
    }

    struct Blowup;
    impl VectorField for Blowup {
        fn eval(&self, _t: f64, y: &State) -> State {
            [y[0] * y[0], 0.0, 0.0]
        }
    }

    struct Poisoned;
    impl VectorField for Poisoned {
        fn eval(&self, _t: f64, _y: &State) -> State {
            [f64::NAN, 0.0, 0.0]
        }
    }

    fn tight() -> SolverOptions {
        SolverOptions {
            rtol: 1e-9,
            atol: 1e-12,
            ..SolverOptions::default()
        }
    }

    #[test]
    fn dormand_prince_weights_are_consistent() {
        assert!((B.iter().sum::<f64>() - 1.0).abs() < 1e-14);
        assert!(E.iter().sum::<f64>().abs() < 1e-14);
        for (s, row) in A.iter().enumerate() {
            assert!((row.iter().sum::<f64>() - C[s]).abs() < 1e-14);
        }
        // the interpolant reproduces the 5th order weights at x = 1
        for (s, row) in P.iter().enumerate() {
            let b = if s < STAGES { B[s] } else { 0.0 };
            assert!((row.iter().sum::<f64>() - b).abs() < 1e-12);
        }
    }

    #[test]
    fn exponential_decay_at_steps_and_between() {
        let span = TimeSpan::new(0.0, 5.0).unwrap();
        let tr = integrate(&Decay, span, [1.0, 1.0, 3.0], &tight()).unwrap();

        let ts = tr.times();
        assert_eq!(ts[0], 0.0);
        assert_eq!(*ts.last().unwrap(), 5.0);
        for (t, s) in ts.iter().zip(tr.states()) {
            assert!((s[0] - (-t).exp()).abs() < 1e-8);
            assert!((s[1] - (-2.0 * t).exp()).abs() < 1e-8);
            assert_eq!(s[2], 3.0);
        }

        for i in 0..=97 {
            let t = 5.0 * i as f64 / 97.0;
            let y = tr.eval(t).unwrap();
            assert!((y[0] - (-t).exp()).abs() < 1e-7, "t={t} y={}", y[0]);
        }
    }

    #[test]
    fn non_autonomous_field() {
        let span = TimeSpan::new(0.0, 10.0).unwrap();
        let tr = integrate(&Forced, span, [0.0, 1.0, 0.0], &tight()).unwrap();
        for i in 0..=50 {
            let t = 0.2 * i as f64;
            let y = tr.eval(t).unwrap();
            assert!((y[0] - t.sin()).abs() < 1e-7);
            assert!((y[1] - t.cos()).abs() < 1e-7);
            assert!((y[2] - t).abs() < 1e-9);
        }
    }

    #[test]
    fn dense_output_is_continuous_across_steps() {
        let span = TimeSpan::new(0.0, 2.0).unwrap();
        let opts = SolverOptions::default();
        let tr = integrate(&LorenzParams::default(), span, [1.0, 1.0, 1.0], &opts).unwrap();
        let ts = tr.times();
        assert!(ts.len() > 3);
        for w in ts.windows(2) {
            assert!(w[0] < w[1]);
        }
        for (i, &t) in ts.iter().enumerate().skip(1).take(ts.len() - 2) {
            let at = tr.eval(t).unwrap();
            let eps = 1e-9 * (ts[i + 1] - t);
            let after = tr.eval(t + eps).unwrap();
            for d in 0..3 {
                assert!((at[d] - tr.states()[i][d]).abs() < 1e-8 * (1.0 + at[d].abs()));
                assert!((at[d] - after[d]).abs() < 1e-6 * (1.0 + at[d].abs()));
            }
        }
    }

    #[test]
    fn blowup_is_reported_not_truncated() {
        let span = TimeSpan::new(0.0, 2.0).unwrap();
        let err = integrate(&Blowup, span, [1.0, 0.0, 0.0], &SolverOptions::default()).unwrap_err();
        match err {
            Error::NumericalFailure { t, .. } => assert!(t < 1.0 + 1e-6, "failed at {t}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_finite_field_fails() {
        let span = TimeSpan::new(0.0, 1.0).unwrap();
        let err =
            integrate(&Poisoned, span, [1.0, 0.0, 0.0], &SolverOptions::default()).unwrap_err();
        assert!(matches!(err, Error::NumericalFailure { .. }));
    }

    #[test]
    fn step_budget_is_enforced() {
        let span = TimeSpan::new(0.0, 100.0).unwrap();
        let opts = SolverOptions {
            max_steps: 10,
            ..SolverOptions::default()
        };
        let err = integrate(&LorenzParams::default(), span, [1.0, 1.0, 1.0], &opts).unwrap_err();
        assert!(matches!(err, Error::NumericalFailure { .. }));
    }

    #[test]
    fn max_step_caps_every_step() {
        let span = TimeSpan::new(0.0, 3.0).unwrap();
        let opts = SolverOptions {
            max_step: Some(0.25),
            ..SolverOptions::default()
        };
        let tr = integrate(&Decay, span, [1.0, 1.0, 0.0], &opts).unwrap();
        for w in tr.times().windows(2) {
            assert!(w[1] - w[0] <= 0.25 + 1e-15);
        }
        assert!(tr.stats().steps >= 12);
    }

    #[test]
    fn bad_options_are_invalid_arguments() {
        let span = TimeSpan::new(0.0, 1.0).unwrap();
        let bad = [
            SolverOptions {
                rtol: 0.0,
                ..SolverOptions::default()
            },
            SolverOptions {
                atol: f64::NAN,
                ..SolverOptions::default()
            },
            SolverOptions {
                first_step: Some(2.0),
                ..SolverOptions::default()
            },
            SolverOptions {
                max_step: Some(-1.0),
                ..SolverOptions::default()
            },
        ];
        for opts in bad {
            assert!(matches!(
                integrate(&Decay, span, [1.0; 3], &opts),
                Err(Error::InvalidArgument(_))
            ));
        }
        assert!(matches!(
            integrate(&Decay, span, [f64::INFINITY, 0.0, 0.0], &SolverOptions::default()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn stats_count_work() {
        let span = TimeSpan::new(0.0, 100.0).unwrap();
        let opts = SolverOptions::default();
        let tr = integrate(&LorenzParams::default(), span, [1.0, 1.0, 1.0], &opts).unwrap();
        let st = tr.stats();
        assert_eq!(st.steps + 1, tr.times().len());
        // FSAL: six new evaluations per attempt plus two for the start
        assert_eq!(st.evaluations, 6 * (st.steps + st.rejected) + 2);
    }
}
