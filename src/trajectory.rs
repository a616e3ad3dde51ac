use crate::error::{Error, Result};
use crate::model::{Axis, State, TimeSpan};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct IntegrationStats {
    pub(crate) steps: usize,
    pub(crate) rejected: usize,
    pub(crate) evaluations: usize,
}

/// Local interpolant over one accepted step:
/// `y(t0 + x*h) = y0 + h * (q0*x + q1*x^2 + q2*x^3 + q3*x^4)` for `x` in `[0, 1]`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Segment {
    pub(crate) t0: f64,
    pub(crate) h: f64,
    pub(crate) y0: State,
    pub(crate) q: [State; 4],
}

impl Segment {
    fn eval(&self, t: f64) -> State {
        let x = (t - self.t0) / self.h;
        let mut out = self.y0;
        for (d, o) in out.iter_mut().enumerate() {
            let poly = self.q[0][d] + x * (self.q[1][d] + x * (self.q[2][d] + x * self.q[3][d]));
            *o += self.h * x * poly;
        }
        out
    }
}

/// Dense solution of an initial value problem over a `TimeSpan`.
///
/// Step points are kept for plotting; `eval` answers any time inside the span
/// through the per-step interpolants.
#[derive(Clone, Debug)]
pub(crate) struct Trajectory {
    span: TimeSpan,
    ts: Vec<f64>,
    states: Vec<State>,
    segments: Vec<Segment>,
    stats: IntegrationStats,
}

impl Trajectory {
    pub(crate) fn new(
        span: TimeSpan,
        ts: Vec<f64>,
        states: Vec<State>,
        segments: Vec<Segment>,
        stats: IntegrationStats,
    ) -> Self {
        debug_assert_eq!(ts.len(), states.len());
        debug_assert_eq!(ts.len(), segments.len() + 1);
        Self {
            span,
            ts,
            states,
            segments,
            stats,
        }
    }

    pub(crate) fn times(&self) -> &[f64] {
        &self.ts
    }

    pub(crate) fn states(&self) -> &[State] {
        &self.states
    }

    pub(crate) fn stats(&self) -> IntegrationStats {
        self.stats
    }

    /// One coordinate over all solver step points.
    pub(crate) fn axis_series(&self, axis: Axis) -> Vec<f64> {
        self.states.iter().map(|s| s[axis.index()]).collect()
    }

    pub(crate) fn eval(&self, t: f64) -> Result<State> {
        let (a, b) = (self.span.start(), self.span.end());
        let slack = 1e-12 * self.span.len();
        if !(t >= a - slack && t <= b + slack) {
            return Err(Error::invalid(format!(
                "query time {t} lies outside the solution span [{a}, {b}]"
            )));
        }
        let t = t.clamp(a, b);

        let Some(last) = self.segments.len().checked_sub(1) else {
            return Ok(self.states[0]);
        };
        // first step point >= t, minus one
        let i = self.ts.partition_point(|&s| s < t).saturating_sub(1).min(last);
        Ok(self.segments[i].eval(t))
    }
}
