use crate::model::State;
use serde::{Deserialize, Serialize};

/// Right-hand side of an autonomous or time-dependent ODE system.
pub(crate) trait VectorField {
    fn eval(&self, t: f64, y: &State) -> State;
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct LorenzParams {
    pub(crate) sigma: f64,
    pub(crate) rho: f64,
    pub(crate) beta: f64,
}

impl Default for LorenzParams {
    fn default() -> Self {
        Self {
            sigma: 10.0,
            rho: 28.0,
            beta: 8.0 / 3.0,
        }
    }
}

impl LorenzParams {
    #[cfg(test)]
    pub(crate) fn new(sigma: f64, rho: f64, beta: f64) -> Self {
        Self { sigma, rho, beta }
    }
}

impl VectorField for LorenzParams {
    // autonomous: t is unused
    fn eval(&self, _t: f64, y: &State) -> State {
        let [x, y, z] = *y;
        [
            self.sigma * (y - x),
            x * (self.rho - z) - y,
            x * y - self.beta * z,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn matches_closed_form() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let p = LorenzParams::new(
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-5.0..5.0),
            );
            let s = [
                rng.gen_range(-30.0..30.0),
                rng.gen_range(-30.0..30.0),
                rng.gen_range(0.0..60.0),
            ];
            let t = rng.gen_range(0.0..100.0);
            let d = p.eval(t, &s);
            assert!(close(d[0], p.sigma * (s[1] - s[0])));
            assert!(close(d[1], s[0] * (p.rho - s[2]) - s[1]));
            assert!(close(d[2], s[0] * s[1] - p.beta * s[2]));
        }
    }

    #[test]
    fn origin_is_fixed_point() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let p = LorenzParams::new(
                rng.gen_range(-100.0..100.0),
                rng.gen_range(-100.0..100.0),
                rng.gen_range(-100.0..100.0),
            );
            assert_eq!(p.eval(rng.gen_range(-1e3..1e3), &[0.0; 3]), [0.0; 3]);
        }
    }

    #[test]
    fn time_does_not_matter() {
        let p = LorenzParams::new(10.0, 28.0, 2.0);
        let s = [1.0, 2.0, 3.0];
        assert_eq!(p.eval(0.0, &s), p.eval(42.5, &s));
        assert_eq!(p.eval(0.0, &s), [10.0, 23.0, -4.0]);
    }
}
