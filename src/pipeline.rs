use crate::config::Settings;
use crate::error::{Error, Result};
use crate::logistic::iterate_driven;
use crate::model::{Axis, TimeSpan};
use crate::sampling::sample;
use crate::solver::integrate;
use crate::trajectory::Trajectory;
use tracing::{debug, info};

/// Everything the renderer needs from one run.
#[derive(Clone, Debug)]
pub(crate) struct Artifacts {
    pub(crate) span: TimeSpan,
    pub(crate) axis: Axis,
    pub(crate) trajectory: Trajectory,
    pub(crate) samples: Vec<f64>,
    pub(crate) logistic: Vec<f64>,
}

pub(crate) fn run(settings: &Settings) -> Result<Artifacts> {
    let span = TimeSpan::new(settings.t_span.0, settings.t_span.1)?;
    let axis = Axis::try_from(settings.coordinate)?;
    if settings.samples == 0 {
        return Err(Error::invalid("sample count must be at least 1"));
    }
    let field = settings.lorenz;
    debug!(
        sigma = field.sigma,
        rho = field.rho,
        beta = field.beta,
        y0 = ?settings.initial_state,
        t0 = span.start(),
        t1 = span.end(),
        "lorenz parameters"
    );

    let trajectory = integrate(&field, span, settings.initial_state, &settings.solver)?;
    let stats = trajectory.stats();
    info!(
        steps = stats.steps,
        rejected = stats.rejected,
        evaluations = stats.evaluations,
        "trajectory integrated"
    );

    let samples = sample(&trajectory, span, axis, settings.samples)?;
    info!(n = samples.len(), axis = axis.name(), "trajectory sampled");

    debug!(r = settings.logistic.r, x0 = settings.logistic.x0, "logistic parameters");
    let logistic = iterate_driven(&samples, &settings.logistic);
    info!(len = logistic.len(), "logistic map iterated");

    Ok(Artifacts {
        span,
        axis,
        trajectory,
        samples,
        logistic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_run() {
        let a = run(&Settings::default()).unwrap();
        assert_eq!(a.axis, Axis::X);
        assert_eq!(a.samples.len(), 1000);
        assert_eq!(a.logistic.len(), 1001);
        assert_eq!(a.logistic[0], 0.5);
        assert!(a.samples.iter().all(|x| x.abs() < 50.0));
        for (s, l) in a.samples.iter().zip(&a.logistic[1..]) {
            assert_eq!(*l, 3.9 * s * (1.0 - s));
        }
        assert_eq!(a.trajectory.times()[0], 0.0);
        assert_eq!(*a.trajectory.times().last().unwrap(), 100.0);
    }

    #[test]
    fn other_axis_and_count() {
        let settings = Settings {
            coordinate: 2,
            samples: 7,
            t_span: (0.0, 10.0),
            ..Settings::default()
        };
        let a = run(&settings).unwrap();
        assert_eq!(a.samples.len(), 7);
        // z starts at the initial condition
        assert_eq!(a.samples[0], 1.0);
        assert!(a.samples.iter().all(|&z| z > -1.0 && z < 60.0));
    }

    #[test]
    fn bad_inputs_abort_before_integration() {
        let cases = [
            Settings {
                coordinate: 3,
                ..Settings::default()
            },
            Settings {
                coordinate: -1,
                ..Settings::default()
            },
            Settings {
                samples: 0,
                ..Settings::default()
            },
            Settings {
                t_span: (5.0, 5.0),
                ..Settings::default()
            },
        ];
        for s in cases {
            assert!(matches!(run(&s), Err(Error::InvalidArgument(_))), "{s:?}");
        }
    }

    #[test]
    fn solver_failure_surfaces() {
        let mut s = Settings::default();
        s.solver.max_steps = 5;
        assert!(matches!(run(&s), Err(Error::NumericalFailure { .. })));
    }
}
