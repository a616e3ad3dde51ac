use crate::logistic::LogisticParams;
use crate::lorenz::LorenzParams;
use crate::model::State;
use crate::solver::SolverOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) lorenz: LorenzParams,
    pub(crate) initial_state: State,
    pub(crate) t_span: (f64, f64),
    pub(crate) logistic: LogisticParams,
    pub(crate) samples: usize,
    /// 0 = x, 1 = y, 2 = z
    pub(crate) coordinate: i64,
    pub(crate) solver: SolverOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lorenz: LorenzParams::default(),
            initial_state: [1.0, 1.0, 1.0],
            t_span: (0.0, 100.0),
            logistic: LogisticParams::default(),
            samples: 1000,
            coordinate: 0,
            solver: SolverOptions::default(),
        }
    }
}

/// Command-line values that take precedence over the settings file.
#[derive(Clone, Debug, Default)]
pub(crate) struct Overrides {
    pub(crate) sigma: Option<f64>,
    pub(crate) rho: Option<f64>,
    pub(crate) beta: Option<f64>,
    pub(crate) r: Option<f64>,
    pub(crate) x0: Option<f64>,
    pub(crate) samples: Option<usize>,
    pub(crate) coordinate: Option<i64>,
    pub(crate) t_end: Option<f64>,
    pub(crate) rtol: Option<f64>,
    pub(crate) atol: Option<f64>,
}

impl Settings {
    pub(crate) fn apply(&mut self, o: &Overrides) {
        fn set<T: Copy>(slot: &mut T, v: Option<T>) {
            if let Some(v) = v {
                *slot = v;
            }
        }
        set(&mut self.lorenz.sigma, o.sigma);
        set(&mut self.lorenz.rho, o.rho);
        set(&mut self.lorenz.beta, o.beta);
        set(&mut self.logistic.r, o.r);
        set(&mut self.logistic.x0, o.x0);
        set(&mut self.samples, o.samples);
        set(&mut self.coordinate, o.coordinate);
        set(&mut self.t_span.1, o.t_end);
        set(&mut self.solver.rtol, o.rtol);
        set(&mut self.solver.atol, o.atol);
    }
}

pub(crate) fn load_settings(path: &Path) -> Result<Settings> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("could not read settings from {}", path.display()))?;
    let settings = serde_json::from_str::<Settings>(&s)
        .with_context(|| format!("malformed settings in {}", path.display()))?;
    Ok(settings)
}
