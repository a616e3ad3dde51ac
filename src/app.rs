use crate::config::{load_settings, Overrides, Settings};
use crate::input::{next_action, ViewerAction};
use crate::pipeline::{self, Artifacts};
use crate::plot::compose;
use crate::render::Terminal;
use anyhow::{Context, Result};
use clap::Parser;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Integrate the Lorenz system, drive a logistic map with one coordinate,
/// and plot both in the terminal.
#[derive(Parser, Debug)]
#[command(name = "lorenz-logistic", version)]
pub(crate) struct Args {
    /// JSON settings file; missing fields fall back to defaults
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    sigma: Option<f64>,
    #[arg(long)]
    rho: Option<f64>,
    #[arg(long)]
    beta: Option<f64>,

    /// logistic growth rate
    #[arg(long)]
    r: Option<f64>,
    /// logistic seed value
    #[arg(long)]
    x0: Option<f64>,

    /// number of uniform samples taken from the trajectory
    #[arg(long)]
    samples: Option<usize>,

    /// sampled coordinate: 0 = x, 1 = y, 2 = z
    #[arg(long, allow_negative_numbers = true)]
    coordinate: Option<i64>,

    /// end of the integration span
    #[arg(long)]
    t_end: Option<f64>,

    #[arg(long)]
    rtol: Option<f64>,
    #[arg(long)]
    atol: Option<f64>,

    /// print a text summary instead of opening the plot view
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// log filter, e.g. `debug` or `lorenz_logistic=trace` (default: RUST_LOG, else info)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            sigma: self.sigma,
            rho: self.rho,
            beta: self.beta,
            r: self.r,
            x0: self.x0,
            samples: self.samples,
            coordinate: self.coordinate,
            t_end: self.t_end,
            rtol: self.rtol,
            atol: self.atol,
        }
    }

    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => load_settings(path)?,
            None => Settings::default(),
        };
        settings.apply(&self.overrides());
        Ok(settings)
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(l) => EnvFilter::new(l),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn range(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

pub(crate) fn summary(art: &Artifacts) -> String {
    let st = art.trajectory.stats();
    let (s_lo, s_hi) = range(&art.samples);
    let (l_lo, l_hi) = range(&art.logistic);

    let mut out = String::new();
    let _ = writeln!(out, "span          [{}, {}]", art.span.start(), art.span.end());
    let _ = writeln!(
        out,
        "solver        {} steps, {} rejected, {} evaluations",
        st.steps, st.rejected, st.evaluations
    );
    let _ = writeln!(
        out,
        "samples       {} of {}, range [{:.4}, {:.4}]",
        art.samples.len(),
        art.axis.name(),
        s_lo,
        s_hi
    );
    let _ = writeln!(
        out,
        "logistic      {} values, range [{:.4}, {:.4}]",
        art.logistic.len(),
        l_lo,
        l_hi
    );
    if let Some([x, y, z]) = art.trajectory.states().last() {
        let _ = writeln!(out, "final state   ({x:.4}, {y:.4}, {z:.4})");
    }
    let head: Vec<String> = art.logistic.iter().take(6).map(|v| format!("{v:.6}")).collect();
    let _ = writeln!(out, "first values  {}", head.join(", "));
    out
}

fn show(art: &Artifacts) -> Result<()> {
    let mut term = Terminal::begin().context("could not enter the terminal plot view")?;
    let res = view_loop(&mut term, art);
    term.end()?;
    res
}

fn view_loop(term: &mut Terminal, art: &Artifacts) -> Result<()> {
    loop {
        compose(&mut term.cur, &mut term.canvas, art);
        term.present()?;
        match next_action()? {
            ViewerAction::Close => return Ok(()),
            ViewerAction::Resize(c, r) => term.resize(c, r),
        }
    }
}

pub(crate) fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    let settings = args.settings()?;
    let art = pipeline::run(&settings).context("run aborted")?;

    if args.headless {
        print!("{}", summary(&art));
        return Ok(());
    }
    show(&art)?;
    info!("viewer closed");
    Ok(())
}
