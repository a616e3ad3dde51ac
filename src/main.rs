mod app;
mod config;
mod error;
mod input;
mod logistic;
mod lorenz;
mod model;
mod pipeline;
mod plot;
mod render;
mod sampling;
mod solver;
mod trajectory;

use anyhow::Result;

fn main() -> Result<()> {
    app::run()
}
