//! Run the simulation headless.

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use snake_race_runtime::prelude::*;
use tracing::info;

use crate::config::Config;
use crate::render::render_ascii;

/// Command-line overrides on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub ticks: Tick,
    pub agents: Option<usize>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub period_ms: Option<u64>,
    pub render: bool,
    pub json: bool,
}

impl RunOptions {
    pub fn apply(&self, config: &mut Config) {
        let sim = &mut config.simulation;
        if let Some(agents) = self.agents {
            sim.agents = agents;
        }
        if let Some(width) = self.width {
            sim.width = width;
        }
        if let Some(height) = self.height {
            sim.height = height;
        }
        if let Some(period) = self.period_ms {
            sim.tick_period_ms = period;
        }
    }
}

/// Final state of a race, as printed with `--json`.
#[derive(Debug, Serialize)]
pub struct RaceReport {
    pub stats: SimulationStats,
    pub frame: Frame,
}

pub async fn run(config: Config, options: RunOptions, verbose: bool) -> Result<()> {
    let json = options.json;
    let report = race(config, options, verbose).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_stats(&report.stats);
    }
    Ok(())
}

async fn race(mut config: Config, options: RunOptions, verbose: bool) -> Result<RaceReport> {
    options.apply(&mut config);
    let sim = Simulation::with_policies(
        config.simulation_config(),
        config.policy.move_policy(),
        config.policy.growth_policy(),
    )
    .context("Invalid simulation configuration")?;

    if !options.json {
        println!(
            "{} Racing {} snakes on {}x{} for {} ticks...",
            "→".blue(),
            sim.agents().len().to_string().cyan(),
            sim.grid().width(),
            sim.grid().height(),
            options.ticks.to_string().cyan()
        );
    }

    let pb = if options.render || options.json {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(options.ticks);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ticks")
                .context("Invalid progress template")?
                .progress_chars("#>-"),
        );
        pb
    };

    let mut frames = sim.subscribe_frames();
    sim.start();

    let mut last_tick = 0;
    loop {
        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
        let signal = *frames.borrow_and_update();
        let tick = match signal {
            ClockSignal::Tick(tick) => tick,
            ClockSignal::Halted => break,
            ClockSignal::Idle => continue,
        };
        last_tick = tick;

        if options.render {
            print!("\x1b[2J\x1b[H{}", render_ascii(&sim.frame()));
            println!("tick {}  alive {}", tick, sim.alive_count());
        }
        pb.set_position(tick.min(options.ticks));
        if verbose && tick % 10 == 0 {
            pb.println(format!("  tick {}: {} alive", tick, sim.alive_count()));
        }

        if tick >= options.ticks || sim.alive_count() == 0 {
            break;
        }
    }

    // Workers may still be a tick behind the last frame signal.
    sim.settle(last_tick.min(options.ticks)).await;
    // Read results only once the clock is no longer admitting ticks.
    sim.pause();
    pb.finish_and_clear();
    let report = RaceReport {
        stats: sim.stats(),
        frame: sim.frame(),
    };
    sim.shutdown().await;
    Ok(report)
}

fn print_stats(stats: &SimulationStats) {
    println!();
    println!(
        "{} Race finished after {} ticks",
        "✓".green().bold(),
        stats.settled
    );
    println!(
        "  Alive: {} / {}",
        stats.alive.to_string().green(),
        stats.total
    );
    if let Some(best) = stats.longest {
        println!(
            "  Longest:  {} ({} cells{})",
            best.id.to_string().cyan(),
            best.length.to_string().green(),
            if best.alive { "" } else { ", dead" }
        );
    }
    if let Some(worst) = stats.shortest {
        println!(
            "  Shortest: {} ({} cells{})",
            worst.id.to_string().cyan(),
            worst.length.to_string().yellow(),
            if worst.alive { "" } else { ", dead" }
        );
    }
}
