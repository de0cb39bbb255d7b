// src/main.rs

//! `stridelane` diagnostic binary: prints the resolved backend and block
//! sizing, then checks the resolved backend against the naive one.

mod config;

use crate::config::{Config, SelfCheckConfig};
use anyhow::Context;
use log::{error, info};
use stridelane::{dispatch, Capabilities, Engine, EngineKind, Kernel, Transformation};

/// Perspective projection `(x, y, z) -> (x / z, y / z)`.
struct Project;

impl Kernel<[f32; 3], [f32; 2]> for Project {
    type Output = usize;

    fn run<E>(self, t: &mut Transformation<'_, [f32; 3], [f32; 2], E>) -> usize
    where
        E: Engine<f32>,
    {
        t.for_each_block(|cursor| {
            let block = cursor.load();
            let [x, y, z] = cursor.gather_all(&block);
            let out = cursor.scatter([x / &z, y / z]);
            cursor.store(&out);
        });
        t.len()
    }
}

fn sample_points(records: usize) -> Vec<[f32; 3]> {
    (0..records)
        .map(|i| {
            let i = i as f32;
            [i * 0.25 - 40.0, 3.0 - i * 0.125, 1.0 + (i % 17.0)]
        })
        .collect()
}

/// Largest relative difference between the naive and `kind` projections.
fn self_check(kind: EngineKind, caps: &Capabilities, check: &SelfCheckConfig) -> anyhow::Result<f32> {
    let points = sample_points(check.records);
    let mut reference = vec![[0.0f32; 2]; check.records];
    let mut candidate = vec![[0.0f32; 2]; check.records];

    dispatch(EngineKind::Naive, caps, &points, &mut reference, Project)
        .context("Naive projection failed")?;
    let blocks = dispatch(kind, caps, &points, &mut candidate, Project)
        .with_context(|| format!("{} projection failed", kind))?;
    info!("projected {} records in {} blocks on {}", check.records, blocks, kind);

    let worst = reference
        .iter()
        .flatten()
        .zip(candidate.iter().flatten())
        .map(|(a, b)| (a - b).abs() / a.abs().max(1.0))
        .fold(0.0f32, f32::max);
    Ok(worst)
}

/// Main entry point for the `stridelane` diagnostic.
fn main() -> anyhow::Result<()> {
    // Default filter is "info" if RUST_LOG is not set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let config = Config::resolve(std::env::args().nth(1)).context("Failed to load configuration")?;
    info!("Configuration loaded: {:?}", config);

    let caps = if config.honor_probe {
        Capabilities::detect()
    } else {
        Capabilities::scalar()
    };
    let kind = config.backend.resolve(&caps);
    println!("backend: {} (requested {}, wide={})", kind, config.backend, caps.wide);

    for layout in &config.layouts {
        println!();
        println!("[{}]", layout);
        println!("{}", layout.sizing(kind));
    }

    if !config.self_check.enabled {
        return Ok(());
    }

    let worst = self_check(kind, &caps, &config.self_check)?;
    println!();
    println!(
        "self-check: {} records, max relative difference {:e} (tolerance {:e})",
        config.self_check.records, worst, config.self_check.tolerance
    );
    if worst > config.self_check.tolerance {
        error!("{} backend disagrees with naive projection", kind);
        std::process::exit(1);
    }
    info!("self-check passed");
    Ok(())
}
