//! Configuration for the `stridelane` diagnostic binary.
//!
//! Read from an optional JSON file. Every field has a default, so an empty
//! object (or no file at all) is a valid configuration.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use stridelane::{EngineKind, LaneOf, Naive, Native, Record, Sizing, SuperSpeed};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "STRIDELANE_CONFIG";

/// Root of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend to request. Resolved against the hardware before use.
    pub backend: EngineKind,
    /// Probe the CPU. When false only the always-available backends run.
    pub honor_probe: bool,
    /// Layouts whose sizing is printed.
    pub layouts: Vec<Layout>,
    /// Projection self-check settings.
    pub self_check: SelfCheckConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: EngineKind::Default,
            honor_probe: true,
            layouts: Layout::ALL.to_vec(),
            self_check: SelfCheckConfig::default(),
        }
    }
}

/// Naive-vs-resolved projection comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfCheckConfig {
    pub enabled: bool,
    /// Triples projected. Must be a whole number of blocks on every backend.
    pub records: usize,
    /// Largest accepted relative difference.
    pub tolerance: f32,
}

impl Default for SelfCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            records: 1000,
            tolerance: 1e-5,
        }
    }
}

/// Built-in record layouts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Float3ToFloat3,
    Float3ToFloat2,
    Float2ToFloat2,
    Float5ToFloat5,
}

impl Layout {
    pub const ALL: [Layout; 4] = [
        Layout::Float3ToFloat3,
        Layout::Float3ToFloat2,
        Layout::Float2ToFloat2,
        Layout::Float5ToFloat5,
    ];

    /// Widths of this layout on `kind`.
    pub fn sizing(self, kind: EngineKind) -> Sizing {
        match self {
            Layout::Float3ToFloat3 => sizing_on::<[f32; 3], [f32; 3]>(kind),
            Layout::Float3ToFloat2 => sizing_on::<[f32; 3], [f32; 2]>(kind),
            Layout::Float2ToFloat2 => sizing_on::<[f32; 2], [f32; 2]>(kind),
            Layout::Float5ToFloat5 => sizing_on::<[f32; 5], [f32; 5]>(kind),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layout::Float3ToFloat3 => "float3 -> float3",
            Layout::Float3ToFloat2 => "float3 -> float2",
            Layout::Float2ToFloat2 => "float2 -> float2",
            Layout::Float5ToFloat5 => "float5 -> float5",
        };
        f.write_str(name)
    }
}

fn sizing_on<D1, D2>(kind: EngineKind) -> Sizing
where
    D1: Record<Elem = f32>,
    D2: Record<Elem = f32>,
{
    match kind {
        EngineKind::Naive => Sizing::of::<D1, D2, LaneOf<Naive, f32>, LaneOf<Naive, f32>>(),
        EngineKind::Default => Sizing::of::<D1, D2, LaneOf<Native, f32>, LaneOf<Native, f32>>(),
        EngineKind::SuperSpeed => {
            Sizing::of::<D1, D2, LaneOf<SuperSpeed, f32>, LaneOf<SuperSpeed, f32>>()
        }
    }
}

impl Config {
    /// Parses a JSON configuration.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("Failed to parse configuration JSON")
    }

    /// Reads a JSON configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Configuration file from `arg`, else from [`CONFIG_ENV`], else the
    /// defaults.
    pub fn resolve(arg: Option<String>) -> anyhow::Result<Self> {
        let path = arg
            .map(PathBuf::from)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        match path {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}
