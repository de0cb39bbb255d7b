//! Run-time backend selection.
//!
//! Backends are compile-time types, but which one a program may use depends
//! on the CPU it runs on. The probe result travels as an explicit
//! [`Capabilities`] value; [`EngineKind::resolve`] applies the fallback
//! mapping once and [`dispatch`] monomorphizes the caller's [`Kernel`] for
//! the chosen backend.

use crate::backend::{Engine, Naive, Native, SuperSpeed};
use crate::element::Record;
use crate::error::Result;
use crate::transform::Transformation;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the host CPU can run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Wide (256-bit, AVX2) registers are usable.
    pub wide: bool,
}

impl Capabilities {
    /// Probes the running CPU.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        let wide = std::is_x86_feature_detected!("avx2");
        #[cfg(not(target_arch = "x86_64"))]
        let wide = false;

        debug!("detected capabilities: wide={}", wide);
        Self { wide }
    }

    /// Only the guaranteed backends.
    pub const fn scalar() -> Self {
        Self { wide: false }
    }

    /// Overrides the wide-register probe.
    pub const fn with_wide(self, wide: bool) -> Self {
        Self { wide }
    }
}

/// Run-time name of a backend.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// [`Naive`]: one element per lane.
    Naive,
    /// [`Native`]: one 128-bit register per lane.
    #[default]
    Default,
    /// [`SuperSpeed`]: one 256-bit register per lane.
    SuperSpeed,
}

impl EngineKind {
    /// Every backend, narrowest first.
    pub const ALL: [EngineKind; 3] = [EngineKind::Naive, EngineKind::Default, EngineKind::SuperSpeed];

    /// Whether the host can run this backend.
    pub fn can_run(self, caps: &Capabilities) -> bool {
        match self {
            EngineKind::Naive | EngineKind::Default => true,
            EngineKind::SuperSpeed => caps.wide,
        }
    }

    /// Backend to use instead when this one cannot run.
    pub const fn fallback(self) -> EngineKind {
        match self {
            EngineKind::SuperSpeed => EngineKind::Default,
            other => other,
        }
    }

    /// This backend, or its fallback if the host cannot run it.
    pub fn resolve(self, caps: &Capabilities) -> EngineKind {
        let mut kind = self;
        while !kind.can_run(caps) {
            let next = kind.fallback();
            info!("{} backend unavailable, falling back to {}", kind, next);
            kind = next;
        }
        kind
    }

    /// Elements of `T` per lane.
    pub fn lanes<T>(self) -> usize
    where
        T: crate::element::Element,
        Naive: Engine<T>,
        Native: Engine<T>,
        SuperSpeed: Engine<T>,
    {
        use crate::backend::{Lane, LaneOf};
        match self {
            EngineKind::Naive => <LaneOf<Naive, T> as Lane>::LANES,
            EngineKind::Default => <LaneOf<Native, T> as Lane>::LANES,
            EngineKind::SuperSpeed => <LaneOf<SuperSpeed, T> as Lane>::LANES,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineKind::Naive => "naive",
            EngineKind::Default => "default",
            EngineKind::SuperSpeed => "superspeed",
        };
        f.write_str(name)
    }
}

/// A per-block computation generic over the backend.
///
/// Closures cannot be generic, so code that picks its backend at run time
/// implements this trait instead.
pub trait Kernel<D1: Record, D2: Record> {
    /// Value produced by a run.
    type Output;

    /// Runs over every block of `transformation`.
    fn run<E>(self, transformation: &mut Transformation<'_, D1, D2, E>) -> Self::Output
    where
        E: Engine<D1::Elem> + Engine<D2::Elem>;
}

/// Resolves `kind` against `caps` and runs `kernel` over `input -> output`
/// on that backend.
pub fn dispatch<D1, D2, K>(
    kind: EngineKind,
    caps: &Capabilities,
    input: &[D1],
    output: &mut [D2],
    kernel: K,
) -> Result<K::Output>
where
    D1: Record,
    D2: Record,
    K: Kernel<D1, D2>,
    Naive: Engine<D1::Elem> + Engine<D2::Elem>,
    Native: Engine<D1::Elem> + Engine<D2::Elem>,
    SuperSpeed: Engine<D1::Elem> + Engine<D2::Elem>,
{
    let resolved = kind.resolve(caps);
    debug!("dispatching {} records on {}", input.len(), resolved);
    Ok(match resolved {
        EngineKind::Naive => kernel.run(&mut Transformation::<D1, D2, Naive>::new(input, output)?),
        EngineKind::Default => kernel.run(&mut Transformation::<D1, D2, Native>::new(input, output)?),
        EngineKind::SuperSpeed => {
            kernel.run(&mut Transformation::<D1, D2, SuperSpeed>::new(input, output)?)
        }
    })
}
