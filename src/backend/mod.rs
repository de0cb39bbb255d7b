//! Lane primitives and backend engines.
//!
//! A *lane* wraps exactly one hardware register's worth of elements (or a
//! single element for the naive backend). An *engine* is a zero-sized tag
//! that picks the lane type for each element type. Backends share no base
//! type; generic code is monomorphized per engine so register access stays
//! free of indirection.
//!
//! Implementations:
//! - [`portable`]: array-backed lanes, used by [`Naive`] and wherever a
//!   native lane is not compiled in.
//! - [`x86`]: SSSE3 and AVX2 `f32` lanes.

use crate::element::Element;
use core::fmt::Debug;
use core::ops::{Add, BitOr, Div, Mul, Sub};

pub mod portable;
#[cfg(target_arch = "x86_64")]
pub mod x86;

pub use portable::Portable;

/// Upper bound on lanes per register (a 512-bit register of 32-bit elements).
pub const MAX_LANES: usize = 16;

/// Lane-granular bitmask: bit `j` set keeps lane `j`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LaneMask(pub u32);

impl LaneMask {
    /// Mask keeping lanes `[first, first + count)`.
    #[inline]
    pub const fn range(first: usize, count: usize) -> Self {
        if count == 0 {
            return Self(0);
        }
        let ones = if count >= 32 { u32::MAX } else { (1u32 << count) - 1 };
        Self(ones << first)
    }

    /// Mask keeping `count` lanes starting at `first`, `step` lanes apart.
    #[inline]
    pub const fn strided(first: usize, count: usize, step: usize) -> Self {
        let mut bits = 0u32;
        let mut i = 0;
        while i < count {
            bits |= 1 << (first + i * step);
            i += 1;
        }
        Self(bits)
    }

    /// Whether lane `lane` is kept.
    #[inline]
    pub const fn keeps(self, lane: usize) -> bool {
        self.0 & (1 << lane) != 0
    }

    /// Number of kept lanes.
    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }
}

/// One register's worth of `Elem`.
///
/// All operations are total. Loads and stores panic when the slice holds
/// fewer than [`Lane::LANES`] elements.
pub trait Lane:
    Copy
    + Clone
    + Debug
    + Default
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + BitOr<Output = Self>
{
    /// Scalar type held in each lane.
    type Elem: Element;

    /// Lane-native form of a permutation, compiled once per plan line.
    type Pattern: Copy + Debug + Send + Sync;

    /// Lane-native form of a [`LaneMask`].
    type Mask: Copy + Debug + Send + Sync;

    /// Number of elements in one register.
    const LANES: usize;

    /// Loads `LANES` elements from the front of `src`.
    fn load(src: &[Self::Elem]) -> Self;

    /// Stores all lanes to the front of `dst`.
    fn store(self, dst: &mut [Self::Elem]);

    /// Broadcasts a scalar to every lane.
    fn vectorize(val: Self::Elem) -> Self;

    /// Compiles a permutation: output lane `j` takes input lane `indices[j]`.
    ///
    /// `indices` holds exactly `LANES` entries, each below `LANES`.
    fn compile_pattern(indices: &[u8]) -> Self::Pattern;

    /// Compiles a lane mask.
    fn compile_mask(mask: LaneMask) -> Self::Mask;

    /// Rearranges lanes according to a compiled pattern.
    fn permute(self, pattern: &Self::Pattern) -> Self;

    /// Zeroes every lane the mask does not keep.
    fn keep(self, mask: &Self::Mask) -> Self;
}

/// A backend tag choosing the lane type for element type `T`.
pub trait Engine<T: Element>: 'static + Copy + Clone + Send + Sync + Debug + Default {
    /// Lane primitive for `T` on this backend.
    type Lane: Lane<Elem = T>;
}

/// Lane type an engine uses for `T`.
pub type LaneOf<E, T> = <E as Engine<T>>::Lane;

/// Portable scalar fallback: one element per lane.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Naive;

/// One native 128-bit register per lane.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Native;

/// One wide 256-bit register per lane.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SuperSpeed;

impl<T: Element> Engine<T> for Naive {
    type Lane = Portable<T, 1>;
}

macro_rules! portable_engine {
    ($engine:ty, $ty:ty, $lanes:literal) => {
        impl Engine<$ty> for $engine {
            type Lane = Portable<$ty, $lanes>;
        }
    };
}

portable_engine!(Native, f64, 2);
portable_engine!(Native, i32, 4);
portable_engine!(Native, u32, 4);
portable_engine!(SuperSpeed, f64, 4);
portable_engine!(SuperSpeed, i32, 8);
portable_engine!(SuperSpeed, u32, 8);

#[cfg(all(target_arch = "x86_64", stridelane_ssse3))]
impl Engine<f32> for Native {
    type Lane = x86::F32x4;
}

#[cfg(not(all(target_arch = "x86_64", stridelane_ssse3)))]
portable_engine!(Native, f32, 4);

#[cfg(all(target_arch = "x86_64", stridelane_avx2))]
impl Engine<f32> for SuperSpeed {
    type Lane = x86::F32x8;
}

#[cfg(not(all(target_arch = "x86_64", stridelane_avx2)))]
portable_engine!(SuperSpeed, f32, 8);
