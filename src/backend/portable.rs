//! Array-backed lanes.
//!
//! `Portable<T, 1>` is the naive backend: one element per "register". Wider
//! instantiations stand in for native registers on targets (or builds) where
//! the intrinsic lanes are not compiled in, and behave bit-for-bit like them.

use super::{Lane, LaneMask};
use crate::element::Element;
use core::ops::{Add, BitOr, Div, Mul, Sub};

/// `N` elements of `T` treated as one register.
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(transparent)]
pub struct Portable<T: Element, const N: usize>([T; N]);

impl<T: Element, const N: usize> Portable<T, N> {
    /// Wraps an array.
    #[inline(always)]
    pub fn new(lanes: [T; N]) -> Self {
        Self(lanes)
    }

    /// Returns the lanes as an array.
    #[inline(always)]
    pub fn to_array(self) -> [T; N] {
        self.0
    }

    #[inline(always)]
    fn zip(self, rhs: Self, f: impl Fn(T, T) -> T) -> Self {
        let mut out = self.0;
        for (o, r) in out.iter_mut().zip(rhs.0) {
            *o = f(*o, r);
        }
        Self(out)
    }
}

impl<T: Element, const N: usize> Default for Portable<T, N> {
    fn default() -> Self {
        Self([T::default(); N])
    }
}

impl<T: Element, const N: usize> Lane for Portable<T, N> {
    type Elem = T;
    type Pattern = [u8; N];
    type Mask = [bool; N];

    const LANES: usize = N;

    #[inline(always)]
    fn load(src: &[T]) -> Self {
        assert!(src.len() >= N, "load needs {} elements, got {}", N, src.len());
        let mut lanes = [T::default(); N];
        lanes.copy_from_slice(&src[..N]);
        Self(lanes)
    }

    #[inline(always)]
    fn store(self, dst: &mut [T]) {
        assert!(dst.len() >= N, "store needs {} elements, got {}", N, dst.len());
        dst[..N].copy_from_slice(&self.0);
    }

    #[inline(always)]
    fn vectorize(val: T) -> Self {
        Self([val; N])
    }

    fn compile_pattern(indices: &[u8]) -> [u8; N] {
        assert_eq!(indices.len(), N, "pattern must name every lane");
        let mut pattern = [0u8; N];
        for (p, &i) in pattern.iter_mut().zip(indices) {
            assert!((i as usize) < N, "lane index {} out of range", i);
            *p = i;
        }
        pattern
    }

    fn compile_mask(mask: LaneMask) -> [bool; N] {
        core::array::from_fn(|lane| mask.keeps(lane))
    }

    #[inline(always)]
    fn permute(self, pattern: &[u8; N]) -> Self {
        Self(core::array::from_fn(|lane| self.0[pattern[lane] as usize]))
    }

    #[inline(always)]
    fn keep(self, mask: &[bool; N]) -> Self {
        Self(core::array::from_fn(|lane| self.0[lane].keep_if(mask[lane])))
    }
}

impl<T: Element, const N: usize> Add for Portable<T, N> {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a + b)
    }
}

impl<T: Element, const N: usize> Sub for Portable<T, N> {
    type Output = Self;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a - b)
    }
}

impl<T: Element, const N: usize> Mul for Portable<T, N> {
    type Output = Self;
    #[inline(always)]
    fn mul(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a * b)
    }
}

impl<T: Element, const N: usize> Div for Portable<T, N> {
    type Output = Self;
    #[inline(always)]
    fn div(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a / b)
    }
}

impl<T: Element, const N: usize> BitOr for Portable<T, N> {
    type Output = Self;
    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self {
        self.zip(rhs, T::bit_or)
    }
}
