//! Fixed-width vectors built from several lane primitives.

use crate::backend::Lane;
use core::ops::{Add, Div, Mul, Sub};
use smallvec::SmallVec;

/// Lanes stored inline before spilling to the heap. Covers every block
/// width of records up to eight fields on the 128-bit backend.
const INLINE_LANES: usize = 8;

/// `K` lane primitives treated as one logical wide vector.
///
/// `K` is fixed when the vector is built (by a transformation's sizing) and
/// never changes; element-wise operations require equal widths and panic
/// otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct Vector<L: Lane> {
    lanes: SmallVec<[L; INLINE_LANES]>,
}

impl<L: Lane> Vector<L> {
    /// `k` all-zero lanes.
    pub fn zeroed(k: usize) -> Self {
        assert!(k >= 1, "a vector holds at least one lane");
        Self {
            lanes: smallvec::smallvec![L::default(); k],
        }
    }

    /// `k` lanes all holding `val`.
    pub fn splat(val: L::Elem, k: usize) -> Self {
        assert!(k >= 1, "a vector holds at least one lane");
        Self {
            lanes: smallvec::smallvec![L::vectorize(val); k],
        }
    }

    /// Builds a vector from the given lanes.
    pub fn from_lanes(lanes: impl IntoIterator<Item = L>) -> Self {
        let lanes: SmallVec<[L; INLINE_LANES]> = lanes.into_iter().collect();
        assert!(!lanes.is_empty(), "a vector holds at least one lane");
        Self { lanes }
    }

    /// Loads `k` consecutive registers from the front of `src`.
    pub fn load(src: &[L::Elem], k: usize) -> Self {
        assert!(k >= 1, "a vector holds at least one lane");
        Self::from_lanes(src.chunks_exact(L::LANES).take(k).map(L::load))
            .expect_width(k, "load")
    }

    /// Loads as many whole registers as `src` holds.
    pub fn from_slice(src: &[L::Elem]) -> Self {
        assert!(
            src.len() % L::LANES == 0,
            "slice of {} elements is not a whole number of {}-lane registers",
            src.len(),
            L::LANES
        );
        Self::load(src, src.len() / L::LANES)
    }

    /// Stores every lane, in order, to the front of `dst`.
    pub fn store(&self, dst: &mut [L::Elem]) {
        assert!(
            dst.len() >= self.elements(),
            "store needs {} elements, got {}",
            self.elements(),
            dst.len()
        );
        for (lane, chunk) in self.lanes.iter().zip(dst.chunks_exact_mut(L::LANES)) {
            lane.store(chunk);
        }
    }

    /// Number of lane primitives (`K`).
    #[inline]
    pub fn blocks(&self) -> usize {
        self.lanes.len()
    }

    /// Number of scalar elements held.
    #[inline]
    pub fn elements(&self) -> usize {
        self.lanes.len() * L::LANES
    }

    /// Lane `idx`.
    #[inline]
    pub fn fetch(&self, idx: usize) -> L {
        self.lanes[idx]
    }

    /// Replaces lane `idx`.
    #[inline]
    pub fn assign(&mut self, idx: usize, val: L) {
        self.lanes[idx] = val;
    }

    /// ORs `val` into lane `idx`.
    #[inline]
    pub fn merge(&mut self, idx: usize, val: L) {
        self.lanes[idx] = self.lanes[idx] | val;
    }

    /// Lanes `[start, start + count)` as a new vector.
    pub fn subset(&self, start: usize, count: usize) -> Self {
        Self::from_lanes(self.lanes[start..start + count].iter().copied())
    }

    /// Applies `f` to every lane.
    pub fn map(&self, f: impl Fn(L) -> L) -> Self {
        Self {
            lanes: self.lanes.iter().map(|&l| f(l)).collect(),
        }
    }

    /// Copies all elements out.
    pub fn to_vec(&self) -> Vec<L::Elem> {
        let mut out = vec![L::Elem::default(); self.elements()];
        self.store(&mut out);
        out
    }

    fn zip_with(&self, rhs: &Self, f: impl Fn(L, L) -> L) -> Self {
        assert_eq!(
            self.blocks(),
            rhs.blocks(),
            "vector widths differ: {} vs {} lanes",
            self.blocks(),
            rhs.blocks()
        );
        Self {
            lanes: self
                .lanes
                .iter()
                .zip(rhs.lanes.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    fn expect_width(self, k: usize, op: &str) -> Self {
        assert_eq!(self.blocks(), k, "{}: source too short for {} registers", op, k);
        self
    }
}

macro_rules! impl_vector_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl<L: Lane> $trait for Vector<L> {
            type Output = Vector<L>;
            #[inline]
            fn $method(self, rhs: Self) -> Vector<L> {
                self.zip_with(&rhs, |a, b| a $op b)
            }
        }

        impl<'a, L: Lane> $trait<&'a Vector<L>> for &'a Vector<L> {
            type Output = Vector<L>;
            #[inline]
            fn $method(self, rhs: &'a Vector<L>) -> Vector<L> {
                self.zip_with(rhs, |a, b| a $op b)
            }
        }

        impl<L: Lane> $trait<&Vector<L>> for Vector<L> {
            type Output = Vector<L>;
            #[inline]
            fn $method(self, rhs: &Vector<L>) -> Vector<L> {
                self.zip_with(rhs, |a, b| a $op b)
            }
        }
    };
}

impl_vector_op!(Add, add, +);
impl_vector_op!(Sub, sub, -);
impl_vector_op!(Mul, mul, *);
impl_vector_op!(Div, div, /);

// Scalar operands are broadcast to every lane first.
macro_rules! impl_scalar_op {
    ($ty:ty; $($trait:ident, $method:ident, $op:tt);*) => {
        $(
            impl<L: Lane<Elem = $ty>> $trait<$ty> for Vector<L> {
                type Output = Vector<L>;
                #[inline]
                fn $method(self, rhs: $ty) -> Vector<L> {
                    let rhs = L::vectorize(rhs);
                    self.map(|a| a $op rhs)
                }
            }
        )*
    };
}

macro_rules! impl_scalar_ops {
    ($($ty:ty),*) => {
        $(impl_scalar_op!($ty; Add, add, +; Sub, sub, -; Mul, mul, *; Div, div, /);)*
    };
}

impl_scalar_ops!(f32, f64, i32, u32);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Portable;

    type V4 = Vector<Portable<f32, 4>>;

    #[test]
    fn test_load_store_preserves_order() {
        let src: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let v = V4::load(&src, 3);
        assert_eq!(v.blocks(), 3);
        assert_eq!(v.to_vec(), src);
    }

    #[test]
    fn test_elementwise_ops_zip_lanes() {
        let a = V4::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let b = V4::splat(2.0, 2);

        assert_eq!((&a + &b).to_vec(), vec![3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        assert_eq!((&a * &b).to_vec(), vec![2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0]);
        assert_eq!((a.clone() - b.clone()).to_vec()[0], -1.0);
        assert_eq!((a / b).to_vec()[7], 4.0);
    }

    #[test]
    fn test_scalar_broadcast() {
        let a = V4::splat(3.0, 1);
        assert_eq!((a.clone() + 1.0f32).to_vec(), vec![4.0; 4]);
        assert_eq!((a * 0.5f32).to_vec(), vec![1.5; 4]);
    }

    #[test]
    fn test_assign_fetch_subset() {
        let mut v = V4::zeroed(3);
        v.assign(1, Portable::new([1.0, 2.0, 3.0, 4.0]));
        v.merge(2, Portable::new([0.0, 0.0, 9.0, 0.0]));
        assert_eq!(v.fetch(1).to_array(), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(v.subset(1, 2).to_vec(), vec![1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 9.0, 0.0]);
    }

    #[test]
    #[should_panic(expected = "vector widths differ")]
    fn test_mismatched_widths_panic() {
        let _ = V4::zeroed(1) + V4::zeroed(2);
    }

    #[test]
    #[should_panic(expected = "at least one lane")]
    fn test_empty_vector_rejected() {
        let _ = V4::zeroed(0);
    }
}
