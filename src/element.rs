//! Scalar elements and the record layouts built from them.
//!
//! A record is a fixed-size aggregate of homogeneous scalar fields. The
//! engine never looks at field names: only the number of scalars in the
//! record and each field's ordinal position matter.

use bytemuck::Pod;
use core::fmt::Debug;
use core::ops::{Add, Div, Mul, Sub};

/// A scalar that can live in a vector lane.
///
/// Gather and scatter merge partial registers with a bitwise OR, so every
/// element exposes its bit pattern. The all-zero pattern must be the
/// element's `Default` value.
pub trait Element:
    Pod
    + Debug
    + Default
    + PartialEq
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + 'static
{
    /// Human-readable type name for diagnostics.
    const NAME: &'static str;

    /// Bitwise OR of the two bit patterns.
    fn bit_or(self, other: Self) -> Self;

    /// Returns `self` when `keep` is set, otherwise the all-zero pattern.
    #[inline(always)]
    fn keep_if(self, keep: bool) -> Self {
        if keep {
            self
        } else {
            Self::zeroed()
        }
    }
}

macro_rules! impl_element {
    ($ty:ty, $bits:ty) => {
        impl Element for $ty {
            const NAME: &'static str = stringify!($ty);

            #[inline(always)]
            fn bit_or(self, other: Self) -> Self {
                let bits = bytemuck::cast::<$ty, $bits>(self) | bytemuck::cast::<$ty, $bits>(other);
                bytemuck::cast::<$bits, $ty>(bits)
            }
        }
    };
}

impl_element!(f32, u32);
impl_element!(f64, u64);
impl_element!(i32, u32);
impl_element!(u32, u32);

/// A fixed-size record of `ELEMENTS` scalars of type `Elem`.
///
/// Any `#[repr(C)]` struct whose fields are all `Elem` qualifies; derive
/// `bytemuck::Pod` and `bytemuck::Zeroable` on it and name the element type:
///
/// ```
/// use bytemuck::{Pod, Zeroable};
/// use stridelane::Record;
///
/// #[repr(C)]
/// #[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
/// struct Float3 { x: f32, y: f32, z: f32 }
///
/// impl Record for Float3 {
///     type Elem = f32;
/// }
///
/// assert_eq!(Float3::ELEMENTS, 3);
/// ```
pub trait Record: Pod {
    /// Scalar type of every field.
    type Elem: Element;

    /// Number of scalars in one record (the field stride, `GAP`).
    const ELEMENTS: usize = core::mem::size_of::<Self>() / core::mem::size_of::<Self::Elem>();
}

impl<T: Element, const N: usize> Record for [T; N]
where
    [T; N]: Pod,
{
    type Elem = T;
}

/// Compile-time check that `D` is made of whole `D::Elem` scalars.
#[inline(always)]
pub(crate) const fn assert_homogeneous<D: Record>() {
    let record = core::mem::size_of::<D>();
    let elem = core::mem::size_of::<D::Elem>();
    assert!(
        record > 0 && record % elem == 0,
        "record size must be a whole, non-zero number of elements"
    );
}
