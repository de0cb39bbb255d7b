//! # stridelane
//!
//! SIMD gather/compute/scatter over arrays of packed fixed-size records.
//!
//! Records of `N` homogeneous scalars are stored back to back, so a
//! register loaded from the buffer mixes fields of neighbouring records.
//! A [`Transformation`] cuts an input and an output buffer into blocks,
//! gathers each field of a block into dense registers, lets the caller
//! compute on whole registers, and scatters the dense results back into
//! the interleaved output layout.
//!
//! **The engine type is the instruction selector.** [`Naive`] carries one
//! element per lane, [`Native`] one 128-bit register, [`SuperSpeed`] one
//! 256-bit register. Code that has to choose at run time goes through
//! [`select::dispatch`].
//!
//! ```
//! use stridelane::{Native, Transformation};
//!
//! let points = vec![[1.0f32, 2.0, 3.0]; 8];
//! let mut flat = vec![[0.0f32; 2]; 8];
//! Transformation::<_, _, Native>::new(&points, &mut flat)
//!     .unwrap()
//!     .for_each_block(|cursor| {
//!         let block = cursor.load();
//!         let [x, y, z] = cursor.gather_all(&block);
//!         let out = cursor.scatter([x / &z, y / z]);
//!         cursor.store(&out);
//!     });
//! assert_eq!(flat[5], [1.0 / 3.0, 2.0 / 3.0]);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

pub mod backend;
/// Scalar and record traits.
pub mod element;
/// Construction errors.
pub mod error;
pub mod pattern;
pub mod select;
pub mod sizing;
pub mod transform;
/// Fixed-width lane containers.
pub mod vector;

pub use backend::{Engine, Lane, LaneMask, LaneOf, Naive, Native, SuperSpeed};
pub use element::{Element, Record};
pub use error::{LayoutError, Result};
pub use select::{dispatch, Capabilities, EngineKind, Kernel};
pub use sizing::Sizing;
pub use transform::{Blocks, Cursor, FieldOrder, Transformation};
pub use vector::Vector;
