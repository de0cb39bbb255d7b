//! Block iteration over a pair of packed record buffers.
//!
//! A [`Transformation`] borrows an input buffer of `D1` records and an output
//! buffer of `D2` records and cuts both into blocks (see [`Sizing`]). Each
//! step of its iterator is a [`Cursor`] over one block pair:
//!
//! ```text
//! load -> gather (one dense vector per input field)
//!      -> caller computation
//!      -> scatter (one dense vector per output field) -> store
//! ```
//!
//! All gather/scatter patterns are compiled once, when the transformation is
//! built.

use crate::backend::{Engine, LaneOf};
use crate::element::{assert_homogeneous, Record};
use crate::error::{LayoutError, Result};
use crate::pattern::{GatherPlan, ScatterPlan};
use crate::sizing::Sizing;
use crate::vector::Vector;
use core::fmt;
use core::iter::FusedIterator;
use core::slice::{ChunksExact, ChunksExactMut};
use log::debug;

/// Lane type carrying the input records.
pub type InLane<E, D1> = LaneOf<E, <D1 as Record>::Elem>;
/// Lane type carrying the output records.
pub type OutLane<E, D2> = LaneOf<E, <D2 as Record>::Elem>;

/// How scatter arguments map onto output fields.
///
/// The legacy convention assembled variadic scatter arguments in reverse:
/// the last argument became field 0. `Forward` is the default here; use
/// `Reversed` to reproduce the old mapping.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FieldOrder {
    /// Argument `i` is field `i`.
    #[default]
    Forward,
    /// Argument `i` is field `N - 1 - i`.
    Reversed,
}

impl FieldOrder {
    /// Argument slot feeding `field` out of `fields`.
    #[inline]
    pub const fn slot(self, field: usize, fields: usize) -> usize {
        match self {
            FieldOrder::Forward => field,
            FieldOrder::Reversed => fields - 1 - field,
        }
    }
}

/// Compiled per-field plans and the sizing they were derived from.
struct Plans<D1, D2, E>
where
    D1: Record,
    D2: Record,
    E: Engine<D1::Elem> + Engine<D2::Elem>,
{
    sizing: Sizing,
    gather: Vec<GatherPlan<InLane<E, D1>>>,
    scatter: Vec<ScatterPlan<OutLane<E, D2>>>,
}

impl<D1, D2, E> Plans<D1, D2, E>
where
    D1: Record,
    D2: Record,
    E: Engine<D1::Elem> + Engine<D2::Elem>,
{
    fn compile() -> Self {
        let sizing = Sizing::of::<D1, D2, InLane<E, D1>, OutLane<E, D2>>();
        debug!("compiling {:?} plans\n{}", <E as Default>::default(), sizing);
        let gather = (0..D1::ELEMENTS)
            .map(|field| GatherPlan::new(D1::ELEMENTS, field, sizing.input.width))
            .collect();
        let scatter = (0..D2::ELEMENTS)
            .map(|field| ScatterPlan::new(D2::ELEMENTS, field, sizing.output.width))
            .collect();
        Self {
            sizing,
            gather,
            scatter,
        }
    }
}

/// A gather/compute/scatter pass from `D1` records to `D2` records on
/// backend `E`.
///
/// Borrows both buffers; it never owns their memory. The record count must
/// be a whole number of blocks.
pub struct Transformation<'a, D1, D2, E>
where
    D1: Record,
    D2: Record,
    E: Engine<D1::Elem> + Engine<D2::Elem>,
{
    input: &'a [D1::Elem],
    output: &'a mut [D2::Elem],
    records: usize,
    plans: Plans<D1, D2, E>,
}

impl<'a, D1, D2, E> Transformation<'a, D1, D2, E>
where
    D1: Record,
    D2: Record,
    E: Engine<D1::Elem> + Engine<D2::Elem>,
{
    /// Transforms every record of `input` into the matching record of
    /// `output`.
    pub fn new(input: &'a [D1], output: &'a mut [D2]) -> Result<Self> {
        Self::with_count(input, output, input.len())
    }

    /// Transforms the first `count` records.
    pub fn with_count(input: &'a [D1], output: &'a mut [D2], count: usize) -> Result<Self> {
        const {
            assert_homogeneous::<D1>();
            assert_homogeneous::<D2>();
        }
        if input.len() < count {
            return Err(LayoutError::InputTooShort {
                requested: count,
                available: input.len(),
            });
        }
        if output.len() < count {
            return Err(LayoutError::OutputTooShort {
                requested: count,
                available: output.len(),
            });
        }
        let plans = Plans::<D1, D2, E>::compile();
        plans.sizing.total_blocks(count)?;
        // Packed records may sit at addresses their elements cannot.
        let input = bytemuck::try_cast_slice(&input[..count]).map_err(|_| LayoutError::Misaligned {
            buffer: "input",
            align: core::mem::align_of::<D1::Elem>(),
        })?;
        let output =
            bytemuck::try_cast_slice_mut(&mut output[..count]).map_err(|_| LayoutError::Misaligned {
                buffer: "output",
                align: core::mem::align_of::<D2::Elem>(),
            })?;
        Ok(Self {
            input,
            output,
            records: count,
            plans,
        })
    }

    /// Derived widths.
    pub fn sizing(&self) -> &Sizing {
        &self.plans.sizing
    }

    /// Records covered.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Number of blocks, i.e. the end position of the iterator.
    pub fn len(&self) -> usize {
        self.records / self.plans.sizing.records_per_block
    }

    /// Whether there are no blocks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cursors over every block, in order.
    pub fn iter(&mut self) -> Blocks<'_, D1, D2, E> {
        let sizing = &self.plans.sizing;
        let in_chunk = sizing.input.width * sizing.input.lanes;
        let out_chunk = sizing.output.width * sizing.output.lanes;
        Blocks {
            input: self.input.chunks_exact(in_chunk),
            output: self.output.chunks_exact_mut(out_chunk),
            plans: &self.plans,
            index: 0,
        }
    }

    /// Runs `f` on every block.
    pub fn for_each_block(&mut self, mut f: impl FnMut(&mut Cursor<'_, D1, D2, E>)) {
        for mut cursor in self.iter() {
            f(&mut cursor);
        }
    }
}

impl<D1, D2, E> fmt::Debug for Transformation<'_, D1, D2, E>
where
    D1: Record,
    D2: Record,
    E: Engine<D1::Elem> + Engine<D2::Elem>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformation")
            .field("engine", &<E as Default>::default())
            .field("records", &self.records)
            .field("sizing", &self.plans.sizing)
            .finish()
    }
}

impl<'t, D1, D2, E> IntoIterator for &'t mut Transformation<'_, D1, D2, E>
where
    D1: Record,
    D2: Record,
    E: Engine<D1::Elem> + Engine<D2::Elem>,
{
    type Item = Cursor<'t, D1, D2, E>;
    type IntoIter = Blocks<'t, D1, D2, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Forward-only iterator over the blocks of a transformation.
pub struct Blocks<'t, D1, D2, E>
where
    D1: Record,
    D2: Record,
    E: Engine<D1::Elem> + Engine<D2::Elem>,
{
    input: ChunksExact<'t, D1::Elem>,
    output: ChunksExactMut<'t, D2::Elem>,
    plans: &'t Plans<D1, D2, E>,
    index: usize,
}

impl<'t, D1, D2, E> Iterator for Blocks<'t, D1, D2, E>
where
    D1: Record,
    D2: Record,
    E: Engine<D1::Elem> + Engine<D2::Elem>,
{
    type Item = Cursor<'t, D1, D2, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let input = self.input.next()?;
        let output = self.output.next()?;
        let cursor = Cursor {
            index: self.index,
            input,
            output,
            plans: self.plans,
        };
        self.index += 1;
        Some(cursor)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.input.size_hint()
    }
}

impl<D1, D2, E> ExactSizeIterator for Blocks<'_, D1, D2, E>
where
    D1: Record,
    D2: Record,
    E: Engine<D1::Elem> + Engine<D2::Elem>,
{
}

impl<D1, D2, E> FusedIterator for Blocks<'_, D1, D2, E>
where
    D1: Record,
    D2: Record,
    E: Engine<D1::Elem> + Engine<D2::Elem>,
{
}

/// Position of one block: loads it, gathers and scatters fields, stores the
/// result. Holds no data of its own beyond the borrowed block slices.
pub struct Cursor<'t, D1, D2, E>
where
    D1: Record,
    D2: Record,
    E: Engine<D1::Elem> + Engine<D2::Elem>,
{
    index: usize,
    input: &'t [D1::Elem],
    output: &'t mut [D2::Elem],
    plans: &'t Plans<D1, D2, E>,
}

impl<D1, D2, E> Cursor<'_, D1, D2, E>
where
    D1: Record,
    D2: Record,
    E: Engine<D1::Elem> + Engine<D2::Elem>,
{
    /// Block number.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Reads the raw input block.
    #[inline]
    pub fn load(&self) -> Vector<InLane<E, D1>> {
        Vector::load(self.input, self.plans.sizing.input.width)
    }

    /// Dense vector of input field `FIELD`.
    #[inline]
    pub fn gather<const FIELD: usize>(&self, block: &Vector<InLane<E, D1>>) -> Vector<InLane<E, D1>> {
        const { assert!(FIELD < D1::ELEMENTS, "field index out of range for the input record") };
        self.plans.gather[FIELD].gather(block)
    }

    /// Dense vector of input field `field`, chosen at run time.
    pub fn gather_field(
        &self,
        field: usize,
        block: &Vector<InLane<E, D1>>,
    ) -> Result<Vector<InLane<E, D1>>> {
        let plan = self.plans.gather.get(field).ok_or(LayoutError::FieldOutOfRange {
            field,
            elements: D1::ELEMENTS,
        })?;
        Ok(plan.gather(block))
    }

    /// Dense vectors of every input field, field 0 first.
    pub fn gather_all<const N: usize>(&self, block: &Vector<InLane<E, D1>>) -> [Vector<InLane<E, D1>>; N] {
        const { assert!(N == D1::ELEMENTS, "gather_all yields exactly one vector per input field") };
        core::array::from_fn(|field| self.plans.gather[field].gather(block))
    }

    /// Interleaves one dense vector per output field into a raw output
    /// block. `fields[i]` becomes field `i`.
    #[inline]
    pub fn scatter<const N: usize>(&self, fields: [Vector<OutLane<E, D2>>; N]) -> Vector<OutLane<E, D2>> {
        self.scatter_ordered(FieldOrder::Forward, fields)
    }

    /// Like [`Cursor::scatter`] with an explicit argument-to-field mapping.
    pub fn scatter_ordered<const N: usize>(
        &self,
        order: FieldOrder,
        fields: [Vector<OutLane<E, D2>>; N],
    ) -> Vector<OutLane<E, D2>> {
        const { assert!(N == D2::ELEMENTS, "scatter takes exactly one vector per output field") };
        let mut block = Vector::zeroed(self.plans.sizing.output.width);
        for (field, plan) in self.plans.scatter.iter().enumerate() {
            plan.scatter(&fields[order.slot(field, N)], &mut block);
        }
        block
    }

    /// Writes a raw output block.
    #[inline]
    pub fn store(&mut self, block: &Vector<OutLane<E, D2>>) {
        assert_eq!(
            block.blocks(),
            self.plans.sizing.output.width,
            "store expects a {}-register block",
            self.plans.sizing.output.width
        );
        block.store(self.output);
    }
}

impl<D1, D2, E> PartialEq for Cursor<'_, D1, D2, E>
where
    D1: Record,
    D2: Record,
    E: Engine<D1::Elem> + Engine<D2::Elem>,
{
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<D1, D2, E> fmt::Debug for Cursor<'_, D1, D2, E>
where
    D1: Record,
    D2: Record,
    E: Engine<D1::Elem> + Engine<D2::Elem>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor").field("index", &self.index).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Naive, Native};

    #[test]
    fn test_field_order_slots() {
        assert_eq!(FieldOrder::Forward.slot(0, 3), 0);
        assert_eq!(FieldOrder::Reversed.slot(0, 3), 2);
        assert_eq!(FieldOrder::Reversed.slot(2, 3), 0);
    }

    #[test]
    fn test_iterator_len_matches_blocks() {
        let input = vec![[0.0f32; 3]; 16];
        let mut output = vec![[0.0f32; 3]; 16];
        let mut t = Transformation::<_, _, Native>::new(&input, &mut output).unwrap();
        assert_eq!(t.len(), 4);
        let indices: Vec<usize> = t.iter().map(|c| c.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_rejects_partial_block() {
        let input = vec![[0.0f32; 3]; 6];
        let mut output = vec![[0.0f32; 3]; 6];
        let err = Transformation::<_, _, Native>::new(&input, &mut output).unwrap_err();
        assert_eq!(err, LayoutError::Unaligned { records: 6, block: 4 });
    }

    #[test]
    fn test_rejects_short_buffers() {
        let input = vec![[0.0f32; 2]; 4];
        let mut output = vec![[0.0f32; 2]; 2];
        let err = Transformation::<_, _, Naive>::new(&input, &mut output).unwrap_err();
        assert_eq!(err, LayoutError::OutputTooShort { requested: 4, available: 2 });

        let err = Transformation::<_, _, Naive>::with_count(&input, &mut output, 8).unwrap_err();
        assert_eq!(err, LayoutError::InputTooShort { requested: 8, available: 4 });
    }

    #[test]
    fn test_cursor_equality_is_index_equality() {
        let input = vec![[1u32; 2]; 8];
        let mut output = vec![[0u32; 2]; 8];
        let mut t = Transformation::<_, _, Naive>::new(&input, &mut output).unwrap();
        let cursors: Vec<_> = t.iter().collect();
        assert_eq!(cursors.len(), 8);
        assert_eq!(cursors[3], cursors[3]);
        assert_ne!(cursors[3], cursors[4]);
    }

    #[repr(C, packed)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Packed3 {
        x: f32,
        y: f32,
        z: f32,
    }

    impl Record for Packed3 {
        type Elem = f32;
    }

    #[test]
    fn test_rejects_misaligned_packed_records() {
        let backing = vec![0.0f32; 3 * 4 + 1];
        let bytes: &[u8] = bytemuck::cast_slice(&backing);
        // One byte past an f32 boundary.
        let input: &[Packed3] = bytemuck::cast_slice(&bytes[1..1 + 12 * 4]);
        assert_eq!(input.len(), 4);
        let mut output = vec![[0.0f32; 3]; 4];
        let err = Transformation::<_, _, Naive>::new(input, &mut output).unwrap_err();
        assert_eq!(err, LayoutError::Misaligned { buffer: "input", align: 4 });
        assert_eq!(err.to_string(), "input buffer is not aligned to its 4-byte elements");

        let mut out_backing = vec![0.0f32; 3 * 4 + 1];
        let out_bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut out_backing);
        let misaligned_out: &mut [Packed3] = bytemuck::cast_slice_mut(&mut out_bytes[1..1 + 12 * 4]);
        let aligned_in = vec![[1.0f32; 3]; 4];
        let err = Transformation::<_, _, Native>::new(&aligned_in, misaligned_out).unwrap_err();
        assert_eq!(err, LayoutError::Misaligned { buffer: "output", align: 4 });
    }

    #[test]
    fn test_aligned_packed_records_transform() {
        let backing: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let input: &[Packed3] = bytemuck::cast_slice(&backing);
        let mut output = vec![[0.0f32; 3]; 4];
        Transformation::<_, _, Native>::new(input, &mut output)
            .unwrap()
            .for_each_block(|cursor| {
                let block = cursor.load();
                let fields: [_; 3] = cursor.gather_all(&block);
                let out = cursor.scatter(fields);
                cursor.store(&out);
            });
        assert_eq!(bytemuck::cast_slice::<[f32; 3], f32>(&output), &backing[..]);
    }

    #[test]
    fn test_gather_field_out_of_range() {
        let input = vec![[0.0f32; 3]; 4];
        let mut output = vec![[0.0f32; 3]; 4];
        let mut t = Transformation::<_, _, Native>::new(&input, &mut output).unwrap();
        let cursor = t.iter().next().unwrap();
        let block = cursor.load();
        assert_eq!(
            cursor.gather_field(3, &block).unwrap_err(),
            LayoutError::FieldOutOfRange { field: 3, elements: 3 }
        );
        assert!(cursor.gather_field(2, &block).is_ok());
    }
}
