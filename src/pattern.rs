//! Gather/scatter pattern derivation.
//!
//! A field with offset `start` in records of `gap` scalars occupies the
//! positions `start, start + gap, start + 2*gap, ...` of a packed block. The
//! block is split into raw registers of `lanes` elements, the dense field
//! vector into dense registers of the same width. Walking the positions in
//! order produces *lines*: maximal runs of values that sit in one raw
//! register and land in one dense register.
//!
//! For line 1, `start = START`. Each line holds
//! `count = (lanes - 1 - start) / gap + 1` values (fewer if the dense
//! register or the field runs out first), lands at dense lane `index` (the
//! running count), and the next line starts at `(start + count * gap) % lanes`
//! in the raw register that position falls into.
//!
//! Gathering a line permutes raw lane `start + i*gap` to dense lane
//! `index + i` and masks everything else to zero; scatter is the same line
//! with source and destination swapped. Lines of one dense (or raw) register
//! cover disjoint lanes, so OR-ing their contributions assembles it.

use crate::backend::{Lane, LaneMask, MAX_LANES};
use crate::vector::Vector;
use log::trace;

/// One run of field values sharing a raw register and a dense register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Line {
    /// Raw register within the block.
    pub register: usize,
    /// First raw lane.
    pub start: usize,
    /// Number of values.
    pub count: usize,
    /// Dense register within the field vector.
    pub dense: usize,
    /// First dense lane.
    pub index: usize,
}

/// The strided walk of one field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Stride {
    /// Scalars per record.
    pub gap: usize,
    /// Field offset within the record.
    pub start: usize,
    /// Elements per register.
    pub lanes: usize,
}

impl Stride {
    /// Walk of field `start` in records of `gap` scalars over `lanes`-wide
    /// registers.
    pub fn new(gap: usize, start: usize, lanes: usize) -> Self {
        assert!(gap >= 1, "records hold at least one element");
        assert!(start < gap, "field offset {} outside a {}-element record", start, gap);
        assert!(
            (1..=MAX_LANES).contains(&lanes),
            "{} lanes per register is not supported",
            lanes
        );
        Self { gap, start, lanes }
    }

    /// Values that fit in one raw register from lane `start` on.
    #[inline]
    pub fn count_from(&self, start: usize) -> usize {
        (self.lanes - 1 - start) / self.gap + 1
    }

    /// Lines covering the first `values` occurrences of the field.
    pub fn lines(&self, values: usize) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut position = self.start;
        let mut taken = 0;
        while taken < values {
            let start = position % self.lanes;
            let index = taken % self.lanes;
            let count = self
                .count_from(start)
                .min(self.lanes - index)
                .min(values - taken);
            lines.push(Line {
                register: position / self.lanes,
                start,
                count,
                dense: taken / self.lanes,
                index,
            });
            position += count * self.gap;
            taken += count;
        }
        lines
    }

    /// Whether every line has the same start lane and count, i.e. a single
    /// pattern serves the whole walk. Holds whenever `gap` divides `lanes`.
    pub fn is_uniform(&self, values: usize) -> bool {
        let lines = self.lines(values);
        lines
            .windows(2)
            .all(|w| w[0].start == w[1].start && w[0].count == w[1].count)
    }
}

impl Line {
    /// Dense lanes this line fills.
    pub fn gather_mask(&self) -> LaneMask {
        LaneMask::range(self.index, self.count)
    }

    /// Raw lanes this line fills.
    pub fn scatter_mask(&self, gap: usize) -> LaneMask {
        LaneMask::strided(self.start, self.count, gap)
    }

    /// Dense lane `index + i` takes raw lane `start + i*gap`.
    pub fn gather_permutation(&self, gap: usize, lanes: usize) -> Vec<u8> {
        let mut perm = vec![0u8; lanes];
        for i in 0..self.count {
            perm[self.index + i] = (self.start + i * gap) as u8;
        }
        perm
    }

    /// Raw lane `start + i*gap` takes dense lane `index + i`.
    pub fn scatter_permutation(&self, gap: usize, lanes: usize) -> Vec<u8> {
        let mut perm = vec![0u8; lanes];
        for i in 0..self.count {
            perm[self.start + i * gap] = (self.index + i) as u8;
        }
        perm
    }
}

/// A line turned into lane-native controls.
#[derive(Copy, Clone, Debug)]
struct CompiledLine<L: Lane> {
    /// Register read from.
    from: usize,
    /// Register OR-ed into.
    into: usize,
    pattern: L::Pattern,
    mask: L::Mask,
    /// Full-register identity move: plain copy, no shuffle.
    direct: bool,
}

impl<L: Lane> CompiledLine<L> {
    fn new(from: usize, into: usize, perm: &[u8], mask: LaneMask) -> Self {
        let direct = mask == LaneMask::range(0, L::LANES)
            && perm.iter().enumerate().all(|(lane, &src)| lane == src as usize);
        Self {
            from,
            into,
            pattern: L::compile_pattern(perm),
            mask: L::compile_mask(mask),
            direct,
        }
    }

    #[inline(always)]
    fn apply(&self, src: &Vector<L>, dst: &mut Vector<L>) {
        let lane = src.fetch(self.from);
        if self.direct {
            dst.merge(self.into, lane);
        } else {
            dst.merge(self.into, lane.permute(&self.pattern).keep(&self.mask));
        }
    }
}

/// Extracts one field of a raw block into a dense vector.
#[derive(Clone, Debug)]
pub struct GatherPlan<L: Lane> {
    stride: Stride,
    raw_width: usize,
    dense_width: usize,
    lines: Vec<CompiledLine<L>>,
}

impl<L: Lane> GatherPlan<L> {
    /// Plan for field `start` of `gap`-element records, over blocks of
    /// `raw_width` registers.
    pub fn new(gap: usize, start: usize, raw_width: usize) -> Self {
        let stride = Stride::new(gap, start, L::LANES);
        let values = raw_width * L::LANES / gap;
        assert_eq!(
            values % L::LANES,
            0,
            "{} registers do not hold whole dense registers of field {}",
            raw_width,
            start
        );
        let walk = stride.lines(values);
        trace!("gather gap={} start={} lanes={}: {:?}", gap, start, L::LANES, walk);
        let lines = walk
            .iter()
            .map(|line| {
                CompiledLine::new(
                    line.register,
                    line.dense,
                    &line.gather_permutation(gap, L::LANES),
                    line.gather_mask(),
                )
            })
            .collect();
        Self {
            stride,
            raw_width,
            dense_width: values / L::LANES,
            lines,
        }
    }

    /// The walk this plan was built from.
    pub fn stride(&self) -> Stride {
        self.stride
    }

    /// Registers in the dense result.
    pub fn dense_width(&self) -> usize {
        self.dense_width
    }

    /// Number of lines (partial register moves) per block.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Dense vector of this field's values in `block`.
    pub fn gather(&self, block: &Vector<L>) -> Vector<L> {
        assert_eq!(
            block.blocks(),
            self.raw_width,
            "gather expects a {}-register block",
            self.raw_width
        );
        let mut dense = Vector::zeroed(self.dense_width);
        for line in &self.lines {
            line.apply(block, &mut dense);
        }
        dense
    }
}

/// Interleaves one dense field vector into a raw block.
#[derive(Clone, Debug)]
pub struct ScatterPlan<L: Lane> {
    stride: Stride,
    raw_width: usize,
    dense_width: usize,
    lines: Vec<CompiledLine<L>>,
}

impl<L: Lane> ScatterPlan<L> {
    /// Plan for field `start` of `gap`-element records, over blocks of
    /// `raw_width` registers.
    pub fn new(gap: usize, start: usize, raw_width: usize) -> Self {
        let stride = Stride::new(gap, start, L::LANES);
        let values = raw_width * L::LANES / gap;
        assert_eq!(
            values % L::LANES,
            0,
            "{} registers do not hold whole dense registers of field {}",
            raw_width,
            start
        );
        let walk = stride.lines(values);
        trace!("scatter gap={} start={} lanes={}: {:?}", gap, start, L::LANES, walk);
        let lines = walk
            .iter()
            .map(|line| {
                CompiledLine::new(
                    line.dense,
                    line.register,
                    &line.scatter_permutation(gap, L::LANES),
                    line.scatter_mask(gap),
                )
            })
            .collect();
        Self {
            stride,
            raw_width,
            dense_width: values / L::LANES,
            lines,
        }
    }

    /// The walk this plan was built from.
    pub fn stride(&self) -> Stride {
        self.stride
    }

    /// Registers in the dense input.
    pub fn dense_width(&self) -> usize {
        self.dense_width
    }

    /// ORs this field's values into `block`.
    ///
    /// `block` must be zero in every lane this field owns; scattering each
    /// field of a record once into a zeroed block fills it completely.
    pub fn scatter(&self, dense: &Vector<L>, block: &mut Vector<L>) {
        assert_eq!(
            dense.blocks(),
            self.dense_width,
            "scatter expects a {}-register field vector",
            self.dense_width
        );
        assert_eq!(
            block.blocks(),
            self.raw_width,
            "scatter expects a {}-register block",
            self.raw_width
        );
        for line in &self.lines {
            line.apply(dense, block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Portable;

    #[test]
    fn test_gap_three_on_four_lanes() {
        let lines = Stride::new(3, 0, 4).lines(4);
        assert_eq!(
            lines,
            vec![
                Line { register: 0, start: 0, count: 2, dense: 0, index: 0 },
                Line { register: 1, start: 2, count: 1, dense: 0, index: 2 },
                Line { register: 2, start: 1, count: 1, dense: 0, index: 3 },
            ]
        );
    }

    #[test]
    fn test_gap_wider_than_register_skips_registers() {
        // Positions 0, 5, 10, 15: one value per register, none in register 4.
        let lines = Stride::new(5, 0, 4).lines(4);
        let registers: Vec<usize> = lines.iter().map(|l| l.register).collect();
        let starts: Vec<usize> = lines.iter().map(|l| l.start).collect();
        assert_eq!(registers, vec![0, 1, 2, 3]);
        assert_eq!(starts, vec![0, 1, 2, 3]);

        let lines = Stride::new(5, 4, 4).lines(4);
        let registers: Vec<usize> = lines.iter().map(|l| l.register).collect();
        assert_eq!(registers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_dividing_gap_is_uniform() {
        for start in 0..2 {
            let stride = Stride::new(2, start, 4);
            assert!(stride.is_uniform(8));
            let lines = stride.lines(8);
            assert!(lines.iter().all(|l| l.start == start && l.count == 2));
        }
        assert!(Stride::new(4, 3, 8).is_uniform(16));
        assert!(!Stride::new(3, 0, 4).is_uniform(4));
    }

    #[test]
    fn test_lines_split_at_dense_register_boundary() {
        // gap 1: every raw register maps straight onto one dense register.
        let lines = Stride::new(1, 0, 4).lines(8);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], Line { register: 1, start: 0, count: 4, dense: 1, index: 0 });
    }

    #[test]
    fn test_permutations_are_inverse_on_masked_lanes() {
        let line = Line { register: 1, start: 2, count: 2, dense: 0, index: 1 };
        let g = line.gather_permutation(1, 4);
        let s = line.scatter_permutation(1, 4);
        assert_eq!(g, vec![0, 2, 3, 0]);
        assert_eq!(s, vec![0, 0, 1, 2]);
        assert_eq!(line.gather_mask(), LaneMask(0b0110));
        assert_eq!(line.scatter_mask(1), LaneMask(0b1100));
    }

    #[test]
    fn test_gather_plan_extracts_field() {
        type L = Portable<f32, 4>;
        let raw: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let block = Vector::<L>::from_slice(&raw);
        for field in 0..3 {
            let plan = GatherPlan::<L>::new(3, field, 3);
            let dense = plan.gather(&block).to_vec();
            let expected: Vec<f32> = (0..4).map(|k| (field + 3 * k) as f32).collect();
            assert_eq!(dense, expected, "field {}", field);
        }
    }

    #[test]
    fn test_scatter_plan_interleaves_fields() {
        type L = Portable<f32, 4>;
        let mut block = Vector::<L>::zeroed(3);
        for field in 0..3 {
            let plan = ScatterPlan::<L>::new(3, field, 3);
            let dense = Vector::<L>::from_slice(
                &(0..4).map(|k| (field + 3 * k) as f32).collect::<Vec<_>>(),
            );
            plan.scatter(&dense, &mut block);
        }
        let expected: Vec<f32> = (0..12).map(|i| i as f32).collect();
        assert_eq!(block.to_vec(), expected);
    }

    #[test]
    fn test_naive_plan_is_direct() {
        type L = Portable<u32, 1>;
        let plan = GatherPlan::<L>::new(3, 2, 3);
        assert_eq!(plan.line_count(), 1);
        assert!(plan.lines[0].direct);
        let block = Vector::<L>::from_slice(&[7, 8, 9]);
        assert_eq!(plan.gather(&block).to_vec(), vec![9]);
    }

    #[test]
    #[should_panic(expected = "gather expects a 3-register block")]
    fn test_gather_rejects_wrong_block_width() {
        type L = Portable<f32, 4>;
        GatherPlan::<L>::new(3, 0, 3).gather(&Vector::zeroed(2));
    }

    #[test]
    fn test_plans_report_their_walk_and_dense_width() {
        type L = Portable<f64, 2>;
        // 3 fields over 2 lanes: 2 raw registers per record pair, 6 for 4 records.
        let gather = GatherPlan::<L>::new(3, 1, 6);
        assert_eq!(gather.stride(), Stride::new(3, 1, 2));
        assert_eq!(gather.dense_width(), 2);

        let scatter = ScatterPlan::<L>::new(3, 2, 6);
        assert_eq!(scatter.stride(), Stride { gap: 3, start: 2, lanes: 2 });
        assert_eq!(scatter.dense_width(), gather.dense_width());
        let mut block = Vector::<L>::zeroed(6);
        scatter.scatter(&Vector::splat(1.5, scatter.dense_width()), &mut block);
        let written: Vec<usize> = block
            .to_vec()
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v == 1.5)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(written, vec![2, 5, 8, 11]);
    }
}
