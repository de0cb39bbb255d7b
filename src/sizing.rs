//! Block sizing.
//!
//! A block is the smallest run of records that ends on a record boundary,
//! a raw-register boundary and a dense per-field register boundary, on both
//! the input and the output side. Every width the iterator uses is derived
//! here once, from the record layouts and the lane widths.

use crate::backend::Lane;
use crate::element::{Element, Record};
use crate::error::{LayoutError, Result};
use core::fmt;

/// Greatest common divisor.
pub const fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Least common multiple. `lcm(0, x)` is 0.
pub const fn lcm(a: usize, b: usize) -> usize {
    if a == 0 || b == 0 {
        return 0;
    }
    a / gcd(a, b) * b
}

/// One side (input or output) of a transformation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Side {
    /// Element type name.
    pub elem: &'static str,
    /// Bytes per element.
    pub elem_bytes: usize,
    /// Scalars per record (the field stride).
    pub elements: usize,
    /// Elements per raw register.
    pub lanes: usize,
    /// Raw registers per block.
    pub width: usize,
    /// Dense registers per field per block.
    pub field_width: usize,
}

impl Side {
    /// `lcm(elements, lanes)`: scalars after which a record and a register
    /// boundary first coincide.
    pub const fn alignment(&self) -> usize {
        lcm(self.elements, self.lanes)
    }

    /// Bytes in one raw register.
    pub const fn register_bytes(&self) -> usize {
        self.lanes * self.elem_bytes
    }

    /// Bytes in one block.
    pub const fn width_bytes(&self) -> usize {
        self.width * self.register_bytes()
    }

    /// Bytes in one record.
    pub const fn record_bytes(&self) -> usize {
        self.elements * self.elem_bytes
    }
}

/// Derived widths of a `(T1, D1, T2, D2, engine)` configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Sizing {
    /// Input side.
    pub input: Side,
    /// Output side.
    pub output: Side,
    /// Records per block.
    pub records_per_block: usize,
}

impl Sizing {
    /// Computes the sizing from raw layout facts.
    ///
    /// A multiple of both lane counts fills whole dense registers on each
    /// side, and then whole raw registers too, since each record contributes
    /// a whole number of scalars.
    pub const fn new(
        input: (&'static str, usize, usize, usize),
        output: (&'static str, usize, usize, usize),
    ) -> Self {
        let (elem_in, bytes_in, elements_in, lanes_in) = input;
        let (elem_out, bytes_out, elements_out, lanes_out) = output;
        let records = lcm(lanes_in, lanes_out);
        Self {
            input: Side {
                elem: elem_in,
                elem_bytes: bytes_in,
                elements: elements_in,
                lanes: lanes_in,
                width: records * elements_in / lanes_in,
                field_width: records / lanes_in,
            },
            output: Side {
                elem: elem_out,
                elem_bytes: bytes_out,
                elements: elements_out,
                lanes: lanes_out,
                width: records * elements_out / lanes_out,
                field_width: records / lanes_out,
            },
            records_per_block: records,
        }
    }

    /// Sizing for records `D1 -> D2` carried in lanes `L1 -> L2`.
    pub const fn of<D1, D2, L1, L2>() -> Self
    where
        D1: Record,
        D2: Record,
        L1: Lane<Elem = D1::Elem>,
        L2: Lane<Elem = D2::Elem>,
    {
        Self::new(
            (
                <D1::Elem as Element>::NAME,
                core::mem::size_of::<D1::Elem>(),
                D1::ELEMENTS,
                L1::LANES,
            ),
            (
                <D2::Elem as Element>::NAME,
                core::mem::size_of::<D2::Elem>(),
                D2::ELEMENTS,
                L2::LANES,
            ),
        )
    }

    /// Elements in one dense gather register.
    pub const fn blocks_gather(&self) -> usize {
        self.input.lanes
    }

    /// Whole blocks in `records` records.
    pub fn total_blocks(&self, records: usize) -> Result<usize> {
        if records % self.records_per_block != 0 {
            return Err(LayoutError::Unaligned {
                records,
                block: self.records_per_block,
            });
        }
        Ok(records / self.records_per_block)
    }
}

impl fmt::Display for Sizing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (i, o) = (&self.input, &self.output);
        writeln!(f, "block: {} records", self.records_per_block)?;
        writeln!(
            f,
            "input:  {} x {} per record ({} bytes), {} registers of {} lanes ({} bytes), align {} elements",
            i.elem,
            i.elements,
            i.record_bytes(),
            i.width,
            i.lanes,
            i.width_bytes(),
            i.alignment()
        )?;
        writeln!(
            f,
            "gather: {} fields x {} registers of {} lanes ({} bytes per field)",
            i.elements,
            i.field_width,
            self.blocks_gather(),
            i.field_width * i.register_bytes()
        )?;
        write!(
            f,
            "output: {} x {} per record ({} bytes), {} registers of {} lanes ({} bytes), align {} elements",
            o.elem,
            o.elements,
            o.record_bytes(),
            o.width,
            o.lanes,
            o.width_bytes(),
            o.alignment()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizing(elements_in: usize, lanes_in: usize, elements_out: usize, lanes_out: usize) -> Sizing {
        Sizing::new(("f32", 4, elements_in, lanes_in), ("f32", 4, elements_out, lanes_out))
    }

    #[test]
    fn test_gcd_lcm() {
        assert_eq!(gcd(12, 8), 4);
        assert_eq!(gcd(7, 3), 1);
        assert_eq!(lcm(3, 4), 12);
        assert_eq!(lcm(2, 4), 4);
        assert_eq!(lcm(0, 4), 0);
    }

    #[test]
    fn test_float3_on_four_lanes() {
        let s = sizing(3, 4, 3, 4);
        assert_eq!(s.records_per_block, 4);
        assert_eq!(s.input.width, 3);
        assert_eq!(s.input.field_width, 1);
        assert_eq!(s.output.width, 3);
        assert_eq!(s.input.alignment(), 12);
        assert_eq!(s.input.width_bytes(), 48);
    }

    #[test]
    fn test_projection_three_to_two() {
        let s = sizing(3, 8, 2, 8);
        assert_eq!(s.records_per_block, 8);
        assert_eq!(s.input.width, 3);
        assert_eq!(s.output.width, 2);
        assert_eq!(s.output.field_width, 1);
    }

    #[test]
    fn test_mixed_lane_widths() {
        // f32 in 4 lanes, f64 in 2 lanes.
        let s = Sizing::new(("f32", 4, 3, 4), ("f64", 8, 3, 2));
        assert_eq!(s.records_per_block, 4);
        assert_eq!(s.input.field_width, 1);
        assert_eq!(s.output.field_width, 2);
        assert_eq!(s.output.width, 6);
        assert_eq!(s.input.width_bytes(), 48);
        assert_eq!(s.output.width_bytes(), 96);
    }

    #[test]
    fn test_sizing_invariant_over_configurations() {
        for elements_in in 1..=8 {
            for elements_out in 1..=8 {
                for &(lanes_in, lanes_out) in &[(1, 1), (4, 4), (8, 8), (4, 2), (8, 4)] {
                    let s = sizing(elements_in, lanes_in, elements_out, lanes_out);
                    for side in [&s.input, &s.output] {
                        assert_eq!(side.width_bytes() % side.record_bytes(), 0);
                        assert_eq!(side.width_bytes() % side.register_bytes(), 0);
                        assert_eq!(side.width * side.lanes, s.records_per_block * side.elements);
                        assert_eq!(side.field_width * side.lanes, s.records_per_block);
                    }
                }
            }
        }
    }

    #[test]
    fn test_total_blocks_rejects_partial_block() {
        let s = sizing(3, 4, 3, 4);
        assert_eq!(s.total_blocks(16).unwrap(), 4);
        assert!(matches!(
            s.total_blocks(10),
            Err(LayoutError::Unaligned { records: 10, block: 4 })
        ));
    }

    #[test]
    fn test_dump_names_every_stage() {
        let dump = sizing(3, 4, 2, 4).to_string();
        assert!(dump.contains("block: 4 records"));
        assert!(dump.contains("input:  f32 x 3"));
        assert!(dump.contains("gather: 3 fields x 1 registers"));
        assert!(dump.contains("output: f32 x 2"));
    }
}
