//! Record types and kernels shared by the integration tests.

#![allow(dead_code)]

use bytemuck::{Pod, Zeroable};
use stridelane::{Engine, Kernel, Record, Transformation};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Float2 {
    pub x: f32,
    pub y: f32,
}

impl Record for Float2 {
    type Elem = f32;
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Float3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Record for Float3 {
    type Elem = f32;
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Float5 {
    pub v: [f32; 5],
}

impl Record for Float5 {
    type Elem = f32;
}

/// `x = i`, `y = 100 + i`, `z = 1000 - i`.
pub fn triples(count: usize) -> Vec<Float3> {
    (0..count)
        .map(|i| {
            let i = i as f32;
            Float3 {
                x: i,
                y: 100.0 + i,
                z: 1000.0 - i,
            }
        })
        .collect()
}

/// Gathers every field and scatters it back unchanged.
pub struct Identity;

impl<T, const N: usize> Kernel<[T; N], [T; N]> for Identity
where
    T: stridelane::Element,
    [T; N]: Record<Elem = T>,
{
    type Output = ();

    fn run<E>(self, t: &mut Transformation<'_, [T; N], [T; N], E>)
    where
        E: Engine<T>,
    {
        t.for_each_block(|cursor| {
            let block = cursor.load();
            let fields: [_; N] = cursor.gather_all(&block);
            let out = cursor.scatter(fields);
            cursor.store(&out);
        });
    }
}

/// `(x, y, z) -> (x / z, y / z)`.
pub struct Project;

impl Kernel<Float3, Float2> for Project {
    type Output = ();

    fn run<E>(self, t: &mut Transformation<'_, Float3, Float2, E>)
    where
        E: Engine<f32>,
    {
        for mut cursor in t {
            let block = cursor.load();
            let [x, y, z] = cursor.gather_all(&block);
            let out = cursor.scatter([x / &z, y / z]);
            cursor.store(&out);
        }
    }
}

/// Largest relative difference between two projections.
pub fn max_relative_error(a: &[Float2], b: &[Float2]) -> f32 {
    a.iter()
        .zip(b)
        .flat_map(|(a, b)| [(a.x, b.x), (a.y, b.y)])
        .map(|(a, b)| (a - b).abs() / a.abs().max(1.0))
        .fold(0.0, f32::max)
}
