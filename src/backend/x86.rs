//! x86_64 lanes.
//!
//! `F32x4` needs SSSE3 for its byte shuffle, `F32x8` needs AVX2 for the
//! cross-lane permute. Each is compiled in only when `build.rs` found the
//! feature on the build host; the engines fall back to portable lanes
//! otherwise.

#[cfg(any(stridelane_ssse3, stridelane_avx2))]
use super::{Lane, LaneMask};
#[cfg(any(stridelane_ssse3, stridelane_avx2))]
use core::arch::x86_64::*;
#[cfg(any(stridelane_ssse3, stridelane_avx2))]
use core::fmt::{Debug, Formatter};
#[cfg(any(stridelane_ssse3, stridelane_avx2))]
use core::ops::{Add, BitOr, Div, Mul, Sub};

/// All-ones for a kept lane, zero otherwise.
#[cfg(any(stridelane_ssse3, stridelane_avx2))]
#[inline(always)]
fn lane_bits(mask: LaneMask, lane: usize) -> i32 {
    if mask.keeps(lane) {
        -1
    } else {
        0
    }
}

// ============================================================================
// SSSE3: 4 x f32
// ============================================================================

/// 4-lane f32 register.
#[cfg(stridelane_ssse3)]
#[derive(Copy, Clone)]
#[repr(transparent)]
pub struct F32x4(__m128);

#[cfg(stridelane_ssse3)]
impl Default for F32x4 {
    fn default() -> Self {
        unsafe { Self(_mm_setzero_ps()) }
    }
}

#[cfg(stridelane_ssse3)]
impl Debug for F32x4 {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "F32x4({:?})", self.to_array())
    }
}

#[cfg(stridelane_ssse3)]
impl F32x4 {
    /// Copies the lanes out.
    #[inline(always)]
    pub fn to_array(self) -> [f32; 4] {
        let mut arr = [0.0f32; 4];
        unsafe { _mm_storeu_ps(arr.as_mut_ptr(), self.0) };
        arr
    }
}

#[cfg(stridelane_ssse3)]
impl Lane for F32x4 {
    type Elem = f32;
    /// Byte-shuffle control for `pshufb`.
    type Pattern = __m128i;
    type Mask = __m128;

    const LANES: usize = 4;

    #[inline(always)]
    fn load(src: &[f32]) -> Self {
        assert!(src.len() >= Self::LANES, "load needs 4 elements, got {}", src.len());
        unsafe { Self(_mm_loadu_ps(src.as_ptr())) }
    }

    #[inline(always)]
    fn store(self, dst: &mut [f32]) {
        assert!(dst.len() >= Self::LANES, "store needs 4 elements, got {}", dst.len());
        unsafe { _mm_storeu_ps(dst.as_mut_ptr(), self.0) }
    }

    #[inline(always)]
    fn vectorize(val: f32) -> Self {
        unsafe { Self(_mm_set1_ps(val)) }
    }

    fn compile_pattern(indices: &[u8]) -> __m128i {
        assert_eq!(indices.len(), Self::LANES, "pattern must name every lane");
        let mut control = [0i8; 16];
        for (lane, &src) in indices.iter().enumerate() {
            assert!(src < 4, "lane index {} out of range", src);
            for byte in 0..4 {
                control[lane * 4 + byte] = (src * 4 + byte as u8) as i8;
            }
        }
        unsafe { _mm_loadu_si128(control.as_ptr() as *const __m128i) }
    }

    fn compile_mask(mask: LaneMask) -> __m128 {
        unsafe {
            _mm_castsi128_ps(_mm_setr_epi32(
                lane_bits(mask, 0),
                lane_bits(mask, 1),
                lane_bits(mask, 2),
                lane_bits(mask, 3),
            ))
        }
    }

    #[inline(always)]
    fn permute(self, pattern: &__m128i) -> Self {
        unsafe { Self(_mm_castsi128_ps(_mm_shuffle_epi8(_mm_castps_si128(self.0), *pattern))) }
    }

    #[inline(always)]
    fn keep(self, mask: &__m128) -> Self {
        unsafe { Self(_mm_and_ps(self.0, *mask)) }
    }
}

#[cfg(stridelane_ssse3)]
impl Add for F32x4 {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        unsafe { Self(_mm_add_ps(self.0, rhs.0)) }
    }
}

#[cfg(stridelane_ssse3)]
impl Sub for F32x4 {
    type Output = Self;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self {
        unsafe { Self(_mm_sub_ps(self.0, rhs.0)) }
    }
}

#[cfg(stridelane_ssse3)]
impl Mul for F32x4 {
    type Output = Self;
    #[inline(always)]
    fn mul(self, rhs: Self) -> Self {
        unsafe { Self(_mm_mul_ps(self.0, rhs.0)) }
    }
}

#[cfg(stridelane_ssse3)]
impl Div for F32x4 {
    type Output = Self;
    #[inline(always)]
    fn div(self, rhs: Self) -> Self {
        unsafe { Self(_mm_div_ps(self.0, rhs.0)) }
    }
}

#[cfg(stridelane_ssse3)]
impl BitOr for F32x4 {
    type Output = Self;
    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self {
        unsafe { Self(_mm_or_ps(self.0, rhs.0)) }
    }
}

// ============================================================================
// AVX2: 8 x f32
// ============================================================================

/// 8-lane f32 register.
#[cfg(stridelane_avx2)]
#[derive(Copy, Clone)]
#[repr(transparent)]
pub struct F32x8(__m256);

#[cfg(stridelane_avx2)]
impl Default for F32x8 {
    fn default() -> Self {
        unsafe { Self(_mm256_setzero_ps()) }
    }
}

#[cfg(stridelane_avx2)]
impl Debug for F32x8 {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "F32x8({:?})", self.to_array())
    }
}

#[cfg(stridelane_avx2)]
impl F32x8 {
    /// Copies the lanes out.
    #[inline(always)]
    pub fn to_array(self) -> [f32; 8] {
        let mut arr = [0.0f32; 8];
        unsafe { _mm256_storeu_ps(arr.as_mut_ptr(), self.0) };
        arr
    }
}

#[cfg(stridelane_avx2)]
impl Lane for F32x8 {
    type Elem = f32;
    /// Lane indices for `vpermps`.
    type Pattern = __m256i;
    type Mask = __m256;

    const LANES: usize = 8;

    #[inline(always)]
    fn load(src: &[f32]) -> Self {
        assert!(src.len() >= Self::LANES, "load needs 8 elements, got {}", src.len());
        unsafe { Self(_mm256_loadu_ps(src.as_ptr())) }
    }

    #[inline(always)]
    fn store(self, dst: &mut [f32]) {
        assert!(dst.len() >= Self::LANES, "store needs 8 elements, got {}", dst.len());
        unsafe { _mm256_storeu_ps(dst.as_mut_ptr(), self.0) }
    }

    #[inline(always)]
    fn vectorize(val: f32) -> Self {
        unsafe { Self(_mm256_set1_ps(val)) }
    }

    fn compile_pattern(indices: &[u8]) -> __m256i {
        assert_eq!(indices.len(), Self::LANES, "pattern must name every lane");
        let mut control = [0i32; 8];
        for (c, &src) in control.iter_mut().zip(indices) {
            assert!(src < 8, "lane index {} out of range", src);
            *c = src as i32;
        }
        unsafe { _mm256_loadu_si256(control.as_ptr() as *const __m256i) }
    }

    fn compile_mask(mask: LaneMask) -> __m256 {
        let mut bits = [0i32; 8];
        for (lane, b) in bits.iter_mut().enumerate() {
            *b = lane_bits(mask, lane);
        }
        unsafe { _mm256_castsi256_ps(_mm256_loadu_si256(bits.as_ptr() as *const __m256i)) }
    }

    #[inline(always)]
    fn permute(self, pattern: &__m256i) -> Self {
        unsafe { Self(_mm256_permutevar8x32_ps(self.0, *pattern)) }
    }

    #[inline(always)]
    fn keep(self, mask: &__m256) -> Self {
        unsafe { Self(_mm256_and_ps(self.0, *mask)) }
    }
}

#[cfg(stridelane_avx2)]
impl Add for F32x8 {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        unsafe { Self(_mm256_add_ps(self.0, rhs.0)) }
    }
}

#[cfg(stridelane_avx2)]
impl Sub for F32x8 {
    type Output = Self;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self {
        unsafe { Self(_mm256_sub_ps(self.0, rhs.0)) }
    }
}

#[cfg(stridelane_avx2)]
impl Mul for F32x8 {
    type Output = Self;
    #[inline(always)]
    fn mul(self, rhs: Self) -> Self {
        unsafe { Self(_mm256_mul_ps(self.0, rhs.0)) }
    }
}

#[cfg(stridelane_avx2)]
impl Div for F32x8 {
    type Output = Self;
    #[inline(always)]
    fn div(self, rhs: Self) -> Self {
        unsafe { Self(_mm256_div_ps(self.0, rhs.0)) }
    }
}

#[cfg(stridelane_avx2)]
impl BitOr for F32x8 {
    type Output = Self;
    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self {
        unsafe { Self(_mm256_or_ps(self.0, rhs.0)) }
    }
}

#[cfg(test)]
mod tests {
    #[allow(unused_imports)]
    use super::*;

    #[cfg(stridelane_ssse3)]
    #[test]
    fn test_f32x4_permute_matches_shuffle() {
        let lane = F32x4::load(&[1.0, 2.0, 3.0, 4.0]);
        let pattern = F32x4::compile_pattern(&[3, 1, 1, 0]);
        assert_eq!(lane.permute(&pattern).to_array(), [4.0, 2.0, 2.0, 1.0]);

        let mask = F32x4::compile_mask(LaneMask::range(1, 2));
        assert_eq!(lane.keep(&mask).to_array(), [0.0, 2.0, 3.0, 0.0]);
    }

    #[cfg(stridelane_ssse3)]
    #[test]
    fn test_f32x4_arithmetic() {
        let a = F32x4::vectorize(2.0);
        let b = F32x4::vectorize(3.0);
        assert_eq!((a + b).to_array(), [5.0; 4]);
        assert_eq!((b - a).to_array(), [1.0; 4]);
        assert_eq!((a * b).to_array(), [6.0; 4]);
        assert_eq!((b / a).to_array(), [1.5; 4]);
    }

    #[cfg(stridelane_avx2)]
    #[test]
    fn test_f32x8_permute_crosses_halves() {
        if !std::is_x86_feature_detected!("avx2") {
            return;
        }
        let lane = F32x8::load(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let pattern = F32x8::compile_pattern(&[7, 0, 6, 1, 5, 2, 4, 3]);
        assert_eq!(lane.permute(&pattern).to_array(), [7.0, 0.0, 6.0, 1.0, 5.0, 2.0, 4.0, 3.0]);

        let mask = F32x8::compile_mask(LaneMask::strided(0, 4, 2));
        assert_eq!(lane.keep(&mask).to_array(), [0.0, 0.0, 2.0, 0.0, 4.0, 0.0, 6.0, 0.0]);
    }
}
