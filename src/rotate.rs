//! Rotating the 320×240 back buffer into the panel's native 240×320
//! orientation.
//!
//! The panel is mounted 90° from how the back buffer is drawn, so every
//! frame gets rotated on the way out. This is the only per-pixel work on
//! the present path, so it is worth a hand-written SIMD kernel on the two
//! architectures this backend ships on; [`rotate_scalar`] stays around as
//! the reference implementation and as the fallback for anything else.

/// Back buffer dimensions, as drawn into by the application.
pub const SRC_WIDTH: usize = 320;
pub const SRC_HEIGHT: usize = 240;

/// Panel dimensions, after rotation.
pub const DST_WIDTH: usize = 240;
pub const DST_HEIGHT: usize = 320;

/// Rotate `src` (320×240, row-major, `SRC_WIDTH` stride) into `dst`
/// (240×320, row-major, `DST_WIDTH` stride), 90° clockwise.
///
/// Dispatches to a SIMD kernel when one exists for the host architecture,
/// otherwise falls back to [`rotate_scalar`].
pub fn rotate(src: &[u16], dst: &mut [u16]) {
    assert_eq!(src.len(), SRC_WIDTH * SRC_HEIGHT);
    assert_eq!(dst.len(), DST_WIDTH * DST_HEIGHT);

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("sse2") {
            // SAFETY: guarded by the feature check above.
            unsafe { x86_64::rotate_sse2(src, dst) };
            return;
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        // NEON is mandatory on every aarch64 target.
        // SAFETY: aarch64 always has NEON.
        unsafe { aarch64::rotate_neon(src, dst) };
        return;
    }
    #[allow(unreachable_code)]
    {
        rotate_scalar(src, dst);
    }
}

/// Reference 90°-clockwise rotation, one pixel at a time.
///
/// `dst[row][col] = src[SRC_HEIGHT - 1 - col][row]` restated in the two
/// buffers' actual shapes: a source pixel at `(x, y)` (column `x`, row
/// `y`) lands at destination row `SRC_WIDTH - 1 - x`, column `y`.
pub fn rotate_scalar(src: &[u16], dst: &mut [u16]) {
    assert_eq!(src.len(), SRC_WIDTH * SRC_HEIGHT);
    assert_eq!(dst.len(), DST_WIDTH * DST_HEIGHT);
    for y in 0..SRC_HEIGHT {
        for x in 0..SRC_WIDTH {
            let dst_row = SRC_WIDTH - 1 - x;
            dst[dst_row * DST_WIDTH + y] = src[y * SRC_WIDTH + x];
        }
    }
}

/// Rotate a buffer 90° clockwise four times in a row and assert it
/// returns to its starting contents — a cheap correctness check
/// independent of the exact addressing formula above. Each step swaps
/// which dimension is "width", so this walks through all four
/// orientations a 320×240 buffer can be in.
#[cfg(test)]
fn rotate_4x_is_identity(rotate_320x240: impl Fn(&[u16], &mut [u16])) {
    let start: Vec<u16> = (0..(SRC_WIDTH * SRC_HEIGHT) as u16).collect();

    let mut a = vec![0u16; SRC_WIDTH * SRC_HEIGHT];
    rotate_320x240(&start, &mut a); // 320x240 -> 240x320

    let mut b = vec![0u16; SRC_WIDTH * SRC_HEIGHT];
    rotate_generic(&a, &mut b, DST_WIDTH, DST_HEIGHT); // 240x320 -> 320x240

    let mut c = vec![0u16; SRC_WIDTH * SRC_HEIGHT];
    rotate_320x240(&b, &mut c); // 320x240 -> 240x320

    let mut d = vec![0u16; SRC_WIDTH * SRC_HEIGHT];
    rotate_generic(&c, &mut d, DST_WIDTH, DST_HEIGHT); // 240x320 -> 320x240

    assert_eq!(d, start);
}

#[cfg(test)]
fn rotate_generic(src: &[u16], dst: &mut [u16], src_w: usize, src_h: usize) {
    for y in 0..src_h {
        for x in 0..src_w {
            let dst_row = src_w - 1 - x;
            dst[dst_row * src_h + y] = src[y * src_w + x];
        }
    }
}

#[cfg(target_arch = "x86_64")]
mod x86_64 {
    use super::{DST_WIDTH, SRC_HEIGHT, SRC_WIDTH};
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    /// 90°-clockwise rotation via 8×8 tile transpose.
    ///
    /// Each 8×8 tile of `src` is loaded as eight `__m128i` rows of 8×u16,
    /// transposed with the standard unpack butterfly (16 → 32 → 64 bit
    /// interleave), and the eight transposed rows are stored into `dst` at
    /// the mirrored column position the 90° rotation puts them at.
    ///
    /// # Safety
    /// Caller must have confirmed SSE2 is available (it always is on
    /// x86_64, but the check lives at the call site in [`super::rotate`]).
    #[target_feature(enable = "sse2")]
    pub(super) unsafe fn rotate_sse2(src: &[u16], dst: &mut [u16]) {
        debug_assert_eq!(src.len(), SRC_WIDTH * SRC_HEIGHT);
        debug_assert_eq!(dst.len(), DST_WIDTH * super::DST_HEIGHT);

        let mut y = 0;
        while y < SRC_HEIGHT {
            let mut x = 0;
            while x < SRC_WIDTH {
                transpose_tile_8x8(src, dst, x, y);
                x += 8;
            }
            y += 8;
        }
    }

    #[target_feature(enable = "sse2")]
    unsafe fn transpose_tile_8x8(src: &[u16], dst: &mut [u16], x0: usize, y0: usize) {
        let mut rows = [_mm_setzero_si128(); 8];
        for (j, row) in rows.iter_mut().enumerate() {
            let off = (y0 + j) * SRC_WIDTH + x0;
            *row = _mm_loadu_si128(src.as_ptr().add(off) as *const __m128i);
        }

        // Stage 1: interleave adjacent rows at 16-bit granularity.
        let a0 = _mm_unpacklo_epi16(rows[0], rows[1]);
        let a1 = _mm_unpackhi_epi16(rows[0], rows[1]);
        let a2 = _mm_unpacklo_epi16(rows[2], rows[3]);
        let a3 = _mm_unpackhi_epi16(rows[2], rows[3]);
        let a4 = _mm_unpacklo_epi16(rows[4], rows[5]);
        let a5 = _mm_unpackhi_epi16(rows[4], rows[5]);
        let a6 = _mm_unpacklo_epi16(rows[6], rows[7]);
        let a7 = _mm_unpackhi_epi16(rows[6], rows[7]);

        // Stage 2: interleave at 32-bit granularity.
        let b0 = _mm_unpacklo_epi32(a0, a2);
        let b1 = _mm_unpackhi_epi32(a0, a2);
        let b2 = _mm_unpacklo_epi32(a1, a3);
        let b3 = _mm_unpackhi_epi32(a1, a3);
        let b4 = _mm_unpacklo_epi32(a4, a6);
        let b5 = _mm_unpackhi_epi32(a4, a6);
        let b6 = _mm_unpacklo_epi32(a5, a7);
        let b7 = _mm_unpackhi_epi32(a5, a7);

        // Stage 3: interleave at 64-bit granularity -- this produces the
        // fully transposed rows.
        let out = [
            _mm_unpacklo_epi64(b0, b4),
            _mm_unpackhi_epi64(b0, b4),
            _mm_unpacklo_epi64(b1, b5),
            _mm_unpackhi_epi64(b1, b5),
            _mm_unpacklo_epi64(b2, b6),
            _mm_unpackhi_epi64(b2, b6),
            _mm_unpacklo_epi64(b3, b7),
            _mm_unpackhi_epi64(b3, b7),
        ];

        // `out[j]` holds what was column `j` of the tile, now laid out as
        // a row. A plain transpose would write it to tile-row j of a
        // tile-column-x0 destination; the 90°-clockwise rotation on top of
        // that reverses the row order and remaps into the destination's
        // coordinate space: destination row `SRC_WIDTH - 1 - (x0 + j)`,
        // starting at column `y0`.
        for (j, row) in out.iter().enumerate() {
            let dst_row = SRC_WIDTH - 1 - (x0 + j);
            let off = dst_row * DST_WIDTH + y0;
            _mm_storeu_si128(dst.as_mut_ptr().add(off) as *mut __m128i, *row);
        }
    }
}

#[cfg(target_arch = "aarch64")]
mod aarch64 {
    use super::{DST_WIDTH, SRC_HEIGHT, SRC_WIDTH};
    use std::arch::aarch64::*;

    /// NEON analog of [`super::x86_64::rotate_sse2`].
    ///
    /// Uses `vzip1q`/`vzip2q` rather than `vtrnq`: `vzip1/vzip2` interleave
    /// the low/high halves of two vectors exactly like x86's
    /// `unpacklo`/`unpackhi`, so this butterfly is structurally identical
    /// to the SSE2 one above (`vtrnq` interleaves adjacent elements across
    /// the whole vector instead, a different operation).
    ///
    /// # Safety
    /// NEON is always available on aarch64.
    pub(super) unsafe fn rotate_neon(src: &[u16], dst: &mut [u16]) {
        debug_assert_eq!(src.len(), SRC_WIDTH * SRC_HEIGHT);
        debug_assert_eq!(dst.len(), DST_WIDTH * super::DST_HEIGHT);

        let mut y = 0;
        while y < SRC_HEIGHT {
            let mut x = 0;
            while x < SRC_WIDTH {
                transpose_tile_8x8(src, dst, x, y);
                x += 8;
            }
            y += 8;
        }
    }

    unsafe fn transpose_tile_8x8(src: &[u16], dst: &mut [u16], x0: usize, y0: usize) {
        let mut rows = [vdupq_n_u16(0); 8];
        for (j, row) in rows.iter_mut().enumerate() {
            let off = (y0 + j) * SRC_WIDTH + x0;
            *row = vld1q_u16(src.as_ptr().add(off));
        }

        let a0 = vzip1q_u16(rows[0], rows[1]);
        let a1 = vzip2q_u16(rows[0], rows[1]);
        let a2 = vzip1q_u16(rows[2], rows[3]);
        let a3 = vzip2q_u16(rows[2], rows[3]);
        let a4 = vzip1q_u16(rows[4], rows[5]);
        let a5 = vzip2q_u16(rows[4], rows[5]);
        let a6 = vzip1q_u16(rows[6], rows[7]);
        let a7 = vzip2q_u16(rows[6], rows[7]);

        let a0_32 = vreinterpretq_u32_u16(a0);
        let a1_32 = vreinterpretq_u32_u16(a1);
        let a2_32 = vreinterpretq_u32_u16(a2);
        let a3_32 = vreinterpretq_u32_u16(a3);
        let a4_32 = vreinterpretq_u32_u16(a4);
        let a5_32 = vreinterpretq_u32_u16(a5);
        let a6_32 = vreinterpretq_u32_u16(a6);
        let a7_32 = vreinterpretq_u32_u16(a7);

        let b0 = vzip1q_u32(a0_32, a2_32);
        let b1 = vzip2q_u32(a0_32, a2_32);
        let b2 = vzip1q_u32(a1_32, a3_32);
        let b3 = vzip2q_u32(a1_32, a3_32);
        let b4 = vzip1q_u32(a4_32, a6_32);
        let b5 = vzip2q_u32(a4_32, a6_32);
        let b6 = vzip1q_u32(a5_32, a7_32);
        let b7 = vzip2q_u32(a5_32, a7_32);

        let b0_64 = vreinterpretq_u64_u32(b0);
        let b1_64 = vreinterpretq_u64_u32(b1);
        let b2_64 = vreinterpretq_u64_u32(b2);
        let b3_64 = vreinterpretq_u64_u32(b3);
        let b4_64 = vreinterpretq_u64_u32(b4);
        let b5_64 = vreinterpretq_u64_u32(b5);
        let b6_64 = vreinterpretq_u64_u32(b6);
        let b7_64 = vreinterpretq_u64_u32(b7);

        let out = [
            vreinterpretq_u16_u64(vzip1q_u64(b0_64, b4_64)),
            vreinterpretq_u16_u64(vzip2q_u64(b0_64, b4_64)),
            vreinterpretq_u16_u64(vzip1q_u64(b1_64, b5_64)),
            vreinterpretq_u16_u64(vzip2q_u64(b1_64, b5_64)),
            vreinterpretq_u16_u64(vzip1q_u64(b2_64, b6_64)),
            vreinterpretq_u16_u64(vzip2q_u64(b2_64, b6_64)),
            vreinterpretq_u16_u64(vzip1q_u64(b3_64, b7_64)),
            vreinterpretq_u16_u64(vzip2q_u64(b3_64, b7_64)),
        ];

        for (j, row) in out.iter().enumerate() {
            let dst_row = SRC_WIDTH - 1 - (x0 + j);
            let off = dst_row * DST_WIDTH + y0;
            vst1q_u16(dst.as_mut_ptr().add(off), *row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_src() -> Vec<u16> {
        (0..(SRC_WIDTH * SRC_HEIGHT) as u32)
            .map(|v| (v % 65536) as u16)
            .collect()
    }

    #[test]
    fn scalar_rotates_corner_pixels_correctly() {
        let src = sample_src();
        let mut dst = vec![0u16; DST_WIDTH * DST_HEIGHT];
        rotate_scalar(&src, &mut dst);

        // Top-left source pixel (0,0) ends up at dst's last row, column 0.
        assert_eq!(dst[(DST_HEIGHT - 1) * DST_WIDTH], src[0]);
        // Top-right source pixel (319,0) ends up at dst's first row, column 0.
        assert_eq!(dst[0], src[SRC_WIDTH - 1]);
        // Bottom-right source pixel (319,239) ends up at dst's first row,
        // last column.
        assert_eq!(dst[DST_WIDTH - 1], src[SRC_WIDTH * SRC_HEIGHT - 1]);
    }

    #[test]
    fn vector_matches_scalar() {
        let src = sample_src();
        let mut dst_scalar = vec![0u16; DST_WIDTH * DST_HEIGHT];
        let mut dst_vector = vec![0u16; DST_WIDTH * DST_HEIGHT];

        rotate_scalar(&src, &mut dst_scalar);
        rotate(&src, &mut dst_vector);

        assert_eq!(dst_scalar, dst_vector);
    }

    #[test]
    fn four_rotations_is_identity() {
        rotate_4x_is_identity(rotate_scalar);
        rotate_4x_is_identity(rotate);
    }
}
