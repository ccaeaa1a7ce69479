//! Symmetric quantization helpers shared by the micro-kernels.
//!
//! All activations are symmetric: `x ≈ q * scale` with no zero point, int8
//! values clamped to ±127 and softmax probabilities mapped onto 0..=255.

/// Largest magnitude of a symmetric int8 value.
pub const S8_MAX: f32 = 127.0;

/// Full-scale value of a u8-quantized probability.
pub const U8_PROB_MAX: f32 = 255.0;

/// Scale that maps `abs_max` onto ±127, with its inverse.
///
/// An all-zero row gets scale 0 and inverse 0, so it quantizes to zeros.
#[inline]
pub fn s8_scale(abs_max: f32) -> (f32, f32) {
    if abs_max > 0.0 {
        (abs_max / S8_MAX, S8_MAX / abs_max)
    } else {
        (0.0, 0.0)
    }
}

/// Quantize `x` with a precomputed inverse scale.
#[inline]
pub fn quantize_s8(x: f32, inv_scale: f32) -> i8 {
    (x * inv_scale).round().clamp(-S8_MAX, S8_MAX) as i8
}

/// Quantize a probability in [0, 1] to u8.
#[inline]
pub fn quantize_prob_u8(p: f32) -> u8 {
    (p * U8_PROB_MAX).round().clamp(0.0, U8_PROB_MAX) as u8
}

/// Dequantize a row of int8 values.
pub fn dequantize_s8(q: &[i8], scale: f32) -> Vec<f32> {
    q.iter().map(|&v| v as f32 * scale).collect()
}

const EXP_LO: f32 = -87.0;
const EXP_HI: f32 = 88.0;

// Taylor coefficients of 2^f = e^(f·ln2) on [0, 1).
const P1: f32 = 0.693_147_2;
const P2: f32 = 0.240_226_5;
const P3: f32 = 0.055_504_11;
const P4: f32 = 0.009_618_129;
const P5: f32 = 0.001_333_355_8;

/// Approximate `e^x` by base-2 range reduction and a degree-5 polynomial.
///
/// Relative error stays below 2e-4 over the clamped input range. Clamping
/// keeps a single term finite, not a sum: the softmax built on this does no
/// max subtraction, so its denominator overflows once scores approach 88
/// and every probability then quantizes to 0. Callers must scale Q and K so
/// that scores stay well below that bound.
#[inline]
pub fn exp_approx(x: f32) -> f32 {
    let t = x.clamp(EXP_LO, EXP_HI) * std::f32::consts::LOG2_E;
    let n = t.floor();
    let f = t - n;
    let p = 1.0 + f * (P1 + f * (P2 + f * (P3 + f * (P4 + f * P5))));
    let pow2n = f32::from_bits(((n as i32 + 127) as u32) << 23);
    pow2n * p
}
