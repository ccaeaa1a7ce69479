//! Additive key masks.
//!
//! The QK micro-kernel reads `pad(N, 16)` mask entries per batch. When `N`
//! is already a multiple of 16 the caller's `{B, 1, 1, N}` mask is used
//! as is; otherwise it is copied into the workspace with the tail filled
//! by [`MASK_PAD_SENTINEL`].

use qmha_core::pad_to;

/// Bias of padded key columns. Large enough that `exp` of it vanishes
/// next to any real score, small enough to stay finite.
pub const MASK_PAD_SENTINEL: f32 = -1000.0;

/// Mask as the QK kernel reads it: `batch` rows of `pad(seq_k, 16)` floats.
///
/// `scratch` must hold at least `batch * pad(seq_k, 16)` floats whenever
/// `seq_k % 16 != 0`.
pub fn prepare_mask<'a>(
    mask: &'a [f32],
    scratch: &'a mut [f32],
    batch: usize,
    seq_k: usize,
) -> &'a [f32] {
    let stride = pad_to(seq_k, 16);
    if stride == seq_k {
        return &mask[..batch * seq_k];
    }
    let padded = &mut scratch[..batch * stride];
    for (dst, src) in padded.chunks_exact_mut(stride).zip(mask.chunks_exact(seq_k)) {
        dst[..seq_k].copy_from_slice(src);
        dst[seq_k..].fill(MASK_PAD_SENTINEL);
    }
    padded
}
