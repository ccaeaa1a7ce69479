use qmha_core::pad_to;

use super::VNNI_ROW;
use crate::microkernel::{QkSoftmax, QkSoftmaxArgs};
use crate::quantize::{exp_approx, quantize_prob_u8};
use crate::tile;

/// Batched `Q·Kᵀ` with fused bias, non-stable approximate softmax and
/// u8 quantization of the probabilities.
///
/// Scores are computed for every key column up to `pad(n, 16)`; the bias
/// is expected to push the padding columns to ≈0 probability.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefQkSoftmax;

impl RefQkSoftmax {
    pub const NAME: &'static str = "qk_softmax_u8_16x";
}

/// Dot product of one query row with key column `c` of an `AB16a4b` buffer.
#[inline]
fn dot_key_column(q_row: &[i8], keys: &[i8], ld_block: usize, c: usize) -> i32 {
    let block = &keys[(c / 16) * ld_block..];
    let lane = (c % 16) * 4;
    q_row
        .iter()
        .enumerate()
        .map(|(d, &q)| q as i32 * block[(d / 4) * VNNI_ROW + lane + d % 4] as i32)
        .sum()
}

impl QkSoftmax for RefQkSoftmax {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn invoke(&self, args: QkSoftmaxArgs<'_>) {
        debug_assert!(
            tile::emulated_config().is_some(),
            "tile registers not configured on this thread"
        );
        debug_assert!(args.rows <= 16);

        let n_pad16 = pad_to(args.n, 16);
        debug_assert!(n_pad16 <= args.ld_dst);

        for h in 0..args.batch {
            let q = &args.src0[h * args.batchstep_src0..];
            let keys = &args.src1[h * args.batchstep_src1..];
            let q_scale = &args.scale_src0[h * args.batchstep_src0_scale..];
            let k_scale = &args.scale_src1[h * args.batchstep_src1_scale..];
            let out = &mut args.dst[h * args.batchstep_dst..][..16 * args.ld_dst];
            out.fill(0);

            for r in 0..args.rows {
                let q_row = &q[r * args.ld_src0..r * args.ld_src0 + args.k];
                let score = |c: usize| {
                    let ks = if c < args.n { k_scale[c] } else { 0.0 };
                    let dot = dot_key_column(q_row, keys, args.ld_src1, c);
                    dot as f32 * q_scale[r] * ks + args.bias[c]
                };

                let sum: f32 = (0..n_pad16).map(|c| exp_approx(score(c))).sum();
                let inv_sum = if sum > 0.0 { 1.0 / sum } else { 0.0 };

                let out_row = &mut out[r * args.ld_dst..r * args.ld_dst + n_pad16];
                for (c, o) in out_row.iter_mut().enumerate() {
                    *o = quantize_prob_u8(exp_approx(score(c)) * inv_sum);
                }
            }
        }
    }
}
