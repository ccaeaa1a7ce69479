use qmha_core::pad_to;

use super::VNNI_ROW;
use crate::microkernel::{AvQuant, AvQuantArgs};
use crate::quantize::{quantize_s8, s8_scale, U8_PROB_MAX};
use crate::tile;

/// Batched `P·V` with dynamic per-row int8 output quantization.
///
/// The reduction runs over the whole 64-padded key range like the tile
/// kernel does, so padding in both operands must be zero. Each output
/// value is computed twice (abs-max pass, quantize pass) to stay
/// allocation-free.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefAvQuant;

impl RefAvQuant {
    pub const NAME: &'static str = "av_dynamic_quant_16x";
}

impl AvQuant for RefAvQuant {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn invoke(&self, args: AvQuantArgs<'_>) {
        debug_assert!(
            tile::emulated_config().is_some(),
            "tile registers not configured on this thread"
        );
        debug_assert!(args.rows <= 16);

        let k_pad = pad_to(args.k, 64);
        debug_assert!(k_pad <= args.ld_src0);

        let value = |r: usize, h: usize, c: usize| -> f32 {
            let probs = &args.src0[h * args.batchstep_src0 + r * args.ld_src0..][..k_pad];
            let block = &args.src1[h * args.batchstep_src1 + (c / 16) * args.ld_src1..];
            let lane = (c % 16) * 4;
            let acc: i32 = probs
                .iter()
                .enumerate()
                .map(|(kk, &p)| p as i32 * block[(kk / 4) * VNNI_ROW + lane + kk % 4] as i32)
                .sum();
            acc as f32 * args.scale_src1[h * args.batchstep_src1_scale + c] / U8_PROB_MAX
        };

        for r in 0..args.rows {
            let mut abs_max = 0.0f32;
            for h in 0..args.batch {
                for c in 0..args.n {
                    abs_max = abs_max.max(value(r, h, c).abs());
                }
            }
            let (scale, inv) = s8_scale(abs_max);
            args.dst_scale[r] = scale;

            for h in 0..args.batch {
                let start = r * args.ld_dst + h * args.batchstep_dst;
                for (c, o) in args.dst[start..start + args.n].iter_mut().enumerate() {
                    *o = quantize_s8(value(r, h, c), inv);
                }
            }
        }
    }
}
