use qmha_core::pad_to;

use super::VNNI_ROW;
use crate::microkernel::{TransposeQuantValue, TransposeQuantValueArgs};
use crate::quantize::{quantize_s8, s8_scale};

/// Value transpose into one 16-column `BA16b4a` block with requantization
/// from per-row to per-column scales.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefTransposeQuantValue;

impl RefTransposeQuantValue {
    pub const NAME: &'static str = "transpose_requant_value_x16";
}

impl TransposeQuantValue for RefTransposeQuantValue {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn invoke(&self, args: TransposeQuantValueArgs<'_>) {
        let TransposeQuantValueArgs { src, dst, src_scale, dst_scale, ld_src, rows, cols } = args;
        debug_assert!(cols <= 16);

        dst[..16 * pad_to(rows, 4)].fill(0);
        dst_scale[cols..16].fill(0.0);

        for c in 0..cols {
            let abs_max = (0..rows)
                .map(|n| (src[n * ld_src + c] as f32 * src_scale[n]).abs())
                .fold(0.0f32, f32::max);
            let (scale, inv) = s8_scale(abs_max);
            dst_scale[c] = scale;

            for n in 0..rows {
                let x = src[n * ld_src + c] as f32 * src_scale[n];
                dst[(n / 4) * VNNI_ROW + c * 4 + n % 4] = quantize_s8(x, inv);
            }
        }
    }
}
