use qmha_core::{pad_to, MhaError, Result};

use super::VNNI_ROW;
use crate::microkernel::{TransposeKey, TransposeKeyArgs};

/// Key transpose into 16-row `AB16a4b` blocks, columns padded to `pad_n`.
#[derive(Debug, Clone, Copy)]
pub struct RefTransposeKey {
    pad_n: usize,
}

impl RefTransposeKey {
    pub const NAME: &'static str = "transpose_key_16x";

    pub fn new(pad_n: usize) -> Result<Self> {
        if pad_n == 0 || pad_n % 4 != 0 {
            return Err(MhaError::KernelBuild {
                kernel: Self::NAME,
                reason: format!("column padding must be a positive multiple of 4, got {pad_n}"),
            });
        }
        Ok(Self { pad_n })
    }
}

impl TransposeKey for RefTransposeKey {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn invoke(&self, args: TransposeKeyArgs<'_>) {
        let TransposeKeyArgs { src, dst, ld_src, rows, cols } = args;
        debug_assert!(rows <= 16);

        let block = 16 * pad_to(cols, self.pad_n);
        dst[..block].fill(0);

        for r in 0..rows {
            let row = &src[r * ld_src..r * ld_src + cols];
            for (c, &v) in row.iter().enumerate() {
                dst[(c / 4) * VNNI_ROW + r * 4 + c % 4] = v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transpose_layout() {
        // 3 rows x 8 cols, leading dimension 10.
        let ld = 10;
        let src: Vec<i8> = (0..30).map(|i| i as i8).collect();
        let mut dst = vec![-1i8; 16 * 64];
        RefTransposeKey::new(64).unwrap().invoke(TransposeKeyArgs {
            src: &src,
            dst: &mut dst,
            ld_src: ld,
            rows: 3,
            cols: 8,
        });

        // First VNNI row: cols 0..4 of rows 0..3, 4 bytes per row.
        assert_eq!(&dst[0..4], &[0, 1, 2, 3]);
        assert_eq!(&dst[4..8], &[10, 11, 12, 13]);
        assert_eq!(&dst[8..12], &[20, 21, 22, 23]);
        // Rows 3..16 are zero padding.
        assert!(dst[12..64].iter().all(|&v| v == 0));
        // Second VNNI row: cols 4..8.
        assert_eq!(&dst[64..68], &[4, 5, 6, 7]);
        assert_eq!(&dst[68..72], &[14, 15, 16, 17]);
        // Columns 8..64 are zero padding.
        assert!(dst[128..].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_writes_only_its_block() {
        let src = vec![1i8; 16 * 20];
        let mut dst = vec![7i8; 16 * 64 + 8];
        RefTransposeKey::new(64).unwrap().invoke(TransposeKeyArgs {
            src: &src,
            dst: &mut dst,
            ld_src: 20,
            rows: 16,
            cols: 20,
        });
        assert_eq!(dst.iter().take(16 * 64).filter(|&&v| v == 1).count(), 16 * 20);
        assert!(dst[16 * 64..].iter().all(|&v| v == 7));
    }

    #[test]
    fn test_rejects_bad_padding() {
        assert!(RefTransposeKey::new(0).is_err());
        assert!(RefTransposeKey::new(10).is_err());
    }
}
