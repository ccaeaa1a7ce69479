//! Portable micro-kernels.
//!
//! Scalar implementations of the four micro-kernel contracts that produce
//! exactly the buffers the tile-matmul kernels exchange, padding included.
//! They run on any host; the matmul kernels still require tile registers
//! to be configured on the calling thread (emulated, see
//! [`EmulatedTileRegisters`]).

mod mm_av;
mod mm_softmax;
mod trans_k;
mod trans_v;

pub use mm_av::RefAvQuant;
pub use mm_softmax::RefQkSoftmax;
pub use trans_k::RefTransposeKey;
pub use trans_v::RefTransposeQuantValue;

use qmha_core::{MhaError, Result};

use crate::microkernel::{AvQuant, KernelProvider, QkSoftmax, TransposeKey, TransposeQuantValue};
use crate::tile::{EmulatedTileRegisters, TileParam, TileRegisters};

/// Byte width of one VNNI row of a B tile: 16 columns × 4 packed int8.
pub(crate) const VNNI_ROW: usize = 64;

/// Provider of the portable micro-kernels.
#[derive(Debug, Clone, Default)]
pub struct ReferenceKernels {
    tiles: EmulatedTileRegisters,
}

impl ReferenceKernels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on the emulated tile registers handed to executors, for
    /// observing configure/release counts.
    pub fn tiles(&self) -> &EmulatedTileRegisters {
        &self.tiles
    }

    fn check_tile(kernel: &'static str, tile: &TileParam) -> Result<()> {
        if *tile != TileParam::full_int8() {
            return Err(MhaError::KernelBuild {
                kernel,
                reason: format!("only 16x16x64 int8 tiles are supported, got {tile:?}"),
            });
        }
        Ok(())
    }
}

impl KernelProvider for ReferenceKernels {
    fn transpose_key(&self, pad_n: usize) -> Result<Box<dyn TransposeKey>> {
        Ok(Box::new(RefTransposeKey::new(pad_n)?))
    }

    fn transpose_quant_value(&self) -> Result<Box<dyn TransposeQuantValue>> {
        Ok(Box::new(RefTransposeQuantValue))
    }

    fn qk_softmax(&self, tile: &TileParam) -> Result<Box<dyn QkSoftmax>> {
        Self::check_tile(RefQkSoftmax::NAME, tile)?;
        Ok(Box::new(RefQkSoftmax))
    }

    fn av_quant(&self, tile: &TileParam) -> Result<Box<dyn AvQuant>> {
        Self::check_tile(RefAvQuant::NAME, tile)?;
        Ok(Box::new(RefAvQuant))
    }

    fn tile_registers(&self) -> Result<Box<dyn TileRegisters>> {
        Ok(Box::new(self.tiles.clone()))
    }
}
