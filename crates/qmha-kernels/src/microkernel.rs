//! Contracts of the four tiled micro-kernels the attention kernel drives.
//!
//! Each micro-kernel is configured once (by its [`KernelProvider`]) and then
//! invoked per tile with a runtime-argument struct. Slices start at the
//! element the kernel should treat as its origin; leading dimensions
//! (`ld_*`) and per-head steps (`batchstep_*`) are counted in elements of
//! the slice they apply to.
//!
//! Layout vocabulary:
//! - `AB16a4b`: blocks of 16 rows; inside a block, 4 consecutive columns of
//!   one row are contiguous, then the next row. This is the VNNI layout of
//!   a tile-matmul B operand whose *columns* are the source rows.
//! - `BA16b4a`: blocks of 16 columns; inside a block, 4 consecutive rows of
//!   one column are contiguous, then the next column.

use qmha_core::Result;

use crate::tile::{TileParam, TileRegisters};

/// Transpose up to 16 rows of a row-major int8 matrix into `AB16a4b`.
///
/// `dst[(c / 4) * 64 + r * 4 + c % 4] = src[r * ld_src + c]`; every other
/// byte of the `16 × pad(cols, pad_n)` block is zeroed.
pub struct TransposeKeyArgs<'a> {
    pub src: &'a [i8],
    pub dst: &'a mut [i8],
    pub ld_src: usize,
    /// Valid rows, at most 16.
    pub rows: usize,
    pub cols: usize,
}

/// Transpose a `rows × cols` (cols ≤ 16) int8 column block into `BA16b4a`
/// while moving the scale from per-row to per-column.
///
/// Writes `16 · pad(rows, 4)` bytes of `dst` and 16 entries of `dst_scale`
/// (zero for columns at or beyond `cols`).
pub struct TransposeQuantValueArgs<'a> {
    pub src: &'a [i8],
    pub dst: &'a mut [i8],
    pub src_scale: &'a [f32],
    pub dst_scale: &'a mut [f32],
    pub ld_src: usize,
    pub rows: usize,
    /// Valid columns, at most 16.
    pub cols: usize,
}

/// Batched `Q·Kᵀ` + bias + approximate softmax + u8 quantization for one
/// 16-row block of queries, for `batch` heads in one call.
///
/// `src1` is the `AB16a4b` key buffer with 16-key blocks `ld_src1` apart.
/// `bias` holds at least `pad(n, 16)` entries.
pub struct QkSoftmaxArgs<'a> {
    pub src0: &'a [i8],
    pub src1: &'a [i8],
    pub scale_src0: &'a [f32],
    pub scale_src1: &'a [f32],
    pub bias: &'a [f32],
    pub dst: &'a mut [u8],
    /// Reduction length (head size).
    pub k: usize,
    /// Number of keys.
    pub n: usize,
    /// Valid query rows, at most 16.
    pub rows: usize,
    pub ld_src0: usize,
    pub ld_src1: usize,
    pub ld_dst: usize,
    pub batch: usize,
    pub batchstep_src0: usize,
    pub batchstep_src0_scale: usize,
    pub batchstep_src1: usize,
    pub batchstep_src1_scale: usize,
    pub batchstep_dst: usize,
}

/// Batched `P·V` with dynamic per-row int8 quantization of the result.
///
/// `src1` is the `BA16b4a` value buffer with 16-column blocks `ld_src1`
/// apart and `scale_src1` its per-column scales. One output scale is
/// produced per row, shared by all heads of that row.
pub struct AvQuantArgs<'a> {
    pub src0: &'a [u8],
    pub src1: &'a [i8],
    pub scale_src1: &'a [f32],
    pub dst: &'a mut [i8],
    pub dst_scale: &'a mut [f32],
    /// Number of keys.
    pub k: usize,
    /// Head size.
    pub n: usize,
    /// Valid rows, at most 16.
    pub rows: usize,
    pub ld_src0: usize,
    pub ld_src1: usize,
    pub ld_dst: usize,
    pub batch: usize,
    pub batchstep_src0: usize,
    pub batchstep_src1: usize,
    pub batchstep_src1_scale: usize,
    pub batchstep_dst: usize,
}

pub trait TransposeKey: Send + Sync {
    fn name(&self) -> &'static str;
    fn invoke(&self, args: TransposeKeyArgs<'_>);
}

pub trait TransposeQuantValue: Send + Sync {
    fn name(&self) -> &'static str;
    fn invoke(&self, args: TransposeQuantValueArgs<'_>);
}

pub trait QkSoftmax: Send + Sync {
    fn name(&self) -> &'static str;
    fn invoke(&self, args: QkSoftmaxArgs<'_>);
}

pub trait AvQuant: Send + Sync {
    fn name(&self) -> &'static str;
    fn invoke(&self, args: AvQuantArgs<'_>);
}

/// Builds micro-kernels for the current host.
///
/// A build error means the configuration cannot run here and surfaces as
/// a configuration rejection of the whole attention kernel.
pub trait KernelProvider {
    fn transpose_key(&self, pad_n: usize) -> Result<Box<dyn TransposeKey>>;
    fn transpose_quant_value(&self) -> Result<Box<dyn TransposeQuantValue>>;
    fn qk_softmax(&self, tile: &TileParam) -> Result<Box<dyn QkSoftmax>>;
    fn av_quant(&self, tile: &TileParam) -> Result<Box<dyn AvQuant>>;
    fn tile_registers(&self) -> Result<Box<dyn TileRegisters>>;
}
