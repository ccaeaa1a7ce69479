//! Workspace sizing and partitioning.
//!
//! The caller owns one byte buffer per call. It is split into five
//! contiguous regions, in order: padded mask, transposed K, transposed and
//! requantized V, V column scales, and per-worker softmax scratch. Region
//! sizes use 64-element padding; execution indexes inside them with the
//! finer granularities exposed by [`WorkspaceLayout`].

use bytemuck::{Pod, Zeroable};
use qmha_core::{pad_to, DType, MhaError, Result};

use crate::dims::MhaDims;

/// Byte span of one workspace region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    pub offset: usize,
    pub len: usize,
}

impl Region {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Region offsets and strides for one set of resolved dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub dims: MhaDims,
    pub threads: usize,
    pub mask: Region,
    pub k: Region,
    pub v: Region,
    pub v_scale: Region,
    pub softmax: Region,
}

impl WorkspaceLayout {
    pub fn new(dims: &MhaDims, threads: usize) -> Self {
        let MhaDims { batch_size: b, head_num: h, seq_k: n, head_size: d, .. } = *dims;
        let n64 = pad_to(n, 64);
        let d64 = pad_to(d, 64);
        let f32_bytes = DType::F32.element_size();

        let mask = Region { offset: 0, len: f32_bytes * b * n64 };
        let k = Region { offset: mask.end(), len: b * h * n64 * d64 };
        let v = Region { offset: k.end(), len: k.len };
        let v_scale = Region { offset: v.end(), len: f32_bytes * b * h * d64 };
        // Sized as f32 rows although the kernels store u8 probabilities.
        let softmax = Region { offset: v_scale.end(), len: f32_bytes * threads * 16 * h * n64 };

        Self { dims: *dims, threads, mask, k, v, v_scale, softmax }
    }

    /// Bytes the caller must provide.
    pub fn total_bytes(&self) -> usize {
        self.softmax.end()
    }

    /// Mask floats per batch as read by the QK kernel.
    pub fn mask_stride(&self) -> usize {
        pad_to(self.dims.seq_k, 16)
    }

    /// Transposed-K bytes per (batch, head).
    pub fn head_k_bytes(&self) -> usize {
        pad_to(self.dims.head_size, 64) * pad_to(self.dims.seq_k, 16)
    }

    /// Transposed-V bytes per (batch, head).
    pub fn head_v_bytes(&self) -> usize {
        pad_to(self.dims.seq_k, 64) * pad_to(self.dims.head_size, 16)
    }

    /// V column scales per (batch, head).
    pub fn head_v_scale_len(&self) -> usize {
        pad_to(self.dims.head_size, 16)
    }

    /// Softmax scratch bytes per worker.
    pub fn worker_scratch_bytes(&self) -> usize {
        self.dims.head_num * 16 * pad_to(self.dims.seq_k, 64)
    }

    /// Split `ws` into typed region views.
    pub fn split<'w>(&self, ws: &'w mut [u8]) -> Result<WorkspaceViews<'w>> {
        let needed = self.total_bytes();
        if ws.len() < needed {
            return Err(MhaError::WorkspaceTooSmall { needed, got: ws.len() });
        }
        let (mask, rest) = ws[..needed].split_at_mut(self.mask.len);
        let (k, rest) = rest.split_at_mut(self.k.len);
        let (v, rest) = rest.split_at_mut(self.v.len);
        let (v_scale, softmax) = rest.split_at_mut(self.v_scale.len);

        Ok(WorkspaceViews {
            mask: as_f32(mask)?,
            k: bytemuck::cast_slice_mut::<u8, i8>(k),
            v: bytemuck::cast_slice_mut::<u8, i8>(v),
            v_scale: as_f32(v_scale)?,
            softmax,
        })
    }
}

fn as_f32(bytes: &mut [u8]) -> Result<&mut [f32]> {
    bytemuck::try_cast_slice_mut::<u8, f32>(bytes)
        .map_err(|_| MhaError::MisalignedBuffer("workspace"))
}

/// Typed, disjoint views of the workspace regions.
pub struct WorkspaceViews<'w> {
    pub mask: &'w mut [f32],
    pub k: &'w mut [i8],
    pub v: &'w mut [i8],
    pub v_scale: &'w mut [f32],
    pub softmax: &'w mut [u8],
}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, align(64))]
struct CacheLine([u8; 64]);

/// Owned, zero-initialized, cache-line aligned workspace buffer.
///
/// Allocate once with [`DynamicQuantMha::workspace_size`] bytes and reuse it
/// across calls; the kernel never allocates on the hot path.
///
/// [`DynamicQuantMha::workspace_size`]: crate::DynamicQuantMha::workspace_size
pub struct Workspace {
    lines: Vec<CacheLine>,
    len: usize,
}

impl Workspace {
    pub fn new(len: usize) -> Self {
        Self {
            lines: vec![CacheLine([0; 64]); len.div_ceil(64)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<CacheLine, u8>(&self.lines)[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<CacheLine, u8>(&mut self.lines)[..self.len]
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace").field("len", &self.len).finish()
    }
}
