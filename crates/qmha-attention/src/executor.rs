//! The fused attention executor.
//!
//! One call runs two parallel regions on the executor's thread pool:
//!
//! 1. For every (batch, head): transpose K into `AB16a4b` blocks of 16
//!    keys, and transpose + requantize V into `BA16b4a` blocks of 16
//!    columns with per-column scales.
//! 2. For every (batch, 16-row query block): QK + mask + softmax into the
//!    worker's u8 scratch, then AV with dynamic per-row quantization into
//!    the destination, both batched over heads.
//!
//! Rayon joins the first region before the second starts, so every
//! transposed head is visible to every query block.

use qmha_core::{pad_to, MhaError, Result, Shape, Slot};
use qmha_kernels::{
    AvQuant, AvQuantArgs, KernelProvider, QkSoftmax, QkSoftmaxArgs, ReferenceKernels, TileConfig,
    TileParam, TileRegisters, TransposeKey, TransposeKeyArgs, TransposeQuantValue,
    TransposeQuantValueArgs,
};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::config::ExecutorConfig;
use crate::dims::{DynamicDims, MhaDims};
use crate::mask::prepare_mask;
use crate::session::WorkerSessions;
use crate::validate::{expected_shapes, DynamicQuantMhaDesc};
use crate::workspace::WorkspaceLayout;

/// Rows of queries handled per micro-kernel call.
const ROW_BLOCK: usize = 16;

/// Runtime buffers of one call, one field per data slot.
///
/// Tensors are dense row-major in their descriptor shapes: Q and Dst
/// `{B, M, H, D}`, K and V `{B, N, H, D}`, mask `{B, 1, 1, N}`, scales
/// `{B, M}` or `{B, N}`.
pub struct MhaArgs<'a> {
    pub src_q: &'a [i8],
    pub src_k: &'a [i8],
    pub src_v: &'a [i8],
    pub mask: &'a [f32],
    pub q_scale: &'a [f32],
    pub k_scale: &'a [f32],
    pub v_scale: &'a [f32],
    pub dst: &'a mut [i8],
    pub dst_scale: &'a mut [f32],
    /// At least [`DynamicQuantMha::workspace_size_for`] bytes, 4-byte aligned.
    pub workspace: &'a mut [u8],
    /// Values of the dynamic-shape scalars.
    pub dims: DynamicDims,
}

/// Built dynamic-quantized attention kernel.
pub struct DynamicQuantMha {
    dims: MhaDims,
    tile_config: TileConfig,
    pool: ThreadPool,
    release_tiles: bool,
    trans_k: Box<dyn TransposeKey>,
    trans_v: Box<dyn TransposeQuantValue>,
    qk: Box<dyn QkSoftmax>,
    av: Box<dyn AvQuant>,
    tiles: Box<dyn TileRegisters>,
}

impl std::fmt::Debug for DynamicQuantMha {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicQuantMha")
            .field("dims", &self.dims)
            .field("threads", &self.pool.current_num_threads())
            .field("qk", &self.qk.name())
            .field("av", &self.av.name())
            .finish()
    }
}

impl DynamicQuantMha {
    /// Build the kernel with the portable micro-kernels.
    pub fn new(desc: DynamicQuantMhaDesc, config: &ExecutorConfig) -> Result<Self> {
        Self::with_provider(desc, config, &ReferenceKernels::new())
    }

    /// Build the kernel with micro-kernels from `provider`.
    pub fn with_provider(
        desc: DynamicQuantMhaDesc,
        config: &ExecutorConfig,
        provider: &dyn KernelProvider,
    ) -> Result<Self> {
        let dims = desc.dims();
        let tile_param = TileParam::full_int8();
        let tile_config = TileConfig::from_param(&tile_param);

        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("qmha-worker-{i}"));
        if let Some(n) = config.num_threads {
            if n == 0 {
                return Err(MhaError::InvalidConfig("num_threads must be positive".into()));
            }
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| MhaError::InvalidConfig(format!("failed to build worker pool: {e}")))?;

        let kernel = Self {
            dims,
            tile_config,
            release_tiles: config.release_tiles,
            trans_k: provider.transpose_key(64)?,
            trans_v: provider.transpose_quant_value()?,
            qk: provider.qk_softmax(&tile_param)?,
            av: provider.av_quant(&tile_param)?,
            tiles: provider.tile_registers()?,
            pool,
        };

        tracing::debug!(
            ?dims,
            threads = kernel.max_threads(),
            workspace_bytes = kernel.workspace_size(),
            qk = kernel.qk.name(),
            av = kernel.av.name(),
            "built dynamic-quant MHA kernel"
        );
        Ok(kernel)
    }

    pub fn dims(&self) -> MhaDims {
        self.dims
    }

    /// Worker threads of the execution pool.
    pub fn max_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Workspace bytes for the descriptor's dimensions. Dynamic dimensions
    /// count as zero; use [`Self::workspace_size_for`] once they are known.
    pub fn workspace_size(&self) -> usize {
        WorkspaceLayout::new(&self.dims, self.max_threads()).total_bytes()
    }

    /// Workspace bytes once dynamic dimensions are resolved.
    pub fn workspace_size_for(&self, dynamic: &DynamicDims) -> Result<usize> {
        let dims = self.dims.resolve(dynamic)?;
        Ok(WorkspaceLayout::new(&dims, self.max_threads()).total_bytes())
    }

    /// Run attention over the buffers of `args`.
    ///
    /// All argument checks happen before anything is written; once the
    /// parallel phases start the call cannot fail.
    pub fn execute(&self, args: MhaArgs<'_>) -> Result<()> {
        let MhaArgs {
            src_q,
            src_k,
            src_v,
            mask,
            q_scale,
            k_scale,
            v_scale,
            dst,
            dst_scale,
            workspace,
            dims: dynamic,
        } = args;

        let dims = self.dims.resolve(&dynamic)?;
        // Same slot order as `expected_shapes`.
        let lens = [
            src_q.len(),
            src_k.len(),
            src_v.len(),
            dst.len(),
            mask.len(),
            q_scale.len(),
            k_scale.len(),
            v_scale.len(),
            dst_scale.len(),
        ];
        for ((slot, shape), got) in expected_shapes(&dims).into_iter().zip(lens) {
            check_len(slot, got, Shape::from(shape).numel())?;
        }

        let layout = WorkspaceLayout::new(&dims, self.max_threads());
        let views = layout.split(workspace)?;
        if dims.is_degenerate() {
            tracing::trace!(?dims, "empty attention problem, nothing to do");
            return Ok(());
        }
        let (b, n) = (dims.batch_size, dims.seq_k);

        let sessions =
            WorkerSessions::new(views.softmax, layout.worker_scratch_bytes(), layout.threads);
        let mut kv = KvBuffers { k: views.k, v: views.v, v_scale: views.v_scale };

        self.pool.install(|| {
            tracing::trace!(?dims, "phase 1: transposing K/V");
            self.transform_kv(&layout, src_k, src_v, v_scale, &mut kv);
            let mask = prepare_mask(mask, views.mask, b, n);

            tracing::trace!(?dims, "phase 2: attention over query blocks");
            self.attend(&layout, &sessions, src_q, q_scale, k_scale, mask, &kv, dst, dst_scale);
        });

        if self.release_tiles {
            let released = sessions.release_all(&self.pool, &*self.tiles);
            tracing::trace!(released, "released tile registers");
        }
        Ok(())
    }

    fn transform_kv(
        &self,
        layout: &WorkspaceLayout,
        src_k: &[i8],
        src_v: &[i8],
        v_scale: &[f32],
        kv: &mut KvBuffers<'_>,
    ) {
        let MhaDims { batch_size: b, head_num: h, seq_k: n, head_size: d, .. } = layout.dims;
        let row_len = h * d;
        let d_pad64 = pad_to(d, 64);
        let n_pad64 = pad_to(n, 64);
        let v_live = 16 * pad_to(n, 4);
        let v_block = 16 * n_pad64;
        let (head_k, head_v, head_vs) =
            (layout.head_k_bytes(), layout.head_v_bytes(), layout.head_v_scale_len());

        let k = &mut kv.k[..b * h * head_k];
        let v = &mut kv.v[..b * h * head_v];
        let vs = &mut kv.v_scale[..b * h * head_vs];

        k.par_chunks_mut(head_k)
            .zip(v.par_chunks_mut(head_v))
            .zip(vs.par_chunks_mut(head_vs))
            .enumerate()
            .for_each(|(bh, ((tmp_k, tmp_v), tmp_vs))| {
                let (ib, ih) = (bh / h, bh % h);
                let base = ib * n * row_len + ih * d;

                for j in (0..n).step_by(ROW_BLOCK) {
                    self.trans_k.invoke(TransposeKeyArgs {
                        src: &src_k[base + j * row_len..],
                        dst: &mut tmp_k[j * d_pad64..],
                        ld_src: row_len,
                        rows: (n - j).min(ROW_BLOCK),
                        cols: d,
                    });
                }

                let row_scale = &v_scale[ib * n..(ib + 1) * n];
                let blocks = tmp_v.chunks_exact_mut(v_block).zip(tmp_vs.chunks_exact_mut(16));
                for (blk, (dst, dst_scale)) in blocks.enumerate() {
                    let j = blk * 16;
                    self.trans_v.invoke(TransposeQuantValueArgs {
                        src: &src_v[base + j..],
                        dst: &mut dst[..],
                        src_scale: row_scale,
                        dst_scale,
                        ld_src: row_len,
                        rows: n,
                        cols: (d - j).min(16),
                    });
                    dst[v_live..].fill(0);
                }
            });
    }

    #[allow(clippy::too_many_arguments)]
    fn attend(
        &self,
        layout: &WorkspaceLayout,
        sessions: &WorkerSessions<'_>,
        src_q: &[i8],
        q_scale: &[f32],
        k_scale: &[f32],
        mask: &[f32],
        kv: &KvBuffers<'_>,
        dst: &mut [i8],
        dst_scale: &mut [f32],
    ) {
        let MhaDims { batch_size: b, head_num: h, seq_q: m, seq_k: n, head_size: d } = layout.dims;
        let row_len = h * d;
        let n_pad64 = pad_to(n, 64);
        let mask_stride = layout.mask_stride();
        let (head_k, head_v, head_vs) =
            (layout.head_k_bytes(), layout.head_v_bytes(), layout.head_v_scale_len());
        let (k, v, v_scale) = (&*kv.k, &*kv.v, &*kv.v_scale);

        dst[..b * m * row_len]
            .par_chunks_mut(m * row_len)
            .zip(dst_scale[..b * m].par_chunks_mut(m))
            .enumerate()
            .for_each(|(ib, (dst_b, dst_scale_b))| {
                dst_b
                    .par_chunks_mut(ROW_BLOCK * row_len)
                    .zip(dst_scale_b.par_chunks_mut(ROW_BLOCK))
                    .enumerate()
                    .for_each(|(blk, (dst_blk, dst_scale_blk))| {
                        let row0 = ib * m + blk * ROW_BLOCK;
                        let rows = dst_scale_blk.len();

                        sessions.with_current(|session| {
                            session.ensure_tiles(&*self.tiles, &self.tile_config);
                            let scratch = session.scratch();

                            self.qk.invoke(QkSoftmaxArgs {
                                src0: &src_q[row0 * row_len..],
                                src1: &k[ib * h * head_k..],
                                scale_src0: &q_scale[row0..],
                                scale_src1: &k_scale[ib * n..],
                                bias: &mask[ib * mask_stride..],
                                dst: &mut scratch[..],
                                k: d,
                                n,
                                rows,
                                ld_src0: row_len,
                                ld_src1: 16 * pad_to(d, 64),
                                ld_dst: n_pad64,
                                batch: h,
                                batchstep_src0: d,
                                batchstep_src0_scale: 0,
                                batchstep_src1: head_k,
                                batchstep_src1_scale: 0,
                                batchstep_dst: 16 * n_pad64,
                            });

                            self.av.invoke(AvQuantArgs {
                                src0: scratch,
                                src1: &v[ib * h * head_v..],
                                scale_src1: &v_scale[ib * h * head_vs..],
                                dst: dst_blk,
                                dst_scale: dst_scale_blk,
                                k: n,
                                n: d,
                                rows,
                                ld_src0: n_pad64,
                                ld_src1: 16 * n_pad64,
                                ld_dst: row_len,
                                batch: h,
                                batchstep_src0: 16 * n_pad64,
                                batchstep_src1: head_v,
                                batchstep_src1_scale: head_vs,
                                batchstep_dst: d,
                            });
                        });
                    });
            });
    }
}

/// Workspace regions written by phase 1 and read by phase 2.
struct KvBuffers<'w> {
    k: &'w mut [i8],
    v: &'w mut [i8],
    v_scale: &'w mut [f32],
}

fn check_len(slot: Slot, got: usize, needed: usize) -> Result<()> {
    if got < needed {
        return Err(MhaError::BufferTooSmall { slot, needed, got });
    }
    Ok(())
}
