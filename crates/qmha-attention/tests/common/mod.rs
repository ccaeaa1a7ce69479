//! Shared fixtures: deterministic problems, an fp32 reference, and
//! helpers for building and running kernels.

#![allow(dead_code)]

use qmha_attention::prelude::*;
use qmha_core::Result;
use qmha_kernels::quantize::dequantize_s8;
use qmha_kernels::{IsaCapability, KernelProvider};

/// Quantized inputs of one attention problem, dense row-major.
#[derive(Debug, Clone)]
pub struct Problem {
    pub dims: MhaDims,
    pub q: Vec<i8>,
    pub k: Vec<i8>,
    pub v: Vec<i8>,
    pub mask: Vec<f32>,
    pub q_scale: Vec<f32>,
    pub k_scale: Vec<f32>,
    pub v_scale: Vec<f32>,
}

struct XorShift(u32);

impl XorShift {
    fn next(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    fn s8(&mut self) -> i8 {
        ((self.next() % 255) as i32 - 127) as i8
    }

    /// Uniform in [lo, hi).
    fn f32(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * (self.next() % 1_000_000) as f32 / 1_000_000.0
    }
}

impl Problem {
    /// All-zero tensors with unit scales and a zero mask.
    pub fn zeros(dims: MhaDims) -> Self {
        let MhaDims { batch_size: b, head_num: h, seq_q: m, seq_k: n, head_size: d } = dims;
        Self {
            dims,
            q: vec![0; b * m * h * d],
            k: vec![0; b * n * h * d],
            v: vec![0; b * n * h * d],
            mask: vec![0.0; b * n],
            q_scale: vec![1.0; b * m],
            k_scale: vec![1.0; b * n],
            v_scale: vec![1.0; b * n],
        }
    }

    /// Pseudo-random problem whose scores stay within ±30.
    pub fn random(dims: MhaDims, seed: u32) -> Self {
        let mut rng = XorShift(seed.max(1));
        let mut p = Self::zeros(dims);
        for x in p.q.iter_mut().chain(p.k.iter_mut()).chain(p.v.iter_mut()) {
            *x = rng.s8();
        }
        let unit = (30.0 / (dims.head_size as f32 * 127.0 * 127.0)).sqrt();
        for s in p.q_scale.iter_mut().chain(p.k_scale.iter_mut()) {
            *s = unit * rng.f32(0.75, 1.0);
        }
        for s in p.v_scale.iter_mut() {
            *s = rng.f32(0.01, 0.03);
        }
        for x in p.mask.iter_mut() {
            *x = rng.f32(-2.0, 0.0);
        }
        p
    }

    pub fn out_len(&self) -> usize {
        let d = self.dims;
        d.batch_size * d.seq_q * d.head_num * d.head_size
    }

    /// Largest dequantized value magnitude in V.
    pub fn v_abs_max(&self) -> f32 {
        let row = self.dims.head_num * self.dims.head_size;
        self.v
            .iter()
            .enumerate()
            .map(|(i, &x)| (x as f32 * self.v_scale[i / row]).abs())
            .fold(0.0, f32::max)
    }
}

/// Exact fp32 attention over the dequantized inputs, `{B, M, H, D}`.
pub fn reference_attention(p: &Problem) -> Vec<f32> {
    let MhaDims { batch_size: b, head_num: h, seq_q: m, seq_k: n, head_size: d } = p.dims;
    let row = h * d;
    let mut out = vec![0.0f32; p.out_len()];
    let mut probs = vec![0.0f32; n];

    for ib in 0..b {
        for im in 0..m {
            for ih in 0..h {
                let q = &p.q[(ib * m + im) * row + ih * d..][..d];
                for (j, pj) in probs.iter_mut().enumerate() {
                    let k = &p.k[(ib * n + j) * row + ih * d..][..d];
                    let dot: i32 = q.iter().zip(k).map(|(&a, &b)| a as i32 * b as i32).sum();
                    let scale = p.q_scale[ib * m + im] * p.k_scale[ib * n + j];
                    *pj = dot as f32 * scale + p.mask[ib * n + j];
                }
                let max = probs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                let sum: f32 = probs.iter_mut().map(|x| { *x = (*x - max).exp(); *x }).sum();

                let o = &mut out[(ib * m + im) * row + ih * d..][..d];
                for (j, &pj) in probs.iter().enumerate() {
                    let vs = p.v_scale[ib * n + j];
                    let v = &p.v[(ib * n + j) * row + ih * d..][..d];
                    for (oc, &vc) in o.iter_mut().zip(v) {
                        *oc += pj / sum * vc as f32 * vs;
                    }
                }
            }
        }
    }
    out
}

/// Dequantize a `{B, M, H, D}` output with its `{B, M}` row scales.
pub fn dequantize(dst: &[i8], dst_scale: &[f32], row_len: usize) -> Vec<f32> {
    dst.chunks_exact(row_len)
        .zip(dst_scale)
        .flat_map(|(row, &scale)| dequantize_s8(row, scale))
        .collect()
}

pub fn assert_close(a: &[f32], b: &[f32], tol: f32) {
    assert_eq!(a.len(), b.len(), "length mismatch: {} vs {}", a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        assert!(
            (x - y).abs() <= tol,
            "element {} differs: {} vs {} (tol={})",
            i, x, y, tol
        );
    }
}

/// Route kernel logs to the test harness; `RUST_LOG=qmha_attention=trace`
/// shows the per-call phases.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn build(cfg: &MhaConfig) -> DynamicQuantMha {
    init_tracing();
    let desc = DynamicQuantMhaDesc::new(&cfg.op_desc(), &IsaCapability::amx()).unwrap();
    DynamicQuantMha::new(desc, &cfg.executor_config()).unwrap()
}

pub fn build_with(cfg: &MhaConfig, provider: &dyn KernelProvider) -> Result<DynamicQuantMha> {
    init_tracing();
    let desc = DynamicQuantMhaDesc::new(&cfg.op_desc(), &IsaCapability::amx())?;
    DynamicQuantMha::with_provider(desc, &cfg.executor_config(), provider)
}

/// Dynamic-dim values matching `dims` exactly.
pub fn dynamic_for(dims: MhaDims) -> DynamicDims {
    DynamicDims {
        batch_size: Some(dims.batch_size as i32),
        head_num: Some(dims.head_num as i32),
        head_size: Some(dims.head_size as i32),
        seq_q: Some(dims.seq_q as i32),
        seq_k: Some(dims.seq_k as i32),
    }
}

/// Run `p` with a freshly allocated workspace.
pub fn run(kernel: &DynamicQuantMha, p: &Problem) -> Result<(Vec<i8>, Vec<f32>)> {
    let dynamic = dynamic_for(p.dims);
    let mut ws = Workspace::new(kernel.workspace_size_for(&dynamic)?);
    run_with(kernel, p, ws.as_bytes_mut())
}

pub fn run_with(
    kernel: &DynamicQuantMha,
    p: &Problem,
    workspace: &mut [u8],
) -> Result<(Vec<i8>, Vec<f32>)> {
    let mut dst = vec![0i8; p.out_len()];
    let mut dst_scale = vec![0.0f32; p.dims.batch_size * p.dims.seq_q];
    kernel.execute(MhaArgs {
        src_q: &p.q,
        src_k: &p.k,
        src_v: &p.v,
        mask: &p.mask,
        q_scale: &p.q_scale,
        k_scale: &p.k_scale,
        v_scale: &p.v_scale,
        dst: &mut dst,
        dst_scale: &mut dst_scale,
        workspace,
        dims: dynamic_for(p.dims),
    })?;
    Ok((dst, dst_scale))
}
