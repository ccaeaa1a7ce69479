//! Benchmark: fused dynamic-quantized MHA on the portable micro-kernels.

use qmha::prelude::*;
use std::time::Instant;

struct Inputs {
    q: Vec<i8>,
    k: Vec<i8>,
    v: Vec<i8>,
    mask: Vec<f32>,
    q_scale: Vec<f32>,
    k_scale: Vec<f32>,
    v_scale: Vec<f32>,
}

fn inputs(b: usize, h: usize, m: usize, n: usize, d: usize) -> Inputs {
    let s8 = |len: usize, mul: usize| -> Vec<i8> {
        (0..len).map(|i| ((i * mul + 3) % 255) as i32 as u8 as i8).collect()
    };
    let unit = (16.0 / (d as f32 * 127.0 * 127.0)).sqrt();
    Inputs {
        q: s8(b * m * h * d, 7),
        k: s8(b * n * h * d, 11),
        v: s8(b * n * h * d, 13),
        mask: vec![0.0; b * n],
        q_scale: vec![unit; b * m],
        k_scale: vec![unit; b * n],
        v_scale: vec![0.02; b * n],
    }
}

fn bench_mha(kernel: &DynamicQuantMha, x: &Inputs, iters: usize) -> f64 {
    let dims = kernel.dims();
    let mut dst = vec![0i8; x.q.len()];
    let mut dst_scale = vec![0.0f32; dims.batch_size * dims.seq_q];
    let mut ws = Workspace::new(kernel.workspace_size());

    let start = Instant::now();
    for _ in 0..iters {
        kernel
            .execute(MhaArgs {
                src_q: &x.q,
                src_k: &x.k,
                src_v: &x.v,
                mask: &x.mask,
                q_scale: &x.q_scale,
                k_scale: &x.k_scale,
                v_scale: &x.v_scale,
                dst: &mut dst,
                dst_scale: &mut dst_scale,
                workspace: ws.as_bytes_mut(),
                dims: DynamicDims::default(),
            })
            .unwrap();
    }
    start.elapsed().as_secs_f64() / iters as f64
}

fn gops(b: usize, h: usize, m: usize, n: usize, d: usize, secs: f64) -> f64 {
    // Two matmuls of M×N×D per (batch, head).
    (4.0 * (b * h * m * n * d) as f64) / secs / 1e9
}

fn main() {
    tracing_subscriber::fmt::init();
    let host = IsaCapability::detect();
    println!("=== qmha Fused Attention Benchmark ===");
    println!("ISA: {} (amx_int8={})\n", host.best_tier(), host.amx_int8);
    // The portable micro-kernels run anywhere; validate as an AMX host.
    let isa = IsaCapability::amx();

    let shapes: &[(usize, usize, usize, usize, usize)] = &[
        (1, 8, 64, 64, 64),
        (1, 12, 128, 128, 64),
        (2, 12, 128, 200, 64),
        (1, 16, 256, 256, 64),
        (1, 16, 384, 384, 80),
    ];

    println!("{:<24} {:>10} {:>12} {:>10} {:>10}",
        "B×H×M×N×D", "Threads", "Time (ms)", "GOP/s", "WS (KiB)");
    println!("{}", "-".repeat(70));

    for &(b, h, m, n, d) in shapes {
        let x = inputs(b, h, m, n, d);
        let iters = if m * n <= 128 * 128 { 20 } else { 5 };

        for threads in [1, 4] {
            let cfg = MhaConfig {
                num_threads: Some(threads),
                ..MhaConfig::new(b, h, m, n, d)
            };
            let desc = DynamicQuantMhaDesc::new(&cfg.op_desc(), &isa).unwrap();
            let kernel = DynamicQuantMha::new(desc, &cfg.executor_config()).unwrap();

            let secs = bench_mha(&kernel, &x, iters);
            println!("{:<24} {:>10} {:>10.3}ms {:>10.2} {:>10}",
                format!("{}x{}x{}x{}x{}", b, h, m, n, d),
                threads,
                secs * 1000.0,
                gops(b, h, m, n, d, secs),
                kernel.workspace_size() / 1024,
            );
        }
    }
}
