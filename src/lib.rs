//! # qmha
//!
//! Fused, dynamically quantized multi-head attention for CPUs with an 8-bit
//! tile-matmul extension.
//!
//! ```rust,no_run
//! use qmha::prelude::*;
//!
//! let cfg = MhaConfig::from_json_str(r#"{
//!     "batch_size": 1, "head_num": 4, "seq_q": 32, "seq_k": 32, "head_size": 64
//! }"#).unwrap();
//! let desc = DynamicQuantMhaDesc::new(&cfg.op_desc(), IsaCapability::detect()).unwrap();
//! let kernel = DynamicQuantMha::new(desc, &cfg.executor_config()).unwrap();
//! let mut ws = Workspace::new(kernel.workspace_size());
//! # let _ = &mut ws;
//! ```

pub use qmha_attention as attention;
pub use qmha_core as core;
pub use qmha_kernels as kernels;

pub mod prelude {
    pub use qmha_attention::prelude::*;
    pub use qmha_core::prelude::*;
    pub use qmha_kernels::IsaCapability;
}
