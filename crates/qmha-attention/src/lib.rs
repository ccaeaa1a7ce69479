//! # qmha-attention
//!
//! Fused dynamic-quantized multi-head attention:
//! `softmax(Q·Kᵀ + mask)·V` over int8 tensors with per-row fp32 scales,
//! producing an int8 output with fresh per-row scales.
//!
//! Provides:
//! - Descriptor validation (`DynamicQuantMhaDesc`)
//! - Workspace sizing and partitioning (`WorkspaceLayout`, `Workspace`)
//! - The two-phase parallel executor (`DynamicQuantMha`)
//! - Serde-backed problem configuration (`MhaConfig`)

pub mod config;
pub mod dims;
pub mod executor;
pub mod mask;
pub mod prelude;
pub mod session;
pub mod validate;
pub mod workspace;

pub use config::{ExecutorConfig, MhaConfig};
pub use dims::{DynamicDims, MhaDims};
pub use executor::{DynamicQuantMha, MhaArgs};
pub use validate::{is_supported, DynamicQuantMhaDesc};
pub use workspace::{Workspace, WorkspaceLayout};
