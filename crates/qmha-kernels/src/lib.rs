//! # qmha-kernels
//!
//! Hardware-facing building blocks for the fused attention kernel.
//!
//! Provides:
//! - Runtime ISA capability detection (AVX-512, AMX tile/int8/bf16)
//! - The 16×16×64 tile-register configuration and its load/release micro-ops
//! - Object-safe contracts for the four tiled micro-kernels
//! - Portable reference micro-kernels honoring the accelerator data layouts
//! - Symmetric int8/u8 quantization helpers and the approximate exponential

pub mod isa;
pub mod microkernel;
pub mod quantize;
pub mod reference;
pub mod tile;

pub use isa::IsaCapability;
pub use microkernel::{
    AvQuant, AvQuantArgs, KernelProvider, QkSoftmax, QkSoftmaxArgs, TransposeKey,
    TransposeKeyArgs, TransposeQuantValue, TransposeQuantValueArgs,
};
pub use reference::ReferenceKernels;
pub use tile::{EmulatedTileRegisters, TileConfig, TileParam, TileRegisters};
