//! # qmha-core
//!
//! Foundational types shared by the qmha kernel crates:
//! - Element types (`DType`) and shapes with inline storage (`Shape`)
//! - Tensor slot descriptors and the operator descriptor (`OperatorDesc`)
//! - The crate-wide error type (`MhaError`)

pub mod desc;
pub mod dtype;
pub mod error;
pub mod prelude;
pub mod shape;

pub use desc::{OperatorDesc, Slot, TensorDesc};
pub use dtype::DType;
pub use error::MhaError;
pub use shape::Shape;

pub type Result<T> = std::result::Result<T, MhaError>;

/// Round `x` up to the next multiple of `k`.
#[inline]
pub const fn pad_to(x: usize, k: usize) -> usize {
    (x + k - 1) / k * k
}
