//! Convenience re-exports for common qmha-core types.
//!
//! ```rust
//! use qmha_core::prelude::*;
//! ```

pub use crate::DType;
pub use crate::MhaError;
pub use crate::OperatorDesc;
pub use crate::Result;
pub use crate::Shape;
pub use crate::Slot;
pub use crate::TensorDesc;
