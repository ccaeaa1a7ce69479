//! Convenience re-exports for building and running the attention kernel.
//!
//! ```rust
//! use qmha_attention::prelude::*;
//! ```

pub use crate::DynamicDims;
pub use crate::DynamicQuantMha;
pub use crate::DynamicQuantMhaDesc;
pub use crate::ExecutorConfig;
pub use crate::MhaArgs;
pub use crate::MhaConfig;
pub use crate::MhaDims;
pub use crate::Workspace;
pub use crate::WorkspaceLayout;
