use crate::{DType, Slot};

/// Errors raised while configuring or launching the attention kernel.
///
/// Everything except the buffer/workspace variants is a configuration
/// rejection: the kernel cannot be built for this descriptor or host.
#[derive(Debug, thiserror::Error)]
pub enum MhaError {
    #[error("unsupported ISA: {0} is not available on this host")]
    UnsupportedIsa(&'static str),

    #[error("kernel requires attribute `{key}` = \"{expected}\"")]
    MissingAttr { key: String, expected: String },

    #[error("shape mismatch on `{slot}`: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        slot: Slot,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("dimension `{0}` is neither static nor declared as a dynamic {{1}} s32 scalar")]
    UnresolvedDim(Slot),

    #[error("slot `{0}` must be empty for this kernel")]
    UnexpectedTensor(Slot),

    #[error("unsupported dtype on `{slot}`: expected {expected}, got {dtype}")]
    UnsupportedDType {
        slot: Slot,
        dtype: DType,
        expected: DType,
    },

    #[error("failed to build micro-kernel `{kernel}`: {reason}")]
    KernelBuild { kernel: &'static str, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("dynamic dimension `{0}` was not supplied at call time")]
    MissingDynamicDim(Slot),

    #[error("buffer `{slot}` too small: need {needed} elements, got {got}")]
    BufferTooSmall {
        slot: Slot,
        needed: usize,
        got: usize,
    },

    #[error("workspace too small: need {needed} bytes, got {got}")]
    WorkspaceTooSmall { needed: usize, got: usize },

    #[error("buffer `{0}` is not aligned for its element type")]
    MisalignedBuffer(&'static str),
}

impl MhaError {
    /// Whether this error rejects the configuration, as opposed to a
    /// malformed call on an already-built kernel.
    pub fn is_configuration(&self) -> bool {
        !matches!(
            self,
            MhaError::MissingDynamicDim(_)
                | MhaError::BufferTooSmall { .. }
                | MhaError::WorkspaceTooSmall { .. }
                | MhaError::MisalignedBuffer(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_slot() {
        let e = MhaError::UnsupportedDType {
            slot: Slot::KScale,
            dtype: DType::F16,
            expected: DType::F32,
        };
        assert_eq!(e.to_string(), "unsupported dtype on `k_scale`: expected f32, got f16");

        let e = MhaError::UnresolvedDim(Slot::HeadNum);
        assert!(e.to_string().contains("head_num"));
    }

    #[test]
    fn test_error_classes() {
        assert!(MhaError::UnsupportedIsa("amx-int8").is_configuration());
        assert!(MhaError::UnexpectedTensor(Slot::QZp).is_configuration());
        assert!(!MhaError::WorkspaceTooSmall { needed: 2, got: 1 }.is_configuration());
        assert!(!MhaError::MissingDynamicDim(Slot::N).is_configuration());
    }
}
