//! Runtime ISA capability detection.
//!
//! AMX support is read straight from CPUID leaf 7 since the standard
//! library's feature macro does not cover the tile extensions.

use std::sync::OnceLock;

/// ISA extensions relevant to the attention kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IsaCapability {
    pub avx512f: bool,
    pub amx_tile: bool,
    pub amx_int8: bool,
    pub amx_bf16: bool,
}

static DETECTED: OnceLock<IsaCapability> = OnceLock::new();

impl IsaCapability {
    /// Detect capabilities of the current CPU.
    pub fn detect() -> &'static IsaCapability {
        DETECTED.get_or_init(|| {
            let cap = Self::read_cpuid();
            tracing::debug!(
                avx512f = cap.avx512f,
                amx_tile = cap.amx_tile,
                amx_int8 = cap.amx_int8,
                amx_bf16 = cap.amx_bf16,
                "detected ISA capabilities"
            );
            cap
        })
    }

    /// Capability set of an AMX-int8 capable host.
    pub fn amx() -> Self {
        IsaCapability {
            avx512f: true,
            amx_tile: true,
            amx_int8: true,
            amx_bf16: true,
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[allow(unused_unsafe)]
    fn read_cpuid() -> Self {
        use std::arch::x86_64::{__cpuid_count, __get_cpuid_max};

        // SAFETY: CPUID is always present on x86_64.
        let (max_leaf, _) = unsafe { __get_cpuid_max(0) };
        let edx = if max_leaf >= 7 {
            unsafe { __cpuid_count(7, 0) }.edx
        } else {
            0
        };

        IsaCapability {
            avx512f: is_x86_feature_detected!("avx512f"),
            amx_bf16: edx & (1 << 22) != 0,
            amx_tile: edx & (1 << 24) != 0,
            amx_int8: edx & (1 << 25) != 0,
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn read_cpuid() -> Self {
        IsaCapability::default()
    }

    /// Best available tier as a human-readable string.
    pub fn best_tier(&self) -> &'static str {
        if self.amx_int8 {
            "AMX-INT8"
        } else if self.amx_tile {
            "AMX"
        } else if self.avx512f {
            "AVX-512"
        } else {
            "scalar"
        }
    }
}
