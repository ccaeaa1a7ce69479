//! Descriptor validation for the dynamic-quantized attention kernel.
//!
//! Checks run in a fixed order and stop at the first failure: ISA,
//! attributes, dimensions and shapes, empty slots, dtypes.

use qmha_core::{DType, MhaError, OperatorDesc, Result, Slot};
use qmha_kernels::IsaCapability;

use crate::dims::MhaDims;

/// Attribute the kernel requires to be `"True"`.
pub const ATTR_APPROX_EXP: &str = "approx_exp";
/// Attribute the kernel requires to be `"False"`.
pub const ATTR_STABLE_SOFTMAX: &str = "stable_softmax";

const MUST_BE_EMPTY: [Slot; 6] = [
    Slot::QZp,
    Slot::KZp,
    Slot::VZp,
    Slot::DstZp,
    Slot::SrcDstScale,
    Slot::SrcDstZp,
];

const S8_SLOTS: [Slot; 4] = [Slot::SrcQ, Slot::SrcK, Slot::SrcV, Slot::Dst];

const F32_SLOTS: [Slot; 5] = [
    Slot::BinaryAdd,
    Slot::QScale,
    Slot::KScale,
    Slot::VScale,
    Slot::DstScale,
];

/// The dimensions of an operator descriptor that passed validation.
#[derive(Debug, Clone, Copy)]
pub struct DynamicQuantMhaDesc {
    dims: MhaDims,
}

impl DynamicQuantMhaDesc {
    /// Validate `op_desc` for execution on a host with capabilities `isa`.
    pub fn new(op_desc: &OperatorDesc, isa: &IsaCapability) -> Result<Self> {
        match Self::check(op_desc, isa) {
            Ok(dims) => {
                tracing::debug!(?dims, "dynamic-quant MHA descriptor accepted");
                Ok(Self { dims })
            }
            Err(err) => {
                tracing::debug!(%err, "dynamic-quant MHA descriptor rejected");
                Err(err)
            }
        }
    }

    pub fn dims(&self) -> MhaDims {
        self.dims
    }

    fn check(desc: &OperatorDesc, isa: &IsaCapability) -> Result<MhaDims> {
        if !isa.amx_int8 {
            return Err(MhaError::UnsupportedIsa("amx_int8"));
        }

        require_attr(desc, ATTR_APPROX_EXP, "True")?;
        require_attr(desc, ATTR_STABLE_SOFTMAX, "False")?;

        let dims = MhaDims::from_op_desc(desc)?;
        for (value, slot) in dims.with_slots() {
            if value == 0 {
                let scalar = desc.tensor(slot);
                if !scalar.shape().is_singleton() || scalar.dtype() != DType::I32 {
                    return Err(MhaError::UnresolvedDim(slot));
                }
            }
        }
        for (slot, expected) in expected_shapes(&dims) {
            let got = desc.shape(slot).dims();
            if got != expected.as_slice() {
                return Err(MhaError::ShapeMismatch {
                    slot,
                    expected,
                    got: got.to_vec(),
                });
            }
        }

        if let Some(&slot) = MUST_BE_EMPTY.iter().find(|&&s| !desc.tensor(s).is_empty()) {
            return Err(MhaError::UnexpectedTensor(slot));
        }

        check_dtypes(desc, &S8_SLOTS, DType::I8)?;
        check_dtypes(desc, &F32_SLOTS, DType::F32)?;

        Ok(dims)
    }
}

/// Whether the kernel can be built for `op_desc` on a host with `isa`.
pub fn is_supported(op_desc: &OperatorDesc, isa: &IsaCapability) -> bool {
    DynamicQuantMhaDesc::check(op_desc, isa).is_ok()
}

fn require_attr(desc: &OperatorDesc, key: &str, expected: &str) -> Result<()> {
    if desc.attr(key) == Some(expected) {
        Ok(())
    } else {
        Err(MhaError::MissingAttr {
            key: key.to_string(),
            expected: expected.to_string(),
        })
    }
}

fn check_dtypes(desc: &OperatorDesc, slots: &[Slot], expected: DType) -> Result<()> {
    for &slot in slots {
        let dtype = desc.dtype(slot);
        if dtype != expected {
            return Err(MhaError::UnsupportedDType { slot, dtype, expected });
        }
    }
    Ok(())
}

/// Shape every data slot must have for the given dimensions.
pub fn expected_shapes(dims: &MhaDims) -> [(Slot, Vec<usize>); 9] {
    let MhaDims { batch_size: b, head_num: h, seq_q: m, seq_k: n, head_size: d } = *dims;
    [
        (Slot::SrcQ, vec![b, m, h, d]),
        (Slot::SrcK, vec![b, n, h, d]),
        (Slot::SrcV, vec![b, n, h, d]),
        (Slot::Dst, vec![b, m, h, d]),
        (Slot::BinaryAdd, vec![b, 1, 1, n]),
        (Slot::QScale, vec![b, m]),
        (Slot::KScale, vec![b, n]),
        (Slot::VScale, vec![b, n]),
        (Slot::DstScale, vec![b, m]),
    ]
}
