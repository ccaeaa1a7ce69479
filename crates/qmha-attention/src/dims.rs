//! Problem dimensions and their call-time resolution.

use qmha_core::{MhaError, OperatorDesc, Result, Slot};
use serde::{Deserialize, Serialize};

/// The (batch, heads, seq_q, seq_k, head_size) quintuple.
///
/// A zero marks a dimension that is only known at call time and comes
/// from the matching dynamic-shape scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MhaDims {
    pub batch_size: usize,
    pub head_num: usize,
    /// Query length (M).
    pub seq_q: usize,
    /// Key/value length (N).
    pub seq_k: usize,
    pub head_size: usize,
}

/// Call-time values of the dynamic-shape scalar slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DynamicDims {
    pub batch_size: Option<i32>,
    pub head_num: Option<i32>,
    pub head_size: Option<i32>,
    pub seq_q: Option<i32>,
    pub seq_k: Option<i32>,
}

impl MhaDims {
    pub fn new(
        batch_size: usize,
        head_num: usize,
        seq_q: usize,
        seq_k: usize,
        head_size: usize,
    ) -> Self {
        Self { batch_size, head_num, seq_q, seq_k, head_size }
    }

    /// Read the dimensions off the `{B, M, H, D}` query and `{B, N, H, D}`
    /// key shapes.
    pub fn from_op_desc(desc: &OperatorDesc) -> Result<Self> {
        let q = desc.shape(Slot::SrcQ);
        let k = desc.shape(Slot::SrcK);
        if q.ndim() != 4 {
            return Err(MhaError::ShapeMismatch {
                slot: Slot::SrcQ,
                expected: vec![0, 0, 0, 0],
                got: q.dims().to_vec(),
            });
        }
        if k.ndim() != 4 {
            return Err(MhaError::ShapeMismatch {
                slot: Slot::SrcK,
                expected: vec![0, 0, 0, 0],
                got: k.dims().to_vec(),
            });
        }
        let q = q.dims();
        Ok(Self {
            batch_size: q[0],
            head_num: q[2],
            seq_q: q[1],
            seq_k: k.dims()[1],
            head_size: q[3],
        })
    }

    /// Each dimension paired with the dynamic-shape slot that overrides it.
    pub fn with_slots(&self) -> [(usize, Slot); 5] {
        [
            (self.batch_size, Slot::BatchSize),
            (self.head_num, Slot::HeadNum),
            (self.head_size, Slot::HeadSize),
            (self.seq_q, Slot::M),
            (self.seq_k, Slot::N),
        ]
    }

    /// Whether every dimension is known ahead of time.
    pub fn is_static(&self) -> bool {
        self.with_slots().iter().all(|&(d, _)| d > 0)
    }

    /// Whether the problem has no output elements or nothing to attend to.
    pub fn is_degenerate(&self) -> bool {
        self.with_slots().iter().any(|&(d, _)| d == 0)
    }

    /// Replace every zero dimension with its call-time value.
    pub fn resolve(&self, dynamic: &DynamicDims) -> Result<Self> {
        let pick = |fixed: usize, runtime: Option<i32>, slot: Slot| -> Result<usize> {
            if fixed > 0 {
                return Ok(fixed);
            }
            runtime
                .and_then(|v| usize::try_from(v).ok())
                .ok_or(MhaError::MissingDynamicDim(slot))
        };
        Ok(Self {
            batch_size: pick(self.batch_size, dynamic.batch_size, Slot::BatchSize)?,
            head_num: pick(self.head_num, dynamic.head_num, Slot::HeadNum)?,
            seq_q: pick(self.seq_q, dynamic.seq_q, Slot::M)?,
            seq_k: pick(self.seq_k, dynamic.seq_k, Slot::N)?,
            head_size: pick(self.head_size, dynamic.head_size, Slot::HeadSize)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qmha_core::{DType, TensorDesc};

    #[test]
    fn test_from_op_desc() {
        let desc = OperatorDesc::new()
            .with_tensor(Slot::SrcQ, TensorDesc::new([2, 32, 4, 64], DType::I8))
            .with_tensor(Slot::SrcK, TensorDesc::new([2, 20, 4, 64], DType::I8));
        let dims = MhaDims::from_op_desc(&desc).unwrap();
        assert_eq!(dims, MhaDims::new(2, 4, 32, 20, 64));
        assert!(dims.is_static());
    }

    #[test]
    fn test_from_op_desc_rejects_rank() {
        let desc =
            OperatorDesc::new().with_tensor(Slot::SrcQ, TensorDesc::new([32, 64], DType::I8));
        assert!(matches!(
            MhaDims::from_op_desc(&desc),
            Err(MhaError::ShapeMismatch { slot: Slot::SrcQ, .. })
        ));
    }

    #[test]
    fn test_resolve_prefers_static() {
        let dims = MhaDims::new(2, 4, 32, 20, 64);
        let dynamic = DynamicDims { batch_size: Some(7), seq_k: Some(9), ..Default::default() };
        assert_eq!(dims.resolve(&dynamic).unwrap(), dims);
    }

    #[test]
    fn test_resolve_dynamic() {
        let dims = MhaDims::new(0, 4, 0, 0, 64);
        assert!(!dims.is_static());
        let dynamic = DynamicDims {
            batch_size: Some(3),
            seq_q: Some(17),
            seq_k: Some(20),
            ..Default::default()
        };
        assert_eq!(dims.resolve(&dynamic).unwrap(), MhaDims::new(3, 4, 17, 20, 64));
    }

    #[test]
    fn test_resolve_missing() {
        let dims = MhaDims::new(2, 0, 16, 16, 64);
        assert!(matches!(
            dims.resolve(&DynamicDims::default()),
            Err(MhaError::MissingDynamicDim(Slot::HeadNum))
        ));
        let negative = DynamicDims { head_num: Some(-1), ..Default::default() };
        assert!(dims.resolve(&negative).is_err());
    }
}
