//! Tensor slot and operator descriptors.
//!
//! An operator is described by one `TensorDesc` per named slot plus a
//! string attribute map, mirroring how frameworks hand kernels their
//! metadata before any data exists.

use std::collections::BTreeMap;
use std::fmt;

use crate::{DType, Shape};

/// Named tensor slots of the dynamic-quantized attention operator.
///
/// The discriminants are the slot indices of the operator descriptor and
/// of runtime data tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    SrcQ = 0,
    SrcK,
    SrcV,
    Dst,
    BinaryAdd,
    QScale,
    KScale,
    VScale,
    DstScale,
    QZp,
    KZp,
    VZp,
    DstZp,
    /// Static per-channel output scale.
    SrcDstScale,
    /// Static per-channel output zero point.
    SrcDstZp,
    BatchSize,
    HeadNum,
    HeadSize,
    M,
    N,
    Workspace,
}

impl Slot {
    pub const COUNT: usize = Slot::Workspace as usize + 1;


    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Slot::SrcQ => "src_q",
            Slot::SrcK => "src_k",
            Slot::SrcV => "src_v",
            Slot::Dst => "dst",
            Slot::BinaryAdd => "binary_add",
            Slot::QScale => "q_scale",
            Slot::KScale => "k_scale",
            Slot::VScale => "v_scale",
            Slot::DstScale => "dst_scale",
            Slot::QZp => "q_zp",
            Slot::KZp => "k_zp",
            Slot::VZp => "v_zp",
            Slot::DstZp => "dst_zp",
            Slot::SrcDstScale => "src_dst_scale",
            Slot::SrcDstZp => "src_dst_zp",
            Slot::BatchSize => "batch_size",
            Slot::HeadNum => "head_num",
            Slot::HeadSize => "head_size",
            Slot::M => "m",
            Slot::N => "n",
            Slot::Workspace => "workspace",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shape and element type of one tensor slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDesc {
    shape: Shape,
    dtype: DType,
}

impl TensorDesc {
    pub fn new(shape: impl Into<Shape>, dtype: DType) -> Self {
        Self {
            shape: shape.into(),
            dtype,
        }
    }

    /// Descriptor of an absent slot.
    pub fn empty() -> Self {
        Self {
            shape: Shape::empty(),
            dtype: DType::U8,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }
}

impl Default for TensorDesc {
    fn default() -> Self {
        Self::empty()
    }
}

/// Operator descriptor: one tensor descriptor per slot plus attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorDesc {
    tensors: Vec<TensorDesc>,
    attrs: BTreeMap<String, String>,
}

impl OperatorDesc {
    /// A descriptor with every slot absent and no attributes.
    pub fn new() -> Self {
        Self {
            tensors: vec![TensorDesc::empty(); Slot::COUNT],
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_tensor(mut self, slot: Slot, desc: TensorDesc) -> Self {
        self.set_tensor(slot, desc);
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn set_tensor(&mut self, slot: Slot, desc: TensorDesc) {
        self.tensors[slot.index()] = desc;
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn tensor(&self, slot: Slot) -> &TensorDesc {
        &self.tensors[slot.index()]
    }

    pub fn shape(&self, slot: Slot) -> &Shape {
        self.tensors[slot.index()].shape()
    }

    pub fn dtype(&self, slot: Slot) -> DType {
        self.tensors[slot.index()].dtype()
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }
}

impl Default for OperatorDesc {
    fn default() -> Self {
        Self::new()
    }
}
