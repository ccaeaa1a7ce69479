//! Problem and executor configuration.
//!
//! `MhaConfig` is the serde-facing description of one attention problem.
//! It builds the full operator descriptor the validator consumes and the
//! executor settings, so callers never assemble slot tables by hand.

use qmha_core::{DType, MhaError, OperatorDesc, Result, Slot, TensorDesc};
use serde::{Deserialize, Serialize};

use crate::dims::MhaDims;
use crate::validate::{expected_shapes, ATTR_APPROX_EXP, ATTR_STABLE_SOFTMAX};

/// Attention problem configuration. A zero dimension is dynamic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MhaConfig {
    #[serde(default, alias = "batch")]
    pub batch_size: usize,
    #[serde(default, alias = "num_heads")]
    pub head_num: usize,
    #[serde(default, alias = "m")]
    pub seq_q: usize,
    #[serde(default, alias = "n")]
    pub seq_k: usize,
    #[serde(default, alias = "head_dim")]
    pub head_size: usize,
    #[serde(default = "default_true")]
    pub approx_exp: bool,
    #[serde(default)]
    pub stable_softmax: bool,
    /// Worker threads; `None` uses rayon's default.
    #[serde(default)]
    pub num_threads: Option<usize>,
    #[serde(default = "default_true")]
    pub release_tiles: bool,
}

fn default_true() -> bool {
    true
}

/// Settings of the executor that are not part of the operator descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub num_threads: Option<usize>,
    /// Release tile registers on every worker at the end of each call.
    pub release_tiles: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { num_threads: None, release_tiles: true }
    }
}

impl MhaConfig {
    pub fn new(
        batch_size: usize,
        head_num: usize,
        seq_q: usize,
        seq_k: usize,
        head_size: usize,
    ) -> Self {
        Self {
            batch_size,
            head_num,
            seq_q,
            seq_k,
            head_size,
            approx_exp: true,
            stable_softmax: false,
            num_threads: None,
            release_tiles: true,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| MhaError::InvalidConfig(format!("failed to parse MHA config: {e}")))?;
        if cfg.num_threads == Some(0) {
            return Err(MhaError::InvalidConfig("num_threads must be positive".into()));
        }
        Ok(cfg)
    }

    pub fn dims(&self) -> MhaDims {
        MhaDims::new(self.batch_size, self.head_num, self.seq_q, self.seq_k, self.head_size)
    }

    /// Full operator descriptor for this problem.
    ///
    /// Data slots get their derived shapes with zeros left in place for
    /// dynamic dimensions; each dynamic dimension gets its `{1}` s32 scalar.
    pub fn op_desc(&self) -> OperatorDesc {
        let dims = self.dims();
        let mut desc = OperatorDesc::new()
            .with_attr(ATTR_APPROX_EXP, bool_attr(self.approx_exp))
            .with_attr(ATTR_STABLE_SOFTMAX, bool_attr(self.stable_softmax));

        for (slot, shape) in expected_shapes(&dims) {
            let dtype = match slot {
                Slot::SrcQ | Slot::SrcK | Slot::SrcV | Slot::Dst => DType::I8,
                _ => DType::F32,
            };
            desc.set_tensor(slot, TensorDesc::new(shape, dtype));
        }
        for (value, slot) in dims.with_slots() {
            if value == 0 {
                desc.set_tensor(slot, TensorDesc::new([1], DType::I32));
            }
        }
        desc
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            num_threads: self.num_threads,
            release_tiles: self.release_tiles,
        }
    }
}

fn bool_attr(v: bool) -> &'static str {
    if v { "True" } else { "False" }
}
