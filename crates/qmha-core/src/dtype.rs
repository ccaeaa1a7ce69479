use std::fmt;

/// Element types a tensor slot may declare.
///
/// The attention kernel only accepts `I8` activations and `F32` scales and
/// masks; the other variants exist so descriptors can express (and the
/// validator can reject) everything a framework might hand us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 16-bit IEEE 754 half-precision float
    F16,
    /// 16-bit Brain Float
    BF16,
    /// 32-bit IEEE 754 single-precision float
    F32,
    /// 64-bit IEEE 754 double-precision float
    F64,
    /// 8-bit signed integer
    I8,
    /// 8-bit unsigned integer
    U8,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
}

impl DType {
    /// Size in bytes of a single element.
    pub fn element_size(&self) -> usize {
        match self {
            DType::I8 | DType::U8 => 1,
            DType::F16 | DType::BF16 => 2,
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F16 => write!(f, "f16"),
            DType::BF16 => write!(f, "bf16"),
            DType::F32 => write!(f, "f32"),
            DType::F64 => write!(f, "f64"),
            DType::I8 => write!(f, "s8"),
            DType::U8 => write!(f, "u8"),
            DType::I32 => write!(f, "s32"),
            DType::I64 => write!(f, "s64"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_sizes() {
        assert_eq!(DType::F32.element_size(), 4);
        assert_eq!(DType::F64.element_size(), 8);
        assert_eq!(DType::BF16.element_size(), 2);
        assert_eq!(DType::I8.element_size(), 1);
        assert_eq!(DType::U8.element_size(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", DType::F32), "f32");
        assert_eq!(format!("{}", DType::I8), "s8");
        assert_eq!(format!("{}", DType::I32), "s32");
    }
}
