pub mod value;

#[cfg(any(test, feature = "proptest"))]
pub mod test;

pub use value::{HostScalar, ScalarValue};

/// Scalar data types a kernel parameter can declare.
///
/// Spellings and byte widths follow the accelerator-C conventions: `int` is
/// always 32 bits and `long` always 64, independent of the host ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray)]
#[cfg_attr(any(test, feature = "proptest"), derive(proptest_derive::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalarType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
}

impl ScalarType {
    /// Size of one value of this type in bytes.
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Char | Self::UChar => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Float => 4,
            Self::Long | Self::ULong | Self::Double => 8,
        }
    }

    /// The keyword that declares this type in kernel source.
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Char => "char",
            Self::UChar => "uchar",
            Self::Short => "short",
            Self::UShort => "ushort",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Long => "long",
            Self::ULong => "ulong",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    /// Parse a type keyword as it appears in kernel source.
    pub fn from_keyword(kw: &str) -> Option<Self> {
        use strum::VariantArray;
        Self::VARIANTS.iter().copied().find(|t| t.keyword() == kw)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Char | Self::Short | Self::Int | Self::Long)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UChar | Self::UShort | Self::UInt | Self::ULong)
    }

    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}
