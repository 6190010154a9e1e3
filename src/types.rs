//! The qualified type system
//!
//! Abstract grammar, four strictly nested layers:
//!
//! ```text
//! BaseType        ::= BitVector(width) | Enum(id)
//! UnqualifiedType ::= BaseType
//!                   | Array(UnqualifiedType, size)
//!                   | Encoded((name : BaseType)+)
//! QualifiedType   ::= UnqualifiedType
//!                   | Register(QualifiedType)
//!                   | Configuration(QualifiedType)
//! TopLevelType    ::= Input(QualifiedType)
//!                   | Output(QualifiedType)
//!                   | Intermediate(QualifiedType)
//! ```
//!
//! Every type has one of two kinds: *nominal* (enumeration-valued,
//! comparable by value set) or *quantitative* (bit-vector-valued,
//! comparable by width). `Array` and `Encoded` are neither; they need
//! index- and field-specific rules.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A leaf type: fixed-width bit vector or user-defined enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseType {
    BitVector(u32),
    /// References a user-defined enum by name; the member set lives in the IR
    Enum(String),
}

impl std::fmt::Display for BaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BaseType::BitVector(w) => write!(f, "BitVector<{}>", w),
            BaseType::Enum(id) => write!(f, "enum {}", id),
        }
    }
}

/// Nominal (enum-valued) or quantitative (bit-vector-valued)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Nominal,
    Quantitative,
}

/// A type without storage qualifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnqualifiedType {
    Base(BaseType),
    Array(Box<UnqualifiedType>, usize),
    /// A record whose fields are packed into a single hardware word
    Encoded(IndexMap<String, BaseType>),
}

impl UnqualifiedType {
    pub fn bit_vector(width: u32) -> Self {
        UnqualifiedType::Base(BaseType::BitVector(width))
    }

    pub fn enumeration(id: impl Into<String>) -> Self {
        UnqualifiedType::Base(BaseType::Enum(id.into()))
    }

    /// Kind classification; `None` for arrays and encoded records
    pub fn kind(&self) -> Option<TypeKind> {
        match self {
            UnqualifiedType::Base(BaseType::BitVector(_)) => Some(TypeKind::Quantitative),
            UnqualifiedType::Base(BaseType::Enum(_)) => Some(TypeKind::Nominal),
            UnqualifiedType::Array(..) | UnqualifiedType::Encoded(_) => None,
        }
    }

    /// Width of a quantitative type
    pub fn width(&self) -> Option<u32> {
        match self {
            UnqualifiedType::Base(BaseType::BitVector(w)) => Some(*w),
            _ => None,
        }
    }

    /// Enum id of a nominal type
    pub fn enum_id(&self) -> Option<&str> {
        match self {
            UnqualifiedType::Base(BaseType::Enum(id)) => Some(id),
            _ => None,
        }
    }

    /// Assignment compatibility: nominal pairs need identical value sets,
    /// quantitative pairs need identical widths, anything else is rejected.
    pub fn assignable_from(&self, rhs: &UnqualifiedType) -> bool {
        match (self, rhs) {
            (
                UnqualifiedType::Base(BaseType::BitVector(a)),
                UnqualifiedType::Base(BaseType::BitVector(b)),
            ) => a == b,
            (
                UnqualifiedType::Base(BaseType::Enum(a)),
                UnqualifiedType::Base(BaseType::Enum(b)),
            ) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for UnqualifiedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnqualifiedType::Base(base) => write!(f, "{}", base),
            UnqualifiedType::Array(elem, size) => write!(f, "Array<{}, {}>", elem, size),
            UnqualifiedType::Encoded(fields) => {
                write!(f, "Encoded<")?;
                for (i, (name, base)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, base)?;
                }
                write!(f, ">")
            }
        }
    }
}

/// An unqualified type, possibly wrapped in nested storage qualifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualifiedType {
    Unqualified(UnqualifiedType),
    Register(Box<QualifiedType>),
    Configuration(Box<QualifiedType>),
}

/// Which qualifiers wrap a type, collected across all nesting levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Qualifiers {
    pub register: bool,
    pub configuration: bool,
}

impl QualifiedType {
    /// Strip all qualifiers
    pub fn unqualified(&self) -> &UnqualifiedType {
        match self {
            QualifiedType::Unqualified(t) => t,
            QualifiedType::Register(inner) | QualifiedType::Configuration(inner) => {
                inner.unqualified()
            }
        }
    }

    /// Collect the qualifier set across nesting
    pub fn qualifiers(&self) -> Qualifiers {
        match self {
            QualifiedType::Unqualified(_) => Qualifiers::default(),
            QualifiedType::Register(inner) => {
                let mut q = inner.qualifiers();
                q.register = true;
                q
            }
            QualifiedType::Configuration(inner) => {
                let mut q = inner.qualifiers();
                q.configuration = true;
                q
            }
        }
    }
}

impl std::fmt::Display for QualifiedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualifiedType::Unqualified(t) => write!(f, "{}", t),
            QualifiedType::Register(t) => write!(f, "Register<{}>", t),
            QualifiedType::Configuration(t) => write!(f, "Configuration<{}>", t),
        }
    }
}

/// A declaration's role in the interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopLevelType {
    Input(QualifiedType),
    Output(QualifiedType),
    Intermediate(QualifiedType),
}

impl TopLevelType {
    pub fn qualified(&self) -> &QualifiedType {
        match self {
            TopLevelType::Input(t) | TopLevelType::Output(t) | TopLevelType::Intermediate(t) => t,
        }
    }
}

impl std::fmt::Display for TopLevelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopLevelType::Input(t) => write!(f, "Input<{}>", t),
            TopLevelType::Output(t) => write!(f, "Output<{}>", t),
            TopLevelType::Intermediate(t) => write!(f, "Intermediate<{}>", t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            UnqualifiedType::bit_vector(16).kind(),
            Some(TypeKind::Quantitative)
        );
        assert_eq!(
            UnqualifiedType::enumeration("Op").kind(),
            Some(TypeKind::Nominal)
        );
        let array = UnqualifiedType::Array(Box::new(UnqualifiedType::bit_vector(8)), 4);
        assert_eq!(array.kind(), None);
    }

    #[test]
    fn test_nested_qualifiers() {
        // Configuration(Register(BitVector(8)))
        let ty = QualifiedType::Configuration(Box::new(QualifiedType::Register(Box::new(
            QualifiedType::Unqualified(UnqualifiedType::bit_vector(8)),
        ))));
        let q = ty.qualifiers();
        assert!(q.register);
        assert!(q.configuration);
        assert_eq!(ty.unqualified(), &UnqualifiedType::bit_vector(8));
    }

    #[test]
    fn test_assignability() {
        let bv16 = UnqualifiedType::bit_vector(16);
        let bv8 = UnqualifiedType::bit_vector(8);
        let op = UnqualifiedType::enumeration("Op");
        let flag = UnqualifiedType::enumeration("FlagSel");
        assert!(bv16.assignable_from(&UnqualifiedType::bit_vector(16)));
        assert!(!bv16.assignable_from(&bv8));
        assert!(op.assignable_from(&UnqualifiedType::enumeration("Op")));
        assert!(!op.assignable_from(&flag));
        assert!(!bv16.assignable_from(&op));
    }

    #[test]
    fn test_display() {
        let ty = QualifiedType::Register(Box::new(QualifiedType::Unqualified(
            UnqualifiedType::bit_vector(16),
        )));
        assert_eq!(ty.to_string(), "Register<BitVector<16>>");
    }
}
