//! Runtime values for the functional model
//!
//! `Bits` is a fixed-width bit-vector value with wrap-around arithmetic,
//! masked to its width after every operation. Widths are limited to 64
//! bits; the type checker guarantees operand widths agree before any of
//! these operations run.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A fixed-width bit-vector value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bits {
    width: u32,
    value: u64,
}

fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

impl Bits {
    /// Construct a value, truncating to `width` bits
    pub fn new(width: u32, value: u64) -> Self {
        debug_assert!((1..=64).contains(&width));
        Self {
            width,
            value: value & mask(width),
        }
    }

    pub fn zero(width: u32) -> Self {
        Self::new(width, 0)
    }

    pub fn from_bool(b: bool) -> Self {
        Self::new(1, b as u64)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn is_nonzero(&self) -> bool {
        self.value != 0
    }

    pub fn add(self, other: Bits) -> Bits {
        Bits::new(self.width, self.value.wrapping_add(other.value))
    }

    pub fn sub(self, other: Bits) -> Bits {
        Bits::new(self.width, self.value.wrapping_sub(other.value))
    }

    pub fn and(self, other: Bits) -> Bits {
        Bits::new(self.width, self.value & other.value)
    }

    pub fn or(self, other: Bits) -> Bits {
        Bits::new(self.width, self.value | other.value)
    }

    pub fn not(self) -> Bits {
        Bits::new(self.width, !self.value)
    }

    /// Logical shift left; the result keeps this value's width
    pub fn shl(self, amount: u64) -> Bits {
        if amount >= 64 {
            Bits::zero(self.width)
        } else {
            Bits::new(self.width, self.value << amount)
        }
    }

    /// Logical shift right
    pub fn shr(self, amount: u64) -> Bits {
        if amount >= 64 {
            Bits::zero(self.width)
        } else {
            Bits::new(self.width, self.value >> amount)
        }
    }

    /// Extract bit `index` as a 1-bit value
    pub fn bit(self, index: u32) -> Bits {
        debug_assert!(index < self.width);
        Bits::from_bool((self.value >> index) & 1 == 1)
    }

    /// Replace bit `index`, returning the updated value
    pub fn with_bit(self, index: u32, bit: Bits) -> Bits {
        debug_assert!(index < self.width);
        let cleared = self.value & !(1u64 << index);
        Bits::new(self.width, cleared | ((bit.value & 1) << index))
    }

    /// `self` becomes the high bits, `low` the low bits
    pub fn concat(self, low: Bits) -> Bits {
        Bits::new(
            self.width + low.width,
            (self.value << low.width) | low.value,
        )
    }
}

impl std::fmt::Display for Bits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}'d{}", self.width, self.value)
    }
}

/// A runtime value flowing through a functional model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bits(Bits),
    /// A member of a user-defined enum
    Enum { enum_id: String, member: String },
    /// An encoded record, field name -> value
    Record(IndexMap<String, Value>),
    /// A register-file or array value
    Array(Vec<Value>),
}

impl Value {
    pub fn bits(width: u32, value: u64) -> Self {
        Value::Bits(Bits::new(width, value))
    }

    pub fn enumeration(enum_id: impl Into<String>, member: impl Into<String>) -> Self {
        Value::Enum {
            enum_id: enum_id.into(),
            member: member.into(),
        }
    }

    pub fn as_bits(&self) -> Option<Bits> {
        match self {
            Value::Bits(b) => Some(*b),
            _ => None,
        }
    }

    /// Short description for error messages
    pub fn describe(&self) -> String {
        match self {
            Value::Bits(b) => format!("BitVector<{}>", b.width()),
            Value::Enum { enum_id, .. } => format!("enum {}", enum_id),
            Value::Record(fields) => format!("record with {} fields", fields.len()),
            Value::Array(items) => format!("array of {} elements", items.len()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bits(b) => write!(f, "{}", b),
            Value::Enum { enum_id, member } => write!(f, "{}.{}", enum_id, member),
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping_arithmetic() {
        let a = Bits::new(16, 3);
        let b = Bits::new(16, 5);
        assert_eq!(a.sub(b), Bits::new(16, 65534));
        assert_eq!(a.add(b), Bits::new(16, 8));
    }

    #[test]
    fn test_masking() {
        assert_eq!(Bits::new(8, 0x1ff).value(), 0xff);
        assert_eq!(Bits::new(64, u64::MAX).value(), u64::MAX);
    }

    #[test]
    fn test_bit_extraction() {
        let v = Bits::new(16, 0xfffe);
        assert_eq!(v.bit(15), Bits::from_bool(true));
        assert_eq!(v.bit(0), Bits::from_bool(false));
    }

    #[test]
    fn test_with_bit() {
        let v = Bits::zero(8).with_bit(3, Bits::from_bool(true));
        assert_eq!(v.value(), 8);
        assert_eq!(v.with_bit(3, Bits::from_bool(false)), Bits::zero(8));
    }

    #[test]
    fn test_concat() {
        // concat(0b1, 0b01) = 0b101
        let high = Bits::new(1, 1);
        let low = Bits::new(2, 1);
        let joined = high.concat(low);
        assert_eq!(joined.width(), 3);
        assert_eq!(joined.value(), 0b101);
    }

    #[test]
    fn test_shift() {
        let lut = Bits::new(8, 0b0000_0110);
        assert_eq!(lut.shr(1).value(), 0b11);
        assert_eq!(lut.shr(1).bit(0), Bits::from_bool(true));
    }
}
