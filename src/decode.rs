//! Decode specification verification
//!
//! A decode specification fixes the binary encoding of a compiled
//! description's configuration state: a code for every enum member and a
//! bit range inside the configuration word for every encoded field. The
//! compiler does not invent encodings; it verifies that a supplied
//! specification covers the description completely and consistently.
//!
//! Specifications are plain data and round-trip through JSON, so they can
//! be produced by external place-and-route tooling.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::ir::Ir;
use crate::types::{BaseType, UnqualifiedType};

/// Binary encoding of one enum type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumEncoding {
    /// Width of the code field holding a member of this enum
    pub bit_width: u32,
    /// Member name -> code
    pub mapping: IndexMap<String, u64>,
}

/// An inclusive bit range inside an encoded word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitRange {
    pub start: u32,
    pub end: u32,
}

impl BitRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of bits the range holds; zero when the range is inverted
    pub fn width(&self) -> u32 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }
}

/// Field placement for one encoded configuration word
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedLayout {
    /// Total width of the packed word
    pub bit_width: u32,
    /// Field name -> bit range
    pub fields: IndexMap<String, BitRange>,
}

/// A complete decode specification for one description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeSpec {
    /// Enum type name -> member encoding
    pub enums: IndexMap<String, EnumEncoding>,
    /// Declared name of an encoded value -> word layout
    pub encoded: IndexMap<String, EncodedLayout>,
}

impl DecodeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enum(
        mut self,
        name: impl Into<String>,
        bit_width: u32,
        mapping: impl IntoIterator<Item = (&'static str, u64)>,
    ) -> Self {
        self.enums.insert(
            name.into(),
            EnumEncoding {
                bit_width,
                mapping: mapping
                    .into_iter()
                    .map(|(m, c)| (m.to_string(), c))
                    .collect(),
            },
        );
        self
    }

    pub fn with_encoded(
        mut self,
        name: impl Into<String>,
        bit_width: u32,
        fields: impl IntoIterator<Item = (&'static str, u32, u32)>,
    ) -> Self {
        self.encoded.insert(
            name.into(),
            EncodedLayout {
                bit_width,
                fields: fields
                    .into_iter()
                    .map(|(f, s, e)| (f.to_string(), BitRange::new(s, e)))
                    .collect(),
            },
        );
        self
    }
}

/// Check a decode specification against a compiled description
pub fn verify(spec: &DecodeSpec, ir: &Ir) -> Result<(), DecodeError> {
    for (name, members) in &ir.enums {
        let encoding = spec
            .enums
            .get(name)
            .ok_or_else(|| DecodeError::MissingEnum(name.clone()))?;
        verify_enum(name, members, encoding)?;
    }
    for (name, ty) in ir
        .inputs
        .iter()
        .chain(&ir.outputs)
        .chain(&ir.intermediates)
    {
        verify_reachable(spec, name, ty.unqualified())?;
    }
    Ok(())
}

fn verify_enum(
    name: &str,
    members: &[String],
    encoding: &EnumEncoding,
) -> Result<(), DecodeError> {
    let declared: HashSet<&str> = members.iter().map(String::as_str).collect();
    let encoded: HashSet<&str> = encoding.mapping.keys().map(String::as_str).collect();
    if declared != encoded {
        return Err(DecodeError::MemberSetMismatch {
            name: name.to_string(),
        });
    }
    let mut seen = HashSet::new();
    for &code in encoding.mapping.values() {
        if !seen.insert(code) {
            return Err(DecodeError::DuplicateCode {
                name: name.to_string(),
                code,
            });
        }
        if encoding.bit_width < 64 && code >> encoding.bit_width != 0 {
            return Err(DecodeError::CodeTooWide {
                name: name.to_string(),
                code,
                bit_width: encoding.bit_width,
            });
        }
    }
    Ok(())
}

/// Walk a declared type and verify the layout of every encoded word it
/// contains. Array elements share their declaration's layout.
fn verify_reachable(
    spec: &DecodeSpec,
    name: &str,
    ty: &UnqualifiedType,
) -> Result<(), DecodeError> {
    match ty {
        UnqualifiedType::Base(_) => Ok(()),
        UnqualifiedType::Array(elem, _) => verify_reachable(spec, name, elem),
        UnqualifiedType::Encoded(fields) => {
            let layout = spec
                .encoded
                .get(name)
                .ok_or_else(|| DecodeError::MissingEncoded(name.to_string()))?;
            for (field, base) in fields {
                verify_field(spec, name, field, base, layout)?;
            }
            Ok(())
        }
    }
}

fn verify_field(
    spec: &DecodeSpec,
    name: &str,
    field: &str,
    base: &BaseType,
    layout: &EncodedLayout,
) -> Result<(), DecodeError> {
    let range = layout
        .fields
        .get(field)
        .ok_or_else(|| DecodeError::MissingField {
            name: name.to_string(),
            field: field.to_string(),
        })?;
    if range.end < range.start {
        return Err(DecodeError::InvalidRange {
            name: name.to_string(),
            field: field.to_string(),
            start: range.start,
            end: range.end,
        });
    }
    if range.end >= layout.bit_width {
        return Err(DecodeError::WordTooNarrow {
            name: name.to_string(),
            bit_width: layout.bit_width,
            max_bit: range.end,
        });
    }
    let required = match base {
        BaseType::BitVector(w) => *w,
        // Enum presence and consistency were verified up front; the field
        // needs as many bits as the enum's code width.
        BaseType::Enum(id) => {
            spec.enums
                .get(id)
                .ok_or_else(|| DecodeError::MissingEnum(id.to_string()))?
                .bit_width
        }
    };
    if range.width() < required {
        return Err(DecodeError::FieldTooNarrow {
            name: name.to_string(),
            field: field.to_string(),
            required,
            actual: range.width(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::compile_to_ir;

    fn alu_ir() -> Ir {
        compile_to_ir(
            "test",
            "enum Op { ADD, SUB } \
             op_code = Input(Configuration(Encoded(Op, operation, BitVector(1), signed))); \
             a = Input(BitVector(16)); \
             res = Output(BitVector(16)); \
             res.assign(a);",
        )
        .unwrap()
    }

    fn alu_spec() -> DecodeSpec {
        DecodeSpec::new()
            .with_enum("Op", 1, [("ADD", 0), ("SUB", 1)])
            .with_encoded("op_code", 2, [("operation", 0, 0), ("signed", 1, 1)])
    }

    #[test]
    fn test_complete_spec_verifies() {
        verify(&alu_spec(), &alu_ir()).unwrap();
    }

    #[test]
    fn test_missing_enum() {
        let mut spec = alu_spec();
        spec.enums.shift_remove("Op");
        assert_eq!(
            verify(&spec, &alu_ir()),
            Err(DecodeError::MissingEnum("Op".to_string()))
        );
    }

    #[test]
    fn test_member_set_mismatch() {
        let spec = DecodeSpec::new()
            .with_enum("Op", 1, [("ADD", 0), ("MUL", 1)])
            .with_encoded("op_code", 2, [("operation", 0, 0), ("signed", 1, 1)]);
        assert_eq!(
            verify(&spec, &alu_ir()),
            Err(DecodeError::MemberSetMismatch {
                name: "Op".to_string()
            })
        );
    }

    #[test]
    fn test_duplicate_code() {
        let spec = DecodeSpec::new()
            .with_enum("Op", 1, [("ADD", 0), ("SUB", 0)])
            .with_encoded("op_code", 2, [("operation", 0, 0), ("signed", 1, 1)]);
        assert_eq!(
            verify(&spec, &alu_ir()),
            Err(DecodeError::DuplicateCode {
                name: "Op".to_string(),
                code: 0
            })
        );
    }

    #[test]
    fn test_code_too_wide() {
        let spec = DecodeSpec::new()
            .with_enum("Op", 1, [("ADD", 0), ("SUB", 2)])
            .with_encoded("op_code", 2, [("operation", 0, 0), ("signed", 1, 1)]);
        assert_eq!(
            verify(&spec, &alu_ir()),
            Err(DecodeError::CodeTooWide {
                name: "Op".to_string(),
                code: 2,
                bit_width: 1
            })
        );
    }

    #[test]
    fn test_missing_encoded_layout() {
        let spec = DecodeSpec::new().with_enum("Op", 1, [("ADD", 0), ("SUB", 1)]);
        assert_eq!(
            verify(&spec, &alu_ir()),
            Err(DecodeError::MissingEncoded("op_code".to_string()))
        );
    }

    #[test]
    fn test_missing_field() {
        let spec = DecodeSpec::new()
            .with_enum("Op", 1, [("ADD", 0), ("SUB", 1)])
            .with_encoded("op_code", 2, [("operation", 0, 0)]);
        assert_eq!(
            verify(&spec, &alu_ir()),
            Err(DecodeError::MissingField {
                name: "op_code".to_string(),
                field: "signed".to_string()
            })
        );
    }

    #[test]
    fn test_field_too_narrow() {
        // Op needs 2 bits here but its range only holds 1.
        let spec = DecodeSpec::new()
            .with_enum("Op", 2, [("ADD", 0), ("SUB", 1)])
            .with_encoded("op_code", 3, [("operation", 0, 0), ("signed", 1, 1)]);
        assert_eq!(
            verify(&spec, &alu_ir()),
            Err(DecodeError::FieldTooNarrow {
                name: "op_code".to_string(),
                field: "operation".to_string(),
                required: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_range_past_word_end() {
        let spec = DecodeSpec::new()
            .with_enum("Op", 1, [("ADD", 0), ("SUB", 1)])
            .with_encoded("op_code", 2, [("operation", 0, 0), ("signed", 2, 2)]);
        assert_eq!(
            verify(&spec, &alu_ir()),
            Err(DecodeError::WordTooNarrow {
                name: "op_code".to_string(),
                bit_width: 2,
                max_bit: 2
            })
        );
    }

    #[test]
    fn test_json_round_trip() {
        let spec = alu_spec();
        let json = serde_json::to_string(&spec).unwrap();
        let back: DecodeSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }
}
