//! Value model used during lowering.
//!
//! A lowered expression is either a fully-typed value backed by an IR
//! handle, a polymorphic literal whose concrete width is not fixed yet, or
//! the unit non-value. Literals must be concretized against a target type
//! before any instruction can consume them.

use inkwell::values::BasicValueEnum;

use crate::{
    lexer::Span,
    types::{coercion, PrimitiveKind, TypeRef, TypeRegistry},
};

/// A fully-typed value, directly usable as an instruction operand.
#[derive(Debug, Clone)]
pub struct ConcreteValue<'ctx> {
    pub ty: TypeRef,
    pub ir: BasicValueEnum<'ctx>,
    pub span: Span,
}

impl<'ctx> ConcreteValue<'ctx> {
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiteralPayload {
    Int(i128),
    Float(f64),
    Null,
}

/// A literal whose concrete type depends on context.
#[derive(Debug, Clone, PartialEq)]
pub struct PolymorphicLiteral {
    pub payload: LiteralPayload,
    pub span: Span,
}

impl PolymorphicLiteral {
    /// Whether `target` is in the candidate set of this literal.
    pub fn admits(&self, target: &TypeRef) -> bool {
        match self.payload {
            LiteralPayload::Int(value) => coercion::int_type_contains(target, value),
            LiteralPayload::Float(_) => target.is_float(),
            LiteralPayload::Null => target.is_nullable(),
        }
    }

    /// The type picked when no context fixes one. Integers default to `i32`
    /// when they fit, escalating to `i64`/`u64` by magnitude; floats default
    /// to `f64`. `null` has no default.
    pub fn default_type(&self, registry: &TypeRegistry) -> Option<TypeRef> {
        match self.payload {
            LiteralPayload::Int(_) => {
                for kind in [PrimitiveKind::I32, PrimitiveKind::I64, PrimitiveKind::U64] {
                    let candidate = registry.intern_primitive(kind);
                    if self.admits(&candidate) {
                        return Some(candidate);
                    }
                }
                None
            }
            LiteralPayload::Float(_) => Some(registry.intern_primitive(PrimitiveKind::F64)),
            LiteralPayload::Null => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self.payload {
            LiteralPayload::Int(_) => "integer literal",
            LiteralPayload::Float(_) => "float literal",
            LiteralPayload::Null => "null",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Value<'ctx> {
    Concrete(ConcreteValue<'ctx>),
    Literal(PolymorphicLiteral),
    Unit(Span),
}

impl<'ctx> Value<'ctx> {
    pub fn span(&self) -> Span {
        match self {
            Value::Concrete(value) => value.span,
            Value::Literal(literal) => literal.span,
            Value::Unit(span) => *span,
        }
    }

    /// The type to report in diagnostics; literals answer with their
    /// default, `null` and unit with their spelling.
    pub fn describe(&self, registry: &TypeRegistry) -> String {
        match self {
            Value::Concrete(value) => value.ty.to_string(),
            Value::Literal(literal) => literal
                .default_type(registry)
                .map(|ty| ty.to_string())
                .unwrap_or_else(|| literal.describe().to_string()),
            Value::Unit(_) => "unit".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRegistry;

    fn int_literal(value: i128) -> PolymorphicLiteral {
        PolymorphicLiteral {
            payload: LiteralPayload::Int(value),
            span: Span::default(),
        }
    }

    #[test]
    fn test_integer_candidates_follow_range() {
        let registry = TypeRegistry::new();
        let i8_type = registry.intern_primitive(PrimitiveKind::I8);
        let u8_type = registry.intern_primitive(PrimitiveKind::U8);
        let f64_type = registry.intern_primitive(PrimitiveKind::F64);

        assert!(int_literal(127).admits(&i8_type));
        assert!(!int_literal(128).admits(&i8_type));
        assert!(int_literal(200).admits(&u8_type));
        assert!(!int_literal(-1).admits(&u8_type));
        assert!(!int_literal(1).admits(&f64_type));
    }

    #[test]
    fn test_integer_default_escalates() {
        let registry = TypeRegistry::new();

        let small = int_literal(1).default_type(&registry).unwrap();
        assert_eq!(small.name(), "i32");

        let large = int_literal(1 << 40).default_type(&registry).unwrap();
        assert_eq!(large.name(), "i64");

        let huge = int_literal(u64::MAX as i128).default_type(&registry).unwrap();
        assert_eq!(huge.name(), "u64");
    }

    #[test]
    fn test_null_admits_only_nullable() {
        let mut registry = TypeRegistry::new();
        let i32_type = registry.intern_primitive(PrimitiveKind::I32);
        let unit_type = registry.intern_primitive(PrimitiveKind::Unit);
        let reference = registry.make_reference(i32_type.clone());

        let null = PolymorphicLiteral {
            payload: LiteralPayload::Null,
            span: Span::default(),
        };
        assert!(null.admits(&reference));
        assert!(!null.admits(&i32_type));
        assert!(!null.admits(&unit_type));
        assert!(null.default_type(&registry).is_none());
    }
}
