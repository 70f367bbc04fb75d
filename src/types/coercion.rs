//! Implicit conversion rules between Reso types.
//!
//! The widening relation over integer types is a partial order: reflexive,
//! antisymmetric, transitive, and it never crosses signedness. Everything
//! else (float↔int, bool↔int, char↔int, reference↔other-reference) requires
//! an explicit cast.

use super::{TypeKind, TypeRef};

/// Whether a value of `from` silently becomes a value of `to`: identity or
/// a lossless integer widening. Literal and `null` coercions are decided on
/// the value side since they depend on the payload.
pub fn is_implicitly_coercible(from: &TypeRef, to: &TypeRef) -> bool {
    from == to || int_widens(from, to)
}

/// Strict widening between two integer types of the same signedness.
pub fn int_widens(from: &TypeRef, to: &TypeRef) -> bool {
    match (from.kind(), to.kind()) {
        (
            TypeKind::Int {
                width: from_width,
                signed: from_signed,
            },
            TypeKind::Int {
                width: to_width,
                signed: to_signed,
            },
        ) => from_signed == to_signed && from_width < to_width,
        _ => false,
    }
}

/// The least type both operands implicitly coerce to, if any.
pub fn common_type(a: &TypeRef, b: &TypeRef) -> Option<TypeRef> {
    if a == b {
        return Some(a.clone());
    }
    if int_widens(a, b) {
        return Some(b.clone());
    }
    if int_widens(b, a) {
        return Some(a.clone());
    }
    None
}

/// Whether `value` is representable in the integer type `ty`.
pub fn int_type_contains(ty: &TypeRef, value: i128) -> bool {
    let TypeKind::Int { width, signed } = *ty.kind() else {
        return false;
    };

    if signed {
        let min = -(1i128 << (width - 1));
        let max = (1i128 << (width - 1)) - 1;
        (min..=max).contains(&value)
    } else {
        if value < 0 {
            return false;
        }
        let max = if width == 128 {
            i128::MAX
        } else {
            (1i128 << width) - 1
        };
        value <= max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrimitiveKind, TypeRegistry};

    fn ints(registry: &TypeRegistry) -> Vec<TypeRef> {
        [
            PrimitiveKind::I8,
            PrimitiveKind::I16,
            PrimitiveKind::I32,
            PrimitiveKind::I64,
            PrimitiveKind::U8,
            PrimitiveKind::U16,
            PrimitiveKind::U32,
            PrimitiveKind::U64,
        ]
        .into_iter()
        .map(|kind| registry.intern_primitive(kind))
        .collect()
    }

    #[test]
    fn test_widening_is_reflexive_as_coercion() {
        let registry = TypeRegistry::new();
        for ty in ints(&registry) {
            assert!(is_implicitly_coercible(&ty, &ty));
            assert!(!int_widens(&ty, &ty), "strict widening excludes identity");
        }
    }

    #[test]
    fn test_widening_is_antisymmetric() {
        let registry = TypeRegistry::new();
        let all = ints(&registry);
        for a in &all {
            for b in &all {
                if int_widens(a, b) {
                    assert!(!int_widens(b, a), "{a} and {b} widen both ways");
                }
            }
        }
    }

    #[test]
    fn test_widening_is_transitive() {
        let registry = TypeRegistry::new();
        let all = ints(&registry);
        for a in &all {
            for b in &all {
                for c in &all {
                    if int_widens(a, b) && int_widens(b, c) {
                        assert!(int_widens(a, c), "{a} -> {b} -> {c} must compose");
                    }
                }
            }
        }
    }

    #[test]
    fn test_widening_never_crosses_signedness() {
        let registry = TypeRegistry::new();
        for a in ints(&registry) {
            for b in ints(&registry) {
                if a.int_signed() != b.int_signed() {
                    assert!(!int_widens(&a, &b));
                    assert!(!is_implicitly_coercible(&a, &b));
                }
            }
        }
    }

    #[test]
    fn test_no_implicit_float_int() {
        let registry = TypeRegistry::new();
        let i32_type = registry.intern_primitive(PrimitiveKind::I32);
        let f32_type = registry.intern_primitive(PrimitiveKind::F32);
        let f64_type = registry.intern_primitive(PrimitiveKind::F64);
        let bool_type = registry.intern_primitive(PrimitiveKind::Bool);
        let char_type = registry.intern_primitive(PrimitiveKind::Char);

        assert!(!is_implicitly_coercible(&i32_type, &f64_type));
        assert!(!is_implicitly_coercible(&f32_type, &f64_type));
        assert!(!is_implicitly_coercible(&bool_type, &i32_type));
        assert!(!is_implicitly_coercible(&char_type, &i32_type));
    }

    #[test]
    fn test_common_type() {
        let registry = TypeRegistry::new();
        let i8_type = registry.intern_primitive(PrimitiveKind::I8);
        let i32_type = registry.intern_primitive(PrimitiveKind::I32);
        let u32_type = registry.intern_primitive(PrimitiveKind::U32);

        assert_eq!(common_type(&i8_type, &i32_type), Some(i32_type.clone()));
        assert_eq!(common_type(&i32_type, &i8_type), Some(i32_type.clone()));
        assert_eq!(common_type(&i32_type, &i32_type), Some(i32_type.clone()));
        assert_eq!(common_type(&i32_type, &u32_type), None);
    }

    #[test]
    fn test_int_ranges() {
        let registry = TypeRegistry::new();
        let i8_type = registry.intern_primitive(PrimitiveKind::I8);
        let u8_type = registry.intern_primitive(PrimitiveKind::U8);
        let u64_type = registry.intern_primitive(PrimitiveKind::U64);

        assert!(int_type_contains(&i8_type, 127));
        assert!(int_type_contains(&i8_type, -128));
        assert!(!int_type_contains(&i8_type, 128));
        assert!(int_type_contains(&u8_type, 255));
        assert!(!int_type_contains(&u8_type, -1));
        assert!(int_type_contains(&u64_type, u64::MAX as i128));
    }
}
