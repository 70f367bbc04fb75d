//! Canonical catalogue of Reso types.
//!
//! Types are interned: the registry hands out [`TypeRef`] handles and
//! guarantees that structurally equal requests return the same handle, so
//! type equality is pointer identity. Capability queries are pattern-matched
//! predicates on the kind tag.
//!
//! The registry is pure bookkeeping; binding a type to its native LLVM
//! representation is the IR builder's job (it keeps a per-type cache that is
//! populated for every registered type before body lowering starts).

pub mod coercion;

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
    rc::Rc,
};

/// Pointer width of every supported target, in bits.
pub const POINTER_WIDTH: u32 = 64;

/// Discriminant for [`TypeRegistry::intern_primitive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Unit,
    Null,
    Str,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 15] = [
        PrimitiveKind::Bool,
        PrimitiveKind::Char,
        PrimitiveKind::I8,
        PrimitiveKind::I16,
        PrimitiveKind::I32,
        PrimitiveKind::I64,
        PrimitiveKind::U8,
        PrimitiveKind::U16,
        PrimitiveKind::U32,
        PrimitiveKind::U64,
        PrimitiveKind::F32,
        PrimitiveKind::F64,
        PrimitiveKind::Unit,
        PrimitiveKind::Null,
        PrimitiveKind::Str,
    ];

    /// The canonical source-level spelling.
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Char => "char",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::Unit => "unit",
            PrimitiveKind::Null => "null",
            PrimitiveKind::Str => "string",
        }
    }
}

/// Kind tag of a registered type.
#[derive(Debug)]
pub enum TypeKind {
    Bool,
    Char,
    Int { width: u32, signed: bool },
    Float { width: u32 },
    Unit,
    Null,
    Str,
    /// Declared type parameter; carries the substitution index. No
    /// substitution logic is wired up yet.
    Generic { index: usize },
    Reference { pointee: TypeRef },
    /// Nominal heap type. Field layout is filled in after all resources are
    /// registered so fields may refer to other (or the same) resources
    /// through references.
    Resource { fields: RefCell<Vec<(String, TypeRef)>> },
    Function { params: Vec<TypeRef>, ret: TypeRef },
}

#[derive(Debug)]
pub struct TypeData {
    name: String,
    kind: TypeKind,
    width: u32,
}

/// Shared handle to an interned type. Equality and hashing are identity.
#[derive(Clone)]
pub struct TypeRef(Rc<TypeData>);

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

impl Debug for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.name)
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.name)
    }
}

impl TypeRef {
    fn new(name: impl ToString, kind: TypeKind, width: u32) -> TypeRef {
        TypeRef(Rc::new(TypeData {
            name: name.to_string(),
            kind,
            width,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    /// Declared bit width; 0 for non-scalar types, pointer width for
    /// references, resources, strings and functions.
    pub fn width(&self) -> u32 {
        self.0.width
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.0.kind, TypeKind::Bool)
    }

    pub fn is_char(&self) -> bool {
        matches!(self.0.kind, TypeKind::Char)
    }

    pub fn is_int(&self) -> bool {
        matches!(self.0.kind, TypeKind::Int { .. })
    }

    pub fn is_float(&self) -> bool {
        matches!(self.0.kind, TypeKind::Float { .. })
    }

    pub fn is_unit(&self) -> bool {
        matches!(self.0.kind, TypeKind::Unit)
    }

    pub fn is_string(&self) -> bool {
        matches!(self.0.kind, TypeKind::Str)
    }

    pub fn is_generic(&self) -> bool {
        matches!(self.0.kind, TypeKind::Generic { .. })
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.0.kind, TypeKind::Reference { .. })
    }

    pub fn is_resource(&self) -> bool {
        matches!(self.0.kind, TypeKind::Resource { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self.0.kind, TypeKind::Function { .. })
    }

    /// Scalars are the cast-eligible primitives.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self.0.kind,
            TypeKind::Bool | TypeKind::Char | TypeKind::Int { .. } | TypeKind::Float { .. }
        )
    }

    /// Whether `null` is a valid value of this type.
    pub fn is_nullable(&self) -> bool {
        self.is_reference() || self.is_resource()
    }

    /// Signedness, for integer types only.
    pub fn int_signed(&self) -> Option<bool> {
        match self.0.kind {
            TypeKind::Int { signed, .. } => Some(signed),
            _ => None,
        }
    }

    pub fn resource_fields(&self) -> Option<Vec<(String, TypeRef)>> {
        match &self.0.kind {
            TypeKind::Resource { fields } => Some(fields.borrow().clone()),
            _ => None,
        }
    }

    pub fn resource_field_index(&self, name: &str) -> Option<(usize, TypeRef)> {
        let fields = self.resource_fields()?;
        fields
            .iter()
            .position(|(field, _)| field == name)
            .map(|index| (index, fields[index].1.clone()))
    }
}

/// Interning table for every type a compilation job can mention.
pub struct TypeRegistry {
    by_name: HashMap<String, TypeRef>,
    resources: Vec<TypeRef>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> TypeRegistry {
        let mut registry = TypeRegistry {
            by_name: HashMap::new(),
            resources: vec![],
        };

        for kind in PrimitiveKind::ALL {
            let type_ref = TypeRef::new(kind.name(), primitive_type_kind(kind), primitive_width(kind));
            registry.by_name.insert(kind.name().to_string(), type_ref);
        }

        registry
    }

    /// Structurally equal requests return the identical handle.
    pub fn intern_primitive(&self, kind: PrimitiveKind) -> TypeRef {
        self.by_name
            .get(kind.name())
            .cloned()
            .expect("all primitives are interned at construction")
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<TypeRef> {
        self.by_name.get(name).cloned()
    }

    pub fn make_reference(&mut self, pointee: TypeRef) -> TypeRef {
        let name = format!("&{}", pointee.name());
        if let Some(existing) = self.by_name.get(&name) {
            return existing.clone();
        }

        let type_ref = TypeRef::new(&name, TypeKind::Reference { pointee }, POINTER_WIDTH);
        self.by_name.insert(name, type_ref.clone());
        type_ref
    }

    pub fn make_function(&mut self, params: Vec<TypeRef>, ret: TypeRef) -> TypeRef {
        let rendered = params
            .iter()
            .map(|param| param.name().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let name = format!("fn({rendered}) -> {}", ret.name());
        if let Some(existing) = self.by_name.get(&name) {
            return existing.clone();
        }

        let type_ref = TypeRef::new(&name, TypeKind::Function { params, ret }, POINTER_WIDTH);
        self.by_name.insert(name, type_ref.clone());
        type_ref
    }

    pub fn make_generic(&mut self, name: &str, index: usize) -> TypeRef {
        if let Some(existing) = self.by_name.get(name) {
            return existing.clone();
        }

        let type_ref = TypeRef::new(name, TypeKind::Generic { index }, 0);
        self.by_name.insert(name.to_string(), type_ref.clone());
        type_ref
    }

    /// Register a resource as an opaque nominal type; the field layout
    /// follows via [`TypeRegistry::set_resource_fields`].
    pub fn register_resource(&mut self, name: &str) -> TypeRef {
        let type_ref = TypeRef::new(
            name,
            TypeKind::Resource {
                fields: RefCell::new(vec![]),
            },
            POINTER_WIDTH,
        );
        self.by_name.insert(name.to_string(), type_ref.clone());
        self.resources.push(type_ref.clone());
        type_ref
    }

    pub fn set_resource_fields(&self, type_ref: &TypeRef, new_fields: Vec<(String, TypeRef)>) {
        let TypeKind::Resource { fields } = type_ref.kind() else {
            unreachable!("field layout can only be set on resources");
        };
        *fields.borrow_mut() = new_fields;
    }

    /// A type alias shares the identity of its target.
    pub fn register_alias(&mut self, name: &str, target: TypeRef) {
        self.by_name.insert(name.to_string(), target);
    }

    pub fn resources(&self) -> &[TypeRef] {
        &self.resources
    }

    pub fn all_types(&self) -> Vec<TypeRef> {
        self.by_name.values().cloned().collect()
    }
}

fn primitive_type_kind(kind: PrimitiveKind) -> TypeKind {
    match kind {
        PrimitiveKind::Bool => TypeKind::Bool,
        PrimitiveKind::Char => TypeKind::Char,
        PrimitiveKind::I8 => TypeKind::Int {
            width: 8,
            signed: true,
        },
        PrimitiveKind::I16 => TypeKind::Int {
            width: 16,
            signed: true,
        },
        PrimitiveKind::I32 => TypeKind::Int {
            width: 32,
            signed: true,
        },
        PrimitiveKind::I64 => TypeKind::Int {
            width: 64,
            signed: true,
        },
        PrimitiveKind::U8 => TypeKind::Int {
            width: 8,
            signed: false,
        },
        PrimitiveKind::U16 => TypeKind::Int {
            width: 16,
            signed: false,
        },
        PrimitiveKind::U32 => TypeKind::Int {
            width: 32,
            signed: false,
        },
        PrimitiveKind::U64 => TypeKind::Int {
            width: 64,
            signed: false,
        },
        PrimitiveKind::F32 => TypeKind::Float { width: 32 },
        PrimitiveKind::F64 => TypeKind::Float { width: 64 },
        PrimitiveKind::Unit => TypeKind::Unit,
        PrimitiveKind::Null => TypeKind::Null,
        PrimitiveKind::Str => TypeKind::Str,
    }
}

fn primitive_width(kind: PrimitiveKind) -> u32 {
    match kind {
        PrimitiveKind::Bool => 1,
        PrimitiveKind::Char | PrimitiveKind::I8 | PrimitiveKind::U8 => 8,
        PrimitiveKind::I16 | PrimitiveKind::U16 => 16,
        PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 => 32,
        PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => 64,
        PrimitiveKind::Unit | PrimitiveKind::Null => 0,
        PrimitiveKind::Str => POINTER_WIDTH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_interning_is_identity() {
        let registry = TypeRegistry::new();

        for kind in PrimitiveKind::ALL {
            let first = registry.intern_primitive(kind);
            let second = registry.intern_primitive(kind);
            assert_eq!(first, second, "{kind:?} must intern to one identity");
        }

        assert_ne!(
            registry.intern_primitive(PrimitiveKind::I32),
            registry.intern_primitive(PrimitiveKind::U32)
        );
    }

    #[test]
    fn test_reference_interning() {
        let mut registry = TypeRegistry::new();
        let i64_type = registry.intern_primitive(PrimitiveKind::I64);

        let first = registry.make_reference(i64_type.clone());
        let second = registry.make_reference(i64_type);
        assert_eq!(first, second);
        assert_eq!(first.name(), "&i64");
        assert_eq!(first.width(), POINTER_WIDTH);
    }

    #[test]
    fn test_function_interning() {
        let mut registry = TypeRegistry::new();
        let i32_type = registry.intern_primitive(PrimitiveKind::I32);
        let bool_type = registry.intern_primitive(PrimitiveKind::Bool);

        let first = registry.make_function(vec![i32_type.clone()], bool_type.clone());
        let second = registry.make_function(vec![i32_type.clone()], bool_type.clone());
        assert_eq!(first, second);
        assert_eq!(first.name(), "fn(i32) -> bool");

        let other = registry.make_function(vec![i32_type.clone(), i32_type], bool_type);
        assert_ne!(first, other);
    }

    #[test]
    fn test_resource_is_nominal() {
        let mut registry = TypeRegistry::new();
        let i64_type = registry.intern_primitive(PrimitiveKind::I64);

        let buffer = registry.register_resource("Buffer");
        registry.set_resource_fields(&buffer, vec![("len".into(), i64_type.clone())]);

        let looked_up = registry.lookup_by_name("Buffer").unwrap();
        assert_eq!(buffer, looked_up);
        assert_eq!(looked_up.resource_field_index("len"), Some((0, i64_type)));
        assert_eq!(buffer.width(), POINTER_WIDTH);
    }

    #[test]
    fn test_alias_shares_identity() {
        let mut registry = TypeRegistry::new();
        let i64_type = registry.intern_primitive(PrimitiveKind::I64);
        registry.register_alias("size", i64_type.clone());

        assert_eq!(registry.lookup_by_name("size"), Some(i64_type));
    }

    #[test]
    fn test_widths() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.intern_primitive(PrimitiveKind::Bool).width(), 1);
        assert_eq!(registry.intern_primitive(PrimitiveKind::I16).width(), 16);
        assert_eq!(registry.intern_primitive(PrimitiveKind::F64).width(), 64);
        assert_eq!(registry.intern_primitive(PrimitiveKind::Unit).width(), 0);
    }

    #[test]
    fn test_generic_carries_index() {
        let mut registry = TypeRegistry::new();
        let generic = registry.make_generic("T", 0);
        assert!(generic.is_generic());
        assert!(matches!(generic.kind(), TypeKind::Generic { index: 0 }));
        assert_eq!(registry.make_generic("T", 0), generic);
    }
}
