//! Lexically nested symbol environment.
//!
//! A stack of frames maps names to symbols. Names are unique within a frame;
//! an inner frame may shadow an outer one. The root frame is shared by all
//! compilation units and is append-only while signatures are being
//! registered; once body lowering starts it is sealed and only anonymous
//! temporaries (names starting with `@`) may still be added.

use std::{cell::Cell, collections::HashMap, error::Error, fmt::Display, rc::Rc};

use inkwell::values::{FunctionValue, PointerValue};

use crate::types::TypeRef;

/// A named binding. Variables carry their stack slot; functions and
/// resources carry the IR functions backing them.
#[derive(Debug)]
pub enum Symbol<'ctx> {
    Variable {
        ty: TypeRef,
        mutable: bool,
        ptr: PointerValue<'ctx>,
        /// Set once a resource binding has been moved out of.
        moved: Cell<bool>,
    },
    Function {
        params: Vec<TypeRef>,
        param_names: Vec<String>,
        ret: TypeRef,
        value: FunctionValue<'ctx>,
    },
    Resource {
        ty: TypeRef,
        constructor: FunctionValue<'ctx>,
        destructor: FunctionValue<'ctx>,
    },
    TypeAlias {
        ty: TypeRef,
    },
}

impl<'ctx> Symbol<'ctx> {
    pub fn describe(&self) -> &'static str {
        match self {
            Symbol::Variable { .. } => "variable",
            Symbol::Function { .. } => "function",
            Symbol::Resource { .. } => "resource",
            Symbol::TypeAlias { .. } => "type alias",
        }
    }

    pub fn is_moved(&self) -> bool {
        match self {
            Symbol::Variable { moved, .. } => moved.get(),
            _ => false,
        }
    }

    pub fn mark_moved(&self) {
        if let Symbol::Variable { moved, .. } = self {
            moved.set(true);
        }
    }

    /// Re-initializing a moved binding makes it usable again.
    pub fn clear_moved(&self) {
        if let Symbol::Variable { moved, .. } = self {
            moved.set(false);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    /// The name already exists in the frame being declared into.
    DuplicateSymbol { name: String },
    /// Root-frame declaration after the registration phase ended.
    SealedRoot { name: String },
}

impl Display for EnvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvError::DuplicateSymbol { name } => {
                f.write_fmt(format_args!("'{name}' is already defined in this scope"))
            }
            EnvError::SealedRoot { name } => f.write_fmt(format_args!(
                "global '{name}' declared after registration ended"
            )),
        }
    }
}

impl Error for EnvError {}

#[derive(Debug, Default)]
struct Frame<'ctx> {
    symbols: HashMap<String, Rc<Symbol<'ctx>>>,
}

#[derive(Debug)]
pub struct Environment<'ctx> {
    frames: Vec<Frame<'ctx>>,
    sealed: bool,
}

impl<'ctx> Default for Environment<'ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'ctx> Environment<'ctx> {
    pub fn new() -> Environment<'ctx> {
        Environment {
            frames: vec![Frame::default()],
            sealed: false,
        }
    }

    pub fn push_scope(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop_scope(&mut self) {
        assert!(self.frames.len() > 1, "the root frame is never popped");
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Declare into the innermost frame. Shadows outer frames silently,
    /// fails on a collision within the frame itself.
    pub fn declare(
        &mut self,
        name: impl ToString,
        symbol: Symbol<'ctx>,
    ) -> Result<Rc<Symbol<'ctx>>, EnvError> {
        let name = name.to_string();
        let frame = self
            .frames
            .last_mut()
            .expect("the environment always has a root frame");

        if frame.symbols.contains_key(&name) {
            return Err(EnvError::DuplicateSymbol { name });
        }

        let symbol = Rc::new(symbol);
        frame.symbols.insert(name, symbol.clone());
        Ok(symbol)
    }

    /// Declare into the root frame, regardless of the current depth. Used
    /// by the registration phases; rejected after sealing except for
    /// anonymous temporaries.
    pub fn declare_global(
        &mut self,
        name: impl ToString,
        symbol: Symbol<'ctx>,
    ) -> Result<Rc<Symbol<'ctx>>, EnvError> {
        let name = name.to_string();
        if self.sealed && !name.starts_with('@') {
            return Err(EnvError::SealedRoot { name });
        }

        let root = &mut self.frames[0];
        if root.symbols.contains_key(&name) {
            return Err(EnvError::DuplicateSymbol { name });
        }

        let symbol = Rc::new(symbol);
        root.symbols.insert(name, symbol.clone());
        Ok(symbol)
    }

    /// End the registration phase; the root frame becomes read-only.
    pub fn seal_globals(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Innermost-to-outermost lookup.
    pub fn lookup(&self, name: &str) -> Option<Rc<Symbol<'ctx>>> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.symbols.get(name).cloned())
    }

    pub fn lookup_current_scope(&self, name: &str) -> Option<Rc<Symbol<'ctx>>> {
        self.frames
            .last()
            .and_then(|frame| frame.symbols.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrimitiveKind, TypeRegistry};

    fn alias(registry: &TypeRegistry, kind: PrimitiveKind) -> Symbol<'static> {
        Symbol::TypeAlias {
            ty: registry.intern_primitive(kind),
        }
    }

    #[test]
    fn test_declare_then_lookup() {
        let registry = TypeRegistry::new();
        let mut env = Environment::new();

        let declared = env.declare("foo", alias(&registry, PrimitiveKind::I32)).unwrap();
        let found = env.lookup("foo").unwrap();
        assert!(Rc::ptr_eq(&declared, &found));
    }

    #[test]
    fn test_duplicate_in_same_frame() {
        let registry = TypeRegistry::new();
        let mut env = Environment::new();

        env.declare("foo", alias(&registry, PrimitiveKind::I32)).unwrap();
        let result = env.declare("foo", alias(&registry, PrimitiveKind::I64));
        assert_eq!(
            result.unwrap_err(),
            EnvError::DuplicateSymbol { name: "foo".into() }
        );
    }

    #[test]
    fn test_shadowing_and_unwinding() {
        let registry = TypeRegistry::new();
        let mut env = Environment::new();

        let outer = env.declare("x", alias(&registry, PrimitiveKind::I32)).unwrap();
        env.push_scope();
        let inner = env.declare("x", alias(&registry, PrimitiveKind::Bool)).unwrap();

        assert!(Rc::ptr_eq(&env.lookup("x").unwrap(), &inner));
        env.pop_scope();
        assert!(Rc::ptr_eq(&env.lookup("x").unwrap(), &outer));
    }

    #[test]
    fn test_lookup_current_scope_ignores_outer() {
        let registry = TypeRegistry::new();
        let mut env = Environment::new();

        env.declare("x", alias(&registry, PrimitiveKind::I32)).unwrap();
        env.push_scope();
        assert!(env.lookup_current_scope("x").is_none());
        assert!(env.lookup("x").is_some());
    }

    #[test]
    fn test_sealed_root_rejects_new_globals() {
        let registry = TypeRegistry::new();
        let mut env = Environment::new();

        env.declare_global("f", alias(&registry, PrimitiveKind::I32)).unwrap();
        env.seal_globals();

        let result = env.declare_global("g", alias(&registry, PrimitiveKind::I32));
        assert_eq!(result.unwrap_err(), EnvError::SealedRoot { name: "g".into() });

        // anonymous temporaries are still fine
        assert!(env
            .declare_global("@tmp0", alias(&registry, PrimitiveKind::I32))
            .is_ok());
    }

    #[test]
    fn test_global_visible_from_nested_scope() {
        let registry = TypeRegistry::new();
        let mut env = Environment::new();

        env.push_scope();
        env.declare_global("f", alias(&registry, PrimitiveKind::I32)).unwrap();
        assert!(env.lookup("f").is_some());
        env.pop_scope();
        assert!(env.lookup("f").is_some());
    }
}
