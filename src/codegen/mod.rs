//! LLVM code generation for Reso.
//!
//! The walk over the parse tree runs in three ordered phases per
//! compilation job:
//!
//! 1. **Type registration**: every resource becomes an opaque nominal type,
//!    then type aliases resolve. Doing resources first lets aliases and
//!    recursive references mention resources from any unit.
//! 2. **Signature registration**: function, constructor and destructor
//!    signatures resolve and land in the shared root scope and the module.
//!    After this phase the root scope is sealed and every registered type is
//!    bound to its LLVM representation.
//! 3. **Body lowering**: function bodies lower depth-first, unit by unit.
//!
//! Phases 1 and 2 cover *all* units before any body is lowered, which is
//! what makes cross-unit forward references and mutual recursion work
//! without a topological sort.
//!
//! Semantic errors are reported to the [`ErrorSink`] and lowering continues
//! with a typed placeholder; only backend failures abort a unit, and only
//! `Disposed` aborts the job.

pub mod builder;
pub mod expressions;
pub mod statements;
pub mod value;

use std::{
    cell::{Cell, RefCell},
    collections::HashSet,
};

use inkwell::values::{FunctionValue, PointerValue};
use log::debug;

use crate::{
    diagnostics::{ErrorKind, ErrorSink},
    lexer::Span,
    parser::ast::{Item, ResourceDecl, TypeAlias, TypeName},
    scope::{EnvError, Environment, Symbol},
    types::{coercion, PrimitiveKind, TypeRef, TypeRegistry},
};

use builder::{IrBuilder, IrError, IrResult};
use value::{ConcreteValue, LiteralPayload, PolymorphicLiteral, Value};

/// One source file's parse tree plus its bookkeeping. Units share the type
/// registry, the root scope and the IR module.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub file: String,
    pub items: Vec<Item>,
}

/// Lowering state for the function currently being emitted.
struct FunctionState<'ctx> {
    value: FunctionValue<'ctx>,
    ret: TypeRef,
    /// Whether every path through the statements lowered so far has hit a
    /// terminator. Drives the missing-return check.
    terminated: bool,
}

/// A resource binding awaiting destruction when its scope exits.
#[derive(Clone)]
pub(crate) struct ScheduledDrop<'ctx> {
    pub name: String,
    pub slot: PointerValue<'ctx>,
    pub ty: TypeRef,
    pub destructor: FunctionValue<'ctx>,
}

/// Shared state for the code generation walk.
pub struct CodegenContext<'ctx> {
    pub ir: IrBuilder<'ctx>,
    pub registry: RefCell<TypeRegistry>,
    pub env: RefCell<Environment<'ctx>>,
    pub sink: ErrorSink,
    error_limit: usize,
    file: RefCell<String>,
    unit_error_base: Cell<usize>,
    function: RefCell<Option<FunctionState<'ctx>>>,
    /// One entry per live scope; drops run in reverse declaration order.
    drops: RefCell<Vec<Vec<ScheduledDrop<'ctx>>>>,
    temps: Cell<usize>,
    /// Function names whose bodies were already lowered; a duplicate
    /// definition reported in registration must not lower again.
    lowered: RefCell<HashSet<String>>,
}

impl<'ctx> CodegenContext<'ctx> {
    pub fn new(ir: IrBuilder<'ctx>, sink: ErrorSink, error_limit: usize) -> CodegenContext<'ctx> {
        CodegenContext {
            ir,
            registry: RefCell::new(TypeRegistry::new()),
            env: RefCell::new(Environment::new()),
            sink,
            error_limit,
            file: RefCell::new(String::new()),
            unit_error_base: Cell::new(0),
            function: RefCell::new(None),
            drops: RefCell::new(vec![]),
            temps: Cell::new(0),
            lowered: RefCell::new(HashSet::new()),
        }
    }

    /// True exactly once per function name.
    pub(crate) fn claim_function(&self, name: &str) -> bool {
        self.lowered.borrow_mut().insert(name.to_string())
    }

    pub(crate) fn file(&self) -> String {
        self.file.borrow().clone()
    }

    fn begin_unit(&self, file: &str) {
        *self.file.borrow_mut() = file.to_string();
        self.unit_error_base.set(self.sink.len());
    }

    /// Whether the current unit blew past the configured error ceiling.
    pub(crate) fn error_limit_reached(&self) -> bool {
        self.sink.len() - self.unit_error_base.get() > self.error_limit
    }

    pub(crate) fn report(&self, kind: ErrorKind, message: impl ToString, span: Span) {
        self.sink.error(kind, message, self.file(), span);
    }

    pub(crate) fn temp_name(&self) -> String {
        let index = self.temps.get();
        self.temps.set(index + 1);
        format!("@tmp{index}")
    }

    // ---- registry shorthands ---------------------------------------------

    pub(crate) fn bool_ty(&self) -> TypeRef {
        self.registry.borrow().intern_primitive(PrimitiveKind::Bool)
    }

    pub(crate) fn unit_ty(&self) -> TypeRef {
        self.registry.borrow().intern_primitive(PrimitiveKind::Unit)
    }

    pub(crate) fn i32_ty(&self) -> TypeRef {
        self.registry.borrow().intern_primitive(PrimitiveKind::I32)
    }

    pub(crate) fn string_ty(&self) -> TypeRef {
        self.registry.borrow().intern_primitive(PrimitiveKind::Str)
    }

    pub(crate) fn char_ty(&self) -> TypeRef {
        self.registry.borrow().intern_primitive(PrimitiveKind::Char)
    }

    // ---- function state --------------------------------------------------

    pub(crate) fn begin_function(&self, value: FunctionValue<'ctx>, ret: TypeRef) {
        *self.function.borrow_mut() = Some(FunctionState {
            value,
            ret,
            terminated: false,
        });
    }

    pub(crate) fn end_function(&self) {
        *self.function.borrow_mut() = None;
    }

    pub(crate) fn current_function(&self) -> FunctionValue<'ctx> {
        self.function
            .borrow()
            .as_ref()
            .expect("statement lowering only runs inside a function")
            .value
    }

    pub(crate) fn current_return_type(&self) -> TypeRef {
        self.function
            .borrow()
            .as_ref()
            .expect("statement lowering only runs inside a function")
            .ret
            .clone()
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.function
            .borrow()
            .as_ref()
            .map(|state| state.terminated)
            .unwrap_or(false)
    }

    pub(crate) fn set_terminated(&self, terminated: bool) {
        if let Some(state) = self.function.borrow_mut().as_mut() {
            state.terminated = terminated;
        }
    }

    // ---- scopes and scheduled destruction --------------------------------

    pub(crate) fn enter_scope(&self) {
        self.env.borrow_mut().push_scope();
        self.drops.borrow_mut().push(vec![]);
    }

    /// Leave the current scope, running destructors for its resources in
    /// reverse declaration order unless this point is unreachable (a
    /// return already ran them on every live path).
    pub(crate) fn leave_scope_with_drops(&self) -> IrResult<()> {
        let entries = self.drops.borrow_mut().pop().unwrap_or_default();
        if !self.is_terminated() && !self.ir.block_terminated() {
            self.emit_drops(&entries)?;
        }
        self.env.borrow_mut().pop_scope();
        Ok(())
    }

    /// Leave the current scope without emitting anything.
    pub(crate) fn leave_scope_silently(&self) {
        self.drops.borrow_mut().pop();
        self.env.borrow_mut().pop_scope();
    }

    pub(crate) fn schedule_drop(&self, entry: ScheduledDrop<'ctx>) {
        if let Some(scope) = self.drops.borrow_mut().last_mut() {
            scope.push(entry);
        }
    }

    /// Remove a binding's scheduled destruction (its value moved away).
    pub(crate) fn unschedule_drop(&self, name: &str) -> Option<ScheduledDrop<'ctx>> {
        let mut scopes = self.drops.borrow_mut();
        for scope in scopes.iter_mut().rev() {
            if let Some(index) = scope.iter().position(|entry| entry.name == name) {
                return Some(scope.remove(index));
            }
        }
        None
    }

    fn emit_drops(&self, entries: &[ScheduledDrop<'ctx>]) -> IrResult<()> {
        let unit = self.unit_ty();
        for entry in entries.iter().rev() {
            let object = self.ir.load(entry.slot, &entry.ty, &entry.name)?;
            self.ir.call(entry.destructor, &[object], &unit)?;
        }
        Ok(())
    }

    /// Destructor calls for every live scope, innermost first; used right
    /// before a `ret`. `keep` names a binding whose value is being returned
    /// and therefore leaves the function alive.
    pub(crate) fn emit_drops_for_return(&self, keep: Option<&str>) -> IrResult<()> {
        let scopes: Vec<Vec<ScheduledDrop<'ctx>>> = self.drops.borrow().clone();

        for scope in scopes.iter().rev() {
            let surviving: Vec<ScheduledDrop<'ctx>> = scope
                .iter()
                .filter(|entry| Some(entry.name.as_str()) != keep)
                .cloned()
                .collect();
            self.emit_drops(&surviving)?;
        }
        Ok(())
    }

    /// The destructor backing a resource type, if registered.
    pub(crate) fn destructor_for(&self, ty: &TypeRef) -> Option<FunctionValue<'ctx>> {
        let symbol = self.env.borrow().lookup(ty.name())?;
        match symbol.as_ref() {
            Symbol::Resource { destructor, .. } => Some(*destructor),
            _ => None,
        }
    }

    // ---- type resolution -------------------------------------------------

    /// Resolve a spelled type against the registry, reporting
    /// `UnknownType` on failure. Generic names are declared-only and also
    /// rejected here.
    pub(crate) fn resolve_type(&self, type_name: &TypeName) -> Option<TypeRef> {
        match type_name {
            TypeName::Named(name, span) => {
                let found = self.registry.borrow().lookup_by_name(name);
                match found {
                    Some(ty) if !ty.is_generic() => Some(ty),
                    _ => {
                        self.report(
                            ErrorKind::UnknownType,
                            format!("undefined type '{name}'"),
                            *span,
                        );
                        None
                    }
                }
            }
            TypeName::Reference(inner, _) => {
                let pointee = self.resolve_type(inner)?;
                Some(self.registry.borrow_mut().make_reference(pointee))
            }
        }
    }

    /// Like [`CodegenContext::resolve_type`] but for positions that need a
    /// value-carrying type (parameters, fields, variables).
    pub(crate) fn resolve_value_type(&self, type_name: &TypeName) -> Option<TypeRef> {
        let ty = self.resolve_type(type_name)?;
        if ty.is_unit() || matches!(ty.kind(), crate::types::TypeKind::Null) {
            self.report(
                ErrorKind::TypeMismatch,
                format!("type '{ty}' has no values and cannot be used here"),
                type_name.span(),
            );
            return None;
        }
        Some(ty)
    }

    // ---- value coercion --------------------------------------------------

    /// Emit the constant behind a polymorphic literal at a fixed type.
    pub(crate) fn concretize(
        &self,
        literal: &PolymorphicLiteral,
        target: &TypeRef,
    ) -> IrResult<ConcreteValue<'ctx>> {
        let value = match literal.payload {
            LiteralPayload::Int(value) => self.ir.const_int(target, value)?,
            LiteralPayload::Float(value) => self.ir.const_float(target, value)?,
            LiteralPayload::Null => self.ir.const_null(target)?,
        };
        Ok(value.at(literal.span))
    }

    /// A dummy value of the expected type, substituted after a reported
    /// error so lowering can continue.
    pub(crate) fn placeholder(&self, target: &TypeRef, span: Span) -> IrResult<ConcreteValue<'ctx>> {
        Ok(self.ir.zero_value(target)?.at(span))
    }

    /// Turn a lowered value into a value of `target`, applying the implicit
    /// coercion rules: identity, literal concretization, lossless integer
    /// widening, `null` to nullable. Anything else reports `TypeMismatch`
    /// and yields a placeholder.
    pub(crate) fn coerce(
        &self,
        value: Value<'ctx>,
        target: &TypeRef,
    ) -> IrResult<ConcreteValue<'ctx>> {
        let span = value.span();
        match value {
            Value::Concrete(concrete) => {
                if concrete.ty == *target {
                    return Ok(concrete);
                }
                if coercion::int_widens(&concrete.ty, target) {
                    return Ok(self.ir.cast(&concrete, target)?.at(span));
                }
                self.report(
                    ErrorKind::TypeMismatch,
                    format!("expected '{target}', found '{}'", concrete.ty),
                    span,
                );
                self.placeholder(target, span)
            }
            Value::Literal(literal) => {
                if literal.admits(target) {
                    return self.concretize(&literal, target);
                }
                self.report(
                    ErrorKind::TypeMismatch,
                    format!("expected '{target}', found {}", literal.describe()),
                    span,
                );
                self.placeholder(target, span)
            }
            Value::Unit(span) => {
                self.report(
                    ErrorKind::TypeMismatch,
                    format!("expected '{target}', found 'unit'"),
                    span,
                );
                self.placeholder(target, span)
            }
        }
    }
}

// ---- the three phases ----------------------------------------------------

/// Drive the full walk over all units. `Disposed` aborts the job; any other
/// backend error aborts only the unit that raised it.
pub fn run<'ctx>(ctx: &CodegenContext<'ctx>, units: &[CompilationUnit]) -> Result<(), IrError> {
    debug!("phase 1: registering types across {} unit(s)", units.len());
    for unit in units {
        ctx.begin_unit(&unit.file);
        for item in &unit.items {
            if let Item::Resource(decl) = item {
                register_resource_type(ctx, decl)?;
            }
        }
    }
    for unit in units {
        ctx.begin_unit(&unit.file);
        for item in &unit.items {
            if let Item::Alias(alias) = item {
                register_alias(ctx, alias);
            }
        }
    }

    debug!("phase 2: registering signatures");
    for unit in units {
        ctx.begin_unit(&unit.file);
        for item in &unit.items {
            register_signatures(ctx, item)?;
        }
    }
    ctx.env.borrow_mut().seal_globals();
    {
        let registry = ctx.registry.borrow();
        ctx.ir.realize_types(&registry)?;
    }

    debug!("phase 3: lowering bodies");
    for unit in units {
        ctx.begin_unit(&unit.file);
        ctx.ir.set_source_file(&unit.file)?;
        match lower_unit(ctx, unit) {
            Ok(()) => {}
            Err(IrError::Disposed) => return Err(IrError::Disposed),
            Err(error) => {
                ctx.sink
                    .internal(ErrorKind::IrError, error.to_string(), unit.file.clone());
            }
        }
    }

    Ok(())
}

fn register_resource_type(ctx: &CodegenContext<'_>, decl: &ResourceDecl) -> IrResult<()> {
    let name = &decl.name.name;
    if ctx.registry.borrow().lookup_by_name(name).is_some() {
        ctx.report(
            ErrorKind::DuplicateSymbol,
            format!("type '{name}' is already defined"),
            decl.name.span,
        );
        return Ok(());
    }

    let ty = ctx.registry.borrow_mut().register_resource(name);
    ctx.ir.declare_resource_struct(&ty)
}

fn register_alias(ctx: &CodegenContext<'_>, alias: &TypeAlias) {
    let name = &alias.name.name;
    if ctx.registry.borrow().lookup_by_name(name).is_some() {
        ctx.report(
            ErrorKind::DuplicateSymbol,
            format!("type '{name}' is already defined"),
            alias.name.span,
        );
        return;
    }

    let Some(target) = ctx.resolve_type(&alias.aliased) else {
        return;
    };
    ctx.registry.borrow_mut().register_alias(name, target);
}

fn register_signatures<'ctx>(ctx: &CodegenContext<'ctx>, item: &Item) -> IrResult<()> {
    match item {
        Item::Function(function) => {
            // Unresolvable types were already reported; an i32 stand-in
            // keeps the signature registered so calls still resolve.
            let params: Vec<TypeRef> = function
                .parameters
                .iter()
                .map(|param| {
                    ctx.resolve_value_type(&param.type_name)
                        .unwrap_or_else(|| ctx.i32_ty())
                })
                .collect();
            let param_names: Vec<String> = function
                .parameters
                .iter()
                .map(|param| param.name.name.clone())
                .collect();
            let ret = function
                .return_type
                .as_ref()
                .and_then(|type_name| {
                    let ty = ctx.resolve_type(type_name)?;
                    if matches!(ty.kind(), crate::types::TypeKind::Null) {
                        ctx.report(
                            ErrorKind::TypeMismatch,
                            "'null' cannot be a return type",
                            type_name.span(),
                        );
                        return None;
                    }
                    Some(ty)
                })
                .unwrap_or_else(|| ctx.unit_ty());

            let value = ctx.ir.declare_function(&function.name.name, &params, &ret)?;
            let declared = ctx.env.borrow_mut().declare_global(
                &function.name.name,
                Symbol::Function {
                    params,
                    param_names,
                    ret,
                    value,
                },
            );
            report_declare_error(ctx, declared.err(), function.name.span);
        }
        Item::Resource(decl) => {
            let Some(ty) = ctx.registry.borrow().lookup_by_name(&decl.name.name) else {
                return Ok(());
            };
            if !ty.is_resource() {
                // the name clashed with something else in phase 1
                return Ok(());
            }

            let fields: Vec<(String, TypeRef)> = decl
                .fields
                .iter()
                .map(|field| {
                    let field_ty = ctx
                        .resolve_value_type(&field.type_name)
                        .unwrap_or_else(|| ctx.i32_ty());
                    (field.name.name.clone(), field_ty)
                })
                .collect();
            ctx.registry.borrow().set_resource_fields(&ty, fields.clone());
            ctx.ir.define_resource_struct(&ty)?;

            let constructor = synthesize_constructor(ctx, &ty, &fields)?;
            let destructor = synthesize_destructor(ctx, &ty)?;
            let declared = ctx.env.borrow_mut().declare_global(
                &decl.name.name,
                Symbol::Resource {
                    ty,
                    constructor,
                    destructor,
                },
            );
            report_declare_error(ctx, declared.err(), decl.name.span);
        }
        Item::Alias(alias) => {
            let Some(ty) = ctx.registry.borrow().lookup_by_name(&alias.name.name) else {
                return Ok(());
            };
            let declared = ctx
                .env
                .borrow_mut()
                .declare_global(&alias.name.name, Symbol::TypeAlias { ty });
            report_declare_error(ctx, declared.err(), alias.name.span);
        }
    }
    Ok(())
}

fn report_declare_error(ctx: &CodegenContext<'_>, error: Option<EnvError>, span: Span) {
    match error {
        Some(EnvError::DuplicateSymbol { name }) => {
            ctx.report(
                ErrorKind::DuplicateSymbol,
                format!("'{name}' is already defined"),
                span,
            );
        }
        Some(EnvError::SealedRoot { name }) => {
            ctx.sink.internal(
                ErrorKind::IrError,
                format!("global '{name}' registered after sealing"),
                ctx.file(),
            );
        }
        None => {}
    }
}

/// The constructor of a resource heap-allocates the backing struct and
/// stores each field argument in declaration order.
fn synthesize_constructor<'ctx>(
    ctx: &CodegenContext<'ctx>,
    ty: &TypeRef,
    fields: &[(String, TypeRef)],
) -> IrResult<FunctionValue<'ctx>> {
    let params: Vec<TypeRef> = fields.iter().map(|(_, field_ty)| field_ty.clone()).collect();
    let function = ctx
        .ir
        .declare_function(&format!("{}.new", ty.name()), &params, ty)?;

    let entry = ctx.ir.append_block(function, "entry")?;
    ctx.ir.position_at_end(entry)?;

    let malloc = ctx.ir.libc_malloc()?;
    let size = ctx.ir.resource_size(ty)?;
    let object = ctx
        .ir
        .call(malloc, std::slice::from_ref(&size), ty)?
        .ok_or_else(|| IrError::Malformed("malloc must produce a pointer".into()))?;

    for (index, (field_name, field_ty)) in fields.iter().enumerate() {
        let argument = function
            .get_nth_param(index as u32)
            .ok_or_else(|| IrError::Malformed(format!("constructor of '{ty}' lost a parameter")))?;
        let field_ptr =
            ctx.ir
                .resource_field_ptr(ty, object.ir.into_pointer_value(), index, field_name)?;
        ctx.ir.store(
            field_ptr,
            &ConcreteValue {
                ty: field_ty.clone(),
                ir: argument,
                span: Span::default(),
            },
        )?;
    }

    ctx.ir.ret(Some(&object))?;
    Ok(function)
}

/// The destructor releases the backing allocation.
fn synthesize_destructor<'ctx>(
    ctx: &CodegenContext<'ctx>,
    ty: &TypeRef,
) -> IrResult<FunctionValue<'ctx>> {
    let unit = ctx.unit_ty();
    let function = ctx
        .ir
        .declare_function(&format!("{}.drop", ty.name()), std::slice::from_ref(ty), &unit)?;

    let entry = ctx.ir.append_block(function, "entry")?;
    ctx.ir.position_at_end(entry)?;

    let free = ctx.ir.libc_free()?;
    let object = function
        .get_nth_param(0)
        .ok_or_else(|| IrError::Malformed(format!("destructor of '{ty}' lost its parameter")))?;
    ctx.ir.call(
        free,
        &[ConcreteValue {
            ty: ty.clone(),
            ir: object,
            span: Span::default(),
        }],
        &unit,
    )?;
    ctx.ir.ret(None)?;
    Ok(function)
}

fn lower_unit<'ctx>(ctx: &CodegenContext<'ctx>, unit: &CompilationUnit) -> IrResult<()> {
    for item in &unit.items {
        if ctx.error_limit_reached() {
            debug!("error ceiling reached in '{}', stopping this unit", unit.file);
            return Ok(());
        }
        if let Item::Function(function) = item {
            function.lower(ctx)?;
        }
    }
    Ok(())
}
