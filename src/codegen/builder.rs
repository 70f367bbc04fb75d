//! Stateful facade over the native LLVM context/module/builder triple.
//!
//! All IR construction funnels through this type: the lowering walk decides
//! *what* to emit and the facade knows *how*, including the mapping from
//! registry types to LLVM types (cached per type, populated for every
//! registered type before bodies are lowered).
//!
//! The three native handles are released by drop order; a `disposed` flag is
//! kept for diagnostics. `dispose` succeeds exactly once, and every emitter
//! refuses to touch the handles afterwards, reporting [`IrError::Disposed`].
//!
//! Emitters are total on well-typed operands. A malformed request (binary
//! arithmetic on a resource, a branch on a non-bool) is a bug in the walk,
//! reported as [`IrError::Malformed`] and fatal for the unit being lowered.

use std::{cell::Cell, cell::RefCell, collections::HashMap, error::Error, fmt::Display, path::Path};

use inkwell::{
    basic_block::BasicBlock,
    builder::Builder,
    context::Context,
    module::Module,
    passes::PassBuilderOptions,
    targets::{
        CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
    },
    types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, StructType},
    values::{BasicMetadataValueEnum, BasicValue, BasicValueEnum, FunctionValue, PointerValue},
    AddressSpace, FloatPredicate, IntPredicate, OptimizationLevel,
};
use once_cell::sync::OnceCell;

use crate::{
    lexer::Span,
    types::{TypeKind, TypeRef, TypeRegistry},
};

use super::value::ConcreteValue;

/// Failures raised by the facade itself. `Disposed` is fatal for the whole
/// job, the other variants for the unit being lowered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrError {
    /// An operation was attempted after `dispose`.
    Disposed,
    /// The walk handed the facade an ill-typed request.
    Malformed(String),
    /// The native backend rejected an operation.
    Backend(String),
}

impl Display for IrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrError::Disposed => f.write_str("IR builder used after release"),
            IrError::Malformed(message) => f.write_fmt(format_args!("malformed IR request: {message}")),
            IrError::Backend(message) => f.write_fmt(format_args!("LLVM error: {message}")),
        }
    }
}

impl Error for IrError {}

pub type IrResult<T> = Result<T, IrError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

/// What `emit_object` writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFileType {
    Object,
    Assembly,
}

impl From<OutputFileType> for FileType {
    fn from(value: OutputFileType) -> FileType {
        match value {
            OutputFileType::Object => FileType::Object,
            OutputFileType::Assembly => FileType::Assembly,
        }
    }
}

/// Native code generation for the host target is initialized exactly once
/// per process, on first use.
static NATIVE_TARGET: OnceCell<Result<(), String>> = OnceCell::new();

fn initialize_native_target() -> IrResult<()> {
    NATIVE_TARGET
        .get_or_init(|| Target::initialize_native(&InitializationConfig::default()))
        .clone()
        .map_err(IrError::Backend)
}

pub struct IrBuilder<'ctx> {
    pub context: &'ctx Context,
    pub module: Module<'ctx>,
    pub builder: Builder<'ctx>,
    /// Cache mapping registry types to their LLVM value representation.
    types: RefCell<HashMap<TypeRef, BasicTypeEnum<'ctx>>>,
    /// Named struct layouts backing resource types.
    resource_structs: RefCell<HashMap<TypeRef, StructType<'ctx>>>,
    disposed: Cell<bool>,
}

impl<'ctx> IrBuilder<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str) -> IrBuilder<'ctx> {
        IrBuilder {
            context,
            module: context.create_module(module_name),
            builder: context.create_builder(),
            types: RefCell::new(HashMap::new()),
            resource_structs: RefCell::new(HashMap::new()),
            disposed: Cell::new(false),
        }
    }

    fn ensure_live(&self) -> IrResult<()> {
        if self.disposed.get() {
            Err(IrError::Disposed)
        } else {
            Ok(())
        }
    }

    fn malformed(&self, message: impl ToString) -> IrError {
        IrError::Malformed(message.to_string())
    }

    fn backend<E: Display>(error: E) -> IrError {
        IrError::Backend(error.to_string())
    }

    /// Mark the native handles as released. The handles themselves are
    /// reclaimed when the facade is dropped; a second call reports
    /// `Disposed` and leaves the state untouched.
    pub fn dispose(&self) -> IrResult<()> {
        self.ensure_live()?;
        self.disposed.set(true);
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    // ---- type mapping ----------------------------------------------------

    /// The LLVM value representation of a registry type, cached.
    pub fn basic_type(&self, ty: &TypeRef) -> IrResult<BasicTypeEnum<'ctx>> {
        self.ensure_live()?;
        if let Some(cached) = self.types.borrow().get(ty) {
            return Ok(*cached);
        }

        let mapped: BasicTypeEnum<'ctx> = match ty.kind() {
            TypeKind::Bool => self.context.bool_type().into(),
            TypeKind::Char => self.context.i8_type().into(),
            TypeKind::Int { width, .. } => self.context.custom_width_int_type(*width).into(),
            TypeKind::Float { width: 32 } => self.context.f32_type().into(),
            TypeKind::Float { width: 64 } => self.context.f64_type().into(),
            TypeKind::Float { width } => {
                return Err(self.malformed(format!("unsupported float width {width}")));
            }
            TypeKind::Str
            | TypeKind::Reference { .. }
            | TypeKind::Resource { .. }
            | TypeKind::Function { .. } => {
                self.context.ptr_type(AddressSpace::default()).into()
            }
            TypeKind::Unit | TypeKind::Null | TypeKind::Generic { .. } => {
                return Err(self.malformed(format!("type '{ty}' has no value representation")));
            }
        };

        self.types.borrow_mut().insert(ty.clone(), mapped);
        Ok(mapped)
    }

    /// Create the named opaque struct behind a resource type. The body is
    /// set later, once all field types are resolvable.
    pub fn declare_resource_struct(&self, ty: &TypeRef) -> IrResult<()> {
        self.ensure_live()?;
        let struct_type = self.context.opaque_struct_type(ty.name());
        self.resource_structs.borrow_mut().insert(ty.clone(), struct_type);
        Ok(())
    }

    pub fn define_resource_struct(&self, ty: &TypeRef) -> IrResult<()> {
        self.ensure_live()?;
        let struct_type = self.resource_struct(ty)?;
        let fields = ty
            .resource_fields()
            .ok_or_else(|| self.malformed(format!("'{ty}' is not a resource")))?;

        let mut field_types = vec![];
        for (_, field_ty) in &fields {
            field_types.push(self.basic_type(field_ty)?);
        }
        struct_type.set_body(&field_types, false);
        Ok(())
    }

    pub fn resource_struct(&self, ty: &TypeRef) -> IrResult<StructType<'ctx>> {
        self.resource_structs
            .borrow()
            .get(ty)
            .copied()
            .ok_or_else(|| self.malformed(format!("resource '{ty}' has no struct layout")))
    }

    /// Populate the type cache for every registered type that has a value
    /// representation. After this, lowering never creates new LLVM types.
    pub fn realize_types(&self, registry: &TypeRegistry) -> IrResult<()> {
        self.ensure_live()?;
        for ty in registry.all_types() {
            match ty.kind() {
                TypeKind::Unit | TypeKind::Null | TypeKind::Generic { .. } => {}
                _ => {
                    self.basic_type(&ty)?;
                }
            }
        }
        Ok(())
    }

    // ---- functions and blocks --------------------------------------------

    pub fn declare_function(
        &self,
        name: &str,
        params: &[TypeRef],
        ret: &TypeRef,
    ) -> IrResult<FunctionValue<'ctx>> {
        self.ensure_live()?;

        let mut param_types: Vec<BasicMetadataTypeEnum<'ctx>> = vec![];
        for param in params {
            param_types.push(self.basic_type(param)?.into());
        }

        let fn_type = if ret.is_unit() {
            self.context.void_type().fn_type(&param_types, false)
        } else {
            self.basic_type(ret)?.fn_type(&param_types, false)
        };

        Ok(self.module.add_function(name, fn_type, None))
    }

    pub fn append_block(
        &self,
        function: FunctionValue<'ctx>,
        name: &str,
    ) -> IrResult<BasicBlock<'ctx>> {
        self.ensure_live()?;
        Ok(self.context.append_basic_block(function, name))
    }

    pub fn position_at_end(&self, block: BasicBlock<'ctx>) -> IrResult<()> {
        self.ensure_live()?;
        self.builder.position_at_end(block);
        Ok(())
    }

    pub fn current_block(&self) -> Option<BasicBlock<'ctx>> {
        self.builder.get_insert_block()
    }

    pub fn current_function(&self) -> Option<FunctionValue<'ctx>> {
        self.current_block().and_then(|block| block.get_parent())
    }

    /// Whether the block under the cursor already ends in a terminator.
    pub fn block_terminated(&self) -> bool {
        self.current_block()
            .map(|block| block.get_terminator().is_some())
            .unwrap_or(false)
    }

    // ---- constants -------------------------------------------------------

    pub fn const_int(&self, ty: &TypeRef, value: i128) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        let TypeKind::Int { width, signed } = *ty.kind() else {
            return Err(self.malformed(format!("integer constant of non-integer type '{ty}'")));
        };

        let ir = self
            .context
            .custom_width_int_type(width)
            .const_int(value as u64, signed)
            .into();
        Ok(self.value(ty, ir))
    }

    pub fn const_float(&self, ty: &TypeRef, value: f64) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        let ir = match ty.kind() {
            TypeKind::Float { width: 32 } => self.context.f32_type().const_float(value).into(),
            TypeKind::Float { width: 64 } => self.context.f64_type().const_float(value).into(),
            _ => return Err(self.malformed(format!("float constant of non-float type '{ty}'"))),
        };
        Ok(self.value(ty, ir))
    }

    pub fn const_bool(&self, ty: &TypeRef, value: bool) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        if !ty.is_bool() {
            return Err(self.malformed(format!("bool constant of non-bool type '{ty}'")));
        }
        let ir = self.context.bool_type().const_int(value as u64, false).into();
        Ok(self.value(ty, ir))
    }

    pub fn const_char(&self, ty: &TypeRef, value: u8) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        if !ty.is_char() {
            return Err(self.malformed(format!("char constant of non-char type '{ty}'")));
        }
        let ir = self.context.i8_type().const_int(value as u64, false).into();
        Ok(self.value(ty, ir))
    }

    pub fn const_null(&self, ty: &TypeRef) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        if !ty.is_nullable() {
            return Err(self.malformed(format!("null constant of non-nullable type '{ty}'")));
        }
        let ir = self.context.ptr_type(AddressSpace::default()).const_null().into();
        Ok(self.value(ty, ir))
    }

    /// Interned C string in the module, value is the pointer to it. Must be
    /// called with the cursor inside a function.
    pub fn const_string(&self, ty: &TypeRef, value: &str) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        if !ty.is_string() {
            return Err(self.malformed(format!("string constant of non-string type '{ty}'")));
        }
        let global = self
            .builder
            .build_global_string_ptr(value, "str")
            .map_err(Self::backend)?;
        Ok(self.value(ty, global.as_pointer_value().into()))
    }

    /// A zero/null pattern of the given type; used as the placeholder the
    /// walk substitutes after reporting a semantic error.
    pub fn zero_value(&self, ty: &TypeRef) -> IrResult<ConcreteValue<'ctx>> {
        let basic = self.basic_type(ty)?;
        let ir: BasicValueEnum<'ctx> = match basic {
            BasicTypeEnum::IntType(int_type) => int_type.const_zero().into(),
            BasicTypeEnum::FloatType(float_type) => float_type.const_zero().into(),
            BasicTypeEnum::PointerType(ptr_type) => ptr_type.const_null().into(),
            other => return Err(self.malformed(format!("no zero value for {other:?}"))),
        };
        Ok(self.value(ty, ir))
    }

    fn value(&self, ty: &TypeRef, ir: BasicValueEnum<'ctx>) -> ConcreteValue<'ctx> {
        ConcreteValue {
            ty: ty.clone(),
            ir,
            span: Span::default(),
        }
    }

    // ---- arithmetic, comparisons, bit operations -------------------------

    fn expect_same_type(
        &self,
        lhs: &ConcreteValue<'ctx>,
        rhs: &ConcreteValue<'ctx>,
    ) -> IrResult<()> {
        if lhs.ty != rhs.ty {
            return Err(self.malformed(format!(
                "operand types differ: '{}' vs '{}'",
                lhs.ty, rhs.ty
            )));
        }
        Ok(())
    }

    /// Add/sub/mul/div/rem; the signed or unsigned instruction is selected
    /// by the operand type. Integer overflow wraps.
    pub fn arith(
        &self,
        op: ArithOp,
        lhs: &ConcreteValue<'ctx>,
        rhs: &ConcreteValue<'ctx>,
    ) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        self.expect_same_type(lhs, rhs)?;
        let ty = &lhs.ty;

        if let TypeKind::Int { signed, .. } = *ty.kind() {
            let left = lhs.ir.into_int_value();
            let right = rhs.ir.into_int_value();
            let result = match op {
                ArithOp::Add => self.builder.build_int_add(left, right, ""),
                ArithOp::Sub => self.builder.build_int_sub(left, right, ""),
                ArithOp::Mul => self.builder.build_int_mul(left, right, ""),
                ArithOp::Div if signed => self.builder.build_int_signed_div(left, right, ""),
                ArithOp::Div => self.builder.build_int_unsigned_div(left, right, ""),
                ArithOp::Rem if signed => self.builder.build_int_signed_rem(left, right, ""),
                ArithOp::Rem => self.builder.build_int_unsigned_rem(left, right, ""),
            };
            return Ok(self.value(ty, result.map_err(Self::backend)?.into()));
        }

        if ty.is_float() {
            let left = lhs.ir.into_float_value();
            let right = rhs.ir.into_float_value();
            let result = match op {
                ArithOp::Add => self.builder.build_float_add(left, right, ""),
                ArithOp::Sub => self.builder.build_float_sub(left, right, ""),
                ArithOp::Mul => self.builder.build_float_mul(left, right, ""),
                ArithOp::Div => self.builder.build_float_div(left, right, ""),
                ArithOp::Rem => self.builder.build_float_rem(left, right, ""),
            };
            return Ok(self.value(ty, result.map_err(Self::backend)?.into()));
        }

        Err(self.malformed(format!("arithmetic on non-numeric type '{ty}'")))
    }

    /// Integer comparison keyed by the backend predicate tag.
    pub fn int_compare(
        &self,
        predicate: IntPredicate,
        lhs: &ConcreteValue<'ctx>,
        rhs: &ConcreteValue<'ctx>,
        bool_ty: &TypeRef,
    ) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        self.expect_same_type(lhs, rhs)?;
        if !(lhs.ty.is_int() || lhs.ty.is_char() || lhs.ty.is_bool()) {
            return Err(self.malformed(format!("integer comparison on '{}'", lhs.ty)));
        }

        let result = self
            .builder
            .build_int_compare(
                predicate,
                lhs.ir.into_int_value(),
                rhs.ir.into_int_value(),
                "",
            )
            .map_err(Self::backend)?;
        Ok(self.value(bool_ty, result.into()))
    }

    /// Float comparison; the walk passes ordered predicates by default.
    pub fn float_compare(
        &self,
        predicate: FloatPredicate,
        lhs: &ConcreteValue<'ctx>,
        rhs: &ConcreteValue<'ctx>,
        bool_ty: &TypeRef,
    ) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        self.expect_same_type(lhs, rhs)?;
        if !lhs.ty.is_float() {
            return Err(self.malformed(format!("float comparison on '{}'", lhs.ty)));
        }

        let result = self
            .builder
            .build_float_compare(
                predicate,
                lhs.ir.into_float_value(),
                rhs.ir.into_float_value(),
                "",
            )
            .map_err(Self::backend)?;
        Ok(self.value(bool_ty, result.into()))
    }

    /// Address equality between nullable values (`icmp` over pointers).
    /// Only equality and inequality are defined for them.
    pub fn pointer_compare(
        &self,
        equal: bool,
        lhs: &ConcreteValue<'ctx>,
        rhs: &ConcreteValue<'ctx>,
        bool_ty: &TypeRef,
    ) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        self.expect_same_type(lhs, rhs)?;
        if !lhs.ty.is_nullable() && !lhs.ty.is_string() {
            return Err(self.malformed(format!("pointer comparison on '{}'", lhs.ty)));
        }

        let predicate = if equal { IntPredicate::EQ } else { IntPredicate::NE };
        let result = self
            .builder
            .build_int_compare(
                predicate,
                lhs.ir.into_pointer_value(),
                rhs.ir.into_pointer_value(),
                "",
            )
            .map_err(Self::backend)?;
        Ok(self.value(bool_ty, result.into()))
    }

    pub fn bitwise(
        &self,
        op: BitOp,
        lhs: &ConcreteValue<'ctx>,
        rhs: &ConcreteValue<'ctx>,
    ) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        self.expect_same_type(lhs, rhs)?;
        let TypeKind::Int { signed, .. } = *lhs.ty.kind() else {
            return Err(self.malformed(format!("bitwise operation on '{}'", lhs.ty)));
        };

        let left = lhs.ir.into_int_value();
        let right = rhs.ir.into_int_value();
        let result = match op {
            BitOp::And => self.builder.build_and(left, right, ""),
            BitOp::Or => self.builder.build_or(left, right, ""),
            BitOp::Xor => self.builder.build_xor(left, right, ""),
            BitOp::Shl => self.builder.build_left_shift(left, right, ""),
            // arithmetic shift for signed operands
            BitOp::Shr => self.builder.build_right_shift(left, right, signed, ""),
        };
        Ok(self.value(&lhs.ty, result.map_err(Self::backend)?.into()))
    }

    pub fn not(&self, value: &ConcreteValue<'ctx>) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        if !value.ty.is_bool() {
            return Err(self.malformed(format!("logical not on '{}'", value.ty)));
        }
        let result = self
            .builder
            .build_not(value.ir.into_int_value(), "")
            .map_err(Self::backend)?;
        Ok(self.value(&value.ty, result.into()))
    }

    pub fn neg(&self, value: &ConcreteValue<'ctx>) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        if value.ty.is_int() {
            let result = self
                .builder
                .build_int_neg(value.ir.into_int_value(), "")
                .map_err(Self::backend)?;
            return Ok(self.value(&value.ty, result.into()));
        }
        if value.ty.is_float() {
            let result = self
                .builder
                .build_float_neg(value.ir.into_float_value(), "")
                .map_err(Self::backend)?;
            return Ok(self.value(&value.ty, result.into()));
        }
        Err(self.malformed(format!("negation on '{}'", value.ty)))
    }

    // ---- memory ----------------------------------------------------------

    /// Stack slot in the entry block of `function`, so every alloca
    /// dominates all uses and LLVM can promote it.
    pub fn alloca(
        &self,
        function: FunctionValue<'ctx>,
        ty: &TypeRef,
        name: &str,
    ) -> IrResult<PointerValue<'ctx>> {
        self.ensure_live()?;
        let basic = self.basic_type(ty)?;
        let entry = function
            .get_first_basic_block()
            .ok_or_else(|| self.malformed("alloca in a bodyless function"))?;

        let cursor = self.context.create_builder();
        match entry.get_first_instruction() {
            Some(instruction) => cursor.position_before(&instruction),
            None => cursor.position_at_end(entry),
        }
        cursor.build_alloca(basic, name).map_err(Self::backend)
    }

    fn alignment_of(ty: &TypeRef) -> u32 {
        (ty.width() / 8).clamp(1, 8)
    }

    pub fn store(&self, ptr: PointerValue<'ctx>, value: &ConcreteValue<'ctx>) -> IrResult<()> {
        self.ensure_live()?;
        let instruction = self
            .builder
            .build_store(ptr, value.ir)
            .map_err(Self::backend)?;
        instruction
            .set_alignment(Self::alignment_of(&value.ty))
            .map_err(Self::backend)?;
        Ok(())
    }

    pub fn load(
        &self,
        ptr: PointerValue<'ctx>,
        ty: &TypeRef,
        name: &str,
    ) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        let basic = self.basic_type(ty)?;
        let loaded = self
            .builder
            .build_load(basic, ptr, name)
            .map_err(Self::backend)?;
        if let Some(instruction) = loaded.as_instruction_value() {
            instruction
                .set_alignment(Self::alignment_of(ty))
                .map_err(Self::backend)?;
        }
        Ok(self.value(ty, loaded))
    }

    /// Address of field `index` inside the struct backing `resource_ty`.
    pub fn resource_field_ptr(
        &self,
        resource_ty: &TypeRef,
        object: PointerValue<'ctx>,
        index: usize,
        name: &str,
    ) -> IrResult<PointerValue<'ctx>> {
        self.ensure_live()?;
        let struct_type = self.resource_struct(resource_ty)?;
        self.builder
            .build_struct_gep(struct_type, object, index as u32, name)
            .map_err(Self::backend)
    }

    // ---- control flow ----------------------------------------------------

    pub fn branch(&self, target: BasicBlock<'ctx>) -> IrResult<()> {
        self.ensure_live()?;
        self.builder
            .build_unconditional_branch(target)
            .map_err(Self::backend)?;
        Ok(())
    }

    pub fn cond_branch(
        &self,
        condition: &ConcreteValue<'ctx>,
        then_block: BasicBlock<'ctx>,
        else_block: BasicBlock<'ctx>,
    ) -> IrResult<()> {
        self.ensure_live()?;
        if !condition.ty.is_bool() {
            return Err(self.malformed(format!("branch on non-bool '{}'", condition.ty)));
        }
        self.builder
            .build_conditional_branch(condition.ir.into_int_value(), then_block, else_block)
            .map_err(Self::backend)?;
        Ok(())
    }

    pub fn ret(&self, value: Option<&ConcreteValue<'ctx>>) -> IrResult<()> {
        self.ensure_live()?;
        let result = match value {
            Some(value) => self.builder.build_return(Some(&value.ir)),
            None => self.builder.build_return(None),
        };
        result.map_err(Self::backend)?;
        Ok(())
    }

    pub fn unreachable(&self) -> IrResult<()> {
        self.ensure_live()?;
        self.builder.build_unreachable().map_err(Self::backend)?;
        Ok(())
    }

    pub fn phi(
        &self,
        ty: &TypeRef,
        name: &str,
        incoming: &[(BasicValueEnum<'ctx>, BasicBlock<'ctx>)],
    ) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        let basic = self.basic_type(ty)?;
        let phi = self.builder.build_phi(basic, name).map_err(Self::backend)?;

        let edges: Vec<(&dyn BasicValue<'ctx>, BasicBlock<'ctx>)> = incoming
            .iter()
            .map(|(value, block)| (value as &dyn BasicValue<'ctx>, *block))
            .collect();
        phi.add_incoming(&edges);

        Ok(self.value(ty, phi.as_basic_value()))
    }

    pub fn call(
        &self,
        function: FunctionValue<'ctx>,
        args: &[ConcreteValue<'ctx>],
        ret: &TypeRef,
    ) -> IrResult<Option<ConcreteValue<'ctx>>> {
        self.ensure_live()?;
        let meta_args: Vec<BasicMetadataValueEnum<'ctx>> =
            args.iter().map(|arg| arg.ir.into()).collect();

        let site = self
            .builder
            .build_call(function, &meta_args, "")
            .map_err(Self::backend)?;

        if ret.is_unit() {
            return Ok(None);
        }
        let result = site
            .try_as_basic_value()
            .left()
            .ok_or_else(|| self.malformed(format!("call should produce a '{ret}' value")))?;
        Ok(Some(self.value(ret, result)))
    }

    // ---- casts -----------------------------------------------------------

    /// Explicit scalar conversion. Integer-like operands (bool, char, ints)
    /// convert by extension/truncation with the signedness of the source;
    /// int↔float conversions pick the signed or unsigned instruction the
    /// same way.
    pub fn cast(
        &self,
        value: &ConcreteValue<'ctx>,
        target: &TypeRef,
    ) -> IrResult<ConcreteValue<'ctx>> {
        self.ensure_live()?;
        if value.ty == *target {
            return Ok(self.value(target, value.ir));
        }
        if !value.ty.is_scalar() || !target.is_scalar() {
            return Err(self.malformed(format!(
                "cast between non-scalar types '{}' and '{target}'",
                value.ty
            )));
        }

        let from_int = int_shape(&value.ty);
        let to_int = int_shape(target);

        let ir: BasicValueEnum<'ctx> = match (from_int, to_int, value.ty.is_float(), target.is_float()) {
            // integer-like to integer-like
            (Some((from_width, from_signed)), Some((to_width, _)), _, _) => {
                let source = value.ir.into_int_value();
                let int_type = self.context.custom_width_int_type(to_width);
                let converted = if to_width > from_width {
                    if from_signed {
                        self.builder.build_int_s_extend(source, int_type, "")
                    } else {
                        self.builder.build_int_z_extend(source, int_type, "")
                    }
                } else if to_width < from_width {
                    self.builder.build_int_truncate(source, int_type, "")
                } else {
                    // same width, different signedness: the bit pattern is kept
                    Ok(source)
                };
                converted.map_err(Self::backend)?.into()
            }
            // integer-like to float
            (Some((_, from_signed)), None, _, true) => {
                let float_type = self.float_type(target)?;
                let source = value.ir.into_int_value();
                let converted = if from_signed {
                    self.builder.build_signed_int_to_float(source, float_type, "")
                } else {
                    self.builder.build_unsigned_int_to_float(source, float_type, "")
                };
                converted.map_err(Self::backend)?.into()
            }
            // float to integer-like
            (None, Some((to_width, to_signed)), true, _) => {
                let int_type = self.context.custom_width_int_type(to_width);
                let source = value.ir.into_float_value();
                let converted = if to_signed {
                    self.builder.build_float_to_signed_int(source, int_type, "")
                } else {
                    self.builder.build_float_to_unsigned_int(source, int_type, "")
                };
                converted.map_err(Self::backend)?.into()
            }
            // float to float
            (None, None, true, true) => {
                let float_type = self.float_type(target)?;
                let source = value.ir.into_float_value();
                let converted = if target.width() > value.ty.width() {
                    self.builder.build_float_ext(source, float_type, "")
                } else {
                    self.builder.build_float_trunc(source, float_type, "")
                };
                converted.map_err(Self::backend)?.into()
            }
            _ => {
                return Err(self.malformed(format!(
                    "no conversion from '{}' to '{target}'",
                    value.ty
                )));
            }
        };

        Ok(self.value(target, ir))
    }

    fn float_type(&self, ty: &TypeRef) -> IrResult<inkwell::types::FloatType<'ctx>> {
        match ty.kind() {
            TypeKind::Float { width: 32 } => Ok(self.context.f32_type()),
            TypeKind::Float { width: 64 } => Ok(self.context.f64_type()),
            _ => Err(self.malformed(format!("'{ty}' is not a float type"))),
        }
    }

    // ---- libc shims for resource lifetimes -------------------------------

    pub fn libc_malloc(&self) -> IrResult<FunctionValue<'ctx>> {
        self.ensure_live()?;
        if let Some(existing) = self.module.get_function("malloc") {
            return Ok(existing);
        }
        let ptr = self.context.ptr_type(AddressSpace::default());
        let fn_type = ptr.fn_type(&[self.context.i64_type().into()], false);
        Ok(self.module.add_function("malloc", fn_type, None))
    }

    pub fn libc_free(&self) -> IrResult<FunctionValue<'ctx>> {
        self.ensure_live()?;
        if let Some(existing) = self.module.get_function("free") {
            return Ok(existing);
        }
        let ptr = self.context.ptr_type(AddressSpace::default());
        let fn_type = self.context.void_type().fn_type(&[ptr.into()], false);
        Ok(self.module.add_function("free", fn_type, None))
    }

    /// Constant byte size of the struct behind a resource type.
    pub fn resource_size(&self, ty: &TypeRef) -> IrResult<ConcreteValue<'ctx>> {
        let struct_type = self.resource_struct(ty)?;
        let size = struct_type
            .size_of()
            .ok_or_else(|| self.malformed(format!("resource '{ty}' is unsized")))?;
        Ok(ConcreteValue {
            ty: ty.clone(),
            ir: size.into(),
            span: Span::default(),
        })
    }

    // ---- finalization ----------------------------------------------------

    pub fn set_source_file(&self, name: &str) -> IrResult<()> {
        self.ensure_live()?;
        self.module.set_source_file_name(name);
        Ok(())
    }

    /// Stamp the module-level debug info version flag.
    pub fn stamp_debug_info(&self) -> IrResult<()> {
        self.ensure_live()?;
        self.module.add_basic_value_flag(
            "Debug Info Version",
            inkwell::module::FlagBehavior::Warning,
            self.context.i32_type().const_int(3, false),
        );
        Ok(())
    }

    pub fn verify(&self) -> IrResult<()> {
        self.ensure_live()?;
        self.module.verify().map_err(Self::backend)
    }

    /// Human-readable IR for the whole module.
    pub fn emit_ir(&self) -> IrResult<String> {
        self.ensure_live()?;
        Ok(self.module.print_to_string().to_string())
    }

    fn target_machine(&self, opt_level: u8) -> IrResult<TargetMachine> {
        initialize_native_target()?;

        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple).map_err(Self::backend)?;
        let level = match opt_level {
            0 => OptimizationLevel::None,
            1 => OptimizationLevel::Less,
            2 => OptimizationLevel::Default,
            _ => OptimizationLevel::Aggressive,
        };

        target
            .create_target_machine(
                &triple,
                TargetMachine::get_host_cpu_name().to_string().as_str(),
                TargetMachine::get_host_cpu_features().to_string().as_str(),
                level,
                RelocMode::PIC,
                CodeModel::Default,
            )
            .ok_or_else(|| IrError::Backend("failed to create target machine".into()))
    }

    /// Run the fixed new-pass-manager pipeline for the given level
    /// (`default<O0>`..`default<O3>`).
    pub fn optimize(&self, opt_level: u8) -> IrResult<()> {
        self.ensure_live()?;
        let machine = self.target_machine(opt_level)?;
        self.module
            .run_passes(
                &format!("default<O{}>", opt_level.min(3)),
                &machine,
                PassBuilderOptions::create(),
            )
            .map_err(Self::backend)
    }

    /// Serialize the module for the host target.
    pub fn emit_object(
        &self,
        path: &Path,
        file_type: OutputFileType,
        opt_level: u8,
    ) -> IrResult<()> {
        self.ensure_live()?;
        let machine = self.target_machine(opt_level)?;

        self.module.set_triple(&machine.get_triple());
        self.module
            .set_data_layout(&machine.get_target_data().get_data_layout());

        machine
            .write_to_file(&self.module, file_type.into(), path)
            .map_err(Self::backend)
    }
}

/// Integer-like shape of a scalar: bool is a 1-bit unsigned, char an 8-bit
/// unsigned. Floats answer `None`.
fn int_shape(ty: &TypeRef) -> Option<(u32, bool)> {
    match *ty.kind() {
        TypeKind::Bool => Some((1, false)),
        TypeKind::Char => Some((8, false)),
        TypeKind::Int { width, signed } => Some((width, signed)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrimitiveKind, TypeRegistry};
    use inkwell::context::Context;

    #[test]
    fn test_dispose_is_one_shot() {
        let context = Context::create();
        let builder = IrBuilder::new(&context, "test");

        assert!(!builder.is_disposed());
        assert!(builder.dispose().is_ok());
        assert!(builder.is_disposed());
        assert_eq!(builder.dispose(), Err(IrError::Disposed));
        // still marked released, no crash
        assert!(builder.is_disposed());
    }

    #[test]
    fn test_emitters_reject_after_dispose() {
        let context = Context::create();
        let builder = IrBuilder::new(&context, "test");
        let registry = TypeRegistry::new();
        let i32_type = registry.intern_primitive(PrimitiveKind::I32);

        builder.dispose().unwrap();
        assert!(matches!(
            builder.const_int(&i32_type, 1),
            Err(IrError::Disposed)
        ));
        assert!(matches!(builder.emit_ir(), Err(IrError::Disposed)));
        assert!(matches!(builder.basic_type(&i32_type), Err(IrError::Disposed)));
    }

    #[test]
    fn test_const_int_requires_integer_type() {
        let context = Context::create();
        let builder = IrBuilder::new(&context, "test");
        let registry = TypeRegistry::new();
        let f64_type = registry.intern_primitive(PrimitiveKind::F64);

        assert!(matches!(
            builder.const_int(&f64_type, 1),
            Err(IrError::Malformed(_))
        ));
    }

    #[test]
    fn test_function_declaration_round_trips_types() {
        let context = Context::create();
        let builder = IrBuilder::new(&context, "test");
        let registry = TypeRegistry::new();
        let i32_type = registry.intern_primitive(PrimitiveKind::I32);
        let unit_type = registry.intern_primitive(PrimitiveKind::Unit);

        let function = builder
            .declare_function("f", &[i32_type.clone()], &i32_type)
            .unwrap();
        assert_eq!(function.count_params(), 1);

        let procedure = builder.declare_function("p", &[], &unit_type).unwrap();
        assert!(procedure.get_type().get_return_type().is_none());
    }

    #[test]
    fn test_arith_rejects_mixed_operand_types() {
        let context = Context::create();
        let builder = IrBuilder::new(&context, "test");
        let registry = TypeRegistry::new();
        let i32_type = registry.intern_primitive(PrimitiveKind::I32);
        let i64_type = registry.intern_primitive(PrimitiveKind::I64);

        let function = builder.declare_function("f", &[], &i32_type).unwrap();
        let entry = builder.append_block(function, "entry").unwrap();
        builder.position_at_end(entry).unwrap();

        let small = builder.const_int(&i32_type, 1).unwrap();
        let large = builder.const_int(&i64_type, 1).unwrap();
        assert!(matches!(
            builder.arith(ArithOp::Add, &small, &large),
            Err(IrError::Malformed(_))
        ));
    }

    #[test]
    fn test_textual_ir_contains_declared_function() {
        let context = Context::create();
        let builder = IrBuilder::new(&context, "test");
        let registry = TypeRegistry::new();
        let i32_type = registry.intern_primitive(PrimitiveKind::I32);

        let function = builder.declare_function("answer", &[], &i32_type).unwrap();
        let entry = builder.append_block(function, "entry").unwrap();
        builder.position_at_end(entry).unwrap();
        let value = builder.const_int(&i32_type, 42).unwrap();
        builder.ret(Some(&value)).unwrap();

        builder.verify().unwrap();
        let ir = builder.emit_ir().unwrap();
        assert!(ir.contains("define i32 @answer"));
        assert!(ir.contains("ret i32 42"));
    }
}
