//! `for i in start..end` lowering.
//!
//! The bounds are evaluated once, before the loop. The induction variable
//! lives in a stack slot, is visible inside the body as an immutable
//! binding, and steps by one after each iteration. Signedness of the bound
//! type picks the comparison predicate.

use std::cell::Cell;

use inkwell::IntPredicate;

use crate::{
    codegen::{
        builder::{ArithOp, IrResult},
        statements::lower_statements,
        value::Value,
        CodegenContext,
    },
    diagnostics::ErrorKind,
    parser::ast::ForLoop,
    scope::Symbol,
    types::{coercion, TypeRef},
};

impl ForLoop {
    pub(crate) fn lower<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<()> {
        let start = self.start.lower(ctx)?;
        let end = self.end.lower(ctx)?;

        let ty = self.induction_type(ctx, &start, &end);
        let start = ctx.coerce(start, &ty)?;
        let end = ctx.coerce(end, &ty)?;

        let function = ctx.current_function();
        let slot = ctx.ir.alloca(function, &ty, &self.binding.name)?;
        ctx.ir.store(slot, &start)?;

        let condition_block = ctx.ir.append_block(function, "for.condition")?;
        let body_block = ctx.ir.append_block(function, "for.body")?;
        let end_block = ctx.ir.append_block(function, "for.end")?;

        ctx.ir.branch(condition_block)?;

        ctx.ir.position_at_end(condition_block)?;
        let bool_ty = ctx.bool_ty();
        let current = ctx.ir.load(slot, &ty, &self.binding.name)?;
        let predicate = if ty.int_signed().unwrap_or(true) {
            IntPredicate::SLT
        } else {
            IntPredicate::ULT
        };
        let condition = ctx.ir.int_compare(predicate, &current, &end, &bool_ty)?;
        ctx.ir.cond_branch(&condition, body_block, end_block)?;

        ctx.ir.position_at_end(body_block)?;
        ctx.set_terminated(false);
        ctx.enter_scope();
        let _ = ctx.env.borrow_mut().declare(
            &self.binding.name,
            Symbol::Variable {
                ty: ty.clone(),
                mutable: false,
                ptr: slot,
                moved: Cell::new(false),
            },
        );
        lower_statements(ctx, &self.body.statements)?;
        ctx.leave_scope_with_drops()?;

        if !ctx.ir.block_terminated() {
            let current = ctx.ir.load(slot, &ty, &self.binding.name)?;
            let one = ctx.ir.const_int(&ty, 1)?;
            let next = ctx.ir.arith(ArithOp::Add, &current, &one)?;
            ctx.ir.store(slot, &next)?;
            ctx.ir.branch(condition_block)?;
        }

        ctx.ir.position_at_end(end_block)?;
        ctx.set_terminated(false);
        Ok(())
    }

    /// Common integer type of the two bounds; reported and replaced with
    /// `i32` when none exists.
    fn induction_type<'ctx>(
        &self,
        ctx: &CodegenContext<'ctx>,
        start: &Value<'ctx>,
        end: &Value<'ctx>,
    ) -> TypeRef {
        let effective = |value: &Value<'ctx>| -> Option<TypeRef> {
            match value {
                Value::Concrete(concrete) => Some(concrete.ty.clone()),
                Value::Literal(literal) => literal.default_type(&ctx.registry.borrow()),
                Value::Unit(_) => None,
            }
        };

        let common = effective(start)
            .zip(effective(end))
            .and_then(|(a, b)| coercion::common_type(&a, &b))
            .filter(TypeRef::is_int);

        match common {
            Some(ty) => ty,
            None => {
                ctx.report(
                    ErrorKind::TypeMismatch,
                    "range bounds must share an integer type",
                    self.span,
                );
                ctx.i32_ty()
            }
        }
    }
}
