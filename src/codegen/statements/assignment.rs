//! Assignment lowering for both assignable places: named variables and
//! resource fields.
//!
//! The right-hand side is evaluated first, then coerced to the declared
//! type of the place, then stored. Assigning over a live resource destroys
//! the old value before the store.

use crate::{
    codegen::{builder::IrResult, statements::moved_source, CodegenContext},
    diagnostics::ErrorKind,
    parser::ast::{Assignment, Expression, FieldTarget, Ident, LValue},
    scope::Symbol,
    types::TypeRef,
};

use super::super::value::Value;

impl Assignment {
    pub(crate) fn lower<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<()> {
        match &self.target {
            LValue::Id(id) => self.lower_variable(ctx, id),
            LValue::Field(target) => self.lower_field(ctx, target),
        }
    }

    fn lower_variable<'ctx>(&self, ctx: &CodegenContext<'ctx>, id: &Ident) -> IrResult<()> {
        let symbol = { ctx.env.borrow().lookup(&id.name) };
        let Some(symbol) = symbol else {
            ctx.report(
                ErrorKind::UndefinedSymbol,
                format!("undefined symbol '{}'", id.name),
                id.span,
            );
            self.value.lower(ctx)?;
            return Ok(());
        };

        let Symbol::Variable {
            ty, mutable, ptr, ..
        } = symbol.as_ref()
        else {
            ctx.report(
                ErrorKind::TypeMismatch,
                format!("cannot assign to {} '{}'", symbol.describe(), id.name),
                id.span,
            );
            self.value.lower(ctx)?;
            return Ok(());
        };
        let (ty, mutable, ptr) = (ty.clone(), *mutable, *ptr);

        if !mutable {
            ctx.report(
                ErrorKind::MutabilityViolation,
                format!("cannot assign to immutable variable '{}'", id.name),
                id.span,
            );
        }

        let value = self.value.lower(ctx)?;
        let concrete = ctx.coerce(value, &ty)?;

        if ty.is_resource() {
            // the value being replaced dies here, unless it already moved
            if !symbol.is_moved() {
                if let Some(destructor) = ctx.destructor_for(&ty) {
                    let old = ctx.ir.load(ptr, &ty, &id.name)?;
                    ctx.ir.call(destructor, &[old], &ctx.unit_ty())?;
                }
            } else {
                symbol.clear_moved();
            }
            if let Some(source) = moved_source(ctx, &self.value) {
                if let Some(moved_symbol) = ctx.env.borrow().lookup(&source) {
                    moved_symbol.mark_moved();
                }
                // the target's own scheduled destruction now covers the value
                ctx.unschedule_drop(&source);
            }
        }

        ctx.ir.store(ptr, &concrete)?;
        Ok(())
    }

    fn lower_field<'ctx>(&self, ctx: &CodegenContext<'ctx>, target: &FieldTarget) -> IrResult<()> {
        let object_value = target.object.lower(ctx)?;
        let Value::Concrete(object) = object_value else {
            ctx.report(
                ErrorKind::TypeMismatch,
                "field assignment on a value without fields",
                target.field.span,
            );
            self.value.lower(ctx)?;
            return Ok(());
        };

        let Some((index, field_ty)) = field_of(&object.ty, &target.field) else {
            report_missing_field(ctx, &object.ty, &target.field);
            self.value.lower(ctx)?;
            return Ok(());
        };

        // writing through an immutable binding is rejected; other object
        // expressions (calls, nested fields) are writable places
        if let Expression::Id(id) = &target.object {
            let symbol = { ctx.env.borrow().lookup(&id.name) };
            if let Some(symbol) = symbol {
                if matches!(symbol.as_ref(), Symbol::Variable { mutable: false, .. }) {
                    ctx.report(
                        ErrorKind::MutabilityViolation,
                        format!("cannot assign through immutable variable '{}'", id.name),
                        target.field.span,
                    );
                }
            }
        }

        let value = self.value.lower(ctx)?;
        let concrete = ctx.coerce(value, &field_ty)?;
        let field_ptr = ctx.ir.resource_field_ptr(
            &object.ty,
            object.ir.into_pointer_value(),
            index,
            &target.field.name,
        )?;
        ctx.ir.store(field_ptr, &concrete)?;
        Ok(())
    }
}

pub(crate) fn field_of(ty: &TypeRef, field: &Ident) -> Option<(usize, TypeRef)> {
    ty.resource_field_index(&field.name)
}

pub(crate) fn report_missing_field(ctx: &CodegenContext<'_>, ty: &TypeRef, field: &Ident) {
    if ty.is_resource() {
        ctx.report(
            ErrorKind::TypeMismatch,
            format!("'{ty}' has no field '{}'", field.name),
            field.span,
        );
    } else {
        ctx.report(
            ErrorKind::TypeMismatch,
            format!("'{ty}' has no fields"),
            field.span,
        );
    }
}
