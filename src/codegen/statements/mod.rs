//! Statement lowering.
//!
//! Statements perform effects and manage control flow; none of them produce
//! a value. Each statement kind lowers in its own module; this module holds
//! the dispatch, block scoping, and the ownership helpers shared by `let`,
//! assignment and `return`.

mod assignment;
mod declaration;
mod for_loop;
mod function;
mod if_statement;
mod return_statement;
mod while_loop;

pub(crate) use assignment::{field_of, report_missing_field};

use crate::{
    parser::ast::{Block, Expression, Statement},
    scope::Symbol,
};

use super::{builder::IrResult, value::Value, CodegenContext, ScheduledDrop};

pub(crate) fn lower_statements<'ctx>(
    ctx: &CodegenContext<'ctx>,
    statements: &[Statement],
) -> IrResult<()> {
    for statement in statements {
        if ctx.error_limit_reached() {
            return Ok(());
        }
        lower_statement(ctx, statement)?;
    }
    Ok(())
}

fn lower_statement<'ctx>(ctx: &CodegenContext<'ctx>, statement: &Statement) -> IrResult<()> {
    match statement {
        Statement::Let(inner) => inner.lower(ctx),
        Statement::Assignment(inner) => inner.lower(ctx),
        Statement::If(inner) => inner.lower(ctx),
        Statement::While(inner) => inner.lower(ctx),
        Statement::For(inner) => inner.lower(ctx),
        Statement::Return(inner) => inner.lower(ctx),
        Statement::Block(block) => lower_block(ctx, block),
        Statement::Expression(expression) => lower_expression_statement(ctx, expression),
    }
}

/// A nested block runs in its own scope; resources declared inside are
/// destroyed when it exits.
pub(crate) fn lower_block<'ctx>(ctx: &CodegenContext<'ctx>, block: &Block) -> IrResult<()> {
    ctx.enter_scope();
    lower_statements(ctx, &block.statements)?;
    ctx.leave_scope_with_drops()
}

fn lower_expression_statement<'ctx>(
    ctx: &CodegenContext<'ctx>,
    expression: &Expression,
) -> IrResult<()> {
    let value = expression.lower(ctx)?;

    // A resource produced here and never bound still gets destroyed when
    // the enclosing scope exits. Reads of existing bindings are borrows.
    if let Value::Concrete(concrete) = &value {
        let is_fresh = !matches!(
            expression,
            Expression::Id(_) | Expression::FieldAccess(_)
        );
        if concrete.ty.is_resource() && is_fresh {
            if let Some(destructor) = ctx.destructor_for(&concrete.ty) {
                let name = ctx.temp_name();
                let slot = ctx.ir.alloca(ctx.current_function(), &concrete.ty, &name)?;
                ctx.ir.store(slot, concrete)?;
                ctx.schedule_drop(ScheduledDrop {
                    name,
                    slot,
                    ty: concrete.ty.clone(),
                    destructor,
                });
            }
        }
    }
    Ok(())
}

/// If `expression` reads a resource binding directly, the binding it names.
/// Such a read in `let`/assignment position is a move, not a borrow.
pub(crate) fn moved_source(ctx: &CodegenContext<'_>, expression: &Expression) -> Option<String> {
    let Expression::Id(id) = expression else {
        return None;
    };
    let symbol = ctx.env.borrow().lookup(&id.name)?;
    match symbol.as_ref() {
        Symbol::Variable { ty, .. } if ty.is_resource() => Some(id.name.clone()),
        _ => None,
    }
}
