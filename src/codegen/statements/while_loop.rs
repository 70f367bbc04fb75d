//! `while` lowering: condition, body and continuation blocks.
//!
//! The condition is re-evaluated in its own block on every iteration; the
//! body branches back unless something inside it already terminated. Code
//! after the loop is always considered reachable through the false edge.

use crate::{
    codegen::{builder::IrResult, statements::lower_block, CodegenContext},
    parser::ast::WhileLoop,
};

impl WhileLoop {
    pub(crate) fn lower<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<()> {
        let function = ctx.current_function();
        let condition_block = ctx.ir.append_block(function, "while.condition")?;
        let body_block = ctx.ir.append_block(function, "while.body")?;
        let end_block = ctx.ir.append_block(function, "while.end")?;

        ctx.ir.branch(condition_block)?;

        ctx.ir.position_at_end(condition_block)?;
        let bool_ty = ctx.bool_ty();
        let condition_value = self.condition.lower(ctx)?;
        let condition = ctx.coerce(condition_value, &bool_ty)?;
        ctx.ir.cond_branch(&condition, body_block, end_block)?;

        ctx.ir.position_at_end(body_block)?;
        ctx.set_terminated(false);
        lower_block(ctx, &self.body)?;
        if !ctx.ir.block_terminated() {
            ctx.ir.branch(condition_block)?;
        }

        ctx.ir.position_at_end(end_block)?;
        ctx.set_terminated(false);
        Ok(())
    }
}
