//! `if`/`else if`/`else` lowering.
//!
//! Three blocks per statement: then, else, merge. Branch bodies run in
//! their own scope. The statement produces no value, so the merge block
//! carries no phi; a path is considered terminated only when both branches
//! terminate.

use crate::{
    codegen::{builder::IrResult, statements::lower_block, CodegenContext},
    parser::ast::{ElseBranch, IfStatement},
};

impl IfStatement {
    pub(crate) fn lower<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<()> {
        let bool_ty = ctx.bool_ty();
        let condition_value = self.condition.lower(ctx)?;
        let condition = ctx.coerce(condition_value, &bool_ty)?;

        let function = ctx.current_function();
        let then_block = ctx.ir.append_block(function, "if.then")?;
        let else_block = ctx.ir.append_block(function, "if.else")?;
        let merge_block = ctx.ir.append_block(function, "if.end")?;

        ctx.ir.cond_branch(&condition, then_block, else_block)?;

        let before = ctx.is_terminated();

        ctx.ir.position_at_end(then_block)?;
        ctx.set_terminated(false);
        lower_block(ctx, &self.then_block)?;
        let then_terminated = ctx.is_terminated();
        if !ctx.ir.block_terminated() {
            ctx.ir.branch(merge_block)?;
        }

        ctx.ir.position_at_end(else_block)?;
        ctx.set_terminated(false);
        match &self.else_branch {
            Some(ElseBranch::Block(block)) => lower_block(ctx, block)?,
            Some(ElseBranch::If(nested)) => nested.lower(ctx)?,
            None => {}
        }
        let else_terminated = ctx.is_terminated();
        if !ctx.ir.block_terminated() {
            ctx.ir.branch(merge_block)?;
        }

        ctx.ir.position_at_end(merge_block)?;
        ctx.set_terminated(before || (then_terminated && else_terminated));
        Ok(())
    }
}
