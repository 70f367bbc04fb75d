//! `return` lowering.
//!
//! The value is computed first, then every live scope runs its scheduled
//! destructor calls (innermost scope first, reverse declaration order
//! within each), then the `ret` is emitted. A returned resource binding is
//! excluded from those calls since its value leaves the function.
//!
//! Lowering continues in a detached block so statements after the return
//! are still type-checked; they are unreachable in the emitted module.

use crate::{
    codegen::{builder::IrResult, statements::moved_source, value::Value, CodegenContext},
    diagnostics::ErrorKind,
    parser::ast::ReturnStatement,
};

impl ReturnStatement {
    pub(crate) fn lower<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<()> {
        let ret = ctx.current_return_type();

        match &self.value {
            None => {
                if !ret.is_unit() {
                    ctx.report(
                        ErrorKind::TypeMismatch,
                        format!("expected a '{ret}' return value"),
                        self.span,
                    );
                    let placeholder = ctx.placeholder(&ret, self.span)?;
                    ctx.emit_drops_for_return(None)?;
                    ctx.ir.ret(Some(&placeholder))?;
                } else {
                    ctx.emit_drops_for_return(None)?;
                    ctx.ir.ret(None)?;
                }
            }
            Some(expression) => {
                let value = expression.lower(ctx)?;
                if ret.is_unit() {
                    if !matches!(value, Value::Unit(_)) {
                        ctx.report(
                            ErrorKind::TypeMismatch,
                            "this function does not return a value",
                            self.span,
                        );
                    }
                    ctx.emit_drops_for_return(None)?;
                    ctx.ir.ret(None)?;
                } else {
                    let concrete = ctx.coerce(value, &ret)?;
                    // a returned resource escapes this function's cleanup
                    let kept = if ret.is_resource() {
                        moved_source(ctx, expression)
                    } else {
                        None
                    };
                    ctx.emit_drops_for_return(kept.as_deref())?;
                    ctx.ir.ret(Some(&concrete))?;
                }
            }
        }

        let dead = ctx.ir.append_block(ctx.current_function(), "postret")?;
        ctx.ir.position_at_end(dead)?;
        ctx.set_terminated(true);
        Ok(())
    }
}
