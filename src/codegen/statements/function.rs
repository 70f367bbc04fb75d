//! Function body lowering.
//!
//! Signatures were declared during registration, so the body only has to
//! bind parameters, walk its statements, and settle the terminator: a
//! procedure falls off the end into an implicit `ret void`, while a
//! value-returning function with a reachable open path is a missing-return
//! error.

use std::cell::Cell;

use log::debug;

use crate::{
    codegen::{
        builder::IrResult, statements::lower_statements, value::ConcreteValue, CodegenContext,
    },
    diagnostics::ErrorKind,
    parser::ast::Function,
    scope::{EnvError, Symbol},
};

impl Function {
    pub(crate) fn lower<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<()> {
        let symbol = { ctx.env.borrow().lookup(&self.name.name) };
        let Some(symbol) = symbol else {
            // the signature never registered; the error is already recorded
            return Ok(());
        };
        let Symbol::Function {
            params, ret, value, ..
        } = symbol.as_ref()
        else {
            return Ok(());
        };
        let (params, ret, function) = (params.clone(), ret.clone(), *value);

        // a duplicate definition resolves to the first symbol; only the
        // first body belongs to it
        if !ctx.claim_function(&self.name.name) {
            return Ok(());
        }

        debug!("lowering function '{}'", self.name.name);
        ctx.begin_function(function, ret.clone());

        let entry = ctx.ir.append_block(function, "entry")?;
        ctx.ir.position_at_end(entry)?;

        ctx.enter_scope();
        for (index, param) in self.parameters.iter().enumerate() {
            let Some(argument) = function.get_nth_param(index as u32) else {
                continue;
            };
            let ty = params[index].clone();

            // parameters live in stack slots so they are addressable and
            // uniform with locals
            let slot = ctx.ir.alloca(function, &ty, &param.name.name)?;
            ctx.ir.store(
                slot,
                &ConcreteValue {
                    ty: ty.clone(),
                    ir: argument,
                    span: param.name.span,
                },
            )?;

            let declared = ctx.env.borrow_mut().declare(
                &param.name.name,
                Symbol::Variable {
                    ty,
                    mutable: false,
                    ptr: slot,
                    moved: Cell::new(false),
                },
            );
            if let Err(EnvError::DuplicateSymbol { name }) = declared {
                ctx.report(
                    ErrorKind::DuplicateSymbol,
                    format!("parameter '{name}' is declared twice"),
                    param.name.span,
                );
            }
        }

        lower_statements(ctx, &self.body.statements)?;

        if !ctx.is_terminated() && !ctx.ir.block_terminated() {
            if ret.is_unit() {
                ctx.leave_scope_with_drops()?;
                ctx.ir.ret(None)?;
            } else {
                ctx.report(
                    ErrorKind::MissingReturn,
                    format!("not every path through '{}' returns a '{ret}'", self.name.name),
                    self.name.span,
                );
                ctx.leave_scope_silently();
                ctx.ir.unreachable()?;
            }
        } else {
            // unreachable tail after a return on every path
            if !ctx.ir.block_terminated() {
                ctx.ir.unreachable()?;
            }
            ctx.leave_scope_silently();
        }

        ctx.end_function();
        Ok(())
    }
}
