//! Call lowering: resolve the callee, check arity, coerce each argument to
//! its parameter type, emit the call. The result takes the callee's
//! declared return type; procedures yield unit.
//!
//! On a bad callee or wrong arity the arguments are still lowered so their
//! own errors surface in the same pass.

use crate::{
    codegen::{
        builder::IrResult,
        value::{LiteralPayload, PolymorphicLiteral, Value},
        CodegenContext,
    },
    diagnostics::ErrorKind,
    parser::ast::CallExpression,
    scope::Symbol,
};

impl CallExpression {
    pub(crate) fn lower<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<Value<'ctx>> {
        let symbol = { ctx.env.borrow().lookup(&self.callee.name) };
        let Some(symbol) = symbol else {
            ctx.report(
                ErrorKind::UndefinedSymbol,
                format!("undefined function '{}'", self.callee.name),
                self.callee.span,
            );
            return self.check_arguments_only(ctx);
        };

        let Symbol::Function {
            params, ret, value, ..
        } = symbol.as_ref()
        else {
            let message = if matches!(symbol.as_ref(), Symbol::Resource { .. }) {
                format!(
                    "'{name}' is a resource; construct it with '{name} {{ .. }}'",
                    name = self.callee.name
                )
            } else {
                format!(
                    "'{}' is a {} and cannot be called",
                    self.callee.name,
                    symbol.describe()
                )
            };
            ctx.report(ErrorKind::TypeMismatch, message, self.callee.span);
            return self.check_arguments_only(ctx);
        };
        let (params, ret, function) = (params.clone(), ret.clone(), *value);

        if self.arguments.len() != params.len() {
            ctx.report(
                ErrorKind::ArityMismatch,
                format!(
                    "'{}' expects {} argument(s), {} given",
                    self.callee.name,
                    params.len(),
                    self.arguments.len()
                ),
                self.span,
            );
            self.check_arguments_only(ctx)?;
            return if ret.is_unit() {
                Ok(Value::Unit(self.span))
            } else {
                Ok(Value::Concrete(ctx.placeholder(&ret, self.span)?))
            };
        }

        let mut arguments = Vec::with_capacity(params.len());
        for (argument, param_ty) in self.arguments.iter().zip(params.iter()) {
            let value = argument.lower(ctx)?;
            arguments.push(ctx.coerce(value, param_ty)?);
        }

        match ctx.ir.call(function, &arguments, &ret)? {
            Some(result) => Ok(Value::Concrete(result.at(self.span))),
            None => Ok(Value::Unit(self.span)),
        }
    }

    fn check_arguments_only<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<Value<'ctx>> {
        for argument in &self.arguments {
            argument.lower(ctx)?;
        }
        Ok(Value::Literal(PolymorphicLiteral {
            payload: LiteralPayload::Int(0),
            span: self.span,
        }))
    }
}
