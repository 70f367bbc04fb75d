//! Unary operator lowering.
//!
//! Negating a numeric literal folds into the literal itself so forms like
//! `-128` keep their full candidate set (an `i8` can hold -128 but not
//! +128). Negation of concrete values and logical not go straight to the
//! corresponding instructions.

use crate::{
    codegen::{
        builder::IrResult,
        value::{LiteralPayload, PolymorphicLiteral, Value},
        CodegenContext,
    },
    diagnostics::ErrorKind,
    parser::ast::{UnaryExpression, UnaryOperator},
};

impl UnaryExpression {
    pub(crate) fn lower<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<Value<'ctx>> {
        let operand = self.operand.lower(ctx)?;

        match self.operator {
            UnaryOperator::Neg => match operand {
                Value::Literal(literal) => {
                    let payload = match literal.payload {
                        LiteralPayload::Int(value) => LiteralPayload::Int(-value),
                        LiteralPayload::Float(value) => LiteralPayload::Float(-value),
                        LiteralPayload::Null => {
                            ctx.report(
                                ErrorKind::TypeMismatch,
                                "'null' cannot be negated",
                                self.span,
                            );
                            LiteralPayload::Int(0)
                        }
                    };
                    Ok(Value::Literal(PolymorphicLiteral {
                        payload,
                        span: self.span,
                    }))
                }
                Value::Concrete(value) if value.ty.is_int() || value.ty.is_float() => {
                    Ok(Value::Concrete(ctx.ir.neg(&value)?.at(self.span)))
                }
                other => {
                    let registry = ctx.registry.borrow();
                    let message = format!("'{}' cannot be negated", other.describe(&registry));
                    drop(registry);
                    ctx.report(ErrorKind::TypeMismatch, message, self.span);
                    Ok(Value::Concrete(ctx.placeholder(&ctx.i32_ty(), self.span)?))
                }
            },
            UnaryOperator::Not => match operand {
                Value::Concrete(value) if value.ty.is_bool() => {
                    Ok(Value::Concrete(ctx.ir.not(&value)?.at(self.span)))
                }
                other => {
                    let registry = ctx.registry.borrow();
                    let message = format!(
                        "'!' expects a 'bool', found '{}'",
                        other.describe(&registry)
                    );
                    drop(registry);
                    ctx.report(ErrorKind::TypeMismatch, message, self.span);
                    Ok(Value::Concrete(ctx.placeholder(&ctx.bool_ty(), self.span)?))
                }
            },
        }
    }
}
