//! Explicit `as` casts.
//!
//! Casts are defined between any pair of scalars (bool, char, the integer
//! family, the float family). A numeric literal concretizes at its default
//! type first unless it already fits the target directly. Everything else
//! is an invalid coercion.

use crate::{
    codegen::{
        builder::IrResult,
        value::{LiteralPayload, Value},
        CodegenContext,
    },
    diagnostics::ErrorKind,
    lexer::Span,
    parser::ast::CastExpression,
    types::{TypeKind, TypeRef},
};

/// Recovery value for a failed cast. A target without a value
/// representation (`unit`, `null`) falls back to the unit non-value.
fn recovery<'ctx>(
    ctx: &CodegenContext<'ctx>,
    target: &TypeRef,
    span: Span,
) -> IrResult<Value<'ctx>> {
    if target.is_unit() || target.is_generic() || matches!(target.kind(), TypeKind::Null) {
        return Ok(Value::Unit(span));
    }
    Ok(Value::Concrete(ctx.placeholder(target, span)?))
}

impl CastExpression {
    pub(crate) fn lower<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<Value<'ctx>> {
        let value = self.value.lower(ctx)?;
        let Some(target) = ctx.resolve_type(&self.target) else {
            // unknown target type already reported; pass the value through
            return Ok(value);
        };

        let source = match value {
            Value::Concrete(concrete) => concrete,
            Value::Literal(literal) => {
                if matches!(literal.payload, LiteralPayload::Null) {
                    if target.is_nullable() {
                        return Ok(Value::Concrete(ctx.concretize(&literal, &target)?));
                    }
                    ctx.report(
                        ErrorKind::InvalidCoercion,
                        format!("'null' cannot be cast to '{target}'"),
                        self.span,
                    );
                    return recovery(ctx, &target, self.span);
                }
                if literal.admits(&target) {
                    return Ok(Value::Concrete(ctx.concretize(&literal, &target)?));
                }
                let Some(default) = literal.default_type(&ctx.registry.borrow()) else {
                    ctx.report(
                        ErrorKind::InvalidCoercion,
                        format!("{} cannot be cast to '{target}'", literal.describe()),
                        self.span,
                    );
                    return recovery(ctx, &target, self.span);
                };
                ctx.concretize(&literal, &default)?
            }
            Value::Unit(span) => {
                ctx.report(
                    ErrorKind::InvalidCoercion,
                    "'unit' cannot be cast",
                    span,
                );
                return recovery(ctx, &target, self.span);
            }
        };

        if !source.ty.is_scalar() || !target.is_scalar() {
            ctx.report(
                ErrorKind::InvalidCoercion,
                format!("no cast from '{}' to '{target}'", source.ty),
                self.span,
            );
            return recovery(ctx, &target, self.span);
        }

        Ok(Value::Concrete(ctx.ir.cast(&source, &target)?.at(self.span)))
    }
}
