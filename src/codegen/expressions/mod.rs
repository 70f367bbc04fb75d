//! Expression lowering.
//!
//! Every expression lowers to a [`Value`]: a typed IR value, a polymorphic
//! literal awaiting concretization, or unit. Consumers (statements, operand
//! positions) run the coercion rules to pin literals down. Unresolvable
//! expressions report into the sink and lower to a placeholder so the walk
//! keeps going.

mod binary;
mod call;
mod cast;
mod construction;
mod field_access;
mod id;
mod literal;
mod unary;

use crate::parser::ast::Expression;

use super::{builder::IrResult, value::Value, CodegenContext};

impl Expression {
    pub(crate) fn lower<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<Value<'ctx>> {
        match self {
            Expression::Integer(value, span) => literal::lower_integer(*value, *span),
            Expression::Float(value, span) => literal::lower_float(*value, *span),
            Expression::Bool(value, span) => literal::lower_bool(ctx, *value, *span),
            Expression::Character(value, span) => literal::lower_character(ctx, *value, *span),
            Expression::AstString(value, span) => literal::lower_string(ctx, value, *span),
            Expression::Null(span) => literal::lower_null(*span),
            Expression::Id(id) => id::lower_id(ctx, id),
            Expression::Binary(inner) => inner.lower(ctx),
            Expression::Unary(inner) => inner.lower(ctx),
            Expression::Call(inner) => inner.lower(ctx),
            Expression::Cast(inner) => inner.lower(ctx),
            Expression::FieldAccess(inner) => inner.lower(ctx),
            Expression::Construction(inner) => inner.lower(ctx),
        }
    }
}
