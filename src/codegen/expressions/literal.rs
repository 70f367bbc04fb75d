//! Literal lowering.
//!
//! Numeric literals and `null` stay polymorphic until a context fixes
//! their type. Bool, char and string literals have exactly one lexical
//! type and lower to constants immediately; strings become interned
//! global C strings the way the surrounding module stores them.

use crate::{
    codegen::{
        builder::IrResult,
        value::{LiteralPayload, PolymorphicLiteral, Value},
        CodegenContext,
    },
    diagnostics::ErrorKind,
    lexer::Span,
};

pub(super) fn lower_integer<'ctx>(value: u128, span: Span) -> IrResult<Value<'ctx>> {
    Ok(Value::Literal(PolymorphicLiteral {
        payload: LiteralPayload::Int(value as i128),
        span,
    }))
}

pub(super) fn lower_float<'ctx>(value: f64, span: Span) -> IrResult<Value<'ctx>> {
    Ok(Value::Literal(PolymorphicLiteral {
        payload: LiteralPayload::Float(value),
        span,
    }))
}

pub(super) fn lower_null<'ctx>(span: Span) -> IrResult<Value<'ctx>> {
    Ok(Value::Literal(PolymorphicLiteral {
        payload: LiteralPayload::Null,
        span,
    }))
}

pub(super) fn lower_bool<'ctx>(
    ctx: &CodegenContext<'ctx>,
    value: bool,
    span: Span,
) -> IrResult<Value<'ctx>> {
    let bool_ty = ctx.bool_ty();
    Ok(Value::Concrete(ctx.ir.const_bool(&bool_ty, value)?.at(span)))
}

pub(super) fn lower_character<'ctx>(
    ctx: &CodegenContext<'ctx>,
    value: char,
    span: Span,
) -> IrResult<Value<'ctx>> {
    let char_ty = ctx.char_ty();
    // char is an 8-bit value
    let Ok(byte) = u8::try_from(value as u32) else {
        ctx.report(
            ErrorKind::InvalidLiteral,
            format!("character '{value}' does not fit in 8 bits"),
            span,
        );
        return Ok(Value::Concrete(ctx.placeholder(&char_ty, span)?));
    };
    Ok(Value::Concrete(ctx.ir.const_char(&char_ty, byte)?.at(span)))
}

pub(super) fn lower_string<'ctx>(
    ctx: &CodegenContext<'ctx>,
    value: &str,
    span: Span,
) -> IrResult<Value<'ctx>> {
    let string_ty = ctx.string_ty();
    Ok(Value::Concrete(
        ctx.ir.const_string(&string_ty, value)?.at(span),
    ))
}
