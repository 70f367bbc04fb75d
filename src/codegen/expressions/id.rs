//! Identifier lowering: resolve the name in the environment and load the
//! variable's slot. Non-variable symbols are not values.

use crate::{
    codegen::{
        builder::IrResult,
        value::{LiteralPayload, PolymorphicLiteral, Value},
        CodegenContext,
    },
    diagnostics::ErrorKind,
    parser::ast::Ident,
    scope::Symbol,
};

pub(super) fn lower_id<'ctx>(ctx: &CodegenContext<'ctx>, id: &Ident) -> IrResult<Value<'ctx>> {
    let symbol = { ctx.env.borrow().lookup(&id.name) };
    let Some(symbol) = symbol else {
        ctx.report(
            ErrorKind::UndefinedSymbol,
            format!("undefined symbol '{}'", id.name),
            id.span,
        );
        // an adaptable stand-in keeps unrelated errors flowing
        return Ok(Value::Literal(PolymorphicLiteral {
            payload: LiteralPayload::Int(0),
            span: id.span,
        }));
    };

    match symbol.as_ref() {
        Symbol::Variable { ty, ptr, .. } => {
            if symbol.is_moved() {
                ctx.report(
                    ErrorKind::UseAfterMove,
                    format!("'{}' was moved out of and cannot be used", id.name),
                    id.span,
                );
                return Ok(Value::Concrete(ctx.placeholder(ty, id.span)?));
            }
            let value = ctx.ir.load(*ptr, ty, &id.name)?;
            Ok(Value::Concrete(value.at(id.span)))
        }
        other => {
            ctx.report(
                ErrorKind::TypeMismatch,
                format!(
                    "'{}' is a {} and cannot be used as a value",
                    id.name,
                    other.describe()
                ),
                id.span,
            );
            Ok(Value::Literal(PolymorphicLiteral {
                payload: LiteralPayload::Int(0),
                span: id.span,
            }))
        }
    }
}
