//! Resource construction: `Name { field: value, .. }` lowers to a call to
//! the synthesized constructor with one argument per declared field, in
//! declaration order. Scheduling the destruction of the produced value is
//! the binding statement's concern.

use crate::{
    codegen::{
        builder::{IrError, IrResult},
        value::{LiteralPayload, PolymorphicLiteral, Value},
        CodegenContext,
    },
    diagnostics::ErrorKind,
    parser::ast::Construction,
    scope::Symbol,
};

impl Construction {
    pub(crate) fn lower<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<Value<'ctx>> {
        let symbol = { ctx.env.borrow().lookup(&self.type_name.name) };
        let Some(symbol) = symbol else {
            ctx.report(
                ErrorKind::UnknownType,
                format!("undefined resource '{}'", self.type_name.name),
                self.type_name.span,
            );
            return self.check_fields_only(ctx);
        };

        let Symbol::Resource {
            ty, constructor, ..
        } = symbol.as_ref()
        else {
            ctx.report(
                ErrorKind::TypeMismatch,
                format!("'{}' is not a resource", self.type_name.name),
                self.type_name.span,
            );
            return self.check_fields_only(ctx);
        };
        let (ty, constructor) = (ty.clone(), *constructor);
        let declared = ty.resource_fields().unwrap_or_default();

        // arguments are gathered in field declaration order
        let mut arguments = Vec::with_capacity(declared.len());
        for (field_name, field_ty) in &declared {
            match self
                .fields
                .iter()
                .find(|(ident, _)| ident.name == *field_name)
            {
                Some((_, expression)) => {
                    let value = expression.lower(ctx)?;
                    arguments.push(ctx.coerce(value, field_ty)?);
                }
                None => {
                    ctx.report(
                        ErrorKind::TypeMismatch,
                        format!("missing field '{field_name}' in construction of '{ty}'"),
                        self.span,
                    );
                    arguments.push(ctx.placeholder(field_ty, self.span)?);
                }
            }
        }
        for (ident, _) in &self.fields {
            if !declared.iter().any(|(name, _)| name == &ident.name) {
                ctx.report(
                    ErrorKind::TypeMismatch,
                    format!("'{ty}' has no field '{}'", ident.name),
                    ident.span,
                );
            }
        }

        match ctx.ir.call(constructor, &arguments, &ty)? {
            Some(result) => Ok(Value::Concrete(result.at(self.span))),
            None => Err(IrError::Malformed(format!(
                "constructor of '{ty}' produced no value"
            ))),
        }
    }

    fn check_fields_only<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<Value<'ctx>> {
        for (_, expression) in &self.fields {
            expression.lower(ctx)?;
        }
        Ok(Value::Literal(PolymorphicLiteral {
            payload: LiteralPayload::Int(0),
            span: self.span,
        }))
    }
}
