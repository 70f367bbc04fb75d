//! Resource field reads: a struct GEP into the heap object, then a load at
//! the field's type.

use crate::{
    codegen::{
        builder::IrResult,
        statements::{field_of, report_missing_field},
        value::{LiteralPayload, PolymorphicLiteral, Value},
        CodegenContext,
    },
    diagnostics::ErrorKind,
    parser::ast::FieldAccess,
};

impl FieldAccess {
    pub(crate) fn lower<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<Value<'ctx>> {
        let object_value = self.object.lower(ctx)?;
        let Value::Concrete(object) = object_value else {
            ctx.report(
                ErrorKind::TypeMismatch,
                "field access on a value without fields",
                self.span,
            );
            return Ok(Value::Literal(PolymorphicLiteral {
                payload: LiteralPayload::Int(0),
                span: self.span,
            }));
        };

        let Some((index, field_ty)) = field_of(&object.ty, &self.field) else {
            report_missing_field(ctx, &object.ty, &self.field);
            return Ok(Value::Literal(PolymorphicLiteral {
                payload: LiteralPayload::Int(0),
                span: self.span,
            }));
        };

        let field_ptr = ctx.ir.resource_field_ptr(
            &object.ty,
            object.ir.into_pointer_value(),
            index,
            &self.field.name,
        )?;
        let value = ctx.ir.load(field_ptr, &field_ty, &self.field.name)?;
        Ok(Value::Concrete(value.at(self.span)))
    }
}
