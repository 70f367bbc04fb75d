//! `let` lowering: evaluate the initializer, pick the declared type, stack-
//! allocate a slot, store, and bind the name.
//!
//! Resource initializers carry ownership. A fresh resource (construction or
//! call result) schedules destruction in the current scope; initializing
//! from another binding by name moves the value, transferring the scheduled
//! destruction and poisoning the source.

use std::cell::Cell;

use crate::{
    codegen::{
        builder::IrResult, statements::moved_source, value::Value, CodegenContext, ScheduledDrop,
    },
    diagnostics::ErrorKind,
    parser::ast::LetStatement,
    scope::{EnvError, Symbol},
};

impl LetStatement {
    pub(crate) fn lower<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<()> {
        let value = self.value.lower(ctx)?;

        let declared_ty = match &self.type_name {
            Some(type_name) => ctx.resolve_value_type(type_name),
            None => match &value {
                Value::Concrete(concrete) => Some(concrete.ty.clone()),
                Value::Literal(literal) => {
                    let default = literal.default_type(&ctx.registry.borrow());
                    if default.is_none() {
                        ctx.report(
                            ErrorKind::TypeMismatch,
                            format!(
                                "cannot infer a type for '{}' from {}",
                                self.name.name,
                                literal.describe()
                            ),
                            self.span,
                        );
                    }
                    default
                }
                Value::Unit(_) => {
                    ctx.report(
                        ErrorKind::TypeMismatch,
                        format!("cannot bind '{}' to a 'unit' value", self.name.name),
                        self.span,
                    );
                    None
                }
            },
        };
        let Some(ty) = declared_ty else {
            return Ok(());
        };

        let concrete = ctx.coerce(value, &ty)?;
        let function = ctx.current_function();
        let slot = ctx.ir.alloca(function, &ty, &self.name.name)?;
        ctx.ir.store(slot, &concrete)?;

        if ty.is_resource() {
            match moved_source(ctx, &self.value) {
                Some(source) => {
                    if let Some(symbol) = ctx.env.borrow().lookup(&source) {
                        symbol.mark_moved();
                    }
                    // the destruction duty follows the value; a source with
                    // no scheduled entry (a parameter) was only borrowed by
                    // its owner and transfers nothing
                    if ctx.unschedule_drop(&source).is_some() {
                        if let Some(destructor) = ctx.destructor_for(&ty) {
                            ctx.schedule_drop(ScheduledDrop {
                                name: self.name.name.clone(),
                                slot,
                                ty: ty.clone(),
                                destructor,
                            });
                        }
                    }
                }
                None => {
                    if let Some(destructor) = ctx.destructor_for(&ty) {
                        ctx.schedule_drop(ScheduledDrop {
                            name: self.name.name.clone(),
                            slot,
                            ty: ty.clone(),
                            destructor,
                        });
                    }
                }
            }
        }

        let declared = ctx.env.borrow_mut().declare(
            &self.name.name,
            Symbol::Variable {
                ty,
                mutable: self.mutable,
                ptr: slot,
                moved: Cell::new(false),
            },
        );
        if let Err(EnvError::DuplicateSymbol { name }) = declared {
            ctx.report(
                ErrorKind::DuplicateSymbol,
                format!("'{name}' is already defined in this scope"),
                self.name.span,
            );
        }
        Ok(())
    }
}
