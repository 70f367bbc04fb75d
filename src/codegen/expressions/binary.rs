//! Binary operator lowering.
//!
//! Both operands lower first, then a common type is picked by the coercion
//! rules: identity, integer widening within a signedness, or literal
//! concretization against the other side. Arithmetic selects the signed or
//! unsigned instruction by the common type; integer comparisons pick their
//! predicate the same way; float comparisons use the ordered predicates so
//! a NaN operand compares false. `&&` and `||` short-circuit through basic
//! blocks and merge with a phi.

use inkwell::{FloatPredicate, IntPredicate};

use crate::{
    codegen::{
        builder::{ArithOp, BitOp, IrError, IrResult},
        value::{ConcreteValue, PolymorphicLiteral, Value},
        CodegenContext,
    },
    diagnostics::ErrorKind,
    parser::ast::{BinaryExpression, BinaryOperator},
    types::{coercion, PrimitiveKind, TypeRef},
};

impl BinaryExpression {
    pub(crate) fn lower<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<Value<'ctx>> {
        if self.operator.is_logical() {
            return self.lower_logical(ctx);
        }

        let left = self.left.lower(ctx)?;
        let right = self.right.lower(ctx)?;

        let Some(operand_ty) = operand_type(ctx, &left, &right) else {
            let registry = ctx.registry.borrow();
            let message = format!(
                "no common type for '{}' and '{}'",
                left.describe(&registry),
                right.describe(&registry)
            );
            drop(registry);
            ctx.report(ErrorKind::TypeMismatch, message, self.span);

            let fallback_ty = if self.operator.is_comparison() {
                ctx.bool_ty()
            } else {
                ctx.i32_ty()
            };
            return Ok(Value::Concrete(ctx.placeholder(&fallback_ty, self.span)?));
        };

        let lhs = ctx.coerce(left, &operand_ty)?;
        let rhs = ctx.coerce(right, &operand_ty)?;
        let bool_ty = ctx.bool_ty();

        let result = match self.operator {
            BinaryOperator::Add
            | BinaryOperator::Sub
            | BinaryOperator::Mul
            | BinaryOperator::Div
            | BinaryOperator::Rem => {
                if !operand_ty.is_int() && !operand_ty.is_float() {
                    ctx.report(
                        ErrorKind::TypeMismatch,
                        format!("arithmetic is not defined on '{operand_ty}'"),
                        self.span,
                    );
                    return Ok(Value::Concrete(ctx.placeholder(&operand_ty, self.span)?));
                }
                let op = match self.operator {
                    BinaryOperator::Add => ArithOp::Add,
                    BinaryOperator::Sub => ArithOp::Sub,
                    BinaryOperator::Mul => ArithOp::Mul,
                    BinaryOperator::Div => ArithOp::Div,
                    _ => ArithOp::Rem,
                };
                ctx.ir.arith(op, &lhs, &rhs)?
            }

            BinaryOperator::Eq
            | BinaryOperator::NotEq
            | BinaryOperator::Lt
            | BinaryOperator::Le
            | BinaryOperator::Gt
            | BinaryOperator::Ge => self.lower_comparison(ctx, &operand_ty, &lhs, &rhs, &bool_ty)?,

            BinaryOperator::BitAnd
            | BinaryOperator::BitOr
            | BinaryOperator::BitXor
            | BinaryOperator::Shl
            | BinaryOperator::Shr => {
                if !operand_ty.is_int() {
                    ctx.report(
                        ErrorKind::TypeMismatch,
                        format!("bit operations are not defined on '{operand_ty}'"),
                        self.span,
                    );
                    return Ok(Value::Concrete(ctx.placeholder(&operand_ty, self.span)?));
                }
                let op = match self.operator {
                    BinaryOperator::BitAnd => BitOp::And,
                    BinaryOperator::BitOr => BitOp::Or,
                    BinaryOperator::BitXor => BitOp::Xor,
                    BinaryOperator::Shl => BitOp::Shl,
                    _ => BitOp::Shr,
                };
                ctx.ir.bitwise(op, &lhs, &rhs)?
            }

            BinaryOperator::And | BinaryOperator::Or => unreachable!("handled above"),
        };

        Ok(Value::Concrete(result.at(self.span)))
    }

    fn lower_comparison<'ctx>(
        &self,
        ctx: &CodegenContext<'ctx>,
        operand_ty: &TypeRef,
        lhs: &ConcreteValue<'ctx>,
        rhs: &ConcreteValue<'ctx>,
        bool_ty: &TypeRef,
    ) -> IrResult<ConcreteValue<'ctx>> {
        if operand_ty.is_float() {
            let predicate = match self.operator {
                BinaryOperator::Eq => FloatPredicate::OEQ,
                BinaryOperator::NotEq => FloatPredicate::ONE,
                BinaryOperator::Lt => FloatPredicate::OLT,
                BinaryOperator::Le => FloatPredicate::OLE,
                BinaryOperator::Gt => FloatPredicate::OGT,
                _ => FloatPredicate::OGE,
            };
            return ctx.ir.float_compare(predicate, lhs, rhs, bool_ty);
        }

        if operand_ty.is_int() || operand_ty.is_char() || operand_ty.is_bool() {
            // char and bool compare as unsigned bit patterns
            let signed = operand_ty.int_signed().unwrap_or(false);
            let predicate = match (self.operator, signed) {
                (BinaryOperator::Eq, _) => IntPredicate::EQ,
                (BinaryOperator::NotEq, _) => IntPredicate::NE,
                (BinaryOperator::Lt, true) => IntPredicate::SLT,
                (BinaryOperator::Lt, false) => IntPredicate::ULT,
                (BinaryOperator::Le, true) => IntPredicate::SLE,
                (BinaryOperator::Le, false) => IntPredicate::ULE,
                (BinaryOperator::Gt, true) => IntPredicate::SGT,
                (BinaryOperator::Gt, false) => IntPredicate::UGT,
                (BinaryOperator::Ge, true) => IntPredicate::SGE,
                (BinaryOperator::Ge, false) => IntPredicate::UGE,
                _ => unreachable!("comparison operators only"),
            };
            return ctx.ir.int_compare(predicate, lhs, rhs, bool_ty);
        }

        if operand_ty.is_nullable()
            && matches!(self.operator, BinaryOperator::Eq | BinaryOperator::NotEq)
        {
            return ctx.ir.pointer_compare(
                matches!(self.operator, BinaryOperator::Eq),
                lhs,
                rhs,
                bool_ty,
            );
        }

        ctx.report(
            ErrorKind::TypeMismatch,
            format!("'{operand_ty}' values cannot be compared this way"),
            self.span,
        );
        ctx.placeholder(bool_ty, self.span)
    }

    /// `&&`/`||` with short-circuit evaluation: the right operand only runs
    /// when the left one did not already decide the result.
    fn lower_logical<'ctx>(&self, ctx: &CodegenContext<'ctx>) -> IrResult<Value<'ctx>> {
        let is_and = matches!(self.operator, BinaryOperator::And);
        let bool_ty = ctx.bool_ty();

        let left_value = self.left.lower(ctx)?;
        let lhs = ctx.coerce(left_value, &bool_ty)?;

        let function = ctx.current_function();
        let short_block = ctx
            .ir
            .current_block()
            .ok_or_else(|| IrError::Malformed("logical operator outside a block".into()))?;
        let rhs_block = ctx
            .ir
            .append_block(function, if is_and { "and.rhs" } else { "or.rhs" })?;
        let merge_block = ctx
            .ir
            .append_block(function, if is_and { "and.end" } else { "or.end" })?;

        if is_and {
            ctx.ir.cond_branch(&lhs, rhs_block, merge_block)?;
        } else {
            ctx.ir.cond_branch(&lhs, merge_block, rhs_block)?;
        }

        ctx.ir.position_at_end(rhs_block)?;
        let right_value = self.right.lower(ctx)?;
        let rhs = ctx.coerce(right_value, &bool_ty)?;
        // nested logic may have moved the cursor; the phi edge comes from
        // wherever the right operand finished
        let rhs_end = ctx
            .ir
            .current_block()
            .ok_or_else(|| IrError::Malformed("logical operand lost its block".into()))?;
        ctx.ir.branch(merge_block)?;

        ctx.ir.position_at_end(merge_block)?;
        let short = ctx.ir.const_bool(&bool_ty, !is_and)?;
        let merged = ctx.ir.phi(
            &bool_ty,
            if is_and { "and.result" } else { "or.result" },
            &[(short.ir, short_block), (rhs.ir, rhs_end)],
        )?;
        Ok(Value::Concrete(merged.at(self.span)))
    }
}

/// The type both operands are concretized to, per the coercion rules.
fn operand_type<'ctx>(
    ctx: &CodegenContext<'ctx>,
    left: &Value<'ctx>,
    right: &Value<'ctx>,
) -> Option<TypeRef> {
    match (left, right) {
        (Value::Concrete(lhs), Value::Concrete(rhs)) => coercion::common_type(&lhs.ty, &rhs.ty),
        (Value::Concrete(concrete), Value::Literal(literal))
        | (Value::Literal(literal), Value::Concrete(concrete)) => {
            common_with_literal(ctx, &concrete.ty, literal)
        }
        (Value::Literal(lhs), Value::Literal(rhs)) => {
            let registry = ctx.registry.borrow();
            let left_default = lhs.default_type(&registry)?;
            let right_default = rhs.default_type(&registry)?;
            drop(registry);
            coercion::common_type(&left_default, &right_default)
        }
        _ => None,
    }
}

/// A concrete operand meets a literal: keep the concrete type when the
/// literal fits, otherwise widen within the same signedness until it does.
fn common_with_literal<'ctx>(
    ctx: &CodegenContext<'ctx>,
    concrete: &TypeRef,
    literal: &PolymorphicLiteral,
) -> Option<TypeRef> {
    if literal.admits(concrete) {
        return Some(concrete.clone());
    }

    let signed = concrete.int_signed()?;
    let ladder: &[PrimitiveKind] = if signed {
        &[PrimitiveKind::I16, PrimitiveKind::I32, PrimitiveKind::I64]
    } else {
        &[PrimitiveKind::U16, PrimitiveKind::U32, PrimitiveKind::U64]
    };

    let registry = ctx.registry.borrow();
    ladder
        .iter()
        .map(|kind| registry.intern_primitive(*kind))
        .find(|candidate| candidate.width() > concrete.width() && literal.admits(candidate))
}
