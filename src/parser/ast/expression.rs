use crate::lexer::Span;

use super::{Ident, TypeName};

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Integer(u128, Span),
    Float(f64, Span),
    Bool(bool, Span),
    Character(char, Span),
    AstString(String, Span),
    Null(Span),
    Id(Ident),
    Binary(Box<BinaryExpression>),
    Unary(Box<UnaryExpression>),
    Call(Box<CallExpression>),
    Cast(Box<CastExpression>),
    FieldAccess(Box<FieldAccess>),
    Construction(Box<Construction>),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Integer(_, span)
            | Expression::Float(_, span)
            | Expression::Bool(_, span)
            | Expression::Character(_, span)
            | Expression::AstString(_, span)
            | Expression::Null(span) => *span,
            Expression::Id(id) => id.span,
            Expression::Binary(inner) => inner.span,
            Expression::Unary(inner) => inner.span,
            Expression::Call(inner) => inner.span,
            Expression::Cast(inner) => inner.span,
            Expression::FieldAccess(inner) => inner.span,
            Expression::Construction(inner) => inner.span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOperator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::Le
                | BinaryOperator::Gt
                | BinaryOperator::Ge
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            BinaryOperator::BitAnd
                | BinaryOperator::BitOr
                | BinaryOperator::BitXor
                | BinaryOperator::Shl
                | BinaryOperator::Shr
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    pub operator: BinaryOperator,
    pub left: Expression,
    pub right: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    pub operator: UnaryOperator,
    pub operand: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    pub callee: Ident,
    pub arguments: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastExpression {
    pub value: Expression,
    pub target: TypeName,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldAccess {
    pub object: Expression,
    pub field: Ident,
    pub span: Span,
}

/// `Name { field: expr, .. }`: constructs a resource through its
/// synthesized constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct Construction {
    pub type_name: Ident,
    pub fields: Vec<(Ident, Expression)>,
    pub span: Span,
}
