//! Syntax tree.

use std::fmt::{self, Write};

use crate::span::Span;

/// Identifies an expression within one parsed program.
///
/// Ids are handed out as the parser builds nodes, so they are stable for a
/// given source text and shared by every later stage (validated tree, BIR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Block {
    pub exprs: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Integer(i64),
    Boolean(bool),
    Str(String),
    /// `[a, b, c]`
    List(Vec<Expr>),
    Name(Ident),
    /// `let x = value`
    Let { name: Ident, value: Box<Expr> },
    /// `x := value`
    Assign { target: Ident, value: Box<Expr> },
    /// `f(args)`; only builtins are callable.
    Call { callee: Ident, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Paren(Box<Expr>),
    If {
        condition: Box<Expr>,
        then_block: Block,
        else_block: Option<Block>,
    },
    While { condition: Box<Expr>, body: Block },
    Block(Block),
    /// Placeholder left where parsing failed.
    Error,
}

impl Expr {
    /// Direct sub-expressions in source order.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Integer(_)
            | ExprKind::Boolean(_)
            | ExprKind::Str(_)
            | ExprKind::Name(_)
            | ExprKind::Error => Vec::new(),
            ExprKind::List(items) | ExprKind::Call { args: items, .. } => items.iter().collect(),
            ExprKind::Let { value, .. } | ExprKind::Assign { value, .. } => vec![value.as_ref()],
            ExprKind::Unary { operand, .. } | ExprKind::Paren(operand) => vec![operand.as_ref()],
            ExprKind::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            ExprKind::If {
                condition,
                then_block,
                else_block,
            } => {
                let mut children = vec![condition.as_ref()];
                children.extend(then_block.exprs.iter());
                if let Some(else_block) = else_block {
                    children.extend(else_block.exprs.iter());
                }
                children
            }
            ExprKind::While { condition, body } => {
                let mut children = vec![condition.as_ref()];
                children.extend(body.exprs.iter());
                children
            }
            ExprKind::Block(block) => block.exprs.iter().collect(),
        }
    }
}

/// A parsed program: a top-level block of expressions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyntaxTree {
    pub root: Block,
    /// Number of expression ids handed out.
    pub expr_count: u32,
}

impl SyntaxTree {
    /// Innermost expression whose span contains `offset` (end inclusive).
    pub fn innermost_at(&self, offset: u32) -> Option<&Expr> {
        fn search(expr: &Expr, offset: u32) -> Option<&Expr> {
            if !expr.span.contains_inclusive(offset) {
                return None;
            }
            expr.children()
                .into_iter()
                .find_map(|child| search(child, offset))
                .or(Some(expr))
        }

        self.root
            .exprs
            .iter()
            .find_map(|expr| search(expr, offset))
    }

    /// Indented, one-node-per-line rendering used as SYNTAX stage output.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for expr in &self.root.exprs {
            dump_expr(&mut out, expr, 0);
        }
        out
    }
}

fn dump_expr(out: &mut String, expr: &Expr, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = match &expr.kind {
        ExprKind::Integer(value) => writeln!(out, "{indent}Integer({value})"),
        ExprKind::Boolean(value) => writeln!(out, "{indent}Boolean({value})"),
        ExprKind::Str(value) => writeln!(out, "{indent}String({value:?})"),
        ExprKind::List(_) => writeln!(out, "{indent}List"),
        ExprKind::Name(ident) => writeln!(out, "{indent}Name({})", ident.name),
        ExprKind::Let { name, .. } => writeln!(out, "{indent}Let({})", name.name),
        ExprKind::Assign { target, .. } => writeln!(out, "{indent}Assign({})", target.name),
        ExprKind::Call { callee, .. } => writeln!(out, "{indent}Call({})", callee.name),
        ExprKind::Unary { op: UnaryOp::Neg, .. } => writeln!(out, "{indent}Negate"),
        ExprKind::Binary { op, .. } => writeln!(out, "{indent}Binary({})", op.symbol()),
        ExprKind::Paren(_) => writeln!(out, "{indent}Paren"),
        ExprKind::If { else_block, .. } => {
            if else_block.is_some() {
                writeln!(out, "{indent}IfElse")
            } else {
                writeln!(out, "{indent}If")
            }
        }
        ExprKind::While { .. } => writeln!(out, "{indent}While"),
        ExprKind::Block(_) => writeln!(out, "{indent}Block"),
        ExprKind::Error => writeln!(out, "{indent}Error"),
    };
    for child in expr.children() {
        dump_expr(out, child, depth + 1);
    }
}
