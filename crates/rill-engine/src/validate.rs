//! Name resolution and validation.
//!
//! Turns the syntax tree into a validated tree in which every variable
//! reference points at a [`SlotId`] and every call at a [`Builtin`].

use std::fmt::{self, Write};

use rustc_hash::FxHashMap;

use crate::diagnostic::{Diagnostic, Phase};
use crate::span::{LineIndex, Span};
use crate::syntax::{BinaryOp, Block, Expr, ExprId, ExprKind, Ident, SyntaxTree, UnaryOp};

/// Storage slot for one declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotDecl {
    pub name: String,
    pub span: Span,
}

/// Functions callable from Rill programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `print(args...)`
    Print,
    /// `len(list)`
    Len,
    /// `push(list, value)`
    Push,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "print" => Some(Self::Print),
            "len" => Some(Self::Len),
            "push" => Some(Self::Push),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Len => "len",
            Self::Push => "push",
        }
    }

    /// Required argument count; `None` for variadic builtins.
    pub fn arity(self) -> Option<usize> {
        match self {
            Self::Print => None,
            Self::Len => Some(1),
            Self::Push => Some(2),
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedExpr {
    pub id: ExprId,
    pub kind: ValidatedKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValidatedKind {
    Integer(i64),
    Boolean(bool),
    Str(String),
    List(Vec<ValidatedExpr>),
    Var(SlotId),
    Let {
        slot: SlotId,
        value: Box<ValidatedExpr>,
    },
    Assign {
        slot: SlotId,
        value: Box<ValidatedExpr>,
    },
    Call {
        builtin: Builtin,
        args: Vec<ValidatedExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<ValidatedExpr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<ValidatedExpr>,
        rhs: Box<ValidatedExpr>,
    },
    Paren(Box<ValidatedExpr>),
    If {
        condition: Box<ValidatedExpr>,
        then_exprs: Vec<ValidatedExpr>,
        else_exprs: Option<Vec<ValidatedExpr>>,
    },
    While {
        condition: Box<ValidatedExpr>,
        body: Vec<ValidatedExpr>,
    },
    Block(Vec<ValidatedExpr>),
    Error,
}

/// Result of validating a whole program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedTree {
    pub slots: Vec<SlotDecl>,
    pub root: Vec<ValidatedExpr>,
}

impl ValidatedTree {
    pub fn slot(&self, slot: SlotId) -> &SlotDecl {
        &self.slots[slot.0 as usize]
    }

    /// Rendering used as VALIDATED stage output.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for expr in &self.root {
            self.dump_expr(&mut out, expr, 0);
        }
        out
    }

    fn slot_name(&self, slot: SlotId) -> String {
        format!("{}#{}", self.slot(slot).name, slot.0)
    }

    fn dump_expr(&self, out: &mut String, expr: &ValidatedExpr, depth: usize) {
        let indent = "  ".repeat(depth);
        let children: Vec<&ValidatedExpr> = match &expr.kind {
            ValidatedKind::Integer(value) => {
                let _ = writeln!(out, "{indent}Integer({value})");
                Vec::new()
            }
            ValidatedKind::Boolean(value) => {
                let _ = writeln!(out, "{indent}Boolean({value})");
                Vec::new()
            }
            ValidatedKind::Str(value) => {
                let _ = writeln!(out, "{indent}String({value:?})");
                Vec::new()
            }
            ValidatedKind::List(items) => {
                let _ = writeln!(out, "{indent}List");
                items.iter().collect()
            }
            ValidatedKind::Var(slot) => {
                let _ = writeln!(out, "{indent}Var({})", self.slot_name(*slot));
                Vec::new()
            }
            ValidatedKind::Let { slot, value } => {
                let _ = writeln!(out, "{indent}Let({})", self.slot_name(*slot));
                vec![value.as_ref()]
            }
            ValidatedKind::Assign { slot, value } => {
                let _ = writeln!(out, "{indent}Assign({})", self.slot_name(*slot));
                vec![value.as_ref()]
            }
            ValidatedKind::Call { builtin, args } => {
                let _ = writeln!(out, "{indent}Call({builtin})");
                args.iter().collect()
            }
            ValidatedKind::Unary { operand, .. } => {
                let _ = writeln!(out, "{indent}Negate");
                vec![operand.as_ref()]
            }
            ValidatedKind::Binary { op, lhs, rhs } => {
                let _ = writeln!(out, "{indent}Binary({})", op.symbol());
                vec![lhs.as_ref(), rhs.as_ref()]
            }
            ValidatedKind::Paren(inner) => {
                let _ = writeln!(out, "{indent}Paren");
                vec![inner.as_ref()]
            }
            ValidatedKind::If {
                condition,
                then_exprs,
                else_exprs,
            } => {
                let _ = writeln!(out, "{indent}If");
                self.dump_expr(out, condition, depth + 1);
                let _ = writeln!(out, "{indent}Then");
                for e in then_exprs {
                    self.dump_expr(out, e, depth + 1);
                }
                if let Some(else_exprs) = else_exprs {
                    let _ = writeln!(out, "{indent}Else");
                    for e in else_exprs {
                        self.dump_expr(out, e, depth + 1);
                    }
                }
                Vec::new()
            }
            ValidatedKind::While { condition, body } => {
                let _ = writeln!(out, "{indent}While");
                let mut children = vec![condition.as_ref()];
                children.extend(body.iter());
                children
            }
            ValidatedKind::Block(exprs) => {
                let _ = writeln!(out, "{indent}Block");
                exprs.iter().collect()
            }
            ValidatedKind::Error => {
                let _ = writeln!(out, "{indent}Error");
                Vec::new()
            }
        };
        for child in children {
            self.dump_expr(out, child, depth + 1);
        }
    }
}

/// Resolve names in `tree`, reporting undefined variables, unknown
/// functions and builtin arity mismatches.
pub fn validate(tree: &SyntaxTree, lines: &LineIndex) -> (ValidatedTree, Vec<Diagnostic>) {
    let mut validator = Validator {
        slots: Vec::new(),
        scopes: vec![FxHashMap::default()],
        diagnostics: Vec::new(),
        lines,
    };
    let root = validator.exprs(&tree.root.exprs);
    let validated = ValidatedTree {
        slots: validator.slots,
        root,
    };
    (validated, validator.diagnostics)
}

struct Validator<'a> {
    slots: Vec<SlotDecl>,
    scopes: Vec<FxHashMap<String, SlotId>>,
    diagnostics: Vec<Diagnostic>,
    lines: &'a LineIndex,
}

impl Validator<'_> {
    fn error(&mut self, message: String, span: Span) {
        self.diagnostics
            .push(Diagnostic::error(Phase::Validate, message, span, self.lines));
    }

    fn lookup(&self, name: &str) -> Option<SlotId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn declare(&mut self, name: &Ident) -> SlotId {
        let slot = SlotId(self.slots.len() as u32);
        self.slots.push(SlotDecl {
            name: name.name.clone(),
            span: name.span,
        });
        let shadowed = self
            .scopes
            .last_mut()
            .is_some_and(|scope| scope.insert(name.name.clone(), slot).is_some());
        if shadowed {
            self.diagnostics.push(Diagnostic::warning(
                Phase::Validate,
                format!("`{}` shadows an earlier binding in the same scope", name.name),
                name.span,
                self.lines,
            ));
        }
        slot
    }

    fn scoped_block(&mut self, block: &Block) -> Vec<ValidatedExpr> {
        self.scopes.push(FxHashMap::default());
        let exprs = self.exprs(&block.exprs);
        self.scopes.pop();
        exprs
    }

    fn exprs(&mut self, exprs: &[Expr]) -> Vec<ValidatedExpr> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn boxed(&mut self, expr: &Expr) -> Box<ValidatedExpr> {
        Box::new(self.expr(expr))
    }

    fn expr(&mut self, expr: &Expr) -> ValidatedExpr {
        let kind = match &expr.kind {
            ExprKind::Integer(value) => ValidatedKind::Integer(*value),
            ExprKind::Boolean(value) => ValidatedKind::Boolean(*value),
            ExprKind::Str(value) => ValidatedKind::Str(value.clone()),
            ExprKind::List(items) => ValidatedKind::List(self.exprs(items)),
            ExprKind::Name(ident) => match self.lookup(&ident.name) {
                Some(slot) => ValidatedKind::Var(slot),
                None => {
                    self.error(format!("cannot find variable `{}`", ident.name), ident.span);
                    ValidatedKind::Error
                }
            },
            ExprKind::Let { name, value } => {
                // The initializer sees the bindings from before the `let`.
                let value = self.boxed(value);
                let slot = self.declare(name);
                ValidatedKind::Let { slot, value }
            }
            ExprKind::Assign { target, value } => {
                let value = self.boxed(value);
                match self.lookup(&target.name) {
                    Some(slot) => ValidatedKind::Assign { slot, value },
                    None => {
                        self.error(
                            format!(
                                "cannot assign to undeclared variable `{}` (use `let {} = ...` to declare it)",
                                target.name, target.name
                            ),
                            target.span,
                        );
                        ValidatedKind::Error
                    }
                }
            }
            ExprKind::Call { callee, args } => {
                let args = self.exprs(args);
                match Builtin::lookup(&callee.name) {
                    Some(builtin) => {
                        if let Some(arity) = builtin.arity()
                            && arity != args.len()
                        {
                            self.error(
                                format!(
                                    "`{}` expects {} argument{}, found {}",
                                    builtin,
                                    arity,
                                    if arity == 1 { "" } else { "s" },
                                    args.len()
                                ),
                                expr.span,
                            );
                            ValidatedKind::Error
                        } else {
                            ValidatedKind::Call { builtin, args }
                        }
                    }
                    None => {
                        self.error(format!("cannot find function `{}`", callee.name), callee.span);
                        ValidatedKind::Error
                    }
                }
            }
            ExprKind::Unary { op, operand } => ValidatedKind::Unary {
                op: *op,
                operand: self.boxed(operand),
            },
            ExprKind::Binary { op, lhs, rhs } => ValidatedKind::Binary {
                op: *op,
                lhs: self.boxed(lhs),
                rhs: self.boxed(rhs),
            },
            ExprKind::Paren(inner) => ValidatedKind::Paren(self.boxed(inner)),
            ExprKind::If {
                condition,
                then_block,
                else_block,
            } => ValidatedKind::If {
                condition: self.boxed(condition),
                then_exprs: self.scoped_block(then_block),
                else_exprs: else_block.as_ref().map(|b| self.scoped_block(b)),
            },
            ExprKind::While { condition, body } => ValidatedKind::While {
                condition: self.boxed(condition),
                body: self.scoped_block(body),
            },
            ExprKind::Block(block) => ValidatedKind::Block(self.scoped_block(block)),
            ExprKind::Error => ValidatedKind::Error,
        };
        ValidatedExpr {
            id: expr.id,
            kind,
            span: expr.span,
        }
    }
}
