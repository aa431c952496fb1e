//! BIR: the basic-block intermediate representation.
//!
//! Lowering flattens the validated tree into blocks of simple statements
//! over numbered locals. The first locals correspond one-to-one with the
//! validated tree's variable slots; the rest are temporaries.
//!
//! When a breakpoint expression is given, its evaluation is bracketed by
//! `breakpoint_start` / `breakpoint_end` statements, which the interpreter
//! uses to take heap snapshots.

use std::fmt::{self, Write};

use crate::span::Span;
use crate::syntax::{BinaryOp, ExprId, UnaryOp};
use crate::validate::{Builtin, ValidatedExpr, ValidatedKind, ValidatedTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Local(pub u32);

impl fmt::Display for Local {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalDecl {
    /// Variable name for locals backing a slot; `None` for temporaries.
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Int(i64),
    Bool(bool),
    Str(String),
    Unit,
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            Self::Bool(value) => write!(f, "{}", value),
            Self::Str(value) => write!(f, "{:?}", value),
            Self::Unit => f.write_str("()"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rvalue {
    Use(Local),
    Const(Constant),
    List(Vec<Local>),
    Unary(UnaryOp, Local),
    Binary(BinaryOp, Local, Local),
    Call(Builtin, Vec<Local>),
    /// Lowered from an expression that failed to parse or validate.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Assign(Local, Rvalue),
    BreakpointStart(ExprId),
    /// Marks the end of the breakpoint expression, whose value is in the local.
    BreakpointEnd(ExprId, Local),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Terminator {
    Goto(BlockId),
    Branch {
        condition: Local,
        then_block: BlockId,
        else_block: BlockId,
    },
    Return(Local),
    /// Placeholder for a block that was never terminated.
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BasicBlock {
    pub statements: Vec<Statement>,
    pub terminator: Terminator,
    pub terminator_span: Span,
}

/// A lowered program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bir {
    pub locals: Vec<LocalDecl>,
    pub blocks: Vec<BasicBlock>,
    pub entry: BlockId,
    /// Expression bracketed by breakpoint statements, if any.
    pub breakpoint: Option<ExprId>,
}

impl Bir {
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    /// Listing used as BIR stage output.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "locals:");
        for (i, decl) in self.locals.iter().enumerate() {
            match &decl.name {
                Some(name) => {
                    let _ = write!(out, " _{}({})", i, name);
                }
                None => {
                    let _ = write!(out, " _{}", i);
                }
            }
        }
        out.push('\n');

        for (i, block) in self.blocks.iter().enumerate() {
            let _ = writeln!(out, "bb{}:", i);
            for statement in &block.statements {
                let _ = match &statement.kind {
                    StatementKind::Assign(local, rvalue) => {
                        writeln!(out, "    {} = {}", local, RvalueDisplay(rvalue))
                    }
                    StatementKind::BreakpointStart(expr) => {
                        writeln!(out, "    breakpoint_start({})", expr)
                    }
                    StatementKind::BreakpointEnd(expr, local) => {
                        writeln!(out, "    breakpoint_end({}, {})", expr, local)
                    }
                };
            }
            let _ = match &block.terminator {
                Terminator::Goto(target) => writeln!(out, "    goto {}", target),
                Terminator::Branch {
                    condition,
                    then_block,
                    else_block,
                } => writeln!(out, "    if {} {{ {} }} else {{ {} }}", condition, then_block, else_block),
                Terminator::Return(local) => writeln!(out, "    return {}", local),
                Terminator::Unreachable => writeln!(out, "    unreachable"),
            };
        }
        out
    }
}

struct RvalueDisplay<'a>(&'a Rvalue);

impl fmt::Display for RvalueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |locals: &[Local]| {
            locals
                .iter()
                .map(|l| l.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self.0 {
            Rvalue::Use(local) => write!(f, "copy {}", local),
            Rvalue::Const(constant) => write!(f, "const {}", constant),
            Rvalue::List(items) => write!(f, "[{}]", join(items)),
            Rvalue::Unary(UnaryOp::Neg, operand) => write!(f, "neg {}", operand),
            Rvalue::Binary(op, lhs, rhs) => write!(f, "{} {} {}", lhs, op.symbol(), rhs),
            Rvalue::Call(builtin, args) => write!(f, "{}({})", builtin, join(args)),
            Rvalue::Error => f.write_str("<error>"),
        }
    }
}

/// Lower a validated program, bracketing `breakpoint` if given.
pub fn lower(tree: &ValidatedTree, breakpoint: Option<ExprId>) -> Bir {
    let mut builder = Builder {
        locals: tree
            .slots
            .iter()
            .map(|slot| LocalDecl {
                name: Some(slot.name.clone()),
            })
            .collect(),
        blocks: Vec::new(),
        current: BlockId(0),
        statements: Vec::new(),
        breakpoint,
    };
    let entry = builder.new_block();
    builder.current = entry;

    let result = builder.sequence(&tree.root, Span::default());
    builder.terminate(Terminator::Return(result), Span::default(), entry);

    Bir {
        locals: builder.locals,
        blocks: builder.blocks,
        entry,
        breakpoint,
    }
}

struct Builder {
    locals: Vec<LocalDecl>,
    blocks: Vec<BasicBlock>,
    current: BlockId,
    statements: Vec<Statement>,
    breakpoint: Option<ExprId>,
}

impl Builder {
    fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock {
            statements: Vec::new(),
            terminator: Terminator::Unreachable,
            terminator_span: Span::default(),
        });
        id
    }

    fn temp(&mut self) -> Local {
        let local = Local(self.locals.len() as u32);
        self.locals.push(LocalDecl { name: None });
        local
    }

    fn push(&mut self, kind: StatementKind, span: Span) {
        self.statements.push(Statement { kind, span });
    }

    fn assign_temp(&mut self, rvalue: Rvalue, span: Span) -> Local {
        let temp = self.temp();
        self.push(StatementKind::Assign(temp, rvalue), span);
        temp
    }

    /// Finish the current block with `terminator` and continue in `next`.
    fn terminate(&mut self, terminator: Terminator, span: Span, next: BlockId) {
        let block = &mut self.blocks[self.current.0 as usize];
        block.statements = std::mem::take(&mut self.statements);
        block.terminator = terminator;
        block.terminator_span = span;
        self.current = next;
    }

    /// Lower expressions in order; the value is that of the last one.
    fn sequence(&mut self, exprs: &[ValidatedExpr], span: Span) -> Local {
        let mut result = None;
        for expr in exprs {
            result = Some(self.expr(expr));
        }
        match result {
            Some(local) => local,
            None => self.assign_temp(Rvalue::Const(Constant::Unit), span),
        }
    }

    fn expr(&mut self, expr: &ValidatedExpr) -> Local {
        let bracketed = self.breakpoint == Some(expr.id);
        if bracketed {
            self.push(StatementKind::BreakpointStart(expr.id), expr.span);
        }
        let result = self.expr_inner(expr);
        if bracketed {
            self.push(StatementKind::BreakpointEnd(expr.id, result), expr.span);
        }
        result
    }

    fn expr_inner(&mut self, expr: &ValidatedExpr) -> Local {
        let span = expr.span;
        match &expr.kind {
            ValidatedKind::Integer(value) => {
                self.assign_temp(Rvalue::Const(Constant::Int(*value)), span)
            }
            ValidatedKind::Boolean(value) => {
                self.assign_temp(Rvalue::Const(Constant::Bool(*value)), span)
            }
            ValidatedKind::Str(value) => {
                self.assign_temp(Rvalue::Const(Constant::Str(value.clone())), span)
            }
            ValidatedKind::List(items) => {
                let items = items.iter().map(|item| self.expr(item)).collect();
                self.assign_temp(Rvalue::List(items), span)
            }
            ValidatedKind::Var(slot) => self.assign_temp(Rvalue::Use(Local(slot.0)), span),
            ValidatedKind::Let { slot, value } => {
                let value = self.expr(value);
                self.push(StatementKind::Assign(Local(slot.0), Rvalue::Use(value)), span);
                value
            }
            ValidatedKind::Assign { slot, value } => {
                let value = self.expr(value);
                self.push(StatementKind::Assign(Local(slot.0), Rvalue::Use(value)), span);
                self.assign_temp(Rvalue::Const(Constant::Unit), span)
            }
            ValidatedKind::Call { builtin, args } => {
                let args = args.iter().map(|arg| self.expr(arg)).collect();
                self.assign_temp(Rvalue::Call(*builtin, args), span)
            }
            ValidatedKind::Unary { op, operand } => {
                let operand = self.expr(operand);
                self.assign_temp(Rvalue::Unary(*op, operand), span)
            }
            ValidatedKind::Binary { op, lhs, rhs } => {
                let lhs = self.expr(lhs);
                let rhs = self.expr(rhs);
                self.assign_temp(Rvalue::Binary(*op, lhs, rhs), span)
            }
            ValidatedKind::Paren(inner) => self.expr(inner),
            ValidatedKind::If {
                condition,
                then_exprs,
                else_exprs,
            } => {
                let condition_local = self.expr(condition);
                let result = self.temp();
                let then_block = self.new_block();
                let else_block = self.new_block();
                let join_block = self.new_block();
                self.terminate(
                    Terminator::Branch {
                        condition: condition_local,
                        then_block,
                        else_block,
                    },
                    condition.span,
                    then_block,
                );

                let value = self.sequence(then_exprs, span);
                self.push(StatementKind::Assign(result, Rvalue::Use(value)), span);
                self.terminate(Terminator::Goto(join_block), span, else_block);

                match else_exprs {
                    Some(else_exprs) => {
                        let value = self.sequence(else_exprs, span);
                        self.push(StatementKind::Assign(result, Rvalue::Use(value)), span);
                    }
                    None => {
                        self.push(
                            StatementKind::Assign(result, Rvalue::Const(Constant::Unit)),
                            span,
                        );
                    }
                }
                self.terminate(Terminator::Goto(join_block), span, join_block);
                result
            }
            ValidatedKind::While { condition, body } => {
                let condition_block = self.new_block();
                let body_block = self.new_block();
                let exit_block = self.new_block();
                self.terminate(Terminator::Goto(condition_block), span, condition_block);

                let condition_local = self.expr(condition);
                self.terminate(
                    Terminator::Branch {
                        condition: condition_local,
                        then_block: body_block,
                        else_block: exit_block,
                    },
                    condition.span,
                    body_block,
                );

                self.sequence(body, span);
                self.terminate(Terminator::Goto(condition_block), span, exit_block);
                self.assign_temp(Rvalue::Const(Constant::Unit), span)
            }
            ValidatedKind::Block(exprs) => self.sequence(exprs, span),
            ValidatedKind::Error => self.assign_temp(Rvalue::Error, span),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::LineIndex;
    use crate::syntax::parse;
    use crate::validate::validate;

    fn lower_text(text: &str, breakpoint: Option<ExprId>) -> Bir {
        let lines = LineIndex::new(text);
        let (tree, _) = parse(text, &lines, 64);
        let (validated, _) = validate(&tree, &lines);
        lower(&validated, breakpoint)
    }

    #[test]
    fn test_straight_line_program() {
        let bir = lower_text("let x = 1", None);
        assert_eq!(
            bir.dump(),
            "locals: _0(x) _1\nbb0:\n    _1 = const 1\n    _0 = copy _1\n    return _1\n"
        );
    }

    #[test]
    fn test_if_creates_join_block() {
        let bir = lower_text("if true { 1 } else { 2 }", None);
        assert_eq!(bir.blocks.len(), 4);
        assert!(matches!(bir.block(bir.entry).terminator, Terminator::Branch { .. }));
        assert!(
            bir.blocks
                .iter()
                .all(|b| b.terminator != Terminator::Unreachable)
        );
    }

    #[test]
    fn test_while_loops_back() {
        let bir = lower_text("let i = 0 while i < 3 { i := i + 1 }", None);
        let condition_block = BlockId(1);
        let body_block = bir.block(BlockId(2));
        assert_eq!(body_block.terminator, Terminator::Goto(condition_block));
    }

    #[test]
    fn test_breakpoint_brackets_expression() {
        // `1` is the first expression the parser builds
        let bir = lower_text("let x = 1", Some(ExprId(0)));
        let dump = bir.dump();
        assert!(dump.contains("breakpoint_start(e0)"), "{}", dump);
        assert!(dump.contains("breakpoint_end(e0, _1)"), "{}", dump);
    }

    #[test]
    fn test_error_nodes_lower_to_error_rvalue() {
        let bir = lower_text("print(nope)", None);
        assert!(bir.dump().contains("<error>"));
    }
}
