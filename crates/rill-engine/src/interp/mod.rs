//! BIR interpreter.
//!
//! Runs a lowered program with a step budget, collecting printed output,
//! runtime diagnostics and the breakpoint heap snapshots.

mod heap;

use std::rc::Rc;

pub use heap::{Heap, ObjectId, Value};

use crate::bir::{Bir, Constant, Local, Rvalue, StatementKind, Terminator};
use crate::diagnostic::{Diagnostic, Phase};
use crate::span::{LineIndex, Span};
use crate::syntax::{BinaryOp, UnaryOp};
use crate::validate::Builtin;

/// Resource bounds for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionLimits {
    /// Statements and terminators the program may run.
    pub max_steps: u64,
    /// Printed bytes kept before output is truncated.
    pub max_output_bytes: usize,
}

/// Outcome of running a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    pub output: String,
    pub diagnostics: Vec<Diagnostic>,
    pub heap_before: String,
    pub heap_after: String,
    pub steps: u64,
    /// Whether the program ran to its final `return`.
    pub completed: bool,
}

const TRUNCATION_NOTE: &str = "\n[output truncated]\n";

/// Longest string a program may build.
const MAX_STRING_BYTES: usize = 1 << 20;

/// Work on string contents costs one extra step per this many bytes.
const BYTES_PER_STEP: usize = 1024;

/// Run `bir` to completion, a runtime error, or the step limit.
pub fn execute(bir: &Bir, lines: &LineIndex, limits: ExecutionLimits) -> Execution {
    let mut machine = Machine {
        bir,
        lines,
        limits,
        locals: vec![None; bir.locals.len()],
        heap: Heap::default(),
        execution: Execution::default(),
        truncated: false,
    };

    match machine.run() {
        Ok(result) => {
            let limit = machine.limits.max_output_bytes;
            let mut echoed = String::from("=> ");
            machine
                .heap
                .render(&mut echoed, &result, true, limit.saturating_add(1));
            if echoed.len() > limit {
                let kept = prefix(&echoed, limit).len();
                echoed.truncate(kept);
                echoed.push_str(" ...");
            }
            echoed.push('\n');
            machine.execution.output.push_str(&echoed);
            machine.execution.completed = true;
        }
        Err(diagnostic) => {
            tracing::debug!(message = %diagnostic.message, "program stopped with a runtime error");
            machine.execution.diagnostics.push(diagnostic);
        }
    }
    machine.execution
}

struct Machine<'a> {
    bir: &'a Bir,
    lines: &'a LineIndex,
    limits: ExecutionLimits,
    locals: Vec<Option<Value>>,
    heap: Heap,
    execution: Execution,
    truncated: bool,
}

type Step<T> = Result<T, Diagnostic>;

impl Machine<'_> {
    fn fail(&self, message: impl Into<String>, span: Span) -> Diagnostic {
        Diagnostic::error(Phase::Runtime, message, span, self.lines)
    }

    fn tick(&mut self, span: Span) -> Step<()> {
        self.spend(1, span)
    }

    fn spend(&mut self, steps: u64, span: Span) -> Step<()> {
        self.execution.steps = self.execution.steps.saturating_add(steps);
        if self.execution.steps > self.limits.max_steps {
            return Err(self.fail(
                format!(
                    "execution exceeded the step limit of {}",
                    self.limits.max_steps
                ),
                span,
            ));
        }
        Ok(())
    }

    fn run(&mut self) -> Step<Value> {
        let mut block_id = self.bir.entry;
        loop {
            let block = self.bir.block(block_id);
            for statement in &block.statements {
                self.tick(statement.span)?;
                match &statement.kind {
                    StatementKind::Assign(local, rvalue) => {
                        let value = self.eval(rvalue, statement.span)?;
                        self.locals[local.0 as usize] = Some(value);
                    }
                    StatementKind::BreakpointStart(_) => {
                        if self.execution.heap_before.is_empty() {
                            self.execution.heap_before = self.snapshot();
                        }
                    }
                    StatementKind::BreakpointEnd(..) => {
                        if !self.execution.heap_before.is_empty()
                            && self.execution.heap_after.is_empty()
                        {
                            self.execution.heap_after = self.snapshot();
                        }
                    }
                }
            }

            self.tick(block.terminator_span)?;
            block_id = match &block.terminator {
                Terminator::Goto(target) => *target,
                Terminator::Branch {
                    condition,
                    then_block,
                    else_block,
                } => match self.read(*condition, block.terminator_span)? {
                    Value::Bool(true) => *then_block,
                    Value::Bool(false) => *else_block,
                    other => {
                        return Err(self.fail(
                            format!("expected a bool condition, found {}", other.type_name()),
                            block.terminator_span,
                        ));
                    }
                },
                Terminator::Return(local) => return self.read(*local, block.terminator_span),
                Terminator::Unreachable => {
                    return Err(self.fail("entered an unreachable block", block.terminator_span));
                }
            };
        }
    }

    fn read(&self, local: Local, span: Span) -> Step<Value> {
        self.locals[local.0 as usize]
            .clone()
            .ok_or_else(|| self.fail("use of an uninitialized value", span))
    }

    fn eval(&mut self, rvalue: &Rvalue, span: Span) -> Step<Value> {
        match rvalue {
            Rvalue::Use(local) => self.read(*local, span),
            Rvalue::Const(constant) => Ok(match constant {
                Constant::Int(v) => Value::Int(*v),
                Constant::Bool(v) => Value::Bool(*v),
                Constant::Str(v) => Value::Str(Rc::from(v.as_str())),
                Constant::Unit => Value::Unit,
            }),
            Rvalue::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.read(*item, span))
                    .collect::<Step<Vec<_>>>()?;
                Ok(Value::List(self.heap.alloc(items)))
            }
            Rvalue::Unary(UnaryOp::Neg, operand) => match self.read(*operand, span)? {
                Value::Int(v) => v
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| self.fail("integer overflow", span)),
                other => Err(self.fail(format!("cannot negate a {}", other.type_name()), span)),
            },
            Rvalue::Binary(op, lhs, rhs) => {
                let lhs = self.read(*lhs, span)?;
                let rhs = self.read(*rhs, span)?;
                self.binary(*op, lhs, rhs, span)
            }
            Rvalue::Call(builtin, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.read(*arg, span))
                    .collect::<Step<Vec<_>>>()?;
                self.call(*builtin, args, span)
            }
            Rvalue::Error => Err(self.fail("cannot execute code containing errors", span)),
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value, span: Span) -> Step<Value> {
        self.spend(bulk(&lhs) + bulk(&rhs), span)?;
        let overflow = || self.fail("integer overflow", span);
        match (op, lhs, rhs) {
            (BinaryOp::Add, Value::Int(a), Value::Int(b)) => {
                a.checked_add(b).map(Value::Int).ok_or_else(overflow)
            }
            (BinaryOp::Add, Value::Str(a), Value::Str(b)) => self.concat(&a, &b, span),
            (BinaryOp::Sub, Value::Int(a), Value::Int(b)) => {
                a.checked_sub(b).map(Value::Int).ok_or_else(overflow)
            }
            (BinaryOp::Mul, Value::Int(a), Value::Int(b)) => {
                a.checked_mul(b).map(Value::Int).ok_or_else(overflow)
            }
            (BinaryOp::Div, Value::Int(_), Value::Int(0)) => {
                Err(self.fail("division by zero", span))
            }
            (BinaryOp::Div, Value::Int(a), Value::Int(b)) => {
                a.checked_div(b).map(Value::Int).ok_or_else(overflow)
            }
            (BinaryOp::Lt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
            (BinaryOp::Le, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a <= b)),
            (BinaryOp::Gt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a > b)),
            (BinaryOp::Ge, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a >= b)),
            (BinaryOp::Eq | BinaryOp::Ne, a, b) if a.type_name() == b.type_name() => {
                let equal = a == b;
                Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
            }
            (op, a, b) => Err(self.fail(
                format!(
                    "cannot apply `{}` to {} and {}",
                    op.symbol(),
                    a.type_name(),
                    b.type_name()
                ),
                span,
            )),
        }
    }

    fn concat(&self, a: &str, b: &str, span: Span) -> Step<Value> {
        let len = a.len() + b.len();
        if len > MAX_STRING_BYTES {
            return Err(self.fail(
                format!("string exceeds the size limit of {} bytes", MAX_STRING_BYTES),
                span,
            ));
        }
        let mut joined = String::with_capacity(len);
        joined.push_str(a);
        joined.push_str(b);
        Ok(Value::Str(Rc::from(joined)))
    }

    fn call(&mut self, builtin: Builtin, args: Vec<Value>, span: Span) -> Step<Value> {
        self.spend(args.iter().map(bulk).sum(), span)?;
        match (builtin, args.as_slice()) {
            (Builtin::Print, args) => {
                if self.truncated {
                    return Ok(Value::Unit);
                }
                // One byte past the room left is enough to trigger truncation.
                let limit = self.room() + 1;
                let mut line = String::new();
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        line.push(' ');
                    }
                    self.heap.render(&mut line, arg, false, limit);
                    if line.len() >= limit {
                        break;
                    }
                }
                self.print(&line);
                self.print("\n");
                Ok(Value::Unit)
            }
            (Builtin::Len, [Value::List(id)]) => Ok(Value::Int(self.heap.get(*id).len() as i64)),
            (Builtin::Len, [Value::Str(s)]) => Ok(Value::Int(s.chars().count() as i64)),
            (Builtin::Push, [Value::List(id), value]) => {
                let value = value.clone();
                self.heap.get_mut(*id).push(value);
                Ok(Value::Unit)
            }
            (builtin, args) => {
                let types = args
                    .iter()
                    .map(Value::type_name)
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(self.fail(
                    format!("`{}` cannot be called with ({})", builtin, types),
                    span,
                ))
            }
        }
    }

    fn room(&self) -> usize {
        self.limits
            .max_output_bytes
            .saturating_sub(self.execution.output.len())
    }

    fn print(&mut self, text: &str) {
        if self.truncated {
            return;
        }
        let room = self.room();
        let output = &mut self.execution.output;
        if text.len() <= room {
            output.push_str(text);
            return;
        }
        output.push_str(prefix(text, room));
        output.push_str(TRUNCATION_NOTE);
        self.truncated = true;
    }

    fn snapshot(&self) -> String {
        let variables: Vec<(&str, &Value)> = self
            .bir
            .locals
            .iter()
            .zip(&self.locals)
            .filter_map(|(decl, value)| Some((decl.name.as_deref()?, value.as_ref()?)))
            .collect();
        self.heap.snapshot(&variables, self.limits.max_output_bytes)
    }
}

/// Extra steps charged for handling a string's contents.
fn bulk(value: &Value) -> u64 {
    match value {
        Value::Str(s) => (s.len() / BYTES_PER_STEP) as u64,
        _ => 0,
    }
}

/// Longest prefix of `text` within `max` bytes that ends on a char boundary.
fn prefix(text: &str, max: usize) -> &str {
    let mut cut = max.min(text.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bir::lower;
    use crate::syntax::{ExprId, parse};
    use crate::validate::validate;

    const LIMITS: ExecutionLimits = ExecutionLimits {
        max_steps: 10_000,
        max_output_bytes: 1024,
    };

    fn run_with(text: &str, breakpoint: Option<ExprId>, limits: ExecutionLimits) -> Execution {
        let lines = LineIndex::new(text);
        let (tree, diagnostics) = parse(text, &lines, 64);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        let (validated, diagnostics) = validate(&tree, &lines);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        execute(&lower(&validated, breakpoint), &lines, limits)
    }

    fn run(text: &str) -> Execution {
        run_with(text, None, LIMITS)
    }

    #[test]
    fn test_let_echoes_value() {
        let execution = run("let x = 1");
        assert!(execution.completed);
        assert_eq!(execution.output, "=> 1\n");
    }

    #[test]
    fn test_print_and_arithmetic() {
        let execution = run("let x = 2 * (3 + 4) print(\"x is\", x)");
        assert_eq!(execution.output, "x is 14\n=> ()\n");
    }

    #[test]
    fn test_while_loop_and_lists() {
        let execution = run(
            "let xs = []\nlet i = 0\nwhile i < 3 { push(xs, i * i) i := i + 1 }\nprint(xs, len(xs))",
        );
        assert_eq!(execution.output, "[0, 1, 4] 3\n=> ()\n");
    }

    #[test]
    fn test_if_expression_value() {
        let execution = run("let n = 5 if n > 3 { \"big\" } else { \"small\" }");
        assert_eq!(execution.output, "=> \"big\"\n");
    }

    #[test]
    fn test_division_by_zero_is_a_diagnostic() {
        let execution = run("print(1)\nprint(1 / 0)");
        assert!(!execution.completed);
        assert_eq!(execution.output, "1\n");
        assert_eq!(execution.diagnostics.len(), 1);
        assert_eq!(execution.diagnostics[0].message, "division by zero");
        assert_eq!(execution.diagnostics[0].range.start.row, 1);
    }

    #[test]
    fn test_type_errors() {
        let execution = run("1 + true");
        assert_eq!(
            execution.diagnostics[0].message,
            "cannot apply `+` to int and bool"
        );
        let execution = run("if 1 { 2 }");
        assert_eq!(
            execution.diagnostics[0].message,
            "expected a bool condition, found int"
        );
    }

    #[test]
    fn test_step_limit() {
        let limits = ExecutionLimits {
            max_steps: 100,
            ..LIMITS
        };
        let execution = run_with("while true { }", None, limits);
        assert!(!execution.completed);
        assert_eq!(execution.steps, 101);
        assert!(execution.diagnostics[0].message.contains("step limit of 100"));
    }

    #[test]
    fn test_output_truncation() {
        let limits = ExecutionLimits {
            max_output_bytes: 8,
            ..LIMITS
        };
        let execution = run_with("print(\"abcdef\") print(\"ghijkl\")", None, limits);
        assert_eq!(execution.output, format!("abcdef\ng{}=> ()\n", TRUNCATION_NOTE));
    }

    #[test]
    fn test_breakpoint_snapshots() {
        // e5 is the `push` call
        let text = "let xs = [1]\npush(xs, 2)";
        let execution = run_with(text, Some(ExprId(5)), LIMITS);
        assert_eq!(
            execution.heap_before,
            "stack:\n  xs = list@0\nheap:\n  list@0 = [1]\n"
        );
        assert_eq!(
            execution.heap_after,
            "stack:\n  xs = list@0\nheap:\n  list@0 = [1, 2]\n"
        );
    }

    #[test]
    fn test_breakpoint_captures_first_evaluation_only() {
        // e8 is `i := i + 1` inside the loop body
        let text = "let i = 0 while i < 3 { i := i + 1 }";
        let execution = run_with(text, Some(ExprId(8)), LIMITS);
        assert_eq!(execution.heap_before, "stack:\n  i = 0\nheap:\n  (empty)\n");
        assert_eq!(execution.heap_after, "stack:\n  i = 1\nheap:\n  (empty)\n");
    }

    #[test]
    fn test_printing_shared_lists_is_bounded() {
        let text = "let x = [1] let i = 0 while i < 60 { x := [x, x] i := i + 1 } print(x)";
        let execution = run(text);
        assert!(execution.completed);
        assert!(execution.output.starts_with("[[[["));
        assert!(execution.output.ends_with(&format!("{}=> ()\n", TRUNCATION_NOTE)));
        assert_eq!(
            execution.output.len(),
            LIMITS.max_output_bytes + TRUNCATION_NOTE.len() + "=> ()\n".len()
        );
    }

    #[test]
    fn test_echo_of_deep_list_is_bounded() {
        let text = "let x = [] let i = 0 while i < 2000 { x := [x] i := i + 1 } x";
        let limits = ExecutionLimits {
            max_steps: 100_000,
            ..LIMITS
        };
        let execution = run_with(text, None, limits);
        assert!(execution.completed);
        assert_eq!(
            execution.output,
            format!("=> {} ...\n", "[".repeat(LIMITS.max_output_bytes - 3))
        );
    }

    #[test]
    fn test_string_growth_is_limited() {
        let execution = run("let s = \"ab\" while true { s := s + s }");
        assert!(!execution.completed);
        assert_eq!(
            execution.diagnostics[0].message,
            "string exceeds the size limit of 1048576 bytes"
        );
    }

    #[test]
    fn test_string_work_costs_steps() {
        let short = run("let s = \"ab\" let t = s + s");
        let mut long = "let s = \"".to_string();
        long.push_str(&"a".repeat(8 * BYTES_PER_STEP));
        long.push_str("\" let t = s + s");
        let long = run(&long);
        assert!(long.completed);
        assert_eq!(long.steps, short.steps + 16);
    }
}
