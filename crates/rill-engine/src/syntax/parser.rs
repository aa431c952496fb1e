//! Recursive-descent parser.
//!
//! The parser never fails: problems are reported as diagnostics and the
//! offending expression is replaced by [`ExprKind::Error`]. Nesting is
//! bounded, both in parser recursion and in the depth of the finished tree,
//! so every later tree walk stays within a small stack.

use crate::diagnostic::{Diagnostic, Phase};
use crate::span::{LineIndex, Span};

use super::lexer::{Token, TokenKind, lex};
use super::tree::{BinaryOp, Block, Expr, ExprId, ExprKind, Ident, SyntaxTree, UnaryOp};

/// Parse `text` into a syntax tree plus lexical and parse diagnostics.
///
/// Expressions nested deeper than `max_nesting` are replaced by an error
/// node and reported once.
pub fn parse(text: &str, lines: &LineIndex, max_nesting: usize) -> (SyntaxTree, Vec<Diagnostic>) {
    let (tokens, diagnostics) = lex(text, lines);
    let mut parser = Parser {
        tokens,
        pos: 0,
        next_id: 0,
        depths: Vec::new(),
        depth: 0,
        max_nesting,
        too_deep: false,
        diagnostics,
        lines,
    };

    let exprs = parser.block_body(false);
    let root = Block {
        exprs,
        span: Span::new(0, text.len()),
    };
    let tree = SyntaxTree {
        root,
        expr_count: parser.next_id,
    };
    (tree, parser.diagnostics)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    next_id: u32,
    /// Tree depth of every node built so far, indexed by id.
    depths: Vec<usize>,
    /// Current recursion depth through [`Parser::nested`].
    depth: usize,
    max_nesting: usize,
    too_deep: bool,
    diagnostics: Vec<Diagnostic>,
    lines: &'a LineIndex,
}

impl Parser<'_> {
    fn peek(&self) -> &TokenKind {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &TokenKind {
        let index = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    /// Span of the most recently consumed token.
    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> bool {
        if self.eat(&kind) {
            return true;
        }
        let found = self.peek().describe();
        self.error(format!("expected {}, found {}", what, found), self.span());
        false
    }

    fn error(&mut self, message: String, span: Span) {
        self.diagnostics
            .push(Diagnostic::error(Phase::Parse, message, span, self.lines));
    }

    fn mk(&mut self, kind: ExprKind, span: Span) -> Expr {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        let expr = Expr { id, kind, span };
        let depth = 1 + expr
            .children()
            .iter()
            .map(|child| self.depths[child.id.0 as usize])
            .max()
            .unwrap_or(0);

        if depth > self.max_nesting {
            self.report_too_deep(span);
            self.depths.push(1);
            return Expr {
                id,
                kind: ExprKind::Error,
                span,
            };
        }
        self.depths.push(depth);
        expr
    }

    fn report_too_deep(&mut self, span: Span) {
        if !self.too_deep {
            self.too_deep = true;
            self.error(
                format!("expression nesting exceeds the limit of {}", self.max_nesting),
                span,
            );
        }
    }

    /// Run a parse function one nesting level deeper.
    fn nested(&mut self, parse: fn(&mut Self) -> Expr) -> Expr {
        if self.depth >= self.max_nesting {
            return self.skip_too_deep();
        }
        self.depth += 1;
        let expr = parse(self);
        self.depth -= 1;
        expr
    }

    /// Skip the rest of an over-nested expression. Closing tokens that
    /// belong to enclosing expressions are left in place.
    fn skip_too_deep(&mut self) -> Expr {
        let start = self.span();
        let first = self.pos;
        self.report_too_deep(start);

        let mut open = 0usize;
        loop {
            match self.peek() {
                TokenKind::Eof => break,
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => open += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if open == 0 {
                        break;
                    }
                    open -= 1;
                }
                _ => {}
            }
            self.bump();
        }

        let span = if self.pos > first {
            start.to(self.prev_span())
        } else {
            start
        };
        self.mk(ExprKind::Error, span)
    }

    /// Expressions up to end of input (top level) or up to `}` (nested).
    fn block_body(&mut self, nested: bool) -> Vec<Expr> {
        let mut exprs = Vec::new();
        loop {
            while self.eat(&TokenKind::Semi) {}
            match self.peek() {
                TokenKind::Eof => {
                    if nested {
                        let span = self.span();
                        self.error("expected `}`, found end of input".to_string(), span);
                    }
                    break;
                }
                TokenKind::RBrace if nested => break,
                TokenKind::RBrace => {
                    let span = self.bump().span;
                    self.error("unexpected `}`".to_string(), span);
                }
                _ => exprs.push(self.expr()),
            }
        }
        exprs
    }

    fn block(&mut self) -> Block {
        let start = self.span();
        if !self.expect(TokenKind::LBrace, "`{`") {
            return Block {
                exprs: Vec::new(),
                span: start,
            };
        }
        let exprs = self.block_body(true);
        let end = self.span();
        self.eat(&TokenKind::RBrace);
        Block {
            exprs,
            span: start.to(end),
        }
    }

    fn expr(&mut self) -> Expr {
        self.nested(Self::expr_inner)
    }

    fn expr_inner(&mut self) -> Expr {
        match (self.peek(), self.peek_nth(1)) {
            (TokenKind::Let, _) => self.let_expr(),
            (TokenKind::Ident(name), TokenKind::ColonEq) => {
                let name = name.clone();
                self.assign_expr(name)
            }
            _ => self.comparison(),
        }
    }

    fn let_expr(&mut self) -> Expr {
        let start = self.bump().span;
        let Some(name) = self.ident() else {
            let span = start.to(self.prev_span());
            return self.mk(ExprKind::Error, span);
        };
        let value = if self.expect(TokenKind::Eq, "`=`") {
            self.expr()
        } else {
            let span = self.span();
            self.mk(ExprKind::Error, span)
        };
        let span = start.to(value.span);
        self.mk(
            ExprKind::Let {
                name,
                value: Box::new(value),
            },
            span,
        )
    }

    fn assign_expr(&mut self, name: String) -> Expr {
        let span = self.bump().span;
        let target = Ident { name, span };
        self.bump(); // :=
        let value = self.expr();
        let span = target.span.to(value.span);
        self.mk(
            ExprKind::Assign {
                target,
                value: Box::new(value),
            },
            span,
        )
    }

    fn ident(&mut self) -> Option<Ident> {
        if let TokenKind::Ident(name) = self.peek() {
            let name = name.clone();
            let span = self.bump().span;
            Some(Ident { name, span })
        } else {
            let found = self.peek().describe();
            self.error(format!("expected identifier, found {}", found), self.span());
            None
        }
    }

    fn comparison(&mut self) -> Expr {
        let mut lhs = self.additive();
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                _ => return lhs,
            };
            self.bump();
            let rhs = self.additive();
            lhs = self.binary(op, lhs, rhs);
        }
    }

    fn additive(&mut self) -> Expr {
        let mut lhs = self.multiplicative();
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return lhs,
            };
            self.bump();
            let rhs = self.multiplicative();
            lhs = self.binary(op, lhs, rhs);
        }
    }

    fn multiplicative(&mut self) -> Expr {
        let mut lhs = self.unary();
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return lhs,
            };
            self.bump();
            let rhs = self.unary();
            lhs = self.binary(op, lhs, rhs);
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        let span = lhs.span.to(rhs.span);
        self.mk(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        )
    }

    fn unary(&mut self) -> Expr {
        let mut signs = Vec::new();
        while self.peek() == &TokenKind::Minus {
            signs.push(self.bump().span);
        }
        let mut expr = self.primary();
        while let Some(start) = signs.pop() {
            let span = start.to(expr.span);
            expr = self.mk(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(expr),
                },
                span,
            );
        }
        expr
    }

    fn primary(&mut self) -> Expr {
        let span = self.span();
        match self.peek().clone() {
            TokenKind::Integer(digits) => {
                self.bump();
                let value = digits.parse::<i64>().unwrap_or_else(|_| {
                    self.error("integer literal is too large".to_string(), span);
                    0
                });
                self.mk(ExprKind::Integer(value), span)
            }
            TokenKind::True => {
                self.bump();
                self.mk(ExprKind::Boolean(true), span)
            }
            TokenKind::False => {
                self.bump();
                self.mk(ExprKind::Boolean(false), span)
            }
            TokenKind::Str(contents) => {
                self.bump();
                self.mk(ExprKind::Str(contents), span)
            }
            TokenKind::LBracket => {
                self.bump();
                let items = self.arguments(TokenKind::RBracket, "`]`");
                let span = span.to(self.prev_span());
                self.mk(ExprKind::List(items), span)
            }
            TokenKind::Ident(name) => {
                self.bump();
                let ident = Ident { name, span };
                if self.eat(&TokenKind::LParen) {
                    let args = self.arguments(TokenKind::RParen, "`)`");
                    let span = span.to(self.prev_span());
                    self.mk(ExprKind::Call { callee: ident, args }, span)
                } else {
                    self.mk(ExprKind::Name(ident), span)
                }
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.expr();
                self.expect(TokenKind::RParen, "`)`");
                let span = span.to(self.prev_span());
                self.mk(ExprKind::Paren(Box::new(inner)), span)
            }
            TokenKind::If => self.if_expr(),
            TokenKind::While => {
                self.bump();
                let condition = self.nested(Self::comparison);
                let body = self.block();
                let span = span.to(body.span);
                self.mk(
                    ExprKind::While {
                        condition: Box::new(condition),
                        body,
                    },
                    span,
                )
            }
            TokenKind::LBrace => {
                let block = self.block();
                let span = block.span;
                self.mk(ExprKind::Block(block), span)
            }
            other => {
                self.error(format!("expected expression, found {}", other.describe()), span);
                // Closing braces and end of input belong to the enclosing block.
                if !matches!(other, TokenKind::Eof | TokenKind::RBrace) {
                    self.bump();
                }
                self.mk(ExprKind::Error, span)
            }
        }
    }

    fn if_expr(&mut self) -> Expr {
        let start = self.bump().span;
        let condition = self.nested(Self::comparison);
        let then_block = self.block();
        let else_block = if self.eat(&TokenKind::Else) {
            if self.peek() == &TokenKind::If {
                // `else if` desugars to an else block holding the nested if
                let nested = self.nested(Self::if_expr);
                let span = nested.span;
                Some(Block {
                    exprs: vec![nested],
                    span,
                })
            } else {
                Some(self.block())
            }
        } else {
            None
        };
        let end = else_block
            .as_ref()
            .map(|b| b.span)
            .unwrap_or(then_block.span);
        self.mk(
            ExprKind::If {
                condition: Box::new(condition),
                then_block,
                else_block,
            },
            start.to(end),
        )
    }

    /// Comma-separated expressions up to `close` (already past the opener).
    fn arguments(&mut self, close: TokenKind, what: &str) -> Vec<Expr> {
        let mut args = Vec::new();
        while self.peek() != &close && self.peek() != &TokenKind::Eof {
            args.push(self.expr());
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close, what);
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTING: usize = 64;

    fn parse_ok(text: &str) -> SyntaxTree {
        let lines = LineIndex::new(text);
        let (tree, diagnostics) = parse(text, &lines, NESTING);
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
        tree
    }

    fn parse_err(text: &str) -> Vec<Diagnostic> {
        let lines = LineIndex::new(text);
        let (_, diagnostics) = parse(text, &lines, NESTING);
        assert!(!diagnostics.is_empty(), "expected diagnostics for {:?}", text);
        diagnostics
    }

    #[test]
    fn test_let_integer() {
        let tree = parse_ok("let x = 1");
        assert_eq!(tree.root.exprs.len(), 1);
        let ExprKind::Let { name, value } = &tree.root.exprs[0].kind else {
            panic!("expected let");
        };
        assert_eq!(name.name, "x");
        assert_eq!(value.kind, ExprKind::Integer(1));
        assert_eq!(tree.root.exprs[0].span, Span::new(0, 9));
    }

    #[test]
    fn test_precedence() {
        let tree = parse_ok("1 + 2 * 3 < 10");
        assert_eq!(
            tree.dump(),
            "Binary(<)\n  Binary(+)\n    Integer(1)\n    Binary(*)\n      Integer(2)\n      Integer(3)\n  Integer(10)\n"
        );
    }

    #[test]
    fn test_statements_without_separators() {
        let tree = parse_ok("let x = 1 print(x); x := x + 1");
        assert_eq!(tree.root.exprs.len(), 3);
        assert!(matches!(tree.root.exprs[2].kind, ExprKind::Assign { .. }));
    }

    #[test]
    fn test_if_else_if_chain() {
        let tree = parse_ok("if x < 1 { 1 } else if x < 2 { 2 } else { 3 }");
        let ExprKind::If { else_block, .. } = &tree.root.exprs[0].kind else {
            panic!("expected if");
        };
        let else_block = else_block.as_ref().expect("else block");
        assert!(matches!(else_block.exprs[0].kind, ExprKind::If { .. }));
    }

    #[test]
    fn test_while_and_lists() {
        let tree = parse_ok("let xs = [1, 2]\nwhile len(xs) < 5 { push(xs, 0) }");
        assert_eq!(tree.root.exprs.len(), 2);
        assert!(matches!(tree.root.exprs[1].kind, ExprKind::While { .. }));
    }

    #[test]
    fn test_incomplete_let() {
        let diagnostics = parse_err("let x = ");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "expected expression, found end of input");
        assert_eq!(diagnostics[0].span, Span::new(8, 8));
    }

    #[test]
    fn test_missing_close_brace() {
        let diagnostics = parse_err("if true { print(1)");
        assert!(diagnostics.iter().any(|d| d.message.contains("expected `}`")));
    }

    #[test]
    fn test_stray_tokens_recover() {
        let text = ") ] , let y = 2 }";
        let lines = LineIndex::new(text);
        let (tree, diagnostics) = parse(text, &lines, NESTING);
        assert_eq!(diagnostics.len(), 4);
        assert!(
            tree.root
                .exprs
                .iter()
                .any(|e| matches!(e.kind, ExprKind::Let { .. }))
        );
    }

    #[test]
    fn test_integer_overflow() {
        let diagnostics = parse_err("99999999999999999999");
        assert_eq!(diagnostics[0].message, "integer literal is too large");
    }

    #[test]
    fn test_innermost_at() {
        let tree = parse_ok("let x = 1 + 2");
        let at_two = tree.innermost_at(12).expect("expression at offset 12");
        assert_eq!(at_two.kind, ExprKind::Integer(2));
        let at_let = tree.innermost_at(1).expect("expression at offset 1");
        assert!(matches!(at_let.kind, ExprKind::Let { .. }));
    }

    #[test]
    fn test_expr_ids_are_unique() {
        let tree = parse_ok("let x = [1, 2] print(x, 3)");
        let mut ids = Vec::new();
        fn collect(expr: &Expr, ids: &mut Vec<u32>) {
            ids.push(expr.id.0);
            for child in expr.children() {
                collect(child, ids);
            }
        }
        for expr in &tree.root.exprs {
            collect(expr, &mut ids);
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len() as u32, tree.expr_count);
    }

    fn nesting_diagnostics(text: &str) -> Vec<Diagnostic> {
        let lines = LineIndex::new(text);
        let (tree, diagnostics) = parse(text, &lines, NESTING);
        // Walking the tree must stay within the stack as well.
        let _ = tree.dump();
        diagnostics
            .into_iter()
            .filter(|d| d.message == "expression nesting exceeds the limit of 64")
            .collect()
    }

    #[test]
    fn test_nesting_within_limit() {
        let text = format!("{}1{}", "(".repeat(30), ")".repeat(30));
        let tree = parse_ok(&text);
        assert_eq!(tree.root.exprs.len(), 1);
    }

    #[test]
    fn test_deep_parentheses_are_reported_once() {
        let text = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
        assert_eq!(nesting_diagnostics(&text).len(), 1);

        // Closing parens stay balanced, so nothing else is reported.
        let lines = LineIndex::new(&text);
        let (tree, diagnostics) = parse(&text, &lines, NESTING);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(tree.root.exprs.len(), 1);
    }

    #[test]
    fn test_deep_trees_without_recursion_are_cut() {
        let chain = format!("1{}", " + 1".repeat(10_000));
        assert_eq!(nesting_diagnostics(&chain).len(), 1);

        let negations = format!("{}1", "-".repeat(10_000));
        assert_eq!(nesting_diagnostics(&negations).len(), 1);
    }

    #[test]
    fn test_deep_control_flow_is_reported() {
        let conditions = format!("{}true {{}}", "while ".repeat(5_000));
        assert_eq!(nesting_diagnostics(&conditions).len(), 1);

        let else_ifs = format!("if true {{}}{}", " else if true {}".repeat(5_000));
        assert_eq!(nesting_diagnostics(&else_ifs).len(), 1);

        let lets = "let a = ".repeat(5_000) + "1";
        assert_eq!(nesting_diagnostics(&lets).len(), 1);
    }

    #[test]
    fn test_code_after_deep_expression_still_parses() {
        let text = format!("{}1{}\nlet y = 2", "[".repeat(500), "]".repeat(500));
        let lines = LineIndex::new(&text);
        let (tree, diagnostics) = parse(&text, &lines, NESTING);
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(tree.root.exprs.last().map(|e| &e.kind), Some(ExprKind::Let { .. })));
    }
}
