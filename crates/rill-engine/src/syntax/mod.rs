//! Lexing and parsing.

mod lexer;
mod parser;
mod tree;

pub use lexer::{Token, TokenKind, lex};
pub use parser::parse;
pub use tree::{BinaryOp, Block, Expr, ExprId, ExprKind, Ident, SyntaxTree, UnaryOp};
