//! Tokenizer.

use crate::diagnostic::{Diagnostic, Phase};
use crate::span::{LineIndex, Span};

/// Kinds of tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident(String),
    /// Digits with `_` separators already removed.
    Integer(String),
    /// String contents with escapes resolved.
    Str(String),
    Let,
    If,
    Else,
    While,
    True,
    False,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Eq,
    ColonEq,
    Plus,
    Minus,
    Star,
    Slash,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    Eof,
}

impl TokenKind {
    /// Short human-readable description used in parse errors.
    pub fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("identifier `{}`", name),
            Self::Integer(digits) => format!("integer `{}`", digits),
            Self::Str(_) => "string literal".to_string(),
            Self::Eof => "end of input".to_string(),
            other => format!("`{}`", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Self::Let => "let",
            Self::If => "if",
            Self::Else => "else",
            Self::While => "while",
            Self::True => "true",
            Self::False => "false",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::Comma => ",",
            Self::Semi => ";",
            Self::Eq => "=",
            Self::ColonEq => ":=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::EqEq => "==",
            Self::Ne => "!=",
            Self::Ident(_) | Self::Integer(_) | Self::Str(_) | Self::Eof => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Split `text` into tokens. The result always ends with [`TokenKind::Eof`].
///
/// Unknown characters and unterminated strings are reported and skipped.
pub fn lex(text: &str, lines: &LineIndex) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut lexer = Lexer {
        text,
        chars: text.char_indices().peekable(),
        tokens: Vec::new(),
        diagnostics: Vec::new(),
        lines,
    };
    lexer.run();
    (lexer.tokens, lexer.diagnostics)
}

struct Lexer<'a> {
    text: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
    lines: &'a LineIndex,
}

impl Lexer<'_> {
    fn run(&mut self) {
        while let Some((start, c)) = self.chars.next() {
            let kind = match c {
                c if c.is_whitespace() => continue,
                '#' => {
                    // Comment to end of line
                    while self.chars.next_if(|&(_, c)| c != '\n').is_some() {}
                    continue;
                }
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                ',' => TokenKind::Comma,
                ';' => TokenKind::Semi,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '=' if self.eat('=') => TokenKind::EqEq,
                '=' => TokenKind::Eq,
                '<' if self.eat('=') => TokenKind::Le,
                '<' => TokenKind::Lt,
                '>' if self.eat('=') => TokenKind::Ge,
                '>' => TokenKind::Gt,
                '!' if self.eat('=') => TokenKind::Ne,
                ':' if self.eat('=') => TokenKind::ColonEq,
                '"' => match self.string(start) {
                    Some(contents) => TokenKind::Str(contents),
                    None => continue,
                },
                c if c.is_ascii_digit() => self.integer(c),
                c if c.is_alphabetic() || c == '_' => self.word(start),
                other => {
                    let span = Span::new(start, start + other.len_utf8());
                    self.diagnostics.push(Diagnostic::error(
                        Phase::Lex,
                        format!("unexpected character `{}`", other),
                        span,
                        self.lines,
                    ));
                    continue;
                }
            };
            let end = self.offset();
            self.tokens.push(Token {
                kind,
                span: Span::new(start, end),
            });
        }

        let len = self.text.len();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(len, len),
        });
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map(|&(i, _)| i).unwrap_or(self.text.len())
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|&(_, c)| c == expected).is_some()
    }

    fn integer(&mut self, first: char) -> TokenKind {
        let mut digits = String::from(first);
        while let Some((_, c)) = self.chars.next_if(|&(_, c)| c.is_ascii_digit() || c == '_') {
            if c != '_' {
                digits.push(c);
            }
        }
        TokenKind::Integer(digits)
    }

    fn word(&mut self, start: usize) -> TokenKind {
        while self
            .chars
            .next_if(|&(_, c)| c.is_alphanumeric() || c == '_')
            .is_some()
        {}
        let end = self.offset();
        match &self.text[start..end] {
            "let" => TokenKind::Let,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            word => TokenKind::Ident(word.to_string()),
        }
    }

    fn string(&mut self, start: usize) -> Option<String> {
        let mut contents = String::new();
        while let Some((i, c)) = self.chars.next() {
            match c {
                '"' => return Some(contents),
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => contents.push('\n'),
                    Some((_, 't')) => contents.push('\t'),
                    Some((_, '"')) => contents.push('"'),
                    Some((_, '\\')) => contents.push('\\'),
                    Some((j, other)) => {
                        self.diagnostics.push(Diagnostic::error(
                            Phase::Lex,
                            format!("unknown escape sequence `\\{}`", other),
                            Span::new(i, j + other.len_utf8()),
                            self.lines,
                        ));
                    }
                    None => break,
                },
                c => contents.push(c),
            }
        }

        self.diagnostics.push(
            Diagnostic::error(
                Phase::Lex,
                "unterminated string literal",
                Span::new(start, self.text.len()),
                self.lines,
            )
            .with_label("string starts here"),
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        let lines = LineIndex::new(text);
        let (tokens, diagnostics) = lex(text, &lines);
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_let_statement() {
        assert_eq!(
            kinds("let x = 22_222"),
            vec![
                TokenKind::Let,
                TokenKind::Ident("x".into()),
                TokenKind::Eq,
                TokenKind::Integer("22222".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("a := b <= c == d != e >= f"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::ColonEq,
                TokenKind::Ident("b".into()),
                TokenKind::Le,
                TokenKind::Ident("c".into()),
                TokenKind::EqEq,
                TokenKind::Ident("d".into()),
                TokenKind::Ne,
                TokenKind::Ident("e".into()),
                TokenKind::Ge,
                TokenKind::Ident("f".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_strings() {
        assert_eq!(
            kinds("# greeting\nprint(\"hi\\n\")"),
            vec![
                TokenKind::Ident("print".into()),
                TokenKind::LParen,
                TokenKind::Str("hi\n".into()),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_reported() {
        let text = "let s = \"abc";
        let lines = LineIndex::new(text);
        let (tokens, diagnostics) = lex(text, &lines);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "unterminated string literal");
        assert_eq!(tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
    }

    #[test]
    fn test_unexpected_character_skipped() {
        let text = "let @ x";
        let lines = LineIndex::new(text);
        let (tokens, diagnostics) = lex(text, &lines);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_eof_span_at_end() {
        let text = "let x = ";
        let lines = LineIndex::new(text);
        let (tokens, _) = lex(text, &lines);
        assert_eq!(tokens.last().map(|t| t.span), Some(Span::new(8, 8)));
    }
}
