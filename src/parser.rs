use crate::{
    diagnostics::{Diagnostic, DiagnosticKind},
    lexer::{Lexer, Token, TokenKind},
    value::Value,
};

/// Reads every top-level form in `source`.
pub fn parse_program(source: &str) -> Result<Vec<Value>, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    fn parse_program(&mut self) -> Result<Vec<Value>, Diagnostic> {
        let mut forms = Vec::new();
        while !self.is_at_end() {
            forms.push(self.parse_expr()?);
        }
        Ok(forms)
    }

    fn parse_expr(&mut self) -> Result<Value, Diagnostic> {
        let Some(token) = self.advance() else {
            return Err(self.error_eof("unexpected end of input"));
        };
        match token.kind {
            TokenKind::Integer => Ok(integer_literal(&token.lexeme)),
            TokenKind::Float => Ok(float_literal(&token.lexeme)),
            TokenKind::Symbol => Ok(Value::symbol(token.lexeme)),
            TokenKind::String => Ok(Value::string(token.lexeme)),
            TokenKind::LParen => self
                .parse_group(&token, TokenKind::RParen)
                .map(Value::SExpr),
            TokenKind::LBrace => self
                .parse_group(&token, TokenKind::RBrace)
                .map(Value::QExpr),
            TokenKind::RParen | TokenKind::RBrace => {
                Err(self.error(&token, &format!("unexpected `{}`", token.lexeme)))
            }
            TokenKind::Eof => Err(self.error(&token, "unexpected end of input")),
        }
    }

    fn parse_group(&mut self, opener: &Token, closer: TokenKind) -> Result<Vec<Value>, Diagnostic> {
        let mut cells = Vec::new();
        loop {
            let Some(next) = self.peek() else {
                return Err(self.error_eof(&format!("unclosed `{}`", opener.lexeme)));
            };
            match &next.kind {
                kind if *kind == closer => {
                    self.advance();
                    return Ok(cells);
                }
                TokenKind::RParen | TokenKind::RBrace => {
                    let expected = if closer == TokenKind::RParen { ')' } else { '}' };
                    return Err(self
                        .error(
                            next,
                            &format!("expected `{expected}` but found `{}`", next.lexeme),
                        )
                        .with_note(format!(
                            "group opened at byte {}",
                            opener.span.start
                        )));
                }
                TokenKind::Eof => {
                    return Err(self.error(opener, &format!("unclosed `{}`", opener.lexeme)));
                }
                _ => cells.push(self.parse_expr()?),
            }
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.current).cloned()?;
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        Some(token)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Eof) | None)
    }

    fn error(&self, token: &Token, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Parser, message.to_string()).with_span(token.span)
    }

    fn error_eof(&self, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Parser, message.to_string())
    }
}

/// Out-of-range literals read as an error value rather than failing the
/// whole parse.
fn integer_literal(lexeme: &str) -> Value {
    lexeme
        .parse::<i64>()
        .map(Value::int)
        .unwrap_or_else(|_| Value::error(format!("invalid number {lexeme}")))
}

fn float_literal(lexeme: &str) -> Value {
    match lexeme.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::float(n),
        _ => Value::error(format!("invalid number {lexeme}")),
    }
}
