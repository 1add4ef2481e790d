use crate::ast::*;
use crate::lexer::{Span, Token, TokenKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token: expected {expected}, found {found} at position {span:?}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("Unexpected end of file")]
    UnexpectedEof,
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::UnexpectedToken { span, .. } => Some(*span),
            ParseError::UnexpectedEof | ParseError::InvalidNumber(_) => None,
        }
    }
}

/// Recursive-descent parser for the LP text format.
///
/// Statements are separated by newlines or `;`. Inside a statement newlines
/// are significant: an expression never continues onto the next line, so a
/// line starting with `-` is always a new statement.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(source: &str) -> Result<Program, ParseError> {
        let tokens = crate::lexer::Lexer::tokenize(source);
        let mut parser = Parser::new(tokens);
        parser.parse_program()
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> TokenKind {
        self.current().map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn skip_separators(&mut self) {
        while matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::Comment | TokenKind::Semicolon
        ) {
            self.advance();
        }
    }

    fn skip_comments(&mut self) {
        while self.peek_kind() == TokenKind::Comment {
            self.advance();
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.current() {
            Some(t) if t.kind != TokenKind::Eof => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: describe(t),
                span: t.span,
            },
            _ => ParseError::UnexpectedEof,
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        self.skip_comments();
        match self.current().cloned() {
            Some(t) if t.kind == kind => {
                self.advance();
                Ok(t)
            }
            _ => Err(self.unexpected(&format!("{:?}", kind))),
        }
    }

    fn expect_statement_end(&mut self) -> Result<(), ParseError> {
        self.skip_comments();
        match self.peek_kind() {
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected("end of statement")),
        }
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut items = Vec::new();

        loop {
            self.skip_separators();

            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Max | TokenKind::Min => {
                    items.push(Item::Objective(self.parse_objective()?));
                }
                TokenKind::Subject => {
                    self.advance();
                    self.expect(TokenKind::To)?;
                }
                _ => items.push(Item::Constraint(self.parse_constraint()?)),
            }
        }

        Ok(Program { items })
    }

    fn parse_objective(&mut self) -> Result<Objective, ParseError> {
        let Some(keyword) = self.advance().cloned() else {
            return Err(ParseError::UnexpectedEof);
        };
        let sense = match keyword.kind {
            TokenKind::Max => Sense::Maximize,
            _ => Sense::Minimize,
        };

        self.skip_comments();
        if self.peek_kind() == TokenKind::Colon {
            self.advance();
        }

        let expr = self.parse_expr()?;
        self.expect_statement_end()?;

        Ok(Objective {
            span: keyword.span.merge(expr.span),
            sense,
            expr,
        })
    }

    fn parse_constraint(&mut self) -> Result<Constraint, ParseError> {
        self.skip_comments();
        let start = self.current().map(|t| t.span).unwrap_or(Span::new(0, 0));

        let mut label = None;
        if self.peek_kind() == TokenKind::Ident && self.peek_kind_at(1) == TokenKind::Colon {
            label = self.advance().map(|t| t.text.clone());
            self.advance(); // :
        }

        let lhs = self.parse_expr()?;

        self.skip_comments();
        let relation = match self.peek_kind() {
            TokenKind::Le => Relation::Le,
            TokenKind::Ge => Relation::Ge,
            TokenKind::Eq => Relation::Eq,
            _ => return Err(self.unexpected("<=, >= or =")),
        };
        self.advance();

        let rhs = self.parse_expr()?;
        self.expect_statement_end()?;

        Ok(Constraint {
            span: start.merge(rhs.span),
            label,
            lhs,
            relation,
            rhs,
        })
    }

    fn parse_expr(&mut self) -> Result<LinearExpr, ParseError> {
        self.skip_comments();

        let sign = match self.peek_kind() {
            TokenKind::Plus => {
                self.advance();
                1.0
            }
            TokenKind::Minus => {
                self.advance();
                -1.0
            }
            _ => 1.0,
        };

        let mut terms = vec![self.parse_term(sign)?];

        loop {
            self.skip_comments();
            let sign = match self.peek_kind() {
                TokenKind::Plus => 1.0,
                TokenKind::Minus => -1.0,
                _ => break,
            };
            self.advance();
            terms.push(self.parse_term(sign)?);
        }

        let span = terms
            .iter()
            .map(|t| t.span)
            .reduce(Span::merge)
            .unwrap_or(Span::new(0, 0));

        Ok(LinearExpr { span, terms })
    }

    fn parse_term(&mut self, sign: f64) -> Result<Term, ParseError> {
        self.skip_comments();

        match self.peek_kind() {
            TokenKind::Number => {
                let Some(token) = self.advance().cloned() else {
                    return Err(ParseError::UnexpectedEof);
                };
                let value: f64 = token
                    .text
                    .parse()
                    .map_err(|_| ParseError::InvalidNumber(token.text.clone()))?;

                let mut span = token.span;
                let mut variable = None;

                // `3x` binds directly; `3 * x` may have comments around the star
                if self.peek_kind() == TokenKind::Ident {
                    if let Some(ident) = self.advance() {
                        span = span.merge(ident.span);
                        variable = Some(ident.text.clone());
                    }
                } else {
                    self.skip_comments();
                    if self.peek_kind() == TokenKind::Star {
                        self.advance();
                        let ident = self.expect(TokenKind::Ident)?;
                        span = span.merge(ident.span);
                        variable = Some(ident.text);
                    }
                }

                Ok(Term {
                    span,
                    coefficient: sign * value,
                    variable,
                })
            }
            TokenKind::Ident => {
                let Some(token) = self.advance().cloned() else {
                    return Err(ParseError::UnexpectedEof);
                };
                Ok(Term {
                    span: token.span,
                    coefficient: sign,
                    variable: Some(token.text),
                })
            }
            _ => Err(self.unexpected("number or variable")),
        }
    }
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Newline => "end of line".to_string(),
        _ => format!("'{}'", token.text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(coefficient: f64, variable: Option<&str>) -> (f64, Option<String>) {
        (coefficient, variable.map(str::to_string))
    }

    fn terms(expr: &LinearExpr) -> Vec<(f64, Option<String>)> {
        expr.terms
            .iter()
            .map(|t| (t.coefficient, t.variable.clone()))
            .collect()
    }

    #[test]
    fn test_parse_program() {
        let source = r#"
            // production plan
            maximize 3x + 5y
            subject to
            plant1: x <= 4
            2y <= 12
            3x + 2y <= 18
        "#;
        let program = Parser::parse(source).unwrap();
        assert_eq!(program.items.len(), 4);

        let objective = program.objectives().next().unwrap();
        assert_eq!(objective.sense, Sense::Maximize);
        assert_eq!(
            terms(&objective.expr),
            vec![term(3.0, Some("x")), term(5.0, Some("y"))]
        );

        let constraints: Vec<_> = program.constraints().collect();
        assert_eq!(constraints.len(), 3);
        assert_eq!(constraints[0].label.as_deref(), Some("plant1"));
        assert_eq!(constraints[1].label, None);
        assert_eq!(constraints[2].relation, Relation::Le);
        assert_eq!(constraints[2].rhs.constant(), 18.0);
    }

    #[test]
    fn test_signs_and_stars() {
        let program = Parser::parse("min: -x + 2 * y - 0.5z").unwrap();
        let objective = program.objectives().next().unwrap();
        assert_eq!(objective.sense, Sense::Minimize);
        assert_eq!(
            terms(&objective.expr),
            vec![
                term(-1.0, Some("x")),
                term(2.0, Some("y")),
                term(-0.5, Some("z")),
            ]
        );
    }

    #[test]
    fn test_expression_stops_at_newline() {
        let program = Parser::parse("max x\nx <= 4\n-y >= -3").unwrap();
        let constraints: Vec<_> = program.constraints().collect();
        assert_eq!(constraints.len(), 2);
        assert_eq!(constraints[0].rhs.constant(), 4.0);
        assert_eq!(terms(&constraints[1].lhs), vec![term(-1.0, Some("y"))]);
        assert_eq!(constraints[1].relation, Relation::Ge);
        assert_eq!(constraints[1].rhs.constant(), -3.0);
    }

    #[test]
    fn test_semicolons_and_variables_on_both_sides() {
        let program = Parser::parse("max x + y; x <= y + 2; y = 3").unwrap();
        let constraints: Vec<_> = program.constraints().collect();
        assert_eq!(constraints.len(), 2);
        assert_eq!(
            terms(&constraints[0].rhs),
            vec![term(1.0, Some("y")), term(2.0, None)]
        );
        assert_eq!(constraints[1].relation, Relation::Eq);
    }

    #[test]
    fn test_missing_relation() {
        let err = Parser::parse("max x\nx + y 4").unwrap_err();
        match err {
            ParseError::UnexpectedToken { expected, found, .. } => {
                assert_eq!(expected, "<=, >= or =");
                assert_eq!(found, "'4'");
            }
            other => panic!("Expected unexpected token, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_garbage_on_line() {
        let err = Parser::parse("max x\nx <= 4 5").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { ref expected, .. } if expected == "end of statement"));
        assert_eq!(err.span(), Some(Span::new(13, 14)));
    }

    #[test]
    fn test_unexpected_eof() {
        assert_eq!(Parser::parse("max x\nx <=").unwrap_err(), ParseError::UnexpectedEof);
    }

    #[test]
    fn test_subject_requires_to() {
        assert!(Parser::parse("max x\nsubject x <= 1").is_err());
    }
}
