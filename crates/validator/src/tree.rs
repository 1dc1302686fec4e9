// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Parenthesis grouping and dotted-name folding

use crate::error::{ValidationError, ValidationResult};
use crate::lexer::Lexeme;

/// A lexeme sequence folded into names and parenthesized groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Term {
    Keyword(String),
    /// Dotted identifier, e.g. `["public", "orders", "id"]`
    Name(Vec<String>),
    Star,
    /// `t.*`
    QualifiedStar(Vec<String>),
    Group(Vec<Term>),
    Comma,
    Number(String),
    Text,
    Param,
    Operator(String),
}

impl Term {
    pub(crate) fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Term::Keyword(k) if k == keyword)
    }

    /// Whether the group starts a query
    pub(crate) fn is_subquery(&self) -> bool {
        matches!(self, Term::Group(inner) if inner.first().is_some_and(|t| t.is_keyword("SELECT")))
    }
}

/// Fold `lexemes` into terms
///
/// # Errors
///
/// Returns `ParseError` on unbalanced parentheses or a dangling `.`.
pub(crate) fn group(lexemes: Vec<Lexeme>) -> ValidationResult<Vec<Term>> {
    let mut stack: Vec<Vec<Term>> = vec![Vec::new()];
    let mut iter = lexemes.into_iter().peekable();

    while let Some(lexeme) = iter.next() {
        let term = match lexeme {
            Lexeme::LParen => {
                stack.push(Vec::new());
                continue;
            }
            Lexeme::RParen => {
                let inner = match stack.pop() {
                    Some(inner) if !stack.is_empty() => inner,
                    _ => return Err(ValidationError::parse("Unbalanced parentheses: unexpected ')'")),
                };
                Term::Group(inner)
            }
            Lexeme::Ident(first) => {
                let mut parts = vec![first];
                let mut star = false;
                while iter.peek() == Some(&Lexeme::Period) {
                    iter.next();
                    match iter.next() {
                        Some(Lexeme::Ident(part)) => parts.push(part),
                        Some(Lexeme::Star) => {
                            star = true;
                            break;
                        }
                        _ => {
                            return Err(ValidationError::parse(format!(
                                "Expected a name after '{}.'",
                                parts.join(".")
                            )));
                        }
                    }
                }
                if star { Term::QualifiedStar(parts) } else { Term::Name(parts) }
            }
            Lexeme::Keyword(k) => Term::Keyword(k),
            Lexeme::Number(n) => Term::Number(n),
            Lexeme::Text => Term::Text,
            Lexeme::Param => Term::Param,
            Lexeme::Star => Term::Star,
            Lexeme::Comma => Term::Comma,
            Lexeme::Period => Term::Operator(".".to_string()),
            Lexeme::Operator(op) => Term::Operator(op),
        };

        if let Some(current) = stack.last_mut() {
            current.push(term);
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(top), true) => Ok(top),
        _ => Err(ValidationError::parse("Unbalanced parentheses: missing ')'")),
    }
}
