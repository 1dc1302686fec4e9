// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Row-count ceiling enforcement
//!
//! Row counts are rewritten in place on the token stream: the source text of
//! each oversized count token is replaced through its span, so comments
//! between `LIMIT` and its count are skipped and string literals are never
//! touched.

use sqlparser::tokenizer::{Location, Token, TokenWithSpan};

use crate::error::{ValidationError, ValidationResult};
use crate::lexer::ends_in_line_comment;
use crate::tree::Term;

fn is_count(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn exceeds(count: &str, ceiling: u64) -> bool {
    !matches!(count.parse::<u64>(), Ok(n) if n <= ceiling)
}

fn describe(term: Option<&Term>) -> String {
    match term {
        Some(Term::Name(parts)) => format!("'{}'", parts.join(".")),
        Some(Term::Keyword(k)) => format!("'{k}'"),
        Some(Term::Number(n)) => format!("'{n}'"),
        Some(Term::Text) => "a string literal".to_string(),
        Some(Term::Param) => "a parameter".to_string(),
        Some(Term::Group(_)) => "a parenthesized expression".to_string(),
        Some(_) => "an operator".to_string(),
        None => "end of input".to_string(),
    }
}

/// Whether the statement has its own top-level `LIMIT`
///
/// # Errors
///
/// `ParseError` if a top-level `LIMIT` is not followed by a row count or `ALL`.
fn has_top_level_limit(terms: &[Term]) -> ValidationResult<bool> {
    let mut found = false;

    for (i, term) in terms.iter().enumerate() {
        if !term.is_keyword("LIMIT") {
            continue;
        }
        found = true;

        let operand_ok = match (terms.get(i + 1), terms.get(i + 2), terms.get(i + 3)) {
            (Some(Term::Number(offset)), Some(Term::Comma), count) => {
                is_count(offset) && matches!(count, Some(Term::Number(n)) if is_count(n))
            }
            (Some(Term::Number(count)), _, _) => is_count(count),
            (Some(t), _, _) => t.is_keyword("ALL"),
            (None, _, _) => false,
        };
        if !operand_ok {
            return Err(ValidationError::parse(format!(
                "LIMIT requires a non-negative integer row count, found {}",
                describe(terms.get(i + 1))
            )));
        }
    }

    Ok(found)
}

/// Byte offsets of each line start, for turning token locations into offsets
struct LineIndex<'a> {
    sql: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(sql: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(sql.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { sql, starts }
    }

    /// Byte offset of a 1-based line/column location
    fn offset(&self, location: Location) -> usize {
        let Some(&start) = usize::try_from(location.line)
            .ok()
            .and_then(|line| self.starts.get(line.saturating_sub(1)))
        else {
            return self.sql.len();
        };
        let column = usize::try_from(location.column).unwrap_or(usize::MAX);
        self.sql[start..]
            .char_indices()
            .nth(column.saturating_sub(1))
            .map_or(self.sql.len(), |(i, _)| start + i)
    }
}

fn is_word(token: &Token, keyword: &str) -> bool {
    matches!(token, Token::Word(word) if word.quote_style.is_none() && word.value.eq_ignore_ascii_case(keyword))
}

/// Row-count tokens that must be replaced by the ceiling
///
/// Covers `LIMIT n`, MySQL's `LIMIT offset, n` and `LIMIT ALL`, at any depth.
fn oversized_counts<'t>(tokens: &'t [TokenWithSpan], ceiling: u64) -> Vec<&'t TokenWithSpan> {
    let significant: Vec<&TokenWithSpan> = tokens
        .iter()
        .filter(|t| !matches!(t.token, Token::Whitespace(_) | Token::EOF))
        .collect();

    let mut found = Vec::new();
    for (i, limit) in significant.iter().enumerate() {
        if !is_word(&limit.token, "LIMIT") {
            continue;
        }

        let count = match (significant.get(i + 1), significant.get(i + 2), significant.get(i + 3)) {
            (Some(first), Some(comma), Some(second))
                if matches!(first.token, Token::Number(..))
                    && matches!(comma.token, Token::Comma)
                    && matches!(second.token, Token::Number(..)) =>
            {
                Some(*second)
            }
            (Some(first), _, _) => Some(*first),
            (None, _, _) => None,
        };

        let oversized = count.filter(|t| match &t.token {
            Token::Number(n, _) => exceeds(n, ceiling),
            other => is_word(other, "ALL"),
        });
        found.extend(oversized);
    }
    found
}

/// Clamp every row count above `ceiling` and append one if the statement has none
pub(crate) fn enforce(
    sql: &str,
    tokens: &[TokenWithSpan],
    terms: &[Term],
    ceiling: u64,
) -> ValidationResult<String> {
    let has_limit = has_top_level_limit(terms)?;

    let index = LineIndex::new(sql);
    let mut clamped = String::with_capacity(sql.len() + 16);
    let mut cursor = 0;
    for count in oversized_counts(tokens, ceiling) {
        let start = index.offset(count.span.start);
        let end = index.offset(count.span.end);
        if start < cursor || end < start {
            continue;
        }
        clamped.push_str(&sql[cursor..start]);
        clamped.push_str(&ceiling.to_string());
        cursor = end;
    }
    clamped.push_str(&sql[cursor..]);

    if has_limit {
        return Ok(clamped);
    }

    let separator = if ends_in_line_comment(tokens.iter().map(|t| &t.token)) {
        "\n"
    } else {
        " "
    };
    Ok(format!("{clamped}{separator}LIMIT {ceiling}"))
}
