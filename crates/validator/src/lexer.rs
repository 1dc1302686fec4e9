// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Token classification on top of the `sqlparser` tokenizer

use sqlgate_ir::Dialect;
use sqlparser::dialect::{MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::tokenizer::{Token, TokenWithSpan, Tokenizer, Whitespace};

use crate::error::{ValidationError, ValidationResult};

/// Words never treated as identifiers when unquoted
///
/// Clause and operator keywords, join words, window syntax, date parts used
/// by `EXTRACT`/`INTERVAL`, type words that can follow a cast, and the
/// statement verbs the gate refuses.
const RESERVED: &[&str] = &[
    // clauses
    "SELECT", "DISTINCT", "FROM", "WHERE", "GROUP", "BY", "HAVING", "ORDER", "LIMIT", "OFFSET",
    "FETCH", "FIRST", "NEXT", "ONLY", "ROWS", "ROW", "TIES", "PERCENT", "QUALIFY", "WINDOW",
    "UNION", "INTERSECT", "EXCEPT", "MINUS", "ASC", "DESC", "NULLS", "LAST", "AS", "INTO",
    "WITH", "RECURSIVE", "VALUES", "SET", "TABLE",
    // joins
    "JOIN", "STRAIGHT_JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "NATURAL",
    "LATERAL", "ON", "USING",
    // operators and predicates
    "AND", "OR", "NOT", "XOR", "IS", "IN", "LIKE", "ILIKE", "GLOB", "REGEXP", "RLIKE",
    "SIMILAR", "BETWEEN", "ESCAPE", "COLLATE", "EXISTS", "ANY", "SOME", "ALL", "DIV", "MOD",
    "NULL", "TRUE", "FALSE", "UNKNOWN",
    // expressions
    "CASE", "WHEN", "THEN", "ELSE", "END", "CAST", "INTERVAL", "ARRAY", "FILTER", "WITHIN",
    "SEPARATOR", "BOTH", "LEADING", "TRAILING", "FOR", "TO", "AT",
    // windows
    "OVER", "PARTITION", "RANGE", "GROUPS", "UNBOUNDED", "PRECEDING", "FOLLOWING", "CURRENT",
    "EXCLUDE",
    // niladic functions
    "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "CURRENT_USER", "SESSION_USER",
    "LOCALTIME", "LOCALTIMESTAMP",
    // date parts and type words
    "DATE", "TIME", "TIMESTAMP", "ZONE", "YEAR", "MONTH", "DAY", "HOUR", "MINUTE", "SECOND",
    "WEEK", "QUARTER", "EPOCH", "DOW", "DOY", "ISODOW", "DECADE", "CENTURY", "MILLISECOND",
    "MICROSECOND", "PRECISION", "VARYING", "UNSIGNED", "SIGNED",
    // statements
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "REPLACE", "MERGE",
    "EXEC", "EXECUTE", "GRANT", "REVOKE", "COMMIT", "ROLLBACK", "BEGIN", "PRAGMA", "ATTACH",
    "DETACH", "VACUUM", "EXPLAIN", "SHOW", "DESCRIBE", "CALL", "USE",
];

fn is_reserved(upper: &str) -> bool {
    RESERVED.contains(&upper)
}

/// A significant token, with whitespace and comments removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Lexeme {
    /// Reserved word, upper-cased
    Keyword(String),
    /// Identifier, lower-cased
    Ident(String),
    Number(String),
    Text,
    Param,
    Star,
    Comma,
    Period,
    LParen,
    RParen,
    Operator(String),
}

/// Run the `sqlparser` tokenizer for `dialect`, keeping each token's source span
pub(crate) fn tokenize_spanned(dialect: Dialect, sql: &str) -> ValidationResult<Vec<TokenWithSpan>> {
    let tokens = match dialect {
        Dialect::SQLite => Tokenizer::new(&SQLiteDialect {}, sql).tokenize_with_location(),
        Dialect::PostgreSQL => Tokenizer::new(&PostgreSqlDialect {}, sql).tokenize_with_location(),
        Dialect::MySQL => Tokenizer::new(&MySqlDialect {}, sql).tokenize_with_location(),
    };
    tokens.map_err(|e| ValidationError::parse(e.to_string()))
}

/// Run the `sqlparser` tokenizer for `dialect`
pub(crate) fn tokenize(dialect: Dialect, sql: &str) -> ValidationResult<Vec<Token>> {
    Ok(tokenize_spanned(dialect, sql)?
        .into_iter()
        .map(|t| t.token)
        .collect())
}

/// First token that is neither whitespace nor a comment
pub(crate) fn first_significant(tokens: &[Token]) -> Option<&Token> {
    tokens
        .iter()
        .find(|t| !matches!(t, Token::Whitespace(_) | Token::EOF))
}

/// Whether the text ends in a `--` (or `#`) comment, which would swallow appended text
pub(crate) fn ends_in_line_comment<'a, I>(tokens: I) -> bool
where
    I: IntoIterator<Item = &'a Token>,
    I::IntoIter: DoubleEndedIterator,
{
    let last = tokens.into_iter().rev().find(|t| {
        !matches!(
            t,
            Token::EOF
                | Token::Whitespace(Whitespace::Space)
                | Token::Whitespace(Whitespace::Newline)
                | Token::Whitespace(Whitespace::Tab)
        )
    });
    matches!(last, Some(Token::Whitespace(Whitespace::SingleLineComment { .. })))
}

/// How the DML gate names a token it refuses
pub(crate) fn describe_token(token: Option<&Token>) -> String {
    match token {
        Some(Token::Word(word)) => word.value.to_ascii_uppercase(),
        Some(other) => other.to_string(),
        None => "end of input".to_string(),
    }
}

/// Whether `token` is the unquoted `SELECT` keyword
pub(crate) fn is_select(token: &Token) -> bool {
    matches!(token, Token::Word(word) if word.quote_style.is_none() && word.value.eq_ignore_ascii_case("SELECT"))
}

/// Classify raw tokens into lexemes
///
/// # Errors
///
/// A statement separator is reported as `MultipleStatements`.
pub(crate) fn lex(tokens: &[Token]) -> ValidationResult<Vec<Lexeme>> {
    let mut lexemes: Vec<Lexeme> = Vec::with_capacity(tokens.len());

    for token in tokens {
        let lexeme = match token {
            Token::Whitespace(_) | Token::EOF => continue,
            Token::SemiColon => return Err(ValidationError::MultipleStatements),
            Token::Word(word) => {
                let after_period = matches!(lexemes.last(), Some(Lexeme::Period));
                let upper = word.value.to_ascii_uppercase();
                if word.quote_style.is_none() && !after_period && is_reserved(&upper) {
                    Lexeme::Keyword(upper)
                } else {
                    Lexeme::Ident(word.value.to_lowercase())
                }
            }
            Token::Number(n, _) => Lexeme::Number(n.clone()),
            Token::SingleQuotedString(_)
            | Token::DoubleQuotedString(_)
            | Token::NationalStringLiteral(_)
            | Token::EscapedStringLiteral(_)
            | Token::HexStringLiteral(_)
            | Token::DollarQuotedString(_) => Lexeme::Text,
            Token::Placeholder(_) => Lexeme::Param,
            Token::Mul => Lexeme::Star,
            Token::Comma => Lexeme::Comma,
            Token::Period => Lexeme::Period,
            Token::LParen => Lexeme::LParen,
            Token::RParen => Lexeme::RParen,
            other => Lexeme::Operator(other.to_string()),
        };
        lexemes.push(lexeme);
    }

    Ok(lexemes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_str(sql: &str) -> Vec<Lexeme> {
        lex(&tokenize(Dialect::SQLite, sql).unwrap()).unwrap()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let lexemes = lex_str("select Name FROM Orders");
        assert_eq!(
            lexemes,
            vec![
                Lexeme::Keyword("SELECT".to_string()),
                Lexeme::Ident("name".to_string()),
                Lexeme::Keyword("FROM".to_string()),
                Lexeme::Ident("orders".to_string()),
            ]
        );
    }

    #[test]
    fn test_word_after_period_is_identifier() {
        let lexemes = lex_str("SELECT t.year FROM t");
        assert_eq!(lexemes[3], Lexeme::Ident("year".to_string()));
    }

    #[test]
    fn test_quoted_reserved_word_is_identifier() {
        let lexemes = lex_str("SELECT \"Order\" FROM t");
        assert_eq!(lexemes[1], Lexeme::Ident("order".to_string()));
    }

    #[test]
    fn test_literals_and_comments_are_classified() {
        let lexemes = lex_str("SELECT 'x', 42 -- trailing\nFROM t /* block */");
        assert_eq!(lexemes[1], Lexeme::Text);
        assert_eq!(lexemes[3], Lexeme::Number("42".to_string()));
        assert_eq!(lexemes.len(), 6);
    }

    #[test]
    fn test_semicolon_is_multiple_statements() {
        let tokens = tokenize(Dialect::SQLite, "SELECT 1; SELECT 2").unwrap();
        assert_eq!(lex(&tokens), Err(ValidationError::MultipleStatements));
    }

    #[test]
    fn test_unterminated_string_is_parse_error() {
        let result = tokenize(Dialect::PostgreSQL, "SELECT 'open");
        assert!(matches!(result, Err(ValidationError::ParseError { .. })));
    }

    #[test]
    fn test_first_significant_skips_comments() {
        let tokens = tokenize(Dialect::MySQL, "  /* hi */ -- there\n select 1").unwrap();
        assert!(is_select(first_significant(&tokens).unwrap()));
        assert_eq!(describe_token(None), "end of input");
    }

    #[test]
    fn test_ends_in_line_comment() {
        let tokens = tokenize(Dialect::SQLite, "SELECT 1 -- note").unwrap();
        assert!(ends_in_line_comment(&tokens));
        let tokens = tokenize(Dialect::SQLite, "SELECT 1 /* note */").unwrap();
        assert!(!ends_in_line_comment(&tokens));
    }
}
