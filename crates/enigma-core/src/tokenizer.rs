//! Line tokenizer: raw source lines to [`TokenizedLine`]s.

use std::fmt;

use tracing::trace;

use crate::error::ParseError;
use crate::expression::{parse_expression, parse_term, Cursor, Expression, ExpressionContext, KeywordContext};
use crate::token::{registry, TokenDescriptor, TokenRegistry};

const TAB_WIDTH: usize = 8;

/// One statement line with its keywords resolved and parameters parsed.
#[derive(Debug, Clone)]
pub struct TokenizedLine {
    pub indentation: usize,
    /// One-based.
    pub line_number: usize,
    pub main_token: TokenDescriptor,
    pub secondary_token: Option<TokenDescriptor>,
    pub parameters: Vec<Expression>,
    pub opens_block: bool,
}

impl TokenizedLine {
    /// `create mob` style name of the statement.
    pub fn keyword(&self) -> String {
        match self.secondary_token {
            Some(secondary) => format!("{} {}", self.main_token.name, secondary.name),
            None => self.main_token.name.to_string(),
        }
    }
}

impl fmt::Display for TokenizedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4} [{}] {}", self.line_number, self.indentation, self.keyword())?;
        for param in &self.parameters {
            write!(f, " {}", param)?;
        }
        if self.opens_block {
            write!(f, ":")?;
        }
        Ok(())
    }
}

/// Width of the leading whitespace of a line.
///
/// A space adds one column. A tab sets the count to `(count + 8) % 8`, so a
/// tab at column 0 contributes nothing.
pub fn indentation(raw: &str) -> usize {
    raw.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .fold(0, |width, c| if c == '\t' { (width + TAB_WIDTH) % TAB_WIDTH } else { width + 1 })
}

/// Tokenizes one line against the process-wide keyword registry.
///
/// Returns `Ok(None)` for blank lines and `#` comments.
pub fn tokenize_line(
    raw: &str,
    line_number: usize,
    ctx: &dyn ExpressionContext,
) -> Result<Option<TokenizedLine>, ParseError> {
    tokenize_line_with(registry(), raw, line_number, ctx)
}

pub fn tokenize_line_with(
    registry: &TokenRegistry,
    raw: &str,
    line_number: usize,
    ctx: &dyn ExpressionContext,
) -> Result<Option<TokenizedLine>, ParseError> {
    let indentation = indentation(raw);
    let text = raw.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }

    let mut cursor = Cursor::new(text);

    let name = keyword(&mut cursor, line_number)?;
    let main_token = registry
        .main(&name)
        .ok_or_else(|| ParseError::new(format!("Unknown token '{}'", name), line_number))?;

    let mut parameter_count = main_token.parameter_count;
    let mut secondary_token = None;
    if main_token.has_secondary {
        let name = keyword(&mut cursor, line_number)?;
        let secondary = registry
            .secondary(&name)
            .ok_or_else(|| ParseError::new(format!("Unknown token '{}'", name), line_number))?;
        parameter_count = secondary.parameter_count;
        secondary_token = Some(secondary);
    }

    let mut parameters = Vec::with_capacity(parameter_count);
    for i in 0..parameter_count {
        let expr = parse_expression(&mut cursor, ctx).map_err(|e| {
            ParseError::new(
                format!(
                    "parameter {} of {} for '{}': {}",
                    i + 1,
                    parameter_count,
                    main_token.name,
                    e
                ),
                line_number,
            )
        })?;
        parameters.push(expr);
    }

    cursor.skip_whitespace();
    let rest = cursor.rest();
    let opens_block = match rest {
        "" => false,
        ":" => true,
        _ => {
            return Err(ParseError::new(
                format!("Unexpected input '{}' after parameters", rest),
                line_number,
            ))
        }
    };

    let line = TokenizedLine {
        indentation,
        line_number,
        main_token,
        secondary_token,
        parameters,
        opens_block,
    };
    trace!(line = line_number, statement = %line, "tokenized");
    Ok(Some(line))
}

/// Reads one keyword term and evaluates it to a name.
fn keyword(cursor: &mut Cursor, line_number: usize) -> Result<String, ParseError> {
    let expr = parse_term(cursor, &KeywordContext).map_err(|e| ParseError::syntax(e, line_number))?;
    let value = expr
        .eval(&())
        .map_err(|e| ParseError::new(format!("Invalid keyword: {}", e), line_number))?;
    Ok(value.as_string())
}

/// Tokenizes a whole source text, skipping blank and comment lines.
pub fn tokenize(source: &str, ctx: &dyn ExpressionContext) -> Result<Vec<TokenizedLine>, ParseError> {
    let mut lines = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        if let Some(line) = tokenize_line(raw, index + 1, ctx)? {
            lines.push(line);
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::EmptyContext;
    use crate::value::Value;

    fn line(raw: &str) -> TokenizedLine {
        tokenize_line(raw, 1, &EmptyContext).unwrap().unwrap()
    }

    #[test]
    fn test_indentation_spaces() {
        assert_eq!(indentation("message 'x'"), 0);
        assert_eq!(indentation("    message 'x'"), 4);
    }

    #[test]
    fn test_indentation_tab_quirk() {
        assert_eq!(indentation("\tmessage 'x'"), 0);
        assert_eq!(indentation("\t message 'x'"), 1);
        assert_eq!(indentation("   \t  message 'x'"), 5);
        assert_eq!(indentation("        \tmessage 'x'"), 0);
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert!(tokenize_line("", 1, &EmptyContext).unwrap().is_none());
        assert!(tokenize_line("   \t ", 1, &EmptyContext).unwrap().is_none());
        assert!(tokenize_line("# a comment", 1, &EmptyContext).unwrap().is_none());
        assert!(tokenize_line("    # indented comment", 1, &EmptyContext).unwrap().is_none());
    }

    #[test]
    fn test_parameter_count_matches_token() {
        let l = line("setstate 'door' 1");
        assert_eq!(l.main_token.name, "setstate");
        assert_eq!(l.parameters.len(), 2);
        assert!(!l.opens_block);

        let l = line("create area 'vault' 0 0 0 1 1 1 0");
        assert_eq!(l.secondary_token.unwrap().name, "area");
        assert_eq!(l.parameters.len(), 8);
    }

    #[test]
    fn test_too_few_parameters() {
        let err = tokenize_line("setstate 'door'", 4, &EmptyContext).unwrap_err();
        assert_eq!(err.line, 4);
        assert!(err.message.contains("parameter 2 of 2"));
    }

    #[test]
    fn test_too_many_parameters() {
        let err = tokenize_line("message 'a' 'b'", 2, &EmptyContext).unwrap_err();
        assert!(err.message.contains("Unexpected input"));
    }

    #[test]
    fn test_unknown_tokens() {
        let err = tokenize_line("frobnicate 1", 7, &EmptyContext).unwrap_err();
        assert_eq!(err.message, "Unknown token 'frobnicate'");
        assert_eq!(err.line, 7);

        let err = tokenize_line("create dragon 'x'", 8, &EmptyContext).unwrap_err();
        assert_eq!(err.message, "Unknown token 'dragon'");
    }

    #[test]
    fn test_quoted_and_computed_keywords() {
        let l = line("'message' 'hi'");
        assert_eq!(l.main_token.name, "message");
        let l = line("('set' + 'state') 'door' 2");
        assert_eq!(l.main_token.name, "setstate");
    }

    #[test]
    fn test_block_marker() {
        let l = line("on init:");
        assert!(l.opens_block);
        assert_eq!(l.secondary_token.unwrap().name, "init");
        assert!(l.parameters.is_empty());

        let l = line("if 1 == 1 :");
        assert!(l.opens_block);
        assert_eq!(l.parameters.len(), 1);
        assert_eq!(l.parameters[0].eval(&()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_tokenize_source_numbers_lines() {
        let source = "# header\n\non init:\n  message 'hello'\n";
        let lines = tokenize(source, &EmptyContext).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line_number, 3);
        assert_eq!(lines[1].line_number, 4);
        assert_eq!(lines[1].indentation, 2);
    }

    #[test]
    fn test_first_source_line_is_line_one() {
        let lines = tokenize("message 'a'\n", &EmptyContext).unwrap();
        assert_eq!(lines[0].line_number, 1);
        let err = tokenize("log 'a'\nnope\n", &EmptyContext).unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_parenthesised_condition_keeps_subtraction() {
        let l = line("if (2 -1) > 0:");
        assert_eq!(l.parameters.len(), 1);
        assert!(l.opens_block);
        assert_eq!(l.parameters[0].eval(&()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_display() {
        let l = line("  if 2 > 1:");
        assert_eq!(l.to_string(), "   1 [2] if (2 > 1):");
    }
}
