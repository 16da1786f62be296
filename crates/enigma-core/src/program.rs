//! Program builder: tokenized lines to a [`Scope`] tree.
//!
//! Nesting comes from indentation alone. A line ending in `:` opens a block
//! that collects every following line indented deeper than the opener, up to
//! the first line at the opener's indentation or less.

use std::fmt;
use std::path::Path;

use tracing::{debug, info_span};

use crate::action::{action_def, Action, ActionDef, Event, Scope};
use crate::context::ExecutionContext;
use crate::error::{ExecutionError, LoadError, ParseError};
use crate::expression::{Expression, ExpressionContext};
use crate::tokenizer::{tokenize, TokenizedLine};

/// A block whose body is still being collected.
struct OpenBlock {
    indentation: usize,
    line_number: usize,
    def: &'static ActionDef,
    parameters: Vec<Expression>,
    body: Scope,
}

impl OpenBlock {
    fn close(self) -> Result<Action, ParseError> {
        let kind = (self.def.build)(self.parameters, self.body).ok_or_else(|| arity_error(self.def, self.line_number))?;
        Ok(Action::new(self.line_number, kind))
    }
}

fn arity_error(def: &ActionDef, line: usize) -> ParseError {
    ParseError::new(format!("Wrong number of parameters for '{}'", def_name(def)), line)
}

fn def_name(def: &ActionDef) -> String {
    match def.secondary {
        Some(secondary) => format!("{} {}", def.main, secondary),
        None => def.main.to_string(),
    }
}

/// Pops the innermost open block and appends it to its parent.
fn close_innermost(stack: &mut Vec<OpenBlock>, root: &mut Scope) -> Result<(), ParseError> {
    if let Some(block) = stack.pop() {
        let action = block.close()?;
        match stack.last_mut() {
            Some(parent) => parent.body.push(action),
            None => root.push(action),
        }
    }
    Ok(())
}

/// Builds the scope tree for a sequence of tokenized lines.
///
/// The root scope sits at indentation -1, so every line at indentation 0 or
/// more belongs to it unless an open block claims it.
pub fn build(lines: Vec<TokenizedLine>) -> Result<Scope, ParseError> {
    let mut root = Scope::new();
    let mut stack: Vec<OpenBlock> = Vec::new();
    let mut previous: Option<(usize, bool)> = None;

    for line in lines {
        let indent = line.indentation;
        let unexpected = match previous {
            None => indent > 0,
            Some((prev_indent, opened)) => !opened && indent > prev_indent,
        };
        if unexpected {
            return Err(ParseError::new("unexpected indent", line.line_number));
        }

        while stack.last().is_some_and(|block| block.indentation >= indent) {
            close_innermost(&mut stack, &mut root)?;
        }

        let secondary = line.secondary_token.map(|t| t.name);
        let def = action_def(line.main_token.name, secondary)
            .ok_or_else(|| ParseError::new(format!("No action for '{}'", line.keyword()), line.line_number))?;

        match (def.opens_block, line.opens_block) {
            (true, false) => {
                return Err(ParseError::new(
                    format!("'{}' must open a block (missing ':')", line.keyword()),
                    line.line_number,
                ))
            }
            (false, true) => {
                return Err(ParseError::new(
                    format!("'{}' cannot open a block", line.keyword()),
                    line.line_number,
                ))
            }
            _ => {}
        }

        previous = Some((indent, line.opens_block));

        if def.opens_block {
            stack.push(OpenBlock {
                indentation: indent,
                line_number: line.line_number,
                def,
                parameters: line.parameters,
                body: Scope::new(),
            });
        } else {
            let kind = (def.build)(line.parameters, Scope::new()).ok_or_else(|| arity_error(def, line.line_number))?;
            let action = Action::new(line.line_number, kind);
            match stack.last_mut() {
                Some(parent) => parent.body.push(action),
                None => root.push(action),
            }
        }
    }

    while !stack.is_empty() {
        close_innermost(&mut stack, &mut root)?;
    }
    Ok(root)
}

/// A parsed rule file.
#[derive(Debug, Clone)]
pub struct Program {
    root: Scope,
}

impl Program {
    pub fn parse(source: &str, ctx: &dyn ExpressionContext) -> Result<Self, ParseError> {
        let lines = tokenize(source, ctx)?;
        let root = build(lines)?;
        debug!(actions = root.len(), "program built");
        Ok(Self { root })
    }

    pub fn load(path: impl AsRef<Path>, ctx: &dyn ExpressionContext) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse(&source, ctx)?)
    }

    pub fn root(&self) -> &Scope {
        &self.root
    }

    /// Runs the top-level actions in order. `on` handlers are skipped.
    pub fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        let span = info_span!("execute", run_id = %ctx.run_id());
        let _guard = span.enter();
        self.root.execute(ctx)
    }

    /// Runs every top-level handler for `event`. Returns how many ran.
    pub fn fire(&self, event: Event, ctx: &mut ExecutionContext) -> Result<usize, ExecutionError> {
        let span = info_span!("fire", run_id = %ctx.run_id(), event = %event);
        let _guard = span.enter();
        self.root.fire(event, ctx)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.root, f)
    }
}
