//! Parse-time and run-time contexts for rule files.

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use crate::error::EvalError;
use crate::expression::{Env, Expression, ExpressionContext, Function};
use crate::value::Value;
use crate::world::World;

/// Ambient variable names every rule file may use.
pub const DEFAULT_VARIABLES: &[&str] = &["player", "event"];

/// The standard identifier catalogue for rule files.
///
/// Variables are declared up front and bound per execution request; reading
/// one that the host did not bind fails at run time. Functions:
///
/// - `state(name)`: the current value of a progress state, or `null`
/// - `str(x)`: `x` as a string
/// - `int(x)`: `x` as an integer (strings are parsed)
/// - `len(s)`: length of a string in characters
#[derive(Debug, Clone)]
pub struct RuleContext {
    variables: BTreeSet<String>,
}

impl Default for RuleContext {
    fn default() -> Self {
        Self {
            variables: DEFAULT_VARIABLES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares additional ambient variables.
    pub fn with_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(String::as_str)
    }
}

fn state_fn(env: &dyn Env, name: Value) -> Result<Value, EvalError> {
    Ok(env.state(&name.as_string()).unwrap_or(Value::Null))
}

fn str_fn(_env: &dyn Env, value: Value) -> Result<Value, EvalError> {
    Ok(Value::Str(value.as_string()))
}

fn int_fn(_env: &dyn Env, value: Value) -> Result<Value, EvalError> {
    value.parse_int().map(Value::Int)
}

fn len_fn(_env: &dyn Env, value: Value) -> Result<Value, EvalError> {
    match value {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(EvalError::TypeMismatch(format!("len expects a string, got {}", other.kind()))),
    }
}

impl ExpressionContext for RuleContext {
    fn is_variable(&self, name: &str) -> bool {
        self.variables.contains(name)
    }

    fn variable(&self, name: &str) -> Option<Expression> {
        self.is_variable(name).then(|| Expression::Variable(name.to_string()))
    }

    fn is_function(&self, name: &str) -> bool {
        self.function(name).is_some()
    }

    fn function(&self, name: &str) -> Option<Function> {
        match name {
            "state" => Some(state_fn as Function),
            "str" => Some(str_fn as Function),
            "int" => Some(int_fn as Function),
            "len" => Some(len_fn as Function),
            _ => None,
        }
    }
}

/// Everything one top-level execution request needs.
///
/// Borrows the world for its lifetime, so a world can only be driven by one
/// request at a time.
pub struct ExecutionContext<'w> {
    world: &'w mut dyn World,
    variables: HashMap<String, Value>,
    run_id: Uuid,
}

impl<'w> ExecutionContext<'w> {
    pub fn new(world: &'w mut dyn World) -> Self {
        Self {
            world,
            variables: HashMap::new(),
            run_id: Uuid::new_v4(),
        }
    }

    /// Binds a runtime variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bind(name, value);
        self
    }

    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn world(&self) -> &dyn World {
        &*self.world
    }

    pub fn world_mut(&mut self) -> &mut dyn World {
        &mut *self.world
    }

    /// Evaluates an expression against this context.
    pub fn eval(&self, expr: &Expression) -> Result<Value, EvalError> {
        expr.eval(self)
    }
}

impl Env for ExecutionContext<'_> {
    fn variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    fn state(&self, name: &str) -> Option<Value> {
        self.world.state(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parse_complete;
    use crate::memory::MemoryWorld;

    #[test]
    fn test_rule_context_variables() {
        let ctx = RuleContext::new().with_variables(["dimension"]);
        assert!(ctx.is_variable("player"));
        assert!(ctx.is_variable("dimension"));
        assert!(!ctx.is_variable("nobody"));
        assert!(ctx.is_function("state"));
        assert!(!ctx.is_function("player"));
    }

    #[test]
    fn test_functions_against_world() {
        let mut world = MemoryWorld::new();
        world.set_state("door", Value::from("open"));
        let exec = ExecutionContext::new(&mut world).with_variable("player", "Steve");

        let rules = RuleContext::new();
        let expr = parse_complete("state('door') + ' for ' + player", &rules).unwrap();
        assert_eq!(exec.eval(&expr).unwrap(), Value::from("open for Steve"));

        let expr = parse_complete("state('missing') == null", &rules).unwrap();
        assert_eq!(exec.eval(&expr).unwrap(), Value::Bool(true));

        let expr = parse_complete("int('41') + 1", &rules).unwrap();
        assert_eq!(exec.eval(&expr).unwrap(), Value::Int(42));

        let expr = parse_complete("len(str(12345))", &rules).unwrap();
        assert_eq!(exec.eval(&expr).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_unbound_variable_fails_at_runtime() {
        let mut world = MemoryWorld::new();
        let exec = ExecutionContext::new(&mut world);
        let expr = parse_complete("event", &RuleContext::new()).unwrap();
        assert!(matches!(exec.eval(&expr), Err(EvalError::UnresolvedReference(_))));
    }

    #[test]
    fn test_unknown_identifier_fails_at_parse() {
        assert!(parse_complete("door", &RuleContext::new()).is_err());
        assert!(parse_complete("launch(1)", &RuleContext::new()).is_err());
    }

    #[test]
    fn test_len_type_mismatch() {
        let mut world = MemoryWorld::new();
        let exec = ExecutionContext::new(&mut world);
        let expr = parse_complete("len(3)", &RuleContext::new()).unwrap();
        assert!(matches!(exec.eval(&expr), Err(EvalError::TypeMismatch(_))));
    }
}
