mod error;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use enigma_core::action::Event;
use enigma_core::config::EnigmaConfig;
use enigma_core::context::{ExecutionContext, RuleContext};
use enigma_core::error::ExecutionError;
use enigma_core::expression::parse_complete;
use enigma_core::memory::MemoryWorld;
use enigma_core::program::Program;
use enigma_core::value::Value;

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "enigma", version, about = "Check, run and evaluate enigma rule files")]
struct Cli {
    /// Write logs to this file instead of stderr
    #[arg(long, global = true, env = "ENIGMA_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Log at info level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a rule file and print its scope tree
    Check {
        /// Path to the rule file
        file: PathBuf,
    },
    /// Execute a rule file against an in-memory world
    Run {
        /// Path to the rule file
        file: PathBuf,
        /// Progress snapshot to load and save (created if missing)
        #[arg(long, env = "ENIGMA_STATE")]
        state: Option<PathBuf>,
        /// Event to fire after the top-level actions ran (repeatable)
        #[arg(short, long = "event")]
        events: Vec<Event>,
        /// Runtime variable binding, `name=value` (repeatable)
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, Value)>,
        /// Print all progress states as JSON when done
        #[arg(long)]
        print_state: bool,
    },
    /// Evaluate a single expression
    Eval {
        /// Expression text
        expression: String,
        /// Progress snapshot providing `state(...)` values
        #[arg(long, env = "ENIGMA_STATE")]
        state: Option<PathBuf>,
        /// Runtime variable binding, `name=value` (repeatable)
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, Value)>,
    },
}

/// Parses `name=value`. Integers and booleans keep their type; anything else
/// is a string.
fn parse_var(s: &str) -> Result<(String, Value), String> {
    let (name, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", s))?;
    if name.is_empty() {
        return Err(format!("missing variable name in '{}'", s));
    }
    let value = match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => raw.parse::<i64>().map(Value::Int).unwrap_or_else(|_| Value::from(raw)),
    };
    Ok((name.to_string(), value))
}

fn init_tracing(log_file: Option<&Path>, verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "enigma.log".into());
            let file_appender = tracing_appender::rolling::never(dir, name);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(file_appender)
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref(), cli.verbose);

    let config = EnigmaConfig::load();
    debug!(?config, "loaded config");

    let result = match cli.command {
        Command::Check { file } => check(&config, &file),
        Command::Run {
            file,
            state,
            events,
            vars,
            print_state,
        } => run(&config, &file, state, &events, vars, print_state),
        Command::Eval {
            expression,
            state,
            vars,
        } => eval(&config, &expression, state, vars),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

/// The rule context from config, with every `--var` name declared.
fn rule_context(config: &EnigmaConfig, vars: &[(String, Value)]) -> RuleContext {
    config
        .rule_context()
        .with_variables(vars.iter().map(|(name, _)| name.clone()))
}

fn open_world(config: &EnigmaConfig, state: Option<PathBuf>) -> Result<MemoryWorld, CliError> {
    match state.or_else(|| config.state_file.clone()) {
        Some(path) => Ok(MemoryWorld::load_or_new(path)?),
        None => Ok(MemoryWorld::new()),
    }
}

fn check(config: &EnigmaConfig, file: &Path) -> Result<(), CliError> {
    let path = config.resolve_rules_path(file);
    let program = Program::load(&path, &config.rule_context())?;
    print!("{}", program);
    println!("OK: {} top-level statements", program.root().len());
    Ok(())
}

fn run(
    config: &EnigmaConfig,
    file: &Path,
    state: Option<PathBuf>,
    events: &[Event],
    vars: Vec<(String, Value)>,
    print_state: bool,
) -> Result<(), CliError> {
    let path = config.resolve_rules_path(file);
    let program = Program::load(&path, &rule_context(config, &vars))?;
    let mut world = open_world(config, state)?;

    let result = {
        let mut ctx = ExecutionContext::new(&mut world);
        for (name, value) in vars {
            ctx.bind(name, value);
        }
        info!(run_id = %ctx.run_id(), file = %path.display(), "running rules");
        execute_all(&program, events, &mut ctx)
    };

    for message in world.messages() {
        println!("{}", message);
    }
    result?;

    if print_state {
        let json = serde_json::to_string_pretty(world.states())
            .map_err(|e| CliError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        println!("{}", json);
    }
    Ok(())
}

fn execute_all(program: &Program, events: &[Event], ctx: &mut ExecutionContext) -> Result<(), CliError> {
    program.execute(ctx)?;
    for event in events {
        let handled = program.fire(*event, ctx)?;
        debug!(event = %event, handled, "event fired");
    }
    Ok(())
}

fn eval(
    config: &EnigmaConfig,
    expression: &str,
    state: Option<PathBuf>,
    vars: Vec<(String, Value)>,
) -> Result<(), CliError> {
    let expr = parse_complete(expression, &rule_context(config, &vars))
        .map_err(|e| CliError::Parse {
            message: e.to_string(),
            line: 1,
        })?;
    let mut world = open_world(config, state)?;
    let mut ctx = ExecutionContext::new(&mut world);
    for (name, value) in vars {
        ctx.bind(name, value);
    }
    let value = ctx
        .eval(&expr)
        .map_err(|e| CliError::Runtime(ExecutionError::from(e).at_line(1)))?;
    println!("{}", value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_types() {
        assert_eq!(parse_var("count=3").unwrap(), ("count".to_string(), Value::Int(3)));
        assert_eq!(parse_var("flag=true").unwrap().1, Value::Bool(true));
        assert_eq!(parse_var("player=Alex").unwrap().1, Value::from("Alex"));
        assert_eq!(parse_var("motd=a=b").unwrap().1, Value::from("a=b"));
    }

    #[test]
    fn test_parse_var_rejects_malformed() {
        assert!(parse_var("player").is_err());
        assert!(parse_var("=3").is_err());
    }

    #[test]
    fn test_exit_codes() {
        let parse: CliError = enigma_core::error::ParseError::new("bad", 1).into();
        assert_eq!(parse.exit_code(), 2);
        let io: CliError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(io.exit_code(), 4);
        let runtime: CliError = ExecutionError::type_mismatch("x").into();
        assert_eq!(runtime.exit_code(), 1);
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "enigma", "run", "castle.rules", "--event", "login", "-e", "activate", "--var", "player=Alex",
        ])
        .unwrap();
        match cli.command {
            Command::Run { events, vars, .. } => {
                assert_eq!(events, vec![Event::Login, Event::Activate]);
                assert_eq!(vars[0].0, "player");
            }
            _ => panic!("expected run"),
        }
    }
}
