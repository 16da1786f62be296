//! Executable rule statements.
//!
//! Every statement line becomes an [`Action`] whose [`ActionKind`] is picked
//! from the `(main, secondary)` keyword pair through [`action_def`]. Block
//! statements (`on`, `if`) own a child [`Scope`]. Actions never change after
//! construction; all mutable state lives in the [`World`](crate::world::World)
//! reached through the [`ExecutionContext`].

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::context::ExecutionContext;
use crate::error::{ExecutionError, EvalError};
use crate::expression::Expression;
use crate::value::Value;
use crate::world::{Area, CellState, ItemSpec, MobSpec, Position, Positional};

/// Events an `on` block can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Init,
    Activate,
    Login,
}

impl Event {
    pub const ALL: [Event; 3] = [Event::Init, Event::Activate, Event::Login];

    pub fn name(&self) -> &'static str {
        match self {
            Event::Init => "init",
            Event::Activate => "activate",
            Event::Login => "login",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Event {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            let names: Vec<_> = Self::ALL.iter().map(Event::name).collect();
            format!("unknown event '{}' (expected one of: {})", s, names.join(", "))
        })
    }
}

/// What an action does, with its bound parameter expressions.
#[derive(Debug, Clone)]
pub enum ActionKind {
    On { event: Event, body: Scope },
    If { condition: Expression, body: Scope },
    /// Declares a progress state with a default; existing values win.
    State { name: Expression, value: Expression },
    SetState { name: Expression, value: Expression },
    Message { text: Expression },
    Log { text: Expression },
    CreateMob { name: Expression, mob: Expression, hp: Expression, item: Expression },
    CreateItem { name: Expression, item: Expression, count: Expression },
    CreatePosition { name: Expression, coords: [Expression; 3], dimension: Expression },
    CreateArea {
        name: Expression,
        from: [Expression; 3],
        to: [Expression; 3],
        dimension: Expression,
    },
    SetBlock { position: Expression, block: Expression },
    Mimic { area: Expression, destination: Expression },
}

impl ActionKind {
    /// The statement keywords, as written in source.
    pub fn keyword(&self) -> &'static str {
        match self {
            ActionKind::On { event, .. } => match event {
                Event::Init => "on init",
                Event::Activate => "on activate",
                Event::Login => "on login",
            },
            ActionKind::If { .. } => "if",
            ActionKind::State { .. } => "state",
            ActionKind::SetState { .. } => "setstate",
            ActionKind::Message { .. } => "message",
            ActionKind::Log { .. } => "log",
            ActionKind::CreateMob { .. } => "create mob",
            ActionKind::CreateItem { .. } => "create item",
            ActionKind::CreatePosition { .. } => "create position",
            ActionKind::CreateArea { .. } => "create area",
            ActionKind::SetBlock { .. } => "setblock",
            ActionKind::Mimic { .. } => "mimic",
        }
    }

    /// Parameter expressions in source order.
    pub fn parameters(&self) -> Vec<&Expression> {
        match self {
            ActionKind::On { .. } => Vec::new(),
            ActionKind::If { condition, .. } => vec![condition],
            ActionKind::State { name, value } | ActionKind::SetState { name, value } => vec![name, value],
            ActionKind::Message { text } | ActionKind::Log { text } => vec![text],
            ActionKind::CreateMob { name, mob, hp, item } => vec![name, mob, hp, item],
            ActionKind::CreateItem { name, item, count } => vec![name, item, count],
            ActionKind::CreatePosition { name, coords, dimension } => {
                let mut params = vec![name];
                params.extend(coords.iter());
                params.push(dimension);
                params
            }
            ActionKind::CreateArea { name, from, to, dimension } => {
                let mut params = vec![name];
                params.extend(from.iter().chain(to.iter()));
                params.push(dimension);
                params
            }
            ActionKind::SetBlock { position, block } => vec![position, block],
            ActionKind::Mimic { area, destination } => vec![area, destination],
        }
    }

    pub fn body(&self) -> Option<&Scope> {
        match self {
            ActionKind::On { body, .. } | ActionKind::If { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// One statement of a rule file.
#[derive(Debug, Clone)]
pub struct Action {
    /// One-based source line.
    pub line: usize,
    pub kind: ActionKind,
}

impl Action {
    pub fn new(line: usize, kind: ActionKind) -> Self {
        Self { line, kind }
    }

    /// Runs the action. Errors carry this action's line unless a nested
    /// action already set one.
    pub fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        debug!(line = self.line, action = self.kind.keyword(), "executing");
        self.run(ctx).map_err(|e| e.at_line(self.line))
    }

    fn run(&self, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        let line = self.line;
        match &self.kind {
            ActionKind::On { event, .. } => {
                debug!(line, event = %event, "handler registered");
            }
            ActionKind::If { condition, body } => {
                if ctx.eval(condition)?.is_truthy() {
                    body.execute(ctx)?;
                }
            }
            ActionKind::State { name, value } => {
                let name = eval_string(ctx, name)?;
                if ctx.world().state(&name).is_none() {
                    let value = ctx.eval(value)?;
                    debug!(line, state = %name, value = %value, "state declared");
                    ctx.world_mut().set_state(&name, value);
                    ctx.world_mut().save()?;
                }
            }
            ActionKind::SetState { name, value } => {
                let name = eval_string(ctx, name)?;
                let value = ctx.eval(value)?;
                debug!(line, state = %name, value = %value, "state set");
                ctx.world_mut().set_state(&name, value);
                ctx.world_mut().save()?;
            }
            ActionKind::Message { text } => {
                let text = eval_string(ctx, text)?;
                ctx.world_mut().message(&text);
            }
            ActionKind::Log { text } => {
                let text = eval_string(ctx, text)?;
                info!(line, run_id = %ctx.run_id(), "{}", text);
            }
            ActionKind::CreateMob { name, mob, hp, item } => {
                let spec = MobSpec {
                    name: eval_string(ctx, name)?,
                    mob: eval_string(ctx, mob)?,
                    hp: optional(ctx.eval(hp)?).map(|v| v.as_int()).transpose()?,
                    item: optional(ctx.eval(item)?).map(|v| v.as_string()),
                };
                info!(line, name = %spec.name, mob = %spec.mob, "creating mob");
                ctx.world_mut().create_mob(spec)?;
                ctx.world_mut().save()?;
            }
            ActionKind::CreateItem { name, item, count } => {
                let spec = ItemSpec {
                    name: eval_string(ctx, name)?,
                    item: eval_string(ctx, item)?,
                    count: ctx.eval(count)?.as_int()?,
                };
                info!(line, name = %spec.name, item = %spec.item, count = spec.count, "creating item");
                ctx.world_mut().create_item(spec)?;
                ctx.world_mut().save()?;
            }
            ActionKind::CreatePosition { name, coords, dimension } => {
                let name = eval_string(ctx, name)?;
                let positional = Positional::new(eval_coord(ctx, dimension)?, eval_position(ctx, coords)?);
                info!(line, name = %name, position = %positional.position, "defining position");
                ctx.world_mut().define_position(&name, positional);
                ctx.world_mut().save()?;
            }
            ActionKind::CreateArea { name, from, to, dimension } => {
                let name = eval_string(ctx, name)?;
                let area = Area::new(eval_coord(ctx, dimension)?, eval_position(ctx, from)?, eval_position(ctx, to)?);
                info!(line, name = %name, from = %area.bottom_left(), to = %area.top_right(), "defining area");
                ctx.world_mut().define_area(&name, area);
                ctx.world_mut().save()?;
            }
            ActionKind::SetBlock { position, block } => {
                let reference = ctx.eval(position)?;
                let block = CellState::new(eval_string(ctx, block)?);
                let target = ctx.world().resolve_positional(&reference)?;
                debug!(line, position = %target.position, block = %block, "setting block");
                let world = ctx.world_mut();
                world.set_cell(target.dimension, target.position, block)?;
                world.save()?;
            }
            ActionKind::Mimic { area, destination } => {
                let area = ctx.eval(area)?;
                let destination = ctx.eval(destination)?;
                let cells = mimic(ctx, &area, &destination)?;
                info!(line, cells, "area copied");
            }
        }
        Ok(())
    }
}

/// Copies every cell of the area named by `area` so that its bottom-left
/// corner lands on `destination`. Returns the number of cells copied.
///
/// Cells are copied one at a time unless the source and destination regions
/// overlap, in which case the whole source is read before anything is
/// written so the copy sees the original content. A destination that would
/// push any cell outside the coordinate range fails before the first write.
fn mimic(ctx: &mut ExecutionContext, area: &Value, destination: &Value) -> Result<usize, ExecutionError> {
    let world = ctx.world_mut();
    let source = world.resolve_area(area)?;
    let target = world.resolve_positional(destination)?;
    let origin = source.bottom_left();
    let moved = |pos: Position| {
        pos.translate(origin, target.position).ok_or_else(|| {
            EvalError::Arithmetic(format!(
                "copying area from {} to {} leaves the coordinate range",
                origin, target.position
            ))
        })
    };
    let landing = Area::new(target.dimension, target.position, moved(source.top_right())?);

    let mut cursor = source.iter();
    let copied = if source.intersects(&landing) {
        let mut cells = Vec::new();
        while cursor.advance() {
            let pos = cursor.current();
            cells.push((moved(pos)?, world.cell(cursor.dimension(), pos)?));
        }
        let copied = cells.len();
        for (pos, state) in cells {
            world.set_cell(target.dimension, pos, state)?;
        }
        copied
    } else {
        let mut copied = 0;
        while cursor.advance() {
            let pos = cursor.current();
            let state = world.cell(cursor.dimension(), pos)?;
            world.set_cell(target.dimension, moved(pos)?, state)?;
            copied += 1;
        }
        copied
    };
    world.save()?;
    Ok(copied)
}

fn eval_string(ctx: &ExecutionContext, expr: &Expression) -> Result<String, ExecutionError> {
    Ok(ctx.eval(expr)?.as_string())
}

fn eval_coord(ctx: &ExecutionContext, expr: &Expression) -> Result<i32, ExecutionError> {
    let n = ctx.eval(expr)?.as_int()?;
    i32::try_from(n).map_err(|_| EvalError::TypeMismatch(format!("coordinate {} out of range", n)).into())
}

fn eval_position(ctx: &ExecutionContext, coords: &[Expression; 3]) -> Result<Position, ExecutionError> {
    let [x, y, z] = coords;
    Ok(Position::new(eval_coord(ctx, x)?, eval_coord(ctx, y)?, eval_coord(ctx, z)?))
}

/// `null` means "not given" for optional parameters.
fn optional(value: Value) -> Option<Value> {
    (!value.is_null()).then_some(value)
}

/// An ordered list of actions; the body of a file or a block.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    actions: Vec<Action>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Runs every action in order, stopping at the first failure.
    pub fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        for action in &self.actions {
            action.execute(ctx)?;
        }
        Ok(())
    }

    /// Runs the bodies of this scope's `on <event>:` handlers in source order.
    ///
    /// Returns how many handlers ran.
    pub fn fire(&self, event: Event, ctx: &mut ExecutionContext) -> Result<usize, ExecutionError> {
        let mut handled = 0;
        for action in &self.actions {
            if let ActionKind::On { event: e, body } = &action.kind {
                if *e == event {
                    debug!(line = action.line, event = %event, "dispatching");
                    body.execute(ctx).map_err(|err| err.at_line(action.line))?;
                    handled += 1;
                }
            }
        }
        Ok(handled)
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        for action in &self.actions {
            write!(f, "{:>4} {:indent$}{}", action.line, "", action.kind.keyword(), indent = depth * 2)?;
            for param in action.kind.parameters() {
                write!(f, " {}", param)?;
            }
            match action.kind.body() {
                Some(body) => {
                    writeln!(f, ":")?;
                    body.fmt_tree(f, depth + 1)?;
                }
                None => writeln!(f)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

/// Builds an [`ActionKind`] from a statement's parameters and, for block
/// statements, its finished body. `None` means the parameter count was wrong.
pub type Constructor = fn(Vec<Expression>, Scope) -> Option<ActionKind>;

/// Registration entry tying a keyword pair to its constructor.
#[derive(Debug, Clone, Copy)]
pub struct ActionDef {
    pub main: &'static str,
    pub secondary: Option<&'static str>,
    /// Whether the statement must end with `:` and own a body.
    pub opens_block: bool,
    pub build: Constructor,
}

static ACTIONS: &[ActionDef] = &[
    ActionDef { main: "on", secondary: Some("init"), opens_block: true, build: on_init },
    ActionDef { main: "on", secondary: Some("activate"), opens_block: true, build: on_activate },
    ActionDef { main: "on", secondary: Some("login"), opens_block: true, build: on_login },
    ActionDef { main: "if", secondary: None, opens_block: true, build: build_if },
    ActionDef { main: "state", secondary: None, opens_block: false, build: build_state },
    ActionDef { main: "setstate", secondary: None, opens_block: false, build: build_setstate },
    ActionDef { main: "message", secondary: None, opens_block: false, build: build_message },
    ActionDef { main: "log", secondary: None, opens_block: false, build: build_log },
    ActionDef { main: "create", secondary: Some("mob"), opens_block: false, build: build_mob },
    ActionDef { main: "create", secondary: Some("item"), opens_block: false, build: build_item },
    ActionDef { main: "create", secondary: Some("position"), opens_block: false, build: build_position },
    ActionDef { main: "create", secondary: Some("area"), opens_block: false, build: build_area },
    ActionDef { main: "setblock", secondary: None, opens_block: false, build: build_setblock },
    ActionDef { main: "mimic", secondary: None, opens_block: false, build: build_mimic },
];

/// Looks up the action registered for a keyword pair.
pub fn action_def(main: &str, secondary: Option<&str>) -> Option<&'static ActionDef> {
    ACTIONS.iter().find(|def| def.main == main && def.secondary == secondary)
}

fn on_init(params: Vec<Expression>, body: Scope) -> Option<ActionKind> {
    params.is_empty().then_some(ActionKind::On { event: Event::Init, body })
}

fn on_activate(params: Vec<Expression>, body: Scope) -> Option<ActionKind> {
    params.is_empty().then_some(ActionKind::On { event: Event::Activate, body })
}

fn on_login(params: Vec<Expression>, body: Scope) -> Option<ActionKind> {
    params.is_empty().then_some(ActionKind::On { event: Event::Login, body })
}

fn build_if(params: Vec<Expression>, body: Scope) -> Option<ActionKind> {
    let [condition] = <[Expression; 1]>::try_from(params).ok()?;
    Some(ActionKind::If { condition, body })
}

fn build_state(params: Vec<Expression>, _: Scope) -> Option<ActionKind> {
    let [name, value] = <[Expression; 2]>::try_from(params).ok()?;
    Some(ActionKind::State { name, value })
}

fn build_setstate(params: Vec<Expression>, _: Scope) -> Option<ActionKind> {
    let [name, value] = <[Expression; 2]>::try_from(params).ok()?;
    Some(ActionKind::SetState { name, value })
}

fn build_message(params: Vec<Expression>, _: Scope) -> Option<ActionKind> {
    let [text] = <[Expression; 1]>::try_from(params).ok()?;
    Some(ActionKind::Message { text })
}

fn build_log(params: Vec<Expression>, _: Scope) -> Option<ActionKind> {
    let [text] = <[Expression; 1]>::try_from(params).ok()?;
    Some(ActionKind::Log { text })
}

fn build_mob(params: Vec<Expression>, _: Scope) -> Option<ActionKind> {
    let [name, mob, hp, item] = <[Expression; 4]>::try_from(params).ok()?;
    Some(ActionKind::CreateMob { name, mob, hp, item })
}

fn build_item(params: Vec<Expression>, _: Scope) -> Option<ActionKind> {
    let [name, item, count] = <[Expression; 3]>::try_from(params).ok()?;
    Some(ActionKind::CreateItem { name, item, count })
}

fn build_position(params: Vec<Expression>, _: Scope) -> Option<ActionKind> {
    let [name, x, y, z, dimension] = <[Expression; 5]>::try_from(params).ok()?;
    Some(ActionKind::CreatePosition {
        name,
        coords: [x, y, z],
        dimension,
    })
}

fn build_area(params: Vec<Expression>, _: Scope) -> Option<ActionKind> {
    let [name, x1, y1, z1, x2, y2, z2, dimension] = <[Expression; 8]>::try_from(params).ok()?;
    Some(ActionKind::CreateArea {
        name,
        from: [x1, y1, z1],
        to: [x2, y2, z2],
        dimension,
    })
}

fn build_setblock(params: Vec<Expression>, _: Scope) -> Option<ActionKind> {
    let [position, block] = <[Expression; 2]>::try_from(params).ok()?;
    Some(ActionKind::SetBlock { position, block })
}

fn build_mimic(params: Vec<Expression>, _: Scope) -> Option<ActionKind> {
    let [area, destination] = <[Expression; 2]>::try_from(params).ok()?;
    Some(ActionKind::Mimic { area, destination })
}
