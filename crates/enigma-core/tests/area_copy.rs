//! Region copy (`mimic`) through the full parse and execute path.

mod common;

use common::{run, Call, RecordingWorld};
use enigma_core::world::{Area, CellState, Position, Positional, World};

fn seeded_world() -> RecordingWorld {
    let mut world = RecordingWorld::new();
    let blocks = [
        (Position::new(0, 0, 0), "stone"),
        (Position::new(1, 0, 0), "dirt"),
        (Position::new(0, 1, 0), "glass"),
        (Position::new(1, 1, 0), "gold_block"),
    ];
    for (pos, block) in blocks {
        world.inner.set_cell(0, pos, CellState::new(block)).unwrap();
    }
    world
        .inner
        .define_area("room", Area::new(0, Position::new(1, 1, 0), Position::new(0, 0, 0)));
    world
}

#[test]
fn test_mimic_copies_every_cell_and_saves_once() {
    let mut world = seeded_world();
    world
        .inner
        .define_position("copy", Positional::new(0, Position::new(5, 0, 0)));

    run("mimic 'room' 'copy'\n", &mut world);

    assert_eq!(world.writes().len(), 4);
    assert_eq!(world.saves(), 1);
    assert_eq!(world.calls.last(), Some(&Call::Save));

    let expected = [
        (Position::new(5, 0, 0), "stone"),
        (Position::new(6, 0, 0), "dirt"),
        (Position::new(5, 1, 0), "glass"),
        (Position::new(6, 1, 0), "gold_block"),
    ];
    for (pos, block) in expected {
        assert_eq!(world.cell(0, pos).unwrap().block(), block, "at {}", pos);
    }
    // Source is untouched.
    assert_eq!(world.cell(0, Position::new(0, 0, 0)).unwrap().block(), "stone");
}

#[test]
fn test_mimic_into_other_dimension() {
    let mut world = seeded_world();
    world
        .inner
        .define_position("nether", Positional::new(-1, Position::new(10, 64, 10)));

    run("mimic 'room' 'nether'\n", &mut world);

    assert_eq!(world.cell(-1, Position::new(10, 64, 10)).unwrap().block(), "stone");
    assert_eq!(world.cell(-1, Position::new(11, 65, 10)).unwrap().block(), "gold_block");
    assert_eq!(world.cell(0, Position::new(10, 64, 10)).unwrap(), CellState::air());
    assert_eq!(world.saves(), 1);
}

#[test]
fn test_mimic_with_areas_defined_by_rules() {
    let mut world = seeded_world();
    let source = "\
create area 'pillar' 0 0 0 0 1 0 0
create position 'beside' 3 0 0 0
mimic 'pillar' 'beside'
";
    run(source, &mut world);

    assert_eq!(world.cell(0, Position::new(3, 0, 0)).unwrap().block(), "stone");
    assert_eq!(world.cell(0, Position::new(3, 1, 0)).unwrap().block(), "glass");
    assert_eq!(world.writes().len(), 2);
    assert_eq!(world.saves(), 3);
}

#[test]
fn test_mimic_unknown_area_fails_without_writes() {
    let mut world = seeded_world();
    world
        .inner
        .define_position("copy", Positional::new(0, Position::new(5, 0, 0)));

    let program = common::program("log 'before'\nmimic 'attic' 'copy'\n");
    let mut ctx = enigma_core::context::ExecutionContext::new(&mut world);
    let err = program.execute(&mut ctx).unwrap_err();
    assert_eq!(err.line, 2);
    assert_eq!(err.kind, enigma_core::error::ErrorKind::UnresolvedReference);
    drop(ctx);

    assert!(world.writes().is_empty());
    assert_eq!(world.saves(), 0);
}

#[test]
fn test_mimic_at_coordinate_extremes() {
    let mut world = RecordingWorld::new();
    world
        .inner
        .set_cell(0, Position::new(i32::MAX, 0, 0), CellState::new("obsidian"))
        .unwrap();
    let source = "\
create area 'edge' 2147483647 0 0 2147483647 0 0 0
create position 'far' -2147483648 0 0 0
mimic 'edge' 'far'
";
    run(source, &mut world);

    assert_eq!(world.cell(0, Position::new(i32::MIN, 0, 0)).unwrap().block(), "obsidian");
    assert_eq!(world.writes().len(), 1);
}

#[test]
fn test_mimic_past_coordinate_range_fails_without_writes() {
    let mut world = seeded_world();
    let program = common::program("create position 'rim' 2147483647 0 0 0\nmimic 'room' 'rim'\n");
    let mut ctx = enigma_core::context::ExecutionContext::new(&mut world);
    let err = program.execute(&mut ctx).unwrap_err();
    assert_eq!(err.line, 2);
    assert_eq!(err.kind, enigma_core::error::ErrorKind::Arithmetic);
    drop(ctx);

    assert!(world.writes().is_empty());
    assert_eq!(world.saves(), 1);
}

#[test]
fn test_mimic_onto_itself_shifted_keeps_source_content() {
    let mut world = seeded_world();
    world
        .inner
        .define_position("up", Positional::new(0, Position::new(0, 1, 0)));

    run("mimic 'room' 'up'\n", &mut world);

    assert_eq!(world.cell(0, Position::new(0, 1, 0)).unwrap().block(), "stone");
    assert_eq!(world.cell(0, Position::new(1, 1, 0)).unwrap().block(), "dirt");
    assert_eq!(world.cell(0, Position::new(0, 2, 0)).unwrap().block(), "glass");
    assert_eq!(world.cell(0, Position::new(1, 2, 0)).unwrap().block(), "gold_block");
    assert_eq!(world.writes().len(), 4);
    assert_eq!(world.saves(), 1);
}
