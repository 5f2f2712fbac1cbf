//! Whole-program scenarios run against both backends.

use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::ast::Setting;
use crate::backend::{Backend, BackendKind, load_backend};
use crate::catalog::BlockKind;
use crate::context::{Collision, HeadlessContext};
use crate::hir::{NodeId, Program};
use crate::layout::{Direction, Footprint, TerminalDecl, BEFORE};
use crate::storage::{StateStore, VariableStore};
use crate::testing::{GraphBuilder, custom_block_fixture};
use crate::types::{ObjectId, Pointer, SignalType, Value};

#[derive(Debug, Clone, PartialEq)]
struct Outcome {
    log: Vec<String>,
    vars: VariableStore,
    slots: StateStore,
}

fn start(kind: BackendKind, program: &Program, ctx: HeadlessContext) -> Box<dyn Backend> {
    load_backend(kind, Arc::new(program.clone()), Box::new(ctx)).expect("backend")
}

fn advance(backend: &mut dyn Backend, frames: u32) {
    for _ in 0..frames {
        let late = backend.run_frame().expect("run frame");
        backend.run_late_update(late).expect("late update");
    }
}

fn run(kind: BackendKind, program: &Program, ctx: HeadlessContext, frames: u32) -> Outcome {
    let log = ctx.log();
    let mut backend = start(kind, program, ctx);
    advance(backend.as_mut(), frames);
    Outcome {
        log: log.lines(),
        vars: backend.variables().clone(),
        slots: backend.state().clone(),
    }
}

/// Run on both backends, assert they agree, and return the shared outcome.
fn run_both(program: &Program, ctx: impl Fn() -> HeadlessContext, frames: u32) -> Outcome {
    let interpreted = run(BackendKind::Interpreter, program, ctx(), frames);
    let compiled = run(BackendKind::Compiled, program, ctx(), frames);
    assert_eq!(interpreted.log, compiled.log);
    assert_eq!(interpreted.vars, compiled.vars);
    assert_eq!(interpreted.slots, compiled.slots);
    interpreted
}

fn count(log: &[String], call: &str) -> usize {
    let prefix = format!("{call}(");
    log.iter().filter(|line| line.starts_with(&prefix)).count()
}

fn variable(program: &Program, outcome: &Outcome, name: &str) -> Value {
    let var = program
        .find_variable(name, SignalType::Float)
        .expect("variable declared");
    outcome.vars.get(Pointer { var, index: 0 })
}

#[test]
fn disconnected_operands_use_defaults() {
    let mut g = GraphBuilder::new();
    let negate = g.node(BlockKind::Negate);
    let and = g.node(BlockKind::And);
    let show_number = g.node(BlockKind::Inspect(SignalType::Float));
    let show_truth = g.node(BlockKind::Inspect(SignalType::Bool));
    g.wire(negate, "-Num", show_number, "Number");
    g.wire(and, "And", show_truth, "Truth");
    g.flow(show_number, "After", show_truth);
    let program = g.build().expect("program");

    let outcome = run_both(&program, || HeadlessContext::new(0), 1);
    assert_eq!(outcome.log.len(), 2);
    assert!(outcome.log[0].starts_with("inspect_value(Float(-0.0), float"));
    assert!(outcome.log[1].starts_with("inspect_value(Bool(false), bool"));
}

#[test]
fn shared_random_draw_happens_once_per_frame() {
    let mut g = GraphBuilder::new();
    let score = g.node(BlockKind::SetScore);
    let random = g.node(BlockKind::Random);
    g.wire(random, "Random", score, "Score");
    g.wire(random, "Random", score, "Coins");
    let program = g.build().expect("program");
    assert_eq!(program.memo_points.len(), 1);

    let outcome = run_both(&program, || HeadlessContext::new(3), 3);
    assert_eq!(count(&outcome.log, "get_random_value"), 3);
    assert_eq!(count(&outcome.log, "set_score"), 3);
    // both inputs saw the same draw
    for line in outcome.log.iter().filter(|line| line.starts_with("set_score(")) {
        let args = line.trim_start_matches("set_score(");
        let mut parts = args.split(", ");
        assert_eq!(parts.next(), parts.next());
    }
}

#[test]
fn single_consumer_evaluates_inline() {
    let mut g = GraphBuilder::new();
    let score = g.node(BlockKind::SetScore);
    let random = g.node(BlockKind::Random);
    g.wire(random, "Random", score, "Score");
    let program = g.build().expect("program");
    assert!(program.memo_points.is_empty());

    let outcome = run_both(&program, || HeadlessContext::new(3), 2);
    assert_eq!(count(&outcome.log, "get_random_value"), 2);
}

#[test]
fn variable_sum_is_inspected_once_and_stored() {
    let mut g = GraphBuilder::new();
    let set_x = g.set_variable("x", SignalType::Float);
    let five = g.number(5.0);
    let get_x = g.get_variable("x", SignalType::Float);
    let three = g.number(3.0);
    let add = g.node(BlockKind::AddNumbers);
    let inspect = g.node(BlockKind::Inspect(SignalType::Float));
    let set_y = g.set_variable("y", SignalType::Float);
    g.wire(five, "Number", set_x, "Value");
    g.wire(get_x, "Variable", add, "Num1");
    g.wire(three, "Number", add, "Num2");
    g.wire(add, "Sum", inspect, "Number");
    g.wire(add, "Sum", set_y, "Value");
    g.flow(set_x, "After", inspect);
    g.flow(inspect, "After", set_y);
    let program = g.build().expect("program");
    assert_eq!(program.entry_points, vec![NodeId(set_x)]);

    let outcome = run_both(&program, || HeadlessContext::new(0), 1);
    let inspected: Vec<_> = outcome
        .log
        .iter()
        .filter(|line| line.starts_with("inspect_value("))
        .collect();
    assert_eq!(inspected.len(), 1);
    assert!(inspected[0].starts_with("inspect_value(Float(8.0)"));
    assert_eq!(variable(&program, &outcome, "y"), Value::Float(8.0));
}

#[test]
fn loop_counters_persist_and_stay_separate() {
    let mut g = GraphBuilder::new();
    let button = g.node(BlockKind::Button);
    let first = g.node(BlockKind::Loop);
    let three = g.number(3.0);
    g.wire(three, "Number", first, "Stop");
    g.flow(button, "Button", first);

    let second = g.node(BlockKind::Loop);
    let ten = g.number(10.0);
    let twelve = g.number(12.0);
    g.wire(ten, "Number", second, "Start");
    g.wire(twelve, "Number", second, "Stop");
    let program = g.build().expect("program");

    let first_slot = program
        .slot_of(NodeId(first), "counter")
        .expect("first counter");
    let second_slot = program
        .slot_of(NodeId(second), "counter")
        .expect("second counter");
    assert_ne!(first_slot, second_slot);

    // the button is only pressed during the first frame
    let one = run_both(&program, || HeadlessContext::new(0).script_button(0), 1);
    assert_eq!(one.slots.get(first_slot), Value::Float(2.0));
    assert_eq!(one.slots.get(second_slot), Value::Float(11.0));

    let three_frames = run_both(&program, || HeadlessContext::new(0).script_button(0), 3);
    assert_eq!(three_frames.slots.get(first_slot), Value::Float(2.0));
    assert_eq!(three_frames.slots.get(second_slot), Value::Float(11.0));
}

#[test]
fn loop_body_reads_the_counter() {
    let mut g = GraphBuilder::new();
    let looped = g.node(BlockKind::Loop);
    let four = g.number(4.0);
    let set_total = g.set_variable("total", SignalType::Float);
    let get_total = g.get_variable("total", SignalType::Float);
    let add = g.node(BlockKind::AddNumbers);
    g.wire(four, "Number", looped, "Stop");
    g.wire(get_total, "Variable", add, "Num1");
    g.wire(looped, "Counter", add, "Num2");
    g.wire(add, "Sum", set_total, "Value");
    g.flow(looped, "Do", set_total);
    let program = g.build().expect("program");

    let outcome = run_both(&program, || HeadlessContext::new(0), 2);
    // 0 + 1 + 2 + 3, twice
    assert_eq!(variable(&program, &outcome, "total"), Value::Float(12.0));
}

#[test]
fn custom_block_runs_its_inner_chain_once() {
    let (catalog, document, _, _) = custom_block_fixture();
    let program = crate::analysis::build_program(&catalog, &document).expect("program");
    let outcome = run_both(&program, || HeadlessContext::new(0), 1);
    assert_eq!(outcome.log, vec!["lose(0)".to_string(), "win(0)".to_string()]);
}

#[test]
fn custom_block_operands_cross_the_boundary() {
    let terminals = vec![
        TerminalDecl::new(SignalType::Float, Direction::In, "Value"),
        TerminalDecl::new(SignalType::Float, Direction::Out, "Doubled"),
    ];
    let mut inner = GraphBuilder::custom(9, Footprint::new(2, 2), true, terminals);
    let inspect = inner.node(BlockKind::Inspect(SignalType::Float));
    let multiply = inner.node(BlockKind::Multiply);
    let two = inner.number(2.0);
    inner.from_outside(BEFORE, inspect, BEFORE);
    inner.from_outside("Value", inspect, "Number");
    inner.from_outside("Value", multiply, "Num1");
    inner.wire(two, "Number", multiply, "Num2");
    inner.to_outside(multiply, "Product", "Doubled");

    let mut outer = GraphBuilder::new();
    let win = outer.node(BlockKind::Win);
    let four = outer.number(4.0);
    let custom = outer.add_custom(1001, inner);
    let shown = outer.node(BlockKind::Inspect(SignalType::Float));
    outer.wire(four, "Number", custom, "Value");
    outer.wire(custom, "Doubled", shown, "Number");
    outer.flow(win, "After", custom);
    outer.flow(custom, "After", shown);
    let program = outer.build().expect("program");

    let outcome = run_both(&program, || HeadlessContext::new(0), 1);
    assert_eq!(outcome.log.len(), 3);
    assert_eq!(outcome.log[0], "win(0)");
    assert!(outcome.log[1].starts_with("inspect_value(Float(4.0)"));
    assert!(outcome.log[2].starts_with("inspect_value(Float(8.0)"));
}

#[test]
fn late_update_runs_after_physics_with_frame_values() {
    let mut g = GraphBuilder::new();
    let late = g.node(BlockKind::LateUpdate);
    let inspect = g.node(BlockKind::Inspect(SignalType::Float));
    let score = g.node(BlockKind::SetScore);
    let random = g.node(BlockKind::Random);
    g.flow(late, "After Physics", inspect);
    g.wire(random, "Random", inspect, "Number");
    g.wire(random, "Random", score, "Score");
    let program = g.build().expect("program");

    let outcome = run_both(&program, || HeadlessContext::new(11), 2);
    // the late body reuses the frame's memoized draw
    assert_eq!(count(&outcome.log, "get_random_value"), 2);
    assert_eq!(count(&outcome.log, "inspect_value"), 2);
    let last = outcome.log.last().expect("log");
    assert!(last.starts_with("inspect_value("));
}

#[test]
fn backends_agree_on_a_mixed_program() {
    let mut g = GraphBuilder::new();

    // creation on the first frame, inspected through the statement's slot
    let play = g.node(BlockKind::PlaySensor);
    let create = g.node(BlockKind::CreateObject);
    let show_copy = g.node(BlockKind::Inspect(SignalType::Obj));
    g.flow(play, "On Play", create);
    g.flow(create, "After", show_copy);
    g.wire(create, "Copy", show_copy, "Object");

    // branch on a fresh draw every frame
    let branch = g.node(BlockKind::If);
    let greater = g.node(BlockKind::GreaterThan);
    let random = g.node(BlockKind::Random);
    let half = g.number(0.5);
    let win = g.node(BlockKind::Win);
    let lose = g.node(BlockKind::Lose);
    g.wire(random, "Random", greater, "Num1");
    g.wire(half, "Number", greater, "Num2");
    g.wire(greater, "Greater", branch, "Condition");
    g.flow(branch, "True", win);
    g.flow(branch, "False", lose);

    // scripted input
    let touch = g.node(BlockKind::TouchSensor);
    let show_touch = g.node(BlockKind::Inspect(SignalType::Float));
    g.flow(touch, "Touched", show_touch);
    g.wire(touch, "Screen X", show_touch, "Number");

    let collision = g.node(BlockKind::Collision);
    let hits = g.get_variable("hits", SignalType::Float);
    let increment = g.node(BlockKind::IncrementNumber);
    let show_normal = g.node(BlockKind::Inspect(SignalType::Vec3));
    g.wire(create, "Copy", collision, "1st Object");
    g.flow(collision, "Collided", increment);
    g.wire(hits, "Variable", increment, "Variable");
    g.flow(increment, "After", show_normal);
    g.wire(collision, "Normal", show_normal, "Vector");

    let joystick = g.node(BlockKind::Joystick);
    let show_joystick = g.node(BlockKind::Inspect(SignalType::Vec3));
    g.flow(joystick, "After", show_joystick);
    g.wire(joystick, "Joy Dir", show_joystick, "Vector");

    // list element write through a pointer
    let set_element = g.node(BlockKind::SetPointer(SignalType::Float));
    let list = g.node(BlockKind::List(SignalType::Float));
    let items = g.get_variable("items", SignalType::Float);
    let index = g.number(2.7);
    let seven = g.number(7.0);
    g.wire(items, "Variable", list, "Variable");
    g.wire(index, "Number", list, "Index");
    g.wire(list, "Element", set_element, "Variable");
    g.wire(seven, "Number", set_element, "Value");

    let late = g.node(BlockKind::LateUpdate);
    let show_gravity = g.node(BlockKind::Inspect(SignalType::Vec3));
    let accelerometer = g.node(BlockKind::Accelerometer);
    g.flow(late, "After Physics", show_gravity);
    g.wire(accelerometer, "Direction", show_gravity, "Vector");

    let program = g.build().expect("program");
    let ctx = || {
        HeadlessContext::new(99)
            .script_touch(1, Vec2::new(40.0, 80.0))
            .script_collision(
                2,
                Collision {
                    object: ObjectId(5),
                    impulse: 1.5,
                    normal: Vec3::Y,
                },
            )
            .with_joystick(Vec3::X)
    };
    let outcome = run_both(&program, ctx, 4);

    assert_eq!(count(&outcome.log, "create_object"), 1);
    assert_eq!(count(&outcome.log, "get_random_value"), 4);
    assert_eq!(count(&outcome.log, "win") + count(&outcome.log, "lose"), 4);
    assert_eq!(variable(&program, &outcome, "hits"), Value::Float(1.0));
    let items_var = program
        .find_variable("items", SignalType::Float)
        .expect("items");
    assert_eq!(outcome.vars.len(items_var), 3);
    assert_eq!(
        outcome.vars.get(Pointer {
            var: items_var,
            index: 2
        }),
        Value::Float(7.0)
    );
}

fn lines_of<'a>(log: &'a [String], call: &str) -> Vec<&'a str> {
    let prefix = format!("{call}(");
    log.iter()
        .filter(|line| line.starts_with(&prefix))
        .map(String::as_str)
        .collect()
}

#[test]
fn menu_sound_and_optional_inputs_agree() {
    let mut g = GraphBuilder::new();
    let menu = g.node(BlockKind::MenuItem);
    g.setting(menu, Setting::Text("Extra Life".to_string()));
    g.setting(menu, Setting::Int(5));
    g.setting(menu, Setting::Int(10));
    let lives = g.get_variable("!lives", SignalType::Float);
    g.wire(lives, "Variable", menu, "Variable");

    let play = g.node(BlockKind::PlaySound);
    g.setting(play, Setting::Int(3));
    let volume = g.number(0.5);
    g.wire(volume, "Number", play, "Volume");
    let adjust = g.node(BlockKind::VolumePitch);
    let pitch = g.number(2.0);
    g.wire(play, "Channel", adjust, "Channel");
    g.wire(pitch, "Number", adjust, "Pitch");

    let camera = g.node(BlockKind::SetCamera);
    let turn = g.node(BlockKind::Rotation);
    g.setting(turn, Setting::Vec3([0.0, 90.0, 0.0]));
    g.wire(turn, "Rotation", camera, "Rotation");

    let light = g.node(BlockKind::SetLight);
    let place = g.node(BlockKind::SetPosition);
    let spot = g.vector(Vec3::new(1.0, 2.0, 3.0));
    g.wire(spot, "Vector", light, "Position");
    g.wire(spot, "Vector", place, "Position");

    g.flow(menu, "After", play);
    g.flow(play, "After", adjust);
    g.flow(adjust, "After", camera);
    g.flow(camera, "After", light);
    g.flow(light, "After", place);
    let program = g.build().expect("program");

    let outcome = run_both(&program, || HeadlessContext::new(5), 3);
    let menu_lines = lines_of(&outcome.log, "menu_item");
    assert_eq!(menu_lines.len(), 1);
    assert!(menu_lines[0].starts_with(r#"menu_item(Some("!lives[0]"), 0, "Extra Life", 5, 10)"#));

    let plays = lines_of(&outcome.log, "play_sound");
    let adjusts = lines_of(&outcome.log, "adjust_volume_pitch");
    assert_eq!(plays.len(), 3);
    assert_eq!(adjusts.len(), 3);
    for (played, adjusted) in plays.iter().zip(&adjusts) {
        let channel = played.rsplit(" -> ").next().expect("channel");
        assert_eq!(
            *adjusted,
            format!("adjust_volume_pitch({channel}, None, Some(2.0))")
        );
    }

    for line in lines_of(&outcome.log, "set_camera") {
        assert!(line.starts_with("set_camera(None, Some("), "{line}");
        assert!(line.contains("None, false)"), "{line}");
    }
    assert_eq!(
        lines_of(&outcome.log, "set_light")[0],
        "set_light(Some(Vec3(1.0, 2.0, 3.0)), None)"
    );
    assert_eq!(
        lines_of(&outcome.log, "set_position")[0],
        "set_position(0, Some(Vec3(1.0, 2.0, 3.0)), None)"
    );
}

#[test]
fn swipe_and_box_art_sensors_agree() {
    let mut g = GraphBuilder::new();
    let swipe = g.node(BlockKind::SwipeSensor);
    let shown = g.node(BlockKind::Inspect(SignalType::Vec3));
    g.flow(swipe, "Swiped", shown);
    g.wire(swipe, "Direction", shown, "Vector");

    let box_art = g.node(BlockKind::BoxArtSensor);
    let win = g.node(BlockKind::Win);
    g.flow(box_art, "On Screenshot", win);
    let program = g.build().expect("program");

    let swiping = run_both(&program, || HeadlessContext::new(0).script_swipe(1, Vec3::Z), 3);
    let inspected = lines_of(&swiping.log, "inspect_value");
    assert_eq!(inspected.len(), 1);
    assert!(inspected[0].contains("Vec3(0.0, 0.0, 1.0)"));
    assert_eq!(count(&swiping.log, "win"), 0);

    let screenshot = run_both(&program, || HeadlessContext::new(0).with_box_art(true), 2);
    assert_eq!(count(&screenshot.log, "win"), 2);
}

#[test]
fn constraint_handles_flow_into_setters() {
    let mut g = GraphBuilder::new();
    let play = g.node(BlockKind::PlaySensor);
    let base = g.node(BlockKind::CreateObject);
    let part = g.node(BlockKind::CreateObject);
    let joint = g.node(BlockKind::AddConstraint);
    g.wire(base, "Copy", joint, "Base");
    g.wire(part, "Copy", joint, "Part");

    let limits = g.node(BlockKind::LinearLimits);
    let motor = g.node(BlockKind::AngularMotor);
    let spring = g.node(BlockKind::LinearSpring);
    let lower = g.vector(Vec3::new(-1.0, 0.0, 0.0));
    let force = g.vector(Vec3::new(0.0, 5.0, 0.0));
    for setter in [limits, motor, spring] {
        g.wire(joint, "Constraint", setter, "Constraint");
    }
    g.wire(lower, "Vector", limits, "Lower");
    g.wire(force, "Vector", motor, "Force");

    g.flow(play, "On Play", base);
    g.flow(base, "After", part);
    g.flow(part, "After", joint);
    g.flow(joint, "After", limits);
    g.flow(limits, "After", motor);
    g.flow(motor, "After", spring);
    let program = g.build().expect("program");

    let outcome = run_both(&program, || HeadlessContext::new(0), 2);
    assert_eq!(lines_of(&outcome.log, "add_constraint"), vec!["add_constraint(1, 2, None) -> 1"]);
    assert_eq!(
        lines_of(&outcome.log, "linear_limits"),
        vec!["linear_limits(1, Some(Vec3(-1.0, 0.0, 0.0)), None)"]
    );
    assert_eq!(
        lines_of(&outcome.log, "angular_motor"),
        vec!["angular_motor(1, None, Some(Vec3(0.0, 5.0, 0.0)))"]
    );
    assert_eq!(lines_of(&outcome.log, "linear_spring"), vec!["linear_spring(1, None, None)"]);
}

#[test]
fn saved_variables_survive_a_reload_across_backends() {
    let mut g = GraphBuilder::new();
    let increment = g.node(BlockKind::IncrementNumber);
    let coins = g.get_variable("!coins", SignalType::Float);
    g.wire(coins, "Variable", increment, "Variable");
    let set_local = g.set_variable("scratch", SignalType::Float);
    let one = g.number(1.0);
    g.wire(one, "Number", set_local, "Value");
    g.flow(increment, "After", set_local);
    let program = g.build().expect("program");
    let coins_var = program
        .find_variable("!coins", SignalType::Float)
        .expect("coins");
    let coins_at = Pointer {
        var: coins_var,
        index: 0,
    };

    for (first, second) in [
        (BackendKind::Interpreter, BackendKind::Compiled),
        (BackendKind::Compiled, BackendKind::Interpreter),
    ] {
        let mut before = start(first, &program, HeadlessContext::new(0));
        advance(before.as_mut(), 2);
        let saved = before.variables().saved_snapshot();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].name, "!coins");

        let mut after = start(second, &program, HeadlessContext::new(0));
        after.variables_mut().restore_saved(&saved);
        advance(after.as_mut(), 1);
        assert_eq!(after.variables().get(coins_at), Value::Float(3.0));
    }
}

#[test]
fn custom_block_instances_keep_separate_state() {
    let terminals = vec![TerminalDecl::new(SignalType::Float, Direction::In, "Times")];
    let mut inner = GraphBuilder::custom(11, Footprint::new(2, 2), true, terminals);
    let looped = inner.node(BlockKind::Loop);
    let increment = inner.node(BlockKind::IncrementNumber);
    let total = inner.get_variable("$total", SignalType::Float);
    inner.from_outside(BEFORE, looped, BEFORE);
    inner.from_outside("Times", looped, "Stop");
    inner.wire(total, "Variable", increment, "Variable");
    inner.flow(looped, "Do", increment);

    let mut outer = GraphBuilder::new();
    let first = outer.add_custom(1002, inner);
    let second = outer.custom_instance(1002);
    let two = outer.number(2.0);
    let three = outer.number(3.0);
    outer.wire(two, "Number", first, "Times");
    outer.wire(three, "Number", second, "Times");
    outer.flow(first, "After", second);
    let program = outer.build().expect("program");

    let counters: Vec<_> = program
        .slots
        .iter()
        .filter(|slot| slot.purpose == "counter")
        .collect();
    assert_eq!(counters.len(), 2);

    let outcome = run_both(&program, || HeadlessContext::new(0), 2);
    assert_eq!(variable(&program, &outcome, "$total"), Value::Float(10.0));
    let counter_values: Vec<_> = program
        .slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.purpose == "counter")
        .map(|(index, _)| outcome.slots.values()[index])
        .collect();
    // each instance stopped at its own bound
    assert!(counter_values.contains(&Value::Float(1.0)));
    assert!(counter_values.contains(&Value::Float(2.0)));
}

#[test]
fn converging_branches_run_once_per_frame() {
    let mut g = GraphBuilder::new();
    let mut previous = None;
    for _ in 0..6 {
        let branch = g.node(BlockKind::If);
        let greater = g.node(BlockKind::GreaterThan);
        let random = g.node(BlockKind::Random);
        let half = g.number(0.5);
        g.wire(random, "Random", greater, "Num1");
        g.wire(half, "Number", greater, "Num2");
        g.wire(greater, "Greater", branch, "Condition");
        if let Some(previous) = previous {
            g.flow(previous, "True", branch);
            g.flow(previous, "False", branch);
        }
        previous = Some(branch);
    }
    let last = previous.expect("branches");
    let win = g.node(BlockKind::Win);
    g.flow(last, "True", win);
    g.flow(last, "False", win);
    let program = g.build().expect("program");

    let outcome = run_both(&program, || HeadlessContext::new(21), 3);
    assert_eq!(count(&outcome.log, "get_random_value"), 18);
    assert_eq!(count(&outcome.log, "win"), 3);
}
