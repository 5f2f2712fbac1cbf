//! Runtime context: the engine-facing interface a running program calls.
//!
//! Both backends own one boxed [`RuntimeContext`] and route every effect
//! through it. Physics operations default to no-ops so that a context may
//! leave them unimplemented; the backends still issue the calls.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use glam::{Quat, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::layout::Int3;
use crate::types::{ConstraintId, ObjectId, SignalType, Value};

/// Touch phase a Touch Sensor listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchState {
    Touching,
    Began,
    Ended,
}

impl TouchState {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => TouchState::Began,
            2 => TouchState::Ended,
            _ => TouchState::Touching,
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            TouchState::Touching => 0,
            TouchState::Began => 1,
            TouchState::Ended => 2,
        }
    }
}

/// On-screen button style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonType {
    Direction,
    Point,
}

impl ButtonType {
    pub fn from_raw(raw: i32) -> Self {
        if raw == 1 {
            ButtonType::Point
        } else {
            ButtonType::Direction
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            ButtonType::Direction => 0,
            ButtonType::Point => 1,
        }
    }
}

/// On-screen joystick style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoystickType {
    Xz,
    Screen,
}

impl JoystickType {
    pub fn from_raw(raw: i32) -> Self {
        if raw == 1 {
            JoystickType::Screen
        } else {
            JoystickType::Xz
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            JoystickType::Xz => 0,
            JoystickType::Screen => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RaycastHit {
    pub hit: bool,
    pub position: Vec3,
    pub object: ObjectId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collision {
    pub object: ObjectId,
    pub impulse: f32,
    pub normal: Vec3,
}

/// Variable element a menu item writes its purchase count to.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRef {
    pub name: String,
    pub index: i32,
}

pub trait RuntimeContext {
    // game
    fn win(&mut self, delay: i32);
    fn lose(&mut self, delay: i32);
    fn set_score(&mut self, score: Option<f32>, coins: Option<f32>, ranking: i32);
    fn set_camera(
        &mut self,
        position: Option<Vec3>,
        rotation: Option<Quat>,
        range: Option<f32>,
        perspective: bool,
    );
    fn set_light(&mut self, position: Option<Vec3>, rotation: Option<Quat>);
    fn menu_item(
        &mut self,
        variable: Option<VariableRef>,
        picture: ObjectId,
        name: &str,
        max_buy_count: i32,
        price_increase: i32,
    );

    // objects
    fn get_object_position(&mut self, object: ObjectId) -> (Vec3, Quat);
    fn set_position(&mut self, object: ObjectId, position: Option<Vec3>, rotation: Option<Quat>);
    fn get_size(&mut self, object: ObjectId) -> (Vec3, Vec3);
    fn set_visible(&mut self, object: ObjectId, visible: bool);
    fn create_object(&mut self, original: ObjectId) -> ObjectId;
    fn destroy_object(&mut self, object: ObjectId);
    fn raycast(&mut self, from: Vec3, to: Vec3) -> RaycastHit;

    // sound
    fn play_sound(&mut self, volume: f32, pitch: f32, sound: i32) -> f32;
    fn stop_sound(&mut self, channel: f32);
    fn adjust_volume_pitch(&mut self, channel: f32, volume: Option<f32>, pitch: Option<f32>);

    // physics
    fn add_force(
        &mut self,
        _object: ObjectId,
        _force: Option<Vec3>,
        _apply_at: Option<Vec3>,
        _torque: Option<Vec3>,
    ) {
    }
    fn get_velocity(&mut self, _object: ObjectId) -> (Vec3, Vec3) {
        (Vec3::ZERO, Vec3::ZERO)
    }
    fn set_velocity(&mut self, _object: ObjectId, _velocity: Option<Vec3>, _spin: Option<Vec3>) {}
    fn set_locked(&mut self, _object: ObjectId, _position: Option<Vec3>, _rotation: Option<Vec3>) {}
    fn set_mass(&mut self, _object: ObjectId, _mass: f32) {}
    fn set_friction(&mut self, _object: ObjectId, _friction: f32) {}
    fn set_bounciness(&mut self, _object: ObjectId, _bounciness: f32) {}
    fn set_gravity(&mut self, _gravity: Vec3) {}
    fn add_constraint(
        &mut self,
        _base: ObjectId,
        _part: ObjectId,
        _pivot: Option<Vec3>,
    ) -> ConstraintId {
        ConstraintId::NONE
    }
    fn linear_limits(&mut self, _constraint: ConstraintId, _lower: Option<Vec3>, _upper: Option<Vec3>) {}
    fn angular_limits(&mut self, _constraint: ConstraintId, _lower: Option<Vec3>, _upper: Option<Vec3>) {}
    fn linear_spring(&mut self, _constraint: ConstraintId, _stiffness: Option<Vec3>, _damping: Option<Vec3>) {}
    fn angular_spring(&mut self, _constraint: ConstraintId, _stiffness: Option<Vec3>, _damping: Option<Vec3>) {}
    fn linear_motor(&mut self, _constraint: ConstraintId, _speed: Option<Vec3>, _force: Option<Vec3>) {}
    fn angular_motor(&mut self, _constraint: ConstraintId, _speed: Option<Vec3>, _force: Option<Vec3>) {}

    // input
    fn try_get_touch(&mut self, state: TouchState, finger: i32) -> Option<Vec2>;
    fn try_get_swipe(&mut self) -> Option<Vec3>;
    fn get_button_pressed(&mut self, button: ButtonType) -> bool;
    fn get_joystick_direction(&mut self, joystick: JoystickType) -> Vec3;
    fn try_get_collision(&mut self, object: ObjectId) -> Option<Collision>;

    // math / system
    fn set_random_seed(&mut self, seed: f32);
    fn get_random_value(&mut self, min: f32, max: f32) -> f32;
    fn screen_to_world(&mut self, screen: Vec2) -> (Vec3, Vec3);
    fn world_to_screen(&mut self, world: Vec3) -> Vec2;
    fn inspect_value(
        &mut self,
        value: &Value,
        ty: SignalType,
        variable: Option<&str>,
        block_id: u16,
        pos: Int3,
    );

    // read-only state
    fn screen_size(&mut self) -> Vec2;
    fn accelerometer(&mut self) -> Vec3;
    fn current_frame(&mut self) -> u32;
    fn taking_box_art(&mut self) -> bool;

    /// Called by the backend once a frame has run to completion.
    fn advance_frame(&mut self) {}
}

/// Shared, append-only record of the calls a [`HeadlessContext`] received.
#[derive(Debug, Clone, Default)]
pub struct EffectLog(Arc<Mutex<Vec<String>>>);

impl EffectLog {
    pub fn push(&self, line: String) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Lines whose call name is `name`.
    pub fn calls(&self, name: &str) -> Vec<String> {
        let prefix = format!("{name}(");
        self.lines()
            .into_iter()
            .filter(|line| line.starts_with(&prefix))
            .collect()
    }
}

/// Deterministic context without an engine behind it.
///
/// Random values come from a seeded generator, object and constraint
/// handles are handed out sequentially from 1, and input sensors answer
/// from per-frame scripts. Every call is appended to the [`EffectLog`].
#[derive(Debug)]
pub struct HeadlessContext {
    log: EffectLog,
    rng: StdRng,
    frame: u32,
    screen_size: Vec2,
    accelerometer: Vec3,
    taking_box_art: bool,
    next_object: i32,
    next_constraint: i32,
    next_channel: f32,
    objects: HashMap<ObjectId, (Vec3, Quat)>,
    touches: HashMap<u32, Vec2>,
    swipes: HashMap<u32, Vec3>,
    buttons: HashSet<u32>,
    collisions: HashMap<u32, Collision>,
    joystick: Vec3,
}

impl HeadlessContext {
    pub fn new(seed: u64) -> Self {
        HeadlessContext {
            log: EffectLog::default(),
            rng: StdRng::seed_from_u64(seed),
            frame: 0,
            screen_size: Vec2::new(1080.0, 1920.0),
            accelerometer: Vec3::new(0.0, -9.81, 0.0),
            taking_box_art: false,
            next_object: 1,
            next_constraint: 1,
            next_channel: 0.0,
            objects: HashMap::new(),
            touches: HashMap::new(),
            swipes: HashMap::new(),
            buttons: HashSet::new(),
            collisions: HashMap::new(),
            joystick: Vec3::ZERO,
        }
    }

    pub fn with_screen_size(mut self, size: Vec2) -> Self {
        self.screen_size = size;
        self
    }

    pub fn with_box_art(mut self, taking: bool) -> Self {
        self.taking_box_art = taking;
        self
    }

    pub fn with_joystick(mut self, direction: Vec3) -> Self {
        self.joystick = direction;
        self
    }

    pub fn script_touch(mut self, frame: u32, at: Vec2) -> Self {
        self.touches.insert(frame, at);
        self
    }

    pub fn script_swipe(mut self, frame: u32, direction: Vec3) -> Self {
        self.swipes.insert(frame, direction);
        self
    }

    pub fn script_button(mut self, frame: u32) -> Self {
        self.buttons.insert(frame);
        self
    }

    pub fn script_collision(mut self, frame: u32, collision: Collision) -> Self {
        self.collisions.insert(frame, collision);
        self
    }

    /// Handle to the call log; it stays valid after the context is boxed.
    pub fn log(&self) -> EffectLog {
        self.log.clone()
    }

    fn record(&self, line: String) {
        tracing::trace!(call = %line, "runtime context");
        self.log.push(line);
    }
}

impl RuntimeContext for HeadlessContext {
    fn win(&mut self, delay: i32) {
        self.record(format!("win({delay})"));
    }

    fn lose(&mut self, delay: i32) {
        self.record(format!("lose({delay})"));
    }

    fn set_score(&mut self, score: Option<f32>, coins: Option<f32>, ranking: i32) {
        self.record(format!("set_score({score:?}, {coins:?}, {ranking})"));
    }

    fn set_camera(
        &mut self,
        position: Option<Vec3>,
        rotation: Option<Quat>,
        range: Option<f32>,
        perspective: bool,
    ) {
        self.record(format!(
            "set_camera({position:?}, {rotation:?}, {range:?}, {perspective})"
        ));
    }

    fn set_light(&mut self, position: Option<Vec3>, rotation: Option<Quat>) {
        self.record(format!("set_light({position:?}, {rotation:?})"));
    }

    fn menu_item(
        &mut self,
        variable: Option<VariableRef>,
        picture: ObjectId,
        name: &str,
        max_buy_count: i32,
        price_increase: i32,
    ) {
        let variable = variable.map(|var| format!("{}[{}]", var.name, var.index));
        self.record(format!(
            "menu_item({variable:?}, {}, {name:?}, {max_buy_count}, {price_increase})",
            picture.0
        ));
    }

    fn get_object_position(&mut self, object: ObjectId) -> (Vec3, Quat) {
        self.record(format!("get_object_position({})", object.0));
        self.objects
            .get(&object)
            .copied()
            .unwrap_or((Vec3::ZERO, Quat::IDENTITY))
    }

    fn set_position(&mut self, object: ObjectId, position: Option<Vec3>, rotation: Option<Quat>) {
        self.record(format!("set_position({}, {position:?}, {rotation:?})", object.0));
        let entry = self
            .objects
            .entry(object)
            .or_insert((Vec3::ZERO, Quat::IDENTITY));
        if let Some(position) = position {
            entry.0 = position;
        }
        if let Some(rotation) = rotation {
            entry.1 = rotation;
        }
    }

    fn get_size(&mut self, object: ObjectId) -> (Vec3, Vec3) {
        self.record(format!("get_size({})", object.0));
        (Vec3::splat(-0.5), Vec3::splat(0.5))
    }

    fn set_visible(&mut self, object: ObjectId, visible: bool) {
        self.record(format!("set_visible({}, {visible})", object.0));
    }

    fn create_object(&mut self, original: ObjectId) -> ObjectId {
        let copy = ObjectId(self.next_object);
        self.next_object += 1;
        self.record(format!("create_object({}) -> {}", original.0, copy.0));
        copy
    }

    fn destroy_object(&mut self, object: ObjectId) {
        self.record(format!("destroy_object({})", object.0));
        self.objects.remove(&object);
    }

    fn raycast(&mut self, from: Vec3, to: Vec3) -> RaycastHit {
        self.record(format!("raycast({from:?}, {to:?})"));
        RaycastHit {
            hit: false,
            position: to,
            object: ObjectId::NONE,
        }
    }

    fn play_sound(&mut self, volume: f32, pitch: f32, sound: i32) -> f32 {
        let channel = self.next_channel;
        self.next_channel += 1.0;
        self.record(format!("play_sound({volume:?}, {pitch:?}, {sound}) -> {channel:?}"));
        channel
    }

    fn stop_sound(&mut self, channel: f32) {
        self.record(format!("stop_sound({channel:?})"));
    }

    fn adjust_volume_pitch(&mut self, channel: f32, volume: Option<f32>, pitch: Option<f32>) {
        self.record(format!("adjust_volume_pitch({channel:?}, {volume:?}, {pitch:?})"));
    }

    fn add_force(
        &mut self,
        object: ObjectId,
        force: Option<Vec3>,
        apply_at: Option<Vec3>,
        torque: Option<Vec3>,
    ) {
        self.record(format!(
            "add_force({}, {force:?}, {apply_at:?}, {torque:?})",
            object.0
        ));
    }

    fn get_velocity(&mut self, object: ObjectId) -> (Vec3, Vec3) {
        self.record(format!("get_velocity({})", object.0));
        (Vec3::ZERO, Vec3::ZERO)
    }

    fn set_velocity(&mut self, object: ObjectId, velocity: Option<Vec3>, spin: Option<Vec3>) {
        self.record(format!("set_velocity({}, {velocity:?}, {spin:?})", object.0));
    }

    fn set_locked(&mut self, object: ObjectId, position: Option<Vec3>, rotation: Option<Vec3>) {
        self.record(format!("set_locked({}, {position:?}, {rotation:?})", object.0));
    }

    fn set_mass(&mut self, object: ObjectId, mass: f32) {
        self.record(format!("set_mass({}, {mass:?})", object.0));
    }

    fn set_friction(&mut self, object: ObjectId, friction: f32) {
        self.record(format!("set_friction({}, {friction:?})", object.0));
    }

    fn set_bounciness(&mut self, object: ObjectId, bounciness: f32) {
        self.record(format!("set_bounciness({}, {bounciness:?})", object.0));
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.record(format!("set_gravity({gravity:?})"));
    }

    fn add_constraint(&mut self, base: ObjectId, part: ObjectId, pivot: Option<Vec3>) -> ConstraintId {
        let constraint = ConstraintId(self.next_constraint);
        self.next_constraint += 1;
        self.record(format!(
            "add_constraint({}, {}, {pivot:?}) -> {}",
            base.0, part.0, constraint.0
        ));
        constraint
    }

    fn linear_limits(&mut self, constraint: ConstraintId, lower: Option<Vec3>, upper: Option<Vec3>) {
        self.record(format!("linear_limits({}, {lower:?}, {upper:?})", constraint.0));
    }

    fn angular_limits(&mut self, constraint: ConstraintId, lower: Option<Vec3>, upper: Option<Vec3>) {
        self.record(format!("angular_limits({}, {lower:?}, {upper:?})", constraint.0));
    }

    fn linear_spring(&mut self, constraint: ConstraintId, stiffness: Option<Vec3>, damping: Option<Vec3>) {
        self.record(format!(
            "linear_spring({}, {stiffness:?}, {damping:?})",
            constraint.0
        ));
    }

    fn angular_spring(&mut self, constraint: ConstraintId, stiffness: Option<Vec3>, damping: Option<Vec3>) {
        self.record(format!(
            "angular_spring({}, {stiffness:?}, {damping:?})",
            constraint.0
        ));
    }

    fn linear_motor(&mut self, constraint: ConstraintId, speed: Option<Vec3>, force: Option<Vec3>) {
        self.record(format!("linear_motor({}, {speed:?}, {force:?})", constraint.0));
    }

    fn angular_motor(&mut self, constraint: ConstraintId, speed: Option<Vec3>, force: Option<Vec3>) {
        self.record(format!("angular_motor({}, {speed:?}, {force:?})", constraint.0));
    }

    fn try_get_touch(&mut self, state: TouchState, finger: i32) -> Option<Vec2> {
        let touch = self.touches.get(&self.frame).copied();
        self.record(format!("try_get_touch({state:?}, {finger}) -> {touch:?}"));
        touch
    }

    fn try_get_swipe(&mut self) -> Option<Vec3> {
        let swipe = self.swipes.get(&self.frame).copied();
        self.record(format!("try_get_swipe() -> {swipe:?}"));
        swipe
    }

    fn get_button_pressed(&mut self, button: ButtonType) -> bool {
        let pressed = self.buttons.contains(&self.frame);
        self.record(format!("get_button_pressed({button:?}) -> {pressed}"));
        pressed
    }

    fn get_joystick_direction(&mut self, joystick: JoystickType) -> Vec3 {
        self.record(format!("get_joystick_direction({joystick:?})"));
        self.joystick
    }

    fn try_get_collision(&mut self, object: ObjectId) -> Option<Collision> {
        let collision = self.collisions.get(&self.frame).copied();
        self.record(format!(
            "try_get_collision({}) -> {}",
            object.0,
            collision.is_some()
        ));
        collision
    }

    fn set_random_seed(&mut self, seed: f32) {
        self.record(format!("set_random_seed({seed:?})"));
        self.rng = StdRng::seed_from_u64(u64::from(seed.to_bits()));
    }

    fn get_random_value(&mut self, min: f32, max: f32) -> f32 {
        let value = if min < max {
            min + self.rng.random::<f32>() * (max - min)
        } else {
            min
        };
        self.record(format!("get_random_value({min:?}, {max:?}) -> {value:?}"));
        value
    }

    fn screen_to_world(&mut self, screen: Vec2) -> (Vec3, Vec3) {
        self.record(format!("screen_to_world({screen:?})"));
        let near = Vec3::new(screen.x, screen.y, 0.0);
        (near, near + Vec3::Z * 100.0)
    }

    fn world_to_screen(&mut self, world: Vec3) -> Vec2 {
        self.record(format!("world_to_screen({world:?})"));
        Vec2::new(world.x, world.y)
    }

    fn inspect_value(
        &mut self,
        value: &Value,
        ty: SignalType,
        variable: Option<&str>,
        block_id: u16,
        pos: Int3,
    ) {
        self.record(format!(
            "inspect_value({value:?}, {ty}, {variable:?}, {block_id}, {pos})"
        ));
    }

    fn screen_size(&mut self) -> Vec2 {
        self.record("screen_size()".to_string());
        self.screen_size
    }

    fn accelerometer(&mut self) -> Vec3 {
        self.record("accelerometer()".to_string());
        self.accelerometer
    }

    fn current_frame(&mut self) -> u32 {
        self.record("current_frame()".to_string());
        self.frame
    }

    fn taking_box_art(&mut self) -> bool {
        self.record("taking_box_art()".to_string());
        self.taking_box_art
    }

    fn advance_frame(&mut self) {
        self.frame += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_values_repeat_for_the_same_seed() {
        let mut a = HeadlessContext::new(7);
        let mut b = HeadlessContext::new(7);
        for _ in 0..4 {
            assert_eq!(a.get_random_value(0.0, 10.0), b.get_random_value(0.0, 10.0));
        }
        assert_eq!(a.get_random_value(3.0, 3.0), 3.0);
    }

    #[test]
    fn handles_are_sequential() {
        let mut ctx = HeadlessContext::new(0);
        assert_eq!(ctx.create_object(ObjectId(5)), ObjectId(1));
        assert_eq!(ctx.create_object(ObjectId(5)), ObjectId(2));
        assert_eq!(
            ctx.add_constraint(ObjectId(1), ObjectId(2), None),
            ConstraintId(1)
        );
    }

    #[test]
    fn scripted_input_answers_on_its_frame_only() {
        let mut ctx = HeadlessContext::new(0).script_touch(1, Vec2::new(4.0, 5.0));
        assert_eq!(ctx.try_get_touch(TouchState::Began, 0), None);
        ctx.advance_frame();
        assert_eq!(ctx.try_get_touch(TouchState::Began, 0), Some(Vec2::new(4.0, 5.0)));
    }

    #[test]
    fn log_handle_outlives_the_box() {
        let ctx = HeadlessContext::new(0);
        let log = ctx.log();
        let mut boxed: Box<dyn RuntimeContext> = Box::new(ctx);
        boxed.win(3);
        assert_eq!(log.lines(), ["win(3)"]);
        assert_eq!(log.calls("win").len(), 1);
    }
}
