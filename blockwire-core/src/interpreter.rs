//! Tree-walking backend.
//!
//! Expressions are evaluated on demand each time an operand is read,
//! except at memo points, whose first value is cached for the rest of the
//! frame. Statement chains run from an explicit stack; only branch bodies
//! (If, Loop, sensors) recurse.

use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::backend::{Backend, LateUpdate};
use crate::catalog::BlockKind;
use crate::context::{ButtonType, JoystickType, RuntimeContext, TouchState, VariableRef};
use crate::error::CoreError;
use crate::hir::{Constant, Node, NodeId, Operand, ProducerRef, Program};
use crate::math;
use crate::storage::{StateStore, VariableStore};
use crate::types::{Pointer, SignalType, Value};

pub struct Interpreter {
    program: Arc<Program>,
    ctx: Box<dyn RuntimeContext>,
    vars: VariableStore,
    slots: StateStore,
    memo: Vec<Option<Value>>,
    frames: u64,
}

impl Interpreter {
    pub fn new(program: Arc<Program>, ctx: Box<dyn RuntimeContext>) -> Self {
        Interpreter {
            vars: VariableStore::new(&program),
            slots: StateStore::new(&program),
            memo: vec![None; program.memo_points.len()],
            program,
            ctx,
            frames: 0,
        }
    }

    fn run_chain(
        &mut self,
        program: &Program,
        start: &[NodeId],
        late: &mut Vec<NodeId>,
    ) -> Result<(), CoreError> {
        let mut stack: Vec<NodeId> = start.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = program.node(id)?;
            self.execute(program, id, node, late)?;
            stack.extend(node.after().iter().rev().copied());
        }
        Ok(())
    }

    fn operand(&mut self, program: &Program, node: &Node, index: usize) -> Result<Value, CoreError> {
        let (src, ty, deref, memo) = match node.input(index)? {
            Operand::Default(value) => return Ok(*value),
            Operand::Absent => return Ok(Value::Void),
            Operand::Wire {
                src,
                ty,
                deref,
                memo,
            } => (*src, *ty, *deref, *memo),
        };
        let value = match memo {
            Some(id) => match self.memo.get(id.index()).copied().flatten() {
                Some(cached) => cached,
                None => {
                    let value = self.output(program, src)?;
                    if let Some(cell) = self.memo.get_mut(id.index()) {
                        *cell = Some(value);
                    }
                    value
                }
            },
            None => self.output(program, src)?,
        };
        Ok(if deref { self.load(value, ty) } else { value })
    }

    /// Read through a pointer; a missing pointer reads the type default.
    fn load(&self, ptr: Value, ty: SignalType) -> Value {
        match ptr.as_ptr() {
            Some(ptr) => match self.vars.get(ptr) {
                Value::Void => ty.to_value().default_value(),
                value => value,
            },
            None => ty.to_value().default_value(),
        }
    }

    fn float(&mut self, program: &Program, node: &Node, index: usize) -> Result<f32, CoreError> {
        Ok(self.operand(program, node, index)?.as_float())
    }

    fn vec3(&mut self, program: &Program, node: &Node, index: usize) -> Result<Vec3, CoreError> {
        Ok(self.operand(program, node, index)?.as_vec3())
    }

    fn pointer(
        &mut self,
        program: &Program,
        node: &Node,
        index: usize,
    ) -> Result<Option<Pointer>, CoreError> {
        Ok(self.operand(program, node, index)?.as_ptr())
    }

    /// Optional input: `None` when unconnected.
    fn optional(
        &mut self,
        program: &Program,
        node: &Node,
        index: usize,
    ) -> Result<Option<Value>, CoreError> {
        if matches!(node.input(index)?, Operand::Absent) {
            return Ok(None);
        }
        self.operand(program, node, index).map(Some)
    }

    fn output(&mut self, program: &Program, src: ProducerRef) -> Result<Value, CoreError> {
        let node = program.node(src.node)?;
        if node.statement {
            let (slot, lane) = node.kind.output_slot(src.output).ok_or_else(|| {
                CoreError::invariant(format!(
                    "{:?} at {} has no output {}",
                    node.kind, node.pos, src.output
                ))
            })?;
            let value = self.slots.get(node.slot(slot)?);
            return Ok(match lane {
                Some(lane) => Value::Float(value.as_vec3()[lane as usize]),
                None => value,
            });
        }
        self.evaluate(program, node, src.output)
    }

    fn evaluate(&mut self, program: &Program, node: &Node, output: usize) -> Result<Value, CoreError> {
        use BlockKind as K;

        let value = match node.kind {
            K::ScreenSize => {
                let size = self.ctx.screen_size();
                Value::Float(if output == 0 { size.x } else { size.y })
            }
            K::Accelerometer => Value::Vec3(self.ctx.accelerometer()),
            K::CurrentFrame => Value::Float(self.ctx.current_frame() as f32),
            K::GetPosition => {
                let object = self.operand(program, node, 0)?.as_obj();
                let (position, rotation) = self.ctx.get_object_position(object);
                if output == 0 {
                    Value::Vec3(position)
                } else {
                    Value::Rot(rotation)
                }
            }
            K::Raycast => {
                let from = self.vec3(program, node, 0)?;
                let to = self.vec3(program, node, 1)?;
                let hit = self.ctx.raycast(from, to);
                match output {
                    0 => Value::Bool(hit.hit),
                    1 => Value::Vec3(hit.position),
                    _ => Value::Obj(hit.object),
                }
            }
            K::GetSize => {
                let object = self.operand(program, node, 0)?.as_obj();
                let (min, max) = self.ctx.get_size(object);
                Value::Vec3(if output == 0 { min } else { max })
            }
            K::GetVelocity => {
                let object = self.operand(program, node, 0)?.as_obj();
                let (velocity, spin) = self.ctx.get_velocity(object);
                Value::Vec3(if output == 0 { velocity } else { spin })
            }
            K::Number => Value::Float(node.constant.float()),
            K::Vector => match node.constant {
                Constant::Vec3(value) => Value::Vec3(value),
                _ => Value::Vec3(Vec3::ZERO),
            },
            K::Rotation => match node.constant {
                Constant::Rot(value) => Value::Rot(value),
                _ => SignalType::Rot.default_value(),
            },
            K::True => Value::Bool(true),
            K::False => Value::Bool(false),
            K::Negate => Value::Float(-self.float(program, node, 0)?),
            K::Not => Value::Bool(!self.operand(program, node, 0)?.as_bool()),
            K::Inverse => Value::Rot(math::inverse(self.operand(program, node, 0)?.as_rot())),
            K::AddNumbers => {
                let a = self.float(program, node, 0)?;
                Value::Float(a + self.float(program, node, 1)?)
            }
            K::AddVectors => {
                let a = self.vec3(program, node, 0)?;
                Value::Vec3(a + self.vec3(program, node, 1)?)
            }
            K::SubtractNumbers => {
                let a = self.float(program, node, 0)?;
                Value::Float(a - self.float(program, node, 1)?)
            }
            K::SubtractVectors => {
                let a = self.vec3(program, node, 0)?;
                Value::Vec3(a - self.vec3(program, node, 1)?)
            }
            K::Multiply => {
                let a = self.float(program, node, 0)?;
                Value::Float(a * self.float(program, node, 1)?)
            }
            K::Scale => {
                let v = self.vec3(program, node, 0)?;
                Value::Vec3(v * self.float(program, node, 1)?)
            }
            K::Rotate => {
                let v = self.vec3(program, node, 0)?;
                let rot = self.operand(program, node, 1)?.as_rot();
                Value::Vec3(math::rotate(v, rot))
            }
            K::Combine => {
                let a = self.operand(program, node, 0)?.as_rot();
                let b = self.operand(program, node, 1)?.as_rot();
                Value::Rot(math::combine(a, b))
            }
            K::Divide => {
                let a = self.float(program, node, 0)?;
                Value::Float(a / self.float(program, node, 1)?)
            }
            K::Modulo => {
                let a = self.float(program, node, 0)?;
                Value::Float(math::modulo(a, self.float(program, node, 1)?))
            }
            K::Power => {
                let a = self.float(program, node, 0)?;
                Value::Float(math::power(a, self.float(program, node, 1)?))
            }
            K::EqualNumbers => {
                let a = self.float(program, node, 0)?;
                Value::Bool(math::numbers_equal(a, self.float(program, node, 1)?))
            }
            K::EqualVectors => {
                let a = self.vec3(program, node, 0)?;
                Value::Bool(math::vectors_equal(a, self.vec3(program, node, 1)?))
            }
            K::EqualObjects => {
                let a = self.operand(program, node, 0)?.as_obj();
                Value::Bool(a == self.operand(program, node, 1)?.as_obj())
            }
            K::EqualTruths => {
                let a = self.operand(program, node, 0)?.as_bool();
                Value::Bool(a == self.operand(program, node, 1)?.as_bool())
            }
            K::LessThan => {
                let a = self.float(program, node, 0)?;
                Value::Bool(a < self.float(program, node, 1)?)
            }
            K::GreaterThan => {
                let a = self.float(program, node, 0)?;
                Value::Bool(a > self.float(program, node, 1)?)
            }
            K::And => Value::Bool(
                self.operand(program, node, 0)?.as_bool()
                    && self.operand(program, node, 1)?.as_bool(),
            ),
            K::Or => Value::Bool(
                self.operand(program, node, 0)?.as_bool()
                    || self.operand(program, node, 1)?.as_bool(),
            ),
            K::Random => {
                let min = self.float(program, node, 0)?;
                let max = self.float(program, node, 1)?;
                Value::Float(self.ctx.get_random_value(min, max))
            }
            K::Min => {
                let a = self.float(program, node, 0)?;
                Value::Float(math::min(a, self.float(program, node, 1)?))
            }
            K::Max => {
                let a = self.float(program, node, 0)?;
                Value::Float(math::max(a, self.float(program, node, 1)?))
            }
            K::Sin => Value::Float(math::sin_degrees(self.float(program, node, 0)?)),
            K::Cos => Value::Float(math::cos_degrees(self.float(program, node, 0)?)),
            K::Round => Value::Float(self.float(program, node, 0)?.round_ties_even()),
            K::Floor => Value::Float(self.float(program, node, 0)?.floor()),
            K::Ceiling => Value::Float(self.float(program, node, 0)?.ceil()),
            K::Absolute => Value::Float(self.float(program, node, 0)?.abs()),
            K::Logarithm => {
                let number = self.float(program, node, 0)?;
                Value::Float(math::logarithm(number, self.float(program, node, 1)?))
            }
            K::Normalize => Value::Vec3(math::normalize(self.vec3(program, node, 0)?)),
            K::DotProduct => {
                let a = self.vec3(program, node, 0)?;
                Value::Float(math::dot(a, self.vec3(program, node, 1)?))
            }
            K::CrossProduct => {
                let a = self.vec3(program, node, 0)?;
                Value::Vec3(math::cross(a, self.vec3(program, node, 1)?))
            }
            K::Distance => {
                let a = self.vec3(program, node, 0)?;
                Value::Float(math::distance(a, self.vec3(program, node, 1)?))
            }
            K::Lerp => {
                let from = self.operand(program, node, 0)?.as_rot();
                let to = self.operand(program, node, 1)?.as_rot();
                let amount = self.float(program, node, 2)?;
                Value::Rot(math::lerp(from, to, amount))
            }
            K::AxisAngle => {
                let axis = self.vec3(program, node, 0)?;
                Value::Rot(math::axis_angle(axis, self.float(program, node, 1)?))
            }
            K::ScreenToWorld => {
                let x = self.float(program, node, 0)?;
                let y = self.float(program, node, 1)?;
                let (near, far) = self.ctx.screen_to_world(Vec2::new(x, y));
                Value::Vec3(if output == 0 { near } else { far })
            }
            K::WorldToScreen => {
                let world = self.vec3(program, node, 0)?;
                let screen = self.ctx.world_to_screen(world);
                Value::Float(if output == 0 { screen.x } else { screen.y })
            }
            K::LineVsPlane => {
                let from = self.vec3(program, node, 0)?;
                let to = self.vec3(program, node, 1)?;
                let point = self.vec3(program, node, 2)?;
                let normal = self.vec3(program, node, 3)?;
                Value::Vec3(math::line_vs_plane(from, to, point, normal))
            }
            K::LookRotation => {
                let direction = self.vec3(program, node, 0)?;
                Value::Rot(math::look_rotation(direction, self.vec3(program, node, 1)?))
            }
            K::MakeVector => {
                let x = self.float(program, node, 0)?;
                let y = self.float(program, node, 1)?;
                Value::Vec3(Vec3::new(x, y, self.float(program, node, 2)?))
            }
            K::BreakVector => Value::Float(self.vec3(program, node, 0)?[output.min(2)]),
            K::MakeRotation => {
                let x = self.float(program, node, 0)?;
                let y = self.float(program, node, 1)?;
                Value::Rot(math::make_rotation(x, y, self.float(program, node, 2)?))
            }
            K::BreakRotation => {
                let rot = self.operand(program, node, 0)?.as_rot();
                Value::Float(math::break_rotation(rot)[output.min(2)])
            }
            K::GetVariable(_) => match node.constant.variable() {
                Some(var) => Value::Ptr(Pointer { var, index: 0 }),
                None => Value::Void,
            },
            K::List(_) => {
                let base = self.pointer(program, node, 0)?;
                let offset = self.float(program, node, 1)?.floor() as i32;
                match base {
                    Some(ptr) => Value::Ptr(Pointer {
                        var: ptr.var,
                        index: ptr.index.wrapping_add(offset),
                    }),
                    None => Value::Void,
                }
            }
            other => {
                return Err(CoreError::invariant(format!(
                    "{other:?} at {} is not an expression",
                    node.pos
                )));
            }
        };
        Ok(value)
    }

    fn execute(
        &mut self,
        program: &Program,
        id: NodeId,
        node: &Node,
        late: &mut Vec<NodeId>,
    ) -> Result<(), CoreError> {
        use BlockKind as K;

        match node.kind {
            K::Win => self.ctx.win(node.constant.int()),
            K::Lose => self.ctx.lose(node.constant.int()),
            K::SetScore => {
                let score = self.optional(program, node, 0)?.map(|v| v.as_float());
                let coins = self.optional(program, node, 1)?.map(|v| v.as_float());
                self.ctx.set_score(score, coins, node.constant.int());
            }
            K::SetCamera => {
                let position = self.optional(program, node, 0)?.map(|v| v.as_vec3());
                let rotation = self.optional(program, node, 1)?.map(|v| v.as_rot());
                let range = self.optional(program, node, 2)?.map(|v| v.as_float());
                self.ctx
                    .set_camera(position, rotation, range, node.constant.flag());
            }
            K::SetLight => {
                let position = self.optional(program, node, 0)?.map(|v| v.as_vec3());
                let rotation = self.optional(program, node, 1)?.map(|v| v.as_rot());
                self.ctx.set_light(position, rotation);
            }
            K::MenuItem => {
                let registered = node.slot(0)?;
                if !self.slots.get(registered).as_bool() {
                    let variable = self.pointer(program, node, 0)?.and_then(|ptr| {
                        program.variable(ptr.var).map(|decl| VariableRef {
                            name: decl.variable.name().to_string(),
                            index: ptr.index,
                        })
                    });
                    let picture = self.operand(program, node, 1)?.as_obj();
                    if let Constant::Menu {
                        name,
                        max_buy_count,
                        price_increase,
                    } = &node.constant
                    {
                        self.ctx
                            .menu_item(variable, picture, name, *max_buy_count, *price_increase);
                    }
                    self.slots.set(registered, Value::Bool(true));
                }
            }
            K::SetPosition => {
                let object = self.operand(program, node, 0)?.as_obj();
                let position = self.optional(program, node, 1)?.map(|v| v.as_vec3());
                let rotation = self.optional(program, node, 2)?.map(|v| v.as_rot());
                self.ctx.set_position(object, position, rotation);
            }
            K::SetVisible => {
                let object = self.operand(program, node, 0)?.as_obj();
                let visible = self.operand(program, node, 1)?.as_bool();
                self.ctx.set_visible(object, visible);
            }
            K::CreateObject => {
                let original = self.operand(program, node, 0)?.as_obj();
                let copy = self.ctx.create_object(original);
                self.slots.set(node.slot(0)?, Value::Obj(copy));
            }
            K::DestroyObject => {
                let object = self.operand(program, node, 0)?.as_obj();
                self.ctx.destroy_object(object);
            }
            K::PlaySound => {
                let volume = self.float(program, node, 0)?;
                let pitch = self.float(program, node, 1)?;
                let channel = self.ctx.play_sound(volume, pitch, node.constant.int());
                self.slots.set(node.slot(0)?, Value::Float(channel));
            }
            K::StopSound => {
                let channel = self.float(program, node, 0)?;
                self.ctx.stop_sound(channel);
            }
            K::VolumePitch => {
                let channel = self.float(program, node, 0)?;
                let volume = self.optional(program, node, 1)?.map(|v| v.as_float());
                let pitch = self.optional(program, node, 2)?.map(|v| v.as_float());
                self.ctx.adjust_volume_pitch(channel, volume, pitch);
            }
            K::AddForce => {
                let object = self.operand(program, node, 0)?.as_obj();
                let force = self.optional(program, node, 1)?.map(|v| v.as_vec3());
                let apply_at = self.optional(program, node, 2)?.map(|v| v.as_vec3());
                let torque = self.optional(program, node, 3)?.map(|v| v.as_vec3());
                self.ctx.add_force(object, force, apply_at, torque);
            }
            K::SetVelocity | K::SetLocked => {
                let object = self.operand(program, node, 0)?.as_obj();
                let first = self.optional(program, node, 1)?.map(|v| v.as_vec3());
                let second = self.optional(program, node, 2)?.map(|v| v.as_vec3());
                if node.kind == K::SetVelocity {
                    self.ctx.set_velocity(object, first, second);
                } else {
                    self.ctx.set_locked(object, first, second);
                }
            }
            K::SetMass | K::SetFriction | K::SetBounciness => {
                let object = self.operand(program, node, 0)?.as_obj();
                let amount = self.float(program, node, 1)?;
                match node.kind {
                    K::SetMass => self.ctx.set_mass(object, amount),
                    K::SetFriction => self.ctx.set_friction(object, amount),
                    _ => self.ctx.set_bounciness(object, amount),
                }
            }
            K::SetGravity => {
                let gravity = self.vec3(program, node, 0)?;
                self.ctx.set_gravity(gravity);
            }
            K::AddConstraint => {
                let base = self.operand(program, node, 0)?.as_obj();
                let part = self.operand(program, node, 1)?.as_obj();
                let pivot = self.optional(program, node, 2)?.map(|v| v.as_vec3());
                let constraint = self.ctx.add_constraint(base, part, pivot);
                self.slots.set(node.slot(0)?, Value::Con(constraint));
            }
            K::LinearLimits
            | K::AngularLimits
            | K::LinearSpring
            | K::AngularSpring
            | K::LinearMotor
            | K::AngularMotor => {
                let constraint = self.operand(program, node, 0)?.as_con();
                let a = self.optional(program, node, 1)?.map(|v| v.as_vec3());
                let b = self.optional(program, node, 2)?.map(|v| v.as_vec3());
                match node.kind {
                    K::LinearLimits => self.ctx.linear_limits(constraint, a, b),
                    K::AngularLimits => self.ctx.angular_limits(constraint, a, b),
                    K::LinearSpring => self.ctx.linear_spring(constraint, a, b),
                    K::AngularSpring => self.ctx.angular_spring(constraint, a, b),
                    K::LinearMotor => self.ctx.linear_motor(constraint, a, b),
                    _ => self.ctx.angular_motor(constraint, a, b),
                }
            }
            K::If => {
                let branch = if self.operand(program, node, 0)?.as_bool() {
                    0
                } else {
                    1
                };
                self.run_chain(program, node.branch(branch)?, late)?;
            }
            K::PlaySensor => {
                if self.ctx.current_frame() == 0 {
                    self.run_chain(program, node.branch(0)?, late)?;
                }
            }
            K::LateUpdate => late.push(id),
            K::BoxArtSensor => {
                if self.ctx.taking_box_art() {
                    self.run_chain(program, node.branch(0)?, late)?;
                }
            }
            K::TouchSensor => {
                let state = TouchState::from_raw(node.constant.int());
                if let Some(at) = self.ctx.try_get_touch(state, node.constant.second_int()) {
                    self.slots
                        .set(node.slot(0)?, Value::Vec3(Vec3::new(at.x, at.y, 0.0)));
                    self.run_chain(program, node.branch(0)?, late)?;
                }
            }
            K::SwipeSensor => {
                if let Some(direction) = self.ctx.try_get_swipe() {
                    self.slots.set(node.slot(0)?, Value::Vec3(direction));
                    self.run_chain(program, node.branch(0)?, late)?;
                }
            }
            K::Button => {
                if self
                    .ctx
                    .get_button_pressed(ButtonType::from_raw(node.constant.int()))
                {
                    self.run_chain(program, node.branch(0)?, late)?;
                }
            }
            K::Joystick => {
                let direction = self
                    .ctx
                    .get_joystick_direction(JoystickType::from_raw(node.constant.int()));
                self.slots.set(node.slot(0)?, Value::Vec3(direction));
            }
            K::Collision => {
                let object = self.operand(program, node, 0)?.as_obj();
                if let Some(hit) = self.ctx.try_get_collision(object) {
                    self.slots.set(node.slot(0)?, Value::Obj(hit.object));
                    self.slots.set(node.slot(1)?, Value::Float(hit.impulse));
                    self.slots.set(node.slot(2)?, Value::Vec3(hit.normal));
                    self.run_chain(program, node.branch(0)?, late)?;
                }
            }
            K::Loop => {
                let start = self.float(program, node, 0)?;
                let stop = self.float(program, node, 1)?;
                let counter = node.slot(0)?;
                for k in 0..math::loop_count(start, stop) {
                    self.slots
                        .set(counter, Value::Float(math::loop_counter(start, stop, k)));
                    self.run_chain(program, node.branch(0)?, late)?;
                }
            }
            K::Inspect(ty) => {
                let value = self.operand(program, node, 0)?;
                let variable = match &node.constant {
                    Constant::Inspect { variable } => variable.as_deref(),
                    _ => None,
                };
                self.ctx
                    .inspect_value(&value, ty, variable, node.block_id, node.pos);
            }
            K::RandomSeed => {
                let seed = self.float(program, node, 0)?;
                self.ctx.set_random_seed(seed);
            }
            K::SetVariable(_) => {
                let value = self.operand(program, node, 0)?;
                if let Some(var) = node.constant.variable() {
                    self.vars.set(Pointer { var, index: 0 }, value);
                }
            }
            K::SetPointer(_) => {
                let target = self.pointer(program, node, 0)?;
                let value = self.operand(program, node, 1)?;
                if let Some(ptr) = target {
                    self.vars.set(ptr, value);
                }
            }
            K::IncrementNumber | K::DecrementNumber => {
                let delta = if node.kind == K::IncrementNumber {
                    1.0
                } else {
                    -1.0
                };
                if let Some(ptr) = self.pointer(program, node, 0)? {
                    let current = self.vars.get(ptr).as_float();
                    self.vars.set(ptr, Value::Float(current + delta));
                }
            }
            other => {
                return Err(CoreError::invariant(format!(
                    "{other:?} at {} is not a statement",
                    node.pos
                )));
            }
        }
        Ok(())
    }
}

impl Backend for Interpreter {
    fn run_frame(&mut self) -> Result<LateUpdate, CoreError> {
        if self.frames > 0 {
            self.ctx.advance_frame();
        }
        self.frames += 1;
        self.memo.iter_mut().for_each(|cell| *cell = None);

        let program = Arc::clone(&self.program);
        let mut late = Vec::new();
        for &entry in &program.entry_points {
            self.run_chain(&program, &[entry], &mut late)?;
        }
        Ok(LateUpdate { tasks: late })
    }

    fn run_late_update(&mut self, late: LateUpdate) -> Result<(), CoreError> {
        let program = Arc::clone(&self.program);
        // Late Update blocks reached from a late body are not queued again.
        let mut nested = Vec::new();
        for task in late.tasks {
            let node = program.node(task)?;
            if node.kind != BlockKind::LateUpdate {
                return Err(CoreError::invariant(format!(
                    "late task {} is a {:?}",
                    task.0, node.kind
                )));
            }
            self.run_chain(&program, node.branch(0)?, &mut nested)?;
        }
        Ok(())
    }

    fn program(&self) -> &Program {
        &self.program
    }

    fn variables(&self) -> &VariableStore {
        &self.vars
    }

    fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.vars
    }

    fn state(&self) -> &StateStore {
        &self.slots
    }

    fn context_mut(&mut self) -> &mut dyn RuntimeContext {
        self.ctx.as_mut()
    }
}
