//! Compiled backend: lowers a program to wasm and runs it on wasmi.
//!
//! Storage and the runtime context stay on the host side ([`HostState`]);
//! the module reaches them through the imports listed in
//! [`crate::builtins`].

use std::sync::Arc;

use glam::{Quat, Vec2, Vec3};
use wasmi::{Caller, Engine, Linker, Module, Store, TypedFunc};

use crate::backend::{Backend, LateUpdate};
use crate::builtins::{Builtin, HOST_MODULE};
use crate::catalog::BlockKind;
use crate::codegen_wasm::{RUN_FRAME, RUN_LATE, generate_wasm};
use crate::context::{ButtonType, JoystickType, RuntimeContext, TouchState, VariableRef};
use crate::error::CoreError;
use crate::hir::{Constant, NodeId, Program, SlotId};
use crate::math;
use crate::storage::{StateStore, VariableStore};
use crate::types::{ConstraintId, ObjectId, Pointer, SignalType, VarId, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationArtifact {
    pub wasm: Vec<u8>,
    /// Number of `memo_<k>` functions the module exports.
    pub memo_functions: usize,
}

pub fn compile_wasm(program: &Program) -> Result<CompilationArtifact, CoreError> {
    let wasm = generate_wasm(program)?;
    tracing::info!(
        bytes = wasm.len(),
        nodes = program.nodes.len(),
        memo_points = program.memo_points.len(),
        "compiled program to wasm"
    );
    Ok(CompilationArtifact {
        wasm,
        memo_functions: program.memo_points.len(),
    })
}

/// Everything host imports can touch.
pub(crate) struct HostState {
    program: Arc<Program>,
    ctx: Box<dyn RuntimeContext>,
    vars: VariableStore,
    slots: StateStore,
    late: Vec<NodeId>,
}

impl HostState {
    fn new(program: Arc<Program>, ctx: Box<dyn RuntimeContext>) -> Self {
        HostState {
            vars: VariableStore::new(&program),
            slots: StateStore::new(&program),
            late: Vec::new(),
            program,
            ctx,
        }
    }

    /// Pointer lanes; a negative variable is a missing pointer.
    fn pointer(var: i32, index: i32) -> Option<Pointer> {
        u32::try_from(var).ok().map(|var| Pointer {
            var: VarId(var),
            index,
        })
    }

    fn var_get(&self, var: i32, index: i32) -> Value {
        Self::pointer(var, index).map_or(Value::Void, |ptr| self.vars.get(ptr))
    }

    fn var_set(&mut self, var: i32, index: i32, value: Value) {
        if let Some(ptr) = Self::pointer(var, index) {
            self.vars.set(ptr, value);
        }
    }

    fn var_type(&self, var: i32) -> SignalType {
        u32::try_from(var)
            .ok()
            .and_then(|var| self.program.variable(VarId(var)))
            .map_or(SignalType::Void, |decl| decl.variable.ty())
    }

    fn slot(slot: i32) -> SlotId {
        SlotId(slot as u32)
    }

    fn slot_type(&self, slot: i32) -> SignalType {
        self.program
            .slots
            .get(Self::slot(slot).index())
            .map_or(SignalType::Void, |decl| decl.ty)
    }

    fn inspect(&mut self, node: i32, value: impl FnOnce(SignalType) -> Value) {
        let program = Arc::clone(&self.program);
        let Ok(node) = program.node(NodeId(node as u32)) else {
            return;
        };
        let BlockKind::Inspect(ty) = node.kind else {
            return;
        };
        let variable = match &node.constant {
            Constant::Inspect { variable } => variable.as_deref(),
            _ => None,
        };
        self.ctx
            .inspect_value(&value(ty), ty, variable, node.block_id, node.pos);
    }

    fn menu_item(&mut self, node: i32, var: i32, index: i32, picture: i32) {
        let program = Arc::clone(&self.program);
        let Ok(node) = program.node(NodeId(node as u32)) else {
            return;
        };
        let Constant::Menu {
            name,
            max_buy_count,
            price_increase,
        } = &node.constant
        else {
            return;
        };
        let variable = Self::pointer(var, index).and_then(|ptr| {
            program.variable(ptr.var).map(|decl| VariableRef {
                name: decl.variable.name().to_string(),
                index: ptr.index,
            })
        });
        self.ctx.menu_item(
            variable,
            ObjectId(picture),
            name,
            *max_buy_count,
            *price_increase,
        );
    }
}

type V3 = (f32, f32, f32);
type Q4 = (f32, f32, f32, f32);

fn vec3(x: f32, y: f32, z: f32) -> Vec3 {
    Vec3::new(x, y, z)
}

fn quat(x: f32, y: f32, z: f32, w: f32) -> Quat {
    Quat::from_xyzw(x, y, z, w)
}

fn v3(v: Vec3) -> V3 {
    (v.x, v.y, v.z)
}

fn q4(q: Quat) -> Q4 {
    (q.x, q.y, q.z, q.w)
}

fn flag<T>(present: i32, value: T) -> Option<T> {
    (present != 0).then_some(value)
}

fn name(builtin: Builtin) -> &'static str {
    builtin.descriptor().name
}

type Host<'a> = Caller<'a, HostState>;

/// Define every import of [`crate::builtins::BUILTINS`] on `linker`.
fn link_host(linker: &mut Linker<HostState>) -> Result<(), wasmi::Error> {
    use Builtin as B;
    const ENV: &str = HOST_MODULE;

    // game
    linker.func_wrap(ENV, name(B::Win), |mut host: Host<'_>, delay: i32| {
        host.data_mut().ctx.win(delay)
    })?;
    linker.func_wrap(ENV, name(B::Lose), |mut host: Host<'_>, delay: i32| {
        host.data_mut().ctx.lose(delay)
    })?;
    linker.func_wrap(
        ENV,
        name(B::SetScore),
        |mut host: Host<'_>, has_score: i32, score: f32, has_coins: i32, coins: f32, ranking: i32| {
            host.data_mut()
                .ctx
                .set_score(flag(has_score, score), flag(has_coins, coins), ranking)
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::SetCamera),
        |mut host: Host<'_>,
         has_position: i32,
         px: f32,
         py: f32,
         pz: f32,
         has_rotation: i32,
         rx: f32,
         ry: f32,
         rz: f32,
         rw: f32,
         has_range: i32,
         range: f32,
         perspective: i32| {
            host.data_mut().ctx.set_camera(
                flag(has_position, vec3(px, py, pz)),
                flag(has_rotation, quat(rx, ry, rz, rw)),
                flag(has_range, range),
                perspective != 0,
            )
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::SetLight),
        |mut host: Host<'_>,
         has_position: i32,
         px: f32,
         py: f32,
         pz: f32,
         has_rotation: i32,
         rx: f32,
         ry: f32,
         rz: f32,
         rw: f32| {
            host.data_mut().ctx.set_light(
                flag(has_position, vec3(px, py, pz)),
                flag(has_rotation, quat(rx, ry, rz, rw)),
            )
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::MenuItem),
        |mut host: Host<'_>, node: i32, var: i32, index: i32, picture: i32| {
            host.data_mut().menu_item(node, var, index, picture)
        },
    )?;

    // objects
    linker.func_wrap(
        ENV,
        name(B::GetObjectPosition),
        |mut host: Host<'_>, object: i32| -> (f32, f32, f32, f32, f32, f32, f32) {
            let (p, r) = host.data_mut().ctx.get_object_position(ObjectId(object));
            (p.x, p.y, p.z, r.x, r.y, r.z, r.w)
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::SetPosition),
        |mut host: Host<'_>,
         object: i32,
         has_position: i32,
         px: f32,
         py: f32,
         pz: f32,
         has_rotation: i32,
         rx: f32,
         ry: f32,
         rz: f32,
         rw: f32| {
            host.data_mut().ctx.set_position(
                ObjectId(object),
                flag(has_position, vec3(px, py, pz)),
                flag(has_rotation, quat(rx, ry, rz, rw)),
            )
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::GetSize),
        |mut host: Host<'_>, object: i32| -> (f32, f32, f32, f32, f32, f32) {
            let (min, max) = host.data_mut().ctx.get_size(ObjectId(object));
            (min.x, min.y, min.z, max.x, max.y, max.z)
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::SetVisible),
        |mut host: Host<'_>, object: i32, visible: i32| {
            host.data_mut()
                .ctx
                .set_visible(ObjectId(object), visible != 0)
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::CreateObject),
        |mut host: Host<'_>, original: i32| -> i32 {
            host.data_mut().ctx.create_object(ObjectId(original)).0
        },
    )?;
    linker.func_wrap(ENV, name(B::DestroyObject), |mut host: Host<'_>, object: i32| {
        host.data_mut().ctx.destroy_object(ObjectId(object))
    })?;
    linker.func_wrap(
        ENV,
        name(B::Raycast),
        |mut host: Host<'_>, fx: f32, fy: f32, fz: f32, tx: f32, ty: f32, tz: f32| -> (i32, f32, f32, f32, i32) {
            let hit = host
                .data_mut()
                .ctx
                .raycast(vec3(fx, fy, fz), vec3(tx, ty, tz));
            let (x, y, z) = v3(hit.position);
            (hit.hit as i32, x, y, z, hit.object.0)
        },
    )?;

    // sound
    linker.func_wrap(
        ENV,
        name(B::PlaySound),
        |mut host: Host<'_>, volume: f32, pitch: f32, sound: i32| -> f32 {
            host.data_mut().ctx.play_sound(volume, pitch, sound)
        },
    )?;
    linker.func_wrap(ENV, name(B::StopSound), |mut host: Host<'_>, channel: f32| {
        host.data_mut().ctx.stop_sound(channel)
    })?;
    linker.func_wrap(
        ENV,
        name(B::AdjustVolumePitch),
        |mut host: Host<'_>, channel: f32, has_volume: i32, volume: f32, has_pitch: i32, pitch: f32| {
            host.data_mut().ctx.adjust_volume_pitch(
                channel,
                flag(has_volume, volume),
                flag(has_pitch, pitch),
            )
        },
    )?;

    // physics
    linker.func_wrap(
        ENV,
        name(B::AddForce),
        |mut host: Host<'_>,
         object: i32,
         has_force: i32,
         fx: f32,
         fy: f32,
         fz: f32,
         has_at: i32,
         ax: f32,
         ay: f32,
         az: f32,
         has_torque: i32,
         tx: f32,
         ty: f32,
         tz: f32| {
            host.data_mut().ctx.add_force(
                ObjectId(object),
                flag(has_force, vec3(fx, fy, fz)),
                flag(has_at, vec3(ax, ay, az)),
                flag(has_torque, vec3(tx, ty, tz)),
            )
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::GetVelocity),
        |mut host: Host<'_>, object: i32| -> (f32, f32, f32, f32, f32, f32) {
            let (velocity, spin) = host.data_mut().ctx.get_velocity(ObjectId(object));
            (velocity.x, velocity.y, velocity.z, spin.x, spin.y, spin.z)
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::SetVelocity),
        |mut host: Host<'_>, object: i32, ha: i32, ax: f32, ay: f32, az: f32, hb: i32, bx: f32, by: f32, bz: f32| {
            host.data_mut().ctx.set_velocity(
                ObjectId(object),
                flag(ha, vec3(ax, ay, az)),
                flag(hb, vec3(bx, by, bz)),
            )
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::SetLocked),
        |mut host: Host<'_>, object: i32, ha: i32, ax: f32, ay: f32, az: f32, hb: i32, bx: f32, by: f32, bz: f32| {
            host.data_mut().ctx.set_locked(
                ObjectId(object),
                flag(ha, vec3(ax, ay, az)),
                flag(hb, vec3(bx, by, bz)),
            )
        },
    )?;
    linker.func_wrap(ENV, name(B::SetMass), |mut host: Host<'_>, object: i32, mass: f32| {
        host.data_mut().ctx.set_mass(ObjectId(object), mass)
    })?;
    linker.func_wrap(
        ENV,
        name(B::SetFriction),
        |mut host: Host<'_>, object: i32, friction: f32| {
            host.data_mut().ctx.set_friction(ObjectId(object), friction)
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::SetBounciness),
        |mut host: Host<'_>, object: i32, bounciness: f32| {
            host.data_mut()
                .ctx
                .set_bounciness(ObjectId(object), bounciness)
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::SetGravity),
        |mut host: Host<'_>, x: f32, y: f32, z: f32| host.data_mut().ctx.set_gravity(vec3(x, y, z)),
    )?;
    linker.func_wrap(
        ENV,
        name(B::AddConstraint),
        |mut host: Host<'_>, base: i32, part: i32, has_pivot: i32, x: f32, y: f32, z: f32| -> i32 {
            host.data_mut()
                .ctx
                .add_constraint(ObjectId(base), ObjectId(part), flag(has_pivot, vec3(x, y, z)))
                .0
        },
    )?;

    macro_rules! constraint_setting {
        ($builtin:expr, $method:ident) => {
            linker.func_wrap(
                ENV,
                name($builtin),
                |mut host: Host<'_>,
                 constraint: i32,
                 ha: i32,
                 ax: f32,
                 ay: f32,
                 az: f32,
                 hb: i32,
                 bx: f32,
                 by: f32,
                 bz: f32| {
                    host.data_mut().ctx.$method(
                        ConstraintId(constraint),
                        flag(ha, vec3(ax, ay, az)),
                        flag(hb, vec3(bx, by, bz)),
                    )
                },
            )?;
        };
    }
    constraint_setting!(B::LinearLimits, linear_limits);
    constraint_setting!(B::AngularLimits, angular_limits);
    constraint_setting!(B::LinearSpring, linear_spring);
    constraint_setting!(B::AngularSpring, angular_spring);
    constraint_setting!(B::LinearMotor, linear_motor);
    constraint_setting!(B::AngularMotor, angular_motor);

    // input
    linker.func_wrap(
        ENV,
        name(B::TryGetTouch),
        |mut host: Host<'_>, state: i32, finger: i32| -> (i32, f32, f32) {
            match host
                .data_mut()
                .ctx
                .try_get_touch(TouchState::from_raw(state), finger)
            {
                Some(at) => (1, at.x, at.y),
                None => (0, 0.0, 0.0),
            }
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::TryGetSwipe),
        |mut host: Host<'_>| -> (i32, f32, f32, f32) {
            match host.data_mut().ctx.try_get_swipe() {
                Some(d) => (1, d.x, d.y, d.z),
                None => (0, 0.0, 0.0, 0.0),
            }
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::GetButtonPressed),
        |mut host: Host<'_>, button: i32| -> i32 {
            host.data_mut()
                .ctx
                .get_button_pressed(ButtonType::from_raw(button)) as i32
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::GetJoystickDirection),
        |mut host: Host<'_>, joystick: i32| -> V3 {
            v3(host
                .data_mut()
                .ctx
                .get_joystick_direction(JoystickType::from_raw(joystick)))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::TryGetCollision),
        |mut host: Host<'_>, object: i32| -> (i32, i32, f32, f32, f32, f32) {
            match host.data_mut().ctx.try_get_collision(ObjectId(object)) {
                Some(hit) => (
                    1,
                    hit.object.0,
                    hit.impulse,
                    hit.normal.x,
                    hit.normal.y,
                    hit.normal.z,
                ),
                None => (0, ObjectId::NONE.0, 0.0, 0.0, 0.0, 0.0),
            }
        },
    )?;

    // system
    linker.func_wrap(ENV, name(B::SetRandomSeed), |mut host: Host<'_>, seed: f32| {
        host.data_mut().ctx.set_random_seed(seed)
    })?;
    linker.func_wrap(
        ENV,
        name(B::GetRandomValue),
        |mut host: Host<'_>, min: f32, max: f32| -> f32 {
            host.data_mut().ctx.get_random_value(min, max)
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::ScreenToWorld),
        |mut host: Host<'_>, x: f32, y: f32| -> (f32, f32, f32, f32, f32, f32) {
            let (near, far) = host.data_mut().ctx.screen_to_world(Vec2::new(x, y));
            (near.x, near.y, near.z, far.x, far.y, far.z)
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::WorldToScreen),
        |mut host: Host<'_>, x: f32, y: f32, z: f32| -> (f32, f32) {
            let screen = host.data_mut().ctx.world_to_screen(vec3(x, y, z));
            (screen.x, screen.y)
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::InspectF32),
        |mut host: Host<'_>, node: i32, value: f32| {
            host.data_mut().inspect(node, |_| Value::Float(value))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::InspectVec3),
        |mut host: Host<'_>, node: i32, x: f32, y: f32, z: f32| {
            host.data_mut().inspect(node, |_| Value::Vec3(vec3(x, y, z)))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::InspectRot),
        |mut host: Host<'_>, node: i32, x: f32, y: f32, z: f32, w: f32| {
            host.data_mut().inspect(node, |_| Value::Rot(quat(x, y, z, w)))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::InspectI32),
        |mut host: Host<'_>, node: i32, raw: i32| {
            host.data_mut()
                .inspect(node, |ty| Value::from_i32(ty.to_value(), raw))
        },
    )?;
    linker.func_wrap(ENV, name(B::ScreenSize), |mut host: Host<'_>| -> (f32, f32) {
        let size = host.data_mut().ctx.screen_size();
        (size.x, size.y)
    })?;
    linker.func_wrap(ENV, name(B::Accelerometer), |mut host: Host<'_>| -> V3 {
        v3(host.data_mut().ctx.accelerometer())
    })?;
    linker.func_wrap(ENV, name(B::CurrentFrame), |mut host: Host<'_>| -> i32 {
        host.data_mut().ctx.current_frame() as i32
    })?;
    linker.func_wrap(ENV, name(B::TakingBoxArt), |mut host: Host<'_>| -> i32 {
        host.data_mut().ctx.taking_box_art() as i32
    })?;

    // storage
    linker.func_wrap(
        ENV,
        name(B::VarGetF32),
        |host: Host<'_>, var: i32, index: i32| -> f32 { host.data().var_get(var, index).as_float() },
    )?;
    linker.func_wrap(
        ENV,
        name(B::VarGetVec3),
        |host: Host<'_>, var: i32, index: i32| -> V3 { v3(host.data().var_get(var, index).as_vec3()) },
    )?;
    linker.func_wrap(
        ENV,
        name(B::VarGetRot),
        |host: Host<'_>, var: i32, index: i32| -> Q4 { q4(host.data().var_get(var, index).as_rot()) },
    )?;
    linker.func_wrap(
        ENV,
        name(B::VarGetI32),
        |host: Host<'_>, var: i32, index: i32| -> i32 { host.data().var_get(var, index).as_i32() },
    )?;
    linker.func_wrap(
        ENV,
        name(B::VarSetF32),
        |mut host: Host<'_>, var: i32, index: i32, value: f32| {
            host.data_mut().var_set(var, index, Value::Float(value))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::VarSetVec3),
        |mut host: Host<'_>, var: i32, index: i32, x: f32, y: f32, z: f32| {
            host.data_mut()
                .var_set(var, index, Value::Vec3(vec3(x, y, z)))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::VarSetRot),
        |mut host: Host<'_>, var: i32, index: i32, x: f32, y: f32, z: f32, w: f32| {
            host.data_mut()
                .var_set(var, index, Value::Rot(quat(x, y, z, w)))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::VarSetI32),
        |mut host: Host<'_>, var: i32, index: i32, raw: i32| {
            let state = host.data_mut();
            let value = Value::from_i32(state.var_type(var), raw);
            state.var_set(var, index, value)
        },
    )?;
    linker.func_wrap(ENV, name(B::SlotGetF32), |host: Host<'_>, slot: i32| -> f32 {
        host.data().slots.get(HostState::slot(slot)).as_float()
    })?;
    linker.func_wrap(ENV, name(B::SlotGetVec3), |host: Host<'_>, slot: i32| -> V3 {
        v3(host.data().slots.get(HostState::slot(slot)).as_vec3())
    })?;
    linker.func_wrap(ENV, name(B::SlotGetI32), |host: Host<'_>, slot: i32| -> i32 {
        host.data().slots.get(HostState::slot(slot)).as_i32()
    })?;
    linker.func_wrap(
        ENV,
        name(B::SlotSetF32),
        |mut host: Host<'_>, slot: i32, value: f32| {
            host.data_mut()
                .slots
                .set(HostState::slot(slot), Value::Float(value))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::SlotSetVec3),
        |mut host: Host<'_>, slot: i32, x: f32, y: f32, z: f32| {
            host.data_mut()
                .slots
                .set(HostState::slot(slot), Value::Vec3(vec3(x, y, z)))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::SlotSetI32),
        |mut host: Host<'_>, slot: i32, raw: i32| {
            let state = host.data_mut();
            let value = Value::from_i32(state.slot_type(slot), raw);
            state.slots.set(HostState::slot(slot), value)
        },
    )?;

    // shared math
    linker.func_wrap(ENV, name(B::Modulo), |a: f32, b: f32| -> f32 { math::modulo(a, b) })?;
    linker.func_wrap(ENV, name(B::Power), |a: f32, b: f32| -> f32 { math::power(a, b) })?;
    linker.func_wrap(ENV, name(B::Logarithm), |n: f32, base: f32| -> f32 {
        math::logarithm(n, base)
    })?;
    linker.func_wrap(ENV, name(B::Min), |a: f32, b: f32| -> f32 { math::min(a, b) })?;
    linker.func_wrap(ENV, name(B::Max), |a: f32, b: f32| -> f32 { math::max(a, b) })?;
    linker.func_wrap(ENV, name(B::Sin), |a: f32| -> f32 { math::sin_degrees(a) })?;
    linker.func_wrap(ENV, name(B::Cos), |a: f32| -> f32 { math::cos_degrees(a) })?;
    linker.func_wrap(ENV, name(B::EqualNumbers), |a: f32, b: f32| -> i32 {
        math::numbers_equal(a, b) as i32
    })?;
    linker.func_wrap(
        ENV,
        name(B::EqualVectors),
        |ax: f32, ay: f32, az: f32, bx: f32, by: f32, bz: f32| -> i32 {
            math::vectors_equal(vec3(ax, ay, az), vec3(bx, by, bz)) as i32
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::Rotate),
        |x: f32, y: f32, z: f32, qx: f32, qy: f32, qz: f32, qw: f32| -> V3 {
            v3(math::rotate(vec3(x, y, z), quat(qx, qy, qz, qw)))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::Combine),
        |ax: f32, ay: f32, az: f32, aw: f32, bx: f32, by: f32, bz: f32, bw: f32| -> Q4 {
            q4(math::combine(quat(ax, ay, az, aw), quat(bx, by, bz, bw)))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::Inverse),
        |x: f32, y: f32, z: f32, w: f32| -> Q4 { q4(math::inverse(quat(x, y, z, w))) },
    )?;
    linker.func_wrap(ENV, name(B::Normalize), |x: f32, y: f32, z: f32| -> V3 {
        v3(math::normalize(vec3(x, y, z)))
    })?;
    linker.func_wrap(
        ENV,
        name(B::Dot),
        |ax: f32, ay: f32, az: f32, bx: f32, by: f32, bz: f32| -> f32 {
            math::dot(vec3(ax, ay, az), vec3(bx, by, bz))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::Cross),
        |ax: f32, ay: f32, az: f32, bx: f32, by: f32, bz: f32| -> V3 {
            v3(math::cross(vec3(ax, ay, az), vec3(bx, by, bz)))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::Distance),
        |ax: f32, ay: f32, az: f32, bx: f32, by: f32, bz: f32| -> f32 {
            math::distance(vec3(ax, ay, az), vec3(bx, by, bz))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::Lerp),
        |ax: f32, ay: f32, az: f32, aw: f32, bx: f32, by: f32, bz: f32, bw: f32, amount: f32| -> Q4 {
            q4(math::lerp(quat(ax, ay, az, aw), quat(bx, by, bz, bw), amount))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::AxisAngle),
        |x: f32, y: f32, z: f32, angle: f32| -> Q4 { q4(math::axis_angle(vec3(x, y, z), angle)) },
    )?;
    linker.func_wrap(
        ENV,
        name(B::LineVsPlane),
        |fx: f32,
         fy: f32,
         fz: f32,
         tx: f32,
         ty: f32,
         tz: f32,
         px: f32,
         py: f32,
         pz: f32,
         nx: f32,
         ny: f32,
         nz: f32|
         -> V3 {
            v3(math::line_vs_plane(
                vec3(fx, fy, fz),
                vec3(tx, ty, tz),
                vec3(px, py, pz),
                vec3(nx, ny, nz),
            ))
        },
    )?;
    linker.func_wrap(
        ENV,
        name(B::LookRotation),
        |dx: f32, dy: f32, dz: f32, ux: f32, uy: f32, uz: f32| -> Q4 {
            q4(math::look_rotation(vec3(dx, dy, dz), vec3(ux, uy, uz)))
        },
    )?;
    linker.func_wrap(ENV, name(B::MakeRotation), |x: f32, y: f32, z: f32| -> Q4 {
        q4(math::make_rotation(x, y, z))
    })?;
    linker.func_wrap(
        ENV,
        name(B::BreakRotation),
        |x: f32, y: f32, z: f32, w: f32| -> V3 { v3(math::break_rotation(quat(x, y, z, w))) },
    )?;
    linker.func_wrap(ENV, name(B::LoopCount), |start: f32, stop: f32| -> i32 {
        math::loop_count(start, stop) as i32
    })?;
    linker.func_wrap(
        ENV,
        name(B::LoopCounter),
        |start: f32, stop: f32, k: i32| -> f32 { math::loop_counter(start, stop, k as u32) },
    )?;

    // scheduling
    linker.func_wrap(ENV, name(B::DeferLate), |mut host: Host<'_>, node: i32| {
        host.data_mut().late.push(NodeId(node as u32))
    })?;
    Ok(())
}

/// A program compiled to wasm and instantiated on wasmi.
pub struct CompiledProgram {
    program: Arc<Program>,
    store: Store<HostState>,
    run_frame: TypedFunc<(), ()>,
    run_late: TypedFunc<i32, ()>,
    frames: u64,
}

impl CompiledProgram {
    pub fn new(program: Arc<Program>, ctx: Box<dyn RuntimeContext>) -> Result<Self, CoreError> {
        let artifact = compile_wasm(&program)?;
        let engine = Engine::default();
        let module = Module::new(&engine, &artifact.wasm)?;
        let mut linker = Linker::new(&engine);
        link_host(&mut linker)?;
        let mut store = Store::new(&engine, HostState::new(Arc::clone(&program), ctx));
        let instance = linker.instantiate_and_start(&mut store, &module)?;
        let run_frame = instance.get_typed_func::<(), ()>(&store, RUN_FRAME)?;
        let run_late = instance.get_typed_func::<i32, ()>(&store, RUN_LATE)?;
        Ok(CompiledProgram {
            program,
            store,
            run_frame,
            run_late,
            frames: 0,
        })
    }
}

impl Backend for CompiledProgram {
    fn run_frame(&mut self) -> Result<LateUpdate, CoreError> {
        if self.frames > 0 {
            self.store.data_mut().ctx.advance_frame();
        }
        self.frames += 1;
        self.store.data_mut().late.clear();
        self.run_frame.call(&mut self.store, ())?;
        Ok(LateUpdate {
            tasks: std::mem::take(&mut self.store.data_mut().late),
        })
    }

    fn run_late_update(&mut self, late: LateUpdate) -> Result<(), CoreError> {
        for task in late.tasks {
            let node = self.program.node(task)?;
            if node.kind != BlockKind::LateUpdate {
                return Err(CoreError::invariant(format!(
                    "late task {} is a {:?}",
                    task.0, node.kind
                )));
            }
            self.run_late.call(&mut self.store, task.0 as i32)?;
        }
        // Late Update blocks reached from a late body are not queued again.
        self.store.data_mut().late.clear();
        Ok(())
    }

    fn program(&self) -> &Program {
        &self.program
    }

    fn variables(&self) -> &VariableStore {
        &self.store.data().vars
    }

    fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.store.data_mut().vars
    }

    fn state(&self) -> &StateStore {
        &self.store.data().slots
    }

    fn context_mut(&mut self) -> &mut dyn RuntimeContext {
        self.store.data_mut().ctx.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen_wasm::memo_export;
    use crate::context::HeadlessContext;
    use crate::testing::GraphBuilder;
    use wasmparser::Parser;

    fn headless() -> (Box<dyn RuntimeContext>, crate::context::EffectLog) {
        let ctx = HeadlessContext::new(7);
        let log = ctx.log();
        (Box::new(ctx), log)
    }

    #[test]
    fn emits_a_valid_module() {
        let mut g = GraphBuilder::new();
        let win = g.node(BlockKind::Win);
        let score = g.node(BlockKind::SetScore);
        let random = g.node(BlockKind::Random);
        g.wire(random, "Random", score, "Score");
        g.wire(random, "Random", score, "Coins");
        g.flow(win, "After", score);
        let program = g.build().expect("program");

        let artifact = compile_wasm(&program).expect("compile should succeed");
        let mut parser = Parser::new(0);
        let payload = parser
            .parse(artifact.wasm.as_slice(), true)
            .expect("payload");
        assert!(matches!(payload, wasmparser::Chunk::Parsed { .. }));
        wasmparser::validate(&artifact.wasm).expect("module validates");
        assert_eq!(artifact.memo_functions, 1);
    }

    #[test]
    fn empty_program_compiles_and_runs() {
        let program = GraphBuilder::new().build().expect("program");
        let (ctx, log) = headless();
        let mut compiled = CompiledProgram::new(Arc::new(program), ctx).expect("instantiate");
        let late = compiled.run_frame().expect("frame");
        assert!(late.is_empty());
        assert!(log.lines().is_empty());
    }

    #[test]
    fn memo_function_caches_within_a_frame() {
        let mut g = GraphBuilder::new();
        let score = g.node(BlockKind::SetScore);
        let random = g.node(BlockKind::Random);
        g.wire(random, "Random", score, "Score");
        g.wire(random, "Random", score, "Coins");
        let program = Arc::new(g.build().expect("program"));
        let artifact = compile_wasm(&program).expect("compile");

        let (ctx, log) = headless();
        let engine = Engine::default();
        let module = Module::new(&engine, &artifact.wasm).expect("module");
        let mut linker = Linker::new(&engine);
        link_host(&mut linker).expect("link host");
        let mut store = Store::new(&engine, HostState::new(Arc::clone(&program), ctx));
        let instance = linker
            .instantiate_and_start(&mut store, &module)
            .expect("instantiate");
        let memo = instance
            .get_typed_func::<(), f32>(&store, &memo_export(0))
            .expect("memo export");
        let run_frame = instance
            .get_typed_func::<(), ()>(&store, RUN_FRAME)
            .expect("run_frame");

        run_frame.call(&mut store, ()).expect("frame 1");
        assert_eq!(log.calls("get_random_value").len(), 1);
        let first = memo.call(&mut store, ()).expect("memo");
        assert_eq!(memo.call(&mut store, ()).expect("memo"), first);
        assert_eq!(log.calls("get_random_value").len(), 1);

        run_frame.call(&mut store, ()).expect("frame 2");
        let _ = memo.call(&mut store, ()).expect("memo");
        assert_eq!(log.calls("get_random_value").len(), 2);
    }

    #[test]
    fn host_state_ignores_missing_pointers() {
        let mut g = GraphBuilder::new();
        let inc = g.node(BlockKind::IncrementNumber);
        let inspect = g.node(BlockKind::Inspect(SignalType::Float));
        g.flow(inc, "After", inspect);
        let program = g.build().expect("program");
        let (ctx, log) = headless();
        let mut compiled = CompiledProgram::new(Arc::new(program), ctx).expect("instantiate");
        let _ = compiled.run_frame().expect("frame");
        assert_eq!(log.calls("inspect_value").len(), 1);
    }

    #[test]
    fn rejects_non_late_update_tasks() {
        let mut g = GraphBuilder::new();
        let win = g.node(BlockKind::Win);
        let program = g.build().expect("program");
        let (ctx, _log) = headless();
        let mut compiled = CompiledProgram::new(Arc::new(program), ctx).expect("instantiate");
        let _ = compiled.run_frame().expect("frame");
        let err = compiled
            .run_late_update(LateUpdate {
                tasks: vec![NodeId(win)],
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::Invariant(_)));
    }

    #[test]
    fn late_update_body_runs_after_the_frame() {
        let mut g = GraphBuilder::new();
        let late = g.node(BlockKind::LateUpdate);
        let win = g.node(BlockKind::Win);
        g.flow(late, "After Physics", win);
        let program = g.build().expect("program");
        let (ctx, log) = headless();
        let mut compiled = CompiledProgram::new(Arc::new(program), ctx).expect("instantiate");
        let tasks = compiled.run_frame().expect("frame");
        assert_eq!(tasks.tasks, vec![NodeId(late)]);
        assert!(log.calls("win").is_empty());
        compiled.run_late_update(tasks).expect("late");
        assert_eq!(log.calls("win").len(), 1);
    }
}
