//! Host functions imported by every compiled module.
//!
//! The compiled backend keeps only control flow and single-instruction
//! arithmetic inside wasm. Runtime-context calls, variable and slot
//! storage, and every routine from [`crate::math`] are imported from the
//! host, so both backends share one implementation of each.
//!
//! Modules import the whole table, in order, from module `env`; the
//! function index of a builtin is therefore its position here.

use wasm_encoder::ValType;

/// Identifies one host import. Discriminants match table positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    // runtime context: game
    Win,
    Lose,
    SetScore,
    SetCamera,
    SetLight,
    MenuItem,
    // objects
    GetObjectPosition,
    SetPosition,
    GetSize,
    SetVisible,
    CreateObject,
    DestroyObject,
    Raycast,
    // sound
    PlaySound,
    StopSound,
    AdjustVolumePitch,
    // physics
    AddForce,
    GetVelocity,
    SetVelocity,
    SetLocked,
    SetMass,
    SetFriction,
    SetBounciness,
    SetGravity,
    AddConstraint,
    LinearLimits,
    AngularLimits,
    LinearSpring,
    AngularSpring,
    LinearMotor,
    AngularMotor,
    // input
    TryGetTouch,
    TryGetSwipe,
    GetButtonPressed,
    GetJoystickDirection,
    TryGetCollision,
    // system
    SetRandomSeed,
    GetRandomValue,
    ScreenToWorld,
    WorldToScreen,
    InspectF32,
    InspectVec3,
    InspectRot,
    InspectI32,
    ScreenSize,
    Accelerometer,
    CurrentFrame,
    TakingBoxArt,
    // storage
    VarGetF32,
    VarGetVec3,
    VarGetRot,
    VarGetI32,
    VarSetF32,
    VarSetVec3,
    VarSetRot,
    VarSetI32,
    SlotGetF32,
    SlotGetVec3,
    SlotGetI32,
    SlotSetF32,
    SlotSetVec3,
    SlotSetI32,
    // shared math
    Modulo,
    Power,
    Logarithm,
    Min,
    Max,
    Sin,
    Cos,
    EqualNumbers,
    EqualVectors,
    Rotate,
    Combine,
    Inverse,
    Normalize,
    Dot,
    Cross,
    Distance,
    Lerp,
    AxisAngle,
    LineVsPlane,
    LookRotation,
    MakeRotation,
    BreakRotation,
    LoopCount,
    LoopCounter,
    // scheduling
    DeferLate,
}

impl Builtin {
    /// Function index of the import inside a compiled module.
    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn descriptor(self) -> &'static BuiltinDescriptor {
        &BUILTINS[self as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinDescriptor {
    pub builtin: Builtin,
    /// Import module name.
    pub module: &'static str,
    pub name: &'static str,
    pub params: &'static [ValType],
    pub results: &'static [ValType],
}

pub const HOST_MODULE: &str = "env";

const F: ValType = ValType::F32;
const I: ValType = ValType::I32;

const fn host(
    builtin: Builtin,
    name: &'static str,
    params: &'static [ValType],
    results: &'static [ValType],
) -> BuiltinDescriptor {
    BuiltinDescriptor {
        builtin,
        module: HOST_MODULE,
        name,
        params,
        results,
    }
}

// Lane layout: f32 is one lane, vec3 three, rot four (x, y, z, w);
// bool, object and constraint share one i32 lane. An optional input is
// an i32 presence flag followed by its lanes.
pub const BUILTINS: &[BuiltinDescriptor] = &[
    host(Builtin::Win, "win", &[I], &[]),
    host(Builtin::Lose, "lose", &[I], &[]),
    host(Builtin::SetScore, "set_score", &[I, F, I, F, I], &[]),
    host(
        Builtin::SetCamera,
        "set_camera",
        &[I, F, F, F, I, F, F, F, F, I, F, I],
        &[],
    ),
    host(Builtin::SetLight, "set_light", &[I, F, F, F, I, F, F, F, F], &[]),
    host(Builtin::MenuItem, "menu_item", &[I, I, I, I], &[]),
    host(
        Builtin::GetObjectPosition,
        "get_object_position",
        &[I],
        &[F, F, F, F, F, F, F],
    ),
    host(
        Builtin::SetPosition,
        "set_position",
        &[I, I, F, F, F, I, F, F, F, F],
        &[],
    ),
    host(Builtin::GetSize, "get_size", &[I], &[F, F, F, F, F, F]),
    host(Builtin::SetVisible, "set_visible", &[I, I], &[]),
    host(Builtin::CreateObject, "create_object", &[I], &[I]),
    host(Builtin::DestroyObject, "destroy_object", &[I], &[]),
    host(Builtin::Raycast, "raycast", &[F, F, F, F, F, F], &[I, F, F, F, I]),
    host(Builtin::PlaySound, "play_sound", &[F, F, I], &[F]),
    host(Builtin::StopSound, "stop_sound", &[F], &[]),
    host(
        Builtin::AdjustVolumePitch,
        "adjust_volume_pitch",
        &[F, I, F, I, F],
        &[],
    ),
    host(
        Builtin::AddForce,
        "add_force",
        &[I, I, F, F, F, I, F, F, F, I, F, F, F],
        &[],
    ),
    host(Builtin::GetVelocity, "get_velocity", &[I], &[F, F, F, F, F, F]),
    host(
        Builtin::SetVelocity,
        "set_velocity",
        &[I, I, F, F, F, I, F, F, F],
        &[],
    ),
    host(
        Builtin::SetLocked,
        "set_locked",
        &[I, I, F, F, F, I, F, F, F],
        &[],
    ),
    host(Builtin::SetMass, "set_mass", &[I, F], &[]),
    host(Builtin::SetFriction, "set_friction", &[I, F], &[]),
    host(Builtin::SetBounciness, "set_bounciness", &[I, F], &[]),
    host(Builtin::SetGravity, "set_gravity", &[F, F, F], &[]),
    host(Builtin::AddConstraint, "add_constraint", &[I, I, I, F, F, F], &[I]),
    host(
        Builtin::LinearLimits,
        "linear_limits",
        &[I, I, F, F, F, I, F, F, F],
        &[],
    ),
    host(
        Builtin::AngularLimits,
        "angular_limits",
        &[I, I, F, F, F, I, F, F, F],
        &[],
    ),
    host(
        Builtin::LinearSpring,
        "linear_spring",
        &[I, I, F, F, F, I, F, F, F],
        &[],
    ),
    host(
        Builtin::AngularSpring,
        "angular_spring",
        &[I, I, F, F, F, I, F, F, F],
        &[],
    ),
    host(
        Builtin::LinearMotor,
        "linear_motor",
        &[I, I, F, F, F, I, F, F, F],
        &[],
    ),
    host(
        Builtin::AngularMotor,
        "angular_motor",
        &[I, I, F, F, F, I, F, F, F],
        &[],
    ),
    host(Builtin::TryGetTouch, "try_get_touch", &[I, I], &[I, F, F]),
    host(Builtin::TryGetSwipe, "try_get_swipe", &[], &[I, F, F, F]),
    host(Builtin::GetButtonPressed, "get_button_pressed", &[I], &[I]),
    host(
        Builtin::GetJoystickDirection,
        "get_joystick_direction",
        &[I],
        &[F, F, F],
    ),
    host(
        Builtin::TryGetCollision,
        "try_get_collision",
        &[I],
        &[I, I, F, F, F, F],
    ),
    host(Builtin::SetRandomSeed, "set_random_seed", &[F], &[]),
    host(Builtin::GetRandomValue, "get_random_value", &[F, F], &[F]),
    host(Builtin::ScreenToWorld, "screen_to_world", &[F, F], &[F, F, F, F, F, F]),
    host(Builtin::WorldToScreen, "world_to_screen", &[F, F, F], &[F, F]),
    host(Builtin::InspectF32, "inspect_f32", &[I, F], &[]),
    host(Builtin::InspectVec3, "inspect_vec3", &[I, F, F, F], &[]),
    host(Builtin::InspectRot, "inspect_rot", &[I, F, F, F, F], &[]),
    host(Builtin::InspectI32, "inspect_i32", &[I, I], &[]),
    host(Builtin::ScreenSize, "screen_size", &[], &[F, F]),
    host(Builtin::Accelerometer, "accelerometer", &[], &[F, F, F]),
    host(Builtin::CurrentFrame, "current_frame", &[], &[I]),
    host(Builtin::TakingBoxArt, "taking_box_art", &[], &[I]),
    host(Builtin::VarGetF32, "var_get_f32", &[I, I], &[F]),
    host(Builtin::VarGetVec3, "var_get_vec3", &[I, I], &[F, F, F]),
    host(Builtin::VarGetRot, "var_get_rot", &[I, I], &[F, F, F, F]),
    host(Builtin::VarGetI32, "var_get_i32", &[I, I], &[I]),
    host(Builtin::VarSetF32, "var_set_f32", &[I, I, F], &[]),
    host(Builtin::VarSetVec3, "var_set_vec3", &[I, I, F, F, F], &[]),
    host(Builtin::VarSetRot, "var_set_rot", &[I, I, F, F, F, F], &[]),
    host(Builtin::VarSetI32, "var_set_i32", &[I, I, I], &[]),
    host(Builtin::SlotGetF32, "slot_get_f32", &[I], &[F]),
    host(Builtin::SlotGetVec3, "slot_get_vec3", &[I], &[F, F, F]),
    host(Builtin::SlotGetI32, "slot_get_i32", &[I], &[I]),
    host(Builtin::SlotSetF32, "slot_set_f32", &[I, F], &[]),
    host(Builtin::SlotSetVec3, "slot_set_vec3", &[I, F, F, F], &[]),
    host(Builtin::SlotSetI32, "slot_set_i32", &[I, I], &[]),
    host(Builtin::Modulo, "modulo", &[F, F], &[F]),
    host(Builtin::Power, "power", &[F, F], &[F]),
    host(Builtin::Logarithm, "logarithm", &[F, F], &[F]),
    host(Builtin::Min, "min", &[F, F], &[F]),
    host(Builtin::Max, "max", &[F, F], &[F]),
    host(Builtin::Sin, "sin", &[F], &[F]),
    host(Builtin::Cos, "cos", &[F], &[F]),
    host(Builtin::EqualNumbers, "equal_numbers", &[F, F], &[I]),
    host(Builtin::EqualVectors, "equal_vectors", &[F, F, F, F, F, F], &[I]),
    host(Builtin::Rotate, "rotate", &[F, F, F, F, F, F, F], &[F, F, F]),
    host(Builtin::Combine, "combine", &[F, F, F, F, F, F, F, F], &[F, F, F, F]),
    host(Builtin::Inverse, "inverse", &[F, F, F, F], &[F, F, F, F]),
    host(Builtin::Normalize, "normalize", &[F, F, F], &[F, F, F]),
    host(Builtin::Dot, "dot", &[F, F, F, F, F, F], &[F]),
    host(Builtin::Cross, "cross", &[F, F, F, F, F, F], &[F, F, F]),
    host(Builtin::Distance, "distance", &[F, F, F, F, F, F], &[F]),
    host(
        Builtin::Lerp,
        "lerp",
        &[F, F, F, F, F, F, F, F, F],
        &[F, F, F, F],
    ),
    host(Builtin::AxisAngle, "axis_angle", &[F, F, F, F], &[F, F, F, F]),
    host(
        Builtin::LineVsPlane,
        "line_vs_plane",
        &[F, F, F, F, F, F, F, F, F, F, F, F],
        &[F, F, F],
    ),
    host(Builtin::LookRotation, "look_rotation", &[F, F, F, F, F, F], &[F, F, F, F]),
    host(Builtin::MakeRotation, "make_rotation", &[F, F, F], &[F, F, F, F]),
    host(Builtin::BreakRotation, "break_rotation", &[F, F, F, F], &[F, F, F]),
    host(Builtin::LoopCount, "loop_count", &[F, F], &[I]),
    host(Builtin::LoopCounter, "loop_counter", &[F, F, I], &[F]),
    host(Builtin::DeferLate, "defer_late", &[I], &[]),
];

/// Look up a builtin by import name.
///
/// The search is linear over `BUILTINS`; lookups only happen in tooling.
pub fn find_builtin(name: &str) -> Option<&'static BuiltinDescriptor> {
    BUILTINS.iter().find(|descriptor| descriptor.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_positions_match_discriminants() {
        for (position, descriptor) in BUILTINS.iter().enumerate() {
            assert_eq!(descriptor.builtin as usize, position, "{}", descriptor.name);
        }
        assert_eq!(Builtin::DeferLate.index() as usize, BUILTINS.len() - 1);
    }

    #[test]
    fn import_names_are_unique() {
        let names: HashSet<_> = BUILTINS.iter().map(|d| d.name).collect();
        assert_eq!(names.len(), BUILTINS.len());
    }

    #[test]
    fn host_calls_fit_typed_wrappers() {
        // typed host functions take at most 16 parameters and results
        for descriptor in BUILTINS {
            assert!(descriptor.params.len() <= 16, "{}", descriptor.name);
            assert!(descriptor.results.len() <= 16, "{}", descriptor.name);
        }
    }

    #[test]
    fn finds_builtins_by_name() {
        assert_eq!(
            find_builtin("loop_count").map(|d| d.builtin),
            Some(Builtin::LoopCount)
        );
        assert!(find_builtin("missing").is_none());
    }
}
