//! Block catalog: the registry of block definitions.
//!
//! Built-in blocks map a numeric kind id to a [`BlockKind`] through a
//! dense table, once, when the catalog is built. Custom blocks register
//! the id of the sub-graph they expand to. The catalog is read-only
//! after construction and is handed to analysis explicitly.

use std::collections::HashMap;

use glam::{Quat, Vec3};

use crate::ast::CustomBlockDecl;
use crate::error::CoreError;
use crate::layout::{self, Direction, Footprint, Int3, TerminalDecl, TerminalDef};
use crate::types::{SignalType, Value};

/// Semantics of a built-in block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    // game
    Win,
    Lose,
    SetScore,
    SetCamera,
    SetLight,
    ScreenSize,
    Accelerometer,
    CurrentFrame,
    MenuItem,
    // objects
    GetPosition,
    SetPosition,
    Raycast,
    GetSize,
    SetVisible,
    CreateObject,
    DestroyObject,
    // sound
    PlaySound,
    StopSound,
    VolumePitch,
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
    // control
    If,
    PlaySensor,
    LateUpdate,
    BoxArtSensor,
    TouchSensor,
    SwipeSensor,
    Button,
    Joystick,
    Collision,
    Loop,
    // values
    Number,
    Vector,
    Rotation,
    True,
    False,
    Comment,
    Inspect(SignalType),
    // math
    Negate,
    Not,
    Inverse,
    AddNumbers,
    AddVectors,
    SubtractNumbers,
    SubtractVectors,
    Multiply,
    Scale,
    Rotate,
    Combine,
    Divide,
    Modulo,
    Power,
    EqualNumbers,
    EqualVectors,
    EqualObjects,
    EqualTruths,
    LessThan,
    GreaterThan,
    And,
    Or,
    Random,
    RandomSeed,
    Min,
    Max,
    Sin,
    Cos,
    Round,
    Floor,
    Ceiling,
    Absolute,
    Logarithm,
    Normalize,
    DotProduct,
    CrossProduct,
    Distance,
    Lerp,
    AxisAngle,
    ScreenToWorld,
    WorldToScreen,
    LineVsPlane,
    LookRotation,
    MakeVector,
    BreakVector,
    MakeRotation,
    BreakRotation,
    // variables
    GetVariable(SignalType),
    SetVariable(SignalType),
    SetPointer(SignalType),
    List(SignalType),
    IncrementNumber,
    DecrementNumber,
}

/// One declared data or control terminal of a built-in block.
#[derive(Debug, Clone, Copy)]
pub struct Pin {
    pub ty: SignalType,
    pub name: &'static str,
    /// Unconnected optional inputs reach the runtime context as `None`.
    pub optional: bool,
}

const fn pin(ty: SignalType, name: &'static str) -> Pin {
    Pin {
        ty,
        name,
        optional: false,
    }
}

const fn opt(ty: SignalType, name: &'static str) -> Pin {
    Pin {
        ty,
        name,
        optional: true,
    }
}

const fn ctl(name: &'static str) -> Pin {
    pin(SignalType::Void, name)
}

/// Declared shape of a built-in block.
#[derive(Debug, Clone)]
pub struct Shape {
    pub name: String,
    pub footprint: Footprint,
    pub active: bool,
    pub inputs: Vec<Pin>,
    /// Control outputs (`Void`) and data outputs, top to bottom.
    pub outputs: Vec<Pin>,
}

fn shape(
    name: impl Into<String>,
    (width, depth): (i32, i32),
    active: bool,
    inputs: &[Pin],
    outputs: &[Pin],
) -> Shape {
    Shape {
        name: name.into(),
        footprint: Footprint::new(width, depth),
        active,
        inputs: inputs.to_vec(),
        outputs: outputs.to_vec(),
    }
}

fn type_word(ty: SignalType) -> &'static str {
    match ty.to_value() {
        SignalType::Float => "Number",
        SignalType::Vec3 => "Vector",
        SignalType::Rot => "Rotation",
        SignalType::Bool => "Truth",
        SignalType::Obj => "Object",
        _ => "Constraint",
    }
}

impl BlockKind {
    pub fn shape(self) -> Shape {
        use BlockKind as K;
        use SignalType::{Bool as B, Con as C, Float as F, Obj as O, Rot as R, Vec3 as V};

        let obj = pin(O, "Object");
        match self {
            K::Win => shape("Win", (2, 2), true, &[], &[]),
            K::Lose => shape("Lose", (2, 2), true, &[], &[]),
            K::SetScore => shape(
                "Set Score",
                (2, 2),
                true,
                &[opt(F, "Score"), opt(F, "Coins")],
                &[],
            ),
            K::SetCamera => shape(
                "Set Camera",
                (2, 3),
                true,
                &[opt(V, "Position"), opt(R, "Rotation"), opt(F, "Range")],
                &[],
            ),
            K::SetLight => shape(
                "Set Light",
                (2, 2),
                true,
                &[opt(V, "Position"), opt(R, "Rotation")],
                &[],
            ),
            K::ScreenSize => shape(
                "Screen Size",
                (2, 2),
                false,
                &[],
                &[pin(F, "Width"), pin(F, "Height")],
            ),
            K::Accelerometer => shape("Accelerometer", (2, 1), false, &[], &[pin(V, "Direction")]),
            K::CurrentFrame => shape("Current Frame", (2, 1), false, &[], &[pin(F, "Counter")]),
            K::MenuItem => shape(
                "Menu Item",
                (2, 2),
                true,
                &[opt(SignalType::FloatPtr, "Variable"), pin(O, "Picture")],
                &[],
            ),
            K::GetPosition => shape(
                "Get Position",
                (2, 2),
                false,
                &[obj],
                &[pin(V, "Position"), pin(R, "Rotation")],
            ),
            K::SetPosition => shape(
                "Set Position",
                (2, 3),
                true,
                &[obj, opt(V, "Position"), opt(R, "Rotation")],
                &[],
            ),
            K::Raycast => shape(
                "Raycast",
                (2, 3),
                false,
                &[pin(V, "From"), pin(V, "To")],
                &[pin(B, "Hit"), pin(V, "Hit Pos"), pin(O, "Hit Obj")],
            ),
            K::GetSize => shape(
                "Get Size",
                (2, 2),
                false,
                &[obj],
                &[pin(V, "Min"), pin(V, "Max")],
            ),
            K::SetVisible => shape("Set Visible", (2, 2), true, &[obj, pin(B, "Visible")], &[]),
            K::CreateObject => shape(
                "Create Object",
                (2, 2),
                true,
                &[pin(O, "Original")],
                &[pin(O, "Copy")],
            ),
            K::DestroyObject => shape("Destroy Object", (2, 1), true, &[obj], &[]),
            K::PlaySound => shape(
                "Play Sound",
                (2, 2),
                true,
                &[pin(F, "Volume"), pin(F, "Pitch")],
                &[pin(F, "Channel")],
            ),
            K::StopSound => shape("Stop Sound", (2, 1), true, &[pin(F, "Channel")], &[]),
            K::VolumePitch => shape(
                "Volume Pitch",
                (2, 3),
                true,
                &[pin(F, "Channel"), opt(F, "Volume"), opt(F, "Pitch")],
                &[],
            ),
            K::AddForce => shape(
                "Add Force",
                (2, 4),
                true,
                &[obj, opt(V, "Force"), opt(V, "Apply At"), opt(V, "Torque")],
                &[],
            ),
            K::GetVelocity => shape(
                "Get Velocity",
                (2, 2),
                false,
                &[obj],
                &[pin(V, "Velocity"), pin(V, "Spin")],
            ),
            K::SetVelocity => shape(
                "Set Velocity",
                (2, 3),
                true,
                &[obj, opt(V, "Velocity"), opt(V, "Spin")],
                &[],
            ),
            K::SetLocked => shape(
                "Set Locked",
                (2, 3),
                true,
                &[obj, opt(V, "Position"), opt(V, "Rotation")],
                &[],
            ),
            K::SetMass => shape("Set Mass", (2, 2), true, &[obj, pin(F, "Mass")], &[]),
            K::SetFriction => shape("Set Friction", (2, 2), true, &[obj, pin(F, "Friction")], &[]),
            K::SetBounciness => shape(
                "Set Bounciness",
                (2, 2),
                true,
                &[obj, pin(F, "Bounciness")],
                &[],
            ),
            K::SetGravity => shape("Set Gravity", (2, 1), true, &[pin(V, "Gravity")], &[]),
            K::AddConstraint => shape(
                "Add Constraint",
                (2, 3),
                true,
                &[pin(O, "Base"), pin(O, "Part"), opt(V, "Pivot")],
                &[pin(C, "Constraint")],
            ),
            K::LinearLimits | K::AngularLimits => shape(
                if self == K::LinearLimits {
                    "Linear Limits"
                } else {
                    "Angular Limits"
                },
                (2, 3),
                true,
                &[pin(C, "Constraint"), opt(V, "Lower"), opt(V, "Upper")],
                &[],
            ),
            K::LinearSpring | K::AngularSpring => shape(
                if self == K::LinearSpring {
                    "Linear Spring"
                } else {
                    "Angular Spring"
                },
                (2, 3),
                true,
                &[pin(C, "Constraint"), opt(V, "Stiffness"), opt(V, "Damping")],
                &[],
            ),
            K::LinearMotor | K::AngularMotor => shape(
                if self == K::LinearMotor {
                    "Linear Motor"
                } else {
                    "Angular Motor"
                },
                (2, 3),
                true,
                &[pin(C, "Constraint"), opt(V, "Speed"), opt(V, "Force")],
                &[],
            ),
            K::If => shape(
                "If",
                (2, 2),
                true,
                &[pin(B, "Condition")],
                &[ctl("True"), ctl("False")],
            ),
            K::PlaySensor => shape("Play Sensor", (2, 2), true, &[], &[ctl("On Play")]),
            K::LateUpdate => shape("Late Update", (2, 2), true, &[], &[ctl("After Physics")]),
            K::BoxArtSensor => shape("Box Art Sensor", (2, 2), true, &[], &[ctl("On Screenshot")]),
            K::TouchSensor => shape(
                "Touch Sensor",
                (2, 3),
                true,
                &[],
                &[ctl("Touched"), pin(F, "Screen X"), pin(F, "Screen Y")],
            ),
            K::SwipeSensor => shape(
                "Swipe Sensor",
                (2, 2),
                true,
                &[],
                &[ctl("Swiped"), pin(V, "Direction")],
            ),
            K::Button => shape("Button", (2, 2), true, &[], &[ctl("Button")]),
            K::Joystick => shape("Joystick", (2, 2), true, &[], &[pin(V, "Joy Dir")]),
            K::Collision => shape(
                "Collision",
                (2, 4),
                true,
                &[pin(O, "1st Object")],
                &[
                    ctl("Collided"),
                    pin(O, "2nd Object"),
                    pin(F, "Impulse"),
                    pin(V, "Normal"),
                ],
            ),
            K::Loop => shape(
                "Loop",
                (2, 2),
                true,
                &[pin(F, "Start"), pin(F, "Stop")],
                &[ctl("Do"), pin(F, "Counter")],
            ),
            K::Number => shape("Number", (2, 1), false, &[], &[pin(F, "Number")]),
            K::Vector => shape("Vector", (2, 1), false, &[], &[pin(V, "Vector")]),
            K::Rotation => shape("Rotation", (2, 1), false, &[], &[pin(R, "Rotation")]),
            K::True => shape("True", (2, 1), false, &[], &[pin(B, "True")]),
            K::False => shape("False", (2, 1), false, &[], &[pin(B, "False")]),
            K::Comment => shape("Comment", (1, 1), false, &[], &[]),
            K::Inspect(ty) => shape(
                format!("Inspect {}", type_word(ty)),
                (2, 2),
                true,
                &[pin(ty, type_word(ty))],
                &[],
            ),
            K::Negate => unary("Negate", F, "Num", F, "-Num"),
            K::Not => unary("Not", B, "Tru", B, "Not Tru"),
            K::Inverse => unary("Inverse", R, "Rot", R, "Rot Inverse"),
            K::AddNumbers => binary("Add Numbers", F, "Num1", F, "Num2", F, "Sum"),
            K::AddVectors => binary("Add Vectors", V, "Vec1", V, "Vec2", V, "Sum"),
            K::SubtractNumbers => binary("Subtract Numbers", F, "Num1", F, "Num2", F, "Difference"),
            K::SubtractVectors => binary("Subtract Vectors", V, "Vec1", V, "Vec2", V, "Difference"),
            K::Multiply => binary("Multiply", F, "Num1", F, "Num2", F, "Product"),
            K::Scale => binary("Scale", V, "Vec", F, "Num", V, "Product"),
            K::Rotate => binary("Rotate", V, "Vec", R, "Rot", V, "Rotated Vec"),
            K::Combine => binary("Combine", R, "Rot1", R, "Rot2", R, "Rot1 * Rot2"),
            K::Divide => binary("Divide", F, "Num1", F, "Num2", F, "Quotient"),
            K::Modulo => binary("Modulo", F, "Num1", F, "Num2", F, "Remainder"),
            K::Power => binary("Power", F, "Base", F, "Exponent", F, "Power"),
            K::EqualNumbers => binary("Equal Numbers", F, "Num1", F, "Num2", B, "Equal"),
            K::EqualVectors => binary("Equal Vectors", V, "Vec1", V, "Vec2", B, "Equal"),
            K::EqualObjects => binary("Equal Objects", O, "Obj1", O, "Obj2", B, "Equal"),
            K::EqualTruths => binary("Equal Truths", B, "Tru1", B, "Tru2", B, "Equal"),
            K::LessThan => binary("Less Than", F, "Num1", F, "Num2", B, "Less"),
            K::GreaterThan => binary("Greater Than", F, "Num1", F, "Num2", B, "Greater"),
            K::And => binary("And", B, "Tru1", B, "Tru2", B, "And"),
            K::Or => binary("Or", B, "Tru1", B, "Tru2", B, "Or"),
            K::Random => binary("Random", F, "Min", F, "Max", F, "Random"),
            K::RandomSeed => shape("Random Seed", (2, 1), true, &[pin(F, "Seed")], &[]),
            K::Min => binary("Min", F, "Num1", F, "Num2", F, "Min"),
            K::Max => binary("Max", F, "Num1", F, "Num2", F, "Max"),
            K::Sin => unary("Sin", F, "Num", F, "Sin"),
            K::Cos => unary("Cos", F, "Num", F, "Cos"),
            K::Round => unary("Round", F, "Number", F, "Rounded"),
            K::Floor => unary("Floor", F, "Number", F, "Floor"),
            K::Ceiling => unary("Ceiling", F, "Number", F, "Ceiling"),
            K::Absolute => unary("Absolute", F, "Number", F, "Absolute"),
            K::Logarithm => binary("Logarithm", F, "Number", F, "Base", F, "Logarithm"),
            K::Normalize => unary("Normalize", V, "Vector", V, "Normalized"),
            K::DotProduct => binary("Dot Product", V, "Vec1", V, "Vec2", F, "Dot Product"),
            K::CrossProduct => binary("Cross Product", V, "Vec1", V, "Vec2", V, "Cross Product"),
            K::Distance => binary("Distance", V, "Vec1", V, "Vec2", F, "Distance"),
            K::Lerp => shape(
                "Lerp",
                (2, 3),
                false,
                &[pin(R, "From"), pin(R, "To"), pin(F, "Amount")],
                &[pin(R, "Rotation")],
            ),
            K::AxisAngle => binary("Axis Angle", V, "Axis", F, "Angle", R, "Rotation"),
            K::ScreenToWorld => shape(
                "Screen To World",
                (2, 2),
                false,
                &[pin(F, "Screen X"), pin(F, "Screen Y")],
                &[pin(V, "World Near"), pin(V, "World Far")],
            ),
            K::WorldToScreen => shape(
                "World To Screen",
                (2, 2),
                false,
                &[pin(V, "World Pos")],
                &[pin(F, "Screen X"), pin(F, "Screen Y")],
            ),
            K::LineVsPlane => shape(
                "Line vs Plane",
                (2, 4),
                false,
                &[
                    pin(V, "Line From"),
                    pin(V, "Line To"),
                    pin(V, "Plane Point"),
                    pin(V, "Plane Normal"),
                ],
                &[pin(V, "Intersection")],
            ),
            K::LookRotation => binary("Look Rotation", V, "Direction", V, "Up", R, "Rotation"),
            K::MakeVector => shape(
                "Make Vector",
                (2, 3),
                false,
                &[pin(F, "X"), pin(F, "Y"), pin(F, "Z")],
                &[pin(V, "Vector")],
            ),
            K::BreakVector => shape(
                "Break Vector",
                (2, 3),
                false,
                &[pin(V, "Vector")],
                &[pin(F, "X"), pin(F, "Y"), pin(F, "Z")],
            ),
            K::MakeRotation => shape(
                "Make Rotation",
                (2, 3),
                false,
                &[pin(F, "X Angle"), pin(F, "Y Angle"), pin(F, "Z Angle")],
                &[pin(R, "Rotation")],
            ),
            K::BreakRotation => shape(
                "Break Rotation",
                (2, 3),
                false,
                &[pin(R, "Rotation")],
                &[pin(F, "X Angle"), pin(F, "Y Angle"), pin(F, "Z Angle")],
            ),
            K::GetVariable(ty) => shape(
                format!("Get {}", type_word(ty)),
                (2, 1),
                false,
                &[],
                &[pin(ty.to_pointer(), "Variable")],
            ),
            K::SetVariable(ty) => shape(
                format!("Set {}", type_word(ty)),
                (2, 1),
                true,
                &[pin(ty.to_value(), "Value")],
                &[],
            ),
            K::SetPointer(ty) => shape(
                format!("Set {} Ref", type_word(ty)),
                (2, 2),
                true,
                &[pin(ty.to_pointer(), "Variable"), pin(ty.to_value(), "Value")],
                &[],
            ),
            K::List(ty) => shape(
                format!("List {}", type_word(ty)),
                (2, 2),
                false,
                &[pin(ty.to_pointer(), "Variable"), pin(F, "Index")],
                &[pin(ty.to_pointer(), "Element")],
            ),
            K::IncrementNumber => shape(
                "Increase Number",
                (2, 1),
                true,
                &[pin(SignalType::FloatPtr, "Variable")],
                &[],
            ),
            K::DecrementNumber => shape(
                "Decrease Number",
                (2, 1),
                true,
                &[pin(SignalType::FloatPtr, "Variable")],
                &[],
            ),
        }
    }

    /// Value an unconnected input evaluates to.
    ///
    /// Most inputs fall back to their type's default; the exceptions are
    /// part of the individual block's contract.
    pub fn input_default(self, input: usize, ty: SignalType) -> Value {
        match (self, input) {
            (BlockKind::PlaySound, 0 | 1) => Value::Float(1.0),
            (BlockKind::Random, 1) => Value::Float(1.0),
            (BlockKind::Logarithm, 1) => Value::Float(10.0),
            (BlockKind::LookRotation, 1) => Value::Vec3(Vec3::Y),
            (BlockKind::Lerp, 0 | 1) => Value::Rot(Quat::IDENTITY),
            _ => ty.default_value(),
        }
    }

    /// State-store slots owned by every instance of this kind.
    pub fn slots(self) -> &'static [(&'static str, SignalType)] {
        match self {
            BlockKind::Loop => &[("counter", SignalType::Float)],
            BlockKind::PlaySound => &[("channel", SignalType::Float)],
            BlockKind::TouchSensor => &[("touch", SignalType::Vec3)],
            BlockKind::SwipeSensor => &[("swipe", SignalType::Vec3)],
            BlockKind::Joystick => &[("joystick", SignalType::Vec3)],
            BlockKind::Collision => &[
                ("other", SignalType::Obj),
                ("impulse", SignalType::Float),
                ("normal", SignalType::Vec3),
            ],
            BlockKind::CreateObject => &[("created", SignalType::Obj)],
            BlockKind::AddConstraint => &[("constraint", SignalType::Con)],
            BlockKind::MenuItem => &[("registered", SignalType::Bool)],
            _ => &[],
        }
    }

    /// Slot (and vector lane, if only one component is exposed) behind a
    /// statement's data output.
    pub fn output_slot(self, output: usize) -> Option<(usize, Option<u8>)> {
        match (self, output) {
            (BlockKind::TouchSensor, 0) => Some((0, Some(0))),
            (BlockKind::TouchSensor, 1) => Some((0, Some(1))),
            (BlockKind::Collision, 0..=2) => Some((output, None)),
            (
                BlockKind::Loop
                | BlockKind::PlaySound
                | BlockKind::SwipeSensor
                | BlockKind::Joystick
                | BlockKind::CreateObject
                | BlockKind::AddConstraint,
                0,
            ) => Some((0, None)),
            _ => None,
        }
    }

    /// Value type of the variable a Get/Set Variable block names.
    pub fn variable_type(self) -> Option<SignalType> {
        match self {
            BlockKind::GetVariable(ty) | BlockKind::SetVariable(ty) => Some(ty.to_value()),
            _ => None,
        }
    }
}

fn unary(
    name: &str,
    in_ty: SignalType,
    in_name: &'static str,
    out_ty: SignalType,
    out_name: &'static str,
) -> Shape {
    shape(name, (2, 1), false, &[pin(in_ty, in_name)], &[pin(out_ty, out_name)])
}

fn binary(
    name: &str,
    a_ty: SignalType,
    a_name: &'static str,
    b_ty: SignalType,
    b_name: &'static str,
    out_ty: SignalType,
    out_name: &'static str,
) -> Shape {
    shape(
        name,
        (2, 2),
        false,
        &[pin(a_ty, a_name), pin(b_ty, b_name)],
        &[pin(out_ty, out_name)],
    )
}

const VALUE_TYPES: [SignalType; 6] = [
    SignalType::Float,
    SignalType::Obj,
    SignalType::Vec3,
    SignalType::Rot,
    SignalType::Bool,
    SignalType::Con,
];

/// Kind ids of the stock blocks.
fn stock_ids() -> Vec<(u16, BlockKind)> {
    use BlockKind as K;
    use SignalType::*;

    let mut ids = vec![
        (252, K::Win),
        (256, K::Lose),
        (260, K::SetScore),
        (268, K::SetCamera),
        (274, K::SetLight),
        (220, K::ScreenSize),
        (224, K::Accelerometer),
        (564, K::CurrentFrame),
        (584, K::MenuItem),
        (278, K::GetPosition),
        (282, K::SetPosition),
        (228, K::Raycast),
        (489, K::GetSize),
        (306, K::SetVisible),
        (316, K::CreateObject),
        (320, K::DestroyObject),
        (264, K::PlaySound),
        (397, K::StopSound),
        (391, K::VolumePitch),
        (298, K::AddForce),
        (288, K::GetVelocity),
        (292, K::SetVelocity),
        (310, K::SetLocked),
        (328, K::SetMass),
        (332, K::SetFriction),
        (336, K::SetBounciness),
        (324, K::SetGravity),
        (340, K::AddConstraint),
        (346, K::LinearLimits),
        (352, K::AngularLimits),
        (358, K::LinearSpring),
        (364, K::AngularSpring),
        (370, K::LinearMotor),
        (376, K::AngularMotor),
        (234, K::If),
        (238, K::PlaySensor),
        (566, K::LateUpdate),
        (409, K::BoxArtSensor),
        (242, K::TouchSensor),
        (248, K::SwipeSensor),
        (588, K::Button),
        (592, K::Joystick),
        (401, K::Collision),
        (560, K::Loop),
        (36, K::Number),
        (38, K::Vector),
        (42, K::Rotation),
        (449, K::True),
        (451, K::False),
        (15, K::Comment),
        (16, K::Inspect(Float)),
        (20, K::Inspect(Vec3)),
        (24, K::Inspect(Rot)),
        (28, K::Inspect(Bool)),
        (32, K::Inspect(Obj)),
        (90, K::Negate),
        (144, K::Not),
        (440, K::Inverse),
        (92, K::AddNumbers),
        (96, K::AddVectors),
        (100, K::SubtractNumbers),
        (104, K::SubtractVectors),
        (108, K::Multiply),
        (112, K::Scale),
        (116, K::Rotate),
        (120, K::Combine),
        (124, K::Divide),
        (172, K::Modulo),
        (457, K::Power),
        (132, K::EqualNumbers),
        (136, K::EqualVectors),
        (140, K::EqualObjects),
        (421, K::EqualTruths),
        (128, K::LessThan),
        (481, K::GreaterThan),
        (146, K::And),
        (417, K::Or),
        (168, K::Random),
        (485, K::RandomSeed),
        (176, K::Min),
        (180, K::Max),
        (413, K::Sin),
        (453, K::Cos),
        (184, K::Round),
        (186, K::Floor),
        (188, K::Ceiling),
        (455, K::Absolute),
        (580, K::Logarithm),
        (578, K::Normalize),
        (570, K::DotProduct),
        (574, K::CrossProduct),
        (190, K::Distance),
        (194, K::Lerp),
        (200, K::AxisAngle),
        (216, K::ScreenToWorld),
        (477, K::WorldToScreen),
        (206, K::LineVsPlane),
        (204, K::LookRotation),
        (150, K::MakeVector),
        (156, K::BreakVector),
        (162, K::MakeRotation),
        (442, K::BreakRotation),
        (556, K::IncrementNumber),
        (558, K::DecrementNumber),
    ];

    let families: [([u16; 6], fn(SignalType) -> BlockKind); 4] = [
        ([46, 48, 50, 52, 54, 56], K::GetVariable),
        ([428, 430, 432, 434, 436, 438], K::SetVariable),
        ([58, 62, 66, 70, 74, 78], K::SetPointer),
        ([82, 86, 461, 465, 469, 473], K::List),
    ];
    for (family_ids, make) in families {
        for (id, ty) in family_ids.into_iter().zip(VALUE_TYPES) {
            ids.push((id, make(ty)));
        }
    }
    ids
}

/// How a definition is realised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Builtin(BlockKind),
    /// Expands to the sub-graph with this id.
    Custom(u16),
    /// Present in saves but without semantics (comments).
    Inert,
}

#[derive(Debug, Clone)]
pub struct BlockDef {
    pub id: u16,
    pub name: String,
    pub footprint: Footprint,
    pub active: bool,
    pub terminals: Vec<TerminalDef>,
    pub template: Template,
    /// Optional flag per data input, in data-input order.
    pub optional: Vec<bool>,
}

impl BlockDef {
    pub fn terminal_at(&self, pos: Int3) -> Option<&TerminalDef> {
        self.terminals.iter().find(|t| t.pos == pos)
    }

    pub fn before(&self) -> Option<&TerminalDef> {
        self.terminals
            .iter()
            .find(|t| t.is_control() && t.dir == Direction::In)
    }

    pub fn data_inputs(&self) -> impl Iterator<Item = &TerminalDef> {
        self.terminals
            .iter()
            .filter(|t| !t.is_control() && t.dir == Direction::In)
    }

    pub fn data_outputs(&self) -> impl Iterator<Item = &TerminalDef> {
        self.terminals
            .iter()
            .filter(|t| !t.is_control() && t.dir == Direction::Out)
    }

    /// Branch outputs in declaration order, `After` last.
    pub fn control_outputs(&self) -> impl Iterator<Item = &TerminalDef> {
        self.terminals
            .iter()
            .filter(|t| t.is_control() && t.dir == Direction::Out)
    }

    /// Ordinal of a terminal among its own group (data in, data out or
    /// control out), as used by the analysed program.
    pub fn ordinal(&self, terminal: &TerminalDef) -> usize {
        self.terminals[..terminal.index]
            .iter()
            .filter(|t| t.dir == terminal.dir && t.is_control() == terminal.is_control())
            .count()
    }
}

/// Registry of block definitions keyed by kind id.
#[derive(Debug, Clone, Default)]
pub struct BlockCatalog {
    defs: HashMap<u16, BlockDef>,
    stock: HashMap<BlockKind, u16>,
}

impl BlockCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog holding every built-in block.
    pub fn stock() -> Result<Self, CoreError> {
        let mut catalog = Self::empty();
        for (id, kind) in stock_ids() {
            catalog.register_builtin(id, kind)?;
        }
        Ok(catalog)
    }

    pub fn register_builtin(&mut self, id: u16, kind: BlockKind) -> Result<(), CoreError> {
        let shape = kind.shape();
        let decls: Vec<TerminalDecl> = shape
            .inputs
            .iter()
            .map(|pin| TerminalDecl::new(pin.ty, Direction::In, pin.name))
            .chain(
                shape
                    .outputs
                    .iter()
                    .map(|pin| TerminalDecl::new(pin.ty, Direction::Out, pin.name)),
            )
            .collect();
        let terminals = layout::layout(&shape.name, shape.footprint, &decls, shape.active)?;
        let template = if kind == BlockKind::Comment {
            Template::Inert
        } else {
            Template::Builtin(kind)
        };
        self.insert(BlockDef {
            id,
            name: shape.name,
            footprint: shape.footprint,
            active: shape.active,
            terminals,
            template,
            optional: shape.inputs.iter().map(|pin| pin.optional).collect(),
        })?;
        self.stock.insert(kind, id);
        Ok(())
    }

    /// Register a custom block; its terminals are laid out like any other.
    pub fn register_custom(&mut self, decl: &CustomBlockDecl) -> Result<(), CoreError> {
        let terminals = layout::layout(&decl.name, decl.footprint, &decl.terminals, decl.active)?;
        let inputs = decl
            .terminals
            .iter()
            .filter(|t| t.dir == Direction::In && t.ty != SignalType::Void)
            .count();
        self.insert(BlockDef {
            id: decl.id,
            name: decl.name.clone(),
            footprint: decl.footprint,
            active: decl.active,
            terminals,
            template: Template::Custom(decl.graph.id),
            optional: vec![false; inputs],
        })
    }

    fn insert(&mut self, def: BlockDef) -> Result<(), CoreError> {
        if self.defs.contains_key(&def.id) {
            return Err(CoreError::DuplicateKind(def.id));
        }
        self.defs.insert(def.id, def);
        Ok(())
    }

    pub fn get(&self, id: u16) -> Option<&BlockDef> {
        self.defs.get(&id)
    }

    /// Kind id of a registered built-in.
    pub fn id_of(&self, kind: BlockKind) -> Option<u16> {
        self.stock.get(&kind).copied()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
