//! Signal type system shared by every terminal.
//!
//! A signal type is one of seven base tags, and every tag except `Void`
//! also exists as a *pointer*: a reference to a variable storage slot
//! instead of the value itself. The pointer bit is orthogonal to the
//! base tag, so the 13 codes are laid out as `base, base + 1` pairs.

use core::fmt;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Type tag carried by a terminal.
///
/// Value tags use odd codes and the matching pointer tag is the next
/// even code; `Void` (code 0) marks control terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum SignalType {
    Void = 0,
    Float = 1,
    FloatPtr = 2,
    Vec3 = 3,
    Vec3Ptr = 4,
    Rot = 5,
    RotPtr = 6,
    Bool = 7,
    BoolPtr = 8,
    Obj = 9,
    ObjPtr = 10,
    Con = 11,
    ConPtr = 12,
}

impl SignalType {
    pub const ALL: [SignalType; 13] = [
        SignalType::Void,
        SignalType::Float,
        SignalType::FloatPtr,
        SignalType::Vec3,
        SignalType::Vec3Ptr,
        SignalType::Rot,
        SignalType::RotPtr,
        SignalType::Bool,
        SignalType::BoolPtr,
        SignalType::Obj,
        SignalType::ObjPtr,
        SignalType::Con,
        SignalType::ConPtr,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<SignalType> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn is_pointer(self) -> bool {
        let code = self.code();
        code != 0 && code % 2 == 0
    }

    /// Pointer variant of this tag. `Void` has none and maps to itself.
    pub fn to_pointer(self) -> SignalType {
        if self == SignalType::Void || self.is_pointer() {
            self
        } else {
            Self::ALL[self.code() as usize + 1]
        }
    }

    pub fn to_value(self) -> SignalType {
        if self.is_pointer() {
            Self::ALL[self.code() as usize - 1]
        } else {
            self
        }
    }

    /// Whether an output of type `self` may drive an input of type `input`.
    ///
    /// Identical tags always connect; a pointer also drives a value input
    /// of the same base type (the consumer reads through it).
    pub fn can_drive(self, input: SignalType) -> bool {
        self == input || (self.is_pointer() && !input.is_pointer() && self.to_value() == input)
    }

    /// Default value of a value tag. Pointer tags have no default.
    pub fn default_value(self) -> Value {
        match self.to_value() {
            SignalType::Void => Value::Void,
            SignalType::Float => Value::Float(0.0),
            SignalType::Vec3 => Value::Vec3(Vec3::ZERO),
            SignalType::Rot => Value::Rot(Quat::IDENTITY),
            SignalType::Bool => Value::Bool(false),
            SignalType::Obj => Value::Obj(ObjectId::NONE),
            SignalType::Con => Value::Con(ConstraintId::NONE),
            _ => Value::Void,
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.to_value() {
            SignalType::Void => "void",
            SignalType::Float => "float",
            SignalType::Vec3 => "vec3",
            SignalType::Rot => "rot",
            SignalType::Bool => "bool",
            SignalType::Obj => "obj",
            _ => "con",
        };
        if self.is_pointer() {
            write!(f, "{base}*")
        } else {
            f.write_str(base)
        }
    }
}

/// Handle of a game object owned by the runtime context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjectId(pub i32);

impl ObjectId {
    pub const NONE: ObjectId = ObjectId(0);
}

/// Handle of a physics constraint owned by the runtime context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ConstraintId(pub i32);

impl ConstraintId {
    pub const NONE: ConstraintId = ConstraintId(0);
}

/// Index of a declared variable in a built program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

/// Reference to one element of a variable.
///
/// Scalars live at index 0; `List` blocks offset the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pointer {
    pub var: VarId,
    pub index: i32,
}

/// A runtime value flowing over a wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Void,
    Float(f32),
    Vec3(Vec3),
    Rot(Quat),
    Bool(bool),
    Obj(ObjectId),
    Con(ConstraintId),
    Ptr(Pointer),
}

impl Value {
    pub fn as_float(&self) -> f32 {
        match self {
            Value::Float(value) => *value,
            _ => 0.0,
        }
    }

    pub fn as_vec3(&self) -> Vec3 {
        match self {
            Value::Vec3(value) => *value,
            _ => Vec3::ZERO,
        }
    }

    pub fn as_rot(&self) -> Quat {
        match self {
            Value::Rot(value) => *value,
            _ => Quat::IDENTITY,
        }
    }

    pub fn as_bool(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    pub fn as_obj(&self) -> ObjectId {
        match self {
            Value::Obj(value) => *value,
            _ => ObjectId::NONE,
        }
    }

    pub fn as_con(&self) -> ConstraintId {
        match self {
            Value::Con(value) => *value,
            _ => ConstraintId::NONE,
        }
    }

    pub fn as_ptr(&self) -> Option<Pointer> {
        match self {
            Value::Ptr(ptr) => Some(*ptr),
            _ => None,
        }
    }

    /// Integer view used for the bool/object/constraint lane of the
    /// compiled backend.
    pub fn as_i32(&self) -> i32 {
        match self {
            Value::Bool(value) => *value as i32,
            Value::Obj(obj) => obj.0,
            Value::Con(con) => con.0,
            _ => 0,
        }
    }

    /// Rebuild a bool/object/constraint value from its integer lane.
    pub fn from_i32(ty: SignalType, raw: i32) -> Value {
        match ty.to_value() {
            SignalType::Bool => Value::Bool(raw != 0),
            SignalType::Obj => Value::Obj(ObjectId(raw)),
            SignalType::Con => Value::Con(ConstraintId(raw)),
            other => other.default_value(),
        }
    }
}
