//! Deterministic terminal placement.
//!
//! Terminal positions are what saved wires refer to, so the same block
//! declaration must always produce the same layout. Positions are in
//! voxels relative to the node's origin, eight voxels per footprint cell.
//!
//! ```text
//!            z = depth*8-1   Before (active only)
//!   in  0 ->  ┌─────────┐ -> out 0
//!   in  1 ->  │         │ -> out 1
//!             └─────────┘
//!            z = 0           After (active only)
//! ```
//!
//! Each side is bottom-aligned: the last terminal of a side always sits
//! in the nearest row, so short sides leave the far rows empty.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::SignalType;

pub const VOXELS_PER_CELL: i32 = 8;
/// Height of every terminal above the node floor.
pub const TERMINAL_HEIGHT: i32 = 1;
/// Offset of a terminal inside its cell along the row axis.
const ROW_OFFSET: i32 = 3;
/// Offset of the control terminals along the x axis.
const CONTROL_OFFSET: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 3]", into = "[i32; 3]")]
pub struct Int3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Int3 {
    /// Node position marking the far side of a sub-graph boundary wire.
    pub const OUTSIDE: Int3 = Int3::new(32767, 32767, 32767);

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Int3 { x, y, z }
    }
}

impl From<[i32; 3]> for Int3 {
    fn from([x, y, z]: [i32; 3]) -> Self {
        Int3 { x, y, z }
    }
}

impl From<Int3> for [i32; 3] {
    fn from(value: Int3) -> Self {
        [value.x, value.y, value.z]
    }
}

impl fmt::Display for Int3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Node footprint in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    pub width: i32,
    pub depth: i32,
}

impl Footprint {
    pub const fn new(width: i32, depth: i32) -> Self {
        Footprint { width, depth }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// A terminal as declared by a block definition, before placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalDecl {
    pub ty: SignalType,
    pub dir: Direction,
    #[serde(default)]
    pub name: Option<String>,
}

impl TerminalDecl {
    pub fn new(ty: SignalType, dir: Direction, name: &str) -> Self {
        TerminalDecl {
            ty,
            dir,
            name: Some(name.to_string()),
        }
    }
}

/// A placed terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalDef {
    pub ty: SignalType,
    pub dir: Direction,
    pub name: Option<String>,
    pub index: usize,
    pub pos: Int3,
}

impl TerminalDef {
    pub fn is_control(&self) -> bool {
        self.ty == SignalType::Void
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

pub const BEFORE: &str = "Before";
pub const AFTER: &str = "After";

/// Place every declared terminal of a block.
///
/// Active blocks get `Before` at index 0 and `After` at the last index.
/// Inputs sit on the `x = 0` face and outputs on the opposite face.
pub fn layout(
    block: &str,
    footprint: Footprint,
    decls: &[TerminalDecl],
    active: bool,
) -> Result<Vec<TerminalDef>, CoreError> {
    if footprint.width < 1 || footprint.depth < 1 {
        return Err(CoreError::Layout {
            block: block.to_string(),
            message: format!(
                "footprint {}x{} is empty",
                footprint.width, footprint.depth
            ),
        });
    }

    let inputs = decls.iter().filter(|d| d.dir == Direction::In).count() as i32;
    let outputs = decls.len() as i32 - inputs;
    for (side, count) in [("input", inputs), ("output", outputs)] {
        if count > footprint.depth {
            return Err(CoreError::Layout {
                block: block.to_string(),
                message: format!(
                    "{count} {side} terminals do not fit a depth of {}",
                    footprint.depth
                ),
            });
        }
    }

    let mut terminals = Vec::with_capacity(decls.len() + 2);
    if active {
        terminals.push(TerminalDef {
            ty: SignalType::Void,
            dir: Direction::In,
            name: Some(BEFORE.to_string()),
            index: 0,
            pos: Int3::new(
                CONTROL_OFFSET,
                TERMINAL_HEIGHT,
                footprint.depth * VOXELS_PER_CELL - 1,
            ),
        });
    }

    let (mut seen_in, mut seen_out) = (0, 0);
    for decl in decls {
        let (x, row) = match decl.dir {
            Direction::In => {
                seen_in += 1;
                (0, inputs - seen_in)
            }
            Direction::Out => {
                seen_out += 1;
                (footprint.width * VOXELS_PER_CELL - 1, outputs - seen_out)
            }
        };
        terminals.push(TerminalDef {
            ty: decl.ty,
            dir: decl.dir,
            name: decl.name.clone(),
            index: terminals.len(),
            pos: Int3::new(x, TERMINAL_HEIGHT, row * VOXELS_PER_CELL + ROW_OFFSET),
        });
    }

    if active {
        terminals.push(TerminalDef {
            ty: SignalType::Void,
            dir: Direction::Out,
            name: Some(AFTER.to_string()),
            index: terminals.len(),
            pos: Int3::new(CONTROL_OFFSET, TERMINAL_HEIGHT, 0),
        });
    }

    Ok(terminals)
}
