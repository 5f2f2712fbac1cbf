//! Program graph as delivered by the save-format collaborator.
//!
//! Nodes are addressed by their integer position inside the graph; wires
//! join fully qualified terminals. Nothing here is resolved yet: kind ids
//! are raw numbers and terminal positions are raw voxel coordinates.

use serde::{Deserialize, Serialize};

use crate::layout::{Footprint, Int3, TerminalDecl};

/// Per-node constant stored in the save (number value, variable name, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Setting {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec3([f32; 3]),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDecl {
    pub pos: Int3,
    pub kind: u16,
    #[serde(default)]
    pub settings: Vec<Setting>,
}

impl NodeDecl {
    pub fn new(pos: Int3, kind: u16) -> Self {
        NodeDecl {
            pos,
            kind,
            settings: Vec::new(),
        }
    }

    pub fn with_setting(mut self, setting: Setting) -> Self {
        self.settings.push(setting);
        self
    }

    pub fn float_setting(&self, index: usize) -> Option<f32> {
        match self.settings.get(index)? {
            Setting::Float(value) => Some(*value),
            Setting::Int(value) => Some(*value as f32),
            _ => None,
        }
    }

    pub fn int_setting(&self, index: usize) -> Option<i32> {
        match self.settings.get(index)? {
            Setting::Int(value) => Some(*value),
            Setting::Float(value) => Some(*value as i32),
            Setting::Bool(value) => Some(*value as i32),
            _ => None,
        }
    }

    pub fn bool_setting(&self, index: usize) -> Option<bool> {
        match self.settings.get(index)? {
            Setting::Bool(value) => Some(*value),
            Setting::Int(value) => Some(*value != 0),
            _ => None,
        }
    }

    pub fn vec3_setting(&self, index: usize) -> Option<[f32; 3]> {
        match self.settings.get(index)? {
            Setting::Vec3(value) => Some(*value),
            _ => None,
        }
    }

    pub fn text_setting(&self, index: usize) -> Option<&str> {
        match self.settings.get(index)? {
            Setting::Text(value) => Some(value),
            _ => None,
        }
    }
}

/// A wire between two terminals.
///
/// When `is_to_from_outside` is set, one endpoint lies beyond the
/// enclosing custom block: its node position is [`Int3::OUTSIDE`] and its
/// terminal position is the terminal on the custom-block node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: Int3,
    pub from_terminal: Int3,
    pub to: Int3,
    pub to_terminal: Int3,
    #[serde(default)]
    pub is_to_from_outside: bool,
}

impl Connection {
    pub fn new(from: Int3, from_terminal: Int3, to: Int3, to_terminal: Int3) -> Self {
        Connection {
            from,
            from_terminal,
            to,
            to_terminal,
            is_to_from_outside: from == Int3::OUTSIDE || to == Int3::OUTSIDE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramGraph {
    pub id: u16,
    #[serde(default)]
    pub nodes: Vec<NodeDecl>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl ProgramGraph {
    pub fn new(id: u16) -> Self {
        ProgramGraph {
            id,
            ..Default::default()
        }
    }
}

/// A user-authored block that expands to its own graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomBlockDecl {
    pub id: u16,
    pub name: String,
    pub footprint: Footprint,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub terminals: Vec<TerminalDecl>,
    pub graph: ProgramGraph,
}

/// A complete program: the top-level graph plus the custom blocks it uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramDocument {
    pub main: ProgramGraph,
    #[serde(default)]
    pub custom_blocks: Vec<CustomBlockDecl>,
}
