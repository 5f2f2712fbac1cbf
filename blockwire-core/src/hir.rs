//! Analysed program: the backend-neutral form both backends consume.
//!
//! Every custom block has been expanded into its own [`Environment`],
//! every wire has been traced through sub-graph boundaries down to a
//! built-in producer, and entry points, memo points, state slots and
//! variables have been fixed. Backends never look at kind ids or
//! terminal positions again.

use glam::{Quat, Vec3};

use crate::catalog::BlockKind;
use crate::error::CoreError;
use crate::layout::Int3;
use crate::types::{SignalType, Value, VarId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl MemoId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl SlotId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One instantiation of a (possibly nested) graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub graph: u16,
    /// Counts instantiations of the same graph, in discovery order.
    pub instance: u32,
    /// Enclosing environment and the custom-block node that expanded here.
    pub parent: Option<(EnvId, Int3)>,
}

/// Where a variable's storage lives, decided by its name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableScope {
    /// No prefix: one copy per environment.
    Local(EnvId),
    /// `$` prefix: shared by the whole running session.
    Global,
    /// `!` prefix: shared and persisted across save/reload.
    Saved,
}

/// A named, value-typed storage cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    name: String,
    ty: SignalType,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: SignalType) -> Result<Self, CoreError> {
        let name = name.into();
        if ty.is_pointer() || ty == SignalType::Void {
            return Err(CoreError::PointerVariable { name, ty });
        }
        Ok(Variable { name, ty })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> SignalType {
        self.ty
    }

    pub fn scope(&self, env: EnvId) -> VariableScope {
        if self.name.starts_with('!') {
            VariableScope::Saved
        } else if self.name.starts_with('$') {
            VariableScope::Global
        } else {
            VariableScope::Local(env)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDecl {
    pub variable: Variable,
    pub scope: VariableScope,
}

/// A data output of a built-in node, by ordinal among its data outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProducerRef {
    pub node: NodeId,
    pub output: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Unconnected; evaluates to the kind's documented default.
    Default(Value),
    /// Unconnected optional input; reaches the runtime context as `None`.
    Absent,
    Wire {
        src: ProducerRef,
        /// Type of the producing terminal.
        ty: SignalType,
        /// The producer yields a pointer and the consumer wants the value.
        deref: bool,
        memo: Option<MemoId>,
    },
}

/// Per-node constants taken from the node's settings.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Float(f32),
    Vec3(Vec3),
    Rot(Quat),
    Int(i32),
    Ints(i32, i32),
    Flag(bool),
    Variable(VarId),
    Inspect { variable: Option<String> },
    Menu {
        name: String,
        max_buy_count: i32,
        price_increase: i32,
    },
}

impl Constant {
    pub fn float(&self) -> f32 {
        match self {
            Constant::Float(value) => *value,
            _ => 0.0,
        }
    }

    pub fn int(&self) -> i32 {
        match self {
            Constant::Int(value) | Constant::Ints(value, _) => *value,
            _ => 0,
        }
    }

    pub fn second_int(&self) -> i32 {
        match self {
            Constant::Ints(_, value) => *value,
            _ => 0,
        }
    }

    pub fn flag(&self) -> bool {
        matches!(self, Constant::Flag(true))
    }

    pub fn variable(&self) -> Option<VarId> {
        match self {
            Constant::Variable(var) => Some(*var),
            _ => None,
        }
    }
}

/// A built-in node instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub env: EnvId,
    pub pos: Int3,
    pub block_id: u16,
    pub kind: BlockKind,
    pub statement: bool,
    pub constant: Constant,
    /// Data inputs in declaration order.
    pub inputs: Vec<Operand>,
    /// Types of the data outputs in declaration order.
    pub outputs: Vec<SignalType>,
    /// Successor statements per control output; `After` is last.
    pub controls: Vec<Vec<NodeId>>,
    pub slots: Vec<SlotId>,
}

impl Node {
    /// Successors of the `After` terminal.
    pub fn after(&self) -> &[NodeId] {
        self.controls.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Successors of a branch output.
    pub fn branch(&self, index: usize) -> Result<&[NodeId], CoreError> {
        match self.controls.get(index) {
            Some(targets) if index + 1 < self.controls.len() => Ok(targets),
            _ => Err(CoreError::invariant(format!(
                "{:?} at {} has no branch output {index}",
                self.kind, self.pos
            ))),
        }
    }

    pub fn input(&self, index: usize) -> Result<&Operand, CoreError> {
        self.inputs.get(index).ok_or_else(|| {
            CoreError::invariant(format!(
                "{:?} at {} has no input {index}",
                self.kind, self.pos
            ))
        })
    }

    pub fn slot(&self, index: usize) -> Result<SlotId, CoreError> {
        self.slots.get(index).copied().ok_or_else(|| {
            CoreError::invariant(format!(
                "{:?} at {} owns no slot {index}",
                self.kind, self.pos
            ))
        })
    }
}

/// A producer with fan-out > 1, computed at most once per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoPoint {
    pub src: ProducerRef,
    pub ty: SignalType,
    pub consumers: usize,
}

/// Persistent cell owned by exactly one stateful statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotDecl {
    pub owner: NodeId,
    pub purpose: &'static str,
    pub ty: SignalType,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub environments: Vec<Environment>,
    pub nodes: Vec<Node>,
    /// Statements without an incoming control wire, in node order: the main
    /// graph first, then each expanded environment depth-first.
    pub entry_points: Vec<NodeId>,
    pub memo_points: Vec<MemoPoint>,
    pub slots: Vec<SlotDecl>,
    pub variables: Vec<VariableDecl>,
}

impl Program {
    pub fn node(&self, id: NodeId) -> Result<&Node, CoreError> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| CoreError::invariant(format!("no node {}", id.0)))
    }

    pub fn variable(&self, var: VarId) -> Option<&VariableDecl> {
        self.variables.get(var.0 as usize)
    }

    /// Find a variable by name; locals are looked up in the root environment.
    pub fn find_variable(&self, name: &str, ty: SignalType) -> Option<VarId> {
        self.variables
            .iter()
            .position(|decl| {
                decl.variable.name() == name
                    && decl.variable.ty() == ty
                    && matches!(
                        decl.scope,
                        VariableScope::Local(EnvId(0)) | VariableScope::Global | VariableScope::Saved
                    )
            })
            .map(|index| VarId(index as u32))
    }

    /// Slot owned by `owner` for `purpose`.
    pub fn slot_of(&self, owner: NodeId, purpose: &str) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|slot| slot.owner == owner && slot.purpose == purpose)
            .map(|index| SlotId(index as u32))
    }

    /// Late Update sensors, which the compiled backend dispatches by index.
    pub fn late_update_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.kind == BlockKind::LateUpdate)
            .map(|(index, _)| NodeId(index as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_typed_variables_are_rejected() {
        let err = Variable::new("score", SignalType::FloatPtr).unwrap_err();
        assert!(matches!(err, CoreError::PointerVariable { .. }));
        assert!(Variable::new("score", SignalType::Float).is_ok());
    }

    #[test]
    fn name_prefix_selects_scope() {
        let env = EnvId(3);
        let scope = |name: &str| Variable::new(name, SignalType::Float).unwrap().scope(env);
        assert_eq!(scope("x"), VariableScope::Local(env));
        assert_eq!(scope("$x"), VariableScope::Global);
        assert_eq!(scope("!x"), VariableScope::Saved);
    }
}
