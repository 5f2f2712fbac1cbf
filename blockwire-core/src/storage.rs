//! Host-side storage for variables and state-store slots.
//!
//! Both backends read and write through these stores, which keeps the
//! observable end state of a run independent of the backend.

use crate::hir::{Program, SlotId, VariableScope};
use crate::types::{Pointer, SignalType, Value, VarId};

/// Elements a list variable can grow to; writes at or beyond are dropped.
pub const MAX_LIST_LEN: i32 = 65_536;

#[derive(Debug, Clone, PartialEq)]
struct Cell {
    name: String,
    ty: SignalType,
    saved: bool,
    values: Vec<Value>,
}

/// Every declared variable of a program, each one a growable list.
///
/// Scalar access is element 0. Reads outside the list yield the type's
/// default instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableStore {
    cells: Vec<Cell>,
}

/// A `!` variable exported for persistence across save/reload.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedVariable {
    pub name: String,
    pub ty: SignalType,
    pub values: Vec<Value>,
}

impl VariableStore {
    pub fn new(program: &Program) -> Self {
        let cells = program
            .variables
            .iter()
            .map(|decl| Cell {
                name: decl.variable.name().to_string(),
                ty: decl.variable.ty(),
                saved: decl.scope == VariableScope::Saved,
                values: Vec::new(),
            })
            .collect();
        VariableStore { cells }
    }

    pub fn get(&self, ptr: Pointer) -> Value {
        let Some(cell) = self.cells.get(ptr.var.0 as usize) else {
            return Value::Void;
        };
        usize::try_from(ptr.index)
            .ok()
            .and_then(|index| cell.values.get(index).copied())
            .unwrap_or_else(|| cell.ty.default_value())
    }

    pub fn set(&mut self, ptr: Pointer, value: Value) {
        let Some(cell) = self.cells.get_mut(ptr.var.0 as usize) else {
            return;
        };
        if ptr.index < 0 || ptr.index >= MAX_LIST_LEN {
            return;
        }
        let index = ptr.index as usize;
        if index >= cell.values.len() {
            let default = cell.ty.default_value();
            cell.values.resize(index + 1, default);
        }
        cell.values[index] = value;
    }

    pub fn len(&self, var: VarId) -> usize {
        self.cells
            .get(var.0 as usize)
            .map_or(0, |cell| cell.values.len())
    }

    pub fn values(&self, var: VarId) -> &[Value] {
        self.cells
            .get(var.0 as usize)
            .map_or(&[], |cell| cell.values.as_slice())
    }

    /// Iterate `(name, type, elements)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, SignalType, &[Value])> {
        self.cells
            .iter()
            .map(|cell| (cell.name.as_str(), cell.ty, cell.values.as_slice()))
    }

    pub fn saved_snapshot(&self) -> Vec<SavedVariable> {
        self.cells
            .iter()
            .filter(|cell| cell.saved)
            .map(|cell| SavedVariable {
                name: cell.name.clone(),
                ty: cell.ty,
                values: cell.values.clone(),
            })
            .collect()
    }

    /// Import saved variables; entries that match no `!` variable of the
    /// same name and type are skipped.
    pub fn restore_saved(&mut self, saved: &[SavedVariable]) {
        for entry in saved {
            if let Some(cell) = self
                .cells
                .iter_mut()
                .find(|cell| cell.saved && cell.name == entry.name && cell.ty == entry.ty)
            {
                cell.values = entry.values.clone();
            }
        }
    }
}

/// State-store slots, default-initialised from their declared types.
#[derive(Debug, Clone, PartialEq)]
pub struct StateStore {
    slots: Vec<Value>,
}

impl StateStore {
    pub fn new(program: &Program) -> Self {
        StateStore {
            slots: program
                .slots
                .iter()
                .map(|slot| slot.ty.default_value())
                .collect(),
        }
    }

    pub fn get(&self, slot: SlotId) -> Value {
        self.slots.get(slot.index()).copied().unwrap_or(Value::Void)
    }

    pub fn set(&mut self, slot: SlotId, value: Value) {
        if let Some(cell) = self.slots.get_mut(slot.index()) {
            *cell = value;
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.slots
    }
}
