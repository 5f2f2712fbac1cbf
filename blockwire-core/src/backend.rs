//! The interface both execution strategies implement.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compiler::CompiledProgram;
use crate::context::RuntimeContext;
use crate::error::CoreError;
use crate::hir::{NodeId, Program};
use crate::interpreter::Interpreter;
use crate::storage::{StateStore, VariableStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Interpreter,
    Compiled,
}

/// Late Update bodies queued during a frame.
///
/// The caller runs its physics step and then hands this back to
/// [`Backend::run_late_update`]. Tasks run in the order they were queued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct LateUpdate {
    pub tasks: Vec<NodeId>,
}

impl LateUpdate {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// An executable program bound to its runtime context and storage.
///
/// `run_frame` is not reentrant; `&mut self` rules out a second call
/// while one is in progress.
pub trait Backend {
    fn run_frame(&mut self) -> Result<LateUpdate, CoreError>;
    fn run_late_update(&mut self, late: LateUpdate) -> Result<(), CoreError>;
    fn program(&self) -> &Program;
    fn variables(&self) -> &VariableStore;
    fn variables_mut(&mut self) -> &mut VariableStore;
    fn state(&self) -> &StateStore;
    fn context_mut(&mut self) -> &mut dyn RuntimeContext;
}

/// Instantiate the requested backend for `program`.
pub fn load_backend(
    kind: BackendKind,
    program: Arc<Program>,
    ctx: Box<dyn RuntimeContext>,
) -> Result<Box<dyn Backend>, CoreError> {
    Ok(match kind {
        BackendKind::Interpreter => Box::new(Interpreter::new(program, ctx)),
        BackendKind::Compiled => Box::new(CompiledProgram::new(program, ctx)?),
    })
}
