use std::path::PathBuf;

use thiserror::Error;

use crate::layout::Int3;
use crate::types::SignalType;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read graph document: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("malformed graph document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("custom block library directory was not found at {0}")]
    MissingLibrary(PathBuf),
    #[error("unknown block kind id {id} at {pos}")]
    UnknownKind { id: u16, pos: Int3 },
    #[error("block kind id {0} is registered twice")]
    DuplicateKind(u16),
    #[error("graph {0} is referenced but was never declared")]
    UnknownGraph(u16),
    #[error("layout error for '{block}': {message}")]
    Layout { block: String, message: String },
    #[error("no terminal at {terminal} on node at {node}")]
    UnknownTerminal { node: Int3, terminal: Int3 },
    #[error("no node at {0}")]
    DanglingWire(Int3),
    #[error("input terminal {terminal} on node at {node} has more than one driver")]
    MultipleDrivers { node: Int3, terminal: Int3 },
    #[error("wire into {node} carries {found} but the terminal expects {expected}")]
    TypeMismatch {
        node: Int3,
        expected: SignalType,
        found: SignalType,
    },
    #[error("variable '{name}' cannot have pointer type {ty}")]
    PointerVariable { name: String, ty: SignalType },
    #[error("expression cycle through node at {0}")]
    Cycle(Int3),
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("wasm backend error: {0}")]
    Wasm(String),
}

impl From<wasmi::Error> for CoreError {
    fn from(err: wasmi::Error) -> Self {
        CoreError::Wasm(err.to_string())
    }
}

impl CoreError {
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        CoreError::Invariant(message.into())
    }
}
