//! Test helpers for assembling program graphs by terminal name.

use glam::Vec3;

use crate::analysis::build_program;
use crate::ast::{Connection, CustomBlockDecl, NodeDecl, ProgramDocument, ProgramGraph, Setting};
use crate::catalog::{BlockCatalog, BlockKind};
use crate::error::CoreError;
use crate::hir::{NodeId, Program};
use crate::layout::{self, Direction, Footprint, Int3, TerminalDecl, TerminalDef, BEFORE};
use crate::types::SignalType;

/// Builds one graph node by node. Node handles are indices into the
/// graph's node list, which match [`NodeId`]s while the graph holds only
/// built-in blocks.
pub(crate) struct GraphBuilder {
    catalog: BlockCatalog,
    graph: ProgramGraph,
    custom_blocks: Vec<CustomBlockDecl>,
    /// Terminals of the custom block this graph implements, if any.
    boundary: Vec<TerminalDef>,
    custom_shape: Option<(Footprint, bool, Vec<TerminalDecl>)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        GraphBuilder {
            catalog: BlockCatalog::stock().expect("stock catalog"),
            graph: ProgramGraph::new(0),
            custom_blocks: Vec::new(),
            boundary: Vec::new(),
            custom_shape: None,
        }
    }

    /// Builder for the inside of a custom block with the given shape.
    pub fn custom(graph_id: u16, footprint: Footprint, active: bool, terminals: Vec<TerminalDecl>) -> Self {
        let boundary = layout::layout("custom", footprint, &terminals, active).expect("layout");
        GraphBuilder {
            graph: ProgramGraph::new(graph_id),
            boundary,
            custom_shape: Some((footprint, active, terminals)),
            ..GraphBuilder::new()
        }
    }

    fn place(&mut self, kind: u16) -> u32 {
        let index = self.graph.nodes.len() as i32;
        self.graph
            .nodes
            .push(NodeDecl::new(Int3::new(index * 4, 0, index * 4), kind));
        index as u32
    }

    pub fn node(&mut self, kind: BlockKind) -> u32 {
        let id = self.catalog.id_of(kind).expect("stock kind");
        self.place(id)
    }

    pub fn raw_node(&mut self, kind: u16) -> u32 {
        self.place(kind)
    }

    pub fn setting(&mut self, node: u32, setting: Setting) {
        self.graph.nodes[node as usize].settings.push(setting);
    }

    pub fn number(&mut self, value: f32) -> u32 {
        let node = self.node(BlockKind::Number);
        self.setting(node, Setting::Float(value));
        node
    }

    pub fn vector(&mut self, value: Vec3) -> u32 {
        let node = self.node(BlockKind::Vector);
        self.setting(node, Setting::Vec3(value.to_array()));
        node
    }

    pub fn get_variable(&mut self, name: &str, ty: SignalType) -> u32 {
        let node = self.node(BlockKind::GetVariable(ty));
        self.setting(node, Setting::Text(name.to_string()));
        node
    }

    pub fn set_variable(&mut self, name: &str, ty: SignalType) -> u32 {
        let node = self.node(BlockKind::SetVariable(ty));
        self.setting(node, Setting::Text(name.to_string()));
        node
    }

    fn terminal(&self, node: u32, name: &str, dir: Direction) -> Int3 {
        let decl = &self.graph.nodes[node as usize];
        let def = self.catalog.get(decl.kind).expect("registered kind");
        def.terminals
            .iter()
            .find(|t| t.name() == name && t.dir == dir)
            .unwrap_or_else(|| panic!("{} has no {dir:?} terminal {name}", def.name))
            .pos
    }

    fn boundary_terminal(&self, name: &str, dir: Direction) -> Int3 {
        self.boundary
            .iter()
            .find(|t| t.name() == name && t.dir == dir)
            .unwrap_or_else(|| panic!("custom block has no {dir:?} terminal {name}"))
            .pos
    }

    pub fn wire(&mut self, from: u32, output: &str, to: u32, input: &str) {
        let from_terminal = self.terminal(from, output, Direction::Out);
        let to_terminal = self.terminal(to, input, Direction::In);
        let (from, to) = (self.graph.nodes[from as usize].pos, self.graph.nodes[to as usize].pos);
        self.graph
            .connections
            .push(Connection::new(from, from_terminal, to, to_terminal));
    }

    /// Control wire from `output` of `from` into the `Before` of `to`.
    pub fn flow(&mut self, from: u32, output: &str, to: u32) {
        self.wire(from, output, to, BEFORE);
    }

    /// Wire from one of the enclosing custom block's inputs.
    pub fn from_outside(&mut self, terminal: &str, to: u32, input: &str) {
        let from_terminal = self.boundary_terminal(terminal, Direction::In);
        let to_terminal = self.terminal(to, input, Direction::In);
        let to = self.graph.nodes[to as usize].pos;
        self.graph
            .connections
            .push(Connection::new(Int3::OUTSIDE, from_terminal, to, to_terminal));
    }

    /// Wire into one of the enclosing custom block's outputs.
    pub fn to_outside(&mut self, from: u32, output: &str, terminal: &str) {
        let from_terminal = self.terminal(from, output, Direction::Out);
        let to_terminal = self.boundary_terminal(terminal, Direction::Out);
        let from = self.graph.nodes[from as usize].pos;
        self.graph
            .connections
            .push(Connection::new(from, from_terminal, Int3::OUTSIDE, to_terminal));
    }

    /// Register `inner` as custom block `id` and place one instance of it.
    pub fn add_custom(&mut self, id: u16, inner: GraphBuilder) -> u32 {
        let (footprint, active, terminals) = inner.custom_shape.expect("custom builder");
        let decl = CustomBlockDecl {
            id,
            name: format!("Custom {id}"),
            footprint,
            active,
            terminals,
            graph: inner.graph,
        };
        for nested in inner.custom_blocks {
            if self.catalog.get(nested.id).is_none() {
                self.catalog.register_custom(&nested).expect("register nested block");
                self.custom_blocks.push(nested);
            }
        }
        if self.catalog.get(id).is_none() {
            self.catalog.register_custom(&decl).expect("register custom block");
            self.custom_blocks.push(decl);
        }
        self.place(id)
    }

    /// Place another instance of an already registered custom block.
    pub fn custom_instance(&mut self, id: u16) -> u32 {
        self.place(id)
    }

    pub fn document(&self) -> ProgramDocument {
        ProgramDocument {
            main: self.graph.clone(),
            custom_blocks: self.custom_blocks.clone(),
        }
    }

    pub fn catalog(&self) -> &BlockCatalog {
        &self.catalog
    }

    pub fn build(&self) -> Result<Program, CoreError> {
        build_program(&self.catalog, &self.document())
    }
}

/// An active custom block whose only content is a Win statement driven
/// from the block's `Before`, placed after a Lose statement.
///
/// Returns the catalog, document, the Lose node and the inner Win node.
pub(crate) fn custom_block_fixture() -> (BlockCatalog, ProgramDocument, NodeId, NodeId) {
    let mut inner = GraphBuilder::custom(7, Footprint::new(2, 2), true, Vec::new());
    let win = inner.node(BlockKind::Win);
    inner.from_outside(BEFORE, win, BEFORE);

    let mut outer = GraphBuilder::new();
    let lose = outer.node(BlockKind::Lose);
    let custom = outer.add_custom(1000, inner);
    outer.flow(lose, "After", custom);

    (
        outer.catalog().clone(),
        outer.document(),
        NodeId(lose),
        NodeId(1),
    )
}
