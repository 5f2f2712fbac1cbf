//! Graph analysis: from a program document to an analysed [`Program`].
//!
//! The pass runs in four steps:
//!
//! 1. expand every custom block into its own environment, iteratively,
//!    with an explicit stack of pending instantiations;
//! 2. index each environment's connections backward (input terminal to
//!    driver) and forward (output terminal to consumers);
//! 3. build one node per built-in instance, tracing every wire through
//!    sub-graph boundaries until it reaches a built-in terminal;
//! 4. derive entry points, memo points, state slots and variables.

use std::collections::{HashMap, HashSet};

use crate::ast::{Connection, NodeDecl, ProgramDocument, ProgramGraph};
use crate::catalog::{BlockCatalog, BlockDef, BlockKind, Template};
use crate::error::CoreError;
use crate::hir::{
    Constant, EnvId, Environment, MemoId, MemoPoint, Node, NodeId, Operand, ProducerRef, Program,
    SlotDecl, SlotId, Variable, VariableDecl, VariableScope,
};
use crate::layout::{Direction, Int3};
use crate::math;
use crate::types::{SignalType, VarId};

#[derive(Clone, Copy)]
enum Member<'a> {
    Builtin(NodeId, &'a BlockDef),
    /// Filled in once the child environment has been created.
    Custom(Option<EnvId>, &'a BlockDef),
    Inert(&'a BlockDef),
}

impl<'a> Member<'a> {
    fn def(&self) -> &'a BlockDef {
        match *self {
            Member::Builtin(_, def) | Member::Custom(_, def) | Member::Inert(def) => def,
        }
    }
}

type TerminalKey = (Int3, Int3);

struct Scope<'a> {
    graph: &'a ProgramGraph,
    parent: Option<(EnvId, Int3)>,
    members: HashMap<Int3, Member<'a>>,
    /// Data input terminal to its single incoming wire.
    drivers: HashMap<TerminalKey, &'a Connection>,
    /// Control input terminal to every incoming wire.
    control_in: HashMap<TerminalKey, Vec<&'a Connection>>,
    /// Output terminal to its outgoing wires, in declaration order.
    fanout: HashMap<TerminalKey, Vec<&'a Connection>>,
}

struct Instance<'a> {
    env: EnvId,
    decl: &'a NodeDecl,
    def: &'a BlockDef,
    kind: BlockKind,
}

struct Builder<'a> {
    catalog: &'a BlockCatalog,
    document: &'a ProgramDocument,
    environments: Vec<Environment>,
    scopes: Vec<Scope<'a>>,
    instances: Vec<Instance<'a>>,
    variables: Vec<VariableDecl>,
    variable_ids: HashMap<(VariableScope, String, SignalType), VarId>,
    /// Upper bound on boundary hops while tracing one wire.
    max_hops: usize,
}

/// Analyse `document` against `catalog`.
///
/// The catalog must already hold every custom block the document uses.
pub fn build_program(
    catalog: &BlockCatalog,
    document: &ProgramDocument,
) -> Result<Program, CoreError> {
    let mut builder = Builder {
        catalog,
        document,
        environments: Vec::new(),
        scopes: Vec::new(),
        instances: Vec::new(),
        variables: Vec::new(),
        variable_ids: HashMap::new(),
        max_hops: 0,
    };
    builder.expand()?;
    builder.index()?;
    builder.finish()
}

impl<'a> Builder<'a> {
    fn expand(&mut self) -> Result<(), CoreError> {
        let graphs: HashMap<u16, &'a ProgramGraph> = self
            .document
            .custom_blocks
            .iter()
            .map(|block| (block.graph.id, &block.graph))
            .collect();
        let mut instance_counts: HashMap<u16, u32> = HashMap::new();
        let mut stack: Vec<(&'a ProgramGraph, Option<(EnvId, Int3)>)> =
            vec![(&self.document.main, None)];

        while let Some((graph, parent)) = stack.pop() {
            let env = EnvId(self.scopes.len() as u32);
            let count = instance_counts.entry(graph.id).or_insert(0);
            let instance = *count;
            *count += 1;

            if let Some((parent_env, pos)) = parent {
                if let Some(Member::Custom(child, _)) = self.scopes[parent_env.0 as usize]
                    .members
                    .get_mut(&pos)
                {
                    *child = Some(env);
                }
            }

            let mut members = HashMap::new();
            let mut children = Vec::new();
            for decl in &graph.nodes {
                let def = self.catalog.get(decl.kind).ok_or(CoreError::UnknownKind {
                    id: decl.kind,
                    pos: decl.pos,
                })?;
                let member = match def.template {
                    Template::Builtin(kind) => {
                        let id = NodeId(self.instances.len() as u32);
                        self.instances.push(Instance {
                            env,
                            decl,
                            def,
                            kind,
                        });
                        Member::Builtin(id, def)
                    }
                    Template::Custom(graph_id) => {
                        let inner = *graphs
                            .get(&graph_id)
                            .ok_or(CoreError::UnknownGraph(graph_id))?;
                        if self.contains_graph(parent, graph.id, graph_id) {
                            return Err(CoreError::invariant(format!(
                                "custom block graph {graph_id} instantiates itself"
                            )));
                        }
                        children.push((inner, Some((env, decl.pos))));
                        Member::Custom(None, def)
                    }
                    Template::Inert => Member::Inert(def),
                };
                if members.insert(decl.pos, member).is_some() {
                    return Err(CoreError::invariant(format!(
                        "two nodes share position {} in graph {}",
                        decl.pos, graph.id
                    )));
                }
            }

            tracing::debug!(
                env = env.0,
                graph = graph.id,
                instance,
                nodes = graph.nodes.len(),
                "expanded environment"
            );
            self.environments.push(Environment {
                graph: graph.id,
                instance,
                parent,
            });
            self.scopes.push(Scope {
                graph,
                parent,
                members,
                drivers: HashMap::new(),
                control_in: HashMap::new(),
                fanout: HashMap::new(),
            });
            stack.extend(children.into_iter().rev());
        }
        Ok(())
    }

    /// Whether `graph_id` is the graph being expanded or one of its
    /// enclosing graphs.
    fn contains_graph(&self, mut parent: Option<(EnvId, Int3)>, current: u16, graph_id: u16) -> bool {
        if current == graph_id {
            return true;
        }
        while let Some((env, _)) = parent {
            if self.environments[env.0 as usize].graph == graph_id {
                return true;
            }
            parent = self.environments[env.0 as usize].parent;
        }
        false
    }

    fn member(&self, env: EnvId, pos: Int3) -> Result<Member<'a>, CoreError> {
        self.scopes[env.0 as usize]
            .members
            .get(&pos)
            .copied()
            .ok_or(CoreError::DanglingWire(pos))
    }

    /// Definition owning the terminals at `pos`; for [`Int3::OUTSIDE`] this
    /// is the custom block the environment expands.
    fn owner(&self, env: EnvId, pos: Int3) -> Result<&'a BlockDef, CoreError> {
        if pos == Int3::OUTSIDE {
            let (parent, custom) = self.scopes[env.0 as usize]
                .parent
                .ok_or(CoreError::DanglingWire(pos))?;
            return Ok(self.member(parent, custom)?.def());
        }
        Ok(self.member(env, pos)?.def())
    }

    fn index(&mut self) -> Result<(), CoreError> {
        let mut total = 0;
        for index in 0..self.scopes.len() {
            let env = EnvId(index as u32);
            let graph = self.scopes[index].graph;
            let mut drivers = HashMap::new();
            let mut control_in: HashMap<TerminalKey, Vec<&'a Connection>> = HashMap::new();
            let mut fanout: HashMap<TerminalKey, Vec<&'a Connection>> = HashMap::new();

            for conn in &graph.connections {
                let from_def = self.owner(env, conn.from)?;
                let to_def = self.owner(env, conn.to)?;
                let from = from_def
                    .terminal_at(conn.from_terminal)
                    .ok_or(CoreError::UnknownTerminal {
                        node: conn.from,
                        terminal: conn.from_terminal,
                    })?;
                let to = to_def
                    .terminal_at(conn.to_terminal)
                    .ok_or(CoreError::UnknownTerminal {
                        node: conn.to,
                        terminal: conn.to_terminal,
                    })?;

                // Seen from inside, the custom block's inputs are sources
                // and its outputs are sinks.
                let source_dir = if conn.from == Int3::OUTSIDE {
                    Direction::In
                } else {
                    Direction::Out
                };
                let sink_dir = if conn.to == Int3::OUTSIDE {
                    Direction::Out
                } else {
                    Direction::In
                };
                if from.dir != source_dir || to.dir != sink_dir {
                    return Err(CoreError::invariant(format!(
                        "wire from {} {} to {} {} runs against terminal directions",
                        conn.from, conn.from_terminal, conn.to, conn.to_terminal
                    )));
                }
                if from.is_control() != to.is_control() || !from.ty.can_drive(to.ty) {
                    return Err(CoreError::TypeMismatch {
                        node: conn.to,
                        expected: to.ty,
                        found: from.ty,
                    });
                }

                let sink = (conn.to, conn.to_terminal);
                if to.is_control() {
                    control_in.entry(sink).or_default().push(conn);
                } else if drivers.insert(sink, conn).is_some() {
                    return Err(CoreError::MultipleDrivers {
                        node: conn.to,
                        terminal: conn.to_terminal,
                    });
                }
                fanout
                    .entry((conn.from, conn.from_terminal))
                    .or_default()
                    .push(conn);
                total += 1;
            }

            let scope = &mut self.scopes[index];
            scope.drivers = drivers;
            scope.control_in = control_in;
            scope.fanout = fanout;
        }
        self.max_hops = total + 1;
        Ok(())
    }

    /// Trace a data input back to the built-in output that drives it.
    fn resolve_driver(
        &self,
        env: EnvId,
        node: Int3,
        terminal: Int3,
    ) -> Result<Option<(ProducerRef, SignalType)>, CoreError> {
        let (mut env, mut node, mut terminal) = (env, node, terminal);
        for _ in 0..self.max_hops {
            let scope = &self.scopes[env.0 as usize];
            let Some(conn) = scope.drivers.get(&(node, terminal)) else {
                return Ok(None);
            };
            if conn.from == Int3::OUTSIDE {
                let (parent, custom) = scope.parent.ok_or(CoreError::DanglingWire(conn.from))?;
                (env, node, terminal) = (parent, custom, conn.from_terminal);
                continue;
            }
            match self.member(env, conn.from)? {
                Member::Builtin(id, def) => {
                    let out = def
                        .terminal_at(conn.from_terminal)
                        .ok_or(CoreError::UnknownTerminal {
                            node: conn.from,
                            terminal: conn.from_terminal,
                        })?;
                    let src = ProducerRef {
                        node: id,
                        output: def.ordinal(out),
                    };
                    return Ok(Some((src, out.ty)));
                }
                Member::Custom(Some(child), _) => {
                    (env, node, terminal) = (child, Int3::OUTSIDE, conn.from_terminal);
                }
                Member::Custom(None, _) | Member::Inert(_) => return Ok(None),
            }
        }
        Err(CoreError::Cycle(node))
    }

    fn targets(&self, env: EnvId, node: Int3, terminal: Int3) -> Vec<(EnvId, Int3, Int3)> {
        self.scopes[env.0 as usize]
            .fanout
            .get(&(node, terminal))
            .map(|conns| {
                conns
                    .iter()
                    .map(|conn| (env, conn.to, conn.to_terminal))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Built-in statements a control output fires, in wire order, with
    /// custom blocks flattened in place.
    fn successors(&self, env: EnvId, node: Int3, terminal: Int3) -> Result<Vec<NodeId>, CoreError> {
        let mut out = Vec::new();
        let mut stack: Vec<_> = self.targets(env, node, terminal).into_iter().rev().collect();
        let mut hops = 0;
        while let Some((env, to, to_terminal)) = stack.pop() {
            hops += 1;
            if hops > self.max_hops {
                return Err(CoreError::Cycle(to));
            }
            let next = if to == Int3::OUTSIDE {
                let (parent, custom) = self.scopes[env.0 as usize]
                    .parent
                    .ok_or(CoreError::DanglingWire(to))?;
                self.targets(parent, custom, to_terminal)
            } else {
                match self.member(env, to)? {
                    Member::Builtin(id, _) => {
                        out.push(id);
                        continue;
                    }
                    Member::Custom(Some(child), _) => {
                        self.targets(child, Int3::OUTSIDE, to_terminal)
                    }
                    Member::Custom(None, _) | Member::Inert(_) => continue,
                }
            };
            stack.extend(next.into_iter().rev());
        }
        Ok(out)
    }

    /// Whether some built-in statement can reach this control input.
    fn control_driven(&self, env: EnvId, node: Int3, terminal: Int3) -> Result<bool, CoreError> {
        let mut stack = vec![(env, node, terminal)];
        let mut seen = HashSet::new();
        while let Some(key) = stack.pop() {
            if !seen.insert(key) {
                continue;
            }
            let (env, node, terminal) = key;
            let scope = &self.scopes[env.0 as usize];
            for conn in scope.control_in.get(&(node, terminal)).into_iter().flatten() {
                if conn.from == Int3::OUTSIDE {
                    let (parent, custom) = scope.parent.ok_or(CoreError::DanglingWire(conn.from))?;
                    stack.push((parent, custom, conn.from_terminal));
                    continue;
                }
                match self.member(env, conn.from)? {
                    Member::Builtin(..) => return Ok(true),
                    Member::Custom(Some(child), _) => {
                        stack.push((child, Int3::OUTSIDE, conn.from_terminal))
                    }
                    Member::Custom(None, _) | Member::Inert(_) => {}
                }
            }
        }
        Ok(false)
    }

    fn variable(&mut self, env: EnvId, name: &str, ty: SignalType) -> Result<VarId, CoreError> {
        let variable = Variable::new(name, ty)?;
        let scope = variable.scope(env);
        let key = (scope, name.to_string(), ty);
        if let Some(id) = self.variable_ids.get(&key) {
            return Ok(*id);
        }
        let id = VarId(self.variables.len() as u32);
        tracing::debug!(var = id.0, name, %ty, ?scope, "declared variable");
        self.variables.push(VariableDecl { variable, scope });
        self.variable_ids.insert(key, id);
        Ok(id)
    }

    fn constant(&mut self, index: usize) -> Result<Constant, CoreError> {
        let Instance {
            env, decl, kind, ..
        } = self.instances[index];
        let constant = match kind {
            BlockKind::Number => Constant::Float(decl.float_setting(0).unwrap_or(0.0)),
            BlockKind::Vector => Constant::Vec3(decl.vec3_setting(0).unwrap_or_default().into()),
            BlockKind::Rotation => {
                let [x, y, z] = decl.vec3_setting(0).unwrap_or_default();
                Constant::Rot(math::make_rotation(x, y, z))
            }
            BlockKind::Win | BlockKind::Lose => Constant::Int(decl.int_setting(0).unwrap_or(0)),
            BlockKind::SetScore => Constant::Int(decl.int_setting(0).unwrap_or(0)),
            BlockKind::SetCamera => Constant::Flag(decl.bool_setting(0).unwrap_or(false)),
            BlockKind::PlaySound => Constant::Int(decl.int_setting(0).unwrap_or(0)),
            BlockKind::TouchSensor => Constant::Ints(
                decl.int_setting(0).unwrap_or(0),
                decl.int_setting(1).unwrap_or(0),
            ),
            BlockKind::Button | BlockKind::Joystick => {
                Constant::Int(decl.int_setting(0).unwrap_or(0))
            }
            BlockKind::MenuItem => Constant::Menu {
                name: decl.text_setting(0).unwrap_or_default().to_string(),
                max_buy_count: decl.int_setting(1).unwrap_or(1),
                price_increase: decl.int_setting(2).unwrap_or(0),
            },
            BlockKind::GetVariable(ty) | BlockKind::SetVariable(ty) => {
                let name = decl.text_setting(0).unwrap_or_default().to_string();
                Constant::Variable(self.variable(env, &name, ty.to_value())?)
            }
            BlockKind::Inspect(_) => Constant::Inspect { variable: None },
            _ => Constant::None,
        };
        Ok(constant)
    }

    fn build_node(&mut self, index: usize) -> Result<Node, CoreError> {
        let constant = self.constant(index)?;
        let Instance {
            env,
            decl,
            def,
            kind,
        } = self.instances[index];

        let mut inputs = Vec::new();
        for (ordinal, terminal) in def.data_inputs().enumerate() {
            let operand = match self.resolve_driver(env, decl.pos, terminal.pos)? {
                Some((src, ty)) => {
                    if !ty.can_drive(terminal.ty) {
                        return Err(CoreError::TypeMismatch {
                            node: decl.pos,
                            expected: terminal.ty,
                            found: ty,
                        });
                    }
                    Operand::Wire {
                        src,
                        ty,
                        deref: ty.is_pointer() && !terminal.ty.is_pointer(),
                        memo: None,
                    }
                }
                None if terminal.ty.is_pointer() => Operand::Absent,
                None if def.optional.get(ordinal).copied().unwrap_or(false) => Operand::Absent,
                None => Operand::Default(kind.input_default(ordinal, terminal.ty)),
            };
            inputs.push(operand);
        }

        let controls = def
            .control_outputs()
            .map(|terminal| self.successors(env, decl.pos, terminal.pos))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Node {
            env,
            pos: decl.pos,
            block_id: def.id,
            kind,
            statement: def.active,
            constant,
            inputs,
            outputs: def.data_outputs().map(|terminal| terminal.ty).collect(),
            controls,
            slots: Vec::new(),
        })
    }

    fn finish(mut self) -> Result<Program, CoreError> {
        let mut nodes = Vec::with_capacity(self.instances.len());
        let mut entry_points = Vec::new();
        for index in 0..self.instances.len() {
            let node = self.build_node(index)?;
            let Instance { env, def, .. } = self.instances[index];
            if let Some(before) = def.before() {
                if !self.control_driven(env, node.pos, before.pos)? {
                    entry_points.push(NodeId(index as u32));
                }
            }
            nodes.push(node);
        }

        name_inspected_variables(&mut nodes, &self.variables);
        check_control_flow(&nodes)?;
        let volatile = classify(&nodes)?;
        let memo_points = assign_memo_points(&mut nodes, &volatile);

        let mut slots = Vec::new();
        for (index, node) in nodes.iter_mut().enumerate() {
            for &(purpose, ty) in node.kind.slots() {
                let slot = SlotId(slots.len() as u32);
                tracing::debug!(slot = slot.0, node = index, purpose, %ty, "allocated state slot");
                node.slots.push(slot);
                slots.push(SlotDecl {
                    owner: NodeId(index as u32),
                    purpose,
                    ty,
                });
            }
        }

        tracing::info!(
            environments = self.environments.len(),
            nodes = nodes.len(),
            entry_points = entry_points.len(),
            memo_points = memo_points.len(),
            slots = slots.len(),
            variables = self.variables.len(),
            "built program"
        );
        Ok(Program {
            environments: self.environments,
            nodes,
            entry_points,
            memo_points,
            slots,
            variables: self.variables,
        })
    }
}

/// Record the variable an Inspect block reads when it is wired straight
/// to a variable getter.
fn name_inspected_variables(nodes: &mut [Node], variables: &[VariableDecl]) {
    for index in 0..nodes.len() {
        if !matches!(nodes[index].kind, BlockKind::Inspect(_)) {
            continue;
        }
        let name = match nodes[index].inputs.first() {
            Some(Operand::Wire { src, .. }) => nodes
                .get(src.node.index())
                .and_then(|source| source.constant.variable())
                .and_then(|var| variables.get(var.0 as usize))
                .map(|decl| decl.variable.name().to_string()),
            _ => None,
        };
        nodes[index].constant = Constant::Inspect { variable: name };
    }
}

/// Reject statement chains that lead back to themselves; a frame must
/// run every chain to exhaustion.
fn check_control_flow(nodes: &[Node]) -> Result<(), CoreError> {
    const UNSEEN: u8 = 0;
    const OPEN: u8 = 1;
    const DONE: u8 = 2;

    let successors = |index: usize| nodes[index].controls.iter().flatten();
    let mut state = vec![UNSEEN; nodes.len()];
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for root in 0..nodes.len() {
        if state[root] != UNSEEN || !nodes[root].statement {
            continue;
        }
        state[root] = OPEN;
        stack.push((root, 0));
        while let Some(top) = stack.len().checked_sub(1) {
            let (index, next) = stack[top];
            match successors(index).nth(next) {
                Some(succ) => {
                    stack[top].1 += 1;
                    let succ = succ.index();
                    match state[succ] {
                        UNSEEN => {
                            state[succ] = OPEN;
                            stack.push((succ, 0));
                        }
                        OPEN => return Err(CoreError::Cycle(nodes[succ].pos)),
                        _ => {}
                    }
                }
                None => {
                    state[index] = DONE;
                    stack.pop();
                }
            }
        }
    }
    Ok(())
}

/// Mark nodes whose outputs may change within a frame and reject
/// expression cycles.
///
/// Statement outputs are slot reads, so they end every dependency walk
/// and are volatile themselves. An expression is volatile when any of its
/// operands is.
fn classify(nodes: &[Node]) -> Result<Vec<bool>, CoreError> {
    const UNSEEN: u8 = 0;
    const OPEN: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![UNSEEN; nodes.len()];
    let mut volatile = vec![false; nodes.len()];
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..nodes.len() {
        if state[root] != UNSEEN {
            continue;
        }
        state[root] = OPEN;
        stack.push((root, 0));
        while let Some(top) = stack.len().checked_sub(1) {
            let (index, next) = stack[top];
            let node = &nodes[index];
            if node.statement {
                volatile[index] = true;
                state[index] = DONE;
                stack.pop();
                continue;
            }
            if let Some(operand) = node.inputs.get(next) {
                stack[top].1 += 1;
                if let Operand::Wire { src, .. } = operand {
                    let source = src.node.index();
                    match state[source] {
                        UNSEEN => {
                            state[source] = OPEN;
                            stack.push((source, 0));
                        }
                        OPEN => return Err(CoreError::Cycle(nodes[source].pos)),
                        _ => {}
                    }
                }
                continue;
            }
            volatile[index] = node.inputs.iter().any(|operand| match operand {
                Operand::Wire { src, .. } => volatile[src.node.index()],
                _ => false,
            });
            state[index] = DONE;
            stack.pop();
        }
    }
    Ok(volatile)
}

/// Turn every stable expression output read by more than one operand into
/// a memo point and tag its readers.
fn assign_memo_points(nodes: &mut [Node], volatile: &[bool]) -> Vec<MemoPoint> {
    let mut readers: HashMap<ProducerRef, (usize, SignalType)> = HashMap::new();
    for node in nodes.iter() {
        for operand in &node.inputs {
            if let Operand::Wire { src, ty, .. } = operand {
                readers.entry(*src).or_insert((0, *ty)).0 += 1;
            }
        }
    }

    let mut shared: Vec<_> = readers
        .into_iter()
        .filter(|(src, (count, _))| *count > 1 && !volatile[src.node.index()])
        .collect();
    shared.sort_by_key(|(src, _)| (src.node, src.output));

    let mut ids = HashMap::new();
    let memo_points = shared
        .into_iter()
        .enumerate()
        .map(|(index, (src, (consumers, ty)))| {
            tracing::debug!(memo = index, node = src.node.0, output = src.output, consumers, "memo point");
            ids.insert(src, MemoId(index as u32));
            MemoPoint { src, ty, consumers }
        })
        .collect();

    for node in nodes.iter_mut() {
        for operand in &mut node.inputs {
            if let Operand::Wire { src, memo, .. } = operand {
                *memo = ids.get(src).copied();
            }
        }
    }
    memo_points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{BEFORE, Footprint};
    use crate::testing::GraphBuilder;
    use crate::types::Value;

    #[test]
    fn entry_points_follow_declaration_order() {
        let mut g = GraphBuilder::new();
        let a = g.node(BlockKind::Win);
        let b = g.node(BlockKind::Lose);
        let c = g.node(BlockKind::Win);
        g.flow(a, "After", b);
        let program = g.build().expect("program");
        assert_eq!(program.entry_points, vec![NodeId(a), NodeId(c)]);
        assert_eq!(program.nodes[a as usize].after(), &[NodeId(b)]);
    }

    #[test]
    fn entry_points_list_the_main_graph_before_nested_environments() {
        let mut inner = GraphBuilder::custom(7, Footprint::new(2, 2), true, Vec::new());
        let win = inner.node(BlockKind::Win);
        inner.from_outside(BEFORE, win, BEFORE);

        let mut outer = GraphBuilder::new();
        outer.add_custom(1000, inner);
        outer.node(BlockKind::Lose);
        let program = outer.build().expect("program");

        // the custom block comes first in the graph, its body still follows Lose
        assert_eq!(program.entry_points, vec![NodeId(0), NodeId(1)]);
        assert_eq!(program.nodes[0].kind, BlockKind::Lose);
        assert_eq!(program.nodes[1].kind, BlockKind::Win);
        assert_eq!(program.nodes[1].env, EnvId(1));
    }

    #[test]
    fn unconnected_inputs_take_kind_defaults() {
        let mut g = GraphBuilder::new();
        let random = g.node(BlockKind::Random);
        let log = g.node(BlockKind::Logarithm);
        let score = g.node(BlockKind::SetScore);
        let program = g.build().unwrap();
        assert_eq!(
            program.nodes[random as usize].inputs,
            vec![
                Operand::Default(Value::Float(0.0)),
                Operand::Default(Value::Float(1.0))
            ]
        );
        assert_eq!(
            program.nodes[log as usize].inputs[1],
            Operand::Default(Value::Float(10.0))
        );
        assert_eq!(program.nodes[score as usize].inputs, vec![Operand::Absent, Operand::Absent]);
    }

    #[test]
    fn shared_outputs_become_memo_points() {
        let mut g = GraphBuilder::new();
        let random = g.node(BlockKind::Random);
        let add = g.node(BlockKind::AddNumbers);
        g.wire(random, "Random", add, "Num1");
        g.wire(random, "Random", add, "Num2");
        let single = g.node(BlockKind::Random);
        let neg = g.node(BlockKind::Negate);
        g.wire(single, "Random", neg, "Num");
        let program = g.build().unwrap();
        assert_eq!(program.memo_points.len(), 1);
        assert_eq!(program.memo_points[0].consumers, 2);
        assert!(matches!(
            program.nodes[neg as usize].inputs[0],
            Operand::Wire { memo: None, .. }
        ));
    }

    #[test]
    fn statement_outputs_are_never_memoized() {
        let mut g = GraphBuilder::new();
        let lp = g.node(BlockKind::Loop);
        let add = g.node(BlockKind::AddNumbers);
        g.wire(lp, "Counter", add, "Num1");
        g.wire(lp, "Counter", add, "Num2");
        let scale = g.node(BlockKind::Multiply);
        g.wire(add, "Sum", scale, "Num1");
        g.wire(add, "Sum", scale, "Num2");
        let program = g.build().unwrap();
        assert!(program.memo_points.is_empty());
    }

    #[test]
    fn every_stateful_instance_owns_its_slots() {
        let mut g = GraphBuilder::new();
        let first = g.node(BlockKind::Loop);
        let second = g.node(BlockKind::Loop);
        let program = g.build().unwrap();
        let a = program.slot_of(NodeId(first), "counter").unwrap();
        let b = program.slot_of(NodeId(second), "counter").unwrap();
        assert_ne!(a, b);
        assert_eq!(program.slots.len(), 2);
    }

    #[test]
    fn second_driver_on_an_input_is_rejected() {
        let mut g = GraphBuilder::new();
        let a = g.number(1.0);
        let b = g.number(2.0);
        let neg = g.node(BlockKind::Negate);
        g.wire(a, "Number", neg, "Num");
        g.wire(b, "Number", neg, "Num");
        assert!(matches!(g.build(), Err(CoreError::MultipleDrivers { .. })));
    }

    #[test]
    fn wires_must_carry_compatible_types() {
        let mut g = GraphBuilder::new();
        let t = g.node(BlockKind::True);
        let neg = g.node(BlockKind::Negate);
        g.wire(t, "True", neg, "Num");
        assert!(matches!(g.build(), Err(CoreError::TypeMismatch { .. })));
    }

    #[test]
    fn expression_cycles_are_rejected() {
        let mut g = GraphBuilder::new();
        let a = g.node(BlockKind::Negate);
        let b = g.node(BlockKind::Negate);
        g.wire(a, "-Num", b, "Num");
        g.wire(b, "-Num", a, "Num");
        assert!(matches!(g.build(), Err(CoreError::Cycle(_))));
    }

    #[test]
    fn control_loops_are_rejected() {
        let mut g = GraphBuilder::new();
        let a = g.node(BlockKind::Win);
        let b = g.node(BlockKind::Lose);
        g.flow(a, "After", b);
        g.flow(b, "After", a);
        assert!(matches!(g.build(), Err(CoreError::Cycle(_))));
    }

    #[test]
    fn pointer_outputs_are_dereferenced_for_value_inputs() {
        let mut g = GraphBuilder::new();
        let var = g.get_variable("x", SignalType::Float);
        let neg = g.node(BlockKind::Negate);
        g.wire(var, "Variable", neg, "Num");
        let program = g.build().unwrap();
        assert!(matches!(
            program.nodes[neg as usize].inputs[0],
            Operand::Wire { deref: true, ty: SignalType::FloatPtr, .. }
        ));
    }

    #[test]
    fn variables_are_shared_by_name_and_type() {
        let mut g = GraphBuilder::new();
        g.get_variable("x", SignalType::Float);
        g.set_variable("x", SignalType::Float);
        g.get_variable("x", SignalType::Vec3);
        let program = g.build().unwrap();
        assert_eq!(program.variables.len(), 2);
    }

    #[test]
    fn unknown_kinds_are_reported_with_their_position() {
        let mut g = GraphBuilder::new();
        g.raw_node(9999);
        assert!(matches!(g.build(), Err(CoreError::UnknownKind { id: 9999, .. })));
    }

    #[test]
    fn custom_blocks_expand_into_environments() {
        let (catalog, document, outer, inner_win) = crate::testing::custom_block_fixture();
        let program = build_program(&catalog, &document).expect("program");
        assert_eq!(program.environments.len(), 2);
        assert_eq!(program.environments[1].parent.map(|(env, _)| env), Some(EnvId(0)));
        // the inner Win is reached through the custom block, not on its own
        assert_eq!(program.entry_points, vec![outer]);
        assert_eq!(program.nodes[outer.index()].after(), &[inner_win]);
    }
}
