//! Lowering of an analyzed [`Program`] into a wasm module.
//!
//! The module imports the whole [`BUILTINS`] table from `env` and exports:
//!
//! - `run_frame : () -> ()` advances the frame stamp and runs every entry
//!   chain inline, depth-first, in entry order;
//! - `run_late : (i32) -> ()` runs the body of the Late Update node whose
//!   [`NodeId`] is passed;
//! - `memo_<k> : () -> lanes` returns memo point `k`, evaluating its
//!   producer only on the first call of a frame.
//!
//! A statement with more than one incoming control wire gets a private
//! `() -> ()` function running it and everything after it. Every
//! predecessor calls that function, so converging chains are emitted once.
//!
//! Values travel as lanes: f32 for numbers, three f32 for vectors, four
//! f32 (x, y, z, w) for rotations, one i32 for truths, objects and
//! constraints, and an (i32 variable, i32 index) pair for pointers. A
//! missing pointer has variable `-1`.

use std::collections::HashMap;
use std::ops::Range;

use wasm_encoder::{
    BlockType, CodeSection, ConstExpr, EntityType, ExportKind, ExportSection, Function,
    FunctionSection, GlobalSection, GlobalType, ImportSection, Instruction, Module, TypeSection,
    ValType,
};

use crate::builtins::{BUILTINS, Builtin};
use crate::catalog::BlockKind;
use crate::error::CoreError;
use crate::hir::{Constant, Node, NodeId, Operand, ProducerRef, Program};
use crate::types::{SignalType, Value};

pub const RUN_FRAME: &str = "run_frame";
pub const RUN_LATE: &str = "run_late";

pub fn memo_export(index: usize) -> String {
    format!("memo_{index}")
}

const F32: ValType = ValType::F32;
const I32: ValType = ValType::I32;
const VEC3: &[ValType] = &[F32, F32, F32];
const ROT: &[ValType] = &[F32, F32, F32, F32];

/// Global 0 counts `run_frame` calls; memo stamps compare against it.
const FRAME_GLOBAL: u32 = 0;

/// Lane layout of a signal type.
pub fn lanes(ty: SignalType) -> &'static [ValType] {
    match ty {
        SignalType::Void => &[],
        SignalType::Float => &[F32],
        SignalType::Vec3 => VEC3,
        SignalType::Rot => ROT,
        SignalType::Bool | SignalType::Obj | SignalType::Con => &[I32],
        _ => &[I32, I32],
    }
}

fn var_get(ty: SignalType) -> Builtin {
    match ty.to_value() {
        SignalType::Float => Builtin::VarGetF32,
        SignalType::Vec3 => Builtin::VarGetVec3,
        SignalType::Rot => Builtin::VarGetRot,
        _ => Builtin::VarGetI32,
    }
}

fn var_set(ty: SignalType) -> Builtin {
    match ty.to_value() {
        SignalType::Float => Builtin::VarSetF32,
        SignalType::Vec3 => Builtin::VarSetVec3,
        SignalType::Rot => Builtin::VarSetRot,
        _ => Builtin::VarSetI32,
    }
}

fn inspect(ty: SignalType) -> Builtin {
    match ty.to_value() {
        SignalType::Float => Builtin::InspectF32,
        SignalType::Vec3 => Builtin::InspectVec3,
        SignalType::Rot => Builtin::InspectRot,
        _ => Builtin::InspectI32,
    }
}

fn slot_get(ty: SignalType) -> Builtin {
    match ty {
        SignalType::Float => Builtin::SlotGetF32,
        SignalType::Vec3 => Builtin::SlotGetVec3,
        _ => Builtin::SlotGetI32,
    }
}

/// Deduplicates function signatures into the type section.
struct TypeInterner {
    section: TypeSection,
    entries: Vec<(Vec<ValType>, Vec<ValType>)>,
}

impl TypeInterner {
    fn new() -> Self {
        TypeInterner {
            section: TypeSection::new(),
            entries: Vec::new(),
        }
    }

    fn intern(&mut self, params: &[ValType], results: &[ValType]) -> u32 {
        if let Some(index) = self
            .entries
            .iter()
            .position(|(p, r)| p.as_slice() == params && r.as_slice() == results)
        {
            return index as u32;
        }
        self.section
            .ty()
            .function(params.iter().copied(), results.iter().copied());
        self.entries.push((params.to_vec(), results.to_vec()));
        (self.entries.len() - 1) as u32
    }
}

/// Instructions of one function plus the locals they need.
struct Body {
    params: u32,
    locals: Vec<ValType>,
    code: Vec<Instruction<'static>>,
}

impl Body {
    fn new(params: u32) -> Self {
        Body {
            params,
            locals: Vec::new(),
            code: Vec::new(),
        }
    }

    fn op(&mut self, instruction: Instruction<'static>) {
        self.code.push(instruction);
    }

    fn call(&mut self, builtin: Builtin) {
        self.op(Instruction::Call(builtin.index()));
    }

    fn i32(&mut self, value: i32) {
        self.op(Instruction::I32Const(value));
    }

    fn f32(&mut self, value: f32) {
        self.op(Instruction::F32Const(value.into()));
    }

    fn local(&mut self, ty: ValType) -> u32 {
        self.locals.push(ty);
        self.params + self.locals.len() as u32 - 1
    }

    /// Pop values of `types` off the stack into fresh locals, returned in
    /// push order.
    fn spill(&mut self, types: &[ValType]) -> Vec<u32> {
        let locals: Vec<u32> = types.iter().map(|&ty| self.local(ty)).collect();
        for &local in locals.iter().rev() {
            self.op(Instruction::LocalSet(local));
        }
        locals
    }

    fn get(&mut self, locals: &[u32]) {
        for &local in locals {
            self.op(Instruction::LocalGet(local));
        }
    }

    /// Replace the values of `types` on the stack with the lanes in `keep`.
    fn keep(&mut self, types: &[ValType], keep: Range<usize>) {
        let locals = self.spill(types);
        self.get(&locals[keep]);
    }

    fn finish(self) -> Function {
        let mut function = Function::new_with_locals_types(self.locals);
        for instruction in &self.code {
            function.instruction(instruction);
        }
        function.instruction(&Instruction::End);
        function
    }
}

struct MemoGlobals {
    stamp: u32,
    cache: Vec<u32>,
}

struct Emitter<'p> {
    program: &'p Program,
    memo_base: u32,
    memo: Vec<MemoGlobals>,
    /// Function index of each statement emitted out of line.
    outlined: HashMap<NodeId, u32>,
}

/// Statements reached by more than one control wire, in node order.
fn converging_statements(program: &Program) -> Vec<NodeId> {
    let mut predecessors = vec![0u32; program.nodes.len()];
    for node in &program.nodes {
        for &target in node.controls.iter().flatten() {
            if let Some(count) = predecessors.get_mut(target.index()) {
                *count += 1;
            }
        }
    }
    predecessors
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 1)
        .map(|(index, _)| NodeId(index as u32))
        .collect()
}

/// Emit the module for `program`.
pub fn generate_wasm(program: &Program) -> Result<Vec<u8>, CoreError> {
    let mut types = TypeInterner::new();

    let mut imports = ImportSection::new();
    for descriptor in BUILTINS {
        let ty = types.intern(descriptor.params, descriptor.results);
        imports.import(descriptor.module, descriptor.name, EntityType::Function(ty));
    }
    let import_count = BUILTINS.len() as u32;

    let mut globals = GlobalSection::new();
    let mut global_count = 0u32;
    let mut add_global = |globals: &mut GlobalSection, val_type: ValType, init: ConstExpr| {
        globals.global(
            GlobalType {
                val_type,
                mutable: true,
                shared: false,
            },
            &init,
        );
        global_count += 1;
        global_count - 1
    };
    add_global(&mut globals, I32, ConstExpr::i32_const(0));
    let mut memo = Vec::with_capacity(program.memo_points.len());
    for point in &program.memo_points {
        let stamp = add_global(&mut globals, I32, ConstExpr::i32_const(-1));
        let cache = lanes(point.ty)
            .iter()
            .map(|&ty| {
                let init = if ty == F32 {
                    ConstExpr::f32_const(0.0f32.into())
                } else {
                    ConstExpr::i32_const(0)
                };
                add_global(&mut globals, ty, init)
            })
            .collect();
        memo.push(MemoGlobals { stamp, cache });
    }

    let memo_base = import_count + 2;
    let converging = converging_statements(program);
    let outline_base = memo_base + program.memo_points.len() as u32;
    let outlined = converging
        .iter()
        .enumerate()
        .map(|(index, &id)| (id, outline_base + index as u32))
        .collect();
    let emitter = Emitter {
        program,
        memo_base,
        memo,
        outlined,
    };

    let mut functions = FunctionSection::new();
    let mut exports = ExportSection::new();
    let mut codes = CodeSection::new();

    functions.function(types.intern(&[], &[]));
    exports.export(RUN_FRAME, ExportKind::Func, import_count);
    codes.function(&emitter.run_frame()?.finish());

    functions.function(types.intern(&[I32], &[]));
    exports.export(RUN_LATE, ExportKind::Func, import_count + 1);
    codes.function(&emitter.run_late()?.finish());

    for (index, point) in program.memo_points.iter().enumerate() {
        functions.function(types.intern(&[], lanes(point.ty)));
        exports.export(
            &memo_export(index),
            ExportKind::Func,
            emitter.memo_base + index as u32,
        );
        codes.function(&emitter.memo_function(index)?.finish());
    }

    if !converging.is_empty() {
        tracing::debug!(count = converging.len(), "outlined converging statements");
    }
    for &id in &converging {
        functions.function(types.intern(&[], &[]));
        codes.function(&emitter.outlined_function(id)?.finish());
    }

    let mut module = Module::new();
    module.section(&types.section);
    module.section(&imports);
    module.section(&functions);
    module.section(&globals);
    module.section(&exports);
    module.section(&codes);
    Ok(module.finish())
}

impl Emitter<'_> {
    fn run_frame(&self) -> Result<Body, CoreError> {
        let mut body = Body::new(0);
        body.op(Instruction::GlobalGet(FRAME_GLOBAL));
        body.i32(1);
        body.op(Instruction::I32Add);
        body.op(Instruction::GlobalSet(FRAME_GLOBAL));
        for &entry in &self.program.entry_points {
            self.chain(&mut body, &[entry])?;
        }
        Ok(body)
    }

    fn run_late(&self) -> Result<Body, CoreError> {
        let mut body = Body::new(1);
        for id in self.program.late_update_nodes() {
            let node = self.program.node(id)?;
            body.op(Instruction::LocalGet(0));
            body.i32(id.0 as i32);
            body.op(Instruction::I32Eq);
            body.op(Instruction::If(BlockType::Empty));
            self.chain(&mut body, node.branch(0)?)?;
            body.op(Instruction::End);
        }
        Ok(body)
    }

    fn memo_function(&self, index: usize) -> Result<Body, CoreError> {
        let point = &self.program.memo_points[index];
        let globals = &self.memo[index];
        let mut body = Body::new(0);
        body.op(Instruction::GlobalGet(globals.stamp));
        body.op(Instruction::GlobalGet(FRAME_GLOBAL));
        body.op(Instruction::I32Ne);
        body.op(Instruction::If(BlockType::Empty));
        self.output(&mut body, point.src)?;
        for &global in globals.cache.iter().rev() {
            body.op(Instruction::GlobalSet(global));
        }
        body.op(Instruction::GlobalGet(FRAME_GLOBAL));
        body.op(Instruction::GlobalSet(globals.stamp));
        body.op(Instruction::End);
        for &global in &globals.cache {
            body.op(Instruction::GlobalGet(global));
        }
        Ok(body)
    }

    fn outlined_function(&self, id: NodeId) -> Result<Body, CoreError> {
        let node = self.program.node(id)?;
        let mut body = Body::new(0);
        self.statement(&mut body, id, node)?;
        self.chain(&mut body, node.after())?;
        Ok(body)
    }

    fn chain(&self, body: &mut Body, start: &[NodeId]) -> Result<(), CoreError> {
        let mut stack: Vec<NodeId> = start.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(&function) = self.outlined.get(&id) {
                body.op(Instruction::Call(function));
                continue;
            }
            let node = self.program.node(id)?;
            self.statement(body, id, node)?;
            stack.extend(node.after().iter().rev().copied());
        }
        Ok(())
    }

    fn value(&self, body: &mut Body, value: &Value) {
        match value {
            Value::Void => {}
            Value::Float(v) => body.f32(*v),
            Value::Vec3(v) => {
                for lane in v.to_array() {
                    body.f32(lane);
                }
            }
            Value::Rot(q) => {
                for lane in q.to_array() {
                    body.f32(lane);
                }
            }
            Value::Ptr(ptr) => {
                body.i32(ptr.var.0 as i32);
                body.i32(ptr.index);
            }
            other => body.i32(other.as_i32()),
        }
    }

    fn input_type(node: &Node, index: usize) -> Result<SignalType, CoreError> {
        node.kind
            .shape()
            .inputs
            .get(index)
            .map(|pin| pin.ty)
            .ok_or_else(|| {
                CoreError::invariant(format!(
                    "{:?} at {} has no input {index}",
                    node.kind, node.pos
                ))
            })
    }

    fn operand(&self, body: &mut Body, node: &Node, index: usize) -> Result<(), CoreError> {
        match node.input(index)? {
            Operand::Default(value) => self.value(body, value),
            Operand::Absent => {
                let ty = Self::input_type(node, index)?;
                if ty.is_pointer() {
                    body.i32(-1);
                    body.i32(0);
                } else {
                    self.value(body, &ty.default_value());
                }
            }
            Operand::Wire {
                src,
                ty,
                deref,
                memo,
            } => {
                match memo {
                    Some(id) => body.op(Instruction::Call(self.memo_base + id.0)),
                    None => self.output(body, *src)?,
                }
                if *deref {
                    body.call(var_get(*ty));
                }
            }
        }
        Ok(())
    }

    /// Presence flag followed by the operand lanes.
    fn optional(&self, body: &mut Body, node: &Node, index: usize) -> Result<(), CoreError> {
        if matches!(node.input(index)?, Operand::Absent) {
            body.i32(0);
            let ty = Self::input_type(node, index)?;
            self.value(body, &ty.default_value());
            return Ok(());
        }
        body.i32(1);
        self.operand(body, node, index)
    }

    fn operands(&self, body: &mut Body, node: &Node, indices: Range<usize>) -> Result<(), CoreError> {
        for index in indices {
            self.operand(body, node, index)?;
        }
        Ok(())
    }

    fn output(&self, body: &mut Body, src: ProducerRef) -> Result<(), CoreError> {
        let node = self.program.node(src.node)?;
        if !node.statement {
            return self.evaluate(body, node, src.output);
        }
        let (slot, lane) = node.kind.output_slot(src.output).ok_or_else(|| {
            CoreError::invariant(format!(
                "{:?} at {} has no output {}",
                node.kind, node.pos, src.output
            ))
        })?;
        let slot = node.slot(slot)?;
        let ty = self
            .program
            .slots
            .get(slot.index())
            .map(|decl| decl.ty)
            .ok_or_else(|| CoreError::invariant(format!("no slot {}", slot.0)))?;
        body.i32(slot.0 as i32);
        body.call(slot_get(ty));
        if let Some(lane) = lane {
            let lane = lane as usize;
            body.keep(VEC3, lane..lane + 1);
        }
        Ok(())
    }

    fn vector_lanes(&self, body: &mut Body, node: &Node, op: Instruction<'static>) -> Result<(), CoreError> {
        self.operands(body, node, 0..2)?;
        let locals = body.spill(&[F32; 6]);
        for lane in 0..3 {
            body.get(&[locals[lane], locals[lane + 3]]);
            body.op(op.clone());
        }
        Ok(())
    }

    fn evaluate(&self, body: &mut Body, node: &Node, output: usize) -> Result<(), CoreError> {
        use BlockKind as K;
        use Instruction as I;

        match node.kind {
            K::ScreenSize => {
                body.call(Builtin::ScreenSize);
                let lane = output.min(1);
                body.keep(&[F32, F32], lane..lane + 1);
            }
            K::Accelerometer => body.call(Builtin::Accelerometer),
            K::CurrentFrame => {
                body.call(Builtin::CurrentFrame);
                body.op(I::F32ConvertI32U);
            }
            K::GetPosition => {
                self.operand(body, node, 0)?;
                body.call(Builtin::GetObjectPosition);
                body.keep(&[F32; 7], if output == 0 { 0..3 } else { 3..7 });
            }
            K::Raycast => {
                self.operands(body, node, 0..2)?;
                body.call(Builtin::Raycast);
                let keep = match output {
                    0 => 0..1,
                    1 => 1..4,
                    _ => 4..5,
                };
                body.keep(&[I32, F32, F32, F32, I32], keep);
            }
            K::GetSize | K::GetVelocity => {
                self.operand(body, node, 0)?;
                body.call(if node.kind == K::GetSize {
                    Builtin::GetSize
                } else {
                    Builtin::GetVelocity
                });
                body.keep(&[F32; 6], if output == 0 { 0..3 } else { 3..6 });
            }
            K::Number | K::Vector | K::Rotation | K::True | K::False => {
                let value = match (&node.kind, &node.constant) {
                    (K::Number, constant) => Value::Float(constant.float()),
                    (K::Vector, Constant::Vec3(v)) => Value::Vec3(*v),
                    (K::Vector, _) => SignalType::Vec3.default_value(),
                    (K::Rotation, Constant::Rot(q)) => Value::Rot(*q),
                    (K::Rotation, _) => SignalType::Rot.default_value(),
                    (kind, _) => Value::Bool(*kind == K::True),
                };
                self.value(body, &value);
            }
            K::Negate => {
                self.operand(body, node, 0)?;
                body.op(I::F32Neg);
            }
            K::Not => {
                self.operand(body, node, 0)?;
                body.op(I::I32Eqz);
            }
            K::AddNumbers | K::SubtractNumbers | K::Multiply | K::Divide => {
                self.operands(body, node, 0..2)?;
                body.op(match node.kind {
                    K::AddNumbers => I::F32Add,
                    K::SubtractNumbers => I::F32Sub,
                    K::Multiply => I::F32Mul,
                    _ => I::F32Div,
                });
            }
            K::AddVectors => self.vector_lanes(body, node, I::F32Add)?,
            K::SubtractVectors => self.vector_lanes(body, node, I::F32Sub)?,
            K::Scale => {
                self.operands(body, node, 0..2)?;
                let locals = body.spill(&[F32; 4]);
                for lane in 0..3 {
                    body.get(&[locals[lane], locals[3]]);
                    body.op(I::F32Mul);
                }
            }
            K::EqualObjects | K::EqualTruths => {
                self.operands(body, node, 0..2)?;
                body.op(I::I32Eq);
            }
            K::LessThan | K::GreaterThan => {
                self.operands(body, node, 0..2)?;
                body.op(if node.kind == K::LessThan {
                    I::F32Lt
                } else {
                    I::F32Gt
                });
            }
            K::And => {
                self.operand(body, node, 0)?;
                body.op(I::If(BlockType::Result(I32)));
                self.operand(body, node, 1)?;
                body.op(I::Else);
                body.i32(0);
                body.op(I::End);
            }
            K::Or => {
                self.operand(body, node, 0)?;
                body.op(I::If(BlockType::Result(I32)));
                body.i32(1);
                body.op(I::Else);
                self.operand(body, node, 1)?;
                body.op(I::End);
            }
            K::Round | K::Floor | K::Ceiling | K::Absolute => {
                self.operand(body, node, 0)?;
                body.op(match node.kind {
                    K::Round => I::F32Nearest,
                    K::Floor => I::F32Floor,
                    K::Ceiling => I::F32Ceil,
                    _ => I::F32Abs,
                });
            }
            K::MakeVector => self.operands(body, node, 0..3)?,
            K::BreakVector => {
                self.operand(body, node, 0)?;
                let lane = output.min(2);
                body.keep(VEC3, lane..lane + 1);
            }
            K::BreakRotation => {
                self.operand(body, node, 0)?;
                body.call(Builtin::BreakRotation);
                let lane = output.min(2);
                body.keep(VEC3, lane..lane + 1);
            }
            K::ScreenToWorld => {
                self.operands(body, node, 0..2)?;
                body.call(Builtin::ScreenToWorld);
                body.keep(&[F32; 6], if output == 0 { 0..3 } else { 3..6 });
            }
            K::WorldToScreen => {
                self.operand(body, node, 0)?;
                body.call(Builtin::WorldToScreen);
                let lane = output.min(1);
                body.keep(&[F32, F32], lane..lane + 1);
            }
            K::GetVariable(_) => {
                let var = node.constant.variable().map_or(-1, |var| var.0 as i32);
                body.i32(var);
                body.i32(0);
            }
            K::List(_) => {
                self.operands(body, node, 0..2)?;
                body.op(I::F32Floor);
                body.op(I::I32TruncSatF32S);
                body.op(I::I32Add);
            }
            kind => {
                let (arity, builtin) = match kind {
                    K::Inverse => (1, Builtin::Inverse),
                    K::Rotate => (2, Builtin::Rotate),
                    K::Combine => (2, Builtin::Combine),
                    K::Modulo => (2, Builtin::Modulo),
                    K::Power => (2, Builtin::Power),
                    K::EqualNumbers => (2, Builtin::EqualNumbers),
                    K::EqualVectors => (2, Builtin::EqualVectors),
                    K::Random => (2, Builtin::GetRandomValue),
                    K::Min => (2, Builtin::Min),
                    K::Max => (2, Builtin::Max),
                    K::Sin => (1, Builtin::Sin),
                    K::Cos => (1, Builtin::Cos),
                    K::Logarithm => (2, Builtin::Logarithm),
                    K::Normalize => (1, Builtin::Normalize),
                    K::DotProduct => (2, Builtin::Dot),
                    K::CrossProduct => (2, Builtin::Cross),
                    K::Distance => (2, Builtin::Distance),
                    K::Lerp => (3, Builtin::Lerp),
                    K::AxisAngle => (2, Builtin::AxisAngle),
                    K::LineVsPlane => (4, Builtin::LineVsPlane),
                    K::LookRotation => (2, Builtin::LookRotation),
                    K::MakeRotation => (3, Builtin::MakeRotation),
                    other => {
                        return Err(CoreError::invariant(format!(
                            "{other:?} at {} is not an expression",
                            node.pos
                        )));
                    }
                };
                self.operands(body, node, 0..arity)?;
                body.call(builtin);
            }
        }
        Ok(())
    }

    fn statement(&self, body: &mut Body, id: NodeId, node: &Node) -> Result<(), CoreError> {
        use BlockKind as K;
        use Instruction as I;

        match node.kind {
            K::Win | K::Lose => {
                body.i32(node.constant.int());
                body.call(if node.kind == K::Win {
                    Builtin::Win
                } else {
                    Builtin::Lose
                });
            }
            K::SetScore => {
                self.optional(body, node, 0)?;
                self.optional(body, node, 1)?;
                body.i32(node.constant.int());
                body.call(Builtin::SetScore);
            }
            K::SetCamera => {
                for index in 0..3 {
                    self.optional(body, node, index)?;
                }
                body.i32(node.constant.flag() as i32);
                body.call(Builtin::SetCamera);
            }
            K::SetLight => {
                self.optional(body, node, 0)?;
                self.optional(body, node, 1)?;
                body.call(Builtin::SetLight);
            }
            K::MenuItem => {
                let registered = node.slot(0)?;
                body.i32(registered.0 as i32);
                body.call(Builtin::SlotGetI32);
                body.op(I::I32Eqz);
                body.op(I::If(BlockType::Empty));
                body.i32(id.0 as i32);
                self.operands(body, node, 0..2)?;
                body.call(Builtin::MenuItem);
                body.i32(registered.0 as i32);
                body.i32(1);
                body.call(Builtin::SlotSetI32);
                body.op(I::End);
            }
            K::SetPosition => {
                self.operand(body, node, 0)?;
                self.optional(body, node, 1)?;
                self.optional(body, node, 2)?;
                body.call(Builtin::SetPosition);
            }
            K::SetVisible => {
                self.operands(body, node, 0..2)?;
                body.call(Builtin::SetVisible);
            }
            K::CreateObject => {
                body.i32(node.slot(0)?.0 as i32);
                self.operand(body, node, 0)?;
                body.call(Builtin::CreateObject);
                body.call(Builtin::SlotSetI32);
            }
            K::DestroyObject => {
                self.operand(body, node, 0)?;
                body.call(Builtin::DestroyObject);
            }
            K::PlaySound => {
                body.i32(node.slot(0)?.0 as i32);
                self.operands(body, node, 0..2)?;
                body.i32(node.constant.int());
                body.call(Builtin::PlaySound);
                body.call(Builtin::SlotSetF32);
            }
            K::StopSound => {
                self.operand(body, node, 0)?;
                body.call(Builtin::StopSound);
            }
            K::VolumePitch => {
                self.operand(body, node, 0)?;
                self.optional(body, node, 1)?;
                self.optional(body, node, 2)?;
                body.call(Builtin::AdjustVolumePitch);
            }
            K::AddForce => {
                self.operand(body, node, 0)?;
                for index in 1..4 {
                    self.optional(body, node, index)?;
                }
                body.call(Builtin::AddForce);
            }
            K::SetVelocity
            | K::SetLocked
            | K::LinearLimits
            | K::AngularLimits
            | K::LinearSpring
            | K::AngularSpring
            | K::LinearMotor
            | K::AngularMotor => {
                self.operand(body, node, 0)?;
                self.optional(body, node, 1)?;
                self.optional(body, node, 2)?;
                body.call(match node.kind {
                    K::SetVelocity => Builtin::SetVelocity,
                    K::SetLocked => Builtin::SetLocked,
                    K::LinearLimits => Builtin::LinearLimits,
                    K::AngularLimits => Builtin::AngularLimits,
                    K::LinearSpring => Builtin::LinearSpring,
                    K::AngularSpring => Builtin::AngularSpring,
                    K::LinearMotor => Builtin::LinearMotor,
                    _ => Builtin::AngularMotor,
                });
            }
            K::SetMass | K::SetFriction | K::SetBounciness => {
                self.operands(body, node, 0..2)?;
                body.call(match node.kind {
                    K::SetMass => Builtin::SetMass,
                    K::SetFriction => Builtin::SetFriction,
                    _ => Builtin::SetBounciness,
                });
            }
            K::SetGravity => {
                self.operand(body, node, 0)?;
                body.call(Builtin::SetGravity);
            }
            K::AddConstraint => {
                body.i32(node.slot(0)?.0 as i32);
                self.operands(body, node, 0..2)?;
                self.optional(body, node, 2)?;
                body.call(Builtin::AddConstraint);
                body.call(Builtin::SlotSetI32);
            }
            K::If => {
                self.operand(body, node, 0)?;
                body.op(I::If(BlockType::Empty));
                self.chain(body, node.branch(0)?)?;
                body.op(I::Else);
                self.chain(body, node.branch(1)?)?;
                body.op(I::End);
            }
            K::PlaySensor => {
                body.call(Builtin::CurrentFrame);
                body.op(I::I32Eqz);
                body.op(I::If(BlockType::Empty));
                self.chain(body, node.branch(0)?)?;
                body.op(I::End);
            }
            K::LateUpdate => {
                body.i32(id.0 as i32);
                body.call(Builtin::DeferLate);
            }
            K::BoxArtSensor => {
                body.call(Builtin::TakingBoxArt);
                body.op(I::If(BlockType::Empty));
                self.chain(body, node.branch(0)?)?;
                body.op(I::End);
            }
            K::TouchSensor => {
                body.i32(node.constant.int());
                body.i32(node.constant.second_int());
                body.call(Builtin::TryGetTouch);
                let touch = body.spill(&[I32, F32, F32]);
                body.get(&touch[..1]);
                body.op(I::If(BlockType::Empty));
                body.i32(node.slot(0)?.0 as i32);
                body.get(&touch[1..]);
                body.f32(0.0);
                body.call(Builtin::SlotSetVec3);
                self.chain(body, node.branch(0)?)?;
                body.op(I::End);
            }
            K::SwipeSensor => {
                body.call(Builtin::TryGetSwipe);
                let swipe = body.spill(&[I32, F32, F32, F32]);
                body.get(&swipe[..1]);
                body.op(I::If(BlockType::Empty));
                body.i32(node.slot(0)?.0 as i32);
                body.get(&swipe[1..]);
                body.call(Builtin::SlotSetVec3);
                self.chain(body, node.branch(0)?)?;
                body.op(I::End);
            }
            K::Button => {
                body.i32(node.constant.int());
                body.call(Builtin::GetButtonPressed);
                body.op(I::If(BlockType::Empty));
                self.chain(body, node.branch(0)?)?;
                body.op(I::End);
            }
            K::Joystick => {
                body.i32(node.slot(0)?.0 as i32);
                body.i32(node.constant.int());
                body.call(Builtin::GetJoystickDirection);
                body.call(Builtin::SlotSetVec3);
            }
            K::Collision => {
                self.operand(body, node, 0)?;
                body.call(Builtin::TryGetCollision);
                let hit = body.spill(&[I32, I32, F32, F32, F32, F32]);
                body.get(&hit[..1]);
                body.op(I::If(BlockType::Empty));
                body.i32(node.slot(0)?.0 as i32);
                body.get(&hit[1..2]);
                body.call(Builtin::SlotSetI32);
                body.i32(node.slot(1)?.0 as i32);
                body.get(&hit[2..3]);
                body.call(Builtin::SlotSetF32);
                body.i32(node.slot(2)?.0 as i32);
                body.get(&hit[3..]);
                body.call(Builtin::SlotSetVec3);
                self.chain(body, node.branch(0)?)?;
                body.op(I::End);
            }
            K::Loop => {
                self.operands(body, node, 0..2)?;
                let bounds = body.spill(&[F32, F32]);
                let count = body.local(I32);
                let k = body.local(I32);
                body.get(&bounds);
                body.call(Builtin::LoopCount);
                body.op(I::LocalSet(count));
                body.i32(0);
                body.op(I::LocalSet(k));
                body.op(I::Block(BlockType::Empty));
                body.op(I::Loop(BlockType::Empty));
                body.get(&[k, count]);
                body.op(I::I32GeU);
                body.op(I::BrIf(1));
                body.i32(node.slot(0)?.0 as i32);
                body.get(&bounds);
                body.get(&[k]);
                body.call(Builtin::LoopCounter);
                body.call(Builtin::SlotSetF32);
                self.chain(body, node.branch(0)?)?;
                body.get(&[k]);
                body.i32(1);
                body.op(I::I32Add);
                body.op(I::LocalSet(k));
                body.op(I::Br(0));
                body.op(I::End);
                body.op(I::End);
            }
            K::Inspect(ty) => {
                body.i32(id.0 as i32);
                self.operand(body, node, 0)?;
                body.call(inspect(ty));
            }
            K::RandomSeed => {
                self.operand(body, node, 0)?;
                body.call(Builtin::SetRandomSeed);
            }
            K::SetVariable(ty) => {
                body.i32(node.constant.variable().map_or(-1, |var| var.0 as i32));
                body.i32(0);
                self.operand(body, node, 0)?;
                body.call(var_set(ty));
            }
            K::SetPointer(ty) => {
                self.operands(body, node, 0..2)?;
                body.call(var_set(ty));
            }
            K::IncrementNumber | K::DecrementNumber => {
                self.operand(body, node, 0)?;
                let ptr = body.spill(&[I32, I32]);
                body.get(&ptr);
                body.get(&ptr);
                body.call(Builtin::VarGetF32);
                body.f32(if node.kind == K::IncrementNumber {
                    1.0
                } else {
                    -1.0
                });
                body.op(I::F32Add);
                body.call(Builtin::VarSetF32);
            }
            other => {
                return Err(CoreError::invariant(format!(
                    "{other:?} at {} is not a statement",
                    node.pos
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GraphBuilder;

    /// `stages` If blocks, each wiring both branches into the next one.
    fn stacked_diamonds(stages: usize) -> Program {
        let mut g = GraphBuilder::new();
        let mut previous = g.node(BlockKind::If);
        for _ in 1..stages {
            let next = g.node(BlockKind::If);
            g.flow(previous, "True", next);
            g.flow(previous, "False", next);
            previous = next;
        }
        let win = g.node(BlockKind::Win);
        g.flow(previous, "True", win);
        g.build().expect("program")
    }

    #[test]
    fn converging_statements_are_counted_per_wire() {
        let program = stacked_diamonds(3);
        assert_eq!(converging_statements(&program), vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn converging_chains_grow_linearly() {
        let small = generate_wasm(&stacked_diamonds(8)).expect("wasm");
        let large = generate_wasm(&stacked_diamonds(16)).expect("wasm");
        wasmparser::validate(&large).expect("valid module");
        assert!(
            large.len() < small.len() * 2,
            "{} bytes for 16 stages vs {} for 8",
            large.len(),
            small.len()
        );
    }

    #[test]
    fn plain_chains_stay_inline() {
        let mut g = GraphBuilder::new();
        let lose = g.node(BlockKind::Lose);
        let win = g.node(BlockKind::Win);
        g.flow(lose, "After", win);
        let program = g.build().expect("program");
        assert!(converging_statements(&program).is_empty());
    }
}
