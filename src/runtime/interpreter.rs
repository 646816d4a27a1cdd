//! Structured tree-walking interpreter
//!
//! A [`Machine`] runs one invocation: it owns the operand stack, tracks the
//! call depth and charges every instruction against the attached
//! [`Statistics`]. Control instructions recurse into their bodies and report
//! how they ended through [`BlockEnd`]; a branch to depth `n` is unwound one
//! label per level until it reaches its target.
//!
//! Cancellation is cooperative. Interpreted code polls the token at every
//! loop back-edge and call entry. Compiled code runs natively, so it is only
//! checked on entry, and only when the executor is configured as
//! interruptible.
//!
//! Control flow recurses on the native stack. Besides the call-depth bound,
//! every call and block entry measures how far the native stack has grown
//! since the machine started and traps once that exceeds
//! [`Configure::max_wasm_stack`](super::Configure::max_wasm_stack).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::calling_frame::CallingFrame;
use super::control::{BlockEnd, Label, LabelType};
use super::executor::Executor;
use super::frame::Frame;
use super::function::{Function, FunctionKind, HostFunction};
use super::module::ModuleData;
use super::ops;
use super::stack::Stack;
use super::statistics::Statistics;
use super::{RuntimeError, Trap, Value};
use crate::ast::instruction::{BlockType, Instruction};
use crate::ast::types::FunctionType;

pub(crate) struct Machine<'a> {
    executor: &'a Executor,
    cancel: &'a AtomicBool,
    stats: Option<&'a Statistics>,
    count_instructions: bool,
    measure_cost: bool,
    measure_time: bool,
    interruptible: bool,
    max_depth: usize,
    native_base: usize,
    max_native: usize,
    stack: Stack,
    depth: usize,
}

impl<'a> Machine<'a> {
    pub(crate) fn new(executor: &'a Executor, cancel: &'a AtomicBool) -> Self {
        let config = executor.config();
        let stats = executor.statistics().map(Arc::as_ref);
        Machine {
            executor,
            cancel,
            stats,
            count_instructions: stats.is_some() && config.statistics.instruction_counting,
            measure_cost: stats.is_some() && config.statistics.cost_measuring,
            measure_time: stats.is_some() && config.statistics.time_measuring,
            interruptible: config.interruptible,
            max_depth: config.max_call_depth,
            native_base: native_stack_position(),
            max_native: config.max_wasm_stack,
            stack: Stack::new(),
            depth: 0,
        }
    }

    /// Call `func` with `args`, which must already match its parameter types
    ///
    /// `caller` is the module of the calling wasm code, if any.
    pub(crate) fn call(
        &mut self,
        func: &Arc<Function>,
        caller: Option<&Arc<ModuleData>>,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, RuntimeError> {
        if self.depth >= self.max_depth {
            return Err(Trap::CallStackExhausted.into());
        }
        self.check_native_stack()?;
        if self.interruptible || !matches!(func.kind, FunctionKind::Compiled(_)) {
            self.checkpoint()?;
        }
        match &func.kind {
            FunctionKind::Wasm(body) => {
                let module = func.owner().ok_or(RuntimeError::WrongInstanceAddress)?;
                let mut locals = args;
                locals.extend(body.locals.iter().map(|ty| Value::default_for(*ty)));
                let mut frame = Frame::new(locals, module);
                self.depth += 1;
                let result = self.run_body(&mut frame, func.ty(), &body.body);
                self.depth -= 1;
                result
            }
            FunctionKind::Compiled(entry) => {
                self.depth += 1;
                let result = self.call_native(entry.as_ref(), func.owner(), func.ty(), &args);
                self.depth -= 1;
                result
            }
            FunctionKind::Host { func: host, cost } => {
                if self.measure_cost {
                    self.charge_cost(*cost)?;
                }
                let module = caller.cloned().or_else(|| func.owner());
                self.depth += 1;
                let result = self.call_native(host.as_ref(), module, func.ty(), &args);
                self.depth -= 1;
                result
            }
        }
    }

    fn run_body(&mut self, frame: &mut Frame, ty: &FunctionType, body: &[Instruction]) -> Result<Vec<Value>, RuntimeError> {
        let base = self.stack.depth();
        frame.labels.push(Label {
            label_type: LabelType::Block,
            arity: ty.results_len(),
            stack_height: base,
        });
        // a branch that reaches the function label behaves like `return`
        self.execute_instructions(frame, body)?;
        let results = self.stack.pop_n(ty.results_len())?;
        self.stack.truncate(base);
        for (value, expected) in results.iter().zip(ty.results()) {
            if !value.matches(*expected) {
                return Err(RuntimeError::type_mismatch(expected, value.typ()));
            }
        }
        Ok(results)
    }

    fn call_native(
        &mut self,
        host: &dyn HostFunction,
        module: Option<Arc<ModuleData>>,
        ty: &FunctionType,
        args: &[Value],
    ) -> Result<Vec<Value>, RuntimeError> {
        let mut returns: Vec<Value> = ty.results().iter().map(|t| Value::default_for(*t)).collect();
        let frame = CallingFrame::new(self.executor, module);
        tracing::trace!(?frame, params = args.len(), "calling host function");
        if self.measure_time {
            self.time_host(true);
        }
        let result = host.call(&frame, args, &mut returns);
        if self.measure_time {
            self.time_host(false);
        }
        result?;
        for (value, expected) in returns.iter().zip(ty.results()) {
            if !value.matches(*expected) {
                return Err(RuntimeError::FuncSigMismatch(format!(
                    "host function returned {} where {} was declared",
                    value.typ(),
                    expected
                )));
            }
        }
        Ok(returns)
    }

    fn time_host(&self, entering: bool) {
        if let Some(stats) = self.stats {
            if entering {
                stats.stop_wasm();
                stats.start_host();
            } else {
                stats.stop_host();
                stats.start_wasm();
            }
        }
    }

    fn checkpoint(&self) -> Result<(), RuntimeError> {
        if self.cancel.load(Ordering::Acquire) {
            tracing::debug!(depth = self.depth, "execution interrupted");
            return Err(Trap::Interrupted.into());
        }
        Ok(())
    }

    fn check_native_stack(&self) -> Result<(), RuntimeError> {
        let used = native_stack_position().abs_diff(self.native_base);
        if used > self.max_native {
            tracing::debug!(depth = self.depth, used, "native stack budget exhausted");
            return Err(Trap::CallStackExhausted.into());
        }
        Ok(())
    }

    fn charge_cost(&self, cost: u64) -> Result<(), RuntimeError> {
        match self.stats {
            Some(stats) if !stats.add_cost(cost) => Err(Trap::CostLimitExceeded.into()),
            _ => Ok(()),
        }
    }

    #[inline]
    fn charge(&self, instr: &Instruction) -> Result<(), RuntimeError> {
        if let Some(stats) = self.stats {
            if self.count_instructions {
                stats.inc_instr_count();
            }
            if self.measure_cost {
                self.charge_cost(stats.instr_cost(instr.opcode()))?;
            }
        }
        Ok(())
    }

    fn execute_instructions(&mut self, frame: &mut Frame, instructions: &[Instruction]) -> Result<BlockEnd, RuntimeError> {
        for instruction in instructions {
            self.charge(instruction)?;
            match self.execute_instruction(frame, instruction)? {
                BlockEnd::Normal => continue,
                other => return Ok(other),
            }
        }
        Ok(BlockEnd::Normal)
    }

    /// Parameter and result counts of a block signature
    fn block_arity(frame: &Frame, ty: &BlockType) -> Result<(usize, usize), RuntimeError> {
        Ok(match ty {
            BlockType::Empty => (0, 0),
            BlockType::Value(_) => (0, 1),
            BlockType::Type(idx) => {
                let ty = frame.module.func_type(*idx)?;
                (ty.params_len(), ty.results_len())
            }
        })
    }

    fn execute_block(
        &mut self,
        frame: &mut Frame,
        label_type: LabelType,
        ty: &BlockType,
        body: &[Instruction],
    ) -> Result<BlockEnd, RuntimeError> {
        self.check_native_stack()?;
        let (params, results) = Self::block_arity(frame, ty)?;
        let stack_height = self
            .stack
            .depth()
            .checked_sub(params)
            .ok_or_else(|| RuntimeError::type_mismatch(format!("{params} block operands"), self.stack.depth()))?;
        let arity = if label_type == LabelType::Loop { params } else { results };
        frame.labels.push(Label {
            label_type,
            arity,
            stack_height,
        });
        let result = loop {
            match self.execute_instructions(frame, body) {
                Ok(BlockEnd::Branch(0)) if label_type == LabelType::Loop => {
                    if let Err(e) = self.checkpoint() {
                        break Err(e);
                    }
                }
                other => break other,
            }
        };
        frame.labels.pop();
        Ok(match result? {
            BlockEnd::Branch(0) => BlockEnd::Normal,
            BlockEnd::Branch(depth) => BlockEnd::Branch(depth - 1),
            other => other,
        })
    }

    fn execute_call(&mut self, frame: &mut Frame, callee: Arc<Function>) -> Result<BlockEnd, RuntimeError> {
        let args = self.stack.pop_n(callee.ty().params_len())?;
        let results = self.call(&callee, Some(&frame.module), args)?;
        self.stack.push_all(results);
        Ok(BlockEnd::Normal)
    }

    fn resolve_indirect(&mut self, frame: &Frame, type_idx: u32, table_idx: u32) -> Result<Arc<Function>, RuntimeError> {
        let table = frame.module.table(table_idx)?;
        let elem = self.stack.pop_i32()? as u32;
        let addr = match table.get(elem).map_err(|_| Trap::UndefinedElement)? {
            Value::FuncRef(Some(addr)) => addr,
            Value::FuncRef(None) => return Err(Trap::UninitializedElement.into()),
            other => return Err(RuntimeError::type_mismatch("funcref", other.typ())),
        };
        let callee = addr.upgrade().ok_or(RuntimeError::WrongInstanceAddress)?;
        if callee.ty() != frame.module.func_type(type_idx)? {
            return Err(Trap::IndirectCallTypeMismatch.into());
        }
        Ok(callee)
    }

    fn execute_instruction(&mut self, frame: &mut Frame, instruction: &Instruction) -> Result<BlockEnd, RuntimeError> {
        match instruction {
            Instruction::Block { ty, body } => self.execute_block(frame, LabelType::Block, ty, body),
            Instruction::Loop { ty, body } => self.execute_block(frame, LabelType::Loop, ty, body),
            Instruction::If {
                ty,
                then_body,
                else_body,
            } => {
                let condition = self.stack.pop_i32()?;
                let body = if condition != 0 { then_body } else { else_body };
                self.execute_block(frame, LabelType::If, ty, body)
            }
            Instruction::Call(idx) => {
                let callee = frame.module.function(*idx)?;
                self.execute_call(frame, callee)
            }
            Instruction::CallIndirect { type_idx, table_idx } => {
                let callee = self.resolve_indirect(frame, *type_idx, *table_idx)?;
                self.execute_call(frame, callee)
            }
            other => self.execute_plain_instruction(frame, other),
        }
    }

    /// Everything without a nested body; kept out of line so the recursive
    /// path above stays small per level
    #[inline(never)]
    fn execute_plain_instruction(&mut self, frame: &mut Frame, inst: &Instruction) -> Result<BlockEnd, RuntimeError> {
        use Instruction::*;

        let stack = &mut self.stack;

        macro_rules! op {
            ($f:expr) => {{
                $f(stack)?;
                Ok(BlockEnd::Normal)
            }};
        }

        macro_rules! mem {
            ($f:path, $memarg:expr) => {{
                let memory = frame.module.memory($memarg.memory)?;
                $f(stack, &memory, $memarg)?;
                Ok(BlockEnd::Normal)
            }};
        }

        match inst {
            Unreachable => ops::control::unreachable(),
            Nop => Ok(BlockEnd::Normal),
            Br(depth) => ops::control::br(stack, &frame.labels, *depth),
            BrIf(depth) => ops::control::br_if(stack, &frame.labels, *depth),
            BrTable { labels, default } => ops::control::br_table(stack, &frame.labels, labels, *default),
            Return => ops::control::return_op(),

            RefNull(ty) => {
                ops::table::ref_null(stack, *ty)?;
                Ok(BlockEnd::Normal)
            }
            RefIsNull => op!(ops::table::ref_is_null),
            RefFunc(idx) => {
                ops::table::ref_func(stack, &frame.module, *idx)?;
                Ok(BlockEnd::Normal)
            }

            Drop => op!(ops::parametric::drop),
            Select => op!(ops::parametric::select),

            LocalGet(idx) => {
                ops::variable::local_get(stack, frame, *idx)?;
                Ok(BlockEnd::Normal)
            }
            LocalSet(idx) => {
                ops::variable::local_set(stack, frame, *idx)?;
                Ok(BlockEnd::Normal)
            }
            LocalTee(idx) => {
                ops::variable::local_tee(stack, frame, *idx)?;
                Ok(BlockEnd::Normal)
            }
            GlobalGet(idx) => {
                ops::variable::global_get(stack, &frame.module, *idx)?;
                Ok(BlockEnd::Normal)
            }
            GlobalSet(idx) => {
                ops::variable::global_set(stack, &frame.module, *idx)?;
                Ok(BlockEnd::Normal)
            }

            TableGet(idx) => {
                ops::table::table_get(stack, &frame.module, *idx)?;
                Ok(BlockEnd::Normal)
            }
            TableSet(idx) => {
                ops::table::table_set(stack, &frame.module, *idx)?;
                Ok(BlockEnd::Normal)
            }
            TableSize(idx) => {
                ops::table::table_size(stack, &frame.module, *idx)?;
                Ok(BlockEnd::Normal)
            }
            TableGrow(idx) => {
                ops::table::table_grow(stack, &frame.module, *idx)?;
                Ok(BlockEnd::Normal)
            }

            I32Load(m) => mem!(ops::memory::i32_load, m),
            I64Load(m) => mem!(ops::memory::i64_load, m),
            F32Load(m) => mem!(ops::memory::f32_load, m),
            F64Load(m) => mem!(ops::memory::f64_load, m),
            I32Load8S(m) => mem!(ops::memory::i32_load8_s, m),
            I32Load8U(m) => mem!(ops::memory::i32_load8_u, m),
            I32Load16S(m) => mem!(ops::memory::i32_load16_s, m),
            I32Load16U(m) => mem!(ops::memory::i32_load16_u, m),
            I64Load8S(m) => mem!(ops::memory::i64_load8_s, m),
            I64Load8U(m) => mem!(ops::memory::i64_load8_u, m),
            I64Load16S(m) => mem!(ops::memory::i64_load16_s, m),
            I64Load16U(m) => mem!(ops::memory::i64_load16_u, m),
            I64Load32S(m) => mem!(ops::memory::i64_load32_s, m),
            I64Load32U(m) => mem!(ops::memory::i64_load32_u, m),
            I32Store(m) => mem!(ops::memory::i32_store, m),
            I64Store(m) => mem!(ops::memory::i64_store, m),
            F32Store(m) => mem!(ops::memory::f32_store, m),
            F64Store(m) => mem!(ops::memory::f64_store, m),
            I32Store8(m) => mem!(ops::memory::i32_store8, m),
            I32Store16(m) => mem!(ops::memory::i32_store16, m),
            I64Store8(m) => mem!(ops::memory::i64_store8, m),
            I64Store16(m) => mem!(ops::memory::i64_store16, m),
            I64Store32(m) => mem!(ops::memory::i64_store32, m),
            MemorySize(idx) => {
                let memory = frame.module.memory(*idx)?;
                ops::memory::memory_size(stack, &memory)?;
                Ok(BlockEnd::Normal)
            }
            MemoryGrow(idx) => {
                let memory = frame.module.memory(*idx)?;
                ops::memory::memory_grow(stack, &memory)?;
                Ok(BlockEnd::Normal)
            }

            I32Const(v) => {
                ops::numeric::i32_const(stack, *v)?;
                Ok(BlockEnd::Normal)
            }
            I64Const(v) => {
                ops::numeric::i64_const(stack, *v)?;
                Ok(BlockEnd::Normal)
            }
            F32Const(v) => {
                ops::numeric::f32_const(stack, *v)?;
                Ok(BlockEnd::Normal)
            }
            F64Const(v) => {
                ops::numeric::f64_const(stack, *v)?;
                Ok(BlockEnd::Normal)
            }

            I32Eqz => op!(ops::comparison::i32_eqz),
            I32Eq => op!(ops::comparison::i32_eq),
            I32Ne => op!(ops::comparison::i32_ne),
            I32LtS => op!(ops::comparison::i32_lt_s),
            I32LtU => op!(ops::comparison::i32_lt_u),
            I32GtS => op!(ops::comparison::i32_gt_s),
            I32GtU => op!(ops::comparison::i32_gt_u),
            I32LeS => op!(ops::comparison::i32_le_s),
            I32LeU => op!(ops::comparison::i32_le_u),
            I32GeS => op!(ops::comparison::i32_ge_s),
            I32GeU => op!(ops::comparison::i32_ge_u),
            I64Eqz => op!(ops::comparison::i64_eqz),
            I64Eq => op!(ops::comparison::i64_eq),
            I64Ne => op!(ops::comparison::i64_ne),
            I64LtS => op!(ops::comparison::i64_lt_s),
            I64LtU => op!(ops::comparison::i64_lt_u),
            I64GtS => op!(ops::comparison::i64_gt_s),
            I64GtU => op!(ops::comparison::i64_gt_u),
            I64LeS => op!(ops::comparison::i64_le_s),
            I64LeU => op!(ops::comparison::i64_le_u),
            I64GeS => op!(ops::comparison::i64_ge_s),
            I64GeU => op!(ops::comparison::i64_ge_u),
            F32Eq => op!(ops::comparison::f32_eq),
            F32Ne => op!(ops::comparison::f32_ne),
            F32Lt => op!(ops::comparison::f32_lt),
            F32Gt => op!(ops::comparison::f32_gt),
            F32Le => op!(ops::comparison::f32_le),
            F32Ge => op!(ops::comparison::f32_ge),
            F64Eq => op!(ops::comparison::f64_eq),
            F64Ne => op!(ops::comparison::f64_ne),
            F64Lt => op!(ops::comparison::f64_lt),
            F64Gt => op!(ops::comparison::f64_gt),
            F64Le => op!(ops::comparison::f64_le),
            F64Ge => op!(ops::comparison::f64_ge),

            I32Clz => op!(ops::bitwise::i32_clz),
            I32Ctz => op!(ops::bitwise::i32_ctz),
            I32Popcnt => op!(ops::bitwise::i32_popcnt),
            I32Add => op!(ops::numeric::i32_add),
            I32Sub => op!(ops::numeric::i32_sub),
            I32Mul => op!(ops::numeric::i32_mul),
            I32DivS => op!(ops::numeric::i32_div_s),
            I32DivU => op!(ops::numeric::i32_div_u),
            I32RemS => op!(ops::numeric::i32_rem_s),
            I32RemU => op!(ops::numeric::i32_rem_u),
            I32And => op!(ops::bitwise::i32_and),
            I32Or => op!(ops::bitwise::i32_or),
            I32Xor => op!(ops::bitwise::i32_xor),
            I32Shl => op!(ops::bitwise::i32_shl),
            I32ShrS => op!(ops::bitwise::i32_shr_s),
            I32ShrU => op!(ops::bitwise::i32_shr_u),
            I32Rotl => op!(ops::bitwise::i32_rotl),
            I32Rotr => op!(ops::bitwise::i32_rotr),

            I64Clz => op!(ops::bitwise::i64_clz),
            I64Ctz => op!(ops::bitwise::i64_ctz),
            I64Popcnt => op!(ops::bitwise::i64_popcnt),
            I64Add => op!(ops::numeric::i64_add),
            I64Sub => op!(ops::numeric::i64_sub),
            I64Mul => op!(ops::numeric::i64_mul),
            I64DivS => op!(ops::numeric::i64_div_s),
            I64DivU => op!(ops::numeric::i64_div_u),
            I64RemS => op!(ops::numeric::i64_rem_s),
            I64RemU => op!(ops::numeric::i64_rem_u),
            I64And => op!(ops::bitwise::i64_and),
            I64Or => op!(ops::bitwise::i64_or),
            I64Xor => op!(ops::bitwise::i64_xor),
            I64Shl => op!(ops::bitwise::i64_shl),
            I64ShrS => op!(ops::bitwise::i64_shr_s),
            I64ShrU => op!(ops::bitwise::i64_shr_u),
            I64Rotl => op!(ops::bitwise::i64_rotl),
            I64Rotr => op!(ops::bitwise::i64_rotr),

            F32Abs => op!(ops::numeric::f32_abs),
            F32Neg => op!(ops::numeric::f32_neg),
            F32Ceil => op!(ops::numeric::f32_ceil),
            F32Floor => op!(ops::numeric::f32_floor),
            F32Trunc => op!(ops::numeric::f32_trunc),
            F32Nearest => op!(ops::numeric::f32_nearest),
            F32Sqrt => op!(ops::numeric::f32_sqrt),
            F32Add => op!(ops::numeric::f32_add),
            F32Sub => op!(ops::numeric::f32_sub),
            F32Mul => op!(ops::numeric::f32_mul),
            F32Div => op!(ops::numeric::f32_div),
            F32Min => op!(ops::numeric::f32_min),
            F32Max => op!(ops::numeric::f32_max),
            F32Copysign => op!(ops::numeric::f32_copysign),
            F64Abs => op!(ops::numeric::f64_abs),
            F64Neg => op!(ops::numeric::f64_neg),
            F64Ceil => op!(ops::numeric::f64_ceil),
            F64Floor => op!(ops::numeric::f64_floor),
            F64Trunc => op!(ops::numeric::f64_trunc),
            F64Nearest => op!(ops::numeric::f64_nearest),
            F64Sqrt => op!(ops::numeric::f64_sqrt),
            F64Add => op!(ops::numeric::f64_add),
            F64Sub => op!(ops::numeric::f64_sub),
            F64Mul => op!(ops::numeric::f64_mul),
            F64Div => op!(ops::numeric::f64_div),
            F64Min => op!(ops::numeric::f64_min),
            F64Max => op!(ops::numeric::f64_max),
            F64Copysign => op!(ops::numeric::f64_copysign),

            I32WrapI64 => op!(ops::conversion::i32_wrap_i64),
            I32TruncF32S => op!(ops::conversion::i32_trunc_f32_s),
            I32TruncF32U => op!(ops::conversion::i32_trunc_f32_u),
            I32TruncF64S => op!(ops::conversion::i32_trunc_f64_s),
            I32TruncF64U => op!(ops::conversion::i32_trunc_f64_u),
            I64ExtendI32S => op!(ops::conversion::i64_extend_i32_s),
            I64ExtendI32U => op!(ops::conversion::i64_extend_i32_u),
            I64TruncF32S => op!(ops::conversion::i64_trunc_f32_s),
            I64TruncF32U => op!(ops::conversion::i64_trunc_f32_u),
            I64TruncF64S => op!(ops::conversion::i64_trunc_f64_s),
            I64TruncF64U => op!(ops::conversion::i64_trunc_f64_u),
            F32ConvertI32S => op!(ops::conversion::f32_convert_i32_s),
            F32ConvertI32U => op!(ops::conversion::f32_convert_i32_u),
            F32ConvertI64S => op!(ops::conversion::f32_convert_i64_s),
            F32ConvertI64U => op!(ops::conversion::f32_convert_i64_u),
            F64ConvertI32S => op!(ops::conversion::f64_convert_i32_s),
            F64ConvertI32U => op!(ops::conversion::f64_convert_i32_u),
            F64ConvertI64S => op!(ops::conversion::f64_convert_i64_s),
            F64ConvertI64U => op!(ops::conversion::f64_convert_i64_u),
            F32DemoteF64 => op!(ops::conversion::f32_demote_f64),
            F64PromoteF32 => op!(ops::conversion::f64_promote_f32),
            I32ReinterpretF32 => op!(ops::conversion::i32_reinterpret_f32),
            I64ReinterpretF64 => op!(ops::conversion::i64_reinterpret_f64),
            F32ReinterpretI32 => op!(ops::conversion::f32_reinterpret_i32),
            F64ReinterpretI64 => op!(ops::conversion::f64_reinterpret_i64),
            I32Extend8S => op!(ops::conversion::i32_extend8_s),
            I32Extend16S => op!(ops::conversion::i32_extend16_s),
            I64Extend8S => op!(ops::conversion::i64_extend8_s),
            I64Extend16S => op!(ops::conversion::i64_extend16_s),
            I64Extend32S => op!(ops::conversion::i64_extend32_s),

            Block { .. } | Loop { .. } | If { .. } | Call(_) | CallIndirect { .. } => Err(RuntimeError::Malformed(
                format!("structured instruction {:#x} outside the block dispatcher", inst.opcode()),
            )),
        }
    }
}

/// Approximate address of the current native stack top
#[inline(always)]
fn native_stack_position() -> usize {
    let marker = 0u8;
    std::hint::black_box(std::ptr::addr_of!(marker)) as usize
}
