//! Function bodies emitted into assembled guests.
//!
//! Every entry point checks the instance handle it receives against the one
//! `construct` handed out and traps on mismatch, so a host that alters the
//! handle is caught immediately.

use wasm_encoder::{BlockType, Function, Instruction, ValType};

use crate::types::*;

/// Where a string constant was placed in the data segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRef {
    pub ptr: u32,
    pub len: u32,
}

/// Page coordinate type of the touch handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordType {
    /// `(handle, id, x: f64, y: f64)`
    #[default]
    Float,
    /// `(handle, id, x: i32, y: i32)`, as declared by `rstetris`.
    Int,
}

pub(crate) fn memarg(offset: u64, align: u32) -> wasm_encoder::MemArg {
    wasm_encoder::MemArg {
        offset,
        align,
        memory_index: 0,
    }
}

fn emit_trap_if(f: &mut Function) {
    f.instruction(&Instruction::If(BlockType::Empty));
    f.instruction(&Instruction::Unreachable);
    f.instruction(&Instruction::End);
}

fn emit_increment(f: &mut Function, global: u32) {
    f.instruction(&Instruction::GlobalGet(global));
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::GlobalSet(global));
}

/// `if handle != GLOBAL_HANDLE { unreachable }` for the handle in local 0.
fn emit_check_handle(f: &mut Function) {
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::GlobalGet(GLOBAL_HANDLE));
    f.instruction(&Instruction::I32Ne);
    emit_trap_if(f);
}

fn emit_log(f: &mut Function, data: DataRef) {
    f.instruction(&Instruction::I32Const(data.ptr as i32));
    f.instruction(&Instruction::I32Const(data.len as i32));
    f.instruction(&Instruction::Call(IMPORT_LOG));
}

/// Emit `allocate(size: i32) -> i32`.
///
/// Bump allocation; linear memory grows one page at a time until the heap
/// pointer fits. With `grow_every_call` the memory additionally grows by one
/// page on every call, so any host view taken before the call goes stale.
pub fn emit_allocate(grow_every_call: bool) -> Function {
    let mut f = Function::new(vec![(1, ValType::I32)]); // local 1: old_ptr
    // old_ptr = heap_ptr
    f.instruction(&Instruction::GlobalGet(GLOBAL_HEAP_PTR));
    f.instruction(&Instruction::LocalSet(1));
    // heap_ptr += size
    f.instruction(&Instruction::GlobalGet(GLOBAL_HEAP_PTR));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::GlobalSet(GLOBAL_HEAP_PTR));
    emit_increment(&mut f, GLOBAL_ALLOC_COUNT);

    if grow_every_call {
        f.instruction(&Instruction::I32Const(1));
        f.instruction(&Instruction::MemoryGrow(0));
        f.instruction(&Instruction::I32Const(-1));
        f.instruction(&Instruction::I32Eq);
        emit_trap_if(&mut f);
    }

    // while heap_ptr > memory.size * 64KiB { memory.grow(1) }
    f.instruction(&Instruction::Block(BlockType::Empty));
    f.instruction(&Instruction::Loop(BlockType::Empty));
    f.instruction(&Instruction::GlobalGet(GLOBAL_HEAP_PTR));
    f.instruction(&Instruction::MemorySize(0));
    f.instruction(&Instruction::I32Const(16));
    f.instruction(&Instruction::I32Shl);
    f.instruction(&Instruction::I32LeU);
    f.instruction(&Instruction::BrIf(1));
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::MemoryGrow(0));
    f.instruction(&Instruction::I32Const(-1));
    f.instruction(&Instruction::I32Eq);
    emit_trap_if(&mut f);
    f.instruction(&Instruction::Br(0));
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);

    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::End);
    f
}

/// Emit `stack_push(value: i32)`; traps when all slots are taken.
pub fn emit_stack_push() -> Function {
    let mut f = Function::new(vec![]);
    f.instruction(&Instruction::GlobalGet(GLOBAL_STACK_DEPTH));
    f.instruction(&Instruction::I32Const(STACK_SLOTS as i32));
    f.instruction(&Instruction::I32GeU);
    emit_trap_if(&mut f);
    // slots[depth] = value
    f.instruction(&Instruction::GlobalGet(GLOBAL_STACK_DEPTH));
    f.instruction(&Instruction::I32Const(4));
    f.instruction(&Instruction::I32Mul);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Store(memarg(STACK_BASE as u64, 2)));
    emit_increment(&mut f, GLOBAL_STACK_DEPTH);
    f.instruction(&Instruction::End);
    f
}

/// Emit `stack_pop() -> i32`; traps when the stack is empty.
pub fn emit_stack_pop() -> Function {
    let mut f = Function::new(vec![]);
    f.instruction(&Instruction::GlobalGet(GLOBAL_STACK_DEPTH));
    f.instruction(&Instruction::I32Eqz);
    emit_trap_if(&mut f);
    f.instruction(&Instruction::GlobalGet(GLOBAL_STACK_DEPTH));
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::I32Sub);
    f.instruction(&Instruction::GlobalSet(GLOBAL_STACK_DEPTH));
    f.instruction(&Instruction::GlobalGet(GLOBAL_STACK_DEPTH));
    f.instruction(&Instruction::I32Const(4));
    f.instruction(&Instruction::I32Mul);
    f.instruction(&Instruction::I32Load(memarg(STACK_BASE as u64, 2)));
    f.instruction(&Instruction::End);
    f
}

/// Emit `construct(width: i32, height: i32) -> i32`.
///
/// Reserves [`INSTANCE_SIZE`] heap bytes and returns their address as the
/// instance handle.
pub fn emit_construct(base: u32, log_line: Option<DataRef>) -> Function {
    let mut f = Function::new(vec![]);
    emit_increment(&mut f, GLOBAL_CONSTRUCT_COUNT);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::GlobalSet(GLOBAL_WIDTH));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::GlobalSet(GLOBAL_HEIGHT));
    f.instruction(&Instruction::I32Const(INSTANCE_SIZE as i32));
    f.instruction(&Instruction::Call(base + FN_ALLOCATE));
    f.instruction(&Instruction::GlobalSet(GLOBAL_HANDLE));
    if let Some(data) = log_line {
        emit_log(&mut f, data);
    }
    f.instruction(&Instruction::GlobalGet(GLOBAL_HANDLE));
    f.instruction(&Instruction::End);
    f
}

/// Emit `tick(handle: i32, timestamp_ms: f64)`.
///
/// With `color`, draws one colored block walking along row 0 and one empty
/// block at (0, 1). With `sample_random`, stores `random() * 1e6` in
/// `last_random_micros`.
pub fn emit_tick(color: Option<u32>, sample_random: bool) -> Function {
    let mut f = Function::new(vec![]);
    emit_check_handle(&mut f);
    emit_increment(&mut f, GLOBAL_TICK_COUNT);
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32TruncSatF64S);
    f.instruction(&Instruction::GlobalSet(GLOBAL_LAST_TICK_MS));

    if let Some(color) = color {
        // draw_block((tick_count - 1) % width, 0, color)
        f.instruction(&Instruction::GlobalGet(GLOBAL_TICK_COUNT));
        f.instruction(&Instruction::I32Const(1));
        f.instruction(&Instruction::I32Sub);
        f.instruction(&Instruction::GlobalGet(GLOBAL_WIDTH));
        f.instruction(&Instruction::I32RemU);
        f.instruction(&Instruction::I32Const(0));
        f.instruction(&Instruction::I32Const(color as i32));
        f.instruction(&Instruction::Call(IMPORT_DRAW_BLOCK));
        // draw_block(0, 1, 0)
        f.instruction(&Instruction::I32Const(0));
        f.instruction(&Instruction::I32Const(1));
        f.instruction(&Instruction::I32Const(0));
        f.instruction(&Instruction::Call(IMPORT_DRAW_BLOCK));
    }

    if sample_random {
        f.instruction(&Instruction::Call(IMPORT_RANDOM));
        f.instruction(&Instruction::F64Const(1_000_000.0));
        f.instruction(&Instruction::F64Mul);
        f.instruction(&Instruction::I32TruncSatF64S);
        f.instruction(&Instruction::GlobalSet(GLOBAL_LAST_RANDOM_MICROS));
    }

    f.instruction(&Instruction::End);
    f
}

/// Emit `key_event(handle: i32, key_code: i32, pressed: i32)`.
pub fn emit_key_event(html: Option<(DataRef, DataRef)>) -> Function {
    let mut f = Function::new(vec![]);
    emit_check_handle(&mut f);
    emit_increment(&mut f, GLOBAL_KEY_COUNT);
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::GlobalSet(GLOBAL_LAST_KEY));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::GlobalSet(GLOBAL_LAST_PRESSED));
    if let Some((id, body)) = html {
        f.instruction(&Instruction::I32Const(id.ptr as i32));
        f.instruction(&Instruction::I32Const(id.len as i32));
        f.instruction(&Instruction::I32Const(body.ptr as i32));
        f.instruction(&Instruction::I32Const(body.len as i32));
        f.instruction(&Instruction::Call(IMPORT_SET_HTML));
    }
    f.instruction(&Instruction::End);
    f
}

/// Emit a touch handler `(handle, id, x, y)` that bumps `count_global`.
pub fn emit_touch(count_global: u32, coords: CoordType) -> Function {
    let mut f = Function::new(vec![]);
    emit_check_handle(&mut f);
    emit_increment(&mut f, count_global);
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::GlobalSet(GLOBAL_LAST_TOUCH_ID));
    for (local, global) in [(2, GLOBAL_LAST_TOUCH_X), (3, GLOBAL_LAST_TOUCH_Y)] {
        f.instruction(&Instruction::LocalGet(local));
        if coords == CoordType::Float {
            f.instruction(&Instruction::I32TruncSatF64S);
        }
        f.instruction(&Instruction::GlobalSet(global));
    }
    f.instruction(&Instruction::End);
    f
}

/// Emit the text echo: pops `length` then `address` off the value stack and
/// hands the range straight back to the host's `log` capability.
pub fn emit_echo(base: u32) -> Function {
    let mut f = Function::new(vec![(2, ValType::I32)]); // local 0: len, local 1: addr
    f.instruction(&Instruction::Call(base + FN_STACK_POP));
    f.instruction(&Instruction::LocalSet(0));
    f.instruction(&Instruction::Call(base + FN_STACK_POP));
    f.instruction(&Instruction::LocalSet(1));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::Call(IMPORT_LOG));
    f.instruction(&Instruction::End);
    f
}

/// Emit the start function; logs `log_line` during instantiation if given.
pub fn emit_start(log_line: Option<DataRef>) -> Function {
    let mut f = Function::new(vec![]);
    if let Some(data) = log_line {
        emit_log(&mut f, data);
    }
    f.instruction(&Instruction::End);
    f
}
