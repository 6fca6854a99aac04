//! Text marshalling across the guest's linear memory.
//!
//! The guest may grow (and so reallocate) its memory during any call into
//! it, including the `allocate` call made while placing text. No view of
//! the memory is ever cached here: every operation borrows the bytes from
//! the store at the moment it touches them, and the borrow checker keeps
//! that borrow from outliving the operation.

use tilebridge_types::{BridgeError, BridgeResult};
use wasmi::{AsContext, AsContextMut, Memory, TypedFunc};

/// A run of bytes placed in guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placed {
    pub address: u32,
    pub length: u32,
}

impl Placed {
    /// Convey the pair to the guest: `address` first, then `length`, so
    /// the guest pops `length` first.
    pub fn push(self, mut ctx: impl AsContextMut, stack: &ValueStack) -> BridgeResult<()> {
        stack.push(&mut ctx, self.address)?;
        stack.push(&mut ctx, self.length)
    }
}

/// Encodes and decodes UTF-8 text in guest memory.
#[derive(Clone)]
pub struct Marshaller {
    memory: Memory,
    allocate: Option<TypedFunc<i32, i32>>,
}

impl Marshaller {
    /// A marshaller over `memory`. Without `allocate` it can only decode.
    pub fn new(memory: Memory, allocate: Option<TypedFunc<i32, i32>>) -> Self {
        Self { memory, allocate }
    }

    /// Read `length` bytes at `address` and interpret them as UTF-8.
    ///
    /// A zero length yields an empty string without touching memory. The
    /// range is checked against the current memory size before anything is
    /// copied.
    pub fn decode(&self, ctx: impl AsContext, address: u32, length: u32) -> BridgeResult<String> {
        if length == 0 {
            return Ok(String::new());
        }
        let out_of_bounds = || BridgeError::OutOfBounds { address, length };
        let end = address.checked_add(length).ok_or_else(out_of_bounds)?;
        if end as usize > self.memory.data_size(&ctx) {
            return Err(out_of_bounds());
        }
        let mut bytes = vec![0u8; length as usize];
        self.memory
            .read(&ctx, address as usize, &mut bytes)
            .map_err(|_| out_of_bounds())?;
        String::from_utf8(bytes).map_err(|source| BridgeError::Decode {
            address,
            length,
            source,
        })
    }

    /// Encode `text`, have the guest allocate room for it, and copy it in.
    ///
    /// Empty text is not allocated and is placed at address 0. Conveying
    /// the returned pair into the guest is the caller's job.
    pub fn encode_and_place(&self, mut ctx: impl AsContextMut, text: &str) -> BridgeResult<Placed> {
        let bytes = text.as_bytes();
        if bytes.is_empty() {
            return Ok(Placed {
                address: 0,
                length: 0,
            });
        }
        let length = u32::try_from(bytes.len()).map_err(|_| BridgeError::OutOfBounds {
            address: 0,
            length: u32::MAX,
        })?;
        let allocate = self
            .allocate
            .as_ref()
            .ok_or_else(|| BridgeError::MissingExport("allocate".into()))?;
        let address = allocate
            .call(&mut ctx, length as i32)
            .map_err(|e| BridgeError::GuestTrap {
                export: "allocate".into(),
                message: e.to_string(),
            })? as u32;
        // `allocate` may have grown memory; the write borrows it afresh.
        self.memory
            .write(&mut ctx, address as usize, bytes)
            .map_err(|_| BridgeError::OutOfBounds { address, length })?;
        Ok(Placed { address, length })
    }
}

/// The guest's two-slot value stack (`stack_push` / `stack_pop`).
///
/// Calls into the guest only carry numeric scalars, so `(address, length)`
/// pairs travel through this stack ahead of the call that consumes them.
#[derive(Clone)]
pub struct ValueStack {
    push: TypedFunc<i32, ()>,
    pop: TypedFunc<(), i32>,
}

impl ValueStack {
    pub fn new(push: TypedFunc<i32, ()>, pop: TypedFunc<(), i32>) -> Self {
        Self { push, pop }
    }

    pub fn push(&self, ctx: impl AsContextMut, value: u32) -> BridgeResult<()> {
        self.push
            .call(ctx, value as i32)
            .map_err(|e| BridgeError::GuestTrap {
                export: "stack_push".into(),
                message: e.to_string(),
            })
    }

    pub fn pop(&self, ctx: impl AsContextMut) -> BridgeResult<u32> {
        self.pop
            .call(ctx, ())
            .map(|value| value as u32)
            .map_err(|e| BridgeError::GuestTrap {
                export: "stack_pop".into(),
                message: e.to_string(),
            })
    }
}
