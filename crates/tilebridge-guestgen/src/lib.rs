//! Guest module assembler for the tilebridge guest ABI.
//!
//! # Architecture
//!
//! [`assemble`] turns a [`GuestSpec`] into a self-contained `.wasm` module
//! that honours the host↔guest contract without carrying any application
//! logic. Hosts use these modules to exercise the boundary.
//!
//! ## Imports (module `env` by default)
//! - `log(address, length)` (or `console_log`)
//! - `draw_block(x, y, color)`
//! - `random() → f64`
//! - `set_html(id_address, id_length, html_address, html_length)` (or `html`)
//!
//! ## Exports (names from [`tilebridge_types::GuestAbi`])
//! - `construct(width, height) → handle`
//! - `tick(handle, timestamp_ms)`
//! - `key_event(handle, key_code, pressed)`
//! - `touch_start/end/cancel/move(handle, id, x, y)`
//! - `allocate(length) → address`
//! - `stack_push(value)`, `stack_pop() → value`
//! - `memory`: linear memory
//! - one mutable i32 global per counter in [`types::GLOBAL_EXPORTS`]

pub mod assembler;
pub mod error;
pub mod runtime;
pub mod types;

pub use assembler::{assemble, GuestSpec, ImportNaming};
pub use error::{GuestGenError, GuestGenResult};
pub use runtime::CoordType;
