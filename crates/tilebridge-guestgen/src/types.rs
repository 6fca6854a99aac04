//! Index constants and memory layout for assembled guests.
//!
//! ```text
//! 0x0000 .. STACK_BASE            : static data (log lines, html snippets)
//! STACK_BASE .. +4*STACK_SLOTS    : two-slot value stack (u32 slots)
//! HEAP_START ..                   : bump heap, grown on demand
//! ```

// ── WASM type indices ────────────────────────────────────────────────────────
// (order must match emit_types in assembler.rs)

/// `() -> ()`
pub const TYPE_VOID_VOID: u32 = 0;
/// `() -> i32`
pub const TYPE_VOID_I32: u32 = 1;
/// `(i32) -> ()`
pub const TYPE_I32_VOID: u32 = 2;
/// `(i32) -> i32`
pub const TYPE_I32_I32: u32 = 3;
/// `(i32, i32) -> ()`
pub const TYPE_I32X2_VOID: u32 = 4;
/// `(i32, i32) -> i32`
pub const TYPE_I32X2_I32: u32 = 5;
/// `(i32, i32, i32) -> ()`
pub const TYPE_I32X3_VOID: u32 = 6;
/// `(i32, i32, i32, i32) -> ()`
pub const TYPE_I32X4_VOID: u32 = 7;
/// `() -> f64`
pub const TYPE_VOID_F64: u32 = 8;
/// `(i32, f64) -> ()`
pub const TYPE_I32_F64_VOID: u32 = 9;
/// `(i32, i32, f64, f64) -> ()`
pub const TYPE_I32X2_F64X2_VOID: u32 = 10;

// ── Imported function indices ────────────────────────────────────────────────
// (order must match emit_imports in assembler.rs)

/// `log(address: i32, length: i32)`
pub const IMPORT_LOG: u32 = 0;
/// `draw_block(x: i32, y: i32, color: i32)`
pub const IMPORT_DRAW_BLOCK: u32 = 1;
/// `random() -> f64`
pub const IMPORT_RANDOM: u32 = 2;
/// `set_html(id_address, id_length, html_address, html_length)`
pub const IMPORT_SET_HTML: u32 = 3;

/// Number of capability imports (an optional extra import follows them).
pub const CAPABILITY_IMPORT_COUNT: u32 = 4;

// ── Local function offsets (relative to the first local index) ──────────────

pub const FN_ALLOCATE: u32 = 0;
pub const FN_STACK_PUSH: u32 = 1;
pub const FN_STACK_POP: u32 = 2;
pub const FN_CONSTRUCT: u32 = 3;
pub const FN_TICK: u32 = 4;
pub const FN_KEY_EVENT: u32 = 5;
pub const FN_TOUCH_START: u32 = 6;
pub const FN_TOUCH_END: u32 = 7;
pub const FN_TOUCH_CANCEL: u32 = 8;
pub const FN_TOUCH_MOVE: u32 = 9;
pub const FN_ECHO: u32 = 10;
pub const FN_START: u32 = 11;

// ── Global indices ───────────────────────────────────────────────────────────

pub const GLOBAL_HEAP_PTR: u32 = 0;
pub const GLOBAL_STACK_DEPTH: u32 = 1;
pub const GLOBAL_HANDLE: u32 = 2;
pub const GLOBAL_CONSTRUCT_COUNT: u32 = 3;
pub const GLOBAL_WIDTH: u32 = 4;
pub const GLOBAL_HEIGHT: u32 = 5;
pub const GLOBAL_TICK_COUNT: u32 = 6;
pub const GLOBAL_LAST_TICK_MS: u32 = 7;
pub const GLOBAL_KEY_COUNT: u32 = 8;
pub const GLOBAL_LAST_KEY: u32 = 9;
pub const GLOBAL_LAST_PRESSED: u32 = 10;
pub const GLOBAL_TOUCH_START_COUNT: u32 = 11;
pub const GLOBAL_TOUCH_END_COUNT: u32 = 12;
pub const GLOBAL_TOUCH_CANCEL_COUNT: u32 = 13;
pub const GLOBAL_TOUCH_MOVE_COUNT: u32 = 14;
pub const GLOBAL_LAST_TOUCH_ID: u32 = 15;
pub const GLOBAL_LAST_TOUCH_X: u32 = 16;
pub const GLOBAL_LAST_TOUCH_Y: u32 = 17;
pub const GLOBAL_LAST_RANDOM_MICROS: u32 = 18;
pub const GLOBAL_ALLOC_COUNT: u32 = 19;

/// Total number of globals.
pub const GLOBAL_COUNT: u32 = 20;

/// Every global is exported under this name so hosts can inspect it.
pub const GLOBAL_EXPORTS: [(&str, u32); GLOBAL_COUNT as usize] = [
    ("heap_ptr", GLOBAL_HEAP_PTR),
    ("stack_depth", GLOBAL_STACK_DEPTH),
    ("handle", GLOBAL_HANDLE),
    ("construct_count", GLOBAL_CONSTRUCT_COUNT),
    ("width", GLOBAL_WIDTH),
    ("height", GLOBAL_HEIGHT),
    ("tick_count", GLOBAL_TICK_COUNT),
    ("last_tick_ms", GLOBAL_LAST_TICK_MS),
    ("key_count", GLOBAL_KEY_COUNT),
    ("last_key", GLOBAL_LAST_KEY),
    ("last_pressed", GLOBAL_LAST_PRESSED),
    ("touch_start_count", GLOBAL_TOUCH_START_COUNT),
    ("touch_end_count", GLOBAL_TOUCH_END_COUNT),
    ("touch_cancel_count", GLOBAL_TOUCH_CANCEL_COUNT),
    ("touch_move_count", GLOBAL_TOUCH_MOVE_COUNT),
    ("last_touch_id", GLOBAL_LAST_TOUCH_ID),
    ("last_touch_x", GLOBAL_LAST_TOUCH_X),
    ("last_touch_y", GLOBAL_LAST_TOUCH_Y),
    ("last_random_micros", GLOBAL_LAST_RANDOM_MICROS),
    ("alloc_count", GLOBAL_ALLOC_COUNT),
];

// ── Memory ───────────────────────────────────────────────────────────────────

/// Initial linear memory size in pages (64 KiB each).
pub const INITIAL_MEMORY_PAGES: u64 = 1;
/// Maximum linear memory pages (16 MiB).
pub const MAX_MEMORY_PAGES: u64 = 256;
/// Base of the value stack.
pub const STACK_BASE: u32 = 2048;
/// Number of u32 slots in the value stack.
pub const STACK_SLOTS: u32 = 16;
/// First heap byte.
pub const HEAP_START: u32 = 4096;
/// Bytes reserved per constructed instance.
pub const INSTANCE_SIZE: u32 = 16;

// ── Custom section ───────────────────────────────────────────────────────────

pub const CUSTOM_SECTION_NAME: &str = "tilebridge-guest";
pub const ASSEMBLER_VERSION: &str = env!("CARGO_PKG_VERSION");
