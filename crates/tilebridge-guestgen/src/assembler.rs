//! Guest module assembler.
//!
//! Builds a module in section order:
//! 1. Types and capability imports
//! 2. Runtime functions (allocator, value stack) and ABI entry points
//! 3. Memory, globals, exports, optional start function
//! 4. Code, static data, custom metadata
//! 5. Validate with `wasmparser`

use std::collections::HashSet;

use tilebridge_types::GuestAbi;
use wasm_encoder::{
    CodeSection, ConstExpr, CustomSection, DataSection, EntityType, ExportKind, ExportSection,
    FunctionSection, GlobalSection, GlobalType, ImportSection, MemorySection, MemoryType, Module,
    StartSection, TypeSection, ValType,
};

use crate::error::{GuestGenError, GuestGenResult};
use crate::runtime::{self, CoordType, DataRef};
use crate::types::*;

/// Import names the guest declares for the four capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportNaming {
    /// `log`, `draw_block`, `random`, `set_html`
    #[default]
    Standard,
    /// `console_log`, `draw_block`, `random`, `html`
    Rstetris,
}

impl ImportNaming {
    fn names(self) -> [&'static str; 4] {
        match self {
            Self::Standard => ["log", "draw_block", "random", "set_html"],
            Self::Rstetris => ["console_log", "draw_block", "random", "html"],
        }
    }
}

/// What the assembled guest does at each entry point.
#[derive(Debug, Clone, Default)]
pub struct GuestSpec {
    pub abi: GuestAbi,
    pub imports: ImportNaming,
    pub touch_coords: CoordType,
    /// Bytes passed to `log` from `construct`; need not be valid UTF-8.
    pub construct_log: Option<Vec<u8>>,
    /// Length passed to `log` from `construct` in place of the length of
    /// `construct_log`.
    pub construct_log_length: Option<i32>,
    /// Bytes passed to `log` from the start function, during instantiation.
    pub start_log: Option<Vec<u8>>,
    /// Color drawn by every `tick`.
    pub tick_color: Option<u32>,
    /// Whether every `tick` samples `random`.
    pub tick_random: bool,
    /// `(element_id, html)` passed to `set_html` by every key event.
    pub key_html: Option<(String, String)>,
    /// Grow linear memory by a page on every `allocate`.
    pub grow_on_alloc: bool,
    /// Export name of the text echo entry point.
    pub echo_export: Option<String>,
    /// Extra `() -> ()` function import in the capability module.
    pub extra_import: Option<String>,
}

/// Assemble a guest module from `spec`.
///
/// Returns the bytes of a validated WebAssembly module.
pub fn assemble(spec: &GuestSpec) -> GuestGenResult<Vec<u8>> {
    Assembler::new(spec).assemble()
}

struct Assembler<'a> {
    spec: &'a GuestSpec,
    /// Static data, placed at offset 0.
    data: Vec<u8>,
    construct_log: Option<DataRef>,
    start_log: Option<DataRef>,
    key_html: Option<(DataRef, DataRef)>,
}

impl<'a> Assembler<'a> {
    fn new(spec: &'a GuestSpec) -> Self {
        Self {
            spec,
            data: Vec::new(),
            construct_log: None,
            start_log: None,
            key_html: None,
        }
    }

    fn assemble(&mut self) -> GuestGenResult<Vec<u8>> {
        self.layout_data()?;

        let mut module = Module::new();
        module.section(&self.emit_types());
        module.section(&self.emit_imports());

        let (functions, code) = self.emit_functions();
        module.section(&functions);
        module.section(&self.emit_memory());
        module.section(&self.emit_globals());
        module.section(&self.emit_exports()?);
        if self.start_log.is_some() {
            module.section(&StartSection {
                function_index: self.func_base() + FN_START,
            });
        }
        module.section(&code);
        module.section(&self.emit_data());
        module.section(&CustomSection {
            name: std::borrow::Cow::Borrowed(CUSTOM_SECTION_NAME),
            data: std::borrow::Cow::Borrowed(ASSEMBLER_VERSION.as_bytes()),
        });

        let wasm_bytes = module.finish();
        wasmparser::validate(&wasm_bytes)
            .map_err(|e| GuestGenError::ValidationFailed(format!("{e}")))?;
        Ok(wasm_bytes)
    }

    /// Index of the first locally defined function.
    fn func_base(&self) -> u32 {
        CAPABILITY_IMPORT_COUNT + u32::from(self.spec.extra_import.is_some())
    }

    // ── Static data ──────────────────────────────────────────────────────

    fn intern(&mut self, bytes: &[u8]) -> DataRef {
        let data = DataRef {
            ptr: self.data.len() as u32,
            len: bytes.len() as u32,
        };
        self.data.extend_from_slice(bytes);
        data
    }

    fn layout_data(&mut self) -> GuestGenResult<()> {
        let spec = self.spec;
        self.construct_log = spec.construct_log.as_deref().map(|b| {
            let data = self.intern(b);
            match spec.construct_log_length {
                Some(len) => DataRef { len: len as u32, ..data },
                None => data,
            }
        });
        self.start_log = spec.start_log.as_deref().map(|b| self.intern(b));
        self.key_html = spec.key_html.as_ref().map(|(id, html)| {
            let id = self.intern(id.as_bytes());
            let html = self.intern(html.as_bytes());
            (id, html)
        });
        if self.data.len() > STACK_BASE as usize {
            return Err(GuestGenError::LimitExceeded(format!(
                "{} bytes of static data, at most {STACK_BASE} fit",
                self.data.len()
            )));
        }
        Ok(())
    }

    // ── Type section ─────────────────────────────────────────────────────

    fn emit_types(&self) -> TypeSection {
        use ValType::{F64, I32};
        let mut types = TypeSection::new();
        // TYPE_VOID_VOID
        types.ty().function(vec![], vec![]);
        // TYPE_VOID_I32
        types.ty().function(vec![], vec![I32]);
        // TYPE_I32_VOID
        types.ty().function(vec![I32], vec![]);
        // TYPE_I32_I32
        types.ty().function(vec![I32], vec![I32]);
        // TYPE_I32X2_VOID
        types.ty().function(vec![I32, I32], vec![]);
        // TYPE_I32X2_I32
        types.ty().function(vec![I32, I32], vec![I32]);
        // TYPE_I32X3_VOID
        types.ty().function(vec![I32, I32, I32], vec![]);
        // TYPE_I32X4_VOID
        types.ty().function(vec![I32, I32, I32, I32], vec![]);
        // TYPE_VOID_F64
        types.ty().function(vec![], vec![F64]);
        // TYPE_I32_F64_VOID
        types.ty().function(vec![I32, F64], vec![]);
        // TYPE_I32X2_F64X2_VOID
        types.ty().function(vec![I32, I32, F64, F64], vec![]);
        types
    }

    // ── Import section ───────────────────────────────────────────────────

    fn emit_imports(&self) -> ImportSection {
        let module = self.spec.abi.import_module.as_str();
        let [log, draw_block, random, set_html] = self.spec.imports.names();
        let mut imports = ImportSection::new();
        // IMPORT_LOG
        imports.import(module, log, EntityType::Function(TYPE_I32X2_VOID));
        // IMPORT_DRAW_BLOCK
        imports.import(module, draw_block, EntityType::Function(TYPE_I32X3_VOID));
        // IMPORT_RANDOM
        imports.import(module, random, EntityType::Function(TYPE_VOID_F64));
        // IMPORT_SET_HTML
        imports.import(module, set_html, EntityType::Function(TYPE_I32X4_VOID));
        if let Some(extra) = &self.spec.extra_import {
            imports.import(module, extra, EntityType::Function(TYPE_VOID_VOID));
        }
        imports
    }

    // ── Function + Code sections ─────────────────────────────────────────

    fn emit_functions(&self) -> (FunctionSection, CodeSection) {
        let spec = self.spec;
        let base = self.func_base();
        let touch_type = match spec.touch_coords {
            CoordType::Float => TYPE_I32X2_F64X2_VOID,
            CoordType::Int => TYPE_I32X4_VOID,
        };

        let mut func_section = FunctionSection::new();
        let mut code_section = CodeSection::new();

        // FN_ALLOCATE
        func_section.function(TYPE_I32_I32);
        code_section.function(&runtime::emit_allocate(spec.grow_on_alloc));
        // FN_STACK_PUSH
        func_section.function(TYPE_I32_VOID);
        code_section.function(&runtime::emit_stack_push());
        // FN_STACK_POP
        func_section.function(TYPE_VOID_I32);
        code_section.function(&runtime::emit_stack_pop());
        // FN_CONSTRUCT
        func_section.function(TYPE_I32X2_I32);
        code_section.function(&runtime::emit_construct(base, self.construct_log));
        // FN_TICK
        func_section.function(TYPE_I32_F64_VOID);
        code_section.function(&runtime::emit_tick(spec.tick_color, spec.tick_random));
        // FN_KEY_EVENT
        func_section.function(TYPE_I32X3_VOID);
        code_section.function(&runtime::emit_key_event(self.key_html));
        // FN_TOUCH_START .. FN_TOUCH_MOVE
        for count_global in [
            GLOBAL_TOUCH_START_COUNT,
            GLOBAL_TOUCH_END_COUNT,
            GLOBAL_TOUCH_CANCEL_COUNT,
            GLOBAL_TOUCH_MOVE_COUNT,
        ] {
            func_section.function(touch_type);
            code_section.function(&runtime::emit_touch(count_global, spec.touch_coords));
        }
        // FN_ECHO
        func_section.function(TYPE_VOID_VOID);
        code_section.function(&runtime::emit_echo(base));
        // FN_START
        func_section.function(TYPE_VOID_VOID);
        code_section.function(&runtime::emit_start(self.start_log));

        (func_section, code_section)
    }

    // ── Memory section ───────────────────────────────────────────────────

    fn emit_memory(&self) -> MemorySection {
        let mut memory = MemorySection::new();
        memory.memory(MemoryType {
            minimum: INITIAL_MEMORY_PAGES,
            maximum: Some(MAX_MEMORY_PAGES),
            memory64: false,
            shared: false,
            page_size_log2: None,
        });
        memory
    }

    // ── Global section ───────────────────────────────────────────────────

    fn emit_globals(&self) -> GlobalSection {
        let mut globals = GlobalSection::new();
        for index in 0..GLOBAL_COUNT {
            let init = if index == GLOBAL_HEAP_PTR {
                HEAP_START as i32
            } else {
                0
            };
            globals.global(
                GlobalType {
                    val_type: ValType::I32,
                    mutable: true,
                    shared: false,
                },
                &ConstExpr::i32_const(init),
            );
        }
        globals
    }

    // ── Export section ────────────────────────────────────────────────────

    fn emit_exports(&self) -> GuestGenResult<ExportSection> {
        let abi = &self.spec.abi;
        let base = self.func_base();
        let mut seen = HashSet::new();
        let mut exports = ExportSection::new();
        let mut export = |name: &str, kind: ExportKind, index: u32| {
            if !seen.insert(name.to_string()) {
                return Err(GuestGenError::DuplicateExport(name.to_string()));
            }
            exports.export(name, kind, index);
            Ok(())
        };

        export(&abi.memory, ExportKind::Memory, 0)?;
        export(&abi.allocate, ExportKind::Func, base + FN_ALLOCATE)?;
        export(&abi.stack_push, ExportKind::Func, base + FN_STACK_PUSH)?;
        export(&abi.stack_pop, ExportKind::Func, base + FN_STACK_POP)?;
        export(&abi.construct, ExportKind::Func, base + FN_CONSTRUCT)?;
        export(&abi.tick, ExportKind::Func, base + FN_TICK)?;
        export(&abi.key_event, ExportKind::Func, base + FN_KEY_EVENT)?;
        export(&abi.touch_start, ExportKind::Func, base + FN_TOUCH_START)?;
        export(&abi.touch_end, ExportKind::Func, base + FN_TOUCH_END)?;
        export(&abi.touch_cancel, ExportKind::Func, base + FN_TOUCH_CANCEL)?;
        export(&abi.touch_move, ExportKind::Func, base + FN_TOUCH_MOVE)?;
        if let Some(echo) = &self.spec.echo_export {
            export(echo, ExportKind::Func, base + FN_ECHO)?;
        }
        for (name, index) in GLOBAL_EXPORTS {
            export(name, ExportKind::Global, index)?;
        }

        Ok(exports)
    }

    // ── Data section ─────────────────────────────────────────────────────

    fn emit_data(&self) -> DataSection {
        let mut data_sec = DataSection::new();
        data_sec.active(0, &ConstExpr::i32_const(0), self.data.iter().copied());
        data_sec
    }
}
