//! One bridge session: the interpreter store, the linked capability
//! stubs, and the single live guest.
//!
//! Everything a guest can reach lives in the session rather than in
//! process-wide state, so independent sessions (one per test, say) never
//! interfere.

use tilebridge_types::{
    BridgeError, BridgeResult, ErrorCode, GuestAbi, InstanceHandle, KeyEvent, TouchPhase,
    TouchPoint,
};
use wasmi::{AsContext, Engine, Instance, Linker, Module, Store, TypedFunc, WasmParams, WasmResults};

use crate::capability::{link_capabilities, BridgeState, HostCapabilities};
use crate::marshal::{Marshaller, Placed, ValueStack};

/// A touch handler in either of the two accepted signatures.
#[derive(Clone)]
enum TouchHandler {
    /// `(handle, id, page_x: f64, page_y: f64)`
    Float(TypedFunc<(i32, i32, f64, f64), ()>),
    /// `(handle, id, page_x: i32, page_y: i32)`
    Int(TypedFunc<(i32, i32, i32, i32), ()>),
}

struct GuestExports {
    construct: TypedFunc<(i32, i32), i32>,
    tick: TypedFunc<(i32, f64), ()>,
    key_event: TypedFunc<(i32, i32, i32), ()>,
    touch: [TouchHandler; 4],
    marshaller: Marshaller,
    stack: Option<ValueStack>,
}

struct LiveGuest {
    instance: Instance,
    exports: GuestExports,
}

/// Bridge between the host and exactly one guest instance.
pub struct BridgeSession<H: HostCapabilities> {
    abi: GuestAbi,
    store: Store<BridgeState<H>>,
    linker: Linker<BridgeState<H>>,
    guest: Option<LiveGuest>,
    handle: Option<InstanceHandle>,
    last_fault: Option<ErrorCode>,
}

impl<H: HostCapabilities> BridgeSession<H> {
    /// Create a session and link the capability stubs for `abi`.
    pub fn new(abi: GuestAbi) -> BridgeResult<Self> {
        let engine = Engine::default();
        let store = Store::new(&engine, BridgeState::new(&abi));
        let mut linker = Linker::new(&engine);
        link_capabilities(&mut linker, &abi)?;
        Ok(Self {
            abi,
            store,
            linker,
            guest: None,
            handle: None,
            last_fault: None,
        })
    }

    pub fn abi(&self) -> &GuestAbi {
        &self.abi
    }

    /// Compile and instantiate `bytes`, binding `host` as the capability
    /// table between instantiation and the module's start function.
    pub fn load(&mut self, bytes: &[u8], host: H) -> BridgeResult<()> {
        if self.guest.is_some() {
            return Err(BridgeError::Instantiate("a guest is already loaded".into()));
        }
        let module = Module::new(self.store.engine(), bytes)
            .map_err(|e| BridgeError::Compile(e.to_string()))?;
        let pre = self
            .linker
            .instantiate(&mut self.store, &module)
            .map_err(|e| BridgeError::Instantiate(e.to_string()))?;

        self.store.data_mut().table.bind(host)?;

        let started = pre.start(&mut self.store);
        let fault = self.store.data_mut().fault.take();
        let instance = match started {
            Ok(instance) => instance,
            Err(err) => {
                return Err(fault.unwrap_or_else(|| BridgeError::Instantiate(err.to_string())))
            }
        };

        let exports = self.resolve_exports(&instance)?;
        self.guest = Some(LiveGuest { instance, exports });
        Ok(())
    }

    fn resolve_exports(&self, instance: &Instance) -> BridgeResult<GuestExports> {
        let abi = &self.abi;
        let memory = instance
            .get_memory(&self.store, &abi.memory)
            .ok_or_else(|| BridgeError::NoMemory(abi.memory.clone()))?;
        let allocate = optional(instance, &self.store, &abi.allocate, "(i32) -> i32")?;
        let push = optional(instance, &self.store, &abi.stack_push, "(i32) -> ()")?;
        let pop = optional(instance, &self.store, &abi.stack_pop, "() -> i32")?;
        let stack = match (push, pop) {
            (Some(push), Some(pop)) => Some(ValueStack::new(push, pop)),
            _ => None,
        };

        Ok(GuestExports {
            construct: required(instance, &self.store, &abi.construct, "(i32, i32) -> i32")?,
            tick: required(instance, &self.store, &abi.tick, "(i32, f64) -> ()")?,
            key_event: required(instance, &self.store, &abi.key_event, "(i32, i32, i32) -> ()")?,
            touch: [
                self.touch_handler(instance, TouchPhase::Start)?,
                self.touch_handler(instance, TouchPhase::End)?,
                self.touch_handler(instance, TouchPhase::Cancel)?,
                self.touch_handler(instance, TouchPhase::Move)?,
            ],
            marshaller: Marshaller::new(memory, allocate),
            stack,
        })
    }

    fn touch_handler(&self, instance: &Instance, phase: TouchPhase) -> BridgeResult<TouchHandler> {
        let name = self.abi.touch_export(phase);
        let func = instance
            .get_func(&self.store, name)
            .ok_or_else(|| BridgeError::MissingExport(name.to_string()))?;
        if let Ok(typed) = func.typed::<(i32, i32, f64, f64), ()>(&self.store) {
            return Ok(TouchHandler::Float(typed));
        }
        func.typed::<(i32, i32, i32, i32), ()>(&self.store)
            .map(TouchHandler::Int)
            .map_err(|_| BridgeError::ExportSignature {
                name: name.to_string(),
                expected: "(i32, i32, f64, f64) -> ()",
            })
    }

    pub fn is_loaded(&self) -> bool {
        self.guest.is_some()
    }

    /// The instance handle, once constructed.
    pub fn handle(&self) -> Option<InstanceHandle> {
        self.handle
    }

    /// Code of the most recent error raised inside a capability.
    pub fn last_fault(&self) -> Option<ErrorCode> {
        self.last_fault
    }

    /// The bound capability implementations.
    pub fn services(&self) -> Option<&H> {
        self.store.data().table.get()
    }

    pub fn services_mut(&mut self) -> Option<&mut H> {
        self.store.data_mut().table.get_mut()
    }

    /// Call the guest's constructor. Only one instance may exist.
    pub fn construct(&mut self, width: u32, height: u32) -> BridgeResult<InstanceHandle> {
        if self.handle.is_some() {
            return Err(BridgeError::AlreadyConstructed);
        }
        let guest = self.guest.as_ref().ok_or(BridgeError::NotLoaded)?;
        let result = guest
            .exports
            .construct
            .call(&mut self.store, (width as i32, height as i32));
        let raw = settle(&mut self.store, &mut self.last_fault, &self.abi.construct, result)?;
        let handle = InstanceHandle::from_abi(raw);
        self.handle = Some(handle);
        log::info!("guest constructed: {handle:?} ({width}x{height} cells)");
        Ok(handle)
    }

    pub fn tick(&mut self, handle: InstanceHandle, timestamp_ms: f64) -> BridgeResult<()> {
        self.ensure_constructed()?;
        let guest = self.guest.as_ref().ok_or(BridgeError::NotLoaded)?;
        let result = guest
            .exports
            .tick
            .call(&mut self.store, (handle.to_abi(), timestamp_ms));
        settle(&mut self.store, &mut self.last_fault, &self.abi.tick, result)
    }

    pub fn key_event(&mut self, handle: InstanceHandle, event: &KeyEvent) -> BridgeResult<()> {
        self.ensure_constructed()?;
        let guest = self.guest.as_ref().ok_or(BridgeError::NotLoaded)?;
        let result = guest.exports.key_event.call(
            &mut self.store,
            (handle.to_abi(), event.key_code, i32::from(event.pressed)),
        );
        settle(&mut self.store, &mut self.last_fault, &self.abi.key_event, result)
    }

    /// Forward one changed contact to the handler for `phase`.
    pub fn touch(
        &mut self,
        handle: InstanceHandle,
        phase: TouchPhase,
        point: &TouchPoint,
    ) -> BridgeResult<()> {
        self.ensure_constructed()?;
        let guest = self.guest.as_ref().ok_or(BridgeError::NotLoaded)?;
        let handler = &guest.exports.touch[phase_index(phase)];
        let result = match handler {
            TouchHandler::Float(func) => func.call(
                &mut self.store,
                (handle.to_abi(), point.id, point.page_x, point.page_y),
            ),
            TouchHandler::Int(func) => func.call(
                &mut self.store,
                (
                    handle.to_abi(),
                    point.id,
                    point.page_x.trunc() as i32,
                    point.page_y.trunc() as i32,
                ),
            ),
        };
        settle(
            &mut self.store,
            &mut self.last_fault,
            self.abi.touch_export(phase),
            result,
        )
    }

    /// Place `text` in guest memory, push its `(address, length)` onto the
    /// guest's value stack, and call the zero-argument export `export`.
    pub fn call_with_text(&mut self, export: &str, text: &str) -> BridgeResult<()> {
        let guest = self.guest.as_ref().ok_or(BridgeError::NotLoaded)?;
        let stack = guest
            .exports
            .stack
            .clone()
            .ok_or_else(|| BridgeError::MissingExport(self.abi.stack_push.clone()))?;
        let func: TypedFunc<(), ()> =
            required(&guest.instance, &self.store, export, "() -> ()")?;

        let placed: Placed = guest.exports.marshaller.encode_and_place(&mut self.store, text)?;
        placed.push(&mut self.store, &stack)?;
        let result = func.call(&mut self.store, ());
        settle(&mut self.store, &mut self.last_fault, export, result)
    }

    /// Place `text` in guest memory without conveying it anywhere.
    pub fn place_text(&mut self, text: &str) -> BridgeResult<Placed> {
        let guest = self.guest.as_ref().ok_or(BridgeError::NotLoaded)?;
        guest.exports.marshaller.encode_and_place(&mut self.store, text)
    }

    /// Read the exported i32 global `name`.
    pub fn guest_global_i32(&self, name: &str) -> BridgeResult<i32> {
        let guest = self.guest.as_ref().ok_or(BridgeError::NotLoaded)?;
        let global = guest
            .instance
            .get_global(&self.store, name)
            .ok_or_else(|| BridgeError::MissingExport(name.to_string()))?;
        global
            .get(&self.store)
            .i32()
            .ok_or_else(|| BridgeError::ExportSignature {
                name: name.to_string(),
                expected: "i32 global",
            })
    }

    /// Decode text from the guest's memory.
    pub fn read_text(&self, address: u32, length: u32) -> BridgeResult<String> {
        let guest = self.guest.as_ref().ok_or(BridgeError::NotLoaded)?;
        guest.exports.marshaller.decode(&self.store, address, length)
    }

    fn ensure_constructed(&self) -> BridgeResult<()> {
        match self.handle {
            Some(_) => Ok(()),
            None => Err(BridgeError::NotConstructed),
        }
    }
}

fn phase_index(phase: TouchPhase) -> usize {
    match phase {
        TouchPhase::Start => 0,
        TouchPhase::End => 1,
        TouchPhase::Cancel => 2,
        TouchPhase::Move => 3,
    }
}

fn required<P, R>(
    instance: &Instance,
    store: impl AsContext,
    name: &str,
    expected: &'static str,
) -> BridgeResult<TypedFunc<P, R>>
where
    P: WasmParams,
    R: WasmResults,
{
    optional(instance, store, name, expected)?
        .ok_or_else(|| BridgeError::MissingExport(name.to_string()))
}

/// A typed export that may be absent but must have the right type if
/// present.
fn optional<P, R>(
    instance: &Instance,
    store: impl AsContext,
    name: &str,
    expected: &'static str,
) -> BridgeResult<Option<TypedFunc<P, R>>>
where
    P: WasmParams,
    R: WasmResults,
{
    let Some(func) = instance.get_func(&store, name) else {
        return Ok(None);
    };
    func.typed::<P, R>(&store)
        .map(Some)
        .map_err(|_| BridgeError::ExportSignature {
            name: name.to_string(),
            expected,
        })
}

/// Map the outcome of a guest call. A trap raised by a capability
/// surfaces as the capability's own error.
fn settle<H, T>(
    store: &mut Store<BridgeState<H>>,
    last_fault: &mut Option<ErrorCode>,
    export: &str,
    result: Result<T, wasmi::Error>,
) -> BridgeResult<T> {
    let fault = store.data_mut().fault.take();
    result.map_err(|trap| {
        let err = fault.unwrap_or_else(|| BridgeError::GuestTrap {
            export: export.to_string(),
            message: trap.to_string(),
        });
        *last_fault = Some(err.code());
        err
    })
}
