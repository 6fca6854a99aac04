//! The capability table: host functions the guest may call.
//!
//! Binding is two-phase. [`link_capabilities`] registers stub functions
//! on the linker before any host implementation exists; each stub looks
//! the implementation up in the store's [`CapabilityTable`] at call time.
//! The loader binds the table in a single replacement after the module is
//! instantiated and before its start function runs, so no call made by
//! the guest can observe the unbound table. A stub that does find it
//! unbound fails with [`BridgeError::CapabilityUnbound`].

use tilebridge_types::{BridgeError, BridgeResult, Color, GuestAbi};
use wasmi::{Caller, Extern, Linker};

use crate::marshal::Marshaller;

/// A host capability exposed to the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Log,
    DrawBlock,
    Random,
    SetHtml,
}

impl Capability {
    pub const ALL: [Capability; 4] = [Self::Log, Self::DrawBlock, Self::Random, Self::SetHtml];

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::DrawBlock => "draw_block",
            Self::Random => "random",
            Self::SetHtml => "set_html",
        }
    }

    /// Every import name the capability is linked under, canonical first.
    pub fn import_names(self) -> &'static [&'static str] {
        match self {
            Self::Log => &["log", "console_log"],
            Self::DrawBlock => &["draw_block"],
            Self::Random => &["random"],
            Self::SetHtml => &["set_html", "html"],
        }
    }

    pub fn from_import_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|cap| cap.import_names().contains(&name))
    }
}

/// The final implementations behind the capability stubs.
pub trait HostCapabilities: 'static {
    fn log(&mut self, text: &str);
    fn draw_block(&mut self, x: u32, y: u32, color: Color);
    /// A value in `[0, 1)`.
    fn random(&mut self) -> f64;
    fn set_html(&mut self, element_id: &str, html: &str) -> BridgeResult<()>;
}

/// Write-once slot holding the capability implementations.
pub struct CapabilityTable<H> {
    bound: Option<H>,
}

impl<H: HostCapabilities> CapabilityTable<H> {
    pub fn new() -> Self {
        Self { bound: None }
    }

    /// Install the implementations. The table can be bound once.
    pub fn bind(&mut self, host: H) -> BridgeResult<()> {
        if self.bound.is_some() {
            return Err(BridgeError::AlreadyBound);
        }
        self.bound = Some(host);
        log::debug!("capability table bound");
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// The implementation serving `capability`.
    pub fn resolve(&mut self, capability: Capability) -> BridgeResult<&mut H> {
        self.bound
            .as_mut()
            .ok_or(BridgeError::CapabilityUnbound(capability.name()))
    }

    pub fn get(&self) -> Option<&H> {
        self.bound.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut H> {
        self.bound.as_mut()
    }
}

/// Store data for one bridge session.
pub struct BridgeState<H> {
    pub(crate) table: CapabilityTable<H>,
    /// The error behind the most recent capability trap.
    pub(crate) fault: Option<BridgeError>,
    memory_export: String,
}

impl<H: HostCapabilities> BridgeState<H> {
    pub(crate) fn new(abi: &GuestAbi) -> Self {
        Self {
            table: CapabilityTable::new(),
            fault: None,
            memory_export: abi.memory.clone(),
        }
    }
}

/// Register a stub for every capability under every import name.
pub fn link_capabilities<H: HostCapabilities>(
    linker: &mut Linker<BridgeState<H>>,
    abi: &GuestAbi,
) -> BridgeResult<()> {
    for capability in Capability::ALL {
        for name in capability.import_names() {
            link_stub(linker, &abi.import_module, name, capability).map_err(|e| {
                BridgeError::Link {
                    name: (*name).to_string(),
                    reason: e.to_string(),
                }
            })?;
        }
    }
    Ok(())
}

fn link_stub<H: HostCapabilities>(
    linker: &mut Linker<BridgeState<H>>,
    module: &str,
    name: &str,
    capability: Capability,
) -> Result<(), wasmi::errors::LinkerError> {
    match capability {
        Capability::Log => linker.func_wrap(
            module,
            name,
            |mut caller: Caller<'_, BridgeState<H>>,
             address: i32,
             length: i32|
             -> Result<(), wasmi::Error> {
                let outcome = read_text(&caller, address, length).and_then(|text| {
                    caller
                        .data_mut()
                        .table
                        .resolve(Capability::Log)
                        .map(|host| host.log(&text))
                });
                raise(&mut caller, outcome)
            },
        ),
        Capability::DrawBlock => linker.func_wrap(
            module,
            name,
            |mut caller: Caller<'_, BridgeState<H>>,
             x: i32,
             y: i32,
             color: i32|
             -> Result<(), wasmi::Error> {
                let outcome = caller
                    .data_mut()
                    .table
                    .resolve(Capability::DrawBlock)
                    .map(|host| host.draw_block(x as u32, y as u32, Color::from_raw(color as u32)));
                raise(&mut caller, outcome)
            },
        ),
        Capability::Random => linker.func_wrap(
            module,
            name,
            |mut caller: Caller<'_, BridgeState<H>>| -> Result<f64, wasmi::Error> {
                let outcome = caller
                    .data_mut()
                    .table
                    .resolve(Capability::Random)
                    .map(|host| host.random());
                raise(&mut caller, outcome)
            },
        ),
        Capability::SetHtml => linker.func_wrap(
            module,
            name,
            |mut caller: Caller<'_, BridgeState<H>>,
             id_address: i32,
             id_length: i32,
             html_address: i32,
             html_length: i32|
             -> Result<(), wasmi::Error> {
                let outcome = read_text(&caller, id_address, id_length)
                    .and_then(|id| Ok((id, read_text(&caller, html_address, html_length)?)))
                    .and_then(|(id, html)| {
                        caller
                            .data_mut()
                            .table
                            .resolve(Capability::SetHtml)?
                            .set_html(&id, &html)
                    });
                raise(&mut caller, outcome)
            },
        ),
    }
    .map(|_| ())
}

/// Decode a `(address, length)` argument pair from the caller's memory.
fn read_text<H>(caller: &Caller<'_, BridgeState<H>>, address: i32, length: i32) -> BridgeResult<String> {
    let name = &caller.data().memory_export;
    let memory = caller
        .get_export(name)
        .and_then(Extern::into_memory)
        .ok_or_else(|| BridgeError::NoMemory(name.clone()))?;
    Marshaller::new(memory, None).decode(caller, address as u32, length as u32)
}

/// Turn a failed capability call into a trap, keeping the error for the
/// host code that made the guest call.
fn raise<T, H>(caller: &mut Caller<'_, BridgeState<H>>, outcome: BridgeResult<T>) -> Result<T, wasmi::Error> {
    outcome.map_err(|err| {
        let trap = wasmi::Error::new(err.to_string());
        caller.data_mut().fault = Some(err);
        trap
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Null;

    impl HostCapabilities for Null {
        fn log(&mut self, _text: &str) {}
        fn draw_block(&mut self, _x: u32, _y: u32, _color: Color) {}
        fn random(&mut self) -> f64 {
            0.5
        }
        fn set_html(&mut self, element_id: &str, _html: &str) -> BridgeResult<()> {
            Err(BridgeError::MissingElement(element_id.to_string()))
        }
    }

    #[test]
    fn test_import_name_aliases() {
        assert_eq!(Capability::from_import_name("console_log"), Some(Capability::Log));
        assert_eq!(Capability::from_import_name("log"), Some(Capability::Log));
        assert_eq!(Capability::from_import_name("html"), Some(Capability::SetHtml));
        assert_eq!(Capability::from_import_name("draw_block"), Some(Capability::DrawBlock));
        assert_eq!(Capability::from_import_name("vibrate"), None);
    }

    #[test]
    fn test_resolve_before_bind_fails() {
        let mut table = CapabilityTable::<Null>::new();
        assert!(!table.is_bound());
        let err = table.resolve(Capability::Random).err().unwrap();
        assert!(matches!(err, BridgeError::CapabilityUnbound("random")));
    }

    #[test]
    fn test_bind_is_write_once() {
        let mut table = CapabilityTable::new();
        table.bind(Null).unwrap();
        assert!(table.is_bound());
        assert_eq!(table.resolve(Capability::Random).unwrap().random(), 0.5);
        assert!(matches!(table.bind(Null), Err(BridgeError::AlreadyBound)));
    }
}
