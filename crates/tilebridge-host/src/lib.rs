//! Host side of the tilebridge: runs a guest module and wires it to a
//! drawing surface, a document and input.
//!
//! # Architecture
//!
//! A [`BridgeSession`] owns the interpreter store and the one guest
//! instance. Loading happens in two phases: [`link_capabilities`] registers
//! stubs for `log`, `draw_block`, `random` and `set_html` before anything
//! exists to serve them, and the session binds the real
//! [`HostCapabilities`] after instantiation, before the guest's start
//! function runs.
//!
//! Per frame, the [`AnimationScheduler`] calls the guest's `tick`; the
//! guest answers with capability calls that land on [`HostServices`]
//! (the [`RenderSurface`], the [`Document`], the random source and the
//! [`Console`]). Input travels the other way through the
//! [`EventDispatcher`].
//!
//! Text crosses the boundary through the guest's linear memory via the
//! [`Marshaller`], which never holds a view of that memory across a call.
//!
//! [`Page`] assembles all of it from a [`tilebridge_types::BridgeConfig`].

pub mod capability;
pub mod dispatch;
pub mod dom;
pub mod loader;
pub mod marshal;
pub mod page;
pub mod raster;
pub mod scheduler;
pub mod services;
pub mod session;
pub mod surface;

pub use capability::{link_capabilities, BridgeState, Capability, CapabilityTable, HostCapabilities};
pub use dispatch::{DispatchOutcome, EventDispatcher, Listener, ListenerRegistry, ListenerTarget};
pub use dom::{Document, ElementRegistry};
pub use loader::{load, FileFetcher, LoadedGuest, MemoryFetcher, ModuleFetcher, ModuleFingerprint};
pub use marshal::{Marshaller, Placed, ValueStack};
pub use page::{Page, PageState};
pub use raster::PixelCanvas;
pub use scheduler::{AnimationScheduler, FrameSource, ScriptedFrames, VsyncClock};
pub use services::{Console, HostServices, RandomSource, SeededRandom, ThreadRandom};
pub use session::BridgeSession;
pub use surface::{grid_lines, Canvas2d, CompositeOp, DrawOp, Line, Rect, RecordingCanvas, RenderSurface, TileImage};
