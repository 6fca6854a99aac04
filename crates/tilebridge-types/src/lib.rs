//! Shared types for the tilebridge host.
//!
//! This crate defines the values that cross the host↔guest boundary
//! (instance handles, colors, input event records), the bridge
//! configuration, and the error taxonomy used by every other crate.

mod color;
mod config;
mod error;
mod event;
mod handle;

pub use color::{Color, ParseColorError};
pub use config::{BoardGeometry, BridgeConfig, GridStyle, GuestAbi};
pub use error::{BridgeError, ErrorCategory, ErrorCode};
pub use event::{EventKind, InputEvent, KeyEvent, TouchEvent, TouchPhase, TouchPoint};
pub use handle::InstanceHandle;

/// Result type used throughout the bridge.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
