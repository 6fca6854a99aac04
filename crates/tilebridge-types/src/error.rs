use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Load,
    Capability,
    Marshal,
    Dom,
    Guest,
    Asset,
}

/// Numeric error code (B100–B699).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Load errors (B100–B199) ──
    pub const FETCH_FAILED: Self = Self(100);
    pub const COMPILE_FAILED: Self = Self(101);
    pub const INSTANTIATE_FAILED: Self = Self(102);
    pub const MISSING_EXPORT: Self = Self(103);
    pub const EXPORT_SIGNATURE: Self = Self(104);
    pub const LINK_FAILED: Self = Self(105);

    // ── Capability errors (B200–B299) ──
    pub const CAPABILITY_UNBOUND: Self = Self(200);
    pub const CAPABILITY_ALREADY_BOUND: Self = Self(201);

    // ── Marshal errors (B300–B399) ──
    pub const INVALID_UTF8: Self = Self(300);
    pub const OUT_OF_BOUNDS: Self = Self(301);
    pub const NO_MEMORY: Self = Self(302);

    // ── DOM errors (B400–B499) ──
    pub const MISSING_ELEMENT: Self = Self(400);

    // ── Guest errors (B500–B599) ──
    pub const GUEST_TRAP: Self = Self(500);
    pub const NOT_CONSTRUCTED: Self = Self(501);
    pub const ALREADY_CONSTRUCTED: Self = Self(502);
    pub const NOT_LOADED: Self = Self(503);

    // ── Asset errors (B600–B699) ──
    pub const IMAGE: Self = Self(600);
    pub const CONFIG: Self = Self(601);

    /// Get the category for this error code.
    pub fn category(self) -> ErrorCategory {
        match self.0 {
            100..=199 => ErrorCategory::Load,
            200..=299 => ErrorCategory::Capability,
            300..=399 => ErrorCategory::Marshal,
            400..=499 => ErrorCategory::Dom,
            500..=599 => ErrorCategory::Guest,
            _ => ErrorCategory::Asset,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Errors raised by the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The guest binary or an asset could not be fetched.
    #[error("failed to fetch `{url}`: {reason}")]
    Fetch { url: String, reason: String },

    /// The guest binary is not a valid module.
    #[error("failed to compile guest module: {0}")]
    Compile(String),

    /// Instantiation failed (unsatisfied imports, start function trap).
    #[error("failed to instantiate guest module: {0}")]
    Instantiate(String),

    /// A capability stub could not be registered on the linker.
    #[error("failed to link capability `{name}`: {reason}")]
    Link { name: String, reason: String },

    /// A required guest export is absent.
    #[error("guest does not export `{0}`")]
    MissingExport(String),

    /// A guest export exists but has the wrong type.
    #[error("guest export `{name}` does not match `{expected}`")]
    ExportSignature { name: String, expected: &'static str },

    /// A capability was invoked before the table was bound.
    #[error("capability `{0}` invoked before the capability table was bound")]
    CapabilityUnbound(&'static str),

    /// The capability table was bound twice.
    #[error("capability table is already bound")]
    AlreadyBound,

    /// Bytes read from linear memory are not valid UTF-8.
    #[error("invalid UTF-8 in guest memory at {address:#x} (+{length}): {source}")]
    Decode {
        address: u32,
        length: u32,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// A memory range lies outside the current linear memory.
    #[error("range {address:#x} (+{length}) lies outside guest memory")]
    OutOfBounds { address: u32, length: u32 },

    /// The guest exports no linear memory under the configured name.
    #[error("guest exports no memory named `{0}`")]
    NoMemory(String),

    /// `set_html` targeted an element that does not exist.
    #[error("no element with id `{0}`")]
    MissingElement(String),

    /// A guest call trapped.
    #[error("guest trapped in `{export}`: {message}")]
    GuestTrap { export: String, message: String },

    /// A guest entry point that needs an instance handle ran before construction.
    #[error("guest instance has not been constructed")]
    NotConstructed,

    /// `construct` was requested a second time.
    #[error("guest instance has already been constructed")]
    AlreadyConstructed,

    /// A guest call was requested before a module was loaded.
    #[error("no guest module is loaded")]
    NotLoaded,

    /// The tile image could not be decoded or the surface could not be saved.
    #[error("image error: {0}")]
    Image(String),

    /// The configuration document is malformed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl BridgeError {
    /// The numeric code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Fetch { .. } => ErrorCode::FETCH_FAILED,
            Self::Compile(_) => ErrorCode::COMPILE_FAILED,
            Self::Instantiate(_) => ErrorCode::INSTANTIATE_FAILED,
            Self::Link { .. } => ErrorCode::LINK_FAILED,
            Self::MissingExport(_) => ErrorCode::MISSING_EXPORT,
            Self::ExportSignature { .. } => ErrorCode::EXPORT_SIGNATURE,
            Self::CapabilityUnbound(_) => ErrorCode::CAPABILITY_UNBOUND,
            Self::AlreadyBound => ErrorCode::CAPABILITY_ALREADY_BOUND,
            Self::Decode { .. } => ErrorCode::INVALID_UTF8,
            Self::OutOfBounds { .. } => ErrorCode::OUT_OF_BOUNDS,
            Self::NoMemory(_) => ErrorCode::NO_MEMORY,
            Self::MissingElement(_) => ErrorCode::MISSING_ELEMENT,
            Self::GuestTrap { .. } => ErrorCode::GUEST_TRAP,
            Self::NotConstructed => ErrorCode::NOT_CONSTRUCTED,
            Self::AlreadyConstructed => ErrorCode::ALREADY_CONSTRUCTED,
            Self::NotLoaded => ErrorCode::NOT_LOADED,
            Self::Image(_) => ErrorCode::IMAGE,
            Self::Config(_) => ErrorCode::CONFIG,
        }
    }

    /// The category derived from [`Self::code`].
    pub fn category(&self) -> ErrorCategory {
        self.code().category()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_categories() {
        assert_eq!(ErrorCode::FETCH_FAILED.category(), ErrorCategory::Load);
        assert_eq!(ErrorCode::CAPABILITY_UNBOUND.category(), ErrorCategory::Capability);
        assert_eq!(ErrorCode::INVALID_UTF8.category(), ErrorCategory::Marshal);
        assert_eq!(ErrorCode::MISSING_ELEMENT.category(), ErrorCategory::Dom);
        assert_eq!(ErrorCode::GUEST_TRAP.category(), ErrorCategory::Guest);
        assert_eq!(ErrorCode::CONFIG.category(), ErrorCategory::Asset);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(format!("{}", ErrorCode::MISSING_ELEMENT), "B400");
    }

    #[test]
    fn test_decode_error_reports_range() {
        let source = String::from_utf8(vec![0xff, 0xfe]).unwrap_err();
        let err = BridgeError::Decode {
            address: 0x40,
            length: 2,
            source,
        };
        assert_eq!(err.category(), ErrorCategory::Marshal);
        assert!(err.to_string().starts_with("invalid UTF-8 in guest memory at 0x40 (+2)"));
    }

    #[test]
    fn test_missing_element_message() {
        let err = BridgeError::MissingElement("score".into());
        assert_eq!(err.to_string(), "no element with id `score`");
        assert_eq!(err.code(), ErrorCode::MISSING_ELEMENT);
    }
}
