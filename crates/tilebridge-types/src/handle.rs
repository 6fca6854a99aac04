use std::fmt;

/// Opaque reference to the guest-owned instance returned by `construct`.
///
/// The value indexes guest-private state. The host never dereferences it
/// and offers no arithmetic on it; it is only carried back into the guest
/// unchanged on every call that needs it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle(u32);

impl InstanceHandle {
    /// Wrap the raw scalar returned by the guest's `construct` export.
    pub fn from_abi(raw: i32) -> Self {
        Self(raw as u32)
    }

    /// The scalar to pass back across the boundary.
    pub fn to_abi(self) -> i32 {
        self.0 as i32
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceHandle({:#010x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_passes_through_unchanged() {
        let handle = InstanceHandle::from_abi(-8);
        assert_eq!(handle.to_abi(), -8);
        assert_eq!(InstanceHandle::from_abi(0x1040).to_abi(), 0x1040);
    }

    #[test]
    fn test_handle_debug_is_hex() {
        let handle = InstanceHandle::from_abi(0x1040);
        assert_eq!(format!("{handle:?}"), "InstanceHandle(0x00001040)");
    }
}
