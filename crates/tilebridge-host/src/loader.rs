//! Module loading: fetch the guest binary and instantiate it in a session.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tilebridge_types::{BridgeError, BridgeResult};

use crate::capability::HostCapabilities;
use crate::session::BridgeSession;

/// Source of guest binaries and assets, addressed by relative URL.
pub trait ModuleFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = BridgeResult<Vec<u8>>>;
}

/// Fetches from a directory on disk.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ModuleFetcher for FileFetcher {
    async fn fetch(&self, url: &str) -> BridgeResult<Vec<u8>> {
        let path = self.root.join(url);
        std::fs::read(&path).map_err(|e| BridgeError::Fetch {
            url: url.to_string(),
            reason: format!("{}: {e}", path.display()),
        })
    }
}

/// Serves byte blobs registered up front.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(url, bytes);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(url.into(), bytes.into());
    }
}

impl ModuleFetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> BridgeResult<Vec<u8>> {
        self.files.get(url).cloned().ok_or_else(|| BridgeError::Fetch {
            url: url.to_string(),
            reason: "not found".into(),
        })
    }
}

/// Size and SHA-256 digest of a loaded module.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ModuleFingerprint {
    pub length: usize,
    pub sha256: [u8; 32],
}

impl ModuleFingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Self {
            length: bytes.len(),
            sha256: Sha256::digest(bytes).into(),
        }
    }

    pub fn hex(&self) -> String {
        self.sha256.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for ModuleFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleFingerprint({} bytes, sha256:{})", self.length, self.hex())
    }
}

/// A guest module that has been fetched and instantiated.
#[derive(Debug, Clone)]
pub struct LoadedGuest {
    pub url: String,
    pub fingerprint: ModuleFingerprint,
}

/// Fetch the module at `url` and instantiate it in `session`, binding
/// `host` as its capability table.
pub async fn load<H, F>(
    session: &mut BridgeSession<H>,
    fetcher: &F,
    url: &str,
    host: H,
) -> BridgeResult<LoadedGuest>
where
    H: HostCapabilities,
    F: ModuleFetcher,
{
    let bytes = fetcher.fetch(url).await?;
    let fingerprint = ModuleFingerprint::of(&bytes);
    session.load(&bytes, host)?;
    log::info!(
        "loaded guest {url}: {} bytes, sha256 {}",
        fingerprint.length,
        fingerprint.hex()
    );
    Ok(LoadedGuest {
        url: url.to_string(),
        fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_of_empty_input() {
        let fp = ModuleFingerprint::of(b"");
        assert_eq!(fp.length, 0);
        assert_eq!(
            fp.hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_memory_fetcher_missing_url() {
        let fetcher = MemoryFetcher::new().with("a.wasm", vec![0u8, 1]);
        let found = futures::executor::block_on(fetcher.fetch("a.wasm")).unwrap();
        assert_eq!(found, vec![0, 1]);
        let err = futures::executor::block_on(fetcher.fetch("b.wasm")).unwrap_err();
        assert!(matches!(err, BridgeError::Fetch { ref url, .. } if url == "b.wasm"));
    }
}
