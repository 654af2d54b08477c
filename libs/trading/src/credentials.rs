use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Access/refresh token pair. Both halves travel together; there is no way to
/// store one without the other.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Holder of the current credential pair.
///
/// Token shape is never validated here; only server responses decide whether a
/// pair is still good.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<Credentials>;
    fn set(&self, credentials: Credentials);
    fn clear(&self);
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    current: RwLock<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(credentials: Credentials) -> Self {
        Self {
            current: RwLock::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<Credentials> {
        self.current.read().clone()
    }

    fn set(&self, credentials: Credentials) {
        *self.current.write() = Some(credentials);
    }

    fn clear(&self) {
        *self.current.write() = None;
    }
}

/// Durable store keyed by API origin.
///
/// The file holds one entry per origin, so several backends can share a file
/// without seeing each other's tokens.
pub struct FileCredentialStore {
    path: PathBuf,
    origin: String,
    current: RwLock<Option<Credentials>>,
}

impl FileCredentialStore {
    pub fn open(path: impl Into<PathBuf>, origin: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let origin = origin.into();

        let current = Self::read_all(&path)?.remove(&origin);
        debug!(
            path = %path.display(),
            origin = %origin,
            restored = current.is_some(),
            "opened credential store"
        );

        Ok(Self {
            path,
            origin,
            current: RwLock::new(current),
        })
    }

    /// Origin (`scheme://host[:port]`) of an API base URL.
    pub fn origin_of(base_url: &str) -> Result<String> {
        let url = reqwest::Url::parse(base_url)
            .with_context(|| format!("invalid API base URL: {base_url}"))?;
        Ok(url.origin().ascii_serialization())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(path: &Path) -> Result<BTreeMap<String, Credentials>> {
        match fs::read_to_string(path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("corrupt credential file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn persist(&self, credentials: Option<&Credentials>) -> Result<()> {
        // never rewrite a file that did not parse
        let mut all = Self::read_all(&self.path)?;
        match credentials {
            Some(c) => {
                all.insert(self.origin.clone(), c.clone());
            }
            None => {
                all.remove(&self.origin);
            }
        }

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        // rename keeps the pair whole on disk
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&all)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<Credentials> {
        self.current.read().clone()
    }

    fn set(&self, credentials: Credentials) {
        let mut current = self.current.write();
        if let Err(e) = self.persist(Some(&credentials)) {
            error!(error = ?e, path = %self.path.display(), "failed to persist credentials");
        }
        *current = Some(credentials);
    }

    fn clear(&self) {
        let mut current = self.current.write();
        if let Err(e) = self.persist(None) {
            error!(error = ?e, path = %self.path.display(), "failed to clear persisted credentials");
        }
        *current = None;
    }
}
