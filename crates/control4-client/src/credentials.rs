use std::path::PathBuf;

use crate::{Control4Error, Result};

// ─── CredentialStore ──────────────────────────────────────────────────────

/// Persists the director bearer token on disk so later runs can
/// authenticate without account credentials (token-only mode).
///
/// The stored value is the bare token string returned by the cloud
/// authentication flow. It lives in a single file under the credentials
/// directory, created lazily on the first `save`.
pub struct CredentialStore {
    dir: PathBuf,
}

const TOKEN_FILE: &str = "director.token";

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CredentialStore { dir: dir.into() }
    }

    /// Return the cached director token, or `None` if none exists.
    pub fn load(&self) -> Option<String> {
        std::fs::read_to_string(self.path())
            .ok()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
    }

    /// Persist `token`, creating the credentials directory if needed.
    pub fn save(&self, token: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(Control4Error::Io)?;
        std::fs::write(self.path(), token).map_err(Control4Error::Io)
    }

    /// Delete the cached token (no-op if none exists).
    pub fn clear(&self) -> Result<()> {
        let p = self.path();
        if p.exists() {
            std::fs::remove_file(&p).map_err(Control4Error::Io)?;
        }
        Ok(())
    }

    fn path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
