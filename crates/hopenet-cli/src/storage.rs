//! File-backed identity persistence
//!
//! The identity is written as JSON next to nothing else in the data
//! directory. Writes go to a temporary file first and are renamed into
//! place so a crash never leaves a half-written record.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use hopenet_core::{Identity, IdentityError, IdentityPersistence};
use tracing::debug;

/// Stores the single identity record at a fixed path
#[derive(Debug, Clone)]
pub struct FileIdentityPersistence {
    path: PathBuf,
}

impl FileIdentityPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl IdentityPersistence for FileIdentityPersistence {
    fn load(&self) -> Result<Option<Identity>, IdentityError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(IdentityError::storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let identity = serde_json::from_str(&contents).map_err(|e| {
            IdentityError::storage(format!("Corrupt identity file {}: {}", self.path.display(), e))
        })?;
        debug!("Loaded identity from {}", self.path.display());
        Ok(Some(identity))
    }

    fn save(&self, identity: &Identity) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                IdentityError::storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_string_pretty(identity)
            .map_err(|e| IdentityError::storage(format!("Failed to encode identity: {}", e)))?;

        let temp = self.temp_path();
        let mut file = create_private(&temp)?;
        file.write_all(json.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| IdentityError::storage(format!("Failed to write identity: {}", e)))?;
        drop(file);
        std::fs::rename(&temp, &self.path)
            .map_err(|e| IdentityError::storage(format!("Failed to commit identity: {}", e)))?;

        debug!("Saved identity to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), IdentityError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IdentityError::storage(format!(
                "Failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

/// Create a fresh file that only the owner can read, replacing any stale one.
///
/// The mode is applied at creation, so the key is never on disk with looser
/// permissions.
fn create_private(path: &Path) -> Result<File, IdentityError> {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed stale {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(IdentityError::storage(format!(
                "Failed to remove stale {}: {}",
                path.display(),
                e
            )))
        }
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;

        // Private key material: owner read/write only
        options.mode(0o600);
    }
    options
        .open(path)
        .map_err(|e| IdentityError::storage(format!("Failed to create {}: {}", path.display(), e)))
}
