//! Storage abstraction for the single identity record
//!
//! The device holds at most one identity. Backends only need load/save/clear
//! of that one record; the CLI provides a file-backed implementation.

use parking_lot::Mutex;

use super::types::Identity;
use crate::errors::IdentityError;

// ----------------------------------------------------------------------------
// Storage Trait
// ----------------------------------------------------------------------------

/// Single-record persistence for this device's identity
pub trait IdentityPersistence: Send + Sync {
    /// Load the stored identity, if any
    fn load(&self) -> Result<Option<Identity>, IdentityError>;

    /// Store the identity, replacing any previous record
    fn save(&self, identity: &Identity) -> Result<(), IdentityError>;

    /// Remove the stored identity (account reset)
    fn clear(&self) -> Result<(), IdentityError>;
}

// ----------------------------------------------------------------------------
// Memory Storage Implementation
// ----------------------------------------------------------------------------

/// In-memory storage for tests and simulated devices
#[derive(Debug)]
pub struct MemoryIdentityPersistence {
    record: Mutex<Option<Identity>>,
    available: bool,
}

impl MemoryIdentityPersistence {
    pub fn new() -> Self {
        Self {
            record: Mutex::new(None),
            available: true,
        }
    }

    /// Storage that fails every call, for exercising registration failure paths
    pub fn unavailable() -> Self {
        Self {
            record: Mutex::new(None),
            available: false,
        }
    }

    fn check_available(&self) -> Result<(), IdentityError> {
        if self.available {
            Ok(())
        } else {
            Err(IdentityError::storage("Storage not available"))
        }
    }
}

impl Default for MemoryIdentityPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityPersistence for MemoryIdentityPersistence {
    fn load(&self) -> Result<Option<Identity>, IdentityError> {
        self.check_available()?;
        Ok(self.record.lock().clone())
    }

    fn save(&self, identity: &Identity) -> Result<(), IdentityError> {
        self.check_available()?;
        *self.record.lock() = Some(identity.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), IdentityError> {
        self.check_available()?;
        self.record.lock().take();
        Ok(())
    }
}
