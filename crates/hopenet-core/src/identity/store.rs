//! Process-owned holder of this device's identity

use std::sync::Arc;

use tracing::{info, warn};

use super::storage::IdentityPersistence;
use super::types::{Identity, Registration};
use crate::crypto::CryptoProvider;
use crate::errors::IdentityError;

/// Owns the loaded identity and hands out shared read-only handles to it
#[derive(Debug, Clone)]
pub struct IdentityStore {
    identity: Arc<Identity>,
}

impl IdentityStore {
    /// Wrap an identity that is already in hand
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: Arc::new(identity),
        }
    }

    /// Load the persisted identity, called once at startup
    pub fn open(persistence: &dyn IdentityPersistence) -> Result<Option<Self>, IdentityError> {
        Ok(persistence.load()?.map(Self::new))
    }

    /// Load the persisted identity or fail with `NotRegistered`
    pub fn require(persistence: &dyn IdentityPersistence) -> Result<Self, IdentityError> {
        Self::open(persistence)?.ok_or(IdentityError::NotRegistered)
    }

    /// Register a new identity from a phone number.
    ///
    /// Refuses with `AlreadyRegistered` while an identity is persisted. Nothing is
    /// persisted unless key generation succeeds; every failure is returned so the
    /// caller can retry.
    pub fn register(
        persistence: &dyn IdentityPersistence,
        crypto: &dyn CryptoProvider,
        registration: &Registration,
        key_bits: u32,
    ) -> Result<Self, IdentityError> {
        let phone_number = registration.phone_number()?;
        if let Some(existing) = persistence.load()? {
            return Err(IdentityError::AlreadyRegistered(
                existing.display_handle().to_string(),
            ));
        }

        let identity = Identity::generate(phone_number, crypto, key_bits).map_err(|e| {
            warn!("Identity generation failed: {}", e);
            e
        })?;
        persistence.save(&identity)?;

        info!(
            "Registered identity {} for {}",
            identity.id(),
            identity.display_handle()
        );
        Ok(Self::new(identity))
    }

    /// Destroy the persisted identity (explicit account reset)
    pub fn reset(persistence: &dyn IdentityPersistence) -> Result<(), IdentityError> {
        persistence.clear()?;
        info!("Identity reset");
        Ok(())
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Shared handle for long-lived consumers such as the discovery engine
    pub fn handle(&self) -> Arc<Identity> {
        Arc::clone(&self.identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Provider;
    use crate::errors::CryptoError;
    use crate::identity::MemoryIdentityPersistence;

    #[test]
    fn test_register_persists_identity() {
        let storage = MemoryIdentityPersistence::new();
        let store = IdentityStore::register(
            &storage,
            &Ed25519Provider::new(),
            &Registration::new("+44", "7911123456"),
            256,
        )
        .unwrap();

        assert_eq!(store.identity().display_handle(), "+447911123456");
        let loaded = IdentityStore::open(&storage).unwrap().unwrap();
        assert_eq!(loaded.identity(), store.identity());
    }

    #[test]
    fn test_register_invalid_number_persists_nothing() {
        let storage = MemoryIdentityPersistence::new();
        let result = IdentityStore::register(
            &storage,
            &Ed25519Provider::new(),
            &Registration::new("+44", "123"),
            256,
        );
        assert!(matches!(result, Err(IdentityError::InvalidPhoneNumber(_))));
        assert!(IdentityStore::open(&storage).unwrap().is_none());
    }

    #[test]
    fn test_key_generation_failure_is_surfaced() {
        let storage = MemoryIdentityPersistence::new();
        let result = IdentityStore::register(
            &storage,
            &Ed25519Provider::new(),
            &Registration::new("+1", "5551234567"),
            2048,
        );
        assert!(matches!(
            result,
            Err(IdentityError::Crypto(CryptoError::UnsupportedKeySize { bits: 2048 }))
        ));
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_storage_failure_is_surfaced() {
        let storage = MemoryIdentityPersistence::unavailable();
        let result = IdentityStore::register(
            &storage,
            &Ed25519Provider::new(),
            &Registration::new("+1", "5551234567"),
            256,
        );
        assert!(matches!(result, Err(IdentityError::Storage(_))));
    }

    #[test]
    fn test_register_never_overwrites_existing_identity() {
        let storage = MemoryIdentityPersistence::new();
        let crypto = Ed25519Provider::new();
        let first = IdentityStore::register(
            &storage,
            &crypto,
            &Registration::new("+44", "7911123456"),
            256,
        )
        .unwrap();

        let second =
            IdentityStore::register(&storage, &crypto, &Registration::new("+1", "5551234567"), 256);
        assert!(matches!(
            second,
            Err(IdentityError::AlreadyRegistered(handle)) if handle == "+447911123456"
        ));
        let kept = IdentityStore::require(&storage).unwrap();
        assert_eq!(kept.identity(), first.identity());

        // After a reset the number can be registered again
        IdentityStore::reset(&storage).unwrap();
        IdentityStore::register(&storage, &crypto, &Registration::new("+1", "5551234567"), 256)
            .unwrap();
    }

    #[test]
    fn test_reset_and_require() {
        let storage = MemoryIdentityPersistence::new();
        IdentityStore::register(
            &storage,
            &Ed25519Provider::new(),
            &Registration::new("+61", "4123456789"),
            256,
        )
        .unwrap();

        IdentityStore::reset(&storage).unwrap();
        assert!(matches!(
            IdentityStore::require(&storage),
            Err(IdentityError::NotRegistered)
        ));
    }

    #[test]
    fn test_handle_shares_identity() {
        let identity = Identity::generate("bob", &Ed25519Provider::new(), 256).unwrap();
        let store = IdentityStore::new(identity);
        let handle = store.handle();
        assert_eq!(handle.id(), store.identity().id());
    }
}
