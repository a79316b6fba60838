//! Device identity and registration input

use serde::{Deserialize, Serialize};

use crate::crypto::{generate_fingerprint, CryptoProvider};
use crate::errors::IdentityError;
use crate::types::{Fingerprint, PeerId, Timestamp};

/// Longest display handle that fits the beacon slot
pub const MAX_HANDLE_LEN: usize = 16;

/// Longest full phone number accepted at registration
pub const MAX_PHONE_LEN: usize = 15;

/// Digits required in the local part of a phone number
pub const LOCAL_NUMBER_DIGITS: usize = 10;

// ----------------------------------------------------------------------------
// Identity
// ----------------------------------------------------------------------------

/// This device's stable identity. Immutable once created.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    id: PeerId,
    display_handle: String,
    public_key: Vec<u8>,
    private_key: Vec<u8>,
    created_at: Timestamp,
}

impl Identity {
    /// Generate a brand new identity with a fresh id and key pair
    pub fn generate(
        display_handle: impl Into<String>,
        crypto: &dyn CryptoProvider,
        key_bits: u32,
    ) -> Result<Self, IdentityError> {
        let display_handle = validate_handle(display_handle.into())?;
        let keys = crypto.generate_keypair(key_bits)?;

        Ok(Self {
            id: PeerId::random(),
            display_handle,
            public_key: keys.public_key,
            private_key: keys.private_key,
            created_at: Timestamp::now(),
        })
    }

    /// Assemble an identity from stored parts
    pub fn from_parts(
        id: PeerId,
        display_handle: impl Into<String>,
        public_key: Vec<u8>,
        private_key: Vec<u8>,
        created_at: Timestamp,
    ) -> Result<Self, IdentityError> {
        Ok(Self {
            id,
            display_handle: validate_handle(display_handle.into())?,
            public_key,
            private_key,
            created_at,
        })
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn display_handle(&self) -> &str {
        &self.display_handle
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Private key bytes; only ever handed to the crypto provider for signing
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn fingerprint(&self) -> Fingerprint {
        generate_fingerprint(&self.public_key)
    }
}

impl core::fmt::Debug for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id.to_string())
            .field("display_handle", &self.display_handle)
            .field("fingerprint", &self.fingerprint().to_string())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

fn validate_handle(handle: String) -> Result<String, IdentityError> {
    if handle.is_empty() {
        return Err(IdentityError::InvalidHandle("handle is empty".to_string()));
    }
    if handle.len() > MAX_HANDLE_LEN {
        return Err(IdentityError::InvalidHandle(format!(
            "handle is {} bytes (max: {})",
            handle.len(),
            MAX_HANDLE_LEN
        )));
    }
    Ok(handle)
}

// ----------------------------------------------------------------------------
// Registration
// ----------------------------------------------------------------------------

/// Phone-number based registration input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub country_code: String,
    pub local_number: String,
}

impl Registration {
    pub fn new(country_code: impl Into<String>, local_number: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            local_number: local_number.into(),
        }
    }

    /// Validate and return the full international number used as display handle
    pub fn phone_number(&self) -> Result<String, IdentityError> {
        let code = self.country_code.trim();
        let digits = code.strip_prefix('+').ok_or_else(|| {
            IdentityError::InvalidPhoneNumber(format!("country code '{}' must start with '+'", code))
        })?;
        if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdentityError::InvalidPhoneNumber(format!(
                "country code '{}' must be '+' followed by 1-3 digits",
                code
            )));
        }

        let local = self.local_number.trim();
        if local.len() != LOCAL_NUMBER_DIGITS || !local.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdentityError::InvalidPhoneNumber(format!(
                "local number must be exactly {} digits",
                LOCAL_NUMBER_DIGITS
            )));
        }

        let full = format!("{}{}", code, local);
        if full.len() > MAX_PHONE_LEN {
            return Err(IdentityError::InvalidPhoneNumber(format!(
                "'{}' exceeds {} characters",
                full, MAX_PHONE_LEN
            )));
        }
        Ok(full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Provider;

    #[test]
    fn test_phone_number_validation() {
        assert_eq!(
            Registration::new("+91", "9876543210").phone_number().unwrap(),
            "+919876543210"
        );
        assert_eq!(
            Registration::new(" +971 ", " 5012345678 ").phone_number().unwrap(),
            "+9715012345678"
        );
    }

    #[test]
    fn test_phone_number_rejections() {
        // Short local number
        assert!(Registration::new("+1", "555123").phone_number().is_err());
        // Letters
        assert!(Registration::new("+1", "55512345ab").phone_number().is_err());
        // Missing plus
        assert!(Registration::new("49", "1512345678").phone_number().is_err());
        // Malformed code
        assert!(Registration::new("#49", "1512345678").phone_number().is_err());
        assert!(Registration::new("+1234", "1512345678").phone_number().is_err());
    }

    #[test]
    fn test_identity_generation() {
        let provider = Ed25519Provider::new();
        let identity = Identity::generate("+15551234567", &provider, 256).unwrap();
        assert_eq!(identity.display_handle(), "+15551234567");
        assert_eq!(identity.public_key().len(), 32);
        assert_eq!(identity.fingerprint(), generate_fingerprint(identity.public_key()));
    }

    #[test]
    fn test_identity_rejects_long_handle() {
        let provider = Ed25519Provider::new();
        let result = Identity::generate("x".repeat(17), &provider, 256);
        assert!(matches!(result, Err(IdentityError::InvalidHandle(_))));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let provider = Ed25519Provider::new();
        let identity = Identity::generate("alice", &provider, 256).unwrap();
        let rendered = format!("{:?}", identity);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&hex::encode(identity.private_key())));
    }
}
