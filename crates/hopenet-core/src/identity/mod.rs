//! Identity management for HopeNet
//!
//! A device has exactly one identity: a random 128-bit id, a display handle
//! derived from the registered phone number, and an asymmetric key pair.

pub mod storage;
pub mod store;
pub mod types;

pub use storage::{IdentityPersistence, MemoryIdentityPersistence};
pub use store::IdentityStore;
pub use types::{Identity, Registration, LOCAL_NUMBER_DIGITS, MAX_HANDLE_LEN, MAX_PHONE_LEN};
