//! HopeNet radio constants and naming utilities

use uuid::Uuid;

// ----------------------------------------------------------------------------
// Service Identifiers
// ----------------------------------------------------------------------------

/// HopeNet BLE service UUID
pub const HOPENET_SERVICE_UUID: Uuid = Uuid::from_u128(0x12345678_1234_1234_1234_1234567890AB);

/// Prefix of HopeNet device names (`HN-<handle>`)
pub const DEVICE_NAME_PREFIX: &str = "HN";

/// Extended advertising PDU payload limit
pub const MAX_ADVERTISING_PAYLOAD: usize = 251;

// ----------------------------------------------------------------------------
// Protocol Utilities
// ----------------------------------------------------------------------------

/// Generate the BLE device name advertised for a display handle
pub fn generate_device_name(display_handle: &str, prefix: &str) -> String {
    format!("{}-{}", prefix, display_handle)
}

/// Extract the display handle from a HopeNet device name
///
/// Names are informational only; identity comes from the signed beacon.
pub fn extract_handle_from_name<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let handle = name.strip_prefix(prefix)?.strip_prefix('-')?;
    if handle.is_empty() {
        None
    } else {
        Some(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_name_round_trip() {
        let name = generate_device_name("+15551234567", DEVICE_NAME_PREFIX);
        assert_eq!(name, "HN-+15551234567");
        assert_eq!(
            extract_handle_from_name(&name, DEVICE_NAME_PREFIX),
            Some("+15551234567")
        );
    }

    #[test]
    fn test_foreign_names_ignored() {
        assert_eq!(extract_handle_from_name("BitChat-01", DEVICE_NAME_PREFIX), None);
        assert_eq!(extract_handle_from_name("HN-", DEVICE_NAME_PREFIX), None);
        assert_eq!(extract_handle_from_name("HNX", DEVICE_NAME_PREFIX), None);
    }
}
