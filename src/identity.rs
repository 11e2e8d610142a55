//! Content-derived identifiers for records that arrive without one.

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Deterministic id for `value`: the first 16 bytes of
/// SHA-256(`namespace` ‖ canonical JSON), stamped as an RFC 4122 version 5
/// UUID. Loading the same content twice yields the same id.
pub fn content_id<T: Serialize + ?Sized>(namespace: &str, value: &T) -> Uuid {
    let body = serde_json::to_vec(value).unwrap_or_default();
    let digest = Sha256::new()
        .chain_update(namespace.as_bytes())
        .chain_update([0u8])
        .chain_update(&body)
        .finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    bytes[6] = (bytes[6] & 0x0f) | 0x50;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    Uuid::from_bytes(bytes)
}
