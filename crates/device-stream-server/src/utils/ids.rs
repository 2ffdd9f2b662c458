use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

/// Bytes of randomness behind every session ID and token key.
pub const OPAQUE_ID_BYTES: usize = 32;

/// Unguessable URL-safe identifier from the thread-local CSPRNG.
pub fn generate_opaque_id() -> String {
    let bytes: [u8; OPAQUE_ID_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}
