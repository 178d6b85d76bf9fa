//! entropy + password codec
//!
//! produces the plaintext u32 values that get handed to the fhe client.
//! nothing here is ever transmitted unencrypted

use rand::rngs::OsRng;
use rand::RngCore;

/// password value submitted for games (or join attempts) without a password
pub const NO_PASSWORD: u32 = 0;

/// fresh entropy contribution from the os rng
pub fn generate_entropy() -> u32 {
    OsRng.next_u32()
}

/// string hash over utf-16 code units: h = h * 31 + unit (wrapping i32),
/// returned as |h|
///
/// not a cryptographic hash. identical strings always map to the same value,
/// which is all the encrypted equality check on the ledger needs
pub fn hash_password(password: &str) -> u32 {
    let hash = password
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32));
    hash.unsigned_abs()
}

/// true when the supplied password makes a game password-protected
pub fn has_password(password: Option<&str>) -> bool {
    password.is_some_and(|p| !p.is_empty())
}

/// value to encrypt into a password slot
pub fn password_value(password: Option<&str>) -> u32 {
    match password {
        Some(p) if !p.is_empty() => hash_password(p),
        _ => NO_PASSWORD,
    }
}
