//! Deterministic display identity derived from connection data.

use uuid::Uuid;

/// 32-bit rolling string hash (`h * 31 + unit` over UTF-16 code units),
/// folded to its absolute value.
pub fn hash_str(input: &str) -> u32 {
    let mut hash: i32 = 0;
    for unit in input.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    hash.unsigned_abs()
}

/// Orange-range HSL colour for a network address.
pub fn color_for_address(address: &str) -> String {
    let hash = hash_str(address);
    let hue = 18 + hash % 28;
    let sat = 85 + hash % 16;
    let light = 45 + hash % 16;
    format!("hsl({hue}, {sat}%, {light}%)")
}

/// Default username for a fresh connection: `Guest-0000` .. `Guest-9999`.
pub fn guest_name(id: &Uuid) -> String {
    format!("Guest-{:04}", hash_str(&id.to_string()) % 10_000)
}
