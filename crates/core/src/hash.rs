// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-way pseudonymization of user identifiers

use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a hashed user id
const HASH_BYTES: usize = 8;

/// Hash a raw user id for storage in DAU segments
///
/// SHA-256 truncated to the first 8 bytes, lower-case hex (16 chars).
pub fn hash_user_id(user_id: &str) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    hex_encode(&digest[..HASH_BYTES])
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
