//! # Hashing Utilities
//!
//! Two hash functions, each with a clear job:
//!
//! - **SHA-256**: everything that is part of the wire or record format:
//!   program-derived addresses, record and instruction discriminators,
//!   blockhashes. Clients in any language must be able to reproduce these.
//! - **BLAKE3**: ledger-internal fingerprints (the account state root),
//!   where nobody outside the node needs to recompute the value.

use sha2::{Digest, Sha256};

/// SHA-256 of a single byte slice.
///
/// ```
/// use tweetslot_protocol::crypto::hash::sha256;
///
/// assert_eq!(sha256(b"tweet").len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    hashv(&[data])
}

/// SHA-256 over several slices fed in order, without concatenating first.
pub fn hashv(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// The 8-byte discriminator for a named item in a namespace, computed as
/// `sha256("<namespace>:<name>")[..8]`.
///
/// Records use the `account` namespace and instructions the `global`
/// namespace, so a record can never be mistaken for an instruction payload.
pub fn discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let preimage = format!("{namespace}:{name}");
    let hash = sha256(preimage.as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

/// BLAKE3 of the input.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Binary Merkle root over pre-hashed leaves using BLAKE3.
///
/// An odd node at any level is paired with itself. An empty leaf set
/// yields `[0u8; 32]`.
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for chunk in level.chunks(2) {
            let right = chunk.get(1).unwrap_or(&chunk[0]);
            let mut hasher = blake3::Hasher::new();
            hasher.update(&chunk[0]);
            hasher.update(right);
            next.push(*hasher.finalize().as_bytes());
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hashv_equals_concatenated_hash() {
        assert_eq!(hashv(&[b"ab", b"c"]), sha256(b"abc"));
    }

    #[test]
    fn discriminators_separate_namespaces() {
        assert_ne!(discriminator("account", "Tweet"), discriminator("global", "Tweet"));
        assert_eq!(discriminator("account", "Tweet"), discriminator("account", "Tweet"));
    }

    #[test]
    fn merkle_root_of_empty_is_zero() {
        assert_eq!(merkle_root(&[]), [0u8; 32]);
    }

    #[test]
    fn merkle_root_of_single_leaf_is_leaf() {
        let leaf = blake3_hash(b"only");
        assert_eq!(merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn merkle_root_depends_on_order() {
        let a = blake3_hash(b"a");
        let b = blake3_hash(b"b");
        assert_ne!(merkle_root(&[a, b]), merkle_root(&[b, a]));
    }
}
