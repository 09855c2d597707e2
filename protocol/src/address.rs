//! # Address Derivation
//!
//! Every author's slot lives at a program-derived address (PDA):
//!
//! ```text
//! for bump in 255..=0:
//!     candidate = sha256(seed_0 || … || seed_n || [bump] || program_id || "ProgramDerivedAddress")
//!     if candidate is not an Ed25519 curve point: return (candidate, bump)
//! ```
//!
//! The first off-curve candidate wins, so no private key can exist for a
//! slot address and only the program can write to it. The bump is the
//! uniqueness nonce that makes the search reproducible: given the bump,
//! [`create_program_address`] recomputes the address with one hash.
//!
//! Derivation is pure. The only failure mode is malformed input (too many
//! or too long seeds), reported as [`AddressError`] and never retried.

use thiserror::Error;

use crate::config::{MAX_SEEDS, MAX_SEED_LEN, PDA_MARKER, TWEET_SEED};
use crate::crypto::hash::hashv;
use crate::crypto::keys::Pubkey;

/// Errors from address derivation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("too many seeds: {count} (max {MAX_SEEDS})")]
    TooManySeeds { count: usize },

    #[error("seed {index} is {len} bytes (max {MAX_SEED_LEN})")]
    SeedTooLong { index: usize, len: usize },

    /// The candidate for the given bump landed on the curve.
    #[error("derived address is on the ed25519 curve")]
    OnCurve,

    /// No bump in `0..=255` produced an off-curve address.
    #[error("no viable bump seed found")]
    NoViableBump,
}

fn check_seeds(seeds: &[&[u8]], max_count: usize) -> Result<(), AddressError> {
    if seeds.len() > max_count {
        return Err(AddressError::TooManySeeds { count: seeds.len() });
    }
    for (index, seed) in seeds.iter().enumerate() {
        if seed.len() > MAX_SEED_LEN {
            return Err(AddressError::SeedTooLong {
                index,
                len: seed.len(),
            });
        }
    }
    Ok(())
}

/// Compute the address for `seeds` (bump included as the last seed) under
/// `program_id`. Fails with [`AddressError::OnCurve`] when the result is a
/// valid curve point.
pub fn create_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<Pubkey, AddressError> {
    check_seeds(seeds, MAX_SEEDS)?;

    let mut parts: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 2);
    parts.extend_from_slice(seeds);
    parts.push(program_id.as_ref());
    parts.push(PDA_MARKER);

    let candidate = Pubkey::new_from_array(hashv(&parts));
    if candidate.is_on_curve() {
        return Err(AddressError::OnCurve);
    }
    Ok(candidate)
}

/// Search bumps from 255 downward and return the first off-curve address
/// together with its bump.
pub fn find_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<(Pubkey, u8), AddressError> {
    // One seed position is reserved for the bump.
    check_seeds(seeds, MAX_SEEDS - 1)?;

    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = seeds.to_vec();
        with_bump.push(&bump_seed);
        match create_program_address(&with_bump, program_id) {
            Ok(address) => return Ok((address, bump)),
            Err(AddressError::OnCurve) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(AddressError::NoViableBump)
}

/// Derives slot addresses for one program.
///
/// Cheap to copy; holds only the program id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressDeriver {
    program_id: Pubkey,
}

impl AddressDeriver {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// `(tag, author) -> (address, bump)`.
    pub fn derive(&self, tag: &[u8], author: &Pubkey) -> Result<(Pubkey, u8), AddressError> {
        find_program_address(&[tag, author.as_ref()], &self.program_id)
    }

    /// The slot address for `author` under the `"tweet"` tag.
    pub fn tweet_address(&self, author: &Pubkey) -> Result<(Pubkey, u8), AddressError> {
        self.derive(TWEET_SEED, author)
    }

    /// Returns `true` if `address` is exactly what `derive(tag, author)`
    /// yields. Used by the feed to drop spoofed or stale listings.
    pub fn verify(&self, address: &Pubkey, tag: &[u8], author: &Pubkey) -> bool {
        matches!(self.derive(tag, author), Ok((derived, _)) if derived == *address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_program_id;
    use crate::crypto::keys::Keypair;

    fn deriver() -> AddressDeriver {
        AddressDeriver::new(default_program_id())
    }

    #[test]
    fn derivation_is_deterministic() {
        let author = Keypair::from_seed(&[1u8; 32]).pubkey();
        let (a1, b1) = deriver().tweet_address(&author).unwrap();
        let (a2, b2) = deriver().tweet_address(&author).unwrap();
        assert_eq!(a1, a2);
        assert_eq!(b1, b2);
    }

    #[test]
    fn different_authors_different_addresses() {
        let a = Keypair::from_seed(&[1u8; 32]).pubkey();
        let b = Keypair::from_seed(&[2u8; 32]).pubkey();
        assert_ne!(
            deriver().tweet_address(&a).unwrap().0,
            deriver().tweet_address(&b).unwrap().0
        );
    }

    #[test]
    fn different_programs_different_addresses() {
        let author = Keypair::from_seed(&[3u8; 32]).pubkey();
        let other = AddressDeriver::new(Pubkey::new_from_array([9u8; 32]));
        assert_ne!(
            deriver().tweet_address(&author).unwrap().0,
            other.tweet_address(&author).unwrap().0
        );
    }

    #[test]
    fn derived_address_is_off_curve() {
        for seed in 0u8..16 {
            let author = Keypair::from_seed(&[seed; 32]).pubkey();
            let (address, _) = deriver().tweet_address(&author).unwrap();
            assert!(!address.is_on_curve());
        }
    }

    #[test]
    fn bump_recreates_same_address() {
        let author = Keypair::from_seed(&[4u8; 32]).pubkey();
        let (address, bump) = deriver().tweet_address(&author).unwrap();
        let recreated =
            create_program_address(&[TWEET_SEED, author.as_ref(), &[bump]], &default_program_id())
                .unwrap();
        assert_eq!(address, recreated);
    }

    #[test]
    fn verify_accepts_own_address_only() {
        let a = Keypair::from_seed(&[5u8; 32]).pubkey();
        let b = Keypair::from_seed(&[6u8; 32]).pubkey();
        let (addr_a, _) = deriver().tweet_address(&a).unwrap();

        assert!(deriver().verify(&addr_a, TWEET_SEED, &a));
        assert!(!deriver().verify(&addr_a, TWEET_SEED, &b));
        assert!(!deriver().verify(&addr_a, b"other", &a));
    }

    #[test]
    fn oversized_seed_is_rejected() {
        let long = [0u8; 33];
        let err = find_program_address(&[&long], &default_program_id()).unwrap_err();
        assert_eq!(err, AddressError::SeedTooLong { index: 0, len: 33 });
    }

    #[test]
    fn too_many_seeds_rejected() {
        let seed: &[u8] = b"s";
        let seeds = vec![seed; MAX_SEEDS];
        assert!(matches!(
            find_program_address(&seeds, &default_program_id()),
            Err(AddressError::TooManySeeds { .. })
        ));
    }
}
