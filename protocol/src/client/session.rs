//! Collaborator session.
//!
//! A [`Session`] is the explicit context every write is made under: who
//! signs, which program owns the slots, and which cluster the collaborator
//! meant to talk to. Nothing in the client reads ambient global state; the
//! session is passed into each call instead.

use std::fmt;

use crate::address::AddressDeriver;
use crate::config::{default_program_id, Cluster};
use crate::crypto::keys::{Keypair, Pubkey};

pub struct Session {
    keypair: Keypair,
    program_id: Pubkey,
    cluster: Cluster,
}

impl Session {
    /// Session for the default tweet program.
    pub fn new(keypair: Keypair, cluster: Cluster) -> Self {
        Self {
            keypair,
            program_id: default_program_id(),
            cluster,
        }
    }

    pub fn with_program_id(mut self, program_id: Pubkey) -> Self {
        self.program_id = program_id;
        self
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// The signing identity; also the slot owner.
    pub fn author(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn deriver(&self) -> AddressDeriver {
        AddressDeriver::new(self.program_id)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("author", &self.author())
            .field("program_id", &self.program_id)
            .field("cluster", &self.cluster)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_secret() {
        let kp = Keypair::from_seed(&[7u8; 32]);
        let secret_hex = kp.to_hex();
        let session = Session::new(kp, Cluster::Localnet);
        let rendered = format!("{session:?}");
        assert!(!rendered.contains(&secret_hex));
        assert!(rendered.contains(&session.author().to_string()));
    }

    #[test]
    fn program_id_override_changes_deriver() {
        let kp = Keypair::from_seed(&[7u8; 32]);
        let custom = Pubkey::new_from_array([3u8; 32]);
        let session = Session::new(kp, Cluster::Localnet).with_program_id(custom);
        assert_eq!(session.deriver().program_id(), &custom);
    }
}
