//! Message and transaction construction.
//!
//! The [`TransactionBuilder`] assembles an unsigned [`Message`]: fee payer,
//! recent blockhash and one instruction. Signing happens in
//! [`super::signing`]; keeping the two apart lets the client rebuild a
//! message with a fresh blockhash without touching key material.

use serde::{Deserialize, Serialize};

use super::instruction::Instruction;
use super::verification::TransactionError;
use crate::config::MESSAGE_VERSION;
use crate::crypto::keys::{Pubkey, Signature};

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// The signed part of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub version: u8,
    /// Pays rent and signs. For tweet instructions this is the author.
    pub fee_payer: Pubkey,
    /// Must be inside the ledger's recent blockhash window at execution.
    pub recent_blockhash: [u8; 32],
    pub instruction: Instruction,
}

impl Message {
    /// Canonical bytes covered by the signature.
    ///
    /// `version || fee_payer || blockhash || program_id || n_accounts (u8)
    ///  || (pubkey || flags)* || data_len (u32 LE) || data`
    pub fn signable_bytes(&self) -> Vec<u8> {
        let ix = &self.instruction;
        let mut buf = Vec::with_capacity(1 + 32 * 3 + 1 + ix.accounts.len() * 33 + 4 + ix.data.len());

        buf.push(self.version);
        buf.extend_from_slice(self.fee_payer.as_bytes());
        buf.extend_from_slice(&self.recent_blockhash);
        buf.extend_from_slice(ix.program_id.as_bytes());

        buf.push(ix.accounts.len() as u8);
        for meta in &ix.accounts {
            buf.extend_from_slice(meta.pubkey.as_bytes());
            buf.push(u8::from(meta.is_signer) | (u8::from(meta.is_writable) << 1));
        }

        buf.extend_from_slice(&(ix.data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&ix.data);
        buf
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A message plus the fee payer's signature.
///
/// The signature doubles as the transaction id: the ledger dedupes and
/// reports status by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub message: Message,
    pub signature: Option<Signature>,
}

impl Transaction {
    pub fn unsigned(message: Message) -> Self {
        Self {
            message,
            signature: None,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn id(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// `hex(bincode(tx))`, the `sendTransaction` parameter.
    pub fn to_wire(&self) -> Result<String, TransactionError> {
        let bytes = bincode::serialize(self).map_err(|e| TransactionError::Encoding(e.to_string()))?;
        Ok(hex::encode(bytes))
    }

    pub fn from_wire(encoded: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(encoded).map_err(|e| TransactionError::Encoding(e.to_string()))?;
        bincode::deserialize(&bytes).map_err(|e| TransactionError::Encoding(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned [`Message`]s.
///
/// ```rust,no_run
/// use tweetslot_protocol::address::AddressDeriver;
/// use tweetslot_protocol::config::default_program_id;
/// use tweetslot_protocol::crypto::Keypair;
/// use tweetslot_protocol::transaction::{instruction, TransactionBuilder};
///
/// let author = Keypair::generate();
/// let deriver = AddressDeriver::new(default_program_id());
/// let message = TransactionBuilder::new()
///     .fee_payer(author.pubkey())
///     .recent_blockhash([7u8; 32])
///     .instruction(instruction::send_tweet(&deriver, &author.pubkey(), "gm").unwrap())
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct TransactionBuilder {
    fee_payer: Option<Pubkey>,
    recent_blockhash: Option<[u8; 32]>,
    instruction: Option<Instruction>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fee_payer(mut self, payer: Pubkey) -> Self {
        self.fee_payer = Some(payer);
        self
    }

    pub fn recent_blockhash(mut self, blockhash: [u8; 32]) -> Self {
        self.recent_blockhash = Some(blockhash);
        self
    }

    pub fn instruction(mut self, instruction: Instruction) -> Self {
        self.instruction = Some(instruction);
        self
    }

    pub fn build(self) -> Result<Message, TransactionError> {
        let fee_payer = self.fee_payer.ok_or(TransactionError::MissingField("fee_payer"))?;
        let recent_blockhash = self
            .recent_blockhash
            .ok_or(TransactionError::MissingField("recent_blockhash"))?;
        let instruction = self
            .instruction
            .ok_or(TransactionError::MissingField("instruction"))?;

        if instruction.accounts.len() > u8::MAX as usize {
            return Err(TransactionError::TooManyAccounts(instruction.accounts.len()));
        }

        Ok(Message {
            version: MESSAGE_VERSION,
            fee_payer,
            recent_blockhash,
            instruction,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
