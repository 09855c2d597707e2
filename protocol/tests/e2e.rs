//! End-to-end tests of the client-side write path.
//!
//! They follow one post from content validation through address derivation,
//! instruction encoding, message building, signing, the wire encoding and
//! verification, then decode the record the ledger would store. No ledger
//! is involved; the contracts crate tests the same flow against one.

use tweetslot_protocol::address::AddressDeriver;
use tweetslot_protocol::config::{default_program_id, MAX_CONTENT_CHARS, TWEET_ACCOUNT_SPACE, TWEET_SEED};
use tweetslot_protocol::crypto::Keypair;
use tweetslot_protocol::error::{ErrorCode, SlotError};
use tweetslot_protocol::record::{Slot, TweetRecord};
use tweetslot_protocol::transaction::{
    instruction, sign_transaction, verify_transaction, Transaction, TransactionBuilder, TweetInstruction,
};
use tweetslot_protocol::validation::validate_content;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn author(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32])
}

fn signed_send(kp: &Keypair, content: &str) -> Transaction {
    let deriver = AddressDeriver::new(default_program_id());
    let message = TransactionBuilder::new()
        .fee_payer(kp.pubkey())
        .recent_blockhash([42u8; 32])
        .instruction(instruction::send_tweet(&deriver, &kp.pubkey(), content).unwrap())
        .build()
        .unwrap();
    sign_transaction(message, kp).unwrap()
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

#[test]
fn derivation_is_deterministic_and_per_author() {
    let deriver = AddressDeriver::new(default_program_id());
    let a = author(1).pubkey();
    let b = author(2).pubkey();

    let first = deriver.derive(TWEET_SEED, &a).unwrap();
    let second = deriver.derive(TWEET_SEED, &a).unwrap();
    assert_eq!(first, second);
    assert_ne!(first.0, deriver.derive(TWEET_SEED, &b).unwrap().0);
    assert!(!first.0.is_on_curve());
}

// ---------------------------------------------------------------------------
// Write path
// ---------------------------------------------------------------------------

#[test]
fn signed_send_survives_the_wire() {
    let kp = author(1);
    let tx = signed_send(&kp, "gm from the wire");

    let decoded = Transaction::from_wire(&tx.to_wire().unwrap()).unwrap();
    assert_eq!(decoded, tx);
    verify_transaction(&decoded).unwrap();

    let ix = TweetInstruction::unpack(&decoded.message.instruction.data).unwrap();
    assert_eq!(
        ix,
        TweetInstruction::SendTweet {
            content: "gm from the wire".into()
        }
    );

    let (expected, _) = AddressDeriver::new(default_program_id())
        .tweet_address(&kp.pubkey())
        .unwrap();
    assert_eq!(decoded.message.instruction.accounts[0].pubkey, expected);
}

#[test]
fn re_signing_with_new_blockhash_changes_the_id() {
    let kp = author(3);
    let tx = signed_send(&kp, "same content");

    let mut message = tx.message.clone();
    message.recent_blockhash = [43u8; 32];
    let resigned = sign_transaction(message, &kp).unwrap();

    verify_transaction(&resigned).unwrap();
    assert_ne!(resigned.id(), tx.id());
}

#[test]
fn another_key_cannot_sign_for_the_author() {
    let kp = author(4);
    let tx = signed_send(&kp, "mine");
    assert!(sign_transaction(tx.message.clone(), &author(5)).is_err());

    let mut forged = tx.clone();
    forged.signature = signed_send(&author(5), "mine").signature;
    let err = verify_transaction(&forged).unwrap_err();
    assert_eq!(err.to_ledger_error().kind(), Some(ErrorCode::InvalidSignature));
}

// ---------------------------------------------------------------------------
// Validation and records
// ---------------------------------------------------------------------------

#[test]
fn content_limit_counts_characters() {
    assert!(validate_content(&"é".repeat(MAX_CONTENT_CHARS)).is_ok());
    let err = validate_content(&"é".repeat(MAX_CONTENT_CHARS + 1)).unwrap_err();
    assert!(matches!(
        SlotError::from(err),
        SlotError::ContentTooLong { length: 251, max: 250 }
    ));
}

#[test]
fn stored_record_decodes_into_slot() {
    let kp = author(6);
    let (address, _) = AddressDeriver::new(default_program_id())
        .tweet_address(&kp.pubkey())
        .unwrap();
    let record = TweetRecord {
        author: kp.pubkey(),
        content: "stored".into(),
        timestamp: 1_700_000_000,
    };

    let data = record.encode().unwrap();
    assert_eq!(data.len(), TWEET_ACCOUNT_SPACE);
    assert!(TweetRecord::matches(&data));

    let slot = Slot::decode(address, &data).unwrap();
    assert_eq!(slot.address, address);
    assert_eq!(slot.author, kp.pubkey());
    assert_eq!(slot.content, "stored");
    assert_eq!(slot.timestamp, 1_700_000_000);
}
