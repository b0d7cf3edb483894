//! Error types for the S2PoS engine

use frecnet_primitives::{Address, BlockNumber, Hash, Nonce};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Missing header #{number} (parent {parent_hash:?})")]
    MissingHeader { number: BlockNumber, parent_hash: Hash },
    #[error("Missing block #{number} ({hash:?})")]
    MissingBlock { number: BlockNumber, hash: Hash },
    #[error("Missing receipts for block #{number} ({hash:?})")]
    MissingReceipts { number: BlockNumber, hash: Hash },
    #[error("State lookup failed for {address:?}: {reason}")]
    State { address: Address, reason: String },
    #[error("No wallet available to sign with")]
    NoWallet,
    #[error("Wallet failed to sign for {account:?}: {reason}")]
    Wallet { account: Address, reason: String },
    #[error("Transaction pool rejected tx from {from:?} with nonce {nonce}: {reason}")]
    Pool { from: Address, nonce: Nonce, reason: String },
    #[error("Randomize key store: {0}")]
    Store(String),
    #[error("Randomize key missing from store")]
    RandomizeKeyMissing,
    #[error("Failed to encrypt randomize secret")]
    Encrypt,
    #[error("Invalid hex data: {0}")]
    InvalidHex(String),
    #[error("Arithmetic overflow while computing rewards")]
    Overflow,
}

pub type Result<T> = std::result::Result<T, Error>;
