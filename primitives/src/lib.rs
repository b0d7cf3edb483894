//! FRECNET Core Primitives
//!
//! Chain constants and plain data types used by the S2PoS consensus layer:
//! epoch windows for commit-reveal, reward tiers, well-known registry
//! addresses and the block/transaction shapes the reward walk reads.

#![cfg_attr(not(feature = "std"), no_std)]

use codec::{Decode, Encode};
use hex_literal::hex;
use scale_info::TypeInfo;
use sp_core::{H160, H256, U256};
use sp_std::vec::Vec;

pub type BlockNumber = u64;
pub type Nonce = u64;
pub type Address = H160;
pub type Hash = H256;
pub type Balance = U256;

/// 1 FRE = 10^18 wei
pub const ETHER: u128 = 1_000_000_000_000_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// EPOCH
// ═══════════════════════════════════════════════════════════════════════════════

/// Blocks per epoch (also the reward checkpoint interval)
pub const EPOCH: u64 = 900;

/// First epoch-relative block at which a secret may be committed
pub const EPOCH_BLOCK_SECRET: u64 = 800;

/// First epoch-relative block at which the opening may be revealed
pub const EPOCH_BLOCK_OPENING: u64 = 850;

/// Last epoch-relative block at which the opening may be revealed
pub const EPOCH_BLOCK_RANDOMIZE: u64 = 900;

/// Blocks past this offset in an epoch only earn signer credit on multiples of it
pub const MERGE_SIGN_RANGE: u64 = 15;

/// Width of one encoded M2 entry
pub const M2_BYTE_LENGTH: usize = 4;

/// Fixed number of extra-data prefix bytes reserved for signer vanity
pub const EXTRA_VANITY: usize = 32;

/// Fixed number of extra-data suffix bytes reserved for signer seal
pub const EXTRA_SEAL: usize = 65;

// ═══════════════════════════════════════════════════════════════════════════════
// FORKS
// ═══════════════════════════════════════════════════════════════════════════════

/// Sign-credit filtering and voter de-duplication activate here
pub const TIP2019_BLOCK: BlockNumber = 1;

/// From here on signing transactions are cached without consulting receipts
pub const TIP_SIGNING_BLOCK: BlockNumber = 3_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// REWARDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Owner share for a full-cap masternode
pub const REWARD_MASTER_PERCENT: u64 = 50;

/// Owner share for any other masternode
pub const REWARD_SYNC_PERCENT: u64 = 40;

/// Share split among voters (disabled)
pub const REWARD_VOTER_PERCENT: u64 = 0;

/// Share paid to the foundation wallet
pub const REWARD_FOUNDATION_PERCENT: u64 = 10;

/// Stake cap that marks a full masternode: 50,000 FRE
pub const FULL_MASTERNODE_CAP: u128 = 50_000 * ETHER;

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Block-signer registry contract
pub const BLOCK_SIGNERS: Address = H160(hex!("0000000000000000000000000000000000000089"));

/// Randomize registry contract
pub const RANDOMIZE_SMC: Address = H160(hex!("0000000000000000000000000000000000000090"));

/// `sign(uint256,bytes32)`
pub const HEX_SIGN_METHOD: [u8; 4] = hex!("e341eaa4");

/// `setSecret(bytes32[])`
pub const HEX_SET_SECRET: [u8; 4] = hex!("34d38600");

/// `setOpening(bytes32)`
pub const HEX_SET_OPENING: [u8; 4] = hex!("e11f5ba2");

/// Gas limit of every sign/secret/opening transaction
pub const SIGNING_TX_GAS: u64 = 200_000;

pub const RECEIPT_STATUS_FAILED: u8 = 0;
pub const RECEIPT_STATUS_SUCCESSFUL: u8 = 1;

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Block header, reduced to the fields the consensus layer reads
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct Header {
    pub parent_hash: Hash,
    pub number: BlockNumber,
    pub coinbase: Address,
    /// vanity || masternodes (checkpoint blocks only) || seal
    pub extra: Vec<u8>,
}

impl Header {
    pub fn hash(&self) -> Hash {
        sp_core::keccak_256(&self.encode()).into()
    }
}

/// Unsigned transaction
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct Transaction {
    pub nonce: Nonce,
    pub to: Option<Address>,
    pub value: Balance,
    pub gas: u64,
    pub gas_price: Balance,
    pub data: Vec<u8>,
}

impl Transaction {
    pub fn new(nonce: Nonce, to: Address, value: Balance, gas: u64, gas_price: Balance, data: Vec<u8>) -> Self {
        Self { nonce, to: Some(to), value, gas, gas_price, data }
    }

    /// A call to `sign(uint256,bytes32)` on the block-signer registry
    pub fn is_signing_transaction(&self) -> bool {
        if self.to != Some(BLOCK_SIGNERS) {
            return false;
        }
        self.data.len() == 4 + 32 * 2 && self.data[..4] == HEX_SIGN_METHOD
    }
}

/// Transaction together with its signature and recovered sender
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub signature: Vec<u8>,
    pub from: Address,
}

impl SignedTransaction {
    pub fn hash(&self) -> Hash {
        sp_core::keccak_256(&self.encode()).into()
    }

    pub fn data(&self) -> &[u8] {
        &self.tx.data
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct Receipt {
    pub status: u8,
    pub tx_hash: Hash,
}

impl Receipt {
    pub fn is_successful(&self) -> bool {
        self.status == RECEIPT_STATUS_SUCCESSFUL
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<SignedTransaction>,
}

impl Block {
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn number(&self) -> BlockNumber {
        self.header.number
    }
}

/// Left-pad `bytes` with zeros to `len`; longer input is returned as is.
pub fn left_pad_bytes(bytes: &[u8], len: usize) -> Vec<u8> {
    if bytes.len() >= len {
        return bytes.to_vec();
    }
    let mut padded = sp_std::vec![0u8; len - bytes.len()];
    padded.extend_from_slice(bytes);
    padded
}
