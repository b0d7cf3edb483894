//! In-memory collaborators for unit tests

use frecnet_primitives::{
    Address, Balance, Block, BlockNumber, Hash, Header, Nonce, Receipt, SignedTransaction,
    Transaction, BLOCK_SIGNERS, RECEIPT_STATUS_FAILED, RECEIPT_STATUS_SUCCESSFUL,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::chain::{checkpoint_extra, ChainReader, StateReader};
use crate::error::{Error, Result};
use crate::submitter::{AccountManager, TransactionPool, Wallet};
use crate::transaction::build_sign_transaction;

// ============ Chain ============

pub struct MockChain {
    pub blocks: Vec<Block>,
    pub failed: HashSet<Hash>,
    pub missing_bodies: HashSet<BlockNumber>,
    pub missing_headers: HashSet<BlockNumber>,
    pub tip_signing_from: BlockNumber,
    pub tip2019_from: BlockNumber,
}

impl MockChain {
    /// Blocks `0..=len`; every multiple of `checkpoint` carries `masternodes` in its extra
    pub fn new(len: BlockNumber, checkpoint: u64, masternodes: &[Address]) -> Self {
        let mut blocks: Vec<Block> = Vec::new();
        for number in 0..=len {
            let parent_hash = blocks.last().map(|b| b.hash()).unwrap_or_default();
            let extra = if number % checkpoint == 0 {
                checkpoint_extra(masternodes)
            } else {
                vec![0u8; 32]
            };
            blocks.push(Block {
                header: Header { parent_hash, number, coinbase: Address::zero(), extra },
                transactions: vec![],
            });
        }
        Self {
            blocks,
            failed: HashSet::new(),
            missing_bodies: HashSet::new(),
            missing_headers: HashSet::new(),
            tip_signing_from: 0,
            tip2019_from: 0,
        }
    }

    pub fn header_at(&self, number: BlockNumber) -> Header {
        self.blocks[number as usize].header.clone()
    }

    /// Put `signer`'s sign tx for block `signed` into block `included_in`
    pub fn add_sign(&mut self, included_in: BlockNumber, signer: Address, signed: BlockNumber) -> Hash {
        let hash = self.blocks[signed as usize].hash();
        let tx = SignedTransaction {
            tx: build_sign_transaction(signed, hash, 0, BLOCK_SIGNERS),
            signature: vec![],
            from: signer,
        };
        let tx_hash = tx.hash();
        self.blocks[included_in as usize].transactions.push(tx);
        tx_hash
    }

    pub fn add_failed_sign(&mut self, included_in: BlockNumber, signer: Address, signed: BlockNumber) {
        let tx_hash = self.add_sign(included_in, signer, signed);
        self.failed.insert(tx_hash);
    }
}

impl ChainReader for MockChain {
    fn header(&self, parent_hash: &Hash, number: BlockNumber) -> Option<Header> {
        if self.missing_headers.contains(&number) {
            return None;
        }
        let block = self.blocks.get(number as usize)?;
        (block.hash() == *parent_hash).then(|| block.header.clone())
    }

    fn block(&self, hash: &Hash, number: BlockNumber) -> Option<Block> {
        if self.missing_bodies.contains(&number) {
            return None;
        }
        let block = self.blocks.get(number as usize)?;
        (block.hash() == *hash).then(|| block.clone())
    }

    fn block_receipts(&self, hash: &Hash, number: BlockNumber) -> Option<Vec<Receipt>> {
        let block = self.block(hash, number)?;
        Some(
            block
                .transactions
                .iter()
                .map(|tx| {
                    let tx_hash = tx.hash();
                    let status = if self.failed.contains(&tx_hash) {
                        RECEIPT_STATUS_FAILED
                    } else {
                        RECEIPT_STATUS_SUCCESSFUL
                    };
                    Receipt { status, tx_hash }
                })
                .collect(),
        )
    }

    fn is_tip_signing(&self, number: BlockNumber) -> bool {
        number >= self.tip_signing_from
    }

    fn is_tip2019(&self, number: BlockNumber) -> bool {
        number >= self.tip2019_from
    }
}

// ============ State ============

#[derive(Default)]
pub struct MockState {
    pub owners: HashMap<Address, Address>,
    pub caps: HashMap<Address, Balance>,
    pub voters: HashMap<Address, Vec<(Address, Balance)>>,
    /// block hash -> signers recorded by the registry
    pub signed: HashMap<Hash, Vec<Address>>,
    pub broken: HashSet<Address>,
}

impl MockState {
    pub fn with_candidate(mut self, candidate: Address, owner: Address, cap: Balance) -> Self {
        self.owners.insert(candidate, owner);
        self.caps.insert(candidate, cap);
        self
    }

    pub fn with_voter(mut self, candidate: Address, voter: Address, cap: Balance) -> Self {
        self.voters.entry(candidate).or_default().push((voter, cap));
        self
    }

    fn check(&self, address: &Address) -> Result<()> {
        if self.broken.contains(address) {
            return Err(Error::State { address: *address, reason: "trie node missing".into() });
        }
        Ok(())
    }
}

impl StateReader for MockState {
    fn candidate_owner(&self, candidate: &Address) -> Result<Address> {
        self.check(candidate)?;
        Ok(self.owners.get(candidate).copied().unwrap_or_default())
    }

    fn candidate_cap(&self, candidate: &Address) -> Result<Balance> {
        self.check(candidate)?;
        Ok(self.caps.get(candidate).copied().unwrap_or_default())
    }

    fn voters(&self, candidate: &Address) -> Result<Vec<Address>> {
        self.check(candidate)?;
        Ok(self
            .voters
            .get(candidate)
            .map(|v| v.iter().map(|(voter, _)| *voter).collect())
            .unwrap_or_default())
    }

    fn voter_cap(&self, candidate: &Address, voter: &Address) -> Result<Balance> {
        self.check(voter)?;
        Ok(self
            .voters
            .get(candidate)
            .and_then(|v| v.iter().find(|(a, _)| a == voter).map(|(_, cap)| *cap))
            .unwrap_or_default())
    }

    fn signers(&self, block: &Block) -> Result<Vec<Address>> {
        Ok(self.signed.get(&block.hash()).cloned().unwrap_or_default())
    }
}

// ============ Wallet / pool ============

pub struct MockWallet {
    pub accounts: Vec<Address>,
    pub fail: bool,
}

impl Wallet for MockWallet {
    fn accounts(&self) -> Vec<Address> {
        self.accounts.clone()
    }

    fn sign_tx(&self, account: &Address, tx: Transaction, chain_id: u64) -> std::result::Result<SignedTransaction, String> {
        if self.fail {
            return Err("keystore locked".into());
        }
        Ok(SignedTransaction { tx, signature: chain_id.to_be_bytes().to_vec(), from: *account })
    }
}

pub struct MockAccounts {
    pub wallets: Vec<Arc<MockWallet>>,
}

impl MockAccounts {
    pub fn single(account: Address) -> Self {
        Self { wallets: vec![Arc::new(MockWallet { accounts: vec![account], fail: false })] }
    }
}

impl AccountManager for MockAccounts {
    fn find(&self, account: &Address) -> Option<Arc<dyn Wallet>> {
        self.wallets
            .iter()
            .find(|w| w.accounts.contains(account))
            .map(|w| w.clone() as Arc<dyn Wallet>)
    }

    fn wallets(&self) -> Vec<Arc<dyn Wallet>> {
        self.wallets.iter().map(|w| w.clone() as Arc<dyn Wallet>).collect()
    }
}

#[derive(Default)]
pub struct MockPool {
    pub nonce: Mutex<Nonce>,
    /// Number of upcoming `add_local` calls to reject
    pub reject_next: Mutex<usize>,
    /// Every tx sent to this address is rejected
    pub reject_to: Option<Address>,
    pub added: Mutex<Vec<SignedTransaction>>,
}

impl TransactionPool for MockPool {
    fn nonce(&self, _address: &Address) -> Nonce {
        *self.nonce.lock()
    }

    fn add_local(&self, tx: SignedTransaction) -> std::result::Result<(), String> {
        if self.reject_to.is_some() && tx.tx.to == self.reject_to {
            return Err("underpriced".into());
        }
        let mut reject = self.reject_next.lock();
        if *reject > 0 {
            *reject -= 1;
            // another tx from the same account took this nonce
            *self.nonce.lock() += 1;
            return Err("nonce too low".into());
        }
        *self.nonce.lock() = tx.tx.nonce + 1;
        self.added.lock().push(tx);
        Ok(())
    }
}

// ============ AuxStore ============

#[derive(Default)]
pub struct MemoryAux {
    pub data: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    /// Every `get_aux` fails while set
    pub fail_reads: AtomicBool,
}

impl sc_client_api::AuxStore for MemoryAux {
    fn insert_aux<
        'a,
        'b: 'a,
        'c: 'a,
        I: IntoIterator<Item = &'a (&'c [u8], &'c [u8])>,
        D: IntoIterator<Item = &'a &'b [u8]>,
    >(
        &self,
        insert: I,
        delete: D,
    ) -> sp_blockchain::Result<()> {
        let mut data = self.data.lock();
        for (k, v) in insert {
            data.insert(k.to_vec(), v.to_vec());
        }
        for k in delete {
            data.remove(*k);
        }
        Ok(())
    }

    fn get_aux(&self, key: &[u8]) -> sp_blockchain::Result<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(sp_blockchain::Error::Backend("aux column unavailable".into()));
        }
        Ok(self.data.lock().get(key).cloned())
    }
}
