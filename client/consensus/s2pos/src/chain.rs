//! Chain-side collaborators - block reader, state accessor and the
//! per-block signing-transaction cache

use frecnet_primitives::{
    Address, Balance, Block, BlockNumber, Hash, Header, Receipt, SignedTransaction, EXTRA_SEAL,
    EXTRA_VANITY,
};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::error::Result;

/// Default number of blocks whose signing transactions stay cached
pub const BLOCK_SIGNERS_CACHE_LIMIT: usize = 9000;

/// Read access to headers, bodies and receipts
pub trait ChainReader: Send + Sync {
    /// Header `number` whose hash is `parent_hash` (walks are driven by parent links)
    fn header(&self, parent_hash: &Hash, number: BlockNumber) -> Option<Header>;

    fn block(&self, hash: &Hash, number: BlockNumber) -> Option<Block>;

    fn block_receipts(&self, hash: &Hash, number: BlockNumber) -> Option<Vec<Receipt>>;

    /// Signing txs are recognised without receipts from here on
    fn is_tip_signing(&self, number: BlockNumber) -> bool;

    /// Sign-credit filtering by epoch position applies from here on
    fn is_tip2019(&self, number: BlockNumber) -> bool;
}

/// Validator-contract state lookups
pub trait StateReader: Send + Sync {
    fn candidate_owner(&self, candidate: &Address) -> Result<Address>;

    fn candidate_cap(&self, candidate: &Address) -> Result<Balance>;

    fn voters(&self, candidate: &Address) -> Result<Vec<Address>>;

    fn voter_cap(&self, candidate: &Address, voter: &Address) -> Result<Balance>;

    /// Signers the block-signer registry recorded for `block`.
    /// Read through [`crate::S2Pos::block_signers`].
    fn signers(&self, block: &Block) -> Result<Vec<Address>>;
}

/// Cache of the signing transactions each block carries
pub trait SigningTxCache: Send + Sync {
    fn cached_signing_txs(&self, hash: &Hash) -> Option<Vec<SignedTransaction>>;

    /// Filter `txs` down to signing transactions and cache them under `hash`
    fn cache_signing_txs(&self, hash: Hash, txs: &[SignedTransaction]) -> Vec<SignedTransaction>;

    /// As [`SigningTxCache::cache_signing_txs`], keeping only txs whose receipt succeeded
    fn cache_non_tip_signing_txs(
        &self,
        header: &Header,
        txs: &[SignedTransaction],
        receipts: &[Receipt],
    ) -> Vec<SignedTransaction>;
}

/// Bounded in-memory [`SigningTxCache`]; least recently used blocks are evicted first
pub struct SigningTxs {
    inner: Arc<Mutex<LruCache<Hash, Vec<SignedTransaction>>>>,
}

impl SigningTxs {
    pub fn new(limit: usize) -> Self {
        let capacity = NonZeroUsize::new(limit).unwrap_or(NonZeroUsize::MIN);
        Self { inner: Arc::new(Mutex::new(LruCache::new(capacity))) }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, hash: Hash, txs: Vec<SignedTransaction>) {
        self.inner.lock().put(hash, txs);
    }
}

impl Default for SigningTxs {
    fn default() -> Self {
        Self::new(BLOCK_SIGNERS_CACHE_LIMIT)
    }
}

impl Clone for SigningTxs {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl SigningTxCache for SigningTxs {
    fn cached_signing_txs(&self, hash: &Hash) -> Option<Vec<SignedTransaction>> {
        self.inner.lock().get(hash).cloned()
    }

    fn cache_signing_txs(&self, hash: Hash, txs: &[SignedTransaction]) -> Vec<SignedTransaction> {
        let signing: Vec<_> = txs
            .iter()
            .filter(|tx| tx.tx.is_signing_transaction())
            .cloned()
            .collect();
        log::trace!("Caching {} signing txs for block {:?}", signing.len(), hash);
        self.insert(hash, signing.clone());
        signing
    }

    fn cache_non_tip_signing_txs(
        &self,
        header: &Header,
        txs: &[SignedTransaction],
        receipts: &[Receipt],
    ) -> Vec<SignedTransaction> {
        let successful: HashSet<Hash> = receipts
            .iter()
            .filter(|receipt| receipt.is_successful())
            .map(|receipt| receipt.tx_hash)
            .collect();
        // a signing tx without a matching receipt counts as failed
        let signing: Vec<_> = txs
            .iter()
            .filter(|tx| tx.tx.is_signing_transaction() && successful.contains(&tx.hash()))
            .cloned()
            .collect();
        let hash = header.hash();
        log::trace!(
            "Caching {} signing txs for pre-TIPSigning block #{} {:?}",
            signing.len(),
            header.number,
            hash
        );
        self.insert(hash, signing.clone());
        signing
    }
}

/// Masternode set recorded in a checkpoint header's extra data
/// (between the vanity prefix and the seal suffix, 20 bytes each)
pub fn masternodes_from_checkpoint_header(header: &Header) -> Vec<Address> {
    if header.extra.len() < EXTRA_VANITY + EXTRA_SEAL {
        return vec![];
    }
    header.extra[EXTRA_VANITY..header.extra.len() - EXTRA_SEAL]
        .chunks_exact(Address::len_bytes())
        .map(Address::from_slice)
        .collect()
}

/// Inverse of [`masternodes_from_checkpoint_header`], used to build checkpoint extra data
pub fn checkpoint_extra(masternodes: &[Address]) -> Vec<u8> {
    let mut extra = vec![0u8; EXTRA_VANITY];
    for masternode in masternodes {
        extra.extend_from_slice(masternode.as_bytes());
    }
    extra.extend_from_slice(&[0u8; EXTRA_SEAL]);
    extra
}
