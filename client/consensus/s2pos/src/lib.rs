//! S2PoS Consensus Support for FRECNET
//!
//! Proof-of-stake bookkeeping that every node must reproduce bit-for-bit:
//! - Commit-reveal randomness (AES-CFB sealed secrets, opening keys)
//! - M2 validator rotation derived from the revealed secrets
//! - Checkpoint signer tally and reward split between masternodes,
//!   voters and the foundation wallet
//! - Per-block sign / secret / opening transaction submission

pub mod chain;
pub mod crypto;
pub mod distribution;
pub mod error;
pub mod lfg;
pub mod reward;
pub mod shuffle;
pub mod store;
pub mod submitter;
pub mod transaction;

#[cfg(test)]
mod mock;

pub use chain::{ChainReader, SigningTxCache, SigningTxs, StateReader, BLOCK_SIGNERS_CACHE_LIMIT};
pub use crypto::{decrypt, decrypt_randomize, encrypt};
pub use distribution::{calculate_reward_for_holders, calculate_reward_for_signer, get_reward_balances_rate, DistributionConfig};
pub use error::{Error, Result};
pub use reward::{get_reward_for_checkpoint, CheckpointSigners, RewardLog};
pub use shuffle::{build_rotation_bytes, decode_rotation_bytes, decode_rotation_hex, generate_rotation_order};
pub use store::RandomizeKeyStore;
pub use submitter::{AccountManager, SigningSubmitter, TransactionPool, Wallet};

use frecnet_primitives::{
    Address, Balance, Block, Header, BLOCK_SIGNERS, EPOCH, EPOCH_BLOCK_OPENING, EPOCH_BLOCK_RANDOMIZE,
    EPOCH_BLOCK_SECRET, RANDOMIZE_SMC,
};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sc_client_api::AuxStore;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Default chain id used when signing consensus transactions
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// S2PoS configuration
#[derive(Clone, Debug)]
pub struct S2posConfig {
    pub chain_id: u64,
    /// Blocks per epoch
    pub epoch: u64,
    /// Distance between reward checkpoints
    pub reward_checkpoint: u64,
    /// First epoch offset at which a secret may be committed
    pub epoch_block_secret: u64,
    /// First epoch offset at which the opening may be revealed
    pub epoch_block_opening: u64,
    /// Last epoch offset at which the opening may be revealed
    pub epoch_block_randomize: u64,
    /// Block-signer registry
    pub block_signers: Address,
    /// Randomize registry
    pub randomize: Address,
    pub foundation: Address,
    /// Blocks whose signing txs are kept in memory
    pub signing_cache_limit: usize,
    pub distribution: DistributionConfig,
}

impl Default for S2posConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            epoch: EPOCH,
            reward_checkpoint: EPOCH,
            epoch_block_secret: EPOCH_BLOCK_SECRET,
            epoch_block_opening: EPOCH_BLOCK_OPENING,
            epoch_block_randomize: EPOCH_BLOCK_RANDOMIZE,
            block_signers: BLOCK_SIGNERS,
            randomize: RANDOMIZE_SMC,
            foundation: Address::zero(),
            signing_cache_limit: BLOCK_SIGNERS_CACHE_LIMIT,
            distribution: DistributionConfig::default(),
        }
    }
}

/// S2PoS engine - owns the signing-tx cache and settles checkpoints
pub struct S2Pos {
    config: S2posConfig,
    signing_txs: SigningTxs,
    /// Held by every submitter built from this engine or its clones
    submit_lock: Arc<Mutex<()>>,
}

impl S2Pos {
    pub fn new(config: S2posConfig) -> Self {
        let signing_txs = SigningTxs::new(config.signing_cache_limit);
        log::info!(
            "🔷 S2PoS initialized: epoch={}, checkpoint={}, secret={}, opening={}, randomize={}",
            config.epoch,
            config.reward_checkpoint,
            config.epoch_block_secret,
            config.epoch_block_opening,
            config.epoch_block_randomize
        );
        Self { config, signing_txs, submit_lock: Arc::new(Mutex::new(())) }
    }

    pub fn config(&self) -> &S2posConfig {
        &self.config
    }

    /// Get signing-tx cache reference
    pub fn signing_txs(&self) -> &SigningTxs {
        &self.signing_txs
    }

    /// Whether rewards are settled at block `number`
    pub fn is_reward_checkpoint(&self, number: u64) -> bool {
        reward::is_reward_checkpoint(number, self.config.reward_checkpoint)
    }

    /// Signer tally for the window behind checkpoint `header`
    pub fn get_reward_for_checkpoint<CR: ChainReader + ?Sized>(
        &self,
        chain: &CR,
        header: &Header,
    ) -> Result<CheckpointSigners> {
        get_reward_for_checkpoint(
            chain,
            &self.signing_txs,
            header,
            self.config.reward_checkpoint,
            self.config.epoch,
        )
    }

    /// Balances to credit at checkpoint `header`, aggregated over every
    /// rewarded signer. Nothing is returned unless every step succeeds.
    pub fn settle_checkpoint<CR, S>(
        &self,
        chain: &CR,
        state: &S,
        header: &Header,
        chain_reward: Balance,
    ) -> Result<BTreeMap<Address, Balance>>
    where
        CR: ChainReader + ?Sized,
        S: StateReader + ?Sized,
    {
        let mut tally = self.get_reward_for_checkpoint(chain, header)?;
        let signer_rewards = calculate_reward_for_signer(chain_reward, &mut tally.signers, tally.total_signers)?;

        let mut balances: BTreeMap<Address, Balance> = BTreeMap::new();
        for (signer, reward) in signer_rewards {
            let holders = calculate_reward_for_holders(
                self.config.foundation,
                state,
                signer,
                reward,
                header.number,
                &self.config.distribution,
            )?;
            for (holder, amount) in holders {
                let entry = balances.entry(holder).or_insert_with(Balance::zero);
                *entry = entry.checked_add(amount).ok_or(Error::Overflow)?;
            }
        }

        log::info!(
            "💰 Settled checkpoint #{}: reward={}, signers={}, holders={}",
            header.number,
            chain_reward,
            tally.signers.len(),
            balances.len()
        );
        Ok(balances)
    }

    /// Signers the block-signer registry recorded for `block`
    pub fn block_signers<S: StateReader + ?Sized>(&self, state: &S, block: &Block) -> Result<Vec<Address>> {
        let signers = state.signers(block)?;
        log::debug!("Signers of block #{} ({:?}): {}", block.number(), block.hash(), signers.len());
        Ok(signers)
    }

    /// M2 payload for the next epoch: rotation order from the revealed
    /// randomize values, in wire form
    pub fn rotation_bytes(&self, randomizes: &[i64], validator_count: i64) -> Vec<u8> {
        build_rotation_bytes(&generate_rotation_order(randomizes, validator_count))
    }

    /// Submitter for the local masternode, with its randomize key kept in `aux`.
    ///
    /// Submitters built here share one submit lock, so several of them over
    /// the same `aux` never commit two secrets in one epoch.
    pub fn submitter<A, P, C>(
        &self,
        accounts: Arc<A>,
        pool: Arc<P>,
        aux: Arc<C>,
    ) -> SigningSubmitter<A, P, C, ChaCha20Rng>
    where
        A: AccountManager,
        P: TransactionPool,
        C: AuxStore,
    {
        SigningSubmitter::new(
            accounts,
            pool,
            RandomizeKeyStore::new(aux),
            self.config.clone(),
            ChaCha20Rng::from_entropy(),
        )
        .with_lock(self.submit_lock.clone())
    }
}

impl Clone for S2Pos {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            signing_txs: self.signing_txs.clone(),
            submit_lock: self.submit_lock.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MemoryAux, MockAccounts, MockChain, MockPool, MockState};
    use frecnet_primitives::{ETHER, HEX_SET_SECRET};

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    fn small_epoch() -> S2posConfig {
        S2posConfig {
            epoch: 10,
            reward_checkpoint: 10,
            foundation: addr(0xf0),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = S2posConfig::default();
        assert_eq!(config.epoch, 900);
        assert_eq!(config.reward_checkpoint, 900);
        assert!(config.epoch_block_secret < config.epoch_block_opening);
        assert!(config.epoch_block_opening <= config.epoch_block_randomize);
        assert_eq!(config.block_signers, BLOCK_SIGNERS);
        assert_eq!(config.signing_cache_limit, 9000);
        assert_eq!(config.distribution.voter_percent, 0);
    }

    #[test]
    fn test_reward_checkpoints() {
        let s2pos = S2Pos::new(S2posConfig::default());
        assert!(!s2pos.is_reward_checkpoint(900));
        assert!(s2pos.is_reward_checkpoint(1800));
        assert!(!s2pos.is_reward_checkpoint(1801));
    }

    #[test]
    fn test_settle_checkpoint() {
        let (a, b) = (addr(1), addr(2));
        let mut chain = MockChain::new(20, 10, &[a, b]);
        chain.add_sign(2, a, 1);
        chain.add_sign(3, a, 2);
        chain.add_sign(2, b, 1);

        let state = MockState::default()
            .with_candidate(a, addr(0xa0), Balance::from(50_000 * ETHER))
            .with_candidate(b, addr(0xb0), Balance::from(20_000 * ETHER));

        let s2pos = S2Pos::new(small_epoch());
        let balances = s2pos
            .settle_checkpoint(&chain, &state, &chain.header_at(20), Balance::from(300u64))
            .unwrap();

        // a: 2 signs -> 200 at 50%, b: 1 sign -> 100 at 40%, foundation 10% of each
        assert_eq!(balances[&a], Balance::from(100u64));
        assert_eq!(balances[&b], Balance::from(40u64));
        assert_eq!(balances[&addr(0xf0)], Balance::from(30u64));
        assert_eq!(balances.len(), 3);
        assert!(!s2pos.signing_txs().is_empty());
    }

    #[test]
    fn test_settle_checkpoint_fails_as_a_whole() {
        let (a, b) = (addr(1), addr(2));
        let mut chain = MockChain::new(20, 10, &[a, b]);
        chain.add_sign(2, a, 1);
        chain.add_sign(2, b, 1);

        let mut state = MockState::default()
            .with_candidate(a, addr(0xa0), Balance::from(50_000 * ETHER))
            .with_candidate(b, addr(0xb0), Balance::from(50_000 * ETHER));
        state.broken.insert(b);

        let s2pos = S2Pos::new(small_epoch());
        let result = s2pos.settle_checkpoint(&chain, &state, &chain.header_at(20), Balance::from(300u64));
        assert!(matches!(result, Err(Error::State { .. })));

        chain.missing_bodies.insert(5);
        let fresh = S2Pos::new(small_epoch());
        let result = fresh.settle_checkpoint(&chain, &MockState::default(), &chain.header_at(20), Balance::from(300u64));
        assert!(matches!(result, Err(Error::MissingBlock { .. })));
    }

    #[test]
    fn test_rotation_bytes() {
        let s2pos = S2Pos::new(S2posConfig::default());
        let bytes = s2pos.rotation_bytes(&[5, 8, 13], 12);
        assert_eq!(decode_rotation_bytes(&bytes), generate_rotation_order(&[26], 12));
    }

    #[test]
    fn test_submitter_signs_blocks() {
        let s2pos = S2Pos::new(S2posConfig::default());
        let pool = Arc::new(MockPool::default());
        let submitter = s2pos.submitter(
            Arc::new(MockAccounts::single(addr(1))),
            pool.clone(),
            Arc::new(MemoryAux::default()),
        );

        submitter.submit(&Block::default(), &addr(1)).unwrap();
        assert_eq!(pool.added.lock().len(), 1);
    }

    #[test]
    fn test_block_signers_reads_registry() {
        let (a, b) = (addr(1), addr(2));
        let chain = MockChain::new(5, 5, &[a, b]);
        let block = chain.blocks[3].clone();
        let mut state = MockState::default();
        state.signed.insert(block.hash(), vec![b, a]);

        let s2pos = S2Pos::new(S2posConfig::default());
        assert_eq!(s2pos.block_signers(&state, &block).unwrap(), vec![b, a]);
        assert!(s2pos.block_signers(&state, &chain.blocks[4]).unwrap().is_empty());
    }

    #[test]
    fn test_submitters_share_submit_lock() {
        let s2pos = S2Pos::new(S2posConfig::default());
        let pool = Arc::new(MockPool::default());
        let aux = Arc::new(MemoryAux::default());
        let first = s2pos.submitter(Arc::new(MockAccounts::single(addr(1))), pool.clone(), aux.clone());
        let second = s2pos.clone().submitter(Arc::new(MockAccounts::single(addr(1))), pool.clone(), aux.clone());

        let secret_block = |number| Block {
            header: Header { number, parent_hash: [number as u8; 32].into(), ..Default::default() },
            transactions: vec![],
        };
        std::thread::scope(|scope| {
            scope.spawn(|| first.submit(&secret_block(805), &addr(1)).unwrap());
            scope.spawn(|| second.submit(&secret_block(806), &addr(1)).unwrap());
        });

        let secrets = pool.added.lock().iter().filter(|tx| tx.data()[..4] == HEX_SET_SECRET).count();
        assert_eq!(secrets, 1);
        assert!(RandomizeKeyStore::new(aux).has().unwrap());
    }
}
