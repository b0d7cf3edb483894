//! Checkpoint reward walk - who signed which blocks of the previous epoch
//!
//! `Start -> WalkBack -> TallySigners -> Done`. The walk covers every block
//! from the checkpoint's parent down to the start of the reward window, since
//! a sign tx for a window block can land in any later block. Only blocks
//! inside the window earn credit.

use frecnet_primitives::{Address, Balance, BlockNumber, Hash, Header, MERGE_SIGN_RANGE};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::chain::{masternodes_from_checkpoint_header, ChainReader, SigningTxCache};
use crate::error::{Error, Result};
use crate::transaction::referenced_block_hash;

/// Sign count and (once computed) reward of one signer
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewardLog {
    pub sign: u64,
    pub reward: Balance,
}

/// Tally of one checkpoint
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckpointSigners {
    pub signers: BTreeMap<Address, RewardLog>,
    /// Sum of every credited signature
    pub total_signers: u64,
}

/// Reward window `[start, end]` settled at checkpoint `number`
pub fn reward_window(number: BlockNumber, r_checkpoint: u64) -> Option<(BlockNumber, BlockNumber)> {
    let span = r_checkpoint.checked_mul(2)?;
    if r_checkpoint == 0 || number < span {
        return None;
    }
    let prev_checkpoint = number - span;
    let start = prev_checkpoint + 1;
    Some((start, start + r_checkpoint - 1))
}

/// Rewards are settled on checkpoint blocks once a full window lies behind them
pub fn is_reward_checkpoint(number: BlockNumber, r_checkpoint: u64) -> bool {
    r_checkpoint > 0 && number % r_checkpoint == 0 && number > r_checkpoint
}

/// Whether a window block earns signer credit.
///
/// After TIP2019 only the first `MERGE_SIGN_RANGE` blocks of an epoch and
/// multiples of `MERGE_SIGN_RANGE` count.
pub fn is_sign_eligible<C: ChainReader + ?Sized>(chain: &C, number: BlockNumber, epoch: u64) -> bool {
    number % epoch < MERGE_SIGN_RANGE || number % MERGE_SIGN_RANGE == 0 || !chain.is_tip2019(number)
}

/// Result of the walk-back stage
struct WalkBack {
    hash_by_number: HashMap<BlockNumber, Hash>,
    /// block hash -> senders of sign txs referencing it
    signed: HashMap<Hash, Vec<Address>>,
    masternodes: Vec<Address>,
}

/// Count, per masternode, the window blocks it signed.
///
/// Any missing header, body or receipt list aborts the whole calculation.
pub fn get_reward_for_checkpoint<C, S>(
    chain: &C,
    cache: &S,
    header: &Header,
    r_checkpoint: u64,
    epoch: u64,
) -> Result<CheckpointSigners>
where
    C: ChainReader + ?Sized,
    S: SigningTxCache + ?Sized,
{
    let Some((start, end)) = reward_window(header.number, r_checkpoint) else {
        log::warn!("No reward window behind block #{} (checkpoint {})", header.number, r_checkpoint);
        return Ok(CheckpointSigners::default());
    };

    let walk = walk_back(chain, cache, header, start)?;
    let tally = tally_signers(chain, &walk, start, end, epoch.max(1));

    log::info!(
        "💰 Calculate reward at checkpoint #{}: startBlock={}, endBlock={}, signers={}, totalSigner={}",
        header.number,
        start,
        end,
        tally.signers.len(),
        tally.total_signers
    );
    Ok(tally)
}

fn walk_back<C, S>(chain: &C, cache: &S, header: &Header, start: BlockNumber) -> Result<WalkBack>
where
    C: ChainReader + ?Sized,
    S: SigningTxCache + ?Sized,
{
    let mut hash_by_number = HashMap::new();
    let mut signed: HashMap<Hash, Vec<Address>> = HashMap::new();
    let mut current = header.clone();

    for number in (start..header.number).rev() {
        current = chain
            .header(&current.parent_hash, number)
            .ok_or(Error::MissingHeader { number, parent_hash: current.parent_hash })?;
        let hash = current.hash();
        hash_by_number.insert(number, hash);

        let txs = match cache.cached_signing_txs(&hash) {
            Some(txs) => txs,
            None => {
                log::debug!("Failed get from cached: hash={:?}, number={}", hash, number);
                let block = chain
                    .block(&hash, number)
                    .ok_or(Error::MissingBlock { number, hash })?;
                if chain.is_tip_signing(number) {
                    cache.cache_signing_txs(hash, &block.transactions)
                } else {
                    let receipts = chain
                        .block_receipts(&hash, number)
                        .ok_or(Error::MissingReceipts { number, hash })?;
                    cache.cache_non_tip_signing_txs(&current, &block.transactions, &receipts)
                }
            }
        };

        for tx in &txs {
            if let Some(block_hash) = referenced_block_hash(tx.data()) {
                signed.entry(block_hash).or_default().push(tx.from);
            }
        }
    }

    let prev_checkpoint = start - 1;
    let checkpoint = chain
        .header(&current.parent_hash, prev_checkpoint)
        .ok_or(Error::MissingHeader { number: prev_checkpoint, parent_hash: current.parent_hash })?;

    Ok(WalkBack {
        hash_by_number,
        signed,
        masternodes: masternodes_from_checkpoint_header(&checkpoint),
    })
}

fn tally_signers<C: ChainReader + ?Sized>(
    chain: &C,
    walk: &WalkBack,
    start: BlockNumber,
    end: BlockNumber,
    epoch: u64,
) -> CheckpointSigners {
    let mut tally = CheckpointSigners::default();

    for number in start..=end {
        if !is_sign_eligible(chain, number, epoch) {
            continue;
        }
        let Some(addrs) = walk.hash_by_number.get(&number).and_then(|h| walk.signed.get(h)) else {
            continue;
        };

        // one credit per masternode per block, however many sign txs it sent
        let credited: BTreeSet<Address> = walk
            .masternodes
            .iter()
            .filter(|m| addrs.contains(m))
            .copied()
            .collect();

        for addr in credited {
            tally.signers.entry(addr).or_default().sign += 1;
            tally.total_signers += 1;
        }
    }

    tally
}
