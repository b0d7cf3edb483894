//! Reward distribution - signer shares and the per-masternode holder split

use frecnet_primitives::{
    Address, Balance, BlockNumber, FULL_MASTERNODE_CAP, REWARD_FOUNDATION_PERCENT,
    REWARD_MASTER_PERCENT, REWARD_SYNC_PERCENT, REWARD_VOTER_PERCENT, TIP2019_BLOCK,
};
use std::collections::BTreeMap;

use crate::chain::StateReader;
use crate::error::{Error, Result};
use crate::reward::RewardLog;

/// Reward tiers and fork switches used when splitting a masternode's reward
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistributionConfig {
    /// Share of a fully staked masternode
    pub master_percent: u64,
    /// Share of any other masternode
    pub sync_percent: u64,
    pub voter_percent: u64,
    pub foundation_percent: u64,
    /// Stake that qualifies for `master_percent`
    pub full_cap: Balance,
    /// Duplicate voter entries are ignored from this block on
    pub tip2019_block: BlockNumber,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            master_percent: REWARD_MASTER_PERCENT,
            sync_percent: REWARD_SYNC_PERCENT,
            voter_percent: REWARD_VOTER_PERCENT,
            foundation_percent: REWARD_FOUNDATION_PERCENT,
            full_cap: Balance::from(FULL_MASTERNODE_CAP),
            tip2019_block: TIP2019_BLOCK,
        }
    }
}

fn percent_of(total: Balance, percent: u64) -> Result<Balance> {
    total
        .checked_mul(Balance::from(percent))
        .map(|v| v / 100)
        .ok_or(Error::Overflow)
}

/// Split `chain_reward` evenly per signature: `(chain_reward / total) * sign`.
///
/// Each `RewardLog.reward` is filled in as a side effect. The truncation
/// remainder is not distributed.
pub fn calculate_reward_for_signer(
    chain_reward: Balance,
    signers: &mut BTreeMap<Address, RewardLog>,
    total_signers: u64,
) -> Result<BTreeMap<Address, Balance>> {
    let mut rewards = BTreeMap::new();
    if total_signers > 0 {
        let per_sign = chain_reward / Balance::from(total_signers);
        for (signer, log) in signers.iter_mut() {
            let reward = per_sign
                .checked_mul(Balance::from(log.sign))
                .ok_or(Error::Overflow)?;
            log.reward = reward;
            rewards.insert(*signer, reward);
        }
    }
    log::info!(
        "Signers data: signers={}, totalSigner={}, totalReward={}",
        signers.len(),
        total_signers,
        chain_reward
    );
    Ok(rewards)
}

/// Split one masternode's reward between the masternode, its voters and the
/// foundation wallet.
pub fn get_reward_balances_rate<S: StateReader + ?Sized>(
    foundation: Address,
    state: &S,
    masternode: Address,
    total_reward: Balance,
    block_number: BlockNumber,
    config: &DistributionConfig,
) -> Result<BTreeMap<Address, Balance>> {
    let owner = state.candidate_owner(&masternode)?;
    let stake_cap = state.candidate_cap(&masternode)?;
    log::debug!(
        "Reward split for masternode {:?}: owner={:?}, cap={}",
        masternode,
        owner,
        stake_cap
    );

    let percent = if stake_cap == config.full_cap {
        config.master_percent
    } else {
        config.sync_percent
    };

    let mut balances = BTreeMap::new();
    balances.insert(masternode, percent_of(total_reward, percent)?);

    let voters = state.voters(&masternode)?;
    if !voters.is_empty() {
        let voter_reward = percent_of(total_reward, config.voter_percent)?;
        let mut voter_caps: BTreeMap<Address, Balance> = BTreeMap::new();
        let mut total_cap = Balance::zero();

        for voter in voters {
            if voter_caps.contains_key(&voter) && config.tip2019_block <= block_number {
                continue;
            }
            let cap = state.voter_cap(&masternode, &voter)?;
            // before TIP2019 a duplicate entry counts towards the total again
            total_cap = total_cap.checked_add(cap).ok_or(Error::Overflow)?;
            voter_caps.insert(voter, cap);
        }

        if !total_cap.is_zero() {
            for (voter, cap) in voter_caps {
                if cap.is_zero() {
                    continue;
                }
                let share = voter_reward.checked_mul(cap).ok_or(Error::Overflow)? / total_cap;
                let entry = balances.entry(voter).or_insert_with(Balance::zero);
                *entry = entry.checked_add(share).ok_or(Error::Overflow)?;
            }
        }
    }

    balances.insert(foundation, percent_of(total_reward, config.foundation_percent)?);

    log::trace!("Holders reward for masternode {:?}: {:?}", masternode, balances);
    Ok(balances)
}

/// Holder balances for one rewarded signer
pub fn calculate_reward_for_holders<S: StateReader + ?Sized>(
    foundation: Address,
    state: &S,
    signer: Address,
    reward: Balance,
    block_number: BlockNumber,
    config: &DistributionConfig,
) -> Result<BTreeMap<Address, Balance>> {
    get_reward_balances_rate(foundation, state, signer, reward, block_number, config)
}
