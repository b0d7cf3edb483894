//! Signing submitter - per-block sign tx plus the commit-reveal randomize txs
//!
//! Every imported block is signed through the block-signer registry. Inside
//! the secret window of an epoch the node commits an encrypted secret, and
//! inside the opening window it reveals the key. The whole sequence runs under
//! one lock so account nonces never interleave.

use frecnet_primitives::{Address, Block, Nonce, SignedTransaction, Transaction};
use parking_lot::Mutex;
use rand::{CryptoRng, RngCore};
use sc_client_api::AuxStore;
use std::sync::Arc;

use crate::crypto::{random_key, RANDOMIZE_KEY_LENGTH};
use crate::error::{Error, Result};
use crate::store::RandomizeKeyStore;
use crate::transaction::{build_opening_transaction, build_secret_transaction, build_sign_transaction};
use crate::S2posConfig;

/// Attempts at getting the sign tx into the pool
pub const SIGN_RETRY_LIMIT: u32 = 10;

/// A keystore-backed wallet
pub trait Wallet: Send + Sync {
    fn accounts(&self) -> Vec<Address>;

    fn sign_tx(
        &self,
        account: &Address,
        tx: Transaction,
        chain_id: u64,
    ) -> std::result::Result<SignedTransaction, String>;
}

pub trait AccountManager: Send + Sync {
    /// Wallet holding `account`
    fn find(&self, account: &Address) -> Option<Arc<dyn Wallet>>;

    fn wallets(&self) -> Vec<Arc<dyn Wallet>>;
}

pub trait TransactionPool: Send + Sync {
    /// Next nonce for `address` as seen by the pool
    fn nonce(&self, address: &Address) -> Nonce;

    fn add_local(&self, tx: SignedTransaction) -> std::result::Result<(), String>;
}

/// Submits sign, secret and opening transactions for the local masternode
pub struct SigningSubmitter<A, P, C, R> {
    accounts: Arc<A>,
    pool: Arc<P>,
    keys: RandomizeKeyStore<C>,
    config: S2posConfig,
    /// Guards the whole submit sequence. Submitters sharing a key store must share it too.
    lock: Arc<Mutex<()>>,
    rng: Mutex<R>,
}

impl<A, P, C, R> SigningSubmitter<A, P, C, R>
where
    A: AccountManager,
    P: TransactionPool,
    C: AuxStore,
    R: RngCore + CryptoRng,
{
    pub fn new(accounts: Arc<A>, pool: Arc<P>, keys: RandomizeKeyStore<C>, config: S2posConfig, rng: R) -> Self {
        Self {
            accounts,
            pool,
            keys,
            config,
            lock: Arc::new(Mutex::new(())),
            rng: Mutex::new(rng),
        }
    }

    /// Serialize with every other submitter holding `lock`
    pub fn with_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.lock = lock;
        self
    }

    /// Sign `block` and, depending on its epoch position, commit or reveal
    /// the randomize secret.
    pub fn submit(&self, block: &Block, etherbase: &Address) -> Result<()> {
        let _guard = self.lock.lock();
        let mut rng = self.rng.lock();

        let (wallet, account) = self.resolve_account(etherbase)?;
        self.submit_sign(&*wallet, &account, block)?;

        let number = block.number();
        let Some(check) = number.checked_rem(self.config.epoch) else {
            return Ok(());
        };
        let has_key = self.keys.has()?;

        if !has_key && self.in_secret_window(check) {
            self.commit_secret(&mut *rng, &*wallet, &account, block)?;
        } else if has_key && self.in_opening_window(check) {
            self.reveal_opening(&*wallet, &account, block)?;
        }
        Ok(())
    }

    fn in_secret_window(&self, check: u64) -> bool {
        check > 0 && self.config.epoch_block_secret <= check && check < self.config.epoch_block_opening
    }

    fn in_opening_window(&self, check: u64) -> bool {
        check > 0 && self.config.epoch_block_opening <= check && check <= self.config.epoch_block_randomize
    }

    /// The etherbase account if a wallet holds it, else the first account of the first wallet
    fn resolve_account(&self, etherbase: &Address) -> Result<(Arc<dyn Wallet>, Address)> {
        let wallets = self.accounts.wallets();
        let Some(first) = wallets.first() else {
            log::error!("No wallet to sign block with");
            return Err(Error::NoWallet);
        };
        if let Some(wallet) = self.accounts.find(etherbase) {
            return Ok((wallet, *etherbase));
        }
        let account = first.accounts().first().copied().ok_or(Error::NoWallet)?;
        log::debug!("Etherbase {:?} not in keystore, signing with {:?}", etherbase, account);
        Ok((first.clone(), account))
    }

    fn sign(&self, wallet: &dyn Wallet, account: &Address, tx: Transaction) -> Result<SignedTransaction> {
        wallet
            .sign_tx(account, tx, self.config.chain_id)
            .map_err(|reason| Error::Wallet { account: *account, reason })
    }

    fn submit_sign(&self, wallet: &dyn Wallet, account: &Address, block: &Block) -> Result<()> {
        let number = block.number();
        let hash = block.hash();
        let mut nonce = self.pool.nonce(account);

        for attempt in 1..=SIGN_RETRY_LIMIT {
            let tx = build_sign_transaction(number, hash, nonce, self.config.block_signers);
            let signed = self.sign(wallet, account, tx).map_err(|e| {
                log::error!("Fail to create tx sign: {}", e);
                e
            })?;

            let reason = match self.pool.add_local(signed) {
                Ok(()) => return Ok(()),
                Err(reason) => reason,
            };

            let new_nonce = self.pool.nonce(account);
            if attempt == SIGN_RETRY_LIMIT {
                log::error!(
                    "Fail to add signed tx to local pool: number={}, hash={:?}, from={:?}, nonce={}, error={}",
                    number,
                    hash,
                    account,
                    nonce,
                    reason
                );
                return Err(Error::Pool { from: *account, nonce, reason });
            }
            log::warn!(
                "Retry tx sign #{}: from={:?}, nonce={}, newNonce={}, retry={}, error={}",
                number,
                account,
                nonce,
                new_nonce,
                attempt,
                reason
            );
            nonce = new_nonce;
        }
        Ok(())
    }

    fn commit_secret(&self, rng: &mut R, wallet: &dyn Wallet, account: &Address, block: &Block) -> Result<()> {
        let key = random_key(rng, RANDOMIZE_KEY_LENGTH);
        let nonce = self.pool.nonce(account);
        let tx = build_secret_transaction(rng, nonce, self.config.randomize, self.config.epoch, &key)?;
        let signed = self.sign(wallet, account, tx)?;

        self.pool.add_local(signed).map_err(|reason| {
            log::error!(
                "Fail to add tx secret to local pool: number={}, hash={:?}, from={:?}, nonce={}, error={}",
                block.number(),
                block.hash(),
                account,
                nonce,
                reason
            );
            Error::Pool { from: *account, nonce, reason }
        })?;

        self.keys.put(&key)?;
        log::info!("🎲 Committed randomize secret at block #{} (nonce {})", block.number(), nonce);
        Ok(())
    }

    fn reveal_opening(&self, wallet: &dyn Wallet, account: &Address, block: &Block) -> Result<()> {
        let key = self.keys.get()?;
        let nonce = self.pool.nonce(account);
        let tx = build_opening_transaction(nonce, self.config.randomize, &key);
        let signed = self.sign(wallet, account, tx)?;

        self.pool.add_local(signed).map_err(|reason| {
            log::error!(
                "Fail to add tx opening to local pool: number={}, hash={:?}, from={:?}, nonce={}, error={}",
                block.number(),
                block.hash(),
                account,
                nonce,
                reason
            );
            Error::Pool { from: *account, nonce, reason }
        })?;

        self.keys.delete()?;
        log::info!("🎲 Revealed randomize opening at block #{} (nonce {})", block.number(), nonce);
        Ok(())
    }
}
