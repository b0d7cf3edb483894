//! Raw transactions for the block-signer and randomize registries

use frecnet_primitives::{
    left_pad_bytes, Address, Balance, BlockNumber, Hash, Nonce, Transaction, HEX_SET_OPENING,
    HEX_SET_SECRET, HEX_SIGN_METHOD, SIGNING_TX_GAS,
};
use rand::{CryptoRng, Rng, RngCore};

use crate::crypto;
use crate::error::{Error, Result};

/// Byte size of one element in the `setSecret` array
const SECRET_WORD_SIZE: u64 = 32;

fn word(value: u64) -> [u8; 32] {
    let mut w = [0u8; 32];
    w[24..].copy_from_slice(&value.to_be_bytes());
    w
}

fn registry_call(nonce: Nonce, to: Address, data: Vec<u8>) -> Transaction {
    Transaction::new(nonce, to, Balance::zero(), SIGNING_TX_GAS, Balance::zero(), data)
}

/// `sign(number, hash)` on the block-signer registry
pub fn build_sign_transaction(
    block_number: BlockNumber,
    block_hash: Hash,
    nonce: Nonce,
    block_signer: Address,
) -> Transaction {
    let mut data = Vec::with_capacity(4 + 64);
    data.extend_from_slice(&HEX_SIGN_METHOD);
    data.extend_from_slice(&word(block_number));
    data.extend_from_slice(block_hash.as_bytes());
    registry_call(nonce, block_signer, data)
}

/// Block hash a signing transaction commits to (its trailing 32 bytes)
pub fn referenced_block_hash(data: &[u8]) -> Option<Hash> {
    if data.len() < 32 {
        return None;
    }
    Some(Hash::from_slice(&data[data.len() - 32..]))
}

/// `setSecret([enc(secret)])` on the randomize registry.
///
/// The secret is drawn from `[0, epoch)` and sealed under `randomize_key`.
pub fn build_secret_transaction<R: RngCore + CryptoRng>(
    rng: &mut R,
    nonce: Nonce,
    randomize: Address,
    epoch: u64,
    randomize_key: &[u8],
) -> Result<Transaction> {
    let secrets = [rng.gen_range(0..epoch.max(1))];

    let mut data = Vec::with_capacity(4 + 64 + secrets.len() * SECRET_WORD_SIZE as usize);
    data.extend_from_slice(&HEX_SET_SECRET);
    data.extend_from_slice(&word(SECRET_WORD_SIZE));
    data.extend_from_slice(&word(secrets.len() as u64));
    for secret in secrets {
        let sealed = crypto::encrypt_with_rng(rng, randomize_key, &secret.to_string());
        if sealed.is_empty() {
            return Err(Error::Encrypt);
        }
        data.extend(left_pad_bytes(sealed.as_bytes(), SECRET_WORD_SIZE as usize));
    }

    Ok(registry_call(nonce, randomize, data))
}

/// `setOpening(key)` on the randomize registry
pub fn build_opening_transaction(nonce: Nonce, randomize: Address, randomize_key: &[u8]) -> Transaction {
    let mut data = Vec::with_capacity(4 + randomize_key.len());
    data.extend_from_slice(&HEX_SET_OPENING);
    data.extend_from_slice(randomize_key);
    registry_call(nonce, randomize, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use frecnet_primitives::{BLOCK_SIGNERS, EPOCH, RANDOMIZE_SMC};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    const KEY: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyzABCDEF";

    #[test]
    fn test_sign_transaction_layout() {
        let hash = Hash::repeat_byte(0xab);
        let tx = build_sign_transaction(0x0102, hash, 9, BLOCK_SIGNERS);

        assert_eq!(tx.nonce, 9);
        assert_eq!(tx.to, Some(BLOCK_SIGNERS));
        assert_eq!(tx.value, Balance::zero());
        assert_eq!(tx.gas, SIGNING_TX_GAS);
        assert_eq!(tx.data.len(), 68);
        assert_eq!(tx.data[..4], HEX_SIGN_METHOD);
        assert!(tx.data[4..34].iter().all(|b| *b == 0));
        assert_eq!(tx.data[34..36], [0x01, 0x02]);
        assert_eq!(referenced_block_hash(&tx.data), Some(hash));
        assert!(tx.is_signing_transaction());
    }

    #[test]
    fn test_referenced_block_hash_short_payload() {
        assert_eq!(referenced_block_hash(&[1, 2, 3]), None);
    }

    #[test]
    fn test_secret_transaction_layout() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let tx = build_secret_transaction(&mut rng, 3, RANDOMIZE_SMC, EPOCH, KEY).unwrap();

        assert_eq!(tx.to, Some(RANDOMIZE_SMC));
        assert_eq!(tx.gas, SIGNING_TX_GAS);
        assert_eq!(tx.data.len(), 4 + 32 * 3);
        assert_eq!(tx.data[..4], HEX_SET_SECRET);
        assert_eq!(tx.data[4..36], word(32));
        assert_eq!(tx.data[36..68], word(1));

        let mut secret = [0u8; 32];
        secret.copy_from_slice(&tx.data[68..100]);
        let revealed = crypto::decrypt_randomize(&[secret], KEY);
        assert!((0..EPOCH as i64).contains(&revealed));
    }

    #[test]
    fn test_secret_transaction_invalid_key() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let result = build_secret_transaction(&mut rng, 3, RANDOMIZE_SMC, EPOCH, b"bad");
        assert!(matches!(result, Err(Error::Encrypt)));
    }

    #[test]
    fn test_opening_transaction_layout() {
        let tx = build_opening_transaction(4, RANDOMIZE_SMC, KEY);
        assert_eq!(tx.nonce, 4);
        assert_eq!(tx.to, Some(RANDOMIZE_SMC));
        assert_eq!(tx.data[..4], HEX_SET_OPENING);
        assert_eq!(&tx.data[4..], &KEY[..]);
    }
}
