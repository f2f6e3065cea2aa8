use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::crypto::{hash, HASH_LEN};
use super::transaction::Transaction;

/// Width in bytes of the big-endian integers fed into the block hash
const INT_FIELD_WIDTH: usize = 32;

/// Errors that can occur while hashing a block
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("Timestamp {0} does not fit an unsigned 256-bit field")]
    NegativeTimestamp(i64),
}

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Hash of the previous block
    #[serde(with = "hex::serde")]
    #[schema(value_type = String)]
    pub prev_block_hash: Vec<u8>,

    /// Creation time in seconds since the Unix epoch
    pub timestamp: i64,

    /// Proof of work
    pub nonce: u64,

    /// List of transactions included in this block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a new block stamped with the current time and nonce 0
    pub fn new(prev_block_hash: Vec<u8>, transactions: Vec<Transaction>) -> Self {
        Self::with_timestamp(prev_block_hash, transactions, Utc::now().timestamp())
    }

    /// Creates a new block with an explicit timestamp
    pub fn with_timestamp(
        prev_block_hash: Vec<u8>,
        transactions: Vec<Transaction>,
        timestamp: i64,
    ) -> Self {
        Block {
            prev_block_hash,
            timestamp,
            nonce: 0,
            transactions,
        }
    }

    /// Calculates the hash of the block from its current fields
    ///
    /// Transaction hashes are folded into a running digest in block order,
    /// then `prev_block_hash || timestamp || nonce || tx_digest` is hashed
    /// with both integers encoded as 32-byte big-endian values. Nothing is
    /// cached, so changing the nonce changes the result.
    pub fn hash(&self) -> Result<[u8; HASH_LEN], BlockError> {
        let timestamp = u64::try_from(self.timestamp)
            .map_err(|_| BlockError::NegativeTimestamp(self.timestamp))?;

        let capacity = self.prev_block_hash.len() + 2 * INT_FIELD_WIDTH + HASH_LEN;
        let mut data = Vec::with_capacity(capacity);
        data.extend_from_slice(&self.prev_block_hash);
        data.extend_from_slice(&encode_u256(timestamp));
        data.extend_from_slice(&encode_u256(self.nonce));
        data.extend_from_slice(&self.transactions_hash());

        Ok(hash(&data))
    }

    /// Order-sensitive digest over every transaction hash in the block
    fn transactions_hash(&self) -> Vec<u8> {
        self.transactions
            .iter()
            .fold(vec![0x00], |acc, transaction| {
                let mut data = acc;
                data.extend_from_slice(&transaction.hash());
                hash(&data).to_vec()
            })
    }
}

/// Left-pads `value` to a 32-byte big-endian unsigned integer
fn encode_u256(value: u64) -> [u8; INT_FIELD_WIDTH] {
    let mut out = [0u8; INT_FIELD_WIDTH];
    out[INT_FIELD_WIDTH - 8..].copy_from_slice(&value.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::KeyPair;

    fn sample_transactions() -> Vec<Transaction> {
        vec![
            Transaction::new_reward(KeyPair::generate().address().clone()),
            Transaction::new_reward(KeyPair::generate().address().clone()),
        ]
    }

    #[test]
    fn test_new_block() {
        let block = Block::new(vec![0xab; 32], sample_transactions());

        assert_eq!(block.nonce, 0);
        assert_eq!(block.prev_block_hash, vec![0xab; 32]);
        assert_eq!(block.transactions.len(), 2);
        assert!(block.timestamp > 0);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let block = Block::with_timestamp(vec![1; 32], sample_transactions(), 1_700_000_000);

        assert_eq!(block.hash().unwrap(), block.hash().unwrap());
        assert_eq!(block.clone().hash().unwrap(), block.hash().unwrap());
    }

    #[test]
    fn test_hash_follows_nonce() {
        let mut block = Block::with_timestamp(vec![1; 32], sample_transactions(), 1_700_000_000);
        let before = block.hash().unwrap();

        block.nonce += 1;
        assert_ne!(block.hash().unwrap(), before);

        block.nonce -= 1;
        assert_eq!(block.hash().unwrap(), before);
    }

    #[test]
    fn test_hash_depends_on_transaction_order() {
        let transactions = sample_transactions();
        let mut reversed = transactions.clone();
        reversed.reverse();

        let block = Block::with_timestamp(vec![1; 32], transactions, 1_700_000_000);
        let swapped = Block::with_timestamp(vec![1; 32], reversed, 1_700_000_000);

        assert_ne!(block.hash().unwrap(), swapped.hash().unwrap());
    }

    #[test]
    fn test_hash_layout() {
        let block = Block::with_timestamp(vec![0x00], Vec::new(), 5);

        let mut expected = vec![0x00];
        expected.extend_from_slice(&[0u8; 31]);
        expected.push(5);
        expected.extend_from_slice(&[0u8; 32]);
        expected.push(0x00);

        assert_eq!(block.hash().unwrap(), hash(&expected));
    }

    #[test]
    fn test_negative_timestamp_fails_fast() {
        let block = Block::with_timestamp(vec![0x00], Vec::new(), -1);

        assert_eq!(block.hash(), Err(BlockError::NegativeTimestamp(-1)));
    }

    #[test]
    fn test_encode_u256() {
        let encoded = encode_u256(0x0102);
        assert!(encoded[..30].iter().all(|byte| *byte == 0));
        assert_eq!(&encoded[30..], &[0x01, 0x02]);
    }
}
