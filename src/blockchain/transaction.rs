use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::crypto::{hash, Address, DigitalSignature, KeyPair, HASH_LEN};

/// Predecessor marker carried by coin-creation (reward) transactions
pub const REWARD_PREVIOUS_TX_HASH: &[u8] = &[0x00];

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Transaction already signed")]
    AlreadySigned,

    #[error("Reward transactions are never signed")]
    RewardNotSignable,
}

/// Transfer of a single coin to a new holder
///
/// A coin is identified by the hash of the transaction that created it.
/// Spending it means publishing a transaction whose `previous_tx_hash` points
/// at that coin, signed by the coin's current `recipient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Who may spend this coin next
    pub recipient: Address,

    /// Hash of the transaction being spent
    #[serde(with = "hex::serde")]
    #[schema(value_type = String, example = "00")]
    pub previous_tx_hash: Vec<u8>,

    /// Signature of the previous holder over `hash()`
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<DigitalSignature>,
}

impl Transaction {
    /// Creates a new unsigned transaction spending `previous_tx_hash`
    pub fn new(recipient: Address, previous_tx_hash: Vec<u8>) -> Self {
        Transaction {
            recipient,
            previous_tx_hash,
            signature: None,
        }
    }

    /// Creates a coin-creation transaction paying `recipient`
    pub fn new_reward(recipient: Address) -> Self {
        Self::new(recipient, REWARD_PREVIOUS_TX_HASH.to_vec())
    }

    /// Content hash of the transaction; the signature is not covered
    ///
    /// Rewards paid to the same recipient therefore share one hash and are
    /// the same coin.
    pub fn hash(&self) -> [u8; HASH_LEN] {
        let recipient = self.recipient.as_bytes();
        let mut data = Vec::with_capacity(recipient.len() + self.previous_tx_hash.len());
        data.extend_from_slice(recipient);
        data.extend_from_slice(&self.previous_tx_hash);
        hash(&data)
    }

    /// Signs the transaction hash with the key of the coin's current holder
    pub fn sign(&mut self, key_pair: &KeyPair) -> Result<(), TransactionError> {
        if self.is_reward() {
            return Err(TransactionError::RewardNotSignable);
        }

        if self.signature.is_some() {
            return Err(TransactionError::AlreadySigned);
        }

        self.signature = Some(key_pair.sign(&self.hash()));

        Ok(())
    }

    /// Checks if the transaction creates a new coin
    pub fn is_reward(&self) -> bool {
        self.previous_tx_hash == REWARD_PREVIOUS_TX_HASH
    }
}
