use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::block::Block;
use super::crypto::verify_signature;
use super::transaction::{Transaction, REWARD_PREVIOUS_TX_HASH};

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("A blockchain needs at least a genesis block")]
    EmptyChain,
}

/// Append-only sequence of blocks starting at genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blockchain {
    pub(crate) blocks: Vec<Block>,
}

impl Blockchain {
    /// Creates a new blockchain whose genesis block holds `initial_transaction`
    pub fn new(initial_transaction: Transaction) -> Self {
        let genesis = Block::new(REWARD_PREVIOUS_TX_HASH.to_vec(), vec![initial_transaction]);
        Self::from_genesis(genesis)
    }

    /// Creates a blockchain from an existing genesis block
    pub fn from_genesis(genesis: Block) -> Self {
        Blockchain {
            blocks: vec![genesis],
        }
    }

    /// All blocks, genesis first
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Never true once constructed: genesis is always present
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    /// Gets the last block in the chain
    pub fn get_latest_block(&self) -> &Block {
        // `blocks` is never empty
        &self.blocks[self.blocks.len() - 1]
    }

    pub(crate) fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Iterates over every transaction in chain order
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.blocks.iter().flat_map(|block| block.transactions.iter())
    }

    /// Finds the transaction whose hash is `tx_hash`
    pub fn get_tx_by_hash(&self, tx_hash: &[u8]) -> Option<&Transaction> {
        self.transactions()
            .find(|transaction| transaction.hash().as_slice() == tx_hash)
    }

    /// Finds the transaction that spends the coin `previous_tx_hash`
    pub fn get_tx_by_previous_tx_hash(&self, previous_tx_hash: &[u8]) -> Option<&Transaction> {
        self.transactions()
            .find(|transaction| transaction.previous_tx_hash == previous_tx_hash)
    }

    /// Checks a spending transaction against the coins recorded in this chain
    ///
    /// The transaction must be signed, the coin it spends must exist and be
    /// unspent, and the signature must come from the coin's recipient over
    /// the spending transaction's hash. Anything undecidable counts as invalid.
    pub fn validate_transaction(&self, transaction: &Transaction) -> bool {
        let signature = match &transaction.signature {
            Some(signature) => signature,
            None => {
                debug!("Rejecting unsigned transaction");
                return false;
            }
        };

        let coin = match self.get_tx_by_hash(&transaction.previous_tx_hash) {
            Some(coin) => coin,
            None => {
                debug!(
                    "Rejecting transaction spending unknown coin {}",
                    hex::encode(&transaction.previous_tx_hash)
                );
                return false;
            }
        };

        let coin_hash = coin.hash();
        if self.get_tx_by_previous_tx_hash(&coin_hash).is_some() {
            debug!("Rejecting double spend of coin {}", hex::encode(coin_hash));
            return false;
        }

        let public_key = match coin.recipient.to_public_key() {
            Ok(public_key) => public_key,
            Err(err) => {
                debug!("Coin holder has no usable public key: {}", err);
                return false;
            }
        };

        match verify_signature(&transaction.hash(), signature, &public_key) {
            Ok(valid) => valid,
            Err(err) => {
                debug!("Rejecting malformed signature: {}", err);
                false
            }
        }
    }
}

impl TryFrom<Vec<Block>> for Blockchain {
    type Error = BlockchainError;

    fn try_from(blocks: Vec<Block>) -> Result<Self, Self::Error> {
        if blocks.is_empty() {
            return Err(BlockchainError::EmptyChain);
        }

        Ok(Blockchain { blocks })
    }
}

impl<'de> Deserialize<'de> for Blockchain {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            blocks: Vec<Block>,
        }

        let raw = Raw::deserialize(deserializer)?;
        Blockchain::try_from(raw.blocks).map_err(serde::de::Error::custom)
    }
}
