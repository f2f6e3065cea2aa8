use log::{info, warn};
use thiserror::Error;

use super::block::{Block, BlockError};
use super::chain::Blockchain;
use super::crypto::Address;
use super::pow::{self, Difficulty, MiningError};
use super::transaction::Transaction;
use super::validator::{check_block, ChainError};

/// Errors that can occur while a node extends its chain
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeError {
    #[error("Transaction can't be added: verification failed")]
    TransactionRejected,

    #[error("Block error: {0}")]
    BlockError(#[from] BlockError),

    #[error("Mining error: {0}")]
    MiningError(#[from] MiningError),

    #[error("Block can't be appended: {0}")]
    InvalidBlock(#[from] ChainError),
}

/// A mining node: validates incoming spends and seals them into blocks
///
/// The node is the only writer of its chain. It is not internally
/// synchronized, so callers sharing one node across threads must serialize
/// `add_transaction` calls themselves.
#[derive(Debug, Clone)]
pub struct Node {
    /// Receives the reward coin of every block this node mines
    owner: Address,

    blockchain: Blockchain,

    difficulty: Difficulty,
}

impl Node {
    /// Creates a node whose chain starts from `initial_transaction`
    pub fn new(owner: Address, initial_transaction: Transaction, difficulty: Difficulty) -> Self {
        Node {
            owner,
            blockchain: Blockchain::new(initial_transaction),
            difficulty,
        }
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Checks that `transaction` spends an existing, unspent coin it is authorized to spend
    pub fn validate_transaction(&self, transaction: &Transaction) -> bool {
        self.blockchain.validate_transaction(transaction)
    }

    /// Mines `block` at this node's difficulty
    pub fn generate_nonce(&self, block: Block) -> Result<Block, MiningError> {
        pow::mine(block, self.difficulty)
    }

    /// Validates `transaction`, mines it together with a reward coin, and appends the block
    ///
    /// Nothing is changed when the transaction is rejected.
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<&Block, NodeError> {
        let block = self.prepare_block(transaction)?;
        let block = self.generate_nonce(block)?;
        self.append_block(block)
    }

    /// Builds the unmined block that would carry `transaction` on top of the current tip
    pub fn prepare_block(&self, transaction: Transaction) -> Result<Block, NodeError> {
        if !self.validate_transaction(&transaction) {
            warn!("Rejected transaction {}", hex::encode(transaction.hash()));
            return Err(NodeError::TransactionRejected);
        }

        let reward = Transaction::new_reward(self.owner.clone());
        let prev_block_hash = self.blockchain.get_latest_block().hash()?.to_vec();
        Ok(Block::new(prev_block_hash, vec![transaction, reward]))
    }

    /// Appends a mined block after checking it against the current tip
    ///
    /// A block prepared before the tip moved fails with
    /// [`ChainError::BrokenLink`] and must be prepared and mined again.
    pub fn append_block(&mut self, block: Block) -> Result<&Block, NodeError> {
        let height = self.blockchain.len();
        check_block(&self.blockchain, &block, height, self.difficulty)?;

        info!(
            "Mined block {} at height {} with nonce {}",
            hex::encode(block.hash()?),
            height,
            block.nonce
        );

        self.blockchain.push(block);
        Ok(self.blockchain.get_latest_block())
    }

    /// Gets the node's chain
    pub fn get_state(&self) -> &Blockchain {
        &self.blockchain
    }
}
