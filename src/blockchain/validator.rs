//! Full-chain replay validation.
//!
//! A candidate chain is replayed from its genesis block into a fresh
//! `Blockchain` that only ever holds blocks already accepted. Every rule is
//! checked against that trusted prefix, never against the candidate's own
//! links, and the first violation ends the replay.

use log::warn;
use thiserror::Error;

use super::block::{Block, BlockError};
use super::chain::Blockchain;
use super::pow::Difficulty;

/// The first rule a candidate chain breaks
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Genesis block must hold exactly one transaction, found {0}")]
    InvalidGenesis(usize),

    #[error("Block {height}: previous hash does not match the accepted tip")]
    BrokenLink { height: usize },

    #[error("Block {height}: timestamp {timestamp} is earlier than its predecessor's {previous}")]
    TimestampRegression {
        height: usize,
        timestamp: i64,
        previous: i64,
    },

    #[error("Block {height}: hash does not meet the difficulty target")]
    InsufficientWork { height: usize },

    #[error("Block {height}: more than one reward transaction")]
    ExtraReward { height: usize },

    #[error("Block {height}: transaction {index} is not a valid spend")]
    InvalidTransaction { height: usize, index: usize },

    #[error("Block {height}: {source}")]
    MalformedBlock {
        height: usize,
        #[source]
        source: BlockError,
    },
}

/// Returns true iff `chain` is valid from genesis at `difficulty`
pub fn validate_chain(chain: &Blockchain, difficulty: Difficulty) -> bool {
    match check_chain(chain, difficulty) {
        Ok(()) => true,
        Err(err) => {
            warn!("Chain rejected: {}", err);
            false
        }
    }
}

/// Replays `chain` and reports the first rule it breaks
pub fn check_chain(chain: &Blockchain, difficulty: Difficulty) -> Result<(), ChainError> {
    let genesis = chain.genesis();
    if genesis.transactions.len() != 1 {
        return Err(ChainError::InvalidGenesis(genesis.transactions.len()));
    }

    let mut accepted = Blockchain::from_genesis(genesis.clone());
    for (height, block) in chain.blocks().iter().enumerate().skip(1) {
        check_block(&accepted, block, height, difficulty)?;
        accepted.push(block.clone());
    }

    Ok(())
}

/// Checks one block against the prefix accepted so far
///
/// Spends are checked against `accepted` only, not against earlier
/// transactions of the same block, so a block spending one coin twice passes.
pub(crate) fn check_block(
    accepted: &Blockchain,
    block: &Block,
    height: usize,
    difficulty: Difficulty,
) -> Result<(), ChainError> {
    let malformed = |source| ChainError::MalformedBlock { height, source };
    let tip = accepted.get_latest_block();

    if block.prev_block_hash != tip.hash().map_err(malformed)? {
        return Err(ChainError::BrokenLink { height });
    }

    if block.timestamp < tip.timestamp {
        return Err(ChainError::TimestampRegression {
            height,
            timestamp: block.timestamp,
            previous: tip.timestamp,
        });
    }

    if !difficulty.is_met_by(&block.hash().map_err(malformed)?) {
        return Err(ChainError::InsufficientWork { height });
    }

    let mut reward_seen = false;
    for (index, transaction) in block.transactions.iter().enumerate() {
        if transaction.is_reward() {
            if reward_seen {
                return Err(ChainError::ExtraReward { height });
            }
            reward_seen = true;
            continue;
        }

        if !accepted.validate_transaction(transaction) {
            return Err(ChainError::InvalidTransaction { height, index });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::{Address, KeyPair};
    use crate::blockchain::node::{Node, NodeError};
    use crate::blockchain::pow;
    use crate::blockchain::transaction::Transaction;

    const TEST_DIFFICULTY: Difficulty = Difficulty::new(8);

    fn spend(coin: &Transaction, holder: &KeyPair, recipient: &Address) -> Transaction {
        let mut transaction = Transaction::new(recipient.clone(), coin.hash().to_vec());
        transaction.sign(holder).unwrap();
        transaction
    }

    /// Genesis plus two mined blocks; returns the chain and the node owner
    fn three_block_chain() -> (Blockchain, KeyPair) {
        let owner = KeyPair::generate();
        let holder = KeyPair::generate();
        let second = KeyPair::generate();
        let genesis_tx = Transaction::new_reward(holder.address().clone());
        let mut node = Node::new(owner.address().clone(), genesis_tx.clone(), TEST_DIFFICULTY);

        let first_spend = spend(&genesis_tx, &holder, second.address());
        node.add_transaction(first_spend.clone()).unwrap();
        node.add_transaction(spend(&first_spend, &second, holder.address()))
            .unwrap();

        (node.get_state().clone(), owner)
    }

    /// Re-mines every block from `from` onwards so links and work are consistent again
    fn reseal(chain: &mut Blockchain, from: usize) {
        for height in from..chain.len() {
            let prev = chain.blocks[height - 1].hash().unwrap().to_vec();
            let mut block = chain.blocks[height].clone();
            block.prev_block_hash = prev;
            block.nonce = 0;
            chain.blocks[height] = pow::mine(block, TEST_DIFFICULTY).unwrap();
        }
    }

    #[test]
    fn test_valid_chain() {
        let (chain, _) = three_block_chain();

        assert_eq!(chain.len(), 3);
        assert!(validate_chain(&chain, TEST_DIFFICULTY));
        assert_eq!(check_chain(&chain, TEST_DIFFICULTY), Ok(()));
    }

    #[test]
    fn test_end_to_end_payment() {
        let owner = KeyPair::generate();
        let holder = KeyPair::generate();
        let genesis_tx = Transaction::new_reward(holder.address().clone());
        let mut node = Node::new(owner.address().clone(), genesis_tx.clone(), TEST_DIFFICULTY);

        let payment = spend(&genesis_tx, &holder, KeyPair::generate().address());
        let block = node.add_transaction(payment.clone()).unwrap();
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0], payment);
        assert_eq!(&block.transactions[1].recipient, owner.address());

        assert!(validate_chain(node.get_state(), TEST_DIFFICULTY));

        let second_payment = spend(&genesis_tx, &holder, KeyPair::generate().address());
        assert_ne!(second_payment.signature, payment.signature);
        assert_eq!(
            node.add_transaction(second_payment),
            Err(NodeError::TransactionRejected)
        );
        assert!(validate_chain(node.get_state(), TEST_DIFFICULTY));
    }

    #[test]
    fn test_genesis_only_chain_is_valid() {
        let holder = KeyPair::generate();
        let chain = Blockchain::new(Transaction::new_reward(holder.address().clone()));

        assert!(validate_chain(&chain, TEST_DIFFICULTY));
    }

    #[test]
    fn test_validation_does_not_mutate_input() {
        let (chain, _) = three_block_chain();
        let before = chain.clone();

        validate_chain(&chain, TEST_DIFFICULTY);
        assert_eq!(chain, before);
    }

    #[test]
    fn test_genesis_must_hold_one_transaction() {
        let (mut chain, owner) = three_block_chain();
        chain.blocks[0]
            .transactions
            .push(Transaction::new_reward(owner.address().clone()));

        assert_eq!(
            check_chain(&chain, TEST_DIFFICULTY),
            Err(ChainError::InvalidGenesis(2))
        );
    }

    #[test]
    fn test_tampered_prev_hash() {
        let (mut chain, _) = three_block_chain();
        chain.blocks[1].prev_block_hash = vec![0xaa; 32];

        assert!(!validate_chain(&chain, TEST_DIFFICULTY));
        assert_eq!(
            check_chain(&chain, TEST_DIFFICULTY),
            Err(ChainError::BrokenLink { height: 1 })
        );
    }

    #[test]
    fn test_tampered_block_breaks_descendants() {
        let (mut chain, _) = three_block_chain();
        chain.blocks[1].nonce += 1;

        // Block 1 loses its work and block 2 no longer links to it
        assert!(!validate_chain(&chain, TEST_DIFFICULTY));

        reseal(&mut chain, 1);
        assert!(validate_chain(&chain, TEST_DIFFICULTY));
    }

    #[test]
    fn test_timestamp_regression() {
        let (mut chain, _) = three_block_chain();
        let previous = chain.blocks[1].timestamp;
        chain.blocks[2].timestamp = previous - 10;
        reseal(&mut chain, 2);

        assert_eq!(
            check_chain(&chain, TEST_DIFFICULTY),
            Err(ChainError::TimestampRegression {
                height: 2,
                timestamp: previous - 10,
                previous,
            })
        );
    }

    #[test]
    fn test_equal_timestamps_are_allowed() {
        let (mut chain, _) = three_block_chain();
        chain.blocks[2].timestamp = chain.blocks[1].timestamp;
        reseal(&mut chain, 2);

        assert!(validate_chain(&chain, TEST_DIFFICULTY));
    }

    #[test]
    fn test_insufficient_work() {
        let (chain, _) = three_block_chain();

        // A chain mined at 8 bits almost never satisfies 64 bits
        assert_eq!(
            check_chain(&chain, Difficulty::new(64)),
            Err(ChainError::InsufficientWork { height: 1 })
        );
    }

    #[test]
    fn test_tampered_transaction_recipient() {
        let (mut chain, _) = three_block_chain();
        let thief = KeyPair::generate();
        chain.blocks[1].transactions[0].recipient = thief.address().clone();
        reseal(&mut chain, 1);

        assert_eq!(
            check_chain(&chain, TEST_DIFFICULTY),
            Err(ChainError::InvalidTransaction { height: 1, index: 0 })
        );
    }

    #[test]
    fn test_tampered_transaction_previous_hash() {
        let (mut chain, _) = three_block_chain();
        chain.blocks[1].transactions[0].previous_tx_hash = vec![0xee; 32];
        reseal(&mut chain, 1);

        assert_eq!(
            check_chain(&chain, TEST_DIFFICULTY),
            Err(ChainError::InvalidTransaction { height: 1, index: 0 })
        );
    }

    #[test]
    fn test_tampered_transaction_signature() {
        let (mut chain, _) = three_block_chain();
        chain.blocks[2].transactions[0].signature = None;
        reseal(&mut chain, 2);

        assert_eq!(
            check_chain(&chain, TEST_DIFFICULTY),
            Err(ChainError::InvalidTransaction { height: 2, index: 0 })
        );
    }

    #[test]
    fn test_two_rewards_in_one_block() {
        let (mut chain, owner) = three_block_chain();
        let extra = Transaction::new_reward(KeyPair::generate().address().clone());
        chain.blocks[2].transactions.push(extra);
        reseal(&mut chain, 2);

        assert_eq!(
            check_chain(&chain, TEST_DIFFICULTY),
            Err(ChainError::ExtraReward { height: 2 })
        );

        // Rewards alone are enough to trip the rule
        let tip = chain.blocks[1].hash().unwrap().to_vec();
        let rewards_only = Block::new(
            tip,
            vec![
                Transaction::new_reward(owner.address().clone()),
                Transaction::new_reward(KeyPair::generate().address().clone()),
            ],
        );
        chain.blocks[2] = pow::mine(rewards_only, TEST_DIFFICULTY).unwrap();
        assert!(!validate_chain(&chain, TEST_DIFFICULTY));
    }

    #[test]
    fn test_double_spend_across_blocks() {
        let (mut chain, _) = three_block_chain();
        let holder_coin = chain.blocks[0].transactions[0].clone();

        // Block 2 replays block 1's spend of the genesis coin
        let replayed = chain.blocks[1].transactions[0].clone();
        assert_eq!(replayed.previous_tx_hash, holder_coin.hash().to_vec());
        chain.blocks[2].transactions[0] = replayed;
        reseal(&mut chain, 2);

        assert_eq!(
            check_chain(&chain, TEST_DIFFICULTY),
            Err(ChainError::InvalidTransaction { height: 2, index: 0 })
        );
    }

    #[test]
    fn test_same_block_double_spend_is_not_detected() {
        let holder = KeyPair::generate();
        let genesis_tx = Transaction::new_reward(holder.address().clone());
        let mut chain = Blockchain::new(genesis_tx.clone());

        // Both spends are valid against the prefix, which is all that is checked
        let tip = chain.get_latest_block().hash().unwrap().to_vec();
        let block = Block::new(
            tip,
            vec![
                spend(&genesis_tx, &holder, KeyPair::generate().address()),
                spend(&genesis_tx, &holder, KeyPair::generate().address()),
            ],
        );
        chain.push(pow::mine(block, TEST_DIFFICULTY).unwrap());

        assert_eq!(check_chain(&chain, TEST_DIFFICULTY), Ok(()));
    }

    #[test]
    fn test_negative_timestamp_is_malformed() {
        let (mut chain, _) = three_block_chain();
        chain.blocks[1].timestamp = -1;

        assert_eq!(
            check_chain(&chain, TEST_DIFFICULTY),
            Err(ChainError::TimestampRegression {
                height: 1,
                timestamp: -1,
                previous: chain.blocks[0].timestamp,
            })
        );

        chain.blocks[0].timestamp = -1;
        assert_eq!(
            check_chain(&chain, TEST_DIFFICULTY),
            Err(ChainError::MalformedBlock {
                height: 1,
                source: BlockError::NegativeTimestamp(-1),
            })
        );
    }
}
