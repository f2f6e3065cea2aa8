use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info};

use crate::blockchain::pow;
use crate::blockchain::{Block, Blockchain, ChainError, Difficulty, Node, NodeError, Transaction};

/// A node shared between request handlers
///
/// The lock is held while a block is prepared or appended, never during the
/// nonce search, so readers only wait for short critical sections.
#[derive(Debug)]
pub struct Ledger {
    node: Mutex<Node>,
    stop: AtomicBool,
}

impl Ledger {
    pub fn new(node: Node) -> Self {
        Ledger {
            node: Mutex::new(node),
            stop: AtomicBool::new(false),
        }
    }

    /// Locks the node
    pub fn node(&self) -> MutexGuard<'_, Node> {
        // The chain only changes through a single push, so a poisoned node is still consistent
        self.node.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies the chain and difficulty so validation runs without holding the lock
    pub fn snapshot(&self) -> (Blockchain, Difficulty) {
        let node = self.node();
        (node.get_state().clone(), node.difficulty())
    }

    /// Aborts every running and future nonce search
    pub fn cancel_mining(&self) {
        info!("Cancelling mining");
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Validates, mines and appends `transaction`, returning the new block
    ///
    /// Blocking. When another block lands while this one is being mined, the
    /// block is rebuilt on the new tip and mined again.
    pub fn submit(&self, transaction: Transaction) -> Result<Block, NodeError> {
        loop {
            let (block, difficulty) = {
                let node = self.node();
                (node.prepare_block(transaction.clone())?, node.difficulty())
            };

            let block = pow::mine_until(block, difficulty, &self.stop)?;

            let mut node = self.node();
            match node.append_block(block) {
                Ok(block) => return Ok(block.clone()),
                Err(NodeError::InvalidBlock(ChainError::BrokenLink { height })) => {
                    debug!("Tip moved to height {} while mining, rebuilding block", height);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
