//! Difficulty target and nonce search.
//!
//! A block satisfies proof of work when its hash, read as a 256-bit
//! big-endian integer, is at most `(2^256 - 1) >> difficulty`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use thiserror::Error;

use super::block::{Block, BlockError};
use super::crypto::HASH_LEN;

/// Largest meaningful difficulty; every bit of the hash must be zero
pub const MAX_DIFFICULTY: u32 = (HASH_LEN * 8) as u32;

/// Errors that can occur while searching for a nonce
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MiningError {
    #[error("Block error: {0}")]
    BlockError(#[from] BlockError),

    #[error("Nonce space exhausted without meeting the target")]
    NonceSpaceExhausted,

    #[error("Mining cancelled")]
    Cancelled,
}

/// Required number of leading zero bits in a block hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Difficulty(u32);

impl Difficulty {
    pub const fn new(bits: u32) -> Self {
        Difficulty(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// `(2^256 - 1) >> bits` as 32 big-endian bytes
    pub fn target(self) -> [u8; HASH_LEN] {
        let mut target = [0xffu8; HASH_LEN];
        let zero_bytes = (self.0 / 8) as usize;

        if zero_bytes >= HASH_LEN {
            return [0u8; HASH_LEN];
        }

        target[..zero_bytes].fill(0);
        target[zero_bytes] = 0xff >> (self.0 % 8);
        target
    }

    /// Checks whether `hash` meets this difficulty
    pub fn is_met_by(self, hash: &[u8; HASH_LEN]) -> bool {
        hash_meets_target(hash, &self.target())
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bits", self.0)
    }
}

/// Returns true if `hash <= target`, both read as big-endian integers
#[inline]
pub fn hash_meets_target(hash: &[u8; HASH_LEN], target: &[u8; HASH_LEN]) -> bool {
    // Lexicographic order on equal-length big-endian arrays is numeric order
    hash <= target
}

/// Searches nonces upwards from `block.nonce` until the target is met
pub fn mine(block: Block, difficulty: Difficulty) -> Result<Block, MiningError> {
    mine_until(block, difficulty, &AtomicBool::new(false))
}

/// Like [`mine`], but gives up with [`MiningError::Cancelled`] once `stop` is set
pub fn mine_until(
    mut block: Block,
    difficulty: Difficulty,
    stop: &AtomicBool,
) -> Result<Block, MiningError> {
    let target = difficulty.target();

    loop {
        if stop.load(Ordering::Relaxed) {
            return Err(MiningError::Cancelled);
        }

        let hash = block.hash()?;
        if hash_meets_target(&hash, &target) {
            debug!(
                "Found nonce {} ({}): {}",
                block.nonce,
                difficulty,
                hex::encode(hash)
            );
            return Ok(block);
        }

        block.nonce = block
            .nonce
            .checked_add(1)
            .ok_or(MiningError::NonceSpaceExhausted)?;
    }
}
