// Blockchain module
//
// This module contains the ledger core:
// - Cryptography utilities
// - Transaction structure
// - Block structure and hashing
// - Proof of work
// - Blockchain structure
// - Mining node
// - Chain validation

pub mod block;
pub mod chain;
pub mod crypto;
pub mod node;
pub mod pow;
pub mod transaction;
pub mod validator;

// Re-export main components for easier access
pub use block::{Block, BlockError};
pub use chain::{Blockchain, BlockchainError};
pub use crypto::{generate_key_pair, Address, DigitalSignature, KeyPair};
pub use node::{Node, NodeError};
pub use pow::{Difficulty, MiningError};
pub use transaction::{Transaction, TransactionError};
pub use validator::{check_chain, validate_chain, ChainError};
