//! A single-node proof-of-work coin ledger.
//!
//! Coins are created by reward transactions and move by signed transfers that
//! each spend exactly one earlier transaction. A [`blockchain::Node`] mines one
//! block per accepted transfer, and [`blockchain::validate_chain`] replays a
//! whole chain from genesis to decide whether it can be trusted.

pub mod api;
pub mod blockchain;
pub mod config;
