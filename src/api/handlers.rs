use actix_web::{web, HttpResponse, Responder};
use log::error;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::state::Ledger;
use crate::blockchain::{
    check_chain, Address, Block, Blockchain, KeyPair, MiningError, NodeError, Transaction,
};

/// Shared node state handed to every handler
pub type LedgerData = web::Data<Ledger>;

fn bad_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({ "error": message }))
}

fn internal_error(context: &str, err: impl std::fmt::Display) -> HttpResponse {
    error!("{}: {}", context, err);
    HttpResponse::InternalServerError().json(serde_json::json!({ "error": context }))
}

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// Hash of the coin being spent (hex encoded)
    pub previous_tx_hash: String,

    /// The recipient's address
    pub recipient: String,

    /// The coin holder's private key (hex encoded, used for signing)
    pub private_key: String,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    /// The message
    pub message: String,

    /// Hash of the submitted transaction (hex encoded)
    pub transaction_hash: String,

    /// The block mined for this transaction
    pub block: Block,
}

/// Response for the transaction lookup endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionLookupResponse {
    /// The transaction with the requested hash
    pub transaction: Transaction,

    /// Whether a later transaction already spends this coin
    pub spent: bool,
}

/// Request for validating a chain received from elsewhere
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ValidateRequest {
    /// The blocks of the candidate chain, genesis first
    pub blocks: Vec<Block>,
}

/// Response for the candidate validation endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ValidateResponse {
    /// Whether the chain is valid
    pub is_valid: bool,

    /// The first rule the chain breaks, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Response for the create wallet endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    /// The wallet's address
    pub address: String,

    /// The wallet's private key (hex encoded)
    pub private_key: String,
}

/// Get the full blockchain
///
/// Returns the entire blockchain and its validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(ledger: LedgerData) -> impl Responder {
    let replay = web::block(move || {
        let (chain, difficulty) = ledger.snapshot();
        let is_valid = crate::blockchain::validate_chain(&chain, difficulty);
        (chain, is_valid)
    })
    .await;

    match replay {
        Ok((chain, is_valid)) => HttpResponse::Ok().json(ChainResponse {
            length: chain.len(),
            chain: chain.blocks().to_vec(),
            is_valid,
        }),
        Err(err) => internal_error("Chain validation failed", err),
    }
}

/// Submit a transaction
///
/// Signs the spend with the given key, validates it and mines it into a new block
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Mined into a new block", body = TransactionResponse),
        (status = 400, description = "Invalid or rejected transaction"),
        (status = 500, description = "Internal server error"),
        (status = 503, description = "Mining cancelled during shutdown")
    )
)]
pub async fn new_transaction(
    ledger: LedgerData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    let previous_tx_hash = match hex::decode(&transaction_req.previous_tx_hash) {
        Ok(bytes) => bytes,
        Err(_) => {
            let message = "Invalid previous_tx_hash format. Must be a hex string.";
            return bad_request(message.to_string());
        }
    };

    let recipient: Address = match transaction_req.recipient.parse() {
        Ok(address) => address,
        Err(err) => return bad_request(format!("Invalid recipient address: {}", err)),
    };

    let private_key_bytes = match hex::decode(&transaction_req.private_key) {
        Ok(bytes) => bytes,
        Err(_) => {
            return bad_request("Invalid private key format. Must be a hex string.".to_string());
        }
    };

    let key_pair = match KeyPair::from_secret_key(&private_key_bytes) {
        Ok(key_pair) => key_pair,
        Err(err) => return bad_request(format!("Invalid private key: {}", err)),
    };

    let mut transaction = Transaction::new(recipient, previous_tx_hash);
    if let Err(err) = transaction.sign(&key_pair) {
        return bad_request(format!("Failed to sign transaction: {}", err));
    }
    let transaction_hash = hex::encode(transaction.hash());

    // Mining blocks the calling thread until a nonce is found
    let shared = ledger.into_inner();
    let outcome = tokio::task::spawn_blocking(move || shared.submit(transaction)).await;

    match outcome {
        Ok(Ok(block)) => HttpResponse::Created().json(TransactionResponse {
            message: "Transaction added in a new block".to_string(),
            transaction_hash,
            block,
        }),
        Ok(Err(NodeError::TransactionRejected)) => {
            bad_request(format!("Transaction {} rejected", transaction_hash))
        }
        Ok(Err(NodeError::MiningError(MiningError::Cancelled))) => {
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "error": "Mining cancelled, node is shutting down"
            }))
        }
        Ok(Err(err)) => internal_error("Failed to mine block", err),
        Err(err) => internal_error("Mining task failed", err),
    }
}

/// Look up a transaction
///
/// Returns the transaction with the given hash and whether its coin is spent
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{hash}",
    params(
        ("hash" = String, Path, description = "Transaction hash (hex encoded)")
    ),
    responses(
        (status = 200, description = "Transaction found", body = TransactionLookupResponse),
        (status = 400, description = "Invalid hash"),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn get_transaction(ledger: LedgerData, hash: web::Path<String>) -> impl Responder {
    let tx_hash = match hex::decode(hash.as_str()) {
        Ok(bytes) => bytes,
        Err(_) => return bad_request("Invalid hash format. Must be a hex string.".to_string()),
    };

    let lookup = web::block(move || {
        let node = ledger.node();
        let chain = node.get_state();
        chain.get_tx_by_hash(&tx_hash).map(|transaction| TransactionLookupResponse {
            transaction: transaction.clone(),
            spent: chain.get_tx_by_previous_tx_hash(&tx_hash).is_some(),
        })
    })
    .await;

    match lookup {
        Ok(Some(response)) => HttpResponse::Ok().json(response),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": format!("Transaction {} not found", hash.as_str())
        })),
        Err(err) => internal_error("Transaction lookup failed", err),
    }
}

/// Check if the blockchain is valid
///
/// Replays the node's chain from genesis
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = bool)
    )
)]
pub async fn validate_chain(ledger: LedgerData) -> impl Responder {
    let replay = web::block(move || {
        let (chain, difficulty) = ledger.snapshot();
        crate::blockchain::validate_chain(&chain, difficulty)
    })
    .await;

    match replay {
        Ok(is_valid) => HttpResponse::Ok().json(is_valid),
        Err(err) => internal_error("Chain validation failed", err),
    }
}

/// Validate a candidate chain
///
/// Replays the given chain at this node's difficulty and reports the first broken rule
#[utoipa::path(
    post,
    path = "/api/v1/validate",
    request_body = ValidateRequest,
    responses(
        (status = 200, description = "Candidate validation status", body = ValidateResponse),
        (status = 400, description = "Empty chain")
    )
)]
pub async fn validate_candidate(
    ledger: LedgerData,
    candidate: web::Json<ValidateRequest>,
) -> impl Responder {
    let chain = match Blockchain::try_from(candidate.into_inner().blocks) {
        Ok(chain) => chain,
        Err(err) => return bad_request(err.to_string()),
    };

    let replay = web::block(move || {
        let difficulty = ledger.node().difficulty();
        check_chain(&chain, difficulty)
    })
    .await;

    match replay {
        Ok(Ok(())) => HttpResponse::Ok().json(ValidateResponse {
            is_valid: true,
            reason: None,
        }),
        Ok(Err(err)) => HttpResponse::Ok().json(ValidateResponse {
            is_valid: false,
            reason: Some(err.to_string()),
        }),
        Err(err) => internal_error("Chain validation failed", err),
    }
}

/// Create a new wallet
///
/// Creates a new wallet with a random keypair
///
/// The private key must be stored by your own
#[utoipa::path(
    post,
    path = "/api/v1/wallet/new",
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletResponse)
    )
)]
pub async fn create_wallet() -> impl Responder {
    let key_pair = KeyPair::generate();

    HttpResponse::Created().json(WalletResponse {
        address: key_pair.address().0.clone(),
        private_key: hex::encode(key_pair.export_secret_key()),
    })
}
