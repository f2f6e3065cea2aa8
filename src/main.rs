use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use log::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use coin_ledger::api;
use coin_ledger::blockchain::{self, generate_key_pair, KeyPair, Node, Transaction};
use coin_ledger::config::Config;

// Create a node whose genesis coin belongs to a freshly generated test key
fn initialize_node(config: &Config) -> Node {
    let (owner, owner_keys) = generate_key_pair();
    let genesis_holder = KeyPair::generate();
    let genesis_tx = Transaction::new_reward(genesis_holder.address().clone());

    info!("Node owner address: {}", owner);
    info!("Node owner private key: {}", hex::encode(owner_keys.export_secret_key()));
    info!("Genesis coin holder address: {}", genesis_holder.address());
    info!(
        "Genesis coin holder private key: {}",
        hex::encode(genesis_holder.export_secret_key())
    );
    info!("Genesis coin hash: {}", hex::encode(genesis_tx.hash()));

    Node::new(owner, genesis_tx, config.difficulty)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::new_transaction,
        api::handlers::get_transaction,
        api::handlers::validate_chain,
        api::handlers::validate_candidate,
        api::handlers::create_wallet
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::Address,
            blockchain::DigitalSignature,
            api::handlers::ChainResponse,
            api::handlers::TransactionRequest,
            api::handlers::TransactionResponse,
            api::handlers::TransactionLookupResponse,
            api::handlers::ValidateRequest,
            api::handlers::ValidateResponse,
            api::handlers::WalletResponse
        )
    ),
    tags(
        (name = "ledger", description = "Coin ledger API endpoints")
    ),
    info(
        title = "Coin Ledger API",
        version = "1.0.0",
        description = "A single-node proof-of-work coin ledger",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().context("Failed to read configuration")?;
    info!("Mining difficulty: {}", config.difficulty);

    let ledger = web::Data::new(api::Ledger::new(initialize_node(&config)));

    info!("Starting HTTP server at http://{}:{}", config.host, config.port);

    let app_ledger = ledger.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(app_ledger.clone())
            .configure(api::configure_routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?
    .run()
    .await
    .context("HTTP server failed")?;

    // Let blocking mining tasks finish so the runtime can shut down
    ledger.cancel_mining();

    Ok(())
}
