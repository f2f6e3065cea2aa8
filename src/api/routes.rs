use actix_web::web;

use super::handlers;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/chain", web::get().to(handlers::get_chain))
            .route("/transactions/new", web::post().to(handlers::new_transaction))
            .route("/transactions/{hash}", web::get().to(handlers::get_transaction))
            .route("/validate", web::get().to(handlers::validate_chain))
            .route("/validate", web::post().to(handlers::validate_candidate))
            .route("/wallet/new", web::post().to(handlers::create_wallet))
    );
}
