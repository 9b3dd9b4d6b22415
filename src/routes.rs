//! HTTP route table.

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::{handlers, middleware, state::AppState};

/// Build the full application router.
///
/// Everything under `/api/v1` except sign-up requires a bearer token. The
/// payment webhook is public and authenticated by its signature instead.
pub fn build_router(state: AppState) -> Router {
    let authenticated_routes = Router::new()
        .route("/api/v1/me", get(handlers::profiles::me))
        .route(
            "/api/v1/transactions",
            get(handlers::transactions::list_transactions),
        )
        // Emergency advances
        .route(
            "/api/v1/advances/assess",
            post(handlers::advances::assess_advance),
        )
        .route(
            "/api/v1/advances",
            post(handlers::advances::request_advance).get(handlers::advances::list_advances),
        )
        .route(
            "/api/v1/advances/{id}/repay",
            post(handlers::advances::repay_advance),
        )
        // Money in and out
        .route(
            "/api/v1/deposits/checkout",
            post(handlers::payments::create_checkout),
        )
        .route(
            "/api/v1/deposits/intent",
            post(handlers::payments::create_payment_intent),
        )
        .route(
            "/api/v1/payout-methods",
            post(handlers::payments::vault_card).get(handlers::payments::list_payout_methods),
        )
        .route("/api/v1/withdrawals", post(handlers::payments::withdraw))
        // Pockets
        .route(
            "/api/v1/pockets",
            post(handlers::pockets::create_pocket).get(handlers::pockets::list_pockets),
        )
        .route(
            "/api/v1/pockets/{id}/deposit",
            post(handlers::pockets::deposit_to_pocket),
        )
        .route(
            "/api/v1/pockets/{id}/withdraw",
            post(handlers::pockets::withdraw_from_pocket),
        )
        // Recipients and internal transfers
        .route(
            "/api/v1/recipients",
            post(handlers::recipients::create_recipient).get(handlers::recipients::list_recipients),
        )
        .route(
            "/api/v1/recipients/{id}",
            delete(handlers::recipients::delete_recipient),
        )
        .route(
            "/api/v1/transfers",
            post(handlers::recipients::create_transfer),
        )
        // Notifications
        .route(
            "/api/v1/notifications",
            get(handlers::notifications::list_notifications),
        )
        .route(
            "/api/v1/notifications/{id}/read",
            post(handlers::notifications::mark_read),
        )
        // Vendor pass-throughs
        .route("/api/v1/ai/complete", post(handlers::ai::complete))
        .route(
            "/api/v1/emails/statement",
            post(handlers::emails::send_statement),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/profiles", post(handlers::profiles::create_profile))
        .route(
            "/webhooks/payments",
            post(handlers::webhooks::payment_webhook),
        )
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
