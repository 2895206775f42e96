use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, borrow_book, create_book, create_patron, delete_book, delete_patron,
    delete_transaction, get_book, get_patron_summary, get_transaction, list_books, list_patrons,
    list_transactions, return_book, update_book, update_patron, update_transaction,
};

/// Creates the API router with all catalog and circulation endpoints
///
/// Catalog endpoints:
/// - POST /books, GET /books, GET /books/:id, PATCH /books/:id, DELETE /books/:id
/// - POST /patrons, GET /patrons, GET /patrons/:id (summary with fines),
///   PATCH /patrons/:id, DELETE /patrons/:id
///
/// Circulation endpoints:
/// - POST /transactions/borrow - Borrow a book
/// - POST /transactions/return - Return a book
/// - GET /transactions, GET /transactions/:id
/// - PATCH /transactions/:id - Change the due date
/// - DELETE /transactions/:id
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Catalog endpoints
        .route("/books", post(create_book).get(list_books))
        .route(
            "/books/:id",
            get(get_book).patch(update_book).delete(delete_book),
        )
        .route("/patrons", post(create_patron).get(list_patrons))
        .route(
            "/patrons/:id",
            get(get_patron_summary)
                .patch(update_patron)
                .delete(delete_patron),
        )
        // Circulation endpoints
        .route("/transactions", get(list_transactions))
        .route("/transactions/borrow", post(borrow_book))
        .route("/transactions/return", post(return_book))
        .route(
            "/transactions/:id",
            get(get_transaction)
                .patch(update_transaction)
                .delete(delete_transaction),
        )
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
