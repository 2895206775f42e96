use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::circulation::CirculationError;
use crate::ports::StoreError;

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub struct ApiError(CirculationError);

impl From<CirculationError> for ApiError {
    fn from(err: CirculationError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self.0 {
            // 404 Not Found - リクエストされたリソースが存在しない
            CirculationError::BookNotFound => (
                StatusCode::NOT_FOUND,
                "BOOK_NOT_FOUND",
                "Book not found".to_string(),
            ),
            CirculationError::PatronNotFound => (
                StatusCode::NOT_FOUND,
                "PATRON_NOT_FOUND",
                "Patron not found".to_string(),
            ),
            CirculationError::TransactionNotFound => (
                StatusCode::NOT_FOUND,
                "TRANSACTION_NOT_FOUND",
                "Transaction not found".to_string(),
            ),

            // 409 Conflict - 入場制御・並行性・一意性の競合
            CirculationError::NotEnoughCopies => (
                StatusCode::CONFLICT,
                "NOT_ENOUGH_COPIES",
                "Not enough copies of the book are available for borrowing".to_string(),
            ),
            CirculationError::AlreadyBorrowed => (
                StatusCode::CONFLICT,
                "ALREADY_BORROWED",
                "Patron already has an open loan for this book".to_string(),
            ),
            CirculationError::EditConflict => (
                StatusCode::CONFLICT,
                "EDIT_CONFLICT",
                "Unable to update the record due to an edit conflict, please try again"
                    .to_string(),
            ),
            CirculationError::Store(StoreError::DuplicateId) => (
                StatusCode::CONFLICT,
                "DUPLICATE_ID",
                "A resource with this ID already exists".to_string(),
            ),
            CirculationError::Store(StoreError::DuplicateIsbn) => (
                StatusCode::CONFLICT,
                "DUPLICATE_ISBN",
                "A book with this ISBN already exists".to_string(),
            ),
            CirculationError::Store(StoreError::DuplicateEmail) => (
                StatusCode::CONFLICT,
                "DUPLICATE_EMAIL",
                "A patron with this email already exists".to_string(),
            ),

            // 422 Unprocessable Entity - 入力・状態のバリデーション違反
            CirculationError::InvalidDueDate(ref msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_DUE_DATE",
                msg.clone(),
            ),
            CirculationError::InvalidCopies => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_COPIES",
                "Copies must be at least 1".to_string(),
            ),
            CirculationError::TooManyReturnedCopies => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "TOO_MANY_RETURNED_COPIES",
                "Returned copies exceed the number of copies currently borrowed".to_string(),
            ),
            CirculationError::AlreadyReturned => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "ALREADY_RETURNED",
                "Due date cannot be updated because the transaction is already returned"
                    .to_string(),
            ),
            CirculationError::UnknownCategory(ref kind) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNKNOWN_CATEGORY",
                format!("Unknown patron category: {}", kind),
            ),
            CirculationError::Store(StoreError::UnsupportedSortField(ref field)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNSUPPORTED_SORT_FIELD",
                format!("Unsupported sort field: {}", field),
            ),

            // 404 - ワークフロー外のストア直接参照で発生
            CirculationError::Store(StoreError::NotFound) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "The requested resource could not be found".to_string(),
            ),
            CirculationError::Store(StoreError::EditConflict) => (
                StatusCode::CONFLICT,
                "EDIT_CONFLICT",
                "Unable to update the record due to an edit conflict, please try again"
                    .to_string(),
            ),

            // 500 Internal Server Error - インフラ障害
            // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
            CirculationError::Store(ref store_err) => {
                tracing::error!("Store error: {}", store_err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "An unexpected error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
