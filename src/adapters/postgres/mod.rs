pub mod book_store;
pub mod patron_store;
pub mod transaction_store;

// パブリックに型を再エクスポート
pub use book_store::BookStore as PostgresBookStore;
pub use patron_store::PatronStore as PostgresPatronStore;
pub use transaction_store::TransactionStore as PostgresTransactionStore;

use crate::ports::StoreError;

/// sqlxのエラーをストアのエラー分類へ写像する
///
/// 一意制約違反（SQLSTATE 23505）は制約名でDuplicate系エラーへ
/// 振り分け、それ以外はバックエンドエラーとして出所を保持する。
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::RowNotFound = err {
        return StoreError::NotFound;
    }

    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some("23505") {
            return match db_err.constraint() {
                Some("books_isbn_key") => StoreError::DuplicateIsbn,
                Some("patrons_email_key") => StoreError::DuplicateEmail,
                _ => StoreError::DuplicateId,
            };
        }
    }

    StoreError::Backend(Box::new(err))
}
