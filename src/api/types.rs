use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::circulation::{PatronSummary, TransactionFine};
use crate::domain::book::Book;
use crate::domain::patron::Patron;
use crate::domain::transaction::Transaction;
use crate::ports::Metadata;

// ============================================================================
// Books
// ============================================================================

/// 書籍作成リクエスト
#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    pub isbn: String,
    pub pages: i32,
    pub edition: i32,
    pub copies: i32,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub publishers: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub published_at: DateTime<Utc>,
}

/// 書籍更新リクエスト（部分更新）
///
/// `borrowed_copies` は含まない。部数カウンタの書き換えは
/// 貸出・返却ワークフローだけに許される。
#[derive(Debug, Deserialize)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub pages: Option<i32>,
    pub edition: Option<i32>,
    pub copies: Option<i32>,
    pub authors: Option<Vec<String>>,
    pub publishers: Option<Vec<String>>,
    pub genres: Option<Vec<String>>,
    pub published_at: Option<DateTime<Utc>>,
}

/// 書籍一覧・検索のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct ListBooksQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort: Option<String>,
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub min_pages: Option<i32>,
    pub max_pages: Option<i32>,
}

/// 書籍レスポンス（versionは外部へ公開しない）
#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub isbn: String,
    pub pages: i32,
    pub edition: i32,
    pub copies: i32,
    pub borrowed_copies: i32,
    pub authors: Vec<String>,
    pub publishers: Vec<String>,
    pub genres: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.book_id.value(),
            title: book.title,
            isbn: book.isbn,
            pages: book.pages,
            edition: book.edition,
            copies: book.copies,
            borrowed_copies: book.borrowed_copies,
            authors: book.authors,
            publishers: book.publishers,
            genres: book.genres,
            published_at: book.published_at,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// 書籍一覧レスポンス
#[derive(Debug, Serialize)]
pub struct BooksInfo {
    pub books: Vec<BookResponse>,
    pub metadata: Metadata,
}

// ============================================================================
// Patrons
// ============================================================================

/// 利用者作成リクエスト
///
/// カテゴリ種別は "student" / "teacher" のいずれか。割引率は
/// サーバ側の設定から引き当てる。
#[derive(Debug, Deserialize)]
pub struct CreatePatronRequest {
    pub name: String,
    pub email: String,
    pub category: String,
}

/// 利用者更新リクエスト（部分更新）
#[derive(Debug, Deserialize)]
pub struct UpdatePatronRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub category: Option<String>,
    pub activated: Option<bool>,
}

/// 利用者一覧・検索のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct ListPatronsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub category: Option<String>,
}

/// 利用者レスポンス
///
/// version / password_hash / permissions は外部へ公開しない。
#[derive(Debug, Serialize)]
pub struct PatronResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub category: String,
    pub activated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Patron> for PatronResponse {
    fn from(patron: Patron) -> Self {
        Self {
            id: patron.patron_id.value(),
            name: patron.name,
            email: patron.email,
            category: patron.category.kind().to_string(),
            activated: patron.activated,
            created_at: patron.created_at,
            updated_at: patron.updated_at,
        }
    }
}

/// 利用者一覧レスポンス
#[derive(Debug, Serialize)]
pub struct PatronsInfo {
    pub patrons: Vec<PatronResponse>,
    pub metadata: Metadata,
}

/// 利用者サマリレスポンス - 利用者情報、取引ごとの延滞料金、合計
#[derive(Debug, Serialize)]
pub struct PatronSummaryResponse {
    pub patron: PatronResponse,
    pub transactions: Vec<TransactionFineResponse>,
    pub total_fine: f64,
}

impl From<PatronSummary> for PatronSummaryResponse {
    fn from(summary: PatronSummary) -> Self {
        Self {
            patron: summary.patron.into(),
            transactions: summary.transactions.into_iter().map(Into::into).collect(),
            total_fine: summary.total_fine,
        }
    }
}

/// 1取引とその延滞料金のレスポンス
#[derive(Debug, Serialize)]
pub struct TransactionFineResponse {
    pub transaction: TransactionResponse,
    pub fine: f64,
}

impl From<TransactionFine> for TransactionFineResponse {
    fn from(entry: TransactionFine) -> Self {
        Self {
            transaction: entry.transaction.into(),
            fine: entry.fine,
        }
    }
}

// ============================================================================
// Transactions
// ============================================================================

/// 貸出リクエスト
#[derive(Debug, Deserialize)]
pub struct BorrowBookRequest {
    pub patron_id: Uuid,
    pub book_id: Uuid,
    pub due_date: DateTime<Utc>,
    pub copies: Option<i32>,
}

/// 返却リクエスト
#[derive(Debug, Deserialize)]
pub struct ReturnBookRequest {
    pub patron_id: Uuid,
    pub book_id: Uuid,
    pub copies: Option<i32>,
}

/// 取引更新リクエスト（返却期限の変更のみ）
#[derive(Debug, Deserialize)]
pub struct UpdateTransactionRequest {
    pub due_date: DateTime<Utc>,
}

/// 取引一覧のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort: Option<String>,
    pub patron_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
    pub status: Option<String>,
}

/// 取引レスポンス（versionは外部へ公開しない）
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub patron_id: Uuid,
    pub book_id: Uuid,
    pub status: String,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(transaction: Transaction) -> Self {
        Self {
            id: transaction.transaction_id.value(),
            patron_id: transaction.patron_id.value(),
            book_id: transaction.book_id.value(),
            status: transaction.status.as_str().to_string(),
            borrowed_at: transaction.borrowed_at,
            due_date: transaction.due_date,
            returned_at: transaction.returned_at,
            created_at: transaction.created_at,
            updated_at: transaction.updated_at,
        }
    }
}

/// 取引一覧レスポンス
#[derive(Debug, Serialize)]
pub struct TransactionsInfo {
    pub transactions: Vec<TransactionResponse>,
    pub metadata: Metadata,
}

// ============================================================================
// Shared
// ============================================================================

/// メッセージのみのレスポンス（削除・返却の確認）
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// エラーレスポンス
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
