use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::circulation::{
    CirculationError, ServiceDependencies, borrow_book as execute_borrow_book,
    patron_summary as execute_patron_summary,
    reschedule_due_date as execute_reschedule_due_date, return_book as execute_return_book,
    with_deadline,
};
use crate::config::CostConfig;
use crate::domain::book::Book;
use crate::domain::commands::{BorrowBook, RescheduleDueDate, ReturnBook};
use crate::domain::patron::Patron;
use crate::domain::{BookId, PatronCategory, PatronId, TransactionId};
use crate::ports::{
    BookFilter, BookStore, Paginator, PatronFilter, PatronStore, Sorter, StoreError,
    TransactionFilter, TransactionStore,
};

use super::error::ApiError;
use super::types::*;

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub deps: ServiceDependencies,
    pub cost: CostConfig,
}

// ソート許可リスト（`-`プレフィックスは降順）
const BOOKS_SORT_FIELDS: &[&str] = &[
    "title",
    "isbn",
    "pages",
    "edition",
    "copies",
    "borrowed_copies",
    "published_at",
    "-title",
    "-isbn",
    "-pages",
    "-edition",
    "-copies",
    "-borrowed_copies",
    "-published_at",
];

const PATRONS_SORT_FIELDS: &[&str] = &["name", "email", "category", "-name", "-email", "-category"];

const TRANSACTIONS_SORT_FIELDS: &[&str] = &[
    "status",
    "borrowed_at",
    "due_date",
    "returned_at",
    "-status",
    "-borrowed_at",
    "-due_date",
    "-returned_at",
];

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_PAGE_SIZE: i64 = 10;

fn paginator_from(page: Option<i64>, page_size: Option<i64>) -> Paginator {
    Paginator::new(
        page.unwrap_or(DEFAULT_PAGE),
        page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    )
}

fn sorter_from(sort: Option<String>, safelist: &'static [&'static str]) -> Sorter {
    match sort {
        Some(field) => Sorter::new(field, safelist),
        None => Sorter::none(),
    }
}

// ============================================================================
// Book handlers
// ============================================================================

/// POST /books - 書籍をカタログへ登録
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    let now = Utc::now();
    let book = Book::new(
        req.title,
        req.isbn,
        req.pages,
        req.edition,
        req.copies,
        req.authors,
        req.publishers,
        req.genres,
        req.published_at,
        now,
    );

    with_deadline(state.deps.book_store.insert(&book))
        .await
        .map_err(CirculationError::from_store)?;

    // 挿入時に刻印されたタイムスタンプを含む完全な状態を返す
    let created = with_deadline(state.deps.book_store.get(BookFilter::by_id(book.book_id)))
        .await
        .map_err(|err| match err {
            StoreError::NotFound => CirculationError::BookNotFound,
            other => CirculationError::Store(other),
        })?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /books/:id - 書籍詳細をIDで取得
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<BookResponse>, QueryError> {
    let book_id = BookId::from_uuid(book_id);

    match with_deadline(state.deps.book_store.get(BookFilter::by_id(book_id))).await {
        Ok(book) => Ok(Json(book.into())),
        Err(StoreError::NotFound) => Err(QueryError::NotFound(format!(
            "Book {} not found",
            book_id.value()
        ))),
        Err(err) => Err(QueryError::InternalError(err.to_string())),
    }
}

/// GET /books - フィルタ・ページング・ソート付き書籍一覧
pub async fn list_books(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListBooksQuery>,
) -> Result<Json<BooksInfo>, QueryError> {
    let filter = BookFilter {
        title: query.title,
        isbn: query.isbn,
        author: query.author,
        genre: query.genre,
        min_pages: query.min_pages,
        max_pages: query.max_pages,
        ..BookFilter::default()
    };
    let paginator = paginator_from(query.page, query.page_size);
    let sorter = sorter_from(query.sort, BOOKS_SORT_FIELDS);

    let (books, metadata) = with_deadline(state.deps.book_store.get_all(filter, paginator, sorter))
        .await
        .map_err(|err| match err {
            StoreError::UnsupportedSortField(field) => {
                QueryError::BadRequest(format!("Unsupported sort field: {}", field))
            }
            other => QueryError::InternalError(other.to_string()),
        })?;

    Ok(Json(BooksInfo {
        books: books.into_iter().map(Into::into).collect(),
        metadata,
    }))
}

/// PATCH /books/:id - 書誌情報・部数の部分更新
///
/// 読み出したバージョンを述語とする楽観的並行性制御。
/// 並行更新に敗れた場合は409を返し、クライアントが再取得・再試行する。
pub async fn update_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
    Json(req): Json<UpdateBookRequest>,
) -> Result<Json<BookResponse>, ApiError> {
    let book_id = BookId::from_uuid(book_id);

    let book = with_deadline(state.deps.book_store.get(BookFilter::by_id(book_id)))
        .await
        .map_err(|err| match err {
            StoreError::NotFound => CirculationError::BookNotFound,
            other => CirculationError::Store(other),
        })?;

    let mut updated = book.clone();
    if let Some(title) = req.title {
        updated.title = title;
    }
    if let Some(isbn) = req.isbn {
        updated.isbn = isbn;
    }
    if let Some(pages) = req.pages {
        updated.pages = pages;
    }
    if let Some(edition) = req.edition {
        updated.edition = edition;
    }
    if let Some(copies) = req.copies {
        updated.copies = copies;
    }
    if let Some(authors) = req.authors {
        updated.authors = authors;
    }
    if let Some(publishers) = req.publishers {
        updated.publishers = publishers;
    }
    if let Some(genres) = req.genres {
        updated.genres = genres;
    }
    if let Some(published_at) = req.published_at {
        updated.published_at = published_at;
    }

    with_deadline(state.deps.book_store.update(BookFilter::by_id(book_id), &updated))
        .await
        .map_err(CirculationError::from_store)?;

    let refreshed = with_deadline(state.deps.book_store.get(BookFilter::by_id(book_id)))
        .await
        .map_err(|err| match err {
            StoreError::NotFound => CirculationError::BookNotFound,
            other => CirculationError::Store(other),
        })?;

    Ok(Json(refreshed.into()))
}

/// DELETE /books/:id - 書籍の削除
pub async fn delete_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let book_id = BookId::from_uuid(book_id);

    with_deadline(state.deps.book_store.delete(BookFilter::by_id(book_id)))
        .await
        .map_err(|err| match err {
            StoreError::NotFound => CirculationError::BookNotFound,
            other => CirculationError::Store(other),
        })?;

    Ok(Json(MessageResponse {
        message: "book successfully deleted".to_string(),
    }))
}

// ============================================================================
// Patron handlers
// ============================================================================

/// POST /patrons - 利用者登録
///
/// カテゴリ種別（student / teacher）を設定済みの割引率へ
/// 引き当てる。不明な種別は422。
pub async fn create_patron(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePatronRequest>,
) -> Result<(StatusCode, Json<PatronResponse>), ApiError> {
    let category = PatronCategory::from_kind(
        &req.category,
        state.cost.student_discount_percent,
        state.cost.teacher_discount_percent,
    )
    .map_err(|err| CirculationError::UnknownCategory(err.0))?;

    let patron = Patron::new(req.name, req.email, category, Utc::now());

    with_deadline(state.deps.patron_store.insert(&patron))
        .await
        .map_err(CirculationError::from_store)?;

    let created = with_deadline(
        state
            .deps
            .patron_store
            .get(PatronFilter::by_id(patron.patron_id)),
    )
    .await
    .map_err(|err| match err {
        StoreError::NotFound => CirculationError::PatronNotFound,
        other => CirculationError::Store(other),
    })?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /patrons/:id - 利用者サマリ（取引と延滞料金つき）
///
/// 取引ごとの延滞料金と、カテゴリ割引適用後の合計を返す。
pub async fn get_patron_summary(
    State(state): State<Arc<AppState>>,
    Path(patron_id): Path<Uuid>,
) -> Result<Json<PatronSummaryResponse>, ApiError> {
    let patron_id = PatronId::from_uuid(patron_id);

    let summary =
        execute_patron_summary(&state.deps, &state.cost, patron_id, Utc::now()).await?;

    Ok(Json(summary.into()))
}

/// GET /patrons - フィルタ・ページング・ソート付き利用者一覧
pub async fn list_patrons(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListPatronsQuery>,
) -> Result<Json<PatronsInfo>, QueryError> {
    let filter = PatronFilter {
        name: query.name,
        email: query.email,
        category: query.category,
        ..PatronFilter::default()
    };
    let paginator = paginator_from(query.page, query.page_size);
    let sorter = sorter_from(query.sort, PATRONS_SORT_FIELDS);

    let (patrons, metadata) =
        with_deadline(state.deps.patron_store.get_all(filter, paginator, sorter))
            .await
            .map_err(|err| match err {
                StoreError::UnsupportedSortField(field) => {
                    QueryError::BadRequest(format!("Unsupported sort field: {}", field))
                }
                other => QueryError::InternalError(other.to_string()),
            })?;

    Ok(Json(PatronsInfo {
        patrons: patrons.into_iter().map(Into::into).collect(),
        metadata,
    }))
}

/// PATCH /patrons/:id - 利用者情報の部分更新
pub async fn update_patron(
    State(state): State<Arc<AppState>>,
    Path(patron_id): Path<Uuid>,
    Json(req): Json<UpdatePatronRequest>,
) -> Result<Json<PatronResponse>, ApiError> {
    let patron_id = PatronId::from_uuid(patron_id);

    let patron = with_deadline(state.deps.patron_store.get(PatronFilter::by_id(patron_id)))
        .await
        .map_err(|err| match err {
            StoreError::NotFound => CirculationError::PatronNotFound,
            other => CirculationError::Store(other),
        })?;

    let mut updated = patron.clone();
    if let Some(name) = req.name {
        updated.name = name;
    }
    if let Some(email) = req.email {
        updated.email = email;
    }
    if let Some(kind) = req.category {
        updated.category = PatronCategory::from_kind(
            &kind,
            state.cost.student_discount_percent,
            state.cost.teacher_discount_percent,
        )
        .map_err(|err| CirculationError::UnknownCategory(err.0))?;
    }
    if let Some(activated) = req.activated {
        updated.activated = activated;
    }

    with_deadline(
        state
            .deps
            .patron_store
            .update(PatronFilter::by_id(patron_id), &updated),
    )
    .await
    .map_err(CirculationError::from_store)?;

    let refreshed = with_deadline(state.deps.patron_store.get(PatronFilter::by_id(patron_id)))
        .await
        .map_err(|err| match err {
            StoreError::NotFound => CirculationError::PatronNotFound,
            other => CirculationError::Store(other),
        })?;

    Ok(Json(refreshed.into()))
}

/// DELETE /patrons/:id - 利用者の削除
pub async fn delete_patron(
    State(state): State<Arc<AppState>>,
    Path(patron_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let patron_id = PatronId::from_uuid(patron_id);

    with_deadline(state.deps.patron_store.delete(PatronFilter::by_id(patron_id)))
        .await
        .map_err(|err| match err {
            StoreError::NotFound => CirculationError::PatronNotFound,
            other => CirculationError::Store(other),
        })?;

    Ok(Json(MessageResponse {
        message: "patron successfully deleted".to_string(),
    }))
}

// ============================================================================
// Transaction handlers
// ============================================================================

/// POST /transactions/borrow - 書籍を借りる
///
/// 強制されるビジネスルール:
/// - 返却期限が現在から1日超・14日未満であること
/// - 書籍・利用者が存在すること
/// - 同一利用者・同一書籍の貸出中取引がないこと
/// - 貸出可能な部数が残っていること
pub async fn borrow_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BorrowBookRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    let cmd = BorrowBook {
        patron_id: PatronId::from_uuid(req.patron_id),
        book_id: BookId::from_uuid(req.book_id),
        due_date: req.due_date,
        copies: req.copies.unwrap_or(1),
        borrowed_at: Utc::now(),
    };

    let transaction = execute_borrow_book(&state.deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(transaction.into())))
}

/// POST /transactions/return - 書籍を返却する
pub async fn return_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReturnBookRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let copies = req.copies.unwrap_or(1);
    let cmd = ReturnBook {
        patron_id: PatronId::from_uuid(req.patron_id),
        book_id: BookId::from_uuid(req.book_id),
        copies,
        returned_at: Utc::now(),
    };

    let transaction = execute_return_book(&state.deps, cmd).await?;

    let message = if copies > 1 {
        format!(
            "successfully returned {} copies of book (id: {})",
            copies,
            transaction.book_id.value()
        )
    } else {
        format!(
            "successfully returned {} copy of book (id: {})",
            copies,
            transaction.book_id.value()
        )
    };

    Ok(Json(MessageResponse { message }))
}

/// GET /transactions/:id - 取引詳細をIDで取得
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionResponse>, QueryError> {
    let transaction_id = TransactionId::from_uuid(transaction_id);

    match with_deadline(
        state
            .deps
            .transaction_store
            .get(TransactionFilter::by_id(transaction_id)),
    )
    .await
    {
        Ok(transaction) => Ok(Json(transaction.into())),
        Err(StoreError::NotFound) => Err(QueryError::NotFound(format!(
            "Transaction {} not found",
            transaction_id.value()
        ))),
        Err(err) => Err(QueryError::InternalError(err.to_string())),
    }
}

/// GET /transactions - フィルタ・ページング・ソート付き取引一覧
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<TransactionsInfo>, QueryError> {
    let status = match &query.status {
        Some(status) => Some(status.parse().map_err(QueryError::BadRequest)?),
        None => None,
    };

    let filter = TransactionFilter {
        patron_id: query.patron_id.map(PatronId::from_uuid),
        book_id: query.book_id.map(BookId::from_uuid),
        status,
        ..TransactionFilter::default()
    };
    let paginator = paginator_from(query.page, query.page_size);
    let sorter = sorter_from(query.sort, TRANSACTIONS_SORT_FIELDS);

    let (transactions, metadata) = with_deadline(
        state
            .deps
            .transaction_store
            .get_all(filter, paginator, sorter),
    )
    .await
    .map_err(|err| match err {
        StoreError::UnsupportedSortField(field) => {
            QueryError::BadRequest(format!("Unsupported sort field: {}", field))
        }
        other => QueryError::InternalError(other.to_string()),
    })?;

    Ok(Json(TransactionsInfo {
        transactions: transactions.into_iter().map(Into::into).collect(),
        metadata,
    }))
}

/// PATCH /transactions/:id - 返却期限の変更
///
/// Returned状態の取引は期限変更不可（422）。
pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<Uuid>,
    Json(req): Json<UpdateTransactionRequest>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let cmd = RescheduleDueDate {
        transaction_id: TransactionId::from_uuid(transaction_id),
        new_due_date: req.due_date,
        rescheduled_at: Utc::now(),
    };

    let transaction = execute_reschedule_due_date(&state.deps, cmd).await?;

    Ok(Json(transaction.into()))
}

/// DELETE /transactions/:id - 取引の削除
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let transaction_id = TransactionId::from_uuid(transaction_id);

    with_deadline(
        state
            .deps
            .transaction_store
            .delete(TransactionFilter::by_id(transaction_id)),
    )
    .await
    .map_err(|err| match err {
        StoreError::NotFound => CirculationError::TransactionNotFound,
        other => CirculationError::Store(other),
    })?;

    Ok(Json(MessageResponse {
        message: "transaction successfully deleted".to_string(),
    }))
}

// ============================================================================
// Error types
// ============================================================================

/// クエリハンドラー用のエラー型
#[derive(Debug)]
pub enum QueryError {
    NotFound(String),
    BadRequest(String),
    InternalError(String),
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            QueryError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            QueryError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            QueryError::InternalError(msg) => {
                // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
                tracing::error!("Internal error in query handler: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An unexpected error occurred".to_string(),
                )
            }
        };

        let body = Json(super::types::ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
