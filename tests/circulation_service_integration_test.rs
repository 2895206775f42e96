use chrono::{Duration, Utc};
use std::sync::Arc;

use rusty_library_backend::adapters::mock::{BookStore, PatronStore, TransactionStore};
use rusty_library_backend::application::circulation::{
    CirculationError, ServiceDependencies, borrow_book, patron_summary, reschedule_due_date,
    return_book,
};
use rusty_library_backend::config::CostConfig;
use rusty_library_backend::domain::book::Book;
use rusty_library_backend::domain::commands::{BorrowBook, RescheduleDueDate, ReturnBook};
use rusty_library_backend::domain::patron::Patron;
use rusty_library_backend::domain::transaction::open_transaction;
use rusty_library_backend::domain::{BookId, PatronCategory, PatronId, TransactionStatus};
use rusty_library_backend::ports::{
    BookFilter, BookStore as BookStoreTrait, Metadata, Paginator, PatronStore as PatronStoreTrait,
    Result as StoreResult, Sorter, StoreError, TransactionFilter,
    TransactionStore as TransactionStoreTrait,
};

// ============================================================================
// テストセットアップ
// ============================================================================

fn make_deps() -> ServiceDependencies {
    ServiceDependencies {
        book_store: Arc::new(BookStore::new()),
        patron_store: Arc::new(PatronStore::new()),
        transaction_store: Arc::new(TransactionStore::new()),
    }
}

async fn seed_book(deps: &ServiceDependencies, copies: i32) -> Book {
    let now = Utc::now();
    let book = Book::new(
        "The Rust Programming Language",
        format!("isbn-{}", BookId::new().value()),
        552,
        2,
        copies,
        vec!["Steve Klabnik".to_string()],
        vec!["No Starch Press".to_string()],
        vec!["programming".to_string()],
        now,
        now,
    );
    deps.book_store.insert(&book).await.unwrap();
    book
}

async fn seed_patron(deps: &ServiceDependencies, category: PatronCategory) -> Patron {
    let patron = Patron::new(
        "Jane Smith",
        format!("{}@example.com", PatronId::new().value()),
        category,
        Utc::now(),
    );
    deps.patron_store.insert(&patron).await.unwrap();
    patron
}

fn borrow_cmd(patron: &Patron, book: &Book) -> BorrowBook {
    let now = Utc::now();
    BorrowBook {
        patron_id: patron.patron_id,
        book_id: book.book_id,
        due_date: now + Duration::days(7),
        copies: 1,
        borrowed_at: now,
    }
}

fn return_cmd(patron: &Patron, book: &Book) -> ReturnBook {
    ReturnBook {
        patron_id: patron.patron_id,
        book_id: book.book_id,
        copies: 1,
        returned_at: Utc::now(),
    }
}

async fn stored_book(deps: &ServiceDependencies, book_id: BookId) -> Book {
    deps.book_store
        .get(BookFilter::by_id(book_id))
        .await
        .unwrap()
}

// ============================================================================
// 貸出ワークフロー
// ============================================================================

#[tokio::test]
async fn test_borrow_book_success() {
    let deps = make_deps();
    let book = seed_book(&deps, 3).await;
    let patron = seed_patron(&deps, PatronCategory::student(10.0)).await;

    let transaction = borrow_book(&deps, borrow_cmd(&patron, &book)).await.unwrap();

    assert_eq!(transaction.status, TransactionStatus::Borrowed);
    assert_eq!(transaction.patron_id, patron.patron_id);
    assert_eq!(transaction.book_id, book.book_id);
    assert_eq!(transaction.returned_at, None);

    let stored = stored_book(&deps, book.book_id).await;
    assert_eq!(stored.borrowed_copies, 1);
    assert_eq!(stored.version, book.version + 1);
}

#[tokio::test]
async fn test_borrow_fails_when_book_missing() {
    let deps = make_deps();
    let patron = seed_patron(&deps, PatronCategory::student(10.0)).await;
    let now = Utc::now();

    let cmd = BorrowBook {
        patron_id: patron.patron_id,
        book_id: BookId::new(),
        due_date: now + Duration::days(7),
        copies: 1,
        borrowed_at: now,
    };

    let err = borrow_book(&deps, cmd).await.unwrap_err();
    assert!(matches!(err, CirculationError::BookNotFound));
}

#[tokio::test]
async fn test_borrow_fails_when_patron_missing() {
    let deps = make_deps();
    let book = seed_book(&deps, 1).await;
    let now = Utc::now();

    let cmd = BorrowBook {
        patron_id: PatronId::new(),
        book_id: book.book_id,
        due_date: now + Duration::days(7),
        copies: 1,
        borrowed_at: now,
    };

    let err = borrow_book(&deps, cmd).await.unwrap_err();
    assert!(matches!(err, CirculationError::PatronNotFound));
}

#[tokio::test]
async fn test_borrow_rejects_due_date_out_of_range() {
    let deps = make_deps();
    let book = seed_book(&deps, 1).await;
    let patron = seed_patron(&deps, PatronCategory::student(10.0)).await;
    let now = Utc::now();

    let mut too_soon = borrow_cmd(&patron, &book);
    too_soon.due_date = now + Duration::hours(12);
    assert!(matches!(
        borrow_book(&deps, too_soon).await.unwrap_err(),
        CirculationError::InvalidDueDate(_)
    ));

    let mut too_late = borrow_cmd(&patron, &book);
    too_late.due_date = now + Duration::days(30);
    assert!(matches!(
        borrow_book(&deps, too_late).await.unwrap_err(),
        CirculationError::InvalidDueDate(_)
    ));

    // バリデーションは書き込みより前：取引は一切作られていない
    let (transactions, _) = deps
        .transaction_store
        .get_all(
            TransactionFilter::default(),
            Paginator::unpaged(),
            Sorter::none(),
        )
        .await
        .unwrap();
    assert!(transactions.is_empty());
}

#[tokio::test]
async fn test_borrow_rejects_zero_copies() {
    let deps = make_deps();
    let book = seed_book(&deps, 1).await;
    let patron = seed_patron(&deps, PatronCategory::student(10.0)).await;

    let mut cmd = borrow_cmd(&patron, &book);
    cmd.copies = 0;

    assert!(matches!(
        borrow_book(&deps, cmd).await.unwrap_err(),
        CirculationError::InvalidCopies
    ));
}

#[tokio::test]
async fn test_second_borrow_of_last_copy_is_rejected() {
    let deps = make_deps();
    let book = seed_book(&deps, 1).await;
    let patron_a = seed_patron(&deps, PatronCategory::student(10.0)).await;
    let patron_b = seed_patron(&deps, PatronCategory::teacher(15.0)).await;

    borrow_book(&deps, borrow_cmd(&patron_a, &book)).await.unwrap();

    let err = borrow_book(&deps, borrow_cmd(&patron_b, &book))
        .await
        .unwrap_err();
    assert!(matches!(err, CirculationError::NotEnoughCopies));

    // 不変条件：0 <= borrowed_copies <= copies
    let stored = stored_book(&deps, book.book_id).await;
    assert_eq!(stored.borrowed_copies, 1);
}

#[tokio::test]
async fn test_same_patron_cannot_borrow_same_book_twice() {
    let deps = make_deps();
    let book = seed_book(&deps, 5).await;
    let patron = seed_patron(&deps, PatronCategory::student(10.0)).await;

    borrow_book(&deps, borrow_cmd(&patron, &book)).await.unwrap();

    let err = borrow_book(&deps, borrow_cmd(&patron, &book))
        .await
        .unwrap_err();
    assert!(matches!(err, CirculationError::AlreadyBorrowed));

    // (利用者, 書籍) につき貸出中取引は高々1件
    let (transactions, _) = deps
        .transaction_store
        .get_all(
            TransactionFilter::borrowed_pair(patron.patron_id, book.book_id),
            Paginator::unpaged(),
            Sorter::none(),
        )
        .await
        .unwrap();
    assert_eq!(transactions.len(), 1);
}

#[tokio::test]
async fn test_concurrent_borrows_of_last_copy_yield_one_success() {
    let deps = make_deps();
    let book = seed_book(&deps, 1).await;
    let patron_a = seed_patron(&deps, PatronCategory::student(10.0)).await;
    let patron_b = seed_patron(&deps, PatronCategory::teacher(15.0)).await;

    let (first, second) = tokio::join!(
        borrow_book(&deps, borrow_cmd(&patron_a, &book)),
        borrow_book(&deps, borrow_cmd(&patron_b, &book)),
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one concurrent borrow may succeed");

    for result in [first, second] {
        if let Err(err) = result {
            assert!(matches!(
                err,
                CirculationError::NotEnoughCopies | CirculationError::EditConflict
            ));
        }
    }

    // 不変条件は守られている
    let stored = stored_book(&deps, book.book_id).await;
    assert_eq!(stored.borrowed_copies, 1);
}

// ============================================================================
// 返却ワークフロー
// ============================================================================

#[tokio::test]
async fn test_borrow_then_return_round_trip() {
    let deps = make_deps();
    let book = seed_book(&deps, 1).await;
    let patron = seed_patron(&deps, PatronCategory::student(10.0)).await;

    borrow_book(&deps, borrow_cmd(&patron, &book)).await.unwrap();
    let returned = return_book(&deps, return_cmd(&patron, &book)).await.unwrap();

    assert_eq!(returned.status, TransactionStatus::Returned);
    assert!(returned.returned_at.is_some());

    let stored = stored_book(&deps, book.book_id).await;
    assert_eq!(stored.borrowed_copies, 0);

    let persisted = deps
        .transaction_store
        .get(TransactionFilter::by_id(returned.transaction_id))
        .await
        .unwrap();
    assert_eq!(persisted.status, TransactionStatus::Returned);
    assert!(persisted.returned_at.is_some());
}

#[tokio::test]
async fn test_second_return_fails_with_not_found() {
    let deps = make_deps();
    let book = seed_book(&deps, 1).await;
    let patron = seed_patron(&deps, PatronCategory::student(10.0)).await;

    borrow_book(&deps, borrow_cmd(&patron, &book)).await.unwrap();
    return_book(&deps, return_cmd(&patron, &book)).await.unwrap();

    // 2回目の返却：返すべき貸出中取引はもう存在しない
    let err = return_book(&deps, return_cmd(&patron, &book))
        .await
        .unwrap_err();
    assert!(matches!(err, CirculationError::TransactionNotFound));
}

#[tokio::test]
async fn test_return_without_borrow_fails_with_not_found() {
    let deps = make_deps();
    let book = seed_book(&deps, 1).await;
    let patron = seed_patron(&deps, PatronCategory::student(10.0)).await;

    let err = return_book(&deps, return_cmd(&patron, &book))
        .await
        .unwrap_err();
    assert!(matches!(err, CirculationError::TransactionNotFound));
}

#[tokio::test]
async fn test_return_rejects_more_copies_than_borrowed() {
    let deps = make_deps();
    let book = seed_book(&deps, 3).await;
    let patron = seed_patron(&deps, PatronCategory::student(10.0)).await;

    borrow_book(&deps, borrow_cmd(&patron, &book)).await.unwrap();

    let mut cmd = return_cmd(&patron, &book);
    cmd.copies = 2;

    let err = return_book(&deps, cmd).await.unwrap_err();
    assert!(matches!(err, CirculationError::TooManyReturnedCopies));

    // カウンタは変化していない
    let stored = stored_book(&deps, book.book_id).await;
    assert_eq!(stored.borrowed_copies, 1);
}

// ============================================================================
// 補償（サーガ）の検証
// ============================================================================

/// 更新が常に競合する書籍ストアのラッパー
///
/// 貸出・返却の書籍更新ステップを強制的に失敗させ、
/// 補償が走ることを確認するために使う。
struct ConflictingBookStore {
    inner: BookStore,
}

#[async_trait::async_trait]
impl BookStoreTrait for ConflictingBookStore {
    async fn get(&self, filter: BookFilter) -> StoreResult<Book> {
        self.inner.get(filter).await
    }

    async fn get_all(
        &self,
        filter: BookFilter,
        paginator: Paginator,
        sorter: Sorter,
    ) -> StoreResult<(Vec<Book>, Metadata)> {
        self.inner.get_all(filter, paginator, sorter).await
    }

    async fn insert(&self, book: &Book) -> StoreResult<BookId> {
        self.inner.insert(book).await
    }

    async fn update(&self, _filter: BookFilter, _book: &Book) -> StoreResult<()> {
        Err(StoreError::EditConflict)
    }

    async fn delete(&self, filter: BookFilter) -> StoreResult<()> {
        self.inner.delete(filter).await
    }
}

#[tokio::test]
async fn test_borrow_compensates_transaction_insert_on_book_conflict() {
    let conflicting = ConflictingBookStore {
        inner: BookStore::new(),
    };
    let deps = ServiceDependencies {
        book_store: Arc::new(conflicting),
        patron_store: Arc::new(PatronStore::new()),
        transaction_store: Arc::new(TransactionStore::new()),
    };
    let book = seed_book(&deps, 1).await;
    let patron = seed_patron(&deps, PatronCategory::student(10.0)).await;

    let err = borrow_book(&deps, borrow_cmd(&patron, &book))
        .await
        .unwrap_err();
    assert!(matches!(err, CirculationError::EditConflict));

    // 部分的な効果は観測されない：孤児の取引レコードなし
    let (transactions, _) = deps
        .transaction_store
        .get_all(
            TransactionFilter::default(),
            Paginator::unpaged(),
            Sorter::none(),
        )
        .await
        .unwrap();
    assert!(transactions.is_empty());

    let stored = stored_book(&deps, book.book_id).await;
    assert_eq!(stored.borrowed_copies, 0);
}

#[tokio::test]
async fn test_return_compensates_transaction_close_on_book_conflict() {
    // まず通常のストアで貸出を成立させる
    let book_store = Arc::new(BookStore::new());
    let patron_store = Arc::new(PatronStore::new());
    let transaction_store = Arc::new(TransactionStore::new());

    let deps = ServiceDependencies {
        book_store: book_store.clone(),
        patron_store: patron_store.clone(),
        transaction_store: transaction_store.clone(),
    };
    let book = seed_book(&deps, 1).await;
    let patron = seed_patron(&deps, PatronCategory::student(10.0)).await;
    let transaction = borrow_book(&deps, borrow_cmd(&patron, &book)).await.unwrap();

    // 返却時の書籍更新だけを失敗させる
    let failing_deps = ServiceDependencies {
        book_store: Arc::new(ConflictingBookStore {
            inner: BookStore::new(),
        }),
        patron_store: patron_store.clone(),
        transaction_store: transaction_store.clone(),
    };
    // ラッパー内のstoreには書籍がないため、元のストアの書籍を移す
    failing_deps.book_store.insert(&{
        let mut seeded = stored_book(&deps, book.book_id).await;
        seeded.version = 1;
        seeded
    })
    .await
    .unwrap();

    let err = return_book(&failing_deps, return_cmd(&patron, &book))
        .await
        .unwrap_err();
    assert!(matches!(err, CirculationError::EditConflict));

    // 補償により取引はBorrowedへ戻っている
    let persisted = transaction_store
        .get(TransactionFilter::by_id(transaction.transaction_id))
        .await
        .unwrap();
    assert_eq!(persisted.status, TransactionStatus::Borrowed);
    assert_eq!(persisted.returned_at, None);
}

// ============================================================================
// 返却期限の変更
// ============================================================================

#[tokio::test]
async fn test_reschedule_due_date_success() {
    let deps = make_deps();
    let book = seed_book(&deps, 1).await;
    let patron = seed_patron(&deps, PatronCategory::student(10.0)).await;
    let transaction = borrow_book(&deps, borrow_cmd(&patron, &book)).await.unwrap();

    let now = Utc::now();
    let new_due_date = now + Duration::days(10);
    let updated = reschedule_due_date(
        &deps,
        RescheduleDueDate {
            transaction_id: transaction.transaction_id,
            new_due_date,
            rescheduled_at: now,
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.due_date, new_due_date);
    assert_eq!(updated.status, TransactionStatus::Borrowed);
}

#[tokio::test]
async fn test_reschedule_returned_transaction_is_rejected() {
    let deps = make_deps();
    let book = seed_book(&deps, 1).await;
    let patron = seed_patron(&deps, PatronCategory::student(10.0)).await;
    let transaction = borrow_book(&deps, borrow_cmd(&patron, &book)).await.unwrap();
    return_book(&deps, return_cmd(&patron, &book)).await.unwrap();

    let now = Utc::now();
    let err = reschedule_due_date(
        &deps,
        RescheduleDueDate {
            transaction_id: transaction.transaction_id,
            new_due_date: now + Duration::days(10),
            rescheduled_at: now,
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CirculationError::AlreadyReturned));
}

#[tokio::test]
async fn test_reschedule_missing_transaction_is_not_found() {
    let deps = make_deps();
    let now = Utc::now();

    let err = reschedule_due_date(
        &deps,
        RescheduleDueDate {
            transaction_id: rusty_library_backend::domain::TransactionId::new(),
            new_due_date: now + Duration::days(10),
            rescheduled_at: now,
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CirculationError::TransactionNotFound));
}

// ============================================================================
// 利用者サマリと延滞料金
// ============================================================================

#[tokio::test]
async fn test_patron_summary_applies_discount_to_total() {
    let deps = make_deps();
    let patron = seed_patron(&deps, PatronCategory::teacher(20.0)).await;
    let now = Utc::now();

    // 10日延滞した取引を直接仕込む
    let mut transaction = open_transaction(
        patron.patron_id,
        BookId::new(),
        now + Duration::days(7),
        now,
    );
    transaction.due_date = now - Duration::days(10);
    deps.transaction_store.insert(&transaction).await.unwrap();

    let cost = CostConfig::new(15.0, 10.0, 20.0).unwrap();
    let summary = patron_summary(&deps, &cost, patron.patron_id, now)
        .await
        .unwrap();

    assert_eq!(summary.transactions.len(), 1);
    // 割引前：ceil(10日) * 15 = 150
    assert_eq!(summary.transactions[0].fine, 150.0);
    // 合計に20%割引を一度だけ適用：150 * 0.8 = 120
    assert_eq!(summary.total_fine, 120.0);
}

#[tokio::test]
async fn test_patron_summary_with_no_transactions() {
    let deps = make_deps();
    let patron = seed_patron(&deps, PatronCategory::student(10.0)).await;

    let cost = CostConfig::new(15.0, 10.0, 20.0).unwrap();
    let summary = patron_summary(&deps, &cost, patron.patron_id, Utc::now())
        .await
        .unwrap();

    assert!(summary.transactions.is_empty());
    assert_eq!(summary.total_fine, 0.0);
}

#[tokio::test]
async fn test_patron_summary_sums_multiple_fines_before_discount() {
    let deps = make_deps();
    let patron = seed_patron(&deps, PatronCategory::student(10.0)).await;
    let now = Utc::now();

    // 5日延滞と期限内の取引
    let mut overdue = open_transaction(
        patron.patron_id,
        BookId::new(),
        now + Duration::days(7),
        now,
    );
    overdue.due_date = now - Duration::days(5);
    deps.transaction_store.insert(&overdue).await.unwrap();

    let on_time = open_transaction(
        patron.patron_id,
        BookId::new(),
        now + Duration::days(7),
        now,
    );
    deps.transaction_store.insert(&on_time).await.unwrap();

    let cost = CostConfig::new(2.0, 10.0, 20.0).unwrap();
    let summary = patron_summary(&deps, &cost, patron.patron_id, now)
        .await
        .unwrap();

    assert_eq!(summary.transactions.len(), 2);
    // 5日 * 2.0 = 10、期限内は0、合計10に10%割引で9
    let fines: f64 = summary.transactions.iter().map(|t| t.fine).sum();
    assert_eq!(fines, 10.0);
    assert_eq!(summary.total_fine, 9.0);
}

#[tokio::test]
async fn test_patron_summary_missing_patron_is_not_found() {
    let deps = make_deps();
    let cost = CostConfig::new(15.0, 10.0, 20.0).unwrap();

    let err = patron_summary(&deps, &cost, PatronId::new(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, CirculationError::PatronNotFound));
}
