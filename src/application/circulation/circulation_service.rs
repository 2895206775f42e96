use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::commands::{BorrowBook, RescheduleDueDate, ReturnBook};
use crate::domain::transaction::{self, Transaction};
use crate::domain::{book, patron::Patron};
use crate::ports::{
    BookFilter, BookStore, PatronFilter, PatronStore, StoreError, TransactionFilter,
    TransactionStore,
};

use super::errors::{CirculationError, Result};

/// ストア1呼び出しあたりの期限
pub const STORE_DEADLINE: Duration = Duration::from_secs(10);

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞い（メソッド）は持たず、純粋な関数に依存関係を渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub book_store: Arc<dyn BookStore>,
    pub patron_store: Arc<dyn PatronStore>,
    pub transaction_store: Arc<dyn TransactionStore>,
}

/// ストア呼び出しに期限を課すヘルパー関数
///
/// 期限超過は`StoreError::Timeout`として呼び出し側に見える。
/// ここでリトライはしない。
pub async fn with_deadline<T, F>(operation: F) -> crate::ports::Result<T>
where
    F: Future<Output = crate::ports::Result<T>>,
{
    match tokio::time::timeout(STORE_DEADLINE, operation).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout),
    }
}

/// 書籍IDで書籍を取得するヘルパー関数
///
/// borrow_book / return_book で共通利用される。
/// NotFoundはワークフロー語彙（BookNotFound）に写像する。
async fn load_book(
    deps: &ServiceDependencies,
    book_id: crate::domain::BookId,
) -> Result<book::Book> {
    with_deadline(deps.book_store.get(BookFilter::by_id(book_id)))
        .await
        .map_err(|err| match err {
            StoreError::NotFound => CirculationError::BookNotFound,
            other => CirculationError::Store(other),
        })
}

/// 利用者IDで利用者を取得するヘルパー関数
async fn load_patron(
    deps: &ServiceDependencies,
    patron_id: crate::domain::PatronId,
) -> Result<Patron> {
    with_deadline(deps.patron_store.get(PatronFilter::by_id(patron_id)))
        .await
        .map_err(|err| match err {
            StoreError::NotFound => CirculationError::PatronNotFound,
            other => CirculationError::Store(other),
        })
}

/// 書籍を借りる（状態遷移：なし -> Borrowed）
///
/// ビジネスルール：
/// - 返却期限は現在から1日超・14日未満
/// - 書籍・利用者が存在すること
/// - 同一利用者・同一書籍の貸出中取引が存在しないこと
/// - 貸出可能な部数が残っていること（入場制御）
///
/// # 一貫性保証
///
/// 取引挿入と書籍の部数更新は補償付きサーガとして実行される。
/// 書籍更新が失敗した場合（並行更新によるEditConflictを含む）、
/// 挿入済みの取引を削除してから失敗を返すため、部分的な効果は
/// 外部から観測されない。
///
/// EditConflictは**呼び出し側が**再試行する。入場判定が古く
/// なっている可能性があるため、ここで自動リトライはしない。
pub async fn borrow_book(deps: &ServiceDependencies, cmd: BorrowBook) -> Result<Transaction> {
    // 1. 入力バリデーション（いかなる書き込みよりも前）
    if cmd.copies < 1 {
        return Err(CirculationError::InvalidCopies);
    }
    transaction::validate_due_date(cmd.due_date, cmd.borrowed_at)
        .map_err(|err| CirculationError::InvalidDueDate(err.to_string()))?;

    // 2. 書籍・利用者の存在確認
    let book = load_book(deps, cmd.book_id).await?;
    load_patron(deps, cmd.patron_id).await?;

    // 3. 貸出中取引の重複確認（(利用者, 書籍) につき高々1件）
    match with_deadline(
        deps.transaction_store
            .get(TransactionFilter::borrowed_pair(cmd.patron_id, cmd.book_id)),
    )
    .await
    {
        Ok(_) => return Err(CirculationError::AlreadyBorrowed),
        Err(StoreError::NotFound) => {}
        Err(other) => return Err(CirculationError::Store(other)),
    }

    // 4. 入場制御
    if !book::can_borrow(&book, cmd.copies) {
        return Err(CirculationError::NotEnoughCopies);
    }

    // 5. 取引を作成して挿入
    let transaction =
        transaction::open_transaction(cmd.patron_id, cmd.book_id, cmd.due_date, cmd.borrowed_at);
    with_deadline(deps.transaction_store.insert(&transaction))
        .await
        .map_err(CirculationError::from_store)?;

    // 6. 書籍の貸出部数を楽観的並行性制御つきで更新
    let mut updated_book = book.clone();
    updated_book.borrowed_copies += cmd.copies;

    if let Err(err) = with_deadline(
        deps.book_store
            .update(BookFilter::by_id(book.book_id), &updated_book),
    )
    .await
    {
        // 補償：孤児になる取引レコードを取り除いてから失敗を返す
        if let Err(compensation_err) = with_deadline(
            deps.transaction_store
                .delete(TransactionFilter::by_id(transaction.transaction_id)),
        )
        .await
        {
            tracing::error!(
                transaction_id = %transaction.transaction_id.value(),
                error = %compensation_err,
                "failed to delete transaction while compensating a borrow",
            );
        }
        return Err(CirculationError::from_store(err));
    }

    Ok(transaction)
}

/// 書籍を返却する（状態遷移：Borrowed -> Returned）
///
/// ビジネスルール：
/// - 書籍・利用者が存在すること
/// - (利用者, 書籍) の貸出中取引が存在すること
/// - 返却部数が貸出中の部数を超えないこと（部数カウンタが
///   負にならないことの保証）
///
/// # 一貫性保証
///
/// 取引のクローズと書籍の部数更新は補償付きサーガとして実行される。
/// 書籍更新が失敗した場合は取引をBorrowedに戻してから失敗を返す。
pub async fn return_book(deps: &ServiceDependencies, cmd: ReturnBook) -> Result<Transaction> {
    // 1. 入力バリデーション
    if cmd.copies < 1 {
        return Err(CirculationError::InvalidCopies);
    }

    // 2. 書籍・利用者の存在確認
    let book = load_book(deps, cmd.book_id).await?;
    load_patron(deps, cmd.patron_id).await?;

    // 3. 返却対象の貸出中取引を特定
    let transaction = with_deadline(
        deps.transaction_store
            .get(TransactionFilter::borrowed_pair(cmd.patron_id, cmd.book_id)),
    )
    .await
    .map_err(|err| match err {
        StoreError::NotFound => CirculationError::TransactionNotFound,
        other => CirculationError::Store(other),
    })?;

    // 4. 部数カウンタの下限を守る
    if cmd.copies > book.borrowed_copies {
        return Err(CirculationError::TooManyReturnedCopies);
    }

    // 5. 取引をReturnedへ遷移
    let closed = transaction::close_transaction(&transaction, cmd.returned_at)
        .map_err(|_| CirculationError::AlreadyReturned)?;

    with_deadline(
        deps.transaction_store
            .update(TransactionFilter::by_id(transaction.transaction_id), &closed),
    )
    .await
    .map_err(CirculationError::from_store)?;

    // 6. 書籍の貸出部数を楽観的並行性制御つきで更新
    let mut updated_book = book.clone();
    updated_book.borrowed_copies -= cmd.copies;

    if let Err(err) = with_deadline(
        deps.book_store
            .update(BookFilter::by_id(book.book_id), &updated_book),
    )
    .await
    {
        // 補償：取引をBorrowedへ戻す。直前の更新でバージョンは
        // 1加算されているため、その値を述語として書き戻す。
        let mut reopened = transaction.clone();
        reopened.version = transaction.version + 1;

        if let Err(compensation_err) = with_deadline(
            deps.transaction_store
                .update(TransactionFilter::by_id(transaction.transaction_id), &reopened),
        )
        .await
        {
            tracing::error!(
                transaction_id = %transaction.transaction_id.value(),
                error = %compensation_err,
                "failed to reopen transaction while compensating a return",
            );
        }
        return Err(CirculationError::from_store(err));
    }

    Ok(closed)
}

/// 取引の返却期限を変更する
///
/// ビジネスルール：
/// - 新しい期限は現在から1日超・14日未満
/// - 取引が存在すること
/// - Returned状態の取引は期限変更不可
pub async fn reschedule_due_date(
    deps: &ServiceDependencies,
    cmd: RescheduleDueDate,
) -> Result<Transaction> {
    // 1. 入力バリデーション
    transaction::validate_due_date(cmd.new_due_date, cmd.rescheduled_at)
        .map_err(|err| CirculationError::InvalidDueDate(err.to_string()))?;

    // 2. 取引の取得
    let transaction = with_deadline(
        deps.transaction_store
            .get(TransactionFilter::by_id(cmd.transaction_id)),
    )
    .await
    .map_err(|err| match err {
        StoreError::NotFound => CirculationError::TransactionNotFound,
        other => CirculationError::Store(other),
    })?;

    // 3. ドメイン層の純粋関数を呼び出し
    let rescheduled =
        transaction::reschedule_due_date(&transaction, cmd.new_due_date, cmd.rescheduled_at)
            .map_err(|_| CirculationError::AlreadyReturned)?;

    // 4. 楽観的並行性制御つきで永続化
    with_deadline(
        deps.transaction_store
            .update(TransactionFilter::by_id(cmd.transaction_id), &rescheduled),
    )
    .await
    .map_err(CirculationError::from_store)?;

    // 5. 更新後の状態（加算済みバージョン）を読み直して返す
    with_deadline(
        deps.transaction_store
            .get(TransactionFilter::by_id(cmd.transaction_id)),
    )
    .await
    .map_err(|err| match err {
        StoreError::NotFound => CirculationError::TransactionNotFound,
        other => CirculationError::Store(other),
    })
}
