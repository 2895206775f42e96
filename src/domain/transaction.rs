use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{
    BookId, CloseTransactionError, DueDateError, PatronId, RescheduleDueDateError, TransactionId,
    TransactionStatus,
};

/// 返却期限の最短日数
pub const MIN_DUE_DAYS: i64 = 1;
/// 返却期限の最長日数
pub const MAX_DUE_DAYS: i64 = 14;

/// 貸出取引集約 - 1利用者・1書籍の貸出から返却まで
///
/// 書籍・利用者へはIDのみで参照する（埋め込みなし）。
/// `returned_at` はReturned状態のときのみ意味を持つ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    // 識別子
    pub transaction_id: TransactionId,

    // 他の集約への参照（IDのみ）
    pub patron_id: PatronId,
    pub book_id: BookId,

    // 貸出管理の責務
    pub status: TransactionStatus,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,

    // 楽観的並行性制御
    pub version: i32,

    // 監査情報
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 純粋関数：返却期限のバリデーション
///
/// ビジネスルール：返却期限は現在時刻から1日超・14日未満の範囲に
/// 収まっていること。違反はクライアント入力エラーであり、
/// ワークフロー開始前（いかなる書き込みよりも前）に検査される。
pub fn validate_due_date(due_date: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), DueDateError> {
    if due_date <= now + Duration::days(MIN_DUE_DAYS) {
        return Err(DueDateError::TooSoon);
    }
    if due_date >= now + Duration::days(MAX_DUE_DAYS) {
        return Err(DueDateError::TooLate);
    }
    Ok(())
}

/// 純粋関数：貸出取引を開始する
///
/// ビジネスルール：
/// - ステータスはBorrowed
/// - borrowed_atは現在時刻
///
/// 副作用なし。新しいTransactionを返す。
pub fn open_transaction(
    patron_id: PatronId,
    book_id: BookId,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Transaction {
    Transaction {
        transaction_id: TransactionId::new(),
        patron_id,
        book_id,
        status: TransactionStatus::Borrowed,
        borrowed_at: now,
        due_date,
        returned_at: None,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

/// 純粋関数：貸出取引を返却で閉じる
///
/// ビジネスルール：
/// - 既に返却済みの取引は閉じられない
/// - 延滞していても返却は受け付ける
///
/// 副作用なし。新しいTransactionを返す。
pub fn close_transaction(
    transaction: &Transaction,
    returned_at: DateTime<Utc>,
) -> Result<Transaction, CloseTransactionError> {
    if transaction.status.is_returned() {
        return Err(CloseTransactionError::AlreadyReturned);
    }

    Ok(Transaction {
        status: TransactionStatus::Returned,
        returned_at: Some(returned_at),
        updated_at: returned_at,
        ..transaction.clone()
    })
}

/// 純粋関数：返却期限を変更する
///
/// ビジネスルール：Returned状態の取引は期限変更不可。
/// 新しい期限のバリデーションは呼び出し側（ワークフロー）が行う。
pub fn reschedule_due_date(
    transaction: &Transaction,
    new_due_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Transaction, RescheduleDueDateError> {
    if transaction.status.is_returned() {
        return Err(RescheduleDueDateError::AlreadyReturned);
    }

    Ok(Transaction {
        due_date: new_due_date,
        updated_at: now,
        ..transaction.clone()
    })
}

/// 純粋関数：延滞判定
pub fn is_overdue(transaction: &Transaction, now: DateTime<Utc>) -> bool {
    !transaction.status.is_returned() && now > transaction.due_date
}
