use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, PatronId, TransactionId};

/// コマンド：書籍を借りる
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowBook {
    pub patron_id: PatronId,
    pub book_id: BookId,
    pub due_date: DateTime<Utc>,
    pub copies: i32,
    pub borrowed_at: DateTime<Utc>,
}

/// コマンド：書籍を返却する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnBook {
    pub patron_id: PatronId,
    pub book_id: BookId,
    pub copies: i32,
    pub returned_at: DateTime<Utc>,
}

/// コマンド：取引の返却期限を変更する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleDueDate {
    pub transaction_id: TransactionId,
    pub new_due_date: DateTime<Utc>,
    pub rescheduled_at: DateTime<Utc>,
}
