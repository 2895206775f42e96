use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::Result;
use super::paging::{Metadata, Paginator, Sorter};
use crate::domain::transaction::Transaction;
use crate::domain::{BookId, PatronId, TransactionId, TransactionStatus};

/// 貸出取引の検索フィルタ
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub id: Option<TransactionId>,
    pub patron_id: Option<PatronId>,
    pub book_id: Option<BookId>,
    pub status: Option<TransactionStatus>,
    pub min_borrowed_at: Option<DateTime<Utc>>,
    pub max_borrowed_at: Option<DateTime<Utc>>,
    pub min_due_date: Option<DateTime<Utc>>,
    pub max_due_date: Option<DateTime<Utc>>,
    pub version: Option<i32>,
}

impl TransactionFilter {
    pub fn by_id(id: TransactionId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_patron(patron_id: PatronId) -> Self {
        Self {
            patron_id: Some(patron_id),
            ..Self::default()
        }
    }

    /// (利用者, 書籍) の貸出中取引を指すフィルタ
    ///
    /// 不変条件により高々1件しか存在しない。
    pub fn borrowed_pair(patron_id: PatronId, book_id: BookId) -> Self {
        Self {
            patron_id: Some(patron_id),
            book_id: Some(book_id),
            status: Some(TransactionStatus::Borrowed),
            ..Self::default()
        }
    }
}

/// 貸出取引ストアポート
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// フィルタに一致する単一の取引を取得する
    async fn get(&self, filter: TransactionFilter) -> Result<Transaction>;

    /// フィルタに一致する取引一覧をページング・ソート付きで取得する
    async fn get_all(
        &self,
        filter: TransactionFilter,
        paginator: Paginator,
        sorter: Sorter,
    ) -> Result<(Vec<Transaction>, Metadata)>;

    /// 新しい取引を挿入する
    async fn insert(&self, transaction: &Transaction) -> Result<TransactionId>;

    /// 取引を更新する（楽観的並行性制御、書籍ストアと同じ規約）
    ///
    /// 書き込み対象は due_date / returned_at / status のみ。
    async fn update(&self, filter: TransactionFilter, transaction: &Transaction) -> Result<()>;

    /// フィルタに一致する取引を削除する
    async fn delete(&self, filter: TransactionFilter) -> Result<()>;
}
