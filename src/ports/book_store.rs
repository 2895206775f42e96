use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::Result;
use super::paging::{Metadata, Paginator, Sorter};
use crate::domain::BookId;
use crate::domain::book::Book;

/// 書籍の検索フィルタ
///
/// 各フィールドは等価またはmin/max範囲の疎な述語。Noneは「条件なし」。
/// `version`はストア実装が楽観的並行性制御の述語として使う。
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub id: Option<BookId>,
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub genre: Option<String>,
    pub min_pages: Option<i32>,
    pub max_pages: Option<i32>,
    pub min_edition: Option<i32>,
    pub max_edition: Option<i32>,
    pub min_published_at: Option<DateTime<Utc>>,
    pub max_published_at: Option<DateTime<Utc>>,
    pub min_copies: Option<i32>,
    pub max_copies: Option<i32>,
    pub min_borrowed_copies: Option<i32>,
    pub max_borrowed_copies: Option<i32>,
    pub version: Option<i32>,
}

impl BookFilter {
    pub fn by_id(id: BookId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }
}

/// 書籍ストアポート
///
/// 永続化の抽象。`update`は読み出し時のバージョンを述語に含める
/// 楽観的並行性制御を実装しなければならない。
#[async_trait]
pub trait BookStore: Send + Sync {
    /// フィルタに一致する単一の書籍を取得する
    ///
    /// 一致なしは`StoreError::NotFound`。複数一致時は最初の1件。
    async fn get(&self, filter: BookFilter) -> Result<Book>;

    /// フィルタに一致する書籍一覧をページング・ソート付きで取得する
    async fn get_all(
        &self,
        filter: BookFilter,
        paginator: Paginator,
        sorter: Sorter,
    ) -> Result<(Vec<Book>, Metadata)>;

    /// 新しい書籍を挿入する
    ///
    /// created_at / updated_at を現在時刻で刻印する。
    /// ID・ISBNの一意性違反はDuplicate系エラー。
    async fn insert(&self, book: &Book) -> Result<BookId>;

    /// 書籍を更新する（楽観的並行性制御）
    ///
    /// フィルタと`book.version`（呼び出し側が読み出した時点の値）の
    /// 両方に一致した場合のみ書き込む。0件一致は`EditConflict`。
    /// 成功時はバージョンを1加算し、updated_atを更新する。
    /// 書き込み対象は固定の許可フィールドのみ（created_at・IDは不変）。
    async fn update(&self, filter: BookFilter, book: &Book) -> Result<()>;

    /// フィルタに一致する書籍を削除する
    async fn delete(&self, filter: BookFilter) -> Result<()>;
}
