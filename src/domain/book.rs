use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BookId;

/// 書籍集約 - 蔵書1タイトル分の書誌情報と部数
///
/// 不変条件：`0 <= borrowed_copies <= copies`。
/// 部数カウンタを書き換えるのは貸出・返却ワークフローのみで、
/// 書誌フィールドはカタログ編集でのみ変更される。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    // 識別子
    pub book_id: BookId,

    // 書誌情報
    pub title: String,
    pub isbn: String,
    pub pages: i32,
    pub edition: i32,
    pub authors: Vec<String>,
    pub publishers: Vec<String>,
    pub genres: Vec<String>,
    pub published_at: DateTime<Utc>,

    // 部数管理の責務
    pub copies: i32,
    pub borrowed_copies: i32,

    // 楽観的並行性制御
    pub version: i32,

    // 監査情報
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// 新しい書籍を作成する
    ///
    /// 貸出部数は0、バージョンは1で開始する。
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: impl Into<String>,
        isbn: impl Into<String>,
        pages: i32,
        edition: i32,
        copies: i32,
        authors: Vec<String>,
        publishers: Vec<String>,
        genres: Vec<String>,
        published_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            book_id: BookId::new(),
            title: title.into(),
            isbn: isbn.into(),
            pages,
            edition,
            authors,
            publishers,
            genres,
            published_at,
            copies,
            borrowed_copies: 0,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 純粋関数：貸出可否の判定
///
/// ビジネスルール（入場制御）：
/// `borrowed_copies + requested_copies <= copies` の場合のみ貸出可能。
pub fn can_borrow(book: &Book, requested_copies: i32) -> bool {
    book.borrowed_copies + requested_copies <= book.copies
}
