use thiserror::Error;

/// エンティティストアの共通エラー分類
///
/// すべてのストア実装（PostgreSQL、インメモリ）はこの型に
/// エラーをマップする。呼び出し側はバリアントで分岐し、
/// メッセージ文字列には依存しない。
#[derive(Debug, Error)]
pub enum StoreError {
    /// フィルタに一致するドキュメントが存在しない
    #[error("document not found")]
    NotFound,

    /// 同一IDのドキュメントが既に存在する
    #[error("duplicate id")]
    DuplicateId,

    /// 同一ISBNの書籍が既に存在する
    #[error("duplicate isbn")]
    DuplicateIsbn,

    /// 同一メールアドレスの利用者が既に存在する
    #[error("duplicate email")]
    DuplicateEmail,

    /// 楽観的並行性制御の競合（バージョン不一致、0件更新）
    #[error("edit conflict")]
    EditConflict,

    /// 許可リストにないソートフィールド
    #[error("unsupported sort field: {0}")]
    UnsupportedSortField(String),

    /// ストア操作が期限内に完了しなかった
    #[error("store operation timed out")]
    Timeout,

    /// ストアのバックエンドエラー
    #[error("store backend error")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, StoreError>;
