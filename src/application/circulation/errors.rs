use thiserror::Error;

use crate::ports::StoreError;

/// 貸出・返却ワークフローのエラー
///
/// すべてのバリアントはそのままワークフロー境界まで伝播する。
/// ワークフロー自身がリトライすることはない（EditConflictの時点で
/// 入場判定が古くなっている可能性があるため、再試行は呼び出し側の責務）。
#[derive(Debug, Error)]
pub enum CirculationError {
    /// 書籍が存在しない
    #[error("book not found")]
    BookNotFound,

    /// 利用者が存在しない
    #[error("patron not found")]
    PatronNotFound,

    /// 取引が存在しない（返却対象の貸出中取引がない場合を含む）
    #[error("transaction not found")]
    TransactionNotFound,

    /// 入場制御：貸出可能な部数が足りない
    #[error("not enough copies of the book are available for borrowing")]
    NotEnoughCopies,

    /// 同一利用者・同一書籍の貸出中取引が既に存在する
    #[error("patron already has an open loan for this book")]
    AlreadyBorrowed,

    /// 返却期限が許容範囲外
    #[error("invalid due date: {0}")]
    InvalidDueDate(String),

    /// 部数指定が1未満
    #[error("copies must be at least 1")]
    InvalidCopies,

    /// 返却部数が貸出中の部数を超えている
    #[error("returned copies exceed the number of copies currently borrowed")]
    TooManyReturnedCopies,

    /// 返却済みの取引に対する操作
    #[error("transaction has already been returned")]
    AlreadyReturned,

    /// 不明な利用者カテゴリ
    #[error("unknown patron category: {0}")]
    UnknownCategory(String),

    /// 楽観的並行性制御の競合。呼び出し側が再取得のうえ再試行する
    #[error("edit conflict, please try again")]
    EditConflict,

    /// ストアのエラー（重複キー、タイムアウト、バックエンド障害）
    #[error("store error")]
    Store(#[source] StoreError),
}

impl CirculationError {
    /// ストアエラーを昇格する
    ///
    /// EditConflictはワークフロー語彙に写像し、それ以外は
    /// 出所を保ったままラップする。
    pub(crate) fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::EditConflict => CirculationError::EditConflict,
            other => CirculationError::Store(other),
        }
    }
}

/// 貸出管理アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, CirculationError>;
