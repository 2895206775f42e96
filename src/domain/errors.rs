/// 返却期限バリデーションのエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueDateError {
    /// 現在時刻から1日未満
    TooSoon,
    /// 現在時刻から14日を超えている
    TooLate,
}

impl std::fmt::Display for DueDateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DueDateError::TooSoon => write!(f, "due date must be at least 1 day from now"),
            DueDateError::TooLate => write!(f, "due date must be no more than 14 days from now"),
        }
    }
}

impl std::error::Error for DueDateError {}

/// 返却のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseTransactionError {
    /// 既に返却済み
    AlreadyReturned,
}

/// 返却期限変更のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescheduleDueDateError {
    /// 返却済みの取引は期限変更不可
    AlreadyReturned,
}
