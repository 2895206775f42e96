use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 書籍ID - 蔵書管理の集約ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(Uuid);

impl BookId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

/// 利用者ID - 利用者管理の集約ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatronId(Uuid);

impl PatronId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for PatronId {
    fn default() -> Self {
        Self::new()
    }
}

/// 貸出取引ID - 貸出・返却取引の集約ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

/// 取引ステータス
///
/// 閉じた2状態のenum。Borrowed -> Returned の一方向にのみ遷移する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// 貸出中
    Borrowed,
    /// 返却済み
    Returned,
}

impl TransactionStatus {
    /// 文字列表現を取得する
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Borrowed => "borrowed",
            TransactionStatus::Returned => "returned",
        }
    }

    pub fn is_returned(&self) -> bool {
        matches!(self, TransactionStatus::Returned)
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "borrowed" => Ok(TransactionStatus::Borrowed),
            "returned" => Ok(TransactionStatus::Returned),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

/// 不明な利用者カテゴリのエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategoryError(pub String);

impl std::fmt::Display for UnknownCategoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown patron category: {}", self.0)
    }
}

impl std::error::Error for UnknownCategoryError {}

/// 利用者カテゴリ
///
/// 閉じたバリアント型：Student / Teacher のみ。クラス階層ではなく
/// 割引率を持つタグ付きの直和型として表現し、構造化サブドキュメント
/// としてそのまま永続化される。
///
/// `discount()` は割引率（0〜1の割合）を返す。割引率そのものは
/// このレベルではバリデーションしない（設定読み込み時に検証済み）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PatronCategory {
    Student { discount_percentage: f64 },
    Teacher { discount_percentage: f64 },
}

impl PatronCategory {
    pub fn student(discount_percentage: f64) -> Self {
        Self::Student {
            discount_percentage,
        }
    }

    pub fn teacher(discount_percentage: f64) -> Self {
        Self::Teacher {
            discount_percentage,
        }
    }

    /// カテゴリ種別の文字列表現
    pub fn kind(&self) -> &'static str {
        match self {
            PatronCategory::Student { .. } => "student",
            PatronCategory::Teacher { .. } => "teacher",
        }
    }

    /// 割引率（割合）を返す
    ///
    /// パーセンテージを100で割った値。負のパーセンテージが設定されて
    /// いればそのまま負の割合を返す。
    pub fn discount(&self) -> f64 {
        match self {
            PatronCategory::Student {
                discount_percentage,
            }
            | PatronCategory::Teacher {
                discount_percentage,
            } => discount_percentage / 100.0,
        }
    }

    /// カテゴリ種別文字列からカテゴリを構築する
    ///
    /// 割引率は種別ごとに設定値から引き当てる。
    /// 不明な種別は`UnknownCategoryError`を返す。
    pub fn from_kind(
        kind: &str,
        student_discount_percent: f64,
        teacher_discount_percent: f64,
    ) -> Result<Self, UnknownCategoryError> {
        match kind {
            "student" => Ok(Self::student(student_discount_percent)),
            "teacher" => Ok(Self::teacher(teacher_discount_percent)),
            other => Err(UnknownCategoryError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ID value objects のテスト
    #[test]
    fn test_book_id_creation() {
        let id1 = BookId::new();
        let id2 = BookId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_book_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = BookId::from_uuid(uuid);
        assert_eq!(id.value(), uuid);
    }

    #[test]
    fn test_patron_id_creation() {
        let id1 = PatronId::new();
        let id2 = PatronId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_transaction_id_creation() {
        let id1 = TransactionId::new();
        let id2 = TransactionId::new();
        assert_ne!(id1, id2);
    }

    // TransactionStatus のテスト
    #[test]
    fn test_status_round_trip() {
        for status in [TransactionStatus::Borrowed, TransactionStatus::Returned] {
            let parsed: TransactionStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_status_rejects_unknown() {
        assert!("overdue".parse::<TransactionStatus>().is_err());
    }

    // PatronCategory のテスト
    #[test]
    fn test_category_discount_fraction() {
        let student = PatronCategory::student(10.0);
        assert_eq!(student.discount(), 0.1);
        assert_eq!(student.kind(), "student");

        let teacher = PatronCategory::teacher(15.0);
        assert_eq!(teacher.discount(), 0.15);
        assert_eq!(teacher.kind(), "teacher");
    }

    #[test]
    fn test_category_negative_percentage_not_validated() {
        let category = PatronCategory::teacher(-20.0);
        assert_eq!(category.discount(), -0.2);
    }

    #[test]
    fn test_category_from_kind() {
        let category = PatronCategory::from_kind("student", 10.0, 15.0).unwrap();
        assert_eq!(category, PatronCategory::student(10.0));

        let category = PatronCategory::from_kind("teacher", 10.0, 15.0).unwrap();
        assert_eq!(category, PatronCategory::teacher(15.0));
    }

    #[test]
    fn test_category_from_unknown_kind() {
        let err = PatronCategory::from_kind("staff", 10.0, 15.0).unwrap_err();
        assert_eq!(err, UnknownCategoryError("staff".to_string()));
    }

    #[test]
    fn test_category_serializes_as_tagged_subdocument() {
        let category = PatronCategory::student(10.0);
        let json = serde_json::to_value(category).unwrap();
        assert_eq!(json["kind"], "student");
        assert_eq!(json["discount_percentage"], 10.0);
    }
}
