use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PatronCategory, PatronId};

/// 利用者集約
///
/// カテゴリ（Student / Teacher）は割引率を持つ閉じたバリアント。
/// `password_hash` と `permissions` は認証レイヤの所有物であり、
/// このシステムは不透明な値として保持するだけで解釈しない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patron {
    // 識別子
    pub patron_id: PatronId,

    // 利用者情報
    pub name: String,
    pub email: String,
    pub category: PatronCategory,

    // 認証レイヤ所有のフィールド（不透明）
    pub password_hash: Option<String>,
    pub activated: bool,
    pub permissions: Vec<String>,

    // 楽観的並行性制御
    pub version: i32,

    // 監査情報
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patron {
    /// 新しい利用者を作成する
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        category: PatronCategory,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            patron_id: PatronId::new(),
            name: name.into(),
            email: email.into(),
            category,
            password_hash: None,
            activated: false,
            permissions: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_new_patron() {
        let now = Utc::now();
        let patron = Patron::new(
            "Jane Smith",
            "jane@example.com",
            PatronCategory::student(10.0),
            now,
        );

        assert_eq!(patron.name, "Jane Smith");
        assert_eq!(patron.email, "jane@example.com");
        assert_eq!(patron.category.kind(), "student");
        assert_eq!(patron.version, 1);
        assert!(!patron.activated);
        assert!(patron.permissions.is_empty());
    }
}
