use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::Result;
use super::paging::{Metadata, Paginator, Sorter};
use crate::domain::PatronId;
use crate::domain::patron::Patron;

/// 利用者の検索フィルタ
#[derive(Debug, Clone, Default)]
pub struct PatronFilter {
    pub id: Option<PatronId>,
    /// 名前の部分一致（大文字小文字を区別しない）
    pub name: Option<String>,
    pub email: Option<String>,
    /// カテゴリ種別（"student" / "teacher"）
    pub category: Option<String>,
    pub min_created_at: Option<DateTime<Utc>>,
    pub max_created_at: Option<DateTime<Utc>>,
    pub version: Option<i32>,
}

impl PatronFilter {
    pub fn by_id(id: PatronId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }
}

/// 利用者ストアポート
#[async_trait]
pub trait PatronStore: Send + Sync {
    /// フィルタに一致する単一の利用者を取得する
    async fn get(&self, filter: PatronFilter) -> Result<Patron>;

    /// フィルタに一致する利用者一覧をページング・ソート付きで取得する
    async fn get_all(
        &self,
        filter: PatronFilter,
        paginator: Paginator,
        sorter: Sorter,
    ) -> Result<(Vec<Patron>, Metadata)>;

    /// 新しい利用者を挿入する
    ///
    /// メールアドレスの一意性違反は`DuplicateEmail`。
    async fn insert(&self, patron: &Patron) -> Result<PatronId>;

    /// 利用者を更新する（楽観的並行性制御、書籍ストアと同じ規約）
    async fn update(&self, filter: PatronFilter, patron: &Patron) -> Result<()>;

    /// フィルタに一致する利用者を削除する
    async fn delete(&self, filter: PatronFilter) -> Result<()>;
}
