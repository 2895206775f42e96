use serde::Serialize;

use super::errors::StoreError;

/// ページ指定
///
/// page / page_size がともに正のときのみ有効。無効な指定（ゼロ値）は
/// 「ページングなし＝全件」を意味し、メタデータも計算されない。
#[derive(Debug, Clone, Copy, Default)]
pub struct Paginator {
    pub page: i64,
    pub page_size: i64,
}

impl Paginator {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page, page_size }
    }

    /// ページングなし（全件取得）
    pub fn unpaged() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> bool {
        self.page > 0 && self.page_size > 0
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// ソート方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// ソート指定
///
/// フィールド名は許可リストと照合され、リスト外は
/// `StoreError::UnsupportedSortField` で拒否される。
/// `-` プレフィックスは降順を意味する。
#[derive(Debug, Clone)]
pub struct Sorter {
    pub field: String,
    pub safelist: &'static [&'static str],
}

impl Sorter {
    pub fn new(field: impl Into<String>, safelist: &'static [&'static str]) -> Self {
        Self {
            field: field.into(),
            safelist,
        }
    }

    /// ソートなし
    pub fn none() -> Self {
        Self {
            field: String::new(),
            safelist: &[],
        }
    }

    /// 許可リストと照合し、カラム名と方向に解決する
    ///
    /// フィールド指定なしは`None`。許可リスト照合を通った名前だけが
    /// 返るため、返値はそのままクエリに埋め込める。
    pub fn resolve(&self) -> Result<Option<(&str, SortDirection)>, StoreError> {
        if self.field.is_empty() {
            return Ok(None);
        }

        for safe in self.safelist {
            if self.field == *safe {
                let direction = if self.field.starts_with('-') {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                };
                return Ok(Some((self.field.trim_start_matches('-'), direction)));
            }
        }

        Err(StoreError::UnsupportedSortField(self.field.clone()))
    }
}

/// ページングメタデータ
///
/// 空の結果セットはゼロ値のメタデータになる。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

/// ページングメタデータを計算する
pub fn calculate_metadata(total_records: i64, page: i64, page_size: i64) -> Metadata {
    if total_records == 0 {
        return Metadata::default();
    }

    Metadata {
        current_page: page,
        page_size,
        first_page: 1,
        last_page: (total_records + page_size - 1) / page_size,
        total_records,
    }
}
