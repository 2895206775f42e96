use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row};

use crate::domain::patron::Patron;
use crate::domain::{PatronCategory, PatronId};
use crate::ports::errors::{Result, StoreError};
use crate::ports::paging::{Metadata, Paginator, SortDirection, Sorter, calculate_metadata};
use crate::ports::patron_store::{PatronFilter, PatronStore as PatronStoreTrait};

use super::map_sqlx_error;

/// PatronStoreのPostgreSQL実装
///
/// カテゴリはタグ付きJSONBサブドキュメントとして保存する。
/// 更新は読み出し時のバージョンを述語に含める楽観的並行性制御。
pub struct PatronStore {
    pool: PgPool,
}

impl PatronStore {
    /// PostgreSQLコネクションプールから新しいPatronStoreを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PATRON_COLUMNS: &str = "patron_id, name, email, category, password_hash, activated, \
     permissions, version, created_at, updated_at";

/// 疎なフィルタ述語。NULLのバインドは「条件なし」。
const PATRON_FILTER: &str = "($1::uuid IS NULL OR patron_id = $1) \
     AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%') \
     AND ($3::text IS NULL OR email = $3) \
     AND ($4::text IS NULL OR category->>'kind' = $4) \
     AND ($5::timestamptz IS NULL OR created_at >= $5) \
     AND ($6::timestamptz IS NULL OR created_at <= $6) \
     AND ($7::int IS NULL OR version = $7)";

fn bind_filter(
    query: Query<'_, Postgres, PgArguments>,
    filter: PatronFilter,
) -> Query<'_, Postgres, PgArguments> {
    query
        .bind(filter.id.map(|id| id.value()))
        .bind(filter.name)
        .bind(filter.email)
        .bind(filter.category)
        .bind(filter.min_created_at)
        .bind(filter.max_created_at)
        .bind(filter.version)
}

/// PostgreSQLの行データをPatronに変換する
///
/// カテゴリのJSONBサブドキュメントをデコードできない行は
/// バックエンドエラーとして扱う。
fn map_row(row: &PgRow) -> Result<Patron> {
    let category: Json<PatronCategory> = row.try_get("category").map_err(map_sqlx_error)?;

    Ok(Patron {
        patron_id: PatronId::from_uuid(row.get("patron_id")),
        name: row.get("name"),
        email: row.get("email"),
        category: category.0,
        password_hash: row.get("password_hash"),
        activated: row.get("activated"),
        permissions: row.get("permissions"),
        version: row.get("version"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn order_clause(sorter: &Sorter) -> Result<String> {
    Ok(match sorter.resolve()? {
        Some(("category", SortDirection::Ascending)) => {
            " ORDER BY category->>'kind' ASC".to_string()
        }
        Some(("category", SortDirection::Descending)) => {
            " ORDER BY category->>'kind' DESC".to_string()
        }
        Some((column, SortDirection::Ascending)) => format!(" ORDER BY {} ASC", column),
        Some((column, SortDirection::Descending)) => format!(" ORDER BY {} DESC", column),
        None => String::new(),
    })
}

#[async_trait]
impl PatronStoreTrait for PatronStore {
    async fn get(&self, filter: PatronFilter) -> Result<Patron> {
        let sql = format!(
            "SELECT {} FROM patrons WHERE {} LIMIT 1",
            PATRON_COLUMNS, PATRON_FILTER
        );

        let row = bind_filter(sqlx::query(&sql), filter)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(map_row).transpose()?.ok_or(StoreError::NotFound)
    }

    async fn get_all(
        &self,
        filter: PatronFilter,
        paginator: Paginator,
        sorter: Sorter,
    ) -> Result<(Vec<Patron>, Metadata)> {
        let mut metadata = Metadata::default();
        let mut sql = format!(
            "SELECT {} FROM patrons WHERE {}{}",
            PATRON_COLUMNS,
            PATRON_FILTER,
            order_clause(&sorter)?
        );

        if paginator.valid() {
            let count_sql = format!("SELECT COUNT(*) FROM patrons WHERE {}", PATRON_FILTER);
            let total: i64 = bind_filter(sqlx::query(&count_sql), filter.clone())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?
                .get(0);

            metadata = calculate_metadata(total, paginator.page, paginator.page_size);
            sql.push_str(&format!(
                " LIMIT {} OFFSET {}",
                paginator.limit(),
                paginator.offset()
            ));
        }

        let rows = bind_filter(sqlx::query(&sql), filter)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let patrons = rows.iter().map(map_row).collect::<Result<Vec<_>>>()?;
        Ok((patrons, metadata))
    }

    async fn insert(&self, patron: &Patron) -> Result<PatronId> {
        sqlx::query(
            r#"
            INSERT INTO patrons (
                patron_id, name, email, category, password_hash, activated,
                permissions, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            "#,
        )
        .bind(patron.patron_id.value())
        .bind(&patron.name)
        .bind(&patron.email)
        .bind(Json(&patron.category))
        .bind(&patron.password_hash)
        .bind(patron.activated)
        .bind(&patron.permissions)
        .bind(patron.version)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(patron.patron_id)
    }

    async fn update(&self, mut filter: PatronFilter, patron: &Patron) -> Result<()> {
        filter.version = Some(patron.version);

        let sql = format!(
            "UPDATE patrons SET \
                 name = $8, email = $9, category = $10, password_hash = $11, \
                 activated = $12, permissions = $13, \
                 version = version + 1, updated_at = NOW() \
             WHERE {}",
            PATRON_FILTER
        );

        let result = bind_filter(sqlx::query(&sql), filter)
            .bind(&patron.name)
            .bind(&patron.email)
            .bind(Json(&patron.category))
            .bind(&patron.password_hash)
            .bind(patron.activated)
            .bind(&patron.permissions)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::EditConflict);
        }

        Ok(())
    }

    async fn delete(&self, filter: PatronFilter) -> Result<()> {
        let sql = format!("DELETE FROM patrons WHERE {}", PATRON_FILTER);

        let result = bind_filter(sqlx::query(&sql), filter)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}
