use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use crate::domain::transaction::Transaction;
use crate::domain::{BookId, PatronId, TransactionId, TransactionStatus};
use crate::ports::errors::{Result, StoreError};
use crate::ports::paging::{Metadata, Paginator, SortDirection, Sorter, calculate_metadata};
use crate::ports::transaction_store::{
    TransactionFilter, TransactionStore as TransactionStoreTrait,
};

use super::map_sqlx_error;

/// TransactionStoreのPostgreSQL実装
pub struct TransactionStore {
    pool: PgPool,
}

impl TransactionStore {
    /// PostgreSQLコネクションプールから新しいTransactionStoreを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TRANSACTION_COLUMNS: &str = "transaction_id, patron_id, book_id, status, borrowed_at, \
     due_date, returned_at, version, created_at, updated_at";

/// 疎なフィルタ述語。NULLのバインドは「条件なし」。
const TRANSACTION_FILTER: &str = "($1::uuid IS NULL OR transaction_id = $1) \
     AND ($2::uuid IS NULL OR patron_id = $2) \
     AND ($3::uuid IS NULL OR book_id = $3) \
     AND ($4::text IS NULL OR status = $4) \
     AND ($5::timestamptz IS NULL OR borrowed_at >= $5) \
     AND ($6::timestamptz IS NULL OR borrowed_at <= $6) \
     AND ($7::timestamptz IS NULL OR due_date >= $7) \
     AND ($8::timestamptz IS NULL OR due_date <= $8) \
     AND ($9::int IS NULL OR version = $9)";

fn bind_filter(
    query: Query<'_, Postgres, PgArguments>,
    filter: TransactionFilter,
) -> Query<'_, Postgres, PgArguments> {
    query
        .bind(filter.id.map(|id| id.value()))
        .bind(filter.patron_id.map(|id| id.value()))
        .bind(filter.book_id.map(|id| id.value()))
        .bind(filter.status.map(|status| status.as_str()))
        .bind(filter.min_borrowed_at)
        .bind(filter.max_borrowed_at)
        .bind(filter.min_due_date)
        .bind(filter.max_due_date)
        .bind(filter.version)
}

/// PostgreSQLの行データをTransactionに変換する
///
/// ステータス文字列のデコード失敗はバックエンドエラー扱い。
fn map_row(row: &PgRow) -> Result<Transaction> {
    let status_str: &str = row.get("status");
    let status = TransactionStatus::from_str(status_str).map_err(|err| {
        StoreError::Backend(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            err,
        )))
    })?;

    Ok(Transaction {
        transaction_id: TransactionId::from_uuid(row.get("transaction_id")),
        patron_id: PatronId::from_uuid(row.get("patron_id")),
        book_id: BookId::from_uuid(row.get("book_id")),
        status,
        borrowed_at: row.get("borrowed_at"),
        due_date: row.get("due_date"),
        returned_at: row.get("returned_at"),
        version: row.get("version"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn order_clause(sorter: &Sorter) -> Result<String> {
    Ok(match sorter.resolve()? {
        Some((column, SortDirection::Ascending)) => format!(" ORDER BY {} ASC", column),
        Some((column, SortDirection::Descending)) => format!(" ORDER BY {} DESC", column),
        None => String::new(),
    })
}

#[async_trait]
impl TransactionStoreTrait for TransactionStore {
    async fn get(&self, filter: TransactionFilter) -> Result<Transaction> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE {} LIMIT 1",
            TRANSACTION_COLUMNS, TRANSACTION_FILTER
        );

        let row = bind_filter(sqlx::query(&sql), filter)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(map_row).transpose()?.ok_or(StoreError::NotFound)
    }

    async fn get_all(
        &self,
        filter: TransactionFilter,
        paginator: Paginator,
        sorter: Sorter,
    ) -> Result<(Vec<Transaction>, Metadata)> {
        let mut metadata = Metadata::default();
        let mut sql = format!(
            "SELECT {} FROM transactions WHERE {}{}",
            TRANSACTION_COLUMNS,
            TRANSACTION_FILTER,
            order_clause(&sorter)?
        );

        if paginator.valid() {
            let count_sql = format!("SELECT COUNT(*) FROM transactions WHERE {}", TRANSACTION_FILTER);
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

        let transactions = rows.iter().map(map_row).collect::<Result<Vec<_>>>()?;
        Ok((transactions, metadata))
    }

    async fn insert(&self, transaction: &Transaction) -> Result<TransactionId> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                transaction_id, patron_id, book_id, status, borrowed_at,
                due_date, returned_at, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            "#,
        )
        .bind(transaction.transaction_id.value())
        .bind(transaction.patron_id.value())
        .bind(transaction.book_id.value())
        .bind(transaction.status.as_str())
        .bind(transaction.borrowed_at)
        .bind(transaction.due_date)
        .bind(transaction.returned_at)
        .bind(transaction.version)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(transaction.transaction_id)
    }

    async fn update(&self, mut filter: TransactionFilter, transaction: &Transaction) -> Result<()> {
        filter.version = Some(transaction.version);

        // 許可フィールドのみ：due_date / returned_at / status
        let sql = format!(
            "UPDATE transactions SET \
                 due_date = $10, returned_at = $11, status = $12, \
                 version = version + 1, updated_at = NOW() \
             WHERE {}",
            TRANSACTION_FILTER
        );

        let result = bind_filter(sqlx::query(&sql), filter)
            .bind(transaction.due_date)
            .bind(transaction.returned_at)
            .bind(transaction.status.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::EditConflict);
        }

        Ok(())
    }

    async fn delete(&self, filter: TransactionFilter) -> Result<()> {
        let sql = format!("DELETE FROM transactions WHERE {}", TRANSACTION_FILTER);

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
