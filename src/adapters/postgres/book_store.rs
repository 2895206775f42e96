use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use crate::domain::BookId;
use crate::domain::book::Book;
use crate::ports::book_store::{BookFilter, BookStore as BookStoreTrait};
use crate::ports::errors::{Result, StoreError};
use crate::ports::paging::{Metadata, Paginator, SortDirection, Sorter, calculate_metadata};

use super::map_sqlx_error;

/// PostgreSQL implementation of BookStore
///
/// One flat row per book. Every update statement predicates on the
/// version the caller read, so a concurrent writer surfaces as an
/// edit conflict rather than a lost update.
pub struct BookStore {
    pool: PgPool,
}

impl BookStore {
    /// Create a new BookStore with a PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOOK_COLUMNS: &str = "book_id, title, isbn, pages, edition, copies, borrowed_copies, \
     authors, publishers, genres, published_at, version, created_at, updated_at";

/// Sparse filter predicate; a NULL bind means "no condition".
/// The same 17 placeholders are shared by every statement touching books.
const BOOK_FILTER: &str = "($1::uuid IS NULL OR book_id = $1) \
     AND ($2::text IS NULL OR title ILIKE '%' || $2 || '%') \
     AND ($3::text IS NULL OR isbn = $3) \
     AND ($4::text IS NULL OR $4 = ANY(authors)) \
     AND ($5::text IS NULL OR $5 = ANY(publishers)) \
     AND ($6::text IS NULL OR $6 = ANY(genres)) \
     AND ($7::int IS NULL OR pages >= $7) \
     AND ($8::int IS NULL OR pages <= $8) \
     AND ($9::int IS NULL OR edition >= $9) \
     AND ($10::int IS NULL OR edition <= $10) \
     AND ($11::timestamptz IS NULL OR published_at >= $11) \
     AND ($12::timestamptz IS NULL OR published_at <= $12) \
     AND ($13::int IS NULL OR copies >= $13) \
     AND ($14::int IS NULL OR copies <= $14) \
     AND ($15::int IS NULL OR borrowed_copies >= $15) \
     AND ($16::int IS NULL OR borrowed_copies <= $16) \
     AND ($17::int IS NULL OR version = $17)";

fn bind_filter(
    query: Query<'_, Postgres, PgArguments>,
    filter: BookFilter,
) -> Query<'_, Postgres, PgArguments> {
    query
        .bind(filter.id.map(|id| id.value()))
        .bind(filter.title)
        .bind(filter.isbn)
        .bind(filter.author)
        .bind(filter.publisher)
        .bind(filter.genre)
        .bind(filter.min_pages)
        .bind(filter.max_pages)
        .bind(filter.min_edition)
        .bind(filter.max_edition)
        .bind(filter.min_published_at)
        .bind(filter.max_published_at)
        .bind(filter.min_copies)
        .bind(filter.max_copies)
        .bind(filter.min_borrowed_copies)
        .bind(filter.max_borrowed_copies)
        .bind(filter.version)
}

fn map_row(row: &PgRow) -> Book {
    Book {
        book_id: BookId::from_uuid(row.get("book_id")),
        title: row.get("title"),
        isbn: row.get("isbn"),
        pages: row.get("pages"),
        edition: row.get("edition"),
        copies: row.get("copies"),
        borrowed_copies: row.get("borrowed_copies"),
        authors: row.get("authors"),
        publishers: row.get("publishers"),
        genres: row.get("genres"),
        published_at: row.get("published_at"),
        version: row.get("version"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn order_clause(sorter: &Sorter) -> Result<String> {
    // resolve() has matched the field against the safelist, so the
    // returned column name is safe to splice into the statement.
    Ok(match sorter.resolve()? {
        Some((column, SortDirection::Ascending)) => format!(" ORDER BY {} ASC", column),
        Some((column, SortDirection::Descending)) => format!(" ORDER BY {} DESC", column),
        None => String::new(),
    })
}

#[async_trait]
impl BookStoreTrait for BookStore {
    async fn get(&self, filter: BookFilter) -> Result<Book> {
        let sql = format!(
            "SELECT {} FROM books WHERE {} LIMIT 1",
            BOOK_COLUMNS, BOOK_FILTER
        );

        let row = bind_filter(sqlx::query(&sql), filter)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(map_row).ok_or(StoreError::NotFound)
    }

    async fn get_all(
        &self,
        filter: BookFilter,
        paginator: Paginator,
        sorter: Sorter,
    ) -> Result<(Vec<Book>, Metadata)> {
        let mut metadata = Metadata::default();
        let mut sql = format!(
            "SELECT {} FROM books WHERE {}{}",
            BOOK_COLUMNS,
            BOOK_FILTER,
            order_clause(&sorter)?
        );

        if paginator.valid() {
            let count_sql = format!("SELECT COUNT(*) FROM books WHERE {}", BOOK_FILTER);
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

        Ok((rows.iter().map(map_row).collect(), metadata))
    }

    async fn insert(&self, book: &Book) -> Result<BookId> {
        sqlx::query(
            r#"
            INSERT INTO books (
                book_id, title, isbn, pages, edition, copies, borrowed_copies,
                authors, publishers, genres, published_at, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW())
            "#,
        )
        .bind(book.book_id.value())
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(book.pages)
        .bind(book.edition)
        .bind(book.copies)
        .bind(book.borrowed_copies)
        .bind(&book.authors)
        .bind(&book.publishers)
        .bind(&book.genres)
        .bind(book.published_at)
        .bind(book.version)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(book.book_id)
    }

    async fn update(&self, mut filter: BookFilter, book: &Book) -> Result<()> {
        // The statement must match the filter AND the version the
        // caller read; zero rows matched means a concurrent writer won.
        filter.version = Some(book.version);

        let sql = format!(
            "UPDATE books SET \
                 title = $18, isbn = $19, pages = $20, edition = $21, published_at = $22, \
                 authors = $23, publishers = $24, genres = $25, copies = $26, \
                 borrowed_copies = $27, version = version + 1, updated_at = NOW() \
             WHERE {}",
            BOOK_FILTER
        );

        let result = bind_filter(sqlx::query(&sql), filter)
            .bind(&book.title)
            .bind(&book.isbn)
            .bind(book.pages)
            .bind(book.edition)
            .bind(book.published_at)
            .bind(&book.authors)
            .bind(&book.publishers)
            .bind(&book.genres)
            .bind(book.copies)
            .bind(book.borrowed_copies)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::EditConflict);
        }

        Ok(())
    }

    async fn delete(&self, filter: BookFilter) -> Result<()> {
        let sql = format!("DELETE FROM books WHERE {}", BOOK_FILTER);

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
