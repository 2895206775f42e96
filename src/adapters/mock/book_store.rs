use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::BookId;
use crate::domain::book::Book;
use crate::ports::book_store::{BookFilter, BookStore as BookStoreTrait};
use crate::ports::errors::{Result, StoreError};
use crate::ports::paging::{Metadata, Paginator, SortDirection, Sorter, calculate_metadata};

/// BookStoreのインメモリ実装
///
/// Mutexで保護したマップに書籍を保持する。テストと
/// ローカル開発で使用され、楽観的並行性制御の規約
/// （バージョン述語、0件一致はEditConflict）を忠実に再現する。
pub struct BookStore {
    books: Mutex<HashMap<BookId, Book>>,
}

impl BookStore {
    pub fn new() -> Self {
        Self {
            books: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for BookStore {
    fn default() -> Self {
        Self::new()
    }
}

/// フィルタ述語の評価
fn matches(filter: &BookFilter, book: &Book) -> bool {
    if let Some(id) = filter.id {
        if book.book_id != id {
            return false;
        }
    }
    if let Some(title) = &filter.title {
        if !book.title.to_lowercase().contains(&title.to_lowercase()) {
            return false;
        }
    }
    if let Some(isbn) = &filter.isbn {
        if &book.isbn != isbn {
            return false;
        }
    }
    if let Some(author) = &filter.author {
        if !book.authors.contains(author) {
            return false;
        }
    }
    if let Some(publisher) = &filter.publisher {
        if !book.publishers.contains(publisher) {
            return false;
        }
    }
    if let Some(genre) = &filter.genre {
        if !book.genres.contains(genre) {
            return false;
        }
    }
    if let Some(min) = filter.min_pages {
        if book.pages < min {
            return false;
        }
    }
    if let Some(max) = filter.max_pages {
        if book.pages > max {
            return false;
        }
    }
    if let Some(min) = filter.min_edition {
        if book.edition < min {
            return false;
        }
    }
    if let Some(max) = filter.max_edition {
        if book.edition > max {
            return false;
        }
    }
    if let Some(min) = filter.min_published_at {
        if book.published_at < min {
            return false;
        }
    }
    if let Some(max) = filter.max_published_at {
        if book.published_at > max {
            return false;
        }
    }
    if let Some(min) = filter.min_copies {
        if book.copies < min {
            return false;
        }
    }
    if let Some(max) = filter.max_copies {
        if book.copies > max {
            return false;
        }
    }
    if let Some(min) = filter.min_borrowed_copies {
        if book.borrowed_copies < min {
            return false;
        }
    }
    if let Some(max) = filter.max_borrowed_copies {
        if book.borrowed_copies > max {
            return false;
        }
    }
    if let Some(version) = filter.version {
        if book.version != version {
            return false;
        }
    }
    true
}

/// 許可リストのソートフィールドで並べ替える
fn sort_books(books: &mut [Book], sorter: &Sorter) -> Result<()> {
    let Some((field, direction)) = sorter.resolve()? else {
        return Ok(());
    };

    books.sort_by(|a, b| {
        let ordering = match field {
            "title" => a.title.cmp(&b.title),
            "isbn" => a.isbn.cmp(&b.isbn),
            "pages" => a.pages.cmp(&b.pages),
            "edition" => a.edition.cmp(&b.edition),
            "copies" => a.copies.cmp(&b.copies),
            "borrowed_copies" => a.borrowed_copies.cmp(&b.borrowed_copies),
            "published_at" => a.published_at.cmp(&b.published_at),
            "created_at" => a.created_at.cmp(&b.created_at),
            _ => Ordering::Equal,
        };
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });

    Ok(())
}

#[async_trait]
impl BookStoreTrait for BookStore {
    async fn get(&self, filter: BookFilter) -> Result<Book> {
        let books = self.books.lock().unwrap();
        books
            .values()
            .find(|book| matches(&filter, book))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_all(
        &self,
        filter: BookFilter,
        paginator: Paginator,
        sorter: Sorter,
    ) -> Result<(Vec<Book>, Metadata)> {
        let books = self.books.lock().unwrap();
        let mut matched: Vec<Book> = books
            .values()
            .filter(|book| matches(&filter, book))
            .cloned()
            .collect();
        drop(books);

        sort_books(&mut matched, &sorter)?;

        if !paginator.valid() {
            return Ok((matched, Metadata::default()));
        }

        let total = matched.len() as i64;
        let metadata = calculate_metadata(total, paginator.page, paginator.page_size);
        let page: Vec<Book> = matched
            .into_iter()
            .skip(paginator.offset() as usize)
            .take(paginator.limit() as usize)
            .collect();

        Ok((page, metadata))
    }

    async fn insert(&self, book: &Book) -> Result<BookId> {
        let mut books = self.books.lock().unwrap();

        if books.contains_key(&book.book_id) {
            return Err(StoreError::DuplicateId);
        }
        if books.values().any(|stored| stored.isbn == book.isbn) {
            return Err(StoreError::DuplicateIsbn);
        }

        let now = Utc::now();
        let mut stored = book.clone();
        stored.created_at = now;
        stored.updated_at = now;

        books.insert(stored.book_id, stored);
        Ok(book.book_id)
    }

    async fn update(&self, mut filter: BookFilter, book: &Book) -> Result<()> {
        // 読み出し時のバージョンを述語に加える。一致しなければ
        // 並行更新に敗れたということ。
        filter.version = Some(book.version);

        let mut books = self.books.lock().unwrap();
        let Some(stored) = books.values_mut().find(|stored| matches(&filter, stored)) else {
            return Err(StoreError::EditConflict);
        };

        // 許可フィールドのみ上書きする（created_at・IDは不変）
        stored.title = book.title.clone();
        stored.isbn = book.isbn.clone();
        stored.pages = book.pages;
        stored.edition = book.edition;
        stored.published_at = book.published_at;
        stored.authors = book.authors.clone();
        stored.publishers = book.publishers.clone();
        stored.genres = book.genres.clone();
        stored.copies = book.copies;
        stored.borrowed_copies = book.borrowed_copies;
        stored.version += 1;
        stored.updated_at = Utc::now();

        Ok(())
    }

    async fn delete(&self, filter: BookFilter) -> Result<()> {
        let mut books = self.books.lock().unwrap();
        let key = books
            .values()
            .find(|book| matches(&filter, book))
            .map(|book| book.book_id);

        match key {
            Some(key) => {
                books.remove(&key);
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}
