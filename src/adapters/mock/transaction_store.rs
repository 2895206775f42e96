use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::TransactionId;
use crate::domain::transaction::Transaction;
use crate::ports::errors::{Result, StoreError};
use crate::ports::paging::{Metadata, Paginator, SortDirection, Sorter, calculate_metadata};
use crate::ports::transaction_store::{
    TransactionFilter, TransactionStore as TransactionStoreTrait,
};

/// TransactionStoreのインメモリ実装
pub struct TransactionStore {
    transactions: Mutex<HashMap<TransactionId, Transaction>>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self {
            transactions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for TransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(filter: &TransactionFilter, transaction: &Transaction) -> bool {
    if let Some(id) = filter.id {
        if transaction.transaction_id != id {
            return false;
        }
    }
    if let Some(patron_id) = filter.patron_id {
        if transaction.patron_id != patron_id {
            return false;
        }
    }
    if let Some(book_id) = filter.book_id {
        if transaction.book_id != book_id {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if transaction.status != status {
            return false;
        }
    }
    if let Some(min) = filter.min_borrowed_at {
        if transaction.borrowed_at < min {
            return false;
        }
    }
    if let Some(max) = filter.max_borrowed_at {
        if transaction.borrowed_at > max {
            return false;
        }
    }
    if let Some(min) = filter.min_due_date {
        if transaction.due_date < min {
            return false;
        }
    }
    if let Some(max) = filter.max_due_date {
        if transaction.due_date > max {
            return false;
        }
    }
    if let Some(version) = filter.version {
        if transaction.version != version {
            return false;
        }
    }
    true
}

fn sort_transactions(transactions: &mut [Transaction], sorter: &Sorter) -> Result<()> {
    let Some((field, direction)) = sorter.resolve()? else {
        return Ok(());
    };

    transactions.sort_by(|a, b| {
        let ordering = match field {
            "status" => a.status.as_str().cmp(b.status.as_str()),
            "borrowed_at" => a.borrowed_at.cmp(&b.borrowed_at),
            "due_date" => a.due_date.cmp(&b.due_date),
            "returned_at" => a.returned_at.cmp(&b.returned_at),
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
impl TransactionStoreTrait for TransactionStore {
    async fn get(&self, filter: TransactionFilter) -> Result<Transaction> {
        let transactions = self.transactions.lock().unwrap();
        transactions
            .values()
            .find(|transaction| matches(&filter, transaction))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_all(
        &self,
        filter: TransactionFilter,
        paginator: Paginator,
        sorter: Sorter,
    ) -> Result<(Vec<Transaction>, Metadata)> {
        let transactions = self.transactions.lock().unwrap();
        let mut matched: Vec<Transaction> = transactions
            .values()
            .filter(|transaction| matches(&filter, transaction))
            .cloned()
            .collect();
        drop(transactions);

        sort_transactions(&mut matched, &sorter)?;

        if !paginator.valid() {
            return Ok((matched, Metadata::default()));
        }

        let total = matched.len() as i64;
        let metadata = calculate_metadata(total, paginator.page, paginator.page_size);
        let page: Vec<Transaction> = matched
            .into_iter()
            .skip(paginator.offset() as usize)
            .take(paginator.limit() as usize)
            .collect();

        Ok((page, metadata))
    }

    async fn insert(&self, transaction: &Transaction) -> Result<TransactionId> {
        let mut transactions = self.transactions.lock().unwrap();

        if transactions.contains_key(&transaction.transaction_id) {
            return Err(StoreError::DuplicateId);
        }

        let now = Utc::now();
        let mut stored = transaction.clone();
        stored.created_at = now;
        stored.updated_at = now;

        transactions.insert(stored.transaction_id, stored);
        Ok(transaction.transaction_id)
    }

    async fn update(&self, mut filter: TransactionFilter, transaction: &Transaction) -> Result<()> {
        filter.version = Some(transaction.version);

        let mut transactions = self.transactions.lock().unwrap();
        let Some(stored) = transactions
            .values_mut()
            .find(|stored| matches(&filter, stored))
        else {
            return Err(StoreError::EditConflict);
        };

        // 許可フィールドのみ：due_date / returned_at / status
        stored.due_date = transaction.due_date;
        stored.returned_at = transaction.returned_at;
        stored.status = transaction.status;
        stored.version += 1;
        stored.updated_at = Utc::now();

        Ok(())
    }

    async fn delete(&self, filter: TransactionFilter) -> Result<()> {
        let mut transactions = self.transactions.lock().unwrap();
        let key = transactions
            .values()
            .find(|transaction| matches(&filter, transaction))
            .map(|transaction| transaction.transaction_id);

        match key {
            Some(key) => {
                transactions.remove(&key);
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::open_transaction;
    use crate::domain::{BookId, PatronId, TransactionStatus};
    use chrono::Duration;

    #[tokio::test]
    async fn test_borrowed_pair_filter_finds_open_transaction() {
        let store = TransactionStore::new();
        let now = Utc::now();
        let patron_id = PatronId::new();
        let book_id = BookId::new();

        let transaction = open_transaction(patron_id, book_id, now + Duration::days(7), now);
        store.insert(&transaction).await.unwrap();

        let fetched = store
            .get(TransactionFilter::borrowed_pair(patron_id, book_id))
            .await
            .unwrap();
        assert_eq!(fetched.transaction_id, transaction.transaction_id);

        // 別の利用者では見つからない
        let err = store
            .get(TransactionFilter::borrowed_pair(PatronId::new(), book_id))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_update_only_touches_whitelisted_fields() {
        let store = TransactionStore::new();
        let now = Utc::now();
        let transaction =
            open_transaction(PatronId::new(), BookId::new(), now + Duration::days(7), now);
        store.insert(&transaction).await.unwrap();

        let mut modified = transaction.clone();
        modified.status = TransactionStatus::Returned;
        modified.returned_at = Some(now);
        // borrowed_at の変更は書き込まれない
        modified.borrowed_at = now + Duration::days(99);

        store
            .update(
                TransactionFilter::by_id(transaction.transaction_id),
                &modified,
            )
            .await
            .unwrap();

        let fetched = store
            .get(TransactionFilter::by_id(transaction.transaction_id))
            .await
            .unwrap();
        assert_eq!(fetched.status, TransactionStatus::Returned);
        assert_eq!(fetched.returned_at, Some(now));
        assert_eq!(fetched.borrowed_at, transaction.borrowed_at);
        assert_eq!(fetched.version, transaction.version + 1);
    }
}
