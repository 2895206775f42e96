use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::PatronId;
use crate::domain::patron::Patron;
use crate::ports::errors::{Result, StoreError};
use crate::ports::paging::{Metadata, Paginator, SortDirection, Sorter, calculate_metadata};
use crate::ports::patron_store::{PatronFilter, PatronStore as PatronStoreTrait};

/// In-memory implementation of PatronStore.
///
/// Mirrors the optimistic-concurrency contract of the real store:
/// updates match the filter plus the version read by the caller, and a
/// zero-row match surfaces as an edit conflict.
pub struct PatronStore {
    patrons: Mutex<HashMap<PatronId, Patron>>,
}

impl PatronStore {
    pub fn new() -> Self {
        Self {
            patrons: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for PatronStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(filter: &PatronFilter, patron: &Patron) -> bool {
    if let Some(id) = filter.id {
        if patron.patron_id != id {
            return false;
        }
    }
    if let Some(name) = &filter.name {
        if !patron.name.to_lowercase().contains(&name.to_lowercase()) {
            return false;
        }
    }
    if let Some(email) = &filter.email {
        if &patron.email != email {
            return false;
        }
    }
    if let Some(category) = &filter.category {
        if patron.category.kind() != category {
            return false;
        }
    }
    if let Some(min) = filter.min_created_at {
        if patron.created_at < min {
            return false;
        }
    }
    if let Some(max) = filter.max_created_at {
        if patron.created_at > max {
            return false;
        }
    }
    if let Some(version) = filter.version {
        if patron.version != version {
            return false;
        }
    }
    true
}

fn sort_patrons(patrons: &mut [Patron], sorter: &Sorter) -> Result<()> {
    let Some((field, direction)) = sorter.resolve()? else {
        return Ok(());
    };

    patrons.sort_by(|a, b| {
        let ordering = match field {
            "name" => a.name.cmp(&b.name),
            "email" => a.email.cmp(&b.email),
            "category" => a.category.kind().cmp(b.category.kind()),
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
impl PatronStoreTrait for PatronStore {
    async fn get(&self, filter: PatronFilter) -> Result<Patron> {
        let patrons = self.patrons.lock().unwrap();
        patrons
            .values()
            .find(|patron| matches(&filter, patron))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_all(
        &self,
        filter: PatronFilter,
        paginator: Paginator,
        sorter: Sorter,
    ) -> Result<(Vec<Patron>, Metadata)> {
        let patrons = self.patrons.lock().unwrap();
        let mut matched: Vec<Patron> = patrons
            .values()
            .filter(|patron| matches(&filter, patron))
            .cloned()
            .collect();
        drop(patrons);

        sort_patrons(&mut matched, &sorter)?;

        if !paginator.valid() {
            return Ok((matched, Metadata::default()));
        }

        let total = matched.len() as i64;
        let metadata = calculate_metadata(total, paginator.page, paginator.page_size);
        let page: Vec<Patron> = matched
            .into_iter()
            .skip(paginator.offset() as usize)
            .take(paginator.limit() as usize)
            .collect();

        Ok((page, metadata))
    }

    async fn insert(&self, patron: &Patron) -> Result<PatronId> {
        let mut patrons = self.patrons.lock().unwrap();

        if patrons.contains_key(&patron.patron_id) {
            return Err(StoreError::DuplicateId);
        }
        if patrons.values().any(|stored| stored.email == patron.email) {
            return Err(StoreError::DuplicateEmail);
        }

        let now = Utc::now();
        let mut stored = patron.clone();
        stored.created_at = now;
        stored.updated_at = now;

        patrons.insert(stored.patron_id, stored);
        Ok(patron.patron_id)
    }

    async fn update(&self, mut filter: PatronFilter, patron: &Patron) -> Result<()> {
        filter.version = Some(patron.version);

        let mut patrons = self.patrons.lock().unwrap();
        let Some(stored) = patrons.values_mut().find(|stored| matches(&filter, stored)) else {
            return Err(StoreError::EditConflict);
        };

        // Whitelisted fields only; created_at and the ID never change.
        stored.name = patron.name.clone();
        stored.email = patron.email.clone();
        stored.category = patron.category;
        stored.password_hash = patron.password_hash.clone();
        stored.activated = patron.activated;
        stored.permissions = patron.permissions.clone();
        stored.version += 1;
        stored.updated_at = Utc::now();

        Ok(())
    }

    async fn delete(&self, filter: PatronFilter) -> Result<()> {
        let mut patrons = self.patrons.lock().unwrap();
        let key = patrons
            .values()
            .find(|patron| matches(&filter, patron))
            .map(|patron| patron.patron_id);

        match key {
            Some(key) => {
                patrons.remove(&key);
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PatronCategory;

    fn sample_patron(name: &str, email: &str) -> Patron {
        Patron::new(name, email, PatronCategory::student(10.0), Utc::now())
    }

    #[tokio::test]
    async fn test_insert_duplicate_email_rejected() {
        let store = PatronStore::new();
        store
            .insert(&sample_patron("Jane", "jane@example.com"))
            .await
            .unwrap();

        let err = store
            .insert(&sample_patron("Janet", "jane@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_get_by_email() {
        let store = PatronStore::new();
        let patron = sample_patron("Jane", "jane@example.com");
        store.insert(&patron).await.unwrap();

        let fetched = store
            .get(PatronFilter::by_email("jane@example.com"))
            .await
            .unwrap();
        assert_eq!(fetched.patron_id, patron.patron_id);
    }

    #[tokio::test]
    async fn test_update_with_stale_version_is_conflict() {
        let store = PatronStore::new();
        let patron = sample_patron("Jane", "jane@example.com");
        store.insert(&patron).await.unwrap();

        let mut first = patron.clone();
        first.activated = true;
        store
            .update(PatronFilter::by_id(patron.patron_id), &first)
            .await
            .unwrap();

        let mut stale = patron.clone();
        stale.name = "Janet".to_string();
        let err = store
            .update(PatronFilter::by_id(patron.patron_id), &stale)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EditConflict));
    }

    #[tokio::test]
    async fn test_filter_by_category_kind() {
        let store = PatronStore::new();
        store
            .insert(&sample_patron("Jane", "jane@example.com"))
            .await
            .unwrap();
        let teacher = Patron::new(
            "John",
            "john@example.com",
            PatronCategory::teacher(15.0),
            Utc::now(),
        );
        store.insert(&teacher).await.unwrap();

        let filter = PatronFilter {
            category: Some("teacher".to_string()),
            ..PatronFilter::default()
        };
        let (matched, _) = store
            .get_all(filter, Paginator::unpaged(), Sorter::none())
            .await
            .unwrap();

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "John");
    }
}
