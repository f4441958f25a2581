use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result, ensure};
use chrono::{DateTime, Utc};

use crate::models::{FoodEntry, NewFoodEntry, NewUser, User};

/// Largest id `update_user` will store. Ids above it would leave no room for
/// the next id `create_user` hands out.
pub const MAX_USER_ID: i64 = i64::MAX - 1;

/// Reject upsert ids that would exhaust the id space.
pub(crate) fn check_user_id(id: i64) -> Result<()> {
    ensure!(id <= MAX_USER_ID, "user id {id} is out of range");
    Ok(())
}

/// Persistence contract shared by the in-memory and `SQLite` stores.
///
/// Handlers hold the store behind an `Arc`, so implementations take `&self`
/// and do their own locking.
pub trait Storage: Send + Sync + 'static {
    /// Look up a user. Unknown ids yield `Ok(None)`, never an error.
    fn get_user(&self, id: i64) -> impl Future<Output = Result<Option<User>>> + Send;

    /// Store a new user under a freshly allocated id.
    fn create_user(&self, user: NewUser) -> impl Future<Output = Result<User>> + Send;

    /// Replace all fields of the user stored under `id`, keeping the id.
    ///
    /// An unknown `id` is not an error: the record is created under that id.
    /// Ids above [`MAX_USER_ID`] are rejected and nothing is stored.
    fn update_user(&self, id: i64, user: NewUser) -> impl Future<Output = Result<User>> + Send;

    /// Store a new entry, stamping `created_at` with the current time.
    fn create_food_entry(
        &self,
        entry: NewFoodEntry,
    ) -> impl Future<Output = Result<FoodEntry>> + Send;

    /// Entries owned by `user_id` in insertion order, optionally limited to
    /// those created at or after `since`.
    fn get_food_entries_by_user_id(
        &self,
        user_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<FoodEntry>>> + Send;
}

/// Current time, never earlier than `last`.
pub(crate) fn next_timestamp(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match last {
        Some(last) if last > now => last,
        _ => now,
    }
}

#[derive(Debug)]
struct MemState {
    users: BTreeMap<i64, User>,
    food_entries: BTreeMap<i64, FoodEntry>,
    last_user_id: i64,
    next_entry_id: i64,
    last_created_at: Option<DateTime<Utc>>,
}

/// Non-persistent store backed by ordered maps. Lives as long as the process.
#[derive(Debug)]
pub struct MemStorage {
    state: Mutex<MemState>,
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStorage {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemState {
                users: BTreeMap::new(),
                food_entries: BTreeMap::new(),
                last_user_id: 0,
                next_entry_id: 1,
                last_created_at: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemStorage {
    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut state = self.lock();
        let id = state
            .last_user_id
            .checked_add(1)
            .context("user id space exhausted")?;
        state.last_user_id = id;
        let user = user.with_id(id);
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i64, user: NewUser) -> Result<User> {
        check_user_id(id)?;
        let mut state = self.lock();
        let user = user.with_id(id);
        state.users.insert(id, user.clone());
        // Upserted ids must never be handed out again by create_user.
        state.last_user_id = state.last_user_id.max(id);
        Ok(user)
    }

    async fn create_food_entry(&self, entry: NewFoodEntry) -> Result<FoodEntry> {
        let mut state = self.lock();
        let id = state.next_entry_id;
        state.next_entry_id += 1;
        let created_at = next_timestamp(state.last_created_at);
        state.last_created_at = Some(created_at);
        let entry = entry.with_id(id, created_at);
        state.food_entries.insert(id, entry.clone());
        Ok(entry)
    }

    async fn get_food_entries_by_user_id(
        &self,
        user_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<FoodEntry>> {
        let state = self.lock();
        let entries = state
            .food_entries
            .values()
            .filter(|e| e.user_id == user_id)
            .filter(|e| since.is_none_or(|since| e.created_at >= since))
            .cloned()
            .collect();
        Ok(entries)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn new_user(age: i64) -> NewUser {
        NewUser {
            age,
            gender: "female".to_string(),
            daily_calorie_target: 2000,
            daily_protein_target: 50,
        }
    }

    pub(crate) fn new_entry(user_id: i64, name: &str) -> NewFoodEntry {
        NewFoodEntry {
            user_id,
            image_url: format!("uploads/{name}"),
            food_name: name.to_string(),
            quantity: 100,
            unit: "grams".to_string(),
            calories: 200,
            protein: 10,
        }
    }

    #[tokio::test]
    async fn test_create_user_ids_increase_from_one() {
        let store = MemStorage::new();
        let a = store.create_user(new_user(20)).await.unwrap();
        let b = store.create_user(new_user(30)).await.unwrap();
        let c = store.create_user(new_user(40)).await.unwrap();
        assert_eq!(a.id, 1);
        assert!(b.id > a.id);
        assert!(c.id > b.id);
    }

    #[tokio::test]
    async fn test_get_user_unknown_is_none() {
        let store = MemStorage::new();
        assert!(store.get_user(1).await.unwrap().is_none());
        let user = store.create_user(new_user(20)).await.unwrap();
        assert_eq!(store.get_user(user.id).await.unwrap(), Some(user));
        assert!(store.get_user(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_user_replaces_fields() {
        let store = MemStorage::new();
        let user = store.create_user(new_user(20)).await.unwrap();

        let mut changed = new_user(21);
        changed.gender = "male".to_string();
        changed.daily_calorie_target = 2500;
        let updated = store.update_user(user.id, changed).await.unwrap();

        assert_eq!(updated.id, user.id);
        assert_eq!(updated.age, 21);
        assert_eq!(updated.gender, "male");
        assert_eq!(store.get_user(user.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_update_unknown_user_upserts_without_id_reuse() {
        let store = MemStorage::new();
        let upserted = store.update_user(5, new_user(50)).await.unwrap();
        assert_eq!(upserted.id, 5);
        assert!(store.get_user(5).await.unwrap().is_some());

        let created = store.create_user(new_user(20)).await.unwrap();
        assert!(created.id > 5);
        assert_eq!(store.get_user(5).await.unwrap().unwrap().age, 50);
    }

    #[tokio::test]
    async fn test_update_user_rejects_id_past_the_limit() {
        let store = MemStorage::new();
        assert!(store.update_user(i64::MAX, new_user(50)).await.is_err());
        assert!(store.get_user(i64::MAX).await.unwrap().is_none());

        let created = store.create_user(new_user(20)).await.unwrap();
        assert_eq!(created.id, 1);
    }

    #[tokio::test]
    async fn test_create_user_after_highest_upsert() {
        let store = MemStorage::new();
        store.update_user(MAX_USER_ID, new_user(50)).await.unwrap();

        let last = store.create_user(new_user(20)).await.unwrap();
        assert_eq!(last.id, i64::MAX);
        assert!(store.create_user(new_user(21)).await.is_err());
        assert_eq!(store.get_user(MAX_USER_ID).await.unwrap().unwrap().age, 50);
    }

    #[tokio::test]
    async fn test_food_entries_filtered_by_user() {
        let store = MemStorage::new();
        let a = store.create_food_entry(new_entry(1, "oats")).await.unwrap();
        store.create_food_entry(new_entry(2, "rice")).await.unwrap();
        let c = store.create_food_entry(new_entry(1, "eggs")).await.unwrap();

        let entries = store.get_food_entries_by_user_id(1, None).await.unwrap();
        assert_eq!(entries, vec![a, c]);
        assert!(
            store
                .get_food_entries_by_user_id(3, None)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_food_entry_ids_and_timestamps_monotonic() {
        let store = MemStorage::new();
        let mut last: Option<FoodEntry> = None;
        for i in 0..20 {
            let e = store
                .create_food_entry(new_entry(1, &format!("food{i}")))
                .await
                .unwrap();
            if let Some(prev) = &last {
                assert!(e.id > prev.id);
                assert!(e.created_at >= prev.created_at);
            }
            last = Some(e);
        }
    }

    #[tokio::test]
    async fn test_food_entries_since() {
        let store = MemStorage::new();
        let early = store.create_food_entry(new_entry(1, "oats")).await.unwrap();
        let late = store.create_food_entry(new_entry(1, "eggs")).await.unwrap();

        let all = store
            .get_food_entries_by_user_id(1, Some(early.created_at))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let cutoff = late.created_at + chrono::Duration::microseconds(1);
        let none = store
            .get_food_entries_by_user_id(1, Some(cutoff))
            .await
            .unwrap();
        assert!(none.is_empty());

        let future = Utc::now() + chrono::Duration::days(1);
        assert!(
            store
                .get_food_entries_by_user_id(1, Some(future))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_next_timestamp_never_goes_backwards() {
        let ahead = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(next_timestamp(Some(ahead)), ahead);
        let behind = Utc::now() - chrono::Duration::hours(1);
        assert!(next_timestamp(Some(behind)) > behind);
        assert!(next_timestamp(None) <= Utc::now());
    }
}
