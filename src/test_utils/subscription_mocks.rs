//! In-memory mock implementation of the subscription repository traits.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::use_cases::subscription::{
        CreateSubscriptionInput, SubscriptionRepo, SubscriptionTx,
    },
    domain::entities::subscription::{CostFilter, ListFilter, Subscription},
};

#[derive(Default)]
struct Store {
    rows: BTreeMap<i64, Subscription>,
    next_id: i64,
}

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    store: Arc<Mutex<Store>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscriptions(subscriptions: Vec<Subscription>) -> Self {
        let mut store = Store::default();
        for sub in subscriptions {
            store.next_id = store.next_id.max(sub.id);
            store.rows.insert(sub.id, sub);
        }
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }
}

fn matches(sub: &Subscription, user_id: Option<Uuid>, service_name: Option<&str>) -> bool {
    user_id.is_none_or(|u| sub.user_id == u)
        && service_name.is_none_or(|n| sub.service_name == n)
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn create(&self, input: &CreateSubscriptionInput) -> AppResult<Subscription> {
        let mut store = self.store.lock().unwrap();
        store.next_id += 1;

        let now = Utc::now().naive_utc();
        let sub = Subscription {
            id: store.next_id,
            service_name: input.service_name.clone(),
            price: input.price,
            user_id: input.user_id,
            start_date: input.start_date,
            end_date: input.end_date,
            created_at: now,
            updated_at: now,
        };
        store.rows.insert(sub.id, sub.clone());
        Ok(sub)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<Subscription>> {
        Ok(self.store.lock().unwrap().rows.get(&id).cloned())
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        Ok(self.store.lock().unwrap().rows.remove(&id).is_some())
    }

    async fn list(&self, filter: &ListFilter) -> AppResult<Vec<Subscription>> {
        let store = self.store.lock().unwrap();
        let mut result: Vec<Subscription> = store
            .rows
            .values()
            .filter(|s| matches(s, filter.user_id, filter.service_name.as_deref()))
            .cloned()
            .collect();
        // Most recent first; ids break created_at ties deterministically.
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(result)
    }

    async fn total_cost(&self, filter: &CostFilter) -> AppResult<i64> {
        let store = self.store.lock().unwrap();
        Ok(store
            .rows
            .values()
            .filter(|s| matches(s, filter.user_id, filter.service_name.as_deref()))
            .map(|s| s.occurrences_within(filter.start_date, filter.end_date) * i64::from(s.price))
            .sum())
    }

    async fn begin(&self) -> AppResult<Box<dyn SubscriptionTx>> {
        Ok(Box::new(InMemorySubscriptionTx {
            store: self.store.clone(),
            staged: BTreeMap::new(),
        }))
    }
}

/// Staged-write transaction double: reads see the handle's own writes,
/// the shared store only changes on commit.
pub struct InMemorySubscriptionTx {
    store: Arc<Mutex<Store>>,
    staged: BTreeMap<i64, Subscription>,
}

#[async_trait]
impl SubscriptionTx for InMemorySubscriptionTx {
    async fn get_by_id(&mut self, id: i64) -> AppResult<Option<Subscription>> {
        if let Some(staged) = self.staged.get(&id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.store.lock().unwrap().rows.get(&id).cloned())
    }

    async fn update(&mut self, subscription: &Subscription) -> AppResult<Option<Subscription>> {
        let exists = self.staged.contains_key(&subscription.id)
            || self
                .store
                .lock()
                .unwrap()
                .rows
                .contains_key(&subscription.id);
        if !exists {
            return Ok(None);
        }

        let mut updated = subscription.clone();
        updated.updated_at = Utc::now().naive_utc();
        self.staged.insert(updated.id, updated.clone());
        Ok(Some(updated))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let InMemorySubscriptionTx { store, staged } = *self;
        let mut store = store.lock().unwrap();
        for (id, sub) in staged {
            store.rows.insert(id, sub);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        // Staged writes are simply dropped.
        Ok(())
    }
}
