use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult, ValidationError};
use crate::application::helpers::month::first_of_month;
use crate::domain::entities::subscription::{CostFilter, ListFilter, Subscription};

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn create(&self, input: &CreateSubscriptionInput) -> AppResult<Subscription>;

    async fn get_by_id(&self, id: i64) -> AppResult<Option<Subscription>>;

    /// Returns false when no row matched the id.
    async fn delete(&self, id: i64) -> AppResult<bool>;

    /// Ordered by creation time descending.
    async fn list(&self, filter: &ListFilter) -> AppResult<Vec<Subscription>>;

    /// Sum of monthly billing occurrences within the filter window.
    async fn total_cost(&self, filter: &CostFilter) -> AppResult<i64>;

    /// Open a unit of work. Writes performed through the handle are invisible
    /// to other callers until commit; dropping it without commit rolls back.
    async fn begin(&self) -> AppResult<Box<dyn SubscriptionTx>>;
}

/// Explicit transaction handle. Reads observe the handle's own uncommitted
/// writes.
#[async_trait]
pub trait SubscriptionTx: Send {
    async fn get_by_id(&mut self, id: i64) -> AppResult<Option<Subscription>>;

    /// Writes the full row back, refreshing the update timestamp. Returns
    /// `None` when no row matched the id.
    async fn update(&mut self, subscription: &Subscription) -> AppResult<Option<Subscription>>;

    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateSubscriptionInput {
    pub service_name: String,
    pub price: i32,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// Partial update. A `None` field leaves the stored value unchanged;
/// `clear_end_date` removes the end date and takes precedence over a
/// supplied `end_date` value.
#[derive(Debug, Clone, Default)]
pub struct UpdateSubscriptionInput {
    pub service_name: Option<String>,
    pub price: Option<i32>,
    pub user_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub clear_end_date: bool,
}

#[derive(Debug, Clone)]
pub struct TotalCostInput {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub user_id: Option<Uuid>,
    pub service_name: Option<String>,
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct SubscriptionUseCases {
    repo: Arc<dyn SubscriptionRepo>,
}

impl SubscriptionUseCases {
    pub fn new(repo: Arc<dyn SubscriptionRepo>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateSubscriptionInput) -> AppResult<Subscription> {
        let input = CreateSubscriptionInput {
            start_date: first_of_month(input.start_date),
            end_date: input.end_date.map(first_of_month),
            ..input
        };

        if let Err(err) = validate(
            &input.service_name,
            input.price,
            input.user_id,
            input.start_date,
            input.end_date,
        ) {
            debug!(error = %err, "validation failed");
            return Err(err.into());
        }

        let created = self
            .repo
            .create(&input)
            .await
            .inspect_err(|err| error!(error = %err, "failed to create subscription"))?;

        info!(id = created.id, "subscription created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> AppResult<Subscription> {
        self.repo
            .get_by_id(id)
            .await
            .inspect_err(|err| error!(id, error = %err, "failed to get subscription"))?
            .ok_or(AppError::NotFound)
    }

    /// Read-merge-validate-write as one unit of work. Any failure rolls the
    /// transaction back, leaving the stored row untouched.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: i64, input: UpdateSubscriptionInput) -> AppResult<Subscription> {
        let mut tx = self.repo.begin().await?;

        match Self::update_in_tx(tx.as_mut(), id, input).await {
            Ok(updated) => {
                tx.commit().await?;
                info!(id, "subscription updated");
                Ok(updated)
            }
            Err(err) => {
                error!(id, error = %err, "failed to update subscription");
                let _ = tx.rollback().await;
                Err(err)
            }
        }
    }

    async fn update_in_tx(
        tx: &mut dyn SubscriptionTx,
        id: i64,
        input: UpdateSubscriptionInput,
    ) -> AppResult<Subscription> {
        let mut subscription = tx.get_by_id(id).await?.ok_or(AppError::NotFound)?;

        apply_updates(&mut subscription, input);

        validate(
            &subscription.service_name,
            subscription.price,
            subscription.user_id,
            subscription.start_date,
            subscription.end_date,
        )?;

        tx.update(&subscription).await?.ok_or(AppError::NotFound)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let deleted = self
            .repo
            .delete(id)
            .await
            .inspect_err(|err| error!(id, error = %err, "failed to delete subscription"))?;

        if !deleted {
            return Err(AppError::NotFound);
        }

        info!(id, "subscription deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        user_id: Option<Uuid>,
        service_name: Option<String>,
    ) -> AppResult<Vec<Subscription>> {
        let filter = ListFilter {
            user_id,
            service_name,
        };

        self.repo
            .list(&filter)
            .await
            .inspect_err(|err| error!(error = %err, "failed to list subscriptions"))
    }

    /// Total cost over the query window. A future end date is clamped to
    /// today; the start date is never clamped, so a start past the clamped
    /// end yields `InvalidDateRange`.
    #[instrument(skip(self, input))]
    pub async fn total_cost(&self, input: TotalCostInput) -> AppResult<i64> {
        let today = Utc::now().date_naive();
        let end_date = if input.end_date > today {
            today
        } else {
            input.end_date
        };

        if end_date < input.start_date {
            return Err(ValidationError::InvalidDateRange.into());
        }

        let filter = CostFilter {
            start_date: input.start_date,
            end_date,
            user_id: input.user_id,
            service_name: input.service_name,
        };

        self.repo
            .total_cost(&filter)
            .await
            .inspect_err(|err| error!(error = %err, "failed to calculate total cost"))
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate(
    service_name: &str,
    price: i32,
    user_id: Uuid,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    if service_name.trim().is_empty() {
        return Err(ValidationError::InvalidServiceName);
    }
    if price <= 0 {
        return Err(ValidationError::InvalidPrice);
    }
    if user_id.is_nil() {
        return Err(ValidationError::InvalidUserId);
    }
    if let Some(end_date) = end_date {
        if end_date < start_date {
            return Err(ValidationError::InvalidDateRange);
        }
    }
    Ok(())
}

fn apply_updates(subscription: &mut Subscription, input: UpdateSubscriptionInput) {
    if let Some(service_name) = input.service_name {
        subscription.service_name = service_name;
    }
    if let Some(price) = input.price {
        subscription.price = price;
    }
    if let Some(user_id) = input.user_id {
        subscription.user_id = user_id;
    }
    if let Some(start_date) = input.start_date {
        subscription.start_date = first_of_month(start_date);
    }
    if input.clear_end_date {
        subscription.end_date = None;
    } else if let Some(end_date) = input.end_date {
        subscription.end_date = Some(first_of_month(end_date));
    }
}
