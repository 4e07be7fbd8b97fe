use async_trait::async_trait;
use sqlx::{Postgres, Row, Transaction};

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscription::{
        CreateSubscriptionInput, SubscriptionRepo, SubscriptionTx,
    },
    domain::entities::subscription::{CostFilter, ListFilter, Subscription},
};

const SELECT_COLS: &str =
    "id, service_name, price, user_id, start_date, end_date, created_at, updated_at";

fn row_to_subscription(row: &sqlx::postgres::PgRow) -> Subscription {
    Subscription {
        id: row.get("id"),
        service_name: row.get("service_name"),
        price: row.get("price"),
        user_id: row.get("user_id"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn create(&self, input: &CreateSubscriptionInput) -> AppResult<Subscription> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions (service_name, price, user_id, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(&input.service_name)
        .bind(input.price)
        .bind(input.user_id)
        .bind(input.start_date)
        .bind(input.end_date)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row_to_subscription(&row))
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &ListFilter) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM subscriptions
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR service_name = $2)
            ORDER BY created_at DESC
            "#,
            SELECT_COLS
        ))
        .bind(filter.user_id)
        .bind(filter.service_name.as_deref())
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_subscription).collect())
    }

    async fn total_cost(&self, filter: &CostFilter) -> AppResult<i64> {
        // Expand each subscription into its monthly billing occurrences and
        // sum the price of those landing inside the window. Open-ended rows
        // run to the window end.
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(s.price), 0)::bigint AS total_spent
            FROM subscriptions s
            JOIN LATERAL generate_series(
                s.start_date,
                COALESCE(s.end_date, $2::date),
                '1 month'::interval
            ) AS occurrence ON true
            WHERE occurrence >= $1::date
              AND occurrence <= $2::date
              AND ($3::uuid IS NULL OR s.user_id = $3)
              AND ($4::text IS NULL OR s.service_name = $4)
            "#,
        )
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.user_id)
        .bind(filter.service_name.as_deref())
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(total)
    }

    async fn begin(&self) -> AppResult<Box<dyn SubscriptionTx>> {
        let tx = self.pool().begin().await.map_err(AppError::from)?;
        Ok(Box::new(PgSubscriptionTx { tx }))
    }
}

/// Unit of work over a Postgres transaction. Dropping it without commit
/// rolls back (sqlx semantics).
pub struct PgSubscriptionTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SubscriptionTx for PgSubscriptionTx {
    async fn get_by_id(&mut self, id: i64) -> AppResult<Option<Subscription>> {
        // FOR UPDATE holds the row against concurrent read-merge-write cycles.
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1 FOR UPDATE",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn update(&mut self, subscription: &Subscription) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET service_name = $1,
                price        = $2,
                user_id      = $3,
                start_date   = $4,
                end_date     = $5,
                updated_at   = now()
            WHERE id = $6
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(&subscription.service_name)
        .bind(subscription.price)
        .bind(subscription.user_id)
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await.map_err(AppError::from)
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await.map_err(AppError::from)
    }
}
