use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::helpers::month::{format_month_year, parse_month_year},
    application::use_cases::subscription::{
        CreateSubscriptionInput, TotalCostInput, UpdateSubscriptionInput,
    },
    domain::entities::subscription::Subscription,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_subscriptions).post(create_subscription))
        .route("/total-cost", get(total_cost))
        .route(
            "/{id}",
            get(get_subscription)
                .put(update_subscription)
                .delete(delete_subscription),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
struct CreateSubscriptionPayload {
    service_name: String,
    price: i32,
    user_id: Uuid,
    /// "MM-YYYY"
    start_date: String,
    end_date: Option<String>,
}

/// Every field optional. An `end_date` supplied as an empty string clears
/// the stored end date.
#[derive(Deserialize)]
struct UpdateSubscriptionPayload {
    service_name: Option<String>,
    price: Option<i32>,
    user_id: Option<Uuid>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Deserialize)]
struct ListQuery {
    user_id: Option<Uuid>,
    service_name: Option<String>,
}

#[derive(Deserialize)]
struct TotalCostQuery {
    start_date: String,
    end_date: String,
    user_id: Option<Uuid>,
    service_name: Option<String>,
}

#[derive(Serialize)]
struct SubscriptionResponse {
    id: i64,
    service_name: String,
    price: i32,
    user_id: Uuid,
    start_date: String,
    end_date: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl From<&Subscription> for SubscriptionResponse {
    fn from(sub: &Subscription) -> Self {
        SubscriptionResponse {
            id: sub.id,
            service_name: sub.service_name.clone(),
            price: sub.price,
            user_id: sub.user_id,
            start_date: format_month_year(sub.start_date),
            end_date: sub.end_date.map(format_month_year),
            created_at: sub.created_at,
            updated_at: sub.updated_at,
        }
    }
}

#[derive(Serialize)]
struct TotalCostResponse {
    total_cost: i64,
    period_start: String,
    period_end: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_name: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/subscriptions
async fn list_subscriptions(
    State(app_state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<SubscriptionResponse>>> {
    let items = app_state
        .subscription_use_cases
        .list(query.user_id, query.service_name)
        .await?;

    Ok(Json(items.iter().map(SubscriptionResponse::from).collect()))
}

/// POST /api/subscriptions
async fn create_subscription(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateSubscriptionPayload>,
) -> AppResult<impl IntoResponse> {
    let start_date = parse_month_year(payload.start_date.trim())?;
    let end_date = match payload.end_date.as_deref().map(str::trim) {
        Some(raw) => Some(parse_month_year(raw)?),
        None => None,
    };

    let created = app_state
        .subscription_use_cases
        .create(CreateSubscriptionInput {
            service_name: payload.service_name.trim().to_string(),
            price: payload.price,
            user_id: payload.user_id,
            start_date,
            end_date,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubscriptionResponse::from(&created)),
    ))
}

/// GET /api/subscriptions/total-cost
async fn total_cost(
    State(app_state): State<AppState>,
    Query(query): Query<TotalCostQuery>,
) -> AppResult<Json<TotalCostResponse>> {
    let start_date = parse_month_year(query.start_date.trim())?;
    let end_date = parse_month_year(query.end_date.trim())?;

    let total = app_state
        .subscription_use_cases
        .total_cost(TotalCostInput {
            start_date,
            end_date,
            user_id: query.user_id,
            service_name: query.service_name.clone(),
        })
        .await?;

    Ok(Json(TotalCostResponse {
        total_cost: total,
        period_start: query.start_date,
        period_end: query.end_date,
        user_id: query.user_id,
        service_name: query.service_name,
    }))
}

/// GET /api/subscriptions/{id}
async fn get_subscription(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<SubscriptionResponse>> {
    let subscription = app_state.subscription_use_cases.get(id).await?;
    Ok(Json(SubscriptionResponse::from(&subscription)))
}

/// PUT /api/subscriptions/{id}
async fn update_subscription(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSubscriptionPayload>,
) -> AppResult<Json<SubscriptionResponse>> {
    let start_date = match payload.start_date.as_deref().map(str::trim) {
        Some(raw) => Some(parse_month_year(raw)?),
        None => None,
    };

    let mut end_date = None;
    let mut clear_end_date = false;
    if let Some(raw) = payload.end_date.as_deref().map(str::trim) {
        if raw.is_empty() {
            clear_end_date = true;
        } else {
            end_date = Some(parse_month_year(raw)?);
        }
    }

    let updated = app_state
        .subscription_use_cases
        .update(
            id,
            UpdateSubscriptionInput {
                service_name: payload.service_name.map(|s| s.trim().to_string()),
                price: payload.price,
                user_id: payload.user_id,
                start_date,
                end_date,
                clear_end_date,
            },
        )
        .await?;

    Ok(Json(SubscriptionResponse::from(&updated)))
}

/// DELETE /api/subscriptions/{id}
async fn delete_subscription(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    app_state.subscription_use_cases.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::test_utils::{TestAppStateBuilder, create_test_subscription};

    fn build_test_router(app_state: AppState) -> Router<()> {
        router().with_state(app_state)
    }

    fn test_server() -> TestServer {
        let app_state = TestAppStateBuilder::new().build();
        TestServer::new(build_test_router(app_state)).unwrap()
    }

    fn netflix_payload(user_id: Uuid) -> Value {
        json!({
            "service_name": "Netflix",
            "price": 100,
            "user_id": user_id,
            "start_date": "01-2024",
            "end_date": "06-2024",
        })
    }

    // =========================================================================
    // POST /
    // =========================================================================

    #[tokio::test]
    async fn create_returns_201_with_persisted_row() {
        let server = test_server();
        let user_id = Uuid::new_v4();

        let response = server.post("/").json(&netflix_payload(user_id)).await;

        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert!(body["id"].as_i64().unwrap() > 0);
        assert_eq!(body["service_name"], "Netflix");
        assert_eq!(body["price"], 100);
        assert_eq!(body["user_id"], user_id.to_string());
        assert_eq!(body["start_date"], "01-2024");
        assert_eq!(body["end_date"], "06-2024");
        assert!(!body["created_at"].as_str().unwrap().is_empty());
        assert!(!body["updated_at"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_trims_service_name() {
        let server = test_server();
        let mut payload = netflix_payload(Uuid::new_v4());
        payload["service_name"] = json!("  Netflix  ");

        let response = server.post("/").json(&payload).await;

        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["service_name"], "Netflix");
    }

    #[tokio::test]
    async fn create_invalid_price_returns_400() {
        let server = test_server();
        let mut payload = netflix_payload(Uuid::new_v4());
        payload["price"] = json!(0);

        let response = server.post("/").json(&payload).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "VALIDATION_ERROR");

        // Nothing was written.
        let list: Value = server.get("/").await.json();
        assert_eq!(list.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn create_malformed_date_returns_400() {
        let server = test_server();
        let mut payload = netflix_payload(Uuid::new_v4());
        payload["start_date"] = json!("2024-01");

        let response = server.post("/").json(&payload).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn create_end_before_start_returns_400() {
        let server = test_server();
        let mut payload = netflix_payload(Uuid::new_v4());
        payload["start_date"] = json!("06-2024");
        payload["end_date"] = json!("01-2024");

        let response = server.post("/").json(&payload).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    // =========================================================================
    // GET / PUT / DELETE /{id}
    // =========================================================================

    #[tokio::test]
    async fn get_returns_seeded_subscription() {
        let app_state = TestAppStateBuilder::new()
            .with_subscription(create_test_subscription(|s| {
                s.id = 7;
                s.service_name = "Yandex Plus".to_string();
            }))
            .build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();

        let response = server.get("/7").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["service_name"], "Yandex Plus");
        assert_eq!(body["start_date"], "01-2024");
        assert_eq!(body["end_date"], "06-2024");
    }

    #[tokio::test]
    async fn get_unknown_id_returns_404() {
        let server = test_server();

        let response = server.get("/42").await;

        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn crud_round_trip() {
        let server = test_server();
        let user_id = Uuid::new_v4();

        let created: Value = server.post("/").json(&netflix_payload(user_id)).await.json();
        let id = created["id"].as_i64().unwrap();

        let fetched: Value = server.get(&format!("/{id}")).await.json();
        assert_eq!(fetched["service_name"], "Netflix");

        // Partial update: new price, end date cleared via empty string.
        let response = server
            .put(&format!("/{id}"))
            .json(&json!({ "price": 250, "end_date": "" }))
            .await;
        response.assert_status(StatusCode::OK);
        let updated: Value = response.json();
        assert_eq!(updated["price"], 250);
        assert_eq!(updated["end_date"], Value::Null);
        assert_eq!(updated["service_name"], "Netflix");

        let response = server.delete(&format!("/{id}")).await;
        response.assert_status(StatusCode::NO_CONTENT);

        server
            .get(&format!("/{id}"))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_unknown_id_returns_404() {
        let server = test_server();

        let response = server.put("/42").json(&json!({ "price": 10 })).await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_rejecting_validation_keeps_stored_row() {
        let server = test_server();

        let created: Value = server
            .post("/")
            .json(&netflix_payload(Uuid::new_v4()))
            .await
            .json();
        let id = created["id"].as_i64().unwrap();

        let response = server.put(&format!("/{id}")).json(&json!({ "price": -5 })).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let stored: Value = server.get(&format!("/{id}")).await.json();
        assert_eq!(stored["price"], 100);
    }

    #[tokio::test]
    async fn delete_unknown_id_returns_404() {
        let server = test_server();

        server.delete("/42").await.assert_status(StatusCode::NOT_FOUND);
    }

    // =========================================================================
    // GET /
    // =========================================================================

    #[tokio::test]
    async fn list_returns_most_recent_first() {
        let server = test_server();
        let user_id = Uuid::new_v4();

        let mut first = netflix_payload(user_id);
        first["service_name"] = json!("Netflix");
        let mut second = netflix_payload(user_id);
        second["service_name"] = json!("Spotify");

        let first_id = server.post("/").json(&first).await.json::<Value>()["id"]
            .as_i64()
            .unwrap();
        let second_id = server.post("/").json(&second).await.json::<Value>()["id"]
            .as_i64()
            .unwrap();

        let list: Value = server.get("/").await.json();
        let ids: Vec<i64> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![second_id, first_id]);
    }

    #[tokio::test]
    async fn list_filters_by_user_and_service() {
        let server = test_server();
        let user_id = Uuid::new_v4();

        server.post("/").json(&netflix_payload(user_id)).await;
        server.post("/").json(&netflix_payload(Uuid::new_v4())).await;

        let list: Value = server.get(&format!("/?user_id={user_id}")).await.json();
        assert_eq!(list.as_array().unwrap().len(), 1);

        let list: Value = server
            .get(&format!("/?user_id={user_id}&service_name=Spotify"))
            .await
            .json();
        assert_eq!(list.as_array().unwrap().len(), 0);
    }

    // =========================================================================
    // GET /total-cost
    // =========================================================================

    #[tokio::test]
    async fn total_cost_round_trip() {
        let server = test_server();
        let user_id = Uuid::new_v4();

        server.post("/").json(&netflix_payload(user_id)).await;

        let response = server
            .get(&format!(
                "/total-cost?start_date=01-2024&end_date=06-2024&user_id={user_id}&service_name=Netflix"
            ))
            .await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["total_cost"], 600);
        assert_eq!(body["period_start"], "01-2024");
        assert_eq!(body["period_end"], "06-2024");
        assert_eq!(body["user_id"], user_id.to_string());
        assert_eq!(body["service_name"], "Netflix");
    }

    #[tokio::test]
    async fn total_cost_partial_window() {
        let server = test_server();
        let user_id = Uuid::new_v4();

        server.post("/").json(&netflix_payload(user_id)).await;

        let body: Value = server
            .get("/total-cost?start_date=03-2024&end_date=04-2024")
            .await
            .json();
        assert_eq!(body["total_cost"], 200);
    }

    #[tokio::test]
    async fn total_cost_disjoint_window_is_zero() {
        let server = test_server();

        server.post("/").json(&netflix_payload(Uuid::new_v4())).await;

        let body: Value = server
            .get("/total-cost?start_date=01-2020&end_date=12-2020")
            .await
            .json();
        assert_eq!(body["total_cost"], 0);
    }

    #[tokio::test]
    async fn total_cost_requires_dates() {
        let server = test_server();

        let response = server.get("/total-cost?start_date=01-2024").await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn total_cost_malformed_date_returns_400() {
        let server = test_server();

        let response = server
            .get("/total-cost?start_date=notadate&end_date=06-2024")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_INPUT");
    }
}
