//! Test app state builder for HTTP-level testing.

use std::sync::Arc;

use axum::http::HeaderValue;

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::subscription::{SubscriptionRepo, SubscriptionUseCases},
    domain::entities::subscription::Subscription,
    infra::config::AppConfig,
    test_utils::InMemorySubscriptionRepo,
};

/// Builder for an `AppState` backed by in-memory mocks.
#[derive(Default)]
pub struct TestAppStateBuilder {
    subscriptions: Vec<Subscription>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    pub fn build(self) -> AppState {
        let repo = Arc::new(InMemorySubscriptionRepo::with_subscriptions(
            self.subscriptions,
        ));
        let subscription_use_cases = SubscriptionUseCases::new(repo as Arc<dyn SubscriptionRepo>);

        AppState {
            config: Arc::new(test_config()),
            subscription_use_cases: Arc::new(subscription_use_cases),
        }
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        database_url: String::new(),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
    }
}
