use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::entities::subscription::Subscription;

/// Build a subscription with sensible defaults, customized via the closure.
pub fn create_test_subscription(configure: impl FnOnce(&mut Subscription)) -> Subscription {
    let now = Utc::now().naive_utc();
    let mut sub = Subscription {
        id: 1,
        service_name: "Netflix".to_string(),
        price: 100,
        user_id: Uuid::new_v4(),
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: Some(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
        created_at: now,
        updated_at: now,
    };
    configure(&mut sub);
    sub
}
