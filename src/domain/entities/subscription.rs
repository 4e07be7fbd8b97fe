use chrono::{Months, NaiveDate, NaiveDateTime};
use uuid::Uuid;

/// A tracked subscription. Start and end dates are month-granular: the day
/// component is always the 1st, and an absent end date means the
/// subscription is open-ended.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: i64,
    pub service_name: String,
    /// Monthly price in the smallest currency unit. Always positive.
    pub price: i32,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Subscription {
    /// Number of monthly billing occurrences falling within
    /// `[window_start, window_end]` inclusive.
    ///
    /// Occurrences start at `start_date` and recur every calendar month up to
    /// `end_date`, or up to the window end for open-ended subscriptions.
    pub fn occurrences_within(&self, window_start: NaiveDate, window_end: NaiveDate) -> i64 {
        let series_end = match self.end_date {
            Some(end) => end.min(window_end),
            None => window_end,
        };

        let mut count = 0;
        let mut occurrence = self.start_date;
        while occurrence <= series_end {
            if occurrence >= window_start {
                count += 1;
            }
            occurrence = match occurrence.checked_add_months(Months::new(1)) {
                Some(next) => next,
                None => break,
            };
        }
        count
    }
}

/// Optional filters for listing subscriptions. `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub user_id: Option<Uuid>,
    pub service_name: Option<String>,
}

/// Query window plus optional filters for cost aggregation.
#[derive(Debug, Clone)]
pub struct CostFilter {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub user_id: Option<Uuid>,
    pub service_name: Option<String>,
}
