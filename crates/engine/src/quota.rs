//! Fixed-window generation quotas.
//!
//! Reservation happens before any model call, covering the whole requested
//! batch atomically: either every episode fits under both windows and both
//! counters advance, or nothing is consumed and the caller gets the limit
//! error with its reset time.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use fableforge_core::error::QuotaError;
use fableforge_core::quota::GenerationGate;
use fableforge_core::OwnerId;
use tokio::sync::Mutex;
use tracing::debug;

/// Per-owner daily and monthly episode quotas over UTC fixed windows.
///
/// A limit of 0 disables that window.
pub struct FixedWindowQuota {
    daily_limit: u32,
    monthly_limit: u32,
    usage: Mutex<HashMap<String, OwnerUsage>>,
}

#[derive(Debug, Clone, Copy)]
struct OwnerUsage {
    day: NaiveDate,
    day_count: u32,
    month: (i32, u32),
    month_count: u32,
}

impl FixedWindowQuota {
    pub fn new(daily_limit: u32, monthly_limit: u32) -> Self {
        Self { daily_limit, monthly_limit, usage: Mutex::new(HashMap::new()) }
    }

    /// Reserve against an explicit clock. The trait method passes `now`.
    pub async fn reserve_at(
        &self,
        owner: &OwnerId,
        episodes: u32,
        now: DateTime<Utc>,
    ) -> Result<(), QuotaError> {
        let today = now.date_naive();
        let this_month = (today.year(), today.month());

        let mut usage = self.usage.lock().await;
        let entry = usage.entry(owner.as_str().to_string()).or_insert(OwnerUsage {
            day: today,
            day_count: 0,
            month: this_month,
            month_count: 0,
        });

        if entry.day != today {
            entry.day = today;
            entry.day_count = 0;
        }
        if entry.month != this_month {
            entry.month = this_month;
            entry.month_count = 0;
        }

        if self.daily_limit > 0 && entry.day_count + episodes > self.daily_limit {
            return Err(QuotaError::DailyLimit {
                limit: self.daily_limit,
                resets_at: next_day(today),
            });
        }
        if self.monthly_limit > 0 && entry.month_count + episodes > self.monthly_limit {
            return Err(QuotaError::MonthlyLimit {
                limit: self.monthly_limit,
                resets_at: next_month(today),
            });
        }

        entry.day_count += episodes;
        entry.month_count += episodes;
        debug!(
            owner = %owner,
            episodes,
            day_used = entry.day_count,
            month_used = entry.month_count,
            "Reserved generation quota"
        );
        Ok(())
    }
}

#[async_trait]
impl GenerationGate for FixedWindowQuota {
    async fn reserve(&self, owner: &OwnerId, episodes: u32) -> Result<(), QuotaError> {
        self.reserve_at(owner, episodes, Utc::now()).await
    }
}

fn next_day(today: NaiveDate) -> String {
    let next = today.checked_add_days(Days::new(1)).unwrap_or(today);
    format!("{next}T00:00:00Z")
}

fn next_month(today: NaiveDate) -> String {
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    format!("{year:04}-{month:02}-01T00:00:00Z")
}
