use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use moka::future::Cache;
use sqlx::SqlitePool;

use crate::model::employee::Province;
use crate::model::holiday::Holiday;

/// The holiday table is read-only reference data, so lookups are cached
/// per (province, window) with a TTL instead of hitting the store on every
/// aggregation.
#[derive(Clone)]
pub struct HolidayCache {
    inner: Cache<(Province, NaiveDate, NaiveDate), Arc<Vec<Holiday>>>,
}

impl HolidayCache {
    pub fn new() -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(Duration::from_secs(3600))
                .build(),
        }
    }

    pub async fn in_range(
        &self,
        pool: &SqlitePool,
        province: Province,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Holiday>, sqlx::Error> {
        if let Some(cached) = self.inner.get(&(province, start, end)).await {
            return Ok(cached.as_ref().clone());
        }

        let holidays = sqlx::query_as::<_, Holiday>(
            r#"
            SELECT id, date, name, province
            FROM holidays
            WHERE province = ? AND date >= ? AND date <= ?
            ORDER BY date
            "#,
        )
        .bind(province)
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await?;

        self.inner
            .insert((province, start, end), Arc::new(holidays.clone()))
            .await;
        Ok(holidays)
    }
}

/// Preload the current year's holidays for every province at startup.
pub async fn warmup_holiday_cache(pool: &SqlitePool, cache: &HolidayCache, year: i32) -> Result<()> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1).expect("jan 1");
    let end = NaiveDate::from_ymd_opt(year, 12, 31).expect("dec 31");

    let provinces = sqlx::query_scalar::<_, Province>("SELECT DISTINCT province FROM holidays")
        .fetch_all(pool)
        .await?;

    let mut total = 0usize;
    for province in provinces {
        total += cache.in_range(pool, province, start, end).await?.len();
    }

    tracing::info!(total, year, "Holiday cache warmup complete");
    Ok(())
}
