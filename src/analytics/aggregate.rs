//! Click aggregation for dashboards.
//!
//! The store hands back sparse grouped counts; this engine turns them into
//! what a dashboard expects: a gapless per-day series over the whole range
//! and top-5 breakdowns for location, device and OS.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{Result, SnaplinkError};
use crate::storages::{ClickDimension, GroupedCount, LinkStore};

const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    /// UTC calendar day, "YYYY-MM-DD".
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkStats {
    /// One entry per calendar day in the requested range, zero-filled.
    pub graph: Vec<DailyCount>,
    pub locations: Vec<GroupedCount>,
    pub devices: Vec<GroupedCount>,
    pub os: Vec<GroupedCount>,
    pub total_clicks: u64,
}

pub struct AggregationEngine {
    store: Arc<dyn LinkStore>,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn LinkStore>) -> Self {
        Self { store }
    }

    pub async fn stats(
        &self,
        link_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<LinkStats> {
        if start > end {
            return Err(SnaplinkError::validation(format!(
                "Invalid date range: {} > {}",
                start, end
            )));
        }

        let daily = self
            .store
            .aggregate_clicks(link_id, start, end, ClickDimension::Day)
            .await?;
        let total_clicks = daily.iter().map(|g| g.count).sum();
        let graph = fill_missing_dates(daily, start, end);

        let locations = self.top_breakdown(link_id, start, end, ClickDimension::Country).await?;
        let devices = self.top_breakdown(link_id, start, end, ClickDimension::Device).await?;
        let os = self.top_breakdown(link_id, start, end, ClickDimension::Os).await?;

        Ok(LinkStats {
            graph,
            locations,
            devices,
            os,
            total_clicks,
        })
    }

    async fn top_breakdown(
        &self,
        link_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        dimension: ClickDimension,
    ) -> Result<Vec<GroupedCount>> {
        let mut rows = self
            .store
            .aggregate_clicks(link_id, start, end, dimension)
            .await?;
        // Descending by count, key as tiebreaker for stable output.
        rows.sort_unstable_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        rows.truncate(TOP_N);
        Ok(rows)
    }
}

/// Expand sparse per-day counts into a continuous series over `[start, end]`.
fn fill_missing_dates(
    daily: Vec<GroupedCount>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<DailyCount> {
    let counts: HashMap<String, u64> = daily.into_iter().map(|g| (g.key, g.count)).collect();

    let mut graph = Vec::new();
    let mut day = start.date_naive();
    let last = end.date_naive();
    while day <= last {
        let date = day.format("%Y-%m-%d").to_string();
        let count = counts.get(&date).copied().unwrap_or(0);
        graph.push(DailyCount { date, count });
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_fill_missing_dates_zero_fills_gaps() {
        let daily = vec![GroupedCount {
            key: "2024-01-02".to_string(),
            count: 1,
        }];
        let graph = fill_missing_dates(daily, utc(2024, 1, 1, 0), utc(2024, 1, 3, 23));

        assert_eq!(
            graph,
            vec![
                DailyCount { date: "2024-01-01".to_string(), count: 0 },
                DailyCount { date: "2024-01-02".to_string(), count: 1 },
                DailyCount { date: "2024-01-03".to_string(), count: 0 },
            ]
        );
    }

    #[test]
    fn test_fill_missing_dates_single_day() {
        let graph = fill_missing_dates(Vec::new(), utc(2024, 6, 15, 8), utc(2024, 6, 15, 20));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph[0].date, "2024-06-15");
        assert_eq!(graph[0].count, 0);
    }

    #[test]
    fn test_fill_missing_dates_spans_month_boundary() {
        let graph = fill_missing_dates(Vec::new(), utc(2024, 1, 30, 0), utc(2024, 2, 2, 0));
        let dates: Vec<&str> = graph.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-30", "2024-01-31", "2024-02-01", "2024-02-02"]);
    }
}
