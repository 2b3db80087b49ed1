//! Trend commands

use crate::app::AppState;
use crate::error::Result;
use crate::services::{TrendBucket, TrendQuery, TrendSeries};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

/// Everything the analytics card draws
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    pub query: TrendQuery,
    pub buckets: Vec<TrendBucket>,
    pub scale: usize,
    pub total: usize,
}

pub async fn get_trend(state: &AppState, query: TrendQuery) -> Result<TrendReport> {
    get_trend_on(state, query, Utc::now().date_naive()).await
}

/// Same as [`get_trend`] with an explicit "today"
pub async fn get_trend_on(state: &AppState, query: TrendQuery, today: NaiveDate) -> Result<TrendReport> {
    let snapshot = state.store.snapshot().await;
    let mut query = query;
    if let Some(channel) = query.channel.as_deref() {
        query.channel = Some(super::resolve_channel_id(&snapshot, channel)?);
    }

    let series = TrendSeries::build(&snapshot.ideas, query.clone(), today);
    Ok(TrendReport {
        buckets: series.iter().collect(),
        scale: series.scale(),
        total: series.total(),
        query,
    })
}
