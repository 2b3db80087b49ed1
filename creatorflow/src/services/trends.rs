//! Production trends
//!
//! Counts of created or completed ideas per day (last 7 or 30 days) or per
//! month (the current calendar year). Series are computed on demand from a
//! slice of ideas and can be iterated any number of times.

use crate::config;
use crate::database::Idea;
use crate::error::{AppError, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which timestamp is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Created,
    Completed,
}

impl Metric {
    fn timestamp(&self, idea: &Idea) -> Option<DateTime<Utc>> {
        match self {
            Metric::Created => Some(idea.created_at),
            Metric::Completed => idea.completed_at,
        }
    }
}

impl FromStr for Metric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "created" | "createdat" => Ok(Metric::Created),
            "completed" | "completedat" => Ok(Metric::Completed),
            other => Err(AppError::Validation(format!("Unknown metric: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Timeframe {
    #[default]
    #[serde(rename = "1W")]
    Week,
    #[serde(rename = "1M")]
    Month,
    #[serde(rename = "1Y")]
    Year,
}

impl Timeframe {
    pub fn bucket_count(&self) -> usize {
        match self {
            Timeframe::Week => 7,
            Timeframe::Month => 30,
            Timeframe::Year => 12,
        }
    }
}

impl FromStr for Timeframe {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "1W" | "WEEK" => Ok(Timeframe::Week),
            "1M" | "MONTH" => Ok(Timeframe::Month),
            "1Y" | "YEAR" => Ok(Timeframe::Year),
            other => Err(AppError::Validation(format!("Unknown timeframe: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendQuery {
    pub metric: Metric,
    pub timeframe: Timeframe,
    /// Only count ideas in this channel
    pub channel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendBucket {
    pub label: String,
    /// First day the bucket covers
    pub start: NaiveDate,
    pub count: usize,
}

/// Bucketed counts for one query
pub struct TrendSeries<'a> {
    ideas: &'a [Idea],
    query: TrendQuery,
    starts: Vec<NaiveDate>,
}

impl<'a> TrendSeries<'a> {
    pub fn build(ideas: &'a [Idea], query: TrendQuery, today: NaiveDate) -> Self {
        let starts = match query.timeframe {
            Timeframe::Week | Timeframe::Month => {
                let n = query.timeframe.bucket_count() as i64;
                (0..n)
                    .rev()
                    .map(|back| today - Duration::days(back))
                    .collect()
            }
            Timeframe::Year => (1..=12)
                .filter_map(|month| NaiveDate::from_ymd_opt(today.year(), month, 1))
                .collect(),
        };

        Self {
            ideas,
            query,
            starts,
        }
    }

    pub fn query(&self) -> &TrendQuery {
        &self.query
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    fn in_bucket(&self, start: NaiveDate, date: NaiveDate) -> bool {
        match self.query.timeframe {
            Timeframe::Week | Timeframe::Month => date == start,
            Timeframe::Year => date.year() == start.year() && date.month() == start.month(),
        }
    }

    fn label(&self, start: NaiveDate) -> String {
        match self.query.timeframe {
            Timeframe::Week => start.format("%a").to_string(),
            Timeframe::Month => start.format("%b %d").to_string(),
            Timeframe::Year => start.format("%b").to_string(),
        }
    }

    fn count(&self, start: NaiveDate) -> usize {
        self.ideas
            .iter()
            .filter(|i| !i.is_deleted)
            .filter(|i| {
                self.query
                    .channel
                    .as_deref()
                    .map_or(true, |c| i.channel_id == c)
            })
            .filter_map(|i| self.query.metric.timestamp(i))
            .filter(|ts| self.in_bucket(start, ts.date_naive()))
            .count()
    }

    /// Buckets oldest first. Each call starts a fresh pass.
    pub fn iter(&self) -> impl Iterator<Item = TrendBucket> + '_ {
        self.starts.iter().map(move |&start| TrendBucket {
            label: self.label(start),
            start,
            count: self.count(start),
        })
    }

    pub fn counts(&self) -> Vec<usize> {
        self.iter().map(|b| b.count).collect()
    }

    pub fn total(&self) -> usize {
        self.iter().map(|b| b.count).sum()
    }

    /// Vertical scale of the chart; never below the minimum so an empty
    /// series still draws a flat line at the bottom.
    pub fn scale(&self) -> usize {
        self.iter()
            .map(|b| b.count)
            .max()
            .unwrap_or(0)
            .max(config::MIN_TREND_SCALE)
    }

    /// Polyline coordinates for a `width` x `height` chart, origin top-left
    pub fn points(&self, width: f64, height: f64) -> Vec<(f64, f64)> {
        let scale = self.scale() as f64;
        let step = if self.len() > 1 {
            width / (self.len() - 1) as f64
        } else {
            0.0
        };

        self.iter()
            .enumerate()
            .map(|(i, b)| (i as f64 * step, height - (b.count as f64 / scale) * height))
            .collect()
    }
}
