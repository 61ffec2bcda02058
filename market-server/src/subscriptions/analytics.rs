//! Subscription analytics — per-status aggregation over a time window

use serde::Serialize;
use shared::models::{Subscription, SubscriptionStatus};

/// Reporting timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeframe {
    Days7,
    #[default]
    Days30,
    Days90,
}

impl Timeframe {
    /// Parse a "7d" / "30d" / "90d" query value; anything else falls back
    /// to 30 days.
    pub fn parse(value: &str) -> Self {
        match value {
            "7d" => Self::Days7,
            "90d" => Self::Days90,
            _ => Self::Days30,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            Self::Days7 => 7,
            Self::Days30 => 30,
            Self::Days90 => 90,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Days7 => "7d",
            Self::Days30 => "30d",
            Self::Days90 => "90d",
        }
    }
}

/// Aggregates for one subscription status within the window
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusBreakdown {
    pub status: SubscriptionStatus,
    pub count: u32,
    pub total_revenue: f64,
    pub average_satisfaction: f64,
}

/// Whole-population summary (not limited to the window)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalyticsSummary {
    pub total_subscriptions: u32,
    pub active_subscriptions: u32,
    /// Percentage of subscriptions currently active
    pub active_rate: f64,
}

/// Analytics result
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubscriptionAnalytics {
    pub timeframe: &'static str,
    pub breakdown: Vec<StatusBreakdown>,
    pub summary: AnalyticsSummary,
}

/// Aggregate the given (already permission-scoped) subscriptions.
///
/// The breakdown covers subscriptions created at or after `since`, grouped
/// by status; the summary covers the whole scoped population.
pub fn compute(
    subscriptions: &[Subscription],
    since: i64,
    timeframe: Timeframe,
) -> SubscriptionAnalytics {
    let statuses = [
        SubscriptionStatus::Active,
        SubscriptionStatus::Paused,
        SubscriptionStatus::Cancelled,
        SubscriptionStatus::Expired,
    ];

    let windowed: Vec<&Subscription> = subscriptions
        .iter()
        .filter(|s| s.created_at >= since)
        .collect();

    let mut breakdown = Vec::new();
    for status in statuses {
        let group: Vec<&&Subscription> = windowed.iter().filter(|s| s.status == status).collect();
        if group.is_empty() {
            continue;
        }
        let count = group.len() as u32;
        let total_revenue = group.iter().map(|s| s.metrics.total_spent).sum();
        let average_satisfaction =
            group.iter().map(|s| s.metrics.satisfaction_score).sum::<f64>() / count as f64;
        breakdown.push(StatusBreakdown {
            status,
            count,
            total_revenue,
            average_satisfaction,
        });
    }

    let total_subscriptions = subscriptions.len() as u32;
    let active_subscriptions = subscriptions
        .iter()
        .filter(|s| s.status == SubscriptionStatus::Active)
        .count() as u32;
    let active_rate = if total_subscriptions > 0 {
        active_subscriptions as f64 / total_subscriptions as f64 * 100.0
    } else {
        0.0
    };

    SubscriptionAnalytics {
        timeframe: timeframe.label(),
        breakdown,
        summary: AnalyticsSummary {
            total_subscriptions,
            active_subscriptions,
            active_rate,
        },
    }
}
