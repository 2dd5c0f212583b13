//! Windowed aggregates for the admin dashboard and the landing page.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::feedback::mean;
use crate::state::AppState;
use crate::views::Snapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsWindow {
    #[default]
    Today,
    Week,
    Month,
    All,
}

/// Half-open `[from, to)` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl Span {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at < self.to
    }
}

impl StatsWindow {
    /// The window ending at `now`, or `None` for all time.
    pub fn current(self, now: DateTime<Utc>) -> Option<Span> {
        let from = match self {
            Self::Today => now.date_naive().and_time(NaiveTime::MIN).and_utc(),
            Self::Week => now - chrono::Duration::days(7),
            Self::Month => now - chrono::Duration::days(30),
            Self::All => return None,
        };
        Some(Span { from, to: now })
    }

    /// The window right before [`Self::current`]. For `today` that is the
    /// whole of yesterday.
    pub fn previous(self, now: DateTime<Utc>) -> Option<Span> {
        let current = self.current(now)?;
        let length = match self {
            Self::Today => chrono::Duration::days(1),
            _ => current.to - current.from,
        };
        Some(Span {
            from: current.from - length,
            to: current.from,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowTotals {
    pub orders_placed: usize,
    pub orders_delivered: usize,
    pub revenue: Decimal,
    pub customers: usize,
    pub average_rating: f64,
    pub feedback_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub window: StatsWindow,
    pub span: Option<Span>,
    pub current: WindowTotals,
    pub previous: Option<WindowTotals>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LandingStats {
    pub average_rating: f64,
    pub total_customers: usize,
    pub delivered_orders: usize,
}

fn totals(snapshot: &Snapshot, span: Option<Span>) -> WindowTotals {
    let inside = |at: DateTime<Utc>| span.is_none_or(|span| span.contains(at));

    let placed: Vec<_> = snapshot.orders.iter().filter(|o| inside(o.created_at)).collect();
    let delivered: Vec<_> = snapshot
        .orders
        .iter()
        .filter(|o| o.status.is_terminal() && o.completed_at.is_some_and(|at| inside(at)))
        .collect();
    let customers: HashSet<_> = placed.iter().map(|o| o.customer_id).collect();

    let ratings: Vec<u64> = snapshot
        .feedback
        .iter()
        .filter(|f| inside(f.created_at))
        .map(|f| u64::from(f.rating))
        .collect();

    WindowTotals {
        orders_placed: placed.len(),
        orders_delivered: delivered.len(),
        revenue: delivered.iter().map(|o| o.total_amount).sum(),
        customers: customers.len(),
        average_rating: mean(ratings.iter().sum(), ratings.len() as u64),
        feedback_count: ratings.len(),
    }
}

pub fn summarize(snapshot: &Snapshot, window: StatsWindow, now: DateTime<Utc>) -> StatsSummary {
    let span = window.current(now);
    StatsSummary {
        window,
        span,
        current: totals(snapshot, span),
        previous: window.previous(now).map(|prev| totals(snapshot, Some(prev))),
    }
}

pub fn landing(snapshot: &Snapshot) -> LandingStats {
    let all = totals(snapshot, None);
    LandingStats {
        average_rating: all.average_rating,
        total_customers: all.customers,
        delivered_orders: all.orders_delivered,
    }
}

/// Recomputes the landing-page figures on a fixed tick and broadcasts them
/// whenever they changed.
pub async fn run_landing_publisher(state: Arc<AppState>, every: Duration) {
    info!(interval_secs = every.as_secs(), "landing stats publisher started");

    let mut ticker = tokio::time::interval(every);
    let mut last: Option<LandingStats> = None;

    loop {
        ticker.tick().await;

        let stats = landing(&Snapshot::capture(&state));
        if last.as_ref() == Some(&stats) {
            continue;
        }

        let receivers = state.landing_stats_tx.send(stats.clone()).unwrap_or(0);
        debug!(receivers, "landing stats published");
        last = Some(stats);
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{landing, summarize, StatsWindow};
    use crate::config::Settings;
    use crate::engine::feedback::submit;
    use crate::engine::feedback::tests::deliver;
    use crate::engine::lifecycle::tests::{customer, place, state_with};
    use crate::views::Snapshot;

    #[test]
    fn today_starts_at_midnight_and_previous_is_yesterday() {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 15, 30, 0).unwrap();
        let today = StatsWindow::Today.current(now).unwrap();
        assert_eq!(today.from, Utc.with_ymd_and_hms(2026, 5, 10, 0, 0, 0).unwrap());

        let yesterday = StatsWindow::Today.previous(now).unwrap();
        assert_eq!(yesterday.from, Utc.with_ymd_and_hms(2026, 5, 9, 0, 0, 0).unwrap());
        assert_eq!(yesterday.to, today.from);

        let week = StatsWindow::Week.previous(now).unwrap();
        assert_eq!(week.to - week.from, Duration::days(7));
        assert!(StatsWindow::All.previous(now).is_none());
    }

    #[test]
    fn revenue_counts_only_orders_delivered_inside_the_window() {
        let state = state_with(Settings::default());
        deliver(&state, "100.25");
        deliver(&state, "50");
        place(&state, "999");

        let snapshot = Snapshot::capture(&state);
        let now = Utc::now() + Duration::seconds(1);

        let summary = summarize(&snapshot, StatsWindow::All, now);
        assert_eq!(summary.current.orders_placed, 3);
        assert_eq!(summary.current.orders_delivered, 2);
        assert_eq!(summary.current.revenue, Decimal::from_str("150.25").unwrap());
        assert_eq!(summary.current.customers, 1);
        assert!(summary.previous.is_none());

        let long_ago = now - Duration::days(365);
        let past = summarize(&snapshot, StatsWindow::Week, long_ago);
        assert_eq!(past.current.orders_delivered, 0);
        assert_eq!(past.current.revenue, Decimal::ZERO);
        assert_eq!(past.previous.unwrap().orders_placed, 0);
    }

    #[test]
    fn landing_reports_average_rating_and_customers() {
        let state = state_with(Settings::default());
        for rating in [5, 4, 5] {
            let (order, _) = deliver(&state, "10");
            submit(&state, order.id, &customer(), rating, None).unwrap();
        }

        let stats = landing(&Snapshot::capture(&state));
        assert_eq!(stats.average_rating, 14.0 / 3.0);
        assert_eq!(stats.total_customers, 1);
        assert_eq!(stats.delivered_orders, 3);
    }
}
