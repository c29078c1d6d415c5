//! Лічильники процесу. Живуть лише в пам'яті й скидаються при перезапуску.

use chrono::{Local, NaiveDate};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug)]
struct DailyActive {
    date: NaiveDate,
    users: HashSet<i64>,
}

#[derive(Debug)]
pub struct Stats {
    started_at: Instant,
    total_users: AtomicU64,
    commands_used: AtomicU64,
    schedule_views: AtomicU64,
    ai_queries: AtomicU64,
    daily: Mutex<DailyActive>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub online_now: usize,
    pub active_today: usize,
    pub total_users: u64,
    pub commands_used: u64,
    pub schedule_views: u64,
    pub ai_queries: u64,
    pub uptime: Duration,
    pub donors: usize,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_users: AtomicU64::new(0),
            commands_used: AtomicU64::new(0),
            schedule_views: AtomicU64::new(0),
            ai_queries: AtomicU64::new(0),
            daily: Mutex::new(DailyActive {
                date: Local::now().date_naive(),
                users: HashSet::new(),
            }),
        }
    }

    pub fn record_new_user(&self) {
        self.total_users.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command(&self) {
        self.commands_used.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_schedule_view(&self) {
        self.schedule_views.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ai_query(&self) {
        self.ai_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn record_active(&self, user_id: i64) {
        self.record_active_on(user_id, Local::now().date_naive()).await;
    }

    async fn record_active_on(&self, user_id: i64, today: NaiveDate) {
        let mut daily = self.daily.lock().await;
        if daily.date != today {
            daily.date = today;
            daily.users.clear();
        }
        daily.users.insert(user_id);
    }

    pub async fn active_today(&self) -> usize {
        let daily = self.daily.lock().await;
        if daily.date == Local::now().date_naive() {
            daily.users.len()
        } else {
            0
        }
    }

    pub async fn snapshot(&self, online_now: usize, donors: usize) -> StatsSnapshot {
        StatsSnapshot {
            online_now,
            active_today: self.active_today().await,
            total_users: self.total_users.load(Ordering::Relaxed),
            commands_used: self.commands_used.load(Ordering::Relaxed),
            schedule_views: self.schedule_views.load(Ordering::Relaxed),
            ai_queries: self.ai_queries.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
            donors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counters_accumulate() {
        let stats = Stats::new();
        stats.record_new_user();
        stats.record_command();
        stats.record_command();
        stats.record_schedule_view();
        stats.record_ai_query();
        stats.record_active(1).await;
        stats.record_active(1).await;
        stats.record_active(2).await;

        let snapshot = stats.snapshot(1, 3).await;
        assert_eq!(snapshot.total_users, 1);
        assert_eq!(snapshot.commands_used, 2);
        assert_eq!(snapshot.schedule_views, 1);
        assert_eq!(snapshot.ai_queries, 1);
        assert_eq!(snapshot.active_today, 2);
        assert_eq!(snapshot.online_now, 1);
        assert_eq!(snapshot.donors, 3);
    }

    #[tokio::test]
    async fn daily_set_resets_on_new_date() {
        let stats = Stats::new();
        let yesterday = Local::now().date_naive().pred_opt().unwrap();
        stats.record_active_on(1, yesterday).await;
        stats.record_active_on(2, yesterday).await;
        assert_eq!(stats.active_today().await, 0);

        stats.record_active(3).await;
        assert_eq!(stats.active_today().await, 1);
    }
}
