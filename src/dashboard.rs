use std::cmp::Reverse;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::models::{JobApplication, parse_timestamp};

pub const DEFAULT_REFRESH: Duration = Duration::from_secs(300);
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(100);
pub const RECENT_LIMIT: usize = 5;

/// Record kind the dashboard's add form creates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuickAdd {
    #[default]
    Application,
    Company,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusStats {
    pub total: usize,
    pub applied: usize,
    pub interviewed: usize,
    pub offered: usize,
    pub rejected: usize,
    pub accepted: usize,
}

impl StatusStats {
    /// Bar data in display order. `None` when there is nothing to chart.
    pub fn chart(&self) -> Option<[(&'static str, u64); 5]> {
        if self.total == 0 {
            return None;
        }
        Some([
            ("Applied", self.applied as u64),
            ("Interviewed", self.interviewed as u64),
            ("Offered", self.offered as u64),
            ("Rejected", self.rejected as u64),
            ("Accepted", self.accepted as u64),
        ])
    }
}

/// Anything not recognized counts as applied.
pub fn calculate_stats(applications: &[JobApplication]) -> StatusStats {
    let mut stats = StatusStats {
        total: applications.len(),
        ..Default::default()
    };
    for app in applications {
        match app.status.trim().to_lowercase().as_str() {
            "interviewed" => stats.interviewed += 1,
            "offered" => stats.offered += 1,
            "rejected" => stats.rejected += 1,
            "accepted" => stats.accepted += 1,
            _ => stats.applied += 1,
        }
    }
    stats
}

/// Newest first by application date; undated applications sort last.
pub fn recent_applications(applications: &[JobApplication], limit: usize) -> Vec<JobApplication> {
    let mut sorted = applications.to_vec();
    sorted.sort_by_key(|app| Reverse(parse_timestamp(&app.application_date)));
    sorted.truncate(limit);
    sorted
}

/// Fixed-interval refresh that can be paused while the terminal is in the
/// background.
#[derive(Debug, Clone)]
pub struct RefreshTimer {
    interval: Duration,
    next: Option<Instant>,
}

impl RefreshTimer {
    pub fn new(interval: Duration) -> Self {
        Self { interval, next: None }
    }

    pub fn start(&mut self, now: Instant) {
        self.next = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.next = None;
    }

    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    /// True once per elapsed interval; the next deadline is scheduled from
    /// `now`.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.next {
            Some(next) if now >= next => {
                self.next = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}

/// Coalesces bursts of events: only the last one fires, once `delay` has
/// passed without another.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    pub fn trigger(&mut self, now: Instant) {
        self.pending = Some(now + self.delay);
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(at) if now >= at => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

/// Dashboard state derived from the application collection.
#[derive(Debug)]
pub struct Dashboard {
    pub stats: StatusStats,
    pub recent: Vec<JobApplication>,
    pub refresh: RefreshTimer,
    pub resize: Debouncer,
    /// Width the chart was last laid out for.
    pub chart_width: u16,
}

impl Dashboard {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            stats: StatusStats::default(),
            recent: Vec::new(),
            refresh: RefreshTimer::new(refresh_interval),
            resize: Debouncer::new(RESIZE_DEBOUNCE),
            chart_width: 0,
        }
    }

    pub fn update(&mut self, applications: &[JobApplication]) {
        self.stats = calculate_stats(applications);
        self.recent = recent_applications(applications, RECENT_LIMIT);
        debug!(total = self.stats.total, "dashboard updated");
    }

    pub fn focus_lost(&mut self) {
        self.refresh.stop();
    }

    pub fn focus_gained(&mut self, now: Instant) {
        self.refresh.start(now);
    }
}
