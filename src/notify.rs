use std::time::{Duration, Instant};

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Banner {
    pub message: String,
    pub kind: BannerKind,
    expires_at: Instant,
}

impl Banner {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Transient success/error messages. Each banner carries its own expiry, so
/// several can be on screen at once.
#[derive(Debug)]
pub struct Notifications {
    banners: Vec<Banner>,
    ttl: Duration,
}

impl Notifications {
    pub fn new(ttl: Duration) -> Self {
        Self {
            banners: Vec::new(),
            ttl,
        }
    }

    pub fn show(&mut self, message: impl Into<String>, kind: BannerKind) {
        self.show_at(message, kind, Instant::now());
    }

    pub fn show_at(&mut self, message: impl Into<String>, kind: BannerKind, now: Instant) {
        let message = message.into();
        if message.is_empty() {
            return;
        }
        match kind {
            BannerKind::Success => info!(%message, "banner"),
            BannerKind::Error => warn!(%message, "banner"),
        }
        self.banners.push(Banner {
            message,
            kind,
            expires_at: now + self.ttl,
        });
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.show(message, BannerKind::Success);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.show(message, BannerKind::Error);
    }

    /// Drops every banner whose timer has run out.
    pub fn prune(&mut self, now: Instant) {
        self.banners.retain(|b| !b.is_expired(now));
    }

    pub fn clear(&mut self) {
        self.banners.clear();
    }

    pub fn banners(&self) -> &[Banner] {
        &self.banners
    }

    /// Hands every pending banner to the caller, for one-shot commands that
    /// print instead of waiting out timers.
    pub fn drain(&mut self) -> Vec<Banner> {
        std::mem::take(&mut self.banners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banners_coexist_with_independent_timers() {
        let mut notes = Notifications::new(Duration::from_secs(4));
        let start = Instant::now();
        notes.show_at("first", BannerKind::Success, start);
        notes.show_at("second", BannerKind::Error, start + Duration::from_secs(2));
        assert_eq!(notes.banners().len(), 2);

        notes.prune(start + Duration::from_secs(5));
        let left: Vec<&str> = notes.banners().iter().map(|b| b.message.as_str()).collect();
        assert_eq!(left, vec!["second"]);

        notes.prune(start + Duration::from_secs(6));
        assert!(notes.banners().is_empty());
    }

    #[test]
    fn test_empty_message_is_ignored() {
        let mut notes = Notifications::new(Duration::from_secs(4));
        notes.success("");
        assert!(notes.banners().is_empty());
    }

    #[test]
    fn test_clear_and_drain() {
        let mut notes = Notifications::new(Duration::from_secs(4));
        notes.success("saved");
        notes.error("failed");
        let drained = notes.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].kind, BannerKind::Error);
        assert!(notes.banners().is_empty());

        notes.success("again");
        notes.clear();
        assert!(notes.banners().is_empty());
    }
}
