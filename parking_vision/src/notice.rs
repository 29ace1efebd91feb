// THEORY:
// A `NoticeBoard` holds the transient message shown to the user. At most one
// notice is live at a time: raising a new one replaces whatever is showing,
// and a notice disappears on its own once its time-to-live has elapsed.

use log::{info, warn};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub raised_at: Instant,
}

#[derive(Debug, Clone)]
pub struct NoticeBoard {
    ttl: Duration,
    current: Option<Notice>,
}

impl NoticeBoard {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

    pub fn new(ttl: Duration) -> Self {
        Self { ttl, current: None }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn raise(&mut self, kind: NoticeKind, message: impl Into<String>) -> &Notice {
        self.raise_at(kind, message, Instant::now())
    }

    pub fn raise_at(&mut self, kind: NoticeKind, message: impl Into<String>, now: Instant) -> &Notice {
        let message = message.into();
        match kind {
            NoticeKind::Success => info!("{message}"),
            NoticeKind::Error => warn!("{message}"),
        }
        self.current.insert(Notice {
            kind,
            message,
            raised_at: now,
        })
    }

    pub fn success(&mut self, message: impl Into<String>) -> &Notice {
        self.raise(NoticeKind::Success, message)
    }

    pub fn error(&mut self, message: impl Into<String>) -> &Notice {
        self.raise(NoticeKind::Error, message)
    }

    /// The live notice as of `now`, if it has not expired.
    pub fn current_at(&self, now: Instant) -> Option<&Notice> {
        self.current
            .as_ref()
            .filter(|notice| now.saturating_duration_since(notice.raised_at) < self.ttl)
    }

    pub fn current(&self) -> Option<&Notice> {
        self.current_at(Instant::now())
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_notice_replaces_old_one() {
        let mut board = NoticeBoard::default();
        board.success("first");
        board.error("second");
        let notice = board.current().unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(notice.message, "second");
    }

    #[test]
    fn notices_expire_after_ttl() {
        let mut board = NoticeBoard::new(Duration::from_secs(5));
        let start = Instant::now();
        board.raise_at(NoticeKind::Success, "saved", start);

        assert!(board.current_at(start + Duration::from_secs(4)).is_some());
        assert!(board.current_at(start + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn dismiss_clears_immediately() {
        let mut board = NoticeBoard::default();
        board.success("hello");
        board.dismiss();
        assert!(board.current().is_none());
    }
}
