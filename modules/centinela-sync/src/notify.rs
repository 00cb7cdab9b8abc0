//! Transient user-facing notices. One notice at a time, auto-expiring
//! after a short fixed delay or on explicit dismissal.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// How long a notice stays visible.
pub const NOTICE_TTL_SECONDS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Success => write!(f, "success"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
    pub posted_at: DateTime<Utc>,
}

impl Notice {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
            posted_at: Utc::now(),
        }
    }

    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now - self.posted_at >= Duration::seconds(NOTICE_TTL_SECONDS)
    }
}

/// Holds the latest notice; a new post replaces whatever was showing.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Option<Notice>,
}

impl NoticeBoard {
    pub fn post(&mut self, severity: Severity, message: impl Into<String>) {
        let notice = Notice::new(severity, message);
        tracing::debug!(severity = %notice.severity, message = %notice.message, "Notice posted");
        self.current = Some(notice);
    }

    /// The visible notice at `now`, if any is still within its TTL.
    pub fn current(&self, now: DateTime<Utc>) -> Option<&Notice> {
        self.current.as_ref().filter(|n| !n.expired(now))
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
