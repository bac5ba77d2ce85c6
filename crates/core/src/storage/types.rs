use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::TimeRangeError;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// A normalized page request.
///
/// Construction never fails: out-of-range values fall back to defaults so a
/// sloppy caller still gets a sensible page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Page below 1 becomes 1. Limit outside 1..=100 becomes 20.
    pub fn new(page: i64, limit: i64) -> Self {
        let page = if page < 1 {
            1
        } else {
            page.min(u32::MAX as i64) as u32
        };
        let limit = if (1..=MAX_PAGE_LIMIT as i64).contains(&limit) {
            limit as u32
        } else {
            DEFAULT_PAGE_LIMIT
        };
        Self { page, limit }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_LIMIT as i64)
    }
}

/// An inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a new range, validating that from <= to.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, TimeRangeError> {
        if from > to {
            return Err(TimeRangeError::InvalidRange);
        }
        Ok(Self { from, to })
    }

    /// The window ending at `now` and spanning `span`.
    pub fn last(span: Duration, now: DateTime<Utc>) -> Self {
        Self {
            from: now - span,
            to: now,
        }
    }

    /// Shrinks the window so it spans at most `max`, keeping `to` fixed.
    pub fn clamp_span(self, max: Duration) -> Self {
        if self.to - self.from > max {
            Self {
                from: self.to - max,
                to: self.to,
            }
        } else {
            self
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant <= self.to
    }
}

/// Row counts produced by a batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl UpsertSummary {
    /// Rows written (inserted or updated).
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_page_request_keeps_valid_values() {
        let page = PageRequest::new(3, 50);
        assert_eq!(page, PageRequest { page: 3, limit: 50 });
        assert_eq!(page.offset(), 100);
    }

    #[test]
    fn test_page_request_normalizes_page() {
        assert_eq!(PageRequest::new(0, 10).page, 1);
        assert_eq!(PageRequest::new(-5, 10).page, 1);
    }

    #[test]
    fn test_page_request_normalizes_limit() {
        assert_eq!(PageRequest::new(1, 0).limit, 20);
        assert_eq!(PageRequest::new(1, 101).limit, 20);
        assert_eq!(PageRequest::new(1, 100).limit, 100);
        assert_eq!(PageRequest::new(1, 1).limit, 1);
    }

    #[test]
    fn test_first_page_has_no_offset() {
        assert_eq!(PageRequest::default().offset(), 0);
    }

    #[test]
    fn test_valid_time_range() {
        let range = TimeRange::new(at(1), at(2)).unwrap();
        assert_eq!(range.from, at(1));
        assert!(range.contains(at(1)));
        assert!(range.contains(at(2)));
        assert!(!range.contains(at(3)));
    }

    #[test]
    fn test_instant_range_is_valid() {
        assert!(TimeRange::new(at(5), at(5)).is_ok());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        assert_eq!(
            TimeRange::new(at(2), at(1)),
            Err(TimeRangeError::InvalidRange)
        );
    }

    #[test]
    fn test_clamp_span_keeps_end() {
        let range = TimeRange::new(at(0), at(10)).unwrap().clamp_span(Duration::hours(4));
        assert_eq!(range.from, at(6));
        assert_eq!(range.to, at(10));

        let short = TimeRange::new(at(8), at(10)).unwrap();
        assert_eq!(short.clamp_span(Duration::hours(4)), short);
    }

    #[test]
    fn test_last_window() {
        let range = TimeRange::last(Duration::hours(24), at(12));
        assert_eq!(range.to, at(12));
        assert_eq!(range.to - range.from, Duration::hours(24));
    }

    #[test]
    fn test_upsert_summary_written() {
        let summary = UpsertSummary {
            inserted: 2,
            updated: 3,
            skipped: 1,
        };
        assert_eq!(summary.written(), 5);
    }
}
