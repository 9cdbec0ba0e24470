use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Date boundary of one crawl cycle
///
/// Derived once per cycle as the later of `now - max_age_days` and the
/// source's last run, then held constant for the whole cycle. Items posted
/// on or before the cutoff's date are out of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CutoffPolicy {
    cutoff: DateTime<Utc>,
}

impl CutoffPolicy {
    /// Derives the cutoff for a cycle starting at `now`
    ///
    /// # Example
    ///
    /// ```
    /// use chrono::{Duration, Utc};
    /// use offer_harvester::state::CutoffPolicy;
    ///
    /// let now = Utc::now();
    /// let first = CutoffPolicy::derive(now, 7, None);
    /// assert_eq!(first.cutoff(), now - Duration::days(7));
    ///
    /// let later = CutoffPolicy::derive(now, 7, Some(now - Duration::days(1)));
    /// assert_eq!(later.cutoff(), now - Duration::days(1));
    /// ```
    pub fn derive(now: DateTime<Utc>, max_age_days: u32, last_run: Option<DateTime<Utc>>) -> Self {
        let window = now - Duration::days(i64::from(max_age_days));
        let cutoff = match last_run {
            Some(last) => last.max(window),
            None => window,
        };
        Self { cutoff }
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    /// Returns true if an item posted on `date` is out of the window
    pub fn excludes(&self, date: NaiveDate) -> bool {
        date <= self.cutoff.date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_boundary_is_excluded() {
        let now = DateTime::parse_from_rfc3339("2025-06-20T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let policy = CutoffPolicy::derive(now, 7, None);

        assert!(policy.excludes(day(2025, 6, 12)));
        assert!(policy.excludes(day(2025, 6, 13)));
        assert!(!policy.excludes(day(2025, 6, 14)));
        assert!(!policy.excludes(day(2025, 6, 20)));
    }

    #[test]
    fn test_old_last_run_does_not_widen_window() {
        let now = Utc::now();
        let policy = CutoffPolicy::derive(now, 7, Some(now - Duration::days(30)));
        assert_eq!(policy.cutoff(), now - Duration::days(7));
    }

    #[test]
    fn test_cutoff_is_monotonic_across_runs() {
        let run_1 = Utc::now() - Duration::days(2);
        let run_2 = Utc::now();

        let first = CutoffPolicy::derive(run_1, 7, None);
        let second = CutoffPolicy::derive(run_2, 7, Some(run_1));

        assert!(second >= first);
    }
}
