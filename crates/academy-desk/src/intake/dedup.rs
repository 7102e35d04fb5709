use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Live dedup record for one code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupEntry {
    pub code: String,
    pub expires_at: Instant,
}

/// Codes accepted within the last `window`.
///
/// Expired entries are never reported as duplicates, whether or not
/// [`DedupWindow::evict_expired`] has swept them yet.
#[derive(Debug)]
pub struct DedupWindow {
    window: Duration,
    entries: HashMap<String, Instant>,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    pub fn is_duplicate(&self, code: &str, now: Instant) -> bool {
        self.entries
            .get(code)
            .is_some_and(|expires_at| now < *expires_at)
    }

    /// Insert or refresh `code`, expiring `window` after `now`.
    pub fn record(&mut self, code: &str, now: Instant) -> DedupEntry {
        let expires_at = now + self.window;
        self.entries.insert(code.to_string(), expires_at);
        DedupEntry {
            code: code.to_string(),
            expires_at,
        }
    }

    /// Drop expired entries, returning how many went.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| now < *expires_at);
        before - self.entries.len()
    }

    pub fn live_len(&self, now: Instant) -> usize {
        self.entries
            .values()
            .filter(|expires_at| now < **expires_at)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_code_is_duplicate_until_expiry() {
        let start = Instant::now();
        let mut window = DedupWindow::new(Duration::from_millis(5_000));
        let entry = window.record("A1", start);
        assert_eq!(entry.expires_at, start + Duration::from_millis(5_000));

        assert!(window.is_duplicate("A1", start + Duration::from_millis(4_999)));
        assert!(!window.is_duplicate("A1", start + Duration::from_millis(5_000)));
        assert!(!window.is_duplicate("Z9", start));
    }

    #[test]
    fn expired_entries_are_absent_before_and_after_sweep() {
        let start = Instant::now();
        let mut window = DedupWindow::new(Duration::from_millis(100));
        window.record("A1", start);
        window.record("B2", start + Duration::from_millis(80));

        let later = start + Duration::from_millis(120);
        assert!(!window.is_duplicate("A1", later));
        assert_eq!(window.live_len(later), 1);

        assert_eq!(window.evict_expired(later), 1);
        assert!(window.is_duplicate("B2", later));
    }

    #[test]
    fn record_refreshes_expiry() {
        let start = Instant::now();
        let mut window = DedupWindow::new(Duration::from_millis(1_000));
        window.record("A1", start);
        window.record("A1", start + Duration::from_millis(900));

        assert!(window.is_duplicate("A1", start + Duration::from_millis(1_500)));
    }
}
