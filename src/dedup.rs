//! Duplicate-suppression cache for the notification pipeline.
//!
//! The same report routinely arrives twice: once over RF via the serial TNC
//! and once from the APRS-IS relay, often wrapped in third-party
//! encapsulation by some other gateway. Frames are keyed on the
//! (destination, source, body) tuple of the innermost original report and
//! suppressed while the key is unexpired.
//!
//! Growth is bounded by distinct keys per window; the sweep exists to
//! reclaim memory, not for correctness.

use crate::frame::Frame;
use ahash::RandomState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

// Re-parsing a hostile body could nest forever; real traffic nests once.
const MAX_UNWRAP_DEPTH: usize = 8;

/// Time-windowed presence cache over frame identity keys.
///
/// Internally synchronized: both ingestion-side consumers may call
/// [`check_and_insert`](DedupCache::check_and_insert) concurrently.
pub struct DedupCache {
    window: Duration,
    entries: Mutex<HashMap<String, Instant, RandomState>>,
}

impl DedupCache {
    /// `window` is how long a key suppresses repeats after insertion.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::with_hasher(RandomState::new())),
        }
    }

    /// Returns `true` when the frame is a duplicate to be suppressed.
    /// Otherwise stamps the key with `now + window` and returns `false`.
    pub fn check_and_insert(&self, frame: &Frame) -> bool {
        let key = dedup_key(frame);
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if let Some(&expiry) = entries.get(&key) {
            if expiry > now {
                return true;
            }
        }
        entries.insert(key, now + self.window);
        false
    }

    /// Evict expired entries. Run periodically; never required for
    /// correctness since lookups check expiry themselves.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries.lock().retain(|_, &mut expiry| expiry > now);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Composite identity of the innermost report, after unwrapping any
/// third-party relay encapsulation.
fn dedup_key(frame: &Frame) -> String {
    let mut innermost = frame.clone();
    for _ in 0..MAX_UNWRAP_DEPTH {
        match innermost.third_party_inner() {
            Some(inner) => innermost = inner,
            None => break,
        }
    }
    format!("{} {} {}", innermost.dest, innermost.source, innermost.body)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::frame::{Address, Info};
    use std::thread;

    fn frame(body: &str) -> Frame {
        Frame {
            source: Address::new("N0CALL", 9),
            dest: Address::new("APRS", 0),
            path: vec![Address::new("WIDE1", 1)],
            body: Info::from(body),
        }
    }

    #[test]
    fn test_duplicate_within_window() {
        let cache = DedupCache::new(Duration::from_secs(60));
        assert!(!cache.check_and_insert(&frame(">hello")));
        assert!(cache.check_and_insert(&frame(">hello")));
        assert!(!cache.check_and_insert(&frame(">other")));
    }

    #[test]
    fn test_repeat_after_window_delivered_again() {
        let cache = DedupCache::new(Duration::from_millis(50));
        assert!(!cache.check_and_insert(&frame(">hello")));
        thread::sleep(Duration::from_millis(60));
        assert!(!cache.check_and_insert(&frame(">hello")));
    }

    #[test]
    fn test_path_not_part_of_key() {
        let cache = DedupCache::new(Duration::from_secs(60));
        let mut digipeated = frame(">hello");
        digipeated.path = vec![Address::new("WIDE2", 1)];
        assert!(!cache.check_and_insert(&frame(">hello")));
        assert!(cache.check_and_insert(&digipeated));
    }

    #[test]
    fn test_third_party_wrapper_unwrapped() {
        let cache = DedupCache::new(Duration::from_secs(60));
        let direct = Frame::parse("N0CALL-9>APRS,WIDE1-1:!pos").unwrap();
        let relayed = Frame::parse("IGATE>APRS,TCPIP:}N0CALL-9>APRS:!pos").unwrap();
        assert!(!cache.check_and_insert(&direct));
        // Same innermost report, different wrapper
        assert!(cache.check_and_insert(&relayed));
    }

    #[test]
    fn test_sweep_reclaims_expired() {
        let cache = DedupCache::new(Duration::from_millis(20));
        let _ = cache.check_and_insert(&frame(">a"));
        let _ = cache.check_and_insert(&frame(">b"));
        assert_eq!(cache.len(), 2);

        thread::sleep(Duration::from_millis(30));
        cache.sweep();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_submitters() {
        use std::sync::Arc;
        let cache = Arc::new(DedupCache::new(Duration::from_secs(60)));
        let mut handles = vec![];
        for _ in 0..4 {
            let cache = cache.clone();
            handles.push(thread::spawn(move || {
                let mut dups = 0;
                for i in 0..1000 {
                    if cache.check_and_insert(&frame(&format!(">{}", i % 50))) {
                        dups += 1;
                    }
                }
                dups
            }));
        }
        let dups: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // 4000 submissions, 50 distinct keys
        assert_eq!(dups, 4000 - 50);
    }
}
