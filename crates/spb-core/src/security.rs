use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{clock::Clock, domain::UserId};

// ============== Input Sanitization ==============

/// Strip markup characters, trim, and cap at `max_len` characters.
///
/// Never rejects input. The result has no `<`/`>`, no surrounding whitespace
/// and at most `max_len` chars, and sanitizing it again is a no-op.
pub fn sanitize_input(input: &str, max_len: usize) -> String {
    let stripped: String = input.chars().filter(|c| !matches!(c, '<' | '>')).collect();
    let truncated: String = stripped.trim().chars().take(max_len).collect();
    // Truncation can expose inner whitespace at the new end.
    truncated.trim_end().to_string()
}

// ============== Rate Limiter (Fixed Window) ==============

/// Per-user counter for the current admission window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at: Instant,
}

impl RateLimitEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.reset_at
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Admitted { remaining: u32 },
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

/// Fixed-window request counter keyed by user.
///
/// The map is only touched inside short, non-async critical sections.
pub struct RateLimiter {
    window: Duration,
    max: u32,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<UserId, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            max,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, user_id: UserId) -> Admission {
        self.check_at(user_id, self.clock.now())
    }

    pub fn check_at(&self, user_id: UserId, now: Instant) -> Admission {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(entry) = entries.get_mut(&user_id) {
            if !entry.is_expired(now) {
                if entry.count >= self.max {
                    return Admission::Denied {
                        retry_after: entry.reset_at.saturating_duration_since(now),
                    };
                }
                entry.count += 1;
                return Admission::Admitted {
                    remaining: self.max - entry.count,
                };
            }
        }

        // First request, or the previous window has lapsed: start a new one.
        entries.insert(
            user_id,
            RateLimitEntry {
                count: 1,
                reset_at: now + self.window,
            },
        );
        Admission::Admitted {
            remaining: self.max.saturating_sub(1),
        }
    }

    pub fn entry(&self, user_id: UserId) -> Option<RateLimitEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(&user_id).copied()
    }

    pub fn tracked_users(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Drop every entry whose window has passed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(self.clock.now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Start the periodic sweep. The task ends when `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.tick().await; // first tick fires immediately
            loop {
                tokio::select! {
                  _ = cancel.cancelled() => break,
                  _ = tick.tick() => {
                    let removed = limiter.sweep();
                    if removed > 0 {
                      debug!(removed, remaining = limiter.tracked_users(), "rate limit sweep");
                    }
                  }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const WINDOW: Duration = Duration::from_secs(60);

    fn limiter(max: u32) -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::new());
        let rl = RateLimiter::new(WINDOW, max, clock.clone());
        (clock, rl)
    }

    #[test]
    fn sanitize_strips_angle_brackets_and_trims() {
        assert_eq!(sanitize_input("  <b>hello</b>  ", 4096), "bhello/b");
        assert_eq!(sanitize_input("<<>>", 4096), "");
        assert_eq!(sanitize_input("", 10), "");
    }

    #[test]
    fn sanitize_script_padding_example() {
        let input = format!("<script>hi</script>{}", " ".repeat(5000));
        let out = sanitize_input(&input, 4096);
        assert_eq!(out, "scripthi/script");
        assert!(!out.contains('<') && !out.contains('>'));
    }

    #[test]
    fn sanitize_truncates_by_chars_not_bytes() {
        let input = "é".repeat(10);
        let out = sanitize_input(&input, 4);
        assert_eq!(out.chars().count(), 4);
    }

    #[test]
    fn sanitize_properties_hold_for_awkward_inputs() {
        let inputs = [
            "a   b   c",
            "   <x>   y   ",
            "\t\n/start@bot  tiers \n",
            "ab    <<cd>>",
            "x y z w v u t s r q",
        ];
        for input in inputs {
            for max in [0usize, 1, 2, 3, 5, 8, 64] {
                let out = sanitize_input(input, max);
                assert!(!out.contains('<') && !out.contains('>'), "{input:?}/{max}");
                assert_eq!(out, out.trim(), "{input:?}/{max}");
                assert!(out.chars().count() <= max, "{input:?}/{max}");
                assert_eq!(sanitize_input(&out, max), out, "{input:?}/{max}");
            }
        }
    }

    #[test]
    fn admits_up_to_max_then_denies() {
        let (clock, rl) = limiter(10);
        let u = UserId(1);

        for _ in 0..10 {
            assert!(rl.check(u).is_admitted());
            clock.advance(Duration::from_millis(100));
        }
        assert!(!rl.check(u).is_admitted());
    }

    #[test]
    fn denial_does_not_mutate_entry() {
        let (clock, rl) = limiter(2);
        let u = UserId(7);
        rl.check(u);
        rl.check(u);
        let before = rl.entry(u).unwrap();

        clock.advance(Duration::from_secs(5));
        let res = rl.check(u);
        assert_eq!(
            res,
            Admission::Denied {
                retry_after: Duration::from_secs(55)
            }
        );
        assert_eq!(rl.entry(u).unwrap(), before);
    }

    #[test]
    fn window_expiry_resets_count() {
        let (clock, rl) = limiter(3);
        let u = UserId(9);
        let start = clock.now();
        for _ in 0..3 {
            rl.check(u);
        }
        assert!(!rl.check(u).is_admitted());

        // Still inside the window at exactly reset_at.
        clock.advance(WINDOW);
        assert!(!rl.check(u).is_admitted());

        clock.advance(Duration::from_millis(1));
        assert!(rl.check(u).is_admitted());
        let entry = rl.entry(u).unwrap();
        assert_eq!(entry.count, 1);
        assert_eq!(entry.reset_at, start + WINDOW + Duration::from_millis(1) + WINDOW);
    }

    #[test]
    fn users_are_counted_independently() {
        let (_clock, rl) = limiter(1);
        assert!(rl.check(UserId(1)).is_admitted());
        assert!(!rl.check(UserId(1)).is_admitted());
        assert!(rl.check(UserId(2)).is_admitted());
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let (clock, rl) = limiter(5);
        rl.check(UserId(1));
        clock.advance(Duration::from_secs(30));
        rl.check(UserId(2));
        assert_eq!(rl.tracked_users(), 2);

        clock.advance(Duration::from_secs(31));
        assert_eq!(rl.sweep(), 1);
        assert!(rl.entry(UserId(1)).is_none());
        assert!(rl.entry(UserId(2)).is_some());
    }

    #[tokio::test]
    async fn sweeper_stops_on_cancel() {
        let clock = Arc::new(ManualClock::new());
        let rl = Arc::new(RateLimiter::new(WINDOW, 5, clock));
        let cancel = CancellationToken::new();
        let handle = rl.spawn_sweeper(Duration::from_millis(5), cancel.clone());
        cancel.cancel();
        handle.await.unwrap();
    }
}
