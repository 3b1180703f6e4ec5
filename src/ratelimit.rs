//! Sliding-window admission control with a renewing cooldown.
//!
//! One shared window for the whole process: the limiter protects the
//! single AI session, not individual users. Hitting the limit starts a
//! cooldown; hitting the bot again during the cooldown renews it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Request admitted and recorded in the window.
    Admitted,
    /// Request rejected; the caller should send the rate-limit notice.
    Rejected,
}

/// Process-wide sliding-window rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    cooldown: Duration,
    timestamps: VecDeque<Instant>,
    cooldown_until: Option<Instant>,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration, cooldown: Duration) -> Self {
        Self {
            limit,
            window,
            cooldown,
            timestamps: VecDeque::new(),
            cooldown_until: None,
        }
    }

    /// Check admission at `now`.
    ///
    /// The cooldown is checked before the window: any request landing
    /// inside an active cooldown is rejected and pushes the cooldown out
    /// to `now + cooldown`. Rejected requests never enter the window.
    pub fn check(&mut self, now: Instant) -> Admission {
        if let Some(until) = self.cooldown_until {
            if now < until {
                self.cooldown_until = Some(now + self.cooldown);
                return Admission::Rejected;
            }
        }

        while let Some(&oldest) = self.timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }

        if self.timestamps.len() >= self.limit {
            tracing::warn!(window_len = self.timestamps.len(), "Rate limit hit, starting cooldown");
            self.cooldown_until = Some(now + self.cooldown);
            return Admission::Rejected;
        }

        self.timestamps.push_back(now);
        Admission::Admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(8, Duration::from_secs(60), Duration::from_secs(15))
    }

    #[test]
    fn admits_up_to_limit() {
        let mut rl = limiter();
        let t0 = Instant::now();
        for i in 0..8 {
            assert_eq!(rl.check(t0 + Duration::from_millis(i)), Admission::Admitted);
        }
    }

    #[test]
    fn ninth_request_within_window_is_rejected() {
        let mut rl = limiter();
        let t0 = Instant::now();
        for i in 0..8 {
            rl.check(t0 + Duration::from_millis(i * 100));
        }
        assert_eq!(rl.check(t0 + Duration::from_secs(1)), Admission::Rejected);
    }

    #[test]
    fn cooldown_renews_on_repeated_hits() {
        let mut rl = limiter();
        let t0 = Instant::now();
        for i in 0..8 {
            rl.check(t0 + Duration::from_millis(i));
        }
        // Rejection at t0+1s starts a cooldown until t0+16s.
        assert_eq!(rl.check(t0 + Duration::from_secs(1)), Admission::Rejected);
        // A hit 5s later is still inside the cooldown and renews it to t0+21s.
        assert_eq!(rl.check(t0 + Duration::from_secs(6)), Admission::Rejected);
        // 17s after the first rejection that cooldown alone would have
        // expired, but the renewal keeps the gate shut.
        assert_eq!(rl.check(t0 + Duration::from_secs(18)), Admission::Rejected);
    }

    #[test]
    fn window_prunes_old_requests() {
        let mut rl = limiter();
        let t0 = Instant::now();
        for i in 0..8 {
            rl.check(t0 + Duration::from_millis(i));
        }
        // 61s later the whole window has aged out.
        assert_eq!(rl.check(t0 + Duration::from_secs(61)), Admission::Admitted);
    }

    #[test]
    fn rejections_do_not_occupy_the_window() {
        let mut rl = RateLimiter::new(2, Duration::from_secs(60), Duration::from_secs(1));
        let t0 = Instant::now();
        assert_eq!(rl.check(t0), Admission::Admitted);
        assert_eq!(rl.check(t0 + Duration::from_millis(1)), Admission::Admitted);
        assert_eq!(rl.check(t0 + Duration::from_millis(2)), Admission::Rejected);
        assert_eq!(rl.timestamps.len(), 2);
    }

    #[test]
    fn admits_again_after_cooldown_expires_with_free_window() {
        let mut rl = RateLimiter::new(2, Duration::from_secs(3), Duration::from_secs(1));
        let t0 = Instant::now();
        rl.check(t0);
        rl.check(t0);
        assert_eq!(rl.check(t0 + Duration::from_millis(10)), Admission::Rejected);
        // Cooldown over and both admitted entries aged out of the window.
        assert_eq!(rl.check(t0 + Duration::from_secs(4)), Admission::Admitted);
    }
}
