use std::time::{Duration, Instant};

use signalhub_core::error::ClientCode;

use crate::config::LimitsSection;

/// Decision from policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Pass,
    /// Discard the frame and tell the client why.
    Reject { code: ClientCode, msg: &'static str },
    /// Tell the client why, then close the connection.
    Close { code: ClientCode, msg: &'static str },
}

/// Hub-wide inbound policy. Construct once at startup, then share via Arc.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    max_frame_bytes: usize,
    rate_limit_rps: u32,
    rate_limit_burst: u32,
}

impl PolicyEngine {
    pub fn new(limits: &LimitsSection) -> Self {
        Self {
            max_frame_bytes: limits.max_frame_bytes,
            rate_limit_rps: limits.rate_limit_rps,
            rate_limit_burst: limits.rate_limit_burst,
        }
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// Per-connection limiter, or `None` when rate limiting is disabled.
    pub fn new_connection_limiter(&self) -> Option<ConnRateLimiter> {
        (self.rate_limit_rps > 0)
            .then(|| ConnRateLimiter::new(self.rate_limit_rps, self.rate_limit_burst))
    }

    /// Cheap checks run before decoding a data frame.
    pub fn check(&self, bytes_len: usize, limiter: Option<&mut ConnRateLimiter>) -> PolicyDecision {
        if bytes_len > self.max_frame_bytes {
            return PolicyDecision::Close {
                code: ClientCode::PayloadTooLarge,
                msg: "frame too large",
            };
        }
        if let Some(lim) = limiter {
            if !lim.allow() {
                return PolicyDecision::Reject {
                    code: ClientCode::RateLimited,
                    msg: "rate limited",
                };
            }
        }
        PolicyDecision::Pass
    }
}

/// Per-connection token bucket (owned by the session task, no mutex).
#[derive(Debug)]
pub struct ConnRateLimiter {
    bucket: TokenBucket,
}

impl ConnRateLimiter {
    pub fn new(rps: u32, burst: u32) -> Self {
        Self {
            bucket: TokenBucket::new(rps, burst),
        }
    }

    pub fn allow(&mut self) -> bool {
        self.bucket.allow()
    }
}

#[derive(Debug)]
struct TokenBucket {
    rps: u32,
    capacity: u32,
    tokens: u32,
    last: Instant,
}

impl TokenBucket {
    fn new(rps: u32, burst: u32) -> Self {
        let rps = rps.max(1);
        let capacity = burst.max(1);
        Self {
            rps,
            capacity,
            tokens: capacity,
            last: Instant::now(),
        }
    }

    fn allow(&mut self) -> bool {
        self.refill(Instant::now());
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last);
        if elapsed < Duration::from_millis(50) {
            return;
        }

        let per_token = Duration::from_secs(1) / self.rps;
        let add = (elapsed.as_nanos() / per_token.as_nanos().max(1)).min(u128::from(u32::MAX)) as u32;
        if add == 0 {
            return;
        }
        self.tokens = self.tokens.saturating_add(add).min(self.capacity);
        if self.tokens == self.capacity {
            // a full bucket accrues nothing
            self.last = now;
        } else {
            // keep the fractional remainder for the next refill
            self.last += per_token * add;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_frame_bytes: usize, rps: u32, burst: u32) -> LimitsSection {
        LimitsSection {
            max_frame_bytes,
            rate_limit_rps: rps,
            rate_limit_burst: burst,
            ..LimitsSection::default()
        }
    }

    #[test]
    fn oversized_frames_close() {
        let p = PolicyEngine::new(&limits(100, 0, 0));
        assert_eq!(p.check(100, None), PolicyDecision::Pass);
        assert!(matches!(
            p.check(101, None),
            PolicyDecision::Close { code: ClientCode::PayloadTooLarge, .. }
        ));
    }

    #[test]
    fn burst_then_reject() {
        let p = PolicyEngine::new(&limits(1024, 1, 3));
        let mut lim = p.new_connection_limiter().expect("enabled");
        for _ in 0..3 {
            assert_eq!(p.check(10, Some(&mut lim)), PolicyDecision::Pass);
        }
        assert!(matches!(
            p.check(10, Some(&mut lim)),
            PolicyDecision::Reject { code: ClientCode::RateLimited, .. }
        ));
    }

    #[test]
    fn zero_rps_disables_limiter() {
        let p = PolicyEngine::new(&limits(1024, 0, 0));
        assert!(p.new_connection_limiter().is_none());
    }

    #[test]
    fn refill_keeps_partial_intervals() {
        let mut b = TokenBucket::new(1, 10);
        b.tokens = 0;
        let start = b.last;

        b.refill(start + Duration::from_millis(1999));
        assert_eq!(b.tokens, 1);
        // the 999ms left over counts toward the next token
        b.refill(start + Duration::from_millis(3000));
        assert_eq!(b.tokens, 3);
    }

    #[test]
    fn full_bucket_does_not_bank_time() {
        let mut b = TokenBucket::new(1, 2);
        let start = b.last;
        b.refill(start + Duration::from_secs(10));
        assert_eq!(b.tokens, 2);

        b.tokens = 0;
        b.refill(start + Duration::from_millis(10_500));
        assert_eq!(b.tokens, 0);
        b.refill(start + Duration::from_millis(11_000));
        assert_eq!(b.tokens, 1);
    }
}
