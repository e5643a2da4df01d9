//! Sliding-window request and token limiter for provider clients

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Default)]
struct Window {
    requests: VecDeque<Instant>,
    tokens: VecDeque<(Instant, u32)>,
}

impl Window {
    fn evict(&mut self, now: Instant) {
        while matches!(self.requests.front(), Some(&t) if now.duration_since(t) > WINDOW) {
            self.requests.pop_front();
        }
        while matches!(self.tokens.front(), Some(&(t, _)) if now.duration_since(t) > WINDOW) {
            self.tokens.pop_front();
        }
    }

    fn token_total(&self) -> u32 {
        self.tokens.iter().map(|(_, n)| n).sum()
    }
}

/// Per-minute request and token budget shared by all calls on one client.
///
/// A limit of 0 disables that dimension.
pub struct RateLimiter {
    requests_per_minute: u32,
    tokens_per_minute: u32,
    window: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, tokens_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            tokens_per_minute,
            window: Mutex::new(Window::default()),
        }
    }

    /// Wait until a request slot is free, then claim it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                window.evict(now);

                let over_requests = self.requests_per_minute > 0
                    && window.requests.len() >= self.requests_per_minute as usize;
                let over_tokens =
                    self.tokens_per_minute > 0 && window.token_total() >= self.tokens_per_minute;

                if !over_requests && !over_tokens {
                    window.requests.push_back(now);
                    return;
                }

                let oldest = if over_requests {
                    window.requests.front().copied()
                } else {
                    window.tokens.front().map(|(t, _)| *t)
                };
                oldest
                    .map(|t| WINDOW.saturating_sub(now.duration_since(t)))
                    .unwrap_or_default()
                    + Duration::from_millis(10)
            };

            tracing::debug!("Rate limit reached, waiting {}ms", wait.as_millis());
            tokio::time::sleep(wait).await;
        }
    }

    /// Record token usage reported by the backend
    pub async fn record_tokens(&self, tokens: u32) {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        window.evict(now);
        window.tokens.push_back((now, tokens));
    }

    /// Tokens consumed in the last minute
    pub async fn current_token_usage(&self) -> u32 {
        let mut window = self.window.lock().await;
        window.evict(Instant::now());
        window.token_total()
    }
}
